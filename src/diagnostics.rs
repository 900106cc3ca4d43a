use crate::span::Span;

/// Caret report for a scan or parse error, which points at an exact span.
pub fn render(source: &str, kind: &str, span: Span, message: &str, hint: Option<&str>) -> String {
    let excerpt = line_at(source, span.line);
    let underline = pointer(excerpt, span.col, span.length);
    report(kind, message, span.line, span.col, excerpt, &underline, hint)
}

/// Report for a runtime error. The evaluator only knows the line, so the
/// whole statement is underlined instead of a single character.
pub fn render_runtime(source: &str, line: usize, message: &str, hint: Option<&str>) -> String {
    let excerpt = line_at(source, line);
    let stmt_start = excerpt.len() - excerpt.trim_start().len();
    let underline = pointer(excerpt, stmt_start + 1, excerpt.trim().chars().count());
    report("runtime", message, line, stmt_start + 1, excerpt, &underline, hint)
}

fn line_at(source: &str, line: usize) -> &str {
    source.lines().nth(line.saturating_sub(1)).unwrap_or("")
}

// Spaces up to `col`, then carets; tabs in the excerpt stay tabs so the
// carets land under the right characters.
fn pointer(excerpt: &str, col: usize, length: usize) -> String {
    let mut out = String::new();
    for c in excerpt.chars().take(col.saturating_sub(1)) {
        out.push(if c == '\t' { '\t' } else { ' ' });
    }
    for _ in 0..length.max(1) {
        out.push('^');
    }
    out
}

fn report(
    kind: &str,
    message: &str,
    line: usize,
    col: usize,
    excerpt: &str,
    underline: &str,
    hint: Option<&str>,
) -> String {
    let line_num = line.to_string();
    let gutter = " ".repeat(line_num.len());

    let mut out = format!("error[{}]: {}\n", kind, message);
    out.push_str(&format!("{}--> line {}:{}\n", gutter, line, col));
    out.push_str(&format!("{} |\n", gutter));
    out.push_str(&format!("{} | {}\n", line_num, excerpt));
    out.push_str(&format!("{} | {}\n", gutter, underline));
    if let Some(hint) = hint {
        out.push_str(&format!("{} |\n", gutter));
        out.push_str(&format!("{} = hint: {}\n", gutter, hint));
    }
    out
}

pub fn suggest_hint(message: &str) -> Option<String> {
    let msg = message.to_lowercase();

    if msg.contains("undefined variable") {
        return Some("variables spring to life on first assignment; check the spelling".into());
    }

    if msg.contains("hidden member") {
        return Some("hidden members are only reachable from the model's own tasks".into());
    }

    if msg.contains("can only call functions or models") {
        return Some("make sure the task is defined before this line".into());
    }

    if msg.contains("expected") && msg.contains("arguments") {
        return Some("check the task's parameter list".into());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_points_at_the_span() {
        let source = "x = yy + 1\n";
        let span = Span {
            line: 1,
            col: 5,
            length: 2,
        };
        let report = render(source, "parse", span, "Undefined variable 'yy'", None);
        assert!(report.starts_with("error[parse]: Undefined variable 'yy'"));
        assert!(report.contains("--> line 1:5"));
        assert!(report.contains("x = yy + 1"));
        assert!(report.contains("    ^^"));
    }

    #[test]
    fn render_runtime_underlines_the_statement() {
        let source = "x = 1\n  out ghost\n";
        let report = render_runtime(source, 2, "Undefined variable 'ghost'", None);
        assert!(report.starts_with("error[runtime]: Undefined variable 'ghost'"));
        assert!(report.contains("--> line 2:3"));
        assert!(report.contains("  out ghost"));
        // carets cover `out ghost`, not the leading indent
        assert!(report.contains("|   ^^^^^^^^^"));
    }

    #[test]
    fn render_includes_the_hint() {
        let source = "out ghost\n";
        let report = render_runtime(source, 1, "Undefined variable 'ghost'", Some("check it"));
        assert!(report.contains("= hint: check it"));
    }

    #[test]
    fn hints_cover_common_mistakes() {
        assert!(suggest_hint("Undefined variable 'n'").is_some());
        assert!(suggest_hint("Cannot access hidden member 'value'").is_some());
        assert!(suggest_hint("everything is fine").is_none());
    }
}
