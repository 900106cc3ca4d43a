use anyhow::Result;
use clap::Parser as ClapParser;
use ez_lang::config::RuntimeConfig;
use ez_lang::diagnostics;
use ez_lang::interpreter::Interpreter;
use ez_lang::parser::Parser;
use ez_lang::scanner::Scanner;
use rustyline::DefaultEditor;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(ClapParser)]
#[command(name = "ez")]
#[command(about = "The EZ programming language")]
struct Cli {
    /// Script file to run (omit for REPL)
    script: Option<String>,

    /// Override the module library root used by `use`
    #[arg(long)]
    lib_root: Option<PathBuf>,
}

enum RunStatus {
    Clean,
    StaticError,
    RuntimeError,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = RuntimeConfig::default();
    if let Some(lib_root) = cli.lib_root {
        config.lib_root = lib_root;
    }
    let mut interpreter = Interpreter::new(config);

    match cli.script {
        Some(path) => match run_file(&path, &mut interpreter) {
            Ok(RunStatus::Clean) => ExitCode::SUCCESS,
            Ok(RunStatus::StaticError) => ExitCode::from(65),
            Ok(RunStatus::RuntimeError) => ExitCode::from(70),
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::from(66)
            }
        },
        None => match run_prompt(&mut interpreter) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn run_file(path: &str, interpreter: &mut Interpreter) -> Result<RunStatus> {
    let contents = fs::read_to_string(path)?;
    Ok(run(&contents, interpreter))
}

fn run_prompt(interpreter: &mut Interpreter) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut buffer = String::new();

    let history_path = dirs::home_dir().map(|p| p.join(".ez_history"));
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    loop {
        let prompt = if buffer.is_empty() { ">>> " } else { "... " };

        match rl.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() && line.trim() == "exit" {
                    break;
                }
                buffer.push_str(&line);
                buffer.push('\n');

                if is_complete(&buffer) {
                    if !buffer.trim().is_empty() {
                        let _ = rl.add_history_entry(buffer.trim());
                        run(&buffer, interpreter);
                    }
                    buffer.clear();
                }
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(rustyline::error::ReadlineError::Interrupted) => {
                buffer.clear();
                println!("^C");
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }

    Ok(())
}

// A chunk is submittable when every brace/paren/bracket is balanced and no
// string is left open.
fn is_complete(code: &str) -> bool {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut quote = '"';
    let mut escaped = false;
    let mut iter = code.chars().peekable();

    while let Some(c) = iter.next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote || c == '\n' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                in_string = true;
                quote = c;
            }
            '#' => {
                while iter.peek().is_some_and(|&next| next != '\n') {
                    iter.next();
                }
            }
            '/' => {
                if iter.peek() == Some(&'/') {
                    while iter.peek().is_some_and(|&next| next != '\n') {
                        iter.next();
                    }
                }
            }
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
    }

    depth <= 0 && !in_string
}

fn run(source: &str, interpreter: &mut Interpreter) -> RunStatus {
    let result = Scanner::new(source).scan_tokens();

    if !result.errors.is_empty() {
        for e in &result.errors {
            let hint = diagnostics::suggest_hint(&e.message);
            eprint!(
                "{}",
                diagnostics::render(source, "scan", e.span, &e.message, hint.as_deref())
            );
        }
        return RunStatus::StaticError;
    }

    let statements = match Parser::new(result.tokens).parse() {
        Ok(statements) => statements,
        Err(errors) => {
            for e in &errors {
                eprint!(
                    "{}",
                    diagnostics::render(source, "parse", e.span, &e.message, None)
                );
            }
            return RunStatus::StaticError;
        }
    };

    match interpreter.interpret(&statements) {
        Ok(()) => RunStatus::Clean,
        Err(e) => {
            let hint = diagnostics::suggest_hint(&e.message);
            eprint!(
                "{}",
                diagnostics::render_runtime(source, e.line, &e.message, hint.as_deref())
            );
            RunStatus::RuntimeError
        }
    }
}
