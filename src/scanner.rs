pub mod token;

use crate::keywords;
use crate::scanner::token::{Token, TokenType};
use crate::span::Span;

#[derive(Debug, Clone)]
pub struct ScanError {
    pub span: Span,
    pub message: String,
}

pub struct ScanResult {
    pub tokens: Vec<Token>,
    pub errors: Vec<ScanError>,
}

pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    errors: Vec<ScanError>,
    start: usize,
    current: usize,
    line: usize,
    line_start: usize,
}

impl Scanner {
    pub fn new(source: impl Into<String>) -> Self {
        Scanner {
            source: source.into().chars().collect(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            line_start: 0,
        }
    }

    pub fn scan_tokens(mut self) -> ScanResult {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        let eof_span = Span {
            line: self.line,
            col: self.current - self.line_start + 1,
            length: 0,
        };
        self.tokens.push(Token::new(TokenType::Eof, "", eof_span));
        ScanResult {
            tokens: self.tokens,
            errors: self.errors,
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '[' => self.add_token(TokenType::LeftBracket),
            ']' => self.add_token(TokenType::RightBracket),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            ':' => self.add_token(TokenType::Colon),
            '|' => self.add_token(TokenType::Pipe),
            '%' => self.add_token(TokenType::Percent),
            '+' => {
                let t = if self.match_char('=') {
                    TokenType::PlusEqual
                } else {
                    TokenType::Plus
                };
                self.add_token(t);
            }
            '-' => {
                let t = if self.match_char('=') {
                    TokenType::MinusEqual
                } else {
                    TokenType::Minus
                };
                self.add_token(t);
            }
            '*' => {
                let t = if self.match_char('=') {
                    TokenType::StarEqual
                } else {
                    TokenType::Star
                };
                self.add_token(t);
            }
            '/' => {
                if self.match_char('/') {
                    self.skip_line_comment();
                } else if self.match_char('*') {
                    self.skip_block_comment();
                } else if self.match_char('=') {
                    self.add_token(TokenType::SlashEqual);
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            '#' => self.skip_line_comment(),
            '=' => {
                let t = if self.match_char('=') {
                    TokenType::Equal
                } else if self.match_char('>') {
                    TokenType::Arrow
                } else {
                    TokenType::Assign
                };
                self.add_token(t);
            }
            '!' => {
                let t = if self.match_char('=') {
                    TokenType::NotEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(t);
            }
            '<' => {
                let t = if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(t);
            }
            '>' => {
                let t = if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(t);
            }

            // Whitespace (not newlines)
            ' ' | '\r' | '\t' => {}

            // Newlines separate statements
            '\n' => {
                let newline_span = Span {
                    line: self.line,
                    col: self.start - self.line_start + 1,
                    length: 1,
                };
                self.line += 1;
                self.line_start = self.current;
                self.tokens
                    .push(Token::new(TokenType::Newline, "\n", newline_span));
            }

            '"' | '\'' => self.handle_string(c),

            c if c.is_ascii_digit() => self.handle_number(),
            c if c.is_alphabetic() || c == '_' => self.handle_identifier(),

            _ => self.report_error(format!("Unexpected character: '{}'", c)),
        }
    }

    fn advance(&mut self) -> char {
        let ch = self.source[self.current];
        self.current += 1;
        ch
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.current + 1).copied()
    }

    fn match_char(&mut self, expected: char) -> bool {
        match self.peek() {
            Some(ch) if ch == expected => {
                self.current += 1;
                true
            }
            _ => false,
        }
    }

    fn handle_string(&mut self, quote: char) {
        let mut value = String::new();

        while self.peek() != Some(quote) && !self.is_at_end() {
            if self.peek() == Some('\n') {
                self.report_error("Unterminated string");
                return;
            }
            if self.peek() == Some('\\') {
                self.advance(); // consume the backslash
                if self.is_at_end() {
                    self.report_error("Unterminated string");
                    return;
                }
                let escaped = self.advance();
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    '\'' => value.push('\''),
                    // Unknown escapes keep the escaped character as-is
                    other => value.push(other),
                }
                continue;
            }
            let c = self.advance();
            value.push(c);
        }

        if self.is_at_end() {
            self.report_error("Unterminated string");
            return;
        }

        self.advance(); // closing quote
        self.add_token(TokenType::Str(value));
    }

    fn handle_number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(); // consume '.'
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        match text.parse::<f64>() {
            Ok(num) => self.add_token(TokenType::Number(num)),
            Err(_) => self.report_error(format!("Invalid number: '{}'", text)),
        }
    }

    fn handle_identifier(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let token_type = keywords::lookup(&text).unwrap_or(TokenType::Identifier);
        self.add_token(token_type);
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != Some('\n') {
            self.advance();
        }
    }

    // Block comments nest: each /* deepens, each */ closes one level.
    fn skip_block_comment(&mut self) {
        let mut nesting = 1;
        while !self.is_at_end() && nesting > 0 {
            if self.peek() == Some('/') && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                nesting += 1;
            } else if self.peek() == Some('*') && self.peek_next() == Some('/') {
                self.advance();
                self.advance();
                nesting -= 1;
            } else {
                if self.peek() == Some('\n') {
                    self.line += 1;
                    self.advance();
                    self.line_start = self.current;
                    continue;
                }
                self.advance();
            }
        }

        if nesting > 0 {
            self.report_error("Unterminated block comment");
        }
    }

    fn add_token(&mut self, t: TokenType) {
        let text = self.source[self.start..self.current]
            .iter()
            .collect::<String>();
        let span = Span {
            line: self.line,
            col: self.start - self.line_start + 1,
            length: self.current - self.start,
        };
        self.tokens.push(Token::new(t, text, span));
    }

    fn report_error(&mut self, message: impl Into<String>) {
        let span = Span {
            line: self.line,
            col: self.start - self.line_start + 1,
            length: (self.current - self.start).max(1),
        };
        self.errors.push(ScanError {
            span,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> ScanResult {
        Scanner::new(source).scan_tokens()
    }

    fn token_types(result: &ScanResult) -> Vec<&TokenType> {
        result.tokens.iter().map(|t| &t.token_type).collect()
    }

    #[test]
    fn scan_basic_tokens() {
        let result = scan("x = 5");
        assert!(result.errors.is_empty());
        assert_eq!(
            token_types(&result),
            vec![
                &TokenType::Identifier,
                &TokenType::Assign,
                &TokenType::Number(5.0),
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scan_keywords_and_identifiers() {
        let result = scan("when other whenever");
        assert!(result.errors.is_empty());
        assert_eq!(
            token_types(&result),
            vec![
                &TokenType::When,
                &TokenType::Other,
                &TokenType::Identifier,
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scan_error_aliases_throw() {
        let result = scan("error \"boom\"");
        assert!(result.errors.is_empty());
        assert_eq!(result.tokens[0].token_type, TokenType::Throw);
        assert_eq!(result.tokens[0].lexeme, "error");
    }

    #[test]
    fn scan_whitespace_is_insignificant_between_tokens() {
        let tight = scan("a=1+2*b");
        let loose = scan("a  =\t1 +  2   * b");
        assert!(tight.errors.is_empty() && loose.errors.is_empty());
        assert_eq!(token_types(&tight), token_types(&loose));
    }

    #[test]
    fn scan_emits_every_newline() {
        let result = scan("1\n\n2");
        let types = token_types(&result);
        assert_eq!(
            types,
            vec![
                &TokenType::Number(1.0),
                &TokenType::Newline,
                &TokenType::Newline,
                &TokenType::Number(2.0),
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scan_string_escapes() {
        let result = scan(r#""a\tb\nc\\d\"e""#);
        assert!(result.errors.is_empty());
        assert_eq!(
            result.tokens[0].token_type,
            TokenType::Str("a\tb\nc\\d\"e".to_string())
        );
    }

    #[test]
    fn scan_unknown_escape_passes_through() {
        let result = scan(r#""a\qb""#);
        assert!(result.errors.is_empty());
        assert_eq!(result.tokens[0].token_type, TokenType::Str("aqb".to_string()));
    }

    #[test]
    fn scan_single_quoted_string() {
        let result = scan("'hi'");
        assert!(result.errors.is_empty());
        assert_eq!(result.tokens[0].token_type, TokenType::Str("hi".to_string()));
    }

    #[test]
    fn scan_error_on_unterminated_string() {
        let result = scan("\"unterminated");
        assert!(!result.errors.is_empty());
        assert!(result.errors[0].message.contains("Unterminated string"));
    }

    #[test]
    fn scan_hash_comment() {
        let result = scan("# a comment\n5");
        assert!(result.errors.is_empty());
        let types = token_types(&result);
        assert_eq!(
            types,
            vec![
                &TokenType::Newline,
                &TokenType::Number(5.0),
                &TokenType::Eof
            ]
        );
    }

    #[test]
    fn scan_nested_block_comment() {
        let result = scan("1 /* outer /* inner */ still outer */ 2");
        assert!(result.errors.is_empty());
        assert_eq!(
            token_types(&result),
            vec![
                &TokenType::Number(1.0),
                &TokenType::Number(2.0),
                &TokenType::Eof
            ]
        );
    }

    #[test]
    fn scan_unterminated_block_comment() {
        let result = scan("/* /* closed once */ never closed");
        assert!(!result.errors.is_empty());
        assert!(result.errors[0].message.contains("Unterminated block comment"));
    }

    #[test]
    fn scan_block_comment_tracks_lines() {
        let result = scan("/* line1\nline2\n*/ @");
        assert!(!result.errors.is_empty());
        assert_eq!(result.errors[0].span.line, 3);
    }

    #[test]
    fn scan_number_forms() {
        let result = scan("12 3.5 7.");
        assert!(result.errors.is_empty());
        let types = token_types(&result);
        // `7.` scans as number 7 followed by a dot
        assert_eq!(
            types,
            vec![
                &TokenType::Number(12.0),
                &TokenType::Number(3.5),
                &TokenType::Number(7.0),
                &TokenType::Dot,
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scan_minus_is_not_part_of_number() {
        let result = scan("-3");
        assert_eq!(
            token_types(&result),
            vec![
                &TokenType::Minus,
                &TokenType::Number(3.0),
                &TokenType::Eof
            ]
        );
    }

    #[test]
    fn scan_compound_operators() {
        let result = scan("+= -= *= /= == != <= >= =>");
        assert!(result.errors.is_empty());
        assert_eq!(
            token_types(&result),
            vec![
                &TokenType::PlusEqual,
                &TokenType::MinusEqual,
                &TokenType::StarEqual,
                &TokenType::SlashEqual,
                &TokenType::Equal,
                &TokenType::NotEqual,
                &TokenType::LessEqual,
                &TokenType::GreaterEqual,
                &TokenType::Arrow,
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scan_keeps_going_after_error() {
        let result = scan("@ x = 1");
        assert_eq!(result.errors.len(), 1);
        let types = token_types(&result);
        assert!(types.contains(&&TokenType::Identifier));
        assert!(types.contains(&&TokenType::Number(1.0)));
    }
}
