pub mod ast;

use crate::parser::ast::{
    Expr, ExprKind, MemberKind, ModelMember, Stmt, StmtKind, Visibility,
};
use crate::scanner::token::{Token, TokenType};
use crate::span::Span;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    pub fn parse(mut self) -> Result<Vec<Stmt>, Vec<ParseError>> {
        let mut statements = Vec::new();
        let mut errors = Vec::new();

        self.skip_newlines();
        while !self.is_at_end() {
            match self.statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    errors.push(e);
                    self.synchronize();
                }
            }
            self.skip_newlines();
        }

        if errors.is_empty() {
            Ok(statements)
        } else {
            Err(errors)
        }
    }

    // utility methods
    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().token_type == *token_type
    }

    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            return true;
        }
        false
    }

    fn match_any(&mut self, types: &[TokenType]) -> bool {
        for t in types {
            if self.check(t) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn error_expected(&self, expected: &str) -> ParseError {
        let current = self.peek();
        let context = if self.current > 0 {
            format!(" after '{}'", self.previous().lexeme.escape_debug())
        } else {
            String::new()
        };
        ParseError {
            span: current.span,
            message: format!(
                "Expected {}{}, got {:?}",
                expected, context, current.token_type
            ),
        }
    }

    fn consume(&mut self, token_type: &TokenType, expected: &str) -> Result<&Token, ParseError> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(expected))
        }
    }

    fn skip_newlines(&mut self) {
        while self.match_token(&TokenType::Newline) {}
    }

    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            // A newline ends a statement, so we're at a fresh start
            if self.previous().token_type == TokenType::Newline {
                return;
            }

            // A statement-starting keyword is also a safe resume point
            match self.peek().token_type {
                TokenType::Out
                | TokenType::When
                | TokenType::While
                | TokenType::Repeat
                | TokenType::Get
                | TokenType::Task
                | TokenType::Give
                | TokenType::Escape
                | TokenType::Skip
                | TokenType::Model
                | TokenType::Struct
                | TokenType::Use
                | TokenType::Try
                | TokenType::Throw => return,
                _ => {}
            }

            self.advance();
        }
    }

    // ============ statements ============

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.match_token(&TokenType::Out) {
            return self.out_statement();
        }
        if self.match_token(&TokenType::When) {
            return self.when_statement();
        }
        if self.match_token(&TokenType::While) {
            return self.while_statement();
        }
        if self.match_token(&TokenType::Repeat) {
            return self.repeat_statement();
        }
        if self.match_token(&TokenType::Get) {
            return self.get_statement();
        }
        if self.match_token(&TokenType::Task) {
            return self.task_statement();
        }
        if self.match_token(&TokenType::Give) {
            return self.give_statement();
        }
        if self.match_token(&TokenType::Escape) {
            let line = self.previous().span.line;
            return Ok(Stmt {
                kind: StmtKind::Escape,
                line,
            });
        }
        if self.match_token(&TokenType::Skip) {
            let line = self.previous().span.line;
            return Ok(Stmt {
                kind: StmtKind::Skip,
                line,
            });
        }
        if self.match_token(&TokenType::LeftBrace) {
            return self.block_statement();
        }
        if self.match_token(&TokenType::Model) {
            return self.model_statement();
        }
        if self.match_token(&TokenType::Struct) {
            return self.struct_statement();
        }
        if self.match_token(&TokenType::Use) {
            return self.use_statement();
        }
        if self.match_token(&TokenType::Try) {
            return self.try_statement();
        }
        if self.match_token(&TokenType::Throw) {
            let line = self.previous().span.line;
            let expr = self.expression()?;
            return Ok(Stmt {
                kind: StmtKind::Throw(expr),
                line,
            });
        }

        self.expression_statement()
    }

    fn out_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;
        let value = self.expression()?;
        Ok(Stmt {
            kind: StmtKind::Out(value),
            line,
        })
    }

    // Body of a control statement: braced block, or a single statement.
    fn controlled_body(&mut self) -> Result<Stmt, ParseError> {
        self.skip_newlines();
        if self.match_token(&TokenType::LeftBrace) {
            self.block_statement()
        } else {
            self.statement()
        }
    }

    fn when_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;

        let condition = self.expression()?;
        let then_branch = Box::new(self.controlled_body()?);

        self.skip_newlines();

        let else_branch = if self.match_token(&TokenType::Other) {
            self.skip_newlines();
            if self.match_token(&TokenType::When) {
                // `other when ...` chains
                Some(Box::new(self.when_statement()?))
            } else if self.match_token(&TokenType::LeftBrace) {
                Some(Box::new(self.block_statement()?))
            } else {
                Some(Box::new(self.statement()?))
            }
        } else {
            None
        };

        Ok(Stmt {
            kind: StmtKind::When {
                condition,
                then_branch,
                else_branch,
            },
            line,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;
        let condition = self.expression()?;
        let body = Box::new(self.controlled_body()?);

        Ok(Stmt {
            kind: StmtKind::While { condition, body },
            line,
        })
    }

    fn repeat_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;

        // repeat i = START to END
        let variable = self
            .consume(&TokenType::Identifier, "variable name")?
            .lexeme
            .clone();
        self.consume(&TokenType::Assign, "'='")?;
        let start = self.expression()?;
        self.consume(&TokenType::To, "'to'")?;
        let end = self.expression()?;
        let body = Box::new(self.controlled_body()?);

        Ok(Stmt {
            kind: StmtKind::Repeat {
                variable,
                start,
                end,
                body,
            },
            line,
        })
    }

    fn get_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;

        // get x in iterable
        let variable = self
            .consume(&TokenType::Identifier, "variable name")?
            .lexeme
            .clone();
        self.consume(&TokenType::In, "'in'")?;
        let iterable = self.expression()?;
        let body = Box::new(self.controlled_body()?);

        Ok(Stmt {
            kind: StmtKind::Get {
                variable,
                iterable,
                body,
            },
            line,
        })
    }

    fn parameter_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.consume(&TokenType::LeftParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                params.push(
                    self.consume(&TokenType::Identifier, "parameter name")?
                        .lexeme
                        .clone(),
                );
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenType::RightParen, "')'")?;
        Ok(params)
    }

    fn statement_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        self.skip_newlines();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            body.push(self.statement()?);
            self.skip_newlines();
        }
        self.consume(&TokenType::RightBrace, "'}'")?;
        Ok(body)
    }

    fn task_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;

        let name = self
            .consume(&TokenType::Identifier, "function name")?
            .lexeme
            .clone();
        let params = self.parameter_list()?;

        self.skip_newlines();
        let body = if self.match_token(&TokenType::LeftBrace) {
            self.statement_block()?
        } else {
            vec![self.statement()?]
        };

        Ok(Stmt {
            kind: StmtKind::Task {
                name,
                params,
                body: Rc::new(body),
            },
            line,
        })
    }

    fn give_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;

        let value = if self.check(&TokenType::Newline)
            || self.check(&TokenType::RightBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.expression()?)
        };

        Ok(Stmt {
            kind: StmtKind::Give(value),
            line,
        })
    }

    fn block_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;
        let statements = self.statement_block()?;
        Ok(Stmt {
            kind: StmtKind::Block(statements),
            line,
        })
    }

    fn use_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;
        let token = self.advance().clone();
        match token.token_type {
            TokenType::Str(path) => Ok(Stmt {
                kind: StmtKind::Use(path),
                line,
            }),
            _ => Err(ParseError {
                span: token.span,
                message: "Expected string path after 'use'".to_string(),
            }),
        }
    }

    fn try_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;

        self.consume(&TokenType::LeftBrace, "'{' after 'try'")?;
        let body = Box::new(self.block_statement()?);

        self.skip_newlines();
        self.consume(&TokenType::Catch, "'catch'")?;
        let catch_var = self
            .consume(&TokenType::Identifier, "variable name after 'catch'")?
            .lexeme
            .clone();
        self.skip_newlines();
        self.consume(&TokenType::LeftBrace, "'{' after catch variable")?;
        let catch_body = Box::new(self.block_statement()?);

        Ok(Stmt {
            kind: StmtKind::Try {
                body,
                catch_var,
                catch_body,
            },
            line,
        })
    }

    fn struct_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;
        let name = self
            .consume(&TokenType::Identifier, "struct name")?
            .lexeme
            .clone();

        self.skip_newlines();
        self.consume(&TokenType::LeftBrace, "'{' before struct body")?;
        self.skip_newlines();

        let mut fields = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            fields.push(
                self.consume(&TokenType::Identifier, "field name")?
                    .lexeme
                    .clone(),
            );
            if !self.match_token(&TokenType::Comma) && !self.check(&TokenType::Newline) {
                break;
            }
            self.skip_newlines();
        }
        self.consume(&TokenType::RightBrace, "'}' after struct body")?;

        Ok(Stmt {
            kind: StmtKind::Struct { name, fields },
            line,
        })
    }

    fn model_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.previous().span.line;

        let name = self
            .consume(&TokenType::Identifier, "model name")?
            .lexeme
            .clone();

        let parent = if self.match_token(&TokenType::Extends) {
            Some(
                self.consume(&TokenType::Identifier, "parent model name")?
                    .lexeme
                    .clone(),
            )
        } else {
            None
        };

        self.skip_newlines();
        self.consume(&TokenType::LeftBrace, "'{' after model name")?;
        self.skip_newlines();

        let mut init_params = Vec::new();
        let mut init_body = Vec::new();
        let mut members = Vec::new();

        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            let visibility = if self.match_token(&TokenType::Hidden) {
                Visibility::Hidden
            } else if self.match_token(&TokenType::Shown) {
                Visibility::Shown
            } else {
                Visibility::Shown
            };

            if self.match_token(&TokenType::Init) {
                init_params = self.parameter_list()?;
                self.skip_newlines();
                if self.match_token(&TokenType::LeftBrace) {
                    init_body = self.statement_block()?;
                }
            } else if self.match_token(&TokenType::Task) {
                let name = self.property_name("method name")?;
                let params = self.parameter_list()?;
                self.skip_newlines();
                let body = if self.match_token(&TokenType::LeftBrace) {
                    self.statement_block()?
                } else {
                    Vec::new()
                };
                members.push(ModelMember {
                    visibility,
                    kind: MemberKind::Method {
                        name,
                        params,
                        body: Rc::new(body),
                    },
                });
            } else if self.check(&TokenType::Identifier) {
                let name = self.advance().lexeme.clone();
                let initializer = if self.match_token(&TokenType::Assign) {
                    Some(self.expression()?)
                } else {
                    None
                };
                members.push(ModelMember {
                    visibility,
                    kind: MemberKind::Property { name, initializer },
                });
            } else {
                return Err(self.error_expected("'init', 'task', or a property name"));
            }

            self.skip_newlines();
        }

        self.consume(&TokenType::RightBrace, "'}' after model body")?;

        Ok(Stmt {
            kind: StmtKind::Model {
                name,
                parent,
                init_params,
                init_body: Rc::new(init_body),
                members,
            },
            line,
        })
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.peek().span.line;
        let expr = self.expression()?;

        // A statement-level assignment to a bare name both declares and binds
        if let ExprKind::Assign {
            name,
            value,
            index: None,
            object: None,
        } = expr.kind
        {
            return Ok(Stmt {
                kind: StmtKind::VarDecl {
                    name,
                    initializer: *value,
                },
                line,
            });
        }

        Ok(Stmt {
            kind: StmtKind::Expr(expr),
            line,
        })
    }

    // ============ expressions ============

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.logical_or()?;

        if self.match_any(&[
            TokenType::Assign,
            TokenType::PlusEqual,
            TokenType::MinusEqual,
            TokenType::StarEqual,
            TokenType::SlashEqual,
        ]) {
            let op = self.previous().token_type.clone();
            let line = self.previous().span.line;
            let op_span = self.previous().span;
            let value = self.assignment()?; // right-associative

            // Compound forms desugar to `left = left OP right`
            let value = if op == TokenType::Assign {
                value
            } else {
                let bin_op = match op {
                    TokenType::PlusEqual => TokenType::Plus,
                    TokenType::MinusEqual => TokenType::Minus,
                    TokenType::StarEqual => TokenType::Star,
                    _ => TokenType::Slash,
                };
                Expr {
                    kind: ExprKind::Binary {
                        left: Box::new(expr.clone()),
                        op: bin_op,
                        right: Box::new(value),
                    },
                    line,
                }
            };

            return match expr.kind {
                ExprKind::Identifier(name) => Ok(Expr {
                    kind: ExprKind::Assign {
                        name,
                        value: Box::new(value),
                        index: None,
                        object: None,
                    },
                    line,
                }),
                ExprKind::Index { object, index } => Ok(Expr {
                    kind: ExprKind::Assign {
                        name: String::new(),
                        value: Box::new(value),
                        index: Some(index),
                        object: Some(object),
                    },
                    line,
                }),
                ExprKind::PropertyAccess { object, property } => Ok(Expr {
                    kind: ExprKind::Set {
                        object,
                        name: property,
                        value: Box::new(value),
                    },
                    line,
                }),
                _ => Err(ParseError {
                    span: op_span,
                    message: "Invalid assignment target".to_string(),
                }),
            };
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.logical_and()?;

        while self.match_token(&TokenType::Or) {
            let line = self.previous().span.line;
            let right = self.logical_and()?;
            expr = Expr {
                kind: ExprKind::Logical {
                    left: Box::new(expr),
                    op: TokenType::Or,
                    right: Box::new(right),
                },
                line,
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;

        while self.match_token(&TokenType::And) {
            let line = self.previous().span.line;
            let right = self.equality()?;
            expr = Expr {
                kind: ExprKind::Logical {
                    left: Box::new(expr),
                    op: TokenType::And,
                    right: Box::new(right),
                },
                line,
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.comparison()?;

        while self.match_any(&[TokenType::Equal, TokenType::NotEqual]) {
            let op = self.previous().token_type.clone();
            let line = self.previous().span.line;
            let right = self.comparison()?;
            expr = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(expr),
                    op,
                    right: Box::new(right),
                },
                line,
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.term()?;

        while self.match_any(&[
            TokenType::Less,
            TokenType::LessEqual,
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::In,
        ]) {
            let op = self.previous().token_type.clone();
            let line = self.previous().span.line;
            let right = self.term()?;
            expr = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(expr),
                    op,
                    right: Box::new(right),
                },
                line,
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.factor()?;

        while self.match_any(&[TokenType::Plus, TokenType::Minus]) {
            let op = self.previous().token_type.clone();
            let line = self.previous().span.line;
            let right = self.factor()?;
            expr = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(expr),
                    op,
                    right: Box::new(right),
                },
                line,
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;

        while self.match_any(&[TokenType::Star, TokenType::Slash, TokenType::Percent]) {
            let op = self.previous().token_type.clone();
            let line = self.previous().span.line;
            let right = self.unary()?;
            expr = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(expr),
                    op,
                    right: Box::new(right),
                },
                line,
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_any(&[TokenType::Bang, TokenType::Minus, TokenType::Not]) {
            let op = self.previous().token_type.clone();
            let line = self.previous().span.line;
            let operand = self.unary()?; // chains: --x, not not x
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                line,
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&TokenType::LeftParen) {
                let line = self.previous().span.line;
                let arguments = self.argument_list()?;
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                    line,
                };
            } else if self.match_token(&TokenType::LeftBracket) {
                let line = self.previous().span.line;
                let index = self.expression()?;
                self.consume(&TokenType::RightBracket, "']' after index")?;
                expr = Expr {
                    kind: ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                };
            } else if self.match_token(&TokenType::Dot) {
                let line = self.previous().span.line;
                let property = self.property_name("property name")?;
                expr = Expr {
                    kind: ExprKind::PropertyAccess {
                        object: Box::new(expr),
                        property,
                    },
                    line,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    // Property and method names may be keywords (`box.get`, `task len()`).
    fn property_name(&mut self, expected: &str) -> Result<String, ParseError> {
        let token = self.peek();
        let word_like = !matches!(token.token_type, TokenType::Str(_))
            && token
                .lexeme
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_');
        if word_like {
            let name = token.lexeme.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_expected(expected))
        }
    }

    fn argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut arguments = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenType::RightParen, "')' after arguments")?;
        Ok(arguments)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let line = self.peek().span.line;

        if self.match_token(&TokenType::False) {
            return Ok(Expr {
                kind: ExprKind::Bool(false),
                line,
            });
        }
        if self.match_token(&TokenType::True) {
            return Ok(Expr {
                kind: ExprKind::Bool(true),
                line,
            });
        }
        if self.match_token(&TokenType::Nil) {
            return Ok(Expr {
                kind: ExprKind::Nil,
                line,
            });
        }
        if self.match_token(&TokenType::SelfKw) {
            return Ok(Expr {
                kind: ExprKind::SelfExpr,
                line,
            });
        }

        if let TokenType::Number(n) = &self.peek().token_type {
            let value = *n;
            self.advance();
            return Ok(Expr {
                kind: ExprKind::Num(value),
                line,
            });
        }
        if let TokenType::Str(s) = &self.peek().token_type {
            let value = s.clone();
            self.advance();
            return Ok(Expr {
                kind: ExprKind::Str(value),
                line,
            });
        }

        if self.check(&TokenType::Identifier) {
            // `new` is contextual: only `new Name(...)` builds an instance
            if self.peek().lexeme == "new"
                && self
                    .tokens
                    .get(self.current + 1)
                    .is_some_and(|t| t.token_type == TokenType::Identifier)
            {
                self.advance(); // new
                let class_name = self
                    .consume(&TokenType::Identifier, "model name after 'new'")?
                    .lexeme
                    .clone();
                self.consume(&TokenType::LeftParen, "'(' after model name")?;
                let arguments = self.argument_list()?;
                return Ok(Expr {
                    kind: ExprKind::New {
                        class_name,
                        arguments,
                    },
                    line,
                });
            }
            let name = self.advance().lexeme.clone();
            return Ok(Expr {
                kind: ExprKind::Identifier(name),
                line,
            });
        }

        // A bare `in` reads a line from standard input
        if self.match_token(&TokenType::In) {
            return Ok(Expr {
                kind: ExprKind::Call {
                    callee: Box::new(Expr {
                        kind: ExprKind::Identifier("__input__".to_string()),
                        line,
                    }),
                    arguments: Vec::new(),
                },
                line,
            });
        }

        if self.match_token(&TokenType::Pipe) {
            return self.lambda_expression();
        }

        if self.match_token(&TokenType::LeftBracket) {
            return self.array_literal(line);
        }

        if self.match_token(&TokenType::LeftBrace) {
            return self.dictionary_literal(line);
        }

        if self.match_token(&TokenType::LeftParen) {
            let expr = self.expression()?;
            self.consume(&TokenType::RightParen, "')' after expression")?;
            return Ok(expr);
        }

        Err(self.error_expected("expression"))
    }

    fn array_literal(&mut self, line: usize) -> Result<Expr, ParseError> {
        let mut elements = Vec::new();

        self.skip_newlines();
        if !self.check(&TokenType::RightBracket) {
            loop {
                self.skip_newlines();
                elements.push(self.expression()?);
                self.skip_newlines();
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
                self.skip_newlines();
            }
        }
        self.consume(&TokenType::RightBracket, "']' after array elements")?;

        Ok(Expr {
            kind: ExprKind::Array(elements),
            line,
        })
    }

    fn dictionary_literal(&mut self, line: usize) -> Result<Expr, ParseError> {
        let mut pairs = Vec::new();

        self.skip_newlines();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            let expr = self.expression()?;

            // `{x = 1}` arrives as an assignment; reuse its parts
            if let ExprKind::Assign {
                name,
                value,
                index: None,
                object: None,
            } = expr.kind
            {
                let key_line = expr.line;
                pairs.push((
                    Expr {
                        kind: ExprKind::Str(name),
                        line: key_line,
                    },
                    *value,
                ));
            } else {
                if !self.match_token(&TokenType::Assign) {
                    self.consume(&TokenType::Colon, "':' or '=' after dictionary key")?;
                }
                // `{x: 1}` means the string key "x"
                let key = match expr {
                    Expr {
                        kind: ExprKind::Identifier(name),
                        line,
                    } => Expr {
                        kind: ExprKind::Str(name),
                        line,
                    },
                    other => other,
                };
                let value = self.expression()?;
                pairs.push((key, value));
            }

            if !self.match_token(&TokenType::Comma) && !self.check(&TokenType::Newline) {
                break;
            }
            self.skip_newlines();
        }
        self.consume(&TokenType::RightBrace, "'}' after dictionary")?;

        Ok(Expr {
            kind: ExprKind::Dictionary(pairs),
            line,
        })
    }

    // |x, y| => expr  or  |x, y| { statements }
    fn lambda_expression(&mut self) -> Result<Expr, ParseError> {
        let line = self.previous().span.line;

        let mut params = Vec::new();
        if !self.check(&TokenType::Pipe) {
            loop {
                params.push(
                    self.consume(&TokenType::Identifier, "parameter name")?
                        .lexeme
                        .clone(),
                );
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenType::Pipe, "'|' after lambda parameters")?;

        self.skip_newlines();
        let body = if self.match_token(&TokenType::LeftBrace) {
            self.statement_block()?
        } else {
            // `=> expr` or a bare expression body becomes `give expr`
            self.match_token(&TokenType::Arrow);
            self.skip_newlines();
            let value = self.expression()?;
            let give_line = value.line;
            vec![Stmt {
                kind: StmtKind::Give(Some(value)),
                line: give_line,
            }]
        };

        Ok(Expr {
            kind: ExprKind::Lambda {
                params,
                body: Rc::new(body),
            },
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Result<Vec<Stmt>, Vec<ParseError>> {
        let result = Scanner::new(source).scan_tokens();
        assert!(result.errors.is_empty(), "scan errors: {:?}", result.errors);
        Parser::new(result.tokens).parse()
    }

    fn parse_ok(source: &str) -> Vec<Stmt> {
        parse(source).expect("parse failed")
    }

    #[test]
    fn first_statement_carries_first_nonblank_line() {
        let stmts = parse_ok("\n\n  out 1\n");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].line, 3);
    }

    #[test]
    fn simple_assignment_promotes_to_var_decl() {
        let stmts = parse_ok("x = 1");
        assert!(matches!(&stmts[0].kind, StmtKind::VarDecl { name, .. } if name == "x"));
    }

    #[test]
    fn indexed_assignment_stays_an_expression() {
        let stmts = parse_ok("xs[0] = 1");
        match &stmts[0].kind {
            StmtKind::Expr(e) => assert!(matches!(
                &e.kind,
                ExprKind::Assign {
                    index: Some(_),
                    object: Some(_),
                    ..
                }
            )),
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn property_assignment_becomes_set() {
        let stmts = parse_ok("p.name = \"ez\"");
        match &stmts[0].kind {
            StmtKind::Expr(e) => {
                assert!(matches!(&e.kind, ExprKind::Set { name, .. } if name == "name"))
            }
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn compound_assignment_desugars() {
        let stmts = parse_ok("x += 2");
        match &stmts[0].kind {
            StmtKind::VarDecl { initializer, .. } => assert!(matches!(
                &initializer.kind,
                ExprKind::Binary {
                    op: TokenType::Plus,
                    ..
                }
            )),
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn when_other_when_chain() {
        let stmts = parse_ok("when a { out 1 } other when b { out 2 } other { out 3 }");
        match &stmts[0].kind {
            StmtKind::When { else_branch, .. } => {
                let else_branch = else_branch.as_ref().expect("missing else");
                assert!(matches!(&else_branch.kind, StmtKind::When { .. }));
            }
            other => panic!("expected when, got {:?}", other),
        }
    }

    #[test]
    fn when_accepts_single_statement_body() {
        let stmts = parse_ok("when a out 1");
        match &stmts[0].kind {
            StmtKind::When { then_branch, .. } => {
                assert!(matches!(&then_branch.kind, StmtKind::Out(_)))
            }
            other => panic!("expected when, got {:?}", other),
        }
    }

    #[test]
    fn repeat_statement_shape() {
        let stmts = parse_ok("repeat i = 0 to 10 { out i }");
        assert!(matches!(
            &stmts[0].kind,
            StmtKind::Repeat { variable, .. } if variable == "i"
        ));
    }

    #[test]
    fn lambda_with_expression_body_wraps_in_give() {
        let stmts = parse_ok("f = |x| => x + 1");
        match &stmts[0].kind {
            StmtKind::VarDecl { initializer, .. } => match &initializer.kind {
                ExprKind::Lambda { params, body } => {
                    assert_eq!(params, &vec!["x".to_string()]);
                    assert_eq!(body.len(), 1);
                    assert!(matches!(&body[0].kind, StmtKind::Give(Some(_))));
                }
                other => panic!("expected lambda, got {:?}", other),
            },
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn lambda_with_statement_body() {
        let stmts = parse_ok("f = |a, b| { give a + b }");
        match &stmts[0].kind {
            StmtKind::VarDecl { initializer, .. } => {
                assert!(matches!(&initializer.kind, ExprKind::Lambda { params, .. } if params.len() == 2))
            }
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn dictionary_identifier_keys_become_strings() {
        let stmts = parse_ok("d = { a: 1, b = 2, \"c\": 3 }");
        match &stmts[0].kind {
            StmtKind::VarDecl { initializer, .. } => match &initializer.kind {
                ExprKind::Dictionary(pairs) => {
                    assert_eq!(pairs.len(), 3);
                    for (key, _) in pairs {
                        assert!(matches!(&key.kind, ExprKind::Str(_)));
                    }
                }
                other => panic!("expected dictionary, got {:?}", other),
            },
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn model_members_record_visibility() {
        let stmts = parse_ok(
            "model Box {\n  hidden value\n  init(v) { self.value = v }\n  task peek() { give self.value }\n}",
        );
        match &stmts[0].kind {
            StmtKind::Model {
                init_params,
                members,
                ..
            } => {
                assert_eq!(init_params, &vec!["v".to_string()]);
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].visibility, Visibility::Hidden);
                assert!(matches!(&members[0].kind, MemberKind::Property { .. }));
                assert_eq!(members[1].visibility, Visibility::Shown);
                assert!(matches!(&members[1].kind, MemberKind::Method { .. }));
            }
            other => panic!("expected model, got {:?}", other),
        }
    }

    #[test]
    fn struct_fields() {
        let stmts = parse_ok("struct Point { x, y }");
        assert!(matches!(
            &stmts[0].kind,
            StmtKind::Struct { fields, .. } if fields == &vec!["x".to_string(), "y".to_string()]
        ));
    }

    #[test]
    fn new_is_contextual() {
        let stmts = parse_ok("b = new Box(42)\nnew = 5");
        assert!(matches!(&stmts[0].kind, StmtKind::VarDecl { initializer, .. }
            if matches!(&initializer.kind, ExprKind::New { class_name, .. } if class_name == "Box")));
        // `new` alone is still a usable identifier
        assert!(matches!(&stmts[1].kind, StmtKind::VarDecl { name, .. } if name == "new"));
    }

    #[test]
    fn bare_in_reads_input() {
        let stmts = parse_ok("line = in");
        match &stmts[0].kind {
            StmtKind::VarDecl { initializer, .. } => match &initializer.kind {
                ExprKind::Call { callee, .. } => {
                    assert!(matches!(&callee.kind, ExprKind::Identifier(n) if n == "__input__"))
                }
                other => panic!("expected call, got {:?}", other),
            },
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn in_between_operands_is_membership() {
        let stmts = parse_ok("found = 2 in xs");
        match &stmts[0].kind {
            StmtKind::VarDecl { initializer, .. } => assert!(matches!(
                &initializer.kind,
                ExprKind::Binary {
                    op: TokenType::In,
                    ..
                }
            )),
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn newline_separates_call_from_parenthesized_expression() {
        let stmts = parse_ok("f\n(10)");
        assert_eq!(stmts.len(), 2);
        assert!(matches!(&stmts[0].kind, StmtKind::Expr(e) if matches!(&e.kind, ExprKind::Identifier(_))));
    }

    #[test]
    fn errors_are_collected_and_parsing_continues() {
        let errors = parse("out )\nx = 1\nout )").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn give_without_value() {
        let stmts = parse_ok("task f() { give }");
        match &stmts[0].kind {
            StmtKind::Task { body, .. } => {
                assert!(matches!(&body[0].kind, StmtKind::Give(None)))
            }
            other => panic!("expected task, got {:?}", other),
        }
    }
}
