//! Recursive-descent parser for Nexa.
//!
//! Statements are parsed by keyword dispatch; expressions use precedence
//! climbing. The first error aborts the parse.

use crate::ast::{BinaryOp, Expr, ExprKind, Ident, Program, ShapeFamily, Stmt, StmtKind, UnaryOp};
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, lex};
use crate::span::Span;
use crate::types::Type;

/// Lex and parse a whole source file.
pub fn parse(input: &str) -> Result<Program, CoreError> {
    parse_program(lex(input))
}

/// Parse a token stream produced by [`lex`].
#[tracing::instrument(level = "debug", skip_all, fields(tokens = tokens.len()))]
pub fn parse_program(tokens: Vec<Token>) -> Result<Program, CoreError> {
    let mut parser = Parser::new(tokens);
    let mut statements = Vec::new();
    while !parser.at(TokenKind::Eof) {
        statements.push(parser.parse_statement()?);
    }
    tracing::debug!(statements = statements.len(), "parsed program");
    Ok(Program { statements })
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|token| token.kind != TokenKind::Eof) {
            let span = tokens.last().map(|token| token.span).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                span: Span::new(span.end, span.end, span.line, span.column),
            });
        }
        Parser {
            tokens,
            position: 0,
        }
    }

    // -----------------------------------------------------------------
    // Cursor helpers
    // -----------------------------------------------------------------

    fn peek(&self) -> &Token {
        // The stream always ends with Eof and we never advance past it.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CoreError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    /// Like [`expect`](Self::expect) for a brace, but also accepts the
    /// doubled form and consumes only its first half.
    fn expect_brace(&mut self, single: TokenKind, double: TokenKind) -> Result<Token, CoreError> {
        if self.at(double) {
            return Ok(self.split_double(single));
        }
        self.expect(single)
    }

    /// Split the current doubled token in two, returning the first half
    /// and leaving the second half as the current token.
    fn split_double(&mut self, single: TokenKind) -> Token {
        let index = self.position;
        let token = &mut self.tokens[index];
        let half: String = token.lexeme.chars().take(1).collect();
        let span = token.span;
        let first = Token {
            kind: single,
            lexeme: half.clone(),
            span: Span::new(span.start, span.start + 1, span.line, span.column),
        };
        token.kind = single;
        token.lexeme = half;
        token.span = Span::new(span.start + 1, span.end, span.line, span.column + 1);
        first
    }

    fn expect_ident(&mut self) -> Result<Ident, CoreError> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(Ident {
            name: token.lexeme,
            span: token.span,
        })
    }

    fn unexpected(&self, expected: &str) -> CoreError {
        let token = self.peek();
        if token.kind == TokenKind::Invalid {
            return CoreError::ParseError(invalid_token(token));
        }
        let found = match token.kind {
            TokenKind::Eof => "end of input".to_string(),
            kind => format!("{kind} `{}`", token.lexeme),
        };
        CoreError::ParseError(
            Diagnostic::error(format!("expected {expected}, found {found}"), token.span)
                .with_code("E0002"),
        )
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Stmt, CoreError> {
        let kind = self.peek().kind;
        if let Some(ty) = type_keyword(kind) {
            return self.parse_var_decl(ty);
        }
        if let Some(family) = ShapeFamily::from_open(kind) {
            return self.parse_shaped_decl(family);
        }
        match kind {
            TokenKind::Print => self.parse_print(),
            TokenKind::Loop => self.parse_loop(),
            TokenKind::Ident => self.parse_assign(),
            _ => Err(self.unexpected("a statement")),
        }
    }

    fn parse_var_decl(&mut self, ty: Type) -> Result<Stmt, CoreError> {
        let start = self.advance().span;
        let name = self.expect_ident()?;
        self.expect(TokenKind::Equal)?;
        let init = self.parse_expression()?;
        let end = self.expect(TokenKind::Semi)?.span;
        Ok(Stmt {
            kind: StmtKind::VarDecl { ty, name, init },
            span: start.to(end),
        })
    }

    fn parse_shaped_decl(&mut self, family: ShapeFamily) -> Result<Stmt, CoreError> {
        let start = self.advance().span;
        let name = self.expect_ident()?;
        self.expect(family.close())?;

        let mut inits = Vec::new();
        if self.eat(TokenKind::Equal) {
            inits.push(self.parse_expression()?);
            while self.eat(TokenKind::Comma) {
                inits.push(self.parse_expression()?);
            }
        }
        let end = self.expect(TokenKind::Semi)?.span;
        Ok(Stmt {
            kind: StmtKind::ShapedDecl {
                family,
                name,
                inits,
                resolved: None,
            },
            span: start.to(end),
        })
    }

    fn parse_print(&mut self) -> Result<Stmt, CoreError> {
        let start = self.advance().span;
        self.expect(TokenKind::LParen)?;
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let end = self.expect(TokenKind::Semi)?.span;
        Ok(Stmt {
            kind: StmtKind::Print(expr),
            span: start.to(end),
        })
    }

    fn parse_assign(&mut self) -> Result<Stmt, CoreError> {
        let target = self.expect_ident()?;
        self.expect(TokenKind::Equal)?;
        let value = self.parse_expression()?;
        let end = self.expect(TokenKind::Semi)?.span;
        Ok(Stmt {
            span: target.span.to(end),
            kind: StmtKind::Assign { target, value },
        })
    }

    fn parse_loop(&mut self) -> Result<Stmt, CoreError> {
        let start = self.advance().span;
        self.expect(TokenKind::LParen)?;
        let iterator = self.expect_ident()?;
        self.expect(TokenKind::Comma)?;
        let count = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        self.expect_brace(TokenKind::LBrace, TokenKind::DoubleLBrace)?;

        let mut body = Vec::new();
        while !matches!(
            self.peek().kind,
            TokenKind::RBrace | TokenKind::DoubleRBrace | TokenKind::Eof
        ) {
            body.push(self.parse_statement()?);
        }
        let end = self
            .expect_brace(TokenKind::RBrace, TokenKind::DoubleRBrace)?
            .span;
        Ok(Stmt {
            kind: StmtKind::Loop {
                iterator,
                count,
                body,
            },
            span: start.to(end),
        })
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expr, CoreError> {
        self.parse_binary(0)
    }

    /// Precedence climbing; every operator is left-associative.
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, CoreError> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, precedence)) = binary_operator(self.peek().kind) {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(precedence + 1)?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CoreError> {
        if !self.at(TokenKind::Minus) {
            return self.parse_primary();
        }
        let minus = self.advance();
        if self.at(TokenKind::IntLiteral) {
            // `-123` is a single literal, not a negation node.
            let literal = self.advance();
            let value = parse_int(&format!("-{}", literal.lexeme), literal.span)?;
            return Ok(Expr::new(ExprKind::Int(value), minus.span.to(literal.span)));
        }
        let operand = self.parse_unary()?;
        let span = minus.span.to(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_primary(&mut self) -> Result<Expr, CoreError> {
        let kind = self.peek().kind;
        if let Some(family) = ShapeFamily::from_open(kind) {
            return self.parse_shaped_ref(family);
        }

        match kind {
            TokenKind::IntLiteral => {
                let token = self.advance();
                let value = parse_int(&token.lexeme, token.span)?;
                Ok(Expr::new(ExprKind::Int(value), token.span))
            }
            TokenKind::FloatLiteral => {
                let token = self.advance();
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    CoreError::ParseError(
                        Diagnostic::error(
                            format!("invalid float literal `{}`", token.lexeme),
                            token.span,
                        )
                        .with_code("E0003"),
                    )
                })?;
                Ok(Expr::new(ExprKind::Float(value), token.span))
            }
            TokenKind::StringLiteral => {
                let token = self.advance();
                Ok(Expr::new(ExprKind::Str(token.lexeme), token.span))
            }
            TokenKind::CharLiteral => {
                let token = self.advance();
                let byte = token.lexeme.bytes().next().unwrap_or_default();
                Ok(Expr::new(ExprKind::Char(byte), token.span))
            }
            TokenKind::BoolLiteral => {
                let token = self.advance();
                Ok(Expr::new(ExprKind::Bool(token.lexeme == "true"), token.span))
            }
            TokenKind::Ident => self.parse_ident_expr(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Identifier with optional postfix call or index.
    fn parse_ident_expr(&mut self) -> Result<Expr, CoreError> {
        let ident = self.expect_ident()?;

        if self.eat(TokenKind::LParen) {
            let mut args = Vec::new();
            if !self.at(TokenKind::RParen) {
                args.push(self.parse_expression()?);
                while self.eat(TokenKind::Comma) {
                    args.push(self.parse_expression()?);
                }
            }
            let end = self.expect(TokenKind::RParen)?.span;
            let span = ident.span.to(end);
            return Ok(Expr::new(ExprKind::Call { callee: ident, args }, span));
        }

        if self.eat(TokenKind::LBracket) {
            let index = self.parse_expression()?;
            let end = self.expect(TokenKind::RBracket)?.span;
            let span = ident.span.to(end);
            let base = Expr::new(ExprKind::Var(ident.name), ident.span);
            return Ok(Expr::new(
                ExprKind::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                },
                span,
            ));
        }

        Ok(Expr::new(ExprKind::Var(ident.name), ident.span))
    }

    fn parse_array_literal(&mut self) -> Result<Expr, CoreError> {
        let start = self.advance().span;
        let mut elements = vec![self.parse_expression()?];
        while self.eat(TokenKind::Comma) {
            elements.push(self.parse_expression()?);
        }
        let end = self.expect(TokenKind::RBracket)?.span;
        Ok(Expr::new(ExprKind::ArrayLit(elements), start.to(end)))
    }

    /// `<a>` optionally followed by `.<b>`.
    fn parse_shaped_ref(&mut self, family: ShapeFamily) -> Result<Expr, CoreError> {
        let lhs = self.parse_shaped_var(family)?;
        if !self.at(TokenKind::Dot) {
            return Ok(lhs);
        }
        self.advance();

        let next = self.peek();
        match ShapeFamily::from_open(next.kind) {
            Some(other) if other == family => {}
            Some(_) => {
                return Err(CoreError::ParseError(
                    Diagnostic::error(
                        format!(
                            "dot product operands must use the same brackets: expected {}, found {}",
                            family.open().describe(),
                            next.kind
                        ),
                        next.span,
                    )
                    .with_code("E0004"),
                ));
            }
            None => return Err(self.unexpected(family.open().describe())),
        }

        let rhs = self.parse_shaped_var(family)?;
        let span = lhs.span.to(rhs.span);
        Ok(Expr::new(
            ExprKind::Dot {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        ))
    }

    fn parse_shaped_var(&mut self, family: ShapeFamily) -> Result<Expr, CoreError> {
        let start = self.advance().span;
        let name = self.expect_ident()?;
        let end = self.expect(family.close())?.span;
        Ok(Expr::new(
            ExprKind::ShapedVar {
                family,
                name: name.name,
            },
            start.to(end),
        ))
    }
}

fn type_keyword(kind: TokenKind) -> Option<Type> {
    match kind {
        TokenKind::Int => Some(Type::INT32),
        TokenKind::Long => Some(Type::INT64),
        TokenKind::Float => Some(Type::FLOAT32),
        TokenKind::Double => Some(Type::FLOAT64),
        TokenKind::Char => Some(Type::CHAR),
        TokenKind::String => Some(Type::STRING),
        TokenKind::Bool => Some(Type::BOOL),
        _ => None,
    }
}

fn binary_operator(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    match kind {
        TokenKind::Plus => Some((BinaryOp::Add, 1)),
        TokenKind::Minus => Some((BinaryOp::Sub, 1)),
        TokenKind::Star => Some((BinaryOp::Mul, 2)),
        TokenKind::Slash => Some((BinaryOp::Div, 2)),
        _ => None,
    }
}

fn parse_int(text: &str, span: Span) -> Result<i64, CoreError> {
    text.parse::<i64>().map_err(|_| {
        CoreError::ParseError(
            Diagnostic::error(format!("integer literal `{text}` is out of range"), span)
                .with_code("E0003"),
        )
    })
}

fn invalid_token(token: &Token) -> Diagnostic {
    let message = if token.lexeme.starts_with('"') {
        "unterminated string literal".to_string()
    } else if token.lexeme.starts_with('\'') {
        format!(
            "char literal must hold exactly one character: {}",
            token.lexeme
        )
    } else {
        format!("unexpected character `{}`", token.lexeme)
    };
    Diagnostic::error(message, token.span).with_code("E0001")
}
