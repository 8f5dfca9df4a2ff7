use std::collections::HashMap;

use super::ast::*;
use super::error::CompileError;
use super::lexer::{SpannedToken, Token};
use super::types::Type;

pub fn parse(tokens: Vec<SpannedToken>) -> Result<Definitions, CompileError> {
    let mut parser = Parser::new(tokens);
    parser.parse_definitions()
}

/// Value bound by `const NAME = ...;`, substituted at each use.
#[derive(Debug, Clone)]
enum Constant {
    Expr(Expr),
    Action(ActionRef),
}

/// Result of a primary parse before call syntax is applied.
enum Operand {
    Expr(Expr),
    Action(ActionRef, Span),
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    constants: HashMap<String, Constant>,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            constants: HashMap::new(),
        }
    }

    fn parse_definitions(&mut self) -> Result<Definitions, CompileError> {
        let mut definitions = Vec::new();

        while !self.at_eof() {
            match self.peek() {
                Token::Game | Token::Save => {
                    let var = self.parse_var_def(false)?;
                    definitions.push(Definition::Var(var));
                }
                Token::Func => {
                    let func = self.parse_func_def()?;
                    definitions.push(Definition::Func(func));
                }
                Token::Const => self.parse_const()?,
                other => {
                    return Err(CompileError::parser(
                        format!("Expected definition, got {}", other.describe()),
                        self.span(),
                    ))
                }
            }
        }

        Ok(Definitions { definitions })
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |t| &t.token)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .map_or(&Token::Eof, |t| &t.token)
    }

    fn span(&self) -> Span {
        self.tokens.get(self.pos).map_or(Span::new(0, 0), |t| t.span)
    }

    /// End offset of the last consumed token.
    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.span.end)
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> Option<&SpannedToken> {
        let tok = self.tokens.get(self.pos);
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, what: &str) -> CompileError {
        CompileError::parser(
            format!("Expected {what}, got {}", self.peek().describe()),
            self.span(),
        )
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<Span, CompileError> {
        if self.peek() == expected {
            let sp = self.span();
            self.advance();
            Ok(sp)
        } else {
            Err(self.error_here(what))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), CompileError> {
        if let Token::Ident(name) = self.peek().clone() {
            let sp = self.span();
            self.advance();
            Ok((name, sp))
        } else {
            Err(self.error_here(what))
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String, CompileError> {
        if let Token::String(s) = self.peek().clone() {
            self.advance();
            Ok(s)
        } else {
            Err(self.error_here(what))
        }
    }

    /// A plain identifier or a `$"quoted name"`.
    fn expect_var_name(&mut self) -> Result<String, CompileError> {
        match self.peek().clone() {
            Token::Ident(name) | Token::VarName(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here("variable name")),
        }
    }

    fn expect_signed_number(&mut self, what: &str) -> Result<f64, CompileError> {
        let negative = self.eat(&Token::Minus);
        if let Token::Number(n) = *self.peek() {
            self.advance();
            Ok(if negative { -n } else { n })
        } else {
            Err(self.error_here(what))
        }
    }

    // ── Types ─────────────────────────────────────────────────────

    fn parse_type(&mut self) -> Result<Type, CompileError> {
        let Token::Type(name) = *self.peek() else {
            return Err(self.error_here("type"));
        };
        self.advance();

        let mut params = Vec::new();
        if self.eat(&Token::Lt) {
            loop {
                params.push(self.parse_type()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::Gt, "'>' to close type parameters")?;
        }
        Ok(Type::new(name, params))
    }

    // ── Definitions ───────────────────────────────────────────────

    /// `game|save|var|local NAME: type [= expr];`
    fn parse_var_def(&mut self, allow_value: bool) -> Result<VarDef, CompileError> {
        let start = self.span();
        let scope = match self.peek() {
            Token::Game => ScopeKind::Game,
            Token::Save => ScopeKind::Save,
            Token::Var => ScopeKind::Var,
            Token::Local => ScopeKind::Local,
            _ => return Err(self.error_here("variable definition")),
        };
        self.advance();

        let name = self.expect_var_name()?;
        self.expect(&Token::Colon, "':' before variable type")?;
        let ty = self.parse_type()?;
        let value = if allow_value && self.eat(&Token::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(&Token::Semicolon, "';' after variable definition")?;

        Ok(VarDef {
            scope,
            name,
            ty,
            value,
            span: Span::new(start.start, self.prev_end()),
        })
    }

    fn parse_const(&mut self) -> Result<(), CompileError> {
        self.expect(&Token::Const, "'const'")?;
        let (name, _) = self.expect_ident("constant name")?;
        self.expect(&Token::Eq, "'='")?;

        let constant = if matches!(self.peek(), Token::Target(_) | Token::Codeblock) {
            let start = self.span();
            let action = self.parse_action_ref()?;
            if matches!(self.peek(), Token::LParen) {
                let args = self.parse_args()?;
                Constant::Expr(Expr {
                    kind: ExprKind::Action { action, args },
                    span: Span::new(start.start, self.prev_end()),
                })
            } else {
                Constant::Action(action)
            }
        } else {
            Constant::Expr(self.parse_expr()?)
        };
        self.expect(&Token::Semicolon, "';' after constant")?;

        self.constants.insert(name, constant);
        Ok(())
    }

    fn parse_func_def(&mut self) -> Result<FuncDef, CompileError> {
        self.expect(&Token::Func, "'func'")?;
        let (name, span) = self.expect_ident("function name")?;
        self.expect(&Token::LParen, "'(' after function name")?;

        let mut params = Vec::new();
        while !matches!(self.peek(), Token::RParen) {
            let output = self.eat(&Token::Out);
            let (param_name, _) = self.expect_ident("parameter name")?;
            self.expect(&Token::Colon, "':' before parameter type")?;
            let ty = self.parse_type()?;
            let plural = self.eat(&Token::Ellipsis);
            let optional = self.eat(&Token::Question);
            let description = match self.peek().clone() {
                Token::String(s) => {
                    self.advance();
                    Some(s)
                }
                _ => None,
            };
            params.push(FuncParam {
                name: param_name,
                ty,
                optional,
                plural,
                output,
                description,
            });

            if !matches!(self.peek(), Token::RParen) {
                self.expect(&Token::Comma, "',' or ')' after parameter")?;
            }
        }
        self.expect(&Token::RParen, "')'")?;

        // External declaration: `func name(...);`
        if self.eat(&Token::Semicolon) {
            return Ok(FuncDef {
                name,
                params,
                body: None,
                span,
            });
        }

        self.expect(&Token::LBrace, "'{' to start function body")?;
        let mut body = Vec::new();
        while !matches!(self.peek(), Token::RBrace) {
            if self.at_eof() {
                return Err(self.error_here("'}' to close function body"));
            }
            body.push(self.parse_stmt()?);
        }
        self.expect(&Token::RBrace, "'}' to close function body")?;

        Ok(FuncDef {
            name,
            params,
            body: Some(body),
            span,
        })
    }

    // ── Statements ────────────────────────────────────────────────

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        if matches!(
            self.peek(),
            Token::Var | Token::Local | Token::Game | Token::Save
        ) {
            return Ok(Stmt::Var(self.parse_var_def(true)?));
        }

        let start = self.span();
        let expr = self.parse_expr()?;
        if !expr.kind.is_statement() {
            return Err(CompileError::parser(
                "Expected statement, got expression",
                start,
            ));
        }
        self.expect(&Token::Semicolon, "';' after statement")?;
        Ok(Stmt::Expr(expr))
    }

    // ── Expression parsing (precedence climbing) ──────────────────

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_binary(0)?;

        if !matches!(self.peek(), Token::Eq) {
            return Ok(left);
        }
        let eq_span = self.span();
        self.advance();
        let value = Box::new(self.parse_expr()?);
        let span = left.span.merge(value.span);

        match left.kind {
            ExprKind::Variable(name) => Ok(Expr {
                kind: ExprKind::Assign { name, value },
                span,
            }),
            ExprKind::Index { object, index } => Ok(Expr {
                kind: ExprKind::SetIndex {
                    object,
                    index,
                    value,
                },
                span,
            }),
            _ => Err(CompileError::parser("Invalid assignment target", eq_span)),
        }
    }

    /// Binding power and associativity of a binary operator token.
    fn binary_op(token: &Token) -> Option<(BinOp, u8, bool)> {
        match token {
            Token::Plus => Some((BinOp::Add, 10, true)),
            Token::Minus => Some((BinOp::Sub, 10, true)),
            Token::Star => Some((BinOp::Mul, 20, true)),
            Token::Slash => Some((BinOp::Div, 20, true)),
            Token::Caret => Some((BinOp::Pow, 30, false)),
            _ => None,
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, CompileError> {
        let mut left = self.parse_postfix()?;

        while let Some((op, prec, left_assoc)) = Self::binary_op(self.peek()) {
            if prec < min_prec {
                break;
            }
            let op_span = self.span();
            self.advance();
            let next_min = if left_assoc { prec + 1 } else { prec };
            let right = self.parse_binary(next_min)?;
            let span = left.span.merge(right.span);
            left = Expr {
                kind: ExprKind::Binary {
                    op,
                    op_span,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            };
        }

        Ok(left)
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = match self.parse_primary()? {
            Operand::Action(action, span) => {
                // A bare reference performs the action with no arguments.
                let args = if matches!(self.peek(), Token::LParen) {
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                Expr {
                    kind: ExprKind::Action { action, args },
                    span: Span::new(span.start, self.prev_end()),
                }
            }
            Operand::Expr(expr) => match expr.kind {
                ExprKind::Variable(name) if matches!(self.peek(), Token::LParen) => {
                    let args = self.parse_args()?;
                    Expr {
                        kind: ExprKind::Call { name, args },
                        span: Span::new(expr.span.start, self.prev_end()),
                    }
                }
                kind => Expr {
                    kind,
                    span: expr.span,
                },
            },
        };

        loop {
            if self.eat(&Token::LBracket) {
                let index = self.parse_expr()?;
                self.expect(&Token::RBracket, "']' after index")?;
                expr = Expr {
                    span: Span::new(expr.span.start, self.prev_end()),
                    kind: ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if matches!(self.peek(), Token::Dot) {
                self.advance();
                let (key, key_span) = self.expect_ident("key name after '.'")?;
                expr = Expr {
                    span: Span::new(expr.span.start, key_span.end),
                    kind: ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(Expr {
                            kind: ExprKind::Str(key),
                            span: key_span,
                        }),
                    },
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect(&Token::LParen, "'('")?;
        let mut args = Vec::new();
        while !matches!(self.peek(), Token::RParen) {
            args.push(self.parse_expr()?);
            if !matches!(self.peek(), Token::RParen) {
                self.expect(&Token::Comma, "',' after argument")?;
            }
        }
        self.expect(&Token::RParen, "')' after arguments")?;
        Ok(args)
    }

    /// `[@target] codeblock "action" <"category">`
    fn parse_action_ref(&mut self) -> Result<ActionRef, CompileError> {
        let target = match *self.peek() {
            Token::Target(t) => {
                self.advance();
                Some(t)
            }
            _ => None,
        };
        self.expect(&Token::Codeblock, "'codeblock'")?;
        let action = self.expect_string("codeblock action (as string)")?;
        self.expect(&Token::Lt, "'<'")?;
        let category = self.expect_string("codeblock category (as string)")?;
        self.expect(&Token::Gt, "'>'")?;
        Ok(ActionRef {
            action,
            category,
            target,
        })
    }

    fn substitute(&self, name: &str, target: Option<Target>, span: Span) -> Option<Operand> {
        match self.constants.get(name)? {
            Constant::Expr(expr) => Some(Operand::Expr(Expr {
                kind: expr.kind.clone(),
                span,
            })),
            Constant::Action(action) => Some(Operand::Action(
                ActionRef {
                    target: target.or(action.target),
                    ..action.clone()
                },
                span,
            )),
        }
    }

    fn parse_primary(&mut self) -> Result<Operand, CompileError> {
        let start = self.span();

        if let Token::Target(target) = *self.peek() {
            match self.peek_at(1).clone() {
                Token::Codeblock => {}
                Token::Ident(name) | Token::VarName(name) => {
                    if let Some(Constant::Action(_)) = self.constants.get(&name) {
                        self.advance();
                        self.advance();
                        let span = Span::new(start.start, self.prev_end());
                        return self
                            .substitute(&name, Some(target), span)
                            .ok_or_else(|| self.error_here("action constant"));
                    }
                    self.advance();
                    return Err(self.error_here("codeblock after target"));
                }
                _ => {
                    self.advance();
                    return Err(self.error_here("codeblock after target"));
                }
            }
        }

        if matches!(self.peek(), Token::Target(_) | Token::Codeblock) {
            let action = self.parse_action_ref()?;
            return Ok(Operand::Action(
                action,
                Span::new(start.start, self.prev_end()),
            ));
        }

        let expr = |kind: ExprKind, end: usize| -> Result<Operand, CompileError> {
            Ok(Operand::Expr(Expr {
                kind,
                span: Span::new(start.start, end),
            }))
        };

        match self.peek().clone() {
            Token::Ident(name) | Token::VarName(name) => {
                self.advance();
                if let Some(operand) = self.substitute(&name, None, start) {
                    return Ok(operand);
                }
                expr(ExprKind::Variable(name), start.end)
            }
            Token::Number(_) | Token::Minus => {
                let n = self.expect_signed_number("expression")?;
                expr(ExprKind::Number(n), self.prev_end())
            }
            Token::String(s) => {
                self.advance();
                expr(ExprKind::Str(s), start.end)
            }
            Token::StyledText(s) => {
                self.advance();
                expr(ExprKind::StyledText(s), start.end)
            }
            Token::Lt => {
                self.advance();
                let x = self.expect_signed_number("x component of vector")?;
                self.expect(&Token::Comma, "','")?;
                let y = self.expect_signed_number("y component of vector")?;
                self.expect(&Token::Comma, "','")?;
                let z = self.expect_signed_number("z component of vector")?;
                self.expect(&Token::Gt, "'>' after vector components")?;
                expr(ExprKind::Vector { x, y, z }, self.prev_end())
            }
            Token::LParen => {
                self.advance();
                if matches!(self.peek(), Token::Type(_)) {
                    let ty = self.parse_type()?;
                    self.expect(&Token::RParen, "')' after cast type")?;
                    let value = self.parse_binary(0)?;
                    let end = value.span.end;
                    return expr(
                        ExprKind::Cast {
                            ty,
                            value: Box::new(value),
                        },
                        end,
                    );
                }
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "')' after expression")?;
                Ok(Operand::Expr(inner))
            }
            Token::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                if !matches!(self.peek(), Token::RBrace) {
                    loop {
                        let key = self.expect_string("dictionary key (string)")?;
                        self.expect(&Token::Colon, "':' after dictionary key")?;
                        let value = self.parse_expr()?;
                        entries.push((key, value));
                        if matches!(self.peek(), Token::RBrace) {
                            break;
                        }
                        self.expect(&Token::Comma, "',' after dictionary entry")?;
                    }
                }
                self.expect(&Token::RBrace, "'}' after dictionary")?;
                expr(ExprKind::Dict(entries), self.prev_end())
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !matches!(self.peek(), Token::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if matches!(self.peek(), Token::RBracket) {
                            break;
                        }
                        self.expect(&Token::Comma, "',' after list value")?;
                    }
                }
                self.expect(&Token::RBracket, "']' after list")?;
                expr(ExprKind::List(items), self.prev_end())
            }
            _ => Err(self.error_here("expression")),
        }
    }
}
