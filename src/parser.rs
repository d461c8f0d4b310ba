//! Hand-written recursive-descent / precedence-climbing parser consuming the
//! `lexer` token stream. The teacher's `parser.rs` parses S-expressions
//! directly with `nom` since Lisp's grammar has no operator precedence to
//! climb; Sona's infix expression grammar (precedence climbing, chained
//! comparisons, f-strings, statement blocks) is naturally a hand-rolled
//! descent parser instead, with `nom` kept at the tokenizing layer.

use crate::ast::*;
use crate::error::SonaError;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::span::Span;
use std::rc::Rc;

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, SonaError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut stmts = Vec::new();
    while !parser.is_at_end() {
        stmts.push(parser.parse_stmt()?);
    }
    Ok(stmts)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, SonaError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(SonaError::ParseError {
                message: format!("expected {}, found {:?}", what, self.peek_kind()),
                span: self.peek().span,
            })
        }
    }

    /// True at a `;`, the natural end of a block (`}`/EOF), or a newline
    /// between the last consumed token and whatever comes next — spec §4.1:
    /// "Statements terminated by newline or optional `;`". The lexer
    /// discards newlines as trivia rather than emitting tokens for them, so
    /// this compares line numbers instead of checking for a token kind.
    fn at_stmt_boundary(&self) -> bool {
        if self.check(&TokenKind::Semicolon) || self.check(&TokenKind::RBrace) || self.is_at_end() {
            return true;
        }
        let prev_line = self.tokens[self.pos.saturating_sub(1)].span.line;
        self.peek().span.line > prev_line
    }

    fn expect_stmt_end(&mut self) -> Result<(), SonaError> {
        if self.matches(&TokenKind::Semicolon) {
            return Ok(());
        }
        if self.at_stmt_boundary() {
            return Ok(());
        }
        Err(SonaError::ParseError {
            message: format!("expected ';' or newline, found {:?}", self.peek_kind()),
            span: self.peek().span,
        })
    }

    fn expect_ident(&mut self) -> Result<(String, Span), SonaError> {
        let tok = self.peek().clone();
        if let TokenKind::Ident(name) = tok.kind {
            self.advance();
            Ok((name, tok.span))
        } else {
            Err(SonaError::ParseError {
                message: format!("expected identifier, found {:?}", tok.kind),
                span: tok.span,
            })
        }
    }

    // ---------------------------------------------------------------- stmts

    fn parse_block(&mut self) -> Result<Vec<Stmt>, SonaError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    /// Parses `(a, b, c = 1)`, evaluating each default expression eagerly at
    /// definition time belongs to the caller (spec §4.1): here we only parse
    /// the default's expression, unevaluated.
    fn parse_params(&mut self) -> Result<Vec<Param>, SonaError> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let (name, _) = self.expect_ident()?;
                let default = if self.matches(&TokenKind::Eq) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                params.push(Param { name, default });
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(params)
    }

    fn split_docstring(body: &mut Vec<Stmt>) -> Option<String> {
        if let Some(first) = body.first() {
            if let StmtKind::Expr(Expr {
                kind: ExprKind::Str(s),
                ..
            }) = &first.kind
            {
                let doc = s.to_string();
                body.remove(0);
                return Some(doc);
            }
        }
        None
    }

    fn parse_stmt(&mut self) -> Result<Stmt, SonaError> {
        let start_span = self.peek().span;
        match self.peek_kind().clone() {
            TokenKind::Let => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::Eq, "'='")?;
                let value = self.parse_expr()?;
                self.expect_stmt_end()?;
                Ok(Stmt {
                    kind: StmtKind::Let(name, value),
                    span: start_span,
                })
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::While { cond, body },
                    span: start_span,
                })
            }
            TokenKind::For => {
                self.advance();
                let (var, _) = self.expect_ident()?;
                self.expect(&TokenKind::In, "'in'")?;
                let iter = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::For { var, iter, body },
                    span: start_span,
                })
            }
            TokenKind::Repeat => {
                self.advance();
                let count = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::Repeat { count, body },
                    span: start_span,
                })
            }
            TokenKind::Break => {
                self.advance();
                self.expect_stmt_end()?;
                Ok(Stmt {
                    kind: StmtKind::Break,
                    span: start_span,
                })
            }
            TokenKind::Continue => {
                self.advance();
                self.expect_stmt_end()?;
                Ok(Stmt {
                    kind: StmtKind::Continue,
                    span: start_span,
                })
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at_stmt_boundary() {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_stmt_end()?;
                Ok(Stmt {
                    kind: StmtKind::Return(value),
                    span: start_span,
                })
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect_stmt_end()?;
                Ok(Stmt {
                    kind: StmtKind::Throw(value),
                    span: start_span,
                })
            }
            TokenKind::Function => self.parse_function_def(start_span),
            TokenKind::Class => self.parse_class_def(start_span),
            TokenKind::Import | TokenKind::From => self.parse_import(start_span),
            TokenKind::Try => self.parse_try(start_span),
            TokenKind::Delete => {
                self.advance();
                let target_expr = self.parse_expr()?;
                let target =
                    Self::expr_to_assign_target(target_expr).ok_or_else(|| SonaError::ParseError {
                        message: "invalid delete target".to_string(),
                        span: start_span,
                    })?;
                self.expect_stmt_end()?;
                Ok(Stmt {
                    kind: StmtKind::Delete(target),
                    span: start_span,
                })
            }
            _ => self.parse_expr_or_assign_stmt(start_span),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, SonaError> {
        let span = self.peek().span;
        self.advance();
        let mut branches = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        branches.push((cond, body));

        let mut else_branch = None;
        loop {
            if self.matches(&TokenKind::Elif) {
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                branches.push((cond, body));
            } else if self.matches(&TokenKind::Else) {
                if self.check(&TokenKind::If) {
                    self.advance();
                    let cond = self.parse_expr()?;
                    let body = self.parse_block()?;
                    branches.push((cond, body));
                } else {
                    else_branch = Some(self.parse_block()?);
                    break;
                }
            } else {
                break;
            }
        }

        Ok(Stmt {
            kind: StmtKind::If {
                branches,
                else_branch,
            },
            span,
        })
    }

    fn parse_function_def(&mut self, span: Span) -> Result<Stmt, SonaError> {
        self.advance();
        let (name, _) = self.expect_ident()?;
        let params = self.parse_params()?;
        let mut body = self.parse_block()?;
        let docstring = Self::split_docstring(&mut body);
        Ok(Stmt {
            kind: StmtKind::FunctionDef {
                name,
                params,
                body: Rc::new(body),
                docstring,
            },
            span,
        })
    }

    fn parse_class_def(&mut self, span: Span) -> Result<Stmt, SonaError> {
        self.advance();
        let (name, _) = self.expect_ident()?;
        let parent = if self.matches(&TokenKind::Extends) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            self.expect(&TokenKind::Function, "method definition")?;
            let (mname, _) = self.expect_ident()?;
            let params = self.parse_params()?;
            let mut body = self.parse_block()?;
            let docstring = Self::split_docstring(&mut body);
            methods.push(ClassMethod {
                name: mname,
                params,
                body: Rc::new(body),
                docstring,
            });
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Stmt {
            kind: StmtKind::ClassDef {
                name,
                parent,
                methods,
            },
            span,
        })
    }

    fn parse_import(&mut self, span: Span) -> Result<Stmt, SonaError> {
        if self.matches(&TokenKind::From) {
            let (module, _) = self.expect_ident()?;
            self.expect(&TokenKind::Import, "'import'")?;
            let kind = if matches!(self.peek_kind(), TokenKind::Star) {
                self.advance();
                ImportKind::Wildcard(module)
            } else {
                let mut names = Vec::new();
                loop {
                    let (n, _) = self.expect_ident()?;
                    names.push(n);
                    if !self.matches(&TokenKind::Comma) {
                        break;
                    }
                }
                ImportKind::Names(module, names)
            };
            self.expect_stmt_end()?;
            Ok(Stmt {
                kind: StmtKind::Import(kind),
                span,
            })
        } else {
            self.advance();
            let (mut module, _) = self.expect_ident()?;
            while self.matches(&TokenKind::Dot) {
                let (segment, _) = self.expect_ident()?;
                module.push('.');
                module.push_str(&segment);
            }
            let kind = if self.matches(&TokenKind::As) {
                let (alias, _) = self.expect_ident()?;
                ImportKind::ModuleAs(module, alias)
            } else {
                ImportKind::Module(module)
            };
            self.expect_stmt_end()?;
            Ok(Stmt {
                kind: StmtKind::Import(kind),
                span,
            })
        }
    }

    fn parse_try(&mut self, span: Span) -> Result<Stmt, SonaError> {
        self.advance();
        let try_block = self.parse_block()?;
        let catch = if self.matches(&TokenKind::Catch) {
            let binding = if self.matches(&TokenKind::LParen) {
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Some(name)
            } else {
                None
            };
            Some((binding, self.parse_block()?))
        } else {
            None
        };
        let finally = if self.matches(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::TryCatchFinally {
                try_block,
                catch,
                finally,
            },
            span,
        })
    }

    fn expr_to_assign_target(expr: Expr) -> Option<AssignTarget> {
        match expr.kind {
            ExprKind::Ident(name) => Some(AssignTarget::Ident(name)),
            ExprKind::Index(target, index) => Some(AssignTarget::Index(target, index)),
            ExprKind::Get(target, name) => Some(AssignTarget::Attr(target, name)),
            _ => None,
        }
    }

    fn parse_expr_or_assign_stmt(&mut self, span: Span) -> Result<Stmt, SonaError> {
        let expr = self.parse_expr()?;
        if self.matches(&TokenKind::Eq) {
            let target = Self::expr_to_assign_target(expr).ok_or_else(|| SonaError::ParseError {
                message: "invalid assignment target".to_string(),
                span,
            })?;
            let value = self.parse_expr()?;
            self.expect_stmt_end()?;
            Ok(Stmt {
                kind: StmtKind::Assign(target, value),
                span,
            })
        } else {
            self.expect_stmt_end()?;
            Ok(Stmt {
                kind: StmtKind::Expr(expr),
                span,
            })
        }
    }

    // ---------------------------------------------------------------- exprs

    fn parse_expr(&mut self) -> Result<Expr, SonaError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, SonaError> {
        let cond = self.parse_or()?;
        if self.matches(&TokenKind::Question) {
            let then_branch = self.parse_expr()?;
            self.expect(&TokenKind::Colon, "':'")?;
            let else_branch = self.parse_expr()?;
            let span = cond.span;
            Ok(Expr {
                kind: ExprKind::Ternary(
                    Box::new(cond),
                    Box::new(then_branch),
                    Box::new(else_branch),
                ),
                span,
            })
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, SonaError> {
        let mut left = self.parse_and()?;
        while self.matches(&TokenKind::Or) {
            let right = self.parse_and()?;
            let span = left.span;
            left = Expr {
                kind: ExprKind::Logical(LogicalOp::Or, Box::new(left), Box::new(right)),
                span,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SonaError> {
        let mut left = self.parse_not()?;
        while self.matches(&TokenKind::And) {
            let right = self.parse_not()?;
            let span = left.span;
            left = Expr {
                kind: ExprKind::Logical(LogicalOp::And, Box::new(left), Box::new(right)),
                span,
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, SonaError> {
        if matches!(self.peek_kind(), TokenKind::Not) {
            let span = self.advance().span;
            let operand = self.parse_not()?;
            Ok(Expr {
                kind: ExprKind::Unary(UnaryOp::Not, Box::new(operand)),
                span,
            })
        } else {
            self.parse_compare()
        }
    }

    fn compare_op(kind: &TokenKind) -> Option<CompareOp> {
        match kind {
            TokenKind::EqEq => Some(CompareOp::Eq),
            TokenKind::NotEq => Some(CompareOp::NotEq),
            TokenKind::Lt => Some(CompareOp::Lt),
            TokenKind::LtEq => Some(CompareOp::LtEq),
            TokenKind::Gt => Some(CompareOp::Gt),
            TokenKind::GtEq => Some(CompareOp::GtEq),
            TokenKind::In => Some(CompareOp::In),
            _ => None,
        }
    }

    fn parse_compare(&mut self) -> Result<Expr, SonaError> {
        let first = self.parse_additive()?;
        let mut operands = vec![first];
        let mut ops = Vec::new();
        while let Some(op) = Self::compare_op(self.peek_kind()) {
            self.advance();
            ops.push(op);
            operands.push(self.parse_additive()?);
        }
        if ops.is_empty() {
            Ok(operands.pop().unwrap())
        } else {
            let span = operands[0].span;
            Ok(Expr {
                kind: ExprKind::Compare { operands, ops },
                span,
            })
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, SonaError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let span = left.span;
            left = Expr {
                kind: ExprKind::Binary(op, Box::new(left), Box::new(right)),
                span,
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SonaError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::SlashSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let span = left.span;
            left = Expr {
                kind: ExprKind::Binary(op, Box::new(left), Box::new(right)),
                span,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SonaError> {
        if matches!(self.peek_kind(), TokenKind::Minus) {
            let span = self.advance().span;
            let operand = self.parse_unary()?;
            Ok(Expr {
                kind: ExprKind::Unary(UnaryOp::Neg, Box::new(operand)),
                span,
            })
        } else {
            self.parse_power()
        }
    }

    /// `**` binds tighter than unary minus and is right-associative, sitting
    /// between unary and call/index/attr postfix ops (spec §4.1 precedence
    /// table: "... unary, power, call/index/attr, primary").
    fn parse_power(&mut self) -> Result<Expr, SonaError> {
        let base = self.parse_postfix()?;
        if self.matches(&TokenKind::StarStar) {
            let exponent = self.parse_unary()?;
            let span = base.span;
            Ok(Expr {
                kind: ExprKind::Call {
                    callee: Box::new(Expr {
                        kind: ExprKind::Ident("pow".to_string()),
                        span,
                    }),
                    args: vec![base, exponent],
                },
                span,
            })
        } else {
            Ok(base)
        }
    }

    /// A list-literal or call-argument element, allowing a leading `...expr`
    /// spread (spec §3's `Spread` node).
    fn parse_list_item(&mut self) -> Result<Expr, SonaError> {
        if self.check(&TokenKind::DotDotDot) {
            let span = self.advance().span;
            let inner = self.parse_expr()?;
            Ok(Expr {
                kind: ExprKind::Spread(Box::new(inner)),
                span,
            })
        } else {
            self.parse_expr()
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, SonaError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_list_item()?);
                            if !self.matches(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "')'")?;
                    let span = expr.span;
                    expr = Expr {
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let (name, _) = self.expect_ident()?;
                    let span = expr.span;
                    expr = Expr {
                        kind: ExprKind::Get(Box::new(expr), name),
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    if self.matches(&TokenKind::Colon) {
                        let end = if self.check(&TokenKind::RBracket) {
                            None
                        } else {
                            Some(Box::new(self.parse_expr()?))
                        };
                        self.expect(&TokenKind::RBracket, "']'")?;
                        let span = expr.span;
                        expr = Expr {
                            kind: ExprKind::Slice {
                                target: Box::new(expr),
                                start: None,
                                end,
                            },
                            span,
                        };
                        continue;
                    }
                    let first = self.parse_expr()?;
                    if self.matches(&TokenKind::Colon) {
                        let end = if self.check(&TokenKind::RBracket) {
                            None
                        } else {
                            Some(Box::new(self.parse_expr()?))
                        };
                        self.expect(&TokenKind::RBracket, "']'")?;
                        let span = expr.span;
                        expr = Expr {
                            kind: ExprKind::Slice {
                                target: Box::new(expr),
                                start: Some(Box::new(first)),
                                end,
                            },
                            span,
                        };
                    } else {
                        self.expect(&TokenKind::RBracket, "']'")?;
                        let span = expr.span;
                        expr = Expr {
                            kind: ExprKind::Index(Box::new(expr), Box::new(first)),
                            span,
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// `match expr { pat1 | pat2 => arm, _ => default }` (spec §4.1).
    fn parse_match(&mut self, span: Span) -> Result<Expr, SonaError> {
        self.advance();
        let subject = self.parse_expr()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut arms = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let mut patterns = Vec::new();
            loop {
                let is_wildcard = matches!(self.peek_kind(), TokenKind::Ident(name) if name.as_str() == "_");
                if is_wildcard {
                    self.advance();
                    patterns.push(MatchPattern::Wildcard);
                } else {
                    patterns.push(MatchPattern::Literal(self.parse_expr()?));
                }
                if !self.matches(&TokenKind::Pipe) {
                    break;
                }
            }
            self.expect(&TokenKind::FatArrow, "'=>'")?;
            let arm = self.parse_expr()?;
            arms.push((patterns, Box::new(arm)));
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Expr {
            kind: ExprKind::Match {
                subject: Box::new(subject),
                arms,
            },
            span,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, SonaError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Int(n),
                    span: tok.span,
                })
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Float(n),
                    span: tok.span,
                })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Str(s.into()),
                    span: tok.span,
                })
            }
            TokenKind::FString(raw) => {
                self.advance();
                let parts = self.parse_fstring_parts(&raw, tok.span)?;
                Ok(Expr {
                    kind: ExprKind::FString(parts),
                    span: tok.span,
                })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Bool(true),
                    span: tok.span,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Bool(false),
                    span: tok.span,
                })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Null,
                    span: tok.span,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Ident(name),
                    span: tok.span,
                })
            }
            TokenKind::Function | TokenKind::Lambda => {
                self.advance();
                let params = self.parse_params()?;
                let body = self.parse_block()?;
                Ok(Expr {
                    kind: ExprKind::Lambda {
                        params,
                        body: Rc::new(body),
                    },
                    span: tok.span,
                })
            }
            TokenKind::Super => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Ident("super".to_string()),
                    span: tok.span,
                })
            }
            TokenKind::Match => self.parse_match(tok.span),
            TokenKind::DotDotDot => {
                self.advance();
                let inner = self.parse_expr()?;
                Ok(Expr {
                    kind: ExprKind::Spread(Box::new(inner)),
                    span: tok.span,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    let first = self.parse_list_item()?;
                    if self.matches(&TokenKind::For) {
                        let (var, _) = self.expect_ident()?;
                        self.expect(&TokenKind::In, "'in'")?;
                        let iter = self.parse_expr()?;
                        let cond = if self.matches(&TokenKind::If) {
                            Some(Box::new(self.parse_expr()?))
                        } else {
                            None
                        };
                        self.expect(&TokenKind::RBracket, "']'")?;
                        return Ok(Expr {
                            kind: ExprKind::Comprehension {
                                expr: Box::new(first),
                                var,
                                iter: Box::new(iter),
                                cond,
                            },
                            span: tok.span,
                        });
                    }
                    items.push(first);
                    while self.matches(&TokenKind::Comma) {
                        if self.check(&TokenKind::RBracket) {
                            break;
                        }
                        items.push(self.parse_list_item()?);
                    }
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                Ok(Expr {
                    kind: ExprKind::ListLit(items),
                    span: tok.span,
                })
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                if !self.check(&TokenKind::RBrace) {
                    loop {
                        let key = if let TokenKind::Ident(name) = self.peek_kind().clone() {
                            let key_span = self.advance().span;
                            Expr {
                                kind: ExprKind::Str(name.into()),
                                span: key_span,
                            }
                        } else {
                            self.parse_expr()?
                        };
                        self.expect(&TokenKind::Colon, "':'")?;
                        let value = self.parse_expr()?;
                        entries.push((key, value));
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBrace, "'}'")?;
                Ok(Expr {
                    kind: ExprKind::DictLit(entries),
                    span: tok.span,
                })
            }
            _ => Err(SonaError::ParseError {
                message: format!("unexpected token {:?}", tok.kind),
                span: tok.span,
            }),
        }
    }

    /// Splits an f-string's raw contents into literal/interpolation parts,
    /// recursively parsing each `{expr}`/`{expr:spec}` fragment with a fresh
    /// tokenizer + parser.
    fn parse_fstring_parts(&self, raw: &str, span: Span) -> Result<Vec<FStringPart>, SonaError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '{' {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    literal.push('{');
                    continue;
                }
                if !literal.is_empty() {
                    parts.push(FStringPart::Literal(std::mem::take(&mut literal)));
                }
                let mut inner = String::new();
                let mut depth = 1;
                for c in chars.by_ref() {
                    if c == '{' {
                        depth += 1;
                    } else if c == '}' {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    inner.push(c);
                }
                let (expr_src, spec_src) = match inner.split_once(':') {
                    Some((e, s)) => (e, Some(s)),
                    None => (inner.as_str(), None),
                };
                let expr = parse_expr_fragment(expr_src)?;
                let spec = spec_src.map(parse_format_spec).transpose()?;
                parts.push(FStringPart::Interp {
                    expr: Box::new(expr),
                    spec,
                });
            } else if c == '}' {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    literal.push('}');
                } else {
                    return Err(SonaError::ParseError {
                        message: "unmatched '}' in f-string".to_string(),
                        span,
                    });
                }
            } else {
                literal.push(c);
            }
        }
        if !literal.is_empty() {
            parts.push(FStringPart::Literal(literal));
        }
        Ok(parts)
    }
}

fn parse_expr_fragment(src: &str) -> Result<Expr, SonaError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_expr()
}

fn parse_format_spec(src: &str) -> Result<FormatSpec, SonaError> {
    let s = src.trim();
    if let Some(rest) = s.strip_prefix('.') {
        if let Some(digits) = rest.strip_suffix('f') {
            if let Ok(n) = digits.parse::<u8>() {
                return Ok(FormatSpec::Precision(n));
            }
        }
    }
    if s == "," {
        return Ok(FormatSpec::Thousands);
    }
    if let Some(rest) = s.strip_prefix('>') {
        if let Ok(n) = rest.parse::<u16>() {
            return Ok(FormatSpec::AlignRight(n));
        }
    }
    if let Some(rest) = s.strip_prefix('<') {
        if let Ok(n) = rest.parse::<u16>() {
            return Ok(FormatSpec::AlignLeft(n));
        }
    }
    if let Some(rest) = s.strip_prefix('^') {
        if let Ok(n) = rest.parse::<u16>() {
            return Ok(FormatSpec::AlignCenter(n));
        }
    }
    Err(SonaError::ParseError {
        message: format!("unrecognized format specifier {:?}", src),
        span: Span::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_let_and_arithmetic() {
        let stmts = parse_program("let x = 1 + 2 * 3;").unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0].kind, StmtKind::Let(ref name, _) if name == "x"));
    }

    #[test]
    fn parses_chained_comparison_as_single_node() {
        let stmts = parse_program("let ok = a < b < c;").unwrap();
        if let StmtKind::Let(_, Expr { kind, .. }) = &stmts[0].kind {
            match kind {
                ExprKind::Compare { operands, ops } => {
                    assert_eq!(operands.len(), 3);
                    assert_eq!(ops.len(), 2);
                }
                other => panic!("expected Compare, got {:?}", other),
            }
        } else {
            panic!("expected let stmt");
        }
    }

    #[test]
    fn parses_if_elif_else() {
        let stmts =
            parse_program("if a { return 1; } elif b { return 2; } else { return 3; }").unwrap();
        if let StmtKind::If {
            branches,
            else_branch,
        } = &stmts[0].kind
        {
            assert_eq!(branches.len(), 2);
            assert!(else_branch.is_some());
        } else {
            panic!("expected if stmt");
        }
    }

    #[test]
    fn parses_function_def_with_docstring() {
        let stmts =
            parse_program(r#"function square(x) { "doubles a number"; return x * x; }"#).unwrap();
        if let StmtKind::FunctionDef {
            docstring, body, ..
        } = &stmts[0].kind
        {
            assert_eq!(docstring.as_deref(), Some("doubles a number"));
            assert_eq!(body.len(), 1);
        } else {
            panic!("expected function def");
        }
    }

    #[test]
    fn parses_fstring_with_format_spec() {
        let stmts = parse_program(r#"let s = f"value: {x:.2f}";"#).unwrap();
        if let StmtKind::Let(
            _,
            Expr {
                kind: ExprKind::FString(parts),
                ..
            },
        ) = &stmts[0].kind
        {
            assert_eq!(parts.len(), 2);
        } else {
            panic!("expected fstring let");
        }
    }

    #[test]
    fn parses_index_assignment() {
        let stmts = parse_program("xs[0] = 1;").unwrap();
        assert!(matches!(
            stmts[0].kind,
            StmtKind::Assign(AssignTarget::Index(_, _), _)
        ));
    }
}
