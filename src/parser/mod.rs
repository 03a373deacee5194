// Recursive descent parser for the template language

pub mod ast;

use crate::error::ParseError;
use crate::lexer::token::{Token, TokenKind};
use crate::lexer::Lexer;
use crate::span::{SourceId, Span};

use ast::*;

/// Lex and parse template source into an AST.
pub fn parse(source: &str, source_id: SourceId) -> Result<Ast, Vec<ParseError>> {
    let (tokens, lex_errors) = Lexer::new(source, source_id).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors
            .into_iter()
            .map(|e| ParseError::new(e.message, e.span))
            .collect());
    }
    Parser::new(tokens).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Result<Ast, Vec<ParseError>> {
        let stmts = self.parse_block(&[]);
        if self.errors.is_empty() {
            Ok(Ast { stmts })
        } else {
            Err(self.errors)
        }
    }

    // ---- token helpers ----

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn span(&self) -> Span {
        self.current().span
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[i].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.kind(), TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.kind() == &kind {
            Ok(self.advance())
        } else {
            Err(ParseError::expected(
                format!("unexpected {}", self.kind()),
                kind.to_string(),
                self.span(),
            ))
        }
    }

    fn skip_separators(&mut self) {
        while self.kind().is_stmt_separator() {
            self.advance();
        }
    }

    /// Skip newlines inside bracketed constructs where they are not
    /// statement separators.
    fn skip_newlines(&mut self) {
        while matches!(self.kind(), TokenKind::Newline) {
            self.advance();
        }
    }

    /// Skip to the next statement boundary after a parse error.
    fn recover(&mut self) {
        while !self.at_eof() && !self.kind().is_stmt_separator() {
            self.advance();
        }
    }

    // ---- statements ----

    fn parse_block(&mut self, terminators: &[TokenKind]) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.at_eof() || terminators.iter().any(|t| self.check(t)) {
                break;
            }
            match self.parse_stmt() {
                Ok(stmt) => {
                    stmts.push(stmt);
                    let ok_here = self.kind().is_stmt_separator()
                        || self.at_eof()
                        || matches!(self.kind(), TokenKind::Text(_))
                        || terminators.iter().any(|t| self.check(t));
                    if !ok_here {
                        self.errors.push(ParseError::new(
                            format!("expected end of statement, found {}", self.kind()),
                            self.span(),
                        ));
                        self.recover();
                    }
                }
                Err(e) => {
                    self.errors.push(e);
                    self.recover();
                }
            }
        }
        stmts
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        match self.kind() {
            TokenKind::Text(_) => {
                let token = self.advance();
                let TokenKind::Text(text) = token.kind else {
                    unreachable!()
                };
                Ok(Stmt {
                    kind: StmtKind::Text(text),
                    span: token.span,
                })
            }
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwCase => self.parse_case(),
            // `for.index` is a loop-variable expression, not a loop header
            TokenKind::KwFor if !matches!(self.peek_kind(1), TokenKind::Dot) => {
                self.parse_for(false)
            }
            TokenKind::KwTableRow if !matches!(self.peek_kind(1), TokenKind::Dot) => {
                self.parse_for(true)
            }
            TokenKind::KwWhile if !matches!(self.peek_kind(1), TokenKind::Dot) => {
                self.parse_while()
            }
            TokenKind::KwCapture => self.parse_capture(),
            TokenKind::KwWith => self.parse_with(),
            TokenKind::KwImport => {
                self.advance();
                let expr = self.parse_expr()?;
                Ok(Stmt {
                    span: start.merge(expr.span),
                    kind: StmtKind::Import(expr),
                })
            }
            TokenKind::KwFunc => self.parse_func(),
            TokenKind::KwRet => {
                self.advance();
                let value = if self.kind().is_stmt_separator() || self.at_eof() {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let span = value.as_ref().map(|e| start.merge(e.span)).unwrap_or(start);
                Ok(Stmt {
                    kind: StmtKind::Ret(value),
                    span,
                })
            }
            TokenKind::KwBreak => {
                self.advance();
                Ok(Stmt {
                    kind: StmtKind::Break,
                    span: start,
                })
            }
            TokenKind::KwContinue => {
                self.advance();
                Ok(Stmt {
                    kind: StmtKind::Continue,
                    span: start,
                })
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.check(&TokenKind::Eq) {
                    self.advance();
                    self.validate_assign_target(&expr)?;
                    let value = self.parse_expr()?;
                    Ok(Stmt {
                        span: expr.span.merge(value.span),
                        kind: StmtKind::Assign(Box::new(AssignData {
                            target: expr,
                            value,
                        })),
                    })
                } else {
                    Ok(Stmt {
                        span: expr.span,
                        kind: StmtKind::Expr(expr),
                    })
                }
            }
        }
    }

    fn validate_assign_target(&self, target: &Expr) -> Result<(), ParseError> {
        match &target.kind {
            ExprKind::Var { .. } | ExprKind::Member { .. } | ExprKind::Index { .. } => Ok(()),
            _ => Err(ParseError::new("invalid assignment target", target.span)),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        self.expect(TokenKind::KwIf)?;
        let cond = self.parse_expr()?;
        let then_body = self.parse_block(&[TokenKind::KwElse, TokenKind::KwEnd]);
        let else_body = match self.kind() {
            TokenKind::KwElse => {
                self.advance();
                if self.check(&TokenKind::KwIf) {
                    // `else if` chains as a nested if in the else branch
                    let nested = self.parse_if()?;
                    Some(vec![nested])
                } else {
                    let body = self.parse_block(&[TokenKind::KwEnd]);
                    self.expect(TokenKind::KwEnd)?;
                    Some(body)
                }
            }
            TokenKind::KwEnd => {
                self.advance();
                None
            }
            _ => {
                return Err(ParseError::expected(
                    "missing 'end' for 'if'",
                    "'end'",
                    self.span(),
                ))
            }
        };
        Ok(Stmt {
            span: start,
            kind: StmtKind::If(Box::new(IfData {
                cond,
                then_body,
                else_body,
            })),
        })
    }

    fn parse_case(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        self.expect(TokenKind::KwCase)?;
        let value = self.parse_expr()?;

        // Content before the first `when` is discarded
        let _ = self.parse_block(&[TokenKind::KwWhen, TokenKind::KwElse, TokenKind::KwEnd]);

        let mut whens = Vec::new();
        let mut else_body = None;
        loop {
            match self.kind() {
                TokenKind::KwWhen => {
                    let when_span = self.span();
                    self.advance();
                    let mut values = vec![self.parse_expr()?];
                    while self.check(&TokenKind::Comma) {
                        self.advance();
                        values.push(self.parse_expr()?);
                    }
                    let body = self.parse_block(&[
                        TokenKind::KwWhen,
                        TokenKind::KwElse,
                        TokenKind::KwEnd,
                    ]);
                    whens.push(WhenArm {
                        values,
                        body,
                        span: when_span,
                    });
                }
                TokenKind::KwElse => {
                    self.advance();
                    else_body = Some(self.parse_block(&[TokenKind::KwEnd]));
                }
                _ => break,
            }
        }
        self.expect(TokenKind::KwEnd)?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::Case(Box::new(CaseData {
                value,
                whens,
                else_body,
            })),
        })
    }

    fn parse_for(&mut self, table_row: bool) -> Result<Stmt, ParseError> {
        let start = self.span();
        self.advance(); // for / tablerow
        let var = self.parse_ident("loop variable")?;
        self.expect(TokenKind::KwIn)?;
        let iterable = self.parse_expr()?;

        // Named loop arguments: `offset: 1 limit: 2 reversed`
        let mut args = Vec::new();
        loop {
            match self.kind() {
                TokenKind::Ident(name) if matches!(self.peek_kind(1), TokenKind::Colon) => {
                    let name = name.clone();
                    let arg_span = self.span();
                    self.advance();
                    self.advance();
                    let value = self.parse_expr()?;
                    args.push(LoopArg {
                        name,
                        value: Some(value),
                        span: arg_span,
                    });
                }
                TokenKind::Ident(name) if name == "reversed" => {
                    let arg_span = self.span();
                    self.advance();
                    args.push(LoopArg {
                        name: "reversed".to_string(),
                        value: None,
                        span: arg_span,
                    });
                }
                _ => break,
            }
        }

        let body = self.parse_block(&[TokenKind::KwEnd]);
        self.expect(TokenKind::KwEnd)?;
        let data = Box::new(ForData {
            var,
            iterable,
            args,
            body,
        });
        Ok(Stmt {
            span: start,
            kind: if table_row {
                StmtKind::TableRow(data)
            } else {
                StmtKind::For(data)
            },
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        self.expect(TokenKind::KwWhile)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block(&[TokenKind::KwEnd]);
        self.expect(TokenKind::KwEnd)?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::While(Box::new(WhileData { cond, body })),
        })
    }

    fn parse_capture(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        self.expect(TokenKind::KwCapture)?;
        let target = self.parse_expr()?;
        self.validate_assign_target(&target)?;
        let body = self.parse_block(&[TokenKind::KwEnd]);
        self.expect(TokenKind::KwEnd)?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::Capture(Box::new(CaptureData { target, body })),
        })
    }

    fn parse_with(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        self.expect(TokenKind::KwWith)?;
        let target = self.parse_expr()?;
        let body = self.parse_block(&[TokenKind::KwEnd]);
        self.expect(TokenKind::KwEnd)?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::With(Box::new(WithData { target, body })),
        })
    }

    fn parse_func(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        self.expect(TokenKind::KwFunc)?;
        let name = self.parse_ident("function name")?;
        let params = if self.check(&TokenKind::LParen) {
            self.parse_params()?
        } else {
            Vec::new()
        };
        let body = self.parse_block(&[TokenKind::KwEnd]);
        self.expect(TokenKind::KwEnd)?;
        Ok(Stmt {
            span: start,
            kind: StmtKind::FuncDef(Box::new(FuncDefData { name, params, body })),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RParen) {
                break;
            }
            let param_span = self.span();
            let name = self.parse_ident("parameter name")?;
            let mut is_rest = false;
            let mut default = None;
            if self.check(&TokenKind::DotDotDot) {
                self.advance();
                is_rest = true;
            } else if self.check(&TokenKind::Eq) {
                self.advance();
                default = Some(self.parse_expr()?);
            }
            params.push(Param {
                name,
                default,
                is_rest,
                span: param_span,
            });
            self.skip_newlines();
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.skip_newlines();
        self.expect(TokenKind::RParen)?;
        if let Some(bad) = params
            .iter()
            .rev()
            .skip(1)
            .find(|p| p.is_rest)
        {
            return Err(ParseError::new(
                format!("rest parameter '{}' must be last", bad.name),
                bad.span,
            ));
        }
        Ok(params)
    }

    fn parse_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.kind() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::expected(
                format!("unexpected {}", other),
                what.to_string(),
                self.span(),
            )),
        }
    }

    // ---- expressions ----

    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(1)
    }

    /// Binary operator and precedence for the current token, if any.
    /// The pipe binds loosest; postfix constructs bind tightest.
    fn current_operator(&self) -> Option<(Option<BinaryOp>, u8)> {
        let op = match self.kind() {
            TokenKind::VerticalBar => return Some((None, 1)),
            TokenKind::QuestionQuestion => (BinaryOp::NullCoalesce, 2),
            TokenKind::PipePipe => (BinaryOp::Or, 3),
            TokenKind::AmpAmp => (BinaryOp::And, 4),
            TokenKind::EqEq => (BinaryOp::Eq, 5),
            TokenKind::BangEq => (BinaryOp::Ne, 5),
            TokenKind::Less => (BinaryOp::Lt, 5),
            TokenKind::LessEq => (BinaryOp::Le, 5),
            TokenKind::Greater => (BinaryOp::Gt, 5),
            TokenKind::GreaterEq => (BinaryOp::Ge, 5),
            TokenKind::Ident(name) => match name.as_str() {
                "contains" => (BinaryOp::Contains, 5),
                "startsWith" => (BinaryOp::StartsWith, 5),
                "endsWith" => (BinaryOp::EndsWith, 5),
                _ => return None,
            },
            TokenKind::DotDot => (BinaryOp::RangeIncl, 6),
            TokenKind::DotDotLess => (BinaryOp::RangeExcl, 6),
            TokenKind::ShiftLeft => (BinaryOp::ShiftLeft, 7),
            TokenKind::ShiftRight => (BinaryOp::ShiftRight, 7),
            TokenKind::Plus => (BinaryOp::Add, 8),
            TokenKind::Minus => (BinaryOp::Sub, 8),
            TokenKind::Star => (BinaryOp::Mul, 9),
            TokenKind::Slash => (BinaryOp::Div, 9),
            TokenKind::SlashSlash => (BinaryOp::DivRound, 9),
            TokenKind::Percent => (BinaryOp::Mod, 9),
            _ => return None,
        };
        Some((Some(op.0), op.1))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some((op, prec)) = self.current_operator() else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            let span = lhs.span.merge(rhs.span);
            lhs = match op {
                Some(op) => Expr {
                    kind: ExprKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    span,
                },
                None => Expr {
                    kind: ExprKind::Pipe {
                        input: Box::new(lhs),
                        func: Box::new(rhs),
                    },
                    span,
                },
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.span();
        let op = match self.kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::At => Some(UnaryOp::Alias),
            TokenKind::Caret => Some(UnaryOp::Expand),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let inner = self.parse_unary()?;
                Ok(Expr {
                    span: start.merge(inner.span),
                    kind: ExprKind::Unary {
                        op,
                        expr: Box::new(inner),
                    },
                })
            }
            None => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    // `x.empty?` emptiness test
                    if self.check(&TokenKind::KwEmpty)
                        && matches!(self.peek_kind(1), TokenKind::Question)
                    {
                        self.advance();
                        let end = self.advance().span;
                        expr = Expr {
                            span: expr.span.merge(end),
                            kind: ExprKind::IsEmpty {
                                target: Box::new(expr),
                            },
                        };
                        continue;
                    }
                    let name = self.parse_ident("member name")?;
                    expr = Expr {
                        span: expr.span,
                        kind: ExprKind::Member {
                            target: Box::new(expr),
                            name,
                        },
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    let end = self.expect(TokenKind::RBracket)?.span;
                    expr = Expr {
                        span: expr.span.merge(end),
                        kind: ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                TokenKind::LParen => {
                    let args = self.parse_call_args()?;
                    expr = Expr {
                        span: expr.span,
                        kind: ExprKind::Call {
                            target: Box::new(expr),
                            args,
                        },
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<CallArg>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        let mut seen_named = false;
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RParen) {
                break;
            }
            let arg_span = self.span();
            // `name: value` named argument
            let name = match self.kind() {
                TokenKind::Ident(name) if matches!(self.peek_kind(1), TokenKind::Colon) => {
                    let name = name.clone();
                    self.advance();
                    self.advance();
                    Some(name)
                }
                _ => None,
            };
            if name.is_some() {
                seen_named = true;
            } else if seen_named {
                return Err(ParseError::new(
                    "positional argument after named argument",
                    arg_span,
                ));
            }
            let value = self.parse_expr()?;
            args.push(CallArg {
                name,
                value,
                span: arg_span,
            });
            self.skip_newlines();
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.skip_newlines();
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        let kind = match self.kind().clone() {
            TokenKind::Int(v) => {
                self.advance();
                if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
                    ExprKind::IntLit(v as i32)
                } else {
                    ExprKind::LongLit(v)
                }
            }
            TokenKind::Float(v) => {
                self.advance();
                ExprKind::FloatLit(v)
            }
            TokenKind::Double(v) => {
                self.advance();
                ExprKind::DoubleLit(v)
            }
            TokenKind::Decimal(v) => {
                self.advance();
                ExprKind::DecimalLit(v)
            }
            TokenKind::Str(s) => {
                self.advance();
                ExprKind::StrLit(s)
            }
            TokenKind::KwTrue => {
                self.advance();
                ExprKind::BoolLit(true)
            }
            TokenKind::KwFalse => {
                self.advance();
                ExprKind::BoolLit(false)
            }
            TokenKind::KwNull => {
                self.advance();
                ExprKind::NullLit
            }
            TokenKind::KwEmpty => {
                self.advance();
                ExprKind::EmptyLit
            }
            TokenKind::Ident(name) => {
                self.advance();
                ExprKind::Var {
                    name,
                    scope: VarScope::Global,
                }
            }
            TokenKind::LocalIdent(name) => {
                self.advance();
                ExprKind::Var {
                    name,
                    scope: VarScope::Local,
                }
            }
            // Loop state variables: `for.index`, `while.index`, ...
            TokenKind::KwFor => {
                self.advance();
                ExprKind::Var {
                    name: "for".to_string(),
                    scope: VarScope::Loop,
                }
            }
            TokenKind::KwWhile => {
                self.advance();
                ExprKind::Var {
                    name: "while".to_string(),
                    scope: VarScope::Loop,
                }
            }
            TokenKind::KwTableRow => {
                self.advance();
                ExprKind::Var {
                    name: "tablerow".to_string(),
                    scope: VarScope::Loop,
                }
            }
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                loop {
                    self.skip_newlines();
                    if self.check(&TokenKind::RBracket) {
                        break;
                    }
                    elements.push(self.parse_expr()?);
                    self.skip_newlines();
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.skip_newlines();
                let end = self.expect(TokenKind::RBracket)?.span;
                return Ok(Expr {
                    kind: ExprKind::ArrayInit(elements),
                    span: span.merge(end),
                });
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                loop {
                    self.skip_newlines();
                    if self.check(&TokenKind::RBrace) {
                        break;
                    }
                    let key = match self.kind().clone() {
                        TokenKind::Ident(name) => {
                            self.advance();
                            name
                        }
                        TokenKind::Str(s) => {
                            self.advance();
                            s
                        }
                        other => {
                            return Err(ParseError::expected(
                                format!("unexpected {}", other),
                                "object key",
                                self.span(),
                            ))
                        }
                    };
                    self.expect(TokenKind::Colon)?;
                    self.skip_newlines();
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    self.skip_newlines();
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.skip_newlines();
                let end = self.expect(TokenKind::RBrace)?.span;
                return Ok(Expr {
                    kind: ExprKind::ObjectInit(entries),
                    span: span.merge(end),
                });
            }
            TokenKind::KwDo => {
                self.advance();
                let params = if self.check(&TokenKind::LParen) {
                    self.parse_params()?
                } else {
                    Vec::new()
                };
                let body = self.parse_block(&[TokenKind::KwEnd]);
                self.expect(TokenKind::KwEnd)?;
                return Ok(Expr {
                    kind: ExprKind::AnonFunc(Box::new(FuncDefData {
                        name: String::new(),
                        params,
                        body,
                    })),
                    span,
                });
            }
            other => {
                return Err(ParseError::expected(
                    format!("unexpected {}", other),
                    "expression".to_string(),
                    span,
                ))
            }
        };
        Ok(Expr { kind, span })
    }
}
