//! Parser: tokens → AST.

use patito_syntax::ast::*;
use patito_syntax::diagnostics::Diagnostic;
use patito_syntax::span::Span;
use patito_syntax::token::{Token, TokenKind};
use std::iter::Peekable;
use std::vec::IntoIter;

type PResult<T> = Result<T, Diagnostic>;

pub struct Parser {
    tokens: Peekable<IntoIter<Token>>,
    last_span: Span,
}

/// Parse a whole token stream into a program root.
pub fn parse(tokens: Vec<Token>) -> PResult<Root> {
    Parser::new(tokens).parse_root()
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
            last_span: Span::default(),
        }
    }

    fn peek(&mut self) -> &TokenKind {
        static EOF: TokenKind = TokenKind::Eof;
        self.tokens.peek().map(|t| &t.kind).unwrap_or(&EOF)
    }

    /// Kind of the token after the next one.
    fn peek_second(&self) -> Option<TokenKind> {
        let mut ahead = self.tokens.clone();
        ahead.next();
        ahead.next().map(|t| t.kind)
    }

    fn peek_span(&mut self) -> Span {
        self.tokens.peek().map(|t| t.span).unwrap_or(self.last_span)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.next()?;
        self.last_span = t.span;
        Some(t)
    }

    fn at(&mut self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.next();
            true
        } else {
            false
        }
    }

    fn error_here(&mut self, message: impl Into<String>) -> Diagnostic {
        let span = self.peek_span();
        Diagnostic::error(message, Some(span))
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Span> {
        if self.at(&kind) {
            self.next();
            return Ok(self.last_span);
        }
        let found = self.peek().clone();
        Err(self.error_here(format!("expected {}, found {}", what, describe(&found))))
    }

    fn expect_ident(&mut self, what: &str) -> PResult<(String, Span)> {
        if let TokenKind::Ident(name) = self.peek() {
            let name = name.clone();
            self.next();
            return Ok((name, self.last_span));
        }
        let found = self.peek().clone();
        Err(self.error_here(format!("expected {}, found {}", what, describe(&found))))
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.last_span.end)
    }

    pub fn parse_root(&mut self) -> PResult<Root> {
        let start = self.peek_span().start;
        self.expect(TokenKind::Program, "'program'")?;
        let (name, _) = self.expect_ident("program name")?;
        self.expect(TokenKind::Semicolon, "';'")?;

        let globals = self.parse_var_section()?;

        let mut functions = Vec::new();
        while !self.at(&TokenKind::Main) {
            if self.at(&TokenKind::Eof) {
                return Err(self.error_here("expected 'main' block before end of file"));
            }
            functions.push(self.parse_function()?);
        }

        self.expect(TokenKind::Main, "'main'")?;
        let main = self.parse_block()?;
        self.expect(TokenKind::End, "'end'")?;
        if !self.at(&TokenKind::Eof) {
            let found = self.peek().clone();
            return Err(self.error_here(format!(
                "unexpected {} after 'end'",
                describe(&found)
            )));
        }
        Ok(Root {
            span: self.span_from(start),
            name,
            globals,
            functions,
            main,
        })
    }

    /// `var a, b : int; c : float;`; empty when no `var` keyword follows.
    fn parse_var_section(&mut self) -> PResult<Vec<VarDecl>> {
        let mut decls = Vec::new();
        if !self.eat(&TokenKind::Var) {
            return Ok(decls);
        }
        loop {
            let start = self.peek_span().start;
            let mut names = vec![self.expect_ident("variable name")?];
            while self.eat(&TokenKind::Comma) {
                names.push(self.expect_ident("variable name")?);
            }
            self.expect(TokenKind::Colon, "':'")?;
            let ty = self.parse_type()?;
            self.expect(TokenKind::Semicolon, "';'")?;
            decls.push(VarDecl {
                span: self.span_from(start),
                names,
                ty,
            });
            // `x = 1;` ends the section; `x :` or `x ,` starts another line.
            let continues = matches!(self.peek(), TokenKind::Ident(_))
                && matches!(self.peek_second(), Some(TokenKind::Comma | TokenKind::Colon));
            if !continues {
                return Ok(decls);
            }
        }
    }

    fn parse_type(&mut self) -> PResult<Type> {
        let ty = match self.peek() {
            TokenKind::Int => Type::Int,
            TokenKind::Float => Type::Float,
            TokenKind::Bool => Type::Bool,
            other => {
                let found = other.clone();
                return Err(self.error_here(format!(
                    "expected type (int, float, bool), found {}",
                    describe(&found)
                )));
            }
        };
        self.next();
        Ok(ty)
    }

    fn parse_function(&mut self) -> PResult<FuncDecl> {
        let start = self.peek_span().start;
        let return_ty = if self.eat(&TokenKind::Void) {
            None
        } else {
            Some(self.parse_type()?)
        };
        let (name, _) = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let (pname, pspan) = self.expect_ident("parameter name")?;
                self.expect(TokenKind::Colon, "':'")?;
                let ty = self.parse_type()?;
                params.push(Param {
                    span: pspan.to(self.last_span),
                    name: pname,
                    ty,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let body_start = self.expect(TokenKind::LBrace, "'{'")?.start;
        let locals = self.parse_var_section()?;
        let stmts = self.parse_stmts()?;
        self.expect(TokenKind::RBrace, "'}'")?;
        let body = Block {
            span: self.span_from(body_start),
            stmts,
        };
        self.eat(&TokenKind::Semicolon);
        Ok(FuncDecl {
            span: self.span_from(start),
            name,
            return_ty,
            params,
            locals,
            body,
        })
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.expect(TokenKind::LBrace, "'{'")?.start;
        let stmts = self.parse_stmts()?;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Block {
            span: self.span_from(start),
            stmts,
        })
    }

    fn parse_stmts(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !matches!(self.peek(), TokenKind::RBrace | TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.peek_span().start;
        match self.peek().clone() {
            TokenKind::If => {
                self.next();
                self.expect(TokenKind::LParen, "'('")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                let then_block = self.parse_block()?;
                let else_block = if self.eat(&TokenKind::Else) {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::If {
                    span: self.span_from(start),
                    cond,
                    then_block,
                    else_block,
                })
            }
            TokenKind::While => {
                self.next();
                self.expect(TokenKind::LParen, "'('")?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                self.eat(&TokenKind::Do);
                let body = self.parse_block()?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::While {
                    span: self.span_from(start),
                    cond,
                    body,
                })
            }
            TokenKind::Print => {
                self.next();
                self.expect(TokenKind::LParen, "'('")?;
                let args = self.parse_args()?;
                self.expect_semicolon()?;
                Ok(Stmt::Print {
                    span: self.span_from(start),
                    args,
                })
            }
            TokenKind::Return => {
                self.next();
                let value = self.parse_expr()?;
                self.expect_semicolon()?;
                Ok(Stmt::Return {
                    span: self.span_from(start),
                    value,
                })
            }
            TokenKind::Ident(name) => {
                self.next();
                if self.eat(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    self.expect_semicolon()?;
                    return Ok(Stmt::Call(Call {
                        span: self.span_from(start),
                        callee: name,
                        args,
                    }));
                }
                self.expect(TokenKind::Assign, "'=' or '('")?;
                let value = self.parse_expr()?;
                self.expect_semicolon()?;
                Ok(Stmt::Assign {
                    span: self.span_from(start),
                    target: name,
                    value,
                })
            }
            other => Err(self.error_here(format!(
                "expected statement, found {}",
                describe(&other)
            ))),
        }
    }

    fn expect_semicolon(&mut self) -> PResult<()> {
        self.expect(TokenKind::Semicolon, "';' after statement")
            .map(|_| ())
    }

    /// Comma-separated expressions up to and including the closing `)`.
    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    /// `add (relop add)?`; relational operators do not chain.
    pub fn parse_expr(&mut self) -> PResult<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::Le => BinOp::Le,
            TokenKind::Eq => BinOp::Eq,
            TokenKind::Ne => BinOp::Ne,
            _ => return Ok(lhs),
        };
        self.next();
        let rhs = self.parse_additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Rem,
                _ => return Ok(lhs),
            };
            self.next();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.peek_span().start;
        let op = match self.peek() {
            TokenKind::Plus => UnOp::Plus,
            TokenKind::Minus => UnOp::Neg,
            _ => return self.parse_atom(),
        };
        self.next();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            span: self.span_from(start),
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        let start = self.peek_span().start;
        let Some(t) = self.next() else {
            return Err(self.error_here("expected expression, found end of file"));
        };
        let literal = |value| {
            Ok(Expr::Literal {
                span: t.span,
                value,
            })
        };
        match t.kind {
            TokenKind::IntLiteral(n) => literal(Literal::Int(n)),
            TokenKind::FloatLiteral(x) => literal(Literal::Float(x)),
            TokenKind::StringLiteral(ref s) => literal(Literal::String(s.clone())),
            TokenKind::True => literal(Literal::Bool(true)),
            TokenKind::False => literal(Literal::Bool(false)),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(ref name) => {
                if self.eat(&TokenKind::LParen) {
                    let args = self.parse_args()?;
                    return Ok(Expr::Call(Call {
                        span: self.span_from(start),
                        callee: name.clone(),
                        args,
                    }));
                }
                Ok(Expr::Ident {
                    span: t.span,
                    name: name.clone(),
                })
            }
            ref other => Err(Diagnostic::error(
                format!("expected expression, found {}", describe(other)),
                Some(t.span),
            )),
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        span: lhs.span().to(rhs.span()),
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("identifier '{}'", name),
        TokenKind::IntLiteral(n) => format!("integer {}", n),
        TokenKind::FloatLiteral(x) => format!("float {}", x),
        TokenKind::StringLiteral(s) => format!("string {:?}", s),
        TokenKind::Eof => "end of file".to_string(),
        other => format!("{:?}", other),
    }
}
