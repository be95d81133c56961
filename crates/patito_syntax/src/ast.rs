//! AST types for Patito (program, functions, statements, expressions).

use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value type of a variable, literal, parameter or expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Bool => "bool",
            Type::String => "string",
        };
        f.write_str(name)
    }
}

/// Display helper for a function return type, where `None` is `void`.
pub struct ReturnType(pub Option<Type>);

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ty) => ty.fmt(f),
            None => f.write_str("void"),
        }
    }
}

/// Root of a compilation unit: `program <name>; var ... <functions> main { ... } end`
#[derive(Clone, Debug)]
pub struct Root {
    pub span: Span,
    pub name: String,
    pub globals: Vec<VarDecl>,
    pub functions: Vec<FuncDecl>,
    pub main: Block,
}

/// One `a, b, c : int;` line of a var section.
#[derive(Clone, Debug)]
pub struct VarDecl {
    pub span: Span,
    pub names: Vec<(String, Span)>,
    pub ty: Type,
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub span: Span,
    pub name: String,
    /// `None` for `void`.
    pub return_ty: Option<Type>,
    pub params: Vec<Param>,
    pub locals: Vec<VarDecl>,
    pub body: Block,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub span: Span,
    pub name: String,
    pub ty: Type,
}

/// Block: `{ stmts }`
#[derive(Clone, Debug)]
pub struct Block {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    /// `x = expr;` (also written `x := expr;`)
    Assign {
        span: Span,
        target: String,
        value: Expr,
    },
    If {
        span: Span,
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        span: Span,
        cond: Expr,
        body: Block,
    },
    Print {
        span: Span,
        args: Vec<Expr>,
    },
    /// Call used as a statement; any return value is discarded.
    Call(Call),
    Return {
        span: Span,
        value: Expr,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Print { span, .. }
            | Stmt::Return { span, .. } => *span,
            Stmt::Call(call) => call.span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Call {
    pub span: Span,
    pub callee: String,
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Int(_) => Type::Int,
            Literal::Float(_) => Type::Float,
            Literal::String(_) => Type::String,
            Literal::Bool(_) => Type::Bool,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Gt => ">",
            BinOp::Lt => "<",
            BinOp::Ge => ">=",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Neg,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Literal {
        span: Span,
        value: Literal,
    },
    Ident {
        span: Span,
        name: String,
    },
    Binary {
        span: Span,
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        span: Span,
        op: UnOp,
        operand: Box<Expr>,
    },
    Call(Call),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Ident { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. } => *span,
            Expr::Call(call) => call.span,
        }
    }
}
