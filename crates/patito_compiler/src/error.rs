//! Semantic errors raised while generating quadruples. Any of them aborts the pass.

use patito_syntax::ast::Type;
use patito_syntax::diagnostics::Diagnostic;
use patito_syntax::segment::Segment;
use patito_syntax::span::Span;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("function '{name}' is already declared")]
    DuplicateFunction { name: String },

    #[error("variable '{name}' is already declared in {scope}")]
    DuplicateVariable { name: String, scope: String },

    #[error("parameter '{name}' is repeated in function '{function}'")]
    DuplicateParameter { name: String, function: String },

    #[error("function '{name}' is not declared")]
    UndeclaredFunction { name: String },

    #[error("variable '{name}' is not declared")]
    UndeclaredVariable { name: String },

    #[error("incompatible types: {left} {op} {right}")]
    IncompatibleTypes {
        op: String,
        left: Type,
        right: Type,
    },

    #[error("cannot assign {found} to {target} of type {expected}")]
    IncompatibleAssignment {
        target: String,
        expected: Type,
        found: Type,
    },

    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("void function '{name}' used in an expression")]
    VoidInExpression { name: String },

    #[error("function '{name}' returns {ty} but never executes a return")]
    MissingReturn { name: String, ty: Type },

    #[error("return outside of a function")]
    ReturnOutsideFunction,

    #[error("void function '{name}' cannot return a value")]
    VoidReturnsValue { name: String },

    #[error("{construct} condition must be bool, found {found}")]
    NonBooleanCondition { construct: &'static str, found: Type },

    #[error("address space exhausted in segment {segment}")]
    AddressSpaceExhausted { segment: Segment },

    #[error("segment size {size} exceeds the maximum of {max}")]
    SegmentSizeTooLarge { size: u32, max: u32 },

    #[error("no {scope} segment holds values of type {ty}")]
    NoSegment { scope: String, ty: Type },

    #[error("internal error: expected pending {expected} jump, found {found}")]
    MismatchedJump {
        expected: &'static str,
        found: String,
    },

    #[error("internal error: operand stack underflow")]
    OperandUnderflow,
}

/// Failure of the whole front end for one source text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Lexical or syntax error; semantic analysis never ran.
    #[error("{0}")]
    Syntax(Diagnostic),
    #[error("{error}")]
    Semantic { error: SemanticError, span: Span },
}

impl CompileError {
    pub fn diagnostic(&self) -> Diagnostic {
        match self {
            CompileError::Syntax(diag) => diag.clone(),
            CompileError::Semantic { error, span } => Diagnostic::error(error.to_string(), Some(*span)),
        }
    }

    pub fn semantic(&self) -> Option<&SemanticError> {
        match self {
            CompileError::Semantic { error, .. } => Some(error),
            CompileError::Syntax(_) => None,
        }
    }
}
