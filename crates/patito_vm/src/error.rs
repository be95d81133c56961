//! Runtime faults. Every one of them stops the machine.

use patito_syntax::ast::Type;
use patito_syntax::ir::Opcode;
use patito_syntax::segment::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("address {address} is outside every segment")]
    AddressOutOfRange { address: Address },

    #[error("constant at address {address} was never loaded")]
    UninitializedConstant { address: Address },

    #[error("cannot write to constant address {address}")]
    ConstantWrite { address: Address },

    #[error("cannot store a {found} value at {address}, a {expected} address")]
    SegmentTypeMismatch {
        address: Address,
        expected: Type,
        found: Type,
    },

    #[error("segment size {size} is outside 1..={max}")]
    InvalidSegmentSize { size: u32, max: u32 },

    #[error("return with no caller to return to")]
    UnboundReturn,

    #[error("{context} without a prepared activation record")]
    UnpreparedActivation { context: String },

    #[error("'{op}' cannot operate on {operands}")]
    UnsupportedOpcode { op: Opcode, operands: String },

    #[error("malformed quadruple at {index}: {reason}")]
    MalformedQuadruple { index: usize, reason: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{op}'")]
    IntegerOverflow { op: Opcode },

    #[error("call depth exceeded the limit of {limit}")]
    CallDepthExceeded { limit: usize },

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}
