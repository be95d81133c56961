//! Patito syntax: tokens, AST nodes, spans, diagnostics, tree walker, memory layout, IR.

pub mod ast;
pub mod diagnostics;
pub mod ir;
pub mod segment;
pub mod span;
pub mod token;
pub mod walk;

pub use ast::*;
pub use diagnostics::*;
pub use ir::*;
pub use segment::*;
pub use span::*;
pub use token::*;
pub use walk::*;
