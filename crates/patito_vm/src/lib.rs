//! Patito virtual machine.

pub mod error;
pub mod machine;
pub mod memory;

pub use error::RuntimeError;
pub use machine::{Step, VirtualMachine, DEFAULT_MAX_CALL_DEPTH};
pub use memory::{ActivationRecord, ExecutionMemory};
