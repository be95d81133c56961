//! Run-time memory: the global and constant windows plus a stack of activation
//! records holding locals and temporaries.
//!
//! Addresses are resolved through the same [`MemoryLayout`] the compiler used,
//! so the segment an address falls in decides which window serves it.

use crate::error::RuntimeError;
use patito_syntax::ast::Type;
use patito_syntax::ir::{ConstantEntry, Value};
use patito_syntax::segment::{Address, MemoryLayout, ScopeClass, Segment};
use std::collections::HashMap;

/// Locals and temporaries of one live call.
#[derive(Debug, Default)]
pub struct ActivationRecord {
    pub function: String,
    values: HashMap<Address, Value>,
}

impl ActivationRecord {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            values: HashMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct ExecutionMemory {
    layout: MemoryLayout,
    globals: HashMap<Address, Value>,
    constants: HashMap<Address, Value>,
    stack: Vec<ActivationRecord>,
    pending: Option<ActivationRecord>,
}

impl ExecutionMemory {
    /// Loads the constant table and opens the activation record of `main`.
    pub fn new(layout: MemoryLayout, constants: &[ConstantEntry]) -> Result<Self, RuntimeError> {
        let mut table = HashMap::with_capacity(constants.len());
        for entry in constants {
            let segment = segment_at(layout, entry.address)?;
            if segment.scope != ScopeClass::Constant {
                return Err(RuntimeError::AddressOutOfRange {
                    address: entry.address,
                });
            }
            table.insert(entry.address, coerce(segment, entry.address, entry.value.clone())?);
        }
        Ok(Self {
            layout,
            globals: HashMap::new(),
            constants: table,
            stack: vec![ActivationRecord::new("main")],
            pending: None,
        })
    }

    /// Number of live activation records, `main` included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn current_function(&self) -> &str {
        self.stack.last().map(|r| r.function.as_str()).unwrap_or("main")
    }

    /// Reads an address. Variables and temporaries that were never written read as
    /// the zero value of their segment type.
    pub fn read(&self, address: Address) -> Result<Value, RuntimeError> {
        let segment = segment_at(self.layout, address)?;
        let stored = match segment.scope {
            ScopeClass::Constant => {
                return self
                    .constants
                    .get(&address)
                    .cloned()
                    .ok_or(RuntimeError::UninitializedConstant { address })
            }
            ScopeClass::Global => self.globals.get(&address),
            ScopeClass::Local | ScopeClass::Temporary => {
                self.stack.last().and_then(|r| r.values.get(&address))
            }
        };
        Ok(stored
            .cloned()
            .unwrap_or_else(|| Value::default_for(segment.ty)))
    }

    pub fn write(&mut self, address: Address, value: Value) -> Result<(), RuntimeError> {
        let segment = segment_at(self.layout, address)?;
        let value = coerce(segment, address, value)?;
        match segment.scope {
            ScopeClass::Constant => Err(RuntimeError::ConstantWrite { address }),
            ScopeClass::Global => {
                self.globals.insert(address, value);
                Ok(())
            }
            ScopeClass::Local | ScopeClass::Temporary => {
                if let Some(record) = self.stack.last_mut() {
                    record.values.insert(address, value);
                }
                Ok(())
            }
        }
    }

    /// Opens a record for `function` without making it current. A second
    /// prepare before the call replaces the first.
    pub fn prepare(&mut self, function: &str) {
        self.pending = Some(ActivationRecord::new(function));
    }

    /// Writes a parameter into the pending record.
    pub fn write_param(&mut self, address: Address, value: Value) -> Result<(), RuntimeError> {
        let segment = segment_at(self.layout, address)?;
        let value = coerce(segment, address, value)?;
        if segment.scope != ScopeClass::Local {
            return Err(RuntimeError::AddressOutOfRange { address });
        }
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| RuntimeError::UnpreparedActivation {
                context: format!("parameter write to {}", address),
            })?;
        pending.values.insert(address, value);
        Ok(())
    }

    /// Makes the pending record current.
    pub fn push_pending(&mut self, function: &str) -> Result<(), RuntimeError> {
        match self.pending.take() {
            Some(record) if record.function == function => {
                self.stack.push(record);
                Ok(())
            }
            other => {
                self.pending = other;
                Err(RuntimeError::UnpreparedActivation {
                    context: format!("call to '{}'", function),
                })
            }
        }
    }

    /// Discards the current record, returning to the caller's.
    pub fn pop_activation(&mut self) -> Result<ActivationRecord, RuntimeError> {
        if self.stack.len() <= 1 {
            return Err(RuntimeError::UnboundReturn);
        }
        self.stack.pop().ok_or(RuntimeError::UnboundReturn)
    }
}

fn segment_at(layout: MemoryLayout, address: Address) -> Result<Segment, RuntimeError> {
    layout
        .segment_of(address)
        .ok_or(RuntimeError::AddressOutOfRange { address })
}

/// Int values widen when stored in a float segment; any other mismatch is a fault.
fn coerce(segment: Segment, address: Address, value: Value) -> Result<Value, RuntimeError> {
    match (segment.ty, value) {
        (Type::Float, Value::Int(n)) => Ok(Value::Float(n as f64)),
        (ty, value) if value.ty() == ty => Ok(value),
        (ty, value) => Err(RuntimeError::SegmentTypeMismatch {
            address,
            expected: ty,
            found: value.ty(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> ExecutionMemory {
        let constants = vec![
            ConstantEntry {
                address: 7000,
                value: Value::Int(42),
            },
            ConstantEntry {
                address: 9000,
                value: Value::Str("hi".into()),
            },
        ];
        ExecutionMemory::new(MemoryLayout::default(), &constants).unwrap()
    }

    #[test]
    fn constants_are_loaded_and_read_only() {
        let mut mem = memory();
        assert_eq!(mem.read(7000).unwrap(), Value::Int(42));
        assert_eq!(mem.read(9000).unwrap(), Value::Str("hi".into()));
        assert!(matches!(
            mem.write(7000, Value::Int(1)),
            Err(RuntimeError::ConstantWrite { address: 7000 })
        ));
        assert!(matches!(
            mem.read(7001),
            Err(RuntimeError::UninitializedConstant { address: 7001 })
        ));
    }

    #[test]
    fn unwritten_slots_read_as_zero_values() {
        let mem = memory();
        assert_eq!(mem.read(1000).unwrap(), Value::Int(0));
        assert_eq!(mem.read(5000).unwrap(), Value::Float(0.0));
        assert_eq!(mem.read(12000).unwrap(), Value::Bool(false));
    }

    #[test]
    fn out_of_range_addresses_fail() {
        let mem = memory();
        assert!(matches!(
            mem.read(5),
            Err(RuntimeError::AddressOutOfRange { address: 5 })
        ));
        assert!(mem.read(14000).is_err());
    }

    #[test]
    fn int_widens_into_float_segment() {
        let mut mem = memory();
        mem.write(2000, Value::Int(3)).unwrap();
        assert_eq!(mem.read(2000).unwrap(), Value::Float(3.0));
        assert!(matches!(
            mem.write(1000, Value::Float(1.5)),
            Err(RuntimeError::SegmentTypeMismatch { .. })
        ));
    }

    #[test]
    fn activation_records_isolate_locals() {
        let mut mem = memory();
        mem.write(4000, Value::Int(1)).unwrap();
        mem.write(1000, Value::Int(9)).unwrap();

        mem.prepare("f");
        mem.write_param(4000, Value::Int(2)).unwrap();
        // The caller still sees its own local until the call happens.
        assert_eq!(mem.read(4000).unwrap(), Value::Int(1));
        mem.push_pending("f").unwrap();
        assert_eq!(mem.depth(), 2);
        assert_eq!(mem.current_function(), "f");
        assert_eq!(mem.read(4000).unwrap(), Value::Int(2));
        assert_eq!(mem.read(1000).unwrap(), Value::Int(9));

        let record = mem.pop_activation().unwrap();
        assert_eq!(record.function, "f");
        assert_eq!(mem.read(4000).unwrap(), Value::Int(1));
    }

    #[test]
    fn call_protocol_violations() {
        let mut mem = memory();
        assert!(matches!(
            mem.write_param(4000, Value::Int(1)),
            Err(RuntimeError::UnpreparedActivation { .. })
        ));
        assert!(matches!(
            mem.push_pending("f"),
            Err(RuntimeError::UnpreparedActivation { .. })
        ));
        assert!(matches!(mem.pop_activation(), Err(RuntimeError::UnboundReturn)));
    }
}
