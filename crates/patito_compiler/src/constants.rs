//! Constant pool: one address per distinct literal value.

use crate::error::SemanticError;
use crate::memory::VirtualMemory;
use patito_syntax::ast::Literal;
use patito_syntax::ir::{ConstantEntry, Value};
use patito_syntax::segment::{Address, ScopeClass};
use std::collections::HashMap;

/// Floats are keyed by bit pattern so `1.0` and `1.0` share a slot while `0.0`
/// and `-0.0` do not.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ConstKey {
    Int(i64),
    Float(u64),
    Bool(bool),
    Str(String),
}

impl From<&Value> for ConstKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Int(n) => ConstKey::Int(*n),
            Value::Float(x) => ConstKey::Float(x.to_bits()),
            Value::Bool(b) => ConstKey::Bool(*b),
            Value::Str(s) => ConstKey::Str(s.clone()),
        }
    }
}

pub fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(x) => Value::Float(*x),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::String(s) => Value::Str(s.clone()),
    }
}

#[derive(Debug, Default)]
pub struct ConstantPool {
    index: HashMap<ConstKey, Address>,
    entries: Vec<ConstantEntry>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the address holding `value`, allocating one on first sight.
    pub fn intern(&mut self, memory: &mut VirtualMemory, value: Value) -> Result<Address, SemanticError> {
        let key = ConstKey::from(&value);
        if let Some(&addr) = self.index.get(&key) {
            return Ok(addr);
        }
        let address = memory.allocate(ScopeClass::Constant, value.ty())?;
        self.index.insert(key, address);
        self.entries.push(ConstantEntry { address, value });
        Ok(address)
    }

    /// Entries in allocation order.
    pub fn into_entries(self) -> Vec<ConstantEntry> {
        self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
