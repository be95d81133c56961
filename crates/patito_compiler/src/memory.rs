//! Compile-time address allocation.

use crate::error::SemanticError;
use patito_syntax::ast::Type;
use patito_syntax::segment::{Address, MemoryLayout, ScopeClass, Segment};
use std::collections::HashMap;

/// Bump allocator over the segment map. Addresses are never freed: a function's
/// locals and temporaries keep their compile-time addresses, and each call
/// reinterprets them inside a fresh activation record at run time.
#[derive(Debug)]
pub struct VirtualMemory {
    layout: MemoryLayout,
    next: HashMap<Segment, Address>,
}

impl VirtualMemory {
    pub fn new(layout: MemoryLayout) -> Self {
        Self {
            layout,
            next: HashMap::new(),
        }
    }

    pub fn layout(&self) -> MemoryLayout {
        self.layout
    }

    pub fn allocate(&mut self, scope: ScopeClass, ty: Type) -> Result<Address, SemanticError> {
        let segment = Segment { scope, ty };
        let base = self
            .layout
            .base(segment)
            .ok_or_else(|| SemanticError::NoSegment {
                scope: scope.to_string(),
                ty,
            })?;
        let end = self
            .layout
            .end(segment)
            .ok_or(SemanticError::AddressSpaceExhausted { segment })?;
        let next = self.next.entry(segment).or_insert(base);
        if *next >= end {
            return Err(SemanticError::AddressSpaceExhausted { segment });
        }
        let addr = *next;
        *next += 1;
        Ok(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_bump_per_segment() {
        let mut vm = VirtualMemory::new(MemoryLayout::default());
        assert_eq!(vm.allocate(ScopeClass::Global, Type::Int), Ok(1000));
        assert_eq!(vm.allocate(ScopeClass::Global, Type::Int), Ok(1001));
        assert_eq!(vm.allocate(ScopeClass::Global, Type::Float), Ok(2000));
        assert_eq!(vm.allocate(ScopeClass::Temporary, Type::Bool), Ok(12000));
        assert_eq!(vm.allocate(ScopeClass::Local, Type::Int), Ok(4000));
    }

    #[test]
    fn exhausted_segment_is_named() {
        let mut vm = VirtualMemory::new(MemoryLayout::new(2));
        vm.allocate(ScopeClass::Local, Type::Float).unwrap();
        vm.allocate(ScopeClass::Local, Type::Float).unwrap();
        let err = vm.allocate(ScopeClass::Local, Type::Float).unwrap_err();
        assert_eq!(err.to_string(), "address space exhausted in segment local_float");
        // Other segments are unaffected.
        assert!(vm.allocate(ScopeClass::Local, Type::Int).is_ok());
    }

    #[test]
    fn segments_past_the_address_space_are_exhausted() {
        let mut vm = VirtualMemory::new(MemoryLayout::new(400_000_000));
        assert_eq!(vm.allocate(ScopeClass::Global, Type::Int), Ok(400_000_000));
        assert!(matches!(
            vm.allocate(ScopeClass::Temporary, Type::Int),
            Err(SemanticError::AddressSpaceExhausted { .. })
        ));
    }

    #[test]
    fn string_temporaries_have_no_segment() {
        let mut vm = VirtualMemory::new(MemoryLayout::default());
        assert!(matches!(
            vm.allocate(ScopeClass::Temporary, Type::String),
            Err(SemanticError::NoSegment { .. })
        ));
    }
}
