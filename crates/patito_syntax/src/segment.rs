//! Partitioning of the flat virtual address space into typed segments.
//!
//! Every segment is a contiguous range of `size` addresses dedicated to one
//! (scope class, type) pair. Segment `i` in [`SEGMENTS`] starts at `(i + 1) * size`,
//! so an address alone identifies its scope class and type. Both the compiler (when
//! issuing addresses) and the VM (when resolving them) derive ranges from the same
//! [`MemoryLayout`].

use crate::ast::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A virtual address.
pub type Address = u32;

pub const DEFAULT_SEGMENT_SIZE: u32 = 1000;

/// Lifetime / visibility class of an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeClass {
    Global,
    Local,
    Constant,
    Temporary,
}

impl fmt::Display for ScopeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeClass::Global => "global",
            ScopeClass::Local => "local",
            ScopeClass::Constant => "const",
            ScopeClass::Temporary => "temp",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Segment {
    pub scope: ScopeClass,
    pub ty: Type,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.scope, self.ty)
    }
}

const fn seg(scope: ScopeClass, ty: Type) -> Segment {
    Segment { scope, ty }
}

/// Segment order; the index fixes the base address. Const bool sits last so the
/// classic twelve-segment map keeps its ranges.
pub const SEGMENTS: [Segment; 13] = [
    seg(ScopeClass::Global, Type::Int),
    seg(ScopeClass::Global, Type::Float),
    seg(ScopeClass::Global, Type::Bool),
    seg(ScopeClass::Local, Type::Int),
    seg(ScopeClass::Local, Type::Float),
    seg(ScopeClass::Local, Type::Bool),
    seg(ScopeClass::Constant, Type::Int),
    seg(ScopeClass::Constant, Type::Float),
    seg(ScopeClass::Constant, Type::String),
    seg(ScopeClass::Temporary, Type::Int),
    seg(ScopeClass::Temporary, Type::Float),
    seg(ScopeClass::Temporary, Type::Bool),
    seg(ScopeClass::Constant, Type::Bool),
];

/// Largest segment size whose whole map, including the unused range below the
/// first segment, fits in an [`Address`].
pub const MAX_SEGMENT_SIZE: u32 = u32::MAX / (SEGMENTS.len() as u32 + 1);

/// Address ranges for a given segment size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryLayout {
    segment_size: u32,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_SIZE)
    }
}

impl MemoryLayout {
    pub fn new(segment_size: u32) -> Self {
        Self {
            segment_size: segment_size.max(1),
        }
    }

    /// `None` unless `1 <= segment_size <= MAX_SEGMENT_SIZE`.
    pub fn checked(segment_size: u32) -> Option<Self> {
        (1..=MAX_SEGMENT_SIZE)
            .contains(&segment_size)
            .then_some(Self { segment_size })
    }

    pub fn segment_size(&self) -> u32 {
        self.segment_size
    }

    fn index_of(segment: Segment) -> Option<usize> {
        SEGMENTS.iter().position(|s| *s == segment)
    }

    /// First address of `segment`, or `None` when no segment holds that
    /// (scope class, type) pair or the base does not fit in an address.
    pub fn base(&self, segment: Segment) -> Option<Address> {
        let index = Self::index_of(segment)? as u32;
        (index + 1).checked_mul(self.segment_size)
    }

    /// One past the last address of `segment`.
    pub fn end(&self, segment: Segment) -> Option<Address> {
        self.base(segment)?.checked_add(self.segment_size)
    }

    /// The segment `addr` falls into.
    pub fn segment_of(&self, addr: Address) -> Option<Segment> {
        let index = (addr / self.segment_size).checked_sub(1)? as usize;
        SEGMENTS.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_classic_ranges() {
        let layout = MemoryLayout::default();
        assert_eq!(layout.base(seg(ScopeClass::Global, Type::Int)), Some(1000));
        assert_eq!(layout.base(seg(ScopeClass::Local, Type::Float)), Some(5000));
        assert_eq!(layout.base(seg(ScopeClass::Constant, Type::String)), Some(9000));
        assert_eq!(layout.base(seg(ScopeClass::Temporary, Type::Bool)), Some(12000));
        assert_eq!(layout.base(seg(ScopeClass::Constant, Type::Bool)), Some(13000));
    }

    #[test]
    fn address_determines_segment() {
        let layout = MemoryLayout::default();
        assert_eq!(
            layout.segment_of(2999),
            Some(seg(ScopeClass::Global, Type::Float))
        );
        assert_eq!(
            layout.segment_of(10000),
            Some(seg(ScopeClass::Temporary, Type::Int))
        );
        assert_eq!(layout.segment_of(999), None);
        assert_eq!(layout.segment_of(14000), None);
    }

    #[test]
    fn segments_without_storage_have_no_base() {
        let layout = MemoryLayout::default();
        assert_eq!(layout.base(seg(ScopeClass::Global, Type::String)), None);
        assert_eq!(layout.base(seg(ScopeClass::Temporary, Type::String)), None);
    }

    #[test]
    fn oversized_segments_are_rejected() {
        assert!(MemoryLayout::checked(0).is_none());
        assert!(MemoryLayout::checked(400_000_000).is_none());
        let largest = MemoryLayout::checked(MAX_SEGMENT_SIZE).unwrap();
        let last = seg(ScopeClass::Constant, Type::Bool);
        assert_eq!(largest.base(last), Some(13 * MAX_SEGMENT_SIZE));
        assert_eq!(largest.end(last), Some(14 * MAX_SEGMENT_SIZE));
        assert_eq!(largest.segment_of(u32::MAX), None);
    }

    #[test]
    fn unchecked_oversized_layout_has_no_bases() {
        let layout = MemoryLayout::new(400_000_000);
        assert_eq!(layout.base(seg(ScopeClass::Global, Type::Int)), Some(400_000_000));
        assert_eq!(layout.base(seg(ScopeClass::Constant, Type::Bool)), None);
        assert_eq!(layout.end(seg(ScopeClass::Temporary, Type::Int)), None);
    }

    #[test]
    fn custom_segment_size_scales_ranges() {
        let layout = MemoryLayout::new(100);
        assert_eq!(layout.base(seg(ScopeClass::Local, Type::Int)), Some(400));
        assert_eq!(
            layout.segment_of(450),
            Some(seg(ScopeClass::Local, Type::Int))
        );
    }
}
