//! Interned identifier.
//!
//! Compact 32-bit handles into a [`StringInterner`](crate::StringInterner).

use std::fmt;

/// Interned string identifier.
///
/// Two names are equal iff they were interned from the same string by the
/// same interner. Index 0 is the empty string and index 1 is the discard
/// name `_`; both are pre-interned by every interner.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Pre-interned empty string.
    pub const EMPTY: Name = Name(0);

    /// Pre-interned discard name `_`.
    pub const BLANK: Name = Name(1);

    /// Create from a raw interner index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    /// Get raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Index into the interner's string table.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` for the discard name `_`.
    #[inline]
    pub const fn is_blank(self) -> bool {
        self.0 == Self::BLANK.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}
