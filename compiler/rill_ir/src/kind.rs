//! Kinds: the shape of a type, without element or signature details.

use std::fmt;

/// The kind of a type.
///
/// Named types report the kind of their underlying type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Kind {
    #[default]
    Invalid,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    String,
    Map,
    Slice,
    Pointer,
    Func,
}

impl Kind {
    #[inline]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Kind::Int | Kind::Int8 | Kind::Int16 | Kind::Int32 | Kind::Int64
        )
    }

    #[inline]
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Kind::Uint | Kind::Uint8 | Kind::Uint16 | Kind::Uint32 | Kind::Uint64 | Kind::Uintptr
        )
    }

    #[inline]
    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, Kind::Float32 | Kind::Float64)
    }

    #[inline]
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Values of this kind can be compared with `==`.
    pub fn is_comparable(self) -> bool {
        !matches!(self, Kind::Invalid | Kind::Slice | Kind::Map | Kind::Func)
    }

    /// Values of this kind can be ordered with `<`.
    pub fn is_ordered(self) -> bool {
        self.is_numeric() || self == Kind::String
    }

    /// `nil` is a valid value of this kind.
    pub fn is_nilable(self) -> bool {
        matches!(self, Kind::Map | Kind::Slice | Kind::Pointer | Kind::Func)
    }

    /// The value fits one machine word and lives in an unboxed slot.
    #[inline]
    pub fn fits_word(self) -> bool {
        self == Kind::Bool || self.is_numeric()
    }

    /// Width in bits of integer and float kinds, 0 for everything else.
    pub fn bits(self) -> u32 {
        match self {
            Kind::Int8 | Kind::Uint8 => 8,
            Kind::Int16 | Kind::Uint16 => 16,
            Kind::Int32 | Kind::Uint32 | Kind::Float32 => 32,
            Kind::Int | Kind::Int64 | Kind::Uint | Kind::Uint64 | Kind::Uintptr | Kind::Float64 => {
                64
            }
            _ => 0,
        }
    }

    /// Inclusive value range of an integer kind.
    pub fn int_range(self) -> Option<(i128, i128)> {
        let bits = self.bits();
        if self.is_signed() {
            let max = (1i128 << (bits - 1)) - 1;
            Some((-max - 1, max))
        } else if self.is_unsigned() {
            Some((0, (1i128 << bits) - 1))
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Invalid => "invalid",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Int8 => "int8",
            Kind::Int16 => "int16",
            Kind::Int32 => "int32",
            Kind::Int64 => "int64",
            Kind::Uint => "uint",
            Kind::Uint8 => "uint8",
            Kind::Uint16 => "uint16",
            Kind::Uint32 => "uint32",
            Kind::Uint64 => "uint64",
            Kind::Uintptr => "uintptr",
            Kind::Float32 => "float32",
            Kind::Float64 => "float64",
            Kind::String => "string",
            Kind::Map => "map",
            Kind::Slice => "slice",
            Kind::Pointer => "ptr",
            Kind::Func => "func",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
