//! Static types of the interpreted language.
//!
//! The front end hands the core fully resolved types; the core only needs
//! to compare them, ask for their kind, and print them.

use std::fmt;
use std::sync::Arc;

use crate::Kind;

/// A static type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Booleans, numbers and strings.
    Basic(Kind),
    /// `map[K]V`.
    Map(Box<Type>, Box<Type>),
    /// `[]T`.
    Slice(Box<Type>),
    /// `*T`.
    Pointer(Box<Type>),
    /// `func(params) results`.
    Func(FuncType),
    /// A declared type, e.g. `type Celsius float64`.
    Named(Arc<NamedDef>),
}

/// Signature of a function type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct FuncType {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
}

/// Definition of a declared type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NamedDef {
    pub name: Arc<str>,
    pub underlying: Type,
}

impl Type {
    pub const BOOL: Type = Type::Basic(Kind::Bool);
    pub const INT: Type = Type::Basic(Kind::Int);
    pub const INT8: Type = Type::Basic(Kind::Int8);
    pub const INT32: Type = Type::Basic(Kind::Int32);
    pub const INT64: Type = Type::Basic(Kind::Int64);
    pub const UINT: Type = Type::Basic(Kind::Uint);
    pub const UINT8: Type = Type::Basic(Kind::Uint8);
    pub const UINT64: Type = Type::Basic(Kind::Uint64);
    pub const FLOAT32: Type = Type::Basic(Kind::Float32);
    pub const FLOAT64: Type = Type::Basic(Kind::Float64);
    pub const STRING: Type = Type::Basic(Kind::String);

    pub fn map(key: Type, elem: Type) -> Self {
        Type::Map(Box::new(key), Box::new(elem))
    }

    pub fn slice(elem: Type) -> Self {
        Type::Slice(Box::new(elem))
    }

    pub fn pointer(elem: Type) -> Self {
        Type::Pointer(Box::new(elem))
    }

    pub fn func(params: Vec<Type>, results: Vec<Type>) -> Self {
        Type::Func(FuncType { params, results })
    }

    pub fn named(name: &str, underlying: Type) -> Self {
        Type::Named(Arc::new(NamedDef {
            name: Arc::from(name),
            underlying,
        }))
    }

    /// The type with all declared names peeled off.
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Named(def) => def.underlying.underlying(),
            other => other,
        }
    }

    pub fn kind(&self) -> Kind {
        match self.underlying() {
            Type::Basic(kind) => *kind,
            Type::Map(..) => Kind::Map,
            Type::Slice(_) => Kind::Slice,
            Type::Pointer(_) => Kind::Pointer,
            Type::Func(_) => Kind::Func,
            Type::Named(_) => Kind::Invalid,
        }
    }

    /// Values of this type live in an unboxed word slot.
    #[inline]
    pub fn fits_word(&self) -> bool {
        self.kind().fits_word()
    }

    /// Element type of slices, maps and pointers.
    pub fn elem(&self) -> Option<&Type> {
        match self.underlying() {
            Type::Map(_, elem) | Type::Slice(elem) | Type::Pointer(elem) => Some(elem),
            _ => None,
        }
    }

    /// Key type of maps.
    pub fn key(&self) -> Option<&Type> {
        match self.underlying() {
            Type::Map(key, _) => Some(key),
            _ => None,
        }
    }

    /// Signature of function types.
    pub fn signature(&self) -> Option<&FuncType> {
        match self.underlying() {
            Type::Func(sig) => Some(sig),
            _ => None,
        }
    }

    /// Name of a declared type.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Type::Named(def) => Some(&def.name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic(kind) => write!(f, "{kind}"),
            Type::Map(key, elem) => write!(f, "map[{key}]{elem}"),
            Type::Slice(elem) => write!(f, "[]{elem}"),
            Type::Pointer(elem) => write!(f, "*{elem}"),
            Type::Func(sig) => write!(f, "{sig}"),
            Type::Named(def) => f.write_str(&def.name),
        }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")?;
        match self.results.as_slice() {
            [] => Ok(()),
            [one] => write!(f, " {one}"),
            many => {
                write!(f, " (")?;
                for (i, result) in many.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{result}")?;
                }
                write!(f, ")")
            }
        }
    }
}
