//! Bindings: what a name resolves to at compile time.
//!
//! A [`BindDescriptor`] packs the binding class and its slot index into one
//! `u32`. Compiled closures capture descriptors (and hop counts, see
//! [`Var`]) so that runtime slot access is two array lookups away.

use std::fmt;

use rill_ir::{Lit, Type};

use crate::env::EnvRef;
use crate::value::{Address, Value};

/// Storage class of a binding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BindClass {
    /// Compile-time constant, no storage.
    Const = 0,
    /// Declared function, boxed slot.
    Func = 1,
    /// Variable in a boxed slot.
    Var = 2,
    /// Variable in an unboxed word slot.
    Int = 3,
}

impl BindClass {
    #[inline]
    const fn from_bits(bits: u32) -> Self {
        match bits & BindDescriptor::CLASS_MASK {
            0 => BindClass::Const,
            1 => BindClass::Func,
            2 => BindClass::Var,
            _ => BindClass::Int,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BindClass::Const => "const",
            BindClass::Func => "func",
            BindClass::Var => "var",
            BindClass::Int => "intvar",
        }
    }
}

impl fmt::Display for BindClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Class and slot index of a binding, packed as `index << 2 | class`.
///
/// Index 0 means "no storage" and is used only by the discard name `_`; real
/// variables and functions are numbered from 1. The all-zero descriptor is
/// shared by every constant.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct BindDescriptor(u32);

impl BindDescriptor {
    const CLASS_BITS: u32 = 2;
    const CLASS_MASK: u32 = (1 << Self::CLASS_BITS) - 1;

    /// Descriptor of every constant.
    pub const CONST: BindDescriptor = BindDescriptor(0);

    /// Slot index meaning "no storage".
    pub const NO_INDEX: u32 = 0;

    /// Largest representable slot index.
    pub const MAX_INDEX: u32 = u32::MAX >> Self::CLASS_BITS;

    #[inline]
    pub const fn new(class: BindClass, index: u32) -> Self {
        debug_assert!(index <= Self::MAX_INDEX, "binding index overflow");
        BindDescriptor((index << Self::CLASS_BITS) | class as u32)
    }

    #[inline]
    pub const fn class(self) -> BindClass {
        BindClass::from_bits(self.0)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0 >> Self::CLASS_BITS
    }

    /// Slot position in the frame, `None` for discard and constant bindings.
    #[inline]
    pub(crate) fn slot(self) -> Option<usize> {
        match self.index() {
            Self::NO_INDEX => None,
            index => Some(index as usize - 1),
        }
    }

    /// Assignment is allowed to variables only.
    #[inline]
    pub const fn settable(self) -> bool {
        matches!(self.class(), BindClass::Var | BindClass::Int)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for BindDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class(), self.index())
    }
}

/// A name's compile-time binding: its type (and value, for constants) plus
/// where it lives.
#[derive(Clone, Debug, PartialEq)]
pub struct Bind {
    pub lit: Lit,
    pub desc: BindDescriptor,
}

impl Bind {
    /// Constant binding; always carries the zero descriptor.
    pub fn constant(lit: Lit) -> Self {
        Bind {
            lit,
            desc: BindDescriptor::CONST,
        }
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.desc.class() == BindClass::Const
    }

    /// Declared type, or the default type of an untyped constant.
    pub fn ty(&self) -> Option<Type> {
        self.lit.default_type()
    }

    /// Reference to a settable binding `upn` frames up.
    ///
    /// Constants and functions have no assignable storage.
    pub fn as_var(&self, upn: usize) -> Option<Var> {
        if !self.desc.settable() {
            return None;
        }
        let ty = self.lit.ty.clone()?;
        Some(Var {
            upn,
            desc: self.desc,
            ty,
        })
    }
}

/// A resolved variable reference: hop count, descriptor and type.
///
/// Produced once per access site at compile time.
#[derive(Clone, Debug, PartialEq)]
pub struct Var {
    pub upn: usize,
    pub desc: BindDescriptor,
    pub ty: Type,
}

impl Var {
    /// The discard location `_`.
    pub fn discard(ty: Type) -> Self {
        Var {
            upn: 0,
            desc: BindDescriptor::new(BindClass::Var, BindDescriptor::NO_INDEX),
            ty,
        }
    }

    #[inline]
    pub fn is_discard(&self) -> bool {
        self.desc.index() == BindDescriptor::NO_INDEX
    }

    pub fn load(&self, env: &EnvRef) -> Value {
        env.up(self.upn).load(self.desc, &self.ty)
    }

    pub fn store(&self, env: &EnvRef, value: Value) {
        env.up(self.upn).store(self.desc, value);
    }

    /// Address of the slot, `None` for the discard location.
    pub fn address(&self, env: &EnvRef) -> Option<Address> {
        let index = self.desc.slot()?;
        let frame = env.up(self.upn).clone();
        frame.mark_address_taken();
        Some(match self.desc.class() {
            BindClass::Int => Address::Word {
                frame,
                index,
                kind: self.ty.kind(),
            },
            _ => Address::Slot { frame, index },
        })
    }
}

/// A declared type's name and the path of the package declaring it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedType {
    pub name: String,
    pub path: String,
}

impl fmt::Display for NamedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.path, self.name)
        }
    }
}
