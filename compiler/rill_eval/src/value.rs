//! Runtime values.
//!
//! Values are single-thread: maps, slices, closures and pointers share
//! their referents through `Rc`. Compiled code never captures a `Value`;
//! it captures [`Lit`]s and builds values when it runs, which keeps the
//! compiled closures `Send + Sync`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use rill_ir::{Constant, FuncType, Kind, Lit, LitValue, Type};

use crate::bind::BindDescriptor;
use crate::env::{EnvRef, FrameShape};
use crate::errors::RuntimeError;
use crate::stmt::StmtList;

/// Results of a multi-valued expression or call.
pub type Values = SmallVec<[Value; 2]>;

/// A runtime value.
///
/// Signed integers of every width are `Int`, normalized to their width;
/// unsigned ones are `Uint`. `float32` values are `Float` rounded to single
/// precision. The zero value of maps, slices, pointers and functions is
/// `Nil`.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(Arc<str>),
    Map(MapRef),
    Slice(SliceRef),
    Func(FuncValue),
    Pointer(Address),
}

impl Value {
    /// Zero value of `ty`.
    pub fn zero(ty: &Type) -> Self {
        let kind = ty.kind();
        match kind {
            Kind::Bool => Value::Bool(false),
            Kind::String => Value::Str(Arc::from("")),
            k if k.is_signed() => Value::Int(0),
            k if k.is_unsigned() => Value::Uint(0),
            k if k.is_float() => Value::Float(0.0),
            _ => Value::Nil,
        }
    }

    /// Value of a constant literal.
    ///
    /// Untyped payloads are converted to their default type by the compiler
    /// before they reach here; should one slip through, it maps by payload.
    pub fn from_lit(lit: &Lit) -> Self {
        match &lit.value {
            None => Value::Nil,
            Some(LitValue::Bool(b)) => Value::Bool(*b),
            Some(LitValue::Int(i)) => Value::Int(*i),
            Some(LitValue::Uint(u)) => Value::Uint(*u),
            Some(LitValue::Float(x)) => Value::Float(*x),
            Some(LitValue::String(s)) => Value::Str(Arc::clone(s)),
            Some(LitValue::Untyped(untyped)) => match &untyped.obj {
                Constant::Bool(b) => Value::Bool(*b),
                #[allow(clippy::cast_possible_truncation, reason = "in-range after conversion")]
                Constant::Int(i) => Value::Int(*i as i64),
                Constant::Float(x) => Value::Float(*x),
                Constant::String(s) => Value::Str(Arc::clone(s)),
            },
        }
    }

    /// Kind of the value itself; `Nil` reports `Kind::Invalid`.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Invalid,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int64,
            Value::Uint(_) => Kind::Uint64,
            Value::Float(_) => Kind::Float64,
            Value::Str(_) => Kind::String,
            Value::Map(_) => Kind::Map,
            Value::Slice(_) => Kind::Slice,
            Value::Func(_) => Kind::Func,
            Value::Pointer(_) => Kind::Pointer,
        }
    }

    /// The value can be stored in a variable of type `ty`.
    ///
    /// Nilable kinds also accept `nil`; an invalid type accepts anything.
    pub fn fits(&self, ty: &Type) -> bool {
        let kind = ty.kind();
        match self {
            Value::Nil => kind.is_nilable() || kind == Kind::Invalid,
            Value::Bool(_) => kind == Kind::Bool,
            Value::Int(_) => kind.is_signed(),
            Value::Uint(_) => kind.is_unsigned(),
            Value::Float(_) => kind.is_float(),
            _ if kind == Kind::Invalid => true,
            other => other.kind() == kind,
        }
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Boolean payload; anything else is false.
    #[inline]
    pub fn as_bool(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// Bit pattern stored in an unboxed word slot.
    #[allow(clippy::cast_sign_loss, reason = "two's complement bit pattern")]
    pub fn to_word(&self) -> u64 {
        match self {
            Value::Bool(b) => u64::from(*b),
            Value::Int(i) => *i as u64,
            Value::Uint(u) => *u,
            Value::Float(x) => x.to_bits(),
            _ => 0,
        }
    }

    /// Rebuild a value of `kind` from a word slot.
    #[allow(clippy::cast_possible_wrap, reason = "two's complement bit pattern")]
    pub fn from_word(kind: Kind, word: u64) -> Self {
        match kind {
            Kind::Bool => Value::Bool(word != 0),
            k if k.is_signed() => Value::Int(word as i64),
            k if k.is_unsigned() => Value::Uint(word),
            k if k.is_float() => Value::Float(f64::from_bits(word)),
            _ => Value::Nil,
        }
    }
}

impl PartialEq for Value {
    /// Scalars compare by value; maps, slices and functions by identity;
    /// pointers by the location they name.
    #[allow(clippy::float_cmp, reason = "language equality on floats")]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Slice(a), Value::Slice(b)) => a.ptr_eq(b),
            (Value::Func(a), Value::Func(b)) => a.ptr_eq(b),
            (Value::Pointer(a), Value::Pointer(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Uint(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Map(m) => write!(f, "map[len={}]", m.len()),
            Value::Slice(s) => {
                f.write_str("[")?;
                for (i, item) in s.0.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Func(func) => write!(f, "func {}", func.code().name),
            Value::Pointer(addr) => write!(f, "&{}", addr.load()),
        }
    }
}

/// Hashable map key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Uint(u64),
    /// Bit pattern, with `-0.0` folded into `0.0`.
    Float(u64),
    Str(Arc<str>),
}

impl Key {
    pub fn from_value(value: &Value) -> Result<Key, RuntimeError> {
        match value {
            Value::Bool(b) => Ok(Key::Bool(*b)),
            Value::Int(i) => Ok(Key::Int(*i)),
            Value::Uint(u) => Ok(Key::Uint(*u)),
            Value::Float(x) => Ok(Key::Float((x + 0.0).to_bits())),
            Value::Str(s) => Ok(Key::Str(Arc::clone(s))),
            other => Err(RuntimeError::UnhashableKey { kind: other.kind() }),
        }
    }
}

/// Shared handle to a map.
#[derive(Clone, Debug, Default)]
pub struct MapRef(Rc<RefCell<FxHashMap<Key, Value>>>);

impl MapRef {
    pub fn new() -> Self {
        MapRef::default()
    }

    pub fn get(&self, key: &Key) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: Key, value: Value) {
        self.0.borrow_mut().insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared handle to a slice's backing array.
#[derive(Clone, Debug, Default)]
pub struct SliceRef(Rc<RefCell<Vec<Value>>>);

impl SliceRef {
    pub fn from_vec(items: Vec<Value>) -> Self {
        SliceRef(Rc::new(RefCell::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Replace the element at `index`; `false` if out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.0.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Bounds-checked element index.
    pub fn check_index(&self, index: &Value) -> Result<usize, RuntimeError> {
        let len = self.len();
        let (raw, wide) = match index {
            Value::Int(i) => (*i, i128::from(*i)),
            #[allow(clippy::cast_possible_wrap, reason = "only used in the error message")]
            Value::Uint(u) => (*u as i64, i128::from(*u)),
            _ => (-1, -1),
        };
        match usize::try_from(wide) {
            Ok(i) if i < len => Ok(i),
            _ => Err(RuntimeError::IndexOutOfRange { index: raw, len }),
        }
    }

    #[inline]
    pub fn ptr_eq(&self, other: &SliceRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Compiled body of a function: everything a call needs except the
/// captured environment.
pub struct FuncCode {
    pub name: String,
    /// Shape of the frame a call allocates.
    pub shape: FrameShape,
    /// 1 if the function scope owns a frame, 0 if calls run directly in the
    /// captured environment.
    pub up_cost: usize,
    /// Where each argument goes; discard descriptors drop the argument.
    pub params: Vec<BindDescriptor>,
    /// Result slots, read back after the body and deferred calls finish.
    pub results: Vec<(BindDescriptor, Type)>,
    pub code: StmtList,
    pub ty: FuncType,
}

impl fmt::Debug for FuncCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncCode")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("up_cost", &self.up_cost)
            .field("params", &self.params)
            .field("results", &self.results)
            .field("stmts", &self.code.len())
            .finish()
    }
}

struct Closure {
    code: Arc<FuncCode>,
    env: EnvRef,
}

/// A function value: compiled code plus the environment it closes over.
#[derive(Clone)]
pub struct FuncValue(Rc<Closure>);

impl FuncValue {
    pub fn new(code: Arc<FuncCode>, env: EnvRef) -> Self {
        FuncValue(Rc::new(Closure { code, env }))
    }

    #[inline]
    pub fn code(&self) -> &Arc<FuncCode> {
        &self.0.code
    }

    #[inline]
    pub fn env(&self) -> &EnvRef {
        &self.0.env
    }

    #[inline]
    pub fn ptr_eq(&self, other: &FuncValue) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FuncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuncValue({})", self.0.code.name)
    }
}

/// Target of a pointer.
///
/// Holding an address keeps the frame or backing array alive, which also
/// keeps the frame out of the pool.
#[derive(Clone, Debug)]
pub enum Address {
    /// Unboxed word slot, read back as `kind`.
    Word {
        frame: EnvRef,
        index: usize,
        kind: Kind,
    },
    /// Boxed slot.
    Slot { frame: EnvRef, index: usize },
    /// Slice element.
    Elem { slice: SliceRef, index: usize },
}

impl Address {
    pub fn load(&self) -> Value {
        match self {
            Address::Word { frame, index, kind } => Value::from_word(*kind, frame.word(*index)),
            Address::Slot { frame, index } => frame.slot(*index),
            Address::Elem { slice, index } => slice.get(*index).unwrap_or_default(),
        }
    }

    pub fn store(&self, value: Value) {
        match self {
            Address::Word { frame, index, .. } => frame.set_word(*index, value.to_word()),
            Address::Slot { frame, index } => frame.set_slot(*index, value),
            Address::Elem { slice, index } => {
                slice.set(*index, value);
            }
        }
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Address::Word { frame: a, index: i, .. }, Address::Word { frame: b, index: j, .. })
            | (Address::Slot { frame: a, index: i }, Address::Slot { frame: b, index: j }) => {
                a.ptr_eq(b) && i == j
            }
            (Address::Elem { slice: a, index: i }, Address::Elem { slice: b, index: j }) => {
                a.ptr_eq(b) && i == j
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests;
