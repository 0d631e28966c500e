//! Runtime environments: one frame per activation of a scope that owns
//! slots.
//!
//! A frame has boxed slots for values that need a heap representation and
//! unboxed word slots for booleans, integers and floats. Frames link to
//! their enclosing frame through `outer`; compiled code reaches a binding by
//! walking a hop count fixed at compile time.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rill_ir::Type;

use crate::bind::{BindClass, BindDescriptor};
use crate::value::Value;

/// Slot counts and escape information of a scope, fixed at compile time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct FrameShape {
    pub bind_num: usize,
    pub int_bind_num: usize,
    /// A closure created inside the scope may capture the frame.
    pub escapes: bool,
    /// The address of one of the scope's variables is taken.
    pub address_taken: bool,
}

impl FrameShape {
    pub fn new(bind_num: usize, int_bind_num: usize) -> Self {
        FrameShape {
            bind_num,
            int_bind_num,
            escapes: false,
            address_taken: false,
        }
    }

    /// Frames of this shape may come from and go back to the pool.
    #[inline]
    pub fn poolable(&self) -> bool {
        !self.escapes && !self.address_taken
    }

    #[inline]
    pub fn has_slots(&self) -> bool {
        self.bind_num + self.int_bind_num > 0
    }
}

/// Activation record.
pub struct Env {
    binds: RefCell<Vec<Value>>,
    int_binds: RefCell<Vec<u64>>,
    outer: Option<EnvRef>,
    ip: Cell<usize>,
    used_by_closure: Cell<bool>,
    address_taken: Cell<bool>,
}

impl Env {
    fn new(shape: &FrameShape, outer: Option<EnvRef>) -> Self {
        Env {
            binds: RefCell::new(vec![Value::Nil; shape.bind_num]),
            int_binds: RefCell::new(vec![0; shape.int_bind_num]),
            outer,
            ip: Cell::new(0),
            used_by_closure: Cell::new(false),
            address_taken: Cell::new(false),
        }
    }

    /// Reinitialize a pooled frame for a new activation.
    pub(crate) fn reset(&mut self, shape: &FrameShape, outer: &EnvRef) {
        let binds = self.binds.get_mut();
        binds.clear();
        binds.resize(shape.bind_num, Value::Nil);
        let int_binds = self.int_binds.get_mut();
        int_binds.clear();
        int_binds.resize(shape.int_bind_num, 0);
        self.outer = Some(outer.clone());
        self.ip.set(0);
        self.used_by_closure.set(false);
        self.address_taken.set(false);
    }

    /// Drop everything the frame refers to before it sits in the pool.
    pub(crate) fn clear(&mut self) {
        self.binds.get_mut().clear();
        self.int_binds.get_mut().clear();
        self.outer = None;
    }
}

/// Shared handle to a frame.
#[derive(Clone)]
pub struct EnvRef(Rc<Env>);

impl EnvRef {
    pub fn new(shape: &FrameShape, outer: Option<EnvRef>) -> Self {
        EnvRef(Rc::new(Env::new(shape, outer)))
    }

    /// The root frame of a fresh chain.
    pub fn root(shape: &FrameShape) -> Self {
        Self::new(shape, None)
    }

    #[inline]
    pub fn outer(&self) -> Option<&EnvRef> {
        self.0.outer.as_ref()
    }

    /// The frame `n` outer links up.
    ///
    /// Hop counts come from the compiler and are trusted.
    ///
    /// # Panics
    /// Panics if the chain is shorter than `n`.
    #[inline]
    pub fn up(&self, n: usize) -> &EnvRef {
        let mut env = self;
        for _ in 0..n {
            env = match &env.0.outer {
                Some(outer) => outer,
                None => panic!("internal error: hop count {n} walks past the root frame"),
            };
        }
        env
    }

    /// Number of frames on the chain, this one included.
    pub fn chain_len(&self) -> usize {
        let mut len = 1;
        let mut env = self;
        while let Some(outer) = env.outer() {
            len += 1;
            env = outer;
        }
        len
    }

    #[inline]
    pub fn ptr_eq(&self, other: &EnvRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// No other handle refers to this frame.
    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        Rc::strong_count(&self.0) == 1 && Rc::weak_count(&self.0) == 0
    }

    pub(crate) fn get_mut(&mut self) -> Option<&mut Env> {
        Rc::get_mut(&mut self.0)
    }

    #[inline]
    pub fn ip(&self) -> usize {
        self.0.ip.get()
    }

    #[inline]
    pub fn set_ip(&self, ip: usize) {
        self.0.ip.set(ip);
    }

    #[inline]
    pub fn used_by_closure(&self) -> bool {
        self.0.used_by_closure.get()
    }

    /// Flag this frame and every enclosing one as captured.
    pub fn mark_used_by_closure(&self) {
        let mut env = Some(self);
        while let Some(frame) = env {
            // Outer frames of a flagged frame are already flagged.
            if frame.0.used_by_closure.replace(true) {
                break;
            }
            env = frame.outer();
        }
    }

    #[inline]
    pub fn address_taken(&self) -> bool {
        self.0.address_taken.get()
    }

    #[inline]
    pub fn mark_address_taken(&self) {
        self.0.address_taken.set(true);
    }

    pub fn bind_num(&self) -> usize {
        self.0.binds.borrow().len()
    }

    pub fn int_bind_num(&self) -> usize {
        self.0.int_binds.borrow().len()
    }

    /// Extend the slot arrays to `shape`, keeping existing values.
    ///
    /// Persistent top-level frames grow as declarations accumulate.
    pub fn grow(&self, shape: &FrameShape) {
        let mut binds = self.0.binds.borrow_mut();
        if binds.len() < shape.bind_num {
            binds.resize(shape.bind_num, Value::Nil);
        }
        let mut int_binds = self.0.int_binds.borrow_mut();
        if int_binds.len() < shape.int_bind_num {
            int_binds.resize(shape.int_bind_num, 0);
        }
    }

    #[inline]
    pub fn slot(&self, index: usize) -> Value {
        self.0.binds.borrow()[index].clone()
    }

    #[inline]
    pub fn set_slot(&self, index: usize, value: Value) {
        self.0.binds.borrow_mut()[index] = value;
    }

    #[inline]
    pub fn word(&self, index: usize) -> u64 {
        self.0.int_binds.borrow()[index]
    }

    #[inline]
    pub fn set_word(&self, index: usize, word: u64) {
        self.0.int_binds.borrow_mut()[index] = word;
    }

    /// Read the binding `desc` of this frame as a value of type `ty`.
    pub fn load(&self, desc: BindDescriptor, ty: &Type) -> Value {
        match (desc.class(), desc.slot()) {
            (BindClass::Int, Some(index)) => Value::from_word(ty.kind(), self.word(index)),
            (BindClass::Var | BindClass::Func, Some(index)) => self.slot(index),
            _ => Value::zero(ty),
        }
    }

    /// Write the binding `desc` of this frame; discard bindings drop `value`.
    pub fn store(&self, desc: BindDescriptor, value: Value) {
        match (desc.class(), desc.slot()) {
            (BindClass::Int, Some(index)) => self.set_word(index, value.to_word()),
            (BindClass::Var | BindClass::Func, Some(index)) => self.set_slot(index, value),
            _ => {}
        }
    }
}

impl fmt::Debug for EnvRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("binds", &self.bind_num())
            .field("int_binds", &self.int_bind_num())
            .field("chain_len", &self.chain_len())
            .field("used_by_closure", &self.used_by_closure())
            .field("address_taken", &self.address_taken())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chain(depth: usize) -> EnvRef {
        let mut env = EnvRef::root(&FrameShape::default());
        for _ in 0..depth {
            env = EnvRef::new(&FrameShape::new(1, 1), Some(env));
        }
        env
    }

    #[test]
    fn up_walks_exactly_n_links() {
        let env = chain(3);
        assert_eq!(env.chain_len(), 4);
        assert!(env.up(0).ptr_eq(&env));
        assert_eq!(env.up(3).chain_len(), 1);
        assert!(env.up(3).outer().is_none());
    }

    #[test]
    #[should_panic(expected = "internal error")]
    fn hop_past_the_root_panics() {
        let env = chain(1);
        let _ = env.up(2);
    }

    #[test]
    fn word_slots_round_trip_by_kind() {
        let env = EnvRef::root(&FrameShape::new(1, 3));
        let int = BindDescriptor::new(BindClass::Int, 1);
        let float = BindDescriptor::new(BindClass::Int, 2);
        let flag = BindDescriptor::new(BindClass::Int, 3);
        env.store(int, Value::Int(-5));
        env.store(float, Value::Float(2.5));
        env.store(flag, Value::Bool(true));
        assert_eq!(env.load(int, &Type::INT), Value::Int(-5));
        assert_eq!(env.load(float, &Type::FLOAT64), Value::Float(2.5));
        assert_eq!(env.load(flag, &Type::BOOL), Value::Bool(true));

        let boxed = BindDescriptor::new(BindClass::Var, 1);
        env.store(boxed, Value::Str("hi".into()));
        assert_eq!(env.load(boxed, &Type::STRING), Value::Str("hi".into()));
    }

    #[test]
    fn discard_binding_stores_nothing() {
        let env = EnvRef::root(&FrameShape::new(1, 1));
        let discard = BindDescriptor::new(BindClass::Int, BindDescriptor::NO_INDEX);
        env.store(discard, Value::Int(9));
        assert_eq!(env.word(0), 0);
        assert_eq!(env.load(discard, &Type::INT), Value::Int(0));
    }

    #[test]
    fn closure_marking_reaches_the_root() {
        let env = chain(2);
        env.mark_used_by_closure();
        assert!(env.used_by_closure());
        assert!(env.up(1).used_by_closure());
        assert!(env.up(2).used_by_closure());
    }

    #[test]
    fn grow_keeps_existing_values() {
        let env = EnvRef::root(&FrameShape::new(0, 1));
        env.set_word(0, 7);
        env.grow(&FrameShape::new(2, 3));
        assert_eq!(env.word(0), 7);
        assert_eq!(env.bind_num(), 2);
        assert_eq!(env.int_bind_num(), 3);
    }

    #[test]
    fn reset_zeroes_a_unique_frame() {
        let outer = EnvRef::root(&FrameShape::default());
        let mut env = EnvRef::new(&FrameShape::new(1, 1), Some(outer.clone()));
        env.set_word(0, 3);
        env.mark_address_taken();
        let frame = env.get_mut().unwrap();
        frame.reset(&FrameShape::new(2, 1), &outer);
        assert_eq!(env.word(0), 0);
        assert_eq!(env.bind_num(), 2);
        assert!(!env.address_taken());
    }
}
