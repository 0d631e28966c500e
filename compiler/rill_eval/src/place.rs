//! Settable locations.
//!
//! A [`Place`] is compiled once per assignment target. Plain variables go
//! straight through their [`Var`]. Map elements, slice elements and pointer
//! dereferences carry closures that locate the target at run time; each is
//! invoked exactly once per assignment, so `m[f()] += 1` calls `f` once.

use std::sync::Arc;

use rill_ir::Type;

use crate::bind::Var;
use crate::env::EnvRef;
use crate::errors::RuntimeError;
use crate::globals::ThreadGlobals;
use crate::value::{Address, Key, MapRef, Value};

/// Locates the container or address of a computed place.
pub type PlaceFn =
    Arc<dyn Fn(&EnvRef, &mut ThreadGlobals) -> Result<Location, RuntimeError> + Send + Sync>;

/// Computes the key of a map element place.
pub type KeyFn = Arc<dyn Fn(&EnvRef, &mut ThreadGlobals) -> Result<Key, RuntimeError> + Send + Sync>;

/// What a [`PlaceFn`] yields.
#[derive(Clone, Debug)]
pub enum Location {
    /// Word slot, boxed slot or slice element.
    Addr(Address),
    /// Map holding the element; the key comes from the place's key closure.
    Map(MapRef),
}

/// A place resolved for one assignment.
#[derive(Clone, Debug)]
pub enum Target {
    /// Plain variable in `frame`.
    Frame(EnvRef),
    Addr(Address),
    Entry { map: MapRef, key: Key },
    /// The discard name `_`.
    Discard,
}

/// Settable location.
///
/// `var.ty` is the type of the value stored. For computed places `var` only
/// carries that type.
#[derive(Clone)]
pub struct Place {
    pub var: Var,
    pub fun: Option<PlaceFn>,
    pub map_key: Option<KeyFn>,
}

impl Place {
    /// Plain variable.
    pub fn var(var: Var) -> Self {
        Place {
            var,
            fun: None,
            map_key: None,
        }
    }

    /// Discard place `_` accepting values of `ty`.
    pub fn discard(ty: Type) -> Self {
        Place::var(Var::discard(ty))
    }

    /// Slice element or pointer target.
    pub fn computed(ty: Type, fun: PlaceFn) -> Self {
        Place {
            var: Var::discard(ty),
            fun: Some(fun),
            map_key: None,
        }
    }

    /// Map element.
    pub fn map_elem(ty: Type, fun: PlaceFn, map_key: KeyFn) -> Self {
        Place {
            var: Var::discard(ty),
            fun: Some(fun),
            map_key: Some(map_key),
        }
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.var.ty
    }

    #[inline]
    pub fn is_map_elem(&self) -> bool {
        self.map_key.is_some()
    }

    /// Run the locating closures, once each.
    pub fn target(&self, env: &EnvRef, tg: &mut ThreadGlobals) -> Result<Target, RuntimeError> {
        let Some(fun) = &self.fun else {
            if self.var.is_discard() {
                return Ok(Target::Discard);
            }
            return Ok(Target::Frame(env.up(self.var.upn).clone()));
        };
        match fun(env, tg)? {
            Location::Addr(addr) => Ok(Target::Addr(addr)),
            Location::Map(map) => {
                let key = match &self.map_key {
                    Some(map_key) => map_key(env, tg)?,
                    None => panic!("internal error: map element place without a key"),
                };
                Ok(Target::Entry { map, key })
            }
        }
    }

    /// Current value at a resolved target; missing map entries read as zero.
    pub fn load(&self, target: &Target) -> Value {
        match target {
            Target::Frame(frame) => frame.load(self.var.desc, &self.var.ty),
            Target::Addr(addr) => addr.load(),
            Target::Entry { map, key } => map.get(key).unwrap_or_else(|| Value::zero(&self.var.ty)),
            Target::Discard => Value::zero(&self.var.ty),
        }
    }

    pub fn store(&self, target: &Target, value: Value) {
        match target {
            Target::Frame(frame) => frame.store(self.var.desc, value),
            Target::Addr(addr) => addr.store(value),
            Target::Entry { map, key } => map.insert(key.clone(), value),
            Target::Discard => {}
        }
    }

    /// Address of the place, for `&x`.
    ///
    /// # Panics
    /// Panics for map elements and `_`, which the compiler refuses to
    /// address.
    pub fn address(&self, env: &EnvRef, tg: &mut ThreadGlobals) -> Result<Address, RuntimeError> {
        match self.target(env, tg)? {
            Target::Addr(addr) => Ok(addr),
            Target::Frame(_) => match self.var.address(env) {
                Some(addr) => Ok(addr),
                None => panic!("internal error: address of a slotless variable"),
            },
            Target::Entry { .. } | Target::Discard => {
                panic!("internal error: address of an unaddressable place")
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::bind::{BindClass, BindDescriptor};
    use crate::env::FrameShape;
    use crate::value::SliceRef;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn plain_variable_round_trip() {
        let env = EnvRef::root(&FrameShape::new(0, 1));
        let inner = EnvRef::new(&FrameShape::default(), Some(env.clone()));
        let place = Place::var(Var {
            upn: 1,
            desc: BindDescriptor::new(BindClass::Int, 1),
            ty: Type::INT,
        });
        let mut tg = ThreadGlobals::new();
        let target = place.target(&inner, &mut tg).unwrap();
        place.store(&target, Value::Int(12));
        assert_eq!(place.load(&target), Value::Int(12));
        assert_eq!(env.word(0), 12);
    }

    #[test]
    fn discard_swallows_stores() {
        let env = EnvRef::root(&FrameShape::default());
        let place = Place::discard(Type::STRING);
        let mut tg = ThreadGlobals::new();
        let target = place.target(&env, &mut tg).unwrap();
        assert!(matches!(target, Target::Discard));
        place.store(&target, Value::Str("gone".into()));
        assert_eq!(place.load(&target), Value::Str("".into()));
    }

    #[test]
    fn map_element_locates_once() {
        static LOCATES: AtomicUsize = AtomicUsize::new(0);
        static KEYS: AtomicUsize = AtomicUsize::new(0);

        let map = MapRef::new();
        let shared = map.clone();
        let env = EnvRef::root(&FrameShape::new(1, 0));
        env.set_slot(0, Value::Map(shared));

        let place = Place::map_elem(
            Type::INT,
            Arc::new(|env: &EnvRef, _: &mut ThreadGlobals| {
                LOCATES.fetch_add(1, Ordering::SeqCst);
                match env.slot(0) {
                    Value::Map(map) => Ok(Location::Map(map)),
                    _ => Err(RuntimeError::NilMapAssign),
                }
            }),
            Arc::new(|_: &EnvRef, _: &mut ThreadGlobals| {
                KEYS.fetch_add(1, Ordering::SeqCst);
                Ok(Key::Str("k".into()))
            }),
        );
        let mut tg = ThreadGlobals::new();
        let target = place.target(&env, &mut tg).unwrap();
        let old = place.load(&target);
        assert_eq!(old, Value::Int(0));
        place.store(&target, Value::Int(1));

        assert_eq!(LOCATES.load(Ordering::SeqCst), 1);
        assert_eq!(KEYS.load(Ordering::SeqCst), 1);
        assert_eq!(map.get(&Key::Str("k".into())), Some(Value::Int(1)));
    }

    #[test]
    fn slice_element_address() {
        let slice = SliceRef::from_vec(vec![Value::Int(1), Value::Int(2)]);
        let env = EnvRef::root(&FrameShape::new(1, 0));
        env.set_slot(0, Value::Slice(slice.clone()));
        let place = Place::computed(
            Type::INT,
            Arc::new(|env: &EnvRef, _: &mut ThreadGlobals| match env.slot(0) {
                Value::Slice(slice) => Ok(Location::Addr(Address::Elem { slice, index: 1 })),
                _ => Err(RuntimeError::NilDereference),
            }),
        );
        let mut tg = ThreadGlobals::new();
        let addr = place.address(&env, &mut tg).unwrap();
        addr.store(Value::Int(20));
        assert_eq!(slice.get(1), Some(Value::Int(20)));
        assert_eq!(addr.load(), Value::Int(20));
    }
}
