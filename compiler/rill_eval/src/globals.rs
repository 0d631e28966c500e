//! Per-thread execution state.
//!
//! One [`ThreadGlobals`] per logical thread, passed explicitly as `&mut` to
//! every statement and evaluator. It carries the persistent top-level
//! frames, the pending interrupt and transfer signal, and a small pool of
//! reusable frames.

use crate::env::{EnvRef, FrameShape};
use crate::stmt::Stmt;
use crate::value::{FuncValue, Values};

/// Most frames the pool keeps.
pub const POOL_CAPACITY: usize = 32;

/// Pending non-local transfer, consumed by the call boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Signal {
    #[default]
    None,
    /// Results are stored in the function's result slots.
    Return,
    /// A deferred call is waiting in `ThreadGlobals::pending_defer`.
    InstallDeferHandler,
}

/// Frame pool counters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Fresh frames created on scope entry.
    pub allocated: usize,
    /// Pooled frames handed out again.
    pub reused: usize,
    /// Frames returned to the pool.
    pub recycled: usize,
    /// Frames released but kept out of the pool.
    pub discarded: usize,
}

/// A call registered by `defer`, run when its function returns.
#[derive(Debug)]
pub struct Deferred {
    pub func: FuncValue,
    pub args: Values,
}

/// Per-thread globals.
#[derive(Default)]
pub struct ThreadGlobals {
    pub file_env: Option<EnvRef>,
    pub top_env: Option<EnvRef>,
    /// Statement to run in place of the next queued one.
    pub interrupt: Option<Stmt>,
    pub signal: Signal,
    pub pending_defer: Option<Deferred>,
    pool: Vec<EnvRef>,
    stats: PoolStats,
}

impl ThreadGlobals {
    pub fn new() -> Self {
        ThreadGlobals {
            pool: Vec::with_capacity(POOL_CAPACITY),
            ..ThreadGlobals::default()
        }
    }

    /// Read and reset the pending signal.
    #[inline]
    pub fn take_signal(&mut self) -> Signal {
        std::mem::take(&mut self.signal)
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// A zeroed frame of `shape` enclosed by `outer`.
    ///
    /// Shapes that may escape always get a fresh frame.
    pub fn acquire(&mut self, shape: &FrameShape, outer: &EnvRef) -> EnvRef {
        if shape.poolable() {
            while let Some(mut env) = self.pool.pop() {
                if env.get_mut().map(|frame| frame.reset(shape, outer)).is_some() {
                    self.stats.reused += 1;
                    return env;
                }
                self.stats.discarded += 1;
            }
        }
        self.stats.allocated += 1;
        EnvRef::new(shape, Some(outer.clone()))
    }

    /// Hand a frame back after its scope exits normally.
    ///
    /// It is pooled only if nothing captured it, no address into it was
    /// taken, nothing else still holds it, and the pool has room.
    pub fn release(&mut self, mut env: EnvRef) {
        let admissible = !env.used_by_closure()
            && !env.address_taken()
            && self.pool.len() < POOL_CAPACITY;
        if admissible && env.get_mut().map(|frame| frame.clear()).is_some() {
            self.pool.push(env);
            self.stats.recycled += 1;
        } else {
            self.stats.discarded += 1;
            tracing::trace!(pool = self.pool.len(), "frame kept out of pool");
        }
    }

    /// Pop one frame: release `env` and return its enclosing frame.
    ///
    /// # Panics
    /// Panics if `env` is a root frame.
    pub(crate) fn leave(&mut self, env: EnvRef) -> EnvRef {
        let Some(outer) = env.outer().cloned() else {
            panic!("internal error: leaving the root frame");
        };
        self.release(env);
        outer
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn root() -> EnvRef {
        EnvRef::root(&FrameShape::default())
    }

    #[test]
    fn released_frames_are_reused() {
        let mut tg = ThreadGlobals::new();
        let outer = root();
        let shape = FrameShape::new(2, 1);

        let env = tg.acquire(&shape, &outer);
        env.set_word(0, 11);
        tg.release(env);
        let again = tg.acquire(&shape, &outer);
        assert_eq!(again.word(0), 0);
        assert!(again.outer().is_some_and(|o| o.ptr_eq(&outer)));
        assert_eq!(
            tg.stats(),
            PoolStats {
                allocated: 1,
                reused: 1,
                recycled: 1,
                discarded: 0
            }
        );
    }

    #[test]
    fn pool_never_exceeds_capacity() {
        let mut tg = ThreadGlobals::new();
        let outer = root();
        let shape = FrameShape::new(1, 0);
        let frames: Vec<_> = (0..POOL_CAPACITY + 8)
            .map(|_| tg.acquire(&shape, &outer))
            .collect();
        for env in frames {
            tg.release(env);
        }
        assert_eq!(tg.pool_len(), POOL_CAPACITY);
        assert_eq!(tg.stats().discarded, 8);
    }

    #[test]
    fn captured_frames_stay_out_of_the_pool() {
        let mut tg = ThreadGlobals::new();
        let outer = root();
        let env = tg.acquire(&FrameShape::new(1, 0), &outer);
        env.mark_used_by_closure();
        tg.release(env);
        assert_eq!(tg.pool_len(), 0);

        let env = tg.acquire(&FrameShape::new(1, 0), &outer);
        env.mark_address_taken();
        tg.release(env);
        assert_eq!(tg.pool_len(), 0);
    }

    #[test]
    fn shared_frames_stay_out_of_the_pool() {
        let mut tg = ThreadGlobals::new();
        let outer = root();
        let env = tg.acquire(&FrameShape::new(1, 0), &outer);
        let held = env.clone();
        tg.release(env);
        assert_eq!(tg.pool_len(), 0);
        assert_eq!(held.bind_num(), 1);
    }

    #[test]
    fn escaping_shapes_bypass_the_pool() {
        let mut tg = ThreadGlobals::new();
        let outer = root();
        let plain = FrameShape::new(1, 0);
        let env = tg.acquire(&plain, &outer);
        tg.release(env);
        assert_eq!(tg.pool_len(), 1);

        let escaping = FrameShape {
            escapes: true,
            ..plain
        };
        let _fresh = tg.acquire(&escaping, &outer);
        assert_eq!(tg.pool_len(), 1);
        assert_eq!(tg.stats().allocated, 2);
    }

    #[test]
    fn take_signal_resets_to_none() {
        let mut tg = ThreadGlobals::new();
        tg.signal = Signal::Return;
        assert_eq!(tg.take_signal(), Signal::Return);
        assert_eq!(tg.signal, Signal::None);
    }
}
