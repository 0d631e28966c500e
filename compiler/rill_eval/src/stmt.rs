//! Compiled statements and the execution loop.
//!
//! A statement is a closure that runs against the current frame and returns
//! a [`Flow`] naming the next program point. [`exec`] drives a statement
//! list with an explicit loop, so nested blocks, loops and gotos never grow
//! the native stack. Only calls recurse.

use std::sync::{Arc, OnceLock};

use crate::env::{EnvRef, FrameShape};
use crate::errors::RuntimeError;
use crate::globals::{Signal, ThreadGlobals};

/// Compiled statement.
pub type Stmt = Arc<dyn Fn(&EnvRef, &mut ThreadGlobals) -> Result<Flow, RuntimeError> + Send + Sync>;

/// Flat statement list of one function body or top-level chunk.
///
/// Blocks are laid out inline; jump targets are absolute indices.
pub type StmtList = Arc<[Stmt]>;

/// What to run after a statement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Fall through to the following statement.
    Next,
    /// Leave `up` frames, then continue at `ip`.
    Jump { up: usize, ip: usize },
    /// Push a frame of `shape` and continue with the following statement
    /// inside it.
    Enter(FrameShape),
    /// A non-local transfer is pending; stop at the nearest boundary.
    Transfer(Signal),
}

/// How a run of [`exec`] ended.
#[derive(Debug)]
pub enum Exit {
    /// Ran off the end of the statement list.
    Finished,
    /// Stopped on a transfer; `ThreadGlobals::signal` says which. `env` and
    /// `ip` locate the statement that raised it.
    Signaled { env: EnvRef, ip: usize },
}

/// Run `code` from `ip` in `env` until it finishes or signals.
///
/// A pending interrupt runs in place of the next queued statement; if it
/// yields [`Flow::Next`] the displaced statement then runs, otherwise its
/// flow is applied instead.
pub fn exec(
    env: &EnvRef,
    code: &[Stmt],
    ip: usize,
    tg: &mut ThreadGlobals,
) -> Result<Exit, RuntimeError> {
    let mut env = env.clone();
    let mut ip = ip;
    while let Some(stmt) = code.get(ip) {
        let flow = match tg.interrupt.take() {
            Some(interrupt) => match interrupt(&env, tg)? {
                Flow::Next => stmt(&env, tg)?,
                redirected => redirected,
            },
            None => stmt(&env, tg)?,
        };
        match flow {
            Flow::Next => ip += 1,
            Flow::Jump { up, ip: target } => {
                for _ in 0..up {
                    env = tg.leave(env);
                }
                ip = target;
            }
            Flow::Enter(shape) => {
                env = tg.acquire(&shape, &env);
                ip += 1;
            }
            Flow::Transfer(signal) => {
                tg.signal = signal;
                env.set_ip(ip);
                return Ok(Exit::Signaled { env, ip });
            }
        }
    }
    Ok(Exit::Finished)
}

/// Forward-patchable jump destination.
///
/// Break, continue and goto statements are compiled before the position
/// they jump to is known; the target is filled in once when it is.
#[derive(Clone, Debug, Default)]
pub struct JumpTarget(Arc<OnceLock<usize>>);

impl JumpTarget {
    pub fn new() -> Self {
        JumpTarget::default()
    }

    /// Fix the destination. Each target is fixed exactly once; a second
    /// call keeps the first value and trips a debug assertion.
    pub fn set(&self, ip: usize) {
        let fresh = self.0.set(ip).is_ok();
        debug_assert!(fresh, "internal error: jump target set twice");
    }

    pub fn is_set(&self) -> bool {
        self.0.get().is_some()
    }

    /// # Panics
    /// Panics if the destination was never fixed.
    #[inline]
    pub fn get(&self) -> usize {
        match self.0.get() {
            Some(ip) => *ip,
            None => panic!("internal error: jump target never set"),
        }
    }

    /// Statement leaving `up` frames and jumping here.
    pub fn jump(&self, up: usize) -> Stmt {
        let target = self.clone();
        Arc::new(move |_, _| Ok(Flow::Jump { up, ip: target.get() }))
    }
}

/// Statement that pushes a frame of `shape`.
pub(crate) fn enter(shape: FrameShape) -> Stmt {
    Arc::new(move |_, _| Ok(Flow::Enter(shape)))
}

/// Statement that pops one frame and continues at `next`.
pub(crate) fn leave(next: usize) -> Stmt {
    Arc::new(move |_, _| Ok(Flow::Jump { up: 1, ip: next }))
}
