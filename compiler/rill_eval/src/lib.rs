//! Rill Eval - Closure compiler and runtime environment engine.
//!
//! Syntax nodes from `rill_ir` compile once into trees of closures; running
//! a program means calling those closures against a chain of frames.
//!
//! # Architecture
//!
//! - `Compiler` / `Comp`: scope stack, name resolution, hop counts
//! - `BindDescriptor`: binding class and slot index in one `u32`
//! - `EnvRef`: runtime frame with boxed and unboxed slots
//! - `exec`: flat statement lists driven by an explicit loop
//! - `ThreadGlobals`: per-thread signals, defers and the frame pool
//! - `Program` / `Interp`: whole-program and incremental embedding
//!
//! Compiled code is `Send + Sync` and shared between threads; frames and
//! values are single-threaded and live in one thread's `ThreadGlobals`.

mod bind;
mod call;
pub mod comp;
mod env;
pub mod errors;
mod expr;
mod globals;
mod interp;
pub mod ops;
mod place;
mod stack;
mod stmt;
mod value;

pub use bind::{Bind, BindClass, BindDescriptor, NamedType, Var};
pub use call::call;
pub use comp::{CompileOptions, Compiler, ScopeKind, ANY_DEPTH, FILE_DEPTH, TOP_DEPTH};
pub use env::{EnvRef, FrameShape};
pub use errors::{CompileError, Error, RuntimeError};
pub use expr::{Eval, EvalMulti, Expr, Fun};
pub use globals::{Deferred, PoolStats, Signal, ThreadGlobals, POOL_CAPACITY};
pub use interp::{Interp, InterpBuilder, Program};
pub use place::{KeyFn, Location, Place, PlaceFn, Target};
pub use stack::ensure_sufficient_stack;
pub use stmt::{exec, Exit, Flow, JumpTarget, Stmt, StmtList};
pub use value::{Address, FuncCode, FuncValue, Key, MapRef, SliceRef, Value, Values};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call more than once. Enable with `RUST_LOG=rill_eval=debug` or
/// `RUST_LOG=rill_eval=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
