//! Function calls: the boundary that consumes `Return` and
//! `InstallDeferHandler` signals.

use rill_ir::Type;

use crate::env::EnvRef;
use crate::errors::RuntimeError;
use crate::globals::{Deferred, Signal, ThreadGlobals};
use crate::stack::ensure_sufficient_stack;
use crate::stmt::{exec, Exit, Stmt};
use crate::value::{FuncValue, Value, Values};

/// Call `func` with `args` and return its results.
///
/// Allocates the function's frame (unless its scope owns no slots), binds
/// parameters, zeroes results and runs the body. A `defer` pauses the body
/// to move the pending call onto this activation's defer list; a `return`
/// unwinds the body's block frames. Deferred calls then run last-in
/// first-out, and the results are read from the result slots, so deferred
/// closures can still change named results.
pub fn call(func: &FuncValue, args: Values, tg: &mut ThreadGlobals) -> Result<Values, RuntimeError> {
    ensure_sufficient_stack(|| call_inner(func, args, tg))
}

fn call_inner(
    func: &FuncValue,
    args: Values,
    tg: &mut ThreadGlobals,
) -> Result<Values, RuntimeError> {
    let code = func.code();
    tracing::debug!(func = %code.name, args = args.len(), "call");
    check_args(&code.ty.params, &args)?;

    let owns_frame = code.up_cost == 1;
    let base = if owns_frame {
        tg.acquire(&code.shape, func.env())
    } else {
        func.env().clone()
    };
    for (desc, arg) in code.params.iter().zip(args) {
        base.store(*desc, arg);
    }
    for (desc, ty) in &code.results {
        base.store(*desc, Value::zero(ty));
    }

    let mut defers: Vec<Deferred> = Vec::new();
    run_body(&base, &code.code, &mut defers, tg)?;
    while let Some(deferred) = defers.pop() {
        call(&deferred.func, deferred.args, tg)?;
    }

    let results = code
        .results
        .iter()
        .map(|(desc, ty)| base.load(*desc, ty))
        .collect();
    if owns_frame {
        tg.release(base);
    }
    Ok(results)
}

/// Reject arguments that do not match the parameter list. Compiled calls
/// always match; values handed in by an embedder may not.
fn check_args(params: &[Type], args: &[Value]) -> Result<(), RuntimeError> {
    if args.len() != params.len() {
        return Err(RuntimeError::ArgumentCount {
            expected: params.len(),
            found: args.len(),
        });
    }
    for (index, (ty, arg)) in params.iter().zip(args).enumerate() {
        if !arg.fits(ty) {
            return Err(RuntimeError::ArgumentType {
                index,
                expected: ty.kind(),
                found: arg.kind(),
            });
        }
    }
    Ok(())
}

/// Run the body until it falls off the end or returns, collecting defers.
fn run_body(
    base: &EnvRef,
    code: &[Stmt],
    defers: &mut Vec<Deferred>,
    tg: &mut ThreadGlobals,
) -> Result<(), RuntimeError> {
    let mut resume = (base.clone(), 0);
    loop {
        let (env, ip) = resume;
        let Exit::Signaled { env: at, ip: stopped } = exec(&env, code, ip, tg)? else {
            return Ok(());
        };
        drop(env);
        match tg.take_signal() {
            Signal::InstallDeferHandler => {
                if let Some(deferred) = tg.pending_defer.take() {
                    defers.push(deferred);
                }
                resume = (at, stopped + 1);
            }
            Signal::Return => {
                unwind(at, base, tg);
                return Ok(());
            }
            Signal::None => panic!("internal error: transfer without a signal"),
        }
    }
}

/// Release block frames from `env` out to `base`.
fn unwind(mut env: EnvRef, base: &EnvRef, tg: &mut ThreadGlobals) {
    while !env.ptr_eq(base) {
        env = tg.leave(env);
    }
}
