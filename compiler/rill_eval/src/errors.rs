//! Compile-time and runtime errors.
//!
//! Internal consistency violations (a hop count past the root frame, an
//! up-cost that changed while its scope compiled, an unset jump target) are
//! not represented here: they are bugs in the compiler and panic with an
//! `internal error:` message.

use rill_ir::{ConvertError, Kind};

/// Error reported while compiling syntax nodes into closures.
///
/// A failed compile aborts the enclosing scope; nothing it produced runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("undefined: {name} (scope depth {depth})")]
    Undefined { name: String, depth: i32 },

    #[error("{name} redeclared in this block")]
    Redeclared { name: String },

    #[error("cannot assign to {name}")]
    NotSettable { name: String },

    #[error("cannot use _ as value")]
    BlankUse,

    #[error("mismatched types: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("assignment mismatch: {expected} variables but {found} values")]
    AssignCount { expected: usize, found: usize },

    #[error("no new variables on left side of :=")]
    NoNewVariables,

    #[error("{stmt} is not in a loop")]
    NotInLoop { stmt: &'static str },

    #[error("label {label} not defined")]
    UndefinedLabel { label: String },

    #[error("label {label} already defined")]
    DuplicateLabel { label: String },

    #[error("{stmt} outside function body")]
    OutsideFunction { stmt: &'static str },

    #[error("too many bindings in one scope, max is {max}")]
    TooManyBindings { max: u32 },

    #[error("invalid operation: operator {op} not defined on {ty}")]
    InvalidOperation { op: &'static str, ty: String },

    #[error("cannot call non-function of type {ty}")]
    NotCallable { ty: String },

    #[error("wrong argument count: expected {expected}, found {found}")]
    ArgCount { expected: usize, found: usize },

    #[error("cannot take the address of {what}")]
    NotAddressable { what: String },

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Error raised while running compiled code.
///
/// Runtime errors propagate as `Err` through `exec` and `call`; the deferred
/// calls of an activation that errors do not run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("integer divide by zero")]
    DivisionByZero,

    #[error("index out of range [{index}] with length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("assignment to entry in nil map")]
    NilMapAssign,

    #[error("invalid memory address or nil pointer dereference")]
    NilDereference,

    #[error("call of nil function")]
    NilFuncCall,

    #[error("hash of unhashable type {kind}")]
    UnhashableKey { kind: Kind },

    #[error("wrong argument count: expected {expected}, found {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("argument {index}: cannot use {found} as {expected}")]
    ArgumentType {
        index: usize,
        expected: Kind,
        found: Kind,
    },
}

/// Either kind of error, for the embedding surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Mismatched-type error from two printable types.
pub(crate) fn type_mismatch(expected: impl ToString, found: impl ToString) -> CompileError {
    CompileError::TypeMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
    }
}
