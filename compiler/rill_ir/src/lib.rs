//! Rill IR - Names, types, literals and syntax nodes for the Rill execution core.
//!
//! Everything here is immutable data produced by the front end and consumed
//! by `rill_eval`: interned [`Name`]s, static [`Type`]s and their [`Kind`]s,
//! folded constants ([`UntypedLit`], [`Lit`]) and the [`ast`] nodes the
//! closure compiler walks.

pub mod ast;
mod constant;
mod interner;
mod kind;
mod lit;
mod name;
mod types;

pub use constant::{Constant, UntypedLit};
pub use interner::{InternError, SharedInterner, StringInterner};
pub use kind::Kind;
pub use lit::{ConvertError, Lit, LitValue};
pub use name::Name;
pub use types::{FuncType, NamedDef, Type};
