//! Assignment targets.

use std::sync::Arc;

use rill_ir::ast;
use rill_ir::{Kind, Type};

use super::expr::{to_default, type_of};
use super::Compiler;
use crate::env::EnvRef;
use crate::errors::{CompileError, RuntimeError};
use crate::globals::ThreadGlobals;
use crate::place::{Location, Place};
use crate::value::{Address, Key, SliceRef, Value};

impl Compiler {
    /// Compile `target` into a settable place.
    ///
    /// `_` compiles to a discard place of invalid type; callers give it the
    /// type of the value assigned.
    pub fn compile_place(&mut self, target: &ast::Expr) -> Result<Place, CompileError> {
        match target {
            ast::Expr::Ident(name) if name.is_blank() => Ok(Place::discard(Type::Basic(Kind::Invalid))),
            ast::Expr::Ident(name) => Ok(Place::var(self.resolve_var(*name)?)),
            ast::Expr::Index { base, index } => self.compile_elem_place(base, index),
            ast::Expr::Deref(operand) => {
                let p = self.compile_value(operand)?;
                let ty = type_of(&p);
                let Type::Pointer(elem) = ty.underlying() else {
                    return Err(CompileError::InvalidOperation {
                        op: "*",
                        ty: self.type_name(&ty),
                    });
                };
                let pe = p.eval_fn();
                Ok(Place::computed(
                    (**elem).clone(),
                    Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| match pe(env, tg)? {
                        Value::Pointer(addr) => Ok(Location::Addr(addr)),
                        _ => Err(RuntimeError::NilDereference),
                    }),
                ))
            }
            _ => Err(CompileError::NotSettable {
                name: "expression".to_owned(),
            }),
        }
    }

    fn compile_elem_place(&mut self, base: &ast::Expr, index: &ast::Expr) -> Result<Place, CompileError> {
        let b = to_default(self.compile_value(base)?)?;
        let base_ty = type_of(&b);
        let be = b.eval_fn();
        match base_ty.underlying() {
            Type::Map(key, elem) => {
                let k = self.compile_value(index)?;
                let ke = self.convert_to(k, key)?.eval_fn();
                Ok(Place::map_elem(
                    (**elem).clone(),
                    Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| match be(env, tg)? {
                        Value::Map(map) => Ok(Location::Map(map)),
                        _ => Err(RuntimeError::NilMapAssign),
                    }),
                    Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| Key::from_value(&ke(env, tg)?)),
                ))
            }
            Type::Slice(elem) => {
                let elem = (**elem).clone();
                let ie = self.compile_index_operand(index)?;
                Ok(Place::computed(
                    elem,
                    Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                        let slice = match be(env, tg)? {
                            Value::Slice(slice) => slice,
                            _ => SliceRef::default(),
                        };
                        let index = slice.check_index(&ie(env, tg)?)?;
                        Ok(Location::Addr(Address::Elem { slice, index }))
                    }),
                ))
            }
            _ => Err(CompileError::InvalidOperation {
                op: "[]",
                ty: self.type_name(&base_ty),
            }),
        }
    }
}
