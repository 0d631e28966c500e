//! Function literals and declarations.

use std::sync::Arc;

use rill_ir::ast::{FuncLit, Param};
use rill_ir::Name;

use super::{prescan, Compiler, FuncInfo, ScopeKind};
use crate::bind::{BindClass, BindDescriptor};
use crate::errors::CompileError;
use crate::value::FuncCode;

fn unnamed(param: &Param) -> bool {
    param.name == Name::EMPTY || param.name.is_blank()
}

impl Compiler {
    /// Compile a function body into shareable code.
    ///
    /// Every enclosing function and block scope is marked as escaping: the
    /// closure built from this code keeps their frames alive, so they must
    /// not be recycled.
    pub(crate) fn compile_func_lit(&mut self, lit: &FuncLit, name: &str) -> Result<Arc<FuncCode>, CompileError> {
        self.mark_escapes();
        self.open_scope(ScopeKind::Func, prescan::func_allocates(lit));

        let mut params = Vec::with_capacity(lit.params.len());
        for param in &lit.params {
            let desc = if unnamed(param) {
                BindDescriptor::new(BindClass::Var, BindDescriptor::NO_INDEX)
            } else {
                self.declare_var(param.name, param.ty.clone())?.desc
            };
            params.push(desc);
        }
        let mut results = Vec::with_capacity(lit.results.len());
        for result in &lit.results {
            let desc = if unnamed(result) {
                self.declare_hidden(&result.ty)?
            } else {
                self.declare_var(result.name, result.ty.clone())?.desc
            };
            results.push((desc, result.ty.clone()));
        }
        let ty = lit.signature();
        self.current_mut().func = Some(FuncInfo {
            params: params.clone(),
            results: results.clone(),
            named_results: lit.named_results(),
            ty: ty.clone(),
        });

        self.compile_stmts(&lit.body)?;
        let comp = self.close_func();
        Ok(Arc::new(FuncCode {
            name: name.to_owned(),
            shape: comp.shape(),
            up_cost: comp.up_cost,
            params,
            results,
            code: comp.code.into_list(),
            ty,
        }))
    }

    /// Index of the innermost function scope.
    pub(crate) fn func_scope(&self) -> Option<usize> {
        self.scopes
            .iter()
            .rposition(|comp| comp.kind == ScopeKind::Func)
    }
}
