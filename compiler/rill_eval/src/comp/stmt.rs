//! Statement compilation.
//!
//! Statements of one function body (or one top-level chunk) land in a
//! single flat list. Blocks are inlined between an `Enter` and a trailing
//! one-frame jump when they allocate; control flow compiles to jumps with
//! absolute targets and hop counts.

use std::sync::Arc;

use rill_ir::ast::{self, BinaryOp, FuncLit};
use rill_ir::{Kind, Name, Type};
use smallvec::SmallVec;

use super::expr::{type_of, Arity, Rhs};
use super::{placeholder, prescan, Compiler, LoopInfo, Operands, ScopeKind};
use crate::bind::{BindDescriptor, Var};
use crate::env::EnvRef;
use crate::errors::{type_mismatch, CompileError, RuntimeError};
use crate::expr::{Eval, Fun};
use crate::globals::{Deferred, Signal, ThreadGlobals};
use crate::ops;
use crate::place::{Place, Target};
use crate::stmt::{Flow, JumpTarget};
use crate::value::{FuncValue, Value};

/// A function declaration whose body compiles after its statement list.
struct Hoisted<'a> {
    at: usize,
    name: Name,
    func: &'a FuncLit,
    desc: BindDescriptor,
}

/// Peel labels off a statement.
fn unlabeled(mut stmt: &ast::Stmt) -> &ast::Stmt {
    while let ast::Stmt::Labeled { stmt: inner, .. } = stmt {
        stmt = inner;
    }
    stmt
}

impl Compiler {
    /// Compile a statement list into the current scope.
    ///
    /// Labels in the list are registered first so forward `goto`s resolve.
    /// Function declarations are bound before anything else runs, and their
    /// bodies compile after the rest of the list, so they can call each
    /// other and see every declaration of the list.
    pub fn compile_stmts(&mut self, stmts: &[ast::Stmt]) -> Result<(), CompileError> {
        self.register_labels(stmts)?;
        let hoisted = self.declare_funcs(stmts)?;
        for stmt in stmts {
            self.compile_stmt(stmt)?;
        }
        self.define_funcs(hoisted)
    }

    fn register_labels(&mut self, stmts: &[ast::Stmt]) -> Result<(), CompileError> {
        for stmt in stmts {
            let mut stmt = stmt;
            while let ast::Stmt::Labeled { label, stmt: inner } = stmt {
                self.register_label(*label)?;
                stmt = inner;
            }
        }
        Ok(())
    }

    fn register_label(&mut self, label: Name) -> Result<JumpTarget, CompileError> {
        if self.find_label(label).is_some() {
            return Err(CompileError::DuplicateLabel {
                label: self.name_of(label),
            });
        }
        let target = JumpTarget::new();
        self.current_mut().labels.insert(label, target.clone());
        Ok(target)
    }

    /// Label visible from the current scope, with the index of the scope
    /// that holds it. Labels never cross a function boundary.
    fn find_label(&self, label: Name) -> Option<(usize, JumpTarget)> {
        for (idx, comp) in self.scopes.iter().enumerate().rev() {
            if let Some(target) = comp.labels.get(&label) {
                return Some((idx, target.clone()));
            }
            if comp.kind != ScopeKind::Block {
                break;
            }
        }
        None
    }

    /// Innermost enclosing loop, or the one labeled `label`.
    fn find_loop(&self, label: Option<Name>, stmt: &'static str) -> Result<(usize, LoopInfo), CompileError> {
        for (idx, comp) in self.scopes.iter().enumerate().rev() {
            if let Some(info) = &comp.loop_info {
                if label.is_none() || info.this_label == label {
                    return Ok((idx, info.clone()));
                }
            }
            if comp.kind != ScopeKind::Block {
                break;
            }
        }
        match label {
            Some(label) => Err(CompileError::UndefinedLabel {
                label: self.name_of(label),
            }),
            None => Err(CompileError::NotInLoop { stmt }),
        }
    }

    /// Declare the functions of `stmts`, reserving the statement that
    /// stores each one.
    fn declare_funcs<'a>(&mut self, stmts: &'a [ast::Stmt]) -> Result<Vec<Hoisted<'a>>, CompileError> {
        let mut hoisted = Vec::new();
        for stmt in stmts {
            if let ast::Stmt::Func { name, func } = unlabeled(stmt) {
                let bind = self.declare_func(*name, Type::Func(func.signature()))?;
                hoisted.push(Hoisted {
                    at: self.emit(placeholder("function store")),
                    name: *name,
                    func,
                    desc: bind.desc,
                });
            }
        }
        Ok(hoisted)
    }

    fn define_funcs(&mut self, hoisted: Vec<Hoisted<'_>>) -> Result<(), CompileError> {
        for Hoisted { at, name, func, desc } in hoisted {
            let text = self.name_of(name);
            let code = self.compile_func_lit(func, &text)?;
            self.current_mut().code.replace(
                at,
                Arc::new(move |env: &EnvRef, _: &mut ThreadGlobals| {
                    env.mark_used_by_closure();
                    env.store(desc, Value::Func(FuncValue::new(Arc::clone(&code), env.clone())));
                    Ok(Flow::Next)
                }),
            );
        }
        Ok(())
    }

    pub fn compile_stmt(&mut self, stmt: &ast::Stmt) -> Result<(), CompileError> {
        match stmt {
            ast::Stmt::Expr(expr) => self.compile_expr_stmt(expr),
            ast::Stmt::Define { names, values } => self.compile_define(names, values),
            ast::Stmt::Var { names, ty, values } => self.compile_var(names, ty.as_ref(), values),
            ast::Stmt::Const { name, ty, value } => {
                let lit = match ty {
                    Some(ty) => value.convert(ty)?,
                    None => value.clone(),
                };
                self.declare_const(*name, lit).map(drop)
            }
            // hoisted by compile_stmts
            ast::Stmt::Func { .. } => Ok(()),
            ast::Stmt::Type { name, underlying } => self.declare_type(*name, underlying.clone()).map(drop),
            ast::Stmt::Assign { op: None, targets, values } => self.compile_assign(targets, values),
            ast::Stmt::Assign {
                op: Some(op),
                targets,
                values,
            } => self.compile_op_assign(*op, targets, values),
            ast::Stmt::IncDec { target, inc } => self.compile_inc_dec(target, *inc),
            ast::Stmt::Block(stmts) => self.compile_block(stmts),
            ast::Stmt::If { init, cond, then, els } => self.compile_if(init.as_deref(), cond, then, els.as_deref()),
            ast::Stmt::For { init, cond, post, body } => {
                self.compile_for(init.as_deref(), cond.as_ref(), post.as_deref(), body, None)
            }
            ast::Stmt::Break(label) => {
                let (idx, info) = self.find_loop(*label, "break")?;
                let hops = self.hops_to(idx);
                self.emit(info.break_to.jump(hops));
                Ok(())
            }
            ast::Stmt::Continue(label) => {
                let (idx, info) = self.find_loop(*label, "continue")?;
                let hops = self.hops_to(idx);
                self.emit(info.continue_to.jump(hops));
                Ok(())
            }
            ast::Stmt::Goto(label) => {
                let Some((idx, target)) = self.find_label(*label) else {
                    return Err(CompileError::UndefinedLabel {
                        label: self.name_of(*label),
                    });
                };
                let hops = self.hops_to(idx);
                self.emit(target.jump(hops));
                Ok(())
            }
            ast::Stmt::Labeled { label, stmt } => {
                let target = match self.current().labels.get(label) {
                    Some(target) => target.clone(),
                    None => self.register_label(*label)?,
                };
                target.set(self.code_len());
                match &**stmt {
                    ast::Stmt::For { init, cond, post, body } => {
                        self.compile_for(init.as_deref(), cond.as_ref(), post.as_deref(), body, Some(*label))
                    }
                    other => self.compile_stmt(other),
                }
            }
            ast::Stmt::Return(values) => self.compile_return(values),
            ast::Stmt::Defer(expr) => self.compile_defer(expr),
        }
    }

    fn compile_expr_stmt(&mut self, expr: &ast::Expr) -> Result<(), CompileError> {
        let compiled = self.compile_expr(expr)?;
        match compiled.fun {
            Some(Fun::One(eval)) => {
                self.emit(Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                    eval(env, tg)?;
                    Ok(Flow::Next)
                }));
            }
            Some(Fun::Many(eval)) => {
                self.emit(Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                    eval(env, tg)?;
                    Ok(Flow::Next)
                }));
            }
            // constants have no effect
            None => {}
        }
        Ok(())
    }

    /// Compile `stmts` in a block scope of their own.
    pub(crate) fn compile_block(&mut self, stmts: &[ast::Stmt]) -> Result<(), CompileError> {
        self.open_block(stmts);
        self.compile_stmts(stmts)?;
        self.close_block();
        Ok(())
    }

    fn compile_define(&mut self, names: &[Name], values: &[ast::Expr]) -> Result<(), CompileError> {
        let rhs = self.compile_rhs(values, names.len(), Arity::Assign)?;
        let value_types = rhs.types();

        let mut places = Vec::with_capacity(names.len());
        let mut targets = Vec::with_capacity(names.len());
        let mut fresh = false;
        for (name, ty) in names.iter().zip(value_types) {
            if name.is_blank() {
                targets.push(None);
                places.push(Place::discard(ty));
                continue;
            }
            let existing = self.current().binds.get(name).cloned();
            let var = match existing {
                Some(bind) => bind.as_var(0).ok_or_else(|| CompileError::NotSettable {
                    name: self.name_of(*name),
                })?,
                None => {
                    fresh = true;
                    self.declared_var(*name, ty)?
                }
            };
            targets.push(Some(var.ty.clone()));
            places.push(Place::var(var));
        }
        if !fresh {
            return Err(CompileError::NoNewVariables);
        }
        let operands = self.operands(rhs, &targets)?;
        self.emit_assign(places, operands);
        Ok(())
    }

    fn declared_var(&mut self, name: Name, ty: Type) -> Result<Var, CompileError> {
        let bind = self.declare_var(name, ty.clone())?;
        Ok(bind.as_var(0).unwrap_or_else(|| Var::discard(ty)))
    }

    fn compile_var(&mut self, names: &[Name], ty: Option<&Type>, values: &[ast::Expr]) -> Result<(), CompileError> {
        if values.is_empty() {
            let Some(ty) = ty else {
                return Err(CompileError::AssignCount {
                    expected: names.len(),
                    found: 0,
                });
            };
            let mut vars = Vec::with_capacity(names.len());
            for name in names {
                vars.push(self.declared_var(*name, ty.clone())?);
            }
            vars.retain(|var| !var.is_discard());
            self.emit(Arc::new(move |env: &EnvRef, _: &mut ThreadGlobals| {
                for var in &vars {
                    var.store(env, Value::zero(&var.ty));
                }
                Ok(Flow::Next)
            }));
            return Ok(());
        }

        let rhs = self.compile_rhs(values, names.len(), Arity::Assign)?;
        let declared: Vec<Type> = match ty {
            Some(ty) => vec![ty.clone(); names.len()],
            None => rhs.types(),
        };
        let mut places = Vec::with_capacity(names.len());
        let mut targets = Vec::with_capacity(names.len());
        for (name, ty) in names.iter().zip(declared) {
            targets.push(Some(ty.clone()));
            places.push(Place::var(self.declared_var(*name, ty)?));
        }
        let operands = self.operands(rhs, &targets)?;
        self.emit_assign(places, operands);
        Ok(())
    }

    fn compile_assign(&mut self, targets: &[ast::Expr], values: &[ast::Expr]) -> Result<(), CompileError> {
        let mut places = Vec::with_capacity(targets.len());
        for target in targets {
            places.push(self.compile_place(target)?);
        }
        let rhs = self.compile_rhs(values, targets.len(), Arity::Assign)?;
        let value_types = rhs.types();
        let mut types = Vec::with_capacity(places.len());
        for (place, value_ty) in places.iter_mut().zip(value_types) {
            if place.fun.is_none() && place.var.is_discard() {
                place.var.ty = value_ty;
                types.push(None);
            } else {
                types.push(Some(place.ty().clone()));
            }
        }
        let operands = self.operands(rhs, &types)?;
        self.emit_assign(places, operands);
        Ok(())
    }

    /// Locate every target, evaluate every value, then store.
    fn emit_assign(&mut self, places: Vec<Place>, operands: Operands) {
        if let ([place], Operands::Each(evals)) = (places.as_slice(), &operands) {
            if place.fun.is_none() {
                let var = place.var.clone();
                let eval = Arc::clone(&evals[0]);
                if var.is_discard() {
                    self.emit(Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                        eval(env, tg)?;
                        Ok(Flow::Next)
                    }));
                } else {
                    self.emit(Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                        let value = eval(env, tg)?;
                        var.store(env, value);
                        Ok(Flow::Next)
                    }));
                }
                return;
            }
        }
        self.emit(Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
            let mut located: SmallVec<[Target; 2]> = SmallVec::with_capacity(places.len());
            for place in &places {
                located.push(place.target(env, tg)?);
            }
            let values = operands.eval(env, tg)?;
            for ((place, target), value) in places.iter().zip(&located).zip(values) {
                place.store(target, value);
            }
            Ok(Flow::Next)
        }));
    }

    /// Settable, non-discard place for a read-modify-write.
    fn compile_update_place(&mut self, target: &ast::Expr) -> Result<Place, CompileError> {
        let place = self.compile_place(target)?;
        if place.fun.is_none() && place.var.is_discard() {
            return Err(CompileError::BlankUse);
        }
        Ok(place)
    }

    fn compile_op_assign(&mut self, op: BinaryOp, targets: &[ast::Expr], values: &[ast::Expr]) -> Result<(), CompileError> {
        let ([target], [value]) = (targets, values) else {
            return Err(CompileError::AssignCount {
                expected: 1,
                found: values.len(),
            });
        };
        let place = self.compile_update_place(target)?;
        let ty = place.ty().clone();
        let kind = ty.kind();
        let defined = match op {
            BinaryOp::Add => kind.is_numeric() || kind == Kind::String,
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => kind.is_numeric(),
            BinaryOp::Rem => kind.is_integer(),
            _ => false,
        };
        if !defined {
            return Err(CompileError::InvalidOperation {
                op: op.as_symbol(),
                ty: self.type_name(&ty),
            });
        }
        let value = self.compile_value(value)?;
        let eval = self.convert_to(value, &ty)?.eval_fn();
        self.emit_update(place, move |env: &EnvRef, tg: &mut ThreadGlobals, old: Value| {
            let operand = eval(env, tg)?;
            ops::binary(op, kind, &old, &operand)
        });
        Ok(())
    }

    fn compile_inc_dec(&mut self, target: &ast::Expr, inc: bool) -> Result<(), CompileError> {
        let place = self.compile_update_place(target)?;
        let ty = place.ty().clone();
        let kind = ty.kind();
        if !kind.is_numeric() {
            return Err(CompileError::InvalidOperation {
                op: if inc { "++" } else { "--" },
                ty: self.type_name(&ty),
            });
        }
        let op = if inc { BinaryOp::Add } else { BinaryOp::Sub };
        self.emit_update(place, move |_: &EnvRef, _: &mut ThreadGlobals, old: Value| {
            ops::binary(op, kind, &old, &ops::convert(Value::Int(1), kind))
        });
        Ok(())
    }

    /// Read-modify-write of `place`, locating it once.
    fn emit_update<F>(&mut self, place: Place, update: F)
    where
        F: Fn(&EnvRef, &mut ThreadGlobals, Value) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        self.emit(Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
            let target = place.target(env, tg)?;
            let old = place.load(&target);
            let new = update(env, tg, old)?;
            place.store(&target, new);
            Ok(Flow::Next)
        }));
    }

    fn compile_cond(&mut self, cond: &ast::Expr) -> Result<Eval, CompileError> {
        let c = self.compile_value(cond)?;
        let c = if c.is_untyped() { self.convert_to(c, &Type::BOOL)? } else { c };
        let ty = type_of(&c);
        if ty.kind() != Kind::Bool {
            return Err(type_mismatch("bool", self.type_name(&ty)));
        }
        Ok(c.eval_fn())
    }

    /// Jump to `target` unless `cond` holds.
    fn emit_branch(&mut self, cond: Eval, target: &JumpTarget) {
        let target = target.clone();
        self.emit(Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
            if cond(env, tg)?.as_bool() {
                Ok(Flow::Next)
            } else {
                Ok(Flow::Jump { up: 0, ip: target.get() })
            }
        }));
    }

    fn compile_if(
        &mut self,
        init: Option<&ast::Stmt>,
        cond: &ast::Expr,
        then: &[ast::Stmt],
        els: Option<&ast::Stmt>,
    ) -> Result<(), CompileError> {
        self.open_scope(ScopeKind::Block, init.is_some_and(prescan::stmt_allocates));
        if let Some(init) = init {
            self.compile_stmt(init)?;
        }
        let cond = self.compile_cond(cond)?;
        let else_to = JumpTarget::new();
        self.emit_branch(cond, &else_to);
        self.compile_block(then)?;
        match els {
            Some(els) => {
                let end = JumpTarget::new();
                self.emit(end.jump(0));
                else_to.set(self.code_len());
                self.compile_stmt(els)?;
                end.set(self.code_len());
            }
            None => else_to.set(self.code_len()),
        }
        self.close_block();
        Ok(())
    }

    fn compile_for(
        &mut self,
        init: Option<&ast::Stmt>,
        cond: Option<&ast::Expr>,
        post: Option<&ast::Stmt>,
        body: &[ast::Stmt],
        label: Option<Name>,
    ) -> Result<(), CompileError> {
        let allocates = init.is_some_and(prescan::stmt_allocates) || post.is_some_and(prescan::stmt_allocates);
        self.open_scope(ScopeKind::Block, allocates);
        let break_to = JumpTarget::new();
        let continue_to = JumpTarget::new();
        self.current_mut().loop_info = Some(LoopInfo {
            break_to: break_to.clone(),
            continue_to: continue_to.clone(),
            this_label: label,
        });
        if let Some(init) = init {
            self.compile_stmt(init)?;
        }
        let top = self.code_len();
        if let Some(cond) = cond {
            let cond = self.compile_cond(cond)?;
            self.emit_branch(cond, &break_to);
        }
        self.compile_block(body)?;
        continue_to.set(self.code_len());
        if let Some(post) = post {
            self.compile_stmt(post)?;
        }
        self.emit(Arc::new(move |_: &EnvRef, _: &mut ThreadGlobals| Ok(Flow::Jump { up: 0, ip: top })));
        break_to.set(self.code_len());
        self.close_block();
        Ok(())
    }

    fn compile_return(&mut self, values: &[ast::Expr]) -> Result<(), CompileError> {
        let Some(func_idx) = self.func_scope() else {
            return Err(CompileError::OutsideFunction { stmt: "return" });
        };
        let Some(info) = self.scopes[func_idx].func.clone() else {
            panic!("internal error: function scope without a signature");
        };
        if values.is_empty() {
            if !info.results.is_empty() && !info.named_results {
                return Err(CompileError::AssignCount {
                    expected: info.results.len(),
                    found: 0,
                });
            }
            self.emit(Arc::new(|_: &EnvRef, _: &mut ThreadGlobals| Ok(Flow::Transfer(Signal::Return))));
            return Ok(());
        }
        let rhs: Rhs = self.compile_rhs(values, info.results.len(), Arity::Assign)?;
        let targets: Vec<Option<Type>> = info.results.iter().map(|(_, ty)| Some(ty.clone())).collect();
        let operands = self.operands(rhs, &targets)?;
        let slots: Vec<_> = info.results.iter().map(|(desc, _)| *desc).collect();
        let hops = self.hops_to(func_idx);
        self.emit(Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
            let values = operands.eval(env, tg)?;
            let frame = env.up(hops);
            for (desc, value) in slots.iter().zip(values) {
                frame.store(*desc, value);
            }
            Ok(Flow::Transfer(Signal::Return))
        }));
        Ok(())
    }

    fn compile_defer(&mut self, expr: &ast::Expr) -> Result<(), CompileError> {
        if self.func_scope().is_none() {
            return Err(CompileError::OutsideFunction { stmt: "defer" });
        }
        let ast::Expr::Call { func, args } = expr else {
            return Err(CompileError::NotCallable {
                ty: "deferred expression".to_owned(),
            });
        };
        let (fe, operands, _) = self.compile_callee(func, args)?;
        self.emit(Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
            let Value::Func(func) = fe(env, tg)? else {
                return Err(RuntimeError::NilFuncCall);
            };
            let args = operands.eval(env, tg)?;
            tg.pending_defer = Some(Deferred { func, args });
            Ok(Flow::Transfer(Signal::InstallDeferHandler))
        }));
        Ok(())
    }
}
