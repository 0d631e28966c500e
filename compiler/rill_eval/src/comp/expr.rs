//! Expression compilation and untyped-constant unification.

use std::sync::Arc;

use rill_ir::ast::{self, BinaryOp, UnaryOp};
use rill_ir::{Kind, Name, Type};

use super::{CompileOptions, Compiler, Operands, ANY_DEPTH};
use crate::call::call;
use crate::env::EnvRef;
use crate::errors::{type_mismatch, CompileError, RuntimeError};
use crate::expr::{Eval, Expr};
use crate::globals::ThreadGlobals;
use crate::ops;
use crate::stack::ensure_sufficient_stack;
use crate::value::{FuncValue, Key, MapRef, SliceRef, Value};

/// Which count error a length mismatch reports.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Arity {
    Assign,
    Call,
}

impl Arity {
    fn mismatch(self, expected: usize, found: usize) -> CompileError {
        match self {
            Arity::Assign => CompileError::AssignCount { expected, found },
            Arity::Call => CompileError::ArgCount { expected, found },
        }
    }
}

/// Compiled right-hand side of an assignment, argument list or return.
pub(crate) enum Rhs {
    Each(Vec<Expr>),
    /// A single multi-valued call spread over every target.
    Spread(Expr),
}

impl Rhs {
    /// Types the values have when nothing converts them.
    pub(crate) fn types(&self) -> Vec<Type> {
        match self {
            Rhs::Each(exprs) => exprs.iter().map(type_of).collect(),
            Rhs::Spread(expr) => expr.outs().to_vec(),
        }
    }
}

/// Static type of a single-valued expression, defaulting untyped
/// constants.
pub(crate) fn type_of(expr: &Expr) -> Type {
    match expr.lit.default_type() {
        Some(ty) => ty,
        None => panic!("internal error: value expression without a type"),
    }
}

/// Convert an untyped constant to its default type.
pub(crate) fn to_default(expr: Expr) -> Result<Expr, CompileError> {
    if expr.is_untyped() {
        return Ok(Expr::constant(expr.lit.to_default()?));
    }
    Ok(expr)
}

fn rank(kind: Kind) -> u8 {
    match kind {
        Kind::Float64 => 3,
        Kind::Int32 => 2,
        Kind::Int => 1,
        _ => 0,
    }
}

/// Kind two untyped constants unify to: float beats rune beats int.
fn wider(a: Kind, b: Kind) -> Kind {
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

fn operator_defined(op: BinaryOp, kind: Kind, nil_operand: bool) -> bool {
    match op {
        BinaryOp::Add => kind.is_numeric() || kind == Kind::String,
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => kind.is_numeric(),
        BinaryOp::Rem => kind.is_integer(),
        BinaryOp::Eq | BinaryOp::Ne => kind.is_comparable() || (nil_operand && kind.is_nilable()),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => kind.is_ordered(),
        BinaryOp::And | BinaryOp::Or => kind == Kind::Bool,
    }
}

impl Compiler {
    /// Compile an expression at the top of the current scope.
    ///
    /// Untyped constants come back converted to their default type unless
    /// the compiler runs with [`CompileOptions::KEEP_UNTYPED`].
    pub fn compile(&mut self, expr: &ast::Expr) -> Result<Expr, CompileError> {
        let compiled = self.compile_expr(expr)?;
        if self.options().contains(CompileOptions::KEEP_UNTYPED) {
            return Ok(compiled);
        }
        to_default(compiled)
    }

    pub(crate) fn compile_expr(&mut self, expr: &ast::Expr) -> Result<Expr, CompileError> {
        ensure_sufficient_stack(|| self.compile_expr_inner(expr))
    }

    fn compile_expr_inner(&mut self, expr: &ast::Expr) -> Result<Expr, CompileError> {
        match expr {
            ast::Expr::Lit(lit) => Ok(Expr::constant(lit.clone())),
            ast::Expr::Nil(ty) => {
                if ty.kind().is_nilable() {
                    Ok(Expr::nil(ty.clone()))
                } else {
                    Err(type_mismatch(self.type_name(ty), "nil"))
                }
            }
            ast::Expr::Ident(name) => self.compile_ident(*name),
            ast::Expr::Unary { op, operand } => self.compile_unary(*op, operand),
            ast::Expr::Binary { op, lhs, rhs } => self.compile_binary(*op, lhs, rhs),
            ast::Expr::Index { base, index } => self.compile_index(base, index),
            ast::Expr::Call { func, args } => self.compile_call(func, args),
            ast::Expr::Func(lit) => {
                let code = self.compile_func_lit(lit, "func literal")?;
                let ty = Type::Func(code.ty.clone());
                Ok(Expr::one(
                    ty,
                    Arc::new(move |env: &EnvRef, _: &mut ThreadGlobals| {
                        env.mark_used_by_closure();
                        Ok(Value::Func(FuncValue::new(Arc::clone(&code), env.clone())))
                    }),
                ))
            }
            ast::Expr::AddrOf(operand) => self.compile_addr_of(operand),
            ast::Expr::Deref(operand) => self.compile_deref(operand),
            ast::Expr::MakeMap { key, elem } => Ok(Expr::one(
                Type::map(key.clone(), elem.clone()),
                Arc::new(|_: &EnvRef, _: &mut ThreadGlobals| Ok(Value::Map(MapRef::new()))),
            )),
            ast::Expr::SliceLit { elem, items } => self.compile_slice_lit(elem, items),
            ast::Expr::Convert { ty, expr } => self.compile_convert(ty, expr),
        }
    }

    /// Compile an expression used as exactly one value.
    pub(crate) fn compile_value(&mut self, expr: &ast::Expr) -> Result<Expr, CompileError> {
        let compiled = self.compile_expr(expr)?;
        match compiled.num_out() {
            1 => Ok(compiled),
            found => Err(CompileError::AssignCount { expected: 1, found }),
        }
    }

    /// Make `expr` a value of type `ty`: untyped constants and `nil`
    /// convert, everything else must already have that type.
    pub(crate) fn convert_to(&self, expr: Expr, ty: &Type) -> Result<Expr, CompileError> {
        if expr.is_untyped() {
            return Ok(Expr::constant(expr.lit.convert(ty)?));
        }
        if expr.is_nil {
            if ty.kind().is_nilable() {
                return Ok(Expr::nil(ty.clone()));
            }
            return Err(type_mismatch(self.type_name(ty), "nil"));
        }
        match expr.ty() {
            Some(found) if found == ty => Ok(expr),
            Some(found) => Err(type_mismatch(self.type_name(ty), self.type_name(found))),
            None => Err(type_mismatch(self.type_name(ty), "no value")),
        }
    }

    /// Bring two operands to one type.
    ///
    /// Two untyped constants take the wider of their kinds, an untyped or
    /// `nil` operand takes the other side's type, and typed operands must
    /// already agree.
    fn unify(&self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Result<(Expr, Expr), CompileError> {
        match (lhs.is_untyped(), rhs.is_untyped()) {
            (true, true) => {
                let ty = Type::Basic(wider(lhs.lit.untyped_kind(), rhs.lit.untyped_kind()));
                Ok((
                    Expr::constant(lhs.lit.convert(&ty)?),
                    Expr::constant(rhs.lit.convert(&ty)?),
                ))
            }
            (true, false) => {
                let ty = type_of(&rhs);
                Ok((self.convert_to(lhs, &ty)?, rhs))
            }
            (false, true) => {
                let ty = type_of(&lhs);
                Ok((lhs, self.convert_to(rhs, &ty)?))
            }
            (false, false) => match (lhs.is_nil, rhs.is_nil) {
                (true, true) => Err(CompileError::InvalidOperation {
                    op: op.as_symbol(),
                    ty: "nil".to_owned(),
                }),
                (true, false) => {
                    let ty = type_of(&rhs);
                    Ok((self.convert_to(lhs, &ty)?, rhs))
                }
                (false, true) => {
                    let ty = type_of(&lhs);
                    Ok((lhs, self.convert_to(rhs, &ty)?))
                }
                (false, false) => {
                    let (lt, rt) = (type_of(&lhs), type_of(&rhs));
                    if lt != rt {
                        return Err(type_mismatch(self.type_name(&lt), self.type_name(&rt)));
                    }
                    Ok((lhs, rhs))
                }
            },
        }
    }

    fn compile_ident(&mut self, name: Name) -> Result<Expr, CompileError> {
        if name.is_blank() {
            return Err(CompileError::BlankUse);
        }
        let (bind, upn) = self.resolve(name)?;
        if bind.is_const() {
            return Ok(Expr::constant(bind.lit));
        }
        let desc = bind.desc;
        let ty = match bind.lit.ty {
            Some(ty) => ty,
            None => panic!("internal error: variable binding without a type"),
        };
        let slot_ty = ty.clone();
        Ok(Expr::one(
            ty,
            Arc::new(move |env: &EnvRef, _: &mut ThreadGlobals| Ok(env.up(upn).load(desc, &slot_ty))),
        ))
    }

    fn compile_unary(&mut self, op: UnaryOp, operand: &ast::Expr) -> Result<Expr, CompileError> {
        let x = to_default(self.compile_value(operand)?)?;
        let ty = type_of(&x);
        let kind = ty.kind();
        let defined = match op {
            UnaryOp::Neg => kind.is_numeric(),
            UnaryOp::Not => kind == Kind::Bool,
        };
        if !defined || x.is_nil {
            return Err(CompileError::InvalidOperation {
                op: op.as_symbol(),
                ty: self.type_name(&ty),
            });
        }
        let eval = x.eval_fn();
        Ok(Expr::one(
            ty,
            Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| Ok(ops::unary(op, kind, &eval(env, tg)?))),
        ))
    }

    fn compile_binary(&mut self, op: BinaryOp, lhs: &ast::Expr, rhs: &ast::Expr) -> Result<Expr, CompileError> {
        let l = self.compile_value(lhs)?;
        let r = self.compile_value(rhs)?;
        let nil_operand = l.is_nil || r.is_nil;
        let (l, r) = self.unify(op, l, r)?;
        let ty = type_of(&l);
        let kind = ty.kind();
        if !operator_defined(op, kind, nil_operand) {
            return Err(CompileError::InvalidOperation {
                op: op.as_symbol(),
                ty: self.type_name(&ty),
            });
        }
        let result = if op.is_comparison() { Type::BOOL } else { ty };
        let (le, re) = (l.eval_fn(), r.eval_fn());
        let eval: Eval = match op {
            BinaryOp::And => Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                if !le(env, tg)?.as_bool() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(re(env, tg)?.as_bool()))
            }),
            BinaryOp::Or => Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                if le(env, tg)?.as_bool() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(re(env, tg)?.as_bool()))
            }),
            _ => Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                let a = le(env, tg)?;
                let b = re(env, tg)?;
                ops::binary(op, kind, &a, &b)
            }),
        };
        Ok(Expr::one(result, eval))
    }

    /// Compile an integer index operand.
    pub(crate) fn compile_index_operand(&mut self, index: &ast::Expr) -> Result<Eval, CompileError> {
        let i = self.compile_value(index)?;
        let i = if i.is_untyped() {
            self.convert_to(i, &Type::INT)?
        } else {
            i
        };
        let ty = type_of(&i);
        if !ty.kind().is_integer() || i.is_nil {
            return Err(type_mismatch("integer index", self.type_name(&ty)));
        }
        Ok(i.eval_fn())
    }

    fn compile_index(&mut self, base: &ast::Expr, index: &ast::Expr) -> Result<Expr, CompileError> {
        let b = to_default(self.compile_value(base)?)?;
        let base_ty = type_of(&b);
        let be = b.eval_fn();
        match base_ty.underlying() {
            Type::Map(key, elem) => {
                let k = self.compile_value(index)?;
                let ke = self.convert_to(k, key)?.eval_fn();
                let elem = (**elem).clone();
                let zero_ty = elem.clone();
                Ok(Expr::one(
                    elem,
                    Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                        let map = be(env, tg)?;
                        let key = Key::from_value(&ke(env, tg)?)?;
                        let found = match map {
                            Value::Map(map) => map.get(&key),
                            _ => None,
                        };
                        Ok(found.unwrap_or_else(|| Value::zero(&zero_ty)))
                    }),
                ))
            }
            Type::Slice(elem) => {
                let elem = (**elem).clone();
                let ie = self.compile_index_operand(index)?;
                Ok(Expr::one(
                    elem,
                    Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                        let slice = match be(env, tg)? {
                            Value::Slice(slice) => slice,
                            _ => SliceRef::default(),
                        };
                        let at = slice.check_index(&ie(env, tg)?)?;
                        Ok(slice.get(at).unwrap_or_default())
                    }),
                ))
            }
            _ => Err(CompileError::InvalidOperation {
                op: "[]",
                ty: self.type_name(&base_ty),
            }),
        }
    }

    /// Compile a right-hand side of `want` values.
    ///
    /// A single expression yielding `want` values (two or more) is spread
    /// over the targets.
    pub(crate) fn compile_rhs(&mut self, values: &[ast::Expr], want: usize, arity: Arity) -> Result<Rhs, CompileError> {
        if let [only] = values {
            if want >= 2 {
                let expr = self.compile_expr(only)?;
                if expr.num_out() == want && expr.types.is_some() {
                    return Ok(Rhs::Spread(expr));
                }
                return Err(arity.mismatch(want, expr.num_out()));
            }
        }
        if values.len() != want {
            return Err(arity.mismatch(want, values.len()));
        }
        let mut exprs = Vec::with_capacity(want);
        for value in values {
            exprs.push(self.compile_value(value)?);
        }
        Ok(Rhs::Each(exprs))
    }

    /// Convert a compiled right-hand side to `targets`; `None` targets (the
    /// discard name) take the value's default type.
    pub(crate) fn operands(&self, rhs: Rhs, targets: &[Option<Type>]) -> Result<Operands, CompileError> {
        match rhs {
            Rhs::Each(exprs) => {
                let mut evals = Vec::with_capacity(exprs.len());
                for (expr, target) in exprs.into_iter().zip(targets) {
                    let expr = match target {
                        Some(ty) => self.convert_to(expr, ty)?,
                        None => to_default(expr)?,
                    };
                    evals.push(expr.eval_fn());
                }
                Ok(Operands::Each(evals))
            }
            Rhs::Spread(expr) => {
                for (out, target) in expr.outs().iter().zip(targets) {
                    if let Some(ty) = target {
                        if out != ty {
                            return Err(type_mismatch(self.type_name(ty), self.type_name(out)));
                        }
                    }
                }
                Ok(Operands::Spread(expr.eval_multi()))
            }
        }
    }

    /// Compile a callee and its arguments, checked against its signature.
    pub(crate) fn compile_callee(
        &mut self,
        func: &ast::Expr,
        args: &[ast::Expr],
    ) -> Result<(Eval, Operands, Vec<Type>), CompileError> {
        let f = self.compile_value(func)?;
        let ty = type_of(&f);
        let Some(sig) = ty.signature().cloned() else {
            return Err(CompileError::NotCallable {
                ty: self.type_name(&ty),
            });
        };
        let rhs = self.compile_rhs(args, sig.params.len(), Arity::Call)?;
        let targets: Vec<Option<Type>> = sig.params.iter().cloned().map(Some).collect();
        let operands = self.operands(rhs, &targets)?;
        Ok((f.eval_fn(), operands, sig.results))
    }

    fn compile_call(&mut self, func: &ast::Expr, args: &[ast::Expr]) -> Result<Expr, CompileError> {
        let (fe, operands, results) = self.compile_callee(func, args)?;
        let single = results.len() == 1;
        let multi = Expr::many(
            results,
            Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                let Value::Func(callee) = fe(env, tg)? else {
                    return Err(RuntimeError::NilFuncCall);
                };
                let args = operands.eval(env, tg)?;
                call(&callee, args, tg)
            }),
        );
        if single {
            let ty = type_of(&multi);
            return Ok(Expr::one(ty, multi.eval_fn()));
        }
        Ok(multi)
    }

    fn compile_addr_of(&mut self, operand: &ast::Expr) -> Result<Expr, CompileError> {
        if let ast::Expr::Ident(name) = operand {
            if name.is_blank() {
                return Err(CompileError::NotAddressable { what: "_".to_owned() });
            }
            let owner = self
                .lookup(*name, ANY_DEPTH)
                .filter(|(_, bind)| bind.desc.settable())
                .map(|(idx, _)| idx);
            if let Some(idx) = owner {
                self.mark_address_taken(idx);
            }
        }
        let place = self.compile_place(operand).map_err(|err| match err {
            CompileError::NotSettable { name } => CompileError::NotAddressable { what: name },
            other => other,
        })?;
        if place.is_map_elem() {
            return Err(CompileError::NotAddressable {
                what: "map element".to_owned(),
            });
        }
        let ty = Type::pointer(place.ty().clone());
        Ok(Expr::one(
            ty,
            Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| Ok(Value::Pointer(place.address(env, tg)?))),
        ))
    }

    fn compile_deref(&mut self, operand: &ast::Expr) -> Result<Expr, CompileError> {
        let p = self.compile_value(operand)?;
        let ty = type_of(&p);
        let Type::Pointer(elem) = ty.underlying() else {
            return Err(CompileError::InvalidOperation {
                op: "*",
                ty: self.type_name(&ty),
            });
        };
        let pe = p.eval_fn();
        Ok(Expr::one(
            (**elem).clone(),
            Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| match pe(env, tg)? {
                Value::Pointer(addr) => Ok(addr.load()),
                _ => Err(RuntimeError::NilDereference),
            }),
        ))
    }

    fn compile_slice_lit(&mut self, elem: &Type, items: &[ast::Expr]) -> Result<Expr, CompileError> {
        let mut evals = Vec::with_capacity(items.len());
        for item in items {
            let item = self.compile_value(item)?;
            evals.push(self.convert_to(item, elem)?.eval_fn());
        }
        Ok(Expr::one(
            Type::slice(elem.clone()),
            Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                let mut values = Vec::with_capacity(evals.len());
                for eval in &evals {
                    values.push(eval(env, tg)?);
                }
                Ok(Value::Slice(SliceRef::from_vec(values)))
            }),
        ))
    }

    fn compile_convert(&mut self, ty: &Type, operand: &ast::Expr) -> Result<Expr, CompileError> {
        let x = self.compile_value(operand)?;
        if x.is_nil {
            return self.convert_to(x, ty);
        }
        if x.lit.value.is_some() {
            return Ok(Expr::constant(x.lit.convert(ty)?));
        }
        let from = type_of(&x);
        let (from_kind, to_kind) = (from.kind(), ty.kind());
        let numeric = from_kind.is_numeric() && to_kind.is_numeric();
        if !numeric && from.underlying() != ty.underlying() {
            return Err(type_mismatch(self.type_name(ty), self.type_name(&from)));
        }
        let eval = x.eval_fn();
        if numeric && from_kind != to_kind {
            return Ok(Expr::one(
                ty.clone(),
                Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| Ok(ops::convert(eval(env, tg)?, to_kind))),
            ));
        }
        Ok(Expr::one(ty.clone(), eval))
    }
}
