//! Closure compiler.
//!
//! Walks syntax nodes once and produces `Stmt` and `Expr` closures that
//! capture already-resolved binding descriptors and hop counts. Scopes are
//! kept on a stack of [`Comp`]s owned by the [`Compiler`]: index 0 is the
//! universe (top) scope, index 1 the file scope, and function and block
//! scopes are pushed above them while their bodies compile.
//!
//! # Up-costs
//!
//! A scope's up-cost is 1 if it owns a runtime frame (it allocated at least
//! one slot) and 0 otherwise. The hop count from a use site to a binding is
//! the sum of the up-costs of the scopes in between, so it depends on
//! whether scopes opened later will allocate. The compiler settles this
//! before a scope's body compiles, by scanning the body's declarations
//! (see [`prescan`]), and checks the guess against the real slot counts
//! when the scope closes.

mod expr;
mod func;
mod place;
mod prescan;
mod stmt;

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests;

use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use rill_ir::{FuncType, Kind, Lit, Name, SharedInterner, Type, UntypedLit};

use crate::bind::{Bind, BindClass, BindDescriptor, NamedType, Var};
use crate::env::{EnvRef, FrameShape};
use crate::errors::{CompileError, RuntimeError};
use crate::expr::{Eval, EvalMulti};
use crate::globals::ThreadGlobals;
use crate::interp::Program;
use crate::stmt::{self as flow, Flow, JumpTarget, Stmt, StmtList};
use crate::value::Values;

pub use prescan::{allocates, func_allocates};

bitflags! {
    /// Compiler switches.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct CompileOptions: u32 {
        /// Top-level expression compiles keep untyped constants untyped
        /// instead of converting them to their default type.
        const KEEP_UNTYPED = 1 << 0;
    }
}

/// Lookup depth matching every scope.
pub const ANY_DEPTH: i32 = -1;
/// Depth of the file scope.
pub const FILE_DEPTH: i32 = -2;
/// Depth of the universe scope.
pub const TOP_DEPTH: i32 = -3;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Top,
    File,
    Func,
    Block,
}

/// Jump targets of the innermost enclosing loop.
#[derive(Clone, Debug)]
pub struct LoopInfo {
    pub break_to: JumpTarget,
    pub continue_to: JumpTarget,
    pub this_label: Option<Name>,
}

/// Parameters and results of the function being compiled.
#[derive(Clone, Debug)]
pub struct FuncInfo {
    pub params: Vec<BindDescriptor>,
    pub results: Vec<(BindDescriptor, Type)>,
    pub named_results: bool,
    pub ty: FuncType,
}

/// Statement buffer of one scope.
///
/// Block scopes lay their code out inline in the enclosing list, so their
/// buffer starts at the enclosing buffer's length and indices are absolute.
pub(crate) struct Code {
    base: usize,
    list: Vec<Stmt>,
}

impl Code {
    fn new(base: usize) -> Self {
        Code {
            base,
            list: Vec::new(),
        }
    }

    /// Absolute index of the next statement.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.base + self.list.len()
    }

    pub(crate) fn push(&mut self, stmt: Stmt) -> usize {
        let at = self.len();
        self.list.push(stmt);
        at
    }

    fn replace(&mut self, at: usize, stmt: Stmt) {
        self.list[at - self.base] = stmt;
    }

    fn append(&mut self, inner: Code) {
        debug_assert_eq!(inner.base, self.len(), "block code appended out of place");
        self.list.extend(inner.list);
    }

    fn into_list(self) -> StmtList {
        self.list.into()
    }
}

/// A compile-time scope.
pub struct Comp {
    pub binds: FxHashMap<Name, Bind>,
    pub bind_num: usize,
    pub int_bind_num: usize,
    pub up_cost: usize,
    pub depth: i32,
    pub types: FxHashMap<Name, Type>,
    pub named_types: FxHashMap<Name, NamedType>,
    pub(crate) code: Code,
    pub loop_info: Option<LoopInfo>,
    pub func: Option<FuncInfo>,
    /// Package name and import path, set on the file scope.
    pub name: String,
    pub path: String,
    pub options: CompileOptions,
    pub kind: ScopeKind,
    labels: FxHashMap<Name, JumpTarget>,
    escapes: bool,
    address_taken: bool,
    enter_at: Option<usize>,
}

impl Comp {
    fn new(kind: ScopeKind, depth: i32, up_cost: usize, base: usize, options: CompileOptions) -> Self {
        Comp {
            binds: FxHashMap::default(),
            bind_num: 0,
            int_bind_num: 0,
            up_cost,
            depth,
            types: FxHashMap::default(),
            named_types: FxHashMap::default(),
            code: Code::new(base),
            loop_info: None,
            func: None,
            name: String::new(),
            path: String::new(),
            options,
            kind,
            labels: FxHashMap::default(),
            escapes: false,
            address_taken: false,
            enter_at: None,
        }
    }

    #[inline]
    pub fn has_slots(&self) -> bool {
        self.bind_num + self.int_bind_num > 0
    }

    pub fn shape(&self) -> FrameShape {
        FrameShape {
            bind_num: self.bind_num,
            int_bind_num: self.int_bind_num,
            escapes: self.escapes,
            address_taken: self.address_taken,
        }
    }
}

/// Statement reserved for patching once its contents are known.
pub(crate) fn placeholder(what: &'static str) -> Stmt {
    Arc::new(move |_: &EnvRef, _: &mut ThreadGlobals| -> Result<Flow, RuntimeError> {
        panic!("internal error: {what} never patched")
    })
}

/// File-scope state restored when a top-level compile fails.
pub(crate) struct Checkpoint {
    binds: FxHashMap<Name, Bind>,
    bind_num: usize,
    int_bind_num: usize,
    types: FxHashMap<Name, Type>,
    named_types: FxHashMap<Name, NamedType>,
}

/// Evaluated operand lists: call arguments, assignment right-hand sides and
/// return values.
#[derive(Clone)]
pub(crate) enum Operands {
    Each(Vec<Eval>),
    /// One multi-valued expression spread over all targets.
    Spread(EvalMulti),
}

impl Operands {
    pub(crate) fn eval(&self, env: &EnvRef, tg: &mut ThreadGlobals) -> Result<Values, RuntimeError> {
        match self {
            Operands::Each(evals) => {
                let mut values = Values::with_capacity(evals.len());
                for eval in evals {
                    values.push(eval(env, tg)?);
                }
                Ok(values)
            }
            Operands::Spread(eval) => eval(env, tg),
        }
    }
}

/// Compiles syntax nodes against a stack of scopes.
pub struct Compiler {
    interner: SharedInterner,
    scopes: Vec<Comp>,
}

impl Compiler {
    pub fn new(interner: SharedInterner) -> Self {
        Self::with_options(interner, CompileOptions::default())
    }

    pub fn with_options(interner: SharedInterner, options: CompileOptions) -> Self {
        let mut top = Comp::new(ScopeKind::Top, TOP_DEPTH, 1, 0, options);
        for (name, value) in [("true", true), ("false", false)] {
            top.binds.insert(
                interner.intern(name),
                Bind::constant(Lit::untyped(UntypedLit::bool(value))),
            );
        }
        for kind in [
            Kind::Bool,
            Kind::Int,
            Kind::Int8,
            Kind::Int16,
            Kind::Int32,
            Kind::Int64,
            Kind::Uint,
            Kind::Uint8,
            Kind::Uint16,
            Kind::Uint32,
            Kind::Uint64,
            Kind::Uintptr,
            Kind::Float32,
            Kind::Float64,
            Kind::String,
        ] {
            top.types.insert(interner.intern(kind.name()), Type::Basic(kind));
        }
        let file = Comp::new(ScopeKind::File, FILE_DEPTH, 1, 0, options);
        Compiler {
            interner,
            scopes: vec![top, file],
        }
    }

    /// Set the package name and import path of the file scope.
    pub fn set_package(&mut self, name: &str, path: &str) {
        let file = self.file_mut();
        file.name = name.to_owned();
        file.path = path.to_owned();
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    #[inline]
    pub fn options(&self) -> CompileOptions {
        self.current().options
    }

    #[inline]
    pub fn current(&self) -> &Comp {
        // The top and file scopes are never popped.
        &self.scopes[self.scopes.len() - 1]
    }

    #[inline]
    pub(crate) fn current_mut(&mut self) -> &mut Comp {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub(crate) fn file_mut(&mut self) -> &mut Comp {
        &mut self.scopes[1]
    }

    pub fn file(&self) -> &Comp {
        &self.scopes[1]
    }

    /// Number of open scopes, universe and file included.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn depth(&self) -> i32 {
        self.current().depth
    }

    pub(crate) fn name_of(&self, name: Name) -> String {
        self.interner.lookup(name).to_owned()
    }

    /// Hops from the current scope's frame to the frame of scope `idx`.
    pub(crate) fn hops_to(&self, idx: usize) -> usize {
        self.scopes[idx + 1..].iter().map(|comp| comp.up_cost).sum()
    }

    #[inline]
    pub(crate) fn code_len(&self) -> usize {
        self.current().code.len()
    }

    pub(crate) fn emit(&mut self, stmt: Stmt) -> usize {
        self.current_mut().code.push(stmt)
    }

    /// Open a block scope whose body is `stmts`.
    ///
    /// The body is scanned for declarations to fix the scope's up-cost
    /// before anything inside it resolves.
    pub fn open_block(&mut self, stmts: &[rill_ir::ast::Stmt]) {
        self.open_scope(ScopeKind::Block, prescan::allocates(stmts));
    }

    pub(crate) fn open_scope(&mut self, kind: ScopeKind, allocates: bool) {
        let parent = self.current();
        let depth = match kind {
            ScopeKind::Func => parent.depth.max(0) + 1,
            _ => parent.depth.max(0),
        };
        let base = match kind {
            ScopeKind::Func => 0,
            _ => parent.code.len(),
        };
        let mut comp = Comp::new(kind, depth, usize::from(allocates), base, parent.options);
        comp.name.clone_from(&parent.name);
        comp.path.clone_from(&parent.path);
        if allocates && kind == ScopeKind::Block {
            comp.enter_at = Some(comp.code.push(placeholder("scope entry")));
        }
        self.scopes.push(comp);
    }

    /// Pop the current scope after checking its up-cost.
    ///
    /// # Panics
    /// Panics if the scope allocated slots although it was opened with
    /// up-cost 0, or the other way round, or if only the universe and file
    /// scopes are open.
    fn pop_scope(&mut self) -> Comp {
        assert!(self.scopes.len() > 2, "internal error: closing the file scope");
        let Some(comp) = self.scopes.pop() else {
            unreachable!("checked above");
        };
        let actual = usize::from(comp.has_slots());
        assert!(
            actual == comp.up_cost,
            "internal error: scope up-cost changed from {} to {actual} while compiling",
            comp.up_cost
        );
        comp
    }

    /// Close the current block, splicing its code into the enclosing scope.
    ///
    /// Returns the scope's final up-cost.
    pub fn close_block(&mut self) -> usize {
        let comp = self.pop_scope();
        let shape = comp.shape();
        let up_cost = comp.up_cost;
        let enter_at = comp.enter_at;
        let mut code = comp.code;
        if up_cost == 1 {
            if let Some(at) = enter_at {
                code.replace(at, flow::enter(shape));
            }
            let next = code.len() + 1;
            code.push(flow::leave(next));
        }
        tracing::trace!(
            depth = comp.depth,
            up_cost,
            binds = shape.bind_num,
            int_binds = shape.int_bind_num,
            escapes = shape.escapes,
            "close block"
        );
        self.current_mut().code.append(code);
        up_cost
    }

    /// Close the current function scope and hand it back.
    pub(crate) fn close_func(&mut self) -> Comp {
        let comp = self.pop_scope();
        tracing::trace!(
            depth = comp.depth,
            up_cost = comp.up_cost,
            binds = comp.bind_num,
            int_binds = comp.int_bind_num,
            escapes = comp.escapes,
            "close func"
        );
        comp
    }

    fn check_redeclared(&self, name: Name) -> Result<(), CompileError> {
        let comp = self.current();
        if comp.binds.contains_key(&name) || comp.types.contains_key(&name) {
            return Err(CompileError::Redeclared {
                name: self.name_of(name),
            });
        }
        Ok(())
    }

    /// Next slot of `class` in the current scope.
    fn alloc(&mut self, class: BindClass) -> Result<BindDescriptor, CompileError> {
        let comp = self.current_mut();
        let counter = match class {
            BindClass::Int => &mut comp.int_bind_num,
            _ => &mut comp.bind_num,
        };
        let index = u32::try_from(*counter + 1)
            .ok()
            .filter(|index| *index <= BindDescriptor::MAX_INDEX)
            .ok_or(CompileError::TooManyBindings {
                max: BindDescriptor::MAX_INDEX,
            })?;
        *counter += 1;
        Ok(BindDescriptor::new(class, index))
    }

    /// Declare a variable of type `ty` in the current scope.
    ///
    /// Word-sized types get an unboxed slot. `_` allocates nothing.
    pub fn declare_var(&mut self, name: Name, ty: Type) -> Result<Bind, CompileError> {
        let class = if ty.fits_word() {
            BindClass::Int
        } else {
            BindClass::Var
        };
        if name.is_blank() {
            return Ok(Bind {
                lit: Lit::of_type(ty),
                desc: BindDescriptor::new(class, BindDescriptor::NO_INDEX),
            });
        }
        self.check_redeclared(name)?;
        let bind = Bind {
            lit: Lit::of_type(ty),
            desc: self.alloc(class)?,
        };
        self.current_mut().binds.insert(name, bind.clone());
        Ok(bind)
    }

    /// Slot with no name, for unnamed function results.
    pub(crate) fn declare_hidden(&mut self, ty: &Type) -> Result<BindDescriptor, CompileError> {
        self.alloc(if ty.fits_word() {
            BindClass::Int
        } else {
            BindClass::Var
        })
    }

    pub fn declare_func(&mut self, name: Name, ty: Type) -> Result<Bind, CompileError> {
        if name.is_blank() {
            return Ok(Bind {
                lit: Lit::of_type(ty),
                desc: BindDescriptor::new(BindClass::Func, BindDescriptor::NO_INDEX),
            });
        }
        self.check_redeclared(name)?;
        let bind = Bind {
            lit: Lit::of_type(ty),
            desc: self.alloc(BindClass::Func)?,
        };
        self.current_mut().binds.insert(name, bind.clone());
        Ok(bind)
    }

    pub fn declare_const(&mut self, name: Name, lit: Lit) -> Result<Bind, CompileError> {
        let bind = Bind::constant(lit);
        if name.is_blank() {
            return Ok(bind);
        }
        self.check_redeclared(name)?;
        self.current_mut().binds.insert(name, bind.clone());
        Ok(bind)
    }

    /// Declare `type name underlying`, returning the new named type.
    pub fn declare_type(&mut self, name: Name, underlying: Type) -> Result<Type, CompileError> {
        self.check_redeclared(name)?;
        let text = self.name_of(name);
        let ty = Type::named(&text, underlying);
        let path = self.file().path.clone();
        let comp = self.current_mut();
        comp.types.insert(name, ty.clone());
        comp.named_types.insert(name, NamedType { name: text, path });
        Ok(ty)
    }

    /// Innermost binding of `name` among scopes at `depth` (or any depth for
    /// [`ANY_DEPTH`]), with the index of its scope.
    pub fn lookup(&self, name: Name, depth: i32) -> Option<(usize, &Bind)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, comp)| depth == ANY_DEPTH || comp.depth == depth)
            .find_map(|(idx, comp)| comp.binds.get(&name).map(|bind| (idx, bind)))
    }

    /// Resolve `name` to its binding and hop count.
    pub fn resolve(&self, name: Name) -> Result<(Bind, usize), CompileError> {
        match self.lookup(name, ANY_DEPTH) {
            Some((idx, bind)) => Ok((bind.clone(), self.hops_to(idx))),
            None => Err(CompileError::Undefined {
                name: self.name_of(name),
                depth: self.depth(),
            }),
        }
    }

    /// Resolve `name` to an assignable variable.
    pub fn resolve_var(&self, name: Name) -> Result<Var, CompileError> {
        let (bind, upn) = self.resolve(name)?;
        bind.as_var(upn).ok_or_else(|| CompileError::NotSettable {
            name: self.name_of(name),
        })
    }

    pub fn lookup_type(&self, name: Name) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|comp| comp.types.get(&name).cloned())
    }

    /// Printable name of `ty`, qualified with the declaring package path.
    pub fn type_name(&self, ty: &Type) -> String {
        if let Some(declared) = ty.declared_name() {
            let named = self
                .scopes
                .iter()
                .rev()
                .flat_map(|comp| comp.named_types.values())
                .find(|named| named.name == declared);
            if let Some(named) = named {
                return named.to_string();
            }
        }
        ty.to_string()
    }

    pub(crate) fn mark_address_taken(&mut self, idx: usize) {
        self.scopes[idx].address_taken = true;
    }

    /// Every open function and block scope may be captured by a closure
    /// being compiled now.
    pub(crate) fn mark_escapes(&mut self) {
        for comp in self.scopes.iter_mut().skip(2) {
            comp.escapes = true;
        }
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        let file = self.file();
        Checkpoint {
            binds: file.binds.clone(),
            bind_num: file.bind_num,
            int_bind_num: file.int_bind_num,
            types: file.types.clone(),
            named_types: file.named_types.clone(),
        }
    }

    /// Drop everything compiled since `checkpoint`.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        self.scopes.truncate(2);
        let file = self.file_mut();
        file.binds = checkpoint.binds;
        file.bind_num = checkpoint.bind_num;
        file.int_bind_num = checkpoint.int_bind_num;
        file.types = checkpoint.types;
        file.named_types = checkpoint.named_types;
        file.code = Code::new(0);
        file.labels.clear();
    }

    /// Take the top-level code compiled so far.
    pub fn take_code(&mut self) -> StmtList {
        let file = self.file_mut();
        file.labels.clear();
        std::mem::replace(&mut file.code, Code::new(0)).into_list()
    }

    pub fn file_shape(&self) -> FrameShape {
        self.file().shape()
    }

    pub fn top_shape(&self) -> FrameShape {
        self.scopes[0].shape()
    }

    /// Compile a whole program into a shareable [`Program`].
    #[tracing::instrument(level = "debug", skip_all, fields(stmts = stmts.len()))]
    pub fn compile_program(mut self, stmts: &[rill_ir::ast::Stmt]) -> Result<Program, CompileError> {
        self.compile_stmts(stmts)?;
        Ok(self.into_program())
    }

    pub fn into_program(mut self) -> Program {
        let code = self.take_code();
        let globals = self
            .file()
            .binds
            .iter()
            .map(|(name, bind)| (*name, bind.clone()))
            .collect();
        Program::new(
            code,
            self.top_shape(),
            self.file_shape(),
            globals,
            self.interner.clone(),
        )
    }
}
