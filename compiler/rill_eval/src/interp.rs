//! Embedding surface: compiled programs and the incremental interpreter.

use rustc_hash::FxHashMap;
use rill_ir::{ast, Name, SharedInterner};

use crate::bind::Bind;
use crate::call::call;
use crate::comp::{CompileOptions, Compiler, FILE_DEPTH};
use crate::env::{EnvRef, FrameShape};
use crate::errors::{CompileError, Error, RuntimeError};
use crate::globals::{PoolStats, ThreadGlobals};
use crate::stmt::{exec, Exit, StmtList};
use crate::value::{Value, Values};

fn global_value(env: &EnvRef, bind: &Bind) -> Value {
    if bind.is_const() {
        return match bind.lit.to_default() {
            Ok(lit) => Value::from_lit(&lit),
            Err(_) => Value::from_lit(&bind.lit),
        };
    }
    match &bind.lit.ty {
        Some(ty) => env.load(bind.desc, ty),
        None => Value::Nil,
    }
}

fn finish(exit: Exit) {
    if let Exit::Signaled { .. } = exit {
        panic!("internal error: transfer signal escaped the top level");
    }
}

/// A whole compiled program.
///
/// Holds only immutable, shareable compiled code, so one `Program` can run
/// on many threads at once, each with its own [`ThreadGlobals`].
pub struct Program {
    code: StmtList,
    top: FrameShape,
    file: FrameShape,
    globals: FxHashMap<Name, Bind>,
    interner: SharedInterner,
}

impl Program {
    pub(crate) fn new(
        code: StmtList,
        top: FrameShape,
        file: FrameShape,
        globals: FxHashMap<Name, Bind>,
        interner: SharedInterner,
    ) -> Self {
        Program {
            code,
            top,
            file,
            globals,
            interner,
        }
    }

    pub fn file_shape(&self) -> FrameShape {
        self.file
    }

    /// Run the top-level code in fresh top and file frames; returns the
    /// file frame holding the globals.
    #[tracing::instrument(level = "debug", skip_all, fields(stmts = self.code.len()))]
    pub fn run(&self, tg: &mut ThreadGlobals) -> Result<EnvRef, RuntimeError> {
        let top = EnvRef::root(&self.top);
        let file = EnvRef::new(&self.file, Some(top.clone()));
        tg.top_env = Some(top);
        tg.file_env = Some(file.clone());
        finish(exec(&file, &self.code, 0, tg)?);
        Ok(file)
    }

    /// Value of the global `name` in a file frame returned by [`Program::run`].
    pub fn value(&self, env: &EnvRef, name: Name) -> Option<Value> {
        self.globals.get(&name).map(|bind| global_value(env, bind))
    }

    /// Like [`Program::value`], by spelling.
    pub fn get(&self, env: &EnvRef, name: &str) -> Option<Value> {
        self.value(env, self.interner.intern(name))
    }
}

/// Builder for [`Interp`].
#[derive(Default)]
pub struct InterpBuilder {
    interner: Option<SharedInterner>,
    options: CompileOptions,
    package: Option<(String, String)>,
}

impl InterpBuilder {
    pub fn new() -> Self {
        InterpBuilder::default()
    }

    /// Share an interner with the front end that builds the syntax nodes.
    #[must_use]
    pub fn interner(mut self, interner: SharedInterner) -> Self {
        self.interner = Some(interner);
        self
    }

    #[must_use]
    pub fn options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Package name and import path used to qualify declared type names.
    #[must_use]
    pub fn package(mut self, name: &str, path: &str) -> Self {
        self.package = Some((name.to_owned(), path.to_owned()));
        self
    }

    pub fn build(self) -> Interp {
        let interner = self.interner.unwrap_or_default();
        let mut compiler = Compiler::with_options(interner, self.options);
        if let Some((name, path)) = &self.package {
            compiler.set_package(name, path);
        }
        let top = EnvRef::root(&compiler.top_shape());
        let file_env = EnvRef::new(&compiler.file_shape(), Some(top.clone()));
        let mut globals = ThreadGlobals::new();
        globals.top_env = Some(top);
        globals.file_env = Some(file_env.clone());
        Interp {
            compiler,
            globals,
            file_env,
        }
    }
}

/// Incremental interpreter.
///
/// Compiles and runs one chunk of top-level statements at a time against a
/// persistent file scope. A chunk that fails to compile leaves no trace.
pub struct Interp {
    compiler: Compiler,
    globals: ThreadGlobals,
    file_env: EnvRef,
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}

impl Interp {
    pub fn new() -> Self {
        InterpBuilder::new().build()
    }

    pub fn builder() -> InterpBuilder {
        InterpBuilder::new()
    }

    pub fn intern(&self, name: &str) -> Name {
        self.compiler.interner().intern(name)
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn file_env(&self) -> &EnvRef {
        &self.file_env
    }

    pub fn globals_mut(&mut self) -> &mut ThreadGlobals {
        &mut self.globals
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.globals.stats()
    }

    /// Compile `stmts` into the file scope and run them.
    pub fn run(&mut self, stmts: &[ast::Stmt]) -> Result<(), Error> {
        let checkpoint = self.compiler.checkpoint();
        if let Err(err) = self.compiler.compile_stmts(stmts) {
            tracing::debug!(%err, "compile failed, rolling back");
            self.compiler.rollback(checkpoint);
            return Err(err.into());
        }
        let code = self.compiler.take_code();
        self.file_env.grow(&self.compiler.file_shape());
        finish(exec(&self.file_env, &code, 0, &mut self.globals)?);
        Ok(())
    }

    /// Evaluate an expression in the file scope.
    pub fn eval(&mut self, expr: &ast::Expr) -> Result<Values, Error> {
        let checkpoint = self.compiler.checkpoint();
        let compiled = match self.compiler.compile(expr) {
            Ok(compiled) => compiled,
            Err(err) => {
                self.compiler.rollback(checkpoint);
                return Err(err.into());
            }
        };
        self.file_env.grow(&self.compiler.file_shape());
        Ok(compiled.eval_multi()(&self.file_env, &mut self.globals)?)
    }

    /// Current value of the global `name`.
    pub fn value(&self, name: &str) -> Option<Value> {
        let name = self.intern(name);
        self.compiler
            .lookup(name, FILE_DEPTH)
            .map(|(_, bind)| global_value(&self.file_env, bind))
    }

    /// Call the global function `name`.
    pub fn call(&mut self, name: &str, args: Values) -> Result<Values, Error> {
        let func = match self.value(name) {
            Some(Value::Func(func)) => func,
            Some(other) => {
                return Err(CompileError::NotCallable {
                    ty: other.kind().to_string(),
                }
                .into())
            }
            None => {
                return Err(CompileError::Undefined {
                    name: name.to_owned(),
                    depth: FILE_DEPTH,
                }
                .into())
            }
        };
        Ok(call(&func, args, &mut self.globals)?)
    }
}
