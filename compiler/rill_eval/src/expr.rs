//! Compiled expressions.
//!
//! An [`Expr`] is either a constant, carried as a [`Lit`], or an evaluator
//! closure. Constants never run an evaluator; when one is needed as a
//! closure, [`Expr::eval_fn`] wraps the literal.

use std::fmt;
use std::sync::Arc;

use rill_ir::{Lit, Type};

use crate::env::EnvRef;
use crate::errors::RuntimeError;
use crate::globals::ThreadGlobals;
use crate::value::{Value, Values};

/// Evaluator of a single-valued expression.
pub type Eval = Arc<dyn Fn(&EnvRef, &mut ThreadGlobals) -> Result<Value, RuntimeError> + Send + Sync>;

/// Evaluator of a multi-valued expression.
pub type EvalMulti =
    Arc<dyn Fn(&EnvRef, &mut ThreadGlobals) -> Result<Values, RuntimeError> + Send + Sync>;

/// Evaluator of a non-constant expression.
#[derive(Clone)]
pub enum Fun {
    One(Eval),
    Many(EvalMulti),
}

/// A compiled expression.
///
/// For constants `lit` holds type and value. Otherwise `lit.ty` is the
/// first result type, `types` lists all of them when the expression is
/// multi-valued, and `fun` computes the value.
#[derive(Clone, Default)]
pub struct Expr {
    pub lit: Lit,
    pub types: Option<Vec<Type>>,
    pub fun: Option<Fun>,
    pub is_nil: bool,
}

impl Expr {
    /// Constant expression.
    pub fn constant(lit: Lit) -> Self {
        Expr {
            lit,
            ..Expr::default()
        }
    }

    /// The `nil` value of `ty`.
    pub fn nil(ty: Type) -> Self {
        Expr {
            lit: Lit {
                ty: Some(ty),
                value: None,
            },
            is_nil: true,
            ..Expr::default()
        }
    }

    /// Single-valued evaluator producing `ty`.
    pub fn one(ty: Type, eval: Eval) -> Self {
        Expr {
            lit: Lit::of_type(ty),
            fun: Some(Fun::One(eval)),
            ..Expr::default()
        }
    }

    /// Evaluator producing one value per entry of `types`.
    pub fn many(types: Vec<Type>, eval: EvalMulti) -> Self {
        Expr {
            lit: Lit {
                ty: types.first().cloned(),
                value: None,
            },
            types: Some(types),
            fun: Some(Fun::Many(eval)),
            is_nil: false,
        }
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.lit.value.is_some() || self.is_nil
    }

    #[inline]
    pub fn is_untyped(&self) -> bool {
        self.lit.is_untyped()
    }

    /// Static type of the first result.
    #[inline]
    pub fn ty(&self) -> Option<&Type> {
        self.lit.ty.as_ref()
    }

    pub fn num_out(&self) -> usize {
        match &self.types {
            Some(types) => types.len(),
            None => usize::from(self.lit.ty.is_some() || self.lit.value.is_some()),
        }
    }

    /// Type of result `i`.
    pub fn out(&self, i: usize) -> Option<&Type> {
        self.outs().get(i)
    }

    /// All result types.
    pub fn outs(&self) -> &[Type] {
        match &self.types {
            Some(types) => types,
            None => self.lit.ty.as_slice(),
        }
    }

    /// Single-valued evaluator; multi-valued expressions yield their first
    /// value.
    pub fn eval_fn(&self) -> Eval {
        if self.is_nil {
            return Arc::new(|_: &EnvRef, _: &mut ThreadGlobals| Ok(Value::Nil));
        }
        match &self.fun {
            Some(Fun::One(eval)) => Arc::clone(eval),
            Some(Fun::Many(eval)) => {
                let eval = Arc::clone(eval);
                Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
                    Ok(eval(env, tg)?.into_iter().next().unwrap_or_default())
                })
            }
            None => {
                let lit = self.lit.clone();
                Arc::new(move |_: &EnvRef, _: &mut ThreadGlobals| Ok(Value::from_lit(&lit)))
            }
        }
    }

    /// Evaluator returning every result.
    pub fn eval_multi(&self) -> EvalMulti {
        if let Some(Fun::Many(eval)) = &self.fun {
            return Arc::clone(eval);
        }
        let one = self.eval_fn();
        Arc::new(move |env: &EnvRef, tg: &mut ThreadGlobals| {
            let mut values = Values::new();
            values.push(one(env, tg)?);
            Ok(values)
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const() {
            return write!(f, "{}", self.lit);
        }
        match self.outs() {
            [] => f.write_str("<eval>"),
            [one] => write!(f, "<eval {one}>"),
            many => {
                f.write_str("<eval (")?;
                for (i, ty) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                f.write_str(")>")
            }
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("lit", &self.lit)
            .field("types", &self.types)
            .field("fun", &self.fun.is_some())
            .field("is_nil", &self.is_nil)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::env::FrameShape;
    use pretty_assertions::assert_eq;
    use rill_ir::UntypedLit;

    fn run(eval: &Eval) -> Value {
        let env = EnvRef::root(&FrameShape::default());
        let mut tg = ThreadGlobals::new();
        eval(&env, &mut tg).unwrap()
    }

    #[test]
    fn literal_is_constant() {
        let expr = Expr::constant(Lit::int(42));
        assert!(expr.is_const());
        assert!(expr.fun.is_none());
        assert_eq!(expr.outs(), &[Type::INT]);
        assert_eq!(expr.num_out(), 1);
        assert_eq!(run(&expr.eval_fn()), Value::Int(42));
        assert_eq!(expr.to_string(), "42");
    }

    #[test]
    fn untyped_constant_has_no_static_type() {
        let expr = Expr::constant(Lit::untyped(UntypedLit::float(1.5)));
        assert!(expr.is_const());
        assert!(expr.is_untyped());
        assert_eq!(expr.ty(), None);
        assert_eq!(expr.num_out(), 1);
        assert_eq!(expr.to_string(), "{float64 1.5}");
    }

    #[test]
    fn nil_is_constant_without_value() {
        let expr = Expr::nil(Type::map(Type::STRING, Type::INT));
        assert!(expr.is_const());
        assert_eq!(run(&expr.eval_fn()), Value::Nil);
        assert_eq!(expr.to_string(), "nil");
    }

    #[test]
    fn evaluators_are_not_constant() {
        let expr = Expr::one(
            Type::BOOL,
            Arc::new(|_: &EnvRef, _: &mut ThreadGlobals| Ok(Value::Bool(true))),
        );
        assert!(!expr.is_const());
        assert_eq!(expr.to_string(), "<eval bool>");

        let env = EnvRef::root(&FrameShape::default());
        let values = expr.eval_multi()(&env, &mut ThreadGlobals::new()).unwrap();
        assert_eq!(values.into_vec(), vec![Value::Bool(true)]);
    }

    #[test]
    fn multi_valued_outputs() {
        let expr = Expr::many(
            vec![Type::INT, Type::STRING],
            Arc::new(|_: &EnvRef, _: &mut ThreadGlobals| {
                Ok(Values::from_vec(vec![Value::Int(1), Value::Str("a".into())]))
            }),
        );
        assert_eq!(expr.num_out(), 2);
        assert_eq!(expr.out(1), Some(&Type::STRING));
        assert_eq!(expr.out(2), None);
        assert_eq!(expr.ty(), Some(&Type::INT));
        assert_eq!(run(&expr.eval_fn()), Value::Int(1));
        assert_eq!(expr.to_string(), "<eval (int, string)>");
    }
}
