//! Literals: typed and untyped constants.

use std::fmt;
use std::sync::Arc;

use crate::{Constant, Kind, Type, UntypedLit};

/// Error converting a constant to a concrete type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("constant {value} overflows {target}")]
    Overflow { value: String, target: String },
    #[error("constant {value} truncated to integer {target}")]
    Truncated { value: String, target: String },
    #[error("cannot convert {value} to type {target}")]
    Mismatch { value: String, target: String },
}

/// Value of a literal.
///
/// Signed integers of every width are stored as `Int`, unsigned ones as
/// `Uint`; the literal's type says which width applies.
#[derive(Clone, Debug, PartialEq)]
pub enum LitValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(Arc<str>),
    Untyped(UntypedLit),
}

impl LitValue {
    /// The value as an untyped payload.
    pub fn to_constant(&self) -> Constant {
        match self {
            LitValue::Bool(b) => Constant::Bool(*b),
            LitValue::Int(i) => Constant::Int(i128::from(*i)),
            LitValue::Uint(u) => Constant::Int(i128::from(*u)),
            LitValue::Float(x) => Constant::Float(*x),
            LitValue::String(s) => Constant::String(Arc::clone(s)),
            LitValue::Untyped(untyped) => untyped.obj.clone(),
        }
    }
}

/// A literal value: a typed or untyped constant.
///
/// `ty` is `None` only for the `nil` literal and for untyped constants; in
/// the latter case the effective type is [`Lit::default_type`]. When `Lit`
/// is embedded in a non-constant expression, `value` is `None` and `ty` is
/// the first type the expression produces.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Lit {
    pub ty: Option<Type>,
    pub value: Option<LitValue>,
}

impl Lit {
    /// A typed constant.
    pub fn new(ty: Type, value: LitValue) -> Self {
        Lit {
            ty: Some(ty),
            value: Some(value),
        }
    }

    /// An untyped constant.
    pub fn untyped(untyped: UntypedLit) -> Self {
        Lit {
            ty: None,
            value: Some(LitValue::Untyped(untyped)),
        }
    }

    /// Type information only, for non-constant expressions and variables.
    pub fn of_type(ty: Type) -> Self {
        Lit {
            ty: Some(ty),
            value: None,
        }
    }

    pub fn int(i: i64) -> Self {
        Self::new(Type::INT, LitValue::Int(i))
    }

    pub fn bool(b: bool) -> Self {
        Self::new(Type::BOOL, LitValue::Bool(b))
    }

    pub fn float64(x: f64) -> Self {
        Self::new(Type::FLOAT64, LitValue::Float(x))
    }

    pub fn string(s: &str) -> Self {
        Self::new(Type::STRING, LitValue::String(Arc::from(s)))
    }

    /// Returns `true` if this is an untyped constant.
    pub fn is_untyped(&self) -> bool {
        matches!(self.value, Some(LitValue::Untyped(_)))
    }

    /// Default kind of an untyped constant, `Kind::Invalid` otherwise.
    pub fn untyped_kind(&self) -> Kind {
        match &self.value {
            Some(LitValue::Untyped(untyped)) => untyped.kind,
            _ => Kind::Invalid,
        }
    }

    /// The type the literal has when nothing forces another one.
    pub fn default_type(&self) -> Option<Type> {
        match &self.value {
            Some(LitValue::Untyped(untyped)) => Some(Type::Basic(untyped.kind)),
            _ => self.ty.clone(),
        }
    }

    /// Convert untyped constants to their default type; typed ones are unchanged.
    pub fn to_default(&self) -> Result<Lit, ConvertError> {
        match (&self.value, self.default_type()) {
            (Some(LitValue::Untyped(_)), Some(ty)) => self.convert(&ty),
            _ => Ok(self.clone()),
        }
    }

    /// Convert the constant to `target`, refusing lossy conversions.
    ///
    /// Integers must fit the target width; floats convert to integers only
    /// when integral; integers convert to floats with rounding.
    pub fn convert(&self, target: &Type) -> Result<Lit, ConvertError> {
        let Some(value) = &self.value else {
            return Err(ConvertError::Mismatch {
                value: "nil".to_string(),
                target: target.to_string(),
            });
        };
        let obj = value.to_constant();
        let kind = target.kind();
        let converted = match &obj {
            Constant::Bool(b) if kind == Kind::Bool => LitValue::Bool(*b),
            Constant::String(s) if kind == Kind::String => LitValue::String(Arc::clone(s)),
            Constant::Int(i) if kind.is_integer() => int_value(*i, &obj, target)?,
            Constant::Float(x) if kind.is_integer() => {
                if !x.is_finite() || x.fract() != 0.0 {
                    return Err(ConvertError::Truncated {
                        value: obj.exact_string(),
                        target: target.to_string(),
                    });
                }
                #[allow(clippy::cast_possible_truncation, reason = "integral, range checked next")]
                let i = *x as i128;
                int_value(i, &obj, target)?
            }
            #[allow(clippy::cast_precision_loss, reason = "integer constants round to floats")]
            Constant::Int(i) if kind.is_float() => float_value(*i as f64, &obj, target)?,
            Constant::Float(x) if kind.is_float() => float_value(*x, &obj, target)?,
            _ => {
                return Err(ConvertError::Mismatch {
                    value: obj.exact_string(),
                    target: target.to_string(),
                })
            }
        };
        Ok(Lit::new(target.clone(), converted))
    }
}

fn int_value(i: i128, obj: &Constant, target: &Type) -> Result<LitValue, ConvertError> {
    let kind = target.kind();
    let in_range = kind
        .int_range()
        .is_some_and(|(lo, hi)| (lo..=hi).contains(&i));
    if !in_range {
        return Err(ConvertError::Overflow {
            value: obj.exact_string(),
            target: target.to_string(),
        });
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "range checked above")]
    let value = if kind.is_signed() {
        LitValue::Int(i as i64)
    } else {
        LitValue::Uint(i as u64)
    };
    Ok(value)
}

fn float_value(x: f64, obj: &Constant, target: &Type) -> Result<LitValue, ConvertError> {
    if target.kind() == Kind::Float32 {
        #[allow(clippy::cast_possible_truncation, reason = "float32 constants round")]
        let narrow = x as f32;
        if narrow.is_infinite() && x.is_finite() {
            return Err(ConvertError::Overflow {
                value: obj.exact_string(),
                target: target.to_string(),
            });
        }
        return Ok(LitValue::Float(f64::from(narrow)));
    }
    Ok(LitValue::Float(x))
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            None => f.write_str("nil"),
            Some(LitValue::Bool(b)) => write!(f, "{b}"),
            Some(LitValue::Int(i)) => write!(f, "{i}"),
            Some(LitValue::Uint(u)) => write!(f, "{u}"),
            Some(LitValue::Float(x)) => write!(f, "{x}"),
            Some(LitValue::String(s)) => write!(f, "{s:?}"),
            Some(LitValue::Untyped(untyped)) => write!(f, "{untyped}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests;
