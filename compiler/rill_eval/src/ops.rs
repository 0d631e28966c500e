//! Operators on runtime values.
//!
//! The compiler checks operand types, so these functions only see operand
//! pairs of one kind. Integer arithmetic wraps at the width of the operand
//! kind.

use std::sync::Arc;

use rill_ir::ast::{BinaryOp, UnaryOp};
use rill_ir::Kind;

use crate::errors::RuntimeError;
use crate::value::Value;

/// Apply a binary operator to operands of `kind`.
///
/// `&&` and `||` short-circuit in the compiled evaluator and never reach
/// here with an unevaluated right operand.
///
/// # Panics
/// Panics on operand pairs the compiler rejects.
pub fn binary(op: BinaryOp, kind: Kind, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    if op.is_comparison() {
        return Ok(Value::Bool(compare(op, lhs, rhs)));
    }
    let value = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Value::Int(wrap_int(kind, int_arith(op, *a, *b)?)),
        (Value::Uint(a), Value::Uint(b)) => Value::Uint(wrap_uint(kind, uint_arith(op, *a, *b)?)),
        (Value::Float(a), Value::Float(b)) => Value::Float(round_float(kind, float_arith(op, *a, *b))),
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Value::Str(Arc::from(joined))
        }
        (Value::Bool(a), Value::Bool(b)) if op.is_logical() => {
            Value::Bool(if op == BinaryOp::And { *a && *b } else { *a || *b })
        }
        _ => panic!("internal error: operator {} on {lhs:?} and {rhs:?}", op.as_symbol()),
    };
    Ok(value)
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<i64, RuntimeError> {
    Ok(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div if b == 0 => return Err(RuntimeError::DivisionByZero),
        BinaryOp::Div => a.wrapping_div(b),
        BinaryOp::Rem if b == 0 => return Err(RuntimeError::DivisionByZero),
        BinaryOp::Rem => a.wrapping_rem(b),
        _ => panic!("internal error: integer operator {}", op.as_symbol()),
    })
}

fn uint_arith(op: BinaryOp, a: u64, b: u64) -> Result<u64, RuntimeError> {
    Ok(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(RuntimeError::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => panic!("internal error: integer operator {}", op.as_symbol()),
    })
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => panic!("internal error: float operator {}", op.as_symbol()),
    }
}

#[allow(clippy::float_cmp, reason = "language comparison on floats")]
fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    use std::cmp::Ordering;

    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    };
    match (op, ordering) {
        (BinaryOp::Eq, _) => lhs == rhs,
        (BinaryOp::Ne, _) => lhs != rhs,
        (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
        (BinaryOp::Le, Some(o)) => o != Ordering::Greater,
        (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
        (BinaryOp::Ge, Some(o)) => o != Ordering::Less,
        // NaN is unordered
        (_, None) if matches!((lhs, rhs), (Value::Float(_), Value::Float(_))) => false,
        _ => panic!("internal error: comparison {} on {lhs:?} and {rhs:?}", op.as_symbol()),
    }
}

/// Apply a unary operator to an operand of `kind`.
///
/// # Panics
/// Panics on operands the compiler rejects.
pub fn unary(op: UnaryOp, kind: Kind, operand: &Value) -> Value {
    match (op, operand) {
        (UnaryOp::Neg, Value::Int(i)) => Value::Int(wrap_int(kind, i.wrapping_neg())),
        (UnaryOp::Neg, Value::Uint(u)) => Value::Uint(wrap_uint(kind, u.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(x)) => Value::Float(-x),
        (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
        _ => panic!("internal error: operator {} on {operand:?}", op.as_symbol()),
    }
}

/// Convert a numeric value to `to`; other values pass through unchanged.
///
/// Integer conversions wrap to the target width; float to integer
/// truncates toward zero.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "numeric conversions follow the language's wrapping rules"
)]
pub fn convert(value: Value, to: Kind) -> Value {
    match value {
        Value::Int(i) if to.is_signed() => Value::Int(wrap_int(to, i)),
        Value::Int(i) if to.is_unsigned() => Value::Uint(wrap_uint(to, i as u64)),
        Value::Int(i) if to.is_float() => Value::Float(round_float(to, i as f64)),
        Value::Uint(u) if to.is_signed() => Value::Int(wrap_int(to, u as i64)),
        Value::Uint(u) if to.is_unsigned() => Value::Uint(wrap_uint(to, u)),
        Value::Uint(u) if to.is_float() => Value::Float(round_float(to, u as f64)),
        Value::Float(x) if to.is_signed() => Value::Int(wrap_int(to, x as i64)),
        Value::Float(x) if to.is_unsigned() => Value::Uint(wrap_uint(to, x as u64)),
        Value::Float(x) if to.is_float() => Value::Float(round_float(to, x)),
        other => other,
    }
}

/// Sign-extend `i` from the width of `kind`.
#[inline]
pub fn wrap_int(kind: Kind, i: i64) -> i64 {
    match kind.bits() {
        bits @ 1..=63 => {
            let shift = 64 - bits;
            (i << shift) >> shift
        }
        _ => i,
    }
}

/// Truncate `u` to the width of `kind`.
#[inline]
pub fn wrap_uint(kind: Kind, u: u64) -> u64 {
    match kind.bits() {
        bits @ 1..=63 => u & ((1u64 << bits) - 1),
        _ => u,
    }
}

/// Round to single precision for `float32`.
#[inline]
#[allow(clippy::cast_possible_truncation, reason = "float32 rounding")]
pub fn round_float(kind: Kind, x: f64) -> f64 {
    if kind == Kind::Float32 {
        f64::from(x as f32)
    } else {
        x
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn signed_arithmetic_wraps_at_width() {
        let sum = binary(BinaryOp::Add, Kind::Int8, &Value::Int(127), &Value::Int(1)).unwrap();
        assert_eq!(sum, Value::Int(-128));
        let product = binary(BinaryOp::Mul, Kind::Int, &Value::Int(i64::MAX), &Value::Int(2));
        assert_eq!(product.unwrap(), Value::Int(-2));
    }

    #[test]
    fn unsigned_arithmetic_wraps_at_width() {
        let diff = binary(BinaryOp::Sub, Kind::Uint8, &Value::Uint(0), &Value::Uint(1)).unwrap();
        assert_eq!(diff, Value::Uint(255));
        assert_eq!(unary(UnaryOp::Neg, Kind::Uint16, &Value::Uint(1)), Value::Uint(65535));
    }

    #[test]
    fn integer_division_by_zero_fails() {
        for op in [BinaryOp::Div, BinaryOp::Rem] {
            assert_eq!(
                binary(op, Kind::Int, &Value::Int(1), &Value::Int(0)),
                Err(RuntimeError::DivisionByZero)
            );
            assert_eq!(
                binary(op, Kind::Uint, &Value::Uint(1), &Value::Uint(0)),
                Err(RuntimeError::DivisionByZero)
            );
        }
        let inf = binary(BinaryOp::Div, Kind::Float64, &Value::Float(1.0), &Value::Float(0.0));
        assert_eq!(inf.unwrap(), Value::Float(f64::INFINITY));
    }

    #[test]
    fn float32_rounds() {
        let third = binary(
            BinaryOp::Div,
            Kind::Float32,
            &Value::Float(1.0),
            &Value::Float(3.0),
        )
        .unwrap();
        assert_eq!(third, Value::Float(f64::from(1.0f32 / 3.0)));
    }

    #[test]
    fn strings_concatenate_and_order() {
        let joined = binary(
            BinaryOp::Add,
            Kind::String,
            &Value::Str("ab".into()),
            &Value::Str("cd".into()),
        );
        assert_eq!(joined.unwrap(), Value::Str("abcd".into()));
        let less = binary(
            BinaryOp::Lt,
            Kind::String,
            &Value::Str("ab".into()),
            &Value::Str("b".into()),
        );
        assert_eq!(less.unwrap(), Value::Bool(true));
    }

    #[test]
    fn nan_is_unordered() {
        let nan = Value::Float(f64::NAN);
        for op in [BinaryOp::Lt, BinaryOp::Ge, BinaryOp::Eq] {
            assert_eq!(binary(op, Kind::Float64, &nan, &nan).unwrap(), Value::Bool(false));
        }
        assert_eq!(
            binary(BinaryOp::Ne, Kind::Float64, &nan, &nan).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn nil_compares_by_identity() {
        assert_eq!(
            binary(BinaryOp::Eq, Kind::Map, &Value::Nil, &Value::Nil).unwrap(),
            Value::Bool(true)
        );
        let map = Value::Map(crate::value::MapRef::new());
        assert_eq!(
            binary(BinaryOp::Ne, Kind::Map, &map, &Value::Nil).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn conversions_wrap_and_truncate() {
        assert_eq!(convert(Value::Int(300), Kind::Uint8), Value::Uint(44));
        assert_eq!(convert(Value::Int(-1), Kind::Uint32), Value::Uint(u64::from(u32::MAX)));
        assert_eq!(convert(Value::Float(-2.9), Kind::Int), Value::Int(-2));
        assert_eq!(convert(Value::Uint(3), Kind::Float64), Value::Float(3.0));
        assert_eq!(convert(Value::Int(200), Kind::Int8), Value::Int(-56));
    }
}
