use pretty_assertions::assert_eq;

use super::*;

#[test]
fn untyped_int_keeps_default_kind() {
    let ten = Lit::untyped(UntypedLit::int(10));
    assert!(ten.is_untyped());
    assert_eq!(ten.ty, None);
    assert_eq!(ten.untyped_kind(), Kind::Int);
    assert_eq!(ten.default_type(), Some(Type::INT));
}

#[test]
fn untyped_int_converts_losslessly_to_float64() {
    let ten = Lit::untyped(UntypedLit::int(10));
    let converted = ten.convert(&Type::FLOAT64);
    assert_eq!(converted, Ok(Lit::new(Type::FLOAT64, LitValue::Float(10.0))));
}

#[test]
fn rune_defaults_to_int32() {
    let a = Lit::untyped(UntypedLit::rune('a'));
    assert_eq!(a.untyped_kind(), Kind::Int32);
    assert_eq!(
        a.to_default(),
        Ok(Lit::new(Type::INT32, LitValue::Int(97)))
    );
}

#[test]
fn overflow_is_refused() {
    let big = Lit::untyped(UntypedLit::int(300));
    assert_eq!(
        big.convert(&Type::UINT8),
        Err(ConvertError::Overflow {
            value: "300".to_string(),
            target: "uint8".to_string(),
        })
    );
    let negative = Lit::untyped(UntypedLit::int(-1));
    assert!(negative.convert(&Type::UINT).is_err());
}

#[test]
fn fractional_float_does_not_become_int() {
    let half = Lit::untyped(UntypedLit::float(2.5));
    assert!(matches!(
        half.convert(&Type::INT),
        Err(ConvertError::Truncated { .. })
    ));
    let whole = Lit::untyped(UntypedLit::float(4.0));
    assert_eq!(whole.convert(&Type::INT), Ok(Lit::int(4)));
}

#[test]
fn float32_rounds_and_overflows() {
    let third = Lit::float64(1.0 / 3.0);
    let Ok(Lit {
        value: Some(LitValue::Float(x)),
        ..
    }) = third.convert(&Type::FLOAT32)
    else {
        panic!("expected a float32 literal");
    };
    assert_eq!(x, f64::from((1.0f64 / 3.0) as f32));
    assert!(Lit::float64(1e300).convert(&Type::FLOAT32).is_err());
}

#[test]
fn string_to_int_is_a_mismatch() {
    let s = Lit::string("x");
    assert!(matches!(
        s.convert(&Type::INT),
        Err(ConvertError::Mismatch { .. })
    ));
}

#[test]
fn named_target_keeps_the_name() {
    let celsius = Type::named("Celsius", Type::FLOAT64);
    let lit = Lit::untyped(UntypedLit::int(21)).convert(&celsius);
    assert_eq!(lit, Ok(Lit::new(celsius, LitValue::Float(21.0))));
}

#[test]
fn display() {
    assert_eq!(Lit::default().to_string(), "nil");
    assert_eq!(Lit::string("hi").to_string(), "\"hi\"");
    assert_eq!(Lit::int(-3).to_string(), "-3");
    assert_eq!(Lit::untyped(UntypedLit::rune('z')).to_string(), "{rune 'z'}");
}
