use super::*;
use pretty_assertions::assert_eq;
use rill_ir::UntypedLit;

#[test]
fn zero_values_by_kind() {
    assert_eq!(Value::zero(&Type::BOOL), Value::Bool(false));
    assert_eq!(Value::zero(&Type::INT8), Value::Int(0));
    assert_eq!(Value::zero(&Type::UINT), Value::Uint(0));
    assert_eq!(Value::zero(&Type::FLOAT32), Value::Float(0.0));
    assert_eq!(Value::zero(&Type::STRING), Value::Str("".into()));
    assert_eq!(Value::zero(&Type::slice(Type::INT)), Value::Nil);
    assert_eq!(Value::zero(&Type::named("Celsius", Type::FLOAT64)), Value::Float(0.0));
}

#[test]
fn words_round_trip_by_kind() {
    for (kind, value) in [
        (Kind::Bool, Value::Bool(true)),
        (Kind::Int, Value::Int(-42)),
        (Kind::Int8, Value::Int(-1)),
        (Kind::Uint64, Value::Uint(u64::MAX)),
        (Kind::Float64, Value::Float(-0.5)),
    ] {
        assert_eq!(Value::from_word(kind, value.to_word()), value, "{kind}");
    }
}

#[test]
fn literals_become_values() {
    assert_eq!(Value::from_lit(&Lit::int(7)), Value::Int(7));
    assert_eq!(Value::from_lit(&Lit::string("s")), Value::Str("s".into()));
    assert_eq!(Value::from_lit(&Lit::default()), Value::Nil);
    let converted = Lit::untyped(UntypedLit::int(10)).convert(&Type::FLOAT64).unwrap();
    assert_eq!(Value::from_lit(&converted), Value::Float(10.0));
}

#[test]
fn references_compare_by_identity() {
    let a = MapRef::new();
    let b = MapRef::new();
    assert_eq!(Value::Map(a.clone()), Value::Map(a.clone()));
    assert_ne!(Value::Map(a), Value::Map(b));
    assert_ne!(Value::Nil, Value::Map(MapRef::new()));

    let s = SliceRef::from_vec(vec![Value::Int(1)]);
    let first = Address::Elem {
        slice: s.clone(),
        index: 0,
    };
    assert_eq!(Value::Pointer(first.clone()), Value::Pointer(first));
}

#[test]
fn keys_reject_unhashable_values() {
    assert_eq!(Key::from_value(&Value::Int(3)), Ok(Key::Int(3)));
    assert_eq!(
        Key::from_value(&Value::Float(-0.0)),
        Key::from_value(&Value::Float(0.0))
    );
    assert_eq!(
        Key::from_value(&Value::Slice(SliceRef::default())),
        Err(RuntimeError::UnhashableKey { kind: Kind::Slice })
    );
}

#[test]
fn slice_bounds() {
    let s = SliceRef::from_vec(vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(s.check_index(&Value::Int(1)), Ok(1));
    assert_eq!(
        s.check_index(&Value::Int(2)),
        Err(RuntimeError::IndexOutOfRange { index: 2, len: 2 })
    );
    assert_eq!(
        s.check_index(&Value::Int(-1)),
        Err(RuntimeError::IndexOutOfRange { index: -1, len: 2 })
    );
    assert!(!s.set(5, Value::Int(0)));
}

#[test]
fn display() {
    let s = Value::Slice(SliceRef::from_vec(vec![Value::Int(1), Value::Str("a".into())]));
    assert_eq!(s.to_string(), "[1 a]");
    assert_eq!(Value::Nil.to_string(), "nil");
    assert_eq!(Value::Float(2.5).to_string(), "2.5");
}

#[test]
fn values_fit_types_by_kind() {
    assert!(Value::Int(1).fits(&Type::INT8));
    assert!(Value::Uint(1).fits(&Type::UINT));
    assert!(!Value::Int(1).fits(&Type::UINT));
    assert!(!Value::Int(1).fits(&Type::STRING));
    assert!(Value::Str("a".into()).fits(&Type::STRING));
    assert!(Value::Nil.fits(&Type::slice(Type::INT)));
    assert!(!Value::Nil.fits(&Type::BOOL));
    assert!(Value::Slice(SliceRef::from_vec(vec![])).fits(&Type::slice(Type::INT)));
}
