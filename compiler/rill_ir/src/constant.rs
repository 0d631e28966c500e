//! Untyped constants.
//!
//! Constant folding happens in the front end; the core only carries the
//! folded payload around with its kind tag.

use std::fmt;
use std::sync::Arc;

use crate::Kind;

/// Payload of a folded constant.
///
/// Integers are wider than any machine integer kind so that out-of-range
/// constants survive until a context forces a concrete type.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Bool(bool),
    Int(i128),
    Float(f64),
    String(Arc<str>),
}

impl Constant {
    /// Natural kind of the payload.
    pub fn kind(&self) -> Kind {
        match self {
            Constant::Bool(_) => Kind::Bool,
            Constant::Int(_) => Kind::Int,
            Constant::Float(_) => Kind::Float64,
            Constant::String(_) => Kind::String,
        }
    }

    /// Exact textual form, strings quoted.
    pub fn exact_string(&self) -> String {
        match self {
            Constant::Bool(b) => b.to_string(),
            Constant::Int(i) => i.to_string(),
            Constant::Float(x) => format!("{x:?}"),
            Constant::String(s) => format!("{s:?}"),
        }
    }
}

/// An untyped constant.
///
/// `kind` is the default type. It matches `obj.kind()` except for rune
/// constants, where `kind == Kind::Int32` while the payload is an integer
/// meaning a character.
#[derive(Clone, Debug, PartialEq)]
pub struct UntypedLit {
    pub kind: Kind,
    pub obj: Constant,
}

impl UntypedLit {
    pub fn new(kind: Kind, obj: Constant) -> Self {
        UntypedLit { kind, obj }
    }

    pub fn bool(b: bool) -> Self {
        Self::new(Kind::Bool, Constant::Bool(b))
    }

    pub fn int(i: i128) -> Self {
        Self::new(Kind::Int, Constant::Int(i))
    }

    pub fn float(x: f64) -> Self {
        Self::new(Kind::Float64, Constant::Float(x))
    }

    pub fn rune(c: char) -> Self {
        Self::new(Kind::Int32, Constant::Int(i128::from(u32::from(c))))
    }

    pub fn string(s: &str) -> Self {
        Self::new(Kind::String, Constant::String(Arc::from(s)))
    }

    #[inline]
    pub fn is_rune(&self) -> bool {
        self.kind == Kind::Int32
    }
}

impl fmt::Display for UntypedLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rune() {
            if let Constant::Int(i) = self.obj {
                if let Some(c) = u32::try_from(i).ok().and_then(char::from_u32) {
                    return write!(f, "{{rune {c:?}}}");
                }
            }
            return write!(f, "{{rune {}}}", self.obj.exact_string());
        }
        write!(f, "{{{} {}}}", self.kind, self.obj.exact_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;

    #[test]
    fn rune_reports_int32_kind() {
        let r = UntypedLit::rune('a');
        assert_eq!(r.kind, Kind::Int32);
        assert_eq!(r.obj.kind(), Kind::Int);
        assert_eq!(r.to_string(), "{rune 'a'}");
    }

    #[test]
    fn display_uses_default_kind() {
        assert_eq!(UntypedLit::int(10).to_string(), "{int 10}");
        assert_eq!(UntypedLit::float(2.5).to_string(), "{float64 2.5}");
        assert_eq!(UntypedLit::string("hi").to_string(), "{string \"hi\"}");
    }

    #[test]
    fn out_of_range_rune_prints_its_number() {
        let r = UntypedLit::new(Kind::Int32, Constant::Int(-1));
        assert_eq!(r.to_string(), "{rune -1}");
    }
}
