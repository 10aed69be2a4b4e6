//! Binary and unary operators.
//!
//! Dispatch is keyed on the left operand's variant and, within it, the right
//! operand's type tag. A missing combination is a user-visible `TypeError`.
//! Results take the left operand's position.
//!
//! `&&`/`||` short-circuit in the evaluator; the `And`/`Or` arms here are
//! the non-short-circuit fallback for an already-evaluated pair.

use crate::ast::{BinOp, UnOp};
use crate::error::{Error, Result};
use crate::value::{Value, ValueKind};

/// Apply a binary operator to two values.
pub fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value> {
    let pos = left.pos;
    match &left.kind {
        ValueKind::Int(a) => int_op(op, *a, left, right),
        ValueKind::Float(a) => float_op(op, *a, left, right),
        ValueKind::Bool(a) => match (op, &right.kind) {
            (BinOp::Eq, ValueKind::Bool(b)) => Ok(Value::bool(a == b, pos)),
            (BinOp::Ne, ValueKind::Bool(b)) => Ok(Value::bool(a != b, pos)),
            (BinOp::And, ValueKind::Bool(b)) => Ok(Value::bool(*a && *b, pos)),
            (BinOp::Or, ValueKind::Bool(b)) => Ok(Value::bool(*a || *b, pos)),
            _ => Err(op_error(op, left, right)),
        },
        ValueKind::Str(a) => str_op(op, a, left, right),
        ValueKind::StrBytes(a) => bytes_op(op, a, left, right),
        ValueKind::Nil => match (op, &right.kind) {
            (BinOp::Eq, ValueKind::Nil) => Ok(Value::bool(true, pos)),
            (BinOp::Ne, ValueKind::Nil) => Ok(Value::bool(false, pos)),
            _ => Err(op_error(op, left, right)),
        },
        ValueKind::Regex(a) => regex_op(op, a, left, right),
        ValueKind::Array(a) => array_op(op, &a.borrow(), left, right),
        ValueKind::Hex(_)
        | ValueKind::Dictionary(_)
        | ValueKind::Func(_)
        | ValueKind::Method(_)
        | ValueKind::Class(_)
        | ValueKind::Lib(_) => Err(op_error(op, left, right)),
    }
}

/// Unary `!`: negation of truthiness, always a `Bool`.
pub fn unary(op: UnOp, value: &Value) -> Result<Value> {
    match op {
        UnOp::Not => Ok(Value::bool(!value.is_truthy(), value.pos)),
    }
}

fn op_error(op: BinOp, left: &Value, right: &Value) -> Error {
    Error::type_error(
        format!(
            "Operator '{op}' cannot be applied to '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ),
        left.pos,
    )
}

fn div_by_zero(pos: crate::token::Pos) -> Error {
    Error::type_error("Cannot divide by zero", pos)
}

fn overflow(op: BinOp, pos: crate::token::Pos) -> Error {
    Error::overflow(format!("Integer overflow in '{op}'"), pos)
}

// ---------------------------------------------------------------------------
// Int
// ---------------------------------------------------------------------------

fn int_op(op: BinOp, a: i64, left: &Value, right: &Value) -> Result<Value> {
    let pos = left.pos;
    match (op, &right.kind) {
        (BinOp::Add, ValueKind::Int(b)) => a
            .checked_add(*b)
            .map(|v| Value::int(v, pos))
            .ok_or_else(|| overflow(op, pos)),
        (BinOp::Sub, ValueKind::Int(b)) => a
            .checked_sub(*b)
            .map(|v| Value::int(v, pos))
            .ok_or_else(|| overflow(op, pos)),
        (BinOp::Mul, ValueKind::Int(b)) => a
            .checked_mul(*b)
            .map(|v| Value::int(v, pos))
            .ok_or_else(|| overflow(op, pos)),
        (BinOp::Add, ValueKind::Float(b)) => Ok(Value::float(a as f64 + b, pos)),
        (BinOp::Sub, ValueKind::Float(b)) => Ok(Value::float(a as f64 - b, pos)),
        (BinOp::Mul, ValueKind::Float(b)) => Ok(Value::float(a as f64 * b, pos)),

        // Division always promotes to float.
        (BinOp::Div, ValueKind::Int(b)) => {
            if *b == 0 {
                Err(div_by_zero(pos))
            } else {
                Ok(Value::float(a as f64 / *b as f64, pos))
            }
        }
        (BinOp::Div, ValueKind::Float(b)) => {
            if *b == 0.0 {
                Err(div_by_zero(pos))
            } else {
                Ok(Value::float(a as f64 / b, pos))
            }
        }
        (BinOp::Mod, ValueKind::Int(b)) => {
            if *b == 0 {
                Err(div_by_zero(pos))
            } else {
                Ok(Value::int(a % b, pos))
            }
        }
        (BinOp::Mod, ValueKind::Float(b)) => {
            if *b == 0.0 {
                Err(div_by_zero(pos))
            } else {
                Ok(Value::float(a as f64 % b, pos))
            }
        }

        // `n - s` / `n - arr` truncate the tail by n elements.
        (BinOp::Sub, ValueKind::Str(s)) => {
            let chars: Vec<char> = s.chars().collect();
            let keep = chars.len().saturating_sub(a.max(0) as usize);
            Ok(Value::string(chars[..keep].iter().collect::<String>(), pos))
        }
        (BinOp::Sub, ValueKind::Array(items)) => {
            let items = items.borrow();
            let keep = items.len().saturating_sub(a.max(0) as usize);
            Ok(Value::array(items[..keep].to_vec(), pos))
        }

        (BinOp::Eq, ValueKind::Int(b)) => Ok(Value::bool(a == *b, pos)),
        (BinOp::Ne, ValueKind::Int(b)) => Ok(Value::bool(a != *b, pos)),
        (BinOp::Lt, ValueKind::Int(b)) => Ok(Value::bool(a < *b, pos)),
        (BinOp::Gt, ValueKind::Int(b)) => Ok(Value::bool(a > *b, pos)),
        (BinOp::Le, ValueKind::Int(b)) => Ok(Value::bool(a <= *b, pos)),
        (BinOp::Ge, ValueKind::Int(b)) => Ok(Value::bool(a >= *b, pos)),
        (BinOp::Eq, ValueKind::Float(b)) => Ok(Value::bool(a as f64 == *b, pos)),
        (BinOp::Ne, ValueKind::Float(b)) => Ok(Value::bool(a as f64 != *b, pos)),
        (BinOp::Lt, ValueKind::Float(b)) => Ok(Value::bool((a as f64) < *b, pos)),
        (BinOp::Gt, ValueKind::Float(b)) => Ok(Value::bool(a as f64 > *b, pos)),
        (BinOp::Le, ValueKind::Float(b)) => Ok(Value::bool(a as f64 <= *b, pos)),
        (BinOp::Ge, ValueKind::Float(b)) => Ok(Value::bool(a as f64 >= *b, pos)),

        _ => Err(op_error(op, left, right)),
    }
}

// ---------------------------------------------------------------------------
// Float
// ---------------------------------------------------------------------------

fn float_op(op: BinOp, a: f64, left: &Value, right: &Value) -> Result<Value> {
    let pos = left.pos;
    let b = match &right.kind {
        ValueKind::Int(b) => *b as f64,
        ValueKind::Float(b) => *b,
        _ => return Err(op_error(op, left, right)),
    };
    match op {
        BinOp::Add => Ok(Value::float(a + b, pos)),
        BinOp::Sub => Ok(Value::float(a - b, pos)),
        BinOp::Mul => Ok(Value::float(a * b, pos)),
        BinOp::Div => {
            if b == 0.0 {
                Err(div_by_zero(pos))
            } else {
                Ok(Value::float(a / b, pos))
            }
        }
        BinOp::Mod => {
            if b == 0.0 {
                Err(div_by_zero(pos))
            } else {
                Ok(Value::float(a % b, pos))
            }
        }
        BinOp::Eq => Ok(Value::bool(a == b, pos)),
        BinOp::Ne => Ok(Value::bool(a != b, pos)),
        BinOp::Lt => Ok(Value::bool(a < b, pos)),
        BinOp::Gt => Ok(Value::bool(a > b, pos)),
        BinOp::Le => Ok(Value::bool(a <= b, pos)),
        BinOp::Ge => Ok(Value::bool(a >= b, pos)),
        BinOp::And | BinOp::Or => Err(op_error(op, left, right)),
    }
}

// ---------------------------------------------------------------------------
// String
// ---------------------------------------------------------------------------

fn str_op(op: BinOp, a: &str, left: &Value, right: &Value) -> Result<Value> {
    let pos = left.pos;
    match (op, &right.kind) {
        (BinOp::Add, ValueKind::Str(b)) => Ok(Value::string(format!("{a}{b}"), pos)),
        // A byte-string peer encodes the string side as UTF-8.
        (BinOp::Add, ValueKind::StrBytes(b)) => {
            let mut out = a.as_bytes().to_vec();
            out.extend_from_slice(b);
            Ok(Value::bytes(out, pos))
        }
        // `s - n` slices from index n.
        (BinOp::Sub, ValueKind::Int(n)) => {
            let chars: Vec<char> = a.chars().collect();
            let start = slice_start(*n, chars.len());
            Ok(Value::string(chars[start..].iter().collect::<String>(), pos))
        }
        (BinOp::Mul, ValueKind::Int(n)) => {
            let n = (*n).max(0) as usize;
            Ok(Value::string(a.repeat(n), pos))
        }
        (BinOp::Eq, ValueKind::Str(b)) => Ok(Value::bool(a == b, pos)),
        (BinOp::Ne, ValueKind::Str(b)) => Ok(Value::bool(a != b, pos)),
        (BinOp::Eq, ValueKind::StrBytes(b)) => Ok(Value::bool(a.as_bytes() == &b[..], pos)),
        (BinOp::Ne, ValueKind::StrBytes(b)) => Ok(Value::bool(a.as_bytes() != &b[..], pos)),
        // Ordering is lexicographic.
        (BinOp::Lt, ValueKind::Str(b)) => Ok(Value::bool(a < b.as_str(), pos)),
        (BinOp::Gt, ValueKind::Str(b)) => Ok(Value::bool(a > b.as_str(), pos)),
        (BinOp::Le, ValueKind::Str(b)) => Ok(Value::bool(a <= b.as_str(), pos)),
        (BinOp::Ge, ValueKind::Str(b)) => Ok(Value::bool(a >= b.as_str(), pos)),
        _ => Err(op_error(op, left, right)),
    }
}

// ---------------------------------------------------------------------------
// StrBytes — mirrors String, preserving the byte tag.
// ---------------------------------------------------------------------------

fn bytes_op(op: BinOp, a: &[u8], left: &Value, right: &Value) -> Result<Value> {
    let pos = left.pos;
    let peer: Option<&[u8]> = match &right.kind {
        ValueKind::StrBytes(b) => Some(b),
        ValueKind::Str(s) => Some(s.as_bytes()),
        _ => None,
    };
    match (op, peer, &right.kind) {
        (BinOp::Add, Some(b), _) => {
            let mut out = a.to_vec();
            out.extend_from_slice(b);
            Ok(Value::bytes(out, pos))
        }
        (BinOp::Sub, _, ValueKind::Int(n)) => {
            let start = slice_start(*n, a.len());
            Ok(Value::bytes(a[start..].to_vec(), pos))
        }
        (BinOp::Mul, _, ValueKind::Int(n)) => {
            let n = (*n).max(0) as usize;
            Ok(Value::bytes(a.repeat(n), pos))
        }
        (BinOp::Eq, Some(b), _) => Ok(Value::bool(a == b, pos)),
        (BinOp::Ne, Some(b), _) => Ok(Value::bool(a != b, pos)),
        (BinOp::Lt, Some(b), _) => Ok(Value::bool(a < b, pos)),
        (BinOp::Gt, Some(b), _) => Ok(Value::bool(a > b, pos)),
        (BinOp::Le, Some(b), _) => Ok(Value::bool(a <= b, pos)),
        (BinOp::Ge, Some(b), _) => Ok(Value::bool(a >= b, pos)),
        _ => Err(op_error(op, left, right)),
    }
}

// ---------------------------------------------------------------------------
// Regex
// ---------------------------------------------------------------------------

fn regex_op(op: BinOp, a: &regex::Regex, left: &Value, right: &Value) -> Result<Value> {
    let pos = left.pos;
    let recompile = |pat: String| -> Result<Value> {
        regex::Regex::new(&pat)
            .map(|re| Value::regex(re, pos))
            .map_err(|_| Error::runtime(format!("Invalid regular expression '{pat}'"), pos))
    };
    match (op, &right.kind) {
        (BinOp::Add, ValueKind::Regex(b)) => recompile(format!("{}{}", a.as_str(), b.as_str())),
        (BinOp::Add, ValueKind::Str(b)) => recompile(format!("{}{b}", a.as_str())),
        (BinOp::Sub, ValueKind::Int(n)) => {
            let chars: Vec<char> = a.as_str().chars().collect();
            let start = slice_start(*n, chars.len());
            recompile(chars[start..].iter().collect())
        }
        (BinOp::Mul, ValueKind::Int(n)) => recompile(a.as_str().repeat((*n).max(0) as usize)),
        (BinOp::Eq, ValueKind::Regex(b)) => Ok(Value::bool(a.as_str() == b.as_str(), pos)),
        (BinOp::Ne, ValueKind::Regex(b)) => Ok(Value::bool(a.as_str() != b.as_str(), pos)),
        (BinOp::Eq, ValueKind::Str(b)) => Ok(Value::bool(a.as_str() == b, pos)),
        (BinOp::Ne, ValueKind::Str(b)) => Ok(Value::bool(a.as_str() != b, pos)),
        _ => Err(op_error(op, left, right)),
    }
}

// ---------------------------------------------------------------------------
// Array
// ---------------------------------------------------------------------------

fn array_op(op: BinOp, a: &[Value], left: &Value, right: &Value) -> Result<Value> {
    let pos = left.pos;
    match (op, &right.kind) {
        (BinOp::Add, ValueKind::Array(b)) => {
            let mut out = a.to_vec();
            out.extend(b.borrow().iter().cloned());
            Ok(Value::array(out, pos))
        }
        (BinOp::Sub, ValueKind::Int(n)) => {
            let start = slice_start(*n, a.len());
            Ok(Value::array(a[start..].to_vec(), pos))
        }
        (BinOp::Mul, ValueKind::Int(n)) => {
            let n = (*n).max(0) as usize;
            let mut out = Vec::with_capacity(a.len() * n);
            for _ in 0..n {
                out.extend(a.iter().cloned());
            }
            Ok(Value::array(out, pos))
        }
        (BinOp::Eq, ValueKind::Array(b)) => Ok(Value::bool(a == &b.borrow()[..], pos)),
        (BinOp::Ne, ValueKind::Array(b)) => Ok(Value::bool(a != &b.borrow()[..], pos)),
        _ => Err(op_error(op, left, right)),
    }
}

/// Resolve a (possibly negative) slice start against a length, clamping to
/// the valid range.
fn slice_start(n: i64, len: usize) -> usize {
    if n < 0 {
        len.saturating_sub(n.unsigned_abs() as usize)
    } else {
        (n as usize).min(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Pos;

    fn p() -> Pos {
        Pos::default()
    }

    fn int(v: i64) -> Value {
        Value::int(v, p())
    }

    fn float(v: f64) -> Value {
        Value::float(v, p())
    }

    fn s(v: &str) -> Value {
        Value::string(v, p())
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(binary(BinOp::Add, &int(1), &int(2)).unwrap(), int(3));
        assert_eq!(binary(BinOp::Sub, &int(5), &int(3)).unwrap(), int(2));
        assert_eq!(binary(BinOp::Mul, &int(4), &int(6)).unwrap(), int(24));
        assert_eq!(binary(BinOp::Mod, &int(7), &int(3)).unwrap(), int(1));
    }

    #[test]
    fn division_promotes_to_float() {
        assert_eq!(binary(BinOp::Div, &int(7), &int(2)).unwrap(), float(3.5));
        assert_eq!(binary(BinOp::Div, &int(6), &int(3)).unwrap(), float(2.0));
    }

    #[test]
    fn division_by_zero() {
        let err = binary(BinOp::Div, &int(1), &int(0)).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Cannot divide by zero");
        let err = binary(BinOp::Mod, &float(1.0), &int(0)).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Cannot divide by zero");
    }

    #[test]
    fn mixed_numeric_promotion() {
        assert_eq!(binary(BinOp::Add, &int(1), &float(0.5)).unwrap(), float(1.5));
        assert_eq!(binary(BinOp::Add, &float(0.5), &int(1)).unwrap(), float(1.5));
        assert_eq!(
            binary(BinOp::Lt, &int(1), &float(1.5)).unwrap(),
            Value::bool(true, p())
        );
    }

    #[test]
    fn integer_overflow() {
        let err = binary(BinOp::Add, &int(i64::MAX), &int(1)).unwrap_err();
        assert_eq!(err.to_string(), "OverflowError: Integer overflow in '+'");
    }

    #[test]
    fn string_operators() {
        assert_eq!(binary(BinOp::Add, &s("foo"), &s("bar")).unwrap(), s("foobar"));
        assert_eq!(binary(BinOp::Mul, &s("ab"), &int(3)).unwrap(), s("ababab"));
        assert_eq!(binary(BinOp::Mul, &s("ab"), &int(-1)).unwrap(), s(""));
        // `s - n` slices from index n
        assert_eq!(binary(BinOp::Sub, &s("hello"), &int(2)).unwrap(), s("llo"));
        assert_eq!(binary(BinOp::Sub, &s("hello"), &int(-2)).unwrap(), s("lo"));
        // `n - s` truncates the tail
        assert_eq!(binary(BinOp::Sub, &int(2), &s("hello")).unwrap(), s("hel"));
        assert_eq!(binary(BinOp::Sub, &int(9), &s("hi")).unwrap(), s(""));
    }

    #[test]
    fn string_ordering_is_lexicographic() {
        assert_eq!(
            binary(BinOp::Lt, &s("apple"), &s("banana")).unwrap(),
            Value::bool(true, p())
        );
        // Length comparison would say otherwise.
        assert_eq!(
            binary(BinOp::Gt, &s("b"), &s("apple")).unwrap(),
            Value::bool(true, p())
        );
    }

    #[test]
    fn bytes_mirror_strings() {
        let b = Value::bytes(b"ab".to_vec(), p());
        let out = binary(BinOp::Add, &b, &s("cd")).unwrap();
        assert_eq!(out, Value::bytes(b"abcd".to_vec(), p()));
        assert_eq!(out.type_name(), "strbytes");

        // String left, bytes right also stays a byte string.
        let out = binary(BinOp::Add, &s("xy"), &Value::bytes(b"z".to_vec(), p())).unwrap();
        assert_eq!(out, Value::bytes(b"xyz".to_vec(), p()));

        assert_eq!(
            binary(BinOp::Eq, &Value::bytes(b"hi".to_vec(), p()), &s("hi")).unwrap(),
            Value::bool(true, p())
        );
    }

    #[test]
    fn array_operators() {
        let a = Value::array(vec![int(1), int(2)], p());
        let b = Value::array(vec![int(3)], p());
        let out = binary(BinOp::Add, &a, &b).unwrap();
        assert_eq!(out, Value::array(vec![int(1), int(2), int(3)], p()));

        let out = binary(BinOp::Sub, &int(1), &a).unwrap();
        assert_eq!(out, Value::array(vec![int(1)], p()));

        let out = binary(BinOp::Mul, &b, &int(2)).unwrap();
        assert_eq!(out, Value::array(vec![int(3), int(3)], p()));

        assert_eq!(binary(BinOp::Eq, &a, &a).unwrap(), Value::bool(true, p()));
    }

    #[test]
    fn array_ordering_is_a_type_error() {
        let a = Value::array(vec![int(1)], p());
        let b = Value::array(vec![int(2)], p());
        let err = binary(BinOp::Lt, &a, &b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Operator '<' cannot be applied to 'array' and 'array'"
        );
    }

    #[test]
    fn missing_combinations_are_type_errors() {
        let err = binary(BinOp::Add, &int(1), &s("x")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Operator '+' cannot be applied to 'int' and 'string'"
        );
        assert!(binary(BinOp::Add, &Value::hex(1, p()), &int(1)).is_err());
    }

    #[test]
    fn equality_reflexivity_on_scalars() {
        let t = Value::bool(true, p());
        for v in [int(5), float(1.5), t, s("x"), Value::bytes(b"x".to_vec(), p()), Value::nil(p())]
        {
            let out = binary(BinOp::Eq, &v, &v).unwrap();
            assert_eq!(out, Value::bool(true, p()), "x == x for {v:?}");
        }
    }

    #[test]
    fn not_always_yields_bool() {
        let p = p();
        for v in [
            int(0),
            int(7),
            s(""),
            s("x"),
            Value::nil(p),
            Value::array(vec![], p),
        ] {
            let negated = unary(UnOp::Not, &v).unwrap();
            assert_eq!(negated.type_name(), "bool");
            let double = unary(UnOp::Not, &negated).unwrap();
            assert_eq!(double, Value::bool(v.is_truthy(), p));
        }
    }

    #[test]
    fn regex_operators() {
        let re = Value::regex(regex::Regex::new("a+").unwrap(), p());
        let out = binary(BinOp::Add, &re, &s("b")).unwrap();
        assert_eq!(out.repr(false), "a+b");
        assert_eq!(
            binary(BinOp::Eq, &re, &s("a+")).unwrap(),
            Value::bool(true, p())
        );
    }
}
