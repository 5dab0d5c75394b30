//! Exact integer values used as constraint-matrix entries.
//!
//! Every coefficient in the engine is an arbitrary-precision `BigInt`, so
//! arithmetic never wraps. The fallible operations here (division, conversion
//! to machine integers) report [`ArithError`] instead of panicking.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::utils::errors::ArithError;

/// An exact integer.
pub type Value = BigInt;

/// Shorthand for building a value from a machine integer.
pub fn int(v: i64) -> Value {
    BigInt::from(v)
}

/// Floor division (rounds toward negative infinity).
pub fn floor_div(a: &Value, b: &Value) -> Result<Value, ArithError> {
    if b.is_zero() {
        return Err(ArithError::DivisionByZero);
    }
    Ok(a.div_floor(b))
}

/// Ceiling division (rounds toward positive infinity).
pub fn ceil_div(a: &Value, b: &Value) -> Result<Value, ArithError> {
    if b.is_zero() {
        return Err(ArithError::DivisionByZero);
    }
    Ok(-((-a).div_floor(b)))
}

/// Non-negative remainder of `a` modulo `m`.
pub fn modulo(a: &Value, m: &Value) -> Result<Value, ArithError> {
    if m.is_zero() {
        return Err(ArithError::DivisionByZero);
    }
    Ok(a.mod_floor(&m.abs()))
}

/// Greatest common divisor, always non-negative.
pub fn gcd(a: &Value, b: &Value) -> Value {
    a.gcd(b)
}

/// Least common multiple, always non-negative.
pub fn lcm(a: &Value, b: &Value) -> Value {
    if a.is_zero() || b.is_zero() {
        return Value::zero();
    }
    a.lcm(b)
}

/// Gcd of a slice; zero for an all-zero slice.
pub fn gcd_slice(values: &[Value]) -> Value {
    let mut g = Value::zero();
    for v in values {
        if !v.is_zero() {
            g = g.gcd(v);
            if g.is_one() {
                break;
            }
        }
    }
    g
}

/// Extended Euclid: returns `(g, x, y)` with `a*x + b*y = g >= 0`.
pub fn extended_gcd(a: &Value, b: &Value) -> (Value, Value, Value) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (Value::one(), Value::zero());
    let (mut old_t, mut t) = (Value::zero(), Value::one());
    while !r.is_zero() {
        let q = old_r.div_floor(&r);
        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);
        let next_t = &old_t - &q * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }
    if old_r.is_negative() {
        (-old_r, -old_s, -old_t)
    } else {
        (old_r, old_s, old_t)
    }
}

/// Convert to `i64`, failing on overflow.
pub fn to_i64(v: &Value) -> Result<i64, ArithError> {
    v.to_i64().ok_or(ArithError::Overflow)
}

/// Checked `a * b + c` on machine integers.
pub fn checked_mul_add(a: i64, b: i64, c: i64) -> Result<i64, ArithError> {
    a.checked_mul(b)
        .and_then(|p| p.checked_add(c))
        .ok_or(ArithError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_ceil_div() {
        assert_eq!(floor_div(&int(7), &int(2)).unwrap(), int(3));
        assert_eq!(floor_div(&int(-7), &int(2)).unwrap(), int(-4));
        assert_eq!(ceil_div(&int(7), &int(2)).unwrap(), int(4));
        assert_eq!(ceil_div(&int(-7), &int(2)).unwrap(), int(-3));
        assert_eq!(ceil_div(&int(6), &int(3)).unwrap(), int(2));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(floor_div(&int(1), &int(0)), Err(ArithError::DivisionByZero));
        assert_eq!(ceil_div(&int(1), &int(0)), Err(ArithError::DivisionByZero));
        assert_eq!(modulo(&int(1), &int(0)), Err(ArithError::DivisionByZero));
    }

    #[test]
    fn test_modulo_is_non_negative() {
        assert_eq!(modulo(&int(-1), &int(3)).unwrap(), int(2));
        assert_eq!(modulo(&int(5), &int(-3)).unwrap(), int(2));
    }

    #[test]
    fn test_gcd_lcm() {
        assert_eq!(gcd(&int(12), &int(-18)), int(6));
        assert_eq!(lcm(&int(4), &int(6)), int(12));
        assert_eq!(gcd_slice(&[int(0), int(4), int(-6)]), int(2));
        assert_eq!(gcd_slice(&[int(0), int(0)]), int(0));
    }

    #[test]
    fn test_extended_gcd() {
        let (g, x, y) = extended_gcd(&int(240), &int(46));
        assert_eq!(g, int(2));
        assert_eq!(int(240) * x + int(46) * y, int(2));

        let (g, x, y) = extended_gcd(&int(-4), &int(6));
        assert_eq!(g, int(2));
        assert_eq!(int(-4) * x + int(6) * y, int(2));
    }

    #[test]
    fn test_overflow_is_reported() {
        let big = int(i64::MAX) + int(1);
        assert_eq!(to_i64(&big), Err(ArithError::Overflow));
        assert_eq!(checked_mul_add(i64::MAX, 2, 0), Err(ArithError::Overflow));
        assert_eq!(checked_mul_add(3, 4, 5), Ok(17));
    }
}
