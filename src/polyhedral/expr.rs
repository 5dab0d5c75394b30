//! Affine expressions over a polyhedral space.
//!
//! An affine expression is a linear combination of the space's dimensions
//! plus a constant: `aff(x) = c0 + c1*x1 + c2*x2 + ... + cn*xn`. Iterators and
//! parameters share one coefficient vector; which columns are parameters is
//! decided by the caller (`nb_par` trailing columns).

use num_traits::{One, Signed, Zero};
use serde::{Serialize, Deserialize};
use std::fmt;
use std::ops::{Add, Sub, Neg};

use crate::polyhedral::value::{self, Value};

/// An affine expression: constant + sum(coeff[i] * x[i])
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Coefficients for each dimension (index = dimension index)
    pub coeffs: Vec<Value>,
    /// Constant term
    pub constant: Value,
}

impl AffineExpr {
    /// Create a zero expression.
    pub fn zero(dim: usize) -> Self {
        Self {
            coeffs: vec![Value::zero(); dim],
            constant: Value::zero(),
        }
    }

    /// Create a constant expression.
    pub fn constant(value: impl Into<Value>, dim: usize) -> Self {
        Self {
            coeffs: vec![Value::zero(); dim],
            constant: value.into(),
        }
    }

    /// Create an expression for a single dimension.
    pub fn var(index: usize, dim: usize) -> Self {
        let mut expr = Self::zero(dim);
        if index < dim {
            expr.coeffs[index] = Value::one();
        }
        expr
    }

    /// Build from machine integers: `coeffs` then the constant.
    pub fn from_i64(coeffs: &[i64], constant: i64) -> Self {
        Self {
            coeffs: coeffs.iter().map(|&c| value::int(c)).collect(),
            constant: value::int(constant),
        }
    }

    /// Dimension of the ambient space.
    pub fn dim(&self) -> usize {
        self.coeffs.len()
    }

    /// Coefficient of a dimension (zero when out of range).
    pub fn coeff(&self, index: usize) -> Value {
        self.coeffs.get(index).cloned().unwrap_or_else(Value::zero)
    }

    /// Set the coefficient of a dimension.
    pub fn set_coeff(&mut self, index: usize, value: impl Into<Value>) {
        if index < self.coeffs.len() {
            self.coeffs[index] = value.into();
        }
    }

    /// True when every coefficient is zero.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(Zero::is_zero)
    }

    /// True when the expression is identically zero.
    pub fn is_zero(&self) -> bool {
        self.constant.is_zero() && self.is_constant()
    }

    /// True when only the given range of columns may be non-zero.
    pub fn only_involves(&self, range: std::ops::Range<usize>) -> bool {
        self.coeffs
            .iter()
            .enumerate()
            .all(|(i, c)| c.is_zero() || range.contains(&i))
    }

    /// Index of the last non-zero coefficient.
    pub fn last_nonzero(&self) -> Option<usize> {
        self.coeffs.iter().rposition(|c| !c.is_zero())
    }

    /// Evaluate at an exact point.
    pub fn evaluate(&self, point: &[Value]) -> Value {
        let mut result = self.constant.clone();
        for (c, x) in self.coeffs.iter().zip(point) {
            if !c.is_zero() {
                result += c * x;
            }
        }
        result
    }

    /// Evaluate at a machine-integer point.
    pub fn evaluate_i64(&self, point: &[i64]) -> Value {
        let mut result = self.constant.clone();
        for (c, &x) in self.coeffs.iter().zip(point) {
            if !c.is_zero() {
                result += c * Value::from(x);
            }
        }
        result
    }

    /// Scale the expression by a constant.
    pub fn scale(&self, factor: &Value) -> Self {
        Self {
            coeffs: self.coeffs.iter().map(|c| c * factor).collect(),
            constant: &self.constant * factor,
        }
    }

    /// `self * a + other * b`, the elimination step of Gauss and Fourier-Motzkin.
    pub fn combine(&self, a: &Value, other: &AffineExpr, b: &Value) -> Self {
        assert_eq!(self.dim(), other.dim());
        Self {
            coeffs: self
                .coeffs
                .iter()
                .zip(&other.coeffs)
                .map(|(x, y)| x * a + y * b)
                .collect(),
            constant: &self.constant * a + &other.constant * b,
        }
    }

    /// Gcd of the coefficients, ignoring the constant.
    pub fn content(&self) -> Value {
        value::gcd_slice(&self.coeffs)
    }

    /// Divide everything (constant included) by the gcd of all entries.
    pub fn normalize(&self) -> Self {
        let g = value::gcd(&self.content(), &self.constant);
        if g.is_zero() || g.is_one() {
            return self.clone();
        }
        Self {
            coeffs: self.coeffs.iter().map(|c| c / &g).collect(),
            constant: &self.constant / &g,
        }
    }

    /// Insert `count` zero columns before `at`.
    pub fn insert_dims(&self, at: usize, count: usize) -> Self {
        let mut coeffs = Vec::with_capacity(self.coeffs.len() + count);
        coeffs.extend_from_slice(&self.coeffs[..at]);
        coeffs.extend(std::iter::repeat(Value::zero()).take(count));
        coeffs.extend_from_slice(&self.coeffs[at..]);
        Self { coeffs, constant: self.constant.clone() }
    }

    /// Remove a column.
    pub fn remove_dim(&self, index: usize) -> Self {
        let mut coeffs = self.coeffs.clone();
        coeffs.remove(index);
        Self { coeffs, constant: self.constant.clone() }
    }

    /// Keep only the listed columns, in order.
    pub fn select_dims(&self, columns: &[usize]) -> Self {
        Self {
            coeffs: columns.iter().map(|&c| self.coeff(c)).collect(),
            constant: self.constant.clone(),
        }
    }

    /// Convert to C-like text with the given dimension names.
    pub fn to_string_with_names(&self, names: &[String]) -> String {
        let mut out = String::new();
        for (i, c) in self.coeffs.iter().enumerate() {
            if c.is_zero() {
                continue;
            }
            let default_name = format!("d{}", i);
            let name = names.get(i).map(String::as_str).unwrap_or(&default_name);
            push_term(&mut out, c, Some(name));
        }
        if !self.constant.is_zero() || out.is_empty() {
            push_term(&mut out, &self.constant, None);
        }
        out
    }
}

fn push_term(out: &mut String, c: &Value, name: Option<&str>) {
    let first = out.is_empty();
    let magnitude = c.abs();
    if c.is_negative() {
        out.push('-');
    } else if !first {
        out.push('+');
    }
    match name {
        Some(name) if magnitude.is_one() => out.push_str(name),
        Some(name) => {
            out.push_str(&magnitude.to_string());
            out.push('*');
            out.push_str(name);
        }
        None => out.push_str(&magnitude.to_string()),
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.combine(&Value::one(), &other, &Value::one())
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.combine(&Value::one(), &other, &-Value::one())
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(&-Value::one())
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[]))
    }
}
