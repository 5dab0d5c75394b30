//! Affine maps between polyhedral spaces.
//!
//! A map is stored as one affine expression per output dimension over the
//! input space. The homogeneous matrix form `(n_out + 1) x (n_in + 1)` used by
//! the textual format is available through [`AffineMap::to_matrix`].

use num_traits::{One, Zero};
use serde::{Serialize, Deserialize};
use std::fmt;

use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::value::Value;
use crate::utils::errors::{PolyError, PolyResult};
use crate::utils::matrix::RationalMatrix;

/// An affine map `y = M x + m`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffineMap {
    /// Number of input dimensions
    pub n_in: usize,
    /// Output expressions (one per output dimension)
    pub outputs: Vec<AffineExpr>,
}

impl AffineMap {
    /// Create an identity map of given dimension.
    pub fn identity(dim: usize) -> Self {
        Self {
            n_in: dim,
            outputs: (0..dim).map(|i| AffineExpr::var(i, dim)).collect(),
        }
    }

    /// Create from output expressions, checking their width.
    pub fn from_outputs(n_in: usize, outputs: Vec<AffineExpr>) -> PolyResult<Self> {
        if let Some(bad) = outputs.iter().find(|e| e.dim() != n_in) {
            return Err(PolyError::DimensionMismatch {
                operation: "affine map",
                expected: n_in,
                found: bad.dim(),
            });
        }
        Ok(Self { n_in, outputs })
    }

    /// Map keeping the listed input columns, in order.
    pub fn selection(n_in: usize, columns: &[usize]) -> Self {
        Self {
            n_in,
            outputs: columns.iter().map(|&c| AffineExpr::var(c, n_in)).collect(),
        }
    }

    /// Map from the homogeneous matrix form. The last row must be `0 ... 0 1`.
    pub fn from_matrix(rows: &[Vec<Value>]) -> PolyResult<Self> {
        let Some((last, body)) = rows.split_last() else {
            return Err(PolyError::DimensionMismatch {
                operation: "affine map matrix",
                expected: 1,
                found: 0,
            });
        };
        let n_in = last.len().saturating_sub(1);
        let homogeneous = last.iter().take(n_in).all(Zero::is_zero)
            && last.last().map_or(false, One::is_one);
        if !homogeneous {
            return Err(PolyError::DimensionMismatch {
                operation: "affine map matrix",
                expected: n_in + 1,
                found: last.len(),
            });
        }
        let outputs = body
            .iter()
            .map(|row| {
                if row.len() != n_in + 1 {
                    return Err(PolyError::DimensionMismatch {
                        operation: "affine map matrix",
                        expected: n_in + 1,
                        found: row.len(),
                    });
                }
                Ok(AffineExpr {
                    coeffs: row[..n_in].to_vec(),
                    constant: row[n_in].clone(),
                })
            })
            .collect::<PolyResult<Vec<_>>>()?;
        Ok(Self { n_in, outputs })
    }

    /// Homogeneous matrix form.
    pub fn to_matrix(&self) -> Vec<Vec<Value>> {
        let mut rows: Vec<Vec<Value>> = self
            .outputs
            .iter()
            .map(|e| {
                let mut row = e.coeffs.clone();
                row.push(e.constant.clone());
                row
            })
            .collect();
        let mut last = vec![Value::zero(); self.n_in];
        last.push(Value::one());
        rows.push(last);
        rows
    }

    /// Get input dimensions.
    pub fn n_in(&self) -> usize {
        self.n_in
    }

    /// Get output dimensions.
    pub fn n_out(&self) -> usize {
        self.outputs.len()
    }

    /// Apply the map to a point.
    pub fn apply(&self, input: &[Value]) -> Vec<Value> {
        self.outputs.iter().map(|e| e.evaluate(input)).collect()
    }

    /// Substitute the map into an expression over the output space.
    ///
    /// Returns `expr(M x + m)` as an expression over the input space.
    pub fn pull_back(&self, expr: &AffineExpr) -> AffineExpr {
        let mut result = AffineExpr::constant(expr.constant.clone(), self.n_in);
        for (coeff, out) in expr.coeffs.iter().zip(&self.outputs) {
            if !coeff.is_zero() {
                result = result.combine(&Value::one(), out, coeff);
            }
        }
        result
    }

    /// Compose two maps: self after other.
    pub fn compose(&self, other: &AffineMap) -> PolyResult<AffineMap> {
        if self.n_in != other.n_out() {
            return Err(PolyError::DimensionMismatch {
                operation: "map composition",
                expected: self.n_in,
                found: other.n_out(),
            });
        }
        let outputs = self.outputs.iter().map(|e| other.pull_back(e)).collect();
        Ok(AffineMap { n_in: other.n_in, outputs })
    }

    /// Invert a square map with an integral inverse.
    pub fn inverse(&self) -> Option<AffineMap> {
        if self.n_in != self.n_out() {
            return None;
        }
        let inv = RationalMatrix::from_values(&self.to_matrix(), self.n_in + 1).inverse()?;
        AffineMap::from_matrix(&inv.to_integer_rows()?).ok()
    }
}

impl fmt::Display for AffineMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_names: Vec<String> = (0..self.n_in).map(|i| format!("i{}", i)).collect();
        let outs: Vec<String> = self
            .outputs
            .iter()
            .map(|e| e.to_string_with_names(&in_names))
            .collect();
        write!(f, "{{ [{}] -> [{}] }}", in_names.join(", "), outs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::value::int;

    fn skew() -> AffineMap {
        // (i, j) -> (i, i + j)
        AffineMap::from_outputs(
            2,
            vec![AffineExpr::from_i64(&[1, 0], 0), AffineExpr::from_i64(&[1, 1], 0)],
        )
        .unwrap()
    }

    #[test]
    fn test_identity() {
        let id = AffineMap::identity(3);
        assert_eq!(id.n_in(), 3);
        assert_eq!(id.n_out(), 3);
        assert_eq!(id.apply(&[int(1), int(2), int(3)]), vec![int(1), int(2), int(3)]);
    }

    #[test]
    fn test_matrix_round_trip() {
        let m = skew();
        assert_eq!(AffineMap::from_matrix(&m.to_matrix()).unwrap(), m);
    }

    #[test]
    fn test_inverse_of_skew() {
        let m = skew();
        let inv = m.inverse().unwrap();
        let p = vec![int(3), int(-4)];
        assert_eq!(inv.apply(&m.apply(&p)), p);
    }

    #[test]
    fn test_non_unimodular_has_no_integral_inverse() {
        let m = AffineMap::from_outputs(1, vec![AffineExpr::from_i64(&[2], 0)]).unwrap();
        assert!(m.inverse().is_none());
    }

    #[test]
    fn test_pull_back() {
        // y0 + 2 y1 - 1 under (i, j) -> (i, i + j)  =  3i + 2j - 1
        let e = AffineExpr::from_i64(&[1, 2], -1);
        assert_eq!(skew().pull_back(&e), AffineExpr::from_i64(&[3, 2], -1));
    }

    #[test]
    fn test_compose_checks_dims() {
        let m = skew();
        assert!(m.compose(&AffineMap::identity(3)).is_err());
        let twice = m.compose(&m).unwrap();
        assert_eq!(twice.apply(&[int(1), int(1)]), vec![int(1), int(3)]);
    }
}
