//! Affine rows: the building block of every domain.
//!
//! A row states `expr >= 0` or `expr = 0` over the columns of its space.

use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use serde::{Serialize, Deserialize};
use std::fmt;

use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::value::{self, Value};
use crate::utils::errors::{PolyError, PolyResult};

/// One row of a constraint system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    /// Left-hand side, compared against zero
    pub expr: AffineExpr,
    /// Comparison against zero
    pub kind: ConstraintKind,
}

/// How a row compares its expression with zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// `expr = 0`
    Equality,
    /// `expr >= 0`
    Inequality,
}

/// Outcome of canonicalizing a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    /// Holds everywhere (e.g. `3 >= 0`).
    Trivial,
    /// Holds nowhere over the integers (e.g. `2i = 1`).
    Infeasible,
    /// A normalized row.
    Row(Constraint),
}

impl Constraint {
    /// Row from an expression and a comparison.
    pub fn new(expr: AffineExpr, kind: ConstraintKind) -> Self {
        Self { expr, kind }
    }

    /// The row `expr >= 0`.
    pub fn ge_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Inequality)
    }

    /// The row `expr = 0`.
    pub fn eq_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Equality)
    }

    /// Create a lower bound constraint: x[index] >= lower
    pub fn lower_bound(index: usize, lower: i64, dim: usize) -> Self {
        let mut expr = AffineExpr::var(index, dim);
        expr.constant = value::int(-lower);
        Self::ge_zero(expr)
    }

    /// Create an upper bound constraint: x[index] <= upper
    pub fn upper_bound(index: usize, upper: i64, dim: usize) -> Self {
        let mut expr = -AffineExpr::var(index, dim);
        expr.constant = value::int(upper);
        Self::ge_zero(expr)
    }

    /// Build a row from machine integers.
    pub fn from_i64(kind: ConstraintKind, coeffs: &[i64], constant: i64) -> Self {
        Self::new(AffineExpr::from_i64(coeffs, constant), kind)
    }

    /// True for `= 0` rows.
    pub fn is_equality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Equality)
    }

    /// True for `>= 0` rows.
    pub fn is_inequality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Inequality)
    }

    /// Dimension of the ambient space.
    pub fn dim(&self) -> usize {
        self.expr.dim()
    }

    /// Check if this constraint is satisfied by an exact point.
    pub fn is_satisfied(&self, point: &[Value]) -> bool {
        let value = self.expr.evaluate(point);
        match self.kind {
            ConstraintKind::Inequality => !value.is_negative(),
            ConstraintKind::Equality => value.is_zero(),
        }
    }

    /// Check satisfaction at a machine-integer point.
    pub fn is_satisfied_i64(&self, point: &[i64]) -> bool {
        let value = self.expr.evaluate_i64(point);
        match self.kind {
            ConstraintKind::Inequality => !value.is_negative(),
            ConstraintKind::Equality => value.is_zero(),
        }
    }

    /// Integer complement of the constraint as a list of disjoint pieces.
    ///
    /// `e >= 0` becomes `-e - 1 >= 0`; `e = 0` becomes `e - 1 >= 0` or
    /// `-e - 1 >= 0`.
    pub fn negate(&self) -> Vec<Constraint> {
        let mut below = -self.expr.clone();
        below.constant -= Value::one();
        match self.kind {
            ConstraintKind::Inequality => vec![Self::ge_zero(below)],
            ConstraintKind::Equality => {
                let mut above = self.expr.clone();
                above.constant -= Value::one();
                vec![Self::ge_zero(above), Self::ge_zero(below)]
            }
        }
    }

    /// The two inequalities equivalent to this row.
    pub fn as_inequalities(&self) -> Vec<Constraint> {
        match self.kind {
            ConstraintKind::Inequality => vec![self.clone()],
            ConstraintKind::Equality => vec![
                Self::ge_zero(self.expr.clone()),
                Self::ge_zero(-self.expr.clone()),
            ],
        }
    }

    /// Divide by the coefficient gcd and tighten the constant.
    pub fn canonicalize(&self) -> Canonical {
        let g = self.expr.content();
        if g.is_zero() {
            let holds = match self.kind {
                ConstraintKind::Inequality => !self.expr.constant.is_negative(),
                ConstraintKind::Equality => self.expr.constant.is_zero(),
            };
            return if holds { Canonical::Trivial } else { Canonical::Infeasible };
        }
        let mut coeffs: Vec<Value> = self.expr.coeffs.iter().map(|c| c / &g).collect();
        let mut constant = match self.kind {
            ConstraintKind::Inequality => self.expr.constant.div_floor(&g),
            ConstraintKind::Equality => {
                if !self.expr.constant.is_multiple_of(&g) {
                    return Canonical::Infeasible;
                }
                &self.expr.constant / &g
            }
        };
        if self.is_equality() {
            let leading_negative = coeffs
                .iter()
                .find(|c| !c.is_zero())
                .map_or(false, |c| c.is_negative());
            if leading_negative {
                coeffs.iter_mut().for_each(|c| *c = -&*c);
                constant = -constant;
            }
        }
        Canonical::Row(Self::new(AffineExpr { coeffs, constant }, self.kind))
    }

    /// Render with `names` for the columns.
    pub fn to_string_with_names(&self, names: &[String]) -> String {
        let expr_str = self.expr.to_string_with_names(names);
        match self.kind {
            ConstraintKind::Inequality => format!("{} >= 0", expr_str),
            ConstraintKind::Equality => format!("{} = 0", expr_str),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[]))
    }
}

/// An ordered system of constraints over a fixed dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintSystem {
    /// Rows, in insertion order
    pub constraints: Vec<Constraint>,
    /// Dimension of the ambient space
    pub dim: usize,
}

impl ConstraintSystem {
    /// Create an empty (universe) constraint system.
    pub fn new(dim: usize) -> Self {
        Self { constraints: Vec::new(), dim }
    }

    /// Add a constraint, checking its width.
    pub fn add(&mut self, constraint: Constraint) -> PolyResult<()> {
        if constraint.dim() != self.dim {
            return Err(PolyError::DimensionMismatch {
                operation: "add constraint",
                expected: self.dim,
                found: constraint.dim(),
            });
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Append every row of `constraints`.
    pub fn add_all(&mut self, constraints: impl IntoIterator<Item = Constraint>) -> PolyResult<()> {
        for c in constraints {
            self.add(c)?;
        }
        Ok(())
    }

    /// The `= 0` rows.
    pub fn equalities(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_equality())
    }

    /// The `>= 0` rows.
    pub fn inequalities(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_inequality())
    }

    /// Check if an exact point satisfies all constraints.
    pub fn is_satisfied(&self, point: &[Value]) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(point))
    }

    /// Check if the system has no rows.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Row count.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }
}
