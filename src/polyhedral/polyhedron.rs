//! Convex integer polyhedra in constraint form.
//!
//! A [`Polyhedron`] is a canonical constraint system: every row is divided by
//! the gcd of its coefficients, inequality constants are tightened to the
//! integers, trivially true rows and duplicates are dropped, and an
//! infeasible row marks the whole polyhedron empty.

use serde::{Serialize, Deserialize};
use std::fmt;

use crate::polyhedral::constraint::{Canonical, Constraint, ConstraintKind, ConstraintSystem};
use crate::polyhedral::map::AffineMap;
use crate::polyhedral::value::Value;
use crate::utils::errors::{PolyError, PolyResult};

/// A convex polyhedron.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polyhedron {
    system: ConstraintSystem,
    infeasible: bool,
}

impl Polyhedron {
    /// The whole space.
    pub fn universe(dim: usize) -> Self {
        Self { system: ConstraintSystem::new(dim), infeasible: false }
    }

    /// A polyhedron known to be empty.
    pub fn empty(dim: usize) -> Self {
        Self { system: ConstraintSystem::new(dim), infeasible: true }
    }

    /// Build and canonicalize from rows, checking their widths.
    pub fn from_constraints(dim: usize, rows: impl IntoIterator<Item = Constraint>) -> PolyResult<Self> {
        let mut poly = Self::universe(dim);
        for row in rows {
            poly.add_constraint(row)?;
        }
        Ok(poly)
    }

    /// Build from rows already known to have width `dim`.
    pub(crate) fn from_rows_unchecked(dim: usize, rows: Vec<Constraint>) -> Self {
        let mut poly = Self::universe(dim);
        for row in rows {
            debug_assert_eq!(row.dim(), dim);
            poly.push_canonical(row);
        }
        poly
    }

    /// Add one row.
    pub fn add_constraint(&mut self, row: Constraint) -> PolyResult<()> {
        if row.dim() != self.dim() {
            return Err(PolyError::DimensionMismatch {
                operation: "add constraint",
                expected: self.dim(),
                found: row.dim(),
            });
        }
        self.push_canonical(row);
        Ok(())
    }

    fn push_canonical(&mut self, row: Constraint) {
        if self.infeasible {
            return;
        }
        match row.canonicalize() {
            Canonical::Trivial => {}
            Canonical::Infeasible => {
                self.infeasible = true;
                self.system.constraints.clear();
            }
            Canonical::Row(row) => {
                if !self.system.constraints.contains(&row) {
                    self.system.constraints.push(row);
                }
            }
        }
    }

    /// Dimension of the ambient space.
    pub fn dim(&self) -> usize {
        self.system.dim
    }

    /// True when a row was found infeasible during canonicalization.
    ///
    /// This is a syntactic check; use a backend for real emptiness.
    pub fn is_marked_empty(&self) -> bool {
        self.infeasible
    }

    /// True when there are no rows (and the polyhedron is the universe).
    pub fn is_universe(&self) -> bool {
        !self.infeasible && self.system.is_empty()
    }

    /// All rows.
    pub fn constraints(&self) -> &[Constraint] {
        &self.system.constraints
    }

    /// Equality rows.
    pub fn equalities(&self) -> impl Iterator<Item = &Constraint> {
        self.system.equalities()
    }

    /// Inequality rows.
    pub fn inequalities(&self) -> impl Iterator<Item = &Constraint> {
        self.system.inequalities()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.system.len()
    }

    /// True when there are no rows.
    pub fn is_empty_system(&self) -> bool {
        self.system.is_empty()
    }

    /// Rows as a constraint system. An infeasible polyhedron yields `-1 >= 0`.
    pub fn to_system(&self) -> ConstraintSystem {
        if self.infeasible {
            let mut sys = ConstraintSystem::new(self.dim());
            let mut row = crate::polyhedral::expr::AffineExpr::zero(self.dim());
            row.constant = Value::from(-1);
            sys.constraints.push(Constraint::ge_zero(row));
            return sys;
        }
        self.system.clone()
    }

    /// Integer point membership.
    pub fn contains(&self, point: &[Value]) -> bool {
        !self.infeasible && self.system.is_satisfied(point)
    }

    /// Machine-integer point membership.
    pub fn contains_i64(&self, point: &[i64]) -> bool {
        !self.infeasible
            && self.system.constraints.iter().all(|c| c.is_satisfied_i64(point))
    }

    /// Intersection (concatenation of rows).
    pub fn intersect(&self, other: &Polyhedron) -> PolyResult<Polyhedron> {
        if self.dim() != other.dim() {
            return Err(PolyError::DimensionMismatch {
                operation: "polyhedron intersection",
                expected: self.dim(),
                found: other.dim(),
            });
        }
        if self.infeasible || other.infeasible {
            return Ok(Self::empty(self.dim()));
        }
        let mut result = self.clone();
        for row in other.constraints() {
            result.push_canonical(row.clone());
        }
        Ok(result)
    }

    /// Same polyhedron without the row at `index`.
    pub fn without_row(&self, index: usize) -> Polyhedron {
        let mut result = self.clone();
        result.system.constraints.remove(index);
        result
    }

    /// Apply a column edit to every row.
    pub fn map_rows<F>(&self, dim: usize, f: F) -> Polyhedron
    where
        F: Fn(&Constraint) -> Constraint,
    {
        if self.infeasible {
            return Self::empty(dim);
        }
        Self::from_rows_unchecked(dim, self.constraints().iter().map(f).collect())
    }

    /// Insert `count` unconstrained dimensions before column `at`.
    pub fn insert_dims(&self, at: usize, count: usize) -> Polyhedron {
        self.map_rows(self.dim() + count, |c| {
            Constraint::new(c.expr.insert_dims(at, count), c.kind)
        })
    }

    /// Drop a column. Rows mentioning it keep their other coefficients.
    pub fn remove_dim(&self, index: usize) -> Polyhedron {
        self.map_rows(self.dim() - 1, |c| Constraint::new(c.expr.remove_dim(index), c.kind))
    }

    /// Preimage under `map`: `{ x : M x + m in self }`.
    pub fn preimage(&self, map: &AffineMap) -> PolyResult<Polyhedron> {
        if map.n_out() != self.dim() {
            return Err(PolyError::DimensionMismatch {
                operation: "preimage",
                expected: self.dim(),
                found: map.n_out(),
            });
        }
        Ok(self.map_rows(map.n_in(), |c| Constraint::new(map.pull_back(&c.expr), c.kind)))
    }

    /// Rows sorted into a canonical order, for syntactic comparison.
    pub fn sorted_rows(&self) -> Vec<Constraint> {
        let mut rows = self.system.constraints.clone();
        rows.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| a.expr.coeffs.cmp(&b.expr.coeffs))
                .then_with(|| a.expr.constant.cmp(&b.expr.constant))
        });
        rows
    }

    /// Syntactic equality up to row order.
    pub fn same_rows(&self, other: &Polyhedron) -> bool {
        self.dim() == other.dim()
            && self.infeasible == other.infeasible
            && self.sorted_rows() == other.sorted_rows()
    }

    /// Rows as `(is_inequality, coefficients..., constant)` vectors.
    pub fn homogeneous_rows(&self) -> Vec<(ConstraintKind, Vec<Value>)> {
        self.to_system()
            .constraints
            .iter()
            .map(|c| {
                let mut row = c.expr.coeffs.clone();
                row.push(c.expr.constant.clone());
                (c.kind, row)
            })
            .collect()
    }

    /// Print with the given dimension names.
    pub fn to_string_with_names(&self, names: &[String]) -> String {
        let rows: Vec<String> = self
            .to_system()
            .constraints
            .iter()
            .map(|c| c.to_string_with_names(names))
            .collect();
        if rows.is_empty() {
            "true".to_string()
        } else {
            rows.join(" and ")
        }
    }
}

impl fmt::Display for Polyhedron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = (0..self.dim()).map(|i| format!("d{}", i)).collect();
        write!(f, "{{ [{}] : {} }}", names.join(", "), self.to_string_with_names(&names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::value::int;

    fn square(n: i64) -> Polyhedron {
        Polyhedron::from_constraints(
            2,
            vec![
                Constraint::lower_bound(0, 0, 2),
                Constraint::upper_bound(0, n, 2),
                Constraint::lower_bound(1, 0, 2),
                Constraint::upper_bound(1, n, 2),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_canonical_rows_deduplicated() {
        let p = Polyhedron::from_constraints(
            1,
            vec![
                Constraint::from_i64(ConstraintKind::Inequality, &[2], 0),
                Constraint::from_i64(ConstraintKind::Inequality, &[1], 0),
                Constraint::from_i64(ConstraintKind::Inequality, &[0], 5),
            ],
        )
        .unwrap();
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_infeasible_row_marks_empty() {
        let p = Polyhedron::from_constraints(
            1,
            vec![Constraint::from_i64(ConstraintKind::Equality, &[2], -1)],
        )
        .unwrap();
        assert!(p.is_marked_empty());
        assert!(!p.contains(&[int(0)]));
    }

    #[test]
    fn test_contains() {
        let p = square(9);
        assert!(p.contains_i64(&[0, 9]));
        assert!(!p.contains_i64(&[10, 0]));
    }

    #[test]
    fn test_insert_and_remove_dims() {
        let p = square(3);
        let q = p.insert_dims(1, 1);
        assert_eq!(q.dim(), 3);
        assert!(q.contains_i64(&[1, 100, 2]));
        assert!(q.remove_dim(1).same_rows(&p));
    }

    #[test]
    fn test_preimage() {
        // i in [0, 3] pulled back through i = 2k gives 2k in [0, 3]: k in [0, 1].
        let p = Polyhedron::from_constraints(
            1,
            vec![Constraint::lower_bound(0, 0, 1), Constraint::upper_bound(0, 3, 1)],
        )
        .unwrap();
        let m = AffineMap::from_outputs(
            1,
            vec![crate::polyhedral::expr::AffineExpr::from_i64(&[2], 0)],
        )
        .unwrap();
        let q = p.preimage(&m).unwrap();
        assert!(q.contains_i64(&[1]));
        assert!(!q.contains_i64(&[2]));
    }

    #[test]
    fn test_intersection_dimension_mismatch() {
        let err = square(3).intersect(&Polyhedron::universe(3)).unwrap_err();
        assert!(matches!(err, PolyError::DimensionMismatch { .. }));
    }
}
