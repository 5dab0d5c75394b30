//! Unions of convex polyhedra.
//!
//! A [`Domain`] is the set union of its members. Syntactic operations
//! (preimage, extension, dimension erasure, the lazy comparisons) live here
//! directly; operations that need real polyhedral computation take a
//! [`PolyhedralBackend`] and are normally reached through
//! [`PolyContext`](crate::polyhedral::PolyContext), which adds cross-checking.

use log::trace;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Serialize, Deserialize};
use std::fmt;

use crate::polyhedral::backend::PolyhedralBackend;
use crate::polyhedral::constraint::{Constraint, ConstraintKind};
use crate::polyhedral::map::AffineMap;
use crate::polyhedral::polyhedron::Polyhedron;
use crate::polyhedral::value::{self, Value};
use crate::utils::errors::{PolyError, PolyResult};
use crate::utils::matrix::{denominator_lcm, Lattice, RationalMatrix};

/// Largest stride for which the offset is searched exhaustively.
const MAX_STRIDE_SEARCH: i64 = 1 << 20;

/// A finite union of convex polyhedra sharing one ambient dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    dim: usize,
    members: Vec<Polyhedron>,
}

impl Domain {
    /// The empty set.
    pub fn empty(dim: usize) -> Self {
        Self { dim, members: Vec::new() }
    }

    /// The whole space.
    pub fn universe(dim: usize) -> Self {
        Self { dim, members: vec![Polyhedron::universe(dim)] }
    }

    /// A single convex member.
    pub fn from_polyhedron(poly: Polyhedron) -> Self {
        let dim = poly.dim();
        if poly.is_marked_empty() {
            return Self::empty(dim);
        }
        Self { dim, members: vec![poly] }
    }

    /// Build from members, checking that they all have dimension `dim`.
    pub fn from_members(dim: usize, members: Vec<Polyhedron>) -> PolyResult<Self> {
        for m in &members {
            if m.dim() != dim {
                return Err(PolyError::DimensionMismatch {
                    operation: "domain construction",
                    expected: dim,
                    found: m.dim(),
                });
            }
        }
        let members = members.into_iter().filter(|m| !m.is_marked_empty()).collect();
        Ok(Self { dim, members })
    }

    /// A single member built from rows.
    pub fn from_constraints(dim: usize, rows: impl IntoIterator<Item = Constraint>) -> PolyResult<Self> {
        Ok(Self::from_polyhedron(Polyhedron::from_constraints(dim, rows)?))
    }

    /// Ambient dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The convex members.
    pub fn members(&self) -> &[Polyhedron] {
        &self.members
    }

    /// Number of members.
    pub fn nb_members(&self) -> usize {
        self.members.len()
    }

    /// Consume into the member list.
    pub fn to_members(self) -> Vec<Polyhedron> {
        self.members
    }

    /// True when the domain has no member at all.
    ///
    /// A domain may still be empty with members; ask a backend for that.
    pub fn is_marked_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True when some member has no rows.
    pub fn is_universe(&self) -> bool {
        self.members.iter().any(Polyhedron::is_universe)
    }

    /// True when this is a single polyhedron.
    pub fn is_convex(&self) -> bool {
        self.members.len() == 1
    }

    /// Integer point membership.
    pub fn contains_point(&self, point: &[Value]) -> bool {
        point.len() == self.dim && self.members.iter().any(|m| m.contains(point))
    }

    /// Machine-integer point membership.
    pub fn contains_i64(&self, point: &[i64]) -> bool {
        point.len() == self.dim && self.members.iter().any(|m| m.contains_i64(point))
    }

    fn check_dim(&self, operation: &'static str, found: usize) -> PolyResult<()> {
        if self.dim != found {
            return Err(PolyError::DimensionMismatch { operation, expected: self.dim, found });
        }
        Ok(())
    }

    /// Drop members that are empty or repeat an earlier member.
    fn pruned(
        dim: usize,
        members: impl IntoIterator<Item = Polyhedron>,
        backend: &dyn PolyhedralBackend,
    ) -> PolyResult<Domain> {
        let mut kept: Vec<Polyhedron> = Vec::new();
        for m in members {
            if m.is_marked_empty() || kept.iter().any(|k| k.same_rows(&m)) {
                continue;
            }
            if backend.is_empty(&m)? {
                continue;
            }
            kept.push(m);
        }
        Ok(Domain { dim, members: kept })
    }

    // ---- backend operations ------------------------------------------------

    /// True when no member has a rational point.
    pub fn is_empty(&self, backend: &dyn PolyhedralBackend) -> PolyResult<bool> {
        for m in &self.members {
            if !backend.is_empty(m)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Pairwise intersection of the members.
    pub fn intersection(&self, other: &Domain, backend: &dyn PolyhedralBackend) -> PolyResult<Domain> {
        self.check_dim("intersection", other.dim)?;
        let mut pieces = Vec::with_capacity(self.members.len() * other.members.len());
        for a in &self.members {
            for b in &other.members {
                pieces.push(a.intersect(b)?);
            }
        }
        Self::pruned(self.dim, pieces, backend)
    }

    /// Concatenation of the member lists.
    pub fn union(&self, other: &Domain, backend: &dyn PolyhedralBackend) -> PolyResult<Domain> {
        self.check_dim("union", other.dim)?;
        let members = self.members.iter().chain(&other.members).cloned();
        Self::pruned(self.dim, members, backend)
    }

    /// Image under `map`.
    pub fn image(&self, map: &AffineMap, backend: &dyn PolyhedralBackend) -> PolyResult<Domain> {
        self.check_dim("image", map.n_in())?;
        let mut members = Vec::with_capacity(self.members.len());
        for m in &self.members {
            members.push(backend.image(m, map)?);
        }
        Self::pruned(map.n_out(), members, backend)
    }

    /// Keep the first `level` dimensions and the trailing `nb_par` parameters.
    pub fn project(&self, level: usize, nb_par: usize, backend: &dyn PolyhedralBackend) -> PolyResult<Domain> {
        if level + nb_par > self.dim {
            return Err(PolyError::DimensionMismatch {
                operation: "projection",
                expected: self.dim,
                found: level + nb_par,
            });
        }
        let count = self.dim - level - nb_par;
        if count == 0 {
            return Ok(self.clone());
        }
        let mut members = Vec::with_capacity(self.members.len());
        for m in &self.members {
            members.push(backend.project_out(m, level, count)?);
        }
        Self::pruned(level + nb_par, members, backend)
    }

    /// Integer set difference. Pieces coming from one member are disjoint.
    pub fn difference(&self, other: &Domain, backend: &dyn PolyhedralBackend) -> PolyResult<Domain> {
        self.check_dim("difference", other.dim)?;
        if other.members.is_empty() {
            return Ok(self.clone());
        }
        let mut result = Vec::new();
        for m in &self.members {
            let mut pieces = vec![m.clone()];
            for q in &other.members {
                let mut next = Vec::new();
                for piece in &pieces {
                    next.extend(subtract_convex(piece, q, backend)?);
                }
                pieces = next;
                if pieces.is_empty() {
                    break;
                }
            }
            result.extend(pieces);
        }
        Self::pruned(self.dim, result, backend)
    }

    /// Smallest convex polyhedron containing every member.
    pub fn convex_hull(&self, backend: &dyn PolyhedralBackend) -> PolyResult<Domain> {
        if self.members.len() == 1 {
            return Ok(self.clone());
        }
        let hull = backend.convex_hull(&self.members, self.dim)?;
        Self::pruned(self.dim, [hull], backend)
    }

    /// Remove from `self` what `context` already implies.
    ///
    /// The result `r` satisfies `r ∩ context = self ∩ context`.
    pub fn simplify(&self, context: &Domain, backend: &dyn PolyhedralBackend) -> PolyResult<Domain> {
        self.check_dim("simplify", context.dim)?;
        let mut members = Vec::with_capacity(self.members.len());
        for m in &self.members {
            let mut current = backend.minimize(&drop_dependent_equalities(m, context))?;
            if current.is_marked_empty() {
                continue;
            }
            let mut i = 0;
            while i < current.len() {
                let row = current.constraints()[i].clone();
                let rest = Domain::from_polyhedron(current.without_row(i));
                let base = context.intersection(&rest, backend)?;
                let mut implied = true;
                for piece in row.negate() {
                    let negated = Domain::from_constraints(self.dim, [piece])?;
                    if !base.intersection(&negated, backend)?.is_marked_empty() {
                        implied = false;
                        break;
                    }
                }
                if implied {
                    current = current.without_row(i);
                } else {
                    i += 1;
                }
            }
            // Members disjoint from the context disappear.
            let restricted = context.intersection(&Domain::from_polyhedron(current.clone()), backend)?;
            if !restricted.is_marked_empty() {
                members.push(current);
            }
        }
        Self::pruned(self.dim, members, backend)
    }

    /// Rewrite as a union of pairwise disjoint members.
    pub fn make_disjoint(&self, backend: &dyn PolyhedralBackend) -> PolyResult<Domain> {
        let mut done = Domain::empty(self.dim);
        for m in &self.members {
            let fresh = Domain::from_polyhedron(m.clone()).difference(&done, backend)?;
            done.members.extend(fresh.members);
        }
        Ok(done)
    }

    /// True when every point of `self` lies in `other`.
    pub fn is_subset(&self, other: &Domain, backend: &dyn PolyhedralBackend) -> PolyResult<bool> {
        self.difference(other, backend)?.is_empty(backend)
    }

    /// Set equality through mutual inclusion.
    pub fn equivalent(&self, other: &Domain, backend: &dyn PolyhedralBackend) -> PolyResult<bool> {
        Ok(self.dim == other.dim && self.is_subset(other, backend)? && other.is_subset(self, backend)?)
    }

    // ---- syntactic operations ----------------------------------------------

    /// Preimage under `map`: `{ x : M x in self }`.
    pub fn preimage(&self, map: &AffineMap) -> PolyResult<Domain> {
        self.check_dim("preimage", map.n_out())?;
        let members = self
            .members
            .iter()
            .map(|m| m.preimage(map))
            .collect::<PolyResult<Vec<_>>>()?;
        Domain::from_members(map.n_in(), members)
    }

    /// Pad to `dim` iterators, adding free dimensions before the parameters.
    pub fn extend(&self, dim: usize, nb_par: usize) -> PolyResult<Domain> {
        if dim + nb_par < self.dim || nb_par > self.dim {
            return Err(PolyError::DimensionMismatch {
                operation: "extend",
                expected: self.dim,
                found: dim + nb_par,
            });
        }
        let diff = dim + nb_par - self.dim;
        if diff == 0 {
            return Ok(self.clone());
        }
        let at = self.dim - nb_par;
        Ok(Domain {
            dim: dim + nb_par,
            members: self.members.iter().map(|m| m.insert_dims(at, diff)).collect(),
        })
    }

    /// Append the rows of each member of `self` to the matching member of
    /// `target`. A single-member `self` is applied to every target member.
    pub fn add_constraints(&self, target: &Domain) -> PolyResult<Domain> {
        self.check_dim("add constraints", target.dim)?;
        let broadcast = self.members.len() == 1;
        if !broadcast && self.members.len() != target.members.len() {
            return Err(PolyError::MemberCountMismatch {
                operation: "add constraints",
                source_members: self.members.len(),
                target_members: target.members.len(),
            });
        }
        let members = target
            .members
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let source = if broadcast { &self.members[0] } else { &self.members[i] };
                t.intersect(source)
            })
            .collect::<PolyResult<Vec<_>>>()?;
        Domain::from_members(target.dim, members)
    }

    /// Entry-by-entry comparison of the member lists, in canonical order.
    pub fn lazy_equal(&self, other: &Domain) -> bool {
        if self.dim != other.dim || self.members.len() != other.members.len() {
            return false;
        }
        if self.members.len() > 1 {
            let (mut a, mut b) = (self.clone(), other.clone());
            a.sort();
            b.sort();
            return a.members.iter().zip(&b.members).all(|(p, q)| p.constraints() == q.constraints());
        }
        self.members.iter().zip(&other.members).all(|(p, q)| p.constraints() == q.constraints())
    }

    /// True when the scattering functions `self` and `other` may share one
    /// block: they differ only by a constant of one in a single row that
    /// fixes a scattering dimension, the rows above it form an identity on
    /// the leading dimensions, and no function in `scatterings` other than
    /// the pair can take a value between them.
    pub fn lazy_block<'a>(
        &self,
        other: &Domain,
        scatterings: impl IntoIterator<Item = &'a Domain>,
        nb_scattdims: usize,
    ) -> bool {
        let (p1, p2) = match (self.members.as_slice(), other.members.as_slice()) {
            ([p1], [p2]) => (p1, p2),
            _ => return false,
        };
        if p1.len() != p2.len() || p1.dim() != p2.dim() {
            return false;
        }
        let dim = p1.dim();
        let m1 = matrix_rows(p1);
        let m2 = matrix_rows(p2);

        let mut different = None;
        for (i, (r1, r2)) in m1.iter().zip(&m2).enumerate() {
            match different {
                None => {
                    if r1[..=dim] != r2[..=dim] {
                        return false;
                    }
                    if r1[dim + 1] != r2[dim + 1] {
                        if r1[dim + 1] != &r2[dim + 1] + Value::one() {
                            return false;
                        }
                        different = Some(i);
                    }
                }
                Some(_) => {
                    let split = (nb_scattdims + 1).min(dim + 1);
                    if r1[..split] != r2[..split] {
                        return false;
                    }
                    if r1[split..=dim].iter().chain(&r2[split..=dim]).any(|v| !v.is_zero()) {
                        return false;
                    }
                    if r1[dim + 1] != r2[dim + 1] {
                        return false;
                    }
                }
            }
        }
        let dc = match different {
            None => return true,
            Some(dc) => dc,
        };
        // The differing row must read `c_dc + k = 0` on a scattering dimension.
        if dc >= nb_scattdims.min(dim) || !is_unit_row(&m1[dc], dc, dim + 1) {
            return false;
        }
        // Rows 0..=dc must be the identity on the leading scattering dimensions.
        for (i, row) in m1.iter().enumerate().take(dc + 1) {
            if !is_unit_row(row, i, dc + 2) {
                return false;
            }
            let tail = row.get(dc + 2..=nb_scattdims.min(dim)).unwrap_or(&[]);
            if tail.iter().any(|v| !v.is_zero()) {
                return false;
            }
        }

        let date1 = &m1[dc][dim + 1];
        let date2 = &m2[dc][dim + 1];
        for d3 in scatterings {
            if std::ptr::eq(d3, self) || std::ptr::eq(d3, other) {
                continue;
            }
            let p3 = match d3.members.first() {
                Some(p3) => p3,
                None => continue,
            };
            let m3 = matrix_rows(p3);
            let row3 = match m3.get(dc) {
                Some(row) => row,
                None => continue,
            };
            let width3 = p3.dim() + 1;
            let date3 = &row3[width3];
            let mut differs = date3 != date1 && date3 != date2;
            for i in 0..dc {
                if differs {
                    break;
                }
                differs = m3[i] != m1[i];
            }
            if !differs {
                differs = row3[..width3] != m1[dc][..width3.min(m1[dc].len())];
            }
            if !differs {
                return false;
            }
        }
        true
    }

    /// True when the only rows touching column `dim` read `x_dim + k = 0`.
    pub fn lazy_isscalar(&self, dim: usize) -> bool {
        let poly = match self.members.as_slice() {
            [p] => p,
            _ => return false,
        };
        let mut defined = false;
        for row in matrix_rows(poly) {
            if row[dim + 1].is_zero() {
                continue;
            }
            if !is_unit_row(&row, dim, poly.dim() + 1) {
                return false;
            }
            defined = true;
        }
        defined
    }

    /// Value of a scalar dimension: `-k` from the row `x_dim + k = 0`.
    pub fn scalar(&self, dim: usize) -> Option<Value> {
        self.members.first()?.equalities().find_map(|c| {
            if c.expr.coeff(dim).is_zero() {
                None
            } else {
                Some(-c.expr.constant.clone())
            }
        })
    }

    /// Remove column `dim` together with every row that mentions it.
    pub fn erase_dimension(&self, dim: usize) -> Domain {
        let members = self
            .members
            .iter()
            .map(|m| {
                let rows = m
                    .constraints()
                    .iter()
                    .filter(|c| c.expr.coeff(dim).is_zero())
                    .map(|c| Constraint::new(c.expr.remove_dim(dim), c.kind))
                    .collect();
                Polyhedron::from_rows_unchecked(self.dim - 1, rows)
            })
            .collect();
        Domain { dim: self.dim - 1, members }
    }

    /// Congruence `x_level = offset (mod step)` implied by the equalities,
    /// with `level` 1-based. Returns `(1, 0)` when nothing larger is provable.
    pub fn stride(&self, level: usize, nb_par: usize) -> (Value, Value) {
        combine_strides(self.members.iter().map(|m| member_stride(m, level, nb_par, self.dim)))
    }

    /// Sort members into a canonical order.
    pub fn sort(&mut self) {
        self.members.sort_by_cached_key(Polyhedron::homogeneous_rows);
    }

    /// Print with the given dimension names.
    pub fn to_string_with_names(&self, names: &[String]) -> String {
        if self.members.is_empty() {
            return "false".to_string();
        }
        self.members
            .iter()
            .map(|m| format!("({})", m.to_string_with_names(names)))
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

impl From<Polyhedron> for Domain {
    fn from(poly: Polyhedron) -> Self {
        Domain::from_polyhedron(poly)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = (0..self.dim).map(|i| format!("d{}", i)).collect();
        write!(f, "{{ [{}] : {} }}", names.join(", "), self.to_string_with_names(&names))
    }
}

/// Gcd of the steps and of the offset differences: the congruence every
/// input satisfies.
pub fn combine_strides(strides: impl IntoIterator<Item = (Value, Value)>) -> (Value, Value) {
    let mut iter = strides.into_iter();
    let (mut step, first_offset) = match iter.next() {
        Some(s) => s,
        None => return (Value::one(), Value::zero()),
    };
    for (s, o) in iter {
        step = value::gcd(&step, &value::gcd(&s, &(&o - &first_offset)));
    }
    if step.is_zero() {
        step = Value::one();
    }
    let offset = first_offset.mod_floor(&step);
    (step, offset)
}

/// `piece \ q` as disjoint convex pieces.
fn subtract_convex(
    piece: &Polyhedron,
    q: &Polyhedron,
    backend: &dyn PolyhedralBackend,
) -> PolyResult<Vec<Polyhedron>> {
    if q.is_marked_empty() {
        return Ok(vec![piece.clone()]);
    }
    let mut out = Vec::new();
    let mut inside = piece.clone();
    for row in q.constraints() {
        for negated in row.negate() {
            let mut candidate = inside.clone();
            candidate.add_constraint(negated)?;
            if !candidate.is_marked_empty() && !backend.is_empty(&candidate)? {
                out.push(candidate);
            }
        }
        inside.add_constraint(row.clone())?;
        if inside.is_marked_empty() {
            break;
        }
    }
    Ok(out)
}

/// Drop equalities of `poly` that the equalities of `context` (and the
/// previously kept ones) already span.
fn drop_dependent_equalities(poly: &Polyhedron, context: &Domain) -> Polyhedron {
    let context_eqs: Vec<Vec<Value>> = match context.members() {
        [c] => c.equalities().map(affine_row).collect(),
        _ => Vec::new(),
    };
    let width = poly.dim() + 1;
    let mut basis = context_eqs;
    let mut rank = RationalMatrix::from_values(&basis, width).rank();
    let mut kept = Vec::with_capacity(poly.len());
    for c in poly.constraints() {
        if c.is_equality() {
            basis.push(affine_row(c));
            let new_rank = RationalMatrix::from_values(&basis, width).rank();
            if new_rank == rank {
                basis.pop();
                trace!("simplify: dropped dependent equality {}", c);
                continue;
            }
            rank = new_rank;
        }
        kept.push(c.clone());
    }
    Polyhedron::from_rows_unchecked(poly.dim(), kept)
}

fn affine_row(c: &Constraint) -> Vec<Value> {
    let mut row = c.expr.coeffs.clone();
    row.push(c.expr.constant.clone());
    row
}

/// Rows in matrix layout: `flag coeffs... constant` with flag 0 for equalities.
fn matrix_rows(poly: &Polyhedron) -> Vec<Vec<Value>> {
    poly.homogeneous_rows()
        .into_iter()
        .map(|(kind, coeffs)| {
            let flag = match kind {
                ConstraintKind::Equality => Value::zero(),
                ConstraintKind::Inequality => Value::one(),
            };
            std::iter::once(flag).chain(coeffs).collect()
        })
        .collect()
}

/// True when `row` is an equality with a single unit coefficient on
/// dimension `dim` among the matrix columns `1..end`.
fn is_unit_row(row: &[Value], dim: usize, end: usize) -> bool {
    match (row.get(..=dim), row.get(dim + 1), row.get(dim + 2..end)) {
        (Some(head), Some(unit), Some(tail)) => {
            head.iter().all(Zero::is_zero) && unit.is_one() && tail.iter().all(Zero::is_zero)
        }
        _ => false,
    }
}

fn member_stride(poly: &Polyhedron, level: usize, nb_par: usize, dim: usize) -> (Value, Value) {
    let unit = (Value::one(), Value::zero());
    let col = level - 1;
    let first_param = dim - nb_par;
    let rows: Vec<&Constraint> = poly
        .equalities()
        .filter(|c| {
            c.expr.coeffs[..col].iter().all(Zero::is_zero)
                && c.expr.coeffs[first_param..].iter().all(Zero::is_zero)
        })
        .collect();
    if rows.iter().all(|c| c.expr.coeff(col).is_zero()) {
        return unit;
    }
    let inner: Vec<Vec<Value>> = (col + 1..first_param)
        .map(|j| rows.iter().map(|c| c.expr.coeff(j)).collect())
        .collect();
    let lattice = Lattice::from_columns(inner, rows.len());
    let a: Vec<Value> = rows.iter().map(|c| c.expr.coeff(col)).collect();
    let c: Vec<Value> = rows.iter().map(|c| c.expr.constant.clone()).collect();
    let (q, w) = match (lattice.coordinates(&a), lattice.coordinates(&c)) {
        (Some(q), Some(w)) => (q, w),
        _ => return unit,
    };
    let step = denominator_lcm(&q);
    let limit = match step.to_i64() {
        Some(s) if s > 1 && s <= MAX_STRIDE_SEARCH => s,
        _ => return unit,
    };
    for x0 in 0..limit {
        let x = BigRational::from_integer(Value::from(x0));
        if q.iter().zip(&w).all(|(qi, wi)| (qi * &x + wi).is_integer()) {
            return (step, Value::from(x0));
        }
    }
    unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::backend::{DoubleDescription, DEFAULT_MAX_ROWS};
    use crate::polyhedral::expr::AffineExpr;
    use crate::polyhedral::value::int;

    fn dd() -> DoubleDescription {
        DoubleDescription::new(DEFAULT_MAX_ROWS)
    }

    fn interval(lo: i64, hi: i64) -> Domain {
        Domain::from_constraints(1, vec![Constraint::lower_bound(0, lo, 1), Constraint::upper_bound(0, hi, 1)])
            .unwrap()
    }

    fn eq(coeffs: &[i64], constant: i64) -> Constraint {
        Constraint::from_i64(ConstraintKind::Equality, coeffs, constant)
    }

    #[test]
    fn test_difference_of_intervals() {
        let b = dd();
        let d = interval(0, 9).difference(&interval(3, 5), &b).unwrap();
        for i in -1..11 {
            let expected = (0..=2).contains(&i) || (6..=9).contains(&i);
            assert_eq!(d.contains_i64(&[i]), expected, "at {}", i);
        }
        assert!(interval(3, 5).difference(&interval(0, 9), &b).unwrap().is_empty(&b).unwrap());
    }

    #[test]
    fn test_difference_with_empty_is_copy() {
        let b = dd();
        let d = interval(0, 4);
        assert_eq!(d.difference(&Domain::empty(1), &b).unwrap(), d);
    }

    #[test]
    fn test_union_prunes_duplicates() {
        let b = dd();
        let u = interval(0, 4).union(&interval(0, 4), &b).unwrap();
        assert_eq!(u.nb_members(), 1);
        let u = interval(0, 4).union(&interval(1, 0), &b).unwrap();
        assert_eq!(u.nb_members(), 1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = interval(0, 4).intersection(&Domain::universe(2), &dd()).unwrap_err();
        assert!(matches!(err, PolyError::DimensionMismatch { operation: "intersection", .. }));
    }

    #[test]
    fn test_extend_inserts_before_parameters() {
        // i <= N with one parameter, extended to two iterators.
        let d = Domain::from_constraints(2, vec![Constraint::from_i64(ConstraintKind::Inequality, &[-1, 1], 0)])
            .unwrap();
        let e = d.extend(2, 1).unwrap();
        assert_eq!(e.dim(), 3);
        assert!(e.contains_i64(&[3, 100, 3]));
        assert!(!e.contains_i64(&[4, 0, 3]));
    }

    #[test]
    fn test_add_constraints_broadcast_and_mismatch() {
        let target = interval(0, 9).union(&interval(20, 29), &dd()).unwrap();
        let bound = Domain::from_constraints(1, vec![Constraint::upper_bound(0, 25, 1)]).unwrap();
        let r = bound.add_constraints(&target).unwrap();
        assert!(r.contains_i64(&[25]));
        assert!(!r.contains_i64(&[26]));

        let three = Domain::from_members(1, vec![Polyhedron::universe(1); 3]).unwrap();
        let err = three.add_constraints(&target).unwrap_err();
        assert!(matches!(
            err,
            PolyError::MemberCountMismatch { source_members: 3, target_members: 2, .. }
        ));
    }

    #[test]
    fn test_simplify_removes_implied_rows() {
        let b = dd();
        // 0 <= i <= 9 within the context 0 <= i <= 20: only i <= 9 survives.
        let s = interval(0, 9).simplify(&interval(0, 20), &b).unwrap();
        assert_eq!(s.members()[0].len(), 1);
        assert!(s.intersection(&interval(0, 20), &b).unwrap().equivalent(&interval(0, 9), &b).unwrap());
    }

    #[test]
    fn test_simplify_drops_equality_spanned_by_context() {
        let b = dd();
        let ctx = Domain::from_constraints(2, vec![eq(&[1, -1], 0)]).unwrap();
        let d = Domain::from_constraints(2, vec![eq(&[2, -2], 0), Constraint::lower_bound(0, 0, 2)]).unwrap();
        let s = d.simplify(&ctx, &b).unwrap();
        assert!(s.members()[0].equalities().next().is_none());
    }

    #[test]
    fn test_simplify_minimizes_member() {
        let b = dd();
        // i >= -5 is redundant next to i >= 0, whatever the context.
        let d = Domain::from_constraints(
            1,
            vec![Constraint::lower_bound(0, 0, 1), Constraint::lower_bound(0, -5, 1), Constraint::upper_bound(0, 9, 1)],
        )
        .unwrap();
        let s = d.simplify(&Domain::universe(1), &b).unwrap();
        assert_eq!(s.members()[0].len(), 2);
        assert!(s.equivalent(&d, &b).unwrap());

        let empty = interval(4, 2).simplify(&Domain::universe(1), &b).unwrap();
        assert!(empty.is_marked_empty());
    }

    #[test]
    fn test_sort_makes_lazy_equal_order_blind() {
        let b = dd();
        let ab = interval(0, 2).union(&interval(5, 7), &b).unwrap();
        let ba = interval(5, 7).union(&interval(0, 2), &b).unwrap();
        assert_ne!(ab, ba);
        assert!(ab.lazy_equal(&ba));

        let mut sorted = ba.clone();
        sorted.sort();
        let mut again = ab.clone();
        again.sort();
        assert_eq!(sorted, again);
        assert!(!ab.lazy_equal(&interval(0, 2).union(&interval(5, 8), &b).unwrap()));
    }

    #[test]
    fn test_lazy_isscalar_and_scalar() {
        // c1 = 3, c2 = i
        let d = Domain::from_constraints(3, vec![eq(&[1, 0, 0], -3), eq(&[0, 1, -1], 0)]).unwrap();
        assert!(d.lazy_isscalar(0));
        assert!(!d.lazy_isscalar(1));
        assert_eq!(d.scalar(0), Some(int(3)));
        let erased = d.erase_dimension(0);
        assert_eq!(erased.dim(), 2);
        assert_eq!(erased.members()[0].len(), 1);
    }

    #[test]
    fn test_lazy_block() {
        let scatt = |k: i64| Domain::from_constraints(2, vec![eq(&[1, 0], -k), eq(&[0, 1], 0)]).unwrap();
        let list = vec![scatt(0), scatt(1), scatt(5)];
        assert!(list[0].lazy_block(&list[1], &list, 2));
        assert!(!list[0].lazy_block(&list[2], &list, 2));
        let crowded = vec![scatt(0), scatt(1), scatt(1)];
        assert!(!crowded[0].lazy_block(&crowded[1], &crowded, 2));
    }

    #[test]
    fn test_lazy_block_rejects_late_differing_row() {
        // { [c, i] : c >= 0, c <= 10, i >= 0, i <= 20, c = k }: the rows that
        // differ come after the inequalities.
        let scatt = |k: i64| {
            Polyhedron::from_rows_unchecked(
                2,
                vec![
                    Constraint::lower_bound(0, 0, 2),
                    Constraint::upper_bound(0, 10, 2),
                    Constraint::lower_bound(1, 0, 2),
                    Constraint::upper_bound(1, 20, 2),
                    eq(&[1, 0], -k),
                ],
            )
        };
        let list: Vec<Domain> = vec![scatt(0).into(), scatt(1).into()];
        assert!(!list[0].lazy_block(&list[1], &list, 1));
        assert!(!list[0].lazy_block(&list[1], &list, 2));
    }

    #[test]
    fn test_stride_from_equality() {
        // i = 2j + 1 with j an inner dimension.
        let d = Domain::from_constraints(2, vec![eq(&[1, -2], -1)]).unwrap();
        assert_eq!(d.stride(1, 0), (int(2), int(1)));
        // Outer dimension involved: nothing provable at level 2.
        assert_eq!(d.stride(2, 0), (int(1), int(0)));
    }

    #[test]
    fn test_combine_strides() {
        assert_eq!(combine_strides(vec![(int(4), int(1)), (int(6), int(3))]), (int(2), int(1)));
        assert_eq!(combine_strides(vec![(int(3), int(0)), (int(3), int(1))]), (int(1), int(0)));
    }

    #[test]
    fn test_image_and_preimage() {
        let b = dd();
        let shift = AffineMap::from_outputs(1, vec![AffineExpr::from_i64(&[1], 10)]).unwrap();
        let img = interval(0, 3).image(&shift, &b).unwrap();
        assert!(img.contains_i64(&[13]));
        let back = AffineMap::from_outputs(1, vec![AffineExpr::from_i64(&[1], 10)]).unwrap();
        let pre = img.preimage(&back).unwrap();
        assert!(pre.equivalent(&interval(0, 3), &b).unwrap());
    }

    #[test]
    fn test_make_disjoint() {
        let b = dd();
        let d = interval(0, 5).union(&interval(3, 9), &b).unwrap();
        let disjoint = d.make_disjoint(&b).unwrap();
        for i in 0..=9 {
            let hits = disjoint.members().iter().filter(|m| m.contains_i64(&[i])).count();
            assert_eq!(hits, 1, "at {}", i);
        }
    }
}
