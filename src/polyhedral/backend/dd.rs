//! Double description backend.
//!
//! Polyhedra are homogenized into cones `{(x, t) : A x + b t >= 0, t >= 0}`
//! and converted to generators by Motzkin's incremental method. Two rays are
//! combined only when they are adjacent, decided by the combinatorial test:
//! no third ray saturates every constraint the pair saturates in common.
//! The reverse conversion runs the same method on the polar cone.

use log::trace;
use num_traits::{One, Signed, Zero};

use super::{check_limit, PolyhedralBackend};
use crate::polyhedral::constraint::{Constraint, ConstraintKind};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::generator::GeneratorSystem;
use crate::polyhedral::map::AffineMap;
use crate::polyhedral::polyhedron::Polyhedron;
use crate::polyhedral::value::{self, Value};
use crate::utils::errors::PolyResult;

/// Double description backend.
#[derive(Debug, Clone)]
pub struct DoubleDescription {
    max_rows: usize,
}

/// Saturation set over the constraints processed so far.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SatSet(Vec<u64>);

impl SatSet {
    fn with_capacity(bits: usize) -> Self {
        SatSet(vec![0; (bits + 63) / 64])
    }

    /// The set `{0, .., below - 1}` with room for `capacity` bits.
    fn prefix(below: usize, capacity: usize) -> Self {
        let mut set = Self::with_capacity(capacity);
        for i in 0..below {
            set.insert(i);
        }
        set
    }

    fn insert(&mut self, bit: usize) {
        self.0[bit / 64] |= 1 << (bit % 64);
    }

    fn intersection(&self, other: &SatSet) -> SatSet {
        SatSet(self.0.iter().zip(&other.0).map(|(a, b)| a & b).collect())
    }

    fn is_subset(&self, other: &SatSet) -> bool {
        self.0.iter().zip(&other.0).all(|(a, b)| a & !b == 0)
    }
}

#[derive(Debug, Clone)]
struct Ray {
    v: Vec<Value>,
    sat: SatSet,
}

fn dot(a: &[Value], v: &[Value]) -> Value {
    a.iter()
        .zip(v)
        .filter(|(x, _)| !x.is_zero())
        .map(|(x, y)| x * y)
        .sum()
}

fn primitive(v: Vec<Value>) -> Vec<Value> {
    let g = value::gcd_slice(&v);
    if g.is_zero() || g.is_one() {
        return v;
    }
    v.into_iter().map(|x| x / &g).collect()
}

/// `a * u - b * w`, reduced to a primitive vector.
fn combine(a: &Value, u: &[Value], b: &Value, w: &[Value]) -> Vec<Value> {
    primitive(u.iter().zip(w).map(|(x, y)| a * x - b * y).collect())
}

impl DoubleDescription {
    /// Create a backend that fails past `max_rows` rays.
    pub fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }

    /// Generators `(rays, lines)` of the cone `{z : rows}` in `dim` dimensions.
    fn cone_generators(
        &self,
        dim: usize,
        rows: &[(ConstraintKind, Vec<Value>)],
    ) -> PolyResult<(Vec<Vec<Value>>, Vec<Vec<Value>>)> {
        let nrows = rows.len();
        let mut lines: Vec<Vec<Value>> = (0..dim)
            .map(|i| {
                let mut e = vec![Value::zero(); dim];
                e[i] = Value::one();
                e
            })
            .collect();
        let mut rays: Vec<Ray> = Vec::new();

        for (k, (kind, a)) in rows.iter().enumerate() {
            if let Some(pos) = lines.iter().position(|l| !dot(a, l).is_zero()) {
                // A line crosses the hyperplane: pivot on it.
                let mut pivot = lines.swap_remove(pos);
                let mut ap = dot(a, &pivot);
                if ap.is_negative() {
                    pivot.iter_mut().for_each(|x| *x = -&*x);
                    ap = -ap;
                }
                for l in lines.iter_mut() {
                    let al = dot(a, l);
                    if !al.is_zero() {
                        *l = combine(&ap, l, &al, &pivot);
                    }
                }
                for r in rays.iter_mut() {
                    let ar = dot(a, &r.v);
                    if !ar.is_zero() {
                        r.v = combine(&ap, &r.v, &ar, &pivot);
                    }
                    r.sat.insert(k);
                }
                if *kind == ConstraintKind::Inequality {
                    rays.push(Ray { v: primitive(pivot), sat: SatSet::prefix(k, nrows) });
                }
                continue;
            }

            let values: Vec<Value> = rays.iter().map(|r| dot(a, &r.v)).collect();
            let pos: Vec<usize> = (0..rays.len()).filter(|&i| values[i].is_positive()).collect();
            let neg: Vec<usize> = (0..rays.len()).filter(|&i| values[i].is_negative()).collect();
            if neg.is_empty() && (*kind == ConstraintKind::Inequality || pos.is_empty()) {
                for (r, val) in rays.iter_mut().zip(&values) {
                    if val.is_zero() {
                        r.sat.insert(k);
                    }
                }
                continue;
            }

            let mut next: Vec<Ray> = Vec::new();
            for (i, r) in rays.iter().enumerate() {
                if values[i].is_zero() {
                    let mut r = r.clone();
                    r.sat.insert(k);
                    next.push(r);
                } else if values[i].is_positive() && *kind == ConstraintKind::Inequality {
                    next.push(r.clone());
                }
            }
            for &p in &pos {
                for &n in &neg {
                    let common = rays[p].sat.intersection(&rays[n].sat);
                    let adjacent = rays
                        .iter()
                        .enumerate()
                        .all(|(i, r)| i == p || i == n || !common.is_subset(&r.sat));
                    if !adjacent {
                        continue;
                    }
                    let v = combine(&values[p], &rays[n].v, &values[n], &rays[p].v);
                    let mut sat = common;
                    sat.insert(k);
                    next.push(Ray { v, sat });
                    check_limit("double description", next.len(), self.max_rows)?;
                }
            }
            trace!("dd: constraint {} of {}: {} rays", k + 1, nrows, next.len());
            rays = next;
        }

        let mut out: Vec<Vec<Value>> = Vec::with_capacity(rays.len());
        for r in rays {
            if r.v.iter().any(|x| !x.is_zero()) && !out.contains(&r.v) {
                out.push(r.v);
            }
        }
        Ok((out, lines))
    }

    /// Generator form of a polyhedron.
    pub fn generators(&self, poly: &Polyhedron) -> PolyResult<GeneratorSystem> {
        let dim = poly.dim();
        if poly.is_marked_empty() {
            return Ok(GeneratorSystem::new(dim));
        }
        let mut positivity = vec![Value::zero(); dim + 1];
        positivity[dim] = Value::one();
        let mut rows = vec![(ConstraintKind::Inequality, positivity)];
        rows.extend(poly.homogeneous_rows());
        let (rays, lines) = self.cone_generators(dim + 1, &rows)?;
        Ok(GeneratorSystem::from_cone(dim, rays, lines))
    }

    /// Constraint form of the polyhedron spanned by `gens`.
    pub fn constraints(&self, gens: &GeneratorSystem) -> PolyResult<Polyhedron> {
        let dim = gens.dim;
        if gens.is_empty() {
            return Ok(Polyhedron::empty(dim));
        }
        let (rays, lines) = gens.to_cone();
        let mut rows: Vec<(ConstraintKind, Vec<Value>)> = Vec::with_capacity(rays.len() + lines.len());
        rows.extend(lines.into_iter().map(|l| (ConstraintKind::Equality, l)));
        rows.extend(rays.into_iter().map(|r| (ConstraintKind::Inequality, r)));
        let (dual_rays, dual_lines) = self.cone_generators(dim + 1, &rows)?;

        let to_row = |mut v: Vec<Value>, kind: ConstraintKind| {
            let constant = v.pop().unwrap_or_else(Value::zero);
            Constraint::new(AffineExpr { coeffs: v, constant }, kind)
        };
        let mut out: Vec<Constraint> = dual_lines
            .into_iter()
            .map(|v| to_row(v, ConstraintKind::Equality))
            .collect();
        out.extend(dual_rays.into_iter().map(|v| to_row(v, ConstraintKind::Inequality)));
        Ok(Polyhedron::from_rows_unchecked(dim, out))
    }
}

impl PolyhedralBackend for DoubleDescription {
    fn name(&self) -> &'static str {
        "double-description"
    }

    fn is_empty(&self, poly: &Polyhedron) -> PolyResult<bool> {
        if poly.is_marked_empty() {
            return Ok(true);
        }
        if poly.is_empty_system() {
            return Ok(false);
        }
        Ok(self.generators(poly)?.is_empty())
    }

    fn project_out(&self, poly: &Polyhedron, first: usize, count: usize) -> PolyResult<Polyhedron> {
        let keep: Vec<usize> = (0..poly.dim()).filter(|&c| c < first || c >= first + count).collect();
        let gens = self.generators(poly)?;
        self.constraints(&gens.select(&keep))
    }

    fn image(&self, poly: &Polyhedron, map: &AffineMap) -> PolyResult<Polyhedron> {
        let gens = self.generators(poly)?;
        self.constraints(&gens.apply(map))
    }

    fn convex_hull(&self, members: &[Polyhedron], dim: usize) -> PolyResult<Polyhedron> {
        let mut all = GeneratorSystem::new(dim);
        for m in members {
            all.merge(self.generators(m)?);
        }
        self.constraints(&all)
    }

    fn minimize(&self, poly: &Polyhedron) -> PolyResult<Polyhedron> {
        if poly.is_marked_empty() || poly.is_empty_system() {
            return Ok(poly.clone());
        }
        let gens = self.generators(poly)?;
        self.constraints(&gens)
    }
}
