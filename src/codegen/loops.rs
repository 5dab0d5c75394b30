//! Loop trees and their generation.
//!
//! Generation follows Quilleré's scanning scheme, one dimension at a time:
//! project every statement domain on the outer dimensions, split the
//! projections into disjoint convex pieces, order the pieces, and recurse
//! into each piece with the statements it covers. Scalar scattering
//! dimensions never become loops; they only order groups of statements.

use log::{debug, trace, warn};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use serde::{Serialize, Deserialize};

use crate::codegen::block::BlockId;
use crate::polyhedral::constraint::ConstraintKind;
use crate::polyhedral::domain::combine_strides;
use crate::polyhedral::value::{self, Value};
use crate::polyhedral::{AffineExpr, Constraint, Domain, PolyContext, Polyhedron};
use crate::utils::errors::{PolyError, PolyResult};

/// Congruence `x = offset (mod step)` followed by a loop counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stride {
    /// Distance between consecutive iterations
    pub step: Value,
    /// Residue of every iteration modulo `step`
    pub offset: Value,
}

impl Default for Stride {
    fn default() -> Self {
        Self { step: Value::one(), offset: Value::zero() }
    }
}

impl Stride {
    /// True for the default step of one.
    pub fn is_unit(&self) -> bool {
        self.step.is_one()
    }

    /// Smallest value `>= lower` on the lattice.
    pub fn first_from(&self, lower: &Value) -> Value {
        if self.is_unit() {
            return lower.clone();
        }
        lower + (&self.offset - lower).mod_floor(&self.step)
    }
}

/// Contents of a loop node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopBody {
    /// Nested nodes, in execution order
    Inner(Vec<Loop>),
    /// Statement leaf
    Block(BlockId),
}

/// A node of the generated loop tree.
///
/// A node with a `level` scans dimension `level` (1-based) inside `domain`,
/// which spans the outer dimensions, this one, and the parameters. A node
/// without a level is a guard: its body runs when the point built so far
/// lies in `domain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loop {
    /// Scanned dimension, `None` for guards and leaves
    pub level: Option<usize>,
    /// Bounds and guards
    pub domain: Domain,
    /// Step of the scanned dimension
    pub stride: Stride,
    /// Nested nodes or statements
    pub body: LoopBody,
}

impl Loop {
    /// A statement leaf guarded by `domain`.
    pub fn leaf(domain: Domain, block: BlockId) -> Self {
        Self { level: None, domain, stride: Stride::default(), body: LoopBody::Block(block) }
    }

    /// Nested nodes, empty for a leaf.
    pub fn inner(&self) -> &[Loop] {
        match &self.body {
            LoopBody::Inner(inner) => inner,
            LoopBody::Block(_) => &[],
        }
    }

    /// The block of a leaf.
    pub fn block(&self) -> Option<BlockId> {
        match self.body {
            LoopBody::Block(id) => Some(id),
            LoopBody::Inner(_) => None,
        }
    }

    /// Pre-order walk over this node and everything below it.
    pub fn iter(&self) -> LoopIter<'_> {
        LoopIter { stack: vec![self] }
    }

    /// Visit every integer point the tree scans, in execution order.
    ///
    /// `coords` holds the values of the enclosing levels; `visit` receives
    /// the block of each leaf and the full coordinates.
    pub fn enumerate<F>(&self, coords: &mut Vec<i64>, params: &[i64], visit: &mut F) -> PolyResult<()>
    where
        F: FnMut(BlockId, &[i64]),
    {
        let level = match self.level {
            None => {
                if !self.guard_holds(coords, params)? {
                    return Ok(());
                }
                match &self.body {
                    LoopBody::Block(id) => visit(*id, coords),
                    LoopBody::Inner(inner) => {
                        for node in inner {
                            node.enumerate(coords, params, visit)?;
                        }
                    }
                }
                return Ok(());
            }
            Some(level) => level,
        };
        let (lower, upper) = match self.bounds(level, coords, params)? {
            Some(bounds) => bounds,
            None => return Ok(()),
        };
        let mut x = self.stride.first_from(&lower);
        while x <= upper {
            let xi = value::to_i64(&x)?;
            let mut point = coords.clone();
            point.push(xi);
            point.extend_from_slice(params);
            if self.domain.contains_i64(&point) {
                coords.push(xi);
                for node in self.inner() {
                    node.enumerate(coords, params, visit)?;
                }
                coords.pop();
            }
            x += &self.stride.step;
        }
        Ok(())
    }

    fn guard_holds(&self, coords: &[i64], params: &[i64]) -> PolyResult<bool> {
        let point: Vec<i64> = coords.iter().chain(params).copied().collect();
        if point.len() != self.domain.dim() {
            return Err(PolyError::DimensionMismatch {
                operation: "enumeration",
                expected: self.domain.dim(),
                found: point.len(),
            });
        }
        Ok(self.domain.contains_i64(&point))
    }

    /// Range of dimension `level` over all members, `None` when empty.
    fn bounds(&self, level: usize, coords: &[i64], params: &[i64]) -> PolyResult<Option<(Value, Value)>> {
        if coords.len() + 1 + params.len() != self.domain.dim() {
            return Err(PolyError::DimensionMismatch {
                operation: "enumeration",
                expected: self.domain.dim(),
                found: coords.len() + 1 + params.len(),
            });
        }
        let mut range: Option<(Value, Value)> = None;
        for member in self.domain.members() {
            if let Some((lo, hi)) = member_bounds(member, level, coords, params)? {
                range = Some(match range {
                    None => (lo, hi),
                    Some((l, h)) => (l.min(lo), h.max(hi)),
                });
            }
        }
        Ok(range)
    }
}

/// Pre-order iterator over a loop tree.
pub struct LoopIter<'a> {
    stack: Vec<&'a Loop>,
}

impl<'a> Iterator for LoopIter<'a> {
    type Item = &'a Loop;

    fn next(&mut self) -> Option<&'a Loop> {
        let node = self.stack.pop()?;
        self.stack.extend(node.inner().iter().rev());
        Some(node)
    }
}

/// Bounds of column `level - 1` in one convex member at fixed outer values.
fn member_bounds(
    member: &Polyhedron,
    level: usize,
    coords: &[i64],
    params: &[i64],
) -> PolyResult<Option<(Value, Value)>> {
    let col = level - 1;
    let mut point: Vec<Value> = coords.iter().map(|&c| Value::from(c)).collect();
    point.push(Value::zero());
    point.extend(params.iter().map(|&p| Value::from(p)));

    let mut lower: Option<Value> = None;
    let mut upper: Option<Value> = None;
    for row in member.constraints() {
        let a = row.expr.coeff(col);
        let rest = row.expr.evaluate(&point);
        if a.is_zero() {
            if !row.is_satisfied(&point) {
                return Ok(None);
            }
            continue;
        }
        match row.kind {
            ConstraintKind::Equality => {
                if !(-&rest).is_multiple_of(&a) {
                    return Ok(None);
                }
                let x = -&rest / &a;
                lower = Some(lower.map_or(x.clone(), |l| l.max(x.clone())));
                upper = Some(upper.map_or(x.clone(), |u| u.min(x)));
            }
            ConstraintKind::Inequality => {
                if a.is_positive() {
                    let lo = value::ceil_div(&-&rest, &a)?;
                    lower = Some(lower.map_or(lo.clone(), |l| l.max(lo)));
                } else {
                    let hi = value::floor_div(&rest, &-&a)?;
                    upper = Some(upper.map_or(hi.clone(), |u| u.min(hi)));
                }
            }
        }
    }
    match (lower, upper) {
        (Some(lo), Some(hi)) if lo <= hi => Ok(Some((lo, hi))),
        (Some(_), Some(_)) => Ok(None),
        _ => Err(PolyError::Unbounded { level }),
    }
}

/// A statement block waiting to be scanned.
#[derive(Debug, Clone)]
pub struct GenerationItem {
    /// Domain over the loop dimensions and the parameters
    pub domain: Domain,
    /// The block scanned at the leaf
    pub block: BlockId,
    /// Number of loop dimensions in `domain`
    pub depth: usize,
    /// Values of the scalar scattering dimensions
    pub scalars: Vec<Value>,
}

/// Recursive loop generator.
pub struct Generator<'a> {
    ctx: &'a PolyContext,
    nb_par: usize,
    scaldims: &'a [bool],
    simplify: bool,
    first_level: usize,
    last_level: Option<usize>,
}

impl<'a> Generator<'a> {
    /// A generator for `nb_par` parameters and the given scalar dimensions.
    pub fn new(ctx: &'a PolyContext, nb_par: usize, scaldims: &'a [bool], simplify: bool) -> Self {
        Self { ctx, nb_par, scaldims, simplify, first_level: 1, last_level: None }
    }

    /// Separate overlapping domains only at depths `first..=last`, counting
    /// scalar dimensions. Elsewhere one loop scans the convex hull.
    pub fn with_levels(mut self, first: usize, last: Option<usize>) -> Self {
        self.first_level = first;
        self.last_level = last;
        self
    }

    fn separates(&self, depth: usize) -> bool {
        depth >= self.first_level && self.last_level.map_or(true, |last| depth <= last)
    }

    /// Generate the nodes scanning `items` from `level` (1-based) inward.
    ///
    /// `context` spans the `level - 1` outer dimensions and the parameters;
    /// `scalar` counts the scalar dimensions already consumed.
    pub fn generate(
        &self,
        items: &[GenerationItem],
        context: &Domain,
        level: usize,
        scalar: usize,
    ) -> PolyResult<Vec<Loop>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let position = level - 1 + scalar;
        let is_scalar = self.scaldims.get(position).copied().unwrap_or(false)
            && items.iter().all(|item| scalar < item.scalars.len());
        if is_scalar {
            return self.generate_scalar(items, context, level, scalar);
        }

        let mut result = Vec::new();
        let (leaves, nested): (Vec<&GenerationItem>, Vec<&GenerationItem>) =
            items.iter().partition(|item| item.depth < level);
        for item in leaves {
            if let Some(leaf) = self.leaf(item, context)? {
                result.push(leaf);
            }
        }
        if nested.is_empty() {
            return Ok(result);
        }

        let outer = context.extend(level, self.nb_par)?;
        let mut projections = Vec::with_capacity(nested.len());
        for item in &nested {
            let projected = self.ctx.project(&item.domain, level, self.nb_par)?;
            projections.push(self.ctx.intersection(&projected, &outer)?);
        }
        let pieces = if self.separates(level + scalar) {
            self.separate(&projections)?
        } else {
            self.merge(&projections)?
        };
        trace!("level {}: {} item(s), {} piece(s)", level, nested.len(), pieces.len());

        for index in self.order(&pieces, level)? {
            let (piece, owners) = &pieces[index];
            let piece = Domain::from_polyhedron(piece.clone());
            let mut restricted = Vec::with_capacity(owners.len());
            let mut strides = Vec::with_capacity(owners.len());
            for &k in owners {
                let item = nested[k];
                let within = piece.extend(item.depth, self.nb_par)?;
                let domain = self.ctx.intersection(&item.domain, &within)?;
                if domain.is_marked_empty() {
                    continue;
                }
                strides.push(domain.stride(level, self.nb_par));
                restricted.push(GenerationItem { domain, ..item.clone() });
            }
            if restricted.is_empty() {
                continue;
            }
            let (step, offset) = combine_strides(strides);
            let inner = self.generate(&restricted, &piece, level + 1, scalar)?;
            if inner.is_empty() {
                continue;
            }
            let domain = if self.simplify { self.ctx.simplify(&piece, &outer)? } else { piece };
            if !step.is_one() {
                debug!("level {}: stride {} offset {}", level, step, offset);
            }
            result.push(Loop {
                level: Some(level),
                domain,
                stride: Stride { step, offset },
                body: LoopBody::Inner(inner),
            });
        }
        Ok(result)
    }

    /// Order groups of items by their value on a scalar dimension.
    fn generate_scalar(
        &self,
        items: &[GenerationItem],
        context: &Domain,
        level: usize,
        scalar: usize,
    ) -> PolyResult<Vec<Loop>> {
        let mut values: Vec<&Value> = items.iter().map(|item| &item.scalars[scalar]).collect();
        values.sort();
        values.dedup();
        let mut result = Vec::new();
        for v in values {
            let group: Vec<GenerationItem> =
                items.iter().filter(|item| &item.scalars[scalar] == v).cloned().collect();
            result.extend(self.generate(&group, context, level, scalar + 1)?);
        }
        Ok(result)
    }

    fn leaf(&self, item: &GenerationItem, context: &Domain) -> PolyResult<Option<Loop>> {
        let context = context.extend(item.depth, self.nb_par)?;
        if self.ctx.intersection(&item.domain, &context)?.is_marked_empty() {
            return Ok(None);
        }
        let guard = if self.simplify {
            self.ctx.simplify(&item.domain, &context)?
        } else {
            item.domain.clone()
        };
        Ok(Some(Loop::leaf(guard, item.block)))
    }

    /// Split the projections into disjoint convex pieces, each labelled with
    /// the indices of the projections covering it.
    fn separate(&self, projections: &[Domain]) -> PolyResult<Vec<(Polyhedron, Vec<usize>)>> {
        let mut parts: Vec<(Domain, Vec<usize>)> = Vec::new();
        for (k, projection) in projections.iter().enumerate() {
            let projection = self.ctx.make_disjoint(projection)?;
            let mut remainder = projection.clone();
            let mut next = Vec::with_capacity(parts.len() * 2 + 1);
            for (part, owners) in parts {
                let common = self.ctx.intersection(&part, &projection)?;
                if !common.is_marked_empty() {
                    let mut with_k = owners.clone();
                    with_k.push(k);
                    next.push((common, with_k));
                }
                let rest = self.ctx.difference(&part, &projection)?;
                if !rest.is_marked_empty() {
                    next.push((rest, owners));
                }
                remainder = self.ctx.difference(&remainder, &part)?;
            }
            if !remainder.is_marked_empty() {
                next.push((remainder, vec![k]));
            }
            parts = next;
        }
        Ok(parts
            .into_iter()
            .flat_map(|(domain, owners)| {
                domain.to_members().into_iter().map(move |m| (m, owners.clone()))
            })
            .collect())
    }

    /// One piece, the convex hull of every projection, owned by all of them.
    fn merge(&self, projections: &[Domain]) -> PolyResult<Vec<(Polyhedron, Vec<usize>)>> {
        let mut union = match projections.first() {
            Some(first) => first.clone(),
            None => return Ok(Vec::new()),
        };
        for projection in &projections[1..] {
            union = self.ctx.union(&union, projection)?;
        }
        let hull = self.ctx.convex_hull(&union)?;
        let owners: Vec<usize> = (0..projections.len()).collect();
        Ok(hull.to_members().into_iter().map(|m| (m, owners.clone())).collect())
    }

    /// Topological order of the pieces by "has a smaller value at `level` for
    /// the same outer values". Cycles fall back to input order.
    fn order(&self, pieces: &[(Polyhedron, Vec<usize>)], level: usize) -> PolyResult<Vec<usize>> {
        let n = pieces.len();
        if n < 2 {
            return Ok((0..n).collect());
        }
        let mut before = vec![vec![false; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    before[i][j] = self.precedes(&pieces[i].0, &pieces[j].0, level)?;
                }
            }
        }
        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while order.len() < n {
            let ready = (0..n).find(|&i| {
                !placed[i] && (0..n).all(|j| j == i || placed[j] || !before[j][i])
            });
            let next = match ready {
                Some(i) => i,
                None => {
                    warn!("level {}: cyclic order between pieces, keeping input order", level);
                    (0..n).find(|&i| !placed[i]).unwrap_or(0)
                }
            };
            placed[next] = true;
            order.push(next);
        }
        Ok(order)
    }

    /// True when `p` has a point whose `level` coordinate is smaller than that
    /// of a point of `q` with the same outer coordinates.
    fn precedes(&self, p: &Polyhedron, q: &Polyhedron, level: usize) -> PolyResult<bool> {
        // Columns: outer dimensions, x_p, x_q, parameters.
        let mut combined = p.insert_dims(level, 1).intersect(&q.insert_dims(level - 1, 1))?;
        let width = combined.dim();
        let mut order = AffineExpr::zero(width);
        order.coeffs[level] = Value::one();
        order.coeffs[level - 1] = -Value::one();
        order.constant = -Value::one();
        combined.add_constraint(Constraint::ge_zero(order))?;
        Ok(!self.ctx.is_empty(&Domain::from_polyhedron(combined))?)
    }
}
