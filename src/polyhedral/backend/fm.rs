//! Fourier-Motzkin backend.
//!
//! Works on constraints only. Equalities are used for substitution first;
//! remaining variables are eliminated by pairing lower and upper bounds.
//! Rows are scaled exactly (no integer tightening) so that emptiness is the
//! rational one, matching the double description backend.

use log::trace;
use num_traits::{One, Signed, Zero};

use super::{check_limit, PolyhedralBackend};
use crate::polyhedral::constraint::{Constraint, ConstraintKind};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::map::AffineMap;
use crate::polyhedral::polyhedron::Polyhedron;
use crate::polyhedral::value::Value;
use crate::utils::errors::PolyResult;

/// Fourier-Motzkin backend.
#[derive(Debug, Clone)]
pub struct FourierMotzkin {
    max_rows: usize,
}

/// Rows after an elimination step, or proof of infeasibility.
enum Rows {
    Feasible(Vec<Constraint>),
    Infeasible,
}

impl FourierMotzkin {
    /// Create a backend that fails past `max_rows` rows.
    pub fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }

    /// Exact scaling, constant rows checked, duplicates and weaker parallel
    /// inequalities dropped.
    fn clean(rows: Vec<Constraint>) -> Rows {
        let mut out: Vec<Constraint> = Vec::with_capacity(rows.len());
        for row in rows {
            let row = Constraint::new(row.expr.normalize(), row.kind);
            if row.expr.is_constant() {
                let c = &row.expr.constant;
                let holds = match row.kind {
                    ConstraintKind::Inequality => !c.is_negative(),
                    ConstraintKind::Equality => c.is_zero(),
                };
                if !holds {
                    return Rows::Infeasible;
                }
                continue;
            }
            if row.is_inequality() {
                if let Some(other) = out
                    .iter_mut()
                    .find(|o| o.is_inequality() && o.expr.coeffs == row.expr.coeffs)
                {
                    if row.expr.constant < other.expr.constant {
                        *other = row;
                    }
                    continue;
                }
            }
            if !out.contains(&row) {
                out.push(row);
            }
        }
        Rows::Feasible(out)
    }

    /// Eliminate column `var`.
    fn eliminate(&self, mut rows: Vec<Constraint>, var: usize) -> PolyResult<Rows> {
        if let Some(at) = rows.iter().position(|r| r.is_equality() && !r.expr.coeff(var).is_zero()) {
            let eq = rows.swap_remove(at);
            let a = eq.expr.coeff(var);
            let scale = a.abs();
            let substituted = rows
                .into_iter()
                .map(|r| {
                    let b = r.expr.coeff(var);
                    if b.is_zero() {
                        return r;
                    }
                    let factor = if a.is_negative() { -b } else { b };
                    Constraint::new(r.expr.combine(&scale, &eq.expr, &-factor), r.kind)
                })
                .collect();
            return Ok(Self::clean(substituted));
        }

        let mut lower = Vec::new();
        let mut upper = Vec::new();
        let mut rest = Vec::new();
        for r in rows {
            let c = r.expr.coeff(var);
            if c.is_positive() {
                lower.push(r);
            } else if c.is_negative() {
                upper.push(r);
            } else {
                rest.push(r);
            }
        }
        check_limit("fourier-motzkin", rest.len() + lower.len() * upper.len(), self.max_rows)?;
        for lo in &lower {
            let a = lo.expr.coeff(var);
            for up in &upper {
                let b = -up.expr.coeff(var);
                rest.push(Constraint::ge_zero(lo.expr.combine(&b, &up.expr, &a)));
            }
        }
        Ok(Self::clean(rest))
    }

    /// Eliminate the given columns, cheapest first.
    fn eliminate_all(&self, rows: Vec<Constraint>, mut vars: Vec<usize>) -> PolyResult<Rows> {
        check_limit("fourier-motzkin", rows.len(), self.max_rows)?;
        let mut current = match Self::clean(rows) {
            Rows::Feasible(rows) => rows,
            Rows::Infeasible => return Ok(Rows::Infeasible),
        };
        while !vars.is_empty() {
            let cost = |v: usize| -> usize {
                if current.iter().any(|r| r.is_equality() && !r.expr.coeff(v).is_zero()) {
                    return 0;
                }
                let pos = current.iter().filter(|r| r.expr.coeff(v).is_positive()).count();
                let neg = current.iter().filter(|r| r.expr.coeff(v).is_negative()).count();
                pos * neg
            };
            let idx = vars
                .iter()
                .enumerate()
                .min_by_key(|(_, &v)| cost(v))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let var = vars.swap_remove(idx);
            current = match self.eliminate(current, var)? {
                Rows::Feasible(rows) => rows,
                Rows::Infeasible => return Ok(Rows::Infeasible),
            };
            trace!("fm: eliminated column {}: {} rows", var, current.len());
        }
        Ok(Rows::Feasible(current))
    }

    fn project_rows(
        &self,
        rows: Vec<Constraint>,
        dim: usize,
        first: usize,
        count: usize,
    ) -> PolyResult<Polyhedron> {
        let vars: Vec<usize> = (first..first + count).collect();
        match self.eliminate_all(rows, vars)? {
            Rows::Infeasible => Ok(Polyhedron::empty(dim - count)),
            Rows::Feasible(rows) => {
                let keep: Vec<usize> = (0..dim).filter(|&c| c < first || c >= first + count).collect();
                let rows = rows
                    .into_iter()
                    .map(|r| Constraint::new(r.expr.select_dims(&keep), r.kind))
                    .collect();
                Ok(Polyhedron::from_rows_unchecked(dim - count, rows))
            }
        }
    }
}

impl PolyhedralBackend for FourierMotzkin {
    fn name(&self) -> &'static str {
        "fourier-motzkin"
    }

    fn is_empty(&self, poly: &Polyhedron) -> PolyResult<bool> {
        if poly.is_marked_empty() {
            return Ok(true);
        }
        let vars = (0..poly.dim()).collect();
        Ok(matches!(self.eliminate_all(poly.constraints().to_vec(), vars)?, Rows::Infeasible))
    }

    fn project_out(&self, poly: &Polyhedron, first: usize, count: usize) -> PolyResult<Polyhedron> {
        if poly.is_marked_empty() {
            return Ok(Polyhedron::empty(poly.dim() - count));
        }
        self.project_rows(poly.constraints().to_vec(), poly.dim(), first, count)
    }

    fn image(&self, poly: &Polyhedron, map: &AffineMap) -> PolyResult<Polyhedron> {
        let n_out = map.n_out();
        let n_in = map.n_in();
        if poly.is_marked_empty() {
            return Ok(Polyhedron::empty(n_out));
        }
        // Lifted space (y, x): y = M x + m, x in poly.
        let mut rows: Vec<Constraint> = poly
            .constraints()
            .iter()
            .map(|c| Constraint::new(c.expr.insert_dims(0, n_out), c.kind))
            .collect();
        for (i, out) in map.outputs.iter().enumerate() {
            let mut expr = -out.insert_dims(0, n_out);
            expr.coeffs[i] = Value::one();
            rows.push(Constraint::eq_zero(expr));
        }
        self.project_rows(rows, n_out + n_in, n_out, n_in)
    }

    fn convex_hull(&self, members: &[Polyhedron], dim: usize) -> PolyResult<Polyhedron> {
        let mut live = Vec::new();
        for m in members {
            if !self.is_empty(m)? {
                live.push(m);
            }
        }
        match live.len() {
            0 => return Ok(Polyhedron::empty(dim)),
            1 => return Ok(live[0].clone()),
            _ => {}
        }
        // Balas: x = sum y_k, A_k y_k + b_k l_k >= 0, l_k >= 0, sum l_k = 1.
        // Columns: x (dim), then (y_k, l_k) blocks of width dim + 1.
        let width = dim + live.len() * (dim + 1);
        let block = |k: usize| dim + k * (dim + 1);
        let mut rows = Vec::new();
        let mut sum_lambda = AffineExpr::constant(-1, width);
        for (k, m) in live.iter().enumerate() {
            let base = block(k);
            for c in m.constraints() {
                let mut expr = AffineExpr::zero(width);
                for (j, coeff) in c.expr.coeffs.iter().enumerate() {
                    expr.coeffs[base + j] = coeff.clone();
                }
                expr.coeffs[base + dim] = c.expr.constant.clone();
                rows.push(Constraint::new(expr, c.kind));
            }
            rows.push(Constraint::ge_zero(AffineExpr::var(base + dim, width)));
            sum_lambda.coeffs[base + dim] = Value::one();
        }
        rows.push(Constraint::eq_zero(sum_lambda));
        for j in 0..dim {
            let mut expr = AffineExpr::var(j, width);
            for k in 0..live.len() {
                expr.coeffs[block(k) + j] = -Value::one();
            }
            rows.push(Constraint::eq_zero(expr));
        }
        self.project_rows(rows, width, dim, width - dim)
    }

    fn minimize(&self, poly: &Polyhedron) -> PolyResult<Polyhedron> {
        if poly.is_marked_empty() || poly.is_empty_system() {
            return Ok(poly.clone());
        }
        if self.is_empty(poly)? {
            return Ok(Polyhedron::empty(poly.dim()));
        }
        let mut current = poly.clone();
        let mut i = 0;
        while i < current.len() {
            let row = current.constraints()[i].clone();
            let others = current.without_row(i);
            let mut implied = true;
            for piece in row.negate() {
                let mut test = others.clone();
                test.add_constraint(piece)?;
                if !self.is_empty(&test)? {
                    implied = false;
                    break;
                }
            }
            if implied {
                current = others;
            } else {
                i += 1;
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::value::int;

    fn ineq(coeffs: &[i64], constant: i64) -> Constraint {
        Constraint::from_i64(ConstraintKind::Inequality, coeffs, constant)
    }

    #[test]
    fn test_equality_substitution() {
        // j = 2i, 0 <= j <= 8: projecting out j leaves 0 <= i <= 4.
        let fm = FourierMotzkin::new(100);
        let p = Polyhedron::from_constraints(
            2,
            vec![
                Constraint::from_i64(ConstraintKind::Equality, &[2, -1], 0),
                ineq(&[0, 1], 0),
                ineq(&[0, -1], 8),
            ],
        )
        .unwrap();
        let q = fm.project_out(&p, 1, 1).unwrap();
        assert!(q.contains_i64(&[4]));
        assert!(!q.contains_i64(&[5]));
        assert!(!q.contains_i64(&[-1]));
    }

    #[test]
    fn test_image_of_interval() {
        // i in [0, 3] under i -> i + 10
        let fm = FourierMotzkin::new(100);
        let p = Polyhedron::from_constraints(1, vec![ineq(&[1], 0), ineq(&[-1], 3)]).unwrap();
        let shift = AffineMap::from_outputs(1, vec![AffineExpr::from_i64(&[1], 10)]).unwrap();
        let img = fm.image(&p, &shift).unwrap();
        assert!(img.contains(&[int(10)]));
        assert!(img.contains(&[int(13)]));
        assert!(!img.contains(&[int(14)]));
    }

    #[test]
    fn test_rational_emptiness_without_tightening() {
        // 1 <= 2i <= 1 has the rational point i = 1/2; both backends keep it.
        let fm = FourierMotzkin::new(100);
        let rows = vec![ineq(&[2, -1], -1), ineq(&[-2, 1], 1), ineq(&[0, 1], 0), ineq(&[0, -1], 0)];
        let p = Polyhedron::from_constraints(2, rows).unwrap();
        assert!(!fm.is_empty(&p).unwrap());
    }
}
