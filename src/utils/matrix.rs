//! Exact matrix operations.
//!
//! Rational matrices back map inversion and rank computations; the integer
//! column echelon form backs lattice (stride) reasoning.

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use std::fmt;

use crate::polyhedral::value::Value;

/// A matrix with rational entries, used for exact elimination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RationalMatrix {
    data: Vec<Vec<BigRational>>,
    rows: usize,
    cols: usize,
}

impl RationalMatrix {
    /// `rows x cols` matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![vec![BigRational::zero(); cols]; rows],
            rows,
            cols,
        }
    }

    /// `n x n` identity.
    pub fn identity(n: usize) -> Self {
        let mut mat = Self::zeros(n, n);
        for i in 0..n {
            mat.data[i][i] = BigRational::one();
        }
        mat
    }

    /// Create a matrix from integer rows. All rows must have `cols` entries.
    pub fn from_values(rows: &[Vec<Value>], cols: usize) -> Self {
        let data: Vec<Vec<BigRational>> = rows
            .iter()
            .map(|row| {
                debug_assert_eq!(row.len(), cols);
                row.iter().map(|v| BigRational::from_integer(v.clone())).collect()
            })
            .collect();
        Self { rows: data.len(), data, cols }
    }

    /// Row count.
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Column count.
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Entry at `(row, col)`, if in range.
    pub fn get(&self, row: usize, col: usize) -> Option<&BigRational> {
        self.data.get(row)?.get(col)
    }

    /// Product `self * other`, or `None` on a shape mismatch.
    pub fn mul(&self, other: &Self) -> Option<Self> {
        if self.cols != other.rows {
            return None;
        }
        let data = self
            .data
            .iter()
            .map(|row| {
                (0..other.cols)
                    .map(|c| row.iter().zip(&other.data).map(|(x, o)| x * &o[c]).sum())
                    .collect()
            })
            .collect();
        Some(Self { rows: self.rows, cols: other.cols, data })
    }

    /// Rank by Gaussian elimination.
    pub fn rank(&self) -> usize {
        let mut m = self.data.clone();
        let mut rank = 0;
        for col in 0..self.cols {
            let pivot = (rank..self.rows).find(|&r| !m[r][col].is_zero());
            let Some(p) = pivot else { continue };
            m.swap(rank, p);
            let pivot_row = m[rank].clone();
            for r in (rank + 1)..self.rows {
                if m[r][col].is_zero() {
                    continue;
                }
                let factor = &m[r][col] / &pivot_row[col];
                for c in col..self.cols {
                    let delta = &factor * &pivot_row[c];
                    m[r][c] -= delta;
                }
            }
            rank += 1;
        }
        rank
    }

    /// Exact inverse, or `None` when not square or singular.
    pub fn inverse(&self) -> Option<Self> {
        let n = self.rows;
        if n != self.cols {
            return None;
        }
        // Rows of `[self | identity]`, reduced until the left half is the identity.
        let mut work: Vec<Vec<BigRational>> = self
            .data
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let mut wide = row.clone();
                wide.extend((0..n).map(|c| if c == r { BigRational::one() } else { BigRational::zero() }));
                wide
            })
            .collect();

        for col in 0..n {
            let found = (col..n).find(|&r| !work[r][col].is_zero())?;
            work.swap(col, found);
            let scale = work[col][col].recip();
            work[col].iter_mut().for_each(|x| *x *= &scale);
            let pivot = work[col].clone();
            for (r, row) in work.iter_mut().enumerate() {
                if r == col || row[col].is_zero() {
                    continue;
                }
                let factor = row[col].clone();
                row.iter_mut().zip(&pivot).for_each(|(x, p)| *x -= &factor * p);
            }
        }

        let data = work.into_iter().map(|row| row[n..].to_vec()).collect();
        Some(Self { rows: n, cols: n, data })
    }

    /// Rows as integers, when every entry is integral.
    pub fn to_integer_rows(&self) -> Option<Vec<Vec<Value>>> {
        self.data
            .iter()
            .map(|row| {
                row.iter()
                    .map(|r| if r.is_integer() { Some(r.to_integer()) } else { None })
                    .collect::<Option<Vec<Value>>>()
            })
            .collect()
    }
}

impl fmt::Display for RationalMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.data {
            let cells: Vec<String> = row.iter().map(|r| r.to_string()).collect();
            writeln!(f, "[ {} ]", cells.join(" "))?;
        }
        Ok(())
    }
}

/// Integer lattice spanned by the columns of a matrix, kept in column
/// echelon form.
///
/// Column operations are unimodular, so the echelon columns span exactly the
/// same integer lattice as the input columns.
#[derive(Debug, Clone)]
pub struct Lattice {
    /// Basis columns, each of length `rows`.
    basis: Vec<Vec<Value>>,
    /// Pivot row of each basis column (strictly increasing).
    pivots: Vec<usize>,
    rows: usize,
}

impl Lattice {
    /// Build the lattice spanned by `columns` (each of length `rows`).
    pub fn from_columns(mut columns: Vec<Vec<Value>>, rows: usize) -> Self {
        let mut basis = Vec::new();
        let mut pivots = Vec::new();
        for row in 0..rows {
            // Euclid on the entries of this row across the remaining columns.
            loop {
                let mut nonzero: Vec<usize> = (0..columns.len())
                    .filter(|&c| !columns[c][row].is_zero())
                    .collect();
                if nonzero.len() <= 1 {
                    break;
                }
                nonzero.sort_by(|&a, &b| columns[a][row].abs().cmp(&columns[b][row].abs()));
                let small = nonzero[0];
                let pivot_col = columns[small].clone();
                for &c in &nonzero[1..] {
                    let q = columns[c][row].div_floor(&pivot_col[row]);
                    for r in 0..rows {
                        let delta = &q * &pivot_col[r];
                        columns[c][r] -= delta;
                    }
                }
            }
            if let Some(c) = (0..columns.len()).find(|&c| !columns[c][row].is_zero()) {
                let mut col = columns.remove(c);
                if col[row].is_negative() {
                    col.iter_mut().for_each(|v| *v = -&*v);
                }
                basis.push(col);
                pivots.push(row);
            }
        }
        Self { basis, pivots, rows }
    }

    /// Rank of the lattice.
    pub fn rank(&self) -> usize {
        self.basis.len()
    }

    /// Rational coordinates of `v` in the basis, or `None` when `v` is not
    /// in the rational span.
    pub fn coordinates(&self, v: &[Value]) -> Option<Vec<BigRational>> {
        let mut rest: Vec<BigRational> =
            v.iter().map(|x| BigRational::from_integer(x.clone())).collect();
        let mut coords = Vec::with_capacity(self.basis.len());
        for (col, &p) in self.basis.iter().zip(&self.pivots) {
            let q = &rest[p] / BigRational::from_integer(col[p].clone());
            for r in 0..self.rows {
                let delta = &q * BigRational::from_integer(col[r].clone());
                rest[r] -= delta;
            }
            coords.push(q);
        }
        if rest.iter().all(Zero::is_zero) {
            Some(coords)
        } else {
            None
        }
    }

    /// True when `v` is an integer combination of the basis.
    pub fn contains(&self, v: &[Value]) -> bool {
        self.coordinates(v)
            .map_or(false, |c| c.iter().all(|q| q.is_integer()))
    }
}

/// Lcm of the denominators of a rational vector.
pub fn denominator_lcm(values: &[BigRational]) -> BigInt {
    values
        .iter()
        .fold(BigInt::one(), |acc, q| acc.lcm(q.denom()))
}
