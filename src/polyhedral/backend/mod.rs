//! Polyhedral arithmetic backends.
//!
//! A backend supplies the few primitives that need real polyhedral
//! computation: emptiness, projection, image, convex hull and redundancy
//! elimination. Everything else in [`Domain`](crate::polyhedral::Domain) is
//! built on top of these.
//!
//! Two independent implementations are provided:
//! - [`DoubleDescription`]: Motzkin's double description method with the
//!   combinatorial adjacency test, converting between constraints and
//!   generators.
//! - [`FourierMotzkin`]: variable elimination on constraints only.

pub mod dd;
pub mod fm;

pub use dd::DoubleDescription;
pub use fm::FourierMotzkin;

use serde::{Serialize, Deserialize};
use std::fmt;

use crate::polyhedral::map::AffineMap;
use crate::polyhedral::polyhedron::Polyhedron;
use crate::utils::errors::{PolyError, PolyResult};

/// Default cap on the rows or generators of an intermediate system.
pub const DEFAULT_MAX_ROWS: usize = 20_000;

/// The primitive operations a polyhedral library must provide.
pub trait PolyhedralBackend: fmt::Debug {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// True when the polyhedron has no rational point.
    fn is_empty(&self, poly: &Polyhedron) -> PolyResult<bool>;

    /// Eliminate the columns `first..first + count`.
    fn project_out(&self, poly: &Polyhedron, first: usize, count: usize) -> PolyResult<Polyhedron>;

    /// Image under an affine map.
    fn image(&self, poly: &Polyhedron, map: &AffineMap) -> PolyResult<Polyhedron>;

    /// Smallest polyhedron containing every member. All members share `dim`.
    fn convex_hull(&self, members: &[Polyhedron], dim: usize) -> PolyResult<Polyhedron>;

    /// Same set without redundant rows.
    fn minimize(&self, poly: &Polyhedron) -> PolyResult<Polyhedron>;
}

/// Which backend(s) a [`PolyContext`](crate::polyhedral::PolyContext) runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendChoice {
    /// Double description only
    #[default]
    DoubleDescription,
    /// Fourier-Motzkin only
    FourierMotzkin,
    /// Both, comparing every result
    CrossCheck,
}

impl BackendChoice {
    /// Instantiate the primary backend and, in cross-check mode, the secondary.
    pub fn instantiate(
        self,
        max_rows: usize,
    ) -> (Box<dyn PolyhedralBackend>, Option<Box<dyn PolyhedralBackend>>) {
        match self {
            BackendChoice::DoubleDescription => (Box::new(DoubleDescription::new(max_rows)), None),
            BackendChoice::FourierMotzkin => (Box::new(FourierMotzkin::new(max_rows)), None),
            BackendChoice::CrossCheck => (
                Box::new(DoubleDescription::new(max_rows)),
                Some(Box::new(FourierMotzkin::new(max_rows))),
            ),
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendChoice::DoubleDescription => write!(f, "double-description"),
            BackendChoice::FourierMotzkin => write!(f, "fourier-motzkin"),
            BackendChoice::CrossCheck => write!(f, "cross-check"),
        }
    }
}

/// Fail when an intermediate system grows past `limit`.
pub(crate) fn check_limit(operation: &'static str, rows: usize, limit: usize) -> PolyResult<()> {
    if rows > limit {
        return Err(PolyError::ResourceExhaustion { operation, rows, limit });
    }
    Ok(())
}
