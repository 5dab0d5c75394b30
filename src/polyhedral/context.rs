//! Backend dispatch with optional cross-checking.
//!
//! Every domain operation that needs polyhedral computation goes through a
//! [`PolyContext`]. In cross-check mode the operation is computed by both
//! backends and the two results are compared as sets; a difference aborts
//! with [`PolyError::BackendDisagreement`].

use log::debug;

use crate::polyhedral::backend::{BackendChoice, PolyhedralBackend, DEFAULT_MAX_ROWS};
use crate::polyhedral::domain::Domain;
use crate::polyhedral::map::AffineMap;
use crate::utils::errors::{PolyError, PolyResult};

/// The backend(s) used for domain operations.
#[derive(Debug)]
pub struct PolyContext {
    primary: Box<dyn PolyhedralBackend>,
    secondary: Option<Box<dyn PolyhedralBackend>>,
}

impl Default for PolyContext {
    fn default() -> Self {
        Self::new(BackendChoice::default(), DEFAULT_MAX_ROWS)
    }
}

impl PolyContext {
    /// Instantiate the chosen backend(s) with a row limit.
    pub fn new(choice: BackendChoice, max_rows: usize) -> Self {
        let (primary, secondary) = choice.instantiate(max_rows);
        debug!(
            "polyhedral backend: {}{}",
            primary.name(),
            secondary.as_ref().map(|s| format!(" checked by {}", s.name())).unwrap_or_default()
        );
        Self { primary, secondary }
    }

    /// Use a single caller-provided backend.
    pub fn with_backend(backend: Box<dyn PolyhedralBackend>) -> Self {
        Self { primary: backend, secondary: None }
    }

    /// The backend whose results are returned.
    pub fn backend(&self) -> &dyn PolyhedralBackend {
        self.primary.as_ref()
    }

    /// True in cross-check mode.
    pub fn is_checked(&self) -> bool {
        self.secondary.is_some()
    }

    /// Run `op` with the primary backend and, when cross-checking, with the
    /// secondary one. `restrict` limits the comparison to a subset.
    fn run<F>(
        &self,
        operation: &'static str,
        operands: &[&Domain],
        restrict: Option<&Domain>,
        op: F,
    ) -> PolyResult<Domain>
    where
        F: Fn(&dyn PolyhedralBackend) -> PolyResult<Domain>,
    {
        let primary = op(self.primary.as_ref())?;
        let secondary = match &self.secondary {
            Some(b) => op(b.as_ref())?,
            None => return Ok(primary),
        };
        let backend = self.primary.as_ref();
        let (lhs, rhs) = match restrict {
            Some(r) => (primary.intersection(r, backend)?, secondary.intersection(r, backend)?),
            None => (primary.clone(), secondary.clone()),
        };
        if !lhs.equivalent(&rhs, backend)? {
            return Err(PolyError::BackendDisagreement {
                operation,
                operands: operands.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("\n"),
                primary: primary.to_string(),
                secondary: secondary.to_string(),
            });
        }
        Ok(primary)
    }

    /// True when the domain has no rational point.
    pub fn is_empty(&self, d: &Domain) -> PolyResult<bool> {
        let primary = d.is_empty(self.primary.as_ref())?;
        if let Some(b) = &self.secondary {
            let secondary = d.is_empty(b.as_ref())?;
            if primary != secondary {
                return Err(PolyError::BackendDisagreement {
                    operation: "emptiness",
                    operands: d.to_string(),
                    primary: primary.to_string(),
                    secondary: secondary.to_string(),
                });
            }
        }
        Ok(primary)
    }

    /// See [`Domain::intersection`].
    pub fn intersection(&self, d1: &Domain, d2: &Domain) -> PolyResult<Domain> {
        self.run("intersection", &[d1, d2], None, |b| d1.intersection(d2, b))
    }

    /// See [`Domain::union`].
    pub fn union(&self, d1: &Domain, d2: &Domain) -> PolyResult<Domain> {
        self.run("union", &[d1, d2], None, |b| d1.union(d2, b))
    }

    /// See [`Domain::difference`].
    pub fn difference(&self, d1: &Domain, d2: &Domain) -> PolyResult<Domain> {
        self.run("difference", &[d1, d2], None, |b| d1.difference(d2, b))
    }

    /// See [`Domain::image`].
    pub fn image(&self, d: &Domain, map: &AffineMap) -> PolyResult<Domain> {
        self.run("image", &[d], None, |b| d.image(map, b))
    }

    /// See [`Domain::preimage`]. Purely syntactic, never cross-checked.
    pub fn preimage(&self, d: &Domain, map: &AffineMap) -> PolyResult<Domain> {
        d.preimage(map)
    }

    /// See [`Domain::project`].
    pub fn project(&self, d: &Domain, level: usize, nb_par: usize) -> PolyResult<Domain> {
        self.run("projection", &[d], None, |b| d.project(level, nb_par, b))
    }

    /// See [`Domain::convex_hull`].
    pub fn convex_hull(&self, d: &Domain) -> PolyResult<Domain> {
        self.run("convex hull", &[d], None, |b| d.convex_hull(b))
    }

    /// See [`Domain::simplify`]. Results are compared inside `context`.
    pub fn simplify(&self, d: &Domain, context: &Domain) -> PolyResult<Domain> {
        self.run("simplify", &[d, context], Some(context), |b| d.simplify(context, b))
    }

    /// See [`Domain::make_disjoint`].
    pub fn make_disjoint(&self, d: &Domain) -> PolyResult<Domain> {
        self.run("disjoint union", &[d], None, |b| d.make_disjoint(b))
    }

    /// True when `d1` is contained in `d2`.
    pub fn is_subset(&self, d1: &Domain, d2: &Domain) -> PolyResult<bool> {
        let diff = self.difference(d1, d2)?;
        self.is_empty(&diff)
    }

    /// Set equality.
    pub fn equivalent(&self, d1: &Domain, d2: &Domain) -> PolyResult<bool> {
        Ok(d1.dim() == d2.dim() && self.is_subset(d1, d2)? && self.is_subset(d2, d1)?)
    }
}
