//! Exact polyhedral arithmetic.
//!
//! This module provides the set layer the loop generator is built on:
//! - Exact numbers and affine expressions
//! - Constraints, generators and convex polyhedra
//! - Unions of polyhedra ([`Domain`]) and affine maps
//! - Interchangeable polyhedral backends

pub mod value;
pub mod expr;
pub mod constraint;
pub mod generator;
pub mod polyhedron;
pub mod map;
pub mod backend;
pub mod domain;
pub mod context;

pub use value::Value;
pub use expr::AffineExpr;
pub use constraint::{Constraint, ConstraintKind, ConstraintSystem};
pub use generator::GeneratorSystem;
pub use polyhedron::Polyhedron;
pub use map::AffineMap;
pub use backend::{BackendChoice, PolyhedralBackend};
pub use domain::Domain;
pub use context::PolyContext;
