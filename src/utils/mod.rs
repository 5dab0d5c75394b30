//! Utility modules shared by the scanner.
//!
//! - Error types
//! - Rational matrices and integer lattices
//! - Source locations for reader diagnostics
//! - Pretty printing of domains, inputs and code

pub mod errors;
pub mod matrix;
pub mod location;
pub mod pretty;
pub mod poly_print;

// Re-exports
pub use errors::*;
pub use location::{SourceLocation, SourceMap, Span};
pub use poly_print::{print_domain, print_input, NamedDomain, PolyPrinter};
