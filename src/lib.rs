//! # PolyScan - Polyhedral Scanning
//!
//! Generates loop nests that visit every integer point of a union of
//! parametric polyhedra exactly once, in the order given by per-statement
//! scattering functions:
//! - Exact rational and integer polyhedral arithmetic with two backends
//! - Statement blocking and scalar dimension extraction
//! - Separation of overlapping domains into ordered disjoint loops
//! - C and tree printers, plus a reader and writer for the textual format
//!
//! ## Architecture
//!
//! ```text
//! Input → Frontend → Program (blocks, scalars, scattering) → Loop tree → Printer → Output
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use polyscan::prelude::*;
//!
//! let source = "c\n0 2\n0\n1\n1\n2 3\n1 1 0\n1 -1 9\n0 0 0\n0\n0\n";
//! let code = polyscan::generate_code(source, &GenerationOptions::default())?;
//! assert!(code.contains("for (i=0;i<=9;i++)"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod frontend;
pub mod polyhedral;
pub mod codegen;
pub mod utils;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::codegen::{Emit, Language, Program, ProgramInput};
use crate::polyhedral::backend::DEFAULT_MAX_ROWS;
use crate::polyhedral::BackendChoice;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::frontend::{read_program, write_program, ParseError};
    pub use crate::polyhedral::{
        AffineExpr, AffineMap, BackendChoice, Constraint, ConstraintKind, Domain, PolyContext, Polyhedron, Value,
    };
    pub use crate::codegen::{CCodeGen, Emit, Language, Loop, Program, ProgramInput, Statement};
    pub use crate::utils::errors::*;
    pub use crate::GenerationOptions;
}

/// Options for building a [`Program`] from its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Polyhedral backend(s) to run
    pub backend: BackendChoice,
    /// Row limit for intermediate constraint systems
    pub max_rows: usize,
    /// Skip merging statements into blocks
    pub noblocks: bool,
    /// Skip scalar dimension extraction
    pub noscalars: bool,
    /// Skip simplification of node domains
    pub nosimplify: bool,
    /// Override the language tag of the input
    pub language: Option<Language>,
    /// First scanning depth at which overlapping domains are separated
    pub first_level: usize,
    /// Last scanning depth at which overlapping domains are separated, unlimited when `None`
    pub last_level: Option<usize>,
    /// Print a complete C program with every parameter set to this value
    pub compilable: Option<i64>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            backend: BackendChoice::default(),
            max_rows: DEFAULT_MAX_ROWS,
            noblocks: false,
            noscalars: false,
            nosimplify: false,
            language: None,
            first_level: 1,
            last_level: None,
            compilable: None,
        }
    }
}

impl GenerationOptions {
    /// Select the backend.
    pub fn backend(mut self, backend: BackendChoice) -> Self {
        self.backend = backend;
        self
    }

    /// Set the row limit.
    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Enable or disable blocking.
    pub fn noblocks(mut self, noblocks: bool) -> Self {
        self.noblocks = noblocks;
        self
    }

    /// Enable or disable scalar extraction.
    pub fn noscalars(mut self, noscalars: bool) -> Self {
        self.noscalars = noscalars;
        self
    }

    /// Enable or disable simplification.
    pub fn nosimplify(mut self, nosimplify: bool) -> Self {
        self.nosimplify = nosimplify;
        self
    }

    /// Force the output language.
    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// Separate domains from depth `level` on; outer depths share one loop.
    pub fn first_level(mut self, level: usize) -> Self {
        self.first_level = level;
        self
    }

    /// Stop separating domains below depth `level`.
    pub fn last_level(mut self, level: usize) -> Self {
        self.last_level = Some(level);
        self
    }

    /// Emit a compilable C program with parameters set to `value`.
    pub fn compilable(mut self, value: i64) -> Self {
        self.compilable = Some(value);
        self
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read a program input from its textual form.
pub fn read_program(source: &str) -> Result<ProgramInput> {
    frontend::read_program(source).context("Failed to read program")
}

/// Read a program input from a file.
pub fn read_program_file(path: impl AsRef<Path>) -> Result<ProgramInput> {
    let path = path.as_ref();
    let source =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read input file: {:?}", path))?;
    frontend::read_program(&source).with_context(|| format!("Failed to read program from {:?}", path))
}

/// Build the loop tree of a program input.
pub fn build(input: &ProgramInput, options: &GenerationOptions) -> Result<Program> {
    Program::build(input, options).context("Failed to generate loops")
}

/// Full pipeline: read the textual form, generate loops and print C.
pub fn generate_code(source: &str, options: &GenerationOptions) -> Result<String> {
    let input = read_program(source)?;
    let program = build(&input, options)?;
    codegen::render(&program, Emit::Code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::{ParseError, ParseErrorKind};

    const SQUARE: &str = "\
c
0 2
0
1
1
2 3
1 1 0
1 -1 9
0 0 0
0
0
";

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_options_builder() {
        let options = GenerationOptions::default()
            .backend(BackendChoice::CrossCheck)
            .noblocks(true)
            .nosimplify(true)
            .language(Language::Fortran);
        assert_eq!(options.backend, BackendChoice::CrossCheck);
        assert!(options.noblocks);
        assert!(!options.noscalars);
        assert!(options.nosimplify);
        assert_eq!(options.language, Some(Language::Fortran));
        assert_eq!(options.max_rows, DEFAULT_MAX_ROWS);
        assert_eq!(options.first_level, 1);
        assert_eq!(options.last_level, None);

        let options = GenerationOptions::default().first_level(2).last_level(3).compilable(10);
        assert_eq!((options.first_level, options.last_level, options.compilable), (2, Some(3), Some(10)));
    }

    #[test]
    fn test_generate_compilable_code() {
        let code = generate_code(SQUARE, &GenerationOptions::default().compilable(4)).unwrap();
        assert!(code.contains("#define S1(i) {total++; printf(\"S1 %d\\n\",i);}"), "{}", code);
        assert!(code.contains("int main() {"));
        assert!(code.contains("  for (i=0;i<=9;i++) {\n    S1(i);\n  }\n"));
        assert!(code.ends_with("  return 0 ;\n}\n"));
    }

    #[test]
    fn test_generate_code() {
        let code = generate_code(SQUARE, &GenerationOptions::default()).unwrap();
        assert_eq!(code, "for (i=0;i<=9;i++) {\n  S1(i);\n}\n");
    }

    #[test]
    fn test_read_error_has_context() {
        let err = read_program("x\n").unwrap_err();
        assert!(err.to_string().contains("Failed to read program"));
        let parse = err.downcast_ref::<ParseError>().unwrap();
        assert_eq!(parse.kind, ParseErrorKind::InvalidLanguage);
    }
}
