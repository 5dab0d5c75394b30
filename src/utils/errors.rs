//! Error types for the polyhedral scanner.
//!
//! Every failure in the engine is fatal for the operation that raised it:
//! a partially built loop tree is never handed back to the caller. Library
//! code returns [`PolyResult`]; the command line wraps it with `anyhow`.

use thiserror::Error;
use crate::utils::location::Span;
use std::fmt;

/// Top-level error type for the scanner.
#[derive(Error, Debug)]
pub enum PolyError {
    /// Operands of a domain operation live in spaces of different dimension.
    #[error("dimension mismatch in {operation}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The operation that detected the mismatch
        operation: &'static str,
        /// Dimension required by the operation
        expected: usize,
        /// Dimension of the offending operand
        found: usize,
    },

    /// `add_constraints` got unions with incompatible member counts.
    #[error("member count mismatch in {operation}: {source_members} source member(s) for {target_members} target member(s)")]
    MemberCountMismatch {
        /// The operation that detected the mismatch
        operation: &'static str,
        /// Members of the domain providing rows
        source_members: usize,
        /// Members of the domain receiving rows
        target_members: usize,
    },

    /// Exact-number failure.
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithError),

    /// The two polyhedral backends computed set-inequivalent results.
    #[error("backends disagree on {operation}\noperands:\n{operands}\nprimary result:\n{primary}\nsecondary result:\n{secondary}")]
    BackendDisagreement {
        /// The operation being cross-checked
        operation: &'static str,
        /// Printed operands
        operands: String,
        /// Result of the primary backend
        primary: String,
        /// Result of the secondary backend
        secondary: String,
    },

    /// Parse failure on the textual format.
    #[error("malformed input: {0}")]
    MalformedInput(#[from] ParseError),

    /// An intermediate constraint or generator system grew past the limit.
    #[error("resource exhausted in {operation}: {rows} rows exceed the limit of {limit}")]
    ResourceExhaustion {
        /// The operation that gave up
        operation: &'static str,
        /// Rows the operation needed
        rows: usize,
        /// Configured limit
        limit: usize,
    },

    /// The parameter context has no integer point.
    #[error("the parameter context is empty")]
    EmptyContext,

    /// Two blocks cannot be merged.
    #[error("blocks cannot be merged: {reason}")]
    BlockMismatch {
        /// What differs
        reason: String,
    },

    /// A loop level has no finite bound (only raised by enumeration).
    #[error("level {level} is unbounded")]
    Unbounded {
        /// The 1-based loop level
        level: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the exact-number layer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithError {
    /// A value does not fit the requested machine integer.
    #[error("value does not fit in a machine integer")]
    Overflow,
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
}

/// Error while reading the textual program format.
#[derive(Error, Debug, Clone)]
pub struct ParseError {
    /// The error message
    pub message: String,
    /// Location in source
    pub span: Span,
    /// The kind of parse error
    pub kind: ParseErrorKind,
    /// What was expected (if applicable)
    pub expected: Option<String>,
    /// What was found
    pub found: Option<String>,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind,
            expected: None,
            found: None,
        }
    }

    /// Record what the reader expected at this point.
    pub fn expected(mut self, what: impl Into<String>) -> Self {
        self.expected = Some(what.into());
        self
    }

    /// Record what the reader found instead.
    pub fn found(mut self, what: impl Into<String>) -> Self {
        self.found = Some(what.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)?;
        if let Some(ref expected) = self.expected {
            write!(f, " (expected: {})", expected)?;
        }
        if let Some(ref found) = self.found {
            write!(f, " (found: {})", found)?;
        }
        Ok(())
    }
}

/// Category of a [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input ended in the middle of a construct
    UnexpectedEof,
    /// A token is not a valid integer
    InvalidNumber,
    /// The language tag is not recognised
    InvalidLanguage,
    /// A row flag is neither 0 nor 1
    InvalidFlag,
    /// Row width or row count disagrees with its header
    InvalidShape,
    /// Counts that must agree across sections do not
    InconsistentDimensions,
    /// A name list is shorter than required
    MissingNames,
}

/// Result type using PolyError.
pub type PolyResult<T> = Result<T, PolyError>;
