// This module defines the error types for exprjit using the thiserror crate. JitError is
// the single error returned by the public compile/evaluate surface and covers the two
// user-visible failure classes: parse errors (malformed text, unknown identifier, unknown
// function, wrong argument count), which carry the original expression and the byte
// position of the problem, and executable memory failures (mmap/mprotect), which carry
// the failing operation and the OS error. Encoding failures from the instruction encoder
// and grid buffer size mismatches are surfaced as their own variants. Internal invariant
// violations are not represented here; they panic.

//! Error types for the expression compiler.

use std::io;
use thiserror::Error;

use crate::x64::encoder::EncodingError;

/// Main error type for compiling and evaluating expressions.
#[derive(Error, Debug)]
pub enum JitError {
    #[error("parse {expr:?}: {message} (at offset {position})")]
    Parse {
        expr: String,
        position: usize,
        message: String,
    },

    #[error("executable memory: {op} failed: {source}")]
    Allocation {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("instruction encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("grid of {nx}x{ny} cells does not match output buffer of length {len}")]
    GridSize { nx: usize, ny: usize, len: usize },
}

impl JitError {
    /// Returns true for errors caused by the expression text.
    pub fn is_parse(&self) -> bool {
        matches!(self, JitError::Parse { .. })
    }
}

/// Result type alias for compile and evaluate operations.
pub type JitResult<T> = Result<T, JitError>;
