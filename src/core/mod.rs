// This module collects the infrastructure shared by every stage of the expression
// compiler: the error type returned across the public API, the scratch register file
// used by the code generator, the per-compile options and statistics, and the ELF object
// writer used to dump generated code for inspection.

//! Core infrastructure.
//!
//! - [`error`]: `JitError` and `JitResult`
//! - [`register_file`]: scratch XMM register bookkeeping
//! - [`session`]: compile options and statistics
//! - [`object_file`]: ELF object output of generated code

pub mod error;
pub mod object_file;
pub mod register_file;
pub mod session;

pub use error::{JitError, JitResult};
pub use object_file::write_object;
pub use register_file::{AsmReg, RegStats, RegisterFile};
pub use session::{CompileOptions, CompileStats};
