//! exprjit - just-in-time compilation of arithmetic expressions.
//!
//! Compiles expressions over the variables `x` and `y`, the operators
//! `+ - * /` and a fixed table of unary math functions straight to x86-64
//! machine code, and calls that code through the System V ABI.
//!
//! # Primary Usage
//!
//! ```no_run
//! let mut code = exprjit::compile("(x+1) * (y+2) / 3")?;
//! let z = code.eval(1.0, 2.0);
//! assert_eq!(z, 8.0 / 3.0);
//! code.release();
//! # Ok::<(), exprjit::JitError>(())
//! ```
//!
//! # Architecture
//!
//! - [`expr`] - expression trees, parser, function table
//! - [`analysis`] - constant folding, call and depth marks
//! - [`x64`] - instruction encoder, calling convention, code generator
//! - [`runtime`] - executable memory and evaluation
//! - [`core`] - errors, register file, options and statistics
//! - [`compiler`] - the pipeline tying it together

#[cfg(not(target_arch = "x86_64"))]
compile_error!("exprjit generates x86-64 machine code and only runs on x86_64 targets");

pub mod analysis;
pub mod compiler;
pub mod core;
pub mod expr;
pub mod runtime;
pub mod x64;

pub use crate::analysis::{fold_constants, mark_calls, mark_depth, NodeMarks};
pub use crate::compiler::{compile, Compiler};
pub use crate::core::{CompileOptions, CompileStats, JitError, JitResult};
pub use crate::expr::{parse, BinOp, Expr, Function, FunctionTable, Var};
pub use crate::runtime::{cell_center, Code};
