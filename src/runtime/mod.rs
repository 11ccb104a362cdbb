//! Executable memory and evaluation of compiled expressions.

pub mod code;
pub mod memory;

pub use code::{cell_center, Code};
pub use memory::{EntryFn, ExecutableBlock};
