//! x86-64 architecture-specific components.
//!
//! - Instruction encoding using iced-x86
//! - System V register roles and frame layout
//! - Code generation for expression trees
//! - Disassembly of generated code

pub mod calling_convention;
pub mod disasm;
pub mod encoder;
pub mod function_codegen;

pub use calling_convention::{FunctionFrame, SysV};
pub use encoder::{EncodeResult, EncodingError};
pub use function_codegen::{Assembled, FunctionCodegen};
