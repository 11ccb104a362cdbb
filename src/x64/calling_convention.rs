// This module pins down how generated functions use the System V AMD64 ABI. A compiled
// expression is an `extern "C" fn(f64, f64) -> f64`: x arrives in XMM0, y in XMM1, and
// the result leaves in XMM0. Calls to the unary math functions pass their argument and
// receive their result in XMM0 and go through RAX as the call target. Under this ABI
// every XMM register is caller-saved, so nothing the generated code keeps in a register
// survives a call. FunctionFrame describes the fixed stack frame: the saved RBP, one
// 8-byte slot per variable so x and y can be reloaded after any call, and padding that
// keeps RSP 16-byte aligned. Spill slots are pushed below the frame in 16-byte units, so
// the alignment holds at every call site.

//! System V x86-64 calling convention for generated expression functions.

use crate::core::register_file::AsmReg;
use crate::expr::Var;

/// Required RSP alignment at a call instruction.
pub const STACK_ALIGNMENT: u32 = 16;

/// Size of one spill slot; a multiple of the alignment.
pub const SPILL_SLOT_SIZE: u32 = 16;

/// Register roles used by the code generator.
pub struct SysV;

impl SysV {
    /// Primary result register; also the first argument and the return value.
    pub const PRIMARY: AsmReg = AsmReg::xmm(0);
    /// Secondary operand register; also the second argument.
    pub const SECONDARY: AsmReg = AsmReg::xmm(1);
    /// First scratch register above the argument registers.
    pub const FIRST_SCRATCH: u8 = 2;
    /// General purpose register for immediates and call targets.
    pub const TEMP_GP: AsmReg = AsmReg::gp(0);

    /// Register holding the incoming value of `var`.
    pub fn argument(var: Var) -> AsmReg {
        match var {
            Var::X => Self::PRIMARY,
            Var::Y => Self::SECONDARY,
        }
    }
}

/// Fixed stack frame of a generated function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionFrame {
    /// Bytes reserved below the saved RBP.
    pub frame_size: u32,
}

impl FunctionFrame {
    /// Frame with one 8-byte slot per variable, rounded up to the alignment.
    pub fn for_variables() -> Self {
        let slots: u32 = 2 * 8;
        Self {
            frame_size: slots.div_ceil(STACK_ALIGNMENT) * STACK_ALIGNMENT,
        }
    }

    /// RBP-relative offset of the slot holding `var`.
    pub fn slot(&self, var: Var) -> i32 {
        match var {
            Var::X => -8,
            Var::Y => -16,
        }
    }
}
