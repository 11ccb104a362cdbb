// This module generates the machine code for one expression. FunctionCodegen walks the
// (optionally folded) tree bottom-up and leaves the value of every node in XMM0. It emits
// the fixed frame (saving x and y to RBP-relative slots so they can be reloaded after any
// call), materializes constants through RAX, and calls native functions through RAX.
// For a binary operation it evaluates the deeper operand first unless that would leave a
// value waiting across a call, stashes the first result in a free scratch register when
// the second operand contains no call, and spills it to a 16-byte stack slot otherwise.
// The call and depth marks come from the analysis module; the register pool comes from
// RegisterFile. Internal invariants (balanced spill stack, every scratch register
// released, RSP aligned at calls) are asserted and panic when violated.

//! Expression tree to x86-64 code generation.

use log::trace;

use crate::analysis::{mark_calls, mark_depth, NodeMarks};
use crate::core::error::JitResult;
use crate::core::register_file::{AsmReg, RegisterFile};
use crate::core::session::{CompileOptions, CompileStats, MAX_SCRATCH_REGISTERS};
use crate::expr::{BinOp, Expr, Function, Var};
use crate::x64::calling_convention::{FunctionFrame, SysV, SPILL_SLOT_SIZE, STACK_ALIGNMENT};
use crate::x64::encoder::{self, EncodeResult};

/// Machine code for one expression, not yet mapped into executable memory.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub code: Vec<u8>,
    pub stats: CompileStats,
}

/// Where the first operand of a binary operation waits while the second is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stash {
    Register(AsmReg),
    Stack,
}

/// Code generator for a single expression function.
pub struct FunctionCodegen<'t> {
    root: &'t Expr,
    options: CompileOptions,
    calls: NodeMarks<'t, bool>,
    depth: NodeMarks<'t, u32>,
    regs: RegisterFile,
    frame: FunctionFrame,
    code: Vec<u8>,
    sequences: usize,
    /// Bytes currently spilled below the frame.
    stack_depth: u32,
}

impl<'t> FunctionCodegen<'t> {
    /// Analyse `root` and prepare to generate code for it.
    pub fn new(root: &'t Expr, options: CompileOptions) -> Self {
        Self {
            root,
            options,
            calls: mark_calls(root),
            depth: mark_depth(root),
            regs: RegisterFile::new(
                SysV::FIRST_SCRATCH,
                options.scratch_registers.min(MAX_SCRATCH_REGISTERS),
            ),
            frame: FunctionFrame::for_variables(),
            code: Vec::with_capacity(64),
            sequences: 0,
            stack_depth: 0,
        }
    }

    /// Emit the complete function.
    pub fn generate(mut self) -> JitResult<Assembled> {
        let frame = self.frame;
        self.emit(encoder::prologue(frame.frame_size))?;
        for var in [Var::X, Var::Y] {
            self.emit(encoder::store_frame(frame.slot(var), SysV::argument(var)))?;
        }

        self.emit_expr(self.root)?;

        assert_eq!(self.stack_depth, 0, "unbalanced spill stack at function exit");
        assert_eq!(self.regs.in_use(), 0, "scratch registers live at function exit");
        self.emit(encoder::epilogue(frame.frame_size))?;

        let stats = CompileStats {
            code_size: self.code.len(),
            sequences: self.sequences,
            registers: self.regs.stats(),
        };
        Ok(Assembled {
            code: self.code,
            stats,
        })
    }

    fn emit(&mut self, bytes: EncodeResult) -> JitResult<()> {
        let bytes = bytes?;
        self.code.extend_from_slice(&bytes);
        self.sequences += 1;
        Ok(())
    }

    fn emit_expr(&mut self, node: &'t Expr) -> JitResult<()> {
        match node {
            Expr::Variable(var) => {
                let slot = self.frame.slot(*var);
                self.emit(encoder::load_frame(SysV::PRIMARY, slot))
            }
            Expr::Constant(value) => {
                self.emit(encoder::mov_imm64(SysV::TEMP_GP, value.to_bits()))?;
                self.emit(encoder::movq_gp_to_xmm(SysV::PRIMARY, SysV::TEMP_GP))
            }
            Expr::Binary { op, lhs, rhs } => self.emit_binary(*op, lhs, rhs),
            Expr::Call { function, arg } => self.emit_call(*function, arg),
        }
    }

    fn emit_call(&mut self, function: Function, arg: &'t Expr) -> JitResult<()> {
        self.emit_expr(arg)?;

        assert_eq!(
            self.stack_depth % STACK_ALIGNMENT,
            0,
            "misaligned stack at call to {}",
            function.name()
        );
        trace!("call {} at {:#x}", function.name(), function.address());
        self.emit(encoder::mov_imm64(SysV::TEMP_GP, function.address()))?;
        self.emit(encoder::call_indirect(SysV::TEMP_GP))
    }

    fn emit_binary(&mut self, op: BinOp, lhs: &'t Expr, rhs: &'t Expr) -> JitResult<()> {
        let lhs_first = self.lhs_first(lhs, rhs);
        let (first, second) = if lhs_first { (lhs, rhs) } else { (rhs, lhs) };
        trace!("{op:?}: {} operand first", if lhs_first { "left" } else { "right" });

        self.emit_expr(first)?;
        let stash = self.stash(self.calls.get(second))?;
        self.emit_expr(second)?;

        // Operands end up as xmm0 = lhs, xmm1 = rhs.
        if lhs_first {
            self.emit(encoder::mov_xmm_xmm(SysV::SECONDARY, SysV::PRIMARY))?;
            self.unstash(stash, SysV::PRIMARY)?;
        } else {
            self.unstash(stash, SysV::SECONDARY)?;
        }
        self.emit(encoder::arith(op, SysV::PRIMARY, SysV::SECONDARY))
    }

    /// Decide whether the left operand is evaluated first.
    fn lhs_first(&self, lhs: &Expr, rhs: &Expr) -> bool {
        let by_depth = !self.options.depth_ordering || self.depth.get(lhs) >= self.depth.get(rhs);

        // A call-free first operand followed by a call would have to wait on
        // the stack; evaluate the call-containing side first instead.
        match (self.calls.get(lhs), self.calls.get(rhs)) {
            (false, true) => false,
            (true, false) => true,
            _ => by_depth,
        }
    }

    /// Save xmm0 while the other operand is evaluated.
    fn stash(&mut self, second_has_call: bool) -> JitResult<Stash> {
        if !second_has_call && self.options.register_reuse {
            if let Some(reg) = self.regs.allocate() {
                trace!("stash xmm0 in {reg}");
                self.emit(encoder::mov_xmm_xmm(reg, SysV::PRIMARY))?;
                return Ok(Stash::Register(reg));
            }
        }

        trace!(
            "spill xmm0 to stack (call follows: {}, depth {})",
            second_has_call,
            self.stack_depth
        );
        self.regs.record_spill();
        self.emit(encoder::sub_rsp(SPILL_SLOT_SIZE))?;
        self.emit(encoder::store_stack_top(SysV::PRIMARY))?;
        self.stack_depth += SPILL_SLOT_SIZE;
        Ok(Stash::Stack)
    }

    /// Move a stashed value into `dst` and release its storage.
    fn unstash(&mut self, stash: Stash, dst: AsmReg) -> JitResult<()> {
        match stash {
            Stash::Register(reg) => {
                self.emit(encoder::mov_xmm_xmm(dst, reg))?;
                self.regs.free(reg);
            }
            Stash::Stack => {
                assert!(self.stack_depth >= SPILL_SLOT_SIZE, "spill stack underflow");
                self.emit(encoder::load_stack_top(dst))?;
                self.emit(encoder::add_rsp(SPILL_SLOT_SIZE))?;
                self.stack_depth -= SPILL_SLOT_SIZE;
            }
        }
        Ok(())
    }
}
