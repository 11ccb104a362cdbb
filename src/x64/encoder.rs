// This module provides the x86-64 instruction encoding for exprjit using the iced-x86
// CodeAssembler. The repertoire is deliberately small and fixed: function prologue and
// epilogue, stack pointer adjustment by a 32-bit immediate, 64-bit immediate loads into a
// general purpose register, moves between general purpose and XMM registers, XMM to XMM
// moves, scalar double loads and stores relative to RBP (the variable slots) and RSP (the
// spill slots), scalar double add/sub/mul/div, push/pop, an indirect call through a
// register, and return. Every encoder is a pure function from operands to a byte
// sequence. Register operands are AsmReg values; asking for a register that the
// instruction form cannot address is a code generator bug and panics rather than
// producing malformed machine code.

//! x86-64 instruction encoding using iced-x86.

use iced_x86::code_asm::*;
use iced_x86::IcedError;
use thiserror::Error;

use crate::core::register_file::{AsmReg, BANK_GP, BANK_XMM, XMM_COUNT};
use crate::expr::BinOp;

/// Error types for instruction encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Immediate does not fit the sign-extended 32-bit form.
    #[error("immediate {0:#x} does not fit in 32 bits")]
    ImmediateOutOfRange(u64),
    /// Assembly error from iced-x86.
    #[error("assembly error: {0}")]
    AssemblyError(String),
}

impl From<IcedError> for EncodingError {
    fn from(e: IcedError) -> Self {
        EncodingError::AssemblyError(e.to_string())
    }
}

/// Result of encoding one instruction sequence.
pub type EncodeResult = Result<Vec<u8>, EncodingError>;

/// Assemble a short instruction sequence at address 0.
fn assemble<F>(build: F) -> EncodeResult
where
    F: FnOnce(&mut CodeAssembler) -> Result<(), IcedError>,
{
    let mut asm = CodeAssembler::new(64)?;
    build(&mut asm)?;
    Ok(asm.assemble(0)?)
}

/// Map a general purpose AsmReg to its 64-bit iced register.
fn gp64(reg: AsmReg) -> AsmRegister64 {
    const GP64_REGS: [AsmRegister64; 16] = [
        rax, rcx, rdx, rbx, rsp, rbp, rsi, rdi,
        r8, r9, r10, r11, r12, r13, r14, r15,
    ];

    assert_eq!(reg.bank, BANK_GP, "{reg} is not a general purpose register");
    match GP64_REGS.get(reg.id as usize) {
        Some(r) => *r,
        None => panic!("gp{} is not addressable", reg.id),
    }
}

/// Map an XMM AsmReg to its iced register.
fn xmm(reg: AsmReg) -> AsmRegisterXmm {
    const XMM_REGS: [AsmRegisterXmm; XMM_COUNT as usize] = [
        xmm0, xmm1, xmm2, xmm3, xmm4, xmm5, xmm6, xmm7,
        xmm8, xmm9, xmm10, xmm11, xmm12, xmm13, xmm14, xmm15,
    ];

    assert_eq!(reg.bank, BANK_XMM, "{reg} is not an xmm register");
    match XMM_REGS.get(reg.id as usize) {
        Some(r) => *r,
        None => panic!("xmm{} is not addressable", reg.id),
    }
}

fn imm32(value: u32) -> Result<i32, EncodingError> {
    i32::try_from(value).map_err(|_| EncodingError::ImmediateOutOfRange(u64::from(value)))
}

const RBP: AsmReg = AsmReg::gp(5);

/// `push rbp; mov rbp, rsp; sub rsp, frame_size`
pub fn prologue(frame_size: u32) -> EncodeResult {
    let mut bytes = push(RBP)?;
    bytes.extend(assemble(|a| a.mov(rbp, rsp))?);
    if frame_size != 0 {
        bytes.extend(sub_rsp(frame_size)?);
    }
    Ok(bytes)
}

/// `add rsp, frame_size; pop rbp; ret`
pub fn epilogue(frame_size: u32) -> EncodeResult {
    let mut bytes = Vec::with_capacity(8);
    if frame_size != 0 {
        bytes.extend(add_rsp(frame_size)?);
    }
    bytes.extend(pop(RBP)?);
    bytes.extend(ret()?);
    Ok(bytes)
}

/// `sub rsp, imm32`
pub fn sub_rsp(bytes: u32) -> EncodeResult {
    let imm = imm32(bytes)?;
    assemble(|a| a.sub(rsp, imm))
}

/// `add rsp, imm32`
pub fn add_rsp(bytes: u32) -> EncodeResult {
    let imm = imm32(bytes)?;
    assemble(|a| a.add(rsp, imm))
}

/// `mov dst, imm64`, always using the 10-byte `movabs` form.
pub fn mov_imm64(dst: AsmReg, value: u64) -> EncodeResult {
    let dst = gp64(dst);
    assemble(|a| a.mov(dst, value))
}

/// `movq dst, src` from a general purpose register into an XMM register.
pub fn movq_gp_to_xmm(dst: AsmReg, src: AsmReg) -> EncodeResult {
    let (dst, src) = (xmm(dst), gp64(src));
    assemble(|a| a.movq(dst, src))
}

/// `movq dst, src` from an XMM register into a general purpose register.
pub fn movq_xmm_to_gp(dst: AsmReg, src: AsmReg) -> EncodeResult {
    let (dst, src) = (gp64(dst), xmm(src));
    assemble(|a| a.movq(dst, src))
}

/// `movq dst, src` between XMM registers.
pub fn mov_xmm_xmm(dst: AsmReg, src: AsmReg) -> EncodeResult {
    let (dst, src) = (xmm(dst), xmm(src));
    assemble(|a| a.movq(dst, src))
}

/// `movsd [rbp + disp], src`
pub fn store_frame(disp: i32, src: AsmReg) -> EncodeResult {
    let src = xmm(src);
    assemble(|a| a.movsd_2(qword_ptr(rbp + disp), src))
}

/// `movsd dst, [rbp + disp]`
pub fn load_frame(dst: AsmReg, disp: i32) -> EncodeResult {
    let dst = xmm(dst);
    assemble(|a| a.movsd_2(dst, qword_ptr(rbp + disp)))
}

/// `movsd [rsp], src`
pub fn store_stack_top(src: AsmReg) -> EncodeResult {
    let src = xmm(src);
    assemble(|a| a.movsd_2(qword_ptr(rsp), src))
}

/// `movsd dst, [rsp]`
pub fn load_stack_top(dst: AsmReg) -> EncodeResult {
    let dst = xmm(dst);
    assemble(|a| a.movsd_2(dst, qword_ptr(rsp)))
}

/// `addsd/subsd/mulsd/divsd dst, src`
pub fn arith(op: BinOp, dst: AsmReg, src: AsmReg) -> EncodeResult {
    let (dst, src) = (xmm(dst), xmm(src));
    assemble(|a| match op {
        BinOp::Add => a.addsd(dst, src),
        BinOp::Sub => a.subsd(dst, src),
        BinOp::Mul => a.mulsd(dst, src),
        BinOp::Div => a.divsd(dst, src),
    })
}

/// `push reg`
pub fn push(reg: AsmReg) -> EncodeResult {
    let reg = gp64(reg);
    assemble(|a| a.push(reg))
}

/// `pop reg`
pub fn pop(reg: AsmReg) -> EncodeResult {
    let reg = gp64(reg);
    assemble(|a| a.pop(reg))
}

/// `call reg`
pub fn call_indirect(target: AsmReg) -> EncodeResult {
    let target = gp64(target);
    assemble(|a| a.call(target))
}

/// `ret`
pub fn ret() -> EncodeResult {
    assemble(|a| a.ret())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAX: AsmReg = AsmReg::gp(0);
    const R10: AsmReg = AsmReg::gp(10);

    #[test]
    fn movq_between_xmm_registers() {
        // reference values obtained with gcc and objdump
        for src in 0..8u8 {
            for dst in 0..8u8 {
                let want = vec![0xF3, 0x0F, 0x7E, 0xC0 | (dst << 3) | src];
                assert_eq!(
                    mov_xmm_xmm(AsmReg::xmm(dst), AsmReg::xmm(src)).unwrap(),
                    want,
                    "movq %xmm{src},%xmm{dst}"
                );
            }
        }
    }

    #[test]
    fn high_xmm_registers_need_rex() {
        let bytes = mov_xmm_xmm(AsmReg::xmm(9), AsmReg::xmm(0)).unwrap();
        assert_eq!(bytes.len(), 5);
        assert_eq!(bytes[0], 0xF3);
        assert_eq!(bytes[1] & 0xF0, 0x40);
    }

    #[test]
    #[should_panic(expected = "xmm16 is not addressable")]
    fn out_of_range_xmm_panics() {
        let _ = mov_xmm_xmm(AsmReg::xmm(16), AsmReg::xmm(0));
    }

    #[test]
    #[should_panic(expected = "not an xmm register")]
    fn wrong_bank_panics() {
        let _ = arith(BinOp::Add, RAX, AsmReg::xmm(1));
    }

    #[test]
    fn fixed_sequences() {
        assert_eq!(ret().unwrap(), vec![0xC3]);
        assert_eq!(call_indirect(RAX).unwrap(), vec![0xFF, 0xD0]);
        assert_eq!(push(RBP).unwrap(), vec![0x55]);
        assert_eq!(pop(RBP).unwrap(), vec![0x5D]);
        assert_eq!(push(RAX).unwrap(), vec![0x50]);
        assert_eq!(pop(RAX).unwrap(), vec![0x58]);
    }

    #[test]
    fn scalar_arithmetic() {
        let x0 = AsmReg::xmm(0);
        let x1 = AsmReg::xmm(1);
        assert_eq!(arith(BinOp::Add, x0, x1).unwrap(), vec![0xF2, 0x0F, 0x58, 0xC1]);
        assert_eq!(arith(BinOp::Sub, x0, x1).unwrap(), vec![0xF2, 0x0F, 0x5C, 0xC1]);
        assert_eq!(arith(BinOp::Mul, x0, x1).unwrap(), vec![0xF2, 0x0F, 0x59, 0xC1]);
        assert_eq!(arith(BinOp::Div, x0, x1).unwrap(), vec![0xF2, 0x0F, 0x5E, 0xC1]);
    }

    #[test]
    fn gp_xmm_moves() {
        assert_eq!(
            movq_gp_to_xmm(AsmReg::xmm(0), RAX).unwrap(),
            vec![0x66, 0x48, 0x0F, 0x6E, 0xC0]
        );
        assert_eq!(
            movq_gp_to_xmm(AsmReg::xmm(1), RAX).unwrap(),
            vec![0x66, 0x48, 0x0F, 0x6E, 0xC8]
        );
        assert_eq!(
            movq_xmm_to_gp(RAX, AsmReg::xmm(0)).unwrap(),
            vec![0x66, 0x48, 0x0F, 0x7E, 0xC0]
        );
    }

    #[test]
    fn immediate_loads() {
        let bits = 1.5f64.to_bits();
        let mut want = vec![0x48, 0xB8];
        want.extend_from_slice(&bits.to_le_bytes());
        assert_eq!(mov_imm64(RAX, bits).unwrap(), want);

        let small = mov_imm64(R10, 1).unwrap();
        assert_eq!(&small[..2], &[0x49, 0xBA]);
        assert_eq!(small.len(), 10);
    }

    #[test]
    fn stack_adjustment() {
        assert_eq!(
            sub_rsp(16).unwrap(),
            vec![0x48, 0x83, 0xEC, 0x10]
        );
        assert_eq!(
            add_rsp(16).unwrap(),
            vec![0x48, 0x83, 0xC4, 0x10]
        );
        assert_eq!(
            sub_rsp(u32::MAX),
            Err(EncodingError::ImmediateOutOfRange(u64::from(u32::MAX)))
        );
    }

    #[test]
    fn prologue_and_epilogue() {
        assert_eq!(prologue(0).unwrap(), vec![0x55, 0x48, 0x89, 0xE5]);
        let pro = prologue(16).unwrap();
        assert_eq!(&pro[..4], &[0x55, 0x48, 0x89, 0xE5]);
        let epi = epilogue(16).unwrap();
        assert_eq!(&epi[epi.len() - 2..], &[0x5D, 0xC3]);
    }

    #[test]
    fn frame_and_stack_slots() {
        // movsd %xmm0,-0x8(%rbp)
        assert_eq!(
            store_frame(-8, AsmReg::xmm(0)).unwrap(),
            vec![0xF2, 0x0F, 0x11, 0x45, 0xF8]
        );
        // movsd -0x10(%rbp),%xmm1
        assert_eq!(
            load_frame(AsmReg::xmm(1), -16).unwrap(),
            vec![0xF2, 0x0F, 0x10, 0x4D, 0xF0]
        );
        // movsd %xmm0,(%rsp)
        assert_eq!(
            store_stack_top(AsmReg::xmm(0)).unwrap(),
            vec![0xF2, 0x0F, 0x11, 0x04, 0x24]
        );
        // movsd (%rsp),%xmm1
        assert_eq!(
            load_stack_top(AsmReg::xmm(1)).unwrap(),
            vec![0xF2, 0x0F, 0x10, 0x0C, 0x24]
        );
    }
}
