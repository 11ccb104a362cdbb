//! Scratch register bookkeeping.
//!
//! The code generator keeps at most one intermediate value per scratch XMM
//! register. `RegisterFile` hands out the lowest free register of a fixed
//! pool, tracks the high-water mark, and counts how often a value was kept in
//! a register versus spilled to the stack. It lives for exactly one compile.

use std::fmt;

/// Number of XMM registers addressable in 64-bit mode.
pub const XMM_COUNT: u8 = 16;

/// Register bank indices.
pub type RegBank = u8;

/// Register IDs within a bank.
pub type RegId = u8;

/// General purpose bank.
pub const BANK_GP: RegBank = 0;

/// SSE bank.
pub const BANK_XMM: RegBank = 1;

/// Combined register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AsmReg {
    pub bank: RegBank,
    pub id: RegId,
}

impl AsmReg {
    pub const fn new(bank: RegBank, id: RegId) -> Self {
        Self { bank, id }
    }

    pub const fn gp(id: RegId) -> Self {
        Self::new(BANK_GP, id)
    }

    pub const fn xmm(id: RegId) -> Self {
        Self::new(BANK_XMM, id)
    }

    pub fn is_xmm(&self) -> bool {
        self.bank == BANK_XMM
    }
}

impl fmt::Display for AsmReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const GP_NAMES: [&str; 16] = [
            "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi",
            "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
        ];
        match self.bank {
            BANK_GP => match GP_NAMES.get(self.id as usize) {
                Some(name) => f.write_str(name),
                None => write!(f, "gp{}", self.id),
            },
            BANK_XMM => write!(f, "xmm{}", self.id),
            bank => write!(f, "bank{}:{}", bank, self.id),
        }
    }
}

/// Counters collected by a [`RegisterFile`] during one compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegStats {
    /// Intermediate values kept in a scratch register.
    pub reuse_hits: u32,
    /// Intermediate values spilled to the stack.
    pub spills: u32,
    /// Highest number of scratch registers live at the same time.
    pub max_used: u32,
}

/// Fixed pool of scratch XMM registers above the argument registers.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    /// First XMM register of the pool.
    base: RegId,
    /// Used flag per pool slot.
    used: Vec<bool>,
    stats: RegStats,
}

impl RegisterFile {
    /// Create a pool of `count` registers starting at `xmm{base}`.
    pub fn new(base: RegId, count: u8) -> Self {
        assert!(
            base as usize + count as usize <= XMM_COUNT as usize,
            "scratch pool xmm{}..xmm{} exceeds the register file",
            base,
            base as usize + count as usize
        );
        Self {
            base,
            used: vec![false; count as usize],
            stats: RegStats::default(),
        }
    }

    /// Number of registers in the pool.
    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    /// Number of registers currently allocated.
    pub fn in_use(&self) -> usize {
        self.used.iter().filter(|u| **u).count()
    }

    /// Allocate the lowest free register, or `None` when the pool is exhausted.
    pub fn allocate(&mut self) -> Option<AsmReg> {
        let slot = self.used.iter().position(|u| !*u)?;
        self.used[slot] = true;
        self.stats.reuse_hits += 1;
        self.stats.max_used = self.stats.max_used.max(self.in_use() as u32);
        Some(AsmReg::xmm(self.base + slot as RegId))
    }

    /// Return a register to the pool.
    ///
    /// Panics if the register is not part of the pool or is not allocated;
    /// both indicate a code generator bug.
    pub fn free(&mut self, reg: AsmReg) {
        assert!(reg.is_xmm(), "freeing non-xmm register {reg}");
        let slot = reg
            .id
            .checked_sub(self.base)
            .map(usize::from)
            .filter(|slot| *slot < self.used.len())
            .unwrap_or_else(|| panic!("{reg} is not a scratch register"));
        assert!(self.used[slot], "{reg} freed twice");
        self.used[slot] = false;
    }

    /// Record a value that went to the stack instead of a register.
    pub fn record_spill(&mut self) {
        self.stats.spills += 1;
    }

    pub fn stats(&self) -> RegStats {
        self.stats
    }
}
