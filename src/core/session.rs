// This module holds the per-compile configuration and the statistics gathered while a
// single expression is compiled. CompileOptions carries the three independent code
// generation toggles (register reuse, depth-based evaluation order, constant folding)
// plus the size of the scratch register pool; every combination must produce the same
// numeric results and only changes code size and register pressure. Options can also be
// read from EXPRJIT_* environment variables so the CLI and benchmarks can flip them
// without recompiling. CompileStats records code size, the number of encoded
// instruction sequences, and the register file counters for diagnostics and tests.

//! Compile options and statistics.

use std::env;
use std::fmt;

use super::register_file::RegStats;

/// Default number of scratch registers (`xmm2..=xmm7`).
pub const DEFAULT_SCRATCH_REGISTERS: u8 = 6;

/// Largest usable scratch pool (`xmm2..=xmm15`).
pub const MAX_SCRATCH_REGISTERS: u8 = 14;

/// Code generation toggles for one compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Keep intermediate values in scratch registers when no call intervenes.
    pub register_reuse: bool,
    /// Evaluate the deeper operand of a binary operation first.
    pub depth_ordering: bool,
    /// Fold constant subexpressions before code generation.
    pub constant_folding: bool,
    /// Size of the scratch register pool. Values above
    /// [`MAX_SCRATCH_REGISTERS`] are treated as the maximum.
    pub scratch_registers: u8,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            register_reuse: true,
            depth_ordering: true,
            constant_folding: true,
            scratch_registers: DEFAULT_SCRATCH_REGISTERS,
        }
    }
}

impl CompileOptions {
    pub fn with_register_reuse(mut self, enabled: bool) -> Self {
        self.register_reuse = enabled;
        self
    }

    pub fn with_depth_ordering(mut self, enabled: bool) -> Self {
        self.depth_ordering = enabled;
        self
    }

    pub fn with_constant_folding(mut self, enabled: bool) -> Self {
        self.constant_folding = enabled;
        self
    }

    /// Set the scratch pool size, clamped to [`MAX_SCRATCH_REGISTERS`].
    pub fn with_scratch_registers(mut self, count: u8) -> Self {
        self.scratch_registers = count.min(MAX_SCRATCH_REGISTERS);
        self
    }

    /// All eight combinations of the three boolean toggles.
    pub fn all_combinations() -> impl Iterator<Item = CompileOptions> {
        (0u8..8).map(|bits| {
            CompileOptions::default()
                .with_register_reuse(bits & 1 != 0)
                .with_depth_ordering(bits & 2 != 0)
                .with_constant_folding(bits & 4 != 0)
        })
    }

    /// Defaults overridden by `EXPRJIT_NO_FOLD`, `EXPRJIT_NO_REUSE`,
    /// `EXPRJIT_NO_DEPTH_ORDER` and `EXPRJIT_SCRATCH_REGS`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if env_flag("EXPRJIT_NO_FOLD") {
            options.constant_folding = false;
        }
        if env_flag("EXPRJIT_NO_REUSE") {
            options.register_reuse = false;
        }
        if env_flag("EXPRJIT_NO_DEPTH_ORDER") {
            options.depth_ordering = false;
        }
        if let Ok(value) = env::var("EXPRJIT_SCRATCH_REGS") {
            match value.trim().parse::<u8>() {
                Ok(count) => options = options.with_scratch_registers(count),
                Err(_) => log::warn!("ignoring EXPRJIT_SCRATCH_REGS={value:?}: not a register count"),
            }
        }
        options
    }
}

fn env_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(value) => !matches!(value.trim(), "" | "0" | "false"),
        Err(_) => false,
    }
}

/// Statistics for a single compiled expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Size of the generated function in bytes.
    pub code_size: usize,
    /// Number of encoded instruction sequences.
    pub sequences: usize,
    /// Register file counters.
    pub registers: RegStats,
}

impl fmt::Display for CompileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes in {} sequences, {} register stashes, {} spills, {} max live scratch registers",
            self.code_size,
            self.sequences,
            self.registers.reuse_hits,
            self.registers.spills,
            self.registers.max_used
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let options = CompileOptions::default();
        assert!(options.register_reuse);
        assert!(options.depth_ordering);
        assert!(options.constant_folding);
        assert_eq!(options.scratch_registers, DEFAULT_SCRATCH_REGISTERS);
    }

    #[test]
    fn eight_distinct_combinations() {
        let all: Vec<_> = CompileOptions::all_combinations().collect();
        assert_eq!(all.len(), 8);
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn scratch_pool_is_clamped() {
        let options = CompileOptions::default().with_scratch_registers(200);
        assert_eq!(options.scratch_registers, MAX_SCRATCH_REGISTERS);
    }
}
