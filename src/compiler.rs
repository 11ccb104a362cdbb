// This module drives the whole pipeline for one expression: parse the text against the
// function table, optionally fold constants, generate machine code with FunctionCodegen
// (which runs the call and depth analyses itself), and map the result into executable
// memory. Compiler borrows an immutable FunctionTable so that the set of callable
// functions is decided once by the caller and never looked up from ambient state. All
// user-facing failures are returned as JitError before any Code exists; a Code is only
// ever handed out complete and callable.

//! Compilation pipeline.

use log::debug;

use crate::analysis::fold_constants;
use crate::core::error::JitResult;
use crate::core::session::CompileOptions;
use crate::expr::{parse, Expr, FunctionTable};
use crate::runtime::{Code, ExecutableBlock};
use crate::x64::{Assembled, FunctionCodegen};

/// Compiles expression text to native code.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'f> {
    table: &'f FunctionTable,
    options: CompileOptions,
}

impl<'f> Compiler<'f> {
    pub fn new(table: &'f FunctionTable) -> Self {
        Self {
            table,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    pub fn table(&self) -> &'f FunctionTable {
        self.table
    }

    /// Parse `text`, folding constants when enabled.
    pub fn lower(&self, text: &str) -> JitResult<Expr> {
        let tree = parse(text, self.table)?;
        if self.options.constant_folding {
            Ok(fold_constants(&tree))
        } else {
            Ok(tree)
        }
    }

    /// Generate machine code for `text` without mapping it.
    pub fn assemble(&self, text: &str) -> JitResult<Assembled> {
        let tree = self.lower(text)?;
        let assembled = FunctionCodegen::new(&tree, self.options).generate()?;
        debug!("compiled {text:?} as {tree}: {}", assembled.stats);
        Ok(assembled)
    }

    /// Compile `text` into callable code.
    pub fn compile(&self, text: &str) -> JitResult<Code> {
        let Assembled { code, stats } = self.assemble(text)?;
        let block = ExecutableBlock::new(&code)?;
        Ok(Code::new(block, stats))
    }
}

/// Compile `text` with the standard function table and default options.
pub fn compile(text: &str) -> JitResult<Code> {
    Compiler::new(FunctionTable::standard()).compile(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_shrinks_code() {
        let table = FunctionTable::standard();
        let folded = Compiler::new(table).assemble("x*(1+2+3)").unwrap();
        let plain = Compiler::new(table)
            .with_options(CompileOptions::default().with_constant_folding(false))
            .assemble("x*(1+2+3)")
            .unwrap();
        assert!(folded.stats.code_size < plain.stats.code_size);
    }

    #[test]
    fn lower_respects_folding_toggle() {
        let table = FunctionTable::standard();
        let compiler = Compiler::new(table);
        assert_eq!(compiler.lower("sqrt(16)").unwrap(), Expr::Constant(4.0));
        let compiler = compiler.with_options(CompileOptions::default().with_constant_folding(false));
        assert_eq!(compiler.lower("sqrt(16)").unwrap().to_string(), "sqrt(16)");
    }

    #[test]
    fn parse_errors_surface_before_codegen() {
        let err = compile("sin(x,y)").unwrap_err();
        assert!(err.is_parse());
    }
}
