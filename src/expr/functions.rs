// This module provides the function table: the fixed set of unary math functions an
// expression may call. Each entry pairs a name with a native function that follows the
// C calling convention (one f64 in xmm0, one f64 out in xmm0), so generated code can call
// it through an absolute address and the constant folder can call it directly from Rust.
// The standard table is built once per process and never mutated; callers that need a
// different repertoire build their own table with FunctionTable::builder and pass it to
// the compiler explicitly.

//! Native unary math functions callable from expressions.

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use std::fmt;

/// Signature every callable function must have.
pub type NativeFn = extern "C" fn(f64) -> f64;

/// A function resolved from the table: its name and native entry point.
#[derive(Clone, Copy)]
pub struct Function {
    name: &'static str,
    native: NativeFn,
}

impl Function {
    pub const fn new(name: &'static str, native: NativeFn) -> Self {
        Self { name, native }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Absolute address of the native entry point.
    pub fn address(&self) -> u64 {
        self.native as usize as u64
    }

    /// Invoke the function directly.
    pub fn call(&self, arg: f64) -> f64 {
        (self.native)(arg)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}", self.name, self.address())
    }
}

/// Immutable mapping from function name to native function.
#[derive(Debug, Clone)]
pub struct FunctionTable {
    functions: HashMap<&'static str, Function>,
}

impl FunctionTable {
    /// The process-wide standard table.
    pub fn standard() -> &'static FunctionTable {
        &STANDARD
    }

    pub fn builder() -> FunctionTableBuilder {
        FunctionTableBuilder {
            functions: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Function> {
        self.functions.get(name).copied()
    }

    /// Function names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Collects entries for a [`FunctionTable`].
pub struct FunctionTableBuilder {
    functions: HashMap<&'static str, Function>,
}

impl FunctionTableBuilder {
    pub fn function(mut self, name: &'static str, native: NativeFn) -> Self {
        self.functions.insert(name, Function::new(name, native));
        self
    }

    pub fn build(self) -> FunctionTable {
        FunctionTable {
            functions: self.functions,
        }
    }
}

macro_rules! native_functions {
    ($($name:ident => $body:expr),* $(,)?) => {
        mod native {
            $(
                pub extern "C" fn $name(x: f64) -> f64 {
                    let f: fn(f64) -> f64 = $body;
                    f(x)
                }
            )*
        }

        fn standard_table() -> FunctionTable {
            FunctionTable::builder()
                $(.function(stringify!($name), native::$name))*
                .build()
        }
    };
}

native_functions! {
    acos => f64::acos,
    asin => f64::asin,
    atan => f64::atan,
    cos => f64::cos,
    cosh => f64::cosh,
    sin => f64::sin,
    sinh => f64::sinh,
    tan => f64::tan,
    tanh => f64::tanh,
    exp => f64::exp,
    log => f64::ln,
    log10 => f64::log10,
    sqrt => f64::sqrt,
    fabs => f64::abs,
}

static STANDARD: Lazy<FunctionTable> = Lazy::new(standard_table);
