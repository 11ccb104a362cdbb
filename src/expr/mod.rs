//! Expression trees.
//!
//! An [`Expr`] is the parsed, immutable form of an arithmetic expression over
//! the variables `x` and `y`. Passes never mutate a tree; they build new ones.

pub mod functions;
pub mod parser;

use std::fmt;

pub use functions::{Function, FunctionTable, NativeFn};
pub use parser::parse;

/// The two free variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Var {
    X,
    Y,
}

impl Var {
    pub fn from_name(name: &str) -> Option<Var> {
        match name {
            "x" => Some(Var::X),
            "y" => Some(Var::Y),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Var::X => "x",
            Var::Y => "y",
        }
    }
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinOp::Add => lhs + rhs,
            BinOp::Sub => lhs - rhs,
            BinOp::Mul => lhs * rhs,
            BinOp::Div => lhs / rhs,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }
}

/// Expression tree node.
#[derive(Debug, Clone)]
pub enum Expr {
    Variable(Var),
    Constant(f64),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        arg: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(function: Function, arg: Expr) -> Expr {
        Expr::Call {
            function,
            arg: Box::new(arg),
        }
    }

    /// Unary minus, expressed as `0 - operand`.
    pub fn negate(operand: Expr) -> Expr {
        Expr::binary(BinOp::Sub, Expr::Constant(0.0), operand)
    }

    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Expr::Constant(v) => Some(*v),
            _ => None,
        }
    }

    /// Direct children, left to right.
    pub fn children(&self) -> impl Iterator<Item = &Expr> {
        let (first, second) = match self {
            Expr::Variable(_) | Expr::Constant(_) => (None, None),
            Expr::Binary { lhs, rhs, .. } => (Some(&**lhs), Some(&**rhs)),
            Expr::Call { arg, .. } => (Some(&**arg), None),
        };
        first.into_iter().chain(second)
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        1 + self.children().map(Expr::node_count).sum::<usize>()
    }

    /// Evaluate the tree directly, without compiling it.
    ///
    /// This is the reference semantics the generated code must match.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        match self {
            Expr::Variable(Var::X) => x,
            Expr::Variable(Var::Y) => y,
            Expr::Constant(v) => *v,
            Expr::Binary { op, lhs, rhs } => op.apply(lhs.evaluate(x, y), rhs.evaluate(x, y)),
            Expr::Call { function, arg } => function.call(arg.evaluate(x, y)),
        }
    }
}

impl PartialEq for Expr {
    // Constants compare by bit pattern so trees holding NaN are still equal
    // to themselves.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Variable(a), Expr::Variable(b)) => a == b,
            (Expr::Constant(a), Expr::Constant(b)) => a.to_bits() == b.to_bits(),
            (
                Expr::Binary { op, lhs, rhs },
                Expr::Binary {
                    op: op2,
                    lhs: lhs2,
                    rhs: rhs2,
                },
            ) => op == op2 && lhs == lhs2 && rhs == rhs2,
            (
                Expr::Call { function, arg },
                Expr::Call {
                    function: function2,
                    arg: arg2,
                },
            ) => function == function2 && arg == arg2,
            _ => false,
        }
    }
}

/// Fully parenthesized infix form.
///
/// Trees returned by [`parse`] only hold finite non-negative constants and
/// print back to text that parses to an equal tree. Folding can produce
/// negative, NaN or infinite constants: a negative one reparses as `0 - c`
/// with the same value, while NaN and infinities print as `NaN` and `inf`
/// and are not valid input.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Variable(v) => f.write_str(v.name()),
            Expr::Constant(v) => write!(f, "{v}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs}{}{rhs})", op.symbol()),
            Expr::Call { function, arg } => write!(f, "{}({arg})", function.name()),
        }
    }
}
