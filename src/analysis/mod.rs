// This module implements the analysis passes that run between parsing and code
// generation. Constant folding rewrites the tree bottom-up, replacing every
// subexpression without free variables by its value (calling the native function for
// constant calls), and always returns a new tree. Call marking records, for every
// subtree, whether evaluating it invokes a native function; such an invocation clobbers
// every caller-saved register, so the code generator must keep values it needs across
// that subtree on the stack. Depth marking records the number of binary operations on
// the deepest path of every subtree, which lets the code generator evaluate the deeper
// operand first and keep fewer intermediate values live. The marks are stored in
// NodeMarks, a map keyed by node identity that borrows the tree it annotates.

//! Tree analysis passes feeding the code generator.

use hashbrown::HashMap;
use std::marker::PhantomData;

use crate::expr::Expr;

/// Per-node annotations for one specific tree.
///
/// Keys are node addresses; the borrow ties the marks to the tree so they
/// cannot be looked up after the tree is dropped or moved.
#[derive(Debug)]
pub struct NodeMarks<'t, T> {
    marks: HashMap<*const Expr, T>,
    _tree: PhantomData<&'t Expr>,
}

impl<'t, T: Copy> NodeMarks<'t, T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            marks: HashMap::with_capacity(capacity),
            _tree: PhantomData,
        }
    }

    fn insert(&mut self, node: &'t Expr, mark: T) {
        self.marks.insert(node as *const Expr, mark);
    }

    /// The mark of `node`.
    ///
    /// Panics if `node` is not part of the analysed tree.
    pub fn get(&self, node: &Expr) -> T {
        match self.marks.get(&(node as *const Expr)) {
            Some(mark) => *mark,
            None => panic!("node {node} was not analysed"),
        }
    }
}

/// Replace every constant subexpression by its value.
pub fn fold_constants(expr: &Expr) -> Expr {
    match expr {
        Expr::Variable(_) | Expr::Constant(_) => expr.clone(),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = fold_constants(lhs);
            let rhs = fold_constants(rhs);
            match (lhs.as_constant(), rhs.as_constant()) {
                (Some(a), Some(b)) => Expr::Constant(op.apply(a, b)),
                _ => Expr::binary(*op, lhs, rhs),
            }
        }
        Expr::Call { function, arg } => {
            let arg = fold_constants(arg);
            match arg.as_constant() {
                Some(a) => Expr::Constant(function.call(a)),
                None => Expr::call(*function, arg),
            }
        }
    }
}

/// Record for every subtree whether it contains a call.
pub fn mark_calls(root: &Expr) -> NodeMarks<'_, bool> {
    let mut marks = NodeMarks::with_capacity(root.node_count());
    record_calls(root, &mut marks);
    marks
}

fn record_calls<'t>(node: &'t Expr, marks: &mut NodeMarks<'t, bool>) -> bool {
    let mut has_call = matches!(node, Expr::Call { .. });
    for child in node.children() {
        has_call |= record_calls(child, marks);
    }
    marks.insert(node, has_call);
    has_call
}

/// Record for every subtree the number of binary operations on its deepest path.
pub fn mark_depth(root: &Expr) -> NodeMarks<'_, u32> {
    let mut marks = NodeMarks::with_capacity(root.node_count());
    record_depth(root, &mut marks);
    marks
}

fn record_depth<'t>(node: &'t Expr, marks: &mut NodeMarks<'t, u32>) -> u32 {
    let mut depth = 0;
    for child in node.children() {
        depth = depth.max(record_depth(child, marks));
    }
    if matches!(node, Expr::Binary { .. }) {
        depth += 1;
    }
    marks.insert(node, depth);
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{parse, FunctionTable};

    fn parse_std(text: &str) -> Expr {
        parse(text, FunctionTable::standard()).unwrap()
    }

    #[test]
    fn folds_arithmetic() {
        assert_eq!(fold_constants(&parse_std("1+2*3")), Expr::Constant(7.0));
        assert_eq!(fold_constants(&parse_std("sqrt(9)")), Expr::Constant(3.0));
        assert_eq!(fold_constants(&parse_std("x+2*3")).to_string(), "(x+6)");
        assert_eq!(fold_constants(&parse_std("sin(x)*(1+1)")).to_string(), "(sin(x)*2)");
    }

    #[test]
    fn folding_is_idempotent() {
        for text in ["x", "1+1", "x*(2+3)/sqrt(16)", "sqrt(-1)+x", "1/0", "sin(cos(x)+log(1))"] {
            let once = fold_constants(&parse_std(text));
            let twice = fold_constants(&once);
            assert_eq!(once, twice, "{text}");
        }
    }

    #[test]
    fn folding_leaves_input_untouched() {
        let tree = parse_std("x+(1+2)");
        let before = tree.clone();
        let _ = fold_constants(&tree);
        assert_eq!(tree, before);
    }

    #[test]
    fn records_calls() {
        let tests = [
            ("x", false),
            ("x+y", false),
            ("(x+y)", false),
            ("sin(x-y)", true),
            ("sin(cos(x)*cos(y))", true),
            ("1+sin(cos(x)/cos(y))", true),
            ("(1+sin(cos(x)/cos(y)))+1", true),
            ("1+(2*sin(x))", true),
            ("1+1+1+1+1+1+1+1+1+1+1+1+1+1+1+1+1+1", false),
            ("+x", false),
            ("-x", false),
            ("1+2+(3+2*4+((((5+6*2)+7)+sqrt(8))+9)+10*sin(2-x+y/3))+11", true),
        ];
        for (text, want) in tests {
            let root = parse_std(text);
            let marks = mark_calls(&root);
            assert_eq!(marks.get(&root), want, "{text}");
            assert_eq!(marks.marks.len(), root.node_count());
        }
    }

    #[test]
    fn call_marks_are_per_subtree() {
        let root = parse_std("x*sin(y)");
        let marks = mark_calls(&root);
        let Expr::Binary { lhs, rhs, .. } = &root else {
            panic!("expected binary root");
        };
        assert!(!marks.get(lhs));
        assert!(marks.get(rhs));
    }

    #[test]
    fn records_depth() {
        let tests = [
            ("x", 0),
            ("sin(x)", 0),
            ("x+y", 1),
            ("x+y*2", 2),
            ("(x+y)*(x-y)", 2),
            ("sqrt(x+y)", 1),
            ("1+1+1+1", 3),
            ("-x", 1),
        ];
        for (text, want) in tests {
            let root = parse_std(text);
            assert_eq!(mark_depth(&root).get(&root), want, "{text}");
        }
    }

    #[test]
    #[should_panic(expected = "was not analysed")]
    fn foreign_node_panics() {
        let root = parse_std("x+y");
        let other = parse_std("x+y");
        let marks = mark_depth(&root);
        marks.get(&other);
    }
}
