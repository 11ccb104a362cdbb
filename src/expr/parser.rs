//! Recursive descent parser for arithmetic expressions.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := number | ident | ident '(' args ')' | '(' expr ')'
//! ```

use super::{BinOp, Expr, FunctionTable, Var};
use crate::core::error::{JitError, JitResult};

/// Parse `text` into an expression tree, resolving calls against `table`.
pub fn parse(text: &str, table: &FunctionTable) -> JitResult<Expr> {
    let parser = Parser::new(text, table);
    parser.parse().map_err(|(position, message)| {
        log::debug!("parse {text:?} failed at {position}: {message}");
        JitError::Parse {
            expr: text.to_string(),
            position,
            message,
        }
    })
}

/// Deepest tree, and deepest parser recursion, accepted from input.
///
/// Every later pass walks the tree recursively, so this bounds their stack
/// use as well.
pub const MAX_DEPTH: u32 = 256;

type ParseResult<T> = Result<T, (usize, String)>;

/// A subtree together with its height.
type Parsed = (Expr, u32);

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    table: &'a FunctionTable,
    /// Open parentheses, call argument lists and unary signs around `pos`.
    nesting: u32,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, table: &'a FunctionTable) -> Self {
        Self {
            text,
            pos: 0,
            table,
            nesting: 0,
        }
    }

    fn parse(mut self) -> ParseResult<Expr> {
        self.skip_whitespace();
        if self.is_eof() {
            return Err(self.error("empty expression"));
        }

        let (root, _) = self.parse_expr()?;

        self.skip_whitespace();
        if let Some(ch) = self.current_char() {
            return Err(self.error(format!("unexpected {ch:?} after expression")));
        }
        Ok(root)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn current_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current_char(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn error(&self, message: impl Into<String>) -> (usize, String) {
        (self.pos, message.into())
    }

    fn try_read(&mut self, ch: char) -> bool {
        self.skip_whitespace();
        if self.current_char() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> ParseResult<()> {
        if !self.try_read(ch) {
            let found = match self.current_char() {
                Some(c) => format!("{c:?}"),
                None => "end of input".to_string(),
            };
            return Err(self.error(format!("expected {ch:?} but found {found}")));
        }
        Ok(())
    }

    fn too_deep(&self) -> (usize, String) {
        self.error(format!("expression nested too deeply (limit {MAX_DEPTH})"))
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.nesting >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn binary(
        &self,
        op: BinOp,
        (lhs, lhs_height): Parsed,
        (rhs, rhs_height): Parsed,
    ) -> ParseResult<Parsed> {
        let height = lhs_height.max(rhs_height) + 1;
        if height > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok((Expr::binary(op, lhs, rhs), height))
    }

    fn parse_expr(&mut self) -> ParseResult<Parsed> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = if self.try_read('+') {
                BinOp::Add
            } else if self.try_read('-') {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_term()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
    }

    fn parse_term(&mut self) -> ParseResult<Parsed> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.try_read('*') {
                BinOp::Mul
            } else if self.try_read('/') {
                BinOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_unary()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Parsed> {
        if self.try_read('+') {
            return self.nested(Self::parse_unary);
        }
        if self.try_read('-') {
            let (operand, height) = self.nested(Self::parse_unary)?;
            if height >= MAX_DEPTH {
                return Err(self.too_deep());
            }
            return Ok((Expr::negate(operand), height + 1));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Parsed> {
        self.skip_whitespace();
        match self.current_char() {
            None => Err(self.error("unexpected end of input")),
            Some('(') => {
                self.advance();
                let inner = self.nested(Self::parse_expr)?;
                self.expect(')')?;
                Ok(inner)
            }
            Some(ch) if ch.is_ascii_digit() || ch == '.' => Ok((self.parse_number()?, 0)),
            Some(ch) if ch.is_alphabetic() || ch == '_' => self.parse_identifier(),
            Some(ch) => Err(self.error(format!("unexpected {ch:?}"))),
        }
    }

    fn parse_number(&mut self) -> ParseResult<Expr> {
        let start = self.pos;
        self.read_digits();
        if self.current_char() == Some('.') {
            self.advance();
            self.read_digits();
        }
        if matches!(self.current_char(), Some('e' | 'E')) {
            let mantissa_end = self.pos;
            self.advance();
            if matches!(self.current_char(), Some('+' | '-')) {
                self.advance();
            }
            if self.read_digits() == 0 {
                self.pos = mantissa_end;
                return Err(self.error("malformed exponent in number literal"));
            }
        }

        let literal = &self.text[start..self.pos];
        literal
            .parse::<f64>()
            .map(Expr::Constant)
            .map_err(|_| (start, format!("malformed number literal {literal:?}")))
    }

    fn read_digits(&mut self) -> usize {
        let mut count = 0;
        while matches!(self.current_char(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
            count += 1;
        }
        count
    }

    fn read_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.current_char(), Some(ch) if ch.is_alphanumeric() || ch == '_') {
            self.advance();
        }
        &self.text[start..self.pos]
    }

    fn parse_identifier(&mut self) -> ParseResult<Parsed> {
        let start = self.pos;
        let name = self.read_identifier();

        if self.try_read('(') {
            return self.nested(|p| p.parse_call(start, name));
        }

        match Var::from_name(name) {
            Some(var) => Ok((Expr::Variable(var), 0)),
            None => Err((start, format!("undefined variable: {name}"))),
        }
    }

    fn parse_call(&mut self, start: usize, name: &'a str) -> ParseResult<Parsed> {
        let function = self
            .table
            .get(name)
            .ok_or_else(|| (start, format!("undefined function: {name}")))?;

        let mut args = Vec::new();
        if !self.try_read(')') {
            loop {
                args.push(self.parse_expr()?);
                if self.try_read(',') {
                    continue;
                }
                self.expect(')')?;
                break;
            }
        }

        if args.len() != 1 {
            return Err((
                start,
                format!("{name} needs 1 argument, have {}", args.len()),
            ));
        }
        let (arg, height) = args.pop().ok_or_else(|| (start, format!("{name} needs 1 argument")))?;
        if height >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok((Expr::call(function, arg), height + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_std(text: &str) -> JitResult<Expr> {
        parse(text, FunctionTable::standard())
    }

    #[test]
    fn accepts_basic_forms() {
        for text in ["x", "1", "1+1", "(1+1)", "sin(x)", "-x", "+x", "1.5", ".5", "2.", "1e3", "2.5E-2"] {
            if let Err(e) = parse_std(text) {
                panic!("{text}: {e}");
            }
        }
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(parse_std("1+2*3").unwrap().to_string(), "(1+(2*3))");
        assert_eq!(parse_std("1-2-3").unwrap().to_string(), "((1-2)-3)");
        assert_eq!(parse_std("8/4/2").unwrap().to_string(), "((8/4)/2)");
        assert_eq!(parse_std("(1+2)*3").unwrap().to_string(), "((1+2)*3)");
    }

    #[test]
    fn unary_minus_becomes_subtraction() {
        let e = parse_std("-x").unwrap();
        assert_eq!(
            e,
            Expr::binary(BinOp::Sub, Expr::Constant(0.0), Expr::Variable(Var::X))
        );
        assert_eq!(parse_std("+y").unwrap(), Expr::Variable(Var::Y));
        assert_eq!(parse_std("--x").unwrap().to_string(), "(0-(0-x))");
    }

    #[test]
    fn whitespace_is_ignored() {
        assert_eq!(
            parse_std("  sqrt ( x + y ) ").unwrap(),
            parse_std("sqrt(x+y)").unwrap()
        );
    }

    #[test]
    fn errors_carry_position_and_text() {
        match parse_std("x + z") {
            Err(JitError::Parse { expr, position, message }) => {
                assert_eq!(expr, "x + z");
                assert_eq!(position, 4);
                assert!(message.contains("undefined variable: z"), "{message}");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn nesting_is_bounded() {
        let n = MAX_DEPTH as usize;
        let at_limit = format!("{}x{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(parse_std(&at_limit).unwrap(), Expr::Variable(Var::X));

        let inputs = [
            format!("{}x{}", "(".repeat(200_000), ")".repeat(200_000)),
            format!("{}x", "-".repeat(200_000)),
            format!("{}x", "+".repeat(200_000)),
            format!("{}x{}", "sqrt(".repeat(200_000), ")".repeat(200_000)),
            format!("x{}", "+1".repeat(200_000)),
            format!("{}x", "x*(".repeat(n + 1)) + &")".repeat(n + 1),
        ];
        for text in &inputs {
            match parse_std(text) {
                Err(JitError::Parse { message, .. }) => {
                    assert!(message.contains("nested too deeply"), "{message}")
                }
                other => panic!("unexpected result {:?}", other.map(|e| e.node_count())),
            }
        }
    }

    #[test]
    fn longest_accepted_chain() {
        let text = format!("x{}", "+1".repeat(MAX_DEPTH as usize));
        let tree = parse_std(&text).unwrap();
        assert_eq!(tree.evaluate(0.5, 0.0), 0.5 + MAX_DEPTH as f64);
        assert!(parse_std(&format!("{text}+1")).is_err());
    }

    #[test]
    fn rejects_bad_input() {
        let cases = [
            ("", "empty"),
            ("   ", "empty"),
            ("notafunc(x)", "undefined function"),
            ("sin()", "needs 1 argument, have 0"),
            ("sin(x, y)", "needs 1 argument, have 2"),
            ("x +* y", "unexpected"),
            ("x y", "after expression"),
            ("(x", "expected ')'"),
            ("x)", "after expression"),
            ("1e", "exponent"),
            ("x +", "end of input"),
            ("sin", "undefined variable"),
        ];
        for (text, want) in cases {
            match parse_std(text) {
                Err(JitError::Parse { message, .. }) => {
                    assert!(message.contains(want), "{text:?}: {message:?} lacks {want:?}")
                }
                other => panic!("{text:?}: unexpected result {other:?}"),
            }
        }
    }
}
