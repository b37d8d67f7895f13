//! Operator-precedence parser for trre pattern strings.
//!
//! Two explicit stacks (pending operators and finished operands) are driven
//! by a three-state scanner. Juxtaposition is an implicit concatenation
//! outside classes and an implicit alternation inside them.

use phf::{Map, phf_map};

use super::ast::Ast;

/// Errors that can occur while parsing or compiling a trre pattern.
///
/// Positions count characters, not bytes, from the start of the pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    EmptyPattern,
    UnexpectedToken { pos: usize, token: char },
    UnexpectedEnd { pos: usize },
    UnmatchedParen { pos: usize },
    UnmatchedBracket { pos: usize },
    UnclosedRepetition { pos: usize },
    InvalidRepetition { pos: usize },
    /// Reported while building the transducer, so it has no position.
    InvalidRange(&'static str),
    /// Repetition counts would compile to more than `limit` states.
    TooLarge { limit: usize },
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPattern => write!(f, "Empty pattern"),
            Self::UnexpectedToken { pos, token } => {
                write!(f, "Unexpected symbol {token:?} at position {pos}")
            }
            Self::UnexpectedEnd { pos } => {
                write!(f, "Unexpected end of pattern after position {pos}")
            }
            Self::UnmatchedParen { pos } => write!(f, "Unmatched parenthesis at position {pos}"),
            Self::UnmatchedBracket { pos } => {
                write!(f, "Unmatched square bracket at position {pos}")
            }
            Self::UnclosedRepetition { pos } => {
                write!(f, "Unclosed curly bracket at position {pos}")
            }
            Self::InvalidRepetition { pos } => {
                write!(f, "Invalid repetition count at position {pos}")
            }
            Self::InvalidRange(reason) => write!(f, "Unexpected range syntax: {reason}"),
            Self::TooLarge { limit } => {
                write!(f, "Pattern compiles to more than {limit} states")
            }
        }
    }
}

impl std::error::Error for SyntaxError {}

/// Escapes with a meaning other than "the next character, literally".
const ESCAPES: Map<char, char> = phf_map! {
    'n' => '\n',
    't' => '\t',
    'r' => '\r',
    'f' => '\x0c',
    'v' => '\x0b',
    '0' => '\0',
};

/// Parse a trre pattern into an [`Ast`].
pub fn parse(pattern: &str) -> Result<Ast, SyntaxError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut stacks = Stacks::default();
    let mut scan = Scan::Operand;
    let mut counter = Counter::default();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match scan {
            Scan::Operand => match c {
                '(' => {
                    stacks.open(Op::Group, i);
                    i += 1;
                }
                '[' => {
                    stacks.open(Op::Class, i);
                    i = parse_class(&chars, i + 1, &mut stacks)?;
                    scan = Scan::Operator;
                }
                '\\' => {
                    stacks.operands.push(Ast::Literal(escape(&chars, i)?));
                    i += 2;
                    scan = Scan::Operator;
                }
                '.' => {
                    stacks.operands.push(Ast::AnyChar);
                    i += 1;
                    scan = Scan::Operator;
                }
                // `:x`: nothing consumed, `x` produced. Re-read the `:` as an operator.
                ':' => {
                    stacks.operands.push(Ast::Empty);
                    scan = Scan::Operator;
                }
                '|' | '*' | '+' | '?' | ')' | '{' | '}' => {
                    if stacks.top_op() != Some(Op::Transduce) {
                        return Err(SyntaxError::UnexpectedToken { pos: i, token: c });
                    }
                    // `a:|b`: nothing produced for `a`.
                    stacks.operands.push(Ast::Empty);
                    scan = Scan::Operator;
                }
                _ => {
                    stacks.operands.push(Ast::Literal(c));
                    i += 1;
                    scan = Scan::Operator;
                }
            },
            Scan::Operator => match c {
                '*' | '+' | '?' => {
                    let lazy = chars.get(i + 1) == Some(&'?');
                    let quantify = match c {
                        '*' => Ast::Star,
                        '+' => Ast::Plus,
                        _ => Ast::Optional,
                    };
                    stacks.postfix(i, lazy, quantify)?;
                    i += if lazy { 2 } else { 1 };
                }
                '{' => {
                    counter = Counter::starting_at(i);
                    scan = Scan::Count;
                    i += 1;
                }
                '|' => {
                    stacks.push_binary(Op::Alternate, i)?;
                    scan = Scan::Operand;
                    i += 1;
                }
                ':' => {
                    stacks.push_binary(Op::Transduce, i)?;
                    scan = Scan::Operand;
                    i += 1;
                }
                ')' => {
                    stacks.close(Op::Group, i)?;
                    i += 1;
                }
                _ => {
                    // Implicit concatenation; the current token is re-read as an operand.
                    stacks.push_binary(Op::Concat, i)?;
                    scan = Scan::Operand;
                }
            },
            Scan::Count => {
                match c {
                    '0'..='9' => counter.digit(c, i)?,
                    ',' => counter.comma(i)?,
                    '}' => {
                        let (min, max) = counter.finish(i)?;
                        let lazy = chars.get(i + 1) == Some(&'?');
                        stacks.postfix(i, lazy, |body| Ast::Repeat { body, min, max })?;
                        if lazy {
                            i += 1;
                        }
                        scan = Scan::Operator;
                    }
                    _ => return Err(SyntaxError::InvalidRepetition { pos: i }),
                }
                i += 1;
            }
        }
    }

    match scan {
        Scan::Count => return Err(SyntaxError::UnclosedRepetition { pos: counter.start }),
        // `a:` at the very end deletes `a`.
        Scan::Operand if stacks.top_op() == Some(Op::Transduce) => {
            stacks.operands.push(Ast::Empty);
        }
        _ => {}
    }
    stacks.finish()
}

/// Parse the inside of a `[...]` class. `i` is just past the `[`, whose
/// barrier is already on the operator stack. Returns the index just past
/// the closing `]`.
fn parse_class(chars: &[char], mut i: usize, stacks: &mut Stacks) -> Result<usize, SyntaxError> {
    let open = i - 1;
    let mut expect_operand = true;

    while i < chars.len() {
        let c = chars[i];
        if expect_operand {
            match c {
                ':' | '-' | '[' | ']' => {
                    return Err(SyntaxError::UnexpectedToken { pos: i, token: c });
                }
                '\\' => {
                    stacks.operands.push(Ast::Literal(escape(chars, i)?));
                    i += 2;
                }
                _ => {
                    stacks.operands.push(Ast::Literal(c));
                    i += 1;
                }
            }
            expect_operand = false;
        } else {
            match c {
                ':' => {
                    stacks.push_binary(Op::Transduce, i)?;
                    i += 1;
                }
                '-' => {
                    stacks.push_binary(Op::Range, i)?;
                    i += 1;
                }
                ']' => {
                    stacks.close(Op::Class, i)?;
                    return Ok(i + 1);
                }
                // Implicit alternation; the current token is re-read as an operand.
                _ => stacks.push_binary(Op::Alternate, i)?,
            }
            expect_operand = true;
        }
    }
    Err(SyntaxError::UnmatchedBracket { pos: open })
}

/// Resolve the escape sequence starting with the backslash at `i`.
fn escape(chars: &[char], i: usize) -> Result<char, SyntaxError> {
    let c = chars.get(i + 1).ok_or(SyntaxError::UnexpectedEnd { pos: i })?;
    Ok(ESCAPES.get(c).copied().unwrap_or(*c))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Operand,
    Operator,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Alternate,
    Concat,
    Range,
    Transduce,
    /// `(` barrier.
    Group,
    /// `[` barrier.
    Class,
}

impl Op {
    /// Higher binds tighter. Postfix quantifiers (4) and escapes (5) are
    /// reduced as soon as they are read, so they never sit on the stack.
    fn precedence(self) -> u8 {
        match self {
            Op::Group | Op::Class => 0,
            Op::Alternate => 1,
            Op::Concat | Op::Range => 2,
            Op::Transduce => 3,
        }
    }

    fn is_barrier(self) -> bool {
        matches!(self, Op::Group | Op::Class)
    }
}

#[derive(Debug)]
struct Pending {
    op: Op,
    pos: usize,
}

#[derive(Debug, Default)]
struct Stacks {
    operators: Vec<Pending>,
    operands: Vec<Ast>,
}

impl Stacks {
    fn top_op(&self) -> Option<Op> {
        self.operators.last().map(|p| p.op)
    }

    fn open(&mut self, barrier: Op, pos: usize) {
        self.operators.push(Pending { op: barrier, pos });
    }

    /// Reduce everything at least as tight as `op`, then push it.
    fn push_binary(&mut self, op: Op, pos: usize) -> Result<(), SyntaxError> {
        while let Some(top) = self.top_op()
            && !top.is_barrier()
            && top.precedence() >= op.precedence()
        {
            self.reduce()?;
        }
        self.operators.push(Pending { op, pos });
        Ok(())
    }

    /// Apply a postfix quantifier to the top operand.
    fn postfix(
        &mut self,
        pos: usize,
        lazy: bool,
        quantify: impl FnOnce(Box<Ast>) -> Ast,
    ) -> Result<(), SyntaxError> {
        let body = self.pop_operand(pos)?;
        let node = quantify(Box::new(body));
        self.operands.push(if lazy { node } else { node.greedy() });
        Ok(())
    }

    /// Reduce down to the matching `barrier` and drop it.
    fn close(&mut self, barrier: Op, pos: usize) -> Result<(), SyntaxError> {
        loop {
            match self.top_op() {
                Some(op) if op == barrier => {
                    self.operators.pop();
                    return Ok(());
                }
                Some(op) if !op.is_barrier() => self.reduce()?,
                _ if barrier == Op::Class => return Err(SyntaxError::UnmatchedBracket { pos }),
                _ => return Err(SyntaxError::UnmatchedParen { pos }),
            }
        }
    }

    fn reduce(&mut self) -> Result<(), SyntaxError> {
        let Some(Pending { op, pos }) = self.operators.pop() else {
            return Ok(());
        };
        let combine = match op {
            Op::Group => return Err(SyntaxError::UnmatchedParen { pos }),
            Op::Class => return Err(SyntaxError::UnmatchedBracket { pos }),
            Op::Alternate => Ast::alternate,
            Op::Concat => Ast::concat,
            Op::Range => Ast::range,
            Op::Transduce => Ast::transduce,
        };
        let r = self.pop_operand(pos)?;
        let l = self.pop_operand(pos)?;
        self.operands.push(combine(l, r));
        Ok(())
    }

    fn pop_operand(&mut self, pos: usize) -> Result<Ast, SyntaxError> {
        self.operands.pop().ok_or(SyntaxError::UnexpectedEnd { pos })
    }

    fn finish(mut self) -> Result<Ast, SyntaxError> {
        while !self.operators.is_empty() {
            self.reduce()?;
        }
        let root = self.operands.pop().ok_or(SyntaxError::EmptyPattern)?;
        debug_assert!(self.operands.is_empty(), "operands left after reduction");
        Ok(root)
    }
}

/// Collects the `lo[,hi]` digits of a `{...}` repetition.
#[derive(Debug, Default)]
struct Counter {
    /// Position of the `{`.
    start: usize,
    min: Option<usize>,
    current: Option<usize>,
    comma: bool,
}

impl Counter {
    fn starting_at(start: usize) -> Self {
        Self {
            start,
            ..Self::default()
        }
    }

    fn digit(&mut self, c: char, pos: usize) -> Result<(), SyntaxError> {
        let d = c.to_digit(10).ok_or(SyntaxError::InvalidRepetition { pos })? as usize;
        let n = self
            .current
            .unwrap_or(0)
            .checked_mul(10)
            .and_then(|n| n.checked_add(d))
            .ok_or(SyntaxError::InvalidRepetition { pos })?;
        self.current = Some(n);
        Ok(())
    }

    fn comma(&mut self, pos: usize) -> Result<(), SyntaxError> {
        if self.comma {
            return Err(SyntaxError::InvalidRepetition { pos });
        }
        self.comma = true;
        self.min = self.current.take();
        Ok(())
    }

    /// Returns `(min, max)`; `max == None` is unbounded.
    fn finish(&mut self, pos: usize) -> Result<(usize, Option<usize>), SyntaxError> {
        if !self.comma {
            let n = self
                .current
                .ok_or(SyntaxError::InvalidRepetition { pos: self.start })?;
            return Ok((n, Some(n)));
        }
        match (self.min, self.current) {
            (None, None) => Err(SyntaxError::InvalidRepetition { pos: self.start }),
            (Some(min), None) => Ok((min, None)),
            (min, Some(max)) => {
                let min = min.unwrap_or(0);
                if max < min {
                    Err(SyntaxError::InvalidRepetition { pos })
                } else {
                    Ok((min, Some(max)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(s: &str) -> Ast {
        parse(s).expect("parse should succeed")
    }
    fn parse_err(s: &str) -> SyntaxError {
        parse(s).expect_err("parse should fail")
    }

    fn lit(c: char) -> Ast {
        Ast::Literal(c)
    }

    // --- Operands ---

    #[test]
    fn test_single_literal() {
        assert_eq!(parse_ok("a"), lit('a'));
    }

    #[test]
    fn test_any_char() {
        assert_eq!(parse_ok("."), Ast::AnyChar);
    }

    #[test]
    fn test_escaped_metacharacter() {
        assert_eq!(parse_ok(r"\*"), lit('*'));
        assert_eq!(parse_ok(r"\."), lit('.'));
    }

    #[test]
    fn test_escape_table() {
        assert_eq!(parse_ok(r"\n"), lit('\n'));
        assert_eq!(parse_ok(r"\t"), lit('\t'));
    }

    #[test]
    fn test_unicode_literal() {
        assert_eq!(parse_ok("é"), lit('é'));
    }

    // --- Concatenation and precedence ---

    #[test]
    fn test_implicit_concat_is_left_associative() {
        assert_eq!(
            parse_ok("abc"),
            Ast::concat(Ast::concat(lit('a'), lit('b')), lit('c'))
        );
    }

    #[test]
    fn test_alternation_binds_loosest() {
        assert_eq!(
            parse_ok("ab|c"),
            Ast::alternate(Ast::concat(lit('a'), lit('b')), lit('c'))
        );
    }

    #[test]
    fn test_transduce_binds_tighter_than_concat() {
        assert_eq!(
            parse_ok("ab:c"),
            Ast::concat(lit('a'), Ast::transduce(lit('b'), lit('c')))
        );
    }

    #[test]
    fn test_group_overrides_precedence() {
        assert_eq!(
            parse_ok("(ab):c"),
            Ast::transduce(Ast::concat(lit('a'), lit('b')), lit('c'))
        );
    }

    #[test]
    fn test_dash_outside_class_is_literal() {
        assert_eq!(parse_ok("a-b"), Ast::concat(Ast::concat(lit('a'), lit('-')), lit('b')));
    }

    // --- Quantifiers ---

    #[test]
    fn test_bare_quantifiers_are_greedy() {
        assert_eq!(parse_ok("a*"), Ast::Star(Box::new(lit('a'))).greedy());
        assert_eq!(parse_ok("a+"), Ast::Plus(Box::new(lit('a'))).greedy());
        assert_eq!(parse_ok("a?"), Ast::Optional(Box::new(lit('a'))).greedy());
    }

    #[test]
    fn test_lazy_modifier() {
        assert_eq!(parse_ok("a*?"), Ast::Star(Box::new(lit('a'))));
        assert_eq!(parse_ok("a??"), Ast::Optional(Box::new(lit('a'))));
    }

    #[test]
    fn test_quantifier_binds_tighter_than_transduce() {
        assert_eq!(
            parse_ok("a*:x"),
            Ast::transduce(Ast::Star(Box::new(lit('a'))).greedy(), lit('x'))
        );
    }

    #[test]
    fn test_stacked_quantifiers() {
        assert_eq!(
            parse_ok("a*+"),
            Ast::Plus(Box::new(Ast::Star(Box::new(lit('a'))).greedy())).greedy()
        );
    }

    // --- Repetition counts ---

    fn repeat(min: usize, max: Option<usize>) -> Ast {
        Ast::Repeat {
            body: Box::new(lit('a')),
            min,
            max,
        }
    }

    #[test]
    fn test_exact_count() {
        assert_eq!(parse_ok("a{3}"), repeat(3, Some(3)).greedy());
    }

    #[test]
    fn test_at_least_count() {
        assert_eq!(parse_ok("a{2,}"), repeat(2, None).greedy());
    }

    #[test]
    fn test_closed_count() {
        assert_eq!(parse_ok("a{2,4}"), repeat(2, Some(4)).greedy());
    }

    #[test]
    fn test_missing_lower_bound() {
        assert_eq!(parse_ok("a{,4}"), repeat(0, Some(4)).greedy());
    }

    #[test]
    fn test_lazy_count() {
        assert_eq!(parse_ok("a{2,4}?"), repeat(2, Some(4)));
    }

    #[test]
    fn test_count_then_concat() {
        assert_eq!(
            parse_ok("a{2}b"),
            Ast::concat(repeat(2, Some(2)).greedy(), lit('b'))
        );
    }

    // --- Classes ---

    #[test]
    fn test_class_adjacency_is_alternation() {
        assert_eq!(
            parse_ok("[abc]"),
            Ast::alternate(Ast::alternate(lit('a'), lit('b')), lit('c'))
        );
    }

    #[test]
    fn test_class_range() {
        assert_eq!(parse_ok("[a-c]"), Ast::range(lit('a'), lit('c')));
    }

    #[test]
    fn test_class_range_then_literal() {
        assert_eq!(
            parse_ok("[a-cx]"),
            Ast::alternate(Ast::range(lit('a'), lit('c')), lit('x'))
        );
    }

    #[test]
    fn test_class_linked_range() {
        assert_eq!(
            parse_ok("[a:A-z:Z]"),
            Ast::range(
                Ast::transduce(lit('a'), lit('A')),
                Ast::transduce(lit('z'), lit('Z'))
            )
        );
    }

    #[test]
    fn test_class_does_not_reduce_outer_operators() {
        assert_eq!(
            parse_ok("x|[ab]"),
            Ast::alternate(lit('x'), Ast::alternate(lit('a'), lit('b')))
        );
    }

    #[test]
    fn test_quantified_class() {
        assert_eq!(
            parse_ok("[a-c]*"),
            Ast::Star(Box::new(Ast::range(lit('a'), lit('c')))).greedy()
        );
    }

    // --- Epsilon operands ---

    #[test]
    fn test_insert() {
        assert_eq!(parse_ok(":x"), Ast::transduce(Ast::Empty, lit('x')));
    }

    #[test]
    fn test_delete_at_end() {
        assert_eq!(parse_ok("a:"), Ast::transduce(lit('a'), Ast::Empty));
    }

    #[test]
    fn test_delete_before_operator() {
        assert_eq!(
            parse_ok("(a:)*"),
            Ast::Star(Box::new(Ast::transduce(lit('a'), Ast::Empty))).greedy()
        );
        assert_eq!(
            parse_ok("a:|b"),
            Ast::alternate(Ast::transduce(lit('a'), Ast::Empty), lit('b'))
        );
    }

    // --- Errors ---

    #[test]
    fn test_empty_pattern() {
        assert_eq!(parse_err(""), SyntaxError::EmptyPattern);
    }

    #[test]
    fn test_unclosed_group() {
        assert_eq!(parse_err("(ab"), SyntaxError::UnmatchedParen { pos: 0 });
    }

    #[test]
    fn test_unopened_group() {
        assert_eq!(parse_err("ab)"), SyntaxError::UnmatchedParen { pos: 2 });
    }

    #[test]
    fn test_unclosed_class() {
        assert_eq!(parse_err("x[ab"), SyntaxError::UnmatchedBracket { pos: 1 });
    }

    #[test]
    fn test_empty_class() {
        assert_eq!(
            parse_err("[]"),
            SyntaxError::UnexpectedToken { pos: 1, token: ']' }
        );
    }

    #[test]
    fn test_leading_quantifier() {
        assert_eq!(
            parse_err("*a"),
            SyntaxError::UnexpectedToken { pos: 0, token: '*' }
        );
    }

    #[test]
    fn test_empty_group() {
        assert_eq!(
            parse_err("()"),
            SyntaxError::UnexpectedToken { pos: 1, token: ')' }
        );
    }

    #[test]
    fn test_dangling_alternation() {
        assert_eq!(parse_err("a|"), SyntaxError::UnexpectedEnd { pos: 1 });
    }

    #[test]
    fn test_dangling_escape() {
        assert_eq!(parse_err("a\\"), SyntaxError::UnexpectedEnd { pos: 1 });
    }

    #[test]
    fn test_unclosed_count() {
        assert_eq!(parse_err("a{2"), SyntaxError::UnclosedRepetition { pos: 1 });
    }

    #[test]
    fn test_count_with_two_commas() {
        assert_eq!(parse_err("a{1,2,3}"), SyntaxError::InvalidRepetition { pos: 5 });
    }

    #[test]
    fn test_count_with_letter() {
        assert_eq!(parse_err("a{x}"), SyntaxError::InvalidRepetition { pos: 2 });
    }

    #[test]
    fn test_empty_count() {
        assert_eq!(parse_err("a{}"), SyntaxError::InvalidRepetition { pos: 1 });
    }

    #[test]
    fn test_inverted_count() {
        assert_eq!(parse_err("a{4,2}"), SyntaxError::InvalidRepetition { pos: 5 });
    }

    #[test]
    fn test_count_overflow() {
        assert!(matches!(
            parse_err("a{99999999999999999999999}"),
            SyntaxError::InvalidRepetition { .. }
        ));
    }

    #[test]
    fn test_error_display_mentions_position() {
        let err = parse_err("ab)");
        assert_eq!(err.to_string(), "Unmatched parenthesis at position 2");
    }
}
