//! AST types for trre patterns.

/// One node of a parsed pattern.
///
/// Quantifier nodes (`Star`, `Plus`, `Optional`, `Repeat`) are lazy unless
/// directly wrapped in [`Ast::Greedy`]. The parser wraps every quantifier
/// that is not followed by a `?` modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ast {
    /// A single character, matched and echoed.
    Literal(char),
    /// `.`, any byte.
    AnyChar,
    /// The empty string. Stands in for a missing operand of `:`.
    Empty,
    Concat(Box<Ast>, Box<Ast>),
    /// `l|r`, left alternative preferred.
    Alternate(Box<Ast>, Box<Ast>),
    /// `l-r` inside a class. Both sides are literals, or both are
    /// literal-to-literal transductions (a linked range).
    Range(Box<Ast>, Box<Ast>),
    /// `l:r`: consume `l`, produce `r`.
    Transduce(Box<Ast>, Box<Ast>),
    Star(Box<Ast>),
    Plus(Box<Ast>),
    Optional(Box<Ast>),
    /// `{min}`, `{min,}` and `{min,max}`. `max == None` is unbounded.
    Repeat {
        body: Box<Ast>,
        min: usize,
        max: Option<usize>,
    },
    /// Marks the wrapped quantifier as greedy.
    Greedy(Box<Ast>),
}

impl Ast {
    pub fn concat(l: Ast, r: Ast) -> Self {
        Self::Concat(Box::new(l), Box::new(r))
    }

    pub fn alternate(l: Ast, r: Ast) -> Self {
        Self::Alternate(Box::new(l), Box::new(r))
    }

    pub fn range(l: Ast, r: Ast) -> Self {
        Self::Range(Box::new(l), Box::new(r))
    }

    pub fn transduce(l: Ast, r: Ast) -> Self {
        Self::Transduce(Box::new(l), Box::new(r))
    }

    pub fn greedy(self) -> Self {
        Self::Greedy(Box::new(self))
    }
}
