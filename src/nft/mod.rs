//! Nondeterministic finite-state transducer graph.
//!
//! All states live in one arena owned by [`Graph`]; successors are
//! [`StateId`] indices into it, so loops need no shared ownership. A graph
//! never changes after [`Graph::build`] returns.

mod builder;

use crate::pattern::{Ast, SyntaxError};

/// Index of a state inside its [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(usize);

impl StateId {
    /// Placeholder for a successor that is filled in later by the builder.
    const DANGLING: StateId = StateId(usize::MAX);

    pub fn index(self) -> usize {
        self.0
    }
}

/// One transducer state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Read `symbol` from the input or fail.
    Consume { symbol: u8, next: StateId },
    /// Write `symbol` to the output.
    Produce { symbol: u8, next: StateId },
    /// Try `primary` first, then `secondary`.
    Split { primary: StateId, secondary: StateId },
    Join { next: StateId },
    Accept,
}

/// A compiled pattern.
#[derive(Debug, Clone)]
pub struct Graph {
    states: Vec<State>,
    root: StateId,
}

impl Graph {
    /// Compile `ast` into a transducer.
    ///
    /// Fails only for range operands the builder cannot expand, or for
    /// repetitions that would exceed the state limit.
    pub fn build(ast: &Ast) -> Result<Self, SyntaxError> {
        builder::build(ast)
    }

    pub fn root(&self) -> StateId {
        self.root
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
