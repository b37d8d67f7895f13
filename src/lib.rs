//! Transductive regular expressions.
//!
//! A trre pattern is a regular expression over pairs of strings: `a:b`
//! consumes `a` and produces `b`, while a plain character consumes and
//! echoes itself. Patterns compile to a nondeterministic finite-state
//! transducer that can be run by backtracking or through a lazily built
//! deterministic cache.
//!
//! # Example
//!
//! ```rust
//! use trre::{Cached, Transducer, scan};
//!
//! // `:` binds tighter than concatenation, so whole words need groups.
//! let transducer = Transducer::new("(cat):(dog)").unwrap();
//!
//! // Whole-input transduction
//! assert_eq!(transducer.cache().run(b"cat"), Some(b"dog".to_vec()));
//! assert_eq!(transducer.backtracker().run(b"cow"), None);
//!
//! // Find-and-replace along a line
//! let mut matcher = Cached::new(transducer.graph());
//! assert_eq!(scan(&mut matcher, b"a cat sat"), b"a dog sat");
//! ```

pub mod backtrack;
pub mod dft;
pub mod engine;
pub mod nft;
pub mod pattern;
pub mod scan;

pub use backtrack::Backtracker;
pub use dft::{DftCache, PrefixCache};
pub use engine::{Cached, Matcher};
pub use nft::Graph;
pub use pattern::{Ast, SyntaxError, parse};
pub use scan::scan;

/// A parsed and compiled pattern, ready to hand out executors.
#[derive(Debug, Clone)]
pub struct Transducer {
    graph: Graph,
}

impl Transducer {
    pub fn new(pattern: &str) -> Result<Self, SyntaxError> {
        let ast = parse(pattern)?;
        Ok(Self {
            graph: Graph::build(&ast)?,
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn backtracker(&self) -> Backtracker<'_> {
        Backtracker::new(&self.graph)
    }

    /// A deterministic cache for whole-input transduction.
    pub fn cache(&self) -> DftCache<'_> {
        DftCache::new(&self.graph)
    }

    /// A deterministic cache for prefix matching.
    pub fn prefix_cache(&self) -> PrefixCache<'_> {
        PrefixCache::new(&self.graph)
    }
}
