//! The seam between the two executors and their callers.

use crate::backtrack::Backtracker;
use crate::dft::{self, DftCache, PrefixCache};
use crate::nft::Graph;

/// Something that can run a compiled pattern against input bytes.
pub trait Matcher {
    /// Transduce the whole of `input`, or `None` if it is not accepted.
    fn transduce(&mut self, input: &[u8]) -> Option<Vec<u8>>;

    /// Transduce the preferred accepted prefix of `input`. Returns the number
    /// of bytes consumed and the output.
    fn transduce_prefix(&mut self, input: &[u8]) -> Option<(usize, Vec<u8>)>;
}

impl Matcher for Backtracker<'_> {
    fn transduce(&mut self, input: &[u8]) -> Option<Vec<u8>> {
        self.run(input)
    }

    fn transduce_prefix(&mut self, input: &[u8]) -> Option<(usize, Vec<u8>)> {
        self.run_prefix(input)
    }
}

/// A pair of deterministic caches over one graph: one for whole inputs and
/// one for prefixes.
#[derive(Debug)]
pub struct Cached<'g> {
    full: DftCache<'g>,
    prefix: PrefixCache<'g>,
}

impl<'g> Cached<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            full: DftCache::new(graph),
            prefix: PrefixCache::new(graph),
        }
    }

    /// Apply `limit` to each of the two caches.
    pub fn with_capacity(self, limit: usize) -> Self {
        Self {
            full: self.full.with_capacity(limit),
            prefix: self.prefix.with_capacity(limit),
        }
    }

    /// Counters of the whole-input cache and the prefix cache.
    pub fn stats(&self) -> (dft::Stats, dft::Stats) {
        (self.full.stats(), self.prefix.stats())
    }
}

impl Matcher for Cached<'_> {
    fn transduce(&mut self, input: &[u8]) -> Option<Vec<u8>> {
        self.full.run(input)
    }

    fn transduce_prefix(&mut self, input: &[u8]) -> Option<(usize, Vec<u8>)> {
        self.prefix.run_prefix(input)
    }
}
