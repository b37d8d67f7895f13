//! Deterministic transducer cache.
//!
//! DT states are built on demand by subset construction over a [`Graph`]. A
//! DT state is the list of graph threads that are alive after some input,
//! each with the output it has produced but not yet emitted, in the order
//! the backtracker would try them. Stepping a DT state on a byte emits the
//! longest common prefix of every surviving thread's output and moves to the
//! DT state holding what is left. Both the step and the target are
//! remembered, so an input that revisits known states runs in time linear
//! in its length.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::{debug, trace};

use crate::nft::{Graph, State, StateId};

/// Default maximum number of DT states kept before the cache is cleared.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default maximum number of pending output bytes held across all DT states
/// before the cache is cleared.
pub const DEFAULT_PENDING_LIMIT: usize = 1 << 20;

/// Counters since the cache was created. `states` and `pending_bytes` are
/// current totals; the rest accumulate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Transitions answered from the table.
    pub hits: usize,
    /// Transitions computed from the graph.
    pub misses: usize,
    /// Epsilon closures computed.
    pub closures: usize,
    /// DT states currently held.
    pub states: usize,
    /// Pending output bytes currently held.
    pub pending_bytes: usize,
    /// Times the cache was emptied for exceeding its capacity.
    pub clears: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// Accept only at the end of the input.
    Full,
    /// Accept anywhere; threads ranked below a completed match are dropped.
    Prefix,
}

/// A graph state reached by the empty-input closure, with its pending
/// output. The state is always a `Consume` or the `Accept`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Thread {
    state: StateId,
    pending: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DtId(usize);

#[derive(Debug, Clone)]
enum Transition {
    Dead,
    To { next: DtId, chunk: Vec<u8> },
}

#[derive(Debug)]
struct DtState {
    threads: Vec<Thread>,
    /// Index of the first `Accept` thread, if any.
    accept: Option<usize>,
    next: HashMap<u8, Transition>,
}

/// Whole-input transduction through lazily built DT states, reusable across
/// queries against one graph.
#[derive(Debug)]
pub struct DftCache<'g>(Automaton<'g>);

impl<'g> DftCache<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self(Automaton::new(graph, Kind::Full))
    }

    /// Keep at most `limit` DT states (at least two). Going over empties the
    /// cache; results are unaffected.
    pub fn with_capacity(self, limit: usize) -> Self {
        Self(self.0.with_capacity(limit))
    }

    /// Empty the cache once the output held back in its states reaches
    /// `bytes`.
    pub fn with_pending_limit(self, bytes: usize) -> Self {
        Self(self.0.with_pending_limit(bytes))
    }

    pub fn stats(&self) -> Stats {
        self.0.stats()
    }

    /// Transduce the whole of `input`. Gives the same result as
    /// [`Backtracker::run`](crate::Backtracker::run) whenever the backtracker
    /// finishes within its step limit.
    pub fn run(&mut self, input: &[u8]) -> Option<Vec<u8>> {
        let dt = &mut self.0;
        let mut out = Vec::new();
        let mut current = dt.start(&mut out);
        for &byte in input {
            current = dt.advance(current, byte, &mut out)?;
        }
        let state = &dt.states[current.0];
        let accept = state.accept?;
        out.extend_from_slice(&state.threads[accept].pending);
        Some(out)
    }
}

/// Leftmost-first prefix matching through lazily built DT states. Threads
/// ranked below a completed match are dropped, so these states cannot answer
/// whole-input queries.
#[derive(Debug)]
pub struct PrefixCache<'g>(Automaton<'g>);

impl<'g> PrefixCache<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self(Automaton::new(graph, Kind::Prefix))
    }

    /// See [`DftCache::with_capacity`].
    pub fn with_capacity(self, limit: usize) -> Self {
        Self(self.0.with_capacity(limit))
    }

    /// See [`DftCache::with_pending_limit`].
    pub fn with_pending_limit(self, bytes: usize) -> Self {
        Self(self.0.with_pending_limit(bytes))
    }

    pub fn stats(&self) -> Stats {
        self.0.stats()
    }

    /// Transduce the highest-priority prefix of `input` that reaches the
    /// accept state, as [`Backtracker::run_prefix`](crate::Backtracker::run_prefix)
    /// does. Returns the number of bytes consumed and the output.
    pub fn run_prefix(&mut self, input: &[u8]) -> Option<(usize, Vec<u8>)> {
        let dt = &mut self.0;
        let mut out = Vec::new();
        let mut current = dt.start(&mut out);
        let mut best = dt.completed(current, 0, &out);
        for (pos, &byte) in input.iter().enumerate() {
            let Some(next) = dt.advance(current, byte, &mut out) else {
                break;
            };
            current = next;
            // Survivors all outrank any earlier match.
            if let Some(found) = dt.completed(current, pos + 1, &out) {
                best = Some(found);
            }
        }
        best
    }
}

#[derive(Debug)]
struct Automaton<'g> {
    graph: &'g Graph,
    kind: Kind,
    capacity: usize,
    pending_limit: usize,
    /// Bytes of pending output across all held states.
    pending_bytes: usize,
    states: Vec<DtState>,
    index: HashMap<Vec<Thread>, DtId>,
    /// Initial DT state and the output emitted before reading anything.
    start: Option<(DtId, Vec<u8>)>,
    stats: Stats,
}

impl<'g> Automaton<'g> {
    fn new(graph: &'g Graph, kind: Kind) -> Self {
        Self {
            graph,
            kind,
            capacity: DEFAULT_CAPACITY,
            pending_limit: DEFAULT_PENDING_LIMIT,
            pending_bytes: 0,
            states: Vec::new(),
            index: HashMap::new(),
            start: None,
            stats: Stats::default(),
        }
    }

    fn with_capacity(mut self, limit: usize) -> Self {
        self.capacity = limit.max(2);
        self
    }

    fn with_pending_limit(mut self, bytes: usize) -> Self {
        self.pending_limit = bytes;
        self
    }

    fn stats(&self) -> Stats {
        Stats {
            states: self.states.len(),
            pending_bytes: self.pending_bytes,
            ..self.stats
        }
    }

    fn completed(&self, id: DtId, consumed: usize, out: &[u8]) -> Option<(usize, Vec<u8>)> {
        let state = &self.states[id.0];
        let accept = state.accept?;
        Some((consumed, [out, state.threads[accept].pending.as_slice()].concat()))
    }

    fn start(&mut self, out: &mut Vec<u8>) -> DtId {
        let (id, chunk) = match self.start.take() {
            Some(start) => start,
            None => self.seed(),
        };
        out.extend_from_slice(&chunk);
        self.start = Some((id, chunk));
        id
    }

    fn seed(&mut self) -> (DtId, Vec<u8>) {
        let mut threads = Vec::new();
        self.close(self.graph.root(), Vec::new(), &mut threads);
        let (threads, chunk) = self.settle(threads);
        (self.intern(threads), chunk)
    }

    /// Follow `byte` out of `from`, appending the emitted chunk to `out`.
    fn advance(&mut self, from: DtId, byte: u8, out: &mut Vec<u8>) -> Option<DtId> {
        if let Some(transition) = self.states[from.0].next.get(&byte) {
            self.stats.hits += 1;
            return match transition {
                Transition::Dead => None,
                Transition::To { next, chunk } => {
                    out.extend_from_slice(chunk);
                    Some(*next)
                }
            };
        }

        self.stats.misses += 1;
        let mut threads = Vec::new();
        let seeds: Vec<(StateId, Vec<u8>)> = self.states[from.0]
            .threads
            .iter()
            .filter_map(|thread| match *self.graph.state(thread.state) {
                State::Consume { symbol, next } if symbol == byte => {
                    Some((next, thread.pending.clone()))
                }
                _ => None,
            })
            .collect();
        for (state, pending) in seeds {
            self.close(state, pending, &mut threads);
        }
        let threads: Vec<Thread> = threads.into_iter().unique_by(|t| t.state).collect();

        if threads.is_empty() {
            trace!("{from:?} --{byte:#04x}--> dead");
            self.states[from.0].next.insert(byte, Transition::Dead);
            return None;
        }

        let (threads, chunk) = self.settle(threads);
        let cleared = !self.index.contains_key(&threads) && self.make_room();
        let next = self.intern(threads);
        trace!("{from:?} --{byte:#04x}--> {next:?} emitting {chunk:?}");
        out.extend_from_slice(&chunk);
        // After a clear `from` no longer exists.
        if !cleared {
            self.states[from.0]
                .next
                .insert(byte, Transition::To { next, chunk });
        }
        Some(next)
    }

    /// Append the threads reachable from `state` without consuming input,
    /// in priority order. The first path to reach a state wins.
    fn close(&mut self, state: StateId, pending: Vec<u8>, threads: &mut Vec<Thread>) {
        self.stats.closures += 1;
        let mut visited = HashSet::new();
        let mut stack = vec![(state, pending)];
        while let Some((id, mut pending)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            match *self.graph.state(id) {
                State::Consume { .. } | State::Accept => {
                    threads.push(Thread { state: id, pending });
                }
                State::Produce { symbol, next } => {
                    pending.push(symbol);
                    stack.push((next, pending));
                }
                State::Split { primary, secondary } => {
                    stack.push((secondary, pending.clone()));
                    stack.push((primary, pending));
                }
                State::Join { next } => stack.push((next, pending)),
            }
        }
    }

    /// Drop what a prefix cache can never prefer, then split off the output
    /// every thread agrees on.
    fn settle(&self, mut threads: Vec<Thread>) -> (Vec<Thread>, Vec<u8>) {
        if self.kind == Kind::Prefix
            && let Some(accept) = self.first_accept(&threads)
        {
            threads.truncate(accept + 1);
        }
        let shared = common_prefix_len(&threads);
        let chunk = threads
            .first()
            .map(|t| t.pending[..shared].to_vec())
            .unwrap_or_default();
        for thread in &mut threads {
            thread.pending.drain(..shared);
        }
        (threads, chunk)
    }

    fn first_accept(&self, threads: &[Thread]) -> Option<usize> {
        threads
            .iter()
            .position(|t| matches!(self.graph.state(t.state), State::Accept))
    }

    fn intern(&mut self, threads: Vec<Thread>) -> DtId {
        if let Some(&id) = self.index.get(&threads) {
            return id;
        }
        let id = DtId(self.states.len());
        debug!(
            "new DT state {} with threads [{}]",
            id.0,
            threads
                .iter()
                .format_with(", ", |t, f| f(&format_args!("{}", t.state.index())))
        );
        let accept = self.first_accept(&threads);
        self.pending_bytes += threads.iter().map(|t| t.pending.len()).sum::<usize>();
        self.index.insert(threads.clone(), id);
        self.states.push(DtState {
            accept,
            threads,
            next: HashMap::new(),
        });
        id
    }

    /// Empty the cache if it holds too many states or too much pending
    /// output, and seed a fresh start state. Returns whether anything was
    /// dropped.
    fn make_room(&mut self) -> bool {
        if self.states.len() < self.capacity && self.pending_bytes < self.pending_limit {
            return false;
        }
        debug!(
            "DT cache holds {} states and {} pending bytes; clearing ({} so far)",
            self.states.len(),
            self.pending_bytes,
            self.stats.clears
        );
        self.states.clear();
        self.index.clear();
        self.pending_bytes = 0;
        self.stats.clears += 1;
        self.start = Some(self.seed());
        true
    }
}

fn common_prefix_len(threads: &[Thread]) -> usize {
    let Some((first, rest)) = threads.split_first() else {
        return 0;
    };
    rest.iter().fold(first.pending.len(), |len, t| {
        first.pending[..len]
            .iter()
            .zip(&t.pending)
            .take_while(|(a, b)| a == b)
            .count()
    })
}
