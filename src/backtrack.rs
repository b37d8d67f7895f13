//! Backtracking executor: depth-first search over a [`Graph`] in split
//! priority order.
//!
//! The search keeps an explicit stack of frames instead of recursing, and a
//! single output buffer that is truncated back to a frame's length when the
//! frame is resumed. A path that comes back to a split at the input position
//! it last entered it from has consumed nothing in between and is abandoned,
//! so loops over empty bodies terminate.

use log::warn;

use crate::nft::{Graph, State, StateId};

/// Default maximum number of states visited per query.
pub const DEFAULT_STEP_LIMIT: usize = 10_000_000;

/// Counters for the most recent query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// States visited.
    pub steps: usize,
    /// Frames pushed at splits.
    pub frames: usize,
    /// Frames popped after a failed path.
    pub backtracks: usize,
}

/// Marks a split not yet entered on the current path.
const NOT_ENTERED: usize = usize::MAX;

/// A point to resume the search from.
#[derive(Debug, Clone, Copy)]
struct Frame {
    state: StateId,
    pos: usize,
    out_len: usize,
    /// Length of the split-entry undo log at this point.
    undo_len: usize,
}

/// Runs one graph against any number of inputs, one query at a time.
#[derive(Debug)]
pub struct Backtracker<'g> {
    graph: &'g Graph,
    step_limit: usize,
    stats: Stats,
}

impl<'g> Backtracker<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            step_limit: DEFAULT_STEP_LIMIT,
            stats: Stats::default(),
        }
    }

    /// Give up on a query after visiting `limit` states. Reaching the limit
    /// is reported as no match.
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Transduce the whole of `input`; the first accepted path wins.
    pub fn run(&mut self, input: &[u8]) -> Option<Vec<u8>> {
        self.outputs(input).next()
    }

    /// Every output for the whole of `input`, in priority order. Paths that
    /// go round a loop without consuming input are not repeated, so
    /// `(:x)*` yields only the empty output.
    pub fn outputs<'a>(&'a mut self, input: &'a [u8]) -> Outputs<'a> {
        self.search(input, true)
    }

    /// Transduce the highest-priority prefix of `input` that reaches the
    /// accept state. Returns the number of bytes consumed and the output.
    pub fn run_prefix(&mut self, input: &[u8]) -> Option<(usize, Vec<u8>)> {
        self.search(input, false).next_match()
    }

    fn search<'a>(&'a mut self, input: &'a [u8], anchored: bool) -> Outputs<'a> {
        self.stats = Stats::default();
        Outputs {
            graph: self.graph,
            input,
            anchored,
            step_limit: self.step_limit,
            stats: &mut self.stats,
            start: Some(Frame {
                state: self.graph.root(),
                pos: 0,
                out_len: 0,
                undo_len: 0,
            }),
            stack: Vec::new(),
            out: Vec::new(),
            entered: vec![NOT_ENTERED; self.graph.len()],
            undo: Vec::new(),
        }
    }
}

/// Iterator over accepted outputs, see [`Backtracker::outputs`].
#[derive(Debug)]
pub struct Outputs<'a> {
    graph: &'a Graph,
    input: &'a [u8],
    /// Accept only at end of input.
    anchored: bool,
    step_limit: usize,
    stats: &'a mut Stats,
    start: Option<Frame>,
    stack: Vec<Frame>,
    out: Vec<u8>,
    /// Input position each split was last entered at on the current path,
    /// indexed by state.
    entered: Vec<usize>,
    /// Previous `entered` values, restored when a frame is resumed.
    undo: Vec<(StateId, usize)>,
}

impl Outputs<'_> {
    fn resume(&mut self) -> Option<Frame> {
        if let Some(frame) = self.start.take() {
            return Some(frame);
        }
        let frame = self.stack.pop()?;
        self.stats.backtracks += 1;
        Some(frame)
    }

    /// Continue the search up to the next accepted path.
    fn next_match(&mut self) -> Option<(usize, Vec<u8>)> {
        while let Some(Frame {
            mut state,
            mut pos,
            out_len,
            undo_len,
        }) = self.resume()
        {
            self.out.truncate(out_len);
            for (split, last) in self.undo.drain(undo_len..).rev() {
                self.entered[split.index()] = last;
            }
            loop {
                self.stats.steps += 1;
                if self.stats.steps > self.step_limit {
                    warn!(
                        "step limit of {} reached after {} backtracks; giving up",
                        self.step_limit, self.stats.backtracks
                    );
                    self.stack.clear();
                    return None;
                }
                match *self.graph.state(state) {
                    State::Consume { symbol, next } => {
                        if self.input.get(pos) != Some(&symbol) {
                            break;
                        }
                        pos += 1;
                        state = next;
                    }
                    State::Produce { symbol, next } => {
                        self.out.push(symbol);
                        state = next;
                    }
                    State::Split { primary, secondary } => {
                        let last = self.entered[state.index()];
                        if last == pos {
                            break;
                        }
                        self.undo.push((state, last));
                        self.entered[state.index()] = pos;
                        self.stack.push(Frame {
                            state: secondary,
                            pos,
                            out_len: self.out.len(),
                            undo_len: self.undo.len(),
                        });
                        self.stats.frames += 1;
                        state = primary;
                    }
                    State::Join { next } => state = next,
                    State::Accept => {
                        if !self.anchored || pos == self.input.len() {
                            return Some((pos, self.out.clone()));
                        }
                        break;
                    }
                }
            }
        }
        None
    }
}

impl Iterator for Outputs<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        self.next_match().map(|(_, out)| out)
    }
}
