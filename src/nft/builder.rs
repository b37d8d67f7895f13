//! Thompson-style construction of a [`Graph`] from an [`Ast`].

use itertools::Either;

use crate::pattern::{Ast, SyntaxError};

use super::{Graph, State, StateId};

/// Upper bound on the number of states a single pattern may compile to.
pub const STATE_LIMIT: usize = 1_000_000;

/// Which side of the relation literals contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Match the symbol and echo it.
    Both,
    /// Left of `:`.
    ConsumeOnly,
    /// Right of `:`.
    ProduceOnly,
}

/// Entry and exit of a partially built sub-graph. The tail's successor is
/// still unset.
#[derive(Debug, Clone, Copy)]
struct Fragment {
    head: StateId,
    tail: StateId,
}

pub(super) fn build(ast: &Ast) -> Result<Graph, SyntaxError> {
    let mut builder = Builder { states: Vec::new() };
    let body = builder.fragment(ast, Mode::Both, false)?;
    let accept = builder.push(State::Accept);
    builder.link(body.tail, accept);
    debug_assert!(
        builder.states.iter().all(|s| !has_dangling(s)),
        "unresolved successor after build"
    );
    Ok(Graph {
        states: builder.states,
        root: body.head,
    })
}

fn has_dangling(state: &State) -> bool {
    match state {
        State::Consume { next, .. } | State::Produce { next, .. } | State::Join { next } => {
            *next == StateId::DANGLING
        }
        State::Split { primary, secondary } => {
            *primary == StateId::DANGLING || *secondary == StateId::DANGLING
        }
        State::Accept => false,
    }
}

struct Builder {
    states: Vec<State>,
}

impl Builder {
    fn push(&mut self, state: State) -> StateId {
        self.states.push(state);
        StateId(self.states.len() - 1)
    }

    fn join(&mut self) -> StateId {
        self.push(State::Join {
            next: StateId::DANGLING,
        })
    }

    /// Point the unset successor of `from` at `to`. For a loop split that is
    /// its exit branch.
    fn link(&mut self, from: StateId, to: StateId) {
        match &mut self.states[from.0] {
            State::Consume { next, .. } | State::Produce { next, .. } | State::Join { next } => {
                *next = to;
            }
            State::Split { primary, secondary } => {
                if *primary == StateId::DANGLING {
                    *primary = to;
                } else {
                    debug_assert_eq!(*secondary, StateId::DANGLING, "split linked twice");
                    *secondary = to;
                }
            }
            State::Accept => {}
        }
    }

    fn fragment(&mut self, ast: &Ast, mode: Mode, greedy: bool) -> Result<Fragment, SyntaxError> {
        match ast {
            Ast::Literal(c) => Ok(self.literal(*c, mode)),
            Ast::AnyChar => Ok(self.byte_range(u8::MIN, u8::MAX, mode)),
            Ast::Empty => {
                let join = self.join();
                Ok(Fragment {
                    head: join,
                    tail: join,
                })
            }
            Ast::Concat(l, r) => {
                let l = self.fragment(l, mode, false)?;
                let r = self.fragment(r, mode, false)?;
                self.link(l.tail, r.head);
                Ok(Fragment {
                    head: l.head,
                    tail: r.tail,
                })
            }
            Ast::Alternate(l, r) => {
                let l = self.fragment(l, mode, false)?;
                let r = self.fragment(r, mode, false)?;
                Ok(self.any_of(&[l, r]))
            }
            Ast::Range(l, r) => self.range(l, r, mode),
            Ast::Transduce(l, r) => {
                let l = self.fragment(l, Mode::ConsumeOnly, false)?;
                let r = self.fragment(r, Mode::ProduceOnly, false)?;
                self.link(l.tail, r.head);
                Ok(Fragment {
                    head: l.head,
                    tail: r.tail,
                })
            }
            Ast::Star(body) => self.star(body, mode, greedy),
            Ast::Plus(body) => {
                let body = self.fragment(body, mode, false)?;
                let split = self.choice(body.head, StateId::DANGLING, greedy);
                self.link(body.tail, split);
                Ok(Fragment {
                    head: body.head,
                    tail: split,
                })
            }
            Ast::Optional(body) => {
                let body = self.fragment(body, mode, false)?;
                let join = self.join();
                let split = self.choice(body.head, join, greedy);
                self.link(body.tail, join);
                Ok(Fragment {
                    head: split,
                    tail: join,
                })
            }
            Ast::Repeat { body, min, max } => self.repeat(body, *min, *max, mode, greedy),
            Ast::Greedy(inner) => self.fragment(inner, mode, true),
        }
    }

    /// A split that prefers `body` when greedy and `skip` otherwise.
    fn choice(&mut self, body: StateId, skip: StateId, greedy: bool) -> StateId {
        let (primary, secondary) = if greedy { (body, skip) } else { (skip, body) };
        self.push(State::Split { primary, secondary })
    }

    /// Loop split; head and tail of the construct. The exit is set when the
    /// tail is linked.
    fn star(&mut self, body: &Ast, mode: Mode, greedy: bool) -> Result<Fragment, SyntaxError> {
        let body = self.fragment(body, mode, false)?;
        let split = self.choice(body.head, StateId::DANGLING, greedy);
        self.link(body.tail, split);
        Ok(Fragment {
            head: split,
            tail: split,
        })
    }

    fn repeat(
        &mut self,
        body: &Ast,
        min: usize,
        max: Option<usize>,
        mode: Mode,
        greedy: bool,
    ) -> Result<Fragment, SyntaxError> {
        let head = self.join();
        let mut tail = head;

        for _ in 0..min {
            let copy = self.bounded_fragment(body, mode)?;
            self.link(tail, copy.head);
            tail = copy.tail;
        }

        match max {
            None => {
                let rest = self.star(body, mode, greedy)?;
                self.link(tail, rest.head);
                tail = rest.tail;
            }
            Some(max) => {
                // Once a copy is skipped the rest are skipped too.
                let exit = self.join();
                for _ in min..max {
                    let copy = self.bounded_fragment(body, mode)?;
                    let split = self.choice(copy.head, exit, greedy);
                    self.link(tail, split);
                    tail = copy.tail;
                }
                self.link(tail, exit);
                tail = exit;
            }
        }
        Ok(Fragment { head, tail })
    }

    fn bounded_fragment(&mut self, body: &Ast, mode: Mode) -> Result<Fragment, SyntaxError> {
        if self.states.len() > STATE_LIMIT {
            return Err(SyntaxError::TooLarge { limit: STATE_LIMIT });
        }
        self.fragment(body, mode, false)
    }

    /// Alternatives in priority order, converging on one join.
    fn any_of(&mut self, alternatives: &[Fragment]) -> Fragment {
        let join = self.join();
        for alt in alternatives {
            self.link(alt.tail, join);
        }
        let mut rest = alternatives.iter().rev();
        let mut head = rest.next().map_or(join, |last| last.head);
        for alt in rest {
            head = self.push(State::Split {
                primary: alt.head,
                secondary: head,
            });
        }
        Fragment { head, tail: join }
    }

    fn literal(&mut self, c: char, mode: Mode) -> Fragment {
        let mut buf = [0; 4];
        let bytes = c.encode_utf8(&mut buf).as_bytes();
        let mut frag = self.symbol(bytes[0], mode);
        for &b in &bytes[1..] {
            let next = self.symbol(b, mode);
            self.link(frag.tail, next.head);
            frag.tail = next.tail;
        }
        frag
    }

    fn symbol(&mut self, symbol: u8, mode: Mode) -> Fragment {
        match mode {
            Mode::Both => {
                let produce = self.push(State::Produce {
                    symbol,
                    next: StateId::DANGLING,
                });
                let consume = self.push(State::Consume {
                    symbol,
                    next: produce,
                });
                Fragment {
                    head: consume,
                    tail: produce,
                }
            }
            Mode::ConsumeOnly => {
                let s = self.push(State::Consume {
                    symbol,
                    next: StateId::DANGLING,
                });
                Fragment { head: s, tail: s }
            }
            Mode::ProduceOnly => {
                let s = self.push(State::Produce {
                    symbol,
                    next: StateId::DANGLING,
                });
                Fragment { head: s, tail: s }
            }
        }
    }

    fn byte_range(&mut self, lo: u8, hi: u8, mode: Mode) -> Fragment {
        let symbols: Vec<Fragment> = (lo..=hi).map(|b| self.symbol(b, mode)).collect();
        self.any_of(&symbols)
    }

    fn range(&mut self, l: &Ast, r: &Ast, mode: Mode) -> Result<Fragment, SyntaxError> {
        match (l, r) {
            (Ast::Literal(_), Ast::Literal(_)) => {
                let (a, b) = (endpoint(l)?, endpoint(r)?);
                Ok(self.byte_range(a.min(b), a.max(b), mode))
            }
            (Ast::Transduce(l_in, l_out), Ast::Transduce(r_in, r_out)) => {
                let (from_in, to_in) = (endpoint(l_in)?, endpoint(r_in)?);
                let (from_out, to_out) = (endpoint(l_out)?, endpoint(r_out)?);
                if from_in.abs_diff(to_in) != from_out.abs_diff(to_out) {
                    return Err(SyntaxError::InvalidRange(
                        "linked ranges must have the same length",
                    ));
                }
                let mut pairs = Vec::new();
                for (i, o) in walk(from_in, to_in).zip(walk(from_out, to_out)) {
                    let consume = self.symbol(i, Mode::ConsumeOnly);
                    let produce = self.symbol(o, Mode::ProduceOnly);
                    self.link(consume.tail, produce.head);
                    pairs.push(Fragment {
                        head: consume.head,
                        tail: produce.tail,
                    });
                }
                Ok(self.any_of(&pairs))
            }
            _ => Err(SyntaxError::InvalidRange(
                "endpoints must both be characters or both be character pairs",
            )),
        }
    }
}

/// A range endpoint: a single ASCII literal.
fn endpoint(ast: &Ast) -> Result<u8, SyntaxError> {
    match ast {
        Ast::Literal(c) if c.is_ascii() => Ok(*c as u8),
        Ast::Literal(_) => Err(SyntaxError::InvalidRange("endpoints must be ASCII")),
        _ => Err(SyntaxError::InvalidRange(
            "endpoints must both be characters or both be character pairs",
        )),
    }
}

/// Every byte from `from` to `to` inclusive, in either direction.
fn walk(from: u8, to: u8) -> impl Iterator<Item = u8> {
    if from <= to {
        Either::Left(from..=to)
    } else {
        Either::Right((to..=from).rev())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::parse;

    fn graph(pattern: &str) -> Graph {
        Graph::build(&parse(pattern).unwrap()).unwrap()
    }

    fn build_err(pattern: &str) -> SyntaxError {
        Graph::build(&parse(pattern).unwrap()).expect_err("build should fail")
    }

    /// Follow single-successor states from `id`, collecting consumed and
    /// produced bytes, until a split or accept.
    fn straight_line(g: &Graph, mut id: StateId) -> (Vec<u8>, Vec<u8>, StateId) {
        let (mut consumed, mut produced) = (Vec::new(), Vec::new());
        loop {
            match g.state(id) {
                State::Consume { symbol, next } => {
                    consumed.push(*symbol);
                    id = *next;
                }
                State::Produce { symbol, next } => {
                    produced.push(*symbol);
                    id = *next;
                }
                State::Join { next } => id = *next,
                State::Split { .. } | State::Accept => return (consumed, produced, id),
            }
        }
    }

    #[test]
    fn literal_consumes_then_echoes() {
        let g = graph("a");
        assert_eq!(
            g.state(g.root()),
            &State::Consume {
                symbol: b'a',
                next: StateId(0)
            }
        );
        let (c, p, end) = straight_line(&g, g.root());
        assert_eq!((c.as_slice(), p.as_slice()), (&b"a"[..], &b"a"[..]));
        assert_eq!(g.state(end), &State::Accept);
    }

    #[test]
    fn transduce_separates_sides() {
        let g = graph("(ab):(xyz)");
        let (c, p, end) = straight_line(&g, g.root());
        assert_eq!(c, b"ab");
        assert_eq!(p, b"xyz");
        assert_eq!(g.state(end), &State::Accept);
    }

    #[test]
    fn transduce_takes_single_operands() {
        let g = graph("ab:xyz");
        let (c, p, end) = straight_line(&g, g.root());
        assert_eq!(c, b"abyz");
        assert_eq!(p, b"axyz");
        assert_eq!(g.state(end), &State::Accept);
    }

    #[test]
    fn multibyte_literal_is_a_byte_chain() {
        let g = graph("é:e");
        let (c, p, _) = straight_line(&g, g.root());
        assert_eq!(c, "é".as_bytes());
        assert_eq!(p, b"e");
    }

    #[test]
    fn greedy_star_prefers_body() {
        let g = graph("a*");
        match g.state(g.root()) {
            State::Split { primary, secondary } => {
                assert!(matches!(g.state(*primary), State::Consume { symbol: b'a', .. }));
                assert_eq!(g.state(*secondary), &State::Accept);
            }
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn lazy_star_prefers_exit() {
        let g = graph("a*?");
        match g.state(g.root()) {
            State::Split { primary, secondary } => {
                assert_eq!(g.state(*primary), &State::Accept);
                assert!(matches!(g.state(*secondary), State::Consume { symbol: b'a', .. }));
            }
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn star_body_loops_back_to_split() {
        let g = graph("a*");
        let root = g.root();
        let State::Split { primary, .. } = g.state(root) else {
            panic!("expected split");
        };
        let (_, _, back) = straight_line(&g, *primary);
        assert_eq!(back, root);
    }

    #[test]
    fn alternation_prefers_left() {
        let g = graph("a|b");
        let State::Split { primary, secondary } = g.state(g.root()) else {
            panic!("expected split");
        };
        assert!(matches!(g.state(*primary), State::Consume { symbol: b'a', .. }));
        assert!(matches!(g.state(*secondary), State::Consume { symbol: b'b', .. }));
    }

    #[test]
    fn range_is_direction_independent() {
        let up = graph("[a-c]");
        let down = graph("[c-a]");
        assert_eq!(up.len(), down.len());
        assert_eq!(up.state(up.root()), down.state(down.root()));
    }

    #[test]
    fn any_char_covers_every_byte() {
        let g = graph(".");
        let consumes = (0..g.len())
            .filter(|&i| matches!(g.state(StateId(i)), State::Consume { .. }))
            .count();
        assert_eq!(consumes, 256);
    }

    #[test]
    fn bounded_repeat_state_count() {
        // Join + 2 mandatory + exit join + 2 optional copies with their splits + accept.
        let g = graph("a{2,4}");
        assert_eq!(g.len(), 1 + 2 * 2 + 1 + 2 * 3 + 1);
    }

    #[test]
    fn every_successor_is_resolved() {
        for pattern in ["a*", "a+?", "(a|b)*c", "a{2,}", "a{1,3}?", "[a:A-z:Z]*", ":x", "a:"] {
            let g = graph(pattern);
            for i in 0..g.len() {
                assert!(!has_dangling(g.state(StateId(i))), "{pattern}: state {i}");
            }
        }
    }

    #[test]
    fn mixed_range_is_rejected() {
        assert!(matches!(build_err("[a-b:c]"), SyntaxError::InvalidRange(_)));
    }

    #[test]
    fn linked_ranges_must_match_in_length() {
        assert!(matches!(build_err("[a:A-c:Z]"), SyntaxError::InvalidRange(_)));
    }

    #[test]
    fn non_ascii_range_is_rejected() {
        assert!(matches!(build_err("[a-é]"), SyntaxError::InvalidRange(_)));
    }

    #[test]
    fn range_over_compound_pair_is_rejected() {
        let ast = Ast::range(
            Ast::transduce(Ast::concat(Ast::Literal('a'), Ast::Literal('b')), Ast::Literal('x')),
            Ast::transduce(Ast::Literal('c'), Ast::Literal('z')),
        );
        assert!(matches!(Graph::build(&ast), Err(SyntaxError::InvalidRange(_))));
    }

    #[test]
    fn huge_repeat_hits_state_limit() {
        assert!(matches!(
            build_err(".{100000}"),
            SyntaxError::TooLarge { .. }
        ));
    }
}
