//! Find-and-replace over a line with prefix matches.

use crate::engine::Matcher;

/// Rewrite `line` by repeatedly matching at the current position.
///
/// A non-empty match emits its output and skips the bytes it consumed. An
/// empty match emits its output and then copies one byte, as does a failed
/// match without the output. Once the line is used up the empty remainder is
/// tried once more, so insertions at the end of the line happen.
pub fn scan<M: Matcher + ?Sized>(matcher: &mut M, line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len());
    let mut pos = 0;
    while pos < line.len() {
        match matcher.transduce_prefix(&line[pos..]) {
            Some((consumed, output)) if consumed > 0 => {
                out.extend_from_slice(&output);
                pos += consumed;
                continue;
            }
            Some((_, output)) => out.extend_from_slice(&output),
            None => {}
        }
        out.push(line[pos]);
        pos += 1;
    }
    if let Some((_, output)) = matcher.transduce_prefix(&[]) {
        out.extend_from_slice(&output);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtrack::Backtracker;
    use crate::engine::Cached;
    use crate::nft::Graph;
    use crate::pattern::parse;

    /// Scan `line` with both matchers, check they agree and return the result.
    fn scanned(pattern: &str, line: &str) -> String {
        let g = Graph::build(&parse(pattern).unwrap()).unwrap();
        let by_backtracking = scan(&mut Backtracker::new(&g), line.as_bytes());
        let by_cache = scan(&mut Cached::new(&g), line.as_bytes());
        assert_eq!(by_backtracking, by_cache, "{pattern} over {line:?}");
        String::from_utf8(by_cache).unwrap()
    }

    #[test]
    fn replaces_words() {
        assert_eq!(scanned("(cat):(dog)", "a cat sat"), "a dog sat");
        assert_eq!(scanned("(cat):(dog)", "catcat"), "dogdog");
        assert_eq!(scanned("(cat):(dog)", "no match"), "no match");
        assert_eq!(scanned("cat:dog", "a catog"), "a cadog");
    }

    #[test]
    fn insertion_happens_between_every_byte() {
        assert_eq!(scanned(":x", "ab"), "xaxbx");
        assert_eq!(scanned(":x", ""), "x");
    }

    #[test]
    fn deletion_removes_runs() {
        assert_eq!(scanned("(a:)+", "baaab"), "bb");
        assert_eq!(scanned("(a:)*", "baaab"), "bb");
    }

    #[test]
    fn linked_range_maps_each_run() {
        assert_eq!(scanned("[a:A-z:Z]+", "hi there"), "HI THERE");
    }

    #[test]
    fn greedy_and_lazy_matches_differ() {
        assert_eq!(scanned("(a:x)+", "aaa"), "xxx");
        assert_eq!(scanned("(a:x)+?", "aaa"), "xxx");
        assert_eq!(scanned("a+:x", "aaa"), "x");
        assert_eq!(scanned("a+?:x", "aaa"), "xxx");
    }

    #[test]
    fn empty_loop_pattern_finishes() {
        assert_eq!(scanned("(a*)*:x", "ba"), "xbxx");
    }

    #[test]
    fn empty_line_without_empty_match() {
        assert_eq!(scanned("a", ""), "");
    }

    #[test]
    fn multibyte_input_is_copied_intact() {
        assert_eq!(scanned("e:E", "né e"), "né E");
    }
}
