/// Prefix trie for longest-prefix dictionary matching over address text.
use std::collections::BTreeMap;

use crate::CharSequence;

/// A prefix tree keyed by normalized characters, carrying zero or more
/// payloads per node.
///
/// Several payloads may share a key (homonymous towns in different wards).
/// The wildcard character is never stored as an edge: it is chosen by the
/// caller at search time and expands to every child of the current node.
///
/// Children are kept in a `BTreeMap` so that search results come back in the
/// same order for the same trie contents.
///
/// # Example
/// ```
/// use jpaddr_core::{CharSequence, TrieMatcher};
///
/// let mut trie = TrieMatcher::new();
/// trie.append("東京都", 13);
/// trie.append("京都府", 26);
///
/// let target = CharSequence::from_string("東京都千代田区");
/// let found = trie.find(&target, None, &[], false);
/// assert_eq!(found.len(), 1);
/// assert_eq!(*found[0].value, 13);
/// assert_eq!(found[0].depth, 3);
/// assert_eq!(found[0].unmatched.to_normalized_string(), "千代田区");
/// ```
#[derive(Debug, Clone)]
pub struct TrieMatcher<T> {
    nodes: Vec<Node<T>>,
    keys: usize,
}

#[derive(Debug, Clone)]
struct Node<T> {
    children: BTreeMap<char, usize>,
    values: Vec<T>,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            children: BTreeMap::new(),
            values: Vec::new(),
        }
    }
}

/// One candidate returned by `TrieMatcher::find`.
#[derive(Debug, Clone)]
pub struct TrieMatch<'a, T> {
    pub value: &'a T,
    /// Non-ignored input characters consumed by the match.
    pub depth: usize,
    /// Input left after the match.
    pub unmatched: CharSequence,
    /// True when at least one wildcard was resolved on the way.
    pub ambiguous: bool,
    /// Number of wildcards resolved on the way.
    pub ambiguous_cnt: usize,
    /// Suffix character supplied by the search rather than the input.
    pub challenge: Option<char>,
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    node: usize,
    depth: usize,
    fuzzy: usize,
    challenge: Option<char>,
}

impl<T> TrieMatcher<T> {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new()],
            keys: 0,
        }
    }

    /// Insert `value` under `key`. Empty keys are ignored.
    pub fn append(&mut self, key: &str, value: T) {
        if key.is_empty() {
            return;
        }
        let mut node = 0;
        for ch in key.chars() {
            node = match self.nodes[node].children.get(&ch) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::new());
                    self.nodes[node].children.insert(ch, child);
                    child
                }
            };
        }
        if self.nodes[node].values.is_empty() {
            self.keys += 1;
        }
        self.nodes[node].values.push(value);
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }

    /// Payloads stored under exactly `key`.
    pub fn get(&self, key: &str) -> &[T] {
        let mut node = 0;
        for ch in key.chars() {
            match self.nodes[node].children.get(&ch) {
                Some(&child) => node = child,
                None => return &[],
            }
        }
        &self.nodes[node].values
    }

    /// Longest-prefix search of `target` against the trie.
    ///
    /// - `fuzzy_char`: an input character equal to it matches any single key
    ///   character; every child is tried and the branch counts as ambiguous.
    /// - `extra_challenges`: when a walk stops on a non-terminal node, each of
    ///   these characters is tried as the next key character. A terminal child
    ///   reached that way is a match (e.g. `東京` → `東京都`).
    /// - `partial_matches`: when a walk stops before any terminal and the
    ///   node continues along a single unbranched path to a terminal, that
    ///   terminal is a match.
    ///
    /// Each walk branch yields at most one hit; a hit yields one candidate per
    /// payload. An empty result means no match. Ranking is left to the caller.
    pub fn find(
        &self,
        target: &CharSequence,
        fuzzy_char: Option<char>,
        extra_challenges: &[char],
        partial_matches: bool,
    ) -> Vec<TrieMatch<'_, T>> {
        let chars: Vec<char> = target.chars().collect();
        let mut hits = Vec::new();
        self.walk(
            0,
            0,
            0,
            None,
            &chars,
            fuzzy_char,
            extra_challenges,
            partial_matches,
            &mut hits,
        );

        // Wildcard branches that die past the same terminal report it once.
        let mut seen: Vec<(usize, usize, Option<char>)> = Vec::with_capacity(hits.len());
        hits.retain(|h| {
            let key = (h.node, h.depth, h.challenge);
            if seen.contains(&key) {
                return false;
            }
            seen.push(key);
            true
        });

        let mut out = Vec::new();
        for hit in hits {
            let (_, unmatched) = target.consume(hit.depth);
            for value in &self.nodes[hit.node].values {
                out.push(TrieMatch {
                    value,
                    depth: hit.depth,
                    unmatched: unmatched.clone(),
                    ambiguous: hit.fuzzy > 0,
                    ambiguous_cnt: hit.fuzzy,
                    challenge: hit.challenge,
                });
            }
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        node: usize,
        pos: usize,
        fuzzy: usize,
        last: Option<Hit>,
        chars: &[char],
        fuzzy_char: Option<char>,
        extra_challenges: &[char],
        partial_matches: bool,
        hits: &mut Vec<Hit>,
    ) {
        let current = &self.nodes[node];
        let mut last = last;
        if node != 0 && !current.values.is_empty() {
            last = Some(Hit {
                node,
                depth: pos,
                fuzzy,
                challenge: None,
            });
        }

        if let Some(&ch) = chars.get(pos) {
            if Some(ch) == fuzzy_char && !current.children.is_empty() {
                for &child in current.children.values() {
                    self.walk(
                        child,
                        pos + 1,
                        fuzzy + 1,
                        last,
                        chars,
                        fuzzy_char,
                        extra_challenges,
                        partial_matches,
                        hits,
                    );
                }
                return;
            }
            if let Some(&child) = current.children.get(&ch) {
                self.walk(
                    child,
                    pos + 1,
                    fuzzy,
                    last,
                    chars,
                    fuzzy_char,
                    extra_challenges,
                    partial_matches,
                    hits,
                );
                return;
            }
        }

        // The walk stops here.
        let terminal_here = matches!(last, Some(h) if h.node == node);
        if !terminal_here && node != 0 {
            for &extra in extra_challenges {
                if let Some(&child) = current.children.get(&extra) {
                    if !self.nodes[child].values.is_empty() {
                        hits.push(Hit {
                            node: child,
                            depth: pos,
                            fuzzy,
                            challenge: Some(extra),
                        });
                        return;
                    }
                }
            }
            if partial_matches && last.is_none() {
                if let Some(end) = self.single_path_terminal(node) {
                    hits.push(Hit {
                        node: end,
                        depth: pos,
                        fuzzy,
                        challenge: None,
                    });
                    return;
                }
            }
        }
        if let Some(hit) = last {
            hits.push(hit);
        }
    }

    // Follow an unbranched chain from `node` to the first terminal.
    fn single_path_terminal(&self, node: usize) -> Option<usize> {
        let mut node = node;
        loop {
            let current = &self.nodes[node];
            if current.children.len() != 1 {
                return None;
            }
            let (_, &child) = current.children.iter().next()?;
            if !self.nodes[child].values.is_empty() {
                return Some(child);
            }
            node = child;
        }
    }
}

impl<T> Default for TrieMatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K: AsRef<str>> FromIterator<(K, T)> for TrieMatcher<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut trie = TrieMatcher::new();
        for (key, value) in iter {
            trie.append(key.as_ref(), value);
        }
        trie
    }
}

/// Sort candidates deepest first, unambiguous before ambiguous, keeping the
/// search order otherwise.
pub fn rank_matches<T>(matches: &mut [TrieMatch<'_, T>]) {
    matches.sort_by(|a, b| {
        b.depth
            .cmp(&a.depth)
            .then_with(|| a.ambiguous_cnt.cmp(&b.ambiguous_cnt))
    });
}
