//! Compressed trie over code-point sequences: bit-packed branch nodes, an
//! interned suffix buffer, and exact / prefix / bounded-edit-distance
//! search. Loosely follows the structure of Maly's 1976 compressed tries.
use std::collections::HashMap;

mod build;
mod db;
mod node;
mod search;

pub use db::CtrieDatabase;
pub use search::FuzzyMatch;

pub(crate) use node::{LetterIdx, TrieNode, MAX_LETTERS, NO_MATCHING_CHAR};

/// An immutable compressed trie plus the alphabet it is coded against and a
/// key → payload-id map for its key set. Built once by
/// [`CompressedTrie::build`], then only read.
pub struct CompressedTrie {
    /// Alphabet code points in sorted order; positions are letter indices.
    letters: Vec<char>,
    letter_to_ind: HashMap<char, LetterIdx>,
    /// Case-folded counterpart of each letter, or `NO_MATCHING_CHAR`.
    equivalent_letter: Vec<LetterIdx>,
    /// Reserved index one past the last letter; terminates stored suffixes.
    null_char_index: LetterIdx,
    nodes: Vec<TrieNode>,
    suffixes: Vec<LetterIdx>,
    payload: HashMap<String, u64>,
    key_count: usize,
}

impl CompressedTrie {
    pub fn key_count(&self) -> usize {
        self.key_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Opaque payload id attached to a key at build time.
    pub fn payload_for(&self, key: &str) -> Option<u64> {
        self.payload.get(key).copied()
    }

    pub(crate) fn index_for_letter(&self, c: char) -> LetterIdx {
        self.letter_to_ind
            .get(&c)
            .copied()
            .unwrap_or(NO_MATCHING_CHAR)
    }

    /// Encode a query against this trie's alphabet. A character outside
    /// the alphabet falls back to its case-folded form when that form is a
    /// letter; otherwise it becomes `NO_MATCHING_CHAR`, which only the
    /// fuzzy search's substitution pathway can cross.
    pub(crate) fn encode(&self, text: &str, null_terminate: bool) -> Vec<LetterIdx> {
        let mut out = Vec::with_capacity(text.chars().count() + usize::from(null_terminate));
        for c in text.chars() {
            let mut ind = self.index_for_letter(c);
            if ind == NO_MATCHING_CHAR {
                if let Some(folded) =
                    single_char_fold(c, true).or_else(|| single_char_fold(c, false))
                {
                    ind = self.index_for_letter(folded);
                }
            }
            out.push(ind);
        }
        if null_terminate {
            out.push(self.null_char_index);
        }
        out
    }

    /// Decode letter indices back to characters. Dropped-character
    /// sentinels render as `?`; null terminators are skipped.
    pub(crate) fn decode(&self, coded: &[LetterIdx]) -> String {
        let mut out = String::with_capacity(coded.len());
        for ind in coded {
            if *ind == NO_MATCHING_CHAR {
                out.push('?');
            } else if *ind != self.null_char_index {
                out.push(self.letters[*ind as usize]);
            }
        }
        out
    }

    /// The suffix run starting at `offset`, without its null terminator.
    pub(crate) fn suffix_slice(&self, offset: usize) -> &[LetterIdx] {
        let len = self.suffixes[offset..]
            .iter()
            .position(|c| *c == self.null_char_index)
            .expect("suffix buffer runs are null terminated");
        &self.suffixes[offset..offset + len]
    }

    /// Do two letters match under case folding?
    pub(crate) fn letters_equal(&self, a: LetterIdx, b: LetterIdx) -> bool {
        if a == NO_MATCHING_CHAR || b == NO_MATCHING_CHAR {
            return false;
        }
        a == b
            || self.equivalent_letter[a as usize] == b
            || self.equivalent_letter[b as usize] == a
    }

    /// Every key stored in the trie, in trie (letter) order. Used by the
    /// database rebuild logging and by tests.
    pub fn keys(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.key_count);
        if self.nodes.is_empty() {
            return out;
        }
        let mut prefix = Vec::new();
        self.collect_descendants(&mut prefix, 0, &mut out);
        out
    }

    fn collect_descendants(&self, prefix: &mut Vec<char>, node_ix: usize, out: &mut Vec<String>) {
        let node = &self.nodes[node_ix];
        if node.is_key_terminating() {
            out.push(prefix.iter().collect());
        }
        if node.is_terminal() {
            let mut key: String = prefix.iter().collect();
            key.push_str(&self.decode(self.suffix_slice(node.index())));
            out.push(key);
        } else {
            for (letter, next_ix) in node.children() {
                prefix.push(self.letters[letter as usize]);
                self.collect_descendants(prefix, next_ix, out);
                prefix.pop();
            }
        }
    }
}

/// The single-code-point case counterpart of `c`, when one exists.
pub(crate) fn single_char_fold(c: char, lower: bool) -> Option<char> {
    let mut it: Box<dyn Iterator<Item = char>> = if lower {
        Box::new(c.to_lowercase())
    } else {
        Box::new(c.to_uppercase())
    };
    match (it.next(), it.next()) {
        (Some(f), None) if f != c => Some(f),
        _ => None,
    }
}

impl std::fmt::Debug for CompressedTrie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CompressedTrie({} keys, {} letters, {} nodes, {} suffix bytes)",
            self.key_count,
            self.letters.len(),
            self.nodes.len(),
            self.suffixes.len()
        )
    }
}
