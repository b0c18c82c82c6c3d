//! Bulk construction of a [`CompressedTrie`] from a sorted key set.
//!
//! The build walks prefixes with an explicit work stack (recursion depth
//! would otherwise track the longest key). For the current prefix and each
//! alphabet letter in order, the slice of keys extending the prefix by that
//! letter either collapses into a terminal node pointing at an interned
//! suffix (one key) or becomes a branch node queued for its own pass.
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use tracing::debug;

use crate::ctrie::node::{LetterIdx, TrieNode, MAX_LETTERS, NO_MATCHING_CHAR};
use crate::ctrie::CompressedTrie;
use crate::errors::{Error, ErrorKind, TaxonomyResult};

struct Frame {
    prefix: Vec<char>,
    node_ix: usize,
}

struct Builder<'k> {
    letters: Vec<char>,
    letter_to_ind: HashMap<char, LetterIdx>,
    null_char_index: LetterIdx,
    nodes: Vec<TrieNode>,
    suffixes: Vec<LetterIdx>,
    suffix2index: HashMap<Vec<LetterIdx>, usize>,
    keys: &'k BTreeSet<Vec<char>>,
}

impl<'k> Builder<'k> {
    fn append_node(&mut self) -> usize {
        self.nodes.push(TrieNode::default());
        self.nodes.len() - 1
    }

    fn encode_suffix(&self, chars: &[char]) -> Vec<LetterIdx> {
        let mut out = Vec::with_capacity(chars.len() + 1);
        for c in chars {
            out.push(
                self.letter_to_ind
                    .get(c)
                    .copied()
                    .unwrap_or(NO_MATCHING_CHAR),
            );
        }
        out.push(self.null_char_index);
        out
    }

    /// Store (or reuse) the suffix run for a terminal node. Every proper
    /// tail of a newly stored run is registered too, so later suffixes can
    /// land inside existing runs.
    fn store_suffix_node(&mut self, node_ix: usize, suffix: &[char]) -> TaxonomyResult<()> {
        let suff_inds = self.encode_suffix(suffix);
        if let Some(pos) = self.suffix2index.get(&suff_inds).copied() {
            return self.nodes[node_ix].flag_as_suffix(pos);
        }
        let pos = self.suffixes.len();
        self.suffixes.extend_from_slice(&suff_inds);
        self.nodes[node_ix].flag_as_suffix(pos)?;
        let mut off = 1;
        while off + 1 < suff_inds.len() {
            let tail = suff_inds[off..].to_vec();
            if self.suffix2index.contains_key(&tail) {
                break;
            }
            self.suffix2index.insert(tail, pos + off);
            off += 1;
        }
        self.suffix2index.insert(suff_inds, pos);
        Ok(())
    }

    /// Create the children of `parent_ix` for every alphabet letter that
    /// extends `prefix` within the key set.
    fn process_prefix(
        &mut self,
        prefix: &[char],
        parent_ix: usize,
        todo: &mut Vec<Frame>,
    ) -> TaxonomyResult<()> {
        let keys = self.keys;
        let mut has_indexed_parent = false;
        let mut next_pref = prefix.to_vec();
        next_pref.push('\0');
        for letter_ix in 0..self.letters.len() {
            *next_pref.last_mut().unwrap() = self.letters[letter_ix];
            let mut range =
                keys.range::<[char], _>((Bound::Included(&next_pref[..]), Bound::Unbounded));
            let first = match range.next() {
                Some(k) if k.starts_with(&next_pref) => k,
                _ => continue,
            };
            let node_ix = self.append_node();
            let extended = range.next().map_or(false, |k| k.starts_with(&next_pref));
            if extended {
                todo.push(Frame {
                    prefix: next_pref.clone(),
                    node_ix,
                });
            } else {
                self.store_suffix_node(node_ix, &first[next_pref.len()..])?;
            }
            self.nodes[parent_ix].flag_letter(letter_ix as LetterIdx);
            if !has_indexed_parent {
                self.nodes[parent_ix].set_index(node_ix)?;
                has_indexed_parent = true;
            }
        }
        if !has_indexed_parent {
            // only possible when every extending key continues with a
            // character that fell outside the alphabet; those keys are
            // unreachable by exact match
            debug!(
                prefix = %prefix.iter().collect::<String>(),
                "prefix has extensions only through out-of-alphabet characters"
            );
        }
        Ok(())
    }

    fn run(&mut self, todo: &mut Vec<Frame>) -> TaxonomyResult<()> {
        let root = self.append_node();
        self.process_prefix(&[], root, todo)?;
        while let Some(frame) = todo.pop() {
            let keys = self.keys;
            let mut range = keys
                .range::<[char], _>((Bound::Included(&frame.prefix[..]), Bound::Unbounded));
            let mut done = false;
            if range.next().map(|k| k.as_slice()) == Some(frame.prefix.as_slice()) {
                if range.next().map_or(false, |k| k.starts_with(&frame.prefix)) {
                    // the prefix is itself a key and other keys extend it
                    self.nodes[frame.node_ix].flag_as_key_terminating();
                } else {
                    // the prefix is the last key in its subtree; index 0 is
                    // the interned empty suffix
                    self.nodes[frame.node_ix].flag_as_terminal();
                    done = true;
                }
            }
            if !done {
                self.process_prefix(&frame.prefix, frame.node_ix, todo)?;
            }
        }
        Ok(())
    }
}

fn fill_equivalent_letters(
    letters: &[char],
    letter_to_ind: &HashMap<char, LetterIdx>,
) -> Vec<LetterIdx> {
    letters
        .iter()
        .map(|c| {
            let folded = crate::ctrie::single_char_fold(*c, true)
                .or_else(|| crate::ctrie::single_char_fold(*c, false));
            folded
                .and_then(|f| letter_to_ind.get(&f).copied())
                .unwrap_or(NO_MATCHING_CHAR)
        })
        .collect()
}

impl CompressedTrie {
    /// Build a trie over `keys`, coded against `alphabet`. Letters are
    /// sorted and de-duplicated; payload ids are looked up per key from
    /// `payloads`.
    pub fn build<I, S, A>(
        keys: I,
        alphabet: A,
        payloads: &HashMap<String, u64>,
    ) -> TaxonomyResult<CompressedTrie>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        A: IntoIterator<Item = char>,
    {
        let letter_set: BTreeSet<char> = alphabet.into_iter().collect();
        if letter_set.len() > MAX_LETTERS {
            return Err(Error::new(ErrorKind::AlphabetTooLarge(letter_set.len())));
        }
        let letters: Vec<char> = letter_set.into_iter().collect();
        let letter_to_ind: HashMap<char, LetterIdx> = letters
            .iter()
            .enumerate()
            .map(|(ix, c)| (*c, ix as LetterIdx))
            .collect();
        let equivalent_letter = fill_equivalent_letters(&letters, &letter_to_ind);
        let null_char_index = letters.len() as LetterIdx;

        let mut payload = HashMap::new();
        let mut key_set: BTreeSet<Vec<char>> = BTreeSet::new();
        for key in keys {
            let key = key.as_ref();
            if key.is_empty() {
                continue;
            }
            if let Some(p) = payloads.get(key) {
                payload.insert(key.to_string(), *p);
            }
            key_set.insert(key.chars().collect());
        }

        if key_set.is_empty() {
            return Ok(CompressedTrie {
                letters,
                letter_to_ind,
                equivalent_letter,
                null_char_index,
                nodes: Vec::new(),
                suffixes: Vec::new(),
                payload,
                key_count: 0,
            });
        }

        let mut builder = Builder {
            letters,
            letter_to_ind,
            null_char_index,
            nodes: Vec::new(),
            suffixes: vec![null_char_index],
            suffix2index: HashMap::from([(vec![null_char_index], 0)]),
            keys: &key_set,
        };
        let mut todo = Vec::new();
        builder.run(&mut todo)?;

        debug!(
            keys = key_set.len(),
            nodes = builder.nodes.len(),
            suffix_len = builder.suffixes.len(),
            "compressed trie built"
        );
        Ok(CompressedTrie {
            letters: builder.letters,
            letter_to_ind: builder.letter_to_ind,
            equivalent_letter,
            null_char_index,
            nodes: builder.nodes,
            suffixes: builder.suffixes,
            payload,
            key_count: key_set.len(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn alphabet_of(keys: &[&str]) -> BTreeSet<char> {
        keys.iter().flat_map(|k| k.chars()).collect()
    }

    pub(crate) fn build_plain(keys: &[&str]) -> CompressedTrie {
        CompressedTrie::build(keys, alphabet_of(keys), &HashMap::new()).unwrap()
    }

    #[test]
    fn stores_and_dumps_all_keys() {
        let keys = ["aster", "asteraceae", "asterales", "bombus", "bos"];
        let trie = build_plain(&keys);
        assert_eq!(trie.key_count(), 5);
        let mut expected: Vec<String> = keys.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(trie.keys(), expected);
    }

    #[test]
    fn single_key_and_single_letter_keys() {
        let trie = build_plain(&["a"]);
        assert_eq!(trie.keys(), vec!["a".to_string()]);

        let trie = build_plain(&["homo sapiens"]);
        assert_eq!(trie.keys(), vec!["homo sapiens".to_string()]);
    }

    #[test]
    fn key_prefixing_another_key_is_kept() {
        let trie = build_plain(&["aster", "asteraceae"]);
        assert_eq!(
            trie.keys(),
            vec!["aster".to_string(), "asteraceae".to_string()]
        );
    }

    #[test]
    fn empty_input_builds_an_empty_trie() {
        let trie = CompressedTrie::build(
            Vec::<&str>::new(),
            "abc".chars(),
            &HashMap::new(),
        )
        .unwrap();
        assert!(trie.is_empty());
        assert_eq!(trie.key_count(), 0);
        assert!(trie.keys().is_empty());
    }

    #[test]
    fn shared_suffixes_are_interned() {
        let keys = ["aalismus", "balismus", "calismus", "dalismus"];
        let trie = build_plain(&keys);
        // one stored run ("alismus" + terminator) plus the initial empty
        // run; the other three terminals reuse it
        assert!(
            trie.suffixes.len() <= 1 + "alismus".len() + 1,
            "suffix buffer grew to {} entries",
            trie.suffixes.len()
        );
        let mut expected: Vec<String> = keys.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(trie.keys(), expected);
    }

    #[test]
    fn suffix_tails_are_reused() {
        // "ster" is a proper tail of the first stored run, so the second
        // key's suffix points into it instead of growing the buffer
        let trie = build_plain(&["x_aster", "yster"]);
        assert_eq!(trie.keys(), vec!["x_aster".to_string(), "yster".to_string()]);
        assert_eq!(trie.suffixes.len(), 1 + "_aster".len() + 1);
    }

    #[test]
    fn oversized_alphabets_are_rejected() {
        let alphabet: Vec<char> = ('\u{100}'..'\u{200}').take(63).collect();
        let err =
            CompressedTrie::build(["abc"], alphabet, &HashMap::new()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::AlphabetTooLarge(63)));
    }

    #[test]
    fn payloads_attach_to_keys() {
        let payloads =
            HashMap::from([("aster".to_string(), 7u64), ("bos".to_string(), 9u64)]);
        let trie = CompressedTrie::build(
            ["aster", "bos", "pan"],
            alphabet_of(&["aster", "bos", "pan"]),
            &payloads,
        )
        .unwrap();
        assert_eq!(trie.payload_for("aster"), Some(7));
        assert_eq!(trie.payload_for("bos"), Some(9));
        assert_eq!(trie.payload_for("pan"), None);
    }

    #[test]
    fn equivalent_letters_map_between_cases() {
        let trie = CompressedTrie::build(
            ["Homo", "homo"],
            "Hhomo".chars(),
            &HashMap::new(),
        )
        .unwrap();
        let upper = trie.index_for_letter('H');
        let lower = trie.index_for_letter('h');
        assert_eq!(trie.equivalent_letter[upper as usize], lower);
        assert_eq!(trie.equivalent_letter[lower as usize], upper);
        assert!(trie.letters_equal(upper, lower));
        let m = trie.index_for_letter('m');
        assert_eq!(trie.equivalent_letter[m as usize], NO_MATCHING_CHAR);
        assert!(!trie.letters_equal(m, upper));
        assert!(trie.letters_equal(m, m));
    }
}
