//! Exact, prefix, and bounded-edit-distance search over a compressed trie.
//!
//! The fuzzy search explores partial matches in a priority agenda keyed by
//! `(trie steps, query steps, node)`; a state already seen at an equal or
//! lower distance suppresses later arrivals, which keeps highly ambiguous
//! queries from blowing up. Terminal suffixes are scored with a banded
//! Wagner-Fischer dynamic program that charges adjacent transpositions a
//! single edit.
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::ctrie::node::{LetterIdx, NO_MATCHING_CHAR};
use crate::ctrie::CompressedTrie;

/// One fuzzy-search hit.
#[derive(Clone, Debug, PartialEq)]
pub struct FuzzyMatch {
    /// The matched key, decoded.
    pub name: String,
    pub distance: u32,
    /// `(matched_length - distance) / matched_length`
    pub score: f32,
    /// Payload id registered for the key at build time, if any.
    pub payload: Option<u64>,
}

impl FuzzyMatch {
    /// Ascending distance, then descending matched length, then
    /// lexicographic.
    pub fn nearness(a: &FuzzyMatch, b: &FuzzyMatch) -> Ordering {
        a.distance
            .cmp(&b.distance)
            .then_with(|| {
                b.name
                    .chars()
                    .count()
                    .cmp(&a.name.chars().count())
            })
            .then_with(|| a.name.cmp(&b.name))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CreationMode {
    Root,
    Match,
    Substitution,
    RightShift,
    DownShift,
}

/// A live state of the fuzzy exploration: a position in the query, a trie
/// node still to be processed, the distance spent so far, and the letters
/// matched along the way. When the previous step was a substitution the
/// mismatched trie letter is kept so the next step can recognize an
/// adjacent transposition and cancel the second penalty.
#[derive(Clone)]
struct PartialMatch {
    query_pos: usize,
    distance: u32,
    node: usize,
    prev_mismatched_trie: LetterIdx,
    match_coded: Vec<LetterIdx>,
    created_by: CreationMode,
}

impl PartialMatch {
    fn can_rightshift(&self) -> bool {
        self.created_by != CreationMode::DownShift
    }

    fn can_downshift(&self) -> bool {
        self.created_by != CreationMode::RightShift
    }

    fn agenda_key(&self) -> AgendaKey {
        (
            self.match_coded.len() as u32,
            self.query_pos as u32,
            self.node,
        )
    }
}

type AgendaKey = (u32, u32, usize);
type Agenda = BTreeMap<AgendaKey, PartialMatch>;
type RawResults = HashMap<Vec<LetterIdx>, u32>;

fn enqueue(agenda: &mut Agenda, pm: PartialMatch) {
    use std::collections::btree_map::Entry;
    match agenda.entry(pm.agenda_key()) {
        Entry::Vacant(v) => {
            v.insert(pm);
        }
        Entry::Occupied(mut o) => {
            if o.get().distance > pm.distance {
                o.insert(pm);
            }
        }
    }
}

fn store_result(results: &mut RawResults, coded: Vec<LetterIdx>, distance: u32) {
    results
        .entry(coded)
        .and_modify(|d| *d = (*d).min(distance))
        .or_insert(distance);
}

fn ran_out_of_trie_score(prev_row: &[u32], first_quer_ind: usize, quer_len: usize) -> u32 {
    if first_quer_ind > quer_len {
        return prev_row[0];
    }
    let mut gd = (quer_len - first_quer_ind) as u32 + 1;
    let mut d = u32::MAX;
    for psc in prev_row {
        if gd == 0 {
            break;
        }
        gd -= 1;
        d = d.min(psc + gd);
    }
    d
}

impl CompressedTrie {
    /// Exact membership walk: O(query length), no case folding.
    pub fn contains(&self, query: &str) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let coded = self.encode(query, false);
        if coded.is_empty() {
            return false;
        }
        let mut index = 0usize;
        let mut i = 0usize;
        loop {
            let node = &self.nodes[index];
            if node.is_terminal() {
                return self.suffix_slice(node.index()) == &coded[i..];
            }
            if i == coded.len() {
                return node.is_key_terminating();
            }
            match node.child_index_for_letter(coded[i]) {
                Some(next) => {
                    index = next;
                    i += 1;
                }
                None => return false,
            }
        }
    }

    /// All keys beginning with `query`, in trie order (lexicographic over
    /// the alphabet). An empty query enumerates every key.
    pub fn prefix_matches(&self, query: &str) -> Vec<String> {
        if self.nodes.is_empty() {
            return Vec::new();
        }
        let coded = self.encode(query, false);
        let mut index = 0usize;
        let mut letters_matched = 0usize;
        for (i, letter) in coded.iter().enumerate() {
            if self.nodes[index].is_terminal() {
                break;
            }
            match self.nodes[index].child_index_for_letter(*letter) {
                Some(next) => {
                    index = next;
                    letters_matched = i + 1;
                }
                None => return Vec::new(),
            }
        }

        if letters_matched < coded.len() {
            // ran into a terminal with query letters left over: the match,
            // if any, is the single key whose suffix continues the query
            let node = &self.nodes[index];
            debug_assert!(node.is_terminal());
            let suffix = self.suffix_slice(node.index());
            let rest = &coded[letters_matched..];
            if suffix.len() < rest.len() || &suffix[..rest.len()] != rest {
                return Vec::new();
            }
            let mut matched: Vec<char> = query.chars().take(letters_matched).collect();
            let mut out = Vec::with_capacity(1);
            self.collect_descendants(&mut matched, index, &mut out);
            return out;
        }

        let mut prefix: Vec<char> = query.chars().collect();
        let mut out = Vec::new();
        self.collect_descendants(&mut prefix, index, &mut out);
        out
    }

    /// All keys within `max_dist` edits of `query` (Damerau-style: an
    /// adjacent transposition costs one), case folded.
    pub fn fuzzy_matches(&self, query: &str, max_dist: u32) -> Vec<FuzzyMatch> {
        let coded = self.encode(query, false);
        if coded.is_empty() || self.nodes.is_empty() {
            return Vec::new();
        }
        // a query position with no alphabet letter can only be crossed by
        // substitution, so too many of them means no match is feasible
        let missing = coded.iter().filter(|c| **c == NO_MATCHING_CHAR).count();
        if missing as u32 > max_dist {
            return Vec::new();
        }

        let mut results: RawResults = HashMap::new();
        let mut agenda: Agenda = BTreeMap::new();
        enqueue(
            &mut agenda,
            PartialMatch {
                query_pos: 0,
                distance: 0,
                node: 0,
                prev_mismatched_trie: NO_MATCHING_CHAR,
                match_coded: Vec::new(),
                created_by: CreationMode::Root,
            },
        );
        while let Some((_, pm)) = agenda.pop_first() {
            self.extend_partial_match(&coded, max_dist, pm, &mut agenda, &mut results);
        }

        let mut best: HashMap<String, FuzzyMatch> = HashMap::with_capacity(results.len());
        for (coded_match, distance) in results {
            let name = self.decode(&coded_match);
            let length = name.chars().count() as f32;
            let hit = FuzzyMatch {
                score: (length - distance as f32) / length,
                payload: self.payload_for(&name),
                name,
                distance,
            };
            match best.get(&hit.name) {
                Some(prev) if prev.distance <= hit.distance => {}
                _ => {
                    best.insert(hit.name.clone(), hit);
                }
            }
        }
        let mut out: Vec<FuzzyMatch> = best.into_values().collect();
        out.sort_by(FuzzyMatch::nearness);
        out
    }

    fn extend_partial_match(
        &self,
        query: &[LetterIdx],
        global_max: u32,
        pm: PartialMatch,
        agenda: &mut Agenda,
        results: &mut RawResults,
    ) {
        let node = &self.nodes[pm.node];
        if node.is_terminal() {
            self.check_suffix_for_match(query, global_max, &pm, results);
            return;
        }

        // a state this shallow cannot have spent many edits yet; tighten
        // the bound so hopeless branches die early
        let max_offset = (pm.match_coded.len() as u32).max(pm.query_pos as u32);
        let mut max_dist = global_max;
        if max_offset > 2 {
            max_dist = max_dist.min(max_offset - 1);
        }
        if max_offset > 4 {
            max_dist = max_dist.min(max_offset - 2);
        }

        let cd = pm.distance;
        let qc = query.get(pm.query_pos).copied();
        let prev_q = if pm.query_pos > 0 {
            query[pm.query_pos - 1]
        } else {
            NO_MATCHING_CHAR
        };

        for (letter, child_ix) in node.children() {
            let matched = qc.map_or(false, |q| self.letters_equal(q, letter));
            // a substitution one step ago plus crossed letters now is an
            // adjacent transposition: one edit total, already paid
            let transposed = !matched
                && pm.prev_mismatched_trie != NO_MATCHING_CHAR
                && qc.map_or(false, |q| self.letters_equal(q, pm.prev_mismatched_trie))
                && self.letters_equal(prev_q, letter);
            if matched || transposed {
                let mut coded = pm.match_coded.clone();
                coded.push(letter);
                enqueue(
                    agenda,
                    PartialMatch {
                        query_pos: pm.query_pos + 1,
                        distance: cd,
                        node: child_ix,
                        prev_mismatched_trie: NO_MATCHING_CHAR,
                        match_coded: coded,
                        created_by: CreationMode::Match,
                    },
                );
            } else if cd + 1 <= max_dist {
                if qc.is_some() {
                    let mut coded = pm.match_coded.clone();
                    coded.push(letter);
                    enqueue(
                        agenda,
                        PartialMatch {
                            query_pos: pm.query_pos + 1,
                            distance: cd + 1,
                            node: child_ix,
                            prev_mismatched_trie: letter,
                            match_coded: coded,
                            created_by: CreationMode::Substitution,
                        },
                    );
                }
                if pm.can_rightshift() {
                    // skip a trie letter (deletion from the query's view)
                    let mut coded = pm.match_coded.clone();
                    coded.push(letter);
                    enqueue(
                        agenda,
                        PartialMatch {
                            query_pos: pm.query_pos,
                            distance: cd + 1,
                            node: child_ix,
                            prev_mismatched_trie: NO_MATCHING_CHAR,
                            match_coded: coded,
                            created_by: CreationMode::RightShift,
                        },
                    );
                }
            }
        }

        // skip a query letter (insertion from the query's view)
        if cd + 1 <= max_dist && qc.is_some() && pm.can_downshift() {
            enqueue(
                agenda,
                PartialMatch {
                    query_pos: pm.query_pos + 1,
                    distance: cd + 1,
                    node: pm.node,
                    prev_mismatched_trie: NO_MATCHING_CHAR,
                    match_coded: pm.match_coded.clone(),
                    created_by: CreationMode::DownShift,
                },
            );
        }

        if node.is_key_terminating() {
            let d = (query.len() - pm.query_pos) as u32 + cd;
            if d <= max_dist {
                store_result(results, pm.match_coded.clone(), d);
            }
        }
    }

    fn check_suffix_for_match(
        &self,
        query: &[LetterIdx],
        max_dist: u32,
        pm: &PartialMatch,
        results: &mut RawResults,
    ) {
        let suffix = self.suffix_slice(self.nodes[pm.node].index());
        let trie_len = suffix.len();
        let num_q_left = query.len() - pm.query_pos;

        let abs_len_diff = trie_len.abs_diff(num_q_left) as u32;
        if abs_len_diff + pm.distance > max_dist {
            return;
        }
        let d = if num_q_left == 0 || trie_len == 0 {
            abs_len_diff + pm.distance
        } else {
            let prev_t = pm.prev_mismatched_trie;
            let prev_q = if prev_t != NO_MATCHING_CHAR {
                query[pm.query_pos - 1]
            } else {
                NO_MATCHING_CHAR
            };
            let threshold = max_dist - pm.distance;
            pm.distance
                + self.suffix_distance(prev_q, &query[pm.query_pos..], suffix, threshold, prev_t)
        };
        if d <= max_dist {
            let mut coded = pm.match_coded.clone();
            coded.extend_from_slice(suffix);
            store_result(results, coded, d);
        }
    }

    fn match_cost(
        &self,
        prev_q: LetterIdx,
        q: LetterIdx,
        prev_t: LetterIdx,
        t: LetterIdx,
    ) -> u32 {
        if q == NO_MATCHING_CHAR || t == NO_MATCHING_CHAR {
            return 1;
        }
        if self.letters_equal(q, t) {
            return 0;
        }
        if prev_t == NO_MATCHING_CHAR || prev_q == NO_MATCHING_CHAR {
            // transposition is not possible
            return 1;
        }
        if self.letters_equal(prev_q, t) && self.letters_equal(q, prev_t) {
            // transposition, don't double penalize
            return 0;
        }
        1
    }

    fn match_cost_no_transp(&self, q: LetterIdx, t: LetterIdx) -> u32 {
        if q == NO_MATCHING_CHAR || t == NO_MATCHING_CHAR {
            return 1;
        }
        if self.letters_equal(q, t) {
            0
        } else {
            1
        }
    }

    fn are_equivalent(
        &self,
        prev_q: LetterIdx,
        quer: &[LetterIdx],
        trie: &[LetterIdx],
        prev_t: LetterIdx,
    ) -> bool {
        if quer.len() != trie.len() {
            return false;
        }
        if trie.is_empty() {
            return true;
        }
        if self.match_cost(prev_q, quer[0], prev_t, trie[0]) > 0 {
            return false;
        }
        for i in 1..trie.len() {
            if self.match_cost_no_transp(quer[i], trie[i]) > 0 {
                return false;
            }
        }
        true
    }

    /// Distance between the unconsumed query and a terminal suffix, with
    /// cheap shortcuts before the dynamic program. Returns `threshold + 1`
    /// when the distance provably exceeds the threshold.
    fn suffix_distance(
        &self,
        mut prev_q: LetterIdx,
        mut quer: &[LetterIdx],
        mut trie: &[LetterIdx],
        threshold: u32,
        mut prev_t: LetterIdx,
    ) -> u32 {
        if threshold == 0 {
            return u32::from(!self.are_equivalent(prev_q, quer, trie, prev_t));
        }
        if trie.is_empty() {
            return quer.len() as u32;
        }
        if quer.is_empty() {
            return trie.len() as u32;
        }
        // strip the identical prefix
        if self.match_cost(prev_q, quer[0], prev_t, trie[0]) == 0 {
            quer = &quer[1..];
            trie = &trie[1..];
            prev_q = NO_MATCHING_CHAR;
            prev_t = NO_MATCHING_CHAR;
            loop {
                if quer.is_empty() {
                    return trie.len() as u32;
                }
                if trie.is_empty() {
                    return quer.len() as u32;
                }
                if self.match_cost_no_transp(quer[0], trie[0]) > 0 {
                    break;
                }
                quer = &quer[1..];
                trie = &trie[1..];
            }
        }
        // trim off matches at the end
        while self.match_cost_no_transp(quer[quer.len() - 1], trie[trie.len() - 1]) == 0 {
            quer = &quer[..quer.len() - 1];
            trie = &trie[..trie.len() - 1];
            if quer.is_empty() {
                return trie.len() as u32;
            }
            if trie.is_empty() {
                return quer.len() as u32;
            }
        }
        if quer.len() == 1 || trie.len() == 1 {
            let ldc = quer.len().abs_diff(trie.len()) as u32;
            if self.match_cost(prev_q, quer[0], prev_t, trie[0]) == 0 {
                return ldc;
            }
            if quer.len() == 1 {
                if trie.len() == 1 {
                    return 1; // mismatch in the only place to check
                }
                for tp in 1..trie.len() {
                    if self.match_cost_no_transp(quer[0], trie[tp]) == 0 {
                        return ldc;
                    }
                }
            } else {
                for tp in 1..quer.len() {
                    if self.match_cost_no_transp(quer[tp], trie[0]) == 0 {
                        return ldc;
                    }
                }
            }
            return 1 + ldc;
        }
        self.banded_distance(prev_q, quer, trie, threshold, prev_t)
    }

    /// Wagner-Fischer restricted to a band of `2 * threshold + 1` cells per
    /// row, bailing out as soon as a whole row exceeds the threshold.
    fn banded_distance(
        &self,
        prev_q: LetterIdx,
        quer: &[LetterIdx],
        trie: &[LetterIdx],
        threshold: u32,
        mut prev_t: LetterIdx,
    ) -> u32 {
        let mut prev_row: Vec<u32> = (0..=threshold).collect();
        let mut next_row: Vec<u32> = Vec::with_capacity(prev_row.capacity() + 1);
        let mut prev_quer_ind = 0usize;
        let mut trie_ind = 0usize;
        let mut leftside_cost = 1u32;

        loop {
            if trie_ind >= trie.len() {
                return ran_out_of_trie_score(&prev_row, prev_quer_ind, quer.len());
            }
            if prev_quer_ind >= quer.len() {
                // the band slid past the query's end; all that is left is
                // deleting the rest of the trie run
                let rest = (trie.len() - trie_ind) as u32;
                return (prev_row[0] + rest).min(threshold + 1);
            }
            next_row.clear();
            let next_quer_ind = prev_quer_ind;
            if leftside_cost <= threshold {
                next_row.push(leftside_cost);
                leftside_cost += 1;
            } else {
                next_row.push(prev_row[0] + 1);
            }
            debug_assert!(next_quer_ind < quer.len());
            let trie_match_char = trie[trie_ind];
            let mut min_in_next_row = next_row[0];
            let mut match_quer_pos = next_quer_ind;
            let mut match_prev_index = 0usize;
            let mut prev_q_match_char = if match_quer_pos == 0 {
                prev_q
            } else {
                quer[match_quer_pos - 1]
            };
            loop {
                let cell_left_cost = 1 + *next_row.last().unwrap();
                let q_match_char = quer[match_quer_pos];
                let cell_match_cost = prev_row[match_prev_index]
                    + self.match_cost(prev_q_match_char, q_match_char, prev_t, trie_match_char);
                let cell_top_cost = 1 + if match_prev_index + 1 >= prev_row.len() {
                    threshold
                } else {
                    prev_row[match_prev_index + 1]
                };
                let min_cost = cell_left_cost.min(cell_match_cost).min(cell_top_cost);
                next_row.push(min_cost);
                min_in_next_row = min_in_next_row.min(min_cost);
                match_quer_pos += 1;
                if match_quer_pos >= quer.len() {
                    break;
                }
                match_prev_index += 1;
                if match_prev_index >= prev_row.len() {
                    break;
                }
                prev_q_match_char = q_match_char;
            }
            if min_in_next_row > threshold {
                return threshold + 1;
            }
            prev_t = trie_match_char;
            prev_quer_ind = next_quer_ind;
            trie_ind += 1;
            while *next_row.last().unwrap() > threshold {
                next_row.pop();
            }
            if next_row[0] > threshold {
                // the band's left edge fell off; shift it right one cell
                prev_row.clear();
                prev_row.extend_from_slice(&next_row[1..]);
                prev_quer_ind += 1;
            } else {
                std::mem::swap(&mut prev_row, &mut next_row);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn build(keys: &[&str]) -> CompressedTrie {
        let alphabet: std::collections::BTreeSet<char> =
            keys.iter().flat_map(|k| k.chars()).collect();
        CompressedTrie::build(keys, alphabet, &HashMap::new()).unwrap()
    }

    fn names_of(hits: &[FuzzyMatch]) -> Vec<&str> {
        hits.iter().map(|h| h.name.as_str()).collect()
    }

    const PLANT_KEYS: [&str; 6] = [
        "aster",
        "asteraceae",
        "asterales",
        "asteridae",
        "bos taurus",
        "homo sapiens",
    ];

    #[test]
    fn exact_walk_finds_only_stored_keys() {
        let trie = build(&PLANT_KEYS);
        for key in PLANT_KEYS {
            assert!(trie.contains(key), "missing {}", key);
        }
        assert!(!trie.contains("aste"));
        assert!(!trie.contains("asterx"));
        assert!(!trie.contains("asteraceaex"));
        assert!(!trie.contains(""));
        // encoding folds characters with no letter of their own
        assert!(trie.contains("Homo sapiens"));
    }

    #[test]
    fn every_key_exact_matches_itself_at_distance_zero() {
        let trie = build(&PLANT_KEYS);
        for key in PLANT_KEYS {
            let hits = trie.fuzzy_matches(key, 0);
            let hit = hits
                .iter()
                .find(|h| h.name == key)
                .unwrap_or_else(|| panic!("{} not returned", key));
            assert_eq!(hit.distance, 0);
            assert!((hit.score - 1.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn prefix_query_enumerates_in_lexicographic_order() {
        let trie = build(&PLANT_KEYS);
        assert_eq!(
            trie.prefix_matches("aster"),
            vec!["aster", "asteraceae", "asterales", "asteridae"]
        );
        assert_eq!(trie.prefix_matches("bos"), vec!["bos taurus"]);
        assert_eq!(trie.prefix_matches("bos t"), vec!["bos taurus"]);
        assert!(trie.prefix_matches("bus").is_empty());
        assert!(trie.prefix_matches("asterales1").is_empty());
        // empty prefix dumps everything
        assert_eq!(trie.prefix_matches("").len(), PLANT_KEYS.len());
    }

    #[test]
    fn prefix_query_is_idempotent_and_stable_under_unrelated_keys() {
        let trie = build(&PLANT_KEYS);
        assert_eq!(trie.prefix_matches("aster"), trie.prefix_matches("aster"));

        let mut more: Vec<&str> = PLANT_KEYS.to_vec();
        more.extend(["pan troglodytes", "gorilla gorilla"]);
        let bigger = build(&more);
        assert_eq!(trie.prefix_matches("aster"), bigger.prefix_matches("aster"));
    }

    #[test]
    fn single_substitution_is_found() {
        let trie = build(&PLANT_KEYS);
        let hits = trie.fuzzy_matches("homa sapiens", 2);
        let hit = hits.iter().find(|h| h.name == "homo sapiens").unwrap();
        assert_eq!(hit.distance, 1);
        assert!((hit.score - 11.0 / 12.0).abs() < 1e-6);
    }

    #[test]
    fn single_insertion_in_query_is_found() {
        let trie = build(&PLANT_KEYS);
        let hits = trie.fuzzy_matches("homoo sapiens", 2);
        let hit = hits.iter().find(|h| h.name == "homo sapiens").unwrap();
        assert_eq!(hit.distance, 1);
    }

    #[test]
    fn single_deletion_in_query_is_found() {
        let trie = build(&PLANT_KEYS);
        let hits = trie.fuzzy_matches("hmo sapiens", 2);
        let hit = hits.iter().find(|h| h.name == "homo sapiens").unwrap();
        assert_eq!(hit.distance, 1);
    }

    #[test]
    fn all_single_edits_of_a_key_match_within_distance_one() {
        let trie = build(&PLANT_KEYS);
        let key = "aster";
        let alphabet = ['a', 'e', 'r', 's', 't', 'o', 'm'];
        let chars: Vec<char> = key.chars().collect();
        let mut variants: Vec<String> = Vec::new();
        for i in 0..chars.len() {
            // deletion
            let mut del = chars.clone();
            del.remove(i);
            variants.push(del.iter().collect());
            for c in alphabet {
                // substitution
                let mut sub = chars.clone();
                sub[i] = c;
                variants.push(sub.iter().collect());
                // insertion
                let mut ins = chars.clone();
                ins.insert(i, c);
                variants.push(ins.iter().collect());
            }
        }
        for variant in variants {
            let hits = trie.fuzzy_matches(&variant, 1);
            assert!(
                hits.iter().any(|h| h.name == key),
                "\"{}\" did not match {}",
                variant,
                key
            );
        }
    }

    #[test]
    fn adjacent_transposition_costs_one_in_the_suffix() {
        let trie = build(&PLANT_KEYS);
        // swap the m/o inside the terminal suffix
        let hits = trie.fuzzy_matches("hmoo sapiens", 1);
        let hit = hits.iter().find(|h| h.name == "homo sapiens").unwrap();
        assert_eq!(hit.distance, 1);
    }

    #[test]
    fn adjacent_transposition_costs_one_across_branch_nodes() {
        // abc is shared branch structure here, not suffix
        let trie = build(&["abcd", "abce"]);
        let hits = trie.fuzzy_matches("acbd", 1);
        let hit = hits.iter().find(|h| h.name == "abcd").unwrap();
        assert_eq!(hit.distance, 1);
    }

    #[test]
    fn every_adjacent_swap_matches_at_distance_one() {
        let trie = build(&PLANT_KEYS);
        for key in PLANT_KEYS {
            let chars: Vec<char> = key.chars().collect();
            for i in 0..chars.len() - 1 {
                if chars[i] == chars[i + 1] {
                    continue;
                }
                let mut swapped = chars.clone();
                swapped.swap(i, i + 1);
                let variant: String = swapped.iter().collect();
                let hits = trie.fuzzy_matches(&variant, 1);
                let hit = hits.iter().find(|h| h.name == key);
                assert!(
                    hit.map_or(false, |h| h.distance == 1),
                    "swap \"{}\" of \"{}\" missed",
                    variant,
                    key
                );
            }
        }
    }

    #[test]
    fn case_differences_cost_nothing() {
        let trie = build(&PLANT_KEYS);
        let hits = trie.fuzzy_matches("hOMO sApIeNs", 0);
        let hit = hits.iter().find(|h| h.name == "homo sapiens").unwrap();
        assert_eq!(hit.distance, 0);
        assert!((hit.score - 1.0).abs() < f32::EPSILON);

        let hits = trie.fuzzy_matches("ASTER", 0);
        assert!(hits.iter().any(|h| h.name == "aster"));
    }

    #[test]
    fn too_many_unknown_characters_short_circuit() {
        let trie = build(&PLANT_KEYS);
        assert!(trie.fuzzy_matches("ast\u{e9}\u{e9}", 1).is_empty());
        // one unknown char within budget can still substitute
        let hits = trie.fuzzy_matches("ast\u{e9}r", 1);
        assert!(hits.iter().any(|h| h.name == "aster"));
    }

    #[test]
    fn empty_query_and_empty_trie_return_nothing() {
        let trie = build(&PLANT_KEYS);
        assert!(trie.fuzzy_matches("", 4).is_empty());
        let empty = CompressedTrie::build(
            Vec::<&str>::new(),
            "ab".chars(),
            &HashMap::new(),
        )
        .unwrap();
        assert!(empty.fuzzy_matches("aster", 2).is_empty());
        assert!(empty.prefix_matches("a").is_empty());
        assert!(!empty.contains("a"));
    }

    #[test]
    fn distances_above_the_bound_are_excluded() {
        let trie = build(&PLANT_KEYS);
        // two substitutions cannot sneak in under max_dist 1
        let hits = trie.fuzzy_matches("huma sapiens", 1);
        assert!(!hits.iter().any(|h| h.name == "homo sapiens"));
        let hits = trie.fuzzy_matches("huma sapiens", 2);
        let hit = hits.iter().find(|h| h.name == "homo sapiens").unwrap();
        assert_eq!(hit.distance, 2);
    }

    #[test]
    fn results_come_back_in_nearness_order() {
        let trie = build(&["aster", "astera", "asteraceae", "asterales"]);
        let hits = trie.fuzzy_matches("astera", 2);
        // distances first
        let dists: Vec<u32> = hits.iter().map(|h| h.distance).collect();
        let mut sorted = dists.clone();
        sorted.sort_unstable();
        assert_eq!(dists, sorted);
        assert_eq!(hits[0].name, "astera");
        assert_eq!(hits[0].distance, 0);
        // same distance: longer name first
        let d1: Vec<&FuzzyMatch> = hits.iter().filter(|h| h.distance == 1).collect();
        if d1.len() >= 2 {
            assert!(d1[0].name.chars().count() >= d1[1].name.chars().count());
        }
    }

    #[test]
    fn a_key_that_prefixes_other_keys_is_matchable() {
        let trie = build(&["aster", "asteraceae", "asterales"]);
        let hits = trie.fuzzy_matches("aster", 0);
        assert!(hits.iter().any(|h| h.name == "aster" && h.distance == 0));
        // and at distance one, a typo still reaches the short key
        let hits = trie.fuzzy_matches("astee", 1);
        assert!(hits.iter().any(|h| h.name == "aster" && h.distance == 1));
    }

    #[test]
    fn payloads_ride_along_on_matches() {
        let payloads = HashMap::from([("aster".to_string(), 41u64)]);
        let alphabet: std::collections::BTreeSet<char> = "asterbos".chars().collect();
        let trie = CompressedTrie::build(["aster", "bos"], alphabet, &payloads).unwrap();
        let hits = trie.fuzzy_matches("astr", 1);
        let hit = hits.iter().find(|h| h.name == "aster").unwrap();
        assert_eq!(hit.payload, Some(41));
        let hits = trie.fuzzy_matches("bos", 0);
        assert_eq!(hits[0].payload, None);
    }
}
