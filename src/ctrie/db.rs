//! The trie database: one thin trie for well-behaved ASCII keys, one wide
//! trie for everything else, and a small incremental trie absorbing keys
//! added after construction.
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::ctrie::search::FuzzyMatch;
use crate::ctrie::{CompressedTrie, MAX_LETTERS};
use crate::errors::TaxonomyResult;

/// Characters eligible for the thin trie. Keys and queries are normalized
/// to lowercase upstream, so capitals are not needed here.
const THIN_ALLOW_LIST: &str = " \"'()[]+-%.&0123456789:<=>,^_abcdefghijklmnopqrstuvwxyz/?#*!";

const SHORT_NAME_LENGTH: usize = 9;
const MEDIUM_NAME_LENGTH: usize = 14;
const LONG_NAME_LENGTH: usize = 19;

/// Edit-distance budget as a function of query length.
pub fn max_dist_for_query_length(len: usize) -> u32 {
    if len < SHORT_NAME_LENGTH {
        1
    } else if len < MEDIUM_NAME_LENGTH {
        2
    } else if len < LONG_NAME_LENGTH {
        3
    } else {
        4
    }
}

fn is_thin_key(key: &str) -> bool {
    key.chars().all(|c| THIN_ALLOW_LIST.contains(c))
}

/// The most frequent characters across a key set, capped at the node
/// letter-mask width. Ties break toward lower code points. Characters past
/// the cap are dropped: keys using them cannot be matched exactly but may
/// still be found through the fuzzy unknown-character pathway.
fn most_frequent_letters<'a, I>(keys: I) -> Vec<char>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<char, u64> = HashMap::new();
    for key in keys {
        for c in key.chars() {
            *counts.entry(c).or_insert(0) += 1;
        }
    }
    let total = counts.len();
    let mut by_count: Vec<(char, u64)> = counts.into_iter().collect();
    by_count.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    by_count.truncate(MAX_LETTERS);
    if total > MAX_LETTERS {
        info!(
            distinct = total,
            dropped = total - MAX_LETTERS,
            "alphabet capped; keys using dropped characters are unreachable exactly"
        );
    }
    by_count.into_iter().map(|(c, _)| c).collect()
}

struct AddedKeys {
    keys: BTreeSet<String>,
    payloads: HashMap<String, u64>,
}

/// Two immutable tries built at load time plus an incremental trie that is
/// rebuilt from scratch on each (rare, administrative) addition. Readers
/// clone the incremental trie's pointer under a reader lock and query
/// outside it; writers swap a freshly built trie under the writer side, so
/// a torn trie can never be observed.
pub struct CtrieDatabase {
    thin: CompressedTrie,
    wide: CompressedTrie,
    new_trie: RwLock<Arc<CompressedTrie>>,
    added: Mutex<AddedKeys>,
}

impl CtrieDatabase {
    /// Partition keys by character set, pick the wide alphabet by
    /// frequency, and build both tries.
    pub fn build<I>(entries: I) -> TaxonomyResult<CtrieDatabase>
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut payloads: HashMap<String, u64> = HashMap::new();
        let mut thin_keys: Vec<String> = Vec::new();
        let mut wide_keys: Vec<String> = Vec::new();
        for (key, payload) in entries {
            if key.is_empty() {
                continue;
            }
            if is_thin_key(&key) {
                thin_keys.push(key.clone());
            } else {
                wide_keys.push(key.clone());
            }
            payloads.insert(key, payload);
        }
        info!(
            thin = thin_keys.len(),
            wide = wide_keys.len(),
            "building trie database"
        );

        let thin_alphabet: BTreeSet<char> =
            thin_keys.iter().flat_map(|k| k.chars()).collect();
        let wide_alphabet = most_frequent_letters(wide_keys.iter().map(|k| k.as_str()));

        let thin = CompressedTrie::build(&thin_keys, thin_alphabet, &payloads)?;
        let wide = CompressedTrie::build(&wide_keys, wide_alphabet, &payloads)?;
        let new_trie = CompressedTrie::build(
            Vec::<&str>::new(),
            THIN_ALLOW_LIST.chars().take(MAX_LETTERS),
            &payloads,
        )?;

        Ok(CtrieDatabase {
            thin,
            wide,
            new_trie: RwLock::new(Arc::new(new_trie)),
            added: Mutex::new(AddedKeys {
                keys: BTreeSet::new(),
                payloads: HashMap::new(),
            }),
        })
    }

    /// (thin, wide, incremental) key counts.
    pub fn key_counts(&self) -> (usize, usize, usize) {
        (
            self.thin.key_count(),
            self.wide.key_count(),
            self.new_trie.read().key_count(),
        )
    }

    fn incremental(&self) -> Arc<CompressedTrie> {
        self.new_trie.read().clone()
    }

    /// Fuzzy fan-out with the length-derived distance bound.
    pub fn fuzzy_query(&self, query: &str) -> Vec<FuzzyMatch> {
        self.fuzzy_query_with_dist(query, max_dist_for_query_length(query.chars().count()))
    }

    /// Fuzzy fan-out with an explicit bound. The same query is encoded
    /// separately against each trie's alphabet; the union is ordered by
    /// nearness with duplicate keys collapsed to their best hit.
    pub fn fuzzy_query_with_dist(&self, query: &str, max_dist: u32) -> Vec<FuzzyMatch> {
        let mut hits = self.thin.fuzzy_matches(query, max_dist);
        hits.extend(self.wide.fuzzy_matches(query, max_dist));
        hits.extend(self.incremental().fuzzy_matches(query, max_dist));
        hits.sort_by(FuzzyMatch::nearness);
        hits.dedup_by(|b, a| a.name == b.name);
        hits
    }

    /// Exact matching via the distance-0 fuzzy pathway, so case-equivalent
    /// letters still match.
    pub fn exact_query(&self, query: &str) -> Vec<FuzzyMatch> {
        self.fuzzy_query_with_dist(query, 0)
    }

    /// Prefix fan-out, lexicographically sorted.
    pub fn prefix_query(&self, query: &str) -> Vec<String> {
        let mut out = self.thin.prefix_matches(query);
        out.extend(self.wide.prefix_matches(query));
        out.extend(self.incremental().prefix_matches(query));
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Payload id for a key, whichever trie holds it.
    pub fn payload_for(&self, key: &str) -> Option<u64> {
        self.thin
            .payload_for(key)
            .or_else(|| self.wide.payload_for(key))
            .or_else(|| self.incremental().payload_for(key))
    }

    /// Insert a key into the backing set and rebuild the incremental trie.
    /// The rebuild happens outside the writer lock; only the pointer swap
    /// takes it. Additions are administrative, so rebuild cost is fine.
    pub fn add_key(&self, key: &str, payload: u64) -> TaxonomyResult<()> {
        let mut added = self.added.lock();
        added.keys.insert(key.to_string());
        added.payloads.insert(key.to_string(), payload);
        debug!(keys = added.keys.len(), "rebuilding incremental trie");

        let alphabet = most_frequent_letters(added.keys.iter().map(|k| k.as_str()));
        let rebuilt =
            CompressedTrie::build(added.keys.iter(), alphabet, &added.payloads)?;
        *self.new_trie.write() = Arc::new(rebuilt);
        Ok(())
    }
}
