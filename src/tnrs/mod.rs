//! The name-resolution pipeline: normalization, context inference, trie
//! resolution, scoring and ranking, and suppression policy.
pub mod context;

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use crate::base::{SynonymKind, TaxonId, TaxonomyStore};
use crate::ctrie::{CtrieDatabase, FuzzyMatch};
use crate::errors::{Error, ErrorKind, TaxonomyResult};
use crate::tnrs::context::{context_named, life_context, Context, CONTEXT_BY_OTT_ID};

/// Batch ceiling when fuzzy matching is off.
pub const MAX_NONFUZZY_QUERY_STRINGS: usize = 10_000;
/// Batch ceiling when fuzzy matching is on; fuzzy lookups are ~200x the
/// cost of exact ones.
pub const MAX_FUZZY_QUERY_STRINGS: usize = 250;

/// Keep at most this many ranked matches per query name.
const MAX_MATCHES_PER_NAME: usize = 30;

/// Score multiplier when the match went through a junior synonym rather
/// than a primary name.
const SYNONYM_DISCOUNT: f32 = 0.8;
/// Further multiplier for taxa in the TNRS suppression set when the caller
/// did not ask for them.
const SUPPRESSED_DISCOUNT: f32 = 0.5;

/// Matching form of a query or key: trimmed, inner whitespace collapsed,
/// NFC-normalized, lowercased. The original spelling is kept for display.
pub fn normalize_name(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.nfc().collect::<String>().to_lowercase()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameKind {
    Primary,
    Synonym(SynonymKind),
}

impl NameKind {
    pub fn is_synonym(&self) -> bool {
        matches!(self, NameKind::Synonym(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NameEntry {
    pub taxon: TaxonId,
    pub kind: NameKind,
}

/// All taxa sharing one normalized name string. Homonyms make this a list.
struct NameRecord {
    entries: Vec<NameEntry>,
}

/// One ranked hit for a query name.
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedMatch {
    pub taxon: TaxonId,
    pub score: f32,
    pub is_synonym: bool,
    /// The key that actually matched, in normalized form.
    pub matched_name: String,
}

/// The outcome for a single query name.
#[derive(Clone, Debug, Serialize)]
pub struct NameResolution {
    pub name: String,
    pub matches: Vec<ResolvedMatch>,
    /// False only when the top match is a perfect, unique, unsuppressed
    /// score-1.0 hit.
    pub is_approximate_match: bool,
}

#[derive(Debug)]
pub struct MatchNamesOutcome {
    pub context: &'static Context,
    pub context_inferred: bool,
    pub ambiguous_names: Vec<String>,
    pub results: Vec<NameResolution>,
}

#[derive(Clone, Debug)]
pub struct AutocompleteHit {
    pub taxon: TaxonId,
    pub matched_name: String,
    pub is_synonym: bool,
}

/// The taxonomy-indexed name resolver: the trie database plus the
/// name-record table its payload ids point into.
pub struct TnrsIndex {
    db: CtrieDatabase,
    records: Vec<NameRecord>,
    by_normalized: HashMap<String, u32>,
}

impl TnrsIndex {
    /// Collect every primary name, distinct uniqname, and junior synonym
    /// into name records and build the trie database over them.
    pub fn build(tax: &TaxonomyStore) -> TaxonomyResult<TnrsIndex> {
        let mut records: Vec<NameRecord> = Vec::new();
        let mut by_normalized: HashMap<String, u32> = HashMap::new();

        let mut push = |name: &str, entry: NameEntry| {
            let normalized = normalize_name(name);
            if normalized.is_empty() {
                return;
            }
            let ix = *by_normalized.entry(normalized).or_insert_with(|| {
                records.push(NameRecord { entries: Vec::new() });
                (records.len() - 1) as u32
            });
            let rec = &mut records[ix as usize];
            if !rec.entries.contains(&entry) {
                rec.entries.push(entry);
            }
        };

        for taxon in tax.taxa() {
            let entry = NameEntry {
                taxon: taxon.id(),
                kind: NameKind::Primary,
            };
            push(taxon.name(), entry);
            if taxon.uniqname() != taxon.name() {
                push(taxon.uniqname(), entry);
            }
            for syn in taxon.junior_synonyms() {
                push(
                    &syn.name,
                    NameEntry {
                        taxon: taxon.id(),
                        kind: NameKind::Synonym(syn.kind),
                    },
                );
            }
        }

        info!(names = records.len(), "building name-resolution index");
        let db = CtrieDatabase::build(
            by_normalized
                .iter()
                .map(|(name, ix)| (name.clone(), u64::from(*ix))),
        )?;
        Ok(TnrsIndex {
            db,
            records,
            by_normalized,
        })
    }

    pub fn name_count(&self) -> usize {
        self.records.len()
    }

    pub fn trie_database(&self) -> &CtrieDatabase {
        &self.db
    }

    /// Register an additional name at runtime (administrative path). The
    /// incremental trie absorbs it without touching the built tries.
    pub fn add_name(
        &mut self,
        name: &str,
        taxon: TaxonId,
        kind: NameKind,
    ) -> TaxonomyResult<()> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return Err(Error::new(ErrorKind::BadRequest("empty name".into())));
        }
        let ix = *self
            .by_normalized
            .entry(normalized.clone())
            .or_insert_with(|| {
                self.records.push(NameRecord { entries: Vec::new() });
                (self.records.len() - 1) as u32
            });
        let entry = NameEntry { taxon, kind };
        let rec = &mut self.records[ix as usize];
        if !rec.entries.contains(&entry) {
            rec.entries.push(entry);
        }
        self.db.add_key(&normalized, u64::from(ix))
    }

    /// Name entries matching `name` exactly (after normalization).
    pub fn exact_entries(&self, name: &str) -> &[NameEntry] {
        self.by_normalized
            .get(&normalize_name(name))
            .map(|ix| self.records[*ix as usize].entries.as_slice())
            .unwrap_or(&[])
    }

    fn entries_for_payload(&self, payload: u64) -> &[NameEntry] {
        self.records
            .get(payload as usize)
            .map(|r| r.entries.as_slice())
            .unwrap_or(&[])
    }

    /// Infer the least-inclusive context for a set of names: names that
    /// resolve exactly to a single unsuppressed taxon vote; the rest come
    /// back as ambiguous.
    pub fn infer_context(
        &self,
        tax: &TaxonomyStore,
        names: &[String],
    ) -> (&'static Context, Vec<String>) {
        let mut taxa: Vec<TaxonId> = Vec::new();
        let mut ambiguous: Vec<String> = Vec::new();
        for name in names {
            let mut distinct: Vec<TaxonId> = self
                .exact_entries(name)
                .iter()
                .map(|e| e.taxon)
                .filter(|t| !tax.is_suppressed_from_tnrs(*t))
                .collect();
            distinct.sort_unstable();
            distinct.dedup();
            if distinct.len() == 1 {
                taxa.push(distinct[0]);
            } else {
                ambiguous.push(name.clone());
            }
        }
        (least_inclusive_context(tax, &taxa), ambiguous)
    }

    /// Resolve one normalized name against the trie database, apply the
    /// scoring policy, and rank.
    fn resolve_name(
        &self,
        tax: &TaxonomyStore,
        normalized: &str,
        context_root: TaxonId,
        approximate: bool,
        include_suppressed: bool,
    ) -> Vec<ResolvedMatch> {
        let raw: Vec<FuzzyMatch> = if approximate {
            self.db.fuzzy_query(normalized)
        } else {
            self.db.exact_query(normalized)
        };

        let context_in_taxonomy = tax.taxon_by_id(context_root).is_some();
        let mut out: Vec<ResolvedMatch> = Vec::new();
        let mut seen: HashSet<(TaxonId, bool)> = HashSet::new();
        for hit in raw {
            let payload = match hit.payload.or_else(|| self.db.payload_for(&hit.name)) {
                Some(p) => p,
                None => continue,
            };
            for entry in self.entries_for_payload(payload) {
                // contexts restrict resolution to their subtree
                if context_in_taxonomy
                    && !tax
                        .is_ancestor_or_self(context_root, entry.taxon)
                        .unwrap_or(false)
                {
                    continue;
                }
                let suppressed = tax.is_suppressed_from_tnrs(entry.taxon);
                let mut score = hit.score;
                if entry.kind.is_synonym() {
                    score *= SYNONYM_DISCOUNT;
                }
                if suppressed && !include_suppressed {
                    score *= SUPPRESSED_DISCOUNT;
                }
                if !seen.insert((entry.taxon, entry.kind.is_synonym())) {
                    continue;
                }
                out.push(ResolvedMatch {
                    taxon: entry.taxon,
                    score,
                    is_synonym: entry.kind.is_synonym(),
                    matched_name: hit.name.clone(),
                });
            }
        }
        out.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.taxon.cmp(&b.taxon))
        });
        out.truncate(MAX_MATCHES_PER_NAME);
        out
    }

    /// The full match-names pipeline: limits, context, resolution,
    /// ranking.
    pub fn match_names(
        &self,
        tax: &TaxonomyStore,
        names: &[String],
        context_name: Option<&str>,
        approximate: bool,
        include_suppressed: bool,
    ) -> TaxonomyResult<MatchNamesOutcome> {
        if names.is_empty() {
            return Err(Error::new(ErrorKind::BadRequest(
                "no names supplied".to_string(),
            )));
        }
        let limit = if approximate {
            MAX_FUZZY_QUERY_STRINGS
        } else {
            MAX_NONFUZZY_QUERY_STRINGS
        };
        if names.len() > limit {
            return Err(Error::new(ErrorKind::InputTooLarge {
                given: names.len(),
                limit,
            }));
        }

        let (context, context_inferred, ambiguous_names) = match context_name {
            Some(name) => (context_named(name)?, false, Vec::new()),
            None => {
                let (ctx, ambiguous) = self.infer_context(tax, names);
                (ctx, true, ambiguous)
            }
        };

        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let normalized = normalize_name(name);
            let matches = self.resolve_name(
                tax,
                &normalized,
                context.ott_id,
                approximate,
                include_suppressed,
            );
            let is_approximate_match = match matches.first() {
                Some(top) => {
                    let unique_at_top = matches
                        .iter()
                        .filter(|m| (m.score - top.score).abs() < f32::EPSILON)
                        .count()
                        == 1;
                    !(top.score >= 1.0
                        && unique_at_top
                        && !tax.is_suppressed_from_tnrs(top.taxon))
                }
                None => true,
            };
            results.push(NameResolution {
                name: name.clone(),
                matches,
                is_approximate_match,
            });
        }
        Ok(MatchNamesOutcome {
            context,
            context_inferred,
            ambiguous_names,
            results,
        })
    }

    /// Prefix resolution for autocompletion: unique taxa whose names (or
    /// synonyms) extend the prefix, ordered by the matched key.
    pub fn autocomplete(
        &self,
        tax: &TaxonomyStore,
        prefix: &str,
        context_name: Option<&str>,
        include_suppressed: bool,
    ) -> TaxonomyResult<Vec<AutocompleteHit>> {
        let normalized = normalize_name(prefix);
        if normalized.is_empty() {
            return Err(Error::new(ErrorKind::BadRequest(
                "empty name prefix".to_string(),
            )));
        }
        let context = match context_name {
            Some(name) => context_named(name)?,
            None => life_context(),
        };
        let context_in_taxonomy = tax.taxon_by_id(context.ott_id).is_some();

        let mut out: Vec<AutocompleteHit> = Vec::new();
        let mut seen: HashSet<TaxonId> = HashSet::new();
        for key in self.db.prefix_query(&normalized) {
            let payload = match self.db.payload_for(&key) {
                Some(p) => p,
                None => continue,
            };
            for entry in self.entries_for_payload(payload) {
                if !include_suppressed && tax.is_suppressed_from_tnrs(entry.taxon) {
                    continue;
                }
                if context_in_taxonomy
                    && !tax
                        .is_ancestor_or_self(context.ott_id, entry.taxon)
                        .unwrap_or(false)
                {
                    continue;
                }
                if !seen.insert(entry.taxon) {
                    continue;
                }
                out.push(AutocompleteHit {
                    taxon: entry.taxon,
                    matched_name: key.clone(),
                    is_synonym: entry.kind.is_synonym(),
                });
            }
        }
        Ok(out)
    }
}

/// The narrowest registered context whose clade contains the MRCA of the
/// given taxa. Empty input or a walk that reaches an unregistered root
/// falls back to "All life".
pub fn least_inclusive_context(tax: &TaxonomyStore, taxa: &[TaxonId]) -> &'static Context {
    if taxa.is_empty() {
        return life_context();
    }
    let mrca = match tax.mrca(taxa) {
        Ok(id) => id,
        Err(_) => return life_context(),
    };
    let mut cursor = tax.taxon_by_id(mrca);
    while let Some(node) = cursor {
        if let Some(ctx) = CONTEXT_BY_OTT_ID.get(&node.id()) {
            return ctx;
        }
        cursor = node.parent();
    }
    life_context()
}
