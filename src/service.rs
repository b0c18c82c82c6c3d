//! The operation surface exposed to web and command-line collaborators.
//!
//! Every operation maps typed inputs to a typed, serializable record; how
//! those records reach the wire (JSON or otherwise) is the collaborator's
//! concern. All operations are pure reads against the frozen taxonomy and
//! tries, apart from the incremental trie behind its writer lock.
use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::base::{LoadOptions, TaxonId, TaxonView, TaxonomyStore};
use crate::errors::{Error, ErrorKind, TaxonomyResult};
use crate::flags::ALL_FLAGS;
use crate::formats::newick::{newick_string, LabelStyle};
use crate::formats::ott::load_ott_dir;
use crate::tnrs::{NameResolution, TnrsIndex};

/// Subtree export refuses anything larger than this many tips.
const NEWICK_TIP_LIMIT: usize = 25_000;

/// The single process-wide root object owning the taxonomy and its tries.
/// Lifecycle is `init -> serve -> drop`; there is no re-init path.
pub struct ServiceState {
    taxonomy: TaxonomyStore,
    tnrs: TnrsIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct About {
    pub version: String,
    pub version_number: String,
    pub taxon_count: usize,
    pub synonym_count: usize,
    pub name_count: usize,
    pub suppressed_from_tnrs_count: usize,
    pub suppress_from_tnrs_flags: Vec<String>,
    pub suppress_from_synthesis_flags: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TaxonRecord {
    pub ott_id: TaxonId,
    pub name: String,
    pub unique_name: String,
    pub rank: String,
    pub tax_sources: Vec<String>,
    pub flags: Vec<String>,
    pub synonyms: Vec<String>,
    pub is_suppressed: bool,
    pub is_suppressed_from_synth: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TaxonInfoOptions {
    pub include_lineage: bool,
    pub include_children: bool,
    pub include_terminal_descendants: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct TaxonInfo {
    #[serde(flatten)]
    pub record: TaxonRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineage: Option<Vec<TaxonRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TaxonRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_descendants: Option<Vec<TaxonId>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TaxonMatchRecord {
    pub taxon: TaxonRecord,
    pub score: f32,
    pub is_synonym: bool,
    pub matched_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchedNameResult {
    pub name: String,
    pub is_approximate_match: bool,
    pub matches: Vec<TaxonMatchRecord>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchNamesResponse {
    pub context_name: &'static str,
    pub context_ott_id: TaxonId,
    pub governing_code: &'static str,
    pub context_inferred: bool,
    pub ambiguous_names: Vec<String>,
    pub results: Vec<MatchedNameResult>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AutocompleteRecord {
    pub ott_id: TaxonId,
    pub unique_name: String,
    pub is_synonym: bool,
    pub is_suppressed: bool,
    pub is_higher: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct InferContextResponse {
    pub context_name: &'static str,
    pub context_ott_id: TaxonId,
    pub ambiguous_names: Vec<String>,
}

impl ServiceState {
    /// Load the taxonomy files from `directory` and index them. Fatal on
    /// any parse problem: a partial service is never published.
    pub fn init<P: AsRef<Path>>(directory: P, options: LoadOptions) -> TaxonomyResult<ServiceState> {
        let taxonomy = load_ott_dir(directory, options)?;
        Self::new(taxonomy)
    }

    /// Index an already-loaded taxonomy.
    pub fn new(taxonomy: TaxonomyStore) -> TaxonomyResult<ServiceState> {
        let tnrs = TnrsIndex::build(&taxonomy)?;
        info!(
            taxa = taxonomy.taxon_count(),
            names = tnrs.name_count(),
            "service state ready"
        );
        Ok(ServiceState { taxonomy, tnrs })
    }

    pub fn taxonomy(&self) -> &TaxonomyStore {
        &self.taxonomy
    }

    pub fn tnrs(&self) -> &TnrsIndex {
        &self.tnrs
    }

    fn record_for(&self, taxon: TaxonView<'_>) -> TaxonRecord {
        TaxonRecord {
            ott_id: taxon.id(),
            name: taxon.name().to_string(),
            unique_name: taxon.uniqname().to_string(),
            rank: taxon.rank().to_string(),
            tax_sources: taxon.source_refs().iter().map(|s| s.to_string()).collect(),
            flags: taxon.flags().tokens(),
            synonyms: taxon.junior_synonyms().map(|s| s.name.clone()).collect(),
            is_suppressed: self.taxonomy.is_suppressed_from_tnrs(taxon.id()),
            is_suppressed_from_synth: self.taxonomy.is_suppressed_from_synthesis(taxon.id()),
        }
    }

    pub fn about(&self) -> About {
        About {
            version: self.taxonomy.version().to_string(),
            version_number: self.taxonomy.version_number().to_string(),
            taxon_count: self.taxonomy.taxon_count(),
            synonym_count: self.taxonomy.synonym_count(),
            name_count: self.tnrs.name_count(),
            suppressed_from_tnrs_count: self.taxonomy.suppressed_from_tnrs_count(),
            suppress_from_tnrs_flags: self.taxonomy.tnrs_suppression_mask().tokens(),
            suppress_from_synthesis_flags: self.taxonomy.synthesis_suppression_mask().tokens(),
        }
    }

    /// The taxon record plus whichever derived fields the caller asked
    /// for. `None` when the id is unknown.
    pub fn taxon_info(&self, id: TaxonId, options: TaxonInfoOptions) -> Option<TaxonInfo> {
        let taxon = self.taxonomy.taxon_by_id(id)?;
        let lineage = options
            .include_lineage
            .then(|| taxon.ancestors().map(|a| self.record_for(a)).collect());
        let children = options
            .include_children
            .then(|| taxon.children().map(|c| self.record_for(c)).collect());
        let terminal_descendants = if options.include_terminal_descendants {
            self.taxonomy.terminal_descendants(id).ok()
        } else {
            None
        };
        Some(TaxonInfo {
            record: self.record_for(taxon),
            lineage,
            children,
            terminal_descendants,
        })
    }

    /// Newick export of the subtree under `id`. `None` for unknown ids;
    /// oversized subtrees are refused rather than truncated.
    pub fn taxon_subtree(
        &self,
        id: TaxonId,
        style: LabelStyle,
    ) -> TaxonomyResult<Option<String>> {
        if self.taxonomy.taxon_by_id(id).is_none() {
            return Ok(None);
        }
        let tips = self.taxonomy.terminal_descendants(id)?;
        if tips.len() > NEWICK_TIP_LIMIT {
            return Err(Error::new(ErrorKind::InputTooLarge {
                given: tips.len(),
                limit: NEWICK_TIP_LIMIT,
            }));
        }
        Ok(Some(newick_string(&self.taxonomy, id, style)?))
    }

    pub fn taxon_mrca(&self, ids: &[TaxonId]) -> TaxonomyResult<TaxonRecord> {
        let mrca = self.taxonomy.mrca(ids)?;
        let view = self
            .taxonomy
            .taxon_by_id(mrca)
            .ok_or_else(|| Error::new(ErrorKind::Internal("mrca not in taxonomy".into())))?;
        Ok(self.record_for(view))
    }

    pub fn tnrs_match_names(
        &self,
        names: &[String],
        context_name: Option<&str>,
        approximate: bool,
        include_suppressed: bool,
    ) -> TaxonomyResult<MatchNamesResponse> {
        let outcome = self.tnrs.match_names(
            &self.taxonomy,
            names,
            context_name,
            approximate,
            include_suppressed,
        )?;
        let results = outcome
            .results
            .into_iter()
            .map(|res| self.decorate_resolution(res))
            .collect();
        Ok(MatchNamesResponse {
            context_name: outcome.context.name,
            context_ott_id: outcome.context.ott_id,
            governing_code: outcome.context.code.name(),
            context_inferred: outcome.context_inferred,
            ambiguous_names: outcome.ambiguous_names,
            results,
        })
    }

    fn decorate_resolution(&self, res: NameResolution) -> MatchedNameResult {
        let matches = res
            .matches
            .into_iter()
            .filter_map(|m| {
                self.taxonomy.taxon_by_id(m.taxon).map(|view| TaxonMatchRecord {
                    taxon: self.record_for(view),
                    score: m.score,
                    is_synonym: m.is_synonym,
                    matched_name: m.matched_name,
                })
            })
            .collect();
        MatchedNameResult {
            name: res.name,
            is_approximate_match: res.is_approximate_match,
            matches,
        }
    }

    pub fn tnrs_autocomplete_name(
        &self,
        prefix: &str,
        context_name: Option<&str>,
        include_suppressed: bool,
    ) -> TaxonomyResult<Vec<AutocompleteRecord>> {
        let hits =
            self.tnrs
                .autocomplete(&self.taxonomy, prefix, context_name, include_suppressed)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.taxonomy.taxon_by_id(hit.taxon).map(|view| AutocompleteRecord {
                    ott_id: hit.taxon,
                    unique_name: view.uniqname().to_string(),
                    is_synonym: hit.is_synonym,
                    is_suppressed: self.taxonomy.is_suppressed_from_tnrs(hit.taxon),
                    is_higher: !view.is_tip(),
                })
            })
            .collect())
    }

    /// The closed context set, grouped by super-group.
    pub fn tnrs_contexts(&self) -> BTreeMap<&'static str, Vec<&'static str>> {
        let mut grouped: BTreeMap<&'static str, Vec<&'static str>> = BTreeMap::new();
        for context in crate::tnrs::context::ALL_CONTEXTS.iter() {
            grouped.entry(context.group).or_default().push(context.name);
        }
        grouped
    }

    pub fn tnrs_infer_context(&self, names: &[String]) -> InferContextResponse {
        let (context, ambiguous_names) = self.tnrs.infer_context(&self.taxonomy, names);
        InferContextResponse {
            context_name: context.name,
            context_ott_id: context.ott_id,
            ambiguous_names,
        }
    }

    /// Every recognized flag token.
    pub fn flags(&self) -> Vec<&'static str> {
        ALL_FLAGS.iter().map(|f| f.token()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::test::fixture_store;

    fn service() -> ServiceState {
        ServiceState::new(fixture_store()).unwrap()
    }

    fn strs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn about_reports_versions_counts_and_masks() {
        let svc = service();
        let about = svc.about();
        assert_eq!(about.version, "ott3.3draft1");
        assert_eq!(about.version_number, "3.3");
        assert_eq!(about.taxon_count, 23);
        assert_eq!(about.synonym_count, 3);
        assert!(about.name_count >= about.taxon_count);
        assert_eq!(about.suppressed_from_tnrs_count, 1);
        assert!(about
            .suppress_from_tnrs_flags
            .contains(&"environmental".to_string()));
        assert!(about
            .suppress_from_synthesis_flags
            .contains(&"extinct".to_string()));
        // records serialize without custom glue
        assert!(serde_json::to_string(&about).unwrap().contains("ott3.3draft1"));
    }

    #[test]
    fn mrca_of_the_hominines_is_homininae() {
        let svc = service();
        let record = svc
            .taxon_mrca(&[TaxonId(770315), TaxonId(417950), TaxonId(417957)])
            .unwrap();
        assert_eq!(record.name, "Homininae");
        assert_eq!(record.ott_id, TaxonId(312031));
    }

    #[test]
    fn fuzzy_match_names_finds_misspelled_homo_sapiens() {
        let svc = service();
        for query in ["Homa sapiens", "Homoo sapiens"] {
            let response = svc
                .tnrs_match_names(&strs(&[query]), None, true, false)
                .unwrap();
            let result = &response.results[0];
            assert!(result.is_approximate_match, "{}", query);
            let top = &result.matches[0];
            assert_eq!(top.taxon.ott_id, TaxonId(770315), "{}", query);
            assert_eq!(top.matched_name, "homo sapiens");
            assert!((top.score - 11.0 / 12.0).abs() < 1e-6);
        }
    }

    #[test]
    fn case_mangled_exact_match_is_perfect() {
        let svc = service();
        let response = svc
            .tnrs_match_names(&strs(&["hOMO sApIeNs"]), None, false, false)
            .unwrap();
        let result = &response.results[0];
        assert!(!result.is_approximate_match);
        let top = &result.matches[0];
        assert_eq!(top.taxon.ott_id, TaxonId(770315));
        assert!((top.score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn autocompletion_surfaces_the_aster_clade_in_order() {
        let svc = service();
        let records = svc.tnrs_autocomplete_name("Aster", None, false).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.unique_name.as_str()).collect();
        let expected = ["Aster", "Asteraceae", "Asterales", "Asteridae"];
        let positions: Vec<usize> = expected
            .iter()
            .map(|e| {
                names
                    .iter()
                    .position(|n| n == e)
                    .unwrap_or_else(|| panic!("{} missing from {:?}", e, names))
            })
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted, "not in lexicographic order: {:?}", names);
        let aster = records.iter().find(|r| r.unique_name == "Aster").unwrap();
        assert!(aster.is_higher);
        assert!(!aster.is_synonym);
        assert!(!aster.is_suppressed);
    }

    #[test]
    fn context_inference_returns_asterales() {
        let svc = service();
        let response = svc.tnrs_infer_context(&strs(&["Aster", "Symphyotrichum"]));
        assert_eq!(response.context_name, "Asterales");
        assert_eq!(response.context_ott_id, TaxonId(1042120));
        assert!(response.ambiguous_names.is_empty());
    }

    #[test]
    fn unmatched_names_yield_empty_matches_without_error() {
        let svc = service();
        let response = svc
            .tnrs_match_names(&strs(&["NotATaxon12345"]), None, false, false)
            .unwrap();
        assert_eq!(response.results.len(), 1);
        assert!(response.results[0].matches.is_empty());
        assert_eq!(response.context_name, "All life");
    }

    #[test]
    fn taxon_info_gathers_derived_fields_on_request() {
        let svc = service();
        let bare = svc.taxon_info(TaxonId(770315), TaxonInfoOptions::default()).unwrap();
        assert_eq!(bare.record.name, "Homo sapiens");
        assert_eq!(bare.record.rank, "species");
        assert!(bare.lineage.is_none());
        assert!(bare.children.is_none());
        assert!(bare.record.tax_sources.contains(&"ncbi:9606".to_string()));
        assert_eq!(
            bare.record.synonyms,
            vec!["Homo sapien".to_string(), "human".to_string()]
        );

        let full = svc
            .taxon_info(
                TaxonId(312031),
                TaxonInfoOptions {
                    include_lineage: true,
                    include_children: true,
                    include_terminal_descendants: true,
                },
            )
            .unwrap();
        let lineage = full.lineage.unwrap();
        assert_eq!(lineage.first().unwrap().name, "Primates");
        assert_eq!(lineage.last().unwrap().name, "life");
        let children = full.children.unwrap();
        assert_eq!(children.len(), 4);
        assert_eq!(children[0].name, "Homo");
        let tips = full.terminal_descendants.unwrap();
        assert!(tips.contains(&TaxonId(417957)));

        assert!(svc.taxon_info(TaxonId(1), TaxonInfoOptions::default()).is_none());
    }

    #[test]
    fn subtree_export_honors_label_styles() {
        let svc = service();
        let newick = svc
            .taxon_subtree(TaxonId(770309), LabelStyle::Id)
            .unwrap()
            .unwrap();
        assert_eq!(newick, "(ott770315)ott770309;");
        let newick = svc
            .taxon_subtree(TaxonId(770309), LabelStyle::NameAndId)
            .unwrap()
            .unwrap();
        assert!(newick.contains("'Homo sapiens ott770315'"));
        assert!(svc.taxon_subtree(TaxonId(1), LabelStyle::Id).unwrap().is_none());
    }

    #[test]
    fn contexts_are_grouped_by_super_group() {
        let svc = service();
        let grouped = svc.tnrs_contexts();
        assert_eq!(grouped.len(), 5);
        assert!(grouped["PLANTS"].contains(&"Asterales"));
        assert!(grouped["ANIMALS"].contains(&"Mammals"));
        assert_eq!(grouped["LIFE"], vec!["All life"]);
    }

    #[test]
    fn flag_listing_is_complete() {
        let svc = service();
        let flags = svc.flags();
        assert_eq!(flags.len(), 26);
        assert!(flags.contains(&"extinct"));
        assert!(flags.contains(&"incertae_sedis"));
        assert!(flags.contains(&"not_otu"));
    }

    #[test]
    fn foreign_id_lookups_resolve_through_the_store() {
        let svc = service();
        let view = svc.taxonomy().taxon_by_foreign("ncbi", 9606).unwrap().unwrap();
        assert_eq!(view.id(), TaxonId(770315));
        assert!(svc.taxonomy().taxon_by_foreign("bogus", 1).is_err());
    }

    #[test]
    fn match_names_serializes_to_json() {
        let svc = service();
        let response = svc
            .tnrs_match_names(&strs(&["Homo sapiens"]), Some("Animals"), false, false)
            .unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["context_name"], "Animals");
        assert_eq!(json["governing_code"], "ICZN");
        assert_eq!(
            json["results"][0]["matches"][0]["taxon"]["ott_id"],
            770315
        );
    }
}
