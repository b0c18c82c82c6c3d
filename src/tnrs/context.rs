//! The closed set of name-resolution contexts: pre-registered clades used
//! to restrict resolution to a subtree of the taxonomy, each tied to the
//! nomenclatural code governing its names.
use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::Serialize;

use crate::base::TaxonId;
use crate::errors::{Error, ErrorKind, TaxonomyResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NomenclatureCode {
    #[serde(rename = "ICN")]
    Icn,
    #[serde(rename = "ICNP")]
    Icnp,
    #[serde(rename = "ICZN")]
    Iczn,
    #[serde(rename = "undefined")]
    Undefined,
}

impl NomenclatureCode {
    pub fn name(&self) -> &'static str {
        match self {
            NomenclatureCode::Icn => "ICN",
            NomenclatureCode::Icnp => "ICNP",
            NomenclatureCode::Iczn => "ICZN",
            NomenclatureCode::Undefined => "undefined",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            NomenclatureCode::Icn => "plants, fungi, and some protists",
            NomenclatureCode::Icnp => "bacteria",
            NomenclatureCode::Iczn => "animals",
            NomenclatureCode::Undefined => {
                "governing code unclear, nonexistent, or multiple codes"
            }
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Context {
    pub name: &'static str,
    pub group: &'static str,
    pub name_suffix: &'static str,
    pub lica_node_name: &'static str,
    pub ott_id: TaxonId,
    pub code: NomenclatureCode,
}

const fn ctx(
    name: &'static str,
    group: &'static str,
    name_suffix: &'static str,
    lica_node_name: &'static str,
    ott_id: u32,
    code: NomenclatureCode,
) -> Context {
    Context {
        name,
        group,
        name_suffix,
        lica_node_name,
        ott_id: TaxonId(ott_id),
        code,
    }
}

use NomenclatureCode::{Icn, Icnp, Iczn, Undefined};

pub static ALL_CONTEXTS: [Context; 48] = [
    ctx("All life", "LIFE", "", "life", 805080, Undefined),
    // MICROBES group
    ctx("Bacteria", "MICROBES", "Bacteria", "Bacteria", 844192, Icnp),
    ctx("SAR group", "MICROBES", "SAR", "SAR", 5246039, Undefined),
    ctx("Archaea", "MICROBES", "Archaea", "Archaea", 996421, Icnp),
    ctx("Excavata", "MICROBES", "Excavata", "Excavata", 2927065, Undefined),
    ctx("Amoebozoa", "MICROBES", "Amoebae", "Amoebozoa", 1064655, Iczn),
    ctx("Centrohelida", "MICROBES", "Centrohelida", "Centrohelida", 755852, Iczn),
    ctx("Haptophyta", "MICROBES", "Haptophyta", "Haptophyta", 151014, Undefined),
    ctx("Apusozoa", "MICROBES", "Apusozoa", "Apusozoa", 671092, Iczn),
    ctx("Diatoms", "MICROBES", "Diatoms", "Bacillariophyta", 5342311, Icn),
    ctx("Ciliates", "MICROBES", "Ciliates", "Ciliophora", 302424, Undefined),
    ctx("Forams", "MICROBES", "Forams", "Foraminifera", 936399, Iczn),
    // ANIMALS group
    ctx("Animals", "ANIMALS", "Animals", "Metazoa", 691846, Iczn),
    ctx("Birds", "ANIMALS", "Birds", "Aves", 81461, Iczn),
    ctx("Tetrapods", "ANIMALS", "Tetrapods", "Tetrapoda", 229562, Iczn),
    ctx("Mammals", "ANIMALS", "Mammals", "Mammalia", 244265, Iczn),
    ctx("Amphibians", "ANIMALS", "Amphibians", "Amphibia", 544595, Iczn),
    ctx("Vertebrates", "ANIMALS", "Vertebrates", "Vertebrata", 801601, Iczn),
    ctx("Arthropods", "ANIMALS", "Arthopods", "Arthropoda", 632179, Iczn),
    ctx("Molluscs", "ANIMALS", "Molluscs", "Mollusca", 802117, Iczn),
    ctx("Nematodes", "ANIMALS", "Nematodes", "Nematoda", 395057, Iczn),
    ctx("Platyhelminthes", "ANIMALS", "Platyhelminthes", "Platyhelminthes", 555379, Iczn),
    ctx("Annelids", "ANIMALS", "Annelids", "Annelida", 941620, Iczn),
    ctx("Cnidarians", "ANIMALS", "Cnidarians", "Cnidaria", 641033, Iczn),
    ctx("Arachnids", "ANIMALS", "Arachnids", "Arachnida", 511967, Iczn),
    ctx("Insects", "ANIMALS", "Insects", "Insecta", 1062253, Iczn),
    // FUNGI group
    ctx("Fungi", "FUNGI", "Fungi", "Fungi", 352914, Icn),
    ctx("Basidiomycetes", "FUNGI", "Basidiomycetes", "Basidiomycota", 634628, Icn),
    ctx("Ascomycetes", "FUNGI", "Ascomycota", "Ascomycota", 439373, Icn),
    // PLANTS group
    ctx("Land plants", "PLANTS", "Plants", "Embryophyta", 5342313, Icn),
    ctx("Hornworts", "PLANTS", "Anthocerotophyta", "Anthocerotophyta", 738980, Icn),
    ctx("Mosses", "PLANTS", "Bryophyta", "Bryophyta", 246594, Icn),
    ctx("Liverworts", "PLANTS", "Marchantiophyta", "Marchantiophyta", 56601, Icn),
    ctx("Vascular plants", "PLANTS", "Tracheophyta", "Tracheophyta", 10210, Icn),
    ctx("Club mosses", "PLANTS", "Lycopodiophyta", "Lycopodiophyta", 144803, Icn),
    ctx("Ferns", "PLANTS", "Moniliformopses", "Moniliformopses", 166292, Icn),
    ctx("Seed plants", "PLANTS", "Spermatophyta", "Spermatophyta", 10218, Icn),
    ctx("Flowering plants", "PLANTS", "Magnoliophyta", "Magnoliophyta", 99252, Icn),
    ctx("Monocots", "PLANTS", "Monocots", "Liliopsida", 1058517, Icn),
    ctx("Eudicots", "PLANTS", "Eudicots", "eudicotyledons", 431495, Icn),
    ctx("Rosids", "PLANTS", "Rosids", "rosids", 1008296, Icn),
    ctx("Asterids", "PLANTS", "Asterids", "asterids", 1008294, Icn),
    ctx("Asterales", "PLANTS", "Asterales", "Asterales", 1042120, Icn),
    ctx("Asteraceae", "PLANTS", "Asteraceae", "Asteraceae", 46248, Icn),
    ctx("Aster", "PLANTS", "Aster", "Aster", 409712, Icn),
    ctx("Symphyotrichum", "PLANTS", "Symphyotrichum", "Symphyotrichum", 1058735, Icn),
    ctx("Campanulaceae", "PLANTS", "Campanulaceae", "Campanulaceae", 1086303, Icn),
    ctx("Lobelia", "PLANTS", "Lobelia", "Lobelia", 1086294, Icn),
];

lazy_static! {
    pub static ref CONTEXT_BY_NAME: HashMap<&'static str, &'static Context> = ALL_CONTEXTS
        .iter()
        .map(|c| (c.name, c))
        .collect();
    pub static ref CONTEXT_BY_OTT_ID: HashMap<TaxonId, &'static Context> = ALL_CONTEXTS
        .iter()
        .map(|c| (c.ott_id, c))
        .collect();
}

pub fn life_context() -> &'static Context {
    CONTEXT_BY_NAME["All life"]
}

/// Look up a context by its registered name. Unknown tokens are a client
/// error, never a fallback to "All life".
pub fn context_named(name: &str) -> TaxonomyResult<&'static Context> {
    CONTEXT_BY_NAME
        .get(name)
        .copied()
        .ok_or_else(|| Error::new(ErrorKind::UnknownContext(name.to_string())))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn the_closed_set_is_indexed_both_ways() {
        assert_eq!(ALL_CONTEXTS.len(), 48);
        assert_eq!(CONTEXT_BY_NAME.len(), 48);
        assert_eq!(CONTEXT_BY_OTT_ID.len(), 48);
        let asterales = context_named("Asterales").unwrap();
        assert_eq!(asterales.ott_id, TaxonId(1042120));
        assert_eq!(asterales.group, "PLANTS");
        assert_eq!(asterales.code, NomenclatureCode::Icn);
        assert_eq!(
            CONTEXT_BY_OTT_ID[&TaxonId(691846)].name,
            "Animals"
        );
    }

    #[test]
    fn unknown_context_names_are_rejected() {
        let err = context_named("Middle-earth").unwrap_err();
        assert_eq!(
            *err.kind(),
            ErrorKind::UnknownContext("Middle-earth".to_string())
        );
    }

    #[test]
    fn life_is_the_fallback_context() {
        assert_eq!(life_context().name, "All life");
        assert_eq!(life_context().ott_id, TaxonId(805080));
        assert_eq!(life_context().code, NomenclatureCode::Undefined);
    }

    #[test]
    fn groups_cover_the_expected_super_groups() {
        let mut groups: Vec<&str> = ALL_CONTEXTS.iter().map(|c| c.group).collect();
        groups.sort_unstable();
        groups.dedup();
        assert_eq!(groups, vec!["ANIMALS", "FUNGI", "LIFE", "MICROBES", "PLANTS"]);
    }

    #[test]
    fn codes_render_their_wire_names() {
        assert_eq!(NomenclatureCode::Icn.name(), "ICN");
        assert_eq!(NomenclatureCode::Undefined.name(), "undefined");
        assert!(!NomenclatureCode::Iczn.description().is_empty());
    }
}
