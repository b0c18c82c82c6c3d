//! Boolean taxon properties and the policy masks derived from them.
//!
//! Flags arrive as a comma-separated token list in the `flags` column of the
//! taxonomy file. The recognized vocabulary is closed; a `FlagSet` packs one
//! bit per token so per-taxon storage stays at a single word.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonFlag {
    NotOtu,
    Environmental,
    EnvironmentalInherited,
    Viral,
    Hidden,
    HiddenInherited,
    WasContainer,
    Inconsistent,
    IncertaeSedis,
    IncertaeSedisInherited,
    Extinct,
    ExtinctInherited,
    MajorRankConflict,
    MajorRankConflictInherited,
    Unclassified,
    UnclassifiedInherited,
    Unplaced,
    UnplacedInherited,
    Hybrid,
    Infraspecific,
    SiblingHigher,
    SiblingLower,
    Merged,
    Edited,
    ForcedVisible,
    Barren,
}

/// All recognized flags, in bit order.
pub const ALL_FLAGS: [TaxonFlag; 26] = [
    TaxonFlag::NotOtu,
    TaxonFlag::Environmental,
    TaxonFlag::EnvironmentalInherited,
    TaxonFlag::Viral,
    TaxonFlag::Hidden,
    TaxonFlag::HiddenInherited,
    TaxonFlag::WasContainer,
    TaxonFlag::Inconsistent,
    TaxonFlag::IncertaeSedis,
    TaxonFlag::IncertaeSedisInherited,
    TaxonFlag::Extinct,
    TaxonFlag::ExtinctInherited,
    TaxonFlag::MajorRankConflict,
    TaxonFlag::MajorRankConflictInherited,
    TaxonFlag::Unclassified,
    TaxonFlag::UnclassifiedInherited,
    TaxonFlag::Unplaced,
    TaxonFlag::UnplacedInherited,
    TaxonFlag::Hybrid,
    TaxonFlag::Infraspecific,
    TaxonFlag::SiblingHigher,
    TaxonFlag::SiblingLower,
    TaxonFlag::Merged,
    TaxonFlag::Edited,
    TaxonFlag::ForcedVisible,
    TaxonFlag::Barren,
];

impl TaxonFlag {
    pub fn token(&self) -> &'static str {
        match self {
            TaxonFlag::NotOtu => "not_otu",
            TaxonFlag::Environmental => "environmental",
            TaxonFlag::EnvironmentalInherited => "environmental_inherited",
            TaxonFlag::Viral => "viral",
            TaxonFlag::Hidden => "hidden",
            TaxonFlag::HiddenInherited => "hidden_inherited",
            TaxonFlag::WasContainer => "was_container",
            TaxonFlag::Inconsistent => "inconsistent",
            TaxonFlag::IncertaeSedis => "incertae_sedis",
            TaxonFlag::IncertaeSedisInherited => "incertae_sedis_inherited",
            TaxonFlag::Extinct => "extinct",
            TaxonFlag::ExtinctInherited => "extinct_inherited",
            TaxonFlag::MajorRankConflict => "major_rank_conflict",
            TaxonFlag::MajorRankConflictInherited => "major_rank_conflict_inherited",
            TaxonFlag::Unclassified => "unclassified",
            TaxonFlag::UnclassifiedInherited => "unclassified_inherited",
            TaxonFlag::Unplaced => "unplaced",
            TaxonFlag::UnplacedInherited => "unplaced_inherited",
            TaxonFlag::Hybrid => "hybrid",
            TaxonFlag::Infraspecific => "infraspecific",
            TaxonFlag::SiblingHigher => "sibling_higher",
            TaxonFlag::SiblingLower => "sibling_lower",
            TaxonFlag::Merged => "merged",
            TaxonFlag::Edited => "edited",
            TaxonFlag::ForcedVisible => "forced_visible",
            TaxonFlag::Barren => "barren",
        }
    }

    fn bit(&self) -> u32 {
        1 << ALL_FLAGS.iter().position(|f| f == self).unwrap()
    }
}

impl FromStr for TaxonFlag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_FLAGS
            .iter()
            .find(|f| f.token() == s)
            .copied()
            .ok_or(())
    }
}

impl fmt::Display for TaxonFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Fixed-width set of taxon flags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagSet(u32);

impl FlagSet {
    pub const EMPTY: FlagSet = FlagSet(0);

    pub fn of(flags: &[TaxonFlag]) -> Self {
        let mut set = FlagSet::EMPTY;
        for f in flags {
            set.insert(*f);
        }
        set
    }

    /// Parse a comma-separated token list. Unknown tokens are skipped, so a
    /// taxonomy release with a new flag still loads.
    pub fn parse(list: &str) -> Self {
        let mut set = FlagSet::EMPTY;
        for token in list.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.parse::<TaxonFlag>() {
                Ok(flag) => set.insert(flag),
                Err(()) => debug!(token, "ignoring unrecognized taxon flag"),
            }
        }
        set
    }

    pub fn insert(&mut self, flag: TaxonFlag) {
        self.0 |= flag.bit();
    }

    pub fn contains(&self, flag: TaxonFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn intersects(&self, other: FlagSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = TaxonFlag> + '_ {
        ALL_FLAGS.iter().copied().filter(|f| self.contains(*f))
    }

    /// Flag tokens in bit order, ready for a result record.
    pub fn tokens(&self) -> Vec<String> {
        self.iter().map(|f| f.token().to_string()).collect()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for flag in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{}", flag)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlagSet({})", self)
    }
}

/// Default policy mask: taxa carrying any of these flags are left out of
/// name-resolution results unless the caller opts in.
pub fn default_tnrs_suppression() -> FlagSet {
    FlagSet::of(&[
        TaxonFlag::NotOtu,
        TaxonFlag::Environmental,
        TaxonFlag::EnvironmentalInherited,
        TaxonFlag::Viral,
        TaxonFlag::Hidden,
        TaxonFlag::HiddenInherited,
        TaxonFlag::WasContainer,
    ])
}

/// Default policy mask: taxa excluded when building the synthetic tree.
pub fn default_synthesis_suppression() -> FlagSet {
    FlagSet::of(&[
        TaxonFlag::NotOtu,
        TaxonFlag::Environmental,
        TaxonFlag::EnvironmentalInherited,
        TaxonFlag::Viral,
        TaxonFlag::Hidden,
        TaxonFlag::HiddenInherited,
        TaxonFlag::WasContainer,
        TaxonFlag::Inconsistent,
        TaxonFlag::IncertaeSedis,
        TaxonFlag::IncertaeSedisInherited,
        TaxonFlag::Extinct,
        TaxonFlag::ExtinctInherited,
        TaxonFlag::MajorRankConflict,
        TaxonFlag::MajorRankConflictInherited,
        TaxonFlag::Unclassified,
        TaxonFlag::UnclassifiedInherited,
        TaxonFlag::Unplaced,
        TaxonFlag::UnplacedInherited,
        TaxonFlag::Hybrid,
        TaxonFlag::Merged,
        TaxonFlag::Barren,
    ])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_round_trips() {
        let set = FlagSet::parse("extinct,incertae_sedis,hybrid");
        assert!(set.contains(TaxonFlag::Extinct));
        assert!(set.contains(TaxonFlag::IncertaeSedis));
        assert!(set.contains(TaxonFlag::Hybrid));
        assert!(!set.contains(TaxonFlag::Viral));
        assert_eq!(set.to_string(), "incertae_sedis,extinct,hybrid");
        assert_eq!(FlagSet::parse(&set.to_string()), set);
    }

    #[test]
    fn unknown_tokens_are_skipped() {
        let set = FlagSet::parse("extinct, nonsense_flag ,environmental");
        assert!(set.contains(TaxonFlag::Extinct));
        assert!(set.contains(TaxonFlag::Environmental));
        assert_eq!(set.iter().count(), 2);
    }

    #[test]
    fn empty_list_is_empty_set() {
        assert!(FlagSet::parse("").is_empty());
        assert_eq!(FlagSet::default(), FlagSet::EMPTY);
    }

    #[test]
    fn policy_masks_do_not_overlap_unexpectedly() {
        let tnrs = default_tnrs_suppression();
        let synth = default_synthesis_suppression();
        // everything hidden from TNRS is also cleaned out of synthesis
        for flag in tnrs.iter() {
            assert!(synth.contains(flag), "{} missing from synthesis mask", flag);
        }
        assert!(!tnrs.contains(TaxonFlag::Extinct));
        assert!(synth.contains(TaxonFlag::Unplaced));
    }

    #[test]
    fn intersects_matches_contains() {
        let a = FlagSet::of(&[TaxonFlag::Hidden, TaxonFlag::Extinct]);
        let b = FlagSet::of(&[TaxonFlag::Extinct]);
        assert!(a.intersects(b));
        assert!(!b.intersects(FlagSet::of(&[TaxonFlag::Viral])));
    }
}
