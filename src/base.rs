//! The arena-backed taxonomy store and its id indexes.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{Error, ErrorKind, TaxonomyResult};
use crate::flags::{default_synthesis_suppression, default_tnrs_suppression, FlagSet};
use crate::taxonomy::Taxonomy;

/// Stable external identifier of a taxon, drawn from the taxonomy's id
/// space. Loading fails with `IdTooLarge` if the file uses wider ids.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonId(pub u32);

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaxonId({})", self.0)
    }
}

impl From<u32> for TaxonId {
    fn from(v: u32) -> Self {
        TaxonId(v)
    }
}

/// The recognized external taxonomies whose ids map into this one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePrefix {
    Ncbi,
    Gbif,
    Worms,
    If,
    Irmng,
}

impl SourcePrefix {
    pub fn token(&self) -> &'static str {
        match self {
            SourcePrefix::Ncbi => "ncbi",
            SourcePrefix::Gbif => "gbif",
            SourcePrefix::Worms => "worms",
            SourcePrefix::If => "if",
            SourcePrefix::Irmng => "irmng",
        }
    }
}

impl FromStr for SourcePrefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "ncbi" => Ok(SourcePrefix::Ncbi),
            "gbif" => Ok(SourcePrefix::Gbif),
            "worms" => Ok(SourcePrefix::Worms),
            "if" => Ok(SourcePrefix::If),
            "irmng" => Ok(SourcePrefix::Irmng),
            _ => Err(Error::new(ErrorKind::UnknownSourcePrefix(s.to_string()))),
        }
    }
}

impl fmt::Display for SourcePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One `prefix:id` token out of the `sourceinfo` column, kept verbatim.
/// Only tokens with a recognized prefix and a numeric id are indexed for
/// foreign lookup; the rest are display-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub prefix: String,
    pub id: String,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynonymKind {
    Synonym,
    CommonName,
    Misspelling,
    Authority,
    EquivalentName,
    Includes,
    TypeMaterial,
    BlastName,
    Other,
}

impl SynonymKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "synonym" => SynonymKind::Synonym,
            "common name" | "common_name" => SynonymKind::CommonName,
            "misspelling" => SynonymKind::Misspelling,
            "authority" => SynonymKind::Authority,
            "equivalent name" | "equivalent_name" => SynonymKind::EquivalentName,
            "includes" => SynonymKind::Includes,
            "type material" | "type_material" => SynonymKind::TypeMaterial,
            "blast name" | "blast_name" => SynonymKind::BlastName,
            _ => SynonymKind::Other,
        }
    }
}

/// A junior synonym: an alternative name owned by exactly one taxon. The
/// name string itself is not unique across the taxonomy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synonym {
    pub name: String,
    pub kind: SynonymKind,
    pub taxon: TaxonId,
}

/// One row of `taxonomy.tsv`, before linking.
#[derive(Clone, Debug)]
pub struct RawTaxon {
    pub id: u64,
    pub parent: Option<u64>,
    pub name: String,
    pub rank: String,
    pub source_info: String,
    pub uniqname: String,
    pub flags: String,
}

/// One row of `synonyms.tsv`.
#[derive(Clone, Debug)]
pub struct RawSynonym {
    pub taxon: u64,
    pub name: String,
    pub kind: String,
}

/// Build-time policy knobs. Suppression is policy, so it is configurable
/// here rather than hardcoded in query paths.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub tnrs_suppression: FlagSet,
    pub synthesis_suppression: FlagSet,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            tnrs_suppression: default_tnrs_suppression(),
            synthesis_suppression: default_synthesis_suppression(),
        }
    }
}

type ArenaIx = u32;

/// The read-only taxonomy: a rooted tree held in parallel columns plus the
/// id indexes every query path needs. Built once, then immutable.
#[derive(Debug)]
pub struct TaxonomyStore {
    ids: Vec<TaxonId>,
    parents: Vec<ArenaIx>, // root points at itself
    children: Vec<Vec<ArenaIx>>,
    names: Vec<String>,
    uniqnames: Vec<String>,
    ranks: Vec<String>,
    flags: Vec<FlagSet>,
    source_refs: Vec<Vec<SourceRef>>,
    synonyms: Vec<Synonym>,
    junior_synonyms: Vec<Vec<u32>>,
    depths: Vec<u32>,
    trav_enter: Vec<u32>,
    trav_exit: Vec<u32>,
    root: ArenaIx,

    by_id: HashMap<TaxonId, ArenaIx>,
    by_uniqname: HashMap<String, ArenaIx>,
    by_foreign: HashMap<(SourcePrefix, u64), ArenaIx>,

    version: String,
    version_number: String,
    tnrs_suppression: FlagSet,
    synthesis_suppression: FlagSet,
    suppress_from_tnrs: HashSet<TaxonId>,

    // per-subtree descendant-id sets, materialized on first use; the tree
    // never changes so entries are never invalidated
    des_ids: Mutex<HashMap<ArenaIx, Arc<Vec<TaxonId>>>>,
}

impl TaxonomyStore {
    pub fn from_records(
        records: Vec<RawTaxon>,
        synonym_rows: Vec<RawSynonym>,
        version: &str,
        options: LoadOptions,
    ) -> TaxonomyResult<Self> {
        let n = records.len();
        if n == 0 {
            return Err(Error::new(ErrorKind::InvalidTaxonomy(
                "taxonomy has no records".to_string(),
            )));
        }

        let mut ids = Vec::with_capacity(n);
        let mut by_id: HashMap<TaxonId, ArenaIx> = HashMap::with_capacity(n);
        for rec in &records {
            if rec.id > u64::from(u32::MAX) {
                return Err(Error::new(ErrorKind::IdTooLarge(rec.id)));
            }
            let id = TaxonId(rec.id as u32);
            if by_id.insert(id, ids.len() as ArenaIx).is_some() {
                return Err(Error::new(ErrorKind::InvalidTaxonomy(format!(
                    "duplicate taxon id {}",
                    id
                ))));
            }
            ids.push(id);
        }

        let mut parents = vec![0 as ArenaIx; n];
        let mut children: Vec<Vec<ArenaIx>> = vec![Vec::new(); n];
        let mut root: Option<ArenaIx> = None;
        for (ix, rec) in records.iter().enumerate() {
            match rec.parent {
                None => {
                    if let Some(prev) = root {
                        return Err(Error::new(ErrorKind::InvalidTaxonomy(format!(
                            "multiple roots: {} and {}",
                            ids[prev as usize], ids[ix]
                        ))));
                    }
                    parents[ix] = ix as ArenaIx;
                    root = Some(ix as ArenaIx);
                }
                Some(pid) => {
                    if pid > u64::from(u32::MAX) {
                        return Err(Error::new(ErrorKind::IdTooLarge(pid)));
                    }
                    let par_ix = *by_id.get(&TaxonId(pid as u32)).ok_or_else(|| {
                        Error::new(ErrorKind::InvalidTaxonomy(format!(
                            "taxon {} names unknown parent {}",
                            rec.id, pid
                        )))
                    })?;
                    parents[ix] = par_ix;
                    children[par_ix as usize].push(ix as ArenaIx);
                }
            }
        }
        let root = root.ok_or_else(|| {
            Error::new(ErrorKind::InvalidTaxonomy("no root record".to_string()))
        })?;

        // depth and preorder enter/exit numbers in one pass; doubles as the
        // reachability check
        let mut depths = vec![0u32; n];
        let mut trav_enter = vec![0u32; n];
        let mut trav_exit = vec![0u32; n];
        let mut order = Vec::with_capacity(n);
        let mut stack = vec![root];
        let mut counter = 0u32;
        while let Some(ix) = stack.pop() {
            trav_enter[ix as usize] = counter;
            counter += 1;
            order.push(ix);
            for child in children[ix as usize].iter().rev() {
                depths[*child as usize] = depths[ix as usize] + 1;
                stack.push(*child);
            }
        }
        if order.len() != n {
            return Err(Error::new(ErrorKind::InvalidTaxonomy(format!(
                "{} taxa are not reachable from the root",
                n - order.len()
            ))));
        }
        for ix in order.iter().rev() {
            let kids = &children[*ix as usize];
            trav_exit[*ix as usize] = if kids.is_empty() {
                trav_enter[*ix as usize]
            } else {
                trav_exit[*kids.last().unwrap() as usize]
            };
        }

        let mut names = Vec::with_capacity(n);
        let mut uniqnames = Vec::with_capacity(n);
        let mut ranks = Vec::with_capacity(n);
        let mut flags = Vec::with_capacity(n);
        let mut source_refs = Vec::with_capacity(n);
        let mut by_uniqname = HashMap::with_capacity(n);
        let mut by_foreign = HashMap::new();
        let mut suppress_from_tnrs = HashSet::new();
        for (ix, rec) in records.into_iter().enumerate() {
            let flag_set = FlagSet::parse(&rec.flags);
            if flag_set.intersects(options.tnrs_suppression) {
                suppress_from_tnrs.insert(ids[ix]);
            }
            flags.push(flag_set);

            let uniqname = if rec.uniqname.is_empty() {
                rec.name.clone()
            } else {
                rec.uniqname
            };
            if by_uniqname.insert(uniqname.clone(), ix as ArenaIx).is_some() {
                return Err(Error::new(ErrorKind::InvalidTaxonomy(format!(
                    "uniqname \"{}\" is not unique",
                    uniqname
                ))));
            }

            let mut refs = Vec::new();
            for token in rec.source_info.split(',') {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                let (prefix, ext) = match token.split_once(':') {
                    Some(parts) => parts,
                    None => continue,
                };
                refs.push(SourceRef {
                    prefix: prefix.to_string(),
                    id: ext.to_string(),
                });
                if let (Ok(known), Ok(num)) = (prefix.parse::<SourcePrefix>(), ext.parse::<u64>())
                {
                    by_foreign.entry((known, num)).or_insert(ix as ArenaIx);
                }
            }

            names.push(rec.name);
            uniqnames.push(uniqname);
            ranks.push(rec.rank);
            source_refs.push(refs);
        }

        let mut synonyms = Vec::with_capacity(synonym_rows.len());
        let mut junior_synonyms: Vec<Vec<u32>> = vec![Vec::new(); n];
        for row in synonym_rows {
            if row.taxon > u64::from(u32::MAX) {
                return Err(Error::new(ErrorKind::IdTooLarge(row.taxon)));
            }
            let owner = TaxonId(row.taxon as u32);
            let owner_ix = *by_id.get(&owner).ok_or_else(|| {
                Error::new(ErrorKind::InvalidTaxonomy(format!(
                    "synonym \"{}\" names unknown taxon {}",
                    row.name, owner
                )))
            })?;
            junior_synonyms[owner_ix as usize].push(synonyms.len() as u32);
            synonyms.push(Synonym {
                name: row.name,
                kind: SynonymKind::parse(&row.kind),
                taxon: owner,
            });
        }

        info!(
            taxa = n,
            synonyms = synonyms.len(),
            suppressed = suppress_from_tnrs.len(),
            version,
            "taxonomy loaded"
        );

        Ok(TaxonomyStore {
            ids,
            parents,
            children,
            names,
            uniqnames,
            ranks,
            flags,
            source_refs,
            synonyms,
            junior_synonyms,
            depths,
            trav_enter,
            trav_exit,
            root,
            by_id,
            by_uniqname,
            by_foreign,
            version: version.to_string(),
            version_number: version_number_of(version),
            tnrs_suppression: options.tnrs_suppression,
            synthesis_suppression: options.synthesis_suppression,
            suppress_from_tnrs,
            des_ids: Mutex::new(HashMap::new()),
        })
    }

    fn ix_of(&self, id: TaxonId) -> Option<ArenaIx> {
        self.by_id.get(&id).copied()
    }

    fn require_ix(&self, id: TaxonId) -> TaxonomyResult<ArenaIx> {
        self.ix_of(id)
            .ok_or_else(|| Error::new(ErrorKind::UnknownId(id)))
    }

    pub fn taxon_by_id(&self, id: TaxonId) -> Option<TaxonView<'_>> {
        self.ix_of(id).map(|ix| TaxonView { store: self, ix })
    }

    /// Foreign-id lookup. Fails on an unrecognized prefix token; returns
    /// `None` when the prefix is fine but the id is unmapped.
    pub fn taxon_by_foreign(&self, prefix: &str, extern_id: u64) -> TaxonomyResult<Option<TaxonView<'_>>> {
        let prefix: SourcePrefix = prefix.parse()?;
        Ok(self
            .by_foreign
            .get(&(prefix, extern_id))
            .map(|ix| TaxonView { store: self, ix: *ix }))
    }

    pub fn taxon_by_uniqname(&self, uniqname: &str) -> Option<TaxonView<'_>> {
        self.by_uniqname
            .get(uniqname)
            .map(|ix| TaxonView { store: self, ix: *ix })
    }

    pub fn root_taxon(&self) -> TaxonView<'_> {
        TaxonView { store: self, ix: self.root }
    }

    /// Every taxon in arena order.
    pub fn taxa(&self) -> impl Iterator<Item = TaxonView<'_>> {
        (0..self.ids.len() as ArenaIx).map(move |ix| TaxonView { store: self, ix })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn version_number(&self) -> &str {
        &self.version_number
    }

    pub fn taxon_count(&self) -> usize {
        self.ids.len()
    }

    pub fn synonym_count(&self) -> usize {
        self.synonyms.len()
    }

    pub fn synonyms(&self) -> &[Synonym] {
        &self.synonyms
    }

    pub fn tnrs_suppression_mask(&self) -> FlagSet {
        self.tnrs_suppression
    }

    pub fn synthesis_suppression_mask(&self) -> FlagSet {
        self.synthesis_suppression
    }

    pub fn is_suppressed_from_tnrs(&self, id: TaxonId) -> bool {
        self.suppress_from_tnrs.contains(&id)
    }

    pub fn suppressed_from_tnrs_count(&self) -> usize {
        self.suppress_from_tnrs.len()
    }

    pub fn is_suppressed_from_synthesis(&self, id: TaxonId) -> bool {
        self.ix_of(id)
            .map(|ix| self.flags[ix as usize].intersects(self.synthesis_suppression))
            .unwrap_or(false)
    }

    /// O(1) "is `a` an ancestor of (or equal to) `b`" using the preorder
    /// interval numbering.
    pub fn is_ancestor_or_self(&self, a: TaxonId, b: TaxonId) -> TaxonomyResult<bool> {
        let a = self.require_ix(a)? as usize;
        let b = self.require_ix(b)? as usize;
        Ok(self.trav_enter[a] <= self.trav_enter[b] && self.trav_exit[b] <= self.trav_exit[a])
    }

    fn mrca_ix(&self, mut a: ArenaIx, mut b: ArenaIx) -> ArenaIx {
        while self.depths[a as usize] > self.depths[b as usize] {
            a = self.parents[a as usize];
        }
        while self.depths[b as usize] > self.depths[a as usize] {
            b = self.parents[b as usize];
        }
        while a != b {
            a = self.parents[a as usize];
            b = self.parents[b as usize];
        }
        a
    }

    /// The most recent common ancestor of a non-empty id set. Equalizes
    /// depths, then walks the pairs rootward in lock step.
    pub fn mrca(&self, ids: &[TaxonId]) -> TaxonomyResult<TaxonId> {
        let mut iter = ids.iter();
        let first = iter
            .next()
            .ok_or_else(|| Error::new(ErrorKind::BadRequest("no ids given for mrca".into())))?;
        let mut acc = self.require_ix(*first)?;
        for id in iter {
            let ix = self.require_ix(*id)?;
            acc = self.mrca_ix(acc, ix);
        }
        Ok(self.ids[acc as usize])
    }

    /// All taxon ids in the subtree rooted at `id`, self included, sorted.
    /// Materialized lazily and cached; the tree is immutable so the cache
    /// never needs invalidation.
    pub fn descendant_ids(&self, id: TaxonId) -> TaxonomyResult<Arc<Vec<TaxonId>>> {
        let ix = self.require_ix(id)?;
        {
            let cache = self.des_ids.lock();
            if let Some(hit) = cache.get(&ix) {
                return Ok(hit.clone());
            }
        }
        let mut out = Vec::new();
        let mut stack = vec![ix];
        while let Some(cur) = stack.pop() {
            out.push(self.ids[cur as usize]);
            stack.extend(self.children[cur as usize].iter().copied());
        }
        out.sort_unstable();
        let out = Arc::new(out);
        self.des_ids.lock().insert(ix, out.clone());
        Ok(out)
    }

    /// The tip taxa below `id` (or `id` itself when it is a tip).
    pub fn terminal_descendants(&self, id: TaxonId) -> TaxonomyResult<Vec<TaxonId>> {
        let ix = self.require_ix(id)?;
        let mut out = Vec::new();
        let mut stack = vec![ix];
        while let Some(cur) = stack.pop() {
            if self.children[cur as usize].is_empty() {
                out.push(self.ids[cur as usize]);
            } else {
                stack.extend(self.children[cur as usize].iter().copied());
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    /// Minimal rooted subgraph containing every input taxon and the MRCA of
    /// every pair. With `keep_unbranched` the full ancestor paths between
    /// those nodes are kept (out-degree-1 nodes included); otherwise paths
    /// are collapsed to the branching structure.
    pub fn induced_subtree(
        &self,
        ids: &[TaxonId],
        keep_unbranched: bool,
    ) -> TaxonomyResult<InducedTree> {
        if ids.is_empty() {
            return Err(Error::new(ErrorKind::BadRequest(
                "no ids given for induced subtree".into(),
            )));
        }
        let mut leaf_ixs = Vec::with_capacity(ids.len());
        for id in ids {
            leaf_ixs.push(self.require_ix(*id)?);
        }
        leaf_ixs.sort_unstable_by_key(|ix| self.trav_enter[*ix as usize]);
        leaf_ixs.dedup();

        // internal nodes of the induced tree are exactly the MRCAs of
        // preorder-adjacent leaves
        let mut members: HashSet<ArenaIx> = leaf_ixs.iter().copied().collect();
        for pair in leaf_ixs.windows(2) {
            members.insert(self.mrca_ix(pair[0], pair[1]));
        }
        if keep_unbranched {
            let top = leaf_ixs
                .iter()
                .copied()
                .reduce(|a, b| self.mrca_ix(a, b))
                .unwrap();
            for leaf in leaf_ixs.iter() {
                let mut cur = *leaf;
                while cur != top {
                    cur = self.parents[cur as usize];
                    members.insert(cur);
                }
            }
        }

        let mut ordered: Vec<ArenaIx> = members.into_iter().collect();
        ordered.sort_unstable_by_key(|ix| self.trav_enter[*ix as usize]);

        // ancestor stack sweep: the nearest stacked ancestor of each node
        // (by preorder interval) is its induced parent
        let root_id = self.ids[ordered[0] as usize];
        let mut tree = InducedTree::new(root_id);
        let mut anc_stack: Vec<ArenaIx> = Vec::new();
        for ix in ordered {
            while let Some(top) = anc_stack.last() {
                let a = *top as usize;
                let b = ix as usize;
                if self.trav_enter[a] <= self.trav_enter[b]
                    && self.trav_exit[b] <= self.trav_exit[a]
                {
                    break;
                }
                anc_stack.pop();
            }
            if let Some(par) = anc_stack.last() {
                tree.attach(self.ids[*par as usize], self.ids[ix as usize]);
            }
            anc_stack.push(ix);
        }
        Ok(tree)
    }
}

fn version_number_of(version: &str) -> String {
    let start = match version.find(|c: char| c.is_ascii_digit()) {
        Some(pos) => pos,
        None => return String::new(),
    };
    version[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect()
}

impl<'t> Taxonomy<'t, TaxonId> for TaxonomyStore {
    fn root(&self) -> TaxonId {
        self.ids[self.root as usize]
    }

    fn children(&self, tax_id: TaxonId) -> TaxonomyResult<Vec<TaxonId>> {
        let ix = self.require_ix(tax_id)?;
        Ok(self.children[ix as usize]
            .iter()
            .map(|c| self.ids[*c as usize])
            .collect())
    }

    fn parent(&self, tax_id: TaxonId) -> TaxonomyResult<Option<TaxonId>> {
        let ix = self.require_ix(tax_id)?;
        if ix == self.root {
            return Ok(None);
        }
        Ok(Some(self.ids[self.parents[ix as usize] as usize]))
    }

    fn name(&self, tax_id: TaxonId) -> TaxonomyResult<&str> {
        let ix = self.require_ix(tax_id)?;
        Ok(&self.names[ix as usize])
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// A borrowed view of one taxon in the arena.
#[derive(Clone, Copy)]
pub struct TaxonView<'t> {
    store: &'t TaxonomyStore,
    ix: ArenaIx,
}

impl<'t> TaxonView<'t> {
    pub fn id(&self) -> TaxonId {
        self.store.ids[self.ix as usize]
    }

    pub fn name(&self) -> &'t str {
        &self.store.names[self.ix as usize]
    }

    pub fn uniqname(&self) -> &'t str {
        &self.store.uniqnames[self.ix as usize]
    }

    pub fn rank(&self) -> &'t str {
        &self.store.ranks[self.ix as usize]
    }

    pub fn flags(&self) -> FlagSet {
        self.store.flags[self.ix as usize]
    }

    pub fn depth(&self) -> u32 {
        self.store.depths[self.ix as usize]
    }

    pub fn source_refs(&self) -> &'t [SourceRef] {
        &self.store.source_refs[self.ix as usize]
    }

    pub fn parent(&self) -> Option<TaxonView<'t>> {
        if self.ix == self.store.root {
            return None;
        }
        Some(TaxonView {
            store: self.store,
            ix: self.store.parents[self.ix as usize],
        })
    }

    pub fn children(&self) -> impl Iterator<Item = TaxonView<'t>> + '_ {
        self.store.children[self.ix as usize]
            .iter()
            .map(move |c| TaxonView {
                store: self.store,
                ix: *c,
            })
    }

    pub fn is_tip(&self) -> bool {
        self.store.children[self.ix as usize].is_empty()
    }

    pub fn junior_synonyms(&self) -> impl Iterator<Item = &'t Synonym> + '_ {
        self.store.junior_synonyms[self.ix as usize]
            .iter()
            .map(move |s| &self.store.synonyms[*s as usize])
    }

    /// Tipward-to-rootward walk starting at the parent; restartable by
    /// calling again.
    pub fn ancestors(&self) -> impl Iterator<Item = TaxonView<'t>> {
        let mut cur = self.parent();
        std::iter::from_fn(move || {
            let out = cur?;
            cur = out.parent();
            Some(out)
        })
    }
}

impl fmt::Debug for TaxonView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaxonView({} {})", self.id(), self.name())
    }
}

/// The result of `induced_subtree`: ids plus child lists, rooted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InducedTree {
    pub root: TaxonId,
    children: HashMap<TaxonId, Vec<TaxonId>>,
}

impl InducedTree {
    fn new(root: TaxonId) -> Self {
        InducedTree {
            root,
            children: HashMap::new(),
        }
    }

    fn attach(&mut self, parent: TaxonId, child: TaxonId) {
        self.children.entry(parent).or_default().push(child);
    }

    pub fn children_of(&self, id: TaxonId) -> &[TaxonId] {
        self.children.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn contains(&self, id: TaxonId) -> bool {
        id == self.root
            || self.children.contains_key(&id)
            || self.children.values().any(|v| v.contains(&id))
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(|v| v.len()).sum::<usize>()
    }

    pub fn nodes(&self) -> Vec<TaxonId> {
        let mut out = vec![self.root];
        let mut stack = vec![self.root];
        while let Some(cur) = stack.pop() {
            for child in self.children_of(cur) {
                out.push(*child);
                stack.push(*child);
            }
        }
        out
    }
}
