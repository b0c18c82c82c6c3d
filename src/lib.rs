//! Indexed, queryable reference taxonomy with trie-backed name resolution.
//!
//! The crate loads a tab-delimited reference taxonomy once at startup,
//! freezes it, and serves lookups over it: id and foreign-id resolution,
//! MRCA and induced-subtree queries, newick export, and a taxonomic name
//! resolution service (TNRS) running exact, prefix, and bounded-edit-
//! distance fuzzy matching over compressed tries.
//!
//! [`service::ServiceState`] is the process-wide root object; the modules
//! underneath it can also be used on their own:
//!
//! * [`base`] — the arena taxonomy store and its indexes
//! * [`taxonomy`] — tree traversal generic over node-id types
//! * [`formats`] — the taxonomy file loader and newick export
//! * [`ctrie`] — compressed tries and the thin/wide/incremental database
//! * [`tnrs`] — normalization, context inference, scoring and ranking

pub mod base;
pub mod ctrie;
pub mod errors;
pub mod flags;
pub mod formats;
pub mod service;
pub mod taxonomy;
pub mod tnrs;

pub use crate::base::{TaxonId, TaxonomyStore};
pub use crate::errors::{Error, ErrorKind, TaxonomyResult};
pub use crate::flags::{FlagSet, TaxonFlag};
pub use crate::service::ServiceState;
pub use crate::taxonomy::Taxonomy;
