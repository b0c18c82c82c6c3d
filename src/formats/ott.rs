//! Loader for the tab-delimited reference-taxonomy interchange files:
//! `taxonomy.tsv`, `synonyms.tsv` and the plain-text `version` file.
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use memchr::memchr_iter;
use tracing::info;

use crate::base::{LoadOptions, RawSynonym, RawTaxon, TaxonomyStore};
use crate::errors::{Error, ErrorKind, TaxonomyResult};

/// Split a row on plain tabs. Returns borrowed fields.
fn split_tabs(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut fields = Vec::with_capacity(8);
    let mut start = 0;
    for tab in memchr_iter(b'\t', bytes) {
        fields.push(&line[start..tab]);
        start = tab + 1;
    }
    fields.push(&line[start..]);
    fields
}

fn import_error(line: usize, msg: impl Into<String>) -> Error {
    Error::new(ErrorKind::ImportError {
        line,
        msg: msg.into(),
    })
}

/// Parse `taxonomy.tsv`. Rows may appear in any order; linking happens in
/// `TaxonomyStore::from_records`. The header row is recognized by its
/// leading `uid` field and skipped.
pub fn read_taxonomy_records<R: Read>(reader: R) -> TaxonomyResult<Vec<RawTaxon>> {
    let buf = BufReader::new(reader);
    let mut records = Vec::new();
    for (ix, line) in buf.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let fields = split_tabs(&line);
        if ix == 0 && fields.first() == Some(&"uid") {
            continue;
        }
        if fields.len() < 4 {
            let msg = if ix == 0 {
                "not enough fields; is this really a taxonomy file?"
            } else {
                "not enough fields"
            };
            return Err(import_error(ix + 1, msg));
        }
        let id: u64 = fields[0]
            .trim()
            .parse()
            .map_err(|_| import_error(ix + 1, format!("uid \"{}\" is not a number", fields[0])))?;
        let parent = match fields[1].trim() {
            "" => None,
            p => Some(p.parse::<u64>().map_err(|_| {
                import_error(ix + 1, format!("parent_uid \"{}\" is not a number", p))
            })?),
        };
        records.push(RawTaxon {
            id,
            parent,
            name: fields[2].to_string(),
            rank: fields[3].to_string(),
            source_info: fields.get(4).unwrap_or(&"").to_string(),
            uniqname: fields.get(5).unwrap_or(&"").to_string(),
            flags: fields.get(6).unwrap_or(&"").to_string(),
        });
    }
    Ok(records)
}

/// Parse `synonyms.tsv` (`uid\tname\ttype`).
pub fn read_synonym_records<R: Read>(reader: R) -> TaxonomyResult<Vec<RawSynonym>> {
    let buf = BufReader::new(reader);
    let mut records = Vec::new();
    for (ix, line) in buf.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let fields = split_tabs(&line);
        if ix == 0 && fields.first() == Some(&"uid") {
            continue;
        }
        if fields.len() < 2 {
            return Err(import_error(ix + 1, "synonym rows need at least uid and name"));
        }
        let taxon: u64 = fields[0]
            .trim()
            .parse()
            .map_err(|_| import_error(ix + 1, format!("uid \"{}\" is not a number", fields[0])))?;
        records.push(RawSynonym {
            taxon,
            name: fields[1].to_string(),
            kind: fields.get(2).unwrap_or(&"synonym").to_string(),
        });
    }
    Ok(records)
}

/// Load a taxonomy from open readers plus a version string.
pub fn load_ott<R1, R2>(
    taxonomy_reader: R1,
    synonyms_reader: R2,
    version: &str,
    options: LoadOptions,
) -> TaxonomyResult<TaxonomyStore>
where
    R1: Read,
    R2: Read,
{
    let records = read_taxonomy_records(taxonomy_reader)?;
    let synonyms = read_synonym_records(synonyms_reader)?;
    TaxonomyStore::from_records(records, synonyms, version.trim(), options)
}

/// Load a taxonomy from a directory holding `taxonomy.tsv`, `synonyms.tsv`
/// and `version`.
pub fn load_ott_dir<P>(directory: P, options: LoadOptions) -> TaxonomyResult<TaxonomyStore>
where
    P: AsRef<Path>,
{
    let dir = PathBuf::from(directory.as_ref());
    let taxonomy_path = dir.join("taxonomy.tsv");
    let synonyms_path = dir.join("synonyms.tsv");
    let version_path = dir.join("version");

    info!(path = %dir.display(), "loading taxonomy");
    let taxonomy_file = File::open(taxonomy_path)?;
    let synonyms_file = File::open(synonyms_path)?;
    let mut version = String::new();
    File::open(version_path)?.read_to_string(&mut version)?;

    load_ott(taxonomy_file, synonyms_file, &version, options)
}

#[cfg(test)]
pub(crate) mod test {
    use std::io::Cursor;

    use super::*;
    use crate::base::TaxonId;
    use crate::taxonomy::Taxonomy;

    pub(crate) const TAXONOMY_TSV: &str = "\
uid\tparent_uid\tname\trank\tsourceinfo\tuniqname\tflags
805080\t\tlife\tno rank\t\t\t
691846\t805080\tMetazoa\tkingdom\tncbi:33208\t\t
244265\t691846\tMammalia\tclass\tncbi:40674\t\t
770309\t244265\tHomo\tgenus\tncbi:9605\t\t
770315\t770309\tHomo sapiens\tspecies\tncbi:9606,gbif:2436436\t\t
99252\t805080\tMagnoliophyta\tphylum\tgbif:49\t\t
46248\t99252\tAsteraceae\tfamily\tncbi:4210\t\t
555001\t46248\tenvironmental samples\tno rank\tncbi:48479\tenvironmental samples (Asteraceae)\tenvironmental
";

    pub(crate) const SYNONYMS_TSV: &str = "\
uid\tname\ttype
770315\tHomo sapien\tmisspelling
770315\thuman\tcommon name
46248\tCompositae\tsynonym
";

    #[test]
    fn loads_the_fixture_files() {
        let tax = load_ott(
            Cursor::new(TAXONOMY_TSV),
            Cursor::new(SYNONYMS_TSV),
            "ott3.3\n",
            LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(tax.taxon_count(), 8);
        assert_eq!(tax.version(), "ott3.3");
        assert_eq!(tax.name(TaxonId(770315)).unwrap(), "Homo sapiens");
        assert_eq!(tax.parent(TaxonId(770315)).unwrap(), Some(TaxonId(770309)));
        assert_eq!(
            tax.taxon_by_foreign("gbif", 2436436).unwrap().unwrap().id(),
            TaxonId(770315)
        );
        assert!(tax.is_suppressed_from_tnrs(TaxonId(555001)));
        let homo = tax.taxon_by_id(TaxonId(770315)).unwrap();
        let syns: Vec<&str> = homo.junior_synonyms().map(|s| s.name.as_str()).collect();
        assert_eq!(syns, vec!["Homo sapien", "human"]);
    }

    #[test]
    fn rows_may_come_in_any_order() {
        let shuffled = "\
770315\t770309\tHomo sapiens\tspecies\t\t\t
805080\t\tlife\tno rank\t\t\t
770309\t805080\tHomo\tgenus\t\t\t
";
        let tax = load_ott(
            Cursor::new(shuffled),
            Cursor::new(""),
            "ott3.3",
            LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(Taxonomy::root(&tax), TaxonId(805080));
        assert_eq!(tax.parent(TaxonId(770315)).unwrap(), Some(TaxonId(770309)));
    }

    #[test]
    fn bad_rows_are_fatal() {
        let bad_uid = "805080\t\tlife\tno rank\t\t\t\nnot_a_number\t805080\tX\tgenus\t\t\t\n";
        let err = read_taxonomy_records(Cursor::new(bad_uid)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ImportError { line: 2, .. }));

        let truncated = "805080\tlife\n";
        let err = read_taxonomy_records(Cursor::new(truncated)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ImportError { .. }));

        let err = read_synonym_records(Cursor::new("770315\n")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ImportError { .. }));
    }

    #[test]
    fn loads_from_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("taxonomy.tsv"), TAXONOMY_TSV).unwrap();
        std::fs::write(dir.path().join("synonyms.tsv"), SYNONYMS_TSV).unwrap();
        std::fs::write(dir.path().join("version"), "ott3.3draft1\n").unwrap();
        let tax = load_ott_dir(dir.path(), LoadOptions::default()).unwrap();
        assert_eq!(tax.version(), "ott3.3draft1");
        assert_eq!(tax.version_number(), "3.3");

        // a missing file is an import error, not a panic
        let empty = tempfile::tempdir().unwrap();
        assert!(load_ott_dir(empty.path(), LoadOptions::default()).is_err());
    }
}
