use std::fmt;

use crate::base::TaxonId;

#[derive(Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A taxonomy file could not be parsed. Fatal: no partial taxonomy is
    /// ever published.
    ImportError { line: usize, msg: String },
    /// The parsed records do not form a rooted tree.
    InvalidTaxonomy(String),
    /// An operation that requires presence was given an id that is not in
    /// the taxonomy.
    UnknownId(TaxonId),
    /// Foreign-id lookup with a prefix outside the recognized source set.
    UnknownSourcePrefix(String),
    /// Context token outside the closed context set.
    UnknownContext(String),
    /// Malformed or empty client input.
    BadRequest(String),
    /// A structural limit was exceeded by a request.
    InputTooLarge { given: usize, limit: usize },
    /// More distinct letters than the trie node's mask can hold.
    AlphabetTooLarge(usize),
    /// An id or node index does not fit the 32-bit index field.
    IdTooLarge(u64),
    /// Invariant violation; callers map this to a 500.
    Internal(String),
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// True for the error classes a serving collaborator should map to a
    /// 4xx status rather than a 500.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UnknownId(_)
                | ErrorKind::UnknownSourcePrefix(_)
                | ErrorKind::UnknownContext(_)
                | ErrorKind::BadRequest(_)
                | ErrorKind::InputTooLarge { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::ImportError { line, msg } => {
                write!(f, "Failed to import taxonomy at line {}: {}", line, msg)
            }
            ErrorKind::InvalidTaxonomy(s) => write!(f, "Invalid taxonomy: {}", s),
            ErrorKind::UnknownId(id) => write!(f, "Taxon id {} not found in taxonomy", id),
            ErrorKind::UnknownSourcePrefix(p) => {
                write!(f, "Source prefix {} is not a recognized taxonomy source", p)
            }
            ErrorKind::UnknownContext(c) => write!(f, "Context {} is not a known context name", c),
            ErrorKind::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ErrorKind::InputTooLarge { given, limit } => {
                write!(f, "Input of size {} exceeds the limit of {}", given, limit)
            }
            ErrorKind::AlphabetTooLarge(n) => {
                write!(f, "Trie alphabet of {} letters exceeds the node letter mask", n)
            }
            ErrorKind::IdTooLarge(id) => {
                write!(f, "Value {} does not fit the 32-bit index field", id)
            }
            ErrorKind::Internal(msg) => write!(f, "Internal invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<serde_json::error::Error> for Error {
    fn from(error: serde_json::error::Error) -> Self {
        let mut err = Error::new(ErrorKind::ImportError {
            line: error.line(),
            msg: error.to_string(),
        });
        err.source = Some(Box::new(error));
        err
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        let mut err = Error::new(ErrorKind::ImportError {
            line: 0,
            msg: "Failed to read data".to_owned(),
        });
        err.source = Some(Box::new(error));
        err
    }
}

pub type TaxonomyResult<T> = Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn client_errors_are_flagged() {
        assert!(Error::new(ErrorKind::BadRequest("names is empty".into())).is_client_error());
        assert!(Error::new(ErrorKind::UnknownContext("Middle-earth".into())).is_client_error());
        assert!(!Error::new(ErrorKind::Internal("bad node index".into())).is_client_error());
        assert!(!Error::new(ErrorKind::AlphabetTooLarge(90)).is_client_error());
    }

    #[test]
    fn io_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no taxonomy.tsv");
        let err: Error = io.into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("Failed to import"));
    }
}
