//! Error types for every stage of the curation pipeline.
//!
//! Each area (BED parsing, primer names, scheme metadata, index building) owns
//! its own enum; [`Error`] wraps them transparently so callers can match on the
//! precise kind while still using a single `Result` alias.
use std::path::PathBuf;

/// Custom Result type for registry operations, wrapping the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type, encompassing all failure cases of the registry tooling.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Structural problems in a primer BED file
    #[error(transparent)]
    Bed(#[from] BedError),
    /// Primer names that match no grammar, or mix grammars
    #[error(transparent)]
    PrimerName(#[from] PrimerNameError),
    /// `info.json` field, identity and payload consistency failures
    #[error(transparent)]
    Scheme(#[from] SchemeError),
    /// Aggregate index failures
    #[error(transparent)]
    Index(#[from] IndexError),
    /// A JSON document could not be read or written
    #[error("{}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A reference FASTA could not be parsed
    #[error("invalid FASTA: {0}")]
    Fasta(String),
    /// Standard I/O errors from the Rust standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while parsing a primer BED file.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BedError {
    /// A row that cannot be interpreted as a primer record
    ///
    /// # Arguments
    /// * `line` - 1-based line number in the source file
    /// * `reason` - what was wrong with the row
    #[error("malformed bed row at line {line}: {reason}")]
    MalformedBedRow { line: u64, reason: String },

    /// A row whose column count differs from the first primer row
    #[error("inconsistent column count at line {line}: expected {expected}, found {found}")]
    InconsistentColumnCount { line: u64, expected: usize, found: usize },

    /// The file contains no primer rows at all
    #[error("bed file contains no primer records")]
    NoRecords,
}

/// Errors raised by primer name classification.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PrimerNameError {
    #[error(
        "invalid primer name '{name}'{}: expected (name)_(amplicon-number)_(LEFT|RIGHT) with an optional _(primer-number) or _alt suffix",
        .line.map(|l| format!(" at line {l}")).unwrap_or_default()
    )]
    InvalidPrimerName { name: String, line: Option<u64> },

    /// Two rows of one file use different naming grammars
    #[error("primer names mix grammars: '{first}' (line {first_line}) is {first_version} but '{name}' (line {line}) is {version}")]
    MixedPrimerNameGrammar {
        first: String,
        first_line: u64,
        first_version: crate::primername::PrimerNameVersion,
        name: String,
        line: u64,
        version: crate::primername::PrimerNameVersion,
    },

    #[error("cannot convert '{0}' to a v2 primer name: {1}")]
    CannotConvert(String, String),
}

/// Errors describing an invalid or inconsistent scheme record.
#[derive(thiserror::Error, Debug)]
pub enum SchemeError {
    /// Bad schemename / ampliconsize / schemeversion shape
    #[error("invalid scheme identity: {0}")]
    InvalidSchemeIdentity(String),

    /// Stored digest disagrees with the digest recomputed from disk
    #[error("hash mismatch for {}: info.json records {stored} but the file hashes to {computed}", .path.display())]
    HashMismatch {
        path: PathBuf,
        stored: String,
        computed: String,
    },

    /// A field-level or cross-field invariant is violated
    #[error("{context}: {message}")]
    SchemaValidation { context: String, message: String },

    /// `create` would overwrite an existing scheme version
    #[error("{} already exists", .0.display())]
    PathAlreadyExists(PathBuf),

    #[error("{} is not an info.json file", .0.display())]
    NotInfoJson(PathBuf),

    #[error("{0}")]
    MissingFile(String),

    #[error("'{0}' is not a valid link field; choose from protocols, validation, homepage, vendors, misc")]
    UnknownLinkField(String),
}

impl SchemeError {
    pub(crate) fn invalid(context: impl Into<String>, message: impl Into<String>) -> Self {
        SchemeError::SchemaValidation { context: context.into(), message: message.into() }
    }
}

/// Errors raised while building `index.json`.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// Two directories declare the same (schemename, ampliconsize, schemeversion)
    #[error("duplicate scheme identity {identity}: declared by {} and {}", .first.display(), .second.display())]
    DuplicateSchemeIdentity {
        identity: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{} already exists; pass --force to overwrite it", .0.display())]
    IndexAlreadyExists(PathBuf),

    /// One or more schemes failed validation; nothing was written
    #[error("{} scheme(s) failed validation:\n{}", .0.len(), render_failures(.0))]
    InvalidSchemes(Vec<(PathBuf, Error)>),
}

fn render_failures(failures: &[(PathBuf, Error)]) -> String {
    failures
        .iter()
        .map(|(p, e)| format!("  - {}: {e}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json { path: path.into(), source }
    }
}
