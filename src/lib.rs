#![forbid(unsafe_code)]
//! # primer-registry
//!
//! Curation tooling for a public registry of PCR **primer schemes**: it builds
//! and checks each scheme's `info.json`, keeps the BED and FASTA payloads in a
//! canonical form with reproducible MD5 digests, and aggregates every scheme
//! in a repository into a single `index.json`.
//!
//! ## Layout
//! - [`primername`]: the v1 / v2 primer naming grammars
//! - [`bedfile`]: primer BED parsing, version detection and normalisation
//! - [`hashing`]: digests over canonical BED / FASTA text
//! - [`schema`]: the versioned `info.json` record and its migration
//! - [`modify`]: single-field edits to a record
//! - [`repo`]: create / modify / regenerate / remove / validate scheme directories
//! - [`index`]: `index.json` assembly
//! - [`aliases`], [`search`]: discovery by alternate names and filters
//!
//! ## Examples
//! ```rust
//! use primer_registry::bedfile::{BedFile, BedVersion};
//! let bed = BedFile::parse("ref\t10\t34\tx_1_LEFT_0\t1\t+\tACGT\nref\t400\t424\tx_1_RIGHT_0\t1\t-\tACGT\n").unwrap();
//! assert_eq!(bed.version, BedVersion::V3);
//! assert!(bed.to_canonical_string().starts_with("# artic-bed-version v3.0\n"));
//! ```
//!
//! ## Version
//! This build is "0.3.0".

pub mod error;
pub mod primername;
pub mod bedfile;
pub mod hashing;
pub mod schema;
pub mod modify;
pub mod readme;
pub mod config;
pub mod repo;
pub mod index;
pub mod aliases;
pub mod search;
pub mod data { pub mod aliases; }

pub use error::{Error, Result};

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod lifecycle_tests {
    use super::*;
    use crate::repo::tests::create_example;
    use std::fs;

    #[test]
    fn create_index_remove() {
        let dir = tempfile::tempdir().unwrap();
        let info_path = create_example(dir.path(), "example-scheme", "v1.0.0");

        let index_path = index::write_index(dir.path(), &index::UrlTemplate::default(), false).unwrap();
        let idx = index::Index::from_path(&index_path).unwrap();
        let entry = &idx.primerschemes["example-scheme/500/v1.0.0"];
        assert_eq!(entry.info, schema::SchemeInfo::from_path(&info_path).unwrap());

        repo::remove(&info_path).unwrap();
        assert!(!dir.path().join("primerschemes/example-scheme").exists());
        let rebuilt = index::build_index(dir.path(), &index::UrlTemplate::default(), true).unwrap();
        assert!(rebuilt.primerschemes.is_empty());
    }

    #[test]
    fn modified_scheme_stays_indexable() {
        let dir = tempfile::tempdir().unwrap();
        let info_path = create_example(dir.path(), "example-scheme", "v1.0.0");
        repo::modify(&info_path, &modify::Mutation::AddCollection(schema::Collection::Artic)).unwrap();
        repo::modify(&info_path, &modify::Mutation::ChangeStatus(schema::SchemeStatus::Tested)).unwrap();
        repo::regenerate(&info_path, false).unwrap();
        let idx = index::build_index(dir.path(), &index::UrlTemplate::default(), false).unwrap();
        let info = &idx.primerschemes["example-scheme/500/v1.0.0"].info;
        assert_eq!(info.status, schema::SchemeStatus::Tested);
        assert!(fs::read_to_string(&info_path).unwrap().contains("\"ARTIC\""));
    }
}
