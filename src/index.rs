//! Aggregate `index.json` over a repository of schemes.
//!
//! The index is always rebuilt from a full scan of
//! `{parentdir}/primerschemes/{schemename}/{ampliconsize}/{schemeversion}/`,
//! never patched. Scheme records are keyed by their `name/size/version`
//! identity and enriched with raw download URLs.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::bedfile::BedFile;
use crate::error::{Error, IndexError, Result, SchemeError};
use crate::hashing::{hash_file, md5_hex, PayloadKind};
use crate::repo::{check_location, INFO_JSON, PRIMER_BED, REFERENCE_FASTA};
use crate::schema::{PrimerClass, SchemeInfo};

pub const INDEX_FILE: &str = "index.json";

/// Where download URLs point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlTemplate {
    pub server: String,
    pub account: String,
    pub repository: String,
    /// Commit SHA; `main` is used when absent
    pub commit: Option<String>,
}

impl Default for UrlTemplate {
    fn default() -> Self {
        UrlTemplate {
            server: "https://raw.githubusercontent.com".into(),
            account: "quick-lab".into(),
            repository: "primerschemes".into(),
            commit: None,
        }
    }
}

impl UrlTemplate {
    fn url(&self, info: &SchemeInfo, file: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}/{}",
            self.server.trim_end_matches('/'),
            self.account,
            self.repository,
            self.commit.as_deref().unwrap_or("main"),
            info.primerclass,
            info.identity(),
            file
        )
    }
}

/// One scheme version as published in the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(flatten)]
    pub info: SchemeInfo,
    pub primer_bed_url: String,
    pub reference_fasta_url: String,
    pub info_json_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(rename = "github-commit-sha", default, skip_serializing_if = "Option::is_none")]
    pub github_commit_sha: Option<String>,
    pub primerschemes: BTreeMap<String, IndexEntry>,
}

impl Index {
    pub fn from_path(path: &Path) -> Result<Index> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::json(path, e))
    }

    /// Compact JSON with every object's keys sorted.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(&serde_json::to_value(self)?)
    }
}

/// Scheme version directories, three levels below `root`, sorted. Hidden
/// entries are pruned at every level.
fn version_dirs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .max_depth(3)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.depth() == 3 && e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect()
}

/// Re-derive `articbedversion` and both digests from the payload files.
fn check_payload(dir: &Path, info: &SchemeInfo) -> Result<()> {
    let bed_path = dir.join(PRIMER_BED);
    let bed = BedFile::from_path(&bed_path)?;
    if bed.version != info.articbedversion {
        return Err(SchemeError::invalid(
            bed_path.display().to_string(),
            format!("articbedversion is {} but {PRIMER_BED} is {}", info.articbedversion, bed.version),
        )
        .into());
    }

    let fasta_path = dir.join(REFERENCE_FASTA);
    for (path, computed, stored) in [
        (bed_path, md5_hex(bed.to_canonical_string()), &info.primer_bed_md5),
        (fasta_path.clone(), hash_file(&fasta_path, PayloadKind::Fasta)?, &info.reference_fasta_md5),
    ] {
        if &computed != stored {
            return Err(SchemeError::HashMismatch { path, stored: stored.clone(), computed }.into());
        }
    }
    Ok(())
}

/// Scan `parentdir` and assemble the index without writing it.
///
/// Fails with [`IndexError::IndexAlreadyExists`] if `parentdir/index.json`
/// exists and `force` is unset, with [`IndexError::DuplicateSchemeIdentity`]
/// as soon as two directories declare one identity, and otherwise with
/// [`IndexError::InvalidSchemes`] listing every scheme that failed.
pub fn build_index(parentdir: &Path, urls: &UrlTemplate, force: bool) -> Result<Index> {
    let index_path = parentdir.join(INDEX_FILE);
    if index_path.exists() && !force {
        return Err(IndexError::IndexAlreadyExists(index_path).into());
    }

    let root = parentdir.join(PrimerClass::Primerschemes.as_str());
    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut entries = BTreeMap::new();
    let mut failures: Vec<(PathBuf, Error)> = Vec::new();

    for dir in version_dirs(&root) {
        let info_path = dir.join(INFO_JSON);
        if !info_path.is_file() {
            failures.push((dir, SchemeError::MissingFile(format!("no {INFO_JSON} found")).into()));
            continue;
        }
        let info = match SchemeInfo::from_path(&info_path).and_then(|i| i.validate().map(|_| i).map_err(Error::from)) {
            Ok(info) => info,
            Err(e) => {
                failures.push((info_path, e));
                continue;
            }
        };

        let key = info.identity().to_string();
        if let Some(first) = seen.get(&key) {
            return Err(IndexError::DuplicateSchemeIdentity { identity: key, first: first.clone(), second: dir }.into());
        }
        seen.insert(key.clone(), dir.clone());

        if let Err(e) = check_location(&info_path, &info.identity()) {
            failures.push((info_path, e.into()));
            continue;
        }
        if let Err(e) = check_payload(&dir, &info) {
            failures.push((info_path, e));
            continue;
        }

        debug!("indexed {key}");
        let entry = IndexEntry {
            primer_bed_url: urls.url(&info, PRIMER_BED),
            reference_fasta_url: urls.url(&info, REFERENCE_FASTA),
            info_json_url: urls.url(&info, INFO_JSON),
            info,
        };
        entries.insert(key, entry);
    }

    if !failures.is_empty() {
        return Err(IndexError::InvalidSchemes(failures).into());
    }
    Ok(Index { github_commit_sha: urls.commit.clone(), primerschemes: entries })
}

/// Build the index and write it to `parentdir/index.json`.
pub fn write_index(parentdir: &Path, urls: &UrlTemplate, force: bool) -> Result<PathBuf> {
    let index = build_index(parentdir, urls, force)?;
    let path = parentdir.join(INDEX_FILE);
    let text = index.to_json_string().map_err(|e| Error::json(&path, e))?;
    std::fs::write(&path, text)?;
    info!("wrote {} with {} scheme(s)", path.display(), index.primerschemes.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::tests::create_example;
    use std::fs;

    fn copy_dir(from: &Path, to: &Path) {
        fs::create_dir_all(to).unwrap();
        for entry in WalkDir::new(from).min_depth(1) {
            let entry = entry.unwrap();
            let dest = to.join(entry.path().strip_prefix(from).unwrap());
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest).unwrap();
            } else {
                fs::copy(entry.path(), &dest).unwrap();
            }
        }
    }

    #[test]
    fn builds_index_with_urls() {
        let dir = tempfile::tempdir().unwrap();
        create_example(dir.path(), "example-scheme", "v1.0.0");
        create_example(dir.path(), "example-scheme", "v1.1.0");
        fs::create_dir_all(dir.path().join("primerschemes/.git/objects/xx")).unwrap();

        let urls = UrlTemplate { commit: Some("abc123".into()), ..Default::default() };
        let path = write_index(dir.path(), &urls, false).unwrap();
        let index = Index::from_path(&path).unwrap();

        assert_eq!(index.github_commit_sha.as_deref(), Some("abc123"));
        assert_eq!(
            index.primerschemes.keys().collect::<Vec<_>>(),
            ["example-scheme/500/v1.0.0", "example-scheme/500/v1.1.0"]
        );
        let entry = &index.primerschemes["example-scheme/500/v1.0.0"];
        assert_eq!(
            entry.primer_bed_url,
            "https://raw.githubusercontent.com/quick-lab/primerschemes/abc123/primerschemes/example-scheme/500/v1.0.0/primer.bed"
        );
        assert!(entry.info_json_url.ends_with("/v1.0.0/info.json"));

        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains('\n'));
        assert!(text.starts_with("{\"github-commit-sha\":\"abc123\",\"primerschemes\":{"));
    }

    #[test]
    fn refuses_existing_index_without_force() {
        let dir = tempfile::tempdir().unwrap();
        create_example(dir.path(), "example-scheme", "v1.0.0");
        write_index(dir.path(), &UrlTemplate::default(), false).unwrap();
        let err = write_index(dir.path(), &UrlTemplate::default(), false).unwrap_err();
        assert!(matches!(err, Error::Index(IndexError::IndexAlreadyExists(_))));
        write_index(dir.path(), &UrlTemplate::default(), true).unwrap();
    }

    #[test]
    fn duplicate_identity_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let info_path = create_example(dir.path(), "example-scheme", "v1.0.0");
        let scheme = info_path.parent().unwrap();
        copy_dir(scheme, &scheme.with_file_name("v1.0.1"));

        let err = write_index(dir.path(), &UrlTemplate::default(), false).unwrap_err();
        assert!(matches!(err, Error::Index(IndexError::DuplicateSchemeIdentity { .. })));
        assert!(!dir.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn invalid_schemes_are_all_reported() {
        let dir = tempfile::tempdir().unwrap();
        let a = create_example(dir.path(), "example-scheme", "v1.0.0");
        let b = create_example(dir.path(), "other-scheme", "v1.0.0");
        fs::write(a.with_file_name(REFERENCE_FASTA), ">MN908947.3\nAAAA\n").unwrap();
        let raw = fs::read_to_string(&b).unwrap().replace("\"draft\"", "\"unknown\"");
        fs::write(&b, raw).unwrap();

        match build_index(dir.path(), &UrlTemplate::default(), false).unwrap_err() {
            Error::Index(IndexError::InvalidSchemes(failures)) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!dir.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn stale_articbedversion_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let info_path = create_example(dir.path(), "example-scheme", "v1.0.0");
        let raw = fs::read_to_string(&info_path).unwrap().replace("\"v3.0\"", "\"v1.0\"");
        fs::write(&info_path, raw).unwrap();
        assert_eq!(SchemeInfo::from_path(&info_path).unwrap().articbedversion, crate::bedfile::BedVersion::V1);

        match build_index(dir.path(), &UrlTemplate::default(), false).unwrap_err() {
            Error::Index(IndexError::InvalidSchemes(failures)) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].1.to_string().contains("articbedversion"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn hidden_directories_are_not_schemes() {
        let dir = tempfile::tempdir().unwrap();
        create_example(dir.path(), "example-scheme", "v1.0.0");
        fs::create_dir_all(dir.path().join("primerschemes/.git/objects/xx")).unwrap();
        fs::create_dir_all(dir.path().join("primerschemes/example-scheme/.cache/tmp")).unwrap();
        fs::create_dir_all(dir.path().join("primerschemes/example-scheme/500/.hidden")).unwrap();
        assert_eq!(
            version_dirs(&dir.path().join("primerschemes")),
            vec![dir.path().join("primerschemes/example-scheme/500/v1.0.0")]
        );
        assert_eq!(build_index(dir.path(), &UrlTemplate::default(), false).unwrap().primerschemes.len(), 1);
    }
}
