//! Alternate scheme names used for discovery.
//!
//! Aliases never take part in identity: they only map a name a user might
//! type onto a canonical `schemename`. A repository keeps its own aliases in
//! an `aliases.json` object (`{"alias": "schemename"}`), written compact with
//! sorted keys.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use log::{info, warn};
use polars::prelude::*;
use regex::Regex;

use crate::data::aliases::BUILTIN_ALIASES;
use crate::error::{Error, Result, SchemeError};
use crate::schema::validate_schemename;

static ALIAS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-.]*[a-z0-9]$").expect("static regex"));

/// A built-in alias.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AliasRecord {
    pub alias: &'static str,
    pub schemename: &'static str,
    pub note: Option<&'static str>,
}

pub fn validate_alias(alias: &str) -> std::result::Result<(), SchemeError> {
    if ALIAS.is_match(alias) {
        Ok(())
    } else {
        Err(SchemeError::invalid(
            format!("alias '{alias}'"),
            "must only contain a-z, 0-9, '-' and '.', and cannot start or end with '-' or '.'",
        ))
    }
}

/// Read an aliases file. A missing, empty or unparsable file reads as empty.
pub fn read_file(path: &Path) -> BTreeMap<String, String> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!("could not read {}: {e}; treating it as empty", path.display());
            return BTreeMap::new();
        }
    };
    if text.trim().is_empty() {
        return BTreeMap::new();
    }
    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!("{} is not an alias object: {e}; treating it as empty", path.display());
        BTreeMap::new()
    })
}

fn write_file(path: &Path, aliases: &BTreeMap<String, String>) -> Result<()> {
    let text = serde_json::to_string(aliases).map_err(|e| Error::json(path, e))?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Add `alias -> schemename`. Returns `false`, leaving the file untouched,
/// if the alias is already present.
pub fn add(path: &Path, alias: &str, schemename: &str) -> Result<bool> {
    validate_alias(alias)?;
    validate_schemename(schemename)?;
    let mut aliases = read_file(path);
    if let Some(existing) = aliases.get(alias) {
        info!("alias {alias} already exists (-> {existing}); doing nothing");
        return Ok(false);
    }
    aliases.insert(alias.to_string(), schemename.to_string());
    write_file(path, &aliases)?;
    info!("added alias {alias} -> {schemename}");
    Ok(true)
}

/// Remove `alias`. Returns `false` if it was not present.
pub fn remove(path: &Path, alias: &str) -> Result<bool> {
    let mut aliases = read_file(path);
    match aliases.remove(alias) {
        Some(target) => {
            write_file(path, &aliases)?;
            info!("removed alias {alias} (-> {target})");
            Ok(true)
        }
        None => {
            info!("alias {alias} does not exist; doing nothing");
            Ok(false)
        }
    }
}

/// Where an alias in an [`AliasTable`] came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AliasSource {
    Builtin { note: Option<&'static str> },
    File,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AliasTarget {
    schemename: String,
    source: AliasSource,
}

/// Built-in aliases overlaid with a repository's own.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, AliasTarget>,
}

impl AliasTable {
    pub fn builtin() -> AliasTable {
        AliasTable {
            entries: BUILTIN_ALIASES
                .iter()
                .map(|r| {
                    let target = AliasTarget { schemename: r.schemename.to_string(), source: AliasSource::Builtin { note: r.note } };
                    (r.alias.to_string(), target)
                })
                .collect(),
        }
    }

    /// Built-ins plus the entries of `path`, which win on conflict.
    pub fn with_file(path: &Path) -> AliasTable {
        let mut table = Self::builtin();
        table.entries.extend(
            read_file(path)
                .into_iter()
                .map(|(alias, schemename)| (alias, AliasTarget { schemename, source: AliasSource::File })),
        );
        table
    }

    /// Canonical scheme name for `name`, or `name` itself.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.entries.get(name).map(|t| t.schemename.as_str()).unwrap_or(name)
    }

    /// `(alias, schemename, source)` in alias order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &AliasSource)> {
        self.entries.iter().map(|(a, t)| (a.as_str(), t.schemename.as_str(), &t.source))
    }

    /// One row per alias: alias, schemename, source and note.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut aliases = Vec::new();
        let mut schemenames = Vec::new();
        let mut sources = Vec::new();
        let mut notes = Vec::new();
        for (alias, schemename, source) in self.iter() {
            aliases.push(alias.to_string());
            schemenames.push(schemename.to_string());
            let (label, note) = match source {
                AliasSource::Builtin { note } => ("built-in", note.unwrap_or_default()),
                AliasSource::File => ("aliases.json", ""),
            };
            sources.push(label.to_string());
            notes.push(note.to_string());
        }

        df!(
            "alias" => aliases,
            "schemename" => schemenames,
            "source" => sources,
            "note" => notes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_pattern() {
        for ok in ["artic-v4.1", "a1", "ncov-2019"] {
            assert!(validate_alias(ok).is_ok(), "{ok}");
        }
        for bad in ["a", "-a1", "a1.", "ARTIC", "a b"] {
            assert!(validate_alias(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn add_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        std::fs::write(&path, "").unwrap();

        assert!(add(&path, "zz-top", "artic-sars-cov-2").unwrap());
        assert!(add(&path, "artic-v4.1", "artic-sars-cov-2").unwrap());
        assert!(!add(&path, "zz-top", "other-scheme").unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"artic-v4.1":"artic-sars-cov-2","zz-top":"artic-sars-cov-2"}"#
        );

        assert!(remove(&path, "zz-top").unwrap());
        assert!(!remove(&path, "zz-top").unwrap());
        assert_eq!(read_file(&path).len(), 1);

        assert!(add(&path, "ok-alias", "Bad_Name").is_err());
    }

    #[test]
    fn file_entries_override_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        std::fs::write(&path, r#"{"sars-cov-2": "varvamp-sars-cov-2", "x1": "y1"}"#).unwrap();

        let builtin = AliasTable::builtin();
        assert_eq!(builtin.resolve("artic-ncov2019"), "artic-sars-cov-2");
        assert_eq!(builtin.resolve("unknown"), "unknown");

        let table = AliasTable::with_file(&path);
        assert_eq!(table.resolve("sars-cov-2"), "varvamp-sars-cov-2");
        assert_eq!(table.resolve("x1"), "y1");
        assert_eq!(table.iter().count(), BUILTIN_ALIASES.len() + 1);
        let sources: Vec<_> = table.iter().filter(|(a, ..)| ["sars-cov-2", "x1"].contains(a)).map(|(.., s)| s.clone()).collect();
        assert_eq!(sources, [AliasSource::File, AliasSource::File]);
    }

    #[test]
    fn builtins_are_well_formed() {
        for record in BUILTIN_ALIASES {
            assert!(validate_alias(record.alias).is_ok(), "{}", record.alias);
            assert!(validate_schemename(record.schemename).is_ok(), "{}", record.schemename);
            assert_ne!(record.alias, record.schemename);
        }
    }

    #[test]
    fn table_lists_every_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        std::fs::write(&path, r#"{"zika-v1": "zika-virus"}"#).unwrap();
        let df = AliasTable::with_file(&path).to_dataframe().unwrap();
        assert_eq!(df.height(), BUILTIN_ALIASES.len() + 1);
        assert_eq!(df.width(), 4);
        let sources = df.column("source").unwrap();
        assert_eq!(sources.str().unwrap().into_iter().filter(|s| *s == Some("aliases.json")).count(), 1);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_file(&dir.path().join("nope.json")).is_empty());
    }
}
