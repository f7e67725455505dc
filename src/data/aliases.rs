//! Built-in scheme name aliases.
//!
//! Legacy or informal names that still circulate in protocols and pipelines,
//! mapped to the scheme name they refer to today. Entries in a repository's
//! `aliases.json` take precedence over these.

use crate::aliases::AliasRecord;

/// The original ARTIC nCoV-2019 scheme name.
pub const ARTIC_NCOV2019: AliasRecord = AliasRecord {
    alias: "artic-ncov2019",
    schemename: "artic-sars-cov-2",
    note: Some("renamed when the scheme moved to the primerschemes registry"),
};

pub const NCOV_2019: AliasRecord = AliasRecord {
    alias: "ncov-2019",
    schemename: "artic-sars-cov-2",
    note: None,
};

pub const SARS_COV_2: AliasRecord = AliasRecord {
    alias: "sars-cov-2",
    schemename: "artic-sars-cov-2",
    note: Some("virus name commonly used in place of the scheme name"),
};

pub const MPXV: AliasRecord = AliasRecord {
    alias: "hmpxv1",
    schemename: "artic-mpox",
    note: None,
};

pub static BUILTIN_ALIASES: &[AliasRecord] = &[ARTIC_NCOV2019, NCOV_2019, SARS_COV_2, MPXV];
