//! Filtering index entries for discovery.
use polars::prelude::*;

use crate::aliases::AliasTable;
use crate::index::{Index, IndexEntry};
use crate::schema::{Collection, SchemeStatus};

/// Every set field must match; an empty query matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub status: Option<SchemeStatus>,
    /// Scheme name or alias
    pub name: Option<String>,
    pub ampliconsize: Option<u32>,
    pub collection: Option<Collection>,
    /// NCBI taxonomy id
    pub species: Option<u32>,
}

pub fn search<'a>(index: &'a Index, query: &SearchQuery, aliases: &AliasTable) -> Vec<&'a IndexEntry> {
    let name = query.name.as_deref().map(|n| aliases.resolve(n));
    index
        .primerschemes
        .values()
        .filter(|e| {
            let info = &e.info;
            query.status.is_none_or(|s| info.status == s)
                && name.is_none_or(|n| info.schemename == n)
                && query.ampliconsize.is_none_or(|s| info.ampliconsize == s)
                && query.collection.is_none_or(|c| info.collections.contains(&c))
                && query.species.is_none_or(|t| info.species.contains(&t))
        })
        .collect()
}

/// One row per entry: name, size, version, status and species.
pub fn to_dataframe(entries: &[&IndexEntry]) -> PolarsResult<DataFrame> {
    let names: Vec<String> = entries.iter().map(|e| e.info.schemename.clone()).collect();
    let sizes: Vec<u32> = entries.iter().map(|e| e.info.ampliconsize).collect();
    let versions: Vec<String> = entries.iter().map(|e| e.info.schemeversion.clone()).collect();
    let status: Vec<String> = entries.iter().map(|e| e.info.status.to_string()).collect();
    let species: Vec<String> = entries
        .iter()
        .map(|e| e.info.species.iter().map(u32::to_string).collect::<Vec<_>>().join(","))
        .collect();
    let urls: Vec<String> = entries.iter().map(|e| e.info_json_url.clone()).collect();

    df!(
        "schemename" => names,
        "ampliconsize" => sizes,
        "schemeversion" => versions,
        "status" => status,
        "species" => species,
        "info_json_url" => urls,
    )
}
