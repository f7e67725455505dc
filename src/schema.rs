//! The `info.json` metadata record.
//!
//! [`SchemeInfo`] is the current (`v2.0.0`) shape. Older shapes are read
//! through their own structs and upgraded by [`migrate`]:
//!
//! - `v1.0.0`: no `infoschema` key, no `license` or `primerclass`; species
//!   may be numeric strings.
//! - `v1.1.0`: adds `license`, `primerclass`, `infoschema`, `description`
//!   and `derivedfrom`.
//! - `v2.0.0`: adds `articbedversion`, `collections`, `links` and
//!   `contactinfo`.
use core::fmt;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bedfile::BedVersion;
use crate::error::{Error, Result, SchemeError};
use crate::hashing::is_md5_hex;

pub const CURRENT_INFO_SCHEMA: &str = "v2.0.0";
pub const DEFAULT_LICENSE: &str = "CC BY-SA 4.0";
pub const MIN_AMPLICONSIZE: u32 = 100;

static SCHEMENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*[a-z0-9]$").expect("static regex"));
static SCHEMEVERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^v\d+\.\d+\.\d+$").expect("static regex"));

pub fn validate_schemename(name: &str) -> std::result::Result<(), SchemeError> {
    if SCHEMENAME.is_match(name) {
        Ok(())
    } else {
        Err(SchemeError::InvalidSchemeIdentity(format!(
            "schemename '{name}' must only contain a-z, 0-9 and '-', and cannot start or end with '-'"
        )))
    }
}

pub fn validate_schemeversion(version: &str) -> std::result::Result<(), SchemeError> {
    if SCHEMEVERSION.is_match(version) {
        Ok(())
    } else {
        Err(SchemeError::InvalidSchemeIdentity(format!(
            "schemeversion '{version}' must be in the form v(int).(int).(int)"
        )))
    }
}

pub fn validate_ampliconsize(size: u32) -> std::result::Result<(), SchemeError> {
    if size >= MIN_AMPLICONSIZE {
        Ok(())
    } else {
        Err(SchemeError::InvalidSchemeIdentity(format!(
            "ampliconsize {size} must be at least {MIN_AMPLICONSIZE}"
        )))
    }
}

/// `(schemename, ampliconsize, schemeversion)`, which is also the scheme's
/// relative directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemeIdentity {
    pub schemename: String,
    pub ampliconsize: u32,
    pub schemeversion: String,
}

impl SchemeIdentity {
    pub fn new(
        schemename: impl Into<String>,
        ampliconsize: u32,
        schemeversion: impl Into<String>,
    ) -> std::result::Result<SchemeIdentity, SchemeError> {
        let identity = SchemeIdentity {
            schemename: schemename.into(),
            ampliconsize,
            schemeversion: schemeversion.into(),
        };
        identity.validate()?;
        Ok(identity)
    }

    pub fn validate(&self) -> std::result::Result<(), SchemeError> {
        validate_schemename(&self.schemename)?;
        validate_ampliconsize(self.ampliconsize)?;
        validate_schemeversion(&self.schemeversion)
    }

    /// `schemename/ampliconsize/schemeversion`
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.schemename)
            .join(self.ampliconsize.to_string())
            .join(&self.schemeversion)
    }

    /// Identity implied by a scheme directory's last three components.
    pub fn from_dir(dir: &Path) -> Option<(String, String, String)> {
        let mut parts = dir.components().rev().map(|c| c.as_os_str().to_string_lossy().to_string());
        let version = parts.next()?;
        let size = parts.next()?;
        let name = parts.next()?;
        Some((name, size, version))
    }
}

impl fmt::Display for SchemeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.schemename, self.ampliconsize, self.schemeversion)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeStatus {
    Withdrawn,
    Deprecated,
    Autogenerated,
    Draft,
    Tested,
    Validated,
}

impl SchemeStatus {
    pub const ALL: [SchemeStatus; 6] = [
        SchemeStatus::Withdrawn,
        SchemeStatus::Deprecated,
        SchemeStatus::Autogenerated,
        SchemeStatus::Draft,
        SchemeStatus::Tested,
        SchemeStatus::Validated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SchemeStatus::Withdrawn => "withdrawn",
            SchemeStatus::Deprecated => "deprecated",
            SchemeStatus::Autogenerated => "autogenerated",
            SchemeStatus::Draft => "draft",
            SchemeStatus::Tested => "tested",
            SchemeStatus::Validated => "validated",
        }
    }
}

impl fmt::Display for SchemeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemeStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == lower)
            .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimerClass {
    #[default]
    Primerschemes,
}

impl PrimerClass {
    pub fn as_str(self) -> &'static str {
        match self {
            PrimerClass::Primerschemes => "primerschemes",
        }
    }
}

impl fmt::Display for PrimerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimerClass {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primerschemes" => Ok(PrimerClass::Primerschemes),
            _ => Err(format!("unknown primer class '{s}'")),
        }
    }
}

/// Controlled vocabulary for `collections`. Variants are declared in
/// alphabetical order of their serialized names so sets serialize sorted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum Collection {
    Artic,
    ClinicalIsolates,
    Community,
    Modjadji,
    MultiTarget,
    Panel,
    QuickLab,
    WasteWater,
    WholeGenome,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Artic,
        Collection::ClinicalIsolates,
        Collection::Community,
        Collection::Modjadji,
        Collection::MultiTarget,
        Collection::Panel,
        Collection::QuickLab,
        Collection::WasteWater,
        Collection::WholeGenome,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Artic => "ARTIC",
            Collection::ClinicalIsolates => "CLINICAL-ISOLATES",
            Collection::Community => "COMMUNITY",
            Collection::Modjadji => "MODJADJI",
            Collection::MultiTarget => "MULTI-TARGET",
            Collection::Panel => "PANEL",
            Collection::QuickLab => "QUICK-LAB",
            Collection::WasteWater => "WASTE-WATER",
            Collection::WholeGenome => "WHOLE-GENOME",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == upper)
            .ok_or_else(|| format!("unknown collection '{s}'"))
    }
}

/// Categorised URLs attached to a scheme.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub validation: Vec<String>,
    #[serde(default)]
    pub homepage: Vec<String>,
    #[serde(default)]
    pub vendors: Vec<String>,
    #[serde(default)]
    pub misc: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkField {
    Protocols,
    Validation,
    Homepage,
    Vendors,
    Misc,
}

impl FromStr for LinkField {
    type Err = SchemeError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "protocols" => Ok(LinkField::Protocols),
            "validation" => Ok(LinkField::Validation),
            "homepage" => Ok(LinkField::Homepage),
            "vendors" => Ok(LinkField::Vendors),
            "misc" => Ok(LinkField::Misc),
            other => Err(SchemeError::UnknownLinkField(other.to_string())),
        }
    }
}

impl Links {
    pub fn field_mut(&mut self, field: LinkField) -> &mut Vec<String> {
        match field {
            LinkField::Protocols => &mut self.protocols,
            LinkField::Validation => &mut self.validation,
            LinkField::Homepage => &mut self.homepage,
            LinkField::Vendors => &mut self.vendors,
            LinkField::Misc => &mut self.misc,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&'static str, &Vec<String>)> {
        [
            ("protocols", &self.protocols),
            ("validation", &self.validation),
            ("homepage", &self.homepage),
            ("vendors", &self.vendors),
            ("misc", &self.misc),
        ]
        .into_iter()
    }
}

/// Current `info.json` record. Field order here is the serialized key order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeInfo {
    pub ampliconsize: u32,
    pub schemeversion: String,
    pub schemename: String,
    pub primer_bed_md5: String,
    pub reference_fasta_md5: String,
    pub status: SchemeStatus,
    pub citations: Vec<String>,
    pub authors: Vec<String>,
    pub algorithmversion: String,
    pub species: BTreeSet<u32>,
    pub license: Option<String>,
    pub primerclass: PrimerClass,
    pub infoschema: String,
    pub articbedversion: BedVersion,
    pub description: Option<String>,
    pub derivedfrom: Option<String>,
    pub collections: BTreeSet<Collection>,
    pub links: Links,
    pub contactinfo: Option<String>,
}

impl SchemeInfo {
    pub fn identity(&self) -> SchemeIdentity {
        SchemeIdentity {
            schemename: self.schemename.clone(),
            ampliconsize: self.ampliconsize,
            schemeversion: self.schemeversion.clone(),
        }
    }

    /// Check every field-level invariant of the current schema.
    pub fn validate(&self) -> std::result::Result<(), SchemeError> {
        self.identity().validate()?;
        let id = self.identity().to_string();

        for (field, digest) in [("primer_bed_md5", &self.primer_bed_md5), ("reference_fasta_md5", &self.reference_fasta_md5)] {
            if !is_md5_hex(digest) {
                return Err(SchemeError::invalid(&id, format!("{field} '{digest}' is not an md5 hex digest")));
            }
        }
        if self.authors.is_empty() {
            return Err(SchemeError::invalid(&id, "authors cannot be empty"));
        }
        check_unique(&id, "authors", &self.authors)?;
        check_unique(&id, "citations", &self.citations)?;
        for (field, urls) in self.links.iter() {
            check_unique(&id, &format!("links.{field}"), urls)?;
        }
        if self.species.is_empty() {
            return Err(SchemeError::invalid(&id, "species cannot be empty"));
        }
        if self.species.contains(&0) {
            return Err(SchemeError::invalid(&id, "species must be positive taxonomy ids"));
        }
        if self.infoschema != CURRENT_INFO_SCHEMA {
            return Err(SchemeError::invalid(
                &id,
                format!("infoschema {} is not the current {CURRENT_INFO_SCHEMA}", self.infoschema),
            ));
        }
        Ok(())
    }

    /// Pretty JSON, 4-space indent, newline terminated.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        to_pretty_json(self)
    }

    /// Load a current-schema `info.json`. Older records must be migrated
    /// (`regenerate`) first.
    pub fn from_path(path: &Path) -> Result<SchemeInfo> {
        let raw = read_raw(path)?;
        let schema = raw_schema_version(&raw);
        if schema != CURRENT_INFO_SCHEMA {
            return Err(SchemeError::invalid(
                path.display().to_string(),
                format!("infoschema {schema} is outdated; regenerate the scheme to migrate it to {CURRENT_INFO_SCHEMA}"),
            )
            .into());
        }
        serde_json::from_value(raw).map_err(|e| Error::json(path, e))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let text = self.to_json_string().map_err(|e| Error::json(path, e))?;
        std::fs::write(path, text)?;
        debug!("wrote {}", path.display());
        Ok(())
    }
}

/// JSON with a 4-space indent and a trailing newline.
pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn check_unique(id: &str, field: &str, values: &[String]) -> std::result::Result<(), SchemeError> {
    let mut seen = BTreeSet::new();
    for v in values {
        if v.trim().is_empty() {
            return Err(SchemeError::invalid(id, format!("{field} cannot contain empty values")));
        }
        if !seen.insert(v.as_str()) {
            return Err(SchemeError::invalid(id, format!("{field} contains '{v}' more than once")));
        }
    }
    Ok(())
}

/// Read an `info.json` as untyped JSON, checking the file name.
pub fn read_raw(path: &Path) -> Result<Value> {
    if path.file_name().is_none_or(|n| n != "info.json") {
        return Err(SchemeError::NotInfoJson(path.to_path_buf()).into());
    }
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| Error::json(path, e))
}

/// Schema version a raw record declares; records predating the key are `v1.0.0`.
pub fn raw_schema_version(raw: &Value) -> &str {
    raw.get("infoschema").and_then(Value::as_str).unwrap_or("v1.0.0")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacySpecies {
    Taxid(u64),
    Text(String),
}

impl LegacySpecies {
    fn taxid(&self) -> Option<u32> {
        let taxid: Option<u32> = match self {
            LegacySpecies::Taxid(n) => u32::try_from(*n).ok(),
            LegacySpecies::Text(s) => s.trim().parse().ok(),
        };
        taxid.filter(|n| *n > 0)
    }
}

#[derive(Deserialize)]
struct InfoV1_0 {
    ampliconsize: u32,
    schemeversion: String,
    schemename: String,
    primer_bed_md5: String,
    reference_fasta_md5: String,
    status: SchemeStatus,
    #[serde(default)]
    citations: Vec<String>,
    authors: Vec<String>,
    algorithmversion: String,
    species: Vec<LegacySpecies>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    derivedfrom: Option<String>,
}

#[derive(Deserialize)]
struct InfoV1_1 {
    #[serde(flatten)]
    base: InfoV1_0,
    #[serde(default = "default_license")]
    license: Option<String>,
    #[serde(default)]
    primerclass: PrimerClass,
}

fn default_license() -> Option<String> {
    Some(DEFAULT_LICENSE.to_string())
}

impl From<InfoV1_0> for InfoV1_1 {
    fn from(base: InfoV1_0) -> Self {
        InfoV1_1 { base, license: default_license(), primerclass: PrimerClass::default() }
    }
}

impl InfoV1_1 {
    fn upgrade(self, articbedversion: BedVersion) -> std::result::Result<SchemeInfo, SchemeError> {
        let b = self.base;
        let mut species = BTreeSet::new();
        for s in &b.species {
            let taxid = s.taxid().ok_or_else(|| {
                SchemeError::invalid(
                    format!("{}/{}/{}", b.schemename, b.ampliconsize, b.schemeversion),
                    "species must be positive NCBI taxonomy ids",
                )
            })?;
            species.insert(taxid);
        }
        Ok(SchemeInfo {
            ampliconsize: b.ampliconsize,
            schemeversion: b.schemeversion,
            schemename: b.schemename,
            primer_bed_md5: b.primer_bed_md5,
            reference_fasta_md5: b.reference_fasta_md5,
            status: b.status,
            citations: b.citations,
            authors: b.authors,
            algorithmversion: b.algorithmversion,
            species,
            license: self.license,
            primerclass: self.primerclass,
            infoschema: CURRENT_INFO_SCHEMA.to_string(),
            articbedversion,
            description: b.description,
            derivedfrom: b.derivedfrom,
            collections: BTreeSet::new(),
            links: Links::default(),
            contactinfo: None,
        })
    }
}

fn null_if_placeholder(field: &mut Option<String>) {
    if field.as_deref().is_some_and(|s| s.is_empty() || s == "None") {
        *field = None;
    }
}

/// Upgrade a raw record of any known schema version to the current shape.
///
/// `articbedversion` is the version detected from the scheme's BED payload;
/// it is required for records that predate the field and overrides any
/// stored value otherwise. Migrating a current record again is a no-op.
pub fn migrate(raw: Value, articbedversion: Option<BedVersion>) -> std::result::Result<SchemeInfo, SchemeError> {
    let schema = raw_schema_version(&raw).to_string();
    let context = || {
        format!(
            "{}/{}/{}",
            raw.get("schemename").and_then(Value::as_str).unwrap_or("?"),
            raw.get("ampliconsize").map(Value::to_string).unwrap_or_else(|| "?".into()),
            raw.get("schemeversion").and_then(Value::as_str).unwrap_or("?"),
        )
    };
    let bad_shape = |e: serde_json::Error| SchemeError::invalid(context(), format!("not a valid {schema} record: {e}"));
    let need_bedversion =
        || SchemeError::invalid(context(), "articbedversion can only be derived from the scheme's primer.bed");

    let mut info = match schema.as_str() {
        "v1.0.0" => {
            let v1: InfoV1_0 = serde_json::from_value(raw.clone()).map_err(bad_shape)?;
            InfoV1_1::from(v1).upgrade(articbedversion.ok_or_else(need_bedversion)?)?
        }
        "v1.1.0" => {
            let v1_1: InfoV1_1 = serde_json::from_value(raw.clone()).map_err(bad_shape)?;
            v1_1.upgrade(articbedversion.ok_or_else(need_bedversion)?)?
        }
        CURRENT_INFO_SCHEMA => {
            let mut info: SchemeInfo = serde_json::from_value(raw.clone()).map_err(bad_shape)?;
            if let Some(v) = articbedversion {
                info.articbedversion = v;
            }
            info
        }
        other => return Err(SchemeError::invalid(context(), format!("unknown infoschema '{other}'"))),
    };
    null_if_placeholder(&mut info.description);
    null_if_placeholder(&mut info.derivedfrom);
    if schema != CURRENT_INFO_SCHEMA {
        debug!("migrated {} from {schema} to {CURRENT_INFO_SCHEMA}", info.identity());
    }
    Ok(info)
}
