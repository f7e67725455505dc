//! On-disk scheme repository.
//!
//! A scheme version lives at `{root}/{schemename}/{ampliconsize}/{schemeversion}/`
//! and holds `primer.bed`, `reference.fasta`, `info.json`, `README.md` and a
//! `work/` directory of auxiliary files. The directory path *is* the scheme's
//! identity, so every entry point that touches an existing scheme checks the
//! record against its location first.
//!
//! Every operation finishes validating before it writes or deletes anything.
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::bedfile::BedFile;
use crate::config;
use crate::error::{Error, IndexError, Result, SchemeError};
use crate::hashing::{md5_hex, normalize_fasta, Fasta};
use crate::modify::Mutation;
use crate::primername::PrimerNameVersion;
use crate::readme;
use crate::schema::{self, Collection, PrimerClass, SchemeIdentity, SchemeInfo, SchemeStatus, CURRENT_INFO_SCHEMA, DEFAULT_LICENSE};

pub const PRIMER_BED: &str = "primer.bed";
pub const REFERENCE_FASTA: &str = "reference.fasta";
pub const INFO_JSON: &str = "info.json";
pub const WORK_DIR: &str = "work";

/// Files never carried into `work/` when creating a scheme.
const SKIPPED_SUFFIXES: [&str; 4] = ["primer.bed", "info.json", "config.json", ".db"];

/// Everything `create` needs besides the payload files.
#[derive(Clone, Debug)]
pub struct CreateOptions {
    pub identity: SchemeIdentity,
    pub species: Vec<u32>,
    pub authors: Vec<String>,
    pub status: SchemeStatus,
    pub citations: Vec<String>,
    pub primerbed: Option<PathBuf>,
    pub reference: Option<PathBuf>,
    pub configpath: Option<PathBuf>,
    pub algorithmversion: Option<String>,
    pub description: Option<String>,
    pub derivedfrom: Option<String>,
    pub primerclass: PrimerClass,
    pub collections: Vec<Collection>,
    pub contactinfo: Option<String>,
    /// Replace an existing scheme directory instead of failing
    pub overwrite: bool,
}

/// Input files located for a new scheme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemeInputs {
    pub primerbed: PathBuf,
    pub reference: PathBuf,
    pub config: Option<PathBuf>,
    /// Images, plots, alignments and other files copied into `work/`
    pub work_files: Vec<PathBuf>,
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn explicit_or_single(
    explicit: Option<&Path>,
    found: &[PathBuf],
    label: &str,
    flag: &str,
    dir: &Path,
    matches: impl Fn(&str) -> bool,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(SchemeError::MissingFile(format!("could not find file at {}", path.display())).into());
        }
        return Ok(path.to_path_buf());
    }
    let hits: Vec<&PathBuf> = found.iter().filter(|p| matches(&file_name(p))).collect();
    match hits.as_slice() {
        [single] => Ok((*single).clone()),
        _ => Err(SchemeError::MissingFile(format!(
            "could not find a single {label} file in {} or its subdirectories, found {}; specify it with {flag}",
            dir.display(),
            hits.len()
        ))
        .into()),
    }
}

/// Locate the payload, designer config and auxiliary files under `schemepath`.
pub fn discover_inputs(
    schemepath: &Path,
    primerbed: Option<&Path>,
    reference: Option<&Path>,
    configpath: Option<&Path>,
) -> Result<SchemeInputs> {
    let found = files_under(schemepath);

    let primerbed = explicit_or_single(primerbed, &found, "*primer.bed", "--primerbed", schemepath, |n| {
        n.ends_with("primer.bed")
    })?;
    let reference = explicit_or_single(reference, &found, REFERENCE_FASTA, "--reference", schemepath, |n| {
        n == REFERENCE_FASTA || n == "referance.fasta"
    })?;
    let config = match configpath {
        Some(_) => Some(explicit_or_single(configpath, &found, config::CONFIG_FILE, "--configpath", schemepath, |_| false)?),
        None => {
            let hits: Vec<&PathBuf> = found.iter().filter(|p| file_name(p) == config::CONFIG_FILE).collect();
            match hits.as_slice() {
                [] => None,
                [single] => Some((*single).clone()),
                _ => {
                    return Err(SchemeError::MissingFile(format!(
                        "found {} config.json files in {}; specify one with --configpath",
                        hits.len(),
                        schemepath.display()
                    ))
                    .into())
                }
            }
        }
    };

    let work_files = found
        .into_iter()
        .filter(|p| *p != primerbed && *p != reference && Some(p) != config.as_ref())
        .filter(|p| {
            let name = file_name(p);
            name != ".DS_Store"
                && name != REFERENCE_FASTA
                && !SKIPPED_SUFFIXES.iter().any(|s| name.ends_with(s))
        })
        .collect();

    Ok(SchemeInputs { primerbed, reference, config, work_files })
}

/// Create a scheme version under `output` from the files in `schemepath`.
pub fn create(schemepath: &Path, output: &Path, opts: &CreateOptions) -> Result<SchemeInfo> {
    opts.identity.validate()?;
    let inputs = discover_inputs(
        schemepath,
        opts.primerbed.as_deref(),
        opts.reference.as_deref(),
        opts.configpath.as_deref(),
    )?;
    debug!("inputs for {}: {:?}", opts.identity, inputs);

    let bed = BedFile::from_path(&inputs.primerbed)?;
    let bed_text = bed.to_canonical_string();
    let fasta = normalize_fasta(&fs::read_to_string(&inputs.reference)?)?;
    if let Some(msg) = reference_mismatch(&bed, &fasta) {
        warn!("{}: {msg}", opts.identity);
    }

    let config_json = match &inputs.config {
        Some(path) => Some(config::sanitize(config::read(path)?)),
        None => None,
    };
    let algorithmversion = match (&opts.algorithmversion, &config_json) {
        (Some(v), _) => v.clone(),
        (None, Some(c)) => config::algorithmversion(c).ok_or_else(|| {
            SchemeError::MissingFile(format!(
                "algorithmversion not found in {}; specify it with --algorithmversion",
                inputs.config.as_deref().unwrap_or(schemepath).display()
            ))
        })?,
        (None, None) => {
            return Err(SchemeError::MissingFile(format!(
                "no config.json found in {}; specify --configpath or --algorithmversion",
                schemepath.display()
            ))
            .into())
        }
    };

    let id = &opts.identity;
    let info = SchemeInfo {
        ampliconsize: id.ampliconsize,
        schemeversion: id.schemeversion.clone(),
        schemename: id.schemename.clone(),
        primer_bed_md5: md5_hex(&bed_text),
        reference_fasta_md5: md5_hex(&fasta.text),
        status: opts.status,
        citations: opts.citations.clone(),
        authors: opts.authors.clone(),
        algorithmversion,
        species: opts.species.iter().copied().collect(),
        license: Some(DEFAULT_LICENSE.to_string()),
        primerclass: opts.primerclass,
        infoschema: CURRENT_INFO_SCHEMA.to_string(),
        articbedversion: bed.version,
        description: opts.description.clone(),
        derivedfrom: opts.derivedfrom.clone(),
        collections: opts.collections.iter().copied().collect(),
        links: Default::default(),
        contactinfo: opts.contactinfo.clone(),
    };
    info.validate()?;

    let target = output.join(id.relative_path());
    if target.exists() && !opts.overwrite {
        return Err(SchemeError::PathAlreadyExists(target).into());
    }

    // Everything is written beside the target first; an existing scheme is
    // only replaced once the new one is complete.
    let staging = target.with_file_name(format!(".{}.partial", file_name(&target)));
    if staging.is_dir() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let written = (|| -> Result<()> {
        fs::write(staging.join(PRIMER_BED), &bed_text)?;
        fs::write(staging.join(REFERENCE_FASTA), &fasta.text)?;
        let work = staging.join(WORK_DIR);
        fs::create_dir_all(&work)?;
        if let Some(c) = &config_json {
            config::write(&work.join(config::CONFIG_FILE), c)?;
        }
        for file in &inputs.work_files {
            fs::copy(file, work.join(file_name(file)))?;
        }
        info.write(&staging.join(INFO_JSON))?;
        readme::write(&staging, &info)?;
        if target.exists() {
            warn!("overwriting {}", target.display());
        }
        publish(&staging, &target)
    })();
    if let Err(e) = written {
        warn!("cleaning up {}", staging.display());
        if staging.is_dir() {
            fs::remove_dir_all(&staging)?;
        }
        prune_empty_parents(&staging, output)?;
        return Err(e);
    }

    info!("created {} at {}", id, target.display());
    Ok(info)
}

/// Move the complete scheme in `staging` to `target`. An existing `target`
/// is set aside first and restored if the move fails.
fn publish(staging: &Path, target: &Path) -> Result<()> {
    if !target.exists() {
        fs::rename(staging, target)?;
        return Ok(());
    }
    let previous = target.with_file_name(format!(".{}.previous", file_name(target)));
    if previous.exists() {
        fs::remove_dir_all(&previous)?;
    }
    fs::rename(target, &previous)?;
    if let Err(e) = fs::rename(staging, target) {
        fs::rename(&previous, target)?;
        return Err(e.into());
    }
    fs::remove_dir_all(&previous)?;
    Ok(())
}

fn reference_mismatch(bed: &BedFile, fasta: &Fasta) -> Option<String> {
    let refs = bed.references();
    let ids: BTreeSet<String> = fasta.ids.iter().cloned().collect();
    (refs != ids).then(|| {
        format!(
            "primer.bed references {:?} do not match reference.fasta records {:?}",
            refs, ids
        )
    })
}

fn canonical_info_path(path: &Path) -> Result<PathBuf> {
    if path.file_name().is_none_or(|n| n != INFO_JSON) {
        return Err(SchemeError::NotInfoJson(path.to_path_buf()).into());
    }
    Ok(fs::canonicalize(path)?)
}

fn scheme_dir(info_path: &Path) -> Result<&Path> {
    info_path
        .parent()
        .ok_or_else(|| SchemeError::NotInfoJson(info_path.to_path_buf()).into())
}

/// Fail unless `identity` names the directory `info_path` lives in.
pub fn check_location(info_path: &Path, identity: &SchemeIdentity) -> std::result::Result<(), SchemeError> {
    let dir = info_path.parent().unwrap_or(info_path);
    let expected = (
        identity.schemename.clone(),
        identity.ampliconsize.to_string(),
        identity.schemeversion.clone(),
    );
    match SchemeIdentity::from_dir(dir) {
        Some(found) if found == expected => Ok(()),
        _ => Err(SchemeError::invalid(
            info_path.display().to_string(),
            format!("identity {identity} does not match its location {}", dir.display()),
        )),
    }
}

/// Apply one field mutation, then rewrite `info.json` and the README.
pub fn modify(info_path: &Path, mutation: &Mutation) -> Result<SchemeInfo> {
    let path = canonical_info_path(info_path)?;
    let current = SchemeInfo::from_path(&path)?;
    check_location(&path, &current.identity())?;

    let next = mutation.apply(&current)?;
    next.write(&path)?;
    readme::write(scheme_dir(&path)?, &next)?;
    info!("{mutation} for {}", next.identity());
    Ok(next)
}

/// Re-derive hashes and `articbedversion` from the payload, migrate the
/// record to the current schema and rewrite every derived file.
///
/// Unless `rehash` is set, a payload whose digest differs from the stored one
/// is a [`SchemeError::HashMismatch`].
pub fn regenerate(info_path: &Path, rehash: bool) -> Result<SchemeInfo> {
    let path = canonical_info_path(info_path)?;
    let dir = scheme_dir(&path)?;
    let raw = schema::read_raw(&path)?;

    let bed_path = dir.join(PRIMER_BED);
    let fasta_path = dir.join(REFERENCE_FASTA);
    for p in [&bed_path, &fasta_path] {
        if !p.is_file() {
            return Err(SchemeError::MissingFile(format!("{} not found", p.display())).into());
        }
    }
    let bed = BedFile::from_path(&bed_path)?;
    let bed_text = bed.to_canonical_string();
    let fasta = normalize_fasta(&fs::read_to_string(&fasta_path)?)?;

    let mut info = schema::migrate(raw, Some(bed.version))?;
    let computed = [
        (&bed_path, md5_hex(&bed_text), &mut info.primer_bed_md5),
        (&fasta_path, md5_hex(&fasta.text), &mut info.reference_fasta_md5),
    ];
    for (file, digest, stored) in computed {
        if *stored != digest {
            if !rehash {
                return Err(SchemeError::HashMismatch {
                    path: file.clone(),
                    stored: stored.clone(),
                    computed: digest,
                }
                .into());
            }
            info!("{}: recording new digest {digest}", file.display());
            *stored = digest;
        }
    }
    check_location(&path, &info.identity())?;
    info.validate()?;

    let work_config = dir.join(WORK_DIR).join(config::CONFIG_FILE);
    let config_json = if work_config.is_file() {
        Some(config::sanitize(config::read(&work_config)?))
    } else {
        None
    };

    fs::write(&bed_path, &bed_text)?;
    fs::write(&fasta_path, &fasta.text)?;
    if let Some(c) = &config_json {
        config::write(&work_config, c)?;
    }
    info.write(&path)?;
    readme::write(dir, &info)?;
    info!("regenerated {}", info.identity());
    Ok(info)
}

#[derive(Deserialize)]
struct IdentityFields {
    schemename: String,
    ampliconsize: u32,
    schemeversion: String,
}

/// Delete a scheme version, then its ampliconsize and schemename directories
/// if they are left empty.
pub fn remove(info_path: &Path) -> Result<SchemeIdentity> {
    let path = canonical_info_path(info_path)?;
    let raw = schema::read_raw(&path)?;
    let fields: IdentityFields = serde_json::from_value(raw).map_err(|e| Error::json(&path, e))?;
    let identity = SchemeIdentity {
        schemename: fields.schemename,
        ampliconsize: fields.ampliconsize,
        schemeversion: fields.schemeversion,
    };
    check_location(&path, &identity)?;

    let version_dir = scheme_dir(&path)?;
    fs::remove_dir_all(version_dir)?;
    debug!("removed {}", version_dir.display());
    if let Some(size_dir) = version_dir.parent() {
        if let Some(name_dir) = size_dir.parent() {
            if let Some(root) = name_dir.parent() {
                prune_empty_parents(version_dir, root)?;
            }
        }
    }
    info!("removed {identity}");
    Ok(identity)
}

/// Remove now-empty ancestors of `removed`, stopping below `root`.
fn prune_empty_parents(removed: &Path, root: &Path) -> Result<()> {
    let mut dir = removed.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) || fs::read_dir(d)?.next().is_some() {
            break;
        }
        fs::remove_dir(d)?;
        debug!("removed empty {}", d.display());
        dir = d.parent();
    }
    Ok(())
}

/// Check one scheme against every repository rule, reporting all problems
/// together.
pub fn validate_scheme(info_path: &Path) -> Result<SchemeInfo> {
    let path = canonical_info_path(info_path)?;
    let dir = scheme_dir(&path)?;
    let info = SchemeInfo::from_path(&path)?;
    let mut problems: Vec<String> = Vec::new();

    if let Err(e) = info.validate() {
        problems.push(e.to_string());
    }
    if let Err(e) = check_location(&path, &info.identity()) {
        problems.push(e.to_string());
    }

    match fs::read_to_string(dir.join(readme::README_FILE)) {
        Ok(text) => {
            let size = info.ampliconsize.to_string();
            for part in [info.schemename.as_str(), size.as_str(), info.schemeversion.as_str()] {
                if !text.contains(part) {
                    problems.push(format!("README.md does not mention '{part}'"));
                }
            }
        }
        Err(_) => problems.push("README.md is missing".into()),
    }

    let bed_path = dir.join(PRIMER_BED);
    let bed = fs::read_to_string(&bed_path).map_err(Error::from).and_then(|t| BedFile::parse(&t));
    let fasta_path = dir.join(REFERENCE_FASTA);
    let fasta = fs::read_to_string(&fasta_path).map_err(Error::from).and_then(|t| normalize_fasta(&t));

    match &bed {
        Ok(bed) => {
            if bed.grammar != PrimerNameVersion::V2 {
                problems.push(format!("{PRIMER_BED} uses {} primer names", bed.grammar));
            }
            let unpaired = bed.unpaired_amplicons();
            if !unpaired.is_empty() {
                problems.push(format!("amplicons without both LEFT and RIGHT primers: {}", unpaired.join(", ")));
            }
            if bed.version != info.articbedversion {
                problems.push(format!(
                    "articbedversion is {} but {PRIMER_BED} is {}",
                    info.articbedversion, bed.version
                ));
            }
            let digest = md5_hex(bed.to_canonical_string());
            if digest != info.primer_bed_md5 {
                problems.push(
                    SchemeError::HashMismatch { path: bed_path, stored: info.primer_bed_md5.clone(), computed: digest }
                        .to_string(),
                );
            }
        }
        Err(e) => problems.push(format!("{PRIMER_BED}: {e}")),
    }
    match &fasta {
        Ok(fasta) => {
            let digest = md5_hex(&fasta.text);
            if digest != info.reference_fasta_md5 {
                problems.push(
                    SchemeError::HashMismatch { path: fasta_path, stored: info.reference_fasta_md5.clone(), computed: digest }
                        .to_string(),
                );
            }
        }
        Err(e) => problems.push(format!("{REFERENCE_FASTA}: {e}")),
    }
    if let (Ok(bed), Ok(fasta)) = (&bed, &fasta) {
        if let Some(msg) = reference_mismatch(bed, fasta) {
            problems.push(msg);
        }
    }

    if problems.is_empty() {
        debug!("{} is valid", info.identity());
        Ok(info)
    } else {
        Err(SchemeError::invalid(path.display().to_string(), problems.join("; ")).into())
    }
}

/// Every `info.json` below `dir`, skipping hidden and `work/` directories.
pub fn find_info_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0 || !(name.starts_with('.') || (e.file_type().is_dir() && name == WORK_DIR))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == INFO_JSON)
        .map(|e| e.into_path())
        .collect()
}

fn for_each_scheme(dir: &Path, op: impl Fn(&Path) -> Result<SchemeInfo>) -> Result<usize> {
    let paths = find_info_files(dir);
    let mut failures = Vec::new();
    for path in &paths {
        if let Err(e) = op(path) {
            failures.push((path.clone(), e));
        }
    }
    if failures.is_empty() {
        Ok(paths.len())
    } else {
        Err(IndexError::InvalidSchemes(failures).into())
    }
}

/// Validate every scheme under `dir`; returns how many were checked.
pub fn validate_all(dir: &Path) -> Result<usize> {
    let n = for_each_scheme(dir, validate_scheme)?;
    info!("validated {n} scheme(s) under {}", dir.display());
    Ok(n)
}

/// Regenerate every scheme under `dir`, recording changed payload digests.
pub fn migrate_all(dir: &Path) -> Result<usize> {
    let n = for_each_scheme(dir, |p| regenerate(p, true))?;
    info!("migrated {n} scheme(s) under {}", dir.display());
    Ok(n)
}
