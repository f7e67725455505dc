//! Primer BED parsing and normalisation.
//!
//! Three layouts are recognised:
//!
//! | version | columns | header lines | references | primer names |
//! |---------|---------|--------------|------------|--------------|
//! | `v1.0`  | 6       | no           | any        | any grammar  |
//! | `v2.0`  | 7       | no           | one        | v1 grammar   |
//! | `v3.0`  | 7       | optional     | many       | any grammar  |
//!
//! A 7-column file is `v3.0` as soon as it carries a `#` header line, uses v2
//! primer names or spans more than one reference. Only `v3.0` may describe an
//! amplicon that wraps around the origin of a circular reference.
//!
//! [`BedFile::to_canonical_string`] is the serialization written to scheme
//! directories and fed to the hasher; normalising it again is a no-op.
use core::fmt;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BedError, PrimerNameError, Result};
use crate::primername::{check_primer_names, PrimerName, PrimerNameVersion, PrimerNumber, Side};

/// Header line announcing the layout of a canonical v3.0 file.
pub const VERSION_HEADER: &str = "# artic-bed-version v3.0";

/// Layout version of a primer BED file (`articbedversion` in `info.json`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BedVersion {
    #[serde(rename = "v1.0")]
    V1,
    #[serde(rename = "v2.0")]
    V2,
    #[serde(rename = "v3.0")]
    V3,
}

impl BedVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            BedVersion::V1 => "v1.0",
            BedVersion::V2 => "v2.0",
            BedVersion::V3 => "v3.0",
        }
    }

    fn columns(self) -> usize {
        if self == BedVersion::V1 { 6 } else { 7 }
    }
}

impl fmt::Display for BedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BedVersion {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "v1.0" => Ok(BedVersion::V1),
            "v2.0" => Ok(BedVersion::V2),
            "v3.0" => Ok(BedVersion::V3),
            other => Err(format!("unknown bed version: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_str(self) -> &'static str {
        match self {
            Strand::Forward => "+",
            Strand::Reverse => "-",
        }
    }
}

/// One primer row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimerRecord {
    /// Reference sequence name
    pub chrom: String,
    /// 0-based, inclusive
    pub start: u64,
    /// 0-based, exclusive
    pub end: u64,
    pub primername: String,
    /// 1-based pool number
    pub pool: u32,
    pub strand: Strand,
    /// Absent for 6-column files
    pub sequence: Option<String>,
    /// Source line, for diagnostics only
    pub line: u64,
}

impl PrimerRecord {
    fn sort_key(&self) -> (&str, u64, &str, u64, u32, Strand) {
        (&self.chrom, self.start, &self.primername, self.end, self.pool, self.strand)
    }

    fn write_row(&self, out: &mut String, columns: usize) {
        let mut fields = vec![
            self.chrom.clone(),
            self.start.to_string(),
            self.end.to_string(),
            self.primername.clone(),
            self.pool.to_string(),
            self.strand.as_str().to_string(),
        ];
        if columns == 7 {
            fields.push(self.sequence.clone().unwrap_or_default());
        }
        out.push_str(&fields.join("\t"));
        out.push('\n');
    }
}

/// A parsed primer BED file.
#[derive(Clone, Debug)]
pub struct BedFile {
    pub version: BedVersion,
    /// Header lines (including the leading `#`) in source order
    pub headers: Vec<String>,
    pub records: Vec<PrimerRecord>,
    /// Grammar shared by every primer name in the file
    pub grammar: PrimerNameVersion,
    names: Vec<PrimerName>,
}

impl BedFile {
    /// Read and parse a BED file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<BedFile> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text)
    }

    /// Parse BED text, detecting its layout version.
    pub fn parse(text: &str) -> Result<BedFile> {
        let headers: Vec<(u64, String)> = text
            .lines()
            .enumerate()
            .filter(|(_, l)| l.starts_with('#'))
            .map(|(i, l)| (i as u64 + 1, l.trim_end().to_string()))
            .collect();

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();
        let mut columns: Option<usize> = None;
        for row in reader.records() {
            let row = row.map_err(|e| BedError::MalformedBedRow {
                line: e.position().map_or(0, |p| p.line()),
                reason: e.to_string(),
            })?;
            let line = row.position().map_or(0, |p| p.line());
            if row.iter().all(str::is_empty) {
                continue;
            }
            let expected = *columns.get_or_insert(row.len());
            if expected != 6 && expected != 7 {
                return Err(BedError::MalformedBedRow {
                    line,
                    reason: format!("expected 6 or 7 tab-separated columns, found {expected}"),
                }
                .into());
            }
            if row.len() != expected {
                return Err(BedError::InconsistentColumnCount { line, expected, found: row.len() }.into());
            }
            records.push(parse_row(&row, line)?);
        }
        let columns = columns.ok_or(BedError::NoRecords)?;

        let (names, grammar) = check_primer_names(records.iter().map(|r| (r.line, r.primername.as_str())))?;
        let grammar = grammar.ok_or(BedError::NoRecords)?;

        let references: BTreeSet<&str> = records.iter().map(|r| r.chrom.as_str()).collect();
        let version = if columns == 6 {
            if let Some((line, _)) = headers.first() {
                return Err(BedError::MalformedBedRow {
                    line: *line,
                    reason: "header lines are only valid in 7-column (v3.0) bed files".into(),
                }
                .into());
            }
            BedVersion::V1
        } else if !headers.is_empty() || grammar == PrimerNameVersion::V2 || references.len() > 1 {
            BedVersion::V3
        } else {
            BedVersion::V2
        };

        let bed = BedFile {
            version,
            headers: headers.into_iter().map(|(_, h)| h).collect(),
            records,
            grammar,
            names,
        };
        bed.check_wraparound()?;
        Ok(bed)
    }

    /// Records paired with their decomposed primer names.
    pub fn primers(&self) -> impl Iterator<Item = (&PrimerRecord, &PrimerName)> {
        self.records.iter().zip(self.names.iter())
    }

    /// Distinct reference names, sorted.
    pub fn references(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.chrom.clone()).collect()
    }

    /// Amplicons lacking a LEFT or a RIGHT primer, as `prefix_n` labels.
    pub fn unpaired_amplicons(&self) -> Vec<String> {
        self.amplicon_sides()
            .into_iter()
            .filter(|(_, sides)| sides.left.is_none() || sides.right.is_none())
            .map(|((_, prefix, n), _)| format!("{prefix}_{n}"))
            .collect()
    }

    fn amplicon_sides(&self) -> BTreeMap<(&str, &str, &PrimerNumber), AmpliconSides> {
        let mut amplicons: BTreeMap<(&str, &str, &PrimerNumber), AmpliconSides> = BTreeMap::new();
        for (record, name) in self.primers() {
            let sides = amplicons.entry((record.chrom.as_str(), name.prefix.as_str(), &name.amplicon)).or_default();
            match name.side {
                Side::Left => {
                    sides.left = Some(sides.left.map_or(record.start, |s: u64| s.min(record.start)));
                }
                Side::Right => {
                    if sides.right.map_or(true, |(e, _)| record.end > e) {
                        sides.right = Some((record.end, record.line));
                    }
                }
            }
        }
        amplicons
    }

    fn check_wraparound(&self) -> Result<()> {
        if self.version == BedVersion::V3 {
            return Ok(());
        }
        for ((_, prefix, n), sides) in self.amplicon_sides() {
            if let (Some(left_start), Some((right_end, line))) = (sides.left, sides.right) {
                if right_end <= left_start {
                    return Err(BedError::MalformedBedRow {
                        line,
                        reason: format!(
                            "amplicon {prefix}_{n} wraps around the reference origin, which only {} bed files may describe",
                            BedVersion::V3
                        ),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Rename v1 primers to the v2 grammar (`_0` appended).
    ///
    /// A 7-column file becomes `v3.0`; a 6-column file stays `v1.0`.
    pub fn upgrade_primer_names(&mut self) -> std::result::Result<(), PrimerNameError> {
        if self.grammar == PrimerNameVersion::V2 {
            return Ok(());
        }
        let upgraded = self.names.iter().map(PrimerName::to_v2).collect::<std::result::Result<Vec<_>, _>>()?;
        for (record, name) in self.records.iter_mut().zip(upgraded.iter()) {
            record.primername = name.to_string();
        }
        self.names = upgraded;
        self.grammar = PrimerNameVersion::V2;
        if self.version == BedVersion::V2 {
            self.version = BedVersion::V3;
        }
        Ok(())
    }

    /// Canonical text: version header (v3.0), remaining headers, then rows
    /// sorted by reference, start and name.
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::new();
        if self.version == BedVersion::V3 {
            out.push_str(VERSION_HEADER);
            out.push('\n');
            for header in self.headers.iter().filter(|h| !is_version_header(h)) {
                out.push_str(header);
                out.push('\n');
            }
        }
        let mut sorted: Vec<&PrimerRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        for record in sorted {
            record.write_row(&mut out, self.version.columns());
        }
        out
    }
}

#[derive(Default)]
struct AmpliconSides {
    left: Option<u64>,
    right: Option<(u64, u64)>,
}

fn is_version_header(header: &str) -> bool {
    header.trim_start_matches('#').trim_start().starts_with("artic-bed-version")
}

/// Parse BED text and return its canonical serialization.
pub fn normalize(text: &str) -> Result<String> {
    Ok(BedFile::parse(text)?.to_canonical_string())
}

fn parse_row(row: &csv::StringRecord, line: u64) -> Result<PrimerRecord> {
    let malformed = |reason: String| BedError::MalformedBedRow { line, reason };

    let chrom = row[0].to_string();
    if chrom.is_empty() {
        return Err(malformed("empty reference name".into()).into());
    }
    let start: u64 = row[1]
        .parse()
        .map_err(|_| malformed(format!("start coordinate '{}' is not a non-negative integer", &row[1])))?;
    let end: u64 = row[2]
        .parse()
        .map_err(|_| malformed(format!("end coordinate '{}' is not a non-negative integer", &row[2])))?;
    if start >= end {
        return Err(malformed(format!("start ({start}) must be less than end ({end})")).into());
    }
    let primername = row[3].to_string();
    if primername.is_empty() {
        return Err(malformed("empty primer name".into()).into());
    }
    let pool: u32 = match row[4].parse() {
        Ok(p) if p >= 1 => p,
        _ => return Err(malformed(format!("pool '{}' is not a positive integer", &row[4])).into()),
    };
    let strand = match &row[5] {
        "+" => Strand::Forward,
        "-" => Strand::Reverse,
        other => return Err(malformed(format!("invalid strand character '{other}'")).into()),
    };
    let sequence = match row.get(6) {
        Some(seq) if !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_alphabetic()) => Some(seq.to_string()),
        Some(seq) => return Err(malformed(format!("invalid primer sequence '{seq}'")).into()),
        None => None,
    };

    Ok(PrimerRecord { chrom, start, end, primername, pool, strand, sequence, line })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const V3: &str = "# artic-bed-version v3.0\n# chrom=MN908947.3\nMN908947.3\t100\t124\tscheme_2_LEFT_0\t2\t+\tACGTACGTACGTACGTACGTACGT\nMN908947.3\t30\t54\tscheme_1_LEFT_0\t1\t+\tTTTTACGTACGTACGTACGTACGA\nMN908947.3\t400\t424\tscheme_1_RIGHT_0\t1\t-\tGGGGACGTACGTACGTACGTACGA\nMN908947.3\t500\t524\tscheme_2_RIGHT_0\t2\t-\tCCCCACGTACGTACGTACGTACGA\n";

    const V2: &str = "ref\t30\t54\tscheme_1_LEFT\t1\t+\tTTTTACGTACGTACGTACGTACGA\nref\t400\t424\tscheme_1_RIGHT\t1\t-\tGGGGACGTACGTACGTACGTACGA\n";

    const V1: &str = "ref\t30\t54\tscheme_1_LEFT\t1\t+\nref\t400\t424\tscheme_1_RIGHT\t1\t-\nref\t410\t434\tscheme_1_RIGHT_alt\t1\t-\n";

    #[test]
    fn detects_versions() {
        assert_eq!(BedFile::parse(V1).unwrap().version, BedVersion::V1);
        assert_eq!(BedFile::parse(V2).unwrap().version, BedVersion::V2);
        assert_eq!(BedFile::parse(V3).unwrap().version, BedVersion::V3);

        // v2 primer names without a header are still v3.0
        let headerless: String = V3.lines().skip(2).map(|l| format!("{l}\n")).collect();
        assert_eq!(BedFile::parse(&headerless).unwrap().version, BedVersion::V3);
    }

    #[test]
    fn v1_rows_have_no_sequence() {
        let bed = BedFile::parse(V1).unwrap();
        assert!(bed.records.iter().all(|r| r.sequence.is_none()));
        assert_eq!(bed.grammar, PrimerNameVersion::V1);
    }

    #[test]
    fn canonical_form_sorts_and_stamps_header() {
        let canonical = normalize(V3).unwrap();
        let lines: Vec<&str> = canonical.lines().collect();
        assert_eq!(lines[0], VERSION_HEADER);
        assert_eq!(lines[1], "# chrom=MN908947.3");
        assert!(lines[2].contains("scheme_1_LEFT_0"));
        assert!(lines[5].contains("scheme_2_RIGHT_0"));
    }

    #[test]
    fn normalisation_is_idempotent() {
        for text in [V1, V2, V3] {
            let once = normalize(text).unwrap();
            assert_eq!(normalize(&once).unwrap(), once);
        }
    }

    #[test]
    fn whitespace_and_order_do_not_change_canonical_form() {
        let messy = V2
            .lines()
            .rev()
            .map(|l| format!("{}  \r\n", l.replace('\t', " \t")))
            .collect::<String>()
            + "\n\n";
        assert_eq!(normalize(&messy).unwrap(), normalize(V2).unwrap());
    }

    #[test]
    fn reports_malformed_rows_with_line_numbers() {
        let bad_strand = "ref\t30\t54\ts_1_LEFT\t1\t+\nref\t400\t424\ts_1_RIGHT\t1\tx\n";
        match BedFile::parse(bad_strand).unwrap_err() {
            Error::Bed(BedError::MalformedBedRow { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("strand"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let bad_coord = "ref\tthirty\t54\ts_1_LEFT\t1\t+\n";
        assert!(matches!(BedFile::parse(bad_coord), Err(Error::Bed(BedError::MalformedBedRow { line: 1, .. }))));

        let reversed = "ref\t54\t30\ts_1_LEFT\t1\t+\n";
        assert!(matches!(BedFile::parse(reversed), Err(Error::Bed(BedError::MalformedBedRow { .. }))));
    }

    #[test]
    fn inconsistent_columns_are_rejected() {
        let text = "ref\t30\t54\ts_1_LEFT\t1\t+\tACGT\nref\t400\t424\ts_1_RIGHT\t1\t-\n";
        assert!(matches!(
            BedFile::parse(text),
            Err(Error::Bed(BedError::InconsistentColumnCount { line: 2, expected: 7, found: 6 }))
        ));
    }

    #[test]
    fn mixed_name_grammars_are_rejected() {
        let text = "ref\t30\t54\ts_1_LEFT_0\t1\t+\tACGT\nref\t400\t424\ts_1_RIGHT\t1\t-\tACGT\n";
        assert!(matches!(
            BedFile::parse(text),
            Err(Error::PrimerName(PrimerNameError::MixedPrimerNameGrammar { .. }))
        ));
    }

    #[test]
    fn headers_need_seven_columns() {
        let text = format!("# note\n{V1}");
        assert!(matches!(BedFile::parse(&text), Err(Error::Bed(BedError::MalformedBedRow { line: 1, .. }))));
    }

    #[test]
    fn wraparound_only_in_v3() {
        let legacy = "ref\t900\t924\ts_1_LEFT\t1\t+\tACGT\nref\t10\t34\ts_1_RIGHT\t1\t-\tACGT\n";
        assert!(matches!(BedFile::parse(legacy), Err(Error::Bed(BedError::MalformedBedRow { line: 2, .. }))));

        let current = "ref\t900\t924\ts_1_LEFT_0\t1\t+\tACGT\nref\t10\t34\ts_1_RIGHT_0\t1\t-\tACGT\n";
        assert_eq!(BedFile::parse(current).unwrap().version, BedVersion::V3);
    }

    #[test]
    fn empty_file_has_no_records() {
        assert!(matches!(BedFile::parse("\n\n"), Err(Error::Bed(BedError::NoRecords))));
    }

    #[test]
    fn unpaired_amplicons_are_listed() {
        let text = "ref\t30\t54\ts_1_LEFT_0\t1\t+\tACGT\nref\t400\t424\ts_1_RIGHT_0\t1\t-\tACGT\nref\t300\t324\ts_2_LEFT_0\t2\t+\tACGT\n";
        assert_eq!(BedFile::parse(text).unwrap().unpaired_amplicons(), vec!["s_2".to_string()]);
    }

    #[test]
    fn upgrading_names_moves_v2_files_to_v3() {
        let mut bed = BedFile::parse(V2).unwrap();
        bed.upgrade_primer_names().unwrap();
        assert_eq!(bed.version, BedVersion::V3);
        assert!(bed.to_canonical_string().contains("scheme_1_LEFT_0"));

        let mut alts = BedFile::parse(V1).unwrap();
        assert!(alts.upgrade_primer_names().is_err());
    }
}
