//! Primer name grammars.
//!
//! Two naming conventions are in circulation:
//!
//! - **v1**: `{prefix}_{amplicon}_{LEFT|RIGHT}` with any number of `_alt`
//!   markers (case-insensitive, optionally numbered) for spike-in primers,
//!   e.g. `artic-nCoV_76_RIGHT_alt2`.
//! - **v2**: `{prefix}_{amplicon}_{LEFT|RIGHT}_{primer}` where `primer` is any
//!   non-negative integer, e.g. `artic-nCoV_76_RIGHT_1`.
//!
//! v2 is tried first since it is the stricter of the two.
//!
//! # Examples
//! ```
//! use primer_registry::primername::{PrimerName, PrimerNameVersion};
//! let name = PrimerName::parse("artic-nCoV_1_LEFT_0").unwrap();
//! assert_eq!(name.version(), PrimerNameVersion::V2);
//! assert_eq!(name.to_string(), "artic-nCoV_1_LEFT_0");
//! ```
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::PrimerNameError;

static V2_PRIMERNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9\-]+)_([0-9]+)_(LEFT|RIGHT)_([0-9]+)$").expect("static regex")
});
static V1_PRIMERNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9\-]+)_([0-9]+)_(LEFT|RIGHT)((?:_(?i:alt)[0-9]*)*)$").expect("static regex")
});

/// Naming grammar a primer name conforms to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimerNameVersion {
    V1,
    V2,
}

impl fmt::Display for PrimerNameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimerNameVersion::V1 => f.write_str("v1"),
            PrimerNameVersion::V2 => f.write_str("v2"),
        }
    }
}

/// Which end of the amplicon a primer sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "LEFT",
            Side::Right => "RIGHT",
        }
    }
}

/// An amplicon or primer number as written in a name.
///
/// The digits are kept verbatim, so zero padding survives reconstruction and
/// arbitrarily long numbers parse. Equality, hashing and ordering use the
/// numeric value: `01` and `1` name the same amplicon.
#[derive(Clone, Debug)]
pub struct PrimerNumber(String);

impl PrimerNumber {
    /// `None` unless `digits` is a non-empty run of ASCII digits.
    pub fn new(digits: &str) -> Option<PrimerNumber> {
        (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then(|| PrimerNumber(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value, if it fits in a `u64`.
    pub fn value(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    fn significant(&self) -> &str {
        match self.0.trim_start_matches('0') {
            "" => "0",
            digits => digits,
        }
    }
}

impl From<u32> for PrimerNumber {
    fn from(n: u32) -> Self {
        PrimerNumber(n.to_string())
    }
}

impl PartialEq for PrimerNumber {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for PrimerNumber {}

impl Hash for PrimerNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl Ord for PrimerNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.significant(), other.significant());
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl PartialOrd for PrimerNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PrimerNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Grammar-specific trailing part of a primer name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NameSuffix {
    /// v1: zero or more alt tokens, kept verbatim (`alt`, `ALT`, `alt2`, ...)
    Alts(Vec<String>),
    /// v2: the primer number within its amplicon side
    Primer(PrimerNumber),
}

/// A decomposed primer name; [`Display`](fmt::Display) gives back the
/// original string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrimerName {
    /// Scheme label, e.g. `artic-nCoV`
    pub prefix: String,
    pub amplicon: PrimerNumber,
    pub side: Side,
    pub suffix: NameSuffix,
}

impl PrimerName {
    /// Parse `name`, trying the v2 grammar before v1.
    pub fn parse(name: &str) -> Result<PrimerName, PrimerNameError> {
        let invalid = || PrimerNameError::InvalidPrimerName { name: name.to_string(), line: None };
        let number = |digits: &str| PrimerNumber::new(digits).ok_or_else(invalid);

        if let Some(caps) = V2_PRIMERNAME.captures(name) {
            return Ok(PrimerName {
                prefix: caps[1].to_string(),
                amplicon: number(&caps[2])?,
                side: parse_side(&caps[3]),
                suffix: NameSuffix::Primer(number(&caps[4])?),
            });
        }
        if let Some(caps) = V1_PRIMERNAME.captures(name) {
            let alts = caps[4]
                .split('_')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            return Ok(PrimerName {
                prefix: caps[1].to_string(),
                amplicon: number(&caps[2])?,
                side: parse_side(&caps[3]),
                suffix: NameSuffix::Alts(alts),
            });
        }
        Err(invalid())
    }

    pub fn version(&self) -> PrimerNameVersion {
        match self.suffix {
            NameSuffix::Alts(_) => PrimerNameVersion::V1,
            NameSuffix::Primer(_) => PrimerNameVersion::V2,
        }
    }

    /// `true` for v1 spike-in primers carrying at least one alt marker.
    pub fn is_alt(&self) -> bool {
        matches!(&self.suffix, NameSuffix::Alts(a) if !a.is_empty())
    }

    /// Convert a v1 name to v2 by numbering it primer `0`.
    ///
    /// Alt primers cannot be converted because their ordering within the
    /// amplicon side is not recoverable from the name.
    pub fn to_v2(&self) -> Result<PrimerName, PrimerNameError> {
        match &self.suffix {
            NameSuffix::Primer(_) => Err(PrimerNameError::CannotConvert(self.to_string(), "already a v2 name".into())),
            NameSuffix::Alts(alts) if !alts.is_empty() => {
                Err(PrimerNameError::CannotConvert(self.to_string(), "alt primers have no primer number".into()))
            }
            NameSuffix::Alts(_) => Ok(PrimerName { suffix: NameSuffix::Primer(PrimerNumber::from(0)), ..self.clone() }),
        }
    }
}

impl fmt::Display for PrimerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.prefix, self.amplicon, self.side.as_str())?;
        match &self.suffix {
            NameSuffix::Primer(n) => write!(f, "_{n}"),
            NameSuffix::Alts(alts) => alts.iter().try_for_each(|a| write!(f, "_{a}")),
        }
    }
}

fn parse_side(s: &str) -> Side {
    if s == "LEFT" { Side::Left } else { Side::Right }
}

/// Classify a single name, returning `None` when neither grammar matches.
pub fn determine_primername_version(name: &str) -> Option<PrimerNameVersion> {
    PrimerName::parse(name).ok().map(|n| n.version())
}

/// Convert a v1 name string to its v2 form (`_0` appended).
pub fn convert_v1_to_v2(name: &str) -> Result<String, PrimerNameError> {
    let parsed = PrimerName::parse(name)?;
    if parsed.version() != PrimerNameVersion::V1 {
        return Err(PrimerNameError::CannotConvert(name.to_string(), "not a v1 primer name".into()));
    }
    Ok(parsed.to_v2()?.to_string())
}

/// Parse every `(line, name)` pair and enforce that a file uses one grammar.
///
/// Returns the decomposed names in input order plus the shared grammar, or
/// `None` for an empty input.
pub fn check_primer_names<'a, I>(names: I) -> Result<(Vec<PrimerName>, Option<PrimerNameVersion>), PrimerNameError>
where
    I: IntoIterator<Item = (u64, &'a str)>,
{
    let mut parsed = Vec::new();
    let mut first: Option<(u64, &'a str, PrimerNameVersion)> = None;

    for (line, raw) in names {
        let name = PrimerName::parse(raw).map_err(|_| PrimerNameError::InvalidPrimerName {
            name: raw.to_string(),
            line: Some(line),
        })?;
        let version = name.version();
        match first {
            None => first = Some((line, raw, version)),
            Some((first_line, first_name, first_version)) if first_version != version => {
                return Err(PrimerNameError::MixedPrimerNameGrammar {
                    first: first_name.to_string(),
                    first_line,
                    first_version,
                    name: raw.to_string(),
                    line,
                    version,
                });
            }
            Some(_) => {}
        }
        parsed.push(name);
    }
    Ok((parsed, first.map(|(_, _, v)| v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_names() {
        let cases = [
            ("artic-nCoV_1_LEFT_0", Some(PrimerNameVersion::V2)),
            ("artic-nCoV_100_LEFT_99", Some(PrimerNameVersion::V2)),
            ("78h13h_0_RIGHT_0", Some(PrimerNameVersion::V2)),
            ("artic-nCoV_1_LEFT", Some(PrimerNameVersion::V1)),
            ("artic-nCoV_1_LEFT_alt", Some(PrimerNameVersion::V1)),
            ("marv-2023_100_RIGHT_ALT", Some(PrimerNameVersion::V1)),
            ("yby17_1_LEFT_alt2", Some(PrimerNameVersion::V1)),
            ("easyfail", None),
            ("marv-2023_1_RIGHT_2_alt", None),
            ("artic*nCoV_100_LEFT_99", None),
            ("artic_nCoV_1_LEFT_0", None),
            ("marv-2023_RIGHT_2", None),
            ("artic-nCoV_-1_LEFT_0", None),
            ("", None),
        ];
        for (name, expected) in cases {
            assert_eq!(determine_primername_version(name), expected, "{name}");
        }
    }

    #[test]
    fn decomposition_reconstructs_the_name() {
        for name in ["artic-nCoV_76_RIGHT_3", "mpx_1_LEFT", "mpx_12_LEFT_alt_ALT4", "x_0_RIGHT_Alt"] {
            assert_eq!(PrimerName::parse(name).unwrap().to_string(), name);
        }
        let n = PrimerName::parse("mpx_12_LEFT_alt_ALT4").unwrap();
        assert_eq!(n.prefix, "mpx");
        assert_eq!(n.amplicon, PrimerNumber::from(12));
        assert_eq!(n.side, Side::Left);
        assert!(n.is_alt());
    }

    #[test]
    fn padded_and_long_numbers_round_trip() {
        for name in ["x_01_LEFT_0", "x_1_RIGHT_007", "x_007_LEFT_alt", "x_99999999999_LEFT_0", "x_1_LEFT_184467440737095516160"] {
            assert_eq!(PrimerName::parse(name).unwrap().to_string(), name);
        }
        assert_eq!(convert_v1_to_v2("x_01_LEFT").unwrap(), "x_01_LEFT_0");

        let padded = PrimerName::parse("x_01_LEFT_0").unwrap();
        assert_eq!(padded.amplicon, PrimerNumber::from(1));
        assert_eq!(padded.amplicon.as_str(), "01");
        let long = PrimerName::parse("x_99999999999_LEFT_0").unwrap();
        assert_eq!(long.amplicon.value(), Some(99_999_999_999));
        assert!(PrimerNumber::new("184467440737095516160").unwrap().value().is_none());
    }

    #[test]
    fn numbers_order_by_value() {
        let mut numbers: Vec<PrimerNumber> = ["10", "9", "0009", "100", "0"].iter().filter_map(|d| PrimerNumber::new(d)).collect();
        numbers.sort();
        let digits: Vec<&str> = numbers.iter().map(PrimerNumber::as_str).collect();
        assert_eq!(digits, ["0", "9", "0009", "10", "100"]);
        assert!(PrimerNumber::new("").is_none());
        assert!(PrimerNumber::new("1a").is_none());
    }

    #[test]
    fn v1_to_v2_conversion() {
        assert_eq!(convert_v1_to_v2("artic-nCoV_100_LEFT").unwrap(), "artic-nCoV_100_LEFT_0");
        assert_eq!(convert_v1_to_v2("yby17_1_LEFT").unwrap(), "yby17_1_LEFT_0");
        for bad in ["artic-nCoV_1_LEFT_alt", "yby17_1_LEFT_ALT", "artic-nCoV_1_LEFT_0", "easyfail", ""] {
            assert!(convert_v1_to_v2(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn mixed_grammars_are_rejected() {
        let err = check_primer_names([(1, "a_1_LEFT_0"), (2, "a_1_RIGHT")]).unwrap_err();
        assert!(matches!(err, PrimerNameError::MixedPrimerNameGrammar { line: 2, .. }));

        let err = check_primer_names([(4, "a_1_LEFT_0"), (5, "nope")]).unwrap_err();
        assert_eq!(err, PrimerNameError::InvalidPrimerName { name: "nope".into(), line: Some(5) });

        let (names, version) = check_primer_names([(1, "a_1_LEFT_0"), (2, "a_1_RIGHT_7")]).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(version, Some(PrimerNameVersion::V2));
    }
}
