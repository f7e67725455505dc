//! Content hashing for scheme payloads.
//!
//! Digests are lowercase hex MD5 over the *canonical* text of a file, never
//! over the bytes a curator handed in, so two inputs that differ only in
//! whitespace, line endings or row order share a digest. The canonical text
//! is also exactly what gets written into a scheme directory, which keeps
//! `primer_bed_md5` / `reference_fasta_md5` reproducible from disk.
use std::io::Cursor;
use std::path::Path;

use md5::{Digest, Md5};

use crate::bedfile;
use crate::error::{Error, Result};

/// Line width of canonical FASTA sequence lines.
pub const FASTA_LINE_WIDTH: usize = 60;

/// Lowercase hex MD5 of `bytes`.
pub fn md5_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(Md5::digest(bytes.as_ref()))
}

/// `true` if `s` looks like an MD5 hex digest.
pub fn is_md5_hex(s: &str) -> bool {
    s.len() == 32 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Digest of a BED file's canonical form.
pub fn hash_bed(text: &str) -> Result<String> {
    Ok(md5_hex(bedfile::normalize(text)?))
}

/// Digest of a FASTA file's canonical form.
pub fn hash_fasta_text(text: &str) -> Result<String> {
    Ok(md5_hex(normalize_fasta(text)?.text))
}

/// Digest of the file at `path`, read as BED or FASTA by its role.
pub fn hash_file(path: &Path, kind: PayloadKind) -> Result<String> {
    let text = std::fs::read_to_string(path)?;
    match kind {
        PayloadKind::Bed => hash_bed(&text),
        PayloadKind::Fasta => hash_fasta_text(&text),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    Bed,
    Fasta,
}

/// A reference FASTA in canonical form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fasta {
    /// Record ids (header text up to the first whitespace), in file order
    pub ids: Vec<String>,
    pub text: String,
}

/// Parse FASTA text and re-emit it with trimmed headers and sequences wrapped
/// at [`FASTA_LINE_WIDTH`].
pub fn normalize_fasta(text: &str) -> Result<Fasta> {
    let cleaned: String = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(|l| format!("{l}\n"))
        .collect();
    match cleaned.as_bytes().first() {
        Some(b'>') => {}
        Some(_) => return Err(Error::Fasta("first record does not start with '>'".into())),
        None => return Err(Error::Fasta("no records".into())),
    }

    let mut reader =
        needletail::parse_fastx_reader(Cursor::new(cleaned.into_bytes())).map_err(|e| Error::Fasta(e.to_string()))?;

    let mut ids = Vec::new();
    let mut out = String::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| Error::Fasta(e.to_string()))?;
        let header = String::from_utf8_lossy(record.id()).trim().to_string();
        let id = header.split_whitespace().next().unwrap_or_default().to_string();
        if id.is_empty() {
            return Err(Error::Fasta("record with an empty header".into()));
        }
        let seq = record.seq();
        if !seq.iter().all(|b| b.is_ascii_alphabetic() || *b == b'-' || *b == b'*') {
            return Err(Error::Fasta(format!("record '{id}' contains non-sequence characters")));
        }
        out.push('>');
        out.push_str(&header);
        out.push('\n');
        for chunk in seq.chunks(FASTA_LINE_WIDTH) {
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push('\n');
        }
        ids.push(id);
    }
    Ok(Fasta { ids, text: out })
}
