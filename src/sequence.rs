
//! Sequence cleaning and k-mer extraction.
//!
//! Raw sequence text is reduced to the four-symbol nucleotide alphabet before any
//! k-mers are taken from it. Characters outside the alphabet (ambiguity codes,
//! gaps, whitespace, digits) are dropped rather than rejected, so a degraded
//! sequence simply yields fewer k-mers.

/// Symbols retained by `clean`.
pub const ALPHABET: &[u8; 4] = b"ACTG";

/// A named sequence carried through the pipeline as a single unit.
#[derive(Clone, Debug, PartialEq)]
pub struct SeqRecord {
    pub name: String,
    pub seq: Vec<u8>,
}

impl SeqRecord {
    pub fn new(name: impl Into<String>, seq: impl Into<Vec<u8>>) -> Self {
        SeqRecord {
            name: name.into(),
            seq: seq.into(),
        }
    }
}

/// Uppercase the sequence and keep only symbols from `ALPHABET`, preserving order.
pub fn clean(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .map(u8::to_ascii_uppercase)
        .filter(|b| ALPHABET.contains(b))
        .collect()
}

/// Overlapping windows of length `k` with stride 1, left to right.
///
/// Expects a cleaned sequence. Yields nothing if the sequence is shorter than `k` or `k` is 0.
pub fn kmers(seq: &[u8], k: usize) -> impl Iterator<Item = &[u8]> {
    let k = if k == 0 { seq.len() + 1 } else { k };
    seq.windows(k)
}

/// Collect all k-mers of a cleaned sequence.
pub fn extract_kmers(seq: &[u8], k: usize) -> Vec<&[u8]> {
    kmers(seq, k).collect()
}
