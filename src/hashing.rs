
//! Strand-independent k-mer hashing.
//!
//! A k-mer and its reverse complement are reduced to a single canonical form (the
//! lexicographically smaller of the two) which is then hashed with MurmurHash3. The
//! hash function and seed must be identical when building a reference database and
//! when sketching queries, so both are carried by `SketchParams`.

use std::borrow::Cow;

use murmurhash3::murmurhash3_x64_128;
use serde::{Deserialize, Serialize};

use crate::sequence::kmers;

pub type ItemHash = u64;

/// Watson-Crick complement; symbols outside ACGT map to themselves.
const COMPLEMENT: [u8; 256] = {
    let mut table = [0; 256];

    let mut i = 0;
    while i < 256 {
        table[i] = i as u8;
        i += 1;
    }

    table[b'A' as usize] = b'T';
    table[b'C' as usize] = b'G';
    table[b'G' as usize] = b'C';
    table[b'T' as usize] = b'A';
    table[b'a' as usize] = b't';
    table[b'c' as usize] = b'g';
    table[b'g' as usize] = b'c';
    table[b't' as usize] = b'a';

    table
};

/// Hash functions supported for k-mer hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashFunction {
    /// First 64-bit word of MurmurHash3 x64_128.
    Murmur3X64_128,
}

impl HashFunction {
    #[inline]
    pub fn hash(&self, bytes: &[u8], seed: u64) -> ItemHash {
        match self {
            HashFunction::Murmur3X64_128 => murmurhash3_x64_128(bytes, seed).0,
        }
    }
}

/// Reverse the k-mer and complement each symbol.
pub fn reverse_complement(kmer: &[u8]) -> Vec<u8> {
    kmer.iter().rev().map(|&b| COMPLEMENT[b as usize]).collect()
}

/// Lexicographically smaller of the k-mer and its reverse complement.
pub fn canonical(kmer: &[u8]) -> Cow<'_, [u8]> {
    let rc = reverse_complement(kmer);
    if kmer < rc.as_slice() {
        Cow::Borrowed(kmer)
    } else {
        Cow::Owned(rc)
    }
}

/// Same as `canonical`, writing the reverse complement into a reusable buffer.
#[inline]
fn canonical_into<'a>(kmer: &'a [u8], rc: &'a mut Vec<u8>) -> &'a [u8] {
    rc.clear();
    rc.extend(kmer.iter().rev().map(|&b| COMPLEMENT[b as usize]));

    if kmer < rc.as_slice() { kmer } else { rc.as_slice() }
}

/// Maps k-mers to canonical 64-bit hashes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KmerHasher {
    hash_function: HashFunction,
    seed: u64,
}

impl KmerHasher {
    pub fn new(hash_function: HashFunction, seed: u64) -> Self {
        KmerHasher {
            hash_function,
            seed,
        }
    }

    /// Hash the canonical form of a single k-mer.
    pub fn hash(&self, kmer: &[u8]) -> ItemHash {
        self.hash_function.hash(&canonical(kmer), self.seed)
    }

    /// Append the hash of every k-mer in a cleaned sequence, in left-to-right order.
    pub fn hash_seq(&self, seq: &[u8], k: usize, hashes: &mut Vec<ItemHash>) {
        let mut rc = Vec::with_capacity(k);
        for kmer in kmers(seq, k) {
            let canonical_kmer = canonical_into(kmer, &mut rc);
            hashes.push(self.hash_function.hash(canonical_kmer, self.seed));
        }
    }
}
