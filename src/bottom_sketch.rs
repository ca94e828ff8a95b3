
//! This module provides the `BottomSketcher` struct for computing bottom-n sketches from
//! DNA sequences. A bottom-n sketch keeps the `n` smallest k-mer hashes of a sequence,
//! sorted ascending, which bounds the cost of every later similarity computation to the
//! sketch size regardless of sequence length. It is an unweighted analogue of bottom-k
//! MinHash and approximates the Jaccard similarity of the full k-mer sets.

use crate::hashing::{ItemHash, KmerHasher};
use crate::sequence::clean;
use crate::sketch_params::SketchParams;

/// Hashes retained for a sequence, sorted ascending.
pub type Sketch = Vec<ItemHash>;

/// Sort hashes and keep the `n` smallest.
///
/// Duplicate hashes are kept unless `distinct` is set, in which case they are
/// removed before truncation.
pub fn bottom_n(mut hashes: Vec<ItemHash>, n: usize, distinct: bool) -> Sketch {
    hashes.sort_unstable();
    if distinct {
        hashes.dedup();
    }

    hashes.truncate(n);
    hashes.shrink_to_fit();
    hashes
}

#[derive(Clone, Debug)]
pub struct BottomSketcher {
    hasher: KmerHasher,
    kmer_length: u8,
    sketch_size: usize,
    distinct: bool,
    hashes: Vec<ItemHash>,
    kmer_total_count: u64,
    bp_count: u64,
}

impl BottomSketcher {
    pub fn new(params: &SketchParams) -> Self {
        BottomSketcher {
            hasher: params.create_hasher(),
            kmer_length: params.k(),
            sketch_size: params.sketch_size(),
            distinct: params.distinct(),
            hashes: Vec::new(),
            kmer_total_count: 0,
            bp_count: 0,
        }
    }

    /// Clean a raw sequence and add the hashes of all its k-mers.
    ///
    /// Returns the number of k-mers added.
    pub fn process_seq(&mut self, raw: &[u8]) -> usize {
        let seq = clean(raw);
        self.bp_count += seq.len() as u64;

        let prev_len = self.hashes.len();
        self.hasher
            .hash_seq(&seq, self.kmer_length as usize, &mut self.hashes);

        let num_kmers = self.hashes.len() - prev_len;
        self.kmer_total_count += num_kmers as u64;

        num_kmers
    }

    pub fn kmer_total_count(&self) -> u64 {
        self.kmer_total_count
    }

    pub fn bp_count(&self) -> u64 {
        self.bp_count
    }

    pub fn to_sketch(self) -> Sketch {
        bottom_n(self.hashes, self.sketch_size, self.distinct)
    }
}
