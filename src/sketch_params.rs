
//! This module defines the `SketchParams` struct, which encapsulates the parameters
//! required to configure and create bottom-n sketches: k-mer length, sketch size, hash
//! function, hash seed, alphabet, and whether hashes are deduplicated before truncation.
//! The parameters are stored alongside a reference database so that query sketches can
//! be checked for compatibility before any similarity is computed.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::bottom_sketch::BottomSketcher;
use crate::hashing::{HashFunction, KmerHasher};
use crate::sequence::ALPHABET;

pub const DEFAULT_K: u8 = 11;
pub const DEFAULT_SKETCH_SIZE: usize = 200;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SketchParams {
    kmer_length: u8,
    sketch_size: usize,
    seed: u64,
    hash_function: HashFunction,
    alphabet: String,
    distinct: bool,
}

impl Default for SketchParams {
    fn default() -> Self {
        SketchParams::new(DEFAULT_K, DEFAULT_SKETCH_SIZE, DEFAULT_SEED, false)
    }
}

impl SketchParams {
    pub fn new(kmer_length: u8, sketch_size: usize, seed: u64, distinct: bool) -> Self {
        SketchParams {
            kmer_length,
            sketch_size,
            seed,
            hash_function: HashFunction::Murmur3X64_128,
            alphabet: String::from_utf8_lossy(ALPHABET).into_owned(),
            distinct,
        }
    }

    pub fn create_hasher(&self) -> KmerHasher {
        KmerHasher::new(self.hash_function, self.seed)
    }

    pub fn create_sketcher(&self) -> BottomSketcher {
        BottomSketcher::new(self)
    }

    pub fn k(&self) -> u8 {
        self.kmer_length
    }

    pub fn sketch_size(&self) -> usize {
        self.sketch_size
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn hash_function(&self) -> HashFunction {
        self.hash_function
    }

    pub fn alphabet(&self) -> &str {
        &self.alphabet
    }

    pub fn distinct(&self) -> bool {
        self.distinct
    }

    /// Check parameters describe a usable sketch.
    pub fn validate(&self) -> Result<()> {
        if self.kmer_length == 0 {
            bail!("k-mer length must be at least 1");
        }

        if self.sketch_size == 0 {
            bail!("Sketch size must be at least 1");
        }

        if self.alphabet.as_bytes() != ALPHABET {
            bail!(
                "Sketch uses alphabet '{}', but only '{}' is supported",
                self.alphabet,
                String::from_utf8_lossy(ALPHABET)
            );
        }

        Ok(())
    }

    /// Return true if sketch parameters are identical.
    pub fn check_compatibility(&self, other: &SketchParams) -> Result<bool> {
        if self.k() != other.k() {
            bail!(
                "Sketch has k = {}, but other sketch has k = {}",
                self.k(),
                other.k()
            );
        }

        if self.sketch_size() != other.sketch_size() {
            bail!(
                "Sketch has sketch size = {}, but other sketch has sketch size = {}",
                self.sketch_size(),
                other.sketch_size()
            );
        }

        if self.hash_function() != other.hash_function() {
            bail!(
                "Sketch uses hash function {:?}, but other sketch uses {:?}",
                self.hash_function(),
                other.hash_function()
            );
        }

        if self.seed() != other.seed() {
            bail!(
                "Sketch has seed = {}, but other sketch has seed = {}",
                self.seed(),
                other.seed()
            );
        }

        if self.alphabet() != other.alphabet() {
            bail!(
                "Sketch has alphabet = {}, but other sketch has alphabet = {}",
                self.alphabet(),
                other.alphabet()
            );
        }

        // Deduplicating before truncation changes which hashes are retained, so
        // sketches built with and without it are not comparable.
        if self.distinct() != other.distinct() {
            bail!(
                "Sketch has distinct = {}, but other sketch has distinct = {}",
                self.distinct(),
                other.distinct()
            );
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = SketchParams::default();
        assert_eq!(params.k(), 11);
        assert_eq!(params.sketch_size(), 200);
        assert_eq!(params.seed(), 42);
        assert_eq!(params.alphabet(), "ACTG");
        assert!(!params.distinct());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_check_compatibility() {
        let params = SketchParams::default();
        assert!(params.check_compatibility(&SketchParams::default()).unwrap());

        let err = params
            .check_compatibility(&SketchParams::new(21, 200, 42, false))
            .unwrap_err();
        assert!(err.to_string().contains("k = 11"));

        assert!(params.check_compatibility(&SketchParams::new(11, 100, 42, false)).is_err());
        assert!(params.check_compatibility(&SketchParams::new(11, 200, 7, false)).is_err());
        assert!(params.check_compatibility(&SketchParams::new(11, 200, 42, true)).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(SketchParams::new(0, 200, 42, false).validate().is_err());
        assert!(SketchParams::new(11, 0, 42, false).validate().is_err());

        let mut params = SketchParams::default();
        params.alphabet = "ACGU".to_string();
        assert!(params.validate().is_err());
    }
}
