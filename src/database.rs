
//! Reference sketch database.
//!
//! A database is an ordered collection of labelled reference sketches together with the
//! `SketchParams` used to build them. It is built once from reference FASTA files,
//! persisted as JSON, and loaded read-only when classifying queries. The order of the
//! references is stable and defines the column order of every similarity vector.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::bottom_sketch::Sketch;
use crate::hashing::ItemHash;
use crate::io_utils::{read_seq_records, seq_id_from_filename};
use crate::progress::progress_bar;
use crate::sequence::SeqRecord;
use crate::sketch_params::SketchParams;

/// Sketch of a single reference sequence (or file) tagged with its label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSketch {
    pub label: String,
    pub name: String,
    pub hashes: Sketch,
}

impl AsRef<[ItemHash]> for ReferenceSketch {
    fn as_ref(&self) -> &[ItemHash] {
        &self.hashes
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SketchDatabase {
    params: SketchParams,
    references: Vec<ReferenceSketch>,
}

impl SketchDatabase {
    /// Create a database from existing sketches, verifying they are consistent with `params`.
    pub fn from_sketches(params: SketchParams, references: Vec<ReferenceSketch>) -> Result<Self> {
        let db = SketchDatabase { params, references };
        db.validate()?;
        Ok(db)
    }

    /// Sketch a set of labelled reference FASTA files in parallel.
    ///
    /// Each record becomes a reference unless `by_file` is set, in which case all records of
    /// a file are combined into a single reference named after the file.
    pub fn build(reference_files: &[(String, PathBuf)], params: &SketchParams, by_file: bool) -> Result<Self> {
        params.validate()?;

        let progress_bar = progress_bar(reference_files.len() as u64);
        let sketches: Vec<Vec<ReferenceSketch>> = reference_files
            .par_iter()
            .map(|(label, seq_file)| {
                let sketches = sketch_file(seq_file, label, params, by_file);
                progress_bar.inc(1);
                sketches
            })
            .collect::<Result<_>>()?;
        progress_bar.finish();

        SketchDatabase::from_sketches(params.clone(), sketches.into_iter().flatten().collect())
    }

    pub fn params(&self) -> &SketchParams {
        &self.params
    }

    pub fn references(&self) -> &[ReferenceSketch] {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Distinct reference labels in order of first appearance.
    pub fn labels(&self) -> Vec<String> {
        let mut seen = FxHashSet::default();
        self.references
            .iter()
            .filter(|r| seen.insert(r.label.as_str()))
            .map(|r| r.label.clone())
            .collect()
    }

    /// Verify query sketches built with `params` can be compared against this database.
    pub fn check_compatibility(&self, params: &SketchParams) -> Result<bool> {
        self.params
            .check_compatibility(params)
            .context("Query sketch parameters are incompatible with the reference database")
    }

    fn validate(&self) -> Result<()> {
        self.params.validate()?;

        if self.references.is_empty() {
            bail!("Sketch database contains no reference sketches");
        }

        for reference in &self.references {
            if reference.hashes.len() > self.params.sketch_size() {
                bail!(
                    "Reference '{}' has {} hashes, but sketch size is {}",
                    reference.name,
                    reference.hashes.len(),
                    self.params.sketch_size()
                );
            }

            if !reference.hashes.is_sorted() {
                bail!("Reference '{}' has unsorted sketch hashes", reference.name);
            }

            if reference.hashes.is_empty() {
                warn!(
                    "Reference '{}' ({}) has an empty sketch; it is shorter than k = {}",
                    reference.name,
                    reference.label,
                    self.params.k()
                );
            }
        }

        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .context(format!("Failed to create {}", path.display()))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .context(format!("Failed to write sketch database to {}", path.display()))?;
        writer.flush()?;

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .context(format!("Failed to open {}", path.display()))?;

        let db: SketchDatabase = serde_json::from_reader(BufReader::new(file))
            .context(format!("Failed to parse sketch database {}", path.display()))?;
        db.validate()
            .context(format!("Invalid sketch database {}", path.display()))?;

        debug!("Loaded {} reference sketches from {}", db.len(), path.display());

        Ok(db)
    }
}

/// Sketch each record as a separate reference carrying `label`.
pub fn sketch_records(records: &[SeqRecord], label: &str, params: &SketchParams) -> Vec<ReferenceSketch> {
    records
        .iter()
        .map(|record| {
            let mut sketcher = params.create_sketcher();
            sketcher.process_seq(&record.seq);
            ReferenceSketch {
                label: label.to_string(),
                name: record.name.clone(),
                hashes: sketcher.to_sketch(),
            }
        })
        .collect()
}

/// Create reference sketches from a sequence file.
pub fn sketch_file(seq_file: &Path, label: &str, params: &SketchParams, by_file: bool) -> Result<Vec<ReferenceSketch>> {
    let records = read_seq_records(seq_file)?;

    if !by_file {
        return Ok(sketch_records(&records, label, params));
    }

    let mut sketcher = params.create_sketcher();
    for record in &records {
        sketcher.process_seq(&record.seq);
    }

    debug!(
        "Sketched {} k-mers over {} bp from {}",
        sketcher.kmer_total_count(),
        sketcher.bp_count(),
        seq_file.display()
    );

    Ok(vec![ReferenceSketch {
        label: label.to_string(),
        name: seq_id_from_filename(seq_file),
        hashes: sketcher.to_sketch(),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, TempDir};

    // Helper to create a temporary FASTA file with given contents
    fn write_temp_fasta(contents: &str, filename: &str, dir: &TempDir) -> PathBuf {
        let file_path = dir.path().join(filename);
        let mut file = File::create(&file_path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.sync_all().unwrap();
        file_path
    }

    #[test]
    fn test_build_and_reload() {
        let temp_dir = tempdir().unwrap();

        let fasta1 = ">ref1\nACGTACGTACGT\n>ref2\nGGGGCCCCAAAA\n";
        let fasta2 = ">ref3 description\nttttacgtnnacgt\n";
        let file1 = write_temp_fasta(fasta1, "dengue.fa", &temp_dir);
        let file2 = write_temp_fasta(fasta2, "zika.fasta", &temp_dir);

        let params = SketchParams::new(4, 10, 42, false);
        let reference_files = vec![
            ("Dengue".to_string(), file1.clone()),
            ("Zika".to_string(), file2.clone()),
        ];

        let db = SketchDatabase::build(&reference_files, &params, false).unwrap();
        assert_eq!(db.len(), 3);
        assert_eq!(db.labels(), vec!["Dengue", "Zika"]);
        assert_eq!(db.references()[0].name, "ref1");
        assert_eq!(db.references()[2].name, "ref3 description");
        assert_eq!(db.references()[2].label, "Zika");

        // 9 k-mers in ACGTACGTACGT, all retained
        assert_eq!(db.references()[0].hashes.len(), 9);

        let db_file = temp_dir.path().join("sketch_db.json");
        db.save(&db_file).unwrap();
        let reloaded = SketchDatabase::load(&db_file).unwrap();
        assert_eq!(reloaded, db);

        let db_by_file = SketchDatabase::build(&reference_files, &params, true).unwrap();
        assert_eq!(db_by_file.len(), 2);
        assert_eq!(db_by_file.references()[0].name, "dengue");
        assert_eq!(db_by_file.references()[1].name, "zika");
        assert_eq!(db_by_file.references()[0].hashes.len(), 10);
    }

    #[test]
    fn test_missing_file() {
        let reference_files = vec![("A".to_string(), PathBuf::from("/no/such/file.fa"))];
        assert!(SketchDatabase::build(&reference_files, &SketchParams::default(), false).is_err());
    }

    #[test]
    fn test_invalid_database() {
        let params = SketchParams::new(4, 2, 42, false);

        assert!(SketchDatabase::from_sketches(params.clone(), vec![]).is_err());

        let unsorted = ReferenceSketch {
            label: "A".to_string(),
            name: "a".to_string(),
            hashes: vec![2, 1],
        };
        assert!(SketchDatabase::from_sketches(params.clone(), vec![unsorted]).is_err());

        let oversized = ReferenceSketch {
            label: "A".to_string(),
            name: "a".to_string(),
            hashes: vec![1, 2, 3],
        };
        assert!(SketchDatabase::from_sketches(params.clone(), vec![oversized]).is_err());

        let empty = ReferenceSketch {
            label: "A".to_string(),
            name: "a".to_string(),
            hashes: vec![],
        };
        assert!(SketchDatabase::from_sketches(params, vec![empty]).is_ok());
    }

    #[test]
    fn test_check_compatibility() {
        let params = SketchParams::new(4, 10, 42, false);
        let records = vec![SeqRecord::new("r", b"ACGTAC".to_vec())];
        let db = SketchDatabase::from_sketches(params.clone(), sketch_records(&records, "A", &params)).unwrap();

        assert!(db.check_compatibility(&params).unwrap());
        assert!(db.check_compatibility(&SketchParams::new(5, 10, 42, false)).is_err());
    }

    #[test]
    fn test_load_corrupt_file() {
        let temp_dir = tempdir().unwrap();
        let path = write_temp_fasta("{ not json", "db.json", &temp_dir);
        assert!(SketchDatabase::load(&path).is_err());
    }
}
