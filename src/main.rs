
//! Main entry point for the arboclass application.
//!
//! This file handles command-line parsing, logging setup, and input validation, and orchestrates
//! the two commands: building a reference sketch database from labelled FASTA files, and
//! classifying query sequences against that database. Results are written to output files in
//! the specified directory.

use std::env;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use itertools::Itertools;
use log::{info, warn};
use num_format::{Locale, ToFormattedString};

use crate::classifier::{ClassificationAdapter, Classifier, LinearModel, NearestReference};
use crate::cli::{ClassifyArgs, Cli, Command, SketchArgs};
use crate::database::SketchDatabase;
use crate::io_utils::{read_reference_table, read_seq_records, reference_files_from_dir, write_classifications, write_similarity_matrix};
use crate::logging::setup_logger;
use crate::pipeline::classify_queries;
use crate::progress::{progress_bar, StageProgressBars};
use crate::sketch_params::SketchParams;

mod cli;
pub mod logging;
pub mod progress;
pub mod sequence;
pub mod hashing;
pub mod sketch_params;
pub mod bottom_sketch;
pub mod similarity;
pub mod database;
pub mod classifier;
pub mod pipeline;
pub mod io_utils;

const SKETCH_DB_FILE: &str = "sketch_db.json";
const CLASSIFICATION_FILE: &str = "classification.tsv";
const SIMILARITY_MATRIX_FILE: &str = "similarity_matrix.tsv";

/// Common initialization required by all commands.
fn init(threads: usize) -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    info!("{} v{}", env!("CARGO_PKG_NAME"), VERSION);
    info!("{}", env::args().collect::<Vec<String>>().join(" "));

    info!("Using {} threads.", threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;

    Ok(())
}

/// Build and save a reference sketch database.
fn run_sketch(args: SketchArgs) -> Result<()> {
    // determine if input is being specified via a directory or a file table
    let reference_files = if let Some(reference_table) = &args.reference_table {
        info!("Using reference table: {}", reference_table.display());
        read_reference_table(reference_table)?
    } else if let Some(input_dir) = &args.input_dir {
        info!("Using input directory: {}", input_dir.display());
        reference_files_from_dir(input_dir)?
    } else {
        bail!("No input specified. Use --input-dir or --reference-table.");
    };

    if reference_files.is_empty() {
        bail!("No reference FASTA files specified.");
    }

    // check that all reference FASTA files exist
    if !args.skip_file_check {
        info!("Verifying all reference FASTA files exist.");
        let progress_bar = progress_bar(reference_files.len() as u64);
        for (label, path) in &reference_files {
            if !path.exists() {
                bail!("Reference file {} with label '{}' does not exist.", path.display(), label);
            }
            progress_bar.inc(1);
        }
        progress_bar.finish();
    }

    let params = SketchParams::new(args.kmer_length, args.sketch_size, args.seed, args.distinct);
    params.validate()?;

    info!(
        "Sketching {} reference files (k = {}, sketch size = {}, seed = {}, distinct = {}):",
        reference_files.len().to_formatted_string(&Locale::en),
        params.k(),
        params.sketch_size(),
        params.seed(),
        params.distinct()
    );
    let db = SketchDatabase::build(&reference_files, &params, args.by_file)?;

    let empty_sketches = db.references().iter().filter(|r| r.hashes.is_empty()).count();
    if empty_sketches > 0 {
        warn!("{} reference sketches are empty.", empty_sketches.to_formatted_string(&Locale::en));
    }

    info!(
        "Created {} reference sketches across {} labels.",
        db.len().to_formatted_string(&Locale::en),
        db.labels().len()
    );

    let db_file = args.out_dir.join(SKETCH_DB_FILE);
    db.save(&db_file)?;
    info!("Sketch database written to {}", db_file.display());

    Ok(())
}

/// Classify query sequences against a reference sketch database.
fn run_classify(args: ClassifyArgs) -> Result<()> {
    info!("Loading sketch database: {}", args.sketch_db.display());
    let db = SketchDatabase::load(&args.sketch_db)?;
    info!(
        "Loaded {} reference sketches across {} labels (k = {}, sketch size = {}).",
        db.len().to_formatted_string(&Locale::en),
        db.labels().len(),
        db.params().k(),
        db.params().sketch_size()
    );

    // explicitly requested parameters must agree with those used to build the database
    if args.kmer_length.is_some() || args.sketch_size.is_some() {
        let db_params = db.params();
        let query_params = SketchParams::new(
            args.kmer_length.unwrap_or(db_params.k()),
            args.sketch_size.unwrap_or(db_params.sketch_size()),
            db_params.seed(),
            db_params.distinct(),
        );
        db.check_compatibility(&query_params)?;
    }

    let classifier: Box<dyn Classifier> = if let Some(model_file) = &args.model {
        info!("Loading classification model: {}", model_file.display());
        let model = LinearModel::load(model_file)?;
        model.check_compatibility(&db)?;
        Box::new(model)
    } else {
        info!("Classifying queries by their most similar reference.");
        Box::new(NearestReference::new(&db))
    };

    let records = read_seq_records(&args.query_file)?;
    info!("Read {} query sequences.", records.len().to_formatted_string(&Locale::en));

    let adapter = ClassificationAdapter::new(args.min_spread);
    info!("Queries with a confidence spread of at most {} are reported as 'Other'.", adapter.min_spread());

    let progress = StageProgressBars::new();
    let cancel = AtomicBool::new(false);
    let results = classify_queries(&records, &db, classifier.as_ref(), &adapter, &progress, &cancel)?;

    let label_counts = results
        .classifications
        .iter()
        .map(|c| c.label.as_str())
        .counts();
    info!("Predicted classes:");
    for (label, count) in label_counts.into_iter().sorted() {
        info!(" - {}: {}", label, count.to_formatted_string(&Locale::en));
    }

    let classification_file = args.out_dir.join(CLASSIFICATION_FILE);
    write_classifications(&classification_file, &results.classifications)?;
    info!("Classifications written to {}", classification_file.display());

    if args.write_matrix {
        let query_names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        let reference_names: Vec<&str> = db.references().iter().map(|r| r.name.as_str()).collect();
        let matrix_file = args.out_dir.join(SIMILARITY_MATRIX_FILE);
        write_similarity_matrix(&matrix_file, &query_names, &reference_names, &results.matrix)?;
        info!("Similarity matrix written to {}", matrix_file.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let start = Instant::now();

    let args = Cli::parse();

    let (out_dir, threads) = match &args.command {
        Command::Sketch(sketch_args) => (&sketch_args.out_dir, sketch_args.threads),
        Command::Classify(classify_args) => (&classify_args.out_dir, classify_args.threads),
    };

    std::fs::create_dir_all(out_dir)?;
    setup_logger(out_dir, args.verbose)?;

    init(threads)?;

    match args.command {
        Command::Sketch(sketch_args) => run_sketch(sketch_args)?,
        Command::Classify(classify_args) => run_classify(classify_args)?,
    }

    info!("Elapsed time (sec): {:.2}", start.elapsed().as_secs_f32());
    info!("Done.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn sketch_args(reference_table: PathBuf, out_dir: PathBuf) -> SketchArgs {
        SketchArgs {
            input_dir: None,
            reference_table: Some(reference_table),
            out_dir,
            kmer_length: 5,
            sketch_size: 200,
            seed: 42,
            distinct: false,
            by_file: false,
            threads: 1,
            skip_file_check: false,
        }
    }

    fn classify_args(query_file: PathBuf, sketch_db: PathBuf, out_dir: PathBuf) -> ClassifyArgs {
        ClassifyArgs {
            query_file,
            sketch_db,
            model: None,
            out_dir,
            write_matrix: true,
            kmer_length: None,
            sketch_size: None,
            min_spread: 0.0,
            threads: 1,
        }
    }

    #[test]
    fn test_sketch_then_classify() -> Result<()> {
        let temp_dir = tempdir()?;
        let dir = temp_dir.path();

        write(dir.join("dengue.fa"), ">d1\nATGGCGTACGATCGATCGGATCCATGCAAATTTGGGCCCATATAGCGC\n")?;
        write(dir.join("zika.fa"), ">z1\nTTGACCAGTTAGGCATTACGGACTAGGACCATTGACAGTACGGATCAT\n")?;
        write(
            dir.join("refs.tsv"),
            format!("# label\tpath\nDengue\t{}\nZika\t{}\n", dir.join("dengue.fa").display(), dir.join("zika.fa").display()),
        )?;
        write(
            dir.join("queries.fasta"),
            ">query one\natggcgtacgatcgatcggatccatgcaaatttgggcccatatagcgc\n>query two\nNNNN\n",
        )?;

        run_sketch(sketch_args(dir.join("refs.tsv"), dir.to_path_buf()))?;
        assert!(dir.join(SKETCH_DB_FILE).exists());

        run_classify(classify_args(dir.join("queries.fasta"), dir.join(SKETCH_DB_FILE), dir.to_path_buf()))?;
        assert_eq!(
            std::fs::read_to_string(dir.join(CLASSIFICATION_FILE))?
                .lines()
                .map(|line| line.split('\t').take(2).join("\t"))
                .collect::<Vec<_>>(),
            vec!["query_name\tpredicted_class", "query one\tDengue", "query two\tOther"]
        );

        let matrix = std::fs::read_to_string(dir.join(SIMILARITY_MATRIX_FILE))?;
        assert!(matrix.starts_with("query_name\td1\tz1\nquery one\t100.0000\t"));

        Ok(())
    }

    #[test]
    fn test_classify_with_mismatched_k() -> Result<()> {
        let temp_dir = tempdir()?;
        let dir = temp_dir.path();

        write(dir.join("ref.fa"), ">r1\nACGTACGTAAACCCGGGTTT\n")?;
        write(dir.join("refs.tsv"), format!("A\t{}\n", dir.join("ref.fa").display()))?;
        write(dir.join("queries.fasta"), ">q\nACGTACGTAAACCCGGGTTT\n")?;
        run_sketch(sketch_args(dir.join("refs.tsv"), dir.to_path_buf()))?;

        let mut args = classify_args(dir.join("queries.fasta"), dir.join(SKETCH_DB_FILE), dir.to_path_buf());
        args.kmer_length = Some(11);
        assert!(run_classify(args).is_err());

        Ok(())
    }

    #[test]
    fn test_missing_reference_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let dir = temp_dir.path();
        write(dir.join("refs.tsv"), "A\t/no/such/file.fa\n")?;

        assert!(run_sketch(sketch_args(dir.join("refs.tsv"), dir.to_path_buf())).is_err());
        Ok(())
    }
}
