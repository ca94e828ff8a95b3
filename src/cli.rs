
//! Command-line interface definition for the arboclass application.
//!
//! This file defines the `Cli` struct using the `clap` crate to parse and validate command-line arguments.
//! Two subcommands are provided: `sketch` builds a reference sketch database from labelled FASTA files,
//! and `classify` assigns query sequences to the labels of a reference database. Custom value parsers
//! are provided for k-mer length, sketch size, confidence spread, and thread count.
//! The CLI output is styled using the `anstyle` crate for improved readability.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::sketch_params::{DEFAULT_K, DEFAULT_SEED, DEFAULT_SKETCH_SIZE};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(styles=get_styles())]
#[command(disable_help_subcommand = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Report debugging information in the log
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a reference sketch database from labelled FASTA files
    Sketch(SketchArgs),

    /// Classify query sequences against a reference sketch database
    Classify(ClassifyArgs),
}

#[derive(Args)]
pub struct SketchArgs {
    /// Directory of reference FASTA files, each labelled by its file name
    #[arg(short = 'i', long, help_heading = "Inputs", group = "input", value_parser = clap::value_parser!(PathBuf))]
    pub input_dir: Option<PathBuf>,

    /// TSV file indicating reference labels and FASTA files (label, path to FASTA file)
    #[arg(short = 'r', long, help_heading = "Inputs", group = "input", value_parser = clap::value_parser!(PathBuf))]
    pub reference_table: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long, help_heading = "Output", value_parser = clap::value_parser!(PathBuf))]
    pub out_dir: PathBuf,

    /// Length of k-mers to use
    #[arg(short, long, help_heading = "Sketching parameters", default_value_t = DEFAULT_K, value_parser = validate_kmer_length)]
    pub kmer_length: u8,

    /// Number of smallest k-mer hashes retained per sketch
    #[arg(short = 'n', long, help_heading = "Sketching parameters", default_value_t = DEFAULT_SKETCH_SIZE, value_parser = validate_sketch_size)]
    pub sketch_size: usize,

    /// Seed for k-mer hashing
    #[arg(long, help_heading = "Sketching parameters", default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Remove duplicate k-mer hashes before selecting the smallest hashes
    #[arg(long, help_heading = "Sketching parameters", default_value_t = false)]
    pub distinct: bool,

    /// Create one sketch per file rather than one per sequence
    #[arg(long, default_value_t = false)]
    pub by_file: bool,

    /// Number of threads to use
    #[arg(short, long, default_value_t = 1, value_parser = validate_threads)]
    pub threads: usize,

    /// Skip verification that reference FASTA files exist
    #[arg(long, default_value_t = false)]
    pub skip_file_check: bool,
}

#[derive(Args)]
pub struct ClassifyArgs {
    /// FASTA/FASTQ file of query sequences
    #[arg(short = 'q', long, help_heading = "Inputs", value_parser = clap::value_parser!(PathBuf))]
    pub query_file: PathBuf,

    /// Reference sketch database created with the `sketch` command
    #[arg(short = 'd', long, help_heading = "Inputs", value_parser = clap::value_parser!(PathBuf))]
    pub sketch_db: PathBuf,

    /// Multinomial logistic-regression model (JSON); nearest reference is used if absent
    #[arg(short = 'm', long, help_heading = "Inputs", value_parser = clap::value_parser!(PathBuf))]
    pub model: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long, help_heading = "Output", value_parser = clap::value_parser!(PathBuf))]
    pub out_dir: PathBuf,

    /// Write similarity of each query to each reference
    #[arg(long, help_heading = "Output", default_value_t = false)]
    pub write_matrix: bool,

    /// Expected k-mer length; must match the sketch database
    #[arg(short, long, help_heading = "Sketching parameters", value_parser = validate_kmer_length)]
    pub kmer_length: Option<u8>,

    /// Expected sketch size; must match the sketch database
    #[arg(short = 'n', long, help_heading = "Sketching parameters", value_parser = validate_sketch_size)]
    pub sketch_size: Option<usize>,

    /// Report queries as 'Other' if the confidence spread across labels is no more than this value
    #[arg(long, help_heading = "Classification", default_value_t = 0.0, value_parser = validate_min_spread)]
    pub min_spread: f64,

    /// Number of threads to use
    #[arg(short, long, default_value_t = 1, value_parser = validate_threads)]
    pub threads: usize,
}

fn validate_kmer_length(k: &str) -> Result<u8, String> {
    let k: u8 = k
        .parse()
        .map_err(|_| format!("`{k}` isn't a valid k-mer length"))?;

    if k == 0 {
        return Err("k-mer length must be in the range [1, 255]".to_string());
    }

    Ok(k)
}

fn validate_sketch_size(n: &str) -> Result<usize, String> {
    let n: usize = n
        .parse()
        .map_err(|_| format!("`{n}` isn't a valid sketch size"))?;

    if n == 0 {
        return Err("Sketch size must be at least 1".to_string());
    }

    Ok(n)
}

fn validate_min_spread(spread: &str) -> Result<f64, String> {
    let spread: f64 = spread
        .parse()
        .map_err(|_| format!("`{spread}` isn't a valid value"))?;

    if !(0.0..=100.0).contains(&spread) {
        return Err("Minimum spread must be in the range [0, 100]".to_string());
    }

    Ok(spread)
}

fn validate_threads(threads: &str) -> Result<usize, String> {
    let threads: usize = threads
        .parse()
        .map_err(|_| format!("`{threads}` isn't a valid value"))?;

    if !(1..=1024).contains(&threads) {
        return Err("Threads  must be in the range [1, 1024]".to_string());
    }

    Ok(threads)
}

fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
        .literal(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .placeholder(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
}
