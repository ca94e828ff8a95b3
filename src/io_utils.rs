use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use needletail::parse_fastx_file;

use crate::pipeline::Classification;
use crate::sequence::SeqRecord;
use crate::similarity::SimilarityVector;

const SEQ_FILE_EXTENSIONS: [&str; 6] = [".fq", ".fna", ".fa", ".fasta", ".fastq", ".fas"];

/// Extracts sequence identifier from a given sequence file path by removing common file extensions.
pub fn seq_id_from_filename(seq_file: &Path) -> String {
    let file_name = seq_file
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();

    let seq_id = file_name.strip_suffix(".gz").unwrap_or(&file_name);
    SEQ_FILE_EXTENSIONS
        .iter()
        .find_map(|ext| seq_id.strip_suffix(ext))
        .unwrap_or(seq_id)
        .to_string()
}

/// Returns true if the path looks like a FASTA/FASTQ file, optionally gzipped.
pub fn is_seq_file(path: &Path) -> bool {
    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();

    let file_name = file_name.strip_suffix(".gz").unwrap_or(&file_name);
    SEQ_FILE_EXTENSIONS.iter().any(|ext| file_name.ends_with(ext))
}

/// Read all records from a FASTA/FASTQ file, in file order.
pub fn read_seq_records(seq_file: &Path) -> Result<Vec<SeqRecord>> {
    let mut fastx_reader = parse_fastx_file(seq_file)
        .context(format!("Failed to open {}", seq_file.display()))?;

    let mut records = Vec::new();
    while let Some(rec) = fastx_reader.next() {
        let record = rec.context(format!("Failed to parse {}", seq_file.display()))?;
        records.push(SeqRecord::new(
            String::from_utf8_lossy(record.id()).into_owned(),
            record.seq().into_owned(),
        ));
    }

    Ok(records)
}

/// Parse a TSV file listing reference labels and the path to their FASTA files.
///
/// Entries are returned in file order.
pub fn read_reference_table(file_path: &Path) -> Result<Vec<(String, PathBuf)>> {
    let file = File::open(file_path)
        .context(format!("Failed to open {}", file_path.display()))?;
    let reader = BufReader::new(file);

    let mut references = Vec::new();
    for line in reader.lines() {
        let line = line?;

        // skip comment lines starting with #
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.trim().split('\t').collect();
        if fields.len() != 2 {
            bail!("Invalid TSV format: each line must have exactly 2 columns (label, path)");
        }

        references.push((fields[0].to_string(), PathBuf::from(fields[1])));
    }

    Ok(references)
}

/// Find all sequence files in a directory, labelled by file name.
///
/// Files are sorted by path so the reference order is reproducible.
pub fn reference_files_from_dir(input_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(input_dir)
        .context(format!("Failed to read directory {}", input_dir.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_seq_file(path))
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("No FASTA files found in {}.", input_dir.display());
    }

    Ok(paths
        .into_iter()
        .map(|path| (seq_id_from_filename(&path), path))
        .collect())
}

/// Write query names and predicted classes as TSV.
pub fn write_classifications(out_file: &Path, classifications: &[Classification]) -> Result<()> {
    let file = File::create(out_file)
        .context(format!("Failed to create {}", out_file.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "query_name\tpredicted_class\tmax_confidence")?;
    for c in classifications {
        let max_confidence = c.confidence.iter().copied().fold(f64::NAN, f64::max);
        writeln!(writer, "{}\t{}\t{:.4}", c.name, c.label, max_confidence)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write percentage similarity of each query (rows) against each reference (columns) as TSV.
pub fn write_similarity_matrix(
    out_file: &Path,
    query_names: &[&str],
    reference_names: &[&str],
    matrix: &[SimilarityVector],
) -> Result<()> {
    let file = File::create(out_file)
        .context(format!("Failed to create {}", out_file.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "query_name\t{}", reference_names.join("\t"))?;
    for (name, row) in query_names.iter().zip(matrix) {
        let scores: Vec<String> = row.iter().map(|s| format!("{:.4}", s)).collect();
        writeln!(writer, "{}\t{}", name, scores.join("\t"))?;
    }

    writer.flush()?;
    Ok(())
}
