
//! Query classification pipeline.
//!
//! Queries pass through three stages, each run to completion before the next starts:
//! 1. k-mer extraction: clean each sequence and hash its canonical k-mers,
//! 2. sketch sampling: reduce each hash list to a bottom-n sketch,
//! 3. similarity computation: compare each sketch against every reference sketch.
//!
//! Items within a stage are processed in parallel and collected back in query order. A
//! progress observer is notified after every item and a shared cancellation flag is
//! checked before every item. Finally each similarity vector is classified and paired
//! with the name of the query it came from.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{bail, Result};
use log::{debug, warn};
use num_format::{Locale, ToFormattedString};
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::bottom_sketch::{bottom_n, Sketch};
use crate::classifier::{ClassificationAdapter, Classifier};
use crate::database::SketchDatabase;
use crate::hashing::ItemHash;
use crate::progress::{ProgressObserver, Stage};
use crate::sequence::{clean, SeqRecord};
use crate::similarity::{similarity_vector, SimilarityMatrix};

/// Predicted class of a single query.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub name: String,
    pub label: String,
    pub confidence: Vec<f64>,
}

/// Classifications in query order, together with the similarity matrix they were derived from.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResults {
    pub classifications: Vec<Classification>,
    pub matrix: SimilarityMatrix,
}

/// Apply `f` to every item in parallel, reporting progress and honouring cancellation.
fn run_stage<I, U, F>(
    stage: Stage,
    items: I,
    observer: &dyn ProgressObserver,
    cancel: &AtomicBool,
    f: F,
) -> Result<Vec<U>>
where
    I: IntoParallelIterator,
    I::Iter: IndexedParallelIterator,
    U: Send,
    F: Fn(I::Item) -> U + Sync + Send,
{
    let items = items.into_par_iter();
    let total = items.len();
    let done = AtomicUsize::new(0);

    let results = items
        .map(|item| {
            if cancel.load(Ordering::Relaxed) {
                bail!("Cancelled during {} after {} of {} queries", stage, done.load(Ordering::Relaxed), total);
            }

            let result = f(item);
            let num_done = done.fetch_add(1, Ordering::Relaxed) + 1;
            observer.item_done(stage, num_done, total);

            Ok(result)
        })
        .collect::<Result<Vec<U>>>()?;

    debug!("Finished {} for {} queries.", stage, total.to_formatted_string(&Locale::en));

    Ok(results)
}

/// Stage 1: hash the canonical k-mers of each cleaned query sequence.
pub fn extract_kmer_hashes(
    records: &[SeqRecord],
    db: &SketchDatabase,
    observer: &dyn ProgressObserver,
    cancel: &AtomicBool,
) -> Result<Vec<Vec<ItemHash>>> {
    let params = db.params();
    let hasher = params.create_hasher();
    let k = params.k() as usize;

    let kmer_hashes = run_stage(Stage::KmerExtraction, records, observer, cancel, |record: &SeqRecord| {
        let seq = clean(&record.seq);
        let mut hashes = Vec::with_capacity(seq.len().saturating_sub(k - 1));
        hasher.hash_seq(&seq, k, &mut hashes);
        hashes
    })?;

    for (record, hashes) in records.iter().zip(&kmer_hashes) {
        if hashes.is_empty() {
            warn!("Query '{}' has no valid k-mers (k = {}); it will not match any reference.", record.name, k);
        }
    }

    Ok(kmer_hashes)
}

/// Stage 2: reduce the k-mer hashes of each query to a bottom-n sketch.
pub fn sample_sketches(
    kmer_hashes: Vec<Vec<ItemHash>>,
    db: &SketchDatabase,
    observer: &dyn ProgressObserver,
    cancel: &AtomicBool,
) -> Result<Vec<Sketch>> {
    let params = db.params();
    run_stage(Stage::SketchSampling, kmer_hashes, observer, cancel, |hashes: Vec<ItemHash>| {
        bottom_n(hashes, params.sketch_size(), params.distinct())
    })
}

/// Stage 3: percentage Jaccard similarity of each query sketch to every reference sketch.
pub fn compute_similarities(
    sketches: &[Sketch],
    db: &SketchDatabase,
    observer: &dyn ProgressObserver,
    cancel: &AtomicBool,
) -> Result<SimilarityMatrix> {
    run_stage(Stage::SimilarityComputation, sketches, observer, cancel, |sketch: &Sketch| {
        similarity_vector(sketch, db.references())
    })
}

/// Classify each query from its row of the similarity matrix, keeping the query name with its label.
pub fn classify_similarities(
    records: &[SeqRecord],
    matrix: &SimilarityMatrix,
    classifier: &dyn Classifier,
    adapter: &ClassificationAdapter,
) -> Result<Vec<Classification>> {
    if records.len() != matrix.len() {
        bail!(
            "Have {} queries, but {} similarity vectors",
            records.len(),
            matrix.len()
        );
    }

    records
        .par_iter()
        .zip(matrix.par_iter())
        .map(|(record, similarities)| -> Result<Classification> {
            let prediction = classifier.predict(similarities)?;
            Ok(Classification {
                name: record.name.clone(),
                label: adapter.decide(&prediction).to_string(),
                confidence: prediction.confidence,
            })
        })
        .collect()
}

/// Run all pipeline stages on a batch of queries.
pub fn classify_queries(
    records: &[SeqRecord],
    db: &SketchDatabase,
    classifier: &dyn Classifier,
    adapter: &ClassificationAdapter,
    observer: &dyn ProgressObserver,
    cancel: &AtomicBool,
) -> Result<QueryResults> {
    let kmer_hashes = extract_kmer_hashes(records, db, observer, cancel)?;
    let sketches = sample_sketches(kmer_hashes, db, observer, cancel)?;
    let matrix = compute_similarities(&sketches, db, observer, cancel)?;
    let classifications = classify_similarities(records, &matrix, classifier, adapter)?;

    Ok(QueryResults {
        classifications,
        matrix,
    })
}
