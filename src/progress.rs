
//! Progress reporting for the classification pipeline.
//!
//! Pipeline stages report progress through the `ProgressObserver` trait after each
//! processed item, so the computation has no knowledge of how (or whether) progress is
//! displayed. `StageProgressBars` renders one `indicatif` progress bar per stage.

use std::fmt;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Stages of the query pipeline which report progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    KmerExtraction,
    SketchSampling,
    SimilarityComputation,
}

impl Stage {
    pub const ALL: [Stage; 3] = [
        Stage::KmerExtraction,
        Stage::SketchSampling,
        Stage::SimilarityComputation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::KmerExtraction => "k-mer extraction",
            Stage::SketchSampling => "sketch sampling",
            Stage::SimilarityComputation => "similarity computation",
        }
    }

    fn index(&self) -> usize {
        match self {
            Stage::KmerExtraction => 0,
            Stage::SketchSampling => 1,
            Stage::SimilarityComputation => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives a notification each time a pipeline stage finishes an item.
///
/// Stages may run items in parallel, so notifications can arrive from multiple threads
/// and `done` is not guaranteed to be monotonic across calls.
pub trait ProgressObserver: Sync {
    fn item_done(&self, stage: Stage, done: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(Stage, usize, usize) + Sync,
{
    fn item_done(&self, stage: Stage, done: usize, total: usize) {
        self(stage, done, total)
    }
}

/// Observer which ignores all progress.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn item_done(&self, _stage: Stage, _done: usize, _total: usize) {}
}

/// One terminal progress bar per pipeline stage.
pub struct StageProgressBars {
    _multi: MultiProgress,
    bars: [ProgressBar; 3],
}

impl StageProgressBars {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let bars = Stage::ALL.map(|stage| {
            let bar = multi.add(progress_bar_msg(0));
            bar.set_message(stage.name());
            bar
        });

        StageProgressBars { _multi: multi, bars }
    }
}

impl Default for StageProgressBars {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for StageProgressBars {
    fn item_done(&self, stage: Stage, done: usize, total: usize) {
        let bar = &self.bars[stage.index()];
        bar.set_length(total as u64);
        bar.set_position(bar.position().max(done as u64));

        if done == total {
            bar.finish();
        }
    }
}

/// Create a progress bar of a specified length with desired styling.
pub fn progress_bar(len: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(len);
    progress_bar.set_style(ProgressStyle::default_bar().template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {percent}% [{human_pos}/{human_len}] [Remaining: {eta}]",
    ).expect("Invalid progress style."));

    progress_bar
}

/// Create a progress bar of a specified length and styling, with a terminal message.
pub fn progress_bar_msg(len: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(len);
    progress_bar.set_style(ProgressStyle::default_bar().template(
        "[{elapsed_precise}] {bar:20.cyan/blue} {percent}% [{human_pos}/{human_len}] [Remaining: {eta}] [{msg}]",
    ).expect("Invalid progress style."));

    progress_bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_observer() {
        let events = Mutex::new(Vec::new());
        let observer = |stage: Stage, done: usize, total: usize| {
            events.lock().unwrap().push((stage, done, total));
        };

        observer.item_done(Stage::SketchSampling, 1, 2);
        observer.item_done(Stage::SketchSampling, 2, 2);

        assert_eq!(
            *events.lock().unwrap(),
            vec![(Stage::SketchSampling, 1, 2), (Stage::SketchSampling, 2, 2)]
        );
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::KmerExtraction.to_string(), "k-mer extraction");
        assert_eq!(Stage::ALL.iter().map(|s| s.index()).collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
