
//! Classification of similarity vectors.
//!
//! The classifier itself sits behind the `Classifier` trait: it maps a query's similarity
//! vector to a predicted label and a normalized confidence per known label. The
//! `ClassificationAdapter` then decides whether the prediction is trusted or whether the
//! query is reported as `Other` because the confidence distribution is flat.
//!
//! Two classifiers are provided:
//! - `NearestReference` scores each label by its most similar reference and needs no model.
//! - `LinearModel` is a pretrained multinomial logistic-regression model read from JSON.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::database::SketchDatabase;

/// Label assigned to queries whose prediction is ambiguous.
pub const OTHER_LABEL: &str = "Other";

/// Raw output of a classifier for a single query.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: String,

    /// Confidence (in percent) for each label, in `Classifier::labels` order.
    pub confidence: Vec<f64>,
}

pub trait Classifier: Sync {
    /// Labels the classifier can predict, in the order confidences are reported.
    fn labels(&self) -> &[String];

    /// Predict the label of a query from its similarity to each reference.
    fn predict(&self, similarities: &[f64]) -> Result<Prediction>;
}

/// Numerically stable softmax.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();

    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; the first is returned on ties.
fn arg_max(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, v) in values.iter().enumerate() {
        if best.is_none_or(|b| *v > values[b]) {
            best = Some(idx);
        }
    }

    best
}

/// Replaces untrustworthy predictions with `OTHER_LABEL`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationAdapter {
    min_spread: f64,
}

impl Default for ClassificationAdapter {
    fn default() -> Self {
        ClassificationAdapter { min_spread: 0.0 }
    }
}

impl ClassificationAdapter {
    pub fn new(min_spread: f64) -> Self {
        ClassificationAdapter { min_spread }
    }

    pub fn min_spread(&self) -> f64 {
        self.min_spread
    }

    /// Accept the predicted label unless the spread between the highest and lowest
    /// confidence is no more than `min_spread`.
    pub fn decide<'a>(&self, prediction: &'a Prediction) -> &'a str {
        if prediction.confidence.is_empty() {
            return OTHER_LABEL;
        }

        let (min, max) = prediction
            .confidence
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &c| {
                (min.min(c), max.max(c))
            });

        let spread = max - min;
        if spread.is_nan() || spread <= self.min_spread {
            return OTHER_LABEL;
        }

        &prediction.label
    }
}

/// Scores each label by the highest similarity of any reference carrying it.
pub struct NearestReference {
    labels: Vec<String>,
    reference_labels: Vec<usize>,
}

impl NearestReference {
    pub fn new(db: &SketchDatabase) -> Self {
        let labels = db.labels();
        let label_idx: FxHashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.as_str(), idx))
            .collect();

        let reference_labels = db
            .references()
            .iter()
            .map(|r| label_idx[r.label.as_str()])
            .collect();

        NearestReference {
            labels,
            reference_labels,
        }
    }
}

impl Classifier for NearestReference {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, similarities: &[f64]) -> Result<Prediction> {
        if similarities.len() != self.reference_labels.len() {
            bail!(
                "Expected {} similarity values, but received {}",
                self.reference_labels.len(),
                similarities.len()
            );
        }

        let mut scores = vec![0.0; self.labels.len()];
        for (similarity, &label_idx) in similarities.iter().zip(&self.reference_labels) {
            scores[label_idx] = f64::max(scores[label_idx], *similarity);
        }

        let best = arg_max(&scores).context("Classifier has no labels")?;
        let confidence = softmax(&scores).into_iter().map(|p| p * 100.0).collect();

        Ok(Prediction {
            label: self.labels[best].clone(),
            confidence,
        })
    }
}

/// Multinomial logistic-regression model over similarity vectors.
///
/// `coefficients` holds one row per label and one column per reference sketch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    labels: Vec<String>,
    coefficients: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl LinearModel {
    pub fn new(labels: Vec<String>, coefficients: Vec<Vec<f64>>, intercepts: Vec<f64>) -> Result<Self> {
        let model = LinearModel {
            labels,
            coefficients,
            intercepts,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .context(format!("Failed to open {}", path.display()))?;

        let model: LinearModel = serde_json::from_reader(BufReader::new(file))
            .context(format!("Failed to parse model {}", path.display()))?;
        model.validate()
            .context(format!("Invalid model {}", path.display()))?;

        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.labels.is_empty() {
            bail!("Model has no labels");
        }

        if self.coefficients.len() != self.labels.len() || self.intercepts.len() != self.labels.len() {
            bail!(
                "Model has {} labels, but {} coefficient rows and {} intercepts",
                self.labels.len(),
                self.coefficients.len(),
                self.intercepts.len()
            );
        }

        let num_features = self.num_features();
        if self.coefficients.iter().any(|row| row.len() != num_features) {
            bail!("Model coefficient rows differ in length");
        }

        Ok(())
    }

    /// Number of similarity values the model expects per query.
    pub fn num_features(&self) -> usize {
        self.coefficients.first().map_or(0, Vec::len)
    }

    /// Verify the model was trained against a database with the same number of references.
    pub fn check_compatibility(&self, db: &SketchDatabase) -> Result<()> {
        if self.num_features() != db.len() {
            bail!(
                "Model expects {} reference similarities, but database has {} references",
                self.num_features(),
                db.len()
            );
        }

        Ok(())
    }

    /// Class probabilities in `labels` order.
    pub fn predict_proba(&self, similarities: &[f64]) -> Vec<f64> {
        let scores: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(row, intercept)| {
                intercept + row.iter().zip(similarities).map(|(c, s)| c * s).sum::<f64>()
            })
            .collect();

        softmax(&scores)
    }
}

impl Classifier for LinearModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, similarities: &[f64]) -> Result<Prediction> {
        if similarities.len() != self.num_features() {
            bail!(
                "Model expects {} similarity values, but received {}",
                self.num_features(),
                similarities.len()
            );
        }

        let proba = self.predict_proba(similarities);
        let best = arg_max(&proba).context("Model has no labels")?;

        // confidence is reported as the softmax of the class probabilities, in percent
        let confidence = softmax(&proba).into_iter().map(|p| p * 100.0).collect();

        Ok(Prediction {
            label: self.labels[best].clone(),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ReferenceSketch;
    use crate::sketch_params::SketchParams;
    use tempfile::tempdir;

    fn prediction(label: &str, confidence: Vec<f64>) -> Prediction {
        Prediction {
            label: label.to_string(),
            confidence,
        }
    }

    fn reference(label: &str, name: &str) -> ReferenceSketch {
        ReferenceSketch {
            label: label.to_string(),
            name: name.to_string(),
            hashes: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_softmax() {
        let p = softmax(&[1.0, 1.0]);
        assert_eq!(p, vec![0.5, 0.5]);

        let p = softmax(&[1000.0, 0.0]);
        assert!((p[0] - 1.0).abs() < 1e-12);
        assert!(p[1] < 1e-12);

        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_adapter_flat_confidence() {
        let adapter = ClassificationAdapter::default();
        assert_eq!(adapter.decide(&prediction("Zika", vec![50.0, 50.0, 50.0])), OTHER_LABEL);
        assert_eq!(adapter.decide(&prediction("Zika", vec![])), OTHER_LABEL);
        assert_eq!(adapter.decide(&prediction("Zika", vec![f64::NAN, 1.0])), OTHER_LABEL);
    }

    #[test]
    fn test_adapter_accepts_prediction() {
        let adapter = ClassificationAdapter::default();
        assert_eq!(adapter.decide(&prediction("Zika", vec![20.0, 80.0])), "Zika");

        let adapter = ClassificationAdapter::new(70.0);
        assert_eq!(adapter.decide(&prediction("Zika", vec![20.0, 80.0])), OTHER_LABEL);
        assert_eq!(adapter.decide(&prediction("Zika", vec![5.0, 95.0])), "Zika");
    }

    #[test]
    fn test_nearest_reference() {
        let params = SketchParams::new(4, 10, 42, false);
        let db = SketchDatabase::from_sketches(
            params,
            vec![reference("Dengue", "d1"), reference("Zika", "z1"), reference("Dengue", "d2")],
        )
        .unwrap();

        let classifier = NearestReference::new(&db);
        assert_eq!(classifier.labels(), ["Dengue", "Zika"]);

        let prediction = classifier.predict(&[10.0, 40.0, 60.0]).unwrap();
        assert_eq!(prediction.label, "Dengue");
        assert_eq!(prediction.confidence.len(), 2);
        assert!(prediction.confidence[0] > prediction.confidence[1]);
        assert!((prediction.confidence.iter().sum::<f64>() - 100.0).abs() < 1e-9);

        // ties go to the first label
        let prediction = classifier.predict(&[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(prediction.label, "Dengue");
        assert_eq!(ClassificationAdapter::default().decide(&prediction), OTHER_LABEL);

        assert!(classifier.predict(&[1.0]).is_err());
    }

    #[test]
    fn test_linear_model() {
        let model = LinearModel::new(
            vec!["A".to_string(), "B".to_string()],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![0.0, 0.0],
        )
        .unwrap();

        let proba = model.predict_proba(&[2.0, 0.0]);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(proba[0] > proba[1]);

        let prediction = model.predict(&[0.0, 3.0]).unwrap();
        assert_eq!(prediction.label, "B");
        assert!(prediction.confidence[1] > 50.0);

        assert!(model.predict(&[1.0]).is_err());
    }

    #[test]
    fn test_linear_model_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"labels": ["A", "B"], "coefficients": [[0.5, -0.5], [-0.5, 0.5]], "intercepts": [0.1, -0.1]}"#,
        )
        .unwrap();

        let model = LinearModel::load(&path).unwrap();
        assert_eq!(model.labels(), ["A", "B"]);
        assert_eq!(model.num_features(), 2);

        let db = SketchDatabase::from_sketches(
            SketchParams::new(4, 10, 42, false),
            vec![reference("A", "a1"), reference("B", "b1")],
        )
        .unwrap();
        assert!(model.check_compatibility(&db).is_ok());

        let db = SketchDatabase::from_sketches(SketchParams::new(4, 10, 42, false), vec![reference("A", "a1")]).unwrap();
        assert!(model.check_compatibility(&db).is_err());

        std::fs::write(&path, r#"{"labels": ["A"], "coefficients": [], "intercepts": [0.0]}"#).unwrap();
        assert!(LinearModel::load(&path).is_err());
    }
}
