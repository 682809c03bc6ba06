//! Detection quality against ground-truth labels

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Confusion counts plus the usual ratios
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl DetectionMetrics {
    /// Compare flags with labels position by position. Ratios with a zero
    /// denominator are reported as 0.
    pub fn from_predictions(predictions: &[bool], labels: &[bool]) -> Result<Self> {
        if predictions.len() != labels.len() {
            return Err(Error::dimension("detection labels", predictions.len(), labels.len()));
        }

        let (mut tp, mut fp, mut tn, mut fn_) = (0, 0, 0, 0);
        for (&predicted, &actual) in predictions.iter().zip(labels) {
            match (predicted, actual) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, false) => tn += 1,
                (false, true) => fn_ += 1,
            }
        }

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            true_positives: tp,
            false_positives: fp,
            true_negatives: tn,
            false_negatives: fn_,
            accuracy: ratio(tp + tn, predictions.len()),
            precision,
            recall,
            f1,
        })
    }
}

impl fmt::Display for DetectionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy:  {:.4}", self.accuracy)?;
        writeln!(f, "Precision: {:.4}", self.precision)?;
        writeln!(f, "Recall:    {:.4}", self.recall)?;
        write!(f, "F1 score:  {:.4}", self.f1)
    }
}
