//! Classification metrics over the fixed five-label space.

use serde::Serialize;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::utils::Drug;

/// Counts of (true label, predicted label) pairs; rows are true labels and
/// columns predicted labels, both in [`Drug::ALL`] order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    counts: [[usize; 5]; 5],
}

impl ConfusionMatrix {
    pub fn from_pairs(truth: &[Drug], predicted: &[Drug]) -> Self {
        let mut counts = [[0usize; 5]; 5];
        for (t, p) in truth.iter().zip(predicted) {
            counts[t.index()][p.index()] += 1;
        }
        Self { counts }
    }

    pub fn count(&self, truth: Drug, predicted: Drug) -> usize {
        self.counts[truth.index()][predicted.index()]
    }

    pub fn rows(&self) -> &[[usize; 5]; 5] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..5).map(|i| self.counts[i][i]).sum()
    }

    /// Diagonal share; 0 for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    pub fn true_positives(&self, drug: Drug) -> usize {
        self.count(drug, drug)
    }

    /// Predicted as `drug` while truly something else.
    pub fn false_positives(&self, drug: Drug) -> usize {
        let col = drug.index();
        (0..5).filter(|&r| r != col).map(|r| self.counts[r][col]).sum()
    }

    /// Truly `drug` while predicted as something else.
    pub fn false_negatives(&self, drug: Drug) -> usize {
        let row = drug.index();
        (0..5).filter(|&c| c != row).map(|c| self.counts[row][c]).sum()
    }

    pub fn support(&self, drug: Drug) -> usize {
        self.counts[drug.index()].iter().sum()
    }
}

/// One-vs-rest metrics of a single class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: Drug,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Averaged precision/recall/F1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    /// Unweighted mean over the five classes.
    pub macro_avg: AverageMetrics,
    /// Mean weighted by class support.
    pub weighted_avg: AverageMetrics,
    pub confusion: ConfusionMatrix,
}

impl EvaluationReport {
    pub fn support(&self) -> usize {
        self.confusion.total()
    }

    pub fn class(&self, drug: Drug) -> &ClassMetrics {
        &self.per_class[drug.index()]
    }
}

/// Score `predicted` against `truth`.
///
/// Precision, recall and F1 are 0 whenever their denominator is 0.
pub fn evaluate(truth: &[Drug], predicted: &[Drug]) -> Result<EvaluationReport> {
    if truth.is_empty() {
        return Err(PipelineError::EmptyLabelSet);
    }
    if truth.len() != predicted.len() {
        return Err(PipelineError::InvalidInput(format!(
            "{} true labels but {} predictions",
            truth.len(),
            predicted.len()
        )));
    }

    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    let accuracy = ratio(correct, truth.len());
    let confusion = ConfusionMatrix::from_pairs(truth, predicted);

    let per_class: Vec<ClassMetrics> = Drug::ALL
        .iter()
        .map(|&label| {
            let tp = confusion.true_positives(label);
            let precision = ratio(tp, tp + confusion.false_positives(label));
            let recall = ratio(tp, tp + confusion.false_negatives(label));
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                label,
                precision,
                recall,
                f1,
                support: confusion.support(label),
            }
        })
        .collect();

    let macro_avg = average(&per_class, |_| 1.0);
    let weighted_avg = average(&per_class, |m| m.support as f64);
    debug!(accuracy, correct, total = truth.len(), "evaluated predictions");

    Ok(EvaluationReport {
        accuracy,
        per_class,
        macro_avg,
        weighted_avg,
        confusion,
    })
}

fn average(metrics: &[ClassMetrics], weight: impl Fn(&ClassMetrics) -> f64) -> AverageMetrics {
    let total: f64 = metrics.iter().map(&weight).sum();
    let mean = |field: fn(&ClassMetrics) -> f64| {
        if total == 0.0 {
            0.0
        } else {
            metrics.iter().map(|m| field(m) * weight(m)).sum::<f64>() / total
        }
    };
    AverageMetrics {
        precision: mean(|m| m.precision),
        recall: mean(|m| m.recall),
        f1: mean(|m| m.f1),
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
