use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Column names of the input file, in file order.
pub const INPUT_COLUMNS: [&str; 6] = ["Age", "Sex", "BP", "Cholesterol", "Na_to_K", "Drug"];

/// Feature columns of an encoded vector, in vector order.
pub const FEATURE_NAMES: [&str; 5] = ["age", "sex", "blood_pressure", "cholesterol", "na_to_k"];

pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// Canonical drug label space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Drug {
    A,
    B,
    C,
    X,
    Y,
}

impl Drug {
    /// Label order used by confusion matrices and reports.
    pub const ALL: [Drug; 5] = [Drug::A, Drug::B, Drug::C, Drug::X, Drug::Y];

    pub fn as_str(&self) -> &'static str {
        match self {
            Drug::A => "A",
            Drug::B => "B",
            Drug::C => "C",
            Drug::X => "X",
            Drug::Y => "Y",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Drug> {
        Drug::ALL.get(index).copied()
    }
}

impl fmt::Display for Drug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Drug {
    type Err = PipelineError;

    /// Parses canonical labels only; raw file labels go through the cleaner.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Drug::A),
            "B" => Ok(Drug::B),
            "C" => Ok(Drug::C),
            "X" => Ok(Drug::X),
            "Y" => Ok(Drug::Y),
            other => Err(PipelineError::UnknownLabel(other.to_string())),
        }
    }
}

/// One patient observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub age: u32,
    pub sex: String,
    pub blood_pressure: String,
    pub cholesterol: String,
    pub na_to_k: f64,
    pub drug: String,
}

/// Ordered, read-only collection of records sharing the input schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Raw `drug` column value counts.
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.drug.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Numeric projection of a record, laid out as [`FEATURE_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; N_FEATURES]);

impl FeatureVector {
    pub fn values(&self) -> &[f64; N_FEATURES] {
        &self.0
    }
}

/// An encoded record together with its label and its row in the source dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub row: usize,
    pub features: FeatureVector,
    pub label: Drug,
}

/// Encoded samples ready for splitting and training.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EncodedDataset {
    samples: Vec<Sample>,
}

impl EncodedDataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn features(&self) -> Vec<FeatureVector> {
        self.samples.iter().map(|s| s.features).collect()
    }

    pub fn labels(&self) -> Vec<Drug> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Source rows of the samples, in sample order.
    pub fn rows(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.row).collect()
    }

    /// Per-class counts over the full label space, zero counts included.
    pub fn class_counts(&self) -> [usize; 5] {
        let mut counts = [0usize; 5];
        for sample in &self.samples {
            counts[sample.label.index()] += 1;
        }
        counts
    }
}

/// Train/test partition of an encoded dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: EncodedDataset,
    pub test: EncodedDataset,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drug_index_round_trips_through_label_order() {
        for (i, drug) in Drug::ALL.iter().enumerate() {
            assert_eq!(drug.index(), i);
            assert_eq!(Drug::from_index(i), Some(*drug));
        }
        assert_eq!(Drug::from_index(5), None);
    }

    #[test]
    fn drug_from_str_rejects_raw_labels() {
        assert_eq!("Y".parse::<Drug>().unwrap(), Drug::Y);
        let err = "DrugY".parse::<Drug>().unwrap_err();
        assert!(matches!(err, PipelineError::UnknownLabel(ref l) if l == "DrugY"));
    }

    #[test]
    fn class_counts_include_absent_classes() {
        let sample = |row, label| Sample {
            row,
            features: FeatureVector([0.0; N_FEATURES]),
            label,
        };
        let data = EncodedDataset::new(vec![
            sample(0, Drug::Y),
            sample(1, Drug::Y),
            sample(2, Drug::A),
        ]);
        assert_eq!(data.class_counts(), [1, 0, 0, 0, 2]);
        assert_eq!(data.rows(), vec![0, 1, 2]);
    }
}
