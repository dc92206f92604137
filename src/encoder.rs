//! Categorical feature encoding.
//!
//! Codes are assigned per column in sorted order of the distinct observed
//! values, so a fitted encoder depends only on the set of categories seen and
//! never on row order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::utils::{Dataset, Drug, EncodedDataset, FeatureVector, Record, Sample};

/// Categorical feature columns, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalColumn {
    Sex,
    BloodPressure,
    Cholesterol,
}

impl CategoricalColumn {
    pub const ALL: [CategoricalColumn; 3] = [
        CategoricalColumn::Sex,
        CategoricalColumn::BloodPressure,
        CategoricalColumn::Cholesterol,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CategoricalColumn::Sex => "sex",
            CategoricalColumn::BloodPressure => "blood_pressure",
            CategoricalColumn::Cholesterol => "cholesterol",
        }
    }

    pub fn value<'a>(&self, record: &'a Record) -> &'a str {
        match self {
            CategoricalColumn::Sex => &record.sex,
            CategoricalColumn::BloodPressure => &record.blood_pressure,
            CategoricalColumn::Cholesterol => &record.cholesterol,
        }
    }
}

/// Fitted category → code mapping for every categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    vocabularies: BTreeMap<CategoricalColumn, BTreeMap<String, u32>>,
}

impl FeatureEncoder {
    /// Learn the code assignment from every record of `dataset`.
    pub fn fit(dataset: &Dataset) -> Self {
        let vocabularies = CategoricalColumn::ALL
            .iter()
            .map(|column| {
                let distinct: BTreeSet<&str> = dataset.iter().map(|r| column.value(r)).collect();
                let codes = distinct
                    .into_iter()
                    .enumerate()
                    .map(|(code, value)| (value.to_string(), code as u32))
                    .collect::<BTreeMap<_, _>>();
                debug!(column = column.name(), ?codes, "fitted column vocabulary");
                (*column, codes)
            })
            .collect();
        Self { vocabularies }
    }

    /// Code assigned to `value` in `column`, if it was seen while fitting.
    pub fn code(&self, column: CategoricalColumn, value: &str) -> Option<u32> {
        self.vocabularies.get(&column)?.get(value).copied()
    }

    /// Fitted mapping of one column.
    pub fn vocabulary(&self, column: CategoricalColumn) -> Option<&BTreeMap<String, u32>> {
        self.vocabularies.get(&column)
    }

    /// Encode one record's features; the `drug` column is ignored.
    pub fn encode_record(&self, record: &Record) -> Result<FeatureVector> {
        let encode = |column: CategoricalColumn| -> Result<f64> {
            let value = column.value(record);
            self.code(column, value)
                .map(f64::from)
                .ok_or_else(|| PipelineError::UnseenCategory {
                    column: column.name().to_string(),
                    value: value.to_string(),
                })
        };

        Ok(FeatureVector([
            f64::from(record.age),
            encode(CategoricalColumn::Sex)?,
            encode(CategoricalColumn::BloodPressure)?,
            encode(CategoricalColumn::Cholesterol)?,
            record.na_to_k,
        ]))
    }

    /// Encode features and labels of a cleaned dataset.
    pub fn transform(&self, dataset: &Dataset) -> Result<EncodedDataset> {
        let samples = dataset
            .iter()
            .enumerate()
            .map(|(row, record)| {
                let label = record.drug.parse::<Drug>().map_err(|_| {
                    PipelineError::UnknownLabel(format!(
                        "{} (row {}; labels must be cleaned before encoding)",
                        record.drug,
                        row + 1
                    ))
                })?;
                Ok(Sample {
                    row,
                    features: self.encode_record(record)?,
                    label,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(rows = samples.len(), "encoded dataset");
        Ok(EncodedDataset::new(samples))
    }
}

/// Fit on `dataset` and encode it in one step.
pub fn fit_transform(dataset: &Dataset) -> Result<(FeatureEncoder, EncodedDataset)> {
    let encoder = FeatureEncoder::fit(dataset);
    let encoded = encoder.transform(dataset)?;
    Ok((encoder, encoded))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
