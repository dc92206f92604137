//! Precision and label normalisation for freshly loaded datasets.
//!
//! `Na_to_K` is rounded to two decimals with round-half-to-even applied to the
//! scaled value, the same `rint(x * 100) / 100` rule numeric array libraries use.
//! Raw drug labels are mapped onto the canonical label space.

use tracing::{debug, info};

use crate::error::Result;
use crate::utils::{Dataset, Drug, Record};

/// Raw label → canonical label.
const DRUG_LABELS: [(&str, Drug); 5] = [
    ("DrugY", Drug::Y),
    ("drugC", Drug::C),
    ("drugX", Drug::X),
    ("drugA", Drug::A),
    ("drugB", Drug::B),
];

/// Round to two decimal places, ties to even.
pub fn round_na_to_k(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Map a raw or already canonical drug label onto the label space.
pub fn canonical_drug(label: &str) -> Result<Drug> {
    DRUG_LABELS
        .iter()
        .find(|(raw, _)| *raw == label)
        .map(|(_, drug)| *drug)
        .map_or_else(|| label.parse::<Drug>(), Ok)
}

/// Return a cleaned copy of `dataset`; the input is left untouched.
pub fn clean(dataset: &Dataset) -> Result<Dataset> {
    let records = dataset
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let drug = canonical_drug(&record.drug).inspect_err(|_| {
                debug!(row = row + 1, label = %record.drug, "unmapped drug label");
            })?;
            Ok(Record {
                na_to_k: round_na_to_k(record.na_to_k),
                drug: drug.as_str().to_string(),
                ..record.clone()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(rows = records.len(), "cleaned dataset");
    Ok(Dataset::new(records))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::error::PipelineError;

    fn record(na_to_k: f64, drug: &str) -> Record {
        Record {
            age: 40,
            sex: "F".into(),
            blood_pressure: "HIGH".into(),
            cholesterol: "NORMAL".into(),
            na_to_k,
            drug: drug.into(),
        }
    }

    #[test]
    fn maps_every_raw_label() {
        let expected = [
            ("DrugY", Drug::Y),
            ("drugC", Drug::C),
            ("drugX", Drug::X),
            ("drugA", Drug::A),
            ("drugB", Drug::B),
        ];
        for (raw, drug) in expected {
            assert_eq!(canonical_drug(raw).unwrap(), drug);
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = canonical_drug("drugZ").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownLabel(ref l) if l == "drugZ"));
        // Labels are case sensitive.
        assert!(canonical_drug("drugy").is_err());
    }

    #[test]
    fn rounding_uses_ties_to_even() {
        // 15.125 and 15.375 are exact in binary, so these are true ties.
        assert_eq!(round_na_to_k(15.125), 15.12);
        assert_eq!(round_na_to_k(15.375), 15.38);
        assert_eq!(round_na_to_k(7.798), 7.8);
    }

    #[test]
    fn clean_returns_new_dataset_and_keeps_input() {
        let raw = Dataset::new(vec![record(25.355, "DrugY"), record(13.0934, "drugC")]);
        let snapshot = raw.clone();
        let cleaned = clean(&raw).unwrap();

        assert_eq!(raw, snapshot);
        assert_eq!(cleaned.records()[0].drug, "Y");
        assert_eq!(cleaned.records()[1].drug, "C");
        assert_eq!(cleaned.records()[1].na_to_k, 13.09);
        assert_eq!(cleaned.records()[0].age, 40);
    }

    #[test]
    fn clean_fails_on_unmapped_label() {
        let raw = Dataset::new(vec![record(10.0, "DrugY"), record(10.0, "aspirin")]);
        assert!(matches!(clean(&raw), Err(PipelineError::UnknownLabel(_))));
    }

    proptest! {
        #[test]
        fn rounding_is_idempotent(x in 0.0f64..100.0) {
            let once = round_na_to_k(x);
            prop_assert_eq!(round_na_to_k(once), once);
        }

        #[test]
        fn drug_cleaning_is_idempotent(idx in 0usize..10) {
            let labels = ["DrugY", "drugC", "drugX", "drugA", "drugB", "A", "B", "C", "X", "Y"];
            let data = Dataset::new(vec![record(12.5, labels[idx])]);
            let once = clean(&data).unwrap();
            let twice = clean(&once).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
