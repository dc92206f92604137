use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::utils::{Dataset, Record};

/// Descriptive statistics of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: &'static str,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator); 0 for a single value.
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

/// Value counts of one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub column: &'static str,
    pub counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub numeric: Vec<NumericSummary>,
    pub categorical: Vec<CategoricalSummary>,
    /// Pearson correlation between age and Na_to_K; absent when either is constant.
    pub age_na_to_k_correlation: Option<f64>,
}

/// Summarise a dataset column by column.
pub fn profile_dataset(dataset: &Dataset) -> Result<DatasetProfile> {
    if dataset.is_empty() {
        return Err(PipelineError::InvalidInput(
            "cannot profile an empty dataset".to_string(),
        ));
    }

    let ages: Vec<f64> = dataset.iter().map(|r| f64::from(r.age)).collect();
    let ratios: Vec<f64> = dataset.iter().map(|r| r.na_to_k).collect();

    let value_counts = |column: &'static str, get: fn(&Record) -> &str| {
        let mut counts = BTreeMap::new();
        for record in dataset.iter() {
            *counts.entry(get(record).to_string()).or_insert(0) += 1;
        }
        CategoricalSummary { column, counts }
    };

    let profile = DatasetProfile {
        rows: dataset.len(),
        numeric: vec![summarize("Age", &ages), summarize("Na_to_K", &ratios)],
        categorical: vec![
            value_counts("Sex", |r| r.sex.as_str()),
            value_counts("BP", |r| r.blood_pressure.as_str()),
            value_counts("Cholesterol", |r| r.cholesterol.as_str()),
            CategoricalSummary {
                column: "Drug",
                counts: dataset.label_counts(),
            },
        ],
        age_na_to_k_correlation: pearson(&ages, &ratios),
    };

    info!(rows = profile.rows, "profiled dataset");
    Ok(profile)
}

fn summarize(column: &'static str, values: &[f64]) -> NumericSummary {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = if n > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        0.0
    };
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    NumericSummary {
        column,
        count: n,
        mean,
        std,
        min: sorted[0],
        p25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        p75: quantile(&sorted, 0.75),
        max: sorted[n - 1],
    }
}

/// Linear interpolation between closest ranks of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
