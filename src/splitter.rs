use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::utils::{Drug, EncodedDataset, Sample, Split};

/// How test rows are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// One seeded shuffle over all rows; class proportions are not preserved.
    #[default]
    Shuffle,
    /// Seeded shuffle per class; each class contributes its share of test rows.
    Stratified,
}

/// Partition `data` into train and test sets.
///
/// With [`SplitStrategy::Shuffle`] the test set holds `ceil(n * test_ratio)`
/// rows taken from the front of a seeded permutation and the train set the
/// remainder. [`SplitStrategy::Stratified`] rounds each class's share
/// separately, so small inputs can still come out with an empty side; both
/// strategies reject that with [`PipelineError::InvalidConfig`]. The same seed
/// and input always give the same split.
pub fn train_test_split(
    data: &EncodedDataset,
    test_ratio: f64,
    seed: u64,
    strategy: SplitStrategy,
) -> Result<Split> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(PipelineError::config(format!(
            "test ratio must lie strictly between 0 and 1, got {test_ratio}"
        )));
    }

    let n = data.len();
    let n_test = (n as f64 * test_ratio).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::config(format!(
            "cannot split {n} rows with test ratio {test_ratio} into non-empty train and test sets"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let (train, test) = match strategy {
        SplitStrategy::Shuffle => shuffle_split(data.samples(), n_test, &mut rng),
        SplitStrategy::Stratified => stratified_split(data.samples(), test_ratio, &mut rng),
    };
    if train.is_empty() || test.is_empty() {
        return Err(PipelineError::config(format!(
            "{strategy:?} split of {n} rows with test ratio {test_ratio} leaves an empty {} set",
            if test.is_empty() { "test" } else { "train" }
        )));
    }

    info!(
        ?strategy,
        seed,
        train = train.len(),
        test = test.len(),
        "split dataset"
    );
    Ok(Split {
        train: EncodedDataset::new(train),
        test: EncodedDataset::new(test),
    })
}

fn shuffle_split(samples: &[Sample], n_test: usize, rng: &mut StdRng) -> (Vec<Sample>, Vec<Sample>) {
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.shuffle(rng);
    let (test_idx, train_idx) = order.split_at(n_test);
    let pick = |idx: &[usize]| idx.iter().map(|&i| samples[i]).collect::<Vec<_>>();
    (pick(train_idx), pick(test_idx))
}

fn stratified_split(
    samples: &[Sample],
    test_ratio: f64,
    rng: &mut StdRng,
) -> (Vec<Sample>, Vec<Sample>) {
    let mut train = Vec::new();
    let mut test = Vec::new();
    for drug in Drug::ALL {
        let mut members: Vec<Sample> = samples.iter().filter(|s| s.label == drug).copied().collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(rng);
        let mut n_test = (members.len() as f64 * test_ratio).round() as usize;
        // Keep at least one training row for every class that has two or more.
        if members.len() >= 2 {
            n_test = n_test.min(members.len() - 1);
        }
        let rest = members.split_off(n_test);
        test.extend(members);
        train.extend(rest);
    }
    (train, test)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
