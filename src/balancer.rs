use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::utils::{Drug, EncodedDataset, Split};

/// Randomly undersample every class down to the minority class count.
///
/// Only ever given the training split. Kept rows retain their relative order.
pub fn undersample(train: &EncodedDataset, seed: u64) -> Result<EncodedDataset> {
    let counts = train.class_counts();
    if let Some(empty) = Drug::ALL.iter().find(|d| counts[d.index()] == 0) {
        return Err(PipelineError::EmptyClass(*empty));
    }
    let target = counts.iter().copied().min().unwrap_or(0);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut keep = vec![false; train.len()];
    for drug in Drug::ALL {
        let positions: Vec<usize> = train
            .samples()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.label == drug)
            .map(|(pos, _)| pos)
            .collect();
        for chosen in sample(&mut rng, positions.len(), target) {
            keep[positions[chosen]] = true;
        }
        debug!(class = %drug, before = positions.len(), after = target, "undersampled class");
    }

    let balanced: Vec<_> = train
        .samples()
        .iter()
        .zip(&keep)
        .filter(|(_, kept)| **kept)
        .map(|(s, _)| *s)
        .collect();

    info!(
        before = train.len(),
        after = balanced.len(),
        per_class = target,
        "balanced training split"
    );
    Ok(EncodedDataset::new(balanced))
}

/// Balance the training side of `split`; the test side is carried over as is.
pub fn balance_split(split: &Split, seed: u64) -> Result<Split> {
    Ok(Split {
        train: undersample(&split.train, seed)?,
        test: split.test.clone(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
