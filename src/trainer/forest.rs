//! Random forest: bootstrap-aggregated linfa-trees CART members.
//!
//! Each member is grown on a seeded bootstrap resample of the training rows,
//! optionally restricted to a random subset of the feature columns, and the
//! forest predicts the majority vote. Ties go to the lowest label index.

use linfa::prelude::*;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{Cart, Growth};
use super::{
    Criterion, FitStatus, Fitted, ModelKind, TrainedModel, Trainer, check_training_input,
    decode_labels, feature_array, label_targets,
};
use crate::error::{PipelineError, Result};
use crate::utils::{Drug, FeatureVector, N_FEATURES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestConfig {
    pub n_estimators: u16,
    /// Longest root-to-leaf path of every member. Unbounded when absent.
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Feature columns drawn for each member; all of them when absent.
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seeds bootstrap resampling and feature draws.
    pub seed: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            seed: 0,
        }
    }
}

impl RandomForestConfig {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::config("random forest needs at least one tree"));
        }
        if self.max_depth == Some(0) {
            return Err(PipelineError::config("random forest max_depth must be at least 1"));
        }
        if self.min_samples_split < 2 || self.min_samples_leaf == 0 {
            return Err(PipelineError::config(
                "random forest needs min_samples_split >= 2 and min_samples_leaf >= 1",
            ));
        }
        if let Some(k) = self.max_features
            && !(1..=N_FEATURES).contains(&k)
        {
            return Err(PipelineError::config(format!(
                "random forest max_features must lie in 1..={N_FEATURES}, got {k}"
            )));
        }
        Ok(())
    }

    fn growth(&self) -> Growth {
        Growth {
            criterion: self.criterion,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }

    fn columns(&self, rng: &mut StdRng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < N_FEATURES => {
                let mut columns = index::sample(rng, N_FEATURES, k).into_vec();
                columns.sort_unstable();
                columns
            }
            _ => (0..N_FEATURES).collect(),
        }
    }
}

impl Trainer for RandomForestConfig {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit(&self, features: &[FeatureVector], labels: &[Drug]) -> Result<TrainedModel> {
        self.validate()?;
        check_training_input(features, labels)?;
        debug!(config = ?self, rows = features.len(), "fitting random forest");

        let x = feature_array(features)?;
        let y = label_targets(labels);
        let n = x.nrows();
        let growth = self.growth();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut members = Vec::with_capacity(usize::from(self.n_estimators));
        for _ in 0..self.n_estimators {
            let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let columns = self.columns(&mut rng);
            let records = x.select(Axis(0), &rows).select(Axis(1), &columns);
            let cart = growth.grow(records, y.select(Axis(0), &rows))?;
            members.push(Member { columns, cart });
        }

        Ok(TrainedModel::new(
            self.kind(),
            FitStatus::Fitted,
            Fitted::Forest(ForestModel { members }),
        ))
    }
}

struct Member {
    columns: Vec<usize>,
    cart: Cart,
}

pub(crate) struct ForestModel {
    members: Vec<Member>,
}

impl ForestModel {
    pub(crate) fn predict(&self, features: &[FeatureVector]) -> Result<Vec<Drug>> {
        let votes = self.votes(&feature_array(features)?)?;
        decode_labels(votes.iter().map(majority).collect::<Vec<usize>>())
    }

    fn votes(&self, x: &Array2<f64>) -> Result<Vec<[usize; Drug::ALL.len()]>> {
        let mut votes = vec![[0usize; Drug::ALL.len()]; x.nrows()];
        for member in &self.members {
            let codes: Array1<usize> = member.cart.predict(&x.select(Axis(1), &member.columns));
            for (tally, &code) in votes.iter_mut().zip(codes.iter()) {
                let slot = tally.get_mut(code).ok_or_else(|| {
                    PipelineError::model(format!("forest member predicted unknown class {code}"))
                })?;
                *slot += 1;
            }
        }
        Ok(votes)
    }
}

/// Index of the largest tally; the lowest index wins a tie.
fn majority(tally: &[usize; Drug::ALL.len()]) -> usize {
    let mut best = 0;
    for (code, &count) in tally.iter().enumerate() {
        if count > tally[best] {
            best = code;
        }
    }
    best
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::tests::separable;

    fn small_forest() -> RandomForestConfig {
        RandomForestConfig {
            n_estimators: 10,
            max_depth: Some(12),
            seed: 42,
            ..Default::default()
        }
    }

    #[test]
    fn majority_breaks_ties_towards_the_lowest_label() {
        assert_eq!(majority(&[0, 3, 1, 3, 0]), 1);
        assert_eq!(majority(&[0, 0, 0, 0, 2]), 4);
        assert_eq!(majority(&[0; 5]), 0);
    }

    #[test]
    fn fits_separable_data() {
        let (features, labels) = separable(12);
        let config = RandomForestConfig {
            max_features: Some(N_FEATURES),
            ..small_forest()
        };
        let model = config.fit(&features, &labels).unwrap();
        let predicted = model.predict(&features).unwrap();
        let correct = predicted.iter().zip(&labels).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / labels.len() as f64 >= 0.9, "{correct} correct");
    }

    #[test]
    fn feature_subsets_still_learn_separable_data() {
        let (features, labels) = separable(12);
        let config = RandomForestConfig {
            n_estimators: 25,
            max_features: Some(2),
            ..small_forest()
        };
        let model = config.fit(&features, &labels).unwrap();
        let predicted = model.predict(&features).unwrap();
        let correct = predicted.iter().zip(&labels).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / labels.len() as f64 >= 0.9, "{correct} correct");
    }

    #[test]
    fn depth_bound_reaches_every_member() {
        let (features, labels) = separable(10);
        let stump = RandomForestConfig {
            n_estimators: 1,
            max_depth: Some(1),
            ..small_forest()
        };
        let predicted = stump.fit(&features, &labels).unwrap().predict(&features).unwrap();
        let distinct: std::collections::BTreeSet<_> = predicted.into_iter().collect();
        assert!(distinct.len() <= 2, "{distinct:?}");
    }

    #[test]
    fn same_seed_same_predictions() {
        let (features, labels) = separable(8);
        let a = small_forest().fit(&features, &labels).unwrap();
        let b = small_forest().fit(&features, &labels).unwrap();
        assert_eq!(a.predict(&features).unwrap(), b.predict(&features).unwrap());
    }

    #[test]
    fn different_seeds_draw_different_members() {
        let (features, labels) = separable(8);
        let config = |seed| RandomForestConfig {
            n_estimators: 1,
            max_features: Some(1),
            seed,
            ..small_forest()
        };
        let columns: std::collections::BTreeSet<Vec<usize>> = (0..20)
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                config(seed).columns(&mut rng)
            })
            .collect();
        assert!(columns.len() > 1);
        assert!(config(3).fit(&features, &labels).is_ok());
    }

    #[test]
    fn rejects_invalid_knobs() {
        let (features, labels) = separable(3);
        for config in [
            RandomForestConfig {
                n_estimators: 0,
                ..small_forest()
            },
            RandomForestConfig {
                max_features: Some(0),
                ..small_forest()
            },
            RandomForestConfig {
                max_features: Some(N_FEATURES + 1),
                ..small_forest()
            },
            RandomForestConfig {
                min_samples_leaf: 0,
                ..small_forest()
            },
        ] {
            assert!(matches!(
                config.fit(&features, &labels),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
    }
}
