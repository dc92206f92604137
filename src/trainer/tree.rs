use linfa::prelude::*;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    FitStatus, Fitted, ModelKind, TrainedModel, Trainer, check_training_input, decode_labels,
    feature_array, label_targets,
};
use crate::error::{PipelineError, Result};
use crate::utils::{Drug, FeatureVector, N_FEATURES};

/// Impurity measure used to score candidate splits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    #[default]
    Gini,
    Entropy,
}

impl From<Criterion> for SplitQuality {
    fn from(criterion: Criterion) -> Self {
        match criterion {
            Criterion::Gini => SplitQuality::Gini,
            Criterion::Entropy => SplitQuality::Entropy,
        }
    }
}

pub(crate) type Cart = DecisionTree<f64, usize>;

/// Growth limits of one CART tree.
///
/// Depth counts splits from the root down each path, so `max_depth: Some(3)`
/// allows three splits on every path and at most eight leaves.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Growth {
    pub criterion: Criterion,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Growth {
    pub(crate) fn grow(&self, records: Array2<f64>, targets: Array1<usize>) -> Result<Cart> {
        DecisionTree::<f64, usize>::params()
            .split_quality(self.criterion.into())
            .max_depth(self.max_depth.map(usize::from))
            .min_weight_split(self.min_samples_split as f32)
            .min_weight_leaf(self.min_samples_leaf as f32)
            .fit(&Dataset::new(records, targets))
            .map_err(|e| PipelineError::model(format!("decision tree fit failed: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionTreeConfig {
    /// Longest root-to-leaf path, in splits. Unbounded when absent.
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split. linfa-trees scans every feature at every
    /// node and has no sampling hook, so only `None` or the full schema width
    /// is accepted; narrower values are a config error.
    pub max_features: Option<usize>,
    pub criterion: Criterion,
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
        }
    }
}

impl DecisionTreeConfig {
    fn validate(&self) -> Result<()> {
        if self.max_depth == Some(0) {
            return Err(PipelineError::config("decision tree max_depth must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::config(
                "decision tree min_samples_split must be at least 2",
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(PipelineError::config(
                "decision tree min_samples_leaf must be at least 1",
            ));
        }
        if let Some(k) = self.max_features
            && k != N_FEATURES
        {
            return Err(PipelineError::config(format!(
                "decision tree max_features={k} is not supported: the CART backend examines all \
                 {N_FEATURES} features at every split"
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
}

impl Trainer for DecisionTreeConfig {
    fn kind(&self) -> ModelKind {
        ModelKind::DecisionTree
    }

    fn fit(&self, features: &[FeatureVector], labels: &[Drug]) -> Result<TrainedModel> {
        self.validate()?;
        check_training_input(features, labels)?;
        debug!(config = ?self, rows = features.len(), "fitting decision tree");

        let cart = self
            .growth()
            .grow(feature_array(features)?, label_targets(labels))?;

        Ok(TrainedModel::new(
            self.kind(),
            FitStatus::Fitted,
            Fitted::Tree(TreeModel(cart)),
        ))
    }
}

pub(crate) struct TreeModel(Cart);

impl TreeModel {
    pub(crate) fn predict(&self, features: &[FeatureVector]) -> Result<Vec<Drug>> {
        let codes: Array1<usize> = self.0.predict(&feature_array(features)?);
        decode_labels(codes.iter().copied())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
