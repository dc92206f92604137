//! Classifier training: public API over the three supported model families.
//!
//! # Submodules
//! - [`tree`]: decision tree (linfa-trees CART)
//! - [`logistic`]: multinomial logistic regression (linfa-logistic, L-BFGS)
//! - [`forest`]: bootstrap-aggregated linfa-trees with majority vote
//!
//! Every family is configured through a plain serde struct, fitted through the
//! [`Trainer`] trait and yields an immutable [`TrainedModel`] that predicts
//! labels in the shared [`Drug`] label space from the shared feature schema.

pub mod forest;
pub mod logistic;
pub mod tree;

use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::utils::{Drug, EncodedDataset, FeatureVector, N_FEATURES};

pub use forest::RandomForestConfig;
pub use logistic::{LogisticRegressionConfig, LogisticSolver};
pub use tree::{Criterion, DecisionTreeConfig};

/// Model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    DecisionTree,
    LogisticRegression,
    RandomForest,
}

impl ModelKind {
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::RandomForest => "Random Forest",
        }
    }
}

/// Outcome of the optimisation behind a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitStatus {
    /// The learner finished normally.
    Fitted,
    /// The solver did not settle within `max_iter` iterations.
    ///
    /// `kept_iter` is the budget of the iterate actually used. It is below
    /// `max_iter` when the full run broke down and an earlier one was kept.
    /// `drift` is the largest parameter change seen when the budget was
    /// doubled, absent when that longer run broke down.
    NotConverged {
        max_iter: u64,
        kept_iter: u64,
        drift: Option<f64>,
    },
}

impl FitStatus {
    pub fn converged(&self) -> bool {
        matches!(self, FitStatus::Fitted)
    }
}

/// Fits one model family on encoded training data.
pub trait Trainer {
    fn kind(&self) -> ModelKind;

    fn fit(&self, features: &[FeatureVector], labels: &[Drug]) -> Result<TrainedModel>;
}

/// Configuration of any supported model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    DecisionTree(DecisionTreeConfig),
    LogisticRegression(LogisticRegressionConfig),
    RandomForest(RandomForestConfig),
}

impl ModelConfig {
    fn trainer(&self) -> &dyn Trainer {
        match self {
            ModelConfig::DecisionTree(cfg) => cfg,
            ModelConfig::LogisticRegression(cfg) => cfg,
            ModelConfig::RandomForest(cfg) => cfg,
        }
    }
}

impl Trainer for ModelConfig {
    fn kind(&self) -> ModelKind {
        self.trainer().kind()
    }

    fn fit(&self, features: &[FeatureVector], labels: &[Drug]) -> Result<TrainedModel> {
        self.trainer().fit(features, labels)
    }
}

pub(crate) enum Fitted {
    Tree(tree::TreeModel),
    Logistic(logistic::LogisticModel),
    Forest(forest::ForestModel),
}

/// A fitted classifier. Holds no reference to the data it was trained on.
pub struct TrainedModel {
    kind: ModelKind,
    status: FitStatus,
    fitted: Fitted,
}

impl TrainedModel {
    pub(crate) fn new(kind: ModelKind, status: FitStatus, fitted: Fitted) -> Self {
        Self {
            kind,
            status,
            fitted,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn status(&self) -> FitStatus {
        self.status
    }

    /// Predict one label per feature vector.
    pub fn predict(&self, features: &[FeatureVector]) -> Result<Vec<Drug>> {
        if features.is_empty() {
            return Ok(Vec::new());
        }
        match &self.fitted {
            Fitted::Tree(model) => model.predict(features),
            Fitted::Logistic(model) => model.predict(features),
            Fitted::Forest(model) => model.predict(features),
        }
    }
}

impl fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainedModel")
            .field("kind", &self.kind)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Fit `trainer` on the samples of `train`.
pub fn fit(trainer: &dyn Trainer, train: &EncodedDataset) -> Result<TrainedModel> {
    let model = trainer.fit(&train.features(), &train.labels())?;
    info!(
        model = model.kind().label(),
        rows = train.len(),
        converged = model.status().converged(),
        "fitted model"
    );
    Ok(model)
}

// ── Shared conversions ────────────────────────────────────────────────────────

pub(crate) fn check_training_input(features: &[FeatureVector], labels: &[Drug]) -> Result<()> {
    if features.is_empty() {
        return Err(PipelineError::InvalidInput(
            "cannot fit a model on zero rows".to_string(),
        ));
    }
    if features.len() != labels.len() {
        return Err(PipelineError::InvalidInput(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }
    Ok(())
}

/// Rows of `features` as an `n x N_FEATURES` matrix.
pub(crate) fn feature_array(features: &[FeatureVector]) -> Result<Array2<f64>> {
    let flat: Vec<f64> = features.iter().flat_map(|f| f.values().iter().copied()).collect();
    Array2::from_shape_vec((features.len(), N_FEATURES), flat)
        .map_err(|e| PipelineError::InvalidInput(format!("feature matrix shape: {e}")))
}

pub(crate) fn label_targets(labels: &[Drug]) -> Array1<usize> {
    labels.iter().map(Drug::index).collect()
}

pub(crate) fn decode_labels<I>(codes: I) -> Result<Vec<Drug>>
where
    I: IntoIterator,
    I::Item: TryInto<usize> + Copy + fmt::Display,
{
    codes
        .into_iter()
        .map(|code| {
            code.try_into()
                .ok()
                .and_then(Drug::from_index)
                .ok_or_else(|| PipelineError::model(format!("model predicted unknown class {code}")))
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
