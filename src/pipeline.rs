//! End-to-end run: clean, encode, split, balance, then fit and score every
//! configured model on the same held-out split.

use serde::Serialize;
use tracing::{info, warn};

use crate::balancer;
use crate::cleaner;
use crate::config::PipelineConfig;
use crate::encoder::{self, FeatureEncoder};
use crate::error::Result;
use crate::evaluator::{self, EvaluationReport};
use crate::splitter;
use crate::trainer::{self, FitStatus, ModelKind, Trainer};
use crate::utils::{Dataset, Drug, FeatureVector, Split};

/// Row counts at each stage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub dataset: usize,
    pub train: usize,
    /// Rows actually used for fitting; equals `train` when balancing is off.
    pub fitted_on: usize,
    pub test: usize,
}

/// Result of one configured model.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ModelOutcome {
    Evaluated {
        fit: FitStatus,
        report: EvaluationReport,
    },
    /// Fitting or prediction failed; the other models still ran.
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelResult {
    pub name: String,
    pub kind: ModelKind,
    pub outcome: ModelOutcome,
}

impl ModelResult {
    pub fn report(&self) -> Option<&EvaluationReport> {
        match &self.outcome {
            ModelOutcome::Evaluated { report, .. } => Some(report),
            ModelOutcome::Failed { .. } => None,
        }
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.report().map(|r| r.accuracy)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub counts: StageCounts,
    pub encoder: FeatureEncoder,
    pub models: Vec<ModelResult>,
}

impl PipelineOutcome {
    /// Evaluated models, best accuracy first. Ties keep configuration order.
    pub fn ranking(&self) -> Vec<(&ModelResult, f64)> {
        let mut ranked: Vec<(&ModelResult, f64)> = self
            .models
            .iter()
            .filter_map(|m| m.accuracy().map(|acc| (m, acc)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn model(&self, name: &str) -> Option<&ModelResult> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// Prepare the train/test split from a raw dataset.
///
/// Any error here is fatal for the whole run.
pub fn prepare(dataset: &Dataset, config: &PipelineConfig) -> Result<(FeatureEncoder, Split, Split)> {
    let cleaned = cleaner::clean(dataset)?;
    let (encoder, encoded) = encoder::fit_transform(&cleaned)?;
    let split = splitter::train_test_split(&encoded, config.test_ratio, config.seed, config.split)?;
    let fitting = if config.balance {
        balancer::balance_split(&split, config.seed)?
    } else {
        split.clone()
    };
    Ok((encoder, split, fitting))
}

/// Run every configured model against one shared split.
pub fn run_pipeline(dataset: &Dataset, config: &PipelineConfig) -> Result<PipelineOutcome> {
    info!(
        rows = dataset.len(),
        models = config.models.len(),
        seed = config.seed,
        test_ratio = config.test_ratio,
        balance = config.balance,
        "starting pipeline"
    );

    let (encoder, split, fitting) = prepare(dataset, config)?;
    let counts = StageCounts {
        dataset: dataset.len(),
        train: split.train.len(),
        fitted_on: fitting.train.len(),
        test: fitting.test.len(),
    };
    info!(?counts, "data stages complete");

    let test_features = fitting.test.features();
    let test_labels = fitting.test.labels();

    let mut models = Vec::with_capacity(config.models.len());
    for spec in &config.models {
        let kind = spec.model.kind();
        let outcome = match fit_and_score(&spec.model, &fitting, &test_features, &test_labels) {
            Ok((fit, report)) => {
                info!(model = %spec.name, accuracy = report.accuracy, "model evaluated");
                ModelOutcome::Evaluated { fit, report }
            }
            Err(e) => {
                warn!(model = %spec.name, error = %e, "model failed; continuing with the rest");
                ModelOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        models.push(ModelResult {
            name: spec.name.clone(),
            kind,
            outcome,
        });
    }

    Ok(PipelineOutcome {
        counts,
        encoder,
        models,
    })
}

fn fit_and_score(
    model: &dyn Trainer,
    fitting: &Split,
    test_features: &[FeatureVector],
    test_labels: &[Drug],
) -> Result<(FitStatus, EvaluationReport)> {
    let trained = trainer::fit(model, &fitting.train)?;
    let predicted = trained.predict(test_features)?;
    let report = evaluator::evaluate(test_labels, &predicted)?;
    Ok((trained.status(), report))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
