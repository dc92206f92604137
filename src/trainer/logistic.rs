//! Multinomial logistic regression backed by `linfa-logistic`.
//!
//! Features are standardised with the training mean and standard deviation
//! before L-BFGS runs; the fitted model keeps both and applies them again at
//! prediction time.
//!
//! The backend does not report whether L-BFGS stopped on the gradient
//! tolerance or on the iteration cap. Convergence is therefore checked by
//! refitting with twice the iteration budget: a converged solve stops at the
//! same iterate both times, an unconverged one keeps moving.
//!
//! A line search can also break down part way. Runs are deterministic, so a
//! shorter budget replays a prefix of the failed run; the budget is halved
//! until a run completes and that iterate is kept as non-converged. Budget 0
//! always completes and yields the all-zero model.

use linfa::prelude::*;
use linfa_logistic::error::Error as LogisticError;
use linfa_logistic::{MultiFittedLogisticRegression, MultiLogisticRegression};
use ndarray::{Array1, Array2, Axis, Ix1};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    FitStatus, Fitted, ModelKind, TrainedModel, Trainer, check_training_input, decode_labels,
    feature_array, label_targets,
};
use crate::error::{PipelineError, Result};
use crate::utils::{Drug, FeatureVector};

/// Largest parameter change between the two fits still counted as converged.
const CONVERGENCE_DRIFT: f64 = 1e-8;

/// Optimisation routine.
///
/// linfa-logistic only ships L-BFGS, so `lbfgs` is the one accepted name;
/// `sag`, `newton-cg` and the like fail to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogisticSolver {
    /// Limited-memory BFGS.
    #[default]
    Lbfgs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionConfig {
    pub solver: LogisticSolver,
    pub max_iter: u64,
    /// L2 penalty strength.
    pub alpha: f64,
    pub gradient_tolerance: f64,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            solver: LogisticSolver::Lbfgs,
            max_iter: 100,
            alpha: 1.0,
            gradient_tolerance: 1e-4,
        }
    }
}

type Fit64 = MultiFittedLogisticRegression<f64, usize>;
type Train64 = Dataset<f64, usize, Ix1>;

impl LogisticRegressionConfig {
    fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(PipelineError::config(
                "logistic regression max_iter must be at least 1",
            ));
        }
        if !(self.alpha >= 0.0 && self.alpha.is_finite()) {
            return Err(PipelineError::config(
                "logistic regression alpha must be a finite non-negative number",
            ));
        }
        if !(self.gradient_tolerance > 0.0 && self.gradient_tolerance.is_finite()) {
            return Err(PipelineError::config(
                "logistic regression gradient_tolerance must be positive",
            ));
        }
        Ok(())
    }

    fn solve(&self, data: &Train64, max_iter: u64) -> std::result::Result<Fit64, LogisticError> {
        match self.solver {
            LogisticSolver::Lbfgs => MultiLogisticRegression::<f64>::default()
                .alpha(self.alpha)
                .gradient_tolerance(self.gradient_tolerance)
                .max_iterations(max_iter)
                .fit(data),
        }
    }

    /// Solve with the full budget, falling back to shorter budgets when the
    /// optimiser breaks down. Returns the model and the budget it ran with.
    fn solve_or_shorten(&self, data: &Train64) -> Result<(Fit64, u64)> {
        let mut budget = self.max_iter;
        loop {
            match self.solve(data, budget) {
                Ok(model) => return Ok((model, budget)),
                Err(LogisticError::ArgMinError(e)) if budget > 0 => {
                    debug!(budget, error = %e, "L-BFGS broke down; retrying with half the budget");
                    budget /= 2;
                }
                Err(e) => {
                    return Err(PipelineError::model(format!(
                        "logistic regression fit failed: {e}"
                    )));
                }
            }
        }
    }

    fn status(&self, data: &Train64, model: &Fit64, kept_iter: u64) -> FitStatus {
        if kept_iter < self.max_iter {
            warn!(
                max_iter = self.max_iter,
                kept_iter, "L-BFGS broke down; using the last completed iterate"
            );
            return FitStatus::NotConverged {
                max_iter: self.max_iter,
                kept_iter,
                drift: None,
            };
        }

        let drift = match self.solve(data, self.max_iter.saturating_mul(2)) {
            Ok(extended) => Some(
                max_abs_diff(model.params().iter(), extended.params().iter())
                    .max(max_abs_diff(model.intercept().iter(), extended.intercept().iter())),
            ),
            Err(e) => {
                debug!(error = %e, "extended L-BFGS run broke down");
                None
            }
        };

        match drift {
            Some(drift) if drift <= CONVERGENCE_DRIFT => FitStatus::Fitted,
            _ => {
                warn!(
                    max_iter = self.max_iter,
                    ?drift,
                    "logistic regression did not converge; using last iterate"
                );
                FitStatus::NotConverged {
                    max_iter: self.max_iter,
                    kept_iter,
                    drift,
                }
            }
        }
    }
}

impl Trainer for LogisticRegressionConfig {
    fn kind(&self) -> ModelKind {
        ModelKind::LogisticRegression
    }

    fn fit(&self, features: &[FeatureVector], labels: &[Drug]) -> Result<TrainedModel> {
        self.validate()?;
        check_training_input(features, labels)?;
        debug!(config = ?self, rows = features.len(), "fitting logistic regression");

        let x = feature_array(features)?;
        let scaler = Standardizer::fit(&x);
        let data = Dataset::new(scaler.transform(x), label_targets(labels));

        let (model, kept_iter) = self.solve_or_shorten(&data)?;
        let status = self.status(&data, &model, kept_iter);

        Ok(TrainedModel::new(
            self.kind(),
            status,
            Fitted::Logistic(LogisticModel { scaler, model }),
        ))
    }
}

/// Per-column centring and scaling learned from the training rows.
#[derive(Debug, Clone, PartialEq)]
struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    /// Constant columns get a scale of 1 so they map to zero.
    fn fit(x: &Array2<f64>) -> Self {
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Self { mean, scale }
    }

    fn transform(&self, mut x: Array2<f64>) -> Array2<f64> {
        x -= &self.mean;
        x /= &self.scale;
        x
    }
}

pub(crate) struct LogisticModel {
    scaler: Standardizer,
    model: Fit64,
}

impl LogisticModel {
    pub(crate) fn predict(&self, features: &[FeatureVector]) -> Result<Vec<Drug>> {
        let x = self.scaler.transform(feature_array(features)?);
        let predicted: Array1<usize> = self.model.predict(&x);
        decode_labels(predicted.iter().copied())
    }
}

fn max_abs_diff<'a>(
    a: impl Iterator<Item = &'a f64>,
    b: impl Iterator<Item = &'a f64>,
) -> f64 {
    a.zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::tests::separable;
    use crate::utils::N_FEATURES;

    fn accuracy(model: &TrainedModel, features: &[FeatureVector], labels: &[Drug]) -> f64 {
        let predicted = model.predict(features).unwrap();
        let correct = predicted.iter().zip(labels).filter(|(p, t)| p == t).count();
        correct as f64 / labels.len() as f64
    }

    #[test]
    fn learns_separable_bands() {
        let (features, labels) = separable(12);
        let config = LogisticRegressionConfig {
            max_iter: 500,
            alpha: 0.1,
            ..Default::default()
        };
        let model = config.fit(&features, &labels).unwrap();
        let acc = accuracy(&model, &features, &labels);
        assert!(acc >= 0.6, "accuracy {acc}");
    }

    #[test]
    fn raw_feature_scale_does_not_matter() {
        // Same bands, but the informative column is blown up by 1e4.
        let (features, labels) = separable(12);
        let scaled: Vec<FeatureVector> = features
            .iter()
            .map(|f| {
                let mut v = *f.values();
                v[0] *= 1e4;
                FeatureVector(v)
            })
            .collect();
        let model = LogisticRegressionConfig::default().fit(&scaled, &labels).unwrap();
        assert!(accuracy(&model, &scaled, &labels) >= 0.6);
    }

    #[test]
    fn standardizer_centres_and_scales_columns() {
        let x = Array2::from_shape_vec(
            (2, N_FEATURES),
            vec![1.0, 5.0, 0.0, 2.0, 10.0, 3.0, 5.0, 0.0, 4.0, 30.0],
        )
        .unwrap();
        let scaler = Standardizer::fit(&x);
        assert_eq!(scaler.mean.to_vec(), vec![2.0, 5.0, 0.0, 3.0, 20.0]);
        assert_eq!(scaler.scale.to_vec(), vec![1.0, 1.0, 1.0, 1.0, 10.0]);
        let z = scaler.transform(x);
        assert_eq!(z.row(0).to_vec(), vec![-1.0, 0.0, 0.0, -1.0, -1.0]);
        assert_eq!(z.row(1).to_vec(), vec![1.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn tiny_iteration_budget_is_reported_not_fatal() {
        let (features, labels) = separable(12);
        let config = LogisticRegressionConfig {
            max_iter: 1,
            ..Default::default()
        };
        let model = config.fit(&features, &labels).unwrap();
        assert!(!model.status().converged());
        match model.status() {
            FitStatus::NotConverged { max_iter, kept_iter, .. } => {
                assert_eq!(max_iter, 1);
                assert!(kept_iter <= 1);
            }
            other => panic!("expected non-convergence, got {other:?}"),
        }
        assert_eq!(model.predict(&features).unwrap().len(), labels.len());
    }

    #[test]
    fn zero_budget_solve_yields_the_zero_model() {
        let (features, labels) = separable(3);
        let data = Dataset::new(feature_array(&features).unwrap(), label_targets(&labels));
        let model = LogisticRegressionConfig::default().solve(&data, 0).unwrap();
        assert!(model.params().iter().all(|&w| w == 0.0));
        assert!(model.intercept().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn solver_names_are_closed() {
        let cfg: LogisticRegressionConfig = serde_yaml::from_str("solver: lbfgs\nmax_iter: 200\n").unwrap();
        assert_eq!(cfg.max_iter, 200);
        assert!(serde_yaml::from_str::<LogisticRegressionConfig>("solver: newton\n").is_err());
    }

    #[test]
    fn sag_is_rejected_with_the_available_solver_named() {
        let err = serde_yaml::from_str::<LogisticRegressionConfig>("solver: sag\nmax_iter: 200\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("sag"), "{err}");
        assert!(err.contains("lbfgs"), "{err}");
    }

    #[test]
    fn rejects_invalid_knobs() {
        let (features, labels) = separable(3);
        for config in [
            LogisticRegressionConfig {
                max_iter: 0,
                ..Default::default()
            },
            LogisticRegressionConfig {
                alpha: -1.0,
                ..Default::default()
            },
            LogisticRegressionConfig {
                gradient_tolerance: 0.0,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                config.fit(&features, &labels),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn max_abs_diff_takes_the_largest_gap() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.5, 2.0, 1.0];
        assert_eq!(max_abs_diff(a.iter(), b.iter()), 2.0);
    }
}
