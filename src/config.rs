//! Pipeline configuration: split and balancing settings plus the list of
//! model configurations to train and compare.
//!
//! Loaded from YAML; any omitted field falls back to the reference
//! experiment defaults below.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::splitter::SplitStrategy;
use crate::trainer::{
    DecisionTreeConfig, LogisticRegressionConfig, LogisticSolver, ModelConfig, RandomForestConfig,
};

/// One named entry in the comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seeds the split and the undersampling.
    pub seed: u64,
    pub test_ratio: f64,
    /// Undersample the training split before fitting.
    pub balance: bool,
    pub split: SplitStrategy,
    pub models: Vec<ModelSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_ratio: 0.2,
            balance: true,
            split: SplitStrategy::Shuffle,
            models: reference_models(),
        }
    }
}

impl PipelineConfig {
    /// Read a YAML pipeline file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline config at {}", path.display()))?;
        let config = Self::from_yaml_str(&text)
            .with_context(|| format!("invalid pipeline config in {}", path.display()))?;
        info!(path = %path.display(), models = config.models.len(), "loaded pipeline config");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).context("failed to parse YAML")?;
        if config.models.is_empty() {
            anyhow::bail!("pipeline config lists no models");
        }
        Ok(config)
    }
}

/// The three models compared by default.
pub fn reference_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec {
            name: "Decision Tree".to_string(),
            model: ModelConfig::DecisionTree(DecisionTreeConfig {
                max_depth: Some(3),
                min_samples_split: 6,
                min_samples_leaf: 8,
                ..Default::default()
            }),
        },
        ModelSpec {
            name: "Logistic Regression".to_string(),
            model: ModelConfig::LogisticRegression(LogisticRegressionConfig {
                solver: LogisticSolver::Lbfgs,
                max_iter: 200,
                ..Default::default()
            }),
        },
        ModelSpec {
            name: "Random Forest".to_string(),
            model: ModelConfig::RandomForest(RandomForestConfig {
                n_estimators: 10,
                max_depth: Some(12),
                min_samples_split: 2,
                seed: 42,
                ..Default::default()
            }),
        },
    ]
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::trainer::{ModelKind, Trainer};

    #[test]
    fn defaults_reproduce_reference_experiment() {
        let config = PipelineConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.test_ratio, 0.2);
        assert!(config.balance);
        let kinds: Vec<ModelKind> = config.models.iter().map(|m| m.model.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ModelKind::DecisionTree,
                ModelKind::LogisticRegression,
                ModelKind::RandomForest
            ]
        );
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = PipelineConfig::from_yaml_str("seed: 7\nsplit: stratified\n").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.split, SplitStrategy::Stratified);
        assert_eq!(config.test_ratio, 0.2);
        assert_eq!(config.models.len(), 3);
    }

    #[test]
    fn yaml_model_list_replaces_reference_models() {
        let yaml = r#"
models:
  - name: shallow tree
    model:
      kind: decision_tree
      max_depth: 2
  - name: deep tree
    model:
      kind: decision_tree
      max_depth: 8
      criterion: entropy
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[1].name, "deep tree");
    }

    #[test]
    fn empty_model_list_is_rejected() {
        assert!(PipelineConfig::from_yaml_str("models: []\n").is_err());
    }

    #[test]
    fn unknown_model_kind_is_rejected() {
        let yaml = "models:\n  - name: svm\n    model:\n      kind: svm\n";
        assert!(PipelineConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn reads_config_file() {
        let mut file = NamedTempFile::new().expect("tempfile");
        writeln!(file, "test_ratio: 0.25\nbalance: false").expect("write");
        let config = PipelineConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.test_ratio, 0.25);
        assert!(!config.balance);
    }
}
