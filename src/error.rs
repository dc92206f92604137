//! Error types for the classification pipeline.

use crate::utils::Drug;

/// Result type alias using the pipeline's error type
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every way a pipeline stage can fail.
///
/// All variants except `Model` abort the run; `Model` aborts only the model
/// that produced it.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Input structure does not match the expected columns or types
    #[error("schema error: {0}")]
    Schema(String),

    /// A cell was empty
    #[error("missing value in column `{column}` at data row {row}")]
    MissingValue { row: usize, column: String },

    /// A drug label outside the mapping table
    #[error("unknown drug label `{0}`")]
    UnknownLabel(String),

    /// Encoding met a category value that was not seen while fitting
    #[error("unseen category `{value}` in column `{column}`")]
    UnseenCategory { column: String, value: String },

    /// A class has no examples in the training split
    #[error("class {0} has no training examples")]
    EmptyClass(Drug),

    /// Nothing to evaluate
    #[error("cannot evaluate an empty label set")]
    EmptyLabelSet,

    /// Pipeline or model configuration is unusable
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// Caller passed inconsistent inputs
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The ML backend failed to fit or predict
    #[error("model error: {0}")]
    Model(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }
}
