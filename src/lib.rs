/// drug-classifier library crate.
///
/// Exposes the pipeline stages as a public API so that integration tests in
/// tests/ and the benchmarks can import them via `drug_classifier::`.
///
/// The binary entry point (src/main.rs) uses these same modules.
pub mod balancer;
pub mod cleaner;
pub mod config;
pub mod encoder;
pub mod error;
pub mod evaluator;
pub mod input;
pub mod pipeline;
pub mod profiler;
pub mod report;
pub mod splitter;
pub mod trainer;
pub mod utils;

pub use error::{PipelineError, Result};
