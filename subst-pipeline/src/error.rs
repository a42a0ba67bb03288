//! Error types for the substitution pipeline.
//!
//! Every failure mode has a named variant. Degenerate scores are not errors:
//! they fall back to zero scores or uniform sampling instead.

use thiserror::Error;

use crate::sampling::SamplingStrategy;
use crate::types::SetName;

/// Failures of filter-set operations on a candidate pool.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Filter set not found: {0}")]
    UnknownSet(SetName),
}

/// Failures of the weighted sampler. The funnel always recovers from these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplingError {
    #[error("The population is empty (strategy: {strategy}, inner set: {inner}, outer set: {outer})")]
    EmptyPopulation {
        strategy: SamplingStrategy,
        inner: usize,
        outer: usize,
    },

    #[error("The sub-population is empty (strategy: {strategy}, inner set: {inner}, outer set: {outer})")]
    EmptySubpopulation {
        strategy: SamplingStrategy,
        inner: usize,
        outer: usize,
    },
}

#[derive(Debug, Error)]
pub enum SubstitutionError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Parse error in {source_name} at line {line}: {reason}")]
    Parse {
        source_name: String,
        line: usize,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations.
pub type SubstitutionResult<T> = Result<T, SubstitutionError>;
