//! Tunable parameters of the funnel and of a batch run.
//!
//! Defaults match the production driver. A JSON file may set any subset of
//! fields; missing fields keep their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SubstitutionError, SubstitutionResult};
use crate::geography::GeoLevel;
use crate::sampling::SamplingStrategy;
use crate::types::PeriodId;

/// Lowest normalized quantity rank kept in `TOP_SELLERS`.
pub const LOWER_QUANTITY_CUTOFF: f64 = 0.5;

/// Highest normalized quantity rank kept in `TOP_SELLERS`.
pub const UPPER_QUANTITY_CUTOFF: f64 = 1.0;

/// Largest description distance at which a candidate counts as a relaunch
/// of the offer's previous item.
pub const RELAUNCH_DISTANCE_CUTOFF: f64 = 0.01;

/// Lowest inverted distance rank kept in `DISTANCE`.
pub const LOWER_DISTANCE_CUTOFF: f64 = 0.5;

/// Highest inverted distance rank kept in `DISTANCE`.
pub const UPPER_DISTANCE_CUTOFF: f64 = 1.0;

/// Base seed for the per-commodity random generators.
pub const DEFAULT_SEED: u64 = 42;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelConfig {
    pub lower_quantity_cutoff: f64,
    pub upper_quantity_cutoff: f64,
    pub relaunch_distance_cutoff: f64,
    pub lower_distance_cutoff: f64,
    pub upper_distance_cutoff: f64,
    /// Nearest neighbours scored per offer. `None` scores every candidate.
    pub neighbour_count: Option<usize>,
    pub sampling_strategy: SamplingStrategy,
    /// Regex splitting the offer name into words for similarity.
    pub similarity_delimiters: String,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            lower_quantity_cutoff: LOWER_QUANTITY_CUTOFF,
            upper_quantity_cutoff: UPPER_QUANTITY_CUTOFF,
            relaunch_distance_cutoff: RELAUNCH_DISTANCE_CUTOFF,
            lower_distance_cutoff: LOWER_DISTANCE_CUTOFF,
            upper_distance_cutoff: UPPER_DISTANCE_CUTOFF,
            neighbour_count: None,
            sampling_strategy: SamplingStrategy::TopProportional,
            similarity_delimiters: subst_text::DEFAULT_DELIMITERS.to_string(),
        }
    }
}

impl FunnelConfig {
    /// Reject cutoffs the filter engine would refuse mid-run.
    pub fn validate(&self) -> SubstitutionResult<()> {
        check_range(
            "quantity",
            self.lower_quantity_cutoff,
            self.upper_quantity_cutoff,
        )?;
        check_range(
            "distance",
            self.lower_distance_cutoff,
            self.upper_distance_cutoff,
        )?;
        if self.relaunch_distance_cutoff.is_nan() {
            return Err(SubstitutionError::Config(
                "relaunch distance cutoff is NaN".to_string(),
            ));
        }
        if self.neighbour_count == Some(0) {
            return Err(SubstitutionError::Config(
                "neighbour count must be positive".to_string(),
            ));
        }
        regex::Regex::new(&self.similarity_delimiters).map_err(|e| {
            SubstitutionError::Config(format!("similarity delimiters: {}", e))
        })?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub current_period: PeriodId,
    pub geo_level: GeoLevel,
    pub seed: u64,
    /// Collect suggestion rows for every substitution.
    pub suggest: bool,
    pub funnel: FunnelConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            current_period: 0,
            geo_level: GeoLevel::City,
            seed: DEFAULT_SEED,
            suggest: false,
            funnel: FunnelConfig::default(),
        }
    }
}

impl BatchConfig {
    pub fn from_json_str(json: &str) -> SubstitutionResult<Self> {
        let config: BatchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> SubstitutionResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> SubstitutionResult<()> {
        self.funnel.validate()
    }
}

fn check_range(what: &str, lower: f64, upper: f64) -> SubstitutionResult<()> {
    if lower.is_nan() || upper.is_nan() {
        return Err(SubstitutionError::Config(format!("{} cutoff is NaN", what)));
    }
    if upper < lower {
        return Err(SubstitutionError::Config(format!(
            "{} cutoffs inverted: upper {} < lower {}",
            what, upper, lower
        )));
    }
    Ok(())
}
