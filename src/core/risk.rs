// src/core/risk.rs

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::models::RiskSummary;

/// Targets at or above this score count as high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 7.0;

/// A target of a project together with its externally maintained risk level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectTarget {
    pub name: String,
    pub risk_level: f64,
}

impl ProjectTarget {
    pub fn new(name: impl Into<String>, risk_level: f64) -> Self {
        Self { name: name.into(), risk_level }
    }
}

/// Rolls per-target risk values into a summary. An empty slice yields all zeros.
pub fn summarize_risk(values: &[f64]) -> RiskSummary {
    if values.is_empty() {
        return RiskSummary::default();
    }

    let sum: f64 = values.iter().sum();
    let max_risk = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let high_risk_target_count = values.iter().filter(|&&v| v >= HIGH_RISK_THRESHOLD).count();

    let summary = RiskSummary {
        average_risk: round_to_hundredths(sum / values.len() as f64),
        max_risk,
        target_count: values.len(),
        high_risk_target_count,
    };
    debug!(?summary, "Computed risk summary.");
    summary
}

/// Rolls up the risk levels of every target in a project.
///
/// # Arguments
///
/// * `targets` - The project's targets with their computed risk levels.
///
/// # Returns
///
/// The same summary `summarize_risk` gives for the targets' levels.
pub fn summarize_project(targets: &[ProjectTarget]) -> RiskSummary {
    let values: Vec<f64> = targets.iter().map(|t| t.risk_level).collect();
    summarize_risk(&values)
}

/// Targets whose risk lies within the given inclusive bounds.
pub fn filter_by_risk(targets: &[ProjectTarget], min: Option<f64>, max: Option<f64>) -> Vec<&ProjectTarget> {
    targets
        .iter()
        .filter(|t| min.is_none_or(|min| t.risk_level >= min))
        .filter(|t| max.is_none_or(|max| t.risk_level <= max))
        .collect()
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
