//! Ensemble voting over detector outputs.
//!
//! Combines the judgments of all active detectors into a single verdict with
//! a severity tier. Labels default to vulnerable: for a triage tool a false
//! positive is cheaper than a false negative.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::chunker::CodeUnit;
use crate::detector::{Detector, DetectorOutput};

/// Label substrings that mark a classifier output as clean.
const CLEAN_SUBSTRINGS: &[&str] = &["no_vul", "no-vul", "clean", "safe", "non-vulnerable"];

/// Labels that are clean only on exact match.
const CLEAN_EXACT: &[&str] = &["0", "not-vulnerable"];

/// Severity tier derived from the ensemble score.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No actionable signal.
    Info,
    /// Weak signal.
    Low,
    /// Moderate signal.
    Medium,
    /// Strong signal; eligible for patch generation.
    High,
    /// Strongest signal; eligible for patch generation.
    Critical,
}

impl Severity {
    /// Stable lowercase label for reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Map an ensemble score in `[0, 1]` to a severity tier.
    pub fn from_score(score: f64) -> Self {
        if score < 0.2 {
            Severity::Info
        } else if score < 0.4 {
            Severity::Low
        } else if score < 0.6 {
            Severity::Medium
        } else if score < 0.8 {
            Severity::High
        } else {
            Severity::Critical
        }
    }

    /// Whether findings at this tier are escalated to the patch generator.
    pub fn warrants_patch(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

/// Combined verdict of all active detectors on one code unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether any detector voted vulnerable.
    pub vulnerable: bool,
    /// Combined confidence in `[0, 1]`; 0.0 when not vulnerable.
    pub ensemble_score: f64,
    /// Severity tier derived from the ensemble score.
    pub severity: Severity,
    /// Number of detectors that voted vulnerable.
    pub votes_vulnerable: usize,
    /// Number of detectors that produced an output.
    pub total_detectors: usize,
    /// Raw outputs in detector order.
    pub detector_outputs: Vec<DetectorOutput>,
}

impl Verdict {
    fn clean(detector_outputs: Vec<DetectorOutput>) -> Self {
        Self {
            vulnerable: false,
            ensemble_score: 0.0,
            severity: Severity::Info,
            votes_vulnerable: 0,
            total_detectors: detector_outputs.len(),
            detector_outputs,
        }
    }
}

/// Normalize a raw classifier label into a binary clean/vulnerable signal.
///
/// Returns `true` when the label is recognized as clean; anything
/// unrecognized counts as vulnerable.
pub fn is_clean_label(label: &str) -> bool {
    let lowered = label.to_lowercase();
    CLEAN_SUBSTRINGS
        .iter()
        .any(|token| lowered.contains(token))
        || CLEAN_EXACT.iter().any(|token| *token == lowered)
}

/// Run every detector on the unit and combine the outputs into a verdict.
///
/// Never fails: a detector error is logged and excluded, shrinking the
/// denominator, so a degraded detector set still produces a verdict.
pub fn vote(unit: &CodeUnit, detectors: &[Arc<dyn Detector + Send + Sync>]) -> Verdict {
    let mut outputs = Vec::with_capacity(detectors.len());
    for detector in detectors {
        match detector.predict(&unit.text) {
            Ok(output) => outputs.push(output),
            Err(err) => {
                log::warn!("detector {} failed, excluding vote: {err}", detector.id());
            }
        }
    }

    let vulnerable_scores: Vec<f64> = outputs
        .iter()
        .filter(|output| !is_clean_label(&output.label))
        .map(|output| output.score)
        .collect();
    let votes_vulnerable = vulnerable_scores.len();

    if votes_vulnerable == 0 {
        return Verdict::clean(outputs);
    }

    let total_detectors = outputs.len();
    // Average confidence damped by the vote ratio: a lone vulnerable vote out
    // of many detectors stays low even at high individual confidence.
    let average = vulnerable_scores.iter().sum::<f64>() / votes_vulnerable as f64;
    let vote_ratio = votes_vulnerable as f64 / total_detectors as f64;
    let ensemble_score = average * vote_ratio;

    Verdict {
        vulnerable: true,
        ensemble_score,
        severity: Severity::from_score(ensemble_score),
        votes_vulnerable,
        total_detectors,
        detector_outputs: outputs,
    }
}
