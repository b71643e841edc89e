//! Detector trait and the built-in detector variants.
//!
//! A detector maps a snippet of source text to a vulnerability label and a
//! confidence score. Two variants ship with vigil: a pattern heuristic and a
//! wrapper around a hosted text-classification backend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Result, VigilError};

/// Maximum number of characters forwarded to a model backend.
///
/// Keeps the input within the token budget of the classification models.
pub const MODEL_INPUT_CHARS: usize = 512;

/// Dangerous-construct substrings flagged by the heuristic detector.
const HEURISTIC_PATTERNS: &[&str] = &[
    "eval(",
    "exec(",
    "os.system(",
    "subprocess.call(",
    "sql(",
    "query(",
    "insert into",
    "delete from",
    "drop table",
    "__import__",
    "pickle.loads(",
    "yaml.load(",
    "jsonpickle",
];

/// Confidence reported by the heuristic detector when nothing matches.
const HEURISTIC_CLEAN_SCORE: f64 = 0.1;

/// One classifier's raw judgment on one code unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DetectorOutput {
    /// Identifier of the detector that produced this output.
    pub detector: String,
    /// Raw label as reported by the classifier.
    pub label: String,
    /// Confidence score in `[0, 1]`.
    pub score: f64,
    /// Matched-pattern evidence, if the detector produces any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

/// A component mapping text to a vulnerability label and confidence.
pub trait Detector {
    /// Returns the unique ID of the detector (e.g., "heuristic").
    fn id(&self) -> &str;
    /// Classify a snippet of source text.
    fn predict(&self, text: &str) -> Result<DetectorOutput>;
}

/// Pattern-based detector scanning for dangerous constructs.
#[derive(Debug, Default, Clone)]
pub struct HeuristicDetector;

impl HeuristicDetector {
    /// Create a new heuristic detector.
    pub fn new() -> Self {
        Self
    }
}

impl Detector for HeuristicDetector {
    fn id(&self) -> &str {
        "heuristic"
    }

    fn predict(&self, text: &str) -> Result<DetectorOutput> {
        let lowered = text.to_lowercase();
        let matched: Vec<String> = HEURISTIC_PATTERNS
            .iter()
            .filter(|pattern| lowered.contains(**pattern))
            .map(|pattern| pattern.to_string())
            .collect();

        if matched.is_empty() {
            return Ok(DetectorOutput {
                detector: self.id().to_string(),
                label: "NO_VULNERABILITY".to_string(),
                score: HEURISTIC_CLEAN_SCORE,
                patterns: Vec::new(),
            });
        }

        let score = (0.5 + matched.len() as f64 * 0.15).min(0.99);
        Ok(DetectorOutput {
            detector: self.id().to_string(),
            label: "VULNERABILITY".to_string(),
            score,
            patterns: matched,
        })
    }
}

/// Trait for text-classification backends serving pretrained models.
pub trait ClassifierBackend {
    /// Classify text with the given model, returning the top label and score.
    fn classify(&self, model: &str, text: &str) -> Result<(String, f64)>;
}

/// Mock classifier backend used for local testing.
#[derive(Debug, Clone)]
pub struct MockClassifierBackend {
    label: String,
    score: f64,
    fail: bool,
}

impl MockClassifierBackend {
    /// Create a mock backend returning the given label and score.
    pub fn with_response(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
            fail: false,
        }
    }

    /// Create a mock backend that fails every call.
    pub fn failing() -> Self {
        Self {
            label: String::new(),
            score: 0.0,
            fail: true,
        }
    }
}

impl ClassifierBackend for MockClassifierBackend {
    fn classify(&self, model: &str, _text: &str) -> Result<(String, f64)> {
        if self.fail {
            return Err(VigilError::Other(format!("mock backend failure: {model}")));
        }
        Ok((self.label.clone(), self.score))
    }
}

/// Classifier backend calling a hosted inference API.
#[derive(Debug, Clone)]
pub struct HostedClassifierClient {
    base_url: String,
    token: String,
    client: reqwest::blocking::Client,
}

impl HostedClassifierClient {
    /// Build a hosted classifier client from environment variables.
    ///
    /// Fails when `VIGIL_INFERENCE_TOKEN` is unset; the composition root is
    /// expected to log the failure and continue without model detectors.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("VIGIL_INFERENCE_API_URL")
            .unwrap_or_else(|_| "https://api-inference.huggingface.co/models".to_string());
        let token = std::env::var("VIGIL_INFERENCE_TOKEN")
            .map_err(|_| VigilError::Other("VIGIL_INFERENCE_TOKEN is not set".to_string()))?;
        Ok(Self::new(base_url, token))
    }

    /// Build a hosted classifier client for an explicit endpoint and token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl ClassifierBackend for HostedClassifierClient {
    fn classify(&self, model: &str, text: &str) -> Result<(String, f64)> {
        let url = format!("{}/{model}", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({ "inputs": text });
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|err| VigilError::Other(format!("inference request failed: {err}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(VigilError::Other(format!(
                "inference api error ({status}): {body}"
            )));
        }
        let value: serde_json::Value = response
            .json()
            .map_err(|err| VigilError::Other(format!("inference response decode failed: {err}")))?;
        top_classification(&value)
            .ok_or_else(|| VigilError::Other("inference response missing label".to_string()))
    }
}

/// Extract the top-ranked `(label, score)` pair from a classification payload.
///
/// Hosted text-classification endpoints return either a list of label/score
/// objects or a list nested once per input.
fn top_classification(value: &serde_json::Value) -> Option<(String, f64)> {
    let mut candidate = value.as_array()?.first()?;
    if candidate.is_array() {
        candidate = candidate.as_array()?.first()?;
    }
    let label = candidate.get("label")?.as_str()?.to_string();
    let score = candidate.get("score")?.as_f64()?;
    Some((label, score))
}

/// Detector backed by a pretrained classification model.
pub struct ModelDetector {
    id: String,
    model: String,
    backend: Arc<dyn ClassifierBackend + Send + Sync>,
}

impl ModelDetector {
    /// Wrap a model served by the given backend.
    ///
    /// The detector id is the last path segment of the model identifier.
    pub fn new(model: impl Into<String>, backend: Arc<dyn ClassifierBackend + Send + Sync>) -> Self {
        let model = model.into();
        let id = model
            .rsplit('/')
            .next()
            .unwrap_or(model.as_str())
            .to_string();
        Self { id, model, backend }
    }
}

impl Detector for ModelDetector {
    fn id(&self) -> &str {
        &self.id
    }

    fn predict(&self, text: &str) -> Result<DetectorOutput> {
        let prefix: String = text.chars().take(MODEL_INPUT_CHARS).collect();
        let (label, score) = self.backend.classify(&self.model, &prefix)?;
        Ok(DetectorOutput {
            detector: self.id.clone(),
            label,
            score,
            patterns: Vec::new(),
        })
    }
}

/// Build the detector set: the heuristic plus one detector per model id.
pub fn build_detectors(
    model_ids: &[String],
    backend: Option<Arc<dyn ClassifierBackend + Send + Sync>>,
) -> Vec<Arc<dyn Detector + Send + Sync>> {
    let mut detectors: Vec<Arc<dyn Detector + Send + Sync>> =
        vec![Arc::new(HeuristicDetector::new())];

    match backend {
        Some(backend) => {
            for model in model_ids {
                detectors.push(Arc::new(ModelDetector::new(model.clone(), backend.clone())));
            }
        }
        None if !model_ids.is_empty() => {
            log::warn!(
                "no classifier backend available; running without model detectors: {}",
                model_ids.join(", ")
            );
        }
        None => {}
    }

    detectors
}
