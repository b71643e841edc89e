//! Automated patch suggestions for escalated findings.
//!
//! Builds a fixed rewrite prompt around the vulnerable snippet, asks a
//! hosted text-generation backend for a secure version, and diffs the
//! result against the original. Every failure path degrades to an
//! unsuccessful suggestion that echoes the original snippet; the analyzer
//! never sees an error from here.

use std::fmt;

use serde::{Deserialize, Serialize};
use similar::TextDiff;
use utoipa::ToSchema;

/// Default text-generation model for patch requests.
pub const DEFAULT_PATCH_MODEL: &str = "Salesforce/codet5-base";

/// A suggested rewrite of a vulnerable snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatchSuggestion {
    /// Rewritten snippet; equals the original when generation failed.
    pub patched_snippet: String,
    /// Unified diff against the original; empty when generation failed.
    pub patch_diff: String,
    /// Whether the backend produced a usable rewrite.
    pub success: bool,
    /// Human-readable outcome description.
    pub explanation: String,
    /// Identifier of the generation model used.
    pub model_used: String,
}

/// Error type for patch-generation backends.
#[derive(Debug, Clone)]
pub enum PatchError {
    /// No credential configured for the backend.
    MissingCredential,
    /// The HTTP request failed or returned a non-success status.
    Request(String),
    /// The backend returned an empty or malformed body.
    BadOutput(String),
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "patch backend credential is not set"),
            Self::Request(message) => write!(f, "patch request failed: {message}"),
            Self::BadOutput(message) => write!(f, "patch output invalid: {message}"),
        }
    }
}

impl std::error::Error for PatchError {}

/// Trait for text-generation backends used to rewrite snippets.
pub trait PatchBackend {
    /// Identifier of the model the backend serves.
    fn model(&self) -> &str;
    /// Generate text for the given prompt.
    fn generate(&self, prompt: &str) -> Result<String, PatchError>;
}

/// Mock patch backend used for local testing.
#[derive(Debug, Clone)]
pub struct MockPatchBackend {
    output: Option<String>,
}

impl MockPatchBackend {
    /// Create a mock returning the given rewrite for every prompt.
    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
        }
    }

    /// Create a mock that fails every call.
    pub fn failing() -> Self {
        Self { output: None }
    }
}

impl PatchBackend for MockPatchBackend {
    fn model(&self) -> &str {
        "mock-patch-model"
    }

    fn generate(&self, _prompt: &str) -> Result<String, PatchError> {
        self.output
            .clone()
            .ok_or_else(|| PatchError::Request("mock backend failure".to_string()))
    }
}

/// Patch backend calling a hosted text-generation API.
#[derive(Debug, Clone)]
pub struct HostedPatchClient {
    base_url: String,
    model: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HostedPatchClient {
    /// Build a hosted patch client from environment variables.
    ///
    /// A missing `VIGIL_PATCH_TOKEN` is not an error here: generation
    /// degrades per call instead.
    pub fn from_env() -> Self {
        let base_url = std::env::var("VIGIL_PATCH_API_URL")
            .unwrap_or_else(|_| "https://api-inference.huggingface.co/models".to_string());
        let model =
            std::env::var("VIGIL_PATCH_MODEL").unwrap_or_else(|_| DEFAULT_PATCH_MODEL.to_string());
        let token = std::env::var("VIGIL_PATCH_TOKEN").ok();
        Self::new(base_url, model, token)
    }

    /// Build a hosted patch client for an explicit endpoint.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            token,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl PatchBackend for HostedPatchClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String, PatchError> {
        let token = self.token.as_ref().ok_or(PatchError::MissingCredential)?;
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), self.model);
        let body = serde_json::json!({ "inputs": prompt });
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .map_err(|err| PatchError::Request(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(PatchError::Request(format!("status {status}")));
        }
        let value: serde_json::Value = response
            .json()
            .map_err(|err| PatchError::BadOutput(err.to_string()))?;
        let text = value
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|entry| entry.get("generated_text"))
            .and_then(|text| text.as_str())
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(PatchError::BadOutput("empty generated_text".to_string()));
        }
        Ok(text.to_string())
    }
}

/// Build the rewrite prompt for a vulnerable snippet.
fn rewrite_prompt(snippet: &str) -> String {
    format!(
        "Fix the security vulnerability in the following code:\n\n{snippet}\n\n\
         Return only secure updated code. Do not add explanation.\n"
    )
}

/// Compute a unified diff between the original and patched snippets.
fn unified_diff(original: &str, patched: &str, file_name: &str) -> String {
    let diff = TextDiff::from_lines(original, patched);
    diff.unified_diff()
        .header(
            &format!("{file_name} (original)"),
            &format!("{file_name} (patched)"),
        )
        .to_string()
}

/// Request a patch suggestion for a snippet.
///
/// Never fails: backend errors are folded into an unsuccessful suggestion
/// carrying the failure reason.
pub fn generate_patch(
    backend: &(dyn PatchBackend + Send + Sync),
    file_name: &str,
    snippet: &str,
) -> PatchSuggestion {
    let model_used = backend.model().to_string();
    match backend.generate(&rewrite_prompt(snippet)) {
        Ok(patched) => {
            let patch_diff = unified_diff(snippet, &patched, file_name);
            PatchSuggestion {
                patched_snippet: patched,
                patch_diff,
                success: true,
                explanation: format!("patched via {model_used}"),
                model_used,
            }
        }
        Err(err) => {
            log::warn!("patch generation failed for {file_name}: {err}");
            PatchSuggestion {
                patched_snippet: snippet.to_string(),
                patch_diff: String::new(),
                success: false,
                explanation: err.to_string(),
                model_used,
            }
        }
    }
}
