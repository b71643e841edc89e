//! Best-effort severity intelligence from a public vulnerability database.
//!
//! Maps detector labels to search keywords and fetches the best available
//! CVSS metric for the first matching record. Lookups never block a scan:
//! every failure degrades to an absent record at the call site.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Known vulnerability-class labels and their database search keywords.
const LABEL_KEYWORDS: &[(&str, &str)] = &[
    ("sql_injection", "sql injection"),
    ("xss", "cross-site scripting"),
    ("path_traversal", "path traversal"),
    ("rce", "remote code execution"),
    ("command_injection", "command injection"),
    ("hardcoded_secret", "hard coded credentials"),
];

/// CVSS metric keys in preference order, newest standard first.
const CVSS_METRIC_KEYS: &[&str] = &["cvssMetricV31", "cvssMetricV30", "cvssMetricV2"];

/// Externally sourced severity data for a vulnerability class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SeverityRecord {
    /// CVSS base score, 0-10.
    pub base_score: f64,
    /// Severity label as reported by the database.
    pub severity: String,
    /// CVSS vector string.
    pub vector: String,
    /// Identifier of the database entry the metric came from.
    pub source_cve: String,
}

/// Error type for severity lookups.
///
/// Distinguishes transport failures from decode failures; "no results" is
/// not an error and surfaces as `Ok(None)`.
#[derive(Debug, Clone)]
pub enum IntelError {
    /// The HTTP request failed or returned a non-success status.
    Request(String),
    /// The response body could not be interpreted.
    Decode(String),
}

impl fmt::Display for IntelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(message) => write!(f, "intel request failed: {message}"),
            Self::Decode(message) => write!(f, "intel response invalid: {message}"),
        }
    }
}

impl std::error::Error for IntelError {}

/// Trait for severity-database lookups.
pub trait SeverityIntel {
    /// Look up the first record matching the keyword.
    fn lookup(&self, keyword: &str) -> Result<Option<SeverityRecord>, IntelError>;
}

/// Map a detector label to a database search keyword.
///
/// Unknown labels fall back to the label itself with underscores replaced
/// by spaces.
pub fn label_to_keyword(label: &str) -> String {
    let lowered = label.to_lowercase();
    for (token, keyword) in LABEL_KEYWORDS {
        if lowered.contains(token) {
            return keyword.to_string();
        }
    }
    label.replace('_', " ")
}

/// Mock severity intel used for local testing.
#[derive(Debug, Default, Clone)]
pub struct MockSeverityIntel {
    record: Option<SeverityRecord>,
}

impl MockSeverityIntel {
    /// Create a mock that finds nothing.
    pub fn empty() -> Self {
        Self { record: None }
    }

    /// Create a mock returning the given record for every keyword.
    pub fn with_record(record: SeverityRecord) -> Self {
        Self {
            record: Some(record),
        }
    }
}

impl SeverityIntel for MockSeverityIntel {
    fn lookup(&self, _keyword: &str) -> Result<Option<SeverityRecord>, IntelError> {
        Ok(self.record.clone())
    }
}

/// NVD-style severity database client.
#[derive(Debug, Clone)]
pub struct NvdClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl NvdClient {
    /// Build an NVD client from environment variables.
    pub fn from_env() -> Self {
        let base_url = std::env::var("VIGIL_NVD_API_URL")
            .unwrap_or_else(|_| "https://services.nvd.nist.gov/rest/json/cves/2.0".to_string());
        let api_key = std::env::var("NVD_API_KEY").ok();
        Self::new(base_url, api_key)
    }

    /// Build an NVD client for an explicit endpoint.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            api_key,
            client,
        }
    }
}

impl SeverityIntel for NvdClient {
    fn lookup(&self, keyword: &str) -> Result<Option<SeverityRecord>, IntelError> {
        let mut request = self
            .client
            .get(&self.base_url)
            .query(&[("keywordSearch", keyword), ("resultsPerPage", "1")]);
        if let Some(api_key) = &self.api_key {
            request = request.header("apiKey", api_key);
        }

        let response = request
            .send()
            .map_err(|err| IntelError::Request(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(IntelError::Request(format!("status {status}")));
        }
        let value: serde_json::Value = response
            .json()
            .map_err(|err| IntelError::Decode(err.to_string()))?;

        Ok(extract_record(&value))
    }
}

/// Pull the best available CVSS metric out of an NVD response.
fn extract_record(value: &serde_json::Value) -> Option<SeverityRecord> {
    let cve = value
        .get("vulnerabilities")?
        .as_array()?
        .first()?
        .get("cve")?;
    let source_cve = cve
        .get("id")
        .and_then(|id| id.as_str())
        .unwrap_or("UNKNOWN")
        .to_string();
    let metrics = cve.get("metrics")?;

    for key in CVSS_METRIC_KEYS {
        let Some(data) = metrics
            .get(key)
            .and_then(|arr| arr.as_array())
            .and_then(|arr| arr.first())
            .and_then(|entry| entry.get("cvssData"))
        else {
            continue;
        };
        let Some(base_score) = data.get("baseScore").and_then(|score| score.as_f64()) else {
            continue;
        };
        let severity = data
            .get("baseSeverity")
            .and_then(|sev| sev.as_str())
            .unwrap_or("UNKNOWN")
            .to_string();
        let vector = data
            .get("vectorString")
            .and_then(|vector| vector.as_str())
            .unwrap_or_default()
            .to_string();
        return Some(SeverityRecord {
            base_score,
            severity,
            vector,
            source_cve,
        });
    }

    None
}
