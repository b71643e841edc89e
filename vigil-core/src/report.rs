//! Report payloads and rendering for scan output.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::analyzer::Finding;

/// Severity tiers in report display order, most severe first.
const SEVERITY_ORDER: &[&str] = &["critical", "high", "medium", "low", "info"];

/// Aggregated result of one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScanReport {
    /// The target as given by the caller (path or repository URL).
    pub target: String,
    /// Number of scannable files discovered.
    pub file_count: usize,
    /// Number of files with at least one finding.
    pub finding_file_count: usize,
    /// Histogram of finding severities.
    pub severity_counts: BTreeMap<String, usize>,
    /// Findings grouped by file path; clean files are absent.
    pub results: BTreeMap<String, Vec<Finding>>,
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

/// Render a scan report as Markdown.
pub fn render_markdown(report: &ScanReport) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Vigil Scan Report\n");
    let _ = writeln!(output, "- Target: `{}`", report.target);
    let _ = writeln!(output, "- Files scanned: {}", report.file_count);
    let _ = writeln!(output, "- Files with findings: {}\n", report.finding_file_count);

    append_severity_summary(&mut output, &report.severity_counts);

    for (path, findings) in &report.results {
        let _ = writeln!(output, "## {path}\n");
        for finding in findings {
            let _ = writeln!(
                output,
                "### Lines {}-{}: {} (score {:.2})",
                finding.start_line,
                finding.end_line,
                finding.severity.as_str(),
                finding.ensemble_score
            );
            let _ = writeln!(
                output,
                "- Votes: {}/{}",
                finding.votes_vulnerable, finding.total_detectors
            );
            if let Some(cve) = &finding.cvss_cve {
                let score = finding.cvss_score.unwrap_or_default();
                let _ = writeln!(output, "- CVSS: {score} ({cve})");
            }
            if let Some(patch) = &finding.patch {
                if patch.success {
                    let _ = writeln!(output, "- Patch suggested via {}", patch.model_used);
                } else {
                    let _ = writeln!(output, "- Patch unavailable: {}", patch.explanation);
                }
            }
            let _ = writeln!(output, "\n```text\n{}\n```\n", finding.snippet);
        }
    }

    output
}

/// Format the severity histogram in display order, most severe first.
pub fn format_severity_counts(counts: &BTreeMap<String, usize>) -> Vec<(String, usize)> {
    let mut items = Vec::new();
    for severity in SEVERITY_ORDER {
        if let Some(count) = counts.get(*severity) {
            items.push((severity.to_string(), *count));
        }
    }
    for (severity, count) in counts {
        if !SEVERITY_ORDER.contains(&severity.as_str()) {
            items.push((severity.clone(), *count));
        }
    }
    items
}

fn append_severity_summary(output: &mut String, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        let _ = writeln!(output, "No findings.\n");
        return;
    }
    let _ = writeln!(output, "### Findings by severity");
    for (severity, count) in format_severity_counts(counts) {
        let _ = writeln!(output, "- {severity}: {count}");
    }
    let _ = writeln!(output);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::Severity;

    fn sample_report() -> ScanReport {
        let finding = Finding {
            file_path: "repo/app.py".to_string(),
            start_line: 1,
            end_line: 2,
            snippet: "eval(user_input)".to_string(),
            ensemble_score: 0.8,
            severity: Severity::Critical,
            votes_vulnerable: 1,
            total_detectors: 1,
            detector_outputs: Vec::new(),
            cvss_score: Some(9.8),
            cvss_severity: Some("CRITICAL".to_string()),
            cvss_vector: Some("CVSS:3.1/AV:N".to_string()),
            cvss_cve: Some("CVE-2024-0001".to_string()),
            patch: None,
        };
        let mut results = BTreeMap::new();
        results.insert("repo/app.py".to_string(), vec![finding]);
        let mut severity_counts = BTreeMap::new();
        severity_counts.insert("critical".to_string(), 1);
        ScanReport {
            target: "repo".to_string(),
            file_count: 3,
            finding_file_count: 1,
            severity_counts,
            results,
        }
    }

    #[test]
    fn renders_markdown_sections() {
        let output = render_markdown(&sample_report());
        assert!(output.contains("Vigil Scan Report"));
        assert!(output.contains("Target: `repo`"));
        assert!(output.contains("Files scanned: 3"));
        assert!(output.contains("critical: 1"));
        assert!(output.contains("## repo/app.py"));
        assert!(output.contains("CVSS: 9.8 (CVE-2024-0001)"));
        assert!(output.contains("eval(user_input)"));
    }

    #[test]
    fn renders_json_payload() {
        let json = render_json(&sample_report()).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed["target"], "repo");
        assert_eq!(parsed["file_count"], 3);
        assert_eq!(parsed["severity_counts"]["critical"], 1);
        assert_eq!(
            parsed["results"]["repo/app.py"][0]["severity"],
            "critical"
        );
        // Absent optional fields are omitted, not null.
        assert!(parsed["results"]["repo/app.py"][0].get("patch").is_none());
    }

    #[test]
    fn severity_counts_are_ordered_most_severe_first() {
        let mut counts = BTreeMap::new();
        counts.insert("low".to_string(), 2);
        counts.insert("critical".to_string(), 1);
        counts.insert("medium".to_string(), 4);
        let ordered = format_severity_counts(&counts);
        assert_eq!(
            ordered,
            vec![
                ("critical".to_string(), 1),
                ("medium".to_string(), 4),
                ("low".to_string(), 2),
            ]
        );
    }

    #[test]
    fn empty_report_renders_no_findings() {
        let report = ScanReport {
            target: "repo".to_string(),
            file_count: 0,
            finding_file_count: 0,
            severity_counts: BTreeMap::new(),
            results: BTreeMap::new(),
        };
        let output = render_markdown(&report);
        assert!(output.contains("No findings."));
    }
}
