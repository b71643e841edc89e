//! Scan orchestration: chunking, voting, enrichment, and escalation.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::chunker::{self, DEFAULT_UNIT_SIZE};
use crate::detector::{
    ClassifierBackend, Detector, DetectorOutput, HostedClassifierClient, build_detectors,
};
use crate::ensemble::{self, Severity};
use crate::error::Result;
use crate::fs::{FileSystem, StdFileSystem, is_scannable};
use crate::intel::{SeverityIntel, label_to_keyword};
use crate::patch::{PatchBackend, PatchSuggestion, generate_patch};
use crate::report::ScanReport;

/// Number of snippet characters preserved on a finding.
const SNIPPET_PREVIEW_CHARS: usize = 400;

/// A persisted record of one vulnerable code unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Finding {
    /// Path of the scanned file.
    pub file_path: String,
    /// First line of the unit, 1-based.
    pub start_line: usize,
    /// Last line of the unit, 1-based (inclusive).
    pub end_line: usize,
    /// Preview of the unit text (first 400 characters).
    pub snippet: String,
    /// Combined ensemble confidence.
    pub ensemble_score: f64,
    /// Severity tier of the verdict.
    pub severity: Severity,
    /// Number of detectors that voted vulnerable.
    pub votes_vulnerable: usize,
    /// Number of detectors that produced an output.
    pub total_detectors: usize,
    /// Raw detector outputs in detector order.
    pub detector_outputs: Vec<DetectorOutput>,
    /// CVSS base score from the severity database, if found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_score: Option<f64>,
    /// CVSS severity label, if found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_severity: Option<String>,
    /// CVSS vector string, if found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_vector: Option<String>,
    /// Database entry the CVSS data came from, if found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_cve: Option<String>,
    /// Patch suggestion for escalated findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<PatchSuggestion>,
}

/// Drives the detection-to-decision pipeline over files and directories.
pub struct Analyzer<F: FileSystem> {
    fs: F,
    detectors: Vec<Arc<dyn Detector + Send + Sync>>,
    intel: Arc<dyn SeverityIntel + Send + Sync>,
    patcher: Arc<dyn PatchBackend + Send + Sync>,
    unit_size: usize,
}

impl<F: FileSystem> Analyzer<F> {
    /// Create an analyzer with the given collaborators.
    pub fn new(
        fs: F,
        detectors: Vec<Arc<dyn Detector + Send + Sync>>,
        intel: Arc<dyn SeverityIntel + Send + Sync>,
        patcher: Arc<dyn PatchBackend + Send + Sync>,
    ) -> Self {
        Self {
            fs,
            detectors,
            intel,
            patcher,
            unit_size: DEFAULT_UNIT_SIZE,
        }
    }

    /// Override the number of lines per code unit.
    pub fn with_unit_size(mut self, unit_size: usize) -> Self {
        self.unit_size = unit_size.max(1);
        self
    }

    /// Analyze one file, returning findings in chunk order.
    ///
    /// A read failure is local to the file: it logs a warning and returns
    /// an empty list so the surrounding scan continues.
    pub fn analyze_file(&self, path: &Path) -> Vec<Finding> {
        let contents = match self.fs.read_lossy(path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!("skipping unreadable file {}: {err}", path.display());
                return Vec::new();
            }
        };

        let file_path = path.display().to_string();
        let mut findings = Vec::new();

        for unit in chunker::chunk(&contents, self.unit_size) {
            let verdict = ensemble::vote(&unit, &self.detectors);
            if !verdict.vulnerable {
                continue;
            }

            let record = self.lookup_severity(&verdict.detector_outputs);
            let patch = if verdict.severity.warrants_patch() {
                Some(generate_patch(
                    self.patcher.as_ref(),
                    &file_path,
                    &unit.text,
                ))
            } else {
                None
            };

            findings.push(Finding {
                file_path: file_path.clone(),
                start_line: unit.start_line,
                end_line: unit.end_line,
                snippet: unit.text.chars().take(SNIPPET_PREVIEW_CHARS).collect(),
                ensemble_score: verdict.ensemble_score,
                severity: verdict.severity,
                votes_vulnerable: verdict.votes_vulnerable,
                total_detectors: verdict.total_detectors,
                detector_outputs: verdict.detector_outputs,
                cvss_score: record.as_ref().map(|record| record.base_score),
                cvss_severity: record.as_ref().map(|record| record.severity.clone()),
                cvss_vector: record.as_ref().map(|record| record.vector.clone()),
                cvss_cve: record.map(|record| record.source_cve),
                patch,
            });
        }

        findings
    }

    /// Resolve a target string (path or repository URL) and scan it.
    pub fn scan(&self, target: &str) -> Result<ScanReport> {
        let resolved = crate::repo::resolve_target(target)?;
        self.run_scan(target, resolved.root())
    }

    /// Scan every allow-listed file under the root and aggregate findings.
    pub fn run_scan(&self, target: &str, root: &Path) -> Result<ScanReport> {
        let files: Vec<_> = self
            .fs
            .list_files(root)?
            .into_iter()
            .filter(|path| is_scannable(path))
            .collect();
        log::info!("scanning {} files under {}", files.len(), root.display());

        let mut results: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
        let mut severity_counts: BTreeMap<String, usize> = BTreeMap::new();

        for path in &files {
            let findings = self.analyze_file(path);
            if findings.is_empty() {
                continue;
            }
            for finding in &findings {
                *severity_counts
                    .entry(finding.severity.as_str().to_string())
                    .or_insert(0) += 1;
            }
            results.insert(path.display().to_string(), findings);
        }

        Ok(ScanReport {
            target: target.to_string(),
            file_count: files.len(),
            finding_file_count: results.len(),
            severity_counts,
            results,
        })
    }

    fn lookup_severity(
        &self,
        outputs: &[DetectorOutput],
    ) -> Option<crate::intel::SeverityRecord> {
        // Key the lookup off the first vulnerable label; clean votes carry no
        // vulnerability class.
        let primary = outputs
            .iter()
            .find(|output| !ensemble::is_clean_label(&output.label))?;
        let keyword = label_to_keyword(&primary.label);
        match self.intel.lookup(&keyword) {
            Ok(record) => record,
            Err(err) => {
                log::warn!("severity lookup failed for '{keyword}': {err}");
                None
            }
        }
    }
}

impl Analyzer<StdFileSystem> {
    /// Build a fully wired analyzer from environment variables.
    ///
    /// Model detectors come from the comma-separated `VIGIL_MODELS` list and
    /// require an inference credential; without one the analyzer runs on the
    /// heuristic detector alone.
    pub fn from_env() -> Self {
        let model_ids: Vec<String> = std::env::var("VIGIL_MODELS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect();

        let backend = match HostedClassifierClient::from_env() {
            Ok(client) => Some(Arc::new(client) as Arc<dyn ClassifierBackend + Send + Sync>),
            Err(err) => {
                if !model_ids.is_empty() {
                    log::warn!("classifier backend unavailable: {err}");
                }
                None
            }
        };

        Self::new(
            StdFileSystem::new(),
            build_detectors(&model_ids, backend),
            Arc::new(crate::intel::NvdClient::from_env()),
            Arc::new(crate::patch::HostedPatchClient::from_env()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::HeuristicDetector;
    use crate::error::VigilError;
    use crate::fs::MockFileSystem;
    use crate::intel::{MockSeverityIntel, SeverityRecord};
    use crate::patch::MockPatchBackend;
    use std::path::PathBuf;

    fn heuristic_only() -> Vec<Arc<dyn Detector + Send + Sync>> {
        vec![Arc::new(HeuristicDetector::new())]
    }

    fn sample_record() -> SeverityRecord {
        SeverityRecord {
            base_score: 9.8,
            severity: "CRITICAL".to_string(),
            vector: "CVSS:3.1/AV:N".to_string(),
            source_cve: "CVE-2024-0001".to_string(),
        }
    }

    #[test]
    fn unreadable_file_yields_no_findings() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_lossy()
            .returning(|_| Err(VigilError::Other("permission denied".to_string())));

        let analyzer = Analyzer::new(
            fs,
            heuristic_only(),
            Arc::new(MockSeverityIntel::empty()),
            Arc::new(MockPatchBackend::failing()),
        );

        assert!(analyzer.analyze_file(Path::new("locked.py")).is_empty());
    }

    #[test]
    fn vulnerable_unit_produces_enriched_finding() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_lossy()
            .returning(|_| Ok("eval(user_input)\nos.system(cmd)\n".to_string()));

        let analyzer = Analyzer::new(
            fs,
            heuristic_only(),
            Arc::new(MockSeverityIntel::with_record(sample_record())),
            Arc::new(MockPatchBackend::with_output("safe(user_input)")),
        );

        let findings = analyzer.analyze_file(Path::new("app.py"));
        assert_eq!(findings.len(), 1);

        let finding = &findings[0];
        assert_eq!(finding.file_path, "app.py");
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.votes_vulnerable, 1);
        assert_eq!(finding.total_detectors, 1);
        assert_eq!(finding.cvss_score, Some(9.8));
        assert_eq!(finding.cvss_cve.as_deref(), Some("CVE-2024-0001"));
        let patch = finding.patch.as_ref().expect("patch attempted");
        assert!(patch.success);
    }

    #[test]
    fn medium_severity_skips_patch_generation() {
        struct MediumDetector;
        impl Detector for MediumDetector {
            fn id(&self) -> &str {
                "medium"
            }
            fn predict(&self, _text: &str) -> crate::error::Result<DetectorOutput> {
                Ok(DetectorOutput {
                    detector: "medium".to_string(),
                    label: "VULNERABILITY".to_string(),
                    score: 0.5,
                    patterns: Vec::new(),
                })
            }
        }

        let mut fs = MockFileSystem::new();
        fs.expect_read_lossy().returning(|_| Ok("code".to_string()));

        let analyzer = Analyzer::new(
            fs,
            vec![Arc::new(MediumDetector)],
            Arc::new(MockSeverityIntel::empty()),
            Arc::new(MockPatchBackend::with_output("should not be called")),
        );

        let findings = analyzer.analyze_file(Path::new("app.py"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert!(findings[0].patch.is_none());
    }

    #[test]
    fn intel_failure_degrades_to_absent_fields() {
        struct BrokenIntel;
        impl SeverityIntel for BrokenIntel {
            fn lookup(
                &self,
                _keyword: &str,
            ) -> std::result::Result<Option<SeverityRecord>, crate::intel::IntelError> {
                Err(crate::intel::IntelError::Request("timeout".to_string()))
            }
        }

        let mut fs = MockFileSystem::new();
        fs.expect_read_lossy()
            .returning(|_| Ok("eval(x)\n".to_string()));

        let analyzer = Analyzer::new(
            fs,
            heuristic_only(),
            Arc::new(BrokenIntel),
            Arc::new(MockPatchBackend::failing()),
        );

        let findings = analyzer.analyze_file(Path::new("app.py"));
        assert_eq!(findings.len(), 1);
        assert!(findings[0].cvss_score.is_none());
        assert!(findings[0].cvss_cve.is_none());
    }

    #[test]
    fn snippet_preview_is_bounded() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_lossy()
            .returning(|_| Ok(format!("eval(x) {}", "a".repeat(2000))));

        let analyzer = Analyzer::new(
            fs,
            heuristic_only(),
            Arc::new(MockSeverityIntel::empty()),
            Arc::new(MockPatchBackend::failing()),
        );

        let findings = analyzer.analyze_file(Path::new("app.py"));
        assert_eq!(findings[0].snippet.chars().count(), 400);
    }

    #[test]
    fn run_scan_aggregates_and_skips_clean_files() {
        let mut fs = MockFileSystem::new();
        fs.expect_list_files().returning(|_| {
            Ok(vec![
                PathBuf::from("repo/app.py"),
                PathBuf::from("repo/clean.js"),
                PathBuf::from("repo/README.md"),
            ])
        });
        fs.expect_read_lossy()
            .withf(|path| path == Path::new("repo/app.py"))
            .returning(|_| Ok("eval(user_input)\nos.system(cmd)\n".to_string()));
        fs.expect_read_lossy()
            .withf(|path| path == Path::new("repo/clean.js"))
            .returning(|_| Ok("const total = 1 + 2;\n".to_string()));

        let analyzer = Analyzer::new(
            fs,
            heuristic_only(),
            Arc::new(MockSeverityIntel::empty()),
            Arc::new(MockPatchBackend::failing()),
        );

        let report = analyzer.run_scan("repo", Path::new("repo")).expect("scan");
        assert_eq!(report.file_count, 2);
        assert_eq!(report.finding_file_count, 1);
        assert_eq!(report.severity_counts.get("critical"), Some(&1));
        assert!(report.results.contains_key("repo/app.py"));
        assert!(!report.results.contains_key("repo/clean.js"));
    }

    #[test]
    fn run_scan_survives_per_file_read_failures() {
        let mut fs = MockFileSystem::new();
        fs.expect_list_files().returning(|_| {
            Ok(vec![
                PathBuf::from("repo/broken.py"),
                PathBuf::from("repo/app.py"),
            ])
        });
        fs.expect_read_lossy()
            .withf(|path| path == Path::new("repo/broken.py"))
            .returning(|_| Err(VigilError::Other("permission denied".to_string())));
        fs.expect_read_lossy()
            .withf(|path| path == Path::new("repo/app.py"))
            .returning(|_| Ok("eval(x)\n".to_string()));

        let analyzer = Analyzer::new(
            fs,
            heuristic_only(),
            Arc::new(MockSeverityIntel::empty()),
            Arc::new(MockPatchBackend::failing()),
        );

        let report = analyzer.run_scan("repo", Path::new("repo")).expect("scan");
        assert_eq!(report.file_count, 2);
        assert_eq!(report.finding_file_count, 1);
        assert!(!report.results.contains_key("repo/broken.py"));
    }

    #[test]
    fn repeated_scans_are_identical() {
        fn build() -> Analyzer<MockFileSystem> {
            let mut fs = MockFileSystem::new();
            fs.expect_list_files()
                .returning(|_| Ok(vec![PathBuf::from("repo/app.py")]));
            fs.expect_read_lossy()
                .returning(|_| Ok("eval(x)\nsafe line\n".to_string()));
            Analyzer::new(
                fs,
                heuristic_only(),
                Arc::new(MockSeverityIntel::empty()),
                Arc::new(MockPatchBackend::failing()),
            )
        }

        let first = build().run_scan("repo", Path::new("repo")).expect("scan");
        let second = build().run_scan("repo", Path::new("repo")).expect("scan");
        assert_eq!(first.results, second.results);
        assert_eq!(first.severity_counts, second.severity_counts);
    }
}
