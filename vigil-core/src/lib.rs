#![deny(missing_docs)]
//! Vigil core library.
//!
//! This crate contains the detection-to-decision pipeline behind the vigil
//! vulnerability triage tool: chunking, detector ensembles, severity
//! intelligence, and patch suggestions.

pub mod analyzer;
pub mod chunker;
pub mod detector;
pub mod ensemble;
pub mod error;
pub mod fs;
pub mod intel;
pub mod patch;
pub mod repo;
pub mod report;

pub use analyzer::{Analyzer, Finding};
pub use chunker::{CodeUnit, DEFAULT_UNIT_SIZE, chunk};
pub use detector::{
    ClassifierBackend, Detector, DetectorOutput, HeuristicDetector, HostedClassifierClient,
    MockClassifierBackend, ModelDetector, build_detectors,
};
pub use ensemble::{Severity, Verdict, is_clean_label, vote};
pub use error::{Result, VigilError};
pub use fs::{FileSystem, SCAN_EXTENSIONS, StdFileSystem, is_scannable};
pub use intel::{IntelError, MockSeverityIntel, NvdClient, SeverityIntel, SeverityRecord, label_to_keyword};
pub use patch::{
    DEFAULT_PATCH_MODEL, HostedPatchClient, MockPatchBackend, PatchBackend, PatchError,
    PatchSuggestion, generate_patch,
};
pub use repo::{ResolvedTarget, resolve_target};
pub use report::{ScanReport, format_severity_counts, render_json, render_markdown};
