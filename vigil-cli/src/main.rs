#![deny(missing_docs)]
//! Vigil command-line interface.
//!
//! Runs vulnerability triage scans against local directories or remote
//! repositories, either in-process or through a running vigil server.

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::fmt::Write;
use std::path::PathBuf;
use vigil_core::{
    Analyzer, ScanReport, format_severity_counts, render_json, render_markdown,
};

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "vigil", version, about = "Vigil vulnerability triage CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(&["path", "url"])
))]
struct TargetArgs {
    /// Local directory to scan.
    #[arg(long)]
    path: Option<PathBuf>,
    /// Repository URL to clone and scan.
    #[arg(long)]
    url: Option<String>,
}

#[derive(Args, Clone)]
struct ScanArgs {
    /// Lines per analyzed code unit.
    #[arg(long, default_value_t = vigil_core::DEFAULT_UNIT_SIZE)]
    unit_size: usize,
    /// Submit the scan to a running vigil server instead of scanning locally.
    #[arg(long)]
    server: Option<String>,
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Output format for report data.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report to a file instead of stdout.
    #[arg(long = "out")]
    out: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a repository or directory for likely vulnerabilities.
    Scan {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        scan: ScanArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            target,
            scan,
            report,
        } => {
            let target = resolve_target_arg(&target)?;
            run_scan(target, scan, report).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
fn main() {}

async fn run_scan(target: String, scan: ScanArgs, report: OutputArgs) -> CliResult<()> {
    let scan_report = match &scan.server {
        Some(server) => scan_via_server(server, &target).await?,
        None => scan_locally(target, scan.unit_size).await?,
    };

    emit_report(&scan_report, &report).await
}

async fn scan_locally(target: String, unit_size: usize) -> CliResult<ScanReport> {
    let report = tokio::task::spawn_blocking(move || {
        let analyzer = Analyzer::from_env().with_unit_size(unit_size);
        analyzer.scan(&target)
    })
    .await??;
    Ok(report)
}

async fn scan_via_server(server: &str, target: &str) -> CliResult<ScanReport> {
    let url = format!("{}/scan", server.trim_end_matches('/'));
    log::info!("submitting scan of {target} to {url}");
    let response = reqwest::Client::new()
        .post(url)
        .json(&serde_json::json!({ "target": target }))
        .send()
        .await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("server scan failed ({status}): {body}").into());
    }
    Ok(response.json().await?)
}

async fn emit_report(report: &ScanReport, output: &OutputArgs) -> CliResult<()> {
    let rendered = match output.format {
        OutputFormat::Json => render_json(report)?,
        OutputFormat::Markdown => render_markdown(report),
        OutputFormat::Text => render_text(report),
    };

    match &output.out {
        Some(path) => {
            tokio::fs::write(path, rendered.as_bytes()).await?;
            println!("Report written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

fn resolve_target_arg(target: &TargetArgs) -> CliResult<String> {
    if let Some(path) = &target.path {
        return Ok(path.display().to_string());
    }
    if let Some(url) = &target.url {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err("url cannot be empty".into());
        }
        return Ok(trimmed.to_string());
    }
    Err("no scan target provided".into())
}

fn render_text(report: &ScanReport) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Scan of {}", report.target);
    let _ = writeln!(output, "  Files scanned: {}", report.file_count);
    let _ = writeln!(output, "  Files with findings: {}", report.finding_file_count);

    if report.severity_counts.is_empty() {
        let _ = writeln!(output, "  No findings.");
        return output;
    }

    let _ = writeln!(output, "  Findings by severity:");
    for (severity, count) in format_severity_counts(&report.severity_counts) {
        let _ = writeln!(output, "    {severity:9}: {count}");
    }

    for (path, findings) in &report.results {
        let _ = writeln!(output, "  {path}");
        for finding in findings {
            let _ = writeln!(
                output,
                "    lines {}-{}: {} (score {:.2}, votes {}/{})",
                finding.start_line,
                finding.end_line,
                finding.severity.as_str(),
                finding.ensemble_score,
                finding.votes_vulnerable,
                finding.total_detectors
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_report() -> ScanReport {
        let mut severity_counts = BTreeMap::new();
        severity_counts.insert("high".to_string(), 2);
        ScanReport {
            target: "demo".to_string(),
            file_count: 4,
            finding_file_count: 1,
            severity_counts,
            results: BTreeMap::new(),
        }
    }

    #[test]
    fn path_target_resolves_to_display_string() {
        let args = TargetArgs {
            path: Some(PathBuf::from("/tmp/repo")),
            url: None,
        };
        assert_eq!(resolve_target_arg(&args).unwrap(), "/tmp/repo");
    }

    #[test]
    fn url_target_is_trimmed_and_validated() {
        let args = TargetArgs {
            path: None,
            url: Some("  https://example.com/repo.git  ".to_string()),
        };
        assert_eq!(
            resolve_target_arg(&args).unwrap(),
            "https://example.com/repo.git"
        );

        let empty = TargetArgs {
            path: None,
            url: Some("   ".to_string()),
        };
        assert!(resolve_target_arg(&empty).is_err());
    }

    #[test]
    fn text_rendering_includes_summary() {
        let output = render_text(&sample_report());
        assert!(output.contains("Scan of demo"));
        assert!(output.contains("Files scanned: 4"));
        assert!(output.contains("high"));
    }

    #[test]
    fn empty_report_prints_no_findings() {
        let report = ScanReport {
            target: "demo".to_string(),
            file_count: 0,
            finding_file_count: 0,
            severity_counts: BTreeMap::new(),
            results: BTreeMap::new(),
        };
        assert!(render_text(&report).contains("No findings."));
    }
}
