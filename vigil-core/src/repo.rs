//! Target acquisition: local directories and remote repositories.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, VigilError};

/// A scan target resolved to a local filesystem root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Target was an existing local directory.
    Local {
        /// Directory to scan.
        path: PathBuf,
    },
    /// Target was cloned into a temporary directory.
    Cloned {
        /// Clone destination to scan.
        path: PathBuf,
    },
}

impl ResolvedTarget {
    /// The local root to scan.
    pub fn root(&self) -> &Path {
        match self {
            ResolvedTarget::Local { path } | ResolvedTarget::Cloned { path } => path,
        }
    }
}

/// Resolve a target string to a local root.
///
/// An existing directory is used as-is; anything else is treated as a
/// repository URL and shallow-cloned into a unique temporary directory.
/// This is the only fatal failure of a scan.
pub fn resolve_target(target: &str) -> Result<ResolvedTarget> {
    let as_path = Path::new(target);
    if as_path.is_dir() {
        log::info!("using local directory: {target}");
        return Ok(ResolvedTarget::Local {
            path: as_path.to_path_buf(),
        });
    }

    let dest = clone_destination();
    log::info!("cloning {target} into {}", dest.display());
    clone_repo(target, &dest)?;
    Ok(ResolvedTarget::Cloned { path: dest })
}

fn clone_destination() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("vigil_scan_{nanos}"))
}

fn clone_repo(url: &str, dest: &Path) -> Result<()> {
    let output = Command::new("git")
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg(url)
        .arg(dest)
        .output()
        .map_err(|err| VigilError::Acquisition(format!("failed to run git: {err}")))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(VigilError::Acquisition(format!(
            "git clone failed: {}",
            stderr.trim()
        )))
    }
}
