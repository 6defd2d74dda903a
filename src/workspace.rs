//! Per-request scratch directories for browser downloads
//!
//! Every pipeline execution gets its own uniquely-named directory so that
//! concurrent requests can never race on which downloaded report belongs
//! to which request.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A filesystem location exclusively owned by one in-flight pipeline
/// execution.
///
/// Created before any browser work begins; the directory (and anything
/// left inside it) is removed by [`ScopedWorkspace::cleanup`], with a
/// drop-based removal as a fallback for early-exit paths.
pub struct ScopedWorkspace {
    dir: Option<TempDir>,
}

impl ScopedWorkspace {
    /// Create a fresh workspace under `root`, creating `root` itself if
    /// needed.
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("audit-").tempdir_in(root)?;
        debug!("Created workspace: {}", dir.path().display());
        Ok(Self { dir: Some(dir) })
    }

    /// The download target for this execution's browser session.
    pub fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .map(TempDir::path)
            .expect("workspace already cleaned up")
    }

    /// Best-effort removal of a downloaded artifact.
    ///
    /// Failures are logged, never propagated; they must not mask the
    /// pipeline's primary outcome.
    pub fn remove_artifact(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => debug!("Deleted local artifact: {}", path.display()),
            Err(e) => warn!("Could not delete artifact {}: {}", path.display(), e),
        }
    }

    /// Remove the workspace directory and anything still inside it.
    ///
    /// Best-effort: a failure here is logged and swallowed so the caller
    /// can still report the pipeline's own result.
    pub fn cleanup(mut self) {
        if let Some(dir) = self.dir.take() {
            let path: PathBuf = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Removed workspace: {}", path.display()),
                Err(e) => warn!("Could not remove workspace {}: {}", path.display(), e),
            }
        }
    }
}
