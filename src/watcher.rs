//! Download completion watcher
//!
//! The external audit tool triggers the report download itself and gives us
//! no completion signal, so the only way to observe it is to poll the
//! session's download directory until a matching file appears or a time
//! budget runs out.

use crate::error::{AuditError, Result};
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// A file discovered in the download directory.
#[derive(Debug, Clone)]
pub struct DownloadArtifact {
    pub path: PathBuf,
    pub discovered_at: DateTime<Utc>,
}

/// Polling state machine: `Watching -> Found` or `Watching -> Expired`.
#[derive(Debug, Clone)]
pub struct DownloadWatcher {
    poll_interval: Duration,
    budget: Duration,
}

impl DownloadWatcher {
    pub fn new(poll_interval: Duration, budget: Duration) -> Self {
        Self {
            poll_interval,
            budget,
        }
    }

    /// Wait for a file matching `matches` to appear in `dir`.
    ///
    /// The directory is listed once per poll interval; the watcher never
    /// spins faster than that. A missing directory is not an error, it
    /// simply counts as zero matches. When several files match in the same
    /// scan, the lexicographically smallest file name wins, so repeated
    /// runs over the same directory state always pick the same artifact.
    pub async fn wait_for<F>(&self, dir: &Path, matches: F) -> Result<DownloadArtifact>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + self.budget;
        debug!(
            "Watching {} for a download (budget {:?}, poll {:?})",
            dir.display(),
            self.budget,
            self.poll_interval
        );

        loop {
            if let Some(path) = scan_dir(dir, &matches)? {
                info!("Report downloaded: {}", path.display());
                return Ok(DownloadArtifact {
                    path,
                    discovered_at: Utc::now(),
                });
            }

            if Instant::now() >= deadline {
                return Err(AuditError::DownloadTimeout {
                    waited: self.budget,
                });
            }

            sleep(self.poll_interval).await;
        }
    }
}

/// List `dir` and return the first matching file name in lexicographic
/// order, or `None` when nothing matches yet.
fn scan_dir<F>(dir: &Path, matches: &F) -> Result<Option<PathBuf>>
where
    F: Fn(&str) -> bool,
{
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        // The browser may not have created the directory yet.
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut candidates: Vec<String> = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if matches(&name) {
            candidates.push(name);
        }
    }

    candidates.sort();
    Ok(candidates.into_iter().next().map(|name| dir.join(name)))
}

/// Match predicate for the PDF reports the audit tool produces.
pub fn is_pdf(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    #[tokio::test]
    async fn test_existing_file_found_immediately() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.pdf"), b"%PDF-").unwrap();

        let watcher = DownloadWatcher::new(Duration::from_millis(50), Duration::from_secs(5));
        let start = std::time::Instant::now();
        let artifact = watcher.wait_for(dir.path(), is_pdf).await.unwrap();

        assert_eq!(artifact.path, dir.path().join("report.pdf"));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_times_out_when_nothing_appears() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = DownloadWatcher::new(Duration::from_millis(20), Duration::from_millis(100));

        let start = std::time::Instant::now();
        let err = watcher.wait_for(dir.path(), is_pdf).await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, AuditError::DownloadTimeout { .. }));
        // Approximately the budget, give or take one poll interval.
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_missing_directory_is_zero_matches() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-created");
        let watcher = DownloadWatcher::new(Duration::from_millis(20), Duration::from_millis(80));

        // Must time out cleanly rather than fail on the missing directory.
        let err = watcher.wait_for(&missing, is_pdf).await.unwrap_err();
        assert!(matches!(err, AuditError::DownloadTimeout { .. }));
    }

    #[tokio::test]
    async fn test_file_appearing_mid_watch_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            fs::write(path.join("late.pdf"), b"%PDF-").unwrap();
        });

        let watcher = DownloadWatcher::new(Duration::from_millis(20), Duration::from_secs(5));
        let artifact = watcher.wait_for(dir.path(), is_pdf).await.unwrap();
        assert!(artifact.path.ends_with("late.pdf"));
    }

    #[tokio::test]
    async fn test_tie_break_is_lexicographic_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b-report.pdf"), b"%PDF-").unwrap();
        fs::write(dir.path().join("a-report.pdf"), b"%PDF-").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let watcher = DownloadWatcher::new(Duration::from_millis(20), Duration::from_secs(1));
        for _ in 0..3 {
            let artifact = watcher.wait_for(dir.path(), is_pdf).await.unwrap();
            assert!(artifact.path.ends_with("a-report.pdf"));
        }
    }

    #[test]
    fn test_pdf_predicate() {
        assert!(is_pdf("report.pdf"));
        assert!(is_pdf("REPORT.PDF"));
        assert!(!is_pdf("report.pdf.part"));
        assert!(!is_pdf("report.html"));
    }
}
