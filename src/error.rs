//! Error types for audit-runner

use std::time::Duration;
use thiserror::Error;

/// Pipeline stage a failure is attributed to.
///
/// The HTTP layer maps `Validation` to a 400-class status and every
/// other stage to a 500-class status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validation,
    Workspace,
    Launch,
    Navigation,
    FormFill,
    Submit,
    Download,
    Upload,
    Cancelled,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::Workspace => "workspace",
            Stage::Launch => "launch",
            Stage::Navigation => "navigation",
            Stage::FormFill => "form_fill",
            Stage::Submit => "submit",
            Stage::Download => "download_timeout",
            Stage::Upload => "upload",
            Stage::Cancelled => "cancelled",
        }
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to configure browser session: {0}")]
    BrowserConfig(String),

    #[error("Navigation to {url} did not reach a quiescent state within {budget:?}")]
    NavigationTimeout { url: String, budget: Duration },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Form submission failed: {0}")]
    Submit(String),

    #[error("No report appeared in the download directory within {waited:?}")]
    DownloadTimeout { waited: Duration },

    #[error("Upload failed: {message}")]
    Upload { message: String, retryable: bool },

    #[error("Remote storage credentials unavailable: {0}")]
    Credentials(String),

    #[error("File system error")]
    Io(#[from] std::io::Error),

    #[error("Pipeline execution cancelled")]
    Cancelled,
}

impl AuditError {
    /// Which pipeline stage this error is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            AuditError::Validation(_) => Stage::Validation,
            AuditError::Launch(_) | AuditError::BrowserConfig(_) => Stage::Launch,
            AuditError::NavigationTimeout { .. } | AuditError::Navigation(_) => Stage::Navigation,
            AuditError::ElementNotFound(_) => Stage::FormFill,
            AuditError::Submit(_) => Stage::Submit,
            AuditError::DownloadTimeout { .. } => Stage::Download,
            AuditError::Upload { .. } | AuditError::Credentials(_) => Stage::Upload,
            AuditError::Io(_) => Stage::Workspace,
            AuditError::Cancelled => Stage::Cancelled,
        }
    }

    /// Whether the same pipeline run might succeed if attempted again later.
    ///
    /// This is a classification only; no retry is performed by this crate.
    pub fn retryable(&self) -> bool {
        match self {
            AuditError::Upload { retryable, .. } => *retryable,
            AuditError::NavigationTimeout { .. }
            | AuditError::Submit(_)
            | AuditError::DownloadTimeout { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tagging() {
        let err = AuditError::Validation("missing website".to_string());
        assert_eq!(err.stage(), Stage::Validation);
        assert!(!err.retryable());

        let err = AuditError::DownloadTimeout {
            waited: Duration::from_secs(120),
        };
        assert_eq!(err.stage(), Stage::Download);
        assert!(err.retryable());
    }

    #[test]
    fn test_upload_classification_is_exposed() {
        let fatal = AuditError::Upload {
            message: "401 Unauthorized".to_string(),
            retryable: false,
        };
        let transient = AuditError::Upload {
            message: "429 Too Many Requests".to_string(),
            retryable: true,
        };
        assert!(!fatal.retryable());
        assert!(transient.retryable());
        assert_eq!(fatal.stage(), Stage::Upload);
    }
}
