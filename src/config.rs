//! Process configuration from the environment

use crate::pipeline::PipelineConfig;
use crate::upload::DriveCredentials;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Process-wide configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port
    pub port: u16,

    /// Base directory for per-request workspaces
    pub workspace_root: PathBuf,

    /// Drive credentials; absence is a startup warning, not an error —
    /// only an actual upload attempt fails without them.
    pub credentials: Option<DriveCredentials>,

    /// Download watcher budget override, seconds
    pub download_budget: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            workspace_root: PathBuf::from("./downloads"),
            credentials: None,
            download_budget: Duration::from_secs(120),
        }
    }
}

impl AppConfig {
    /// Read configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("PORT") {
            match port.parse() {
                Ok(p) => config.port = p,
                Err(_) => warn!("Ignoring unparsable PORT value: {}", port),
            }
        }

        if let Ok(root) = std::env::var("AUDIT_WORKSPACE_ROOT") {
            config.workspace_root = PathBuf::from(root);
        }

        if let Ok(secs) = std::env::var("AUDIT_DOWNLOAD_BUDGET_SECS") {
            match secs.parse() {
                Ok(s) => config.download_budget = Duration::from_secs(s),
                Err(_) => warn!("Ignoring unparsable AUDIT_DOWNLOAD_BUDGET_SECS: {}", secs),
            }
        }

        match std::env::var("GOOGLE_DRIVE_TOKEN_BASE64") {
            Ok(encoded) => match DriveCredentials::from_base64(&encoded) {
                Ok(creds) => config.credentials = Some(creds),
                Err(e) => warn!("GOOGLE_DRIVE_TOKEN_BASE64 is set but unusable: {}", e),
            },
            Err(_) => warn!(
                "GOOGLE_DRIVE_TOKEN_BASE64 not set; uploads will fail until it is provided"
            ),
        }

        config
    }

    /// Derive the pipeline configuration from this process config.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::builder()
            .workspace_root(self.workspace_root.clone())
            .download_budget(self.download_budget)
            .build()
    }
}
