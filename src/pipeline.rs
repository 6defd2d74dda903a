//! Audit pipeline orchestrator
//!
//! Sequences validation, workspace acquisition, browser automation,
//! download watching, and upload — fail-fast, with browser and workspace
//! release guaranteed on every exit path.

use crate::browser::{BrowserSession, SessionLauncher};
use crate::error::{AuditError, Result};
use crate::request::AuditRequest;
use crate::upload::{UploadResult, Uploader};
use crate::watcher::{is_pdf, DownloadWatcher};
use crate::workspace::ScopedWorkspace;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fixed external contract of the audit tool's entry form. Schema drift
/// on that page is an operational risk this service cannot validate
/// ahead of time.
pub const DEFAULT_ENTRY_URL: &str = "https://www.thehoth.com/seo-audit-tool/";
pub const DEFAULT_SITE_SELECTOR: &str = r#"input[name="domain"]"#;
pub const DEFAULT_NAME_SELECTOR: &str = r#"input[name="first_name"]"#;
pub const DEFAULT_EMAIL_SELECTOR: &str = r#"input[name="email"]"#;
pub const DEFAULT_SUBMIT_SELECTOR: &str = r#"input[type="submit"]"#;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Entry page of the external audit tool
    pub entry_url: String,

    /// Selectors for the three form fields, filled in order
    pub site_selector: String,
    pub name_selector: String,
    pub email_selector: String,

    /// Selector for the submit control
    pub submit_selector: String,

    /// Budget for the initial navigation
    pub navigation_budget: Duration,

    /// Budget for the post-submit navigation
    pub submit_budget: Duration,

    /// Download watcher tick
    pub poll_interval: Duration,

    /// Budget for the report to appear on disk
    pub download_budget: Duration,

    /// Base directory under which per-request workspaces are created
    pub workspace_root: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            entry_url: DEFAULT_ENTRY_URL.to_string(),
            site_selector: DEFAULT_SITE_SELECTOR.to_string(),
            name_selector: DEFAULT_NAME_SELECTOR.to_string(),
            email_selector: DEFAULT_EMAIL_SELECTOR.to_string(),
            submit_selector: DEFAULT_SUBMIT_SELECTOR.to_string(),
            navigation_budget: Duration::from_secs(60),
            submit_budget: Duration::from_secs(90),
            poll_interval: Duration::from_secs(2),
            download_budget: Duration::from_secs(120),
            workspace_root: PathBuf::from("./downloads"),
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for PipelineConfig
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn entry_url(mut self, url: &str) -> Self {
        self.config.entry_url = url.to_string();
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = root.into();
        self
    }

    pub fn navigation_budget(mut self, budget: Duration) -> Self {
        self.config.navigation_budget = budget;
        self
    }

    pub fn submit_budget(mut self, budget: Duration) -> Self {
        self.config.submit_budget = budget;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn download_budget(mut self, budget: Duration) -> Self {
        self.config.download_budget = budget;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

/// Orchestrator for one audit pipeline execution per call.
///
/// The launcher and uploader are shared, read-only collaborators; each
/// `run` owns its own session and workspace exclusively, so concurrent
/// executions never share mutable state.
pub struct AuditPipeline {
    launcher: Arc<dyn SessionLauncher>,
    uploader: Arc<dyn Uploader>,
    config: PipelineConfig,
}

impl AuditPipeline {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        uploader: Arc<dyn Uploader>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            launcher,
            uploader,
            config,
        }
    }

    /// Run the full pipeline for one request.
    pub async fn run(&self, request: &AuditRequest) -> Result<UploadResult> {
        self.run_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Run the pipeline, aborting to cleanup if `cancel` fires at any
    /// suspension point (e.g. the HTTP client disconnected).
    pub async fn run_cancellable(
        &self,
        request: &AuditRequest,
        cancel: &CancellationToken,
    ) -> Result<UploadResult> {
        // Stage 1: validate before acquiring any resource.
        request.validate()?;
        info!("Starting audit for: {}", request.website);

        // Stage 2: scoped workspace; removed on every exit path below.
        let workspace = ScopedWorkspace::create(&self.config.workspace_root)?;

        let mut session: Option<Box<dyn BrowserSession>> = None;
        let result = self
            .drive_stages(request, &workspace, &mut session, cancel)
            .await;

        // Cleanup runs on success and on every failure path. Failures
        // here are logged, never allowed to mask the primary outcome.
        if let Some(mut live) = session {
            if let Err(e) = live.close().await {
                warn!("Browser close failed during cleanup: {}", e);
            }
        }
        workspace.cleanup();

        match &result {
            Ok(upload) => info!("Audit complete: {}", upload.shareable_link),
            Err(e) => warn!("Audit failed at stage {}: {}", e.stage().as_str(), e),
        }
        result
    }

    /// Stages 3-8. The session is handed back through `session_slot` so
    /// the caller can close it no matter where this sequence stopped.
    async fn drive_stages(
        &self,
        request: &AuditRequest,
        workspace: &ScopedWorkspace,
        session_slot: &mut Option<Box<dyn BrowserSession>>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult> {
        let cfg = &self.config;

        // Stage 3: launch, downloads wired to this workspace.
        let session = with_cancel(cancel, self.launcher.launch(workspace.path())).await?;
        let session = session_slot.insert(session);

        // Stage 4: entry page.
        with_cancel(cancel, session.navigate(&cfg.entry_url, cfg.navigation_budget)).await?;

        // Stage 5: the three fields, in order.
        with_cancel(cancel, session.fill_field(&cfg.site_selector, &request.website)).await?;
        with_cancel(
            cancel,
            session.fill_field(&cfg.name_selector, &request.requester_name),
        )
        .await?;
        with_cancel(
            cancel,
            session.fill_field(&cfg.email_selector, &request.requester_email),
        )
        .await?;

        // Stage 6: submit and await the results page.
        with_cancel(
            cancel,
            session.submit_and_await_navigation(&cfg.submit_selector, cfg.submit_budget),
        )
        .await?;

        // Stage 7: wait for the report to land on disk.
        let watcher = DownloadWatcher::new(cfg.poll_interval, cfg.download_budget);
        let artifact = with_cancel(cancel, watcher.wait_for(workspace.path(), is_pdf)).await?;

        // Stage 8: upload. The artifact is consumed exactly once and
        // deleted regardless of the upload outcome.
        let display_name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audit-report.pdf".to_string());
        let upload = with_cancel(cancel, self.uploader.upload(&artifact.path, &display_name)).await;
        workspace.remove_artifact(&artifact.path);

        upload
    }
}

/// Await `fut`, bailing out with `Cancelled` if the token fires first.
async fn with_cancel<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AuditError::Cancelled),
        result = fut => result,
    }
}
