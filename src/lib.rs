//! Audit Runner - drives an external SEO audit tool through headless Chrome
//!
//! Given a website and a requester, this service fills in the audit tool's
//! public form in an isolated browser session, waits for the generated PDF
//! report to land in a per-request download directory, uploads it to Google
//! Drive, and returns the shareable link.
//!
//! The interesting part is the orchestration: a stateful external browser,
//! an asynchronous externally-triggered download with no completion signal,
//! and the guarantee that the browser process and scratch directory are
//! released on every path, success or failure.

pub mod browser;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod upload;
pub mod watcher;
pub mod workspace;

pub use browser::{BrowserSession, ChromeLauncher, ChromeSession, SessionLauncher};
pub use config::AppConfig;
pub use error::{AuditError, Result, Stage};
pub use pipeline::{AuditPipeline, PipelineConfig};
pub use request::AuditRequest;
pub use upload::{DriveClient, DriveCredentials, UploadResult, Uploader};
pub use watcher::{DownloadArtifact, DownloadWatcher};
pub use workspace::ScopedWorkspace;
