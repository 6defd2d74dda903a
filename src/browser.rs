//! Browser session abstraction and chromiumoxide implementation
//!
//! The pipeline talks to the external audit form through the narrow
//! [`BrowserSession`] trait so tests can substitute a fake session; the
//! production implementation drives one isolated headless Chrome instance
//! over CDP.

use crate::error::{AuditError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How long `fill_field` waits for a form field to exist before failing.
const FIELD_WAIT: Duration = Duration::from_secs(5);
const FIELD_POLL: Duration = Duration::from_millis(250);

/// One request-scoped automation surface over a browser instance.
///
/// `close` must be idempotent and safe to call after any partial failure.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and suspend until the page reaches a quiescent state or
    /// the budget elapses.
    async fn navigate(&mut self, url: &str, budget: Duration) -> Result<()>;

    /// Type `value` into the field at `selector`. Fails if the field does
    /// not appear within a short implicit wait; does not retry.
    async fn fill_field(&mut self, selector: &str, value: &str) -> Result<()>;

    /// Trigger the submit control and concurrently await the resulting
    /// navigation; both must complete within the budget.
    async fn submit_and_await_navigation(&mut self, selector: &str, budget: Duration)
        -> Result<()>;

    /// Release the underlying browser process.
    async fn close(&mut self) -> Result<()>;
}

/// Factory seam for acquiring sessions, so the pipeline never launches
/// Chrome directly.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Launch an isolated session whose downloads land in `download_dir`.
    /// Download wiring happens before any navigation.
    async fn launch(&self, download_dir: &Path) -> Result<Box<dyn BrowserSession>>;
}

/// Launches isolated headless Chrome instances via chromiumoxide.
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher;

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self, download_dir: &Path) -> Result<Box<dyn BrowserSession>> {
        let session = ChromeSession::launch(download_dir).await?;
        Ok(Box::new(session))
    }
}

/// A live headless Chrome instance with one working tab.
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
}

impl ChromeSession {
    /// Launch Chrome and wire its download behavior to `download_dir`.
    ///
    /// Sandboxing is disabled because the service runs in containers
    /// without a usable setuid sandbox.
    pub async fn launch(download_dir: &Path) -> Result<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .args(vec!["--disable-setuid-sandbox", "--disable-dev-shm-usage"])
            .build()
            .map_err(AuditError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AuditError::Launch(e.to_string()))?;
        info!("Headless browser launched");

        // The CDP event loop must be drained for the connection to make
        // progress; aborted on close().
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
        });

        let mut session = Self {
            browser: Some(browser),
            page: None,
            handler_task,
        };

        // Open the working tab and configure downloads before navigation;
        // tear the browser down if either step fails so no process leaks.
        match session.setup_page(download_dir).await {
            Ok(()) => Ok(session),
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!("Cleanup after failed session setup: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn setup_page(&mut self, download_dir: &Path) -> Result<()> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| AuditError::BrowserConfig("browser already closed".to_string()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AuditError::BrowserConfig(e.to_string()))?;

        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.to_string_lossy().into_owned())
            .build()
            .map_err(AuditError::BrowserConfig)?;
        page.execute(params)
            .await
            .map_err(|e| AuditError::BrowserConfig(e.to_string()))?;
        debug!("Download behavior set to: {}", download_dir.display());

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AuditError::BrowserConfig("no active page".to_string()))
    }

    /// Find an element, polling briefly in case the page is still
    /// rendering it.
    async fn find_element(&self, selector: &str) -> Result<chromiumoxide::element::Element> {
        let page = self.page()?;
        let deadline = tokio::time::Instant::now() + FIELD_WAIT;
        loop {
            match page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(_) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(FIELD_POLL).await;
                }
                Err(_) => return Err(AuditError::ElementNotFound(selector.to_string())),
            }
        }
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str, budget: Duration) -> Result<()> {
        let page = self.page()?;
        let nav = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        match timeout(budget, nav).await {
            Ok(Ok(())) => {
                info!("Navigated to: {}", url);
                Ok(())
            }
            Ok(Err(e)) => Err(AuditError::Navigation(e.to_string())),
            Err(_) => Err(AuditError::NavigationTimeout {
                url: url.to_string(),
                budget,
            }),
        }
    }

    async fn fill_field(&mut self, selector: &str, value: &str) -> Result<()> {
        let element = self.find_element(selector).await?;
        element
            .click()
            .await
            .map_err(|_| AuditError::ElementNotFound(selector.to_string()))?;
        element
            .type_str(value)
            .await
            .map_err(|_| AuditError::ElementNotFound(selector.to_string()))?;
        debug!("Filled field: {}", selector);
        Ok(())
    }

    async fn submit_and_await_navigation(
        &mut self,
        selector: &str,
        budget: Duration,
    ) -> Result<()> {
        let element = self.find_element(selector).await?;
        let page = self.page()?;

        // Arm the navigation wait concurrently with the click; both must
        // complete for the submission to count.
        let submit = async {
            let (click, nav) =
                futures::future::join(element.click(), page.wait_for_navigation()).await;
            click?;
            nav?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        match timeout(budget, submit).await {
            Ok(Ok(())) => {
                info!("Form submitted, results page reached");
                Ok(())
            }
            Ok(Err(e)) => Err(AuditError::Submit(e.to_string())),
            Err(_) => Err(AuditError::Submit(format!(
                "no navigation within {:?} after submitting",
                budget
            ))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            let shutdown = async move {
                if let Err(e) = browser.close().await {
                    warn!("Browser did not close cleanly: {}", e);
                }
                let _ = browser.wait().await;
            };
            // Bounded: a wedged browser must not stall cleanup forever.
            // On timeout the Browser is dropped mid-shutdown, which kills
            // the child process.
            match timeout(Duration::from_secs(10), shutdown).await {
                Ok(()) => info!("Browser closed"),
                Err(_) => warn!("Browser close timed out"),
            }
        }
        self.handler_task.abort();
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // close() normally runs first; this is the fallback for early
        // exits so the CDP event loop task does not outlive the session.
        self.handler_task.abort();
        if let Some(mut browser) = self.browser.take() {
            warn!("ChromeSession dropped without close(); killing browser");
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = browser.kill().await;
                });
            }
        }
    }
}
