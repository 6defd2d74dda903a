//! Google Drive upload client
//!
//! Transfers one local report to Drive and derives a shareable link from
//! the returned file id. Failures are classified retryable vs. fatal on
//! the error itself; no retry is performed here.

use crate::error::{AuditError, Result};
use async_trait::async_trait;
use base64::Engine;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

const DRIVE_API_BASE: &str = "https://www.googleapis.com";
const SHARE_LINK_TEMPLATE: &str = "https://drive.google.com/file/d/{id}/view";

/// The durable reference returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub remote_id: String,
    pub shareable_link: String,
}

impl UploadResult {
    /// Derive the shareable link from a Drive file id; no extra round trip.
    pub fn from_remote_id(remote_id: String) -> Self {
        let shareable_link = SHARE_LINK_TEMPLATE.replace("{id}", &remote_id);
        Self {
            remote_id,
            shareable_link,
        }
    }
}

/// Seam for the orchestrator; production uses [`DriveClient`], tests use
/// stubs.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file_path: &Path, display_name: &str) -> Result<UploadResult>;
}

/// Authentication material for Drive, read-only after process start and
/// safe to share across concurrent pipeline executions.
#[derive(Debug, Clone)]
pub struct DriveCredentials {
    token: String,
}

impl DriveCredentials {
    pub fn new(token: String) -> Self {
        Self { token }
    }

    /// Decode a base64-encoded secret as provided by the deployment
    /// environment.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuditError::Credentials(format!("invalid base64 secret: {}", e)))?;
        let token = String::from_utf8(bytes)
            .map_err(|_| AuditError::Credentials("secret is not valid UTF-8".to_string()))?
            .trim()
            .to_string();
        if token.is_empty() {
            return Err(AuditError::Credentials("decoded secret is empty".to_string()));
        }
        Ok(Self::new(token))
    }
}

/// Drive upload client. The API base is configurable so tests can point
/// it at a stub server.
pub struct DriveClient {
    client: Client,
    credentials: Option<DriveCredentials>,
    api_base: String,
}

#[derive(Deserialize)]
struct DriveFileResponse {
    id: String,
}

impl DriveClient {
    pub fn new(credentials: Option<DriveCredentials>) -> Result<Self> {
        Self::with_api_base(credentials, DRIVE_API_BASE)
    }

    pub fn with_api_base(credentials: Option<DriveCredentials>, api_base: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AuditError::Upload {
                message: format!("failed to build HTTP client: {}", e),
                retryable: false,
            })?;

        Ok(Self {
            client,
            credentials,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Map an HTTP status to the retryable/fatal classification.
    ///
    /// Auth failures are fatal; quota and server-side errors might clear
    /// up on a later attempt.
    fn classify(status: StatusCode) -> bool {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            false
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            true
        } else {
            status.is_server_error()
        }
    }
}

/// Per-request multipart boundary, derived from the clock.
fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("audit-runner-{:032x}", nanos)
}

#[async_trait]
impl Uploader for DriveClient {
    async fn upload(&self, file_path: &Path, display_name: &str) -> Result<UploadResult> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            AuditError::Credentials(
                "no Drive credentials configured; set GOOGLE_DRIVE_TOKEN_BASE64".to_string(),
            )
        })?;

        info!("Uploading {} to Google Drive", file_path.display());

        // Only the base file name goes into the remote metadata; the
        // report content is streamed, never inspected. Drive's
        // `uploadType=multipart` endpoint requires a multipart/related
        // body (metadata part, then media part), so the envelope is
        // assembled by hand around the streamed file.
        let metadata = serde_json::json!({ "name": display_name }).to_string();
        let boundary = multipart_boundary();
        let head = format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
             --{b}\r\nContent-Type: application/pdf\r\n\r\n",
            b = boundary,
            meta = metadata
        );
        let tail = format!("\r\n--{}--\r\n", boundary);

        let file = tokio::fs::File::open(file_path).await?;
        let file_stream = ReaderStream::new(file).map_ok(|chunk| chunk.to_vec());
        let body = Body::wrap_stream(
            futures::stream::iter([Ok::<Vec<u8>, std::io::Error>(head.into_bytes())])
                .chain(file_stream)
                .chain(futures::stream::iter([Ok(tail.into_bytes())])),
        );

        let url = format!(
            "{}/upload/drive/v3/files?uploadType=multipart&fields=id",
            self.api_base
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credentials.token)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| AuditError::Upload {
                message: format!("request failed: {}", e),
                retryable: true,
            })?;

        let status = response.status();
        if !status.is_success() {
            let retryable = Self::classify(status);
            let detail = response.text().await.unwrap_or_default();
            warn!("Drive upload failed with {}: {}", status, detail);
            return Err(AuditError::Upload {
                message: format!("Drive returned {}: {}", status, detail),
                retryable,
            });
        }

        let parsed: DriveFileResponse =
            response.json().await.map_err(|e| AuditError::Upload {
                message: format!("unreadable Drive response: {}", e),
                retryable: true,
            })?;

        let result = UploadResult::from_remote_id(parsed.id);
        info!("Uploaded, shareable link: {}", result.shareable_link);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_template() {
        let result = UploadResult::from_remote_id("abc123".to_string());
        assert_eq!(
            result.shareable_link,
            "https://drive.google.com/file/d/abc123/view"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(!DriveClient::classify(StatusCode::UNAUTHORIZED));
        assert!(!DriveClient::classify(StatusCode::FORBIDDEN));
        assert!(!DriveClient::classify(StatusCode::BAD_REQUEST));
        assert!(DriveClient::classify(StatusCode::TOO_MANY_REQUESTS));
        assert!(DriveClient::classify(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(DriveClient::classify(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn test_credentials_from_base64() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("ya29.token\n");
        let creds = DriveCredentials::from_base64(&encoded).unwrap();
        assert_eq!(creds.token, "ya29.token");

        assert!(DriveCredentials::from_base64("not!!base64").is_err());
        let empty = base64::engine::general_purpose::STANDARD.encode("  ");
        assert!(DriveCredentials::from_base64(&empty).is_err());
    }

    #[tokio::test]
    async fn test_upload_without_credentials_fails() {
        let client = DriveClient::new(None).unwrap();
        let err = client
            .upload(Path::new("/tmp/missing.pdf"), "missing.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Credentials(_)));
    }

    #[tokio::test]
    #[ignore] // Requires real Drive credentials
    async fn test_real_upload() {
        dotenvy::dotenv().ok();
        let encoded = std::env::var("GOOGLE_DRIVE_TOKEN_BASE64").unwrap();
        let creds = DriveCredentials::from_base64(&encoded).unwrap();
        let client = DriveClient::new(Some(creds)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smoke.pdf");
        std::fs::write(&path, b"%PDF-1.4 smoke test").unwrap();

        let result = client.upload(&path, "smoke.pdf").await.unwrap();
        assert!(result.shareable_link.contains(&result.remote_id));
    }
}
