//! Drive upload wire-format tests
//!
//! These run the real `DriveClient` against a one-shot TCP stub that
//! captures the raw request, verifying the multipart/related envelope
//! Drive's `uploadType=multipart` endpoint requires, and the
//! retryable/fatal classification of error responses.

use audit_runner::{AuditError, DriveClient, DriveCredentials, Uploader};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve exactly one HTTP exchange, returning the captured raw request.
///
/// Reads until the end of the chunked body (streamed uploads have no
/// Content-Length), then answers with the given status and JSON body.
async fn spawn_stub(
    status_line: &'static str,
    body: &'static str,
) -> (u16, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut captured = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            captured.extend_from_slice(&chunk[..n]);
            // Terminating chunk of a chunked transfer.
            if captured.windows(7).any(|w| w == b"\r\n0\r\n\r\n") {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        String::from_utf8_lossy(&captured).into_owned()
    });

    (port, handle)
}

fn stub_client(port: u16) -> DriveClient {
    DriveClient::with_api_base(
        Some(DriveCredentials::new("test-token".to_string())),
        &format!("http://127.0.0.1:{}", port),
    )
    .unwrap()
}

fn write_report(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("seo-report.pdf");
    std::fs::write(&path, b"%PDF-1.4 stub report").unwrap();
    path
}

#[tokio::test]
async fn test_upload_sends_multipart_related() {
    let (port, stub) = spawn_stub("200 OK", r#"{"id":"abc123"}"#).await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_report(&dir);

    let result = stub_client(port)
        .upload(&path, "seo-report.pdf")
        .await
        .unwrap();
    assert_eq!(result.remote_id, "abc123");
    assert_eq!(
        result.shareable_link,
        "https://drive.google.com/file/d/abc123/view"
    );

    let request = stub.await.unwrap();

    // Drive's multipart endpoint takes multipart/related, not form-data.
    assert!(
        request.contains("content-type: multipart/related; boundary=")
            || request.contains("Content-Type: multipart/related; boundary="),
        "request head was:\n{}",
        request
    );
    assert!(request.contains("uploadType=multipart&fields=id"));
    assert!(request.contains("authorization: Bearer test-token")
        || request.contains("Authorization: Bearer test-token"));

    // Metadata part carries only the base file name; media part carries
    // the report bytes; the envelope is properly terminated.
    assert!(request.contains(r#"{"name":"seo-report.pdf"}"#));
    assert!(request.contains("Content-Type: application/json; charset=UTF-8"));
    assert!(request.contains("Content-Type: application/pdf"));
    assert!(request.contains("%PDF-1.4 stub report"));
    let boundary_terminators = request.matches("--\r\n").count();
    assert!(boundary_terminators >= 1, "missing closing boundary");
}

#[tokio::test]
async fn test_auth_failure_is_fatal() {
    let (port, stub) = spawn_stub("401 Unauthorized", r#"{"error":"invalid token"}"#).await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_report(&dir);

    let err = stub_client(port)
        .upload(&path, "seo-report.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::Upload { retryable: false, .. }));
    stub.await.unwrap();
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let (port, stub) = spawn_stub("503 Service Unavailable", r#"{"error":"backend"}"#).await;
    let dir = tempfile::tempdir().unwrap();
    let path = write_report(&dir);

    let err = stub_client(port)
        .upload(&path, "seo-report.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::Upload { retryable: true, .. }));
    stub.await.unwrap();
}
