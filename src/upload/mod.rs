use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::io::ReaderStream;

use crate::error::PipelineError;
use crate::utils::{format_duration, Poller, RetriesExhausted};

/// Body returned by the downstream API, kept byte for byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl UploadResponse {
    /// Body as text, with invalid UTF-8 replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Failure of a single upload attempt
#[derive(thiserror::Error, Debug, Clone)]
#[error("{message}")]
pub struct AttemptError {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub message: String,
}

impl AttemptError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            body: None,
            message: message.into(),
        }
    }
}

/// Performs one upload of a file to an endpoint
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(&self, file_path: &Path, endpoint: &str) -> Result<UploadResponse, AttemptError>;
}

/// Multipart POST with the file under a single form field
pub struct MultipartTransport {
    client: Client,
    field_name: String,
    mime_type: String,
}

impl MultipartTransport {
    pub fn new(timeout: Duration, field_name: impl Into<String>) -> Result<Self, PipelineError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            PipelineError::UploadFailed {
                attempts: 0,
                status: None,
                body: None,
                message: format!("Failed to build HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            client,
            field_name: field_name.into(),
            mime_type: "audio/mpeg".to_string(),
        })
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Build a fresh form per attempt; a consumed stream cannot be resent
    async fn form_for(&self, file_path: &Path) -> Result<Form, AttemptError> {
        let file = tokio::fs::File::open(file_path)
            .await
            .map_err(|e| AttemptError::transport(format!("Failed to open {}: {}", file_path.display(), e)))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| AttemptError::transport(e.to_string()))?
            .len();

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(file_name)
            .mime_str(&self.mime_type)
            .map_err(|e| AttemptError::transport(e.to_string()))?;

        Ok(Form::new().part(self.field_name.clone(), part))
    }
}

#[async_trait]
impl UploadTransport for MultipartTransport {
    async fn send(&self, file_path: &Path, endpoint: &str) -> Result<UploadResponse, AttemptError> {
        let form = self.form_for(file_path).await?;

        let response = self
            .client
            .post(endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AttemptError::transport(e.to_string()))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string());
        let body = response
            .bytes()
            .await
            .map_err(|e| AttemptError::transport(e.to_string()))?
            .to_vec();

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body).into_owned();
            return Err(AttemptError {
                status: Some(status.as_u16()),
                message: format!("HTTP {}: {}", status, text),
                body: Some(text),
            });
        }

        Ok(UploadResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Pushes the final artifact downstream with bounded retry
#[derive(Clone)]
pub struct UploadClient {
    transport: Arc<dyn UploadTransport>,
    retry: Poller,
}

impl UploadClient {
    pub fn new(transport: Arc<dyn UploadTransport>, retry: Poller) -> Self {
        Self { transport, retry }
    }

    /// Upload `file_path` to `endpoint`; the final attempt's error is the one reported
    pub async fn upload(&self, file_path: &Path, endpoint: &str) -> Result<UploadResponse, PipelineError> {
        tracing::info!("Uploading to analysis API: {}", endpoint);
        let started = Instant::now();

        let response = self
            .retry
            .retry(|attempt| async move {
                tracing::info!("Upload attempt: {}", attempt);
                self.transport.send(file_path, endpoint).await
            })
            .await
            .map_err(|RetriesExhausted { error, attempts }| PipelineError::UploadFailed {
                attempts,
                status: error.status,
                body: error.body,
                message: error.message,
            })?;

        tracing::info!(
            "Upload took: {}",
            format_duration(started.elapsed().as_secs_f64())
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use std::sync::Mutex;

    /// Replays a fixed script of attempt outcomes
    struct ScriptedTransport {
        script: Mutex<Vec<Result<UploadResponse, AttemptError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedTransport {
        fn new(mut script: Vec<Result<UploadResponse, AttemptError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl UploadTransport for ScriptedTransport {
        async fn send(&self, _: &Path, _: &str) -> Result<UploadResponse, AttemptError> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(AttemptError::transport("script exhausted")))
        }
    }

    fn ok(body: &str) -> Result<UploadResponse, AttemptError> {
        Ok(UploadResponse {
            status: 200,
            content_type: Some("application/json".into()),
            body: body.as_bytes().to_vec(),
        })
    }

    fn bad_gateway(n: u32) -> Result<UploadResponse, AttemptError> {
        Err(AttemptError {
            status: Some(502),
            body: Some(format!("bad gateway {}", n)),
            message: format!("HTTP 502: bad gateway {}", n),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_attempt_response_is_returned() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            bad_gateway(1),
            bad_gateway(2),
            ok(r#"{"id":"third"}"#),
        ]));
        let client = UploadClient::new(transport.clone(), Poller::new(Duration::from_secs(10), 3));

        let response = client
            .upload(Path::new("/tmp/a.mp3"), "https://api.test/upload")
            .await
            .unwrap();

        assert_eq!(response.text(), r#"{"id":"third"}"#);
        assert_eq!(*transport.calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_attempts_with_last_error() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            bad_gateway(1),
            bad_gateway(2),
            bad_gateway(3),
            ok("never reached"),
        ]));
        let client = UploadClient::new(transport.clone(), Poller::new(Duration::from_secs(10), 3));

        let err = client
            .upload(Path::new("/tmp/a.mp3"), "https://api.test/upload")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UploadFailed);
        match err {
            PipelineError::UploadFailed { attempts, status, body, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(status, Some(502));
                assert_eq!(body.as_deref(), Some("bad gateway 3"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*transport.calls.lock().unwrap(), 3);
    }

    async fn spawn_upload_api() -> String {
        let app = Router::new()
            .route(
                "/api/upload",
                post(|headers: HeaderMap, body: Bytes| async move {
                    let content_type = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let text = String::from_utf8_lossy(&body);
                    if content_type.starts_with("multipart/form-data")
                        && text.contains("name=\"video\"")
                        && text.contains("AUDIODATA")
                    {
                        (StatusCode::OK, r#"{"status":"received"}"#.to_string())
                    } else {
                        (StatusCode::BAD_REQUEST, "missing file field".to_string())
                    }
                }),
            )
            .route(
                "/api/latin1",
                post(|| async {
                    (
                        [("content-type", "text/plain; charset=iso-8859-1")],
                        vec![b'c', b'a', b'f', 0xE9, 0xFF],
                    )
                }),
            )
            .route(
                "/api/broken",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "processing crashed") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_multipart_transport_sends_file_field() {
        let base = spawn_upload_api().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("staged.mp3");
        std::fs::write(&file, b"ID3-AUDIODATA-END").unwrap();

        let transport = MultipartTransport::new(Duration::from_secs(120), "video").unwrap();
        let response = transport
            .send(&file, &format!("{}/api/upload", base))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), r#"{"status":"received"}"#);
    }

    #[tokio::test]
    async fn test_multipart_transport_keeps_body_bytes() {
        let base = spawn_upload_api().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("staged.mp3");
        std::fs::write(&file, b"AUDIODATA").unwrap();

        let transport = MultipartTransport::new(Duration::from_secs(120), "video").unwrap();
        let response = transport
            .send(&file, &format!("{}/api/latin1", base))
            .await
            .unwrap();

        assert_eq!(response.body, vec![b'c', b'a', b'f', 0xE9, 0xFF]);
    }

    #[tokio::test]
    async fn test_multipart_transport_reports_status_and_body() {
        let base = spawn_upload_api().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("staged.mp3");
        std::fs::write(&file, b"AUDIODATA").unwrap();

        let transport = MultipartTransport::new(Duration::from_secs(120), "video").unwrap();
        let err = transport
            .send(&file, &format!("{}/api/broken", base))
            .await
            .unwrap_err();

        assert_eq!(err.status, Some(500));
        assert_eq!(err.body.as_deref(), Some("processing crashed"));
    }
}
