//! Request plumbing shared by every endpoint
//!
//! Bodies are streamed so the number of bytes handed to the transport can be
//! sampled while a request is in flight.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::TryStreamExt;
use reqwest::Body;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, Result};

/// API key header sent with every request
pub const API_KEY_HEADER: &str = "X-Avalab-Api-Key";

/// Access token header sent with authorized requests
pub const OAUTH_TOKEN_HEADER: &str = "x-avalab-oauth-token";

/// Server-assigned request id, echoed back on failures
pub const REQUEST_ID_HEADER: &str = "X-Avalab-Request-ID";

/// Content type of asset bundle uploads
pub const MODEL_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type of thumbnail uploads
pub const THUMBNAIL_CONTENT_TYPE: &str = "image/png";

/// Sampling period of the progress poller
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upload progress callback, called with fractions in `0.0..=1.0`
pub type ProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// Request payload
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// No body
    Empty,
    /// JSON document
    Json(serde_json::Value),
    /// Raw file contents sent with their own content type
    File {
        path: PathBuf,
        content_type: &'static str,
    },
}

/// Credentials attached to a request. The API key is always sent.
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    ApiKey,
    Bearer(&'a str),
}

/// A body ready to send, with a counter of bytes handed to the transport
pub(crate) struct PreparedBody {
    pub body: Option<Body>,
    pub content_type: &'static str,
    pub total: u64,
    pub sent: Arc<AtomicU64>,
}

impl RequestBody {
    pub(crate) async fn prepare(self) -> Result<PreparedBody> {
        let sent = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sent);

        let prepared = match self {
            RequestBody::Empty => PreparedBody {
                body: None,
                content_type: "application/json",
                total: 0,
                sent,
            },
            RequestBody::Json(value) => {
                let bytes = serde_json::to_vec(&value)?;
                let total = bytes.len() as u64;
                let stream = futures::stream::once(async move { Ok::<_, std::io::Error>(bytes) })
                    .inspect_ok(move |chunk| {
                        counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                    });
                PreparedBody {
                    body: Some(Body::wrap_stream(stream)),
                    content_type: "application/json",
                    total,
                    sent,
                }
            }
            RequestBody::File { path, content_type } => {
                let file = tokio::fs::File::open(&path).await?;
                let total = file.metadata().await?.len();
                let stream = ReaderStream::new(file).inspect_ok(move |chunk| {
                    counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                });
                PreparedBody {
                    body: Some(Body::wrap_stream(stream)),
                    content_type,
                    total,
                    sent,
                }
            }
        };

        Ok(prepared)
    }
}

/// Background task reporting whole-percent upload steps
pub(crate) struct ProgressPoller {
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressPoller {
    pub fn spawn(sent: Arc<AtomicU64>, total: u64, progress: ProgressFn) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&done);

        let handle = tokio::spawn(async move {
            let mut reported = 0u64;
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                interval.tick().await;
                let sent = sent.load(Ordering::Relaxed);
                if stop.load(Ordering::Relaxed) || sent >= total {
                    break;
                }
                let percent = sent * 100 / total;
                if percent > reported {
                    reported = percent;
                    progress(percent as f32 / 100.0);
                }
            }
        });

        Self {
            done,
            handle: Some(handle),
        }
    }

    /// Stop polling and wait for the task to exit
    pub async fn finish(mut self) {
        self.done.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                log::debug!("Progress poller ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Decode a successful response body. Empty and `null` bodies read as `{}`.
pub(crate) fn decode_body<T: DeserializeOwned>(text: &str) -> std::result::Result<T, ApiError> {
    let trimmed = text.trim();
    let json = if trimmed.is_empty() || trimmed == "null" {
        "{}"
    } else {
        trimmed
    };
    serde_json::from_str(json).map_err(|e| ApiError::DecodeFailed {
        message: e.to_string(),
        body: text.to_string(),
    })
}
