//! Heartbeat sender for the DraftTrack plugin.
//!
//! The tracking backend is consumed through two pieces:
//!
//! - [`SenderHandle`]: the [`TrackingClient`] implementation handed to the
//!   translator. It stamps a [`Heartbeat`] and enqueues it with a
//!   non-blocking send, so the host's UI thread is never stalled.
//! - [`HeartbeatSender`]: owns a small Tokio runtime and the background
//!   flush task that batches heartbeats to the backend with:
//!   - Connection pooling via reqwest
//!   - Bounded pending buffer (FIFO eviction when full)
//!   - Exponential backoff retry (1s → 60s max, ±25% jitter)
//!   - Rate limit handling (429 with Retry-After header)
//!
//! The batching logic itself lives in [`HeartbeatBatcher`], which is plain
//! async code and independently testable.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use drafttrack_plugin::sender::{HeartbeatSender, SenderConfig};
//! use drafttrack_plugin::translator::TrackingClient;
//!
//! let config = SenderConfig::new(
//!     "https://track.example.com".to_string(),
//!     "my-api-key".to_string(),
//!     "drafting-station-7".to_string(),
//! );
//! let mut sender = HeartbeatSender::spawn(config).unwrap();
//!
//! let handle = sender.handle();
//! handle.record_project_opened(Path::new("/proj")).unwrap();
//! handle.record_file_activity(Path::new("/proj/model.dat")).unwrap();
//!
//! let undelivered = sender.shutdown(Duration::from_secs(5));
//! assert_eq!(undelivered, 0);
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::translator::TrackingClient;
use crate::types::{Heartbeat, HeartbeatKind};

/// Default pending buffer capacity.
const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Default interval between batch flushes.
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Jitter factor (±25%).
const JITTER_FACTOR: f64 = 0.25;

/// HTTP request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur while recording or sending heartbeats.
#[derive(Error, Debug)]
pub enum SenderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error status.
    #[error("server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed (401).
    #[error("authentication failed: invalid API key")]
    AuthFailed,

    /// The enqueue buffer is full; the heartbeat was dropped.
    #[error("heartbeat buffer is full")]
    BufferFull,

    /// The sender has already been shut down.
    #[error("sender is shut down")]
    Closed,

    /// Maximum retry attempts exceeded.
    #[error("max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The sender runtime could not be started.
    #[error("failed to start sender runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Retry behavior for a failing batch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap on the backoff delay.
    pub max_delay: Duration,

    /// Attempts per batch before giving up (the batch stays pending and is
    /// retried on the next flush tick).
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// A near-instant policy for tests.
    #[must_use]
    pub fn fast_for_tests() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            max_attempts: 2,
        }
    }
}

/// Configuration for the sender.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Backend base URL (e.g., `https://track.example.com`).
    pub api_url: String,

    /// API key sent as a Basic authorization header.
    pub api_key: String,

    /// Source ID stamped onto every heartbeat.
    pub source_id: String,

    /// Capacity of the enqueue channel and the pending buffer.
    pub buffer_size: usize,

    /// Interval between batch flushes.
    pub flush_interval: Duration,

    /// Retry behavior for failing batches.
    pub retry: RetryPolicy,
}

impl SenderConfig {
    /// Creates a sender configuration with default buffering and retry
    /// behavior.
    #[must_use]
    pub fn new(api_url: String, api_key: String, source_id: String) -> Self {
        Self {
            api_url,
            api_key,
            source_id,
            buffer_size: DEFAULT_BUFFER_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the buffer capacity.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Overrides the flush interval.
    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Batches heartbeats to the backend with buffering and retry logic.
pub struct HeartbeatBatcher {
    config: SenderConfig,
    client: Client,
    auth_header: String,
    pending: VecDeque<Heartbeat>,
    current_retry_delay: Duration,
}

impl HeartbeatBatcher {
    /// Creates a new batcher for the given configuration.
    #[must_use]
    pub fn new(config: SenderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(2)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            auth_header: format!("Basic {}", BASE64.encode(&config.api_key)),
            pending: VecDeque::with_capacity(config.buffer_size),
            current_retry_delay: config.retry.initial_delay,
            config,
            client,
        }
    }

    /// Queues a heartbeat for the next flush.
    ///
    /// If the pending buffer is full, the oldest heartbeats are evicted to
    /// make room. Returns the number of evicted heartbeats.
    pub fn queue(&mut self, heartbeat: Heartbeat) -> usize {
        let mut evicted = 0;

        while self.pending.len() >= self.config.buffer_size {
            self.pending.pop_front();
            evicted += 1;
        }

        self.pending.push_back(heartbeat);

        if evicted > 0 {
            warn!(evicted_count = evicted, "Pending buffer overflow, heartbeats evicted");
        }

        evicted
    }

    /// Returns the number of heartbeats waiting to be sent.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is waiting to be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Flushes all pending heartbeats to the backend.
    ///
    /// Heartbeats are sent in a single batch. On success, the pending
    /// buffer is cleared. On failure, heartbeats stay pending for the next
    /// flush.
    ///
    /// # Errors
    ///
    /// Returns `SenderError` if the batch cannot be sent after all retries.
    pub async fn flush(&mut self) -> Result<(), SenderError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let heartbeats: Vec<Heartbeat> = self.pending.iter().cloned().collect();
        self.send_batch(&heartbeats).await?;

        self.pending.clear();
        self.reset_retry_delay();
        Ok(())
    }

    /// Sends a batch of heartbeats with retry logic.
    async fn send_batch(&mut self, heartbeats: &[Heartbeat]) -> Result<(), SenderError> {
        let url = format!("{}/heartbeats", self.config.api_url);
        let body = serde_json::to_string(heartbeats)?;

        let mut attempts = 0;

        loop {
            attempts += 1;

            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&self.auth_header)
                    .unwrap_or_else(|_| HeaderValue::from_static("Basic")),
            );

            debug!(
                url = %url,
                heartbeats = heartbeats.len(),
                attempt = attempts,
                "Sending heartbeat batch"
            );

            let result = self
                .client
                .post(&url)
                .headers(headers)
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    match status {
                        StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                            info!(heartbeats = heartbeats.len(), "Heartbeats sent successfully");
                            self.reset_retry_delay();
                            return Ok(());
                        }
                        StatusCode::UNAUTHORIZED => {
                            error!("Authentication failed");
                            return Err(SenderError::AuthFailed);
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            let retry_after = self.parse_retry_after(&response);
                            warn!(retry_after_secs = retry_after, "Rate limited by backend");

                            if attempts >= self.config.retry.max_attempts {
                                return Err(SenderError::MaxRetriesExceeded { attempts });
                            }

                            sleep(Duration::from_secs(retry_after)).await;
                            continue;
                        }
                        _ if status.is_server_error() => {
                            let message = response.text().await.unwrap_or_default();
                            warn!(
                                status = status.as_u16(),
                                message = %message,
                                "Server error, will retry"
                            );

                            if attempts >= self.config.retry.max_attempts {
                                return Err(SenderError::ServerError {
                                    status: status.as_u16(),
                                    message,
                                });
                            }

                            self.wait_with_backoff().await;
                            continue;
                        }
                        _ => {
                            let message = response.text().await.unwrap_or_default();
                            return Err(SenderError::ServerError {
                                status: status.as_u16(),
                                message,
                            });
                        }
                    }
                }
                Err(e) => {
                    if e.is_timeout() || e.is_connect() {
                        warn!(error = %e, "Connection error, will retry");

                        if attempts >= self.config.retry.max_attempts {
                            return Err(SenderError::MaxRetriesExceeded { attempts });
                        }

                        self.wait_with_backoff().await;
                        continue;
                    }

                    return Err(SenderError::Http(e));
                }
            }
        }
    }

    /// Parses the Retry-After header from a 429 response.
    fn parse_retry_after(&self, response: &reqwest::Response) -> u64 {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(self.current_retry_delay.as_secs())
    }

    /// Waits for the current retry delay with jitter, then increases the delay.
    async fn wait_with_backoff(&mut self) {
        let delay = self.add_jitter(self.current_retry_delay);
        debug!(delay_ms = delay.as_millis(), "Waiting before retry");
        sleep(delay).await;
        self.increase_retry_delay();
    }

    /// Adds ±25% jitter to a duration.
    fn add_jitter(&self, duration: Duration) -> Duration {
        let mut rng = rand::rng();
        let jitter_range = duration.as_secs_f64() * JITTER_FACTOR;
        let jitter = rng.random_range(-jitter_range..=jitter_range);
        let new_secs = (duration.as_secs_f64() + jitter).max(0.001);
        Duration::from_secs_f64(new_secs)
    }

    /// Doubles the retry delay up to the maximum.
    fn increase_retry_delay(&mut self) {
        self.current_retry_delay =
            (self.current_retry_delay * 2).min(self.config.retry.max_delay);
    }

    /// Resets the retry delay to the initial value.
    fn reset_retry_delay(&mut self) {
        self.current_retry_delay = self.config.retry.initial_delay;
    }
}

/// Cloneable enqueue handle; the [`TrackingClient`] implementation handed to
/// the translator.
#[derive(Clone)]
pub struct SenderHandle {
    tx: mpsc::Sender<Heartbeat>,
    source_id: String,
}

impl SenderHandle {
    fn submit(&self, entity: &Path, kind: HeartbeatKind) -> Result<(), SenderError> {
        let heartbeat = Heartbeat::new(
            self.source_id.clone(),
            entity.to_string_lossy().into_owned(),
            kind,
        );

        // try_send keeps the host thread from ever blocking on the backend.
        self.tx.try_send(heartbeat).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SenderError::BufferFull,
            mpsc::error::TrySendError::Closed(_) => SenderError::Closed,
        })
    }
}

impl TrackingClient for SenderHandle {
    type Error = SenderError;

    fn record_project_opened(&self, project_path: &Path) -> Result<(), SenderError> {
        self.submit(project_path, HeartbeatKind::ProjectOpened)
    }

    fn record_file_activity(&self, file_path: &Path) -> Result<(), SenderError> {
        self.submit(file_path, HeartbeatKind::FileActivity)
    }
}

/// Owns the sender runtime and background flush task.
///
/// A plugin loaded into a synchronous host has no ambient async runtime, so
/// the sender brings its own single-worker runtime and keeps the host-facing
/// surface fully synchronous.
pub struct HeartbeatSender {
    handle: SenderHandle,
    runtime: Option<tokio::runtime::Runtime>,
    task: Option<tokio::task::JoinHandle<usize>>,
    stop_tx: Option<oneshot::Sender<()>>,
    pending_gauge: Arc<AtomicUsize>,
}

impl HeartbeatSender {
    /// Starts the runtime and flush task.
    ///
    /// # Errors
    ///
    /// Returns [`SenderError::Runtime`] if the Tokio runtime cannot be
    /// built.
    pub fn spawn(config: SenderConfig) -> Result<Self, SenderError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("drafttrack-sender")
            .enable_all()
            .build()
            .map_err(SenderError::Runtime)?;

        let (tx, rx) = mpsc::channel(config.buffer_size);
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = SenderHandle {
            tx,
            source_id: config.source_id.clone(),
        };
        let pending_gauge = Arc::new(AtomicUsize::new(0));

        let flush_interval = config.flush_interval;
        let batcher = HeartbeatBatcher::new(config);
        let task = runtime.spawn(run_flush_loop(
            batcher,
            rx,
            stop_rx,
            flush_interval,
            Arc::clone(&pending_gauge),
        ));

        Ok(Self {
            handle,
            runtime: Some(runtime),
            task: Some(task),
            stop_tx: Some(stop_tx),
            pending_gauge,
        })
    }

    /// Returns a cloneable enqueue handle.
    #[must_use]
    pub fn handle(&self) -> SenderHandle {
        self.handle.clone()
    }

    /// Heartbeats currently waiting in the pending buffer.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending_gauge.load(Ordering::Relaxed)
    }

    /// Stops the flush task, waiting up to `timeout` for a final flush, and
    /// tears the runtime down.
    ///
    /// Must be called from a synchronous context (the host command thread
    /// qualifies). A second call is a no-op.
    ///
    /// Returns the number of heartbeats that could not be delivered.
    pub fn shutdown(&mut self, timeout: Duration) -> usize {
        let Some(stop_tx) = self.stop_tx.take() else {
            return 0;
        };
        let _ = stop_tx.send(());

        let undelivered = match (self.runtime.as_ref(), self.task.take()) {
            (Some(runtime), Some(task)) => {
                runtime.block_on(async {
                    match tokio::time::timeout(timeout, task).await {
                        Ok(Ok(count)) => count,
                        Ok(Err(e)) => {
                            error!(error = %e, "Sender flush task failed");
                            self.pending_gauge.load(Ordering::Relaxed)
                        }
                        Err(_) => {
                            error!("Timeout while flushing heartbeats during shutdown");
                            self.pending_gauge.load(Ordering::Relaxed)
                        }
                    }
                })
            }
            _ => 0,
        };

        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }

        if undelivered > 0 {
            error!(undelivered, "Some heartbeats could not be delivered");
        }
        undelivered
    }
}

impl Drop for HeartbeatSender {
    fn drop(&mut self) {
        // Conservative path for a sender that was never shut down: release
        // the runtime without blocking. Delivery of anything still pending
        // is best-effort.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Receives heartbeats from the enqueue channel and flushes them on a timer.
async fn run_flush_loop(
    mut batcher: HeartbeatBatcher,
    mut rx: mpsc::Receiver<Heartbeat>,
    mut stop_rx: oneshot::Receiver<()>,
    flush_interval: Duration,
    pending_gauge: Arc<AtomicUsize>,
) -> usize {
    let mut ticker = tokio::time::interval(flush_interval);

    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(heartbeat) => {
                    batcher.queue(heartbeat);
                    pending_gauge.store(batcher.pending_len(), Ordering::Relaxed);
                }
                // All enqueue handles are gone; drain and exit.
                None => break,
            },
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                if let Err(e) = batcher.flush().await {
                    warn!(error = %e, pending = batcher.pending_len(), "Flush failed, will retry");
                }
                pending_gauge.store(batcher.pending_len(), Ordering::Relaxed);
            }
        }
    }

    // Pick up anything that raced the stop signal, then flush once more.
    while let Ok(heartbeat) = rx.try_recv() {
        batcher.queue(heartbeat);
    }
    if let Err(e) = batcher.flush().await {
        error!(error = %e, undelivered = batcher.pending_len(), "Final flush failed");
    }
    pending_gauge.store(batcher.pending_len(), Ordering::Relaxed);
    batcher.pending_len()
}
