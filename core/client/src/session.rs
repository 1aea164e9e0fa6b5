//! Upload session orchestration.
//!
//! One [`UploadSession::upload`] call runs the whole pipeline: validate the
//! document, fetch the bearer token, encrypt, build the envelope, POST it,
//! and consume the streamed (or single-shot) response into a terminal
//! outcome. Each attempt owns its own state machine, elapsed-time ticker,
//! and cancellation handle; attempts never share mutable state.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{header, Client};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use sealpost_common::{Document, Error, Result};

use crate::auth::AuthProvider;
use crate::envelope::{self, EnvelopeFormat};
use crate::frame::{FrameReader, ProgressRecord};
use crate::state::{Phase, StateMachine, UploadOutcome, UploadState};

/// Configuration for an upload session.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Upload endpoint of the summarization backend.
    pub endpoint: Url,
    /// Envelope shape this deployment expects.
    pub format: EnvelopeFormat,
}

impl UploadConfig {
    /// Create a configuration with the default pre-encrypted envelope.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            format: EnvelopeFormat::PreEncrypted,
        }
    }

    /// Select a different envelope shape.
    pub fn with_format(mut self, format: EnvelopeFormat) -> Self {
        self.format = format;
        self
    }
}

/// Observer and cancellation handle for one upload attempt.
///
/// Cloneable; all clones observe the same attempt. A monitor belongs to
/// exactly one attempt and is never reused.
#[derive(Clone)]
pub struct UploadMonitor {
    pub(crate) machine: Arc<RwLock<StateMachine>>,
    pub(crate) cancel: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
}

impl UploadMonitor {
    /// Create a monitor for a new attempt, in `Idle`.
    pub fn new() -> Self {
        Self {
            machine: Arc::new(RwLock::new(StateMachine::new())),
            cancel: Arc::new(Notify::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Snapshot of the attempt's current state.
    pub async fn state(&self) -> UploadState {
        self.machine.read().await.snapshot()
    }

    /// Abort the attempt.
    ///
    /// Mid-stream this stops reading, discards accumulated text, and freezes
    /// the attempt at `Error` with reason `Cancelled`; a `Complete` outcome
    /// can never be emitted afterwards.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.cancel.notify_one();
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for UploadMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// A running upload attempt started with [`UploadSession::begin`].
pub struct UploadHandle {
    monitor: UploadMonitor,
    task: JoinHandle<Result<UploadOutcome>>,
}

impl UploadHandle {
    /// The attempt's monitor, for progress polling and cancellation.
    pub fn monitor(&self) -> UploadMonitor {
        self.monitor.clone()
    }

    /// Abort the attempt.
    pub fn cancel(&self) {
        self.monitor.cancel();
    }

    /// Wait for the attempt's terminal outcome.
    pub async fn join(self) -> Result<UploadOutcome> {
        self.task
            .await
            .map_err(|e| Error::TransportFailure(format!("Upload task failed: {}", e)))?
    }
}

/// Single-shot response body used by non-streaming deployments.
#[derive(Debug, Deserialize)]
struct SingleShotResponse {
    summary: String,
    #[serde(default)]
    phi_verification: BTreeMap<String, bool>,
}

/// Client session for uploading documents to the summarization backend.
#[derive(Clone)]
pub struct UploadSession {
    http: Client,
    config: UploadConfig,
    auth: Arc<dyn AuthProvider>,
}

impl UploadSession {
    /// Create a new session.
    pub fn new(config: UploadConfig, auth: Arc<dyn AuthProvider>) -> Self {
        let http = Client::builder()
            .user_agent("Sealpost/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self { http, config, auth }
    }

    /// Upload a document and wait for its terminal outcome.
    ///
    /// # Preconditions
    /// - Document media type must be `application/pdf`
    /// - The auth provider must return a token
    ///
    /// # Errors
    /// - `UnsupportedMediaType`, `Unauthenticated` (fail fast, no network call)
    /// - `EncryptionFailure` from the envelope step
    /// - `TransportFailure` when the transport rejects the request
    /// - `Server`, `MalformedInput`, `IncompleteStream`, `Cancelled` from
    ///   the response stream
    pub async fn upload(&self, document: Document) -> Result<UploadOutcome> {
        self.run(document, UploadMonitor::new()).await
    }

    /// Start an upload in the background, returning a handle for progress
    /// observation and cancellation.
    pub fn begin(&self, document: Document) -> UploadHandle {
        let monitor = UploadMonitor::new();
        let session = self.clone();
        let attempt_monitor = monitor.clone();
        let task = tokio::spawn(async move { session.run(document, attempt_monitor).await });

        UploadHandle { monitor, task }
    }

    /// Run one attempt against the given monitor.
    async fn run(&self, document: Document, monitor: UploadMonitor) -> Result<UploadOutcome> {
        let attempt = Uuid::new_v4();
        tracing::info!(%attempt, size = document.len(), "Starting upload");

        let result = self.run_pipeline(&document, &monitor).await;

        match &result {
            Ok(outcome) => {
                tracing::info!(%attempt, elapsed = outcome.elapsed_seconds, "Upload complete");
            }
            Err(error) => {
                // Freeze the observable state; no-op if the stream already did
                monitor.machine.write().await.fail(error);
                tracing::warn!(%attempt, %error, "Upload failed");
            }
        }

        result
    }

    async fn run_pipeline(
        &self,
        document: &Document,
        monitor: &UploadMonitor,
    ) -> Result<UploadOutcome> {
        monitor.machine.write().await.begin_preparing();

        if monitor.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if !document.media_type().is_pdf() {
            return Err(Error::UnsupportedMediaType(
                document.media_type().to_string(),
            ));
        }

        // Fail fast: no token, no network call
        let token = self
            .auth
            .bearer_token()
            .await
            .ok_or(Error::Unauthenticated)?;

        let sealed = envelope::seal(document, self.config.format)?;
        let request = self
            .http
            .post(self.config.endpoint.clone())
            .header(header::AUTHORIZATION, token.bearer_header())
            .json(&sealed.envelope);
        // Key material is zeroized here; the envelope already carries it
        drop(sealed);

        monitor.machine.write().await.begin_uploading();
        let ticker = TickerGuard::spawn(monitor.machine.clone());

        let send = tokio::select! {
            biased;
            _ = monitor.cancel.notified() => return Err(Error::Cancelled),
            send = request.send() => send,
        };
        let response =
            send.map_err(|e| Error::TransportFailure(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TransportFailure(format!("{} - {}", status, body)));
        }

        let result = if is_single_shot(&response) {
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::TransportFailure(format!("Failed to read response: {}", e)))?;
            complete_single_shot(monitor, &body).await
        } else {
            let stream = response.bytes_stream().map(|result| {
                result.map_err(|e| Error::TransportFailure(format!("Stream read error: {}", e)))
            });
            consume_stream(monitor, stream).await
        };

        drop(ticker);
        result
    }
}

/// Whether the backend answered with the single-shot JSON shape instead of
/// a progress stream.
fn is_single_shot(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

/// Resolve a single-shot response body into the terminal outcome.
async fn complete_single_shot(monitor: &UploadMonitor, body: &[u8]) -> Result<UploadOutcome> {
    let single: SingleShotResponse = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedInput(format!("Invalid response body: {}", e)))?;

    let record = ProgressRecord {
        progress: String::new(),
        error: None,
        done: true,
        summary: Some(single.summary),
        phi_verification: Some(single.phi_verification),
    };

    let mut machine = monitor.machine.write().await;
    machine.apply(&record);
    machine
        .outcome()
        .ok_or_else(|| Error::TransportFailure("Attempt was no longer running".to_string()))
}

/// Consume a response byte stream until a terminal record resolves the
/// attempt.
///
/// Chunks are fed through a [`FrameReader`]; each record drives the state
/// machine. The loop ends on a terminal record, a transport error,
/// cancellation, or end-of-data (which without a terminal record is an
/// `IncompleteStream` protocol violation).
async fn consume_stream<S>(monitor: &UploadMonitor, stream: S) -> Result<UploadOutcome>
where
    S: Stream<Item = Result<Bytes>>,
{
    let mut reader = FrameReader::new();
    futures::pin_mut!(stream);

    loop {
        // Cancellation always wins over a ready chunk
        let next = tokio::select! {
            biased;
            _ = monitor.cancel.notified() => {
                let error = Error::Cancelled;
                monitor.machine.write().await.fail(&error);
                return Err(error);
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                let records = match reader.push(&chunk) {
                    Ok(records) => records,
                    Err(error) => {
                        monitor.machine.write().await.fail(&error);
                        return Err(error);
                    }
                };

                for record in records {
                    // A cancel that lands while a chunk is being decoded
                    // must not let a bundled terminal record through
                    if monitor.is_cancelled() {
                        let error = Error::Cancelled;
                        monitor.machine.write().await.fail(&error);
                        return Err(error);
                    }
                    let mut machine = monitor.machine.write().await;
                    machine.apply(&record);
                    match machine.state().phase {
                        Phase::Complete => {
                            if let Some(outcome) = machine.outcome() {
                                return Ok(outcome);
                            }
                        }
                        Phase::Error => {
                            let message = machine.state().error.clone().unwrap_or_default();
                            return Err(Error::Server(message));
                        }
                        _ => {}
                    }
                }
            }
            Some(Err(error)) => {
                monitor.machine.write().await.fail(&error);
                return Err(error);
            }
            None => {
                reader.finish();
                monitor.machine.write().await.finish_stream()?;
                // A terminal record would have returned from the loop
                return Err(Error::IncompleteStream);
            }
        }
    }
}

/// Ticker task driving the elapsed-seconds counter while `Uploading`.
///
/// The task stops on its own when the phase leaves `Uploading` and is
/// aborted on drop, so no timer outlives its attempt.
struct TickerGuard {
    task: JoinHandle<()>,
}

impl TickerGuard {
    fn spawn(machine: Arc<RwLock<StateMachine>>) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut machine = machine.write().await;
                if machine.state().phase != Phase::Uploading {
                    break;
                }
                machine.tick();
            }
        });

        Self { task }
    }
}

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&str]) -> Vec<Result<Bytes>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect()
    }

    async fn uploading_monitor() -> UploadMonitor {
        let monitor = UploadMonitor::new();
        {
            let mut machine = monitor.machine.write().await;
            machine.begin_preparing();
            machine.begin_uploading();
        }
        monitor
    }

    #[tokio::test]
    async fn test_consume_stream_success() {
        let monitor = uploading_monitor().await;
        let stream = stream::iter(chunks(&[
            "{\"progress\":\"A\"}\n{\"pro",
            "gress\":\"B\",\"done\":true,\"summary\":\"S\",\"phi_verification\":{\"x\":true}}\n",
        ]));

        let outcome = consume_stream(&monitor, stream).await.unwrap();
        assert_eq!(outcome.summary, "S");
        assert_eq!(outcome.phi_verification.get("x"), Some(&true));

        let state = monitor.state().await;
        assert_eq!(state.phase, Phase::Complete);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_consume_stream_server_error() {
        let monitor = uploading_monitor().await;
        let stream = stream::iter(chunks(&[
            "{\"progress\":\"Scanning\",\"error\":\"Virus detected\"}\n",
        ]));

        let result = consume_stream(&monitor, stream).await;
        match result {
            Err(Error::Server(message)) => assert_eq!(message, "Virus detected"),
            other => panic!("Unexpected result: {:?}", other),
        }

        let state = monitor.state().await;
        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.error.as_deref(), Some("Virus detected"));
        assert!(state.summary.is_none());
    }

    #[tokio::test]
    async fn test_consume_stream_incomplete() {
        let monitor = uploading_monitor().await;
        let stream = stream::iter(chunks(&["{\"progress\":\"Uploading\"}\n"]));

        let result = consume_stream(&monitor, stream).await;
        assert!(matches!(result, Err(Error::IncompleteStream)));

        let state = monitor.state().await;
        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.last_progress, "Uploading");
    }

    #[tokio::test]
    async fn test_consume_stream_transport_error() {
        let monitor = uploading_monitor().await;
        let stream = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"progress\":\"A\"}\n")),
            Err(Error::TransportFailure("connection reset".to_string())),
        ]);

        let result = consume_stream(&monitor, stream).await;
        assert!(matches!(result, Err(Error::TransportFailure(_))));
        assert_eq!(monitor.state().await.phase, Phase::Error);
    }

    #[tokio::test]
    async fn test_consume_stream_malformed_is_fatal() {
        let monitor = uploading_monitor().await;
        let stream = stream::iter(chunks(&["garbage\n{\"progress\":\"ok\"}\n"]));

        let result = consume_stream(&monitor, stream).await;
        assert!(matches!(result, Err(Error::MalformedInput(_))));
        assert_eq!(monitor.state().await.phase, Phase::Error);
    }

    #[tokio::test]
    async fn test_cancellation_never_completes() {
        let monitor = uploading_monitor().await;
        // One non-terminal record, then the stream hangs forever
        let stream =
            stream::iter(chunks(&["{\"progress\":\"Uploading\"}\n"])).chain(stream::pending());

        let task_monitor = monitor.clone();
        let task =
            tokio::spawn(async move { consume_stream(&task_monitor, stream).await });

        // Let the consumer absorb the first record, then abort
        tokio::task::yield_now().await;
        monitor.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));

        let state = monitor.state().await;
        assert_eq!(state.phase, Phase::Error);
        assert!(state.summary.is_none());
    }

    #[tokio::test]
    async fn test_cancel_beats_ready_terminal_chunk() {
        // Cancel is already pending while a terminal chunk sits ready in
        // the stream; cancellation must win
        let monitor = uploading_monitor().await;
        monitor.cancel();

        let stream = stream::iter(chunks(&[
            "{\"done\":true,\"summary\":\"S\",\"phi_verification\":{\"x\":true}}\n",
        ]));

        let result = consume_stream(&monitor, stream).await;
        assert!(matches!(result, Err(Error::Cancelled)));

        let state = monitor.state().await;
        assert_eq!(state.phase, Phase::Error);
        assert!(state.summary.is_none());
    }

    #[tokio::test]
    async fn test_cancel_midstream_beats_terminal_record() {
        // Cancel lands while the terminal chunk is being produced; the
        // record must be dropped, not applied
        let monitor = uploading_monitor().await;

        let cancel_monitor = monitor.clone();
        let tail = stream::once(async move {
            cancel_monitor.cancel();
            Ok(Bytes::from_static(b"{\"done\":true,\"summary\":\"S\"}\n"))
        });
        let stream = stream::iter(chunks(&["{\"progress\":\"A\"}\n"])).chain(tail);

        let result = consume_stream(&monitor, stream).await;
        assert!(matches!(result, Err(Error::Cancelled)));

        let state = monitor.state().await;
        assert_eq!(state.phase, Phase::Error);
        assert!(state.summary.is_none());
    }

    #[tokio::test]
    async fn test_single_shot_response() {
        let monitor = uploading_monitor().await;
        let body = b"{\"summary\":\"Report text\",\"phi_verification\":{\"name_match\":true}}";

        let outcome = complete_single_shot(&monitor, body).await.unwrap();
        assert_eq!(outcome.summary, "Report text");
        assert_eq!(outcome.phi_verification.get("name_match"), Some(&true));
        assert_eq!(monitor.state().await.phase, Phase::Complete);
    }

    #[tokio::test]
    async fn test_single_shot_malformed_body() {
        let monitor = uploading_monitor().await;
        let result = complete_single_shot(&monitor, b"not json").await;
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_counts_only_while_uploading() {
        let monitor = uploading_monitor().await;
        let ticker = TickerGuard::spawn(monitor.machine.clone());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(monitor.state().await.elapsed_seconds, 3);

        monitor.machine.write().await.fail(&Error::Cancelled);
        tokio::time::sleep(Duration::from_millis(2000)).await;
        // Frozen after the phase left Uploading
        assert_eq!(monitor.state().await.elapsed_seconds, 3);

        drop(ticker);
    }

    #[tokio::test]
    async fn test_upload_fails_fast_without_token() {
        let config = UploadConfig::new(Url::parse("http://localhost:1/upload").unwrap());
        let session = UploadSession::new(config, Arc::new(crate::auth::TokenCell::new()));
        let document = sealpost_common::Document::new(
            b"%PDF-1.4".to_vec(),
            sealpost_common::MediaType::pdf(),
        )
        .unwrap();

        // Port 1 is unreachable; an Unauthenticated error proves no network
        // call was attempted
        let result = session.upload(document).await;
        assert!(matches!(result, Err(Error::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_upload_rejects_wrong_media_type() {
        let config = UploadConfig::new(Url::parse("http://localhost:1/upload").unwrap());
        let auth = crate::auth::StaticToken::new(
            sealpost_common::AuthToken::new("token").unwrap(),
        );
        let session = UploadSession::new(config, Arc::new(auth));
        let document = sealpost_common::Document::new(
            b"hello".to_vec(),
            sealpost_common::MediaType::new("text/plain").unwrap(),
        )
        .unwrap();

        let result = session.upload(document).await;
        assert!(matches!(result, Err(Error::UnsupportedMediaType(_))));
    }
}
