//! Passive result intake.
//!
//! Check engines hand in one JSON object per line, either on standard input
//! or over TCP:
//!
//! ```json
//! {"target":{"type":"service","host_name":"web01","description":"HTTP"},"return_code":2,"output":"HTTP CRITICAL"}
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use uppe_core::check::{CommandFileWorker, RemoteWorker};
use uppe_core::{CheckEngine, CheckResult, CheckResultQueue, CheckTarget, QueueError};

/// One submitted result as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedResult {
    pub target: CheckTarget,
    pub return_code: i32,
    #[serde(default)]
    pub output: String,
    /// Unix timestamps in seconds; both default to the time of receipt
    pub start_time: Option<f64>,
    pub finish_time: Option<f64>,
    #[serde(default)]
    pub latency: f64,
    #[serde(default)]
    pub early_timeout: bool,
    #[serde(default = "default_true")]
    pub exited_ok: bool,
    /// Whether an engine ran the check on schedule rather than it being passive
    #[serde(default)]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

fn timestamp(seconds: Option<f64>, fallback: SystemTime) -> SystemTime {
    match seconds {
        Some(secs) if secs.is_finite() && secs >= 0.0 => UNIX_EPOCH + Duration::from_secs_f64(secs),
        _ => fallback,
    }
}

impl SubmittedResult {
    pub fn into_result(self, engine: Arc<dyn CheckEngine>, source: Option<&str>) -> CheckResult {
        let now = SystemTime::now();
        let finish_time = timestamp(self.finish_time, now);
        let start_time = timestamp(self.start_time, finish_time);

        let mut result = CheckResult::new(self.target, engine)
            .with_return_code(self.return_code)
            .with_output(self.output)
            .with_times(start_time, finish_time)
            .with_latency(self.latency);
        if self.active {
            result = result.active();
        }
        if self.early_timeout {
            result = result.timed_out();
        }
        if !self.exited_ok {
            result = result.exited_abnormally();
        }
        if let Some(source) = source {
            result = result.with_source(source);
        }
        result
    }
}

/// Something producing check results for the queue
#[async_trait]
pub trait ResultSource: Send {
    fn name(&self) -> &str;

    /// The next result, or `None` once the source is exhausted
    async fn next_result(&mut self) -> Result<Option<CheckResult>>;
}

/// JSON lines from any buffered reader
pub struct LineSource<R> {
    name: String,
    lines: Lines<R>,
    engine: Arc<dyn CheckEngine>,
    peer: Option<String>,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(name: impl Into<String>, reader: R, engine: Arc<dyn CheckEngine>) -> Self {
        Self { name: name.into(), lines: reader.lines(), engine, peer: None }
    }

    /// Tag every result with the submitting peer
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = Some(peer.into());
        self
    }
}

impl LineSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new("stdin", BufReader::new(tokio::io::stdin()), Arc::new(CommandFileWorker))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ResultSource for LineSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_result(&mut self) -> Result<Option<CheckResult>> {
        while let Some(line) = self.lines.next_line().await.context("failed to read result line")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SubmittedResult>(line) {
                Ok(submitted) => {
                    let engine = Arc::clone(&self.engine);
                    return Ok(Some(submitted.into_result(engine, self.peer.as_deref())));
                }
                Err(e) => warn!(source = %self.name, error = %e, "Skipping malformed result line"),
            }
        }
        Ok(None)
    }
}

/// Move results from `source` into `queue` until either side is done
///
/// Results pushed back by a full queue are retried after `backoff`.
/// Returns how many results were accepted.
pub async fn forward(
    source: &mut dyn ResultSource,
    queue: &CheckResultQueue,
    backoff: Duration,
) -> Result<u64> {
    let mut accepted = 0;
    while let Some(mut result) = source.next_result().await? {
        loop {
            match queue.submit(result) {
                Ok(()) => {
                    accepted += 1;
                    break;
                }
                Err(QueueError::Backpressure { result: rejected, .. }) => {
                    debug!(source = %source.name(), "Result queue full, retrying");
                    tokio::time::sleep(backoff).await;
                    result = *rejected;
                }
                Err(QueueError::Closed { .. }) => {
                    info!(source = %source.name(), accepted, "Result queue closed");
                    return Ok(accepted);
                }
                Err(e @ QueueError::InvalidResult { .. }) => {
                    warn!(source = %source.name(), error = %e, "Dropping result");
                    break;
                }
            }
        }
    }
    info!(source = %source.name(), accepted, "Result source exhausted");
    Ok(accepted)
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener =
        TcpListener::bind(addr).await.with_context(|| format!("failed to listen on {addr}"))?;
    info!(%addr, "Accepting remote check results");
    Ok(listener)
}

/// Accept remote workers forever, one task per connection
pub async fn serve(listener: TcpListener, queue: Arc<CheckResultQueue>, backoff: Duration) -> Result<()> {
    let engine: Arc<dyn CheckEngine> = Arc::new(RemoteWorker::new("remote"));
    loop {
        let (stream, peer) = listener.accept().await.context("failed to accept connection")?;
        let queue = Arc::clone(&queue);
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let name = format!("tcp:{peer}");
            let mut source =
                LineSource::new(name, BufReader::new(stream), engine).with_peer(peer.ip().to_string());
            if let Err(e) = forward(&mut source, &queue, backoff).await {
                tracing::error!(%peer, "Remote result intake failed: {e:#}");
            }
        });
    }
}
