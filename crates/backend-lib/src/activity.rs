// ============================
// crates/backend-lib/src/activity.rs
// ============================
//! Per-request activity recording.
//!
//! Handlers never wait on recording: [`ActivityDispatcher::record`] pushes the
//! event onto an unbounded channel and a background task drains it into an
//! [`ActivitySink`]. Sink failures are logged and otherwise ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use habits_common::ActivityEvent;
use metrics::counter;
use tokio::fs::{self as tokio_fs, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics::{ACTIVITY_DROPPED, ACTIVITY_RECORDED};

/// Fire-and-forget consumer of activity events
pub trait ActivityRecorder: Send + Sync {
    fn record(&self, event: ActivityEvent);
}

/// Durable destination of activity events
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn write(&self, event: &ActivityEvent) -> anyhow::Result<()>;
}

/// Handle that request layers keep: the sending half of the drain channel
#[derive(Clone)]
pub struct ActivityDispatcher {
    tx: mpsc::UnboundedSender<ActivityEvent>,
}

impl ActivityDispatcher {
    /// Start the drain task. It ends once every dispatcher clone is dropped.
    pub fn spawn(sink: Arc<dyn ActivitySink>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(drain(rx, sink));
        (Self { tx }, handle)
    }
}

impl ActivityRecorder for ActivityDispatcher {
    fn record(&self, event: ActivityEvent) {
        if self.tx.send(event).is_err() {
            counter!(ACTIVITY_DROPPED).increment(1);
            warn!("Activity drain stopped, event dropped");
        }
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<ActivityEvent>, sink: Arc<dyn ActivitySink>) {
    while let Some(event) = rx.recv().await {
        match sink.write(&event).await {
            Ok(()) => {
                counter!(ACTIVITY_RECORDED).increment(1);
            },
            Err(e) => {
                counter!(ACTIVITY_DROPPED).increment(1);
                warn!(request_id = %event.request_id, error = %e, "Failed to record activity");
            },
        }
    }
    debug!("Activity drain finished");
}

/// Writes each event as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl ActivitySink for TracingSink {
    async fn write(&self, event: &ActivityEvent) -> anyhow::Result<()> {
        info!(
            target: "activity",
            request_id = %event.request_id,
            principal_id = event.principal_id,
            remote_addr = %event.remote_addr,
            method = %event.method,
            path = %event.path,
            status = event.status_code,
            duration_ms = event.duration_ms,
            error = event.error_message.as_deref().unwrap_or(""),
            "request served"
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a file
pub struct JsonLinesSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    pub async fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio_fs::create_dir_all(parent).await?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ActivitySink for JsonLinesSink {
    async fn write(&self, event: &ActivityEvent) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
