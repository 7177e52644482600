//! Log retrieval: live stream from the execution backend, or the archived
//! object once the run has been collected.

use std::sync::Arc;

use futures::StreamExt;
use pr_backend::{BackendRegistry, LogLineStream};
use pr_core::{Cluster, Error, LogResult, LogStream, Result, ResultExt, Run, RunLabels};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

pub struct LogService {
    registry: Arc<BackendRegistry>,
    channel_capacity: usize,
}

impl LogService {
    pub fn new(registry: Arc<BackendRegistry>, channel_capacity: usize) -> Self {
        Self {
            registry,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Log of `run`, read from `environment`'s backends.
    ///
    /// Runs without an archived log reference are streamed live; the rest
    /// are read from the archive in full. Every call opens its own read.
    #[instrument(skip(self, run, cluster), fields(run_id = run.id, cluster = %cluster.name))]
    pub async fn get_log(&self, run: &Run, cluster: &Cluster, environment: &str) -> Result<LogResult> {
        const OP: &str = "log service: get pipelinerun log";

        if !run.action.produces_logs() {
            return Err(Error::LogUnavailable {
                action: run.action.to_string(),
            }
            .op(OP));
        }

        match run.archived_log() {
            None => {
                let backend = self.registry.execution(environment).await.op(OP)?;
                let labels = RunLabels::new(cluster.name.clone(), cluster.id, run.id);
                let stream = match backend.stream_log(&labels).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        self.registry.invalidate_on_failure(environment, &backend, &e);
                        return Err(e.op(OP));
                    }
                };
                debug!(run = %labels.object_name(), "Streaming live log");
                Ok(LogResult::Stream(spawn_log_pump(stream, self.channel_capacity)))
            }
            Some(object) => {
                let archive = self.registry.archive(environment).await.op(OP)?;
                let bytes = archive.read_log(object).await.op(OP)?;
                debug!(object, bytes = bytes.len(), "Read archived log");
                Ok(LogResult::Archived(bytes))
            }
        }
    }
}

/// Feed a backend log stream into a line channel and an error channel from
/// a background task.
///
/// The task stops when the backend stream ends, after the first backend
/// error, when the line receiver is dropped, or when the returned
/// [`LogStream`] is dropped. Stopping drops the backend stream, which
/// releases its connection. Both channels close when the task exits.
pub fn spawn_log_pump(mut stream: LogLineStream, capacity: usize) -> LogStream {
    let (line_tx, line_rx) = mpsc::channel(capacity);
    let (err_tx, err_rx) = mpsc::channel(1);
    let token = CancellationToken::new();
    let cancelled = token.clone();

    tokio::spawn(async move {
        let mut forwarded = 0usize;
        loop {
            let next = tokio::select! {
                _ = cancelled.cancelled() => break,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(line)) => {
                    tokio::select! {
                        _ = cancelled.cancelled() => break,
                        sent = line_tx.send(line) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                    forwarded += 1;
                }
                Some(Err(e)) => {
                    // capacity 1 and a single send, so this cannot be full
                    let _ = err_tx.try_send(e);
                    break;
                }
                None => break,
            }
        }
        debug!(forwarded, cancelled = cancelled.is_cancelled(), "Log stream closed");
    });

    LogStream::new(line_rx, err_rx, token.drop_guard())
}
