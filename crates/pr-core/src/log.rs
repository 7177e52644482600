//! Log results: a live stream or an archived blob.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

use crate::Error;

/// One line of pipeline output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Pipeline task the line came from
    #[serde(default)]
    pub task: String,
    /// Step within the task
    #[serde(default)]
    pub step: String,
    pub text: String,
}

impl LogLine {
    pub fn new(task: impl Into<String>, step: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            step: step.into(),
            text: text.into(),
        }
    }

    /// `[task : step] text`, the format the transport layer relays.
    pub fn render(&self) -> String {
        if self.task.is_empty() && self.step.is_empty() {
            self.text.clone()
        } else {
            format!("[{} : {}] {}", self.task, self.step, self.text)
        }
    }
}

/// Log of one run, either still streaming from the execution backend or
/// read in full from the archive.
#[derive(Debug)]
pub enum LogResult {
    Stream(LogStream),
    Archived(Vec<u8>),
}

impl LogResult {
    pub fn is_stream(&self) -> bool {
        matches!(self, LogResult::Stream(_))
    }

    pub fn into_stream(self) -> Option<LogStream> {
        match self {
            LogResult::Stream(stream) => Some(stream),
            LogResult::Archived(_) => None,
        }
    }

    pub fn into_archived(self) -> Option<Vec<u8>> {
        match self {
            LogResult::Archived(bytes) => Some(bytes),
            LogResult::Stream(_) => None,
        }
    }
}

/// Receiving side of a live log.
///
/// Lines arrive in backend order. The error channel carries at most one
/// terminal error. Both channels close when the backend stream ends.
/// Dropping the `LogStream` cancels the producer and releases the backend
/// connection.
#[derive(Debug)]
pub struct LogStream {
    lines: mpsc::Receiver<LogLine>,
    errors: mpsc::Receiver<Error>,
    /// Cancels the producer when the stream is dropped
    _cancel: DropGuard,
}

impl LogStream {
    pub fn new(lines: mpsc::Receiver<LogLine>, errors: mpsc::Receiver<Error>, cancel: DropGuard) -> Self {
        Self {
            lines,
            errors,
            _cancel: cancel,
        }
    }

    /// Next line, or `None` once the line channel has closed.
    pub async fn recv_line(&mut self) -> Option<LogLine> {
        self.lines.recv().await
    }

    /// The terminal error, or `None` once the error channel has closed.
    pub async fn recv_error(&mut self) -> Option<Error> {
        self.errors.recv().await
    }

    /// Drain the stream: every line until close, then the terminal error if any.
    pub async fn collect(mut self) -> (Vec<LogLine>, Option<Error>) {
        let mut lines = Vec::new();
        while let Some(line) = self.lines.recv().await {
            lines.push(line);
        }
        let error = self.errors.recv().await;
        (lines, error)
    }
}
