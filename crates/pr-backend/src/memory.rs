//! In-memory execution backend and archive for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use pr_core::{Error, LogLine, Result, RunLabels};
use uuid::Uuid;

use crate::{ArchiveBackend, CreatePayload, EventId, ExecutionBackend, LogLineStream};

/// A run object held by [`MemoryExecutionBackend`]
#[derive(Debug, Clone)]
pub struct MemoryRun {
    pub event_id: EventId,
    pub payload: CreatePayload,
    pub lines: Vec<LogLine>,
    pub finished: bool,
    pub cancelled: bool,
}

/// Execution backend keyed by run object name
pub struct MemoryExecutionBackend {
    runs: RwLock<HashMap<String, MemoryRun>>,
    cancellations: AtomicUsize,
}

impl MemoryExecutionBackend {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            cancellations: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, run: &RunLabels) -> Option<MemoryRun> {
        self.runs.read().unwrap().get(&run.object_name()).cloned()
    }

    /// Append output to a run created earlier
    pub fn push_line(&self, run: &RunLabels, line: LogLine) -> Result<()> {
        let mut runs = self.runs.write().unwrap();
        let entry = runs
            .get_mut(&run.object_name())
            .ok_or_else(|| Error::not_found("pipelinerun", run.object_name()))?;
        entry.lines.push(line);
        Ok(())
    }

    pub fn finish(&self, run: &RunLabels) {
        if let Some(entry) = self.runs.write().unwrap().get_mut(&run.object_name()) {
            entry.finished = true;
        }
    }

    /// Number of stop calls that actually cancelled a running run
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::Relaxed)
    }
}

impl Default for MemoryExecutionBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for MemoryExecutionBackend {
    async fn create(&self, payload: &CreatePayload) -> Result<EventId> {
        payload.validate()?;
        let event_id = Uuid::new_v4().to_string();
        let run = MemoryRun {
            event_id: event_id.clone(),
            payload: payload.clone(),
            lines: vec![],
            finished: false,
            cancelled: false,
        };
        self.runs
            .write()
            .unwrap()
            .insert(payload.run_labels().object_name(), run);
        Ok(event_id)
    }

    async fn stop(&self, run: &RunLabels) -> Result<()> {
        let mut runs = self.runs.write().unwrap();
        let Some(entry) = runs
            .values_mut()
            .find(|r| run.matches(&r.payload.labels))
        else {
            return Ok(());
        };
        if !entry.finished {
            entry.finished = true;
            entry.cancelled = true;
            self.cancellations.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn stream_log(&self, run: &RunLabels) -> Result<LogLineStream> {
        let lines = self
            .runs
            .read()
            .unwrap()
            .values()
            .find(|r| run.matches(&r.payload.labels))
            .map(|r| r.lines.clone())
            .ok_or_else(|| Error::not_found("pipelinerun", run.object_name()))?;
        Ok(stream::iter(lines.into_iter().map(Ok)).boxed())
    }
}

/// Archive over a map of object name to bytes
pub struct MemoryArchive {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, object: &str, bytes: &[u8]) {
        self.objects
            .write()
            .unwrap()
            .insert(object.to_string(), bytes.to_vec());
    }
}

impl Default for MemoryArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArchiveBackend for MemoryArchive {
    async fn read_log(&self, object: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .unwrap()
            .get(object)
            .cloned()
            .ok_or_else(|| Error::not_found("log object", object))
    }
}
