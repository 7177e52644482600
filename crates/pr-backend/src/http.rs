//! HTTP execution backend.
//!
//! Talks to two endpoints of an environment's pipeline cluster:
//!
//! - the event listener, which accepts create payloads:
//!   `POST {event_listener}` → `201 {"eventID": "..."}`
//! - the run API, which exposes run objects by namespace:
//!   - `GET  {api_server}/namespaces/{ns}/pipelineruns?labelSelector=...`
//!     → `{"items": [{"name", "labels", "finished"}]}`
//!   - `PATCH {api_server}/namespaces/{ns}/pipelineruns/{name}`
//!     with `{"spec": {"status": "Cancelled"}}`
//!   - `GET  {api_server}/namespaces/{ns}/pipelineruns/{name}/log?follow=true`
//!     → newline-delimited JSON log lines, held open while the run is live

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use pr_core::{EnvironmentBackend, Error, LogLine, Result, RunLabels};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{CreatePayload, EventId, ExecutionBackend, LogLineStream};

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(rename = "eventID")]
    event_id: String,
}

#[derive(Debug, Deserialize)]
struct RunList {
    #[serde(default)]
    items: Vec<RunObject>,
}

#[derive(Debug, Clone, Deserialize)]
struct RunObject {
    name: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    finished: bool,
}

pub struct HttpExecutionBackend {
    client: Client,
    event_listener: String,
    api_server: String,
    namespace: String,
    request_timeout: Duration,
}

impl HttpExecutionBackend {
    pub fn new(config: &EnvironmentBackend) -> Result<Self> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        // No client-wide timeout: it would also cut off follow-mode log reads.
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| Error::BackendUnavailable(format!("build http client: {}", e)))?;

        for url in [&config.event_listener, &config.api_server] {
            reqwest::Url::parse(url)
                .map_err(|e| Error::Config(format!("invalid backend url {:?}: {}", url, e)))?;
        }

        Ok(Self {
            client,
            event_listener: config.event_listener.clone(),
            api_server: config.api_server.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            request_timeout,
        })
    }

    fn runs_url(&self) -> String {
        format!("{}/namespaces/{}/pipelineruns", self.api_server, self.namespace)
    }

    fn run_url(&self, name: &str) -> String {
        format!("{}/{}", self.runs_url(), name)
    }

    /// Locate the run object carrying this run's labels
    async fn find(&self, run: &RunLabels) -> Result<Option<RunObject>> {
        let resp = self
            .client
            .get(self.runs_url())
            .query(&[("labelSelector", run.selector())])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(unavailable)?;
        let resp = check(resp, "run api").await?;
        let list: RunList = resp.json().await.map_err(unavailable)?;
        Ok(list.items.into_iter().find(|item| run.matches(&item.labels)))
    }
}

#[async_trait]
impl ExecutionBackend for HttpExecutionBackend {
    async fn create(&self, payload: &CreatePayload) -> Result<EventId> {
        payload.validate()?;
        let resp = self
            .client
            .post(&self.event_listener)
            .json(payload)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(unavailable)?;
        let resp = check(resp, "event listener").await?;

        let created: CreateResponse = resp
            .json()
            .await
            .map_err(|e| Error::BackendRejected(format!("unexpected create response: {}", e)))?;
        info!(event_id = %created.event_id, run = %payload.run_labels().object_name(), "Pipelinerun submitted");
        Ok(created.event_id)
    }

    async fn stop(&self, run: &RunLabels) -> Result<()> {
        let Some(object) = self.find(run).await? else {
            debug!(run = %run.object_name(), "No pipelinerun to stop");
            return Ok(());
        };
        if object.finished {
            debug!(name = %object.name, "Pipelinerun already finished");
            return Ok(());
        }

        let resp = self
            .client
            .patch(self.run_url(&object.name))
            .json(&serde_json::json!({ "spec": { "status": "Cancelled" } }))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(unavailable)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(resp, "run api").await?;
        info!(name = %object.name, "Pipelinerun cancelled");
        Ok(())
    }

    async fn stream_log(&self, run: &RunLabels) -> Result<LogLineStream> {
        let object = self
            .find(run)
            .await?
            .ok_or_else(|| Error::not_found("pipelinerun", run.object_name()))?;

        // Only the response head is bounded; the body stays open while the run is live.
        let request = self
            .client
            .get(format!("{}/log", self.run_url(&object.name)))
            .query(&[("follow", "true")])
            .send();
        let resp = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| {
                Error::BackendUnavailable(format!(
                    "log of {} not answered within {:?}",
                    object.name, self.request_timeout
                ))
            })?
            .map_err(unavailable)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found("pipelinerun", object.name));
        }
        let resp = check(resp, "run api").await?;
        Ok(decode_lines(resp.bytes_stream()))
    }
}

fn unavailable(e: reqwest::Error) -> Error {
    Error::BackendUnavailable(e.to_string())
}

/// Map non-success statuses: gateway errors are transient, anything else
/// is a refusal.
async fn check(resp: reqwest::Response, endpoint: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = format!("{} returned {}: {}", endpoint, status, body);
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Err(Error::BackendUnavailable(message))
        }
        _ => Err(Error::BackendRejected(message)),
    }
}

/// Split a chunked body into log lines. Lines that are not JSON are kept
/// as plain text.
fn decode_lines<S, B>(body: S) -> LogLineStream
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = (Box::pin(body), Vec::<u8>::new(), false);
    stream::unfold(state, |(mut body, mut buf, mut done)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = &line[..line.len() - 1];
                if is_blank(line) {
                    continue;
                }
                return Some((Ok(parse_line(line)), (body, buf, done)));
            }
            if done {
                if is_blank(&buf) {
                    return None;
                }
                let line = std::mem::take(&mut buf);
                return Some((Ok(parse_line(&line)), (body, buf, done)));
            }
            match body.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    buf.clear();
                    return Some((Err(unavailable(e)), (body, buf, true)));
                }
                None => done = true,
            }
        }
    })
    .boxed()
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn parse_line(line: &[u8]) -> LogLine {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    serde_json::from_slice(line)
        .unwrap_or_else(|_| LogLine::new("", "", String::from_utf8_lossy(line).into_owned()))
}
