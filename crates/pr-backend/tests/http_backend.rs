//! HTTP execution backend against an in-process mock pipeline cluster.
//!
//! The mock serves both the event listener (`POST /`) and the run API
//! (`/namespaces/:ns/pipelineruns...`). Its event listener accepts only
//! payloads for application `app`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use futures::StreamExt;
use pr_backend::{CreatePayload, ExecutionBackend, HttpExecutionBackend};
use pr_core::{ArchiveConfig, EnvironmentBackend, ErrorKind, LogLine, RunLabels};

#[derive(Clone, Default)]
struct MockRun {
    labels: BTreeMap<String, String>,
    finished: bool,
    cancel_requests: usize,
    lines: Vec<LogLine>,
    /// Log requests never get an answer
    stalled: bool,
}

type Runs = Arc<Mutex<HashMap<String, MockRun>>>;

async fn create(Json(payload): Json<serde_json::Value>) -> impl IntoResponse {
    if payload["application"] == "app" {
        (StatusCode::CREATED, Json(serde_json::json!({ "eventID": "1234" }))).into_response()
    } else {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

async fn list(
    State(runs): State<Runs>,
    Path(_ns): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let selector: BTreeMap<String, String> = params
        .get("labelSelector")
        .map(|s| {
            s.split(',')
                .filter_map(|kv| kv.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let runs = runs.lock().unwrap();
    let items: Vec<_> = runs
        .iter()
        .filter(|(_, run)| selector.iter().all(|(k, v)| run.labels.get(k) == Some(v)))
        .map(|(name, run)| {
            serde_json::json!({ "name": name, "labels": run.labels, "finished": run.finished })
        })
        .collect();
    Json(serde_json::json!({ "items": items }))
}

async fn cancel(State(runs): State<Runs>, Path((_ns, name)): Path<(String, String)>) -> StatusCode {
    let mut runs = runs.lock().unwrap();
    match runs.get_mut(&name) {
        Some(run) => {
            run.cancel_requests += 1;
            run.finished = true;
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn log(State(runs): State<Runs>, Path((_ns, name)): Path<(String, String)>) -> Response {
    let run = runs.lock().unwrap().get(&name).cloned();
    match run {
        Some(run) if run.stalled => std::future::pending().await,
        Some(run) => {
            let body: String = run
                .lines
                .iter()
                .map(|l| format!("{}\n", serde_json::to_string(l).unwrap()))
                .collect();
            (StatusCode::OK, body).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_cluster(runs: Runs) -> EnvironmentBackend {
    let app = Router::new()
        .route("/", post(create))
        .route("/namespaces/:ns/pipelineruns", get(list))
        .route("/namespaces/:ns/pipelineruns/:name", patch(cancel))
        .route("/namespaces/:ns/pipelineruns/:name/log", get(log))
        .with_state(runs);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    EnvironmentBackend {
        event_listener: format!("http://{}/", addr),
        api_server: format!("http://{}", addr),
        namespace: "tekton".to_string(),
        request_timeout_secs: 5,
        archive: ArchiveConfig { root: "/tmp".into() },
    }
}

fn seeded_run(runs: &Runs, labels: &RunLabels, finished: bool, lines: Vec<LogLine>) {
    runs.lock().unwrap().insert(
        labels.object_name(),
        MockRun {
            labels: labels.creation_labels("test-app"),
            finished,
            cancel_requests: 0,
            lines,
            stalled: false,
        },
    );
}

#[tokio::test]
async fn test_create_pipelinerun() {
    let runs = Runs::default();
    let backend = HttpExecutionBackend::new(&spawn_cluster(runs).await).unwrap();
    let run = RunLabels::new("test-cluster", 1, 1);

    let event_id = backend
        .create(&CreatePayload::new("app", 1, &run, "test", "hz"))
        .await
        .unwrap();
    assert_eq!(event_id, "1234");
}

#[tokio::test]
async fn test_create_with_wrong_application_is_rejected() {
    let runs = Runs::default();
    let backend = HttpExecutionBackend::new(&spawn_cluster(runs).await).unwrap();
    let run = RunLabels::new("test-cluster", 1, 1);

    let err = backend
        .create(&CreatePayload::new("other-app", 1, &run, "test", "hz"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendRejected);
}

#[tokio::test]
async fn test_create_against_unreachable_listener() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = EnvironmentBackend {
        event_listener: format!("http://{}/", addr),
        api_server: format!("http://{}", addr),
        namespace: "tekton".to_string(),
        request_timeout_secs: 2,
        archive: ArchiveConfig { root: "/tmp".into() },
    };
    let backend = HttpExecutionBackend::new(&config).unwrap();
    let run = RunLabels::new("test-cluster", 1, 1);

    let err = backend
        .create(&CreatePayload::new("app", 1, &run, "test", "hz"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert!(err.kind().is_retryable());
}

#[tokio::test]
async fn test_stop_running_then_again() {
    let runs = Runs::default();
    let backend = HttpExecutionBackend::new(&spawn_cluster(runs.clone()).await).unwrap();
    let run = RunLabels::new("test2", 2, 1);
    seeded_run(&runs, &run, false, vec![]);

    backend.stop(&run).await.unwrap();
    backend.stop(&run).await.unwrap();

    let state = runs.lock().unwrap();
    let stored = &state[&run.object_name()];
    assert!(stored.finished);
    assert_eq!(stored.cancel_requests, 1);
}

#[tokio::test]
async fn test_stop_finished_or_missing_run() {
    let runs = Runs::default();
    let backend = HttpExecutionBackend::new(&spawn_cluster(runs.clone()).await).unwrap();
    let finished = RunLabels::new("test1", 1, 1);
    seeded_run(&runs, &finished, true, vec![]);

    backend.stop(&finished).await.unwrap();
    backend.stop(&RunLabels::new("test1", 1, 2)).await.unwrap();
    assert_eq!(runs.lock().unwrap()[&finished.object_name()].cancel_requests, 0);
}

#[tokio::test]
async fn test_stream_log_lines_in_order() {
    let runs = Runs::default();
    let backend = HttpExecutionBackend::new(&spawn_cluster(runs.clone()).await).unwrap();
    let run = RunLabels::new("test-cluster", 3, 42);
    let lines = vec![
        LogLine::new("build", "git", "cloning"),
        LogLine::new("build", "compile", "compiling"),
        LogLine::new("deploy", "apply", "done"),
    ];
    seeded_run(&runs, &run, false, lines.clone());

    let received: Vec<LogLine> = backend
        .stream_log(&run)
        .await
        .unwrap()
        .map(|l| l.unwrap())
        .collect()
        .await;
    assert_eq!(received, lines);
}

#[tokio::test]
async fn test_stream_log_of_unknown_run() {
    let runs = Runs::default();
    let backend = HttpExecutionBackend::new(&spawn_cluster(runs).await).unwrap();

    let err = backend
        .stream_log(&RunLabels::new("test-cluster", 3, 43))
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_stream_log_of_unresponsive_backend() {
    let runs = Runs::default();
    let mut config = spawn_cluster(runs.clone()).await;
    config.request_timeout_secs = 1;
    let backend = HttpExecutionBackend::new(&config).unwrap();
    let run = RunLabels::new("test-cluster", 3, 42);
    seeded_run(&runs, &run, false, vec![]);
    runs.lock().unwrap().get_mut(&run.object_name()).unwrap().stalled = true;

    let err = tokio::time::timeout(Duration::from_secs(10), backend.stream_log(&run))
        .await
        .expect("log request was not bounded")
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
}
