//! Error taxonomy shared by every pipeline run crate.
//!
//! Backend and collaborator failures are wrapped with the name of the
//! operation that hit them ([`ResultExt::op`]). Classification goes through
//! [`Error::kind`], which looks through any number of those layers.

use std::fmt;

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by pipeline run orchestration.
#[derive(Debug, Error)]
pub enum Error {
    /// No backend is configured for the environment.
    #[error("environment misconfigured: no backend configured for {environment:?}")]
    ConfigNotFound { environment: String },

    /// A backend handle could not be established.
    #[error("cannot connect to backend for {environment:?}: {reason}")]
    Connection { environment: String, reason: String },

    /// The backend could not be reached while serving a request.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend refused the request (malformed payload).
    #[error("backend rejected request: {0}")]
    BackendRejected(String),

    /// A record or backend object does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// The run's action does not produce logs.
    #[error("{action} action has no log")]
    LogUnavailable { action: String },

    /// A store or source-control collaborator failed.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),

    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An error annotated with the operation that produced it.
    #[error("{op}: {source}")]
    Op {
        op: &'static str,
        #[source]
        source: Box<Error>,
    },
}

/// Classification of an [`Error`], independent of operation wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigNotFound,
    Connection,
    BackendUnavailable,
    BackendRejected,
    NotFound,
    LogUnavailable,
    Collaborator,
    Config,
    Io,
    Json,
}

impl ErrorKind {
    /// Transient failures where retrying the whole operation may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Connection | ErrorKind::BackendUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ConfigNotFound => "config_not_found",
            ErrorKind::Connection => "connection",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::BackendRejected => "backend_rejected",
            ErrorKind::NotFound => "not_found",
            ErrorKind::LogUnavailable => "log_unavailable",
            ErrorKind::Collaborator => "collaborator",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Json => "json",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Wrap this error with the name of the failing operation.
    pub fn op(self, op: &'static str) -> Self {
        Error::Op {
            op,
            source: Box::new(self),
        }
    }

    /// The classification of the innermost error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigNotFound { .. } => ErrorKind::ConfigNotFound,
            Error::Connection { .. } => ErrorKind::Connection,
            Error::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Error::BackendRejected(_) => ErrorKind::BackendRejected,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::LogUnavailable { .. } => ErrorKind::LogUnavailable,
            Error::Collaborator(_) => ErrorKind::Collaborator,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
            Error::Op { source, .. } => source.kind(),
        }
    }

    /// Operation names from outermost to innermost.
    pub fn ops(&self) -> Vec<&'static str> {
        let mut ops = Vec::new();
        let mut current = self;
        while let Error::Op { op, source } = current {
            ops.push(*op);
            current = source;
        }
        ops
    }
}

/// Attach operation names to errors in a `Result`.
pub trait ResultExt<T> {
    fn op(self, op: &'static str) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn op(self, op: &'static str) -> Result<T> {
        self.map_err(|e| e.into().op(op))
    }
}
