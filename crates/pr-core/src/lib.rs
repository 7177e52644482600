pub mod cluster;
pub mod config;
pub mod diff;
pub mod error;
pub mod labels;
pub mod log;
pub mod run;

pub use cluster::{Application, Cluster, EnvironmentRegion, User};
pub use config::{ArchiveConfig, EnvironmentBackend, GitConfig, LogConfig, PlatformConfig};
pub use diff::{CodeInfo, ConfigDiff, DiffResult};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use labels::RunLabels;
pub use log::{LogLine, LogResult, LogStream};
pub use run::{
    Action, ApplicationId, ClusterId, PagedQuery, Run, RunId, RunStatus, RunSummary, UserId,
    UserInfo,
};
