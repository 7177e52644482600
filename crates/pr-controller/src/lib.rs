//! Orchestration of pipeline runs across deployment environments.
//!
//! [`Controller`] is the facade the API layer calls. It loads the platform
//! records of a run and hands them to one of three services:
//!
//! - [`LogService`]: live log streams and archived log objects
//! - [`Lifecycle`]: create and stop on the execution backend
//! - [`DiffComputer`]: code and configuration changes of a run
//!
//! Backends of each environment are resolved lazily through a shared
//! [`pr_backend::BackendRegistry`].

pub mod controller;
pub mod diff;
pub mod lifecycle;
pub mod log;

pub use controller::{Collaborators, Controller};
pub use diff::DiffComputer;
pub use lifecycle::Lifecycle;
pub use log::{spawn_log_pump, LogService};
