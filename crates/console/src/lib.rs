//! Operator console for locker assignments.
//!
//! The launcher reads [`Config`] from the environment, restores any backup
//! left by an interrupted run, aligns the local store with the controller
//! and then hands an interactive [`Session`] to the operator.

pub mod app;
pub mod command;
pub mod config;
pub mod render;
pub mod session;

pub use app::{ConsoleOrchestrator, StartupError, build_orchestrator, launch, recover_pending_snapshot};
pub use command::{Command, parse_line};
pub use config::{Config, ConfigError};
pub use session::Session;
