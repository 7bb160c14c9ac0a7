//! Environment detection module.
//!
//! Determines whether the tracer runs inside a Kubernetes cluster or on a plain host,
//! and which node it runs on.
mod checks;
mod detect;
mod error;

pub use checks::{has_container_indicators, is_pid_namespace_isolated};
pub use detect::{RuntimeEnvironment, SERVICE_ACCOUNT_TOKEN, detect_runtime_environment, node_name};
pub use error::{Error, Result};
