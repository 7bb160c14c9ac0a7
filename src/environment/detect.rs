use std::path::Path;

use super::checks::{has_kubernetes_service_env, has_service_account_token};
use super::{Error, Result};

/// Token mounted into every pod that runs with a service account.
pub const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Available runtime environments for the tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    /// Running on a Kubernetes node; processes are scoped by pod.
    Cluster,
    /// Running outside of a cluster; processes are scoped by command line.
    Host,
}

/// Detects whether the tracer runs inside a Kubernetes cluster.
///
/// Mirrors the in-cluster client configuration: both service environment variables
/// must be set and the service account token must exist. A failed token check is
/// logged as a warning and treated as absent.
///
/// # Arguments
///
/// * `service_host` - Value of `KUBERNETES_SERVICE_HOST`.
/// * `service_port` - Value of `KUBERNETES_SERVICE_PORT`.
/// * `token_path` - Path of the service account token, usually [`SERVICE_ACCOUNT_TOKEN`].
pub fn detect_runtime_environment(
    service_host: Option<&str>,
    service_port: Option<&str>,
    token_path: impl AsRef<Path>,
) -> RuntimeEnvironment {
    if !has_kubernetes_service_env(service_host, service_port) {
        return RuntimeEnvironment::Host;
    }

    match has_service_account_token(token_path) {
        Ok(true) => RuntimeEnvironment::Cluster,
        Ok(false) => RuntimeEnvironment::Host,
        Err(err) => {
            log::warn!("Service account check failed when detecting runtime environment: {}", err);
            RuntimeEnvironment::Host
        }
    }
}

/// Determines the name of the node the tracer runs on.
///
/// Uses the configured name (usually `NODE_NAME` from the downward API) and falls back
/// to `<rootfs>/etc/hostname`.
///
/// # Errors
///
/// Returns [`Error::MissingNodeName`] if neither source yields a non-empty name.
pub fn node_name(configured: Option<&str>, rootfs: impl AsRef<Path>) -> Result<String> {
    if let Some(name) = configured.map(str::trim).filter(|name| !name.is_empty()) {
        return Ok(name.to_owned());
    }

    let path = rootfs.as_ref().join("etc/hostname");
    match std::fs::read_to_string(&path) {
        Ok(hostname) if !hostname.trim().is_empty() => Ok(hostname.trim().to_owned()),
        Ok(_) => Err(Error::MissingNodeName { path }),
        Err(err) => {
            log::debug!("failed to read `{}`: {}", path.display(), err);
            Err(Error::MissingNodeName { path })
        }
    }
}
