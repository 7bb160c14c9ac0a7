use super::{Error, Result};
use std::path::Path;
use std::{env, fs};

/// Returns true if the Kubernetes service environment variables injected into every pod are set.
///
/// # Arguments
///
/// * `host` - Value of `KUBERNETES_SERVICE_HOST`.
/// * `port` - Value of `KUBERNETES_SERVICE_PORT`.
pub fn has_kubernetes_service_env(host: Option<&str>, port: Option<&str>) -> bool {
    let is_set = |value: Option<&str>| value.is_some_and(|v| !v.trim().is_empty());
    is_set(host) && is_set(port)
}

/// Returns true if the service account token mounted into pods exists.
///
/// # Errors
///
/// Returns [`Error::ExistenceCheck`] if checking the existence of the token fails.
pub fn has_service_account_token(token_path: impl AsRef<Path>) -> Result<bool> {
    let path = token_path.as_ref();

    path.try_exists().map_err(|source| Error::ExistenceCheck {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns true if the init process PID namespace of `procfs` is different from the
/// current process, i.e. `procfs` shows processes outside of our own PID namespace.
///
/// # Errors
///
/// Returns [`Error::ReadSymlink`] if reading the symbolic link for either PID namespace fails.
pub fn is_pid_namespace_isolated(procfs: impl AsRef<Path>) -> Result<bool> {
    let self_ns_path = Path::new("/proc/self/ns/pid");
    let self_ns = fs::read_link(self_ns_path).map_err(|source| Error::ReadSymlink {
        path: self_ns_path.to_path_buf(),
        source,
    })?;

    let root_ns_path = procfs.as_ref().join("1/ns/pid");
    let root_ns = fs::read_link(&root_ns_path).map_err(|source| Error::ReadSymlink {
        path: root_ns_path.clone(),
        source,
    })?;

    Ok(self_ns != root_ns)
}

/// Returns true if environment markers (files or variables) suggest a containerized environment.
pub fn has_container_indicators() -> bool {
    fs::metadata("/.dockerenv").is_ok()
        || fs::metadata("/run/.containerenv").is_ok()
        || env::var("container").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_kubernetes_service_env() {
        assert!(has_kubernetes_service_env(Some("10.96.0.1"), Some("443")));
        assert!(!has_kubernetes_service_env(Some("10.96.0.1"), None));
        assert!(!has_kubernetes_service_env(None, Some("443")));
        assert!(!has_kubernetes_service_env(Some(""), Some("443")));
    }

    #[test]
    fn test_has_service_account_token() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let token = dir.path().join("token");
        assert!(!has_service_account_token(&token).unwrap());
        fs::write(&token, "secret").unwrap();
        assert!(has_service_account_token(&token).unwrap());
    }

    #[test]
    fn test_is_pid_namespace_isolated_missing_procfs() {
        let err = is_pid_namespace_isolated("/definitely/does/not/exist").unwrap_err();
        assert!(matches!(err, Error::ReadSymlink { .. }));
    }
}
