//! Process table enumeration.
//!
//! [`enumerate`] lists the numeric directories of a procfs root and asks a
//! [`ProcessMatcher`] whether each process is a target. Per-process failures are
//! logged and skipped since processes start and exit while the scan runs; only a
//! failure to list the procfs root itself is returned to the caller.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::container::ContainerID;
use crate::error::ResultOkLogExt;
use crate::{cgroup, fsutil};

/// Errors that abort a whole enumeration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to list procfs directory `{path}`: {source}")]
    ListProcfs {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a single process could not be resolved. Never fatal for a scan.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("couldn't get the cgroup of process: {0}")]
    Cgroup(#[from] cgroup::Error),
    #[error("couldn't find the pod for container `{container_id}`")]
    UnknownContainer { container_id: ContainerID },
    #[error("unable to get process cmdline: {0}")]
    Cmdline(#[source] fsutil::FileReadError),
}

/// Resolves a process to an optional owning identity.
///
/// Implemented by [`crate::index::ContainerIndex`] for cluster mode and by
/// [`CmdlineFilter`] for host mode.
pub trait ProcessMatcher {
    /// Identity recorded for matched processes.
    type Owner;

    /// Returns `Ok(Some(_))` if the process is a target, `Ok(None)` if it is not.
    fn resolve(
        &self,
        procfs: &Path,
        pid: u32,
    ) -> std::result::Result<Option<Self::Owner>, ResolveError>;
}

/// Host mode matcher: selects processes whose command line matches a pattern,
/// or every process if there is no pattern.
#[derive(Debug, Clone, Default)]
pub struct CmdlineFilter {
    pattern: Option<Regex>,
}

impl CmdlineFilter {
    pub fn new(pattern: Option<Regex>) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }
}

impl ProcessMatcher for CmdlineFilter {
    type Owner = ();

    fn resolve(&self, procfs: &Path, pid: u32) -> std::result::Result<Option<()>, ResolveError> {
        let Some(pattern) = &self.pattern else {
            return Ok(Some(()));
        };

        let cmdline = read_cmdline(procfs, pid).map_err(ResolveError::Cmdline)?;
        Ok(pattern.is_match(&cmdline).then_some(()))
    }
}

/// Reads `<procfs>/<pid>/cmdline`, joining the NUL separated arguments with spaces.
///
/// # Errors
///
/// Returns [`fsutil::FileReadError`] if the file cannot be read.
pub fn read_cmdline(procfs: &Path, pid: u32) -> std::result::Result<String, fsutil::FileReadError> {
    let raw = fsutil::read(procfs.join(pid.to_string()).join("cmdline"))?;
    Ok(raw
        .split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(" "))
}

/// Returns `true` if the directory name is entirely ASCII digits.
#[inline]
fn is_pid_dir_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// Lists the candidate PIDs of a procfs root, in ascending order.
///
/// Only directories with an all-digit name are candidates. Entries that disappear
/// while being inspected or do not fit a `u32` are skipped.
///
/// # Errors
///
/// Returns [`Error::ListProcfs`] if the procfs root cannot be listed.
pub fn list_pids(procfs: &Path) -> Result<Vec<u32>> {
    let entries = fs::read_dir(procfs).map_err(|source| Error::ListProcfs {
        path: procfs.to_path_buf(),
        source,
    })?;

    let mut pids = Vec::new();
    for entry in entries {
        let Some(entry) = entry.ok_log() else {
            continue;
        };

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().filter(|name| is_pid_dir_name(name)) else {
            continue;
        };

        match entry.file_type() {
            Ok(ft) if ft.is_dir() => {}
            Ok(_) => continue,
            Err(err) => {
                log::debug!("process `{}` vanished during scan: {}", name, err);
                continue;
            }
        }

        match name.parse::<u32>() {
            Ok(pid) => pids.push(pid),
            Err(err) => log::warn!("unable to convert process id `{}` to integer: {}", name, err),
        }
    }

    pids.sort_unstable();
    Ok(pids)
}

/// Scans the process table and returns every process the matcher resolved,
/// together with its owner, in ascending PID order.
///
/// # Errors
///
/// Returns [`Error::ListProcfs`] if the procfs root cannot be listed. Failures to
/// resolve individual processes are logged at warn level and skipped.
pub fn enumerate<M: ProcessMatcher>(procfs: &Path, matcher: &M) -> Result<Vec<(u32, M::Owner)>> {
    let pids = list_pids(procfs)?;
    log::info!(
        "Starting TLS auto discovery: procfs={}, candidates={}",
        procfs.display(),
        pids.len()
    );

    let mut found = Vec::new();
    for pid in pids {
        match matcher.resolve(procfs, pid) {
            Ok(Some(owner)) => found.push((pid, owner)),
            Ok(None) => {}
            Err(err) => log::warn!("skipping pid {}: {}", pid, err),
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_procfs(dirs: &[&str]) -> tempfile::TempDir {
        let procfs = tempfile::tempdir().expect("failed to create temp dir");
        for dir in dirs {
            fs::create_dir(procfs.path().join(dir)).unwrap();
        }
        procfs
    }

    fn write_cmdline(procfs: &Path, pid: &str, args: &[&str]) {
        let mut raw = Vec::new();
        for arg in args {
            raw.extend_from_slice(arg.as_bytes());
            raw.push(0);
        }
        fs::write(procfs.join(pid).join("cmdline"), raw).unwrap();
    }

    #[test]
    fn test_is_pid_dir_name() {
        assert!(is_pid_dir_name("1"));
        assert!(is_pid_dir_name("4242"));
        assert!(!is_pid_dir_name("abc"));
        assert!(!is_pid_dir_name("12a"));
        assert!(!is_pid_dir_name("self"));
        assert!(!is_pid_dir_name(""));
    }

    #[test]
    fn test_list_pids_keeps_numeric_dirs_only() {
        let procfs = fake_procfs(&["1", "2", "abc", "17"]);
        fs::write(procfs.path().join("99"), "not a dir").unwrap();
        fs::create_dir(procfs.path().join("99999999999")).unwrap();

        let pids = list_pids(procfs.path()).expect("should list fake procfs");
        assert_eq!(pids, vec![1, 2, 17]);
    }

    #[test]
    fn test_list_pids_missing_root() {
        let err = list_pids(Path::new("/definitely/does/not/exist")).unwrap_err();
        let Error::ListProcfs { path, source } = err;
        assert_eq!(path, PathBuf::from("/definitely/does/not/exist"));
        assert_eq!(source.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_read_cmdline_joins_arguments() {
        let procfs = fake_procfs(&["7"]);
        write_cmdline(procfs.path(), "7", &["/usr/bin/python3", "-m", "http.server"]);
        assert_eq!(
            read_cmdline(procfs.path(), 7).unwrap(),
            "/usr/bin/python3 -m http.server"
        );
    }

    #[test]
    fn test_enumerate_host_without_pattern_matches_all() {
        let procfs = fake_procfs(&["1", "2", "abc", "17"]);
        let found = enumerate(procfs.path(), &CmdlineFilter::default()).unwrap();
        let pids: Vec<u32> = found.into_iter().map(|(pid, _)| pid).collect();
        assert_eq!(pids, vec![1, 2, 17]);
    }

    #[test]
    fn test_enumerate_host_with_pattern() {
        let procfs = fake_procfs(&["10", "11", "12"]);
        write_cmdline(procfs.path(), "10", &["/usr/bin/curl", "https://example.com"]);
        write_cmdline(procfs.path(), "11", &["/usr/sbin/nginx", "-g", "daemon off;"]);
        // 12 has no cmdline file: logged and skipped

        let filter = CmdlineFilter::new(Some(Regex::new("curl|wget").unwrap()));
        let found = enumerate(procfs.path(), &filter).unwrap();
        let pids: Vec<u32> = found.into_iter().map(|(pid, _)| pid).collect();
        assert_eq!(pids, vec![10]);
    }

    #[test]
    fn test_enumerate_propagates_listing_failure() {
        let result = enumerate(
            Path::new("/definitely/does/not/exist"),
            &CmdlineFilter::default(),
        );
        assert!(matches!(result, Err(Error::ListProcfs { .. })));
    }
}
