use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::fsutil;

use super::{CaptureEngine, Error, Result, TargetKind};

/// File name prefix of the dynamically linked TLS library that gets instrumented.
const NATIVE_TLS_LIBRARY: &str = "libssl.so";

/// Registered instrumentation of a single process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TargetEntry {
    pub pid: u32,
    pub native_library: bool,
    pub managed_runtime: bool,
}

impl TargetEntry {
    fn new(pid: u32) -> Self {
        Self {
            pid,
            native_library: false,
            managed_runtime: false,
        }
    }

    fn set(&mut self, kind: TargetKind) {
        match kind {
            TargetKind::NativeLibrary => self.native_library = true,
            TargetKind::ManagedRuntime => self.managed_runtime = true,
        }
    }
}

/// In-memory target set that validates every registration against procfs.
///
/// A native library target needs `libssl` in the process mappings, a managed runtime
/// target needs a resolvable executable. Readers may observe the table at any time,
/// including the empty window between a clear and the following registrations.
#[derive(Debug)]
pub struct TargetTable {
    procfs: PathBuf,
    targets: DashMap<u32, TargetEntry>,
}

impl TargetTable {
    pub fn new(procfs: impl Into<PathBuf>) -> Self {
        Self {
            procfs: procfs.into(),
            targets: DashMap::new(),
        }
    }

    /// Returns the registered targets sorted by PID.
    pub fn snapshot(&self) -> Vec<TargetEntry> {
        let mut entries: Vec<TargetEntry> = self.targets.iter().map(|entry| *entry.value()).collect();
        entries.sort_unstable_by_key(|entry| entry.pid);
        entries
    }

    pub fn get(&self, pid: u32) -> Option<TargetEntry> {
        self.targets.get(&pid).map(|entry| *entry.value())
    }

    fn process_dir(&self, pid: u32) -> Result<PathBuf> {
        let dir = self.procfs.join(pid.to_string());
        if !dir.is_dir() {
            return Err(Error::ProcessGone { pid });
        }
        Ok(dir)
    }

    fn insert(&self, pid: u32, kind: TargetKind) {
        self.targets
            .entry(pid)
            .or_insert_with(|| TargetEntry::new(pid))
            .set(kind);
        log::debug!("registered {} target for pid {}", kind, pid);
    }
}

impl CaptureEngine for TargetTable {
    fn clear_targets(&self) -> Result<()> {
        self.targets.clear();
        Ok(())
    }

    fn register_native_library_target(&self, pid: u32) -> Result<()> {
        let dir = self.process_dir(pid)?;
        let maps = fsutil::read_to_string(dir.join("maps")).map_err(|source| {
            if source.is_not_found() {
                Error::ProcessGone { pid }
            } else {
                Error::Maps { pid, source }
            }
        })?;

        if !maps_native_tls_library(&maps) {
            return Err(Error::NoNativeLibrary { pid });
        }

        self.insert(pid, TargetKind::NativeLibrary);
        Ok(())
    }

    fn register_managed_runtime_target(&self, pid: u32) -> Result<()> {
        let dir = self.process_dir(pid)?;
        let exe = dir.join("exe");
        std::fs::read_link(&exe).map_err(|source| Error::Executable {
            pid,
            path: exe.clone(),
            source,
        })?;

        self.insert(pid, TargetKind::ManagedRuntime);
        Ok(())
    }
}

/// Returns `true` if any mapping in a `/proc/<pid>/maps` listing is the TLS library.
fn maps_native_tls_library(maps: &str) -> bool {
    maps.lines()
        .filter_map(|line| line.split_whitespace().nth(5))
        .filter_map(|path| Path::new(path).file_name()?.to_str())
        .any(|name| name.starts_with(NATIVE_TLS_LIBRARY))
}
