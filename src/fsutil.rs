use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Error that occurs when reading a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to read file `{path}`: {source}")]
pub struct FileReadError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FileReadError {
    /// Returns `true` if the file did not exist, e.g. because the process exited mid-scan.
    pub fn is_not_found(&self) -> bool {
        self.source.kind() == io::ErrorKind::NotFound
    }
}

/// Reads the whole file at the given path into a [`String`].
///
/// # Errors
///
/// Returns a [`FileReadError`] carrying the path if the file cannot be read or is not UTF-8.
///
/// # Example
/// ```no_run
/// # use tracer_discovery::fsutil;
/// let cgroup = fsutil::read_to_string("/proc/self/cgroup")?;
/// # Ok::<(), fsutil::FileReadError>(())
/// ```
pub fn read_to_string(path: impl AsRef<Path>) -> Result<String, FileReadError> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|source| FileReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the whole file at the given path as raw bytes.
///
/// # Errors
///
/// Returns a [`FileReadError`] carrying the path if the file cannot be read.
pub fn read(path: impl AsRef<Path>) -> Result<Vec<u8>, FileReadError> {
    let path = path.as_ref();
    fs::read(path).map_err(|source| FileReadError {
        path: path.to_path_buf(),
        source,
    })
}
