//! Interface towards the kernel-level capture engine.
//!
//! The reconciler only tells the engine which processes to instrument. What the
//! engine does with a target (probe attachment, ring buffer polling) happens
//! elsewhere.
mod table;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::fsutil;

pub use table::{TargetEntry, TargetTable};

/// Kind of TLS instrumentation a target receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Dynamically linked TLS library such as `libssl.so`.
    NativeLibrary,
    /// TLS implementation compiled into a managed runtime binary.
    ManagedRuntime,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::NativeLibrary => "native-library",
            TargetKind::ManagedRuntime => "managed-runtime",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("process {pid} does not exist")]
    ProcessGone { pid: u32 },
    #[error("process {pid} has no TLS library mapped")]
    NoNativeLibrary { pid: u32 },
    #[error("failed to inspect mappings of process {pid}: {source}")]
    Maps {
        pid: u32,
        #[source]
        source: fsutil::FileReadError,
    },
    #[error("failed to resolve executable `{path}` of process {pid}: {source}")]
    Executable {
        pid: u32,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("capture engine rejected the request: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Target registration API of the capture engine.
///
/// Every call either succeeds or returns an error; the reconciler decides which
/// errors are fatal.
pub trait CaptureEngine: Send + Sync {
    /// Removes every registered target.
    fn clear_targets(&self) -> Result<()>;

    /// Instruments the TLS library dynamically loaded by `pid`.
    fn register_native_library_target(&self, pid: u32) -> Result<()>;

    /// Instruments the TLS implementation of the managed runtime binary run by `pid`.
    fn register_managed_runtime_target(&self, pid: u32) -> Result<()>;

    fn register_target(&self, kind: TargetKind, pid: u32) -> Result<()> {
        match kind {
            TargetKind::NativeLibrary => self.register_native_library_target(pid),
            TargetKind::ManagedRuntime => self.register_managed_runtime_target(pid),
        }
    }
}

impl<T: CaptureEngine + ?Sized> CaptureEngine for Arc<T> {
    fn clear_targets(&self) -> Result<()> {
        (**self).clear_targets()
    }

    fn register_native_library_target(&self, pid: u32) -> Result<()> {
        (**self).register_native_library_target(pid)
    }

    fn register_managed_runtime_target(&self, pid: u32) -> Result<()> {
        (**self).register_managed_runtime_target(pid)
    }
}
