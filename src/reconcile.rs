//! Keeps the capture engine's target set in line with the discovered processes.
//!
//! A reconciliation pass enumerates the process table with a
//! [`ProcessMatcher`], clears the engine's targets and registers every
//! discovered PID for both kinds of TLS instrumentation. Passes are serialized by
//! a lock held for the whole pass, so the clear/register sequences of two
//! passes never interleave. Readers of the target set may still observe it empty
//! between the clear and the registrations of a pass.
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::capture::{self, CaptureEngine, TargetKind};
use crate::index::ContainerIndex;
use crate::pod::Pod;
use crate::procfs::{self, CmdlineFilter, ProcessMatcher};

const TARGET_KINDS: [TargetKind; 2] = [TargetKind::NativeLibrary, TargetKind::ManagedRuntime];

/// Failures that abort a reconciliation pass.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to enumerate processes: {0}")]
    Enumerate(#[from] procfs::Error),
    #[error("failed to clear capture targets: {0}")]
    ClearTargets(#[source] capture::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Processes selected by the matcher.
    pub discovered: usize,
    pub native_registered: usize,
    pub managed_registered: usize,
    /// Registrations rejected by the capture engine.
    pub failed: usize,
}

impl PassReport {
    fn record(&mut self, kind: TargetKind, registered: bool) {
        match (kind, registered) {
            (TargetKind::NativeLibrary, true) => self.native_registered += 1,
            (TargetKind::ManagedRuntime, true) => self.managed_registered += 1,
            (_, false) => self.failed += 1,
        }
    }
}

/// Owns the reconciliation of one capture engine against one procfs root.
#[derive(Debug)]
pub struct Reconciler<E> {
    procfs: PathBuf,
    engine: E,
    /// Held for a whole pass. Guards the operator pinned targets, which are
    /// registered again after every clear.
    pass: Mutex<Vec<(TargetKind, u32)>>,
}

impl<E: CaptureEngine> Reconciler<E> {
    pub fn new(procfs: impl Into<PathBuf>, engine: E) -> Self {
        Self {
            procfs: procfs.into(),
            engine,
            pass: Mutex::new(Vec::new()),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Cluster mode pass: targets every process running in a container of `pods`.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::reconcile`].
    pub fn reconcile_pods(&self, pods: &[Pod]) -> Result<PassReport> {
        let index = ContainerIndex::build(pods);
        if index.is_empty() {
            log::info!("No started containers in snapshot of {} pods", pods.len());
        } else {
            log::debug!(
                "indexed {} container ids: {:?}",
                index.len(),
                index.container_ids().map(|id| id.as_str()).collect::<Vec<_>>()
            );
        }
        self.reconcile(&index)
    }

    /// Host mode pass: targets every process whose command line matches the filter.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::reconcile`].
    pub fn reconcile_host(&self, filter: &CmdlineFilter) -> Result<PassReport> {
        self.reconcile(filter)
    }

    /// Runs one full pass with the given matcher.
    ///
    /// Blocks while another pass is in progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Enumerate`] if the procfs root cannot be listed and
    /// [`Error::ClearTargets`] if the engine refuses to clear its targets. Failures
    /// of single processes or registrations are logged and counted in the report.
    pub fn reconcile<M: ProcessMatcher>(&self, matcher: &M) -> Result<PassReport> {
        let pinned = self.pass.lock().unwrap_or_else(PoisonError::into_inner);

        let discovered = procfs::enumerate(&self.procfs, matcher)?;
        let pids: Vec<u32> = discovered.iter().map(|(pid, _)| *pid).collect();
        log::info!("discovered {} target processes: {:?}", pids.len(), pids);

        let report = self.replace_targets(&pids, &pinned)?;
        log::info!(
            "reconciled targets: discovered={}, native={}, managed={}, failed={}",
            report.discovered,
            report.native_registered,
            report.managed_registered,
            report.failed
        );
        Ok(report)
    }

    /// Registers operator supplied targets that bypass process discovery.
    ///
    /// They are kept across passes and registered again after every clear.
    ///
    /// # Errors
    ///
    /// Returns the first registration error. Nothing is pinned in that case, but a
    /// target registered before the failure stays with the engine until the next
    /// pass clears it.
    pub fn register_global_targets(
        &self,
        native_library: Option<u32>,
        managed_runtime: Option<u32>,
    ) -> capture::Result<()> {
        let mut pinned = self.pass.lock().unwrap_or_else(PoisonError::into_inner);

        let requested = [
            (TargetKind::NativeLibrary, native_library),
            (TargetKind::ManagedRuntime, managed_runtime),
        ];
        let mut added = Vec::new();
        for (kind, pid) in requested {
            let Some(pid) = pid else { continue };
            self.engine.register_target(kind, pid)?;
            log::info!("registered global {} target for pid {}", kind, pid);
            added.push((kind, pid));
        }

        pinned.extend(added);
        Ok(())
    }

    /// Replaces the engine's target set with `pids`, plus the pinned targets.
    ///
    /// Clears first, then registers every PID for every target kind. A failed
    /// registration is logged and does not stop the others.
    fn replace_targets(&self, pids: &[u32], pinned: &[(TargetKind, u32)]) -> Result<PassReport> {
        self.engine.clear_targets().map_err(Error::ClearTargets)?;

        let mut report = PassReport {
            discovered: pids.len(),
            ..PassReport::default()
        };

        for &pid in pids {
            for kind in TARGET_KINDS {
                match self.engine.register_target(kind, pid) {
                    Ok(()) => report.record(kind, true),
                    Err(err) => {
                        log::warn!("failed to register {} target for pid {}: {}", kind, pid, err);
                        report.record(kind, false);
                    }
                }
            }
        }

        for &(kind, pid) in pinned {
            if let Err(err) = self.engine.register_target(kind, pid) {
                log::warn!("failed to re-register global {} target for pid {}: {}", kind, pid, err);
            }
        }

        Ok(report)
    }
}
