//! Turns workload-change events into reconciliation passes.
//!
//! Events are published on a [`tokio::sync::watch`] channel holding the latest
//! [`Trigger`]. A trigger published while a pass runs replaces any trigger still
//! pending, so bursts of events collapse into a single follow-up pass. A refresh
//! never replaces a pending pod snapshot, see [`publish`].
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::capture::CaptureEngine;
use crate::pod::Pod;
use crate::procfs::CmdlineFilter;
use crate::reconcile::{self, PassReport, Reconciler};

/// A request for a reconciliation pass.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Complete snapshot of the pods on this node.
    Pods(Arc<Vec<Pod>>),
    /// Operator requested refresh with the current inputs.
    Refresh,
}

/// How processes are selected, decided once at startup.
#[derive(Debug, Clone)]
pub enum Mode {
    Cluster,
    Host(CmdlineFilter),
}

impl Mode {
    pub fn is_cluster(&self) -> bool {
        matches!(self, Mode::Cluster)
    }
}

/// Runs the pass matching each trigger for the selected [`Mode`].
#[derive(Debug)]
pub struct Driver<E> {
    reconciler: Arc<Reconciler<E>>,
    mode: Mode,
    last_pods: Mutex<Option<Arc<Vec<Pod>>>>,
}

impl<E: CaptureEngine> Driver<E> {
    pub fn new(reconciler: Arc<Reconciler<E>>, mode: Mode) -> Self {
        Self {
            reconciler,
            mode,
            last_pods: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Runs one pass for `trigger`. Returns `Ok(None)` if the trigger does not apply.
    ///
    /// In cluster mode a refresh re-runs the last pod snapshot. In host mode pod
    /// snapshots are ignored.
    ///
    /// # Errors
    ///
    /// Returns the pass failure, see [`Reconciler::reconcile`].
    pub fn handle(&self, trigger: Trigger) -> reconcile::Result<Option<PassReport>> {
        match (&self.mode, trigger) {
            (Mode::Cluster, Trigger::Pods(pods)) => {
                *self.last_pods.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::clone(&pods));
                self.reconciler.reconcile_pods(&pods).map(Some)
            }
            (Mode::Cluster, Trigger::Refresh) => {
                let last_pods = self
                    .last_pods
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                match last_pods {
                    Some(pods) => self.reconciler.reconcile_pods(&pods).map(Some),
                    None => {
                        log::info!("No pod snapshot received yet, nothing to refresh");
                        Ok(None)
                    }
                }
            }
            (Mode::Host(filter), Trigger::Refresh) => self.reconciler.reconcile_host(filter).map(Some),
            (Mode::Host(_), Trigger::Pods(pods)) => {
                log::warn!("Ignoring snapshot of {} pods in host mode", pods.len());
                Ok(None)
            }
        }
    }
}

/// Publishes `trigger` to the driver task.
///
/// A refresh arriving while a pod snapshot is pending keeps the snapshot, since the
/// pass for the snapshot already recomputes the targets from the latest pods. The
/// channel is marked changed either way, so the refresh still causes a pass.
pub fn publish(triggers: &watch::Sender<Option<Trigger>>, trigger: Trigger) {
    triggers.send_modify(|pending| {
        if matches!(trigger, Trigger::Refresh) && matches!(pending, Some(Trigger::Pods(_))) {
            return;
        }
        *pending = Some(trigger);
    });
}

/// Spawns the task running one pass per received trigger until the sender is dropped.
///
/// A failed pass is logged and the task keeps waiting for the next trigger.
pub fn spawn<E>(driver: Arc<Driver<E>>, mut triggers: watch::Receiver<Option<Trigger>>) -> JoinHandle<()>
where
    E: CaptureEngine + 'static,
{
    tokio::spawn(async move {
        while triggers.changed().await.is_ok() {
            let Some(trigger) = triggers.borrow_and_update().clone() else {
                continue;
            };

            let driver = Arc::clone(&driver);
            match tokio::task::spawn_blocking(move || driver.handle(trigger)).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => log::error!("reconciliation pass failed: {}", err),
                Err(err) => log::error!("reconciliation pass panicked: {}", err),
            }
        }
        log::debug!("Trigger channel closed, stopping reconciliation");
    })
}
