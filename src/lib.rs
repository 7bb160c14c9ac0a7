//! Tracer Discovery: decides which processes on this node the TLS capture engine instruments.
//!
//! In a Kubernetes cluster, processes are mapped to pods by decoding their cgroup
//! membership and matching it against the container IDs of the node's pods. On a
//! plain host, processes are selected by a command-line pattern. Every workload
//! change triggers a reconciliation pass that replaces the capture engine's targets.
use std::sync::Arc;

use environment::RuntimeEnvironment;
use trigger::{Driver, Mode, Trigger};

pub mod api;
pub mod capture;
pub mod cgroup;
pub mod config;
pub mod container;
pub mod environment;
pub mod error;
pub mod fsutil;
pub mod index;
pub mod pod;
pub mod procfs;
pub mod reconcile;
pub mod trigger;

/// Runs the tracer discovery daemon.
///
/// Detects the runtime environment, runs the initial reconciliation pass, registers
/// the operator supplied global targets, and then reconciles on every trigger received
/// through the control API.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid configuration (e.g. an invalid command line pattern).
/// - Failure to determine the node name in cluster mode.
/// - Failure of the initial pass (procfs not listable, capture engine rejecting the clear).
/// - Failure to register a global target.
/// - Failure to bind the control API.
pub async fn run(config: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Starting tracer discovery...");

    let runtime_env = environment::detect_runtime_environment(
        std::env::var("KUBERNETES_SERVICE_HOST").ok().as_deref(),
        std::env::var("KUBERNETES_SERVICE_PORT").ok().as_deref(),
        environment::SERVICE_ACCOUNT_TOKEN,
    );
    log::debug!("Runtime environment: {:?}", runtime_env);

    let mode = match runtime_env {
        RuntimeEnvironment::Cluster => {
            let node_name = environment::node_name(config.node_name.as_deref(), &config.rootfs)?;
            log::info!(
                "Cluster mode on node `{}`, data directory `{}`",
                node_name,
                config.data_root.join(&node_name).display()
            );
            Mode::Cluster
        }
        RuntimeEnvironment::Host => {
            log::info!(
                "Host mode, command line pattern: {}",
                config
                    .cmdline_filter
                    .pattern()
                    .map_or("<any>", |pattern| pattern.as_str())
            );
            if environment::has_container_indicators() {
                match environment::is_pid_namespace_isolated(&config.procfs) {
                    Ok(false) => log::warn!(
                        "Running in a container with procfs `{}` of its own PID namespace, only container processes are visible",
                        config.procfs.display()
                    ),
                    Ok(true) => {}
                    Err(err) => log::warn!("PID namespace check failed: {}", err),
                }
            }
            Mode::Host(config.cmdline_filter.clone())
        }
    };

    let targets = Arc::new(capture::TargetTable::new(&config.procfs));
    let reconciler = Arc::new(reconcile::Reconciler::new(
        &config.procfs,
        Arc::clone(&targets),
    ));
    let driver = Arc::new(Driver::new(Arc::clone(&reconciler), mode));

    let initial = if driver.mode().is_cluster() {
        Trigger::Pods(Arc::default())
    } else {
        Trigger::Refresh
    };
    {
        let driver = Arc::clone(&driver);
        tokio::task::spawn_blocking(move || driver.handle(initial)).await??;
    }

    {
        let reconciler = Arc::clone(&reconciler);
        let (native, managed) = (config.global_native_pid, config.global_managed_pid);
        tokio::task::spawn_blocking(move || reconciler.register_global_targets(native, managed))
            .await??;
    }

    let (tx, rx) = tokio::sync::watch::channel(None);
    let cluster_mode = driver.mode().is_cluster();
    let driver_handle = trigger::spawn(driver, rx);

    let api = api::APIServer::new(api::ApiState::new(tx, targets, cluster_mode));
    let served = api.listen(config.listen_addr.as_str()).await;
    driver_handle.abort();
    served?;

    Ok(())
}
