//! Container identity from process cgroup membership.
//!
//! Every line of `/proc/<pid>/cgroup` has the form
//! `<hierarchy-id>:<controller-list>:<cgroup-path>`:
//!
//! - cgroup v1: one line per hierarchy, the controller list is comma separated, e.g. `cpu,cpuacct`.
//! - cgroup v2: a single line `0::<path>` for the unified hierarchy.
//!
//! The cgroup path of a containerized process ends in a segment naming the container,
//! whose exact shape depends on the runtime and the cgroup driver:
//!
//! ```text
//! /system.slice/docker-<ID>.scope
//! /system.slice/containerd-<ID>.scope
//! /kubepods.slice/kubepods-burstable.slice/kubepods-burstable-pod<UID>.slice/docker-<ID>.scope
//! /kubepods/besteffort/pod<UID>/<ID>
//! ```
//!
//! [`normalize`] reduces all of them to the `<ID>` that Kubernetes reports as the
//! container status ID, see [`crate::container::ContainerID::from_runtime_url`].
mod error;
mod normalize;

use std::path::Path;

use crate::container::ContainerID;

pub use error::{Error, Result};
pub use normalize::normalize;

/// Reads `<procfs>/<pid>/cgroup` and normalizes it into a [`ContainerID`].
///
/// # Errors
///
/// Returns [`Error::Read`] if the cgroup file cannot be read (e.g. the process already
/// exited) and any error of [`normalize`].
pub fn read_process_container_id(procfs: &Path, pid: u32) -> Result<ContainerID> {
    let content = crate::fsutil::read_to_string(procfs.join(pid.to_string()).join("cgroup"))?;
    normalize(&content)
}
