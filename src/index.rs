use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::cgroup;
use crate::container::ContainerID;
use crate::pod::Pod;
use crate::procfs::{ProcessMatcher, ResolveError};

/// Maps canonical container ids to the pod owning the container.
///
/// Rebuilt from the full pod snapshot on every reconciliation pass and dropped
/// afterwards, never patched in place.
#[derive(Debug, Default)]
pub struct ContainerIndex {
    containers: HashMap<ContainerID, Arc<Pod>>,
}

impl ContainerIndex {
    /// Builds the index from every container status of every pod.
    ///
    /// Containers that have not started yet carry no id and are skipped. Malformed ids
    /// are logged and skipped without aborting the build. If two containers share an id
    /// the later one wins.
    pub fn build(pods: &[Pod]) -> Self {
        let mut containers = HashMap::new();

        for pod in pods {
            let pod = Arc::new(pod.clone());
            for status in pod.container_statuses() {
                let Some(raw_id) = status.container_id.as_deref() else {
                    log::debug!("container `{}` of pod {} has no id yet", status.name, pod);
                    continue;
                };

                match ContainerID::from_runtime_url(raw_id) {
                    Ok(container_id) => {
                        containers.insert(container_id, Arc::clone(&pod));
                    }
                    Err(err) => {
                        log::warn!(
                            "skipping container `{}` of pod {}: {}",
                            status.name,
                            pod,
                            err
                        );
                    }
                }
            }
        }

        Self { containers }
    }

    pub fn get(&self, container_id: &str) -> Option<&Arc<Pod>> {
        self.containers.get(container_id)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn container_ids(&self) -> impl Iterator<Item = &ContainerID> {
        self.containers.keys()
    }
}

impl ProcessMatcher for ContainerIndex {
    type Owner = Arc<Pod>;

    fn resolve(&self, procfs: &Path, pid: u32) -> Result<Option<Arc<Pod>>, ResolveError> {
        let container_id = cgroup::read_process_container_id(procfs, pid)?;
        match self.get(container_id.as_str()) {
            Some(pod) => Ok(Some(Arc::clone(pod))),
            None => Err(ResolveError::UnknownContainer { container_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::{ContainerStatus, ObjectMeta, PodStatus};
    use crate::procfs;

    const ID: &str = "c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00";

    fn pod(name: &str, container_ids: &[&str]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: name.to_owned(),
                namespace: "default".to_owned(),
                uid: format!("{name}-uid"),
            },
            status: Some(PodStatus {
                container_statuses: container_ids
                    .iter()
                    .map(|id| ContainerStatus {
                        name: format!("{name}-container"),
                        container_id: Some((*id).to_owned()),
                    })
                    .collect(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_build_skips_malformed_ids() {
        let index = ContainerIndex::build(&[pod("web", &["docker://abc123", "abc456"])]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("abc123").unwrap().metadata.name, "web");
        assert!(index.get("abc456").is_none());
    }

    #[test]
    fn test_build_includes_init_and_ephemeral_containers() {
        let mut pod = pod("job", &["containerd://main"]);
        let status = pod.status.as_mut().unwrap();
        status.init_container_statuses.push(ContainerStatus {
            name: "init".to_owned(),
            container_id: Some("containerd://init".to_owned()),
        });
        status.ephemeral_container_statuses.push(ContainerStatus {
            name: "debug".to_owned(),
            container_id: Some("containerd://debug".to_owned()),
        });
        status.container_statuses.push(ContainerStatus {
            name: "pending".to_owned(),
            container_id: None,
        });

        let index = ContainerIndex::build(&[pod]);
        let mut ids: Vec<&str> = index.container_ids().map(ContainerID::as_str).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["debug", "init", "main"]);
    }

    #[test]
    fn test_build_last_write_wins() {
        let index = ContainerIndex::build(&[pod("a", &["docker://dup"]), pod("b", &["docker://dup"])]);
        assert_eq!(index.get("dup").unwrap().metadata.name, "b");
    }

    #[test]
    fn test_cgroup_and_index_agree_on_every_path_shape() {
        let index = ContainerIndex::build(&[pod("web", &[format!("docker://{ID}").as_str()])]);
        let shapes = [
            format!("0::/kubepods/besteffort/pod7709c1d5-447c-428f-bed9-8ddec35c93f4/{ID}\n"),
            format!("11:cpu,cpuacct:/docker/{ID}\n5:pids:/docker/{ID}\n"),
            format!(
                "0::/kubepods.slice/kubepods-burstable.slice/kubepods-burstable-pod3beae8e0_164d_4689_a087_efd902d8c2ab.slice/docker-{ID}.scope\n"
            ),
        ];

        for shape in shapes {
            let id = cgroup::normalize(&shape).unwrap();
            assert!(index.get(id.as_str()).is_some(), "no match for {shape:?}");
        }
    }

    #[test]
    fn test_enumerate_cluster_mode() {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let write = |pid: &str, cgroup: &str| {
            let dir = root.path().join(pid);
            std::fs::create_dir(&dir).unwrap();
            std::fs::write(dir.join("cgroup"), cgroup).unwrap();
        };
        write("100", &format!("0::/system.slice/docker-{ID}.scope\n"));
        write("101", "0::/system.slice/docker-ffff.scope\n");
        write("102", "0::/\n");
        std::fs::create_dir(root.path().join("103")).unwrap();

        let index = ContainerIndex::build(&[pod("web", &[format!("docker://{ID}").as_str()])]);
        let found = procfs::enumerate(root.path(), &index).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 100);
        assert_eq!(found[0].1.metadata.name, "web");
    }
}
