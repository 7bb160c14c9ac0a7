//! Snapshot of the Kubernetes pods scheduled on this node.
//!
//! Only the fields needed to map containers back to their pod are modelled. The
//! types deserialize from the Kubernetes JSON representation and ignore every
//! other field.

use std::fmt;

/// A pod as delivered by the Kubernetes watch collaborator. Never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: Option<PodStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
    #[serde(default)]
    pub init_container_statuses: Vec<ContainerStatus>,
    #[serde(default)]
    pub ephemeral_container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    #[serde(default)]
    pub name: String,
    /// Runtime prefixed id, e.g. `containerd://<id>`. Unset until the container started.
    #[serde(rename = "containerID", default)]
    pub container_id: Option<String>,
}

impl Pod {
    /// Iterates over the statuses of regular, init and ephemeral containers.
    pub fn container_statuses(&self) -> impl Iterator<Item = &ContainerStatus> {
        self.status.iter().flat_map(|status| {
            status
                .container_statuses
                .iter()
                .chain(&status.init_container_statuses)
                .chain(&status.ephemeral_container_statuses)
        })
    }
}

impl fmt::Display for Pod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.metadata.namespace, self.metadata.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_kubernetes_pod() {
        let json = r#"{
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web-0", "namespace": "shop", "uid": "1234", "labels": {"app": "web"}},
            "spec": {"nodeName": "node-a"},
            "status": {
                "phase": "Running",
                "containerStatuses": [
                    {"name": "web", "containerID": "containerd://aaa", "ready": true},
                    {"name": "pending"}
                ],
                "initContainerStatuses": [{"name": "init", "containerID": "containerd://bbb"}]
            }
        }"#;

        let pod: Pod = serde_json::from_str(json).expect("should deserialize pod");
        assert_eq!(pod.to_string(), "shop/web-0");
        let ids: Vec<Option<&str>> = pod
            .container_statuses()
            .map(|status| status.container_id.as_deref())
            .collect();
        assert_eq!(ids, vec![Some("containerd://aaa"), None, Some("containerd://bbb")]);
    }

    #[test]
    fn test_pod_without_status() {
        let pod: Pod = serde_json::from_str(r#"{"metadata": {"name": "p"}}"#).unwrap();
        assert_eq!(pod.container_statuses().count(), 0);
    }
}
