use crate::capture::TargetEntry;
use crate::pod::Pod;

/// Body of `PUT /pods`: a plain array of pods or a Kubernetes `PodList` object.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum PodsPayload {
    List(Vec<Pod>),
    PodList { items: Vec<Pod> },
}

impl PodsPayload {
    pub fn into_pods(self) -> Vec<Pod> {
        match self {
            PodsPayload::List(pods) => pods,
            PodsPayload::PodList { items } => items,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TargetsResponse {
    pub targets: Vec<TargetEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pods_payload_shapes() {
        let list: PodsPayload =
            serde_json::from_str(r#"[{"metadata": {"name": "a"}}]"#).unwrap();
        assert_eq!(list.into_pods().len(), 1);

        let pod_list: PodsPayload = serde_json::from_str(
            r#"{"apiVersion": "v1", "kind": "PodList", "items": [{"metadata": {"name": "a"}}, {}]}"#,
        )
        .unwrap();
        assert_eq!(pod_list.into_pods().len(), 2);
    }
}
