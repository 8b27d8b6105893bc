//! Kubernetes object → domain record conversion.

use k8s_openapi::api::core::v1::{Node, Pod};
use taskgrid_core::{quantity, NodeRecord, PodRecord};
use tracing::warn;

/// Allocatable CPU assumed for a node that does not report one.
const DEFAULT_ALLOCATABLE_MILLIS: f64 = 1000.0;

/// Flatten a `Node` into the record the scheduler works on.
pub fn node_record(node: &Node) -> NodeRecord {
    let name = node.metadata.name.clone().unwrap_or_default();

    let ready = node
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false);

    let taints = node
        .spec
        .as_ref()
        .and_then(|spec| spec.taints.as_ref())
        .map(|taints| taints.iter().map(|t| t.effect.clone()).collect())
        .unwrap_or_default();

    let allocatable_millis = node
        .status
        .as_ref()
        .and_then(|status| status.allocatable.as_ref())
        .and_then(|allocatable| allocatable.get("cpu"))
        .map(|q| match quantity::cpu_millis(&q.0) {
            Ok(millis) => millis,
            Err(err) => {
                warn!(node = %name, %err, "unparseable allocatable CPU, assuming one core");
                DEFAULT_ALLOCATABLE_MILLIS
            }
        })
        .unwrap_or(DEFAULT_ALLOCATABLE_MILLIS);

    NodeRecord {
        name,
        ready,
        taints,
        allocatable_millis,
    }
}

/// Flatten a `Pod` into the record the scheduler works on.
pub fn pod_record(pod: &Pod) -> PodRecord {
    PodRecord {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string()),
        labels: pod.metadata.labels.clone().unwrap_or_default(),
    }
}

/// Whether a pod is claimed by the given scheduler and still unplaced.
pub fn is_pending_for(pod: &Pod, scheduler_name: &str) -> bool {
    let Some(spec) = pod.spec.as_ref() else {
        return false;
    };
    spec.scheduler_name.as_deref() == Some(scheduler_name)
        && spec.node_name.as_deref().unwrap_or_default().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeSpec, NodeStatus, PodSpec, Taint};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use kube::api::ObjectMeta;

    fn ready_condition(status: &str) -> NodeCondition {
        NodeCondition {
            type_: "Ready".to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    fn base_node(name: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                conditions: Some(vec![ready_condition("True")]),
                allocatable: Some(
                    [("cpu".to_string(), Quantity("4".to_string()))]
                        .into_iter()
                        .collect(),
                ),
                ..Default::default()
            }),
            spec: Some(NodeSpec::default()),
        }
    }

    #[test]
    fn node_conversion_captures_readiness_and_allocatable() {
        let record = node_record(&base_node("worker-1"));
        assert_eq!(record.name, "worker-1");
        assert!(record.ready);
        assert!(record.taints.is_empty());
        assert_eq!(record.allocatable_millis, 4000.0);
        assert!(record.schedulable());
    }

    #[test]
    fn unready_node_is_not_schedulable() {
        let mut node = base_node("worker-1");
        node.status.as_mut().unwrap().conditions = Some(vec![ready_condition("False")]);
        assert!(!node_record(&node).schedulable());

        node.status.as_mut().unwrap().conditions = None;
        assert!(!node_record(&node).schedulable());
    }

    #[test]
    fn taint_effects_are_carried_over() {
        let mut node = base_node("worker-1");
        node.spec.as_mut().unwrap().taints = Some(vec![Taint {
            key: "node.kubernetes.io/unreachable".to_string(),
            effect: "NoExecute".to_string(),
            ..Default::default()
        }]);
        let record = node_record(&node);
        assert_eq!(record.taints, vec!["NoExecute"]);
        assert!(!record.schedulable());
    }

    #[test]
    fn missing_or_bad_allocatable_falls_back_to_one_core() {
        let mut node = base_node("worker-1");
        node.status.as_mut().unwrap().allocatable = None;
        assert_eq!(node_record(&node).allocatable_millis, 1000.0);

        let mut node = base_node("worker-1");
        node.status.as_mut().unwrap().allocatable = Some(
            [("cpu".to_string(), Quantity("many".to_string()))]
                .into_iter()
                .collect(),
        );
        assert_eq!(node_record(&node).allocatable_millis, 1000.0);
    }

    fn pod(scheduler: Option<&str>, node: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("flink-taskmanager-0".to_string()),
                namespace: Some("flink".to_string()),
                labels: Some(
                    [("component".to_string(), "taskmanager".to_string())]
                        .into_iter()
                        .collect(),
                ),
                ..Default::default()
            },
            spec: Some(PodSpec {
                scheduler_name: scheduler.map(str::to_string),
                node_name: node.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn pending_filter_requires_claim_and_no_node() {
        assert!(is_pending_for(&pod(Some("adaptive-scheduler"), None), "adaptive-scheduler"));
        assert!(is_pending_for(
            &pod(Some("adaptive-scheduler"), Some("")),
            "adaptive-scheduler"
        ));
        assert!(!is_pending_for(
            &pod(Some("adaptive-scheduler"), Some("worker-1")),
            "adaptive-scheduler"
        ));
        assert!(!is_pending_for(&pod(Some("default-scheduler"), None), "adaptive-scheduler"));
        assert!(!is_pending_for(&pod(None, None), "adaptive-scheduler"));
    }

    #[test]
    fn pod_conversion_keeps_labels_and_namespace() {
        let record = pod_record(&pod(Some("adaptive-scheduler"), None));
        assert_eq!(record.name, "flink-taskmanager-0");
        assert_eq!(record.namespace, "flink");
        assert_eq!(record.labels.get("component").unwrap(), "taskmanager");
        assert_eq!(record.priority(), 1);
    }
}
