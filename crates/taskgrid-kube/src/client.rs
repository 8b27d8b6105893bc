//! The Kubernetes orchestrator client.

use crate::convert::{is_pending_for, node_record, pod_record};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ListParams};
use kube::Client;
use std::future::Future;
use std::time::Duration;
use taskgrid_core::{BindError, NodeRecord, Orchestrator, OrchestratorError, PodRecord};
use tracing::debug;

/// The `spec.schedulerName` value this scheduler claims pods by.
pub const SCHEDULER_NAME: &str = "adaptive-scheduler";

/// Label selector for the worker pods this scheduler places.
pub const COMPONENT_SELECTOR: &str = "component=taskmanager";

/// Orchestrator implementation over the Kubernetes API.
///
/// Listings span all namespaces; the pending-pod listing is narrowed
/// server-side by the component label and client-side by scheduler claim.
pub struct KubeOrchestrator {
    client: Client,
    nodes: Api<Node>,
    pods: Api<Pod>,
    scheduler_name: String,
    label_selector: String,
    timeout: Duration,
}

impl KubeOrchestrator {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            nodes: Api::all(client.clone()),
            pods: Api::all(client.clone()),
            client,
            scheduler_name: SCHEDULER_NAME.to_string(),
            label_selector: COMPONENT_SELECTOR.to_string(),
            timeout,
        }
    }

    /// Override the claim name and label selector (experiments run several
    /// differently-named schedulers side by side).
    pub fn with_claim(mut self, scheduler_name: &str, label_selector: &str) -> Self {
        self.scheduler_name = scheduler_name.to_string();
        self.label_selector = label_selector.to_string();
        self
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, OrchestratorError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Err(_) => Err(OrchestratorError::Timeout(self.timeout)),
            Ok(Err(err)) => Err(OrchestratorError::Api(err.to_string())),
            Ok(Ok(value)) => Ok(value),
        }
    }
}

#[async_trait]
impl Orchestrator for KubeOrchestrator {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, OrchestratorError> {
        let list = self
            .bounded(self.nodes.list(&ListParams::default()))
            .await?;
        Ok(list.items.iter().map(node_record).collect())
    }

    async fn list_pending_pods(&self) -> Result<Vec<PodRecord>, OrchestratorError> {
        let params = ListParams::default().labels(&self.label_selector);
        let list = self.bounded(self.pods.list(&params)).await?;
        Ok(list
            .items
            .iter()
            .filter(|pod| is_pending_for(pod, &self.scheduler_name))
            .map(pod_record)
            .collect())
    }

    async fn bind(&self, pod: &PodRecord, node: &str) -> Result<(), BindError> {
        let binding = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Binding",
            "metadata": { "name": pod.name },
            "target": {
                "apiVersion": "v1",
                "kind": "Node",
                "name": node,
            },
        });
        let body = serde_json::to_vec(&binding)
            .map_err(|err| BindError::Transient(err.to_string()))?;

        let uri = format!(
            "/api/v1/namespaces/{}/pods/{}/binding",
            pod.namespace, pod.name
        );
        let request = http::Request::post(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(body)
            .map_err(|err| BindError::Transient(err.to_string()))?;

        debug!(pod = %pod.name, namespace = %pod.namespace, node, "posting binding");
        let response = tokio::time::timeout(
            self.timeout,
            self.client.request::<serde_json::Value>(request),
        )
        .await;

        match response {
            Err(_) => Err(BindError::Transient(format!(
                "binding timed out after {:?}",
                self.timeout
            ))),
            Ok(Ok(_)) => Ok(()),
            Ok(Err(kube::Error::Api(status))) if status.code == 409 => Err(BindError::Conflict),
            Ok(Err(kube::Error::Api(status))) if status.code == 403 => Err(BindError::Forbidden(
                format!("{} ({})", status.message, status.reason),
            )),
            Ok(Err(err)) => Err(BindError::Transient(err.to_string())),
        }
    }
}
