//! Raw usage and capacity reads from the cluster APIs.
//!
//! `metrics.k8s.io/v1beta1` has no typed bindings in k8s-openapi, so node
//! metrics are listed through a `DynamicObject` API with the group's actual
//! plural (`nodes`) and the usage quantities are parsed out of the payload.

use crate::error::MetricsError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::Client;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use taskgrid_core::quantity;
use tracing::warn;

/// One node's current usage as reported by the metrics subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeUsage {
    pub cpu_millis: f64,
    pub memory_bytes: f64,
}

/// One node's allocatable resources from the core API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeCapacity {
    pub cpu_millis: f64,
    pub memory_bytes: f64,
}

/// Allocatable CPU assumed when a node does not report one.
const DEFAULT_ALLOCATABLE_MILLIS: f64 = 1000.0;

/// Raw reads backing the CPU source.
#[async_trait]
pub trait UsageFetcher: Send + Sync {
    /// Per-node usage from the metrics endpoint. An `Err` here means the
    /// endpoint itself is unreachable, not that one node is missing.
    async fn usage(&self) -> Result<HashMap<String, NodeUsage>, MetricsError>;

    /// Per-node allocatable resources from the core API.
    async fn allocatable(&self) -> Result<HashMap<String, NodeCapacity>, MetricsError>;

    /// Number of pods currently assigned to a node (estimator input).
    async fn pods_on_node(&self, node: &str) -> Result<usize, MetricsError>;
}

/// Production fetcher over the Kubernetes APIs.
pub struct MetricsApiFetcher {
    client: Client,
    timeout: Duration,
}

impl MetricsApiFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn node_metrics_api(&self) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "NodeMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "nodes");
        Api::all_with(self.client.clone(), &resource)
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, MetricsError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Err(_) => Err(MetricsError::Timeout(self.timeout)),
            Ok(Err(err)) => Err(MetricsError::Api(err.to_string())),
            Ok(Ok(value)) => Ok(value),
        }
    }
}

#[async_trait]
impl UsageFetcher for MetricsApiFetcher {
    async fn usage(&self) -> Result<HashMap<String, NodeUsage>, MetricsError> {
        let api = self.node_metrics_api();
        let list = self.bounded(api.list(&ListParams::default())).await?;

        let mut usage = HashMap::new();
        for item in list.items {
            let Some(name) = item.metadata.name.clone() else {
                continue;
            };
            let cpu_millis = quantity_field(&item, "cpu", &name, quantity::cpu_millis);
            let memory_bytes = quantity_field(&item, "memory", &name, quantity::memory_bytes);
            usage.insert(
                name,
                NodeUsage {
                    cpu_millis,
                    memory_bytes,
                },
            );
        }
        Ok(usage)
    }

    async fn allocatable(&self) -> Result<HashMap<String, NodeCapacity>, MetricsError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = self.bounded(api.list(&ListParams::default())).await?;

        let mut capacity = HashMap::new();
        for node in list.items {
            let Some(name) = node.metadata.name.clone() else {
                continue;
            };
            let allocatable = node.status.and_then(|status| status.allocatable);
            let cpu_millis = allocatable
                .as_ref()
                .and_then(|map| map.get("cpu"))
                .map(|q| parse_or_warn(&q.0, &name, "cpu", quantity::cpu_millis))
                .unwrap_or(DEFAULT_ALLOCATABLE_MILLIS);
            let memory_bytes = allocatable
                .as_ref()
                .and_then(|map| map.get("memory"))
                .map(|q| parse_or_warn(&q.0, &name, "memory", quantity::memory_bytes))
                .unwrap_or(0.0);
            capacity.insert(
                name,
                NodeCapacity {
                    cpu_millis,
                    memory_bytes,
                },
            );
        }
        Ok(capacity)
    }

    async fn pods_on_node(&self, node: &str) -> Result<usize, MetricsError> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let params = ListParams::default().fields(&format!("spec.nodeName={node}"));
        let list = self.bounded(api.list(&params)).await?;
        Ok(list.items.len())
    }
}

/// Pull one usage quantity out of a NodeMetrics payload; 0 with a warning
/// when it is missing or unparseable.
fn quantity_field(
    item: &DynamicObject,
    key: &str,
    node: &str,
    parse: fn(&str) -> Result<f64, quantity::QuantityError>,
) -> f64 {
    let raw = item.data["usage"][key].as_str().unwrap_or_default();
    parse_or_warn(raw, node, key, parse)
}

fn parse_or_warn(
    raw: &str,
    node: &str,
    key: &str,
    parse: fn(&str) -> Result<f64, quantity::QuantityError>,
) -> f64 {
    match parse(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(node, quantity = key, %err, "defaulting unparseable quantity to 0");
            0.0
        }
    }
}
