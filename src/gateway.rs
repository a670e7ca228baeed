use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::{api::ListParams, Api, Client};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::HealthError;

/// One entry from the `metrics.k8s.io` node metrics listing.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeMetricsItem {
    pub metadata: serde_json::Value,
    pub usage: HashMap<String, String>,
}

impl NodeMetricsItem {
    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct NodeMetricsList {
    items: Vec<NodeMetricsItem>,
}

/// Point-in-time reads of cluster state. The agent only ever reads; every
/// method returns a fresh snapshot and failures map uniformly to
/// `ClusterUnreachable`.
#[async_trait]
pub trait ClusterStateGateway: Send + Sync {
    async fn list_all_pods(&self) -> Result<Vec<Pod>, HealthError>;
    async fn list_nodes(&self) -> Result<Vec<Node>, HealthError>;
    async fn list_node_metrics(&self) -> Result<Vec<NodeMetricsItem>, HealthError>;
    async fn list_namespaces(&self) -> Result<Vec<String>, HealthError>;
    async fn list_namespace_pods(&self, namespace: &str) -> Result<Vec<Pod>, HealthError>;
}

/// Production gateway over a `kube::Client`.
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterStateGateway for KubeGateway {
    async fn list_all_pods(&self) -> Result<Vec<Pod>, HealthError> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let pods = api
            .list(&ListParams::default())
            .await
            .map_err(HealthError::unreachable)?;
        debug!(count = pods.items.len(), "listed pods cluster-wide");
        Ok(pods.items)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, HealthError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(HealthError::unreachable)?;
        Ok(nodes.items)
    }

    async fn list_node_metrics(&self) -> Result<Vec<NodeMetricsItem>, HealthError> {
        use http::Request as HttpRequest;
        let req = HttpRequest::builder()
            .method("GET")
            .uri("/apis/metrics.k8s.io/v1beta1/nodes")
            .body(Vec::new())
            .map_err(HealthError::unreachable)?;
        let list: NodeMetricsList = self
            .client
            .request(req)
            .await
            .map_err(HealthError::unreachable)?;
        Ok(list.items)
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, HealthError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = api
            .list(&ListParams::default())
            .await
            .map_err(HealthError::unreachable)?;
        Ok(namespaces
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    async fn list_namespace_pods(&self, namespace: &str) -> Result<Vec<Pod>, HealthError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api
            .list(&ListParams::default())
            .await
            .map_err(HealthError::unreachable)?;
        Ok(pods.items)
    }
}
