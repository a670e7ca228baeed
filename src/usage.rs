use futures::stream::{self, StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::{Node, Pod};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::HealthError;
use crate::gateway::{ClusterStateGateway, NodeMetricsItem};
use crate::parsing::{
    parse_cpu_millicores, parse_memory_mib, parse_metrics_cpu_millicores, parse_metrics_memory_mib,
};
use crate::types::{NamespaceUsage, NodeUsage, ResourceUsageSummary};

/// Aggregate node utilization and per-namespace request totals. Any
/// sub-retrieval or parse failure aborts the whole aggregation; partial
/// results are never returned.
pub async fn collect_resource_usage<G: ClusterStateGateway>(
    gateway: &G,
    concurrency: usize,
) -> Result<ResourceUsageSummary, HealthError> {
    let nodes = gateway.list_nodes().await?;
    let metrics = gateway.list_node_metrics().await?;
    let node_usage = node_usage_from(&nodes, &metrics)?;

    let namespaces = collect_namespace_usage(gateway, concurrency).await?;
    info!(
        nodes = node_usage.len(),
        namespaces = namespaces.len(),
        "resource aggregation complete"
    );

    Ok(ResourceUsageSummary {
        nodes: node_usage,
        namespaces,
    })
}

/// Join nodes with their metrics by node name. A node without a metrics entry
/// is an error rather than a silent mis-pairing.
pub fn node_usage_from(
    nodes: &[Node],
    metrics: &[NodeMetricsItem],
) -> Result<Vec<NodeUsage>, HealthError> {
    let metrics_by_name: HashMap<&str, &NodeMetricsItem> = metrics
        .iter()
        .filter_map(|m| m.name().map(|n| (n, m)))
        .collect();

    let mut usage = Vec::with_capacity(nodes.len());
    for node in nodes {
        let name = match node.metadata.name.as_deref() {
            Some(n) => n,
            None => continue,
        };
        let node_metrics =
            metrics_by_name
                .get(name)
                .ok_or_else(|| HealthError::MissingNodeMetrics {
                    node: name.to_string(),
                })?;

        let (cpu_pct, memory_pct) = utilization_percentages(node, node_metrics)?;
        usage.push(NodeUsage {
            name: name.to_string(),
            cpu_usage: format!("{:.1}%", cpu_pct),
            memory_usage: format!("{:.1}%", memory_pct),
            status: node_readiness(node).to_string(),
            cpu_pct,
            memory_pct,
        });
    }
    Ok(usage)
}

// Node allocatable and live usage come in API units (nanocores, Ki), not the
// request grammar, so this path uses the metrics parsers.
fn utilization_percentages(
    node: &Node,
    metrics: &NodeMetricsItem,
) -> Result<(f64, f64), HealthError> {
    let allocatable = node.status.as_ref().and_then(|s| s.allocatable.as_ref());

    let cpu_allocatable = allocatable
        .and_then(|a| a.get("cpu"))
        .map(|q| parse_metrics_cpu_millicores(&q.0))
        .transpose()?
        .unwrap_or(0);
    let memory_allocatable = allocatable
        .and_then(|a| a.get("memory"))
        .map(|q| parse_metrics_memory_mib(&q.0))
        .transpose()?
        .unwrap_or(0);

    let cpu_usage = metrics
        .usage
        .get("cpu")
        .map(|q| parse_metrics_cpu_millicores(q))
        .transpose()?
        .unwrap_or(0);
    let memory_usage = metrics
        .usage
        .get("memory")
        .map(|q| parse_metrics_memory_mib(q))
        .transpose()?
        .unwrap_or(0);

    Ok((
        percentage(cpu_usage, cpu_allocatable),
        percentage(memory_usage, memory_allocatable),
    ))
}

fn percentage(usage: i64, allocatable: i64) -> f64 {
    if allocatable <= 0 {
        return 0.0;
    }
    let pct = usage as f64 / allocatable as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

fn node_readiness(node: &Node) -> &'static str {
    let ready = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false);
    if ready {
        "Ready"
    } else {
        "NotReady"
    }
}

/// One bounded-parallel task per namespace; `buffered` keeps namespace listing
/// order so downstream ranking tie-breaks stay deterministic.
async fn collect_namespace_usage<G: ClusterStateGateway>(
    gateway: &G,
    concurrency: usize,
) -> Result<Vec<NamespaceUsage>, HealthError> {
    let namespaces = gateway.list_namespaces().await?;
    debug!(count = namespaces.len(), concurrency, "summing namespace requests");

    let totals: Vec<Option<NamespaceUsage>> = stream::iter(namespaces)
        .map(|namespace| async move {
            let pods = gateway.list_namespace_pods(&namespace).await?;
            let (cpu_millicores, memory_mib) = sum_namespace_requests(&pods)?;
            if cpu_millicores > 0 || memory_mib > 0 {
                Ok::<_, HealthError>(Some(NamespaceUsage {
                    namespace,
                    cpu_millicores,
                    memory_mib,
                }))
            } else {
                Ok(None)
            }
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(totals.into_iter().flatten().collect())
}

/// Sum CPU and memory requests across every container of every pod.
pub fn sum_namespace_requests(pods: &[Pod]) -> Result<(i64, i64), HealthError> {
    let mut cpu_sum: i64 = 0;
    let mut mem_sum: i64 = 0;

    for pod in pods {
        let Some(spec) = pod.spec.as_ref() else {
            continue;
        };
        for container in &spec.containers {
            let Some(requests) = container
                .resources
                .as_ref()
                .and_then(|r| r.requests.as_ref())
            else {
                continue;
            };
            if let Some(cpu) = requests.get("cpu") {
                cpu_sum += parse_cpu_millicores(&cpu.0)?;
            }
            if let Some(memory) = requests.get("memory") {
                mem_sum += parse_memory_mib(&memory.0)?;
            }
        }
    }
    Ok((cpu_sum, mem_sum))
}
