use serde::Serialize;
use std::fmt;

/// Pod lifecycle phase as reported by the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Anything the API reports outside the known set maps to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Classifier output for a single unhealthy pod.
#[derive(Debug, Clone, Serialize)]
pub struct PodHealthVerdict {
    pub name: String,
    pub namespace: String,
    pub status: PodPhase,
    pub ready: bool,
    pub restarts: i32,
    pub reason: String,
    pub age: String,
}

/// Payload of `get_unhealthy_pods`. Carries no timestamp on purpose:
/// identical cluster state must serialize identically across calls.
#[derive(Debug, Clone, Serialize)]
pub struct PodHealthSummary {
    pub unhealthy_count: usize,
    pub pods: Vec<PodHealthVerdict>,
}

/// Per-node utilization derived from allocatable capacity and live metrics.
/// The numeric percentages feed the recommendation rules and stay off the
/// wire; the formatted strings are the payload contract.
#[derive(Debug, Clone, Serialize)]
pub struct NodeUsage {
    pub name: String,
    pub cpu_usage: String,
    pub memory_usage: String,
    pub status: String,
    #[serde(skip)]
    pub cpu_pct: f64,
    #[serde(skip)]
    pub memory_pct: f64,
}

/// Summed resource requests for one namespace, normalized to millicores / MiB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceUsage {
    pub namespace: String,
    pub cpu_millicores: i64,
    pub memory_mib: i64,
}

/// Payload of `get_resource_usage`. The namespace list keeps cluster listing
/// order; ranking for the narrative report relies on it for tie-breaks.
#[derive(Debug, Clone)]
pub struct ResourceUsageSummary {
    pub nodes: Vec<NodeUsage>,
    pub namespaces: Vec<NamespaceUsage>,
}

impl ResourceUsageSummary {
    /// Wire shape: `{nodes: [...], namespaces: {name: {cpu: "Nm", memory: "NMi"}}}`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut namespaces = serde_json::Map::new();
        for ns in &self.namespaces {
            namespaces.insert(
                ns.namespace.clone(),
                serde_json::json!({
                    "cpu": format!("{}m", ns.cpu_millicores),
                    "memory": format!("{}Mi", ns.memory_mib),
                }),
            );
        }
        serde_json::json!({
            "nodes": self.nodes,
            "namespaces": namespaces,
        })
    }
}
