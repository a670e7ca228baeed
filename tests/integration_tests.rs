use async_trait::async_trait;
use chrono::{Duration, Utc};
use k8s_openapi::api::core::v1::{
    Container, ContainerStatus, Node, NodeCondition, NodeStatus, Pod, PodCondition, PodSpec,
    PodStatus, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use kube_health_agent::{
    ClusterStateGateway, Config, HealthError, HealthToolServer, JsonRpcRequest, NodeMetricsItem,
};

// ============================================================================
// Fixtures
// ============================================================================

fn pod(
    name: &str,
    namespace: &str,
    phase: &str,
    ready: bool,
    restarts: i32,
    requests: Option<(&str, &str)>,
) -> Pod {
    let resources = requests.map(|(cpu, memory)| {
        let mut req = BTreeMap::new();
        req.insert("cpu".to_string(), Quantity(cpu.to_string()));
        req.insert("memory".to_string(), Quantity(memory.to_string()));
        ResourceRequirements {
            requests: Some(req),
            ..Default::default()
        }
    });

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            creation_timestamp: Some(Time(Utc::now() - Duration::minutes(90))),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "main".to_string(),
                resources,
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            container_statuses: Some(vec![ContainerStatus {
                name: "main".to_string(),
                restart_count: restarts,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn node(name: &str, cpu: &str, memory: &str, ready: bool) -> Node {
    let mut allocatable = BTreeMap::new();
    allocatable.insert("cpu".to_string(), Quantity(cpu.to_string()));
    allocatable.insert("memory".to_string(), Quantity(memory.to_string()));

    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            allocatable: Some(allocatable),
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn node_metrics(name: &str, cpu: &str, memory: &str) -> NodeMetricsItem {
    let mut usage = HashMap::new();
    usage.insert("cpu".to_string(), cpu.to_string());
    usage.insert("memory".to_string(), memory.to_string());
    NodeMetricsItem {
        metadata: serde_json::json!({ "name": name }),
        usage,
    }
}

/// Canned two-namespace cluster with one unhealthy pod.
struct MockGateway {
    fail: bool,
}

impl MockGateway {
    fn healthy_cluster() -> Self {
        Self { fail: false }
    }

    fn unreachable() -> Self {
        Self { fail: true }
    }

    fn namespace_pods(&self, namespace: &str) -> Vec<Pod> {
        match namespace {
            "default" => vec![
                pod("api-1", "default", "Running", false, 1, Some(("500m", "256Mi"))),
                pod("api-2", "default", "Running", true, 0, Some(("1", "1Gi"))),
            ],
            "kube-system" => vec![pod(
                "coredns-1",
                "kube-system",
                "Running",
                true,
                0,
                Some(("100m", "70Mi")),
            )],
            _ => vec![],
        }
    }
}

#[async_trait]
impl ClusterStateGateway for MockGateway {
    async fn list_all_pods(&self) -> Result<Vec<Pod>, HealthError> {
        if self.fail {
            return Err(HealthError::unreachable("connection refused"));
        }
        let mut pods = self.namespace_pods("default");
        pods.extend(self.namespace_pods("kube-system"));
        Ok(pods)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, HealthError> {
        if self.fail {
            return Err(HealthError::unreachable("connection refused"));
        }
        Ok(vec![
            node("node-a", "4", "8Gi", true),
            node("node-b", "2", "4Gi", false),
        ])
    }

    async fn list_node_metrics(&self) -> Result<Vec<NodeMetricsItem>, HealthError> {
        if self.fail {
            return Err(HealthError::unreachable("connection refused"));
        }
        // Usage in the units the metrics API actually reports
        Ok(vec![
            node_metrics("node-b", "500000000n", "1048576Ki"),
            node_metrics("node-a", "2000000000n", "4194304Ki"),
        ])
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, HealthError> {
        if self.fail {
            return Err(HealthError::unreachable("connection refused"));
        }
        Ok(vec!["default".to_string(), "kube-system".to_string()])
    }

    async fn list_namespace_pods(&self, namespace: &str) -> Result<Vec<Pod>, HealthError> {
        if self.fail {
            return Err(HealthError::unreachable("connection refused"));
        }
        Ok(self.namespace_pods(namespace))
    }
}

fn request(method: &str, params: Value) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!(1)),
        method: method.to_string(),
        params,
    }
}

fn call_tool(name: &str) -> JsonRpcRequest {
    request("tools/call", serde_json::json!({ "name": name, "arguments": {} }))
}

async fn tool_text(server: &HealthToolServer<MockGateway>, name: &str) -> String {
    let response = server.handle_request(call_tool(name)).await;
    assert!(response.error.is_none(), "tool calls never fault the protocol");
    response.result.unwrap()["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string()
}

// ============================================================================
// get_unhealthy_pods
// ============================================================================

#[tokio::test]
async fn test_unhealthy_pods_end_to_end() {
    let server = HealthToolServer::new(MockGateway::healthy_cluster(), Config::default());
    let text = tool_text(&server, "get_unhealthy_pods").await;
    let payload: Value = serde_json::from_str(&text).unwrap();

    // api-1 is Running but not ready; everything else is healthy
    assert_eq!(payload["unhealthy_count"], 1);
    let unhealthy = &payload["pods"][0];
    assert_eq!(unhealthy["name"], "api-1");
    assert_eq!(unhealthy["namespace"], "default");
    assert_eq!(unhealthy["status"], "Running");
    assert_eq!(unhealthy["ready"], false);
    assert_eq!(unhealthy["restarts"], 1);
    assert_eq!(unhealthy["reason"], "Unknown");
    assert_eq!(unhealthy["age"], "1h");
}

#[tokio::test]
async fn test_unhealthy_pods_is_idempotent() {
    let server = HealthToolServer::new(MockGateway::healthy_cluster(), Config::default());
    let first = tool_text(&server, "get_unhealthy_pods").await;
    let second = tool_text(&server, "get_unhealthy_pods").await;
    assert_eq!(first, second);
}

// ============================================================================
// get_resource_usage
// ============================================================================

#[tokio::test]
async fn test_resource_usage_end_to_end() {
    let server = HealthToolServer::new(MockGateway::healthy_cluster(), Config::default());
    let text = tool_text(&server, "get_resource_usage").await;
    let payload: Value = serde_json::from_str(&text).unwrap();

    // Metrics arrive out of order; the join is by name
    assert_eq!(payload["nodes"][0]["name"], "node-a");
    assert_eq!(payload["nodes"][0]["cpu_usage"], "50.0%");
    assert_eq!(payload["nodes"][0]["status"], "Ready");
    assert_eq!(payload["nodes"][1]["name"], "node-b");
    assert_eq!(payload["nodes"][1]["status"], "NotReady");

    // 500m + 1 core
    assert_eq!(payload["namespaces"]["default"]["cpu"], "1500m");
    assert_eq!(payload["namespaces"]["default"]["memory"], "1280Mi");
    assert_eq!(payload["namespaces"]["kube-system"]["cpu"], "100m");
    assert_eq!(payload["namespaces"]["kube-system"]["memory"], "70Mi");
}

// ============================================================================
// generate_health_report
// ============================================================================

#[tokio::test]
async fn test_health_report_narrative() {
    let server = HealthToolServer::new(MockGateway::healthy_cluster(), Config::default());
    let text = tool_text(&server, "generate_health_report").await;

    assert!(text.starts_with("# 🏥 Kubernetes Cluster Health Report"));
    assert!(text.contains("**Cluster**: mcp-k8s-cluster"));
    assert!(text.contains("⚠️ **1 unhealthy pods detected**"));
    assert!(text.contains("### api-1"));
    assert!(text.contains("## Resource Usage"));
    assert!(text.contains("**node-a**"));
    assert!(text.contains("- **default**: CPU 1500m, Memory 1280Mi"));
    assert!(text.contains("## Recommendations"));
    assert!(text.contains("NotReady nodes before scheduling more work: node-b"));
    assert!(text.ends_with("*Report generated by kube-health-agent*\n"));
}

// ============================================================================
// Protocol surface and failure paths
// ============================================================================

#[tokio::test]
async fn test_tools_list_surface() {
    let server = HealthToolServer::new(MockGateway::healthy_cluster(), Config::default());
    let response = server.handle_request(request("tools/list", Value::Null)).await;
    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 3);
    for tool in &tools {
        assert_eq!(tool["inputSchema"]["type"], "object");
        assert_eq!(tool["inputSchema"]["properties"], serde_json::json!({}));
    }
}

#[tokio::test]
async fn test_unknown_tool_is_error_text_not_fault() {
    let server = HealthToolServer::new(MockGateway::healthy_cluster(), Config::default());
    let text = tool_text(&server, "restart_pod").await;
    assert_eq!(text, "Error: Unknown tool: restart_pod");
}

#[tokio::test]
async fn test_unreachable_cluster_is_error_text_not_fault() {
    let server = HealthToolServer::new(MockGateway::unreachable(), Config::default());
    let text = tool_text(&server, "get_unhealthy_pods").await;
    assert!(text.starts_with("Error: Failed to connect to Kubernetes cluster: connection refused"));
    assert!(text.contains("Ensure kubectl is configured"));
}

#[tokio::test]
async fn test_unknown_method_is_protocol_fault() {
    let server = HealthToolServer::new(MockGateway::healthy_cluster(), Config::default());
    let response = server
        .handle_request(request("prompts/list", Value::Null))
        .await;
    assert!(response.result.is_none());
    assert_eq!(response.error.unwrap().code, -32601);
}
