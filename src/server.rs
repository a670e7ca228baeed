use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::HealthError;
use crate::gateway::ClusterStateGateway;
use crate::{health, report, usage};

// ============================================================================
// JSON-RPC Types
// ============================================================================

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

// ============================================================================
// Tool routing
// ============================================================================

/// The closed set of advertised operations. Routing is a match over this enum
/// rather than open-ended string dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    GetUnhealthyPods,
    GetResourceUsage,
    GenerateHealthReport,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [
        ToolName::GetUnhealthyPods,
        ToolName::GetResourceUsage,
        ToolName::GenerateHealthReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GetUnhealthyPods => "get_unhealthy_pods",
            ToolName::GetResourceUsage => "get_resource_usage",
            ToolName::GenerateHealthReport => "generate_health_report",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolName::GetUnhealthyPods => "List all unhealthy pods in the cluster",
            ToolName::GetResourceUsage => {
                "Get CPU and memory usage across nodes and namespaces"
            }
            ToolName::GenerateHealthReport => "Generate a comprehensive cluster health report",
        }
    }
}

impl FromStr for ToolName {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| HealthError::UnknownTool(s.to_string()))
    }
}

// ============================================================================
// Server
// ============================================================================

/// Protocol-facing shell around the classifier, aggregator and composer.
/// One request is handled to completion before the next line is read.
pub struct HealthToolServer<G> {
    gateway: Arc<G>,
    config: Config,
}

impl<G: ClusterStateGateway> HealthToolServer<G> {
    pub fn new(gateway: G, config: Config) -> Self {
        Self {
            gateway: Arc::new(gateway),
            config,
        }
    }

    /// Handle an incoming JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, "handling request");

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "initialized" => JsonRpcResponse::success(request.id, serde_json::json!({})),
            "ping" => JsonRpcResponse::success(request.id, serde_json::json!({})),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            _ => {
                warn!(method = %request.method, "unknown method");
                JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                )
            }
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": "kube-health-agent",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        info!("server initialized");
        JsonRpcResponse::success(id, result)
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<Value> = ToolName::ALL
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.as_str(),
                    "description": t.description(),
                    "inputSchema": { "type": "object", "properties": {} }
                })
            })
            .collect();
        JsonRpcResponse::success(id, serde_json::json!({ "tools": tools }))
    }

    /// Tool calls always produce a successful protocol envelope; internal
    /// failures become an `Error:` text payload rather than a protocol fault.
    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        #[derive(Debug, Deserialize)]
        struct ToolCallParams {
            name: String,
            #[serde(default)]
            #[allow(dead_code)] // All three tools take empty input
            arguments: Value,
        }

        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e));
            }
        };

        debug!(tool = %params.name, "calling tool");

        let outcome = match ToolName::from_str(&params.name) {
            Ok(tool) => self.run_tool(tool).await,
            Err(e) => Err(e),
        };

        let text = match outcome {
            Ok(text) => text,
            Err(e) => {
                error!(tool = %params.name, error = %e, "tool call failed");
                format!("Error: {}", e)
            }
        };

        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "content": [{ "type": "text", "text": text }]
            }),
        )
    }

    async fn run_tool(&self, tool: ToolName) -> Result<String, HealthError> {
        match tool {
            ToolName::GetUnhealthyPods => {
                let summary = health::collect_unhealthy_pods(&*self.gateway, &self.config).await?;
                Ok(serde_json::to_string_pretty(&summary)?)
            }
            ToolName::GetResourceUsage => {
                let summary =
                    usage::collect_resource_usage(&*self.gateway, self.config.namespace_concurrency)
                        .await?;
                Ok(serde_json::to_string_pretty(&summary.to_json())?)
            }
            ToolName::GenerateHealthReport => {
                let pods = health::collect_unhealthy_pods(&*self.gateway, &self.config).await?;
                let resources =
                    usage::collect_resource_usage(&*self.gateway, self.config.namespace_concurrency)
                        .await?;
                Ok(report::render_report(
                    &self.config.cluster_name,
                    self.config.top_namespaces,
                    &pods,
                    &resources,
                    Utc::now(),
                ))
            }
        }
    }

    /// Run the server over stdio, newline-delimited JSON-RPC. Requests are
    /// processed strictly one at a time.
    pub async fn serve_stdio(self) -> Result<(), std::io::Error> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        info!("listening on stdio");

        while let Some(line) = lines.next_line().await? {
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!(error = %e, "failed to parse request");
                    JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e))
                }
            };

            let response_json = serde_json::to_string(&response)?;
            stdout.write_all(response_json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        info!("server shutdown");
        Ok(())
    }
}
