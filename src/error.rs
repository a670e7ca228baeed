use thiserror::Error;

use crate::parsing::QuantityError;

/// Failure taxonomy for the aggregation operations. Every variant is terminal
/// for the current invocation; the dispatcher converts them into `Error:` text
/// payloads and the caller decides whether to issue a new call.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("Failed to connect to Kubernetes cluster: {cause}. Ensure kubectl is configured and cluster access is authorized.")]
    ClusterUnreachable { cause: String },

    #[error("malformed resource quantity: {0}")]
    MalformedQuantity(#[from] QuantityError),

    #[error("node {node} has no corresponding metrics entry")]
    MissingNodeMetrics { node: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HealthError {
    pub fn unreachable(cause: impl ToString) -> Self {
        HealthError::ClusterUnreachable {
            cause: cause.to_string(),
        }
    }
}
