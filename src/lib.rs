// Public modules
pub mod types;
pub mod config;
pub mod error;
pub mod parsing;
pub mod gateway;
pub mod health;
pub mod usage;
pub mod report;
pub mod server;

// Re-export commonly used items
pub use types::*;
pub use config::{load_config, load_config_with_env, Config, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use error::HealthError;
pub use parsing::{
    parse_cpu_millicores, parse_memory_mib, parse_metrics_cpu_millicores, parse_metrics_memory_mib,
    QuantityError,
};
pub use gateway::{ClusterStateGateway, KubeGateway, NodeMetricsItem};
pub use health::collect_unhealthy_pods;
pub use usage::collect_resource_usage;
pub use report::render_report;
pub use server::{HealthToolServer, JsonRpcRequest, JsonRpcResponse, ToolName};
