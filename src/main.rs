use anyhow::Result;
use kube::Client;
use tracing::info;

mod types;
mod config;
mod error;
mod parsing;
mod gateway;
mod health;
mod usage;
mod report;
mod server;

use config::load_config;
use gateway::KubeGateway;
use server::HealthToolServer;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = load_config()?;
    info!(cluster = %cfg.cluster_name, "starting health tool server");

    let client = Client::try_default().await?;
    let gateway = KubeGateway::new(client);

    let server = HealthToolServer::new(gateway, cfg);
    server.serve_stdio().await?;

    Ok(())
}

fn init_tracing() {
    // stdout carries the protocol stream; diagnostics go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
