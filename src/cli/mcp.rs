use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::core::chain::SimpleChain;
use crate::core::config::AppConfig;
use crate::core::llm::ModelClient;
use crate::interfaces::mcp::McpServer;
use crate::logging::{self, LogEcho};

pub async fn run_mcp_server(config: AppConfig) -> Result<()> {
    // stdout is the protocol channel.
    logging::init(config.log_level(), LogEcho::Stderr);

    let client: Arc<dyn ModelClient> = super::build_client(&config)?;
    info!(
        "Starting BuildPilot MCP server (model: {}, backend: {})",
        config.model,
        client.endpoint()
    );

    let server = McpServer::new(SimpleChain::new(client, config.model.clone()));
    server.serve(tokio::io::stdin(), tokio::io::stdout()).await
}
