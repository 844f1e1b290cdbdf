use std::sync::Arc;

use anyhow::Result;
use console::style;
use tracing::info;

use crate::core::config::AppConfig;
use crate::core::llm::ModelClient;
use crate::core::terminal::{self, print_link, print_status};
use crate::interfaces::web::ApiServer;
use crate::logging::{self, LogEcho};

pub async fn run_server(config: AppConfig) -> Result<()> {
    let log_tx = logging::init(config.log_level(), LogEcho::Stdout);
    let client: Arc<dyn ModelClient> = super::build_client(&config)?;

    info!(
        "Starting BuildPilot (model: {}, backend: {})",
        config.model,
        client.endpoint()
    );

    let backend = client.endpoint().to_string();
    let server = ApiServer::new(&config, client, log_tx);

    terminal::print_banner();
    print_link("Web App", &format!("http://{}", config.addr()));
    print_status("Model", &config.model);
    print_status("Backend", &backend);
    print_status("Sections", &server.section_names().join(" → "));
    print_status(
        "Press Ctrl+C to stop the server.",
        &format!("{}", style("Ctrl+C").bold().yellow()),
    );
    println!();

    server
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
}
