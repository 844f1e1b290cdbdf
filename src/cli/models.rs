use anyhow::{Context, Result};
use console::style;

use crate::core::config::AppConfig;
use crate::core::llm::ModelClient;
use crate::core::terminal::{print_info, print_step, print_warn};

pub async fn list_models(config: AppConfig) -> Result<()> {
    let client = super::build_client(&config)?;
    let models = client
        .list_models()
        .await
        .with_context(|| format!("Could not list models at {}", client.endpoint()))?;

    print_step(&format!("Models at {}", client.endpoint()));
    if models.is_empty() {
        print_warn("No models installed. Pull one with 'ollama pull mistral'.");
        return Ok(());
    }

    for model in &models {
        let marker = if super::doctor::is_model_match(&model.name, &config.model) {
            style("*").green().bold().to_string()
        } else {
            " ".to_string()
        };
        println!("  {} {}", marker, model.name);
    }
    print_info(&format!("Active model: {}", config.model));
    Ok(())
}
