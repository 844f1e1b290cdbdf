use anyhow::{Result, bail};

use crate::core::config::AppConfig;
use crate::core::llm::ModelClient;
use crate::core::terminal::{
    print_error, print_info, print_status, print_step, print_success, print_warn,
};

/// Ollama reports untagged pulls as `name:latest`.
pub(crate) fn is_model_match(installed: &str, wanted: &str) -> bool {
    installed == wanted || (!wanted.contains(':') && installed == format!("{}:latest", wanted))
}

pub async fn run_doctor(config: AppConfig) -> Result<()> {
    print_step("Checking BuildPilot setup...");
    println!();
    print_status("Backend", &config.ollama_url);
    print_status("Model", &config.model);
    print_status("Listen", &config.addr());
    println!();

    let client = super::build_client(&config)?;
    let mut problems = 0;

    // 1. Reachability
    match client.list_models().await {
        Ok(models) => {
            print_success(&format!("Ollama is reachable ({} models installed)", models.len()));

            // 2. Model presence
            if models.iter().any(|m| is_model_match(&m.name, &config.model)) {
                print_success(&format!("Model '{}' is installed", config.model));
            } else {
                print_warn(&format!(
                    "Model '{}' is not installed. Pull it with 'ollama pull {}'.",
                    config.model, config.model
                ));
                problems += 1;
            }
        }
        Err(e) => {
            print_error(&e.to_string());
            print_info("Start the backend with 'ollama serve'.");
            bail!("Model backend is not reachable");
        }
    }

    // 3. One-token round trip
    match client.ping(&config.model).await {
        Ok(()) => print_success("Model answered a test prompt"),
        Err(e) => {
            print_error(&format!("Test prompt failed: {}", e));
            problems += 1;
        }
    }

    println!();
    if problems > 0 {
        bail!("{} problem(s) found", problems);
    }
    print_success("All checks passed.");
    Ok(())
}
