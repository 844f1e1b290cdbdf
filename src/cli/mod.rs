mod doctor;
mod mcp;
mod models;
mod run;
mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use console::style;

use crate::core::config::{AppConfig, normalize_backend_url};
use crate::core::llm::ollama::OllamaClient;
use crate::core::terminal::{self, print_error};

fn print_help() {
    terminal::print_banner();

    println!("  {}", style("Commands").bold());
    terminal::print_command("serve", "Start the web app (default)");
    terminal::print_command("run", "Generate an MVP for --idea in the terminal");
    terminal::print_command("mcp", "Serve the four stages as MCP tools over stdio");
    terminal::print_command("doctor", "Check that the model backend is reachable");
    terminal::print_command("models", "List models installed on the backend");
    terminal::print_command("help", "Show this message");

    println!("\n  {}", style("Options").bold());
    terminal::print_command("--config", "Path to a TOML config file");
    terminal::print_command("--host", "Address to bind (serve)");
    terminal::print_command("--port", "Port to bind (serve)");
    terminal::print_command("--model", "Model name passed to the backend");
    terminal::print_command("--ollama-url", "Base URL of the Ollama server");
    terminal::print_command("--idea", "Product idea (run)");
    terminal::print_command("--stream", "Render section by section (run)");

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("buildpilot").green()
    );
}

/// Flags that override the loaded configuration, shared by every command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub model: Option<String>,
    pub ollama_url: Option<String>,
}

impl CliOverrides {
    pub(crate) fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(url) = &self.ollama_url {
            config.ollama_url = normalize_backend_url(url);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RunArgs {
    pub idea: String,
    pub stream: bool,
}

fn flag_value(args: &[String], i: usize, flag: &str) -> Result<String> {
    match args.get(i + 1) {
        Some(value) => Ok(value.clone()),
        None => bail!("{} expects a value", flag),
    }
}

pub(crate) fn parse_overrides(args: &[String], start: usize) -> Result<CliOverrides> {
    let mut overrides = CliOverrides::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                overrides.config_path = Some(PathBuf::from(flag_value(args, i, "--config")?));
                i += 2;
            }
            "--host" => {
                overrides.host = Some(flag_value(args, i, "--host")?);
                i += 2;
            }
            "--port" | "-p" => {
                let raw = flag_value(args, i, "--port")?;
                let port = raw
                    .parse()
                    .with_context(|| format!("--port is not a valid port: {}", raw))?;
                overrides.port = Some(port);
                i += 2;
            }
            "--model" | "-m" => {
                overrides.model = Some(flag_value(args, i, "--model")?);
                i += 2;
            }
            "--ollama-url" => {
                overrides.ollama_url = Some(flag_value(args, i, "--ollama-url")?);
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(overrides)
}

pub(crate) fn parse_run_args(args: &[String], start: usize) -> Result<RunArgs> {
    let mut parsed = RunArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--idea" | "-i" => {
                parsed.idea = flag_value(args, i, "--idea")?;
                i += 2;
            }
            "--stream" | "-s" => {
                parsed.stream = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    Ok(parsed)
}

async fn load_config(overrides: &CliOverrides) -> Result<AppConfig> {
    let mut config = AppConfig::load(overrides.config_path.as_deref()).await?;
    overrides.apply(&mut config);
    Ok(config)
}

fn build_client(config: &AppConfig) -> Result<Arc<OllamaClient>> {
    let client = OllamaClient::new(&config.ollama_url, config.request_timeout())?;
    Ok(Arc::new(client))
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // No command, or a leading flag, means serve.
    let (cmd, start) = match args.get(1).map(String::as_str) {
        None => ("serve", 1),
        Some(first) if first.starts_with('-') && !matches!(first, "--help" | "-h") => {
            ("serve", 1)
        }
        Some(first) => (first, 2),
    };

    match cmd {
        "serve" => {
            let config = load_config(&parse_overrides(&args, start)?).await?;
            serve::run_server(config).await
        }
        "run" => {
            let run_args = parse_run_args(&args, start)?;
            if run_args.idea.trim().is_empty() {
                print_error("Error: --idea is required for run mode.");
                print_help();
                return Ok(());
            }
            let config = load_config(&parse_overrides(&args, start)?).await?;
            run::run_once(config, run_args).await
        }
        "mcp" => {
            let config = load_config(&parse_overrides(&args, start)?).await?;
            mcp::run_mcp_server(config).await
        }
        "doctor" => {
            let config = load_config(&parse_overrides(&args, start)?).await?;
            doctor::run_doctor(config).await
        }
        "models" => {
            let config = load_config(&parse_overrides(&args, start)?).await?;
            models::list_models(config).await
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        _ => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
            Ok(())
        }
    }
}
