use std::io::Write;
use std::sync::Arc;

use anyhow::{Result, bail};
use futures_util::StreamExt;
use tracing::Level;

use crate::core::chain::SimpleChain;
use crate::core::config::AppConfig;
use crate::core::idea::Idea;
use crate::core::llm::ModelClient;
use crate::core::pipeline::{GenerationEvent, SectionPipeline};
use crate::core::terminal::{print_error, print_info, print_step, print_success};
use crate::logging::{self, LogEcho};

use super::RunArgs;

pub async fn run_once(config: AppConfig, args: RunArgs) -> Result<()> {
    let (level, echo) = log_settings(&config);
    logging::init(level, echo);

    let idea = Idea::parse(&args.idea)?;
    let client: Arc<dyn ModelClient> = super::build_client(&config)?;

    if args.stream {
        stream_to_terminal(SectionPipeline::from_config(client, &config), &idea).await
    } else {
        run_chain(SimpleChain::new(client, config.model.clone()), &idea).await
    }
}

/// Generated text owns stdout, so only warnings and errors are logged, to stderr.
fn log_settings(config: &AppConfig) -> (Level, LogEcho) {
    (std::cmp::min(config.log_level(), Level::WARN), LogEcho::Stderr)
}

async fn run_chain(chain: SimpleChain, idea: &Idea) -> Result<()> {
    print_info(&format!("Running the chain for: {}", idea));
    let output = chain.run(idea).await?;

    for (title, body) in [
        ("Research", &output.research),
        ("Plan", &output.plan),
        ("Code", &output.code),
        ("Review", &output.review),
    ] {
        println!();
        print_step(title);
        println!("{}", body);
    }
    println!();
    print_success("MVP generation complete");
    Ok(())
}

async fn stream_to_terminal(pipeline: SectionPipeline, idea: &Idea) -> Result<()> {
    let mut events = pipeline.run(idea);
    let mut failed_sections = 0;
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        let terminal = event.is_terminal();
        match event {
            GenerationEvent::Status { message } | GenerationEvent::Start { message } => {
                print_info(&message);
            }
            GenerationEvent::StepStart { step } => {
                println!();
                print_step(&step);
            }
            GenerationEvent::TextChunk { content, .. } => {
                print!("{}", content);
                stdout.flush()?;
            }
            GenerationEvent::StepComplete { .. } => println!(),
            GenerationEvent::StatusUpdate { .. } => {}
            GenerationEvent::Error {
                step: Some(_),
                error,
            } => {
                println!();
                print_error(&error);
                failed_sections += 1;
            }
            GenerationEvent::Error { step: None, error } => bail!(error),
            GenerationEvent::Complete { message } => {
                println!();
                print_success(&message);
            }
        }
        if terminal {
            break;
        }
    }

    if failed_sections > 0 {
        bail!("{} section(s) failed", failed_sections);
    }
    Ok(())
}
