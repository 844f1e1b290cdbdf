//! Streaming relay from the model backend to the browser.
//!
//! A run walks the sections in order, opens one streamed chat completion per
//! section and turns every decoded fragment into a [`GenerationEvent`]. The
//! returned stream is lazy: nothing reaches the backend until the transport
//! starts draining it, and dropping it drops the in-flight backend request.

mod events;
mod filter;
mod sections;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::config::AppConfig;
use crate::core::idea::Idea;
use crate::core::llm::{ChatMessage, ModelClient};

pub use events::GenerationEvent;
pub use filter::{DEFAULT_PREAMBLE_MARKERS, PreambleFilter};
pub use sections::{Section, default_sections};

pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Pipeline has no sections configured")]
    NoSections,
    #[error("Prompt template for section '{0}' is missing the {{idea}} placeholder")]
    MissingPlaceholder(String),
}

#[derive(Clone)]
pub struct SectionPipeline {
    client: Arc<dyn ModelClient>,
    model: String,
    sections: Vec<Section>,
    filter: PreambleFilter,
    chunk_delay: Duration,
}

impl SectionPipeline {
    pub fn new(client: Arc<dyn ModelClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            sections: default_sections(),
            filter: PreambleFilter::default(),
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }

    pub fn from_config(client: Arc<dyn ModelClient>, config: &AppConfig) -> Self {
        Self::new(client, config.model.clone())
            .with_preamble_filter(PreambleFilter::new(&config.preamble_markers))
            .with_chunk_delay(Duration::from_millis(config.chunk_delay_ms))
    }

    #[cfg(test)]
    pub fn with_sections(mut self, sections: Vec<Section>) -> Self {
        self.sections = sections;
        self
    }

    pub fn with_preamble_filter(mut self, filter: PreambleFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    fn prepare(&self, idea: &Idea) -> Result<Vec<(Section, String)>, PipelineError> {
        if self.sections.is_empty() {
            return Err(PipelineError::NoSections);
        }
        self.sections
            .iter()
            .map(|s| s.render(idea.as_str()).map(|prompt| (s.clone(), prompt)))
            .collect()
    }

    /// Produce the event sequence for one request.
    ///
    /// Always starts with `status` then `start`, and ends with exactly one of
    /// `complete` or a fatal `error`. A backend failure inside a section is
    /// reported as a section `error` and the run moves on to the next section.
    pub fn run(&self, idea: &Idea) -> BoxStream<'static, GenerationEvent> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let prepared = self.prepare(idea);
        let client = Arc::clone(&self.client);
        let model = self.model.clone();
        let filter = self.filter.clone();
        let chunk_delay = self.chunk_delay;

        info!(run_id = %run_id, idea = %idea, "Generation run requested");

        let events = async_stream::stream! {
            yield GenerationEvent::Status {
                message: "Request received, preparing generation...".to_string(),
            };
            yield GenerationEvent::Start {
                message: "Starting MVP generation...".to_string(),
            };

            let prepared = match prepared {
                Ok(prepared) => prepared,
                Err(e) => {
                    error!(run_id = %run_id, error = %e, "Generation run aborted during setup");
                    yield GenerationEvent::fatal(e.to_string());
                    return;
                }
            };

            let last = prepared.len() - 1;
            for (index, (section, user_prompt)) in prepared.into_iter().enumerate() {
                let step = section.name;
                info!(run_id = %run_id, step = %step, "Section started");
                yield GenerationEvent::StepStart { step: step.clone() };

                let messages = [
                    ChatMessage::system(section.system_prompt),
                    ChatMessage::user(user_prompt),
                ];
                let mut tokens = match client.stream(&model, &messages).await {
                    Ok(tokens) => tokens,
                    Err(e) => {
                        warn!(run_id = %run_id, step = %step, error = %e, "Section failed to start");
                        yield GenerationEvent::section_failed(&step, &e.to_string());
                        continue;
                    }
                };

                let mut content = String::new();
                let mut first_seen = false;
                let mut failure = None;
                while let Some(item) = tokens.next().await {
                    let token = match item {
                        Ok(token) => token,
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    };
                    if token.is_empty() {
                        continue;
                    }
                    if !first_seen {
                        first_seen = true;
                        if filter.is_preamble(&token) {
                            debug!(run_id = %run_id, step = %step, token = %token, "Dropped preamble token");
                            continue;
                        }
                    }

                    content.push_str(&token);
                    yield GenerationEvent::TextChunk {
                        step: step.clone(),
                        content: token,
                    };
                    if !chunk_delay.is_zero() {
                        tokio::time::sleep(chunk_delay).await;
                    }
                }

                if let Some(e) = failure {
                    warn!(run_id = %run_id, step = %step, error = %e, "Section failed mid-stream");
                    yield GenerationEvent::section_failed(&step, &e.to_string());
                    continue;
                }

                info!(run_id = %run_id, step = %step, chars = content.len(), "Section completed");
                yield GenerationEvent::StepComplete {
                    step: step.clone(),
                    final_content: content,
                };
                if index < last {
                    yield GenerationEvent::StatusUpdate {
                        message: format!("Completed {} section", step),
                        step,
                    };
                }
            }

            info!(run_id = %run_id, "Generation run complete");
            yield GenerationEvent::Complete {
                message: "MVP generation complete".to_string(),
            };
        };

        Box::pin(events)
    }
}
