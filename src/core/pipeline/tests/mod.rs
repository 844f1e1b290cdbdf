
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;

use crate::core::idea::Idea;
use crate::core::llm::ModelClient;
use crate::core::llm::scripted::{Reply, ScriptedClient};
use crate::core::pipeline::{GenerationEvent, SectionPipeline};

fn pipeline_with(replies: Vec<Reply>) -> (Arc<ScriptedClient>, SectionPipeline) {
    let client = Arc::new(ScriptedClient::new(replies));
    let shared: Arc<dyn ModelClient> = client.clone();
    let pipeline = SectionPipeline::new(shared, "test-model").with_chunk_delay(Duration::ZERO);
    (client, pipeline)
}

async fn collect(pipeline: &SectionPipeline, idea: &str) -> Vec<GenerationEvent> {
    let idea = Idea::parse(idea).expect("test idea should be valid");
    pipeline.run(&idea).collect().await
}

fn chunks_for(events: &[GenerationEvent], step: &str) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            GenerationEvent::TextChunk { step: s, content } if s == step => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

fn final_content_for(events: &[GenerationEvent], step: &str) -> Option<String> {
    events.iter().find_map(|e| match e {
        GenerationEvent::StepComplete {
            step: s,
            final_content,
        } if s == step => Some(final_content.clone()),
        _ => None,
    })
}

fn position(events: &[GenerationEvent], kind: &str, step: &str) -> Option<usize> {
    events
        .iter()
        .position(|e| e.kind() == kind && e.step() == Some(step))
}
