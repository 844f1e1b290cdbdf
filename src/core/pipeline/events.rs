use serde::{Deserialize, Serialize};

/// One message pushed to the browser during a generation run.
///
/// Serialized as a flat JSON object tagged by `type`, e.g.
/// `{"type":"text_chunk","step":"code","content":"fn main"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    Status {
        message: String,
    },
    Start {
        message: String,
    },
    StepStart {
        step: String,
    },
    TextChunk {
        step: String,
        content: String,
    },
    StepComplete {
        step: String,
        final_content: String,
    },
    StatusUpdate {
        step: String,
        message: String,
    },
    /// `step` is set for a failed section; a fatal error carries none and ends the run.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<String>,
        error: String,
    },
    Complete {
        message: String,
    },
}

impl GenerationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationEvent::Status { .. } => "status",
            GenerationEvent::Start { .. } => "start",
            GenerationEvent::StepStart { .. } => "step_start",
            GenerationEvent::TextChunk { .. } => "text_chunk",
            GenerationEvent::StepComplete { .. } => "step_complete",
            GenerationEvent::StatusUpdate { .. } => "status_update",
            GenerationEvent::Error { .. } => "error",
            GenerationEvent::Complete { .. } => "complete",
        }
    }

    pub fn step(&self) -> Option<&str> {
        match self {
            GenerationEvent::StepStart { step }
            | GenerationEvent::TextChunk { step, .. }
            | GenerationEvent::StepComplete { step, .. }
            | GenerationEvent::StatusUpdate { step, .. } => Some(step),
            GenerationEvent::Error { step, .. } => step.as_deref(),
            _ => None,
        }
    }

    /// True for the events that close a run: `complete` or a fatal `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationEvent::Complete { .. } | GenerationEvent::Error { step: None, .. }
        )
    }

    pub(crate) fn fatal(error: impl Into<String>) -> Self {
        GenerationEvent::Error {
            step: None,
            error: error.into(),
        }
    }

    pub(crate) fn section_failed(step: &str, message: &str) -> Self {
        GenerationEvent::Error {
            step: Some(step.to_string()),
            error: format!("Section {} failed: {}", step, message),
        }
    }
}
