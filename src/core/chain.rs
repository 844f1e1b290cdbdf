use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::idea::Idea;
use crate::core::llm::{BackendError, ChatMessage, ModelClient};

/// Aggregate result of the non-streaming chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOutput {
    pub research: String,
    pub plan: String,
    pub code: String,
    pub review: String,
}

/// One stage of the chain. Each stage is also published as an MCP tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Research,
    Plan,
    Code,
    Review,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Research, Stage::Plan, Stage::Code, Stage::Review];

    pub fn tool_name(self) -> &'static str {
        match self {
            Stage::Research => "research_idea",
            Stage::Plan => "plan_features",
            Stage::Code => "generate_code",
            Stage::Review => "review_code",
        }
    }

    /// Name of the single string argument the stage takes.
    pub fn input_name(self) -> &'static str {
        match self {
            Stage::Research => "input",
            Stage::Plan => "research",
            Stage::Code => "features",
            Stage::Review => "code",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::Research => "Do quick market research on a product idea",
            Stage::Plan => "Break market research into prioritized product features",
            Stage::Code => "Generate FastAPI backend code for a feature list",
            Stage::Review => "Review a piece of code and suggest improvements",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.tool_name() == name)
    }
}

/// Research → plan → code → review, each stage fed the previous stage's output verbatim.
#[derive(Clone)]
pub struct SimpleChain {
    client: Arc<dyn ModelClient>,
    model: String,
}

impl SimpleChain {
    pub fn new(client: Arc<dyn ModelClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    async fn ask(&self, prompt: String) -> Result<String, BackendError> {
        self.client
            .complete(&self.model, &[ChatMessage::user(prompt)])
            .await
    }

    pub async fn invoke(&self, stage: Stage, input: &str) -> Result<String, BackendError> {
        match stage {
            Stage::Research => self.research_idea(input).await,
            Stage::Plan => self.plan_features(input).await,
            Stage::Code => self.generate_code(input).await,
            Stage::Review => self.review_code(input).await,
        }
    }

    pub async fn research_idea(&self, input: &str) -> Result<String, BackendError> {
        info!("[Researcher] Researching: {}", input);
        self.ask(format!("Do quick market research on this app idea: {}", input))
            .await
    }

    pub async fn plan_features(&self, research: &str) -> Result<String, BackendError> {
        info!("[Planner] Planning features based on research");
        self.ask(format!(
            "Based on this research, break the product into features with priorities:\n{}",
            research
        ))
        .await
    }

    pub async fn generate_code(&self, features: &str) -> Result<String, BackendError> {
        info!("[Coder] Generating code");
        self.ask(format!(
            "Generate code for this feature list as a FastAPI backend:\n{}",
            features
        ))
        .await
    }

    pub async fn review_code(&self, code: &str) -> Result<String, BackendError> {
        info!("[Reviewer] Reviewing code");
        self.ask(format!("Review and improve this code:\n{}", code))
            .await
    }

    /// Any stage failure aborts the whole chain.
    pub async fn run(&self, idea: &Idea) -> Result<ChainOutput, BackendError> {
        let research = self.invoke(Stage::Research, idea.as_str()).await?;
        let plan = self.invoke(Stage::Plan, &research).await?;
        let code = self.invoke(Stage::Code, &plan).await?;
        let review = self.invoke(Stage::Review, &code).await?;

        Ok(ChainOutput {
            research,
            plan,
            code,
            review,
        })
    }
}
