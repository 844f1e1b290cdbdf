use super::PipelineError;

pub const IDEA_PLACEHOLDER: &str = "{idea}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub system_prompt: String,
    pub prompt_template: String,
}

impl Section {
    pub fn new(name: &str, system_prompt: &str, prompt_template: &str) -> Self {
        Self {
            name: name.to_string(),
            system_prompt: system_prompt.to_string(),
            prompt_template: prompt_template.to_string(),
        }
    }

    pub fn render(&self, idea: &str) -> Result<String, PipelineError> {
        if !self.prompt_template.contains(IDEA_PLACEHOLDER) {
            return Err(PipelineError::MissingPlaceholder(self.name.clone()));
        }
        Ok(self.prompt_template.replace(IDEA_PLACEHOLDER, idea))
    }
}

/// The four generation steps, in the order they run.
pub fn default_sections() -> Vec<Section> {
    vec![
        Section::new(
            "research",
            "You are a startup market analyst. Answer directly with concise, \
             well-structured findings. Do not describe your reasoning.",
            "Do quick market research on this app idea: {idea}\n\
             Cover the target users, the main competitors, and the gap this product could fill.",
        ),
        Section::new(
            "features",
            "You are a pragmatic product manager planning a minimum viable product. \
             Answer directly with a prioritized feature list.",
            "Break this app idea into MVP features with priorities \
             (must have, should have, nice to have): {idea}",
        ),
        Section::new(
            "code",
            "You are a senior backend engineer. Respond with working code and short \
             comments only.",
            "Generate starter code for the core features of this app idea as a \
             FastAPI backend: {idea}",
        ),
        Section::new(
            "review",
            "You are a meticulous code reviewer. Point out bugs, security issues, and \
             concrete improvements.",
            "Review a typical MVP implementation of this app idea and list the most \
             important improvements before launch: {idea}",
        ),
    ]
}
