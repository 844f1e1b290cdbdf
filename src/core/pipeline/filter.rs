pub const DEFAULT_PREAMBLE_MARKERS: &[&str] = &["thought", "i will", "based on"];

/// Drops a section's opening token when it reads like conversational preamble.
///
/// Only the first non-empty token of a section is ever inspected; the caller
/// is responsible for that bookkeeping.
#[derive(Debug, Clone)]
pub struct PreambleFilter {
    markers: Vec<String>,
}

impl PreambleFilter {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn is_preamble(&self, token: &str) -> bool {
        let normalized = token.trim().to_lowercase();
        self.markers.iter().any(|m| normalized.starts_with(m.as_str()))
    }
}

impl Default for PreambleFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PREAMBLE_MARKERS)
    }
}
