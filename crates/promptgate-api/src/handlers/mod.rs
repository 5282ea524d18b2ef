//! Request handlers organized by path.

pub mod chat;
pub mod error;
pub mod health;
pub mod heavy;

use serde::Deserialize;

/// Body accepted by both prompt endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl PromptRequest {
    /// The prompt, if present and not blank.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.trim().is_empty())
    }
}
