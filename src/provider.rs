//! Seams to the language-model provider.
//!
//! Both collaborators are network-bound and fallible; they own their own
//! timeouts and report failure through `anyhow::Error`.

use crate::config::Number;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Turns text into an embedding vector of constant dimensionality.
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<Number>>;
}

/// Produces an answer from a conversation.
pub trait Generator {
    fn generate(&self, messages: &[ChatMessage], options: &GenerationOptions) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl<F> Embedder for F
where
    F: Fn(&str) -> Result<Vec<Number>>,
{
    fn embed(&self, text: &str) -> Result<Vec<Number>> {
        self(text)
    }
}
