use crate::chunker::ChunkingOptions;
use crate::rag::RagOptions;
use anyhow::Result;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;

pub type Number = f32;

pub const CONFIG_FILE: &str = "docrag_config";
pub const ENV_PREFIX: &str = "DOCRAG";

#[derive(Deserialize)]
pub struct DocragConfig {
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub preserve_sentences: Option<bool>,
    pub top_k: Option<usize>,
    pub similarity_threshold: Option<Number>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl DocragConfig {
    pub fn try_from(config: &Config) -> Result<Self, ConfigError> {
        Ok(DocragConfig {
            chunk_size: config.get("chunk_size").ok(),
            chunk_overlap: config.get("chunk_overlap").ok(),
            preserve_sentences: config.get("preserve_sentences").ok(),
            top_k: config.get("top_k").ok(),
            similarity_threshold: config.get("similarity_threshold").ok(),
            temperature: config.get("temperature").ok(),
            max_output_tokens: config.get("max_output_tokens").ok(),
        })
    }
}

/// Resolved settings: the optional `docrag_config` file, overridden by
/// `DOCRAG_*` environment variables, falling back to library defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub preserve_sentences: bool,
    pub top_k: usize,
    pub similarity_threshold: Number,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Settings {
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .add_source(ConfigFile::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Ok(Self::from_config(DocragConfig::try_from(&config)?))
    }

    pub fn from_config(docrag_config: DocragConfig) -> Self {
        let chunking = ChunkingOptions::default();
        let rag = RagOptions::default();

        Self {
            chunk_size: docrag_config.chunk_size.unwrap_or(chunking.chunk_size),
            chunk_overlap: docrag_config.chunk_overlap.unwrap_or(chunking.chunk_overlap),
            preserve_sentences: docrag_config
                .preserve_sentences
                .unwrap_or(chunking.preserve_sentences),
            top_k: docrag_config.top_k.unwrap_or(rag.top_k),
            similarity_threshold: docrag_config
                .similarity_threshold
                .unwrap_or(rag.similarity_threshold),
            temperature: docrag_config.temperature.unwrap_or(rag.temperature),
            max_output_tokens: docrag_config
                .max_output_tokens
                .unwrap_or(rag.max_output_tokens),
        }
    }

    pub fn chunking_options(&self) -> ChunkingOptions {
        ChunkingOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            preserve_sentences: self.preserve_sentences,
        }
    }

    pub fn rag_options(&self) -> RagOptions {
        RagOptions {
            chunking: self.chunking_options(),
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            additional_context: None,
        }
    }

    pub fn print_config(&self) {
        println!("chunk_size={}", self.chunk_size);
        println!("chunk_overlap={}", self.chunk_overlap);
        println!("preserve_sentences={}", self.preserve_sentences);
        println!("top_k={}", self.top_k);
        println!("similarity_threshold={}", self.similarity_threshold);
        println!("temperature={}", self.temperature);
        println!("max_output_tokens={}", self.max_output_tokens);
    }
}

/// Whether `DOCRAG_VERBOSE=true` asks for debug-level logging.
pub fn verbose_requested() -> bool {
    env::var("DOCRAG_VERBOSE").unwrap_or_else(|_| "false".to_string()) == "true"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = Config::builder().build().unwrap();
        let settings = Settings::from_config(DocragConfig::try_from(&config).unwrap());
        assert_eq!(settings.chunk_size, 1000);
        assert_eq!(settings.chunk_overlap, 200);
        assert!(settings.preserve_sentences);
        assert_eq!(settings.top_k, 5);
        assert!((settings.similarity_threshold - 0.7).abs() < 1e-6);
        assert_eq!(settings.max_output_tokens, 2000);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = Config::builder()
            .set_override("chunk_size", 400)
            .unwrap()
            .set_override("preserve_sentences", false)
            .unwrap()
            .set_override("similarity_threshold", 0.5)
            .unwrap()
            .build()
            .unwrap();
        let settings = Settings::from_config(DocragConfig::try_from(&config).unwrap());
        assert_eq!(settings.chunk_size, 400);
        assert!(!settings.preserve_sentences);
        assert!((settings.similarity_threshold - 0.5).abs() < 1e-6);

        let options = settings.rag_options();
        assert_eq!(options.chunking.chunk_size, 400);
        assert!(!options.chunking.preserve_sentences);
    }
}
