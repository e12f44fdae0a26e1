//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RETRIEVAL__TOP_K=5`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::corpus::CorpusConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Wrap an already assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the full typed settings. Absent sections default.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to extract settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate_for_env(&self, env: &str) -> Result<()> {
        let settings = self.settings()?;
        match env {
            "prod" | "production" => {
                if settings.embedding.backend == EmbeddingBackendKind::Hashing {
                    return Err(Error::InvalidConfig(
                        "the hashing embedder is for development only; choose `local` or `ollama` in production".to_string(),
                    ));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub index: IndexConfig,
    pub corpus: CorpusConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.prompt.validate()?;
        self.embedding.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Cosine similarity cutoff in [-1, 1]; candidates scoring below are dropped.
    pub min_relevance: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3, min_relevance: 0.3 }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be positive".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.min_relevance) {
            return Err(Error::InvalidConfig(format!(
                "retrieval.min_relevance must lie in [-1, 1], got {}",
                self.min_relevance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub max_prompt_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { max_prompt_chars: 12_000 }
    }
}

impl PromptConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_prompt_chars == 0 {
            return Err(Error::InvalidConfig("prompt.max_prompt_chars must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    Local,
    Ollama,
    Hashing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackendKind,
    pub model: String,
    pub base_url: String,
    pub dimension: usize,
    pub timeout_secs: u64,
    pub batch_size: usize,
    /// Directory holding `tokenizer.json`, `config.json` and weights (local backend).
    pub model_dir: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackendKind::Ollama,
            model: "nomic-embed-text".to_string(),
            base_url: "http://localhost:11434".to_string(),
            dimension: 768,
            timeout_secs: 60,
            batch_size: 32,
            model_dir: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackendKind {
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: GenerationBackendKind,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Name of the env var that holds the API key (remote backends).
    pub api_key_env: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: GenerationBackendKind::Ollama,
            model: "llama3.2".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.1,
            timeout_secs: 300,
            api_key_env: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub store_dir: String,
    pub table_prefix: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { store_dir: "data/index".to_string(), table_prefix: "chunks".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    fn from_toml(toml: &str) -> Config {
        Config::from_figment(Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml)))
    }

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().expect("defaults validate");
    }

    #[test]
    fn toml_overrides_nested_sections() {
        let cfg = from_toml(
            r#"
            [retrieval]
            top_k = 5
            min_relevance = 0.5

            [embedding]
            backend = "hashing"
            dimension = 64

            [generation]
            backend = "openai"
            "#,
        );
        let s = cfg.settings().expect("settings");
        assert_eq!(s.retrieval.top_k, 5);
        assert_eq!(s.embedding.backend, EmbeddingBackendKind::Hashing);
        assert_eq!(s.embedding.dimension, 64);
        assert_eq!(s.generation.backend, GenerationBackendKind::OpenAi);
        assert_eq!(s.chunking, ChunkingConfig::default());
        let k: usize = cfg.get("retrieval.top_k").expect("get");
        assert_eq!(k, 5);
    }

    #[test]
    fn rejects_overlap_not_below_chunk_size() {
        let cfg = from_toml("[chunking]\nchunk_size = 100\noverlap = 100\n");
        assert!(matches!(cfg.settings(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let cfg = from_toml("[retrieval]\nmin_relevance = 1.5\n");
        assert!(cfg.settings().is_err());
        let cfg = from_toml("[retrieval]\ntop_k = 0\n");
        assert!(cfg.settings().is_err());
    }

    #[test]
    fn production_refuses_hashing_embedder() {
        let cfg = from_toml("[embedding]\nbackend = \"hashing\"\n");
        assert!(cfg.validate_for_env("prod").is_err());
        assert!(cfg.validate_for_env("dev").is_ok());
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/srv/rag");
        assert_eq!(resolve_with_base(base, "data/index"), PathBuf::from("/srv/rag/data/index"));
        assert_eq!(resolve_with_base(base, "/var/index"), PathBuf::from("/var/index"));
    }
}
