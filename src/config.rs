use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./storage")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Maximum reports fed into one context block.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Maximum report ids echoed back in a query result.
    #[serde(default = "default_preview_ids")]
    pub preview_ids: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            preview_ids: default_preview_ids(),
        }
    }
}

fn default_limit() -> i64 {
    50
}
fn default_preview_ids() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `gemini` or `disabled`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Shared key required on device report ingestion. Overridden by the
    /// MIRQAB_API_KEY environment variable.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

fn default_api_key() -> String {
    "development-key-change-in-production".to_string()
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl ServerConfig {
    /// The effective ingestion key: environment variable first, config
    /// value as fallback.
    pub fn effective_api_key(&self) -> String {
        std::env::var("MIRQAB_API_KEY").unwrap_or_else(|_| self.api_key.clone())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.limit < 1 {
        anyhow::bail!("retrieval.limit must be >= 1");
    }

    // Validate generation
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }
    if config.generation.max_output_tokens == 0 {
        anyhow::bail!("generation.max_output_tokens must be > 0");
    }

    match config.generation.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be gemini or disabled.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let f = write_config(
            r#"
            [db]
            path = "./data/mirqab.db"

            [server]
            bind = "0.0.0.0:8000"
            "#,
        );
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.retrieval.limit, 50);
        assert_eq!(cfg.retrieval.preview_ids, 10);
        assert_eq!(cfg.generation.provider, "gemini");
        assert_eq!(cfg.generation.model, "gemini-2.5-flash");
        assert_eq!(cfg.generation.temperature, 0.2);
        assert_eq!(cfg.generation.max_output_tokens, 1024);
        assert_eq!(cfg.generation.timeout_secs, 30);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let f = write_config(
            r#"
            [db]
            path = "./data/mirqab.db"

            [server]
            bind = "0.0.0.0:8000"

            [generation]
            provider = "openai"
            "#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_invalid_temperature_rejected() {
        let f = write_config(
            r#"
            [db]
            path = "./data/mirqab.db"

            [server]
            bind = "0.0.0.0:8000"

            [generation]
            temperature = 3.5
            "#,
        );
        assert!(load_config(f.path()).is_err());
    }
}
