use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::ats::scoring::AtsBackend;

/// Sentence-transformer loaded in-process when no embedding API is configured.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: String,
    pub llm_api_url: String,
    pub llm_model: String,
    pub context_window: usize,
    pub max_new_tokens: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub similarity_top_k: usize,
    pub embedding_api_url: Option<String>,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub ats_backend: AtsBackend,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub port_fallback: bool,
    /// Tunnel token for an externally managed ngrok agent. Only logged.
    pub tunnel_auth_token: Option<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let chunk_size = parse_or(&get, "CHUNK_SIZE", 1024usize)?;
        let chunk_overlap = parse_or(&get, "CHUNK_OVERLAP", 200usize)?;
        if chunk_overlap >= chunk_size {
            anyhow::bail!("CHUNK_OVERLAP ({chunk_overlap}) must be smaller than CHUNK_SIZE ({chunk_size})");
        }

        let ats_backend = match get("ATS_SCORER") {
            Some(v) => v
                .parse::<AtsBackend>()
                .map_err(anyhow::Error::msg)
                .context("ATS_SCORER must be 'keyword' or 'llm'")?,
            None => AtsBackend::Keyword,
        };

        let max_upload_mb = parse_or(&get, "MAX_UPLOAD_MB", 25usize)?;

        Ok(Config {
            llm_api_key: get("GROQ_API_KEY").with_context(|| {
                "Required environment variable 'GROQ_API_KEY' is not set".to_string()
            })?,
            llm_api_url: get("LLM_API_URL")
                .unwrap_or_else(|| "https://api.groq.com/openai/v1".to_string()),
            llm_model: get("LLM_MODEL")
                .unwrap_or_else(|| "meta-llama/llama-4-scout-17b-16e-instruct".to_string()),
            context_window: parse_or(&get, "CONTEXT_WINDOW", 4096usize)?,
            max_new_tokens: parse_or(&get, "MAX_NEW_TOKENS", 1024usize)?,
            chunk_size,
            chunk_overlap,
            similarity_top_k: parse_or(&get, "SIMILARITY_TOP_K", 2usize)?.max(1),
            embedding_api_url: get("EMBEDDING_API_URL"),
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_api_key: get("EMBEDDING_API_KEY"),
            ats_backend,
            upload_dir: PathBuf::from(
                get("UPLOAD_DIR").unwrap_or_else(|| "uploaded_files".to_string()),
            ),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            port: parse_or(&get, "PORT", 7000u16)?,
            port_fallback: parse_or(&get, "PORT_FALLBACK", true)?,
            tunnel_auth_token: get("NGROK_AUTHTOKEN"),
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}
