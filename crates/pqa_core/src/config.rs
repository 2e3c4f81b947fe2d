use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Runtime settings for document processing and question answering.
///
/// Loaded from defaults, then an optional JSON file, then `PQA_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub ollama_base_url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub fetch_k: usize,
    pub mmr_lambda: f32,
    pub index_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://127.0.0.1:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            chat_model: "deepseek-r1:1.5b".to_string(),
            temperature: 0.3,
            chunk_size: 1200,
            chunk_overlap: 150,
            top_k: 2,
            fetch_k: 20,
            mmr_lambda: 0.5,
            index_dir: PathBuf::from("./vector_db"),
        }
    }
}

/// Chunk window settings, split out so the splitter does not depend on model settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 150,
        }
    }
}

impl SplitterConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::new("CONFIG_INVALID", "chunk_size must be greater than zero"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "chunk_overlap must be smaller than chunk_size",
            )
            .with_details(format!(
                "chunk_size={}; chunk_overlap={}",
                self.chunk_size, self.chunk_overlap
            )));
        }
        Ok(())
    }
}

/// Retrieval settings: how many chunks reach the prompt and how MMR explores candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub fetch_k: usize,
    pub mmr_lambda: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            fetch_k: 20,
            mmr_lambda: 0.5,
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG_READ_FAILED", "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::new("CONFIG_READ_FAILED", "Failed to decode config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })
    }

    /// Apply `PQA_*` overrides. `lookup` is `std::env::var` in production and a map in tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PQA_OLLAMA_URL") {
            self.ollama_base_url = v;
        }
        if let Some(v) = lookup("PQA_EMBED_MODEL") {
            self.embed_model = v;
        }
        if let Some(v) = lookup("PQA_CHAT_MODEL") {
            self.chat_model = v;
        }
        if let Some(v) = lookup("PQA_TEMPERATURE") {
            self.temperature = parse_env("PQA_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("PQA_CHUNK_SIZE") {
            self.chunk_size = parse_env("PQA_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("PQA_CHUNK_OVERLAP") {
            self.chunk_overlap = parse_env("PQA_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("PQA_TOP_K") {
            self.top_k = parse_env("PQA_TOP_K", &v)?;
        }
        if let Some(v) = lookup("PQA_FETCH_K") {
            self.fetch_k = parse_env("PQA_FETCH_K", &v)?;
        }
        if let Some(v) = lookup("PQA_MMR_LAMBDA") {
            self.mmr_lambda = parse_env("PQA_MMR_LAMBDA", &v)?;
        }
        if let Some(v) = lookup("PQA_INDEX_DIR") {
            self.index_dir = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.splitter().validate()?;
        if self.top_k == 0 {
            return Err(AppError::new("CONFIG_INVALID", "top_k must be at least 1"));
        }
        if self.fetch_k < self.top_k {
            return Err(AppError::new("CONFIG_INVALID", "fetch_k must be >= top_k")
                .with_details(format!("top_k={}; fetch_k={}", self.top_k, self.fetch_k)));
        }
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(AppError::new("CONFIG_INVALID", "mmr_lambda must be within [0, 1]")
                .with_details(format!("mmr_lambda={}", self.mmr_lambda)));
        }
        if self.embed_model.trim().is_empty() || self.chat_model.trim().is_empty() {
            return Err(AppError::new("CONFIG_INVALID", "Model names must not be empty"));
        }
        Ok(())
    }

    pub fn splitter(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    pub fn retrieval(&self) -> RetrievalConfig {
        RetrievalConfig {
            top_k: self.top_k,
            fetch_k: self.fetch_k,
            mmr_lambda: self.mmr_lambda,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        AppError::new("CONFIG_INVALID", "Invalid environment override")
            .with_details(format!("key={key}; value={raw}; err={e}"))
    })
}
