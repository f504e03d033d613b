/// Configuration module for regrag.
///
/// Handles loading, validating, and providing default configuration values.
/// Every ranking threshold lives here so deployments can tune them without
/// touching the retrieval code.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_file_extensions() -> Vec<String> {
    vec!["txt".to_string()]
}

fn default_index_dir() -> String {
    "./vector_index".to_string()
}

fn default_chunk_size() -> usize {
    500
}

fn default_search_top_k() -> usize {
    3
}

fn default_disambiguation_ratio() -> f64 {
    1.5
}

fn default_max_distance() -> f32 {
    1.8
}

fn default_title_match_score() -> f64 {
    10.0
}

fn default_title_bonus() -> f64 {
    5.0
}

fn default_route_bonus() -> f64 {
    3.0
}

fn default_flexible_word_weight() -> f64 {
    2.0
}

fn default_title_context_paragraphs() -> usize {
    5
}

fn default_title_context_chars() -> usize {
    5000
}

fn default_presplit_threshold() -> usize {
    1000
}

fn default_presplit_target() -> usize {
    500
}

fn default_embedder_kind() -> EmbedderKind {
    EmbedderKind::Onnx
}

fn default_model_dir() -> String {
    crate::embedder::download::default_model_dir()
        .to_string_lossy()
        .to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_generation_model() -> String {
    "gpt-4".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_document_routes() -> Vec<DocumentRoute> {
    fn route(document_id: &str, keywords: &[&str]) -> DocumentRoute {
        DocumentRoute {
            document_id: document_id.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    vec![
        route(
            "Gujarat_Ministers_Salaries_and_All",
            &[
                "minister",
                "salary",
                "allowance",
                "ministers",
                "salaries",
                "allowances",
            ],
        ),
        route(
            "Gujarat Civil Services Rules",
            &[
                "civil service",
                "service rules",
                "civil services rules",
                "civil servant",
                "recruitment",
                "appointment",
            ],
        ),
        route(
            "The Gujarat Civil Services (Discipl",
            &[
                "disciplinary",
                "discipline",
                "misconduct",
                "penalty",
                "punishment",
            ],
        ),
    ]
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Directory holding the plain-text corpus. File stem = document id.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,

    /// Where `build-index` persists the vector index.
    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    /// Optional JSON rule file for the fallback matcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<String>,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    /// Reload the corpus when files under `data_dir` change.
    #[serde(default)]
    pub watch: bool,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub embedder: EmbedderConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default = "default_document_routes")]
    pub document_routes: Vec<DocumentRoute>,
}

/// Ranking knobs. The ratio and the distance cutoff were picked empirically.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// Top document must beat the runner-up by this factor to skip disambiguation.
    #[serde(default = "default_disambiguation_ratio")]
    pub disambiguation_ratio: f64,

    /// Squared L2 distance above which vector candidates are dropped.
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,

    #[serde(default = "default_title_match_score")]
    pub title_match_score: f64,

    #[serde(default = "default_title_bonus")]
    pub title_bonus: f64,

    #[serde(default = "default_route_bonus")]
    pub route_bonus: f64,

    #[serde(default = "default_flexible_word_weight")]
    pub flexible_word_weight: f64,

    #[serde(default = "default_title_context_paragraphs")]
    pub title_context_paragraphs: usize,

    #[serde(default = "default_title_context_chars")]
    pub title_context_chars: usize,

    #[serde(default = "default_presplit_threshold")]
    pub presplit_threshold: usize,

    #[serde(default = "default_presplit_target")]
    pub presplit_target: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    Onnx,
    Hashing,
    None,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbedderConfig {
    #[serde(default = "default_embedder_kind")]
    pub kind: EmbedderKind,

    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default)]
    pub auto_download: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// One row of the keyword-to-document table used for auto-selection.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DocumentRoute {
    pub document_id: String,
    pub keywords: Vec<String>,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            file_extensions: default_file_extensions(),
            index_dir: default_index_dir(),
            rules_path: None,
            chunk_size: default_chunk_size(),
            search_top_k: default_search_top_k(),
            watch: false,
            retrieval: RetrievalConfig::default(),
            embedder: EmbedderConfig::default(),
            generation: GenerationConfig::default(),
            document_routes: default_document_routes(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            disambiguation_ratio: default_disambiguation_ratio(),
            max_distance: default_max_distance(),
            title_match_score: default_title_match_score(),
            title_bonus: default_title_bonus(),
            route_bonus: default_route_bonus(),
            flexible_word_weight: default_flexible_word_weight(),
            title_context_paragraphs: default_title_context_paragraphs(),
            title_context_chars: default_title_context_chars(),
            presplit_threshold: default_presplit_threshold(),
            presplit_target: default_presplit_target(),
        }
    }
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            kind: default_embedder_kind(),
            model_dir: default_model_dir(),
            dimensions: default_dimensions(),
            auto_download: false,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            api_base: default_api_base(),
            model: default_generation_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(
            self.retrieval.disambiguation_ratio >= 1.0,
            "retrieval.disambiguation_ratio must be at least 1.0"
        );
        anyhow::ensure!(
            self.retrieval.max_distance > 0.0,
            "retrieval.max_distance must be positive"
        );
        anyhow::ensure!(
            self.retrieval.presplit_target > 0
                && self.retrieval.presplit_target <= self.retrieval.presplit_threshold,
            "retrieval.presplit_target must be positive and not exceed presplit_threshold"
        );
        anyhow::ensure!(
            self.embedder.dimensions > 0,
            "embedder.dimensions must be positive"
        );
        anyhow::ensure!(
            !self.file_extensions.is_empty(),
            "at least one corpus file extension must be specified"
        );
        anyhow::ensure!(
            self.generation.timeout_secs > 0,
            "generation.timeout_secs must be positive"
        );
        Ok(())
    }

    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        PathBuf::from(&self.index_dir)
    }

    /// API key for the generation endpoint, read from the configured env var.
    #[must_use]
    pub fn generation_api_key(&self) -> Option<String> {
        std::env::var(&self.generation.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
