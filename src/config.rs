use std::env;
use std::path::PathBuf;

use crate::scoring::{FactorSet, ScoringConfig, clamp_amplification};

const DEFAULT_MEMORY_FILE: &str = "data/prediction_memory.json";
const DEFAULT_MEMORY_DB: &str = "data/prediction_memory.sqlite";
const DEFAULT_MEMORY_KEY: &str = "prediction_memory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Remote KV when credentials are present, local file otherwise.
    #[default]
    Auto,
    Kv,
    Sqlite,
    File,
}

impl BackendKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Some(BackendKind::Auto),
            "kv" | "redis" | "upstash" => Some(BackendKind::Kv),
            "sqlite" | "db" => Some(BackendKind::Sqlite),
            "file" | "json" => Some(BackendKind::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend: BackendKind,
    pub memory_file: PathBuf,
    pub memory_db: PathBuf,
    pub memory_key: String,
    pub kv_url: Option<String>,
    pub kv_token: Option<String>,
    pub factor_set: FactorSet,
    pub amplification: f64,
    pub h2h_dataset: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            memory_file: PathBuf::from(DEFAULT_MEMORY_FILE),
            memory_db: PathBuf::from(DEFAULT_MEMORY_DB),
            memory_key: DEFAULT_MEMORY_KEY.to_string(),
            kv_url: None,
            kv_token: None,
            factor_set: FactorSet::Core,
            amplification: 1.0,
            h2h_dataset: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: opt_env("MEMORY_BACKEND")
                .and_then(|v| BackendKind::parse(&v))
                .unwrap_or(defaults.backend),
            memory_file: opt_env("MEMORY_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.memory_file),
            memory_db: opt_env("MEMORY_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.memory_db),
            memory_key: opt_env("MEMORY_KEY").unwrap_or(defaults.memory_key),
            kv_url: opt_env("KV_REST_API_URL"),
            kv_token: opt_env("KV_REST_API_TOKEN"),
            factor_set: opt_env("FACTOR_SET")
                .and_then(|v| FactorSet::parse(&v))
                .unwrap_or(defaults.factor_set),
            amplification: clamp_amplification(env_f64("AMPLIFICATION", defaults.amplification)),
            h2h_dataset: opt_env("H2H_DATASET").map(PathBuf::from),
        }
    }

    pub fn kv_available(&self) -> bool {
        self.kv_url.is_some() && self.kv_token.is_some()
    }

    pub fn scoring(&self) -> ScoringConfig {
        ScoringConfig::for_set(self.factor_set).with_amplification(self.amplification)
    }
}

pub(crate) fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn env_u64(key: &str, default: u64) -> u64 {
    opt_env(key)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_f64(key: &str, default: f64) -> f64 {
    opt_env(key)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    opt_env(key)
        .map(|v| {
            let t = v.to_ascii_lowercase();
            !(t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}
