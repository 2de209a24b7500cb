//! Configuration loading, validation, and management for Flowdeck.
//!
//! Loads configuration from `~/.flowdeck/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.flowdeck/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gemini API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the Generative Language REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub flows: FlowsConfig,

    #[serde(default)]
    pub canvas: CanvasConfig,

    #[serde(default)]
    pub rag: RagConfig,
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_base_url", &self.api_base_url)
            .field("models", &self.models)
            .field("gateway", &self.gateway)
            .field("flows", &self.flows)
            .field("canvas", &self.canvas)
            .field("rag", &self.rag)
            .finish()
    }
}

/// Model references, written as `googleai/<model>` or a bare model name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// General text model
    #[serde(default = "default_text_model")]
    pub default: String,

    /// Stronger model for research and lesson planning
    #[serde(default = "default_pro_model")]
    pub pro: String,

    /// Multimodal model that can return images
    #[serde(default = "default_image_model")]
    pub image: String,

    /// Text-to-image model
    #[serde(default = "default_imagen_model")]
    pub imagen: String,

    #[serde(default = "default_embedder")]
    pub embedder: String,
}

fn default_text_model() -> String {
    "googleai/gemini-2.5-flash".into()
}
fn default_pro_model() -> String {
    "googleai/gemini-2.5-pro".into()
}
fn default_image_model() -> String {
    "googleai/gemini-2.5-flash-image-preview".into()
}
fn default_imagen_model() -> String {
    "googleai/imagen-3.0-generate-002".into()
}
fn default_embedder() -> String {
    "googleai/text-embedding-004".into()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_text_model(),
            pro: default_pro_model(),
            image: default_image_model(),
            imagen: default_imagen_model(),
            embedder: default_embedder(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// CORS origins; `"*"` allows any origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Maximum request body size in megabytes (selfies arrive as data URIs)
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Prebuilt front end served as a fallback for unknown GET paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_dir: Option<PathBuf>,
}

fn default_port() -> u16 {
    3400
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".into()]
}
/// Upper bound for `gateway.body_limit_mb`.
pub const MAX_BODY_LIMIT_MB: usize = 1024;

fn default_body_limit_mb() -> usize {
    10
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
            body_limit_mb: default_body_limit_mb(),
            ui_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowsConfig {
    /// Tool-calling turns allowed per generate call
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    #[serde(default = "default_canvas_max_turns")]
    pub canvas_max_turns: u32,

    /// Critique/revise rounds in the refinement flow
    #[serde(default = "default_refinement_rounds")]
    pub refinement_rounds: u32,

    /// Documents returned by the menu retriever
    #[serde(default = "default_retriever_k")]
    pub retriever_k: usize,

    /// HTTP timeout for model API calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_turns() -> u32 {
    5
}
fn default_canvas_max_turns() -> u32 {
    20
}
fn default_refinement_rounds() -> u32 {
    3
}
fn default_retriever_k() -> usize {
    3
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for FlowsConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            canvas_max_turns: default_canvas_max_turns(),
            refinement_rounds: default_refinement_rounds(),
            retriever_k: default_retriever_k(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Where canvas artifacts live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasConfig {
    #[serde(default)]
    pub storage: StorageKind,

    /// Root directory for `filesystem` storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// When set, the vector index is saved as `__db_<index>.json` here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_dir: Option<PathBuf>,
}

fn default_index_name() -> String {
    "menuQA".into()
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            persist_dir: None,
        }
    }
}

/// Environment variables checked for the API key, highest priority first.
pub const API_KEY_ENV_VARS: [&str; 4] = [
    "FLOWDECK_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "GOOGLE_GENAI_API_KEY",
];

impl AppConfig {
    /// Load configuration from the default path (~/.flowdeck/config.toml).
    ///
    /// Also checks environment variables:
    /// - API key: see [`API_KEY_ENV_VARS`]
    /// - `FLOWDECK_MODEL` overrides `models.default`
    /// - `FLOWDECK_PORT` overrides `gateway.port`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_dir().join("config.toml"))
    }

    /// Load configuration from a specific file path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from an environment lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            self.api_key = API_KEY_ENV_VARS
                .iter()
                .find_map(|key| lookup(key).filter(|v| !v.is_empty()));
        }

        if let Some(model) = lookup("FLOWDECK_MODEL") {
            self.models.default = model;
        }

        if let Some(port) = lookup("FLOWDECK_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("FLOWDECK_PORT is not a valid port: {port}"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".flowdeck")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError("gateway.port must be > 0".into()));
        }

        if self.gateway.body_limit_mb == 0 || self.gateway.body_limit_mb > MAX_BODY_LIMIT_MB {
            return Err(ConfigError::ValidationError(format!(
                "gateway.body_limit_mb must be between 1 and {MAX_BODY_LIMIT_MB}"
            )));
        }

        if self.flows.refinement_rounds > 10 {
            return Err(ConfigError::ValidationError(
                "flows.refinement_rounds must be at most 10".into(),
            ));
        }

        if self.flows.retriever_k == 0 {
            return Err(ConfigError::ValidationError(
                "flows.retriever_k must be >= 1".into(),
            ));
        }

        if self.flows.max_turns == 0 || self.flows.canvas_max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "max_turns must be >= 1".into(),
            ));
        }

        if self.canvas.storage == StorageKind::Filesystem && self.canvas.root_dir.is_none() {
            return Err(ConfigError::ValidationError(
                "canvas.root_dir is required for filesystem storage".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: default_api_base_url(),
            models: ModelsConfig::default(),
            gateway: GatewayConfig::default(),
            flows: FlowsConfig::default(),
            canvas: CanvasConfig::default(),
            rag: RagConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.gateway.port, 3400);
        assert_eq!(config.models.default, "googleai/gemini-2.5-flash");
        assert_eq!(config.flows.canvas_max_turns, 20);
        assert_eq!(config.canvas.storage, StorageKind::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.models.pro, config.models.pro);
        assert_eq!(parsed.gateway.allowed_origins, vec!["*"]);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[gateway]
port = 8080

[canvas]
storage = "filesystem"
root_dir = "/tmp/canvas"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.canvas.storage, StorageKind::Filesystem);
        assert_eq!(config.rag.index_name, "menuQA");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn filesystem_storage_requires_root() {
        let mut config = AppConfig::default();
        config.canvas.storage = StorageKind::Filesystem;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_flow_settings_rejected() {
        let mut config = AppConfig::default();
        config.flows.refinement_rounds = 50;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.flows.retriever_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn body_limit_is_bounded() {
        let mut config = AppConfig::default();
        config.gateway.body_limit_mb = usize::MAX;
        assert!(config.validate().is_err());

        config.gateway.body_limit_mb = 0;
        assert!(config.validate().is_err());

        config.gateway.body_limit_mb = MAX_BODY_LIMIT_MB;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::read_file(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.flows.max_turns, 5);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "gateway = [").unwrap();
        let err = AppConfig::read_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn api_key_env_priority() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("GOOGLE_API_KEY", "google"),
                ("GEMINI_API_KEY", "gemini"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("gemini"));
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(env(&[("FLOWDECK_API_KEY", "env")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn model_and_port_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("FLOWDECK_MODEL", "googleai/gemini-2.0-flash"),
                ("FLOWDECK_PORT", "4000"),
            ]))
            .unwrap();
        assert_eq!(config.models.default, "googleai/gemini-2.0-flash");
        assert_eq!(config.gateway.port, 4000);

        let err = config.apply_env(env(&[("FLOWDECK_PORT", "nope")]));
        assert!(err.is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini-2.5-flash"));
        assert!(toml_str.contains("3400"));
    }
}
