//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (built-in defaults when the file is absent), then applies the
//! `STUDY_*` / `MOCK_MODE` overrides. Credentials are read from the
//! environment only, never from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger::{self, LogFormat};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// HTTP server and process-level settings (`[server]`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    /// Socket address the HTTP listener binds to.
    pub bind: String,
    pub log_level: String,
    /// Set when `STUDY_LOG_LEVEL` pinned the level; `RUST_LOG` then only
    /// applies if the pinned level fails to parse.
    pub force_log_level: bool,
    pub log_format: LogFormat,
    /// Force mock generation and file-backed storage regardless of credentials.
    pub mock_mode: bool,
    /// Comma-separated allowed origins; `None` means any origin.
    pub cors_origins: Option<String>,
}

/// Persistence settings (`[storage]`).
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Preferred backend: `"supabase"` or `"json"`.
    pub provider: String,
    /// File-backed document path, already resolved for serverless hosts.
    pub file: PathBuf,
    /// Per-request timeout for the hosted database.
    pub timeout_seconds: u64,
}

/// Gemini REST settings (`[llm.gemini]`).
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL up to and including the API version segment.
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

/// Generation settings (`[llm]`).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Preferred provider: `"gemini"` or `"mock"`.
    pub provider: String,
    pub gemini: GeminiConfig,
}

/// Secrets picked up from the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub credentials: Credentials,
}

/// Environment inputs that influence resolution. Tests build this directly
/// instead of mutating process env.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub log_level: Option<String>,
    pub bind: Option<String>,
    pub data_file: Option<String>,
    pub mock_mode: Option<String>,
    /// `VERCEL` or `AWS_LAMBDA_FUNCTION_NAME` present.
    pub serverless: bool,
    pub credentials: Credentials,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("STUDY_LOG_LEVEL").ok(),
            bind: env::var("STUDY_BIND").ok(),
            data_file: env::var("STUDY_DATA_FILE").ok(),
            mock_mode: env::var("MOCK_MODE").ok(),
            serverless: env::var_os("VERCEL").is_some()
                || env::var_os("AWS_LAMBDA_FUNCTION_NAME").is_some(),
            credentials: Credentials {
                gemini_api_key: non_empty(env::var("GEMINI_API_KEY").ok()),
                supabase_url: non_empty(env::var("SUPABASE_URL").ok()),
                supabase_key: non_empty(env::var("SUPABASE_KEY").ok()),
            },
        }
    }
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    storage: RawStorage,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_log_format")]
    log_format: String,
    #[serde(default)]
    mock_mode: bool,
    #[serde(default)]
    cors_origins: Option<String>,
}

impl Default for RawServer {
    fn default() -> Self {
        Self {
            name: default_name(),
            bind: default_bind(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            mock_mode: false,
            cors_origins: None,
        }
    }
}

#[derive(Deserialize)]
struct RawStorage {
    #[serde(rename = "default", default = "default_storage_provider")]
    provider: String,
    #[serde(default = "default_data_file")]
    file: String,
    #[serde(default = "default_storage_timeout")]
    timeout_seconds: u64,
}

impl Default for RawStorage {
    fn default() -> Self {
        Self {
            provider: default_storage_provider(),
            file: default_data_file(),
            timeout_seconds: default_storage_timeout(),
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    gemini: RawGemini,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), gemini: RawGemini::default() }
    }
}

#[derive(Deserialize)]
struct RawGemini {
    #[serde(default = "default_gemini_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_gemini_model")]
    model: String,
    #[serde(default = "default_gemini_temperature")]
    temperature: f32,
    #[serde(default = "default_gemini_timeout")]
    timeout_seconds: u64,
}

impl Default for RawGemini {
    fn default() -> Self {
        Self {
            api_base_url: default_gemini_api_base_url(),
            model: default_gemini_model(),
            temperature: default_gemini_temperature(),
            timeout_seconds: default_gemini_timeout(),
        }
    }
}

fn default_name() -> String { "study-assistant".to_string() }
fn default_bind() -> String { "127.0.0.1:8000".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_storage_provider() -> String { "supabase".to_string() }
fn default_data_file() -> String { "local_data.json".to_string() }
fn default_storage_timeout() -> u64 { 15 }
fn default_llm_provider() -> String { "gemini".to_string() }
fn default_gemini_api_base_url() -> String { "https://generativelanguage.googleapis.com/v1beta".to_string() }
fn default_gemini_model() -> String { "gemini-2.0-flash-lite".to_string() }
fn default_gemini_temperature() -> f32 { 0.7 }
fn default_gemini_timeout() -> u64 { 30 }

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from the given path, or `config/default.toml`, then apply
/// env-var overrides. Without a path and without the default file, the
/// built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = EnvOverrides::from_env();
    if let Some(path) = config_path {
        return load_from(Path::new(path), &overrides);
    }
    let path = Path::new(DEFAULT_CONFIG_PATH);
    if path.exists() {
        load_from(path, &overrides)
    } else {
        resolve(RawConfig::default(), &overrides)
    }
}

/// Loader that accepts an explicit path and the env inputs.
pub fn load_from(path: &Path, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;
    resolve(parsed, overrides)
}

/// Parse TOML text and resolve it against `overrides`.
pub fn from_toml_str(text: &str, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let parsed: RawConfig =
        toml::from_str(text).map_err(|e| AppError::Config(format!("parse error: {e}")))?;
    resolve(parsed, overrides)
}

fn resolve(parsed: RawConfig, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let s = parsed.server;

    let force_log_level = overrides.log_level.is_some();
    let log_level = overrides.log_level.clone().unwrap_or(s.log_level);
    logger::parse_level(&log_level).map_err(|e| AppError::Config(e.to_string()))?;
    let log_format = LogFormat::parse(&s.log_format)
        .map_err(|e| AppError::Config(e.to_string()))?;
    let mock_mode = match overrides.mock_mode.as_deref() {
        Some(v) => v.trim().eq_ignore_ascii_case("true"),
        None => s.mock_mode,
    };

    let file = overrides.data_file.clone().unwrap_or(parsed.storage.file);
    let file = data_file_path(&file, overrides.serverless);

    Ok(Config {
        server: ServerConfig {
            name: s.name,
            bind: overrides.bind.clone().unwrap_or(s.bind),
            log_level,
            force_log_level,
            log_format,
            mock_mode,
            cors_origins: s.cors_origins.filter(|o| !o.trim().is_empty()),
        },
        storage: StorageConfig {
            provider: parsed.storage.provider,
            file,
            timeout_seconds: parsed.storage.timeout_seconds,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            gemini: GeminiConfig {
                api_base_url: parsed.llm.gemini.api_base_url,
                model: parsed.llm.gemini.model,
                temperature: parsed.llm.gemini.temperature,
                timeout_seconds: parsed.llm.gemini.timeout_seconds,
            },
        },
        credentials: overrides.credentials.clone(),
    })
}

/// Resolve where the file-backed document lives.
///
/// Serverless hosts only allow writes under the temp dir, so the file name
/// is moved there; everywhere else the path is used as given.
pub fn data_file_path(file: &str, serverless: bool) -> PathBuf {
    let path = expand_home(file);
    if !serverless {
        return path;
    }
    let name = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default_data_file()));
    env::temp_dir().join(name)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// ── Offline profile ───────────────────────────────────────────────────────────

impl Config {
    /// Fully offline configuration: mock generation and file-backed storage
    /// at `data_file`, with no credentials and an ephemeral bind address.
    ///
    /// Equivalent to `MOCK_MODE=true` with no config file. Handy for local
    /// runs without network access and for driving the assistant in tests.
    pub fn offline(data_file: &Path) -> Self {
        Self {
            server: ServerConfig {
                name: default_name(),
                bind: "127.0.0.1:0".into(),
                log_level: "info".into(),
                force_log_level: false,
                log_format: LogFormat::Pretty,
                mock_mode: true,
                cors_origins: None,
            },
            storage: StorageConfig {
                provider: "json".into(),
                file: data_file.to_path_buf(),
                timeout_seconds: 1,
            },
            llm: LlmConfig {
                provider: "mock".into(),
                gemini: GeminiConfig {
                    api_base_url: "http://127.0.0.1:9/v1beta".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            credentials: Credentials::default(),
        }
    }
}
