use crate::engine::features::{TimeDiffMode, DEFAULT_REFERENCE_LAP_S};
use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const ENV_FILE: &str = ".env";

/// Environment variable holding the endpoint "secret". Wins over the config file.
pub const ENDPOINT_ENV_VAR: &str = "GP_PREDICTOR_API_URL";

/// Used when neither the environment nor the config file supplies a usable URL.
pub const DEFAULT_PREDICT_URL: &str = "https://web-production-24d62.up.railway.app/predict";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{source_name} endpoint {value:?} is not a valid URL: {reason}")]
    InvalidUrl {
        source_name: &'static str,
        value: String,
        reason: String,
    },
    #[error("{source_name} endpoint {value:?} must use http or https")]
    UnsupportedScheme { source_name: &'static str, value: String },
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub predict_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_health_timeout")]
    pub health_timeout_ms: u64,
    #[serde(default)]
    pub missing_probability: MissingProbability,
}

fn default_request_timeout() -> u64 { 10_000 }
fn default_health_timeout() -> u64 { 5_000 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            predict_url: None,
            request_timeout_ms: default_request_timeout(),
            health_timeout_ms: default_health_timeout(),
            missing_probability: MissingProbability::default(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

/// What a 200 response without `winner_probability` means.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MissingProbability {
    /// Treat as 0.0 and flag the result as defaulted.
    #[default]
    DefaultZero,
    /// Treat as a malformed response.
    Error,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub time_diff: TimeDiffSetting,
    #[serde(default = "default_reference_lap")]
    pub reference_lap_time_s: f64,
}

fn default_reference_lap() -> f64 { DEFAULT_REFERENCE_LAP_S }

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            time_diff: TimeDiffSetting::default(),
            reference_lap_time_s: default_reference_lap(),
        }
    }
}

impl FeaturesConfig {
    pub fn time_diff_mode(&self) -> TimeDiffMode {
        match self.time_diff {
            TimeDiffSetting::Manual => TimeDiffMode::Manual,
            TimeDiffSetting::Auto => TimeDiffMode::Auto {
                reference_lap_s: self.reference_lap_time_s,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeDiffSetting {
    #[default]
    Manual,
    Auto,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_charts")]
    pub charts: bool,
    pub banner_path: Option<String>,
}

fn default_charts() -> bool { true }

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            charts: default_charts(),
            banner_path: None,
        }
    }
}

/// Where the active endpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    Environment,
    ConfigFile,
    BuiltIn,
}

impl EndpointSource {
    pub fn describe(&self) -> &'static str {
        match self {
            EndpointSource::Environment => "loaded from environment",
            EndpointSource::ConfigFile => "loaded from config file",
            EndpointSource::BuiltIn => "built-in default",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub url: Url,
    pub source: EndpointSource,
}

impl Endpoint {
    /// Companion health URL: a trailing `/predict` becomes `/health`,
    /// otherwise `/health` is appended to the path.
    pub fn health_url(&self) -> Url {
        let mut url = self.url.clone();
        let path = url.path().trim_end_matches('/');
        let health_path = match path.strip_suffix("/predict") {
            Some(prefix) => format!("{}/health", prefix),
            None => format!("{}/health", path),
        };
        url.set_path(&health_path);
        url
    }
}

/// Resolve the endpoint from the environment value, then the config file
/// value, then the built-in default. Rejected candidates come back as
/// errors for logging; resolution itself never fails.
pub fn resolve_endpoint(
    env_value: Option<&str>,
    file_value: Option<&str>,
) -> (Endpoint, Vec<ConfigError>) {
    let mut rejected = Vec::new();
    let candidates = [
        (env_value, EndpointSource::Environment, "environment"),
        (file_value, EndpointSource::ConfigFile, "config file"),
    ];

    for (value, source, source_name) in candidates {
        let Some(raw) = value.map(sanitize_key).filter(|v| !v.is_empty()) else {
            continue;
        };
        match parse_endpoint(&raw, source_name) {
            Ok(url) => return (Endpoint { url, source }, rejected),
            Err(e) => rejected.push(e),
        }
    }

    let url = Url::parse(DEFAULT_PREDICT_URL).expect("built-in endpoint is a valid URL");
    (Endpoint { url, source: EndpointSource::BuiltIn }, rejected)
}

fn parse_endpoint(raw: &str, source_name: &'static str) -> std::result::Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        source_name,
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::UnsupportedScheme {
            source_name,
            value: raw.to_string(),
        });
    }
    Ok(url)
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// A missing file means built-in defaults. A file that exists but does
    /// not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        // Strip BOM if present (common on Windows-created files)
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        for line in content.lines() {
            let line = line.trim().trim_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    /// Endpoint from `GP_PREDICTOR_API_URL`, then `[api] predict_url`, then the default.
    pub fn endpoint(&self) -> Endpoint {
        let env_value = std::env::var(ENDPOINT_ENV_VAR).ok();
        let (endpoint, rejected) =
            resolve_endpoint(env_value.as_deref(), self.api.predict_url.as_deref());
        for err in &rejected {
            tracing::warn!(error = %err, "ignoring endpoint candidate");
        }
        tracing::info!(url = %endpoint.url, source = endpoint.source.describe(), "endpoint resolved");
        endpoint
    }
}

/// Strip carriage returns, BOM, and other invisible chars from a key/path value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}
