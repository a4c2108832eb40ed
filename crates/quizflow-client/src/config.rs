//! Client configuration and backend factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quizflow_core::poller::PollConfig;

use crate::api::HttpQuizApi;
use crate::transport::HttpTransport;

/// Name of the per-project config file.
pub const CONFIG_FILE: &str = "quizflow.toml";

/// Environment variable overriding `base_url`.
pub const BASE_URL_ENV: &str = "QUIZFLOW_BASE_URL";

/// Top-level quizflow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root, including any path prefix such as `/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout for ordinary requests.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Timeout for `POST /quiz/start`.
    #[serde(default = "default_start_timeout")]
    pub start_timeout_ms: u64,
    /// Questions per quiz, unless the backend says otherwise.
    #[serde(default = "default_target_questions")]
    pub target_questions: u32,
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}
fn default_request_timeout() -> u64 {
    15_000
}
fn default_start_timeout() -> u64 {
    60_000
}
fn default_target_questions() -> u32 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout(),
            start_timeout_ms: default_start_timeout(),
            target_questions: default_target_questions(),
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are copied verbatim and never expanded again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizflow.toml` in the current directory
/// 2. `~/.config/quizflow/config.toml`
///
/// `QUIZFLOW_BASE_URL` overrides the configured base URL.
pub fn load_config() -> Result<ClientConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from(CONFIG_FILE);
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ClientConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ClientConfig::default(),
    };

    if let Ok(url) = std::env::var(BASE_URL_ENV) {
        config.base_url = url;
    }
    config.base_url = resolve_env_vars(&config.base_url);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizflow"))
}

/// Create the HTTP backend described by `config`.
pub fn create_backend(config: &ClientConfig) -> Result<HttpQuizApi> {
    let transport = HttpTransport::new(&config.base_url, config.request_timeout())?;
    Ok(HttpQuizApi::new(transport).with_start_timeout(config.start_timeout()))
}

/// Starter config written by `quizflow init`.
pub fn sample_config() -> &'static str {
    r#"# quizflow configuration

# API root. Override with QUIZFLOW_BASE_URL; ${VAR} references are expanded.
base_url = "http://localhost:8000/api"

request_timeout_ms = 15000
start_timeout_ms = 60000
target_questions = 10

[poll]
total_timeout_ms = 90000
initial_delay_ms = 1000
max_interval_ms = 5000
base_interval_ms = 1000
increment_ms = 500
max_jitter_ms = 250
"#
}
