use crate::state::SubmitPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/engines/text-davinci-003/completions";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unknown submit policy `{0}` (expected allow_concurrent or reject_while_pending)")]
    SubmitPolicy(String),
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub n: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            n: 1,
            temperature: 0.5,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub params: CompletionParams,
    pub sandbox_dir: PathBuf,
    pub submit_policy: SubmitPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            params: CompletionParams::default(),
            sandbox_dir: reactor_dir().join("sandbox"),
            submit_policy: SubmitPolicy::default(),
        }
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("USERPROFILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn reactor_dir() -> PathBuf {
    home_dir().join(".reactor")
}

pub fn config_path() -> PathBuf {
    reactor_dir().join("config.json")
}

fn parse_submit_policy(raw: &str) -> Result<SubmitPolicy, ConfigError> {
    match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "allow_concurrent" => Ok(SubmitPolicy::AllowConcurrent),
        "reject_while_pending" => Ok(SubmitPolicy::RejectWhilePending),
        _ => Err(ConfigError::SubmitPolicy(raw.to_string())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl Config {
    /// Reads `~/.reactor/config.json` if present, then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(&config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        if config.api_key.is_none() {
            warn!("no API key configured (set REACTOR_API_KEY or OPENAI_API_KEY); completion calls will fail");
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let data = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) =
            non_empty(lookup("REACTOR_API_KEY")).or_else(|| non_empty(lookup("OPENAI_API_KEY")))
        {
            self.api_key = Some(key);
        }
        if let Some(endpoint) = non_empty(lookup("REACTOR_ENDPOINT")) {
            self.endpoint = endpoint;
        }
        if let Some(dir) = non_empty(lookup("REACTOR_SANDBOX_DIR")) {
            self.sandbox_dir = PathBuf::from(dir);
        }
        if let Some(policy) = non_empty(lookup("REACTOR_SUBMIT_POLICY")) {
            self.submit_policy = parse_submit_policy(&policy)?;
        }
        Ok(())
    }
}
