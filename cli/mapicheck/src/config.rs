//! Connection settings.
//!
//! Read from `config.json` in the platform config directory. Flags and
//! environment variables override the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use mapicheck_client::HttpClusterConfig;
use serde::{Deserialize, Serialize};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("io", "mapicheck", "mapicheck")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// API server URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://127.0.0.1:6443".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            insecure_skip_tls_verify: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load config from the config directory, or return the default.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Client settings for the machine API served under `machine_api_group`.
    pub fn http_cluster(&self, machine_api_group: &str) -> HttpClusterConfig {
        HttpClusterConfig {
            api_url: self.api_url.clone(),
            token: self.token.clone(),
            insecure_skip_tls_verify: self.insecure_skip_tls_verify,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            machine_api_group: machine_api_group.to_string(),
            ..HttpClusterConfig::default()
        }
    }
}
