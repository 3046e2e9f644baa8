//! CLI configuration.
//!
//! Handles:
//! - Control plane endpoint
//! - Bearer token for the control plane

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API endpoint.
pub const API_URL_VAR: &str = "NODELEASE_API_URL";

/// Environment variable carrying the API token.
pub const API_TOKEN_VAR: &str = "NODELEASE_API_TOKEN";

/// Get the config directory path.
fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("dev", "nodelease", "leasectl")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Control plane URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token sent with every request.
    #[serde(default = "default_token", skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_api_url() -> String {
    std::env::var(API_URL_VAR).unwrap_or_else(|_| "http://localhost:8080".to_string())
}

fn default_token() -> Option<String> {
    std::env::var(API_TOKEN_VAR).ok()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: default_token(),
        }
    }
}

impl Config {
    /// Load config from disk, or return default.
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join(CONFIG_FILE);

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Get the API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}
