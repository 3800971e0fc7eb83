use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

use crate::diff::RenderMode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub diff: DiffConfig,
    pub overlay: OverlayConfig,
    pub github: GithubConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Start sessions in full-file rendering
    pub full_file: bool,
    /// Hide unchanged regions in full-file rendering
    pub collapse_unchanged: bool,
    /// Lines kept visible around each hunk when collapsing
    pub context_lines: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub height: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Environment variable holding an explicit token
    pub token_env: String,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            full_file: false,
            collapse_unchanged: true,
            context_lines: 3,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self { height: 12 }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token_env: "GH_TOKEN".to_owned(),
        }
    }
}

impl DiffConfig {
    /// Rendering mode a session starts in
    pub fn render_mode(&self) -> RenderMode {
        if self.full_file {
            RenderMode::FullFile {
                collapse_unchanged: self.collapse_unchanged,
            }
        } else {
            RenderMode::DiffOnly
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> PathBuf {
        BaseDirectories::with_prefix("diffpin")
            .map(|dirs| dirs.get_config_home().join("config.toml"))
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }
}

/// How review API calls authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Explicit token taken from the configured environment variable
    Token(String),
    /// The gh CLI's own stored login
    GhLogin,
}

impl Credentials {
    pub fn resolve(config: &GithubConfig) -> Self {
        match env::var(&config.token_env) {
            Ok(token) if !token.trim().is_empty() => Credentials::Token(token.trim().to_string()),
            _ => Credentials::GhLogin,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Credentials::Token(token) => Some(token),
            Credentials::GhLogin => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Token(_) => f.write_str("Token(***)"),
            Credentials::GhLogin => f.write_str("GhLogin"),
        }
    }
}
