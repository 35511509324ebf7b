use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory holding config, sessions and history, under home or the project root
pub const CONFIG_DIR: &str = ".userdesk";

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Session transcript settings
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TranscriptConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Base URL of the users backend, e.g. "http://localhost:8080"
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub transcript: TranscriptConfig,
    #[serde(default)]
    pub history_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.userdesk/config.local.toml) > project (.userdesk/config.toml) > user (~/.userdesk/config.toml)
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir();
        Self::load_layers(home.as_deref(), Path::new("."))
    }

    /// Layered load rooted at explicit home and project directories
    pub fn load_layers(home: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let mut layers = Vec::new();
        if let Some(home) = home {
            layers.push(home.join(CONFIG_DIR).join("config.toml"));
        }
        layers.push(root.join(CONFIG_DIR).join("config.toml"));
        layers.push(root.join(CONFIG_DIR).join("config.local.toml"));

        for path in layers {
            if path.exists() {
                let layer = Self::load_from(&path)?;
                config.merge(layer);
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority for every field it sets)
    pub fn merge(&mut self, other: Config) {
        if other.api_url.is_some() {
            self.api_url = other.api_url;
        }
        if other.transcript.enabled.is_some() {
            self.transcript.enabled = other.transcript.enabled;
        }
        if other.transcript.dir.is_some() {
            self.transcript.dir = other.transcript.dir;
        }
        if other.history_file.is_some() {
            self.history_file = other.history_file;
        }
    }

    /// CLI/environment value wins over files when present
    pub fn override_api_url(&mut self, api_url: Option<&str>) {
        if let Some(url) = api_url {
            self.api_url = Some(url.to_string());
        }
    }

    /// The configured base URL; blank values count as absent
    pub fn resolved_api_url(&self) -> Option<&str> {
        self.api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn transcripts_enabled(&self) -> bool {
        self.transcript.enabled.unwrap_or(true)
    }

    pub fn transcripts_dir(&self, root: &Path) -> PathBuf {
        self.transcript
            .dir
            .clone()
            .unwrap_or_else(|| root.join(CONFIG_DIR).join("sessions"))
    }

    /// REPL history file, defaulting to ~/.userdesk/history
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(CONFIG_DIR).join("history")))
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(url) = self.resolved_api_url() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ValidationError {
                    field: "api_url".to_string(),
                    message: format!("Expected an http:// or https:// URL, got '{}'", url),
                });
            }
        }

        if let Some(dir) = &self.transcript.dir {
            if dir.as_os_str().is_empty() {
                errors.push(ValidationError {
                    field: "transcript.dir".to_string(),
                    message: "Must not be empty".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
