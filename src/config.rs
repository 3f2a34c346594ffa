use std::path::{Path, PathBuf};

use color_eyre::eyre::{OptionExt, Result, WrapErr};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing credential: {0} must not be empty")]
    MissingCredential(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the published mapping is written
    pub mapping_path: PathBuf,
    /// README whose `## Playlists` section lists the published playlists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme_path: Option<PathBuf>,
    pub spotify: SpotifySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mapping_path: PathBuf::from("playlists.json"),
            readme_path: None,
            spotify: SpotifySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifySettings {
    pub api_base_url: String,
    pub accounts_base_url: String,
    /// Must match a redirect URI registered for the Spotify app
    pub redirect_uri: String,
    pub callback_port: u16,
    pub max_retries: usize,
    /// First backoff delay; later retries back off exponentially from it
    pub retry_delay_ms: u64,
    pub requests_per_second: u32,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.spotify.com/v1".to_string(),
            accounts_base_url: "https://accounts.spotify.com".to_string(),
            redirect_uri: "http://localhost:8000".to_string(),
            callback_port: 8000,
            max_retries: 5,
            retry_delay_ms: 1000,
            requests_per_second: 5,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("playlist-publisher").join("config.toml"))
    }

    /// Load the default config file, falling back to defaults when there is none
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the default config file unless one already exists
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_eyre("No config directory on this platform")?;
        if path.exists() {
            tracing::info!(path = %path.display(), "Config file already exists");
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(&path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(path)
    }
}

fn require(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::MissingCredential(name))
    } else {
        Ok(value)
    }
}

/// Spotify app credentials
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    client_id: String,
    client_secret: String,
}

impl SpotifyCredentials {
    pub fn new(client_id: String, client_secret: String) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: require("SPOTIFY_CLIENT_ID", client_id)?,
            client_secret: require("SPOTIFY_CLIENT_SECRET", client_secret)?,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

pub fn refresh_token(value: String) -> Result<String, ConfigError> {
    require("SPOTIFY_REFRESH_TOKEN", value)
}
