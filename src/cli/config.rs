use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::fs;
use tracing::{info, debug, error};
use url::Url;

use crate::collector::DEFAULT_WORKERS;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CollectorConfig {
    pub server: ServerSettings,
    pub apod: ApodSettings,
    pub pool: PoolSettings,
}

/// HTTP service settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,  // Upper bound for one /pictures request
    pub shutdown_grace_secs: u64,   // Time given to in-flight requests on shutdown
}

/// Remote APOD API settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ApodSettings {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout_secs: u64,  // Per remote call
}

/// Fetch pool settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PoolSettings {
    pub workers: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 60,
            shutdown_grace_secs: 30,
        }
    }
}

impl Default for ApodSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.nasa.gov/planetary/apod".to_string(),
            api_key: "DEMO_KEY".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ServerSettings {
    /// Address the HTTP service binds to
    pub fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context(format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

impl CollectorConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        let mut path = if let Some(proj_dirs) = directories::ProjectDirs::from("com", "url-collector", "url-collector") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        };

        // Create the profiles directory if it doesn't exist
        path.push("profiles");
        if !path.exists() {
            if let Err(e) = fs::create_dir_all(&path) {
                error!("Failed to create config directory: {}", e);
            }
        }

        // Move back up to the config directory
        path.pop();
        path
    }

    /// Path of the default configuration file
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("default.yaml")
    }

    /// Load the default configuration
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_path();

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            // Create and save the default configuration
            info!("Default configuration not found. Creating...");
            let config = Self::default();
            config.save_as_default()?;
            Ok(config)
        }
    }

    /// Load a configuration profile
    pub fn load_profile(profile: &str) -> Result<Self> {
        let profile_path = Self::config_dir().join("profiles").join(format!("{}.yaml", profile));

        if profile_path.exists() {
            Self::load_from_file(&profile_path)
        } else {
            anyhow::bail!("Profile '{}' not found", profile)
        }
    }

    /// Load the named profile, or the default configuration, then apply
    /// environment overrides
    pub fn load(profile: Option<&str>) -> Result<Self> {
        let mut config = match profile {
            Some(name) => Self::load_profile(name)
                .context(format!("Failed to load profile: {}", name))?,
            None => Self::load_default()?,
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply `PORT` and `API_KEY` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a key lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => error!("Ignoring invalid PORT '{}': {}", port, e),
            }
        }

        if let Some(key) = lookup("API_KEY").filter(|v| !v.is_empty()) {
            self.apod.api_key = key;
        }
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pool.workers == 0 {
            anyhow::bail!("pool.workers must be at least 1");
        }

        if self.apod.api_key.trim().is_empty() {
            anyhow::bail!("apod.api_key must not be empty");
        }

        Url::parse(&self.apod.base_url)
            .context(format!("Invalid apod.base_url: {}", self.apod.base_url))?;

        self.server.bind_address()?;

        Ok(())
    }

    /// Save the configuration as the default
    pub fn save_as_default(&self) -> Result<()> {
        self.save_to_file(&Self::default_path())
    }

    /// Save the configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// List all available profiles
    pub fn list_profiles() -> Result<Vec<String>> {
        let profiles_dir = Self::config_dir().join("profiles");

        if !profiles_dir.exists() {
            return Ok(vec![]);
        }

        let mut profiles = Vec::new();

        for entry in fs::read_dir(profiles_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() && path.extension().map_or(false, |ext| ext == "yaml") {
                if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                    profiles.push(name.to_string());
                }
            }
        }

        profiles.sort();
        Ok(profiles)
    }
}
