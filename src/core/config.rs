use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::core::readiness::{DEFAULT_POLL_INTERVAL, DEFAULT_READY_TIMEOUT, MIN_POLL_INTERVAL};
use crate::utils::url::{base_url_from_host, DEFAULT_BASE_URL};

pub const DEFAULT_SERVER_PROGRAM: &str = "ollama";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the inference server, e.g. `http://localhost:11434/`
    pub base_url: Option<String>,
    /// Start the server ourselves instead of attaching to a running one
    pub spawn_server: Option<bool>,
    /// Program used to start the server
    pub server_command: Option<String>,
    pub server_args: Option<Vec<String>>,
    pub ready_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    /// Model to use without showing the picker
    pub default_model: Option<String>,
    /// Replaces the built-in system prompt
    pub system_prompt: Option<String>,
    /// JSON file mapping model families to ASCII art
    pub logos_path: Option<PathBuf>,
    pub color: Option<bool>,
}

/// Errors that can occur when loading configuration from disk.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    NoConfigDir,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config at {}: {}", path.display(), source)
            }
            ConfigError::NoConfigDir => write!(f, "Could not determine a config directory"),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::NoConfigDir => None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from_path(&Self::config_path()?)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<PathBuf, Box<dyn StdError>> {
        let path = Self::config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), Box<dyn StdError>> {
        let parent = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file
            .persist(config_path)
            .map_err(|err| -> Box<dyn StdError> { Box::new(err) })?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("org", "ollama-cli", "ollama-cli")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Configured URL, then `OLLAMA_HOST`, then the local default.
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .or_else(|| {
                std::env::var("OLLAMA_HOST")
                    .ok()
                    .filter(|host| !host.trim().is_empty())
                    .map(|host| base_url_from_host(&host))
            })
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn spawn_server(&self) -> bool {
        self.spawn_server.unwrap_or(true)
    }

    pub fn server_command(&self) -> (String, Vec<String>) {
        let program = self
            .server_command
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER_PROGRAM.to_string());
        let args = self
            .server_args
            .clone()
            .unwrap_or_else(|| vec!["serve".to_string()]);
        (program, args)
    }

    pub fn ready_timeout(&self) -> Duration {
        self.ready_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_READY_TIMEOUT)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
            .max(MIN_POLL_INTERVAL)
    }

    pub fn logos_path(&self) -> PathBuf {
        self.logos_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("logos.json"))
    }

    pub fn color(&self) -> bool {
        self.color.unwrap_or(true)
    }

    /// Render the effective settings for `ollama-cli config`.
    pub fn describe(&self) -> String {
        let (program, args) = self.server_command();
        let mut lines = vec![
            format!("base-url: {}", self.base_url()),
            format!("spawn-server: {}", self.spawn_server()),
            format!("server-command: {} {}", program, args.join(" ")),
            format!("ready-timeout: {}s", self.ready_timeout().as_secs()),
            format!("poll-interval: {}ms", self.poll_interval().as_millis()),
            format!("logos: {}", self.logos_path().display()),
            format!("color: {}", self.color()),
        ];
        lines.push(match &self.default_model {
            Some(model) => format!("default-model: {model}"),
            None => "default-model: (pick interactively)".to_string(),
        });
        lines.push(match &self.system_prompt {
            Some(_) => "system-prompt: custom".to_string(),
            None => "system-prompt: built-in".to_string(),
        });
        lines.join("\n")
    }
}
