//! `set` / `unset` handling for the config file.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use crate::core::config::Config;

pub const KEYS: &[&str] = &[
    "default-model",
    "host",
    "system-prompt",
    "spawn-server",
    "ready-timeout",
    "logos",
    "color",
];

#[derive(Debug, PartialEq, Eq)]
pub enum SettingsError {
    UnknownKey(String),
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    EmptyValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::UnknownKey(key) => {
                write!(f, "Unknown config key '{key}'. Known keys: {}", KEYS.join(", "))
            }
            SettingsError::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "Invalid value '{value}' for {key}: expected {expected}"),
            SettingsError::EmptyValue(key) => write!(f, "A value is required for {key}"),
        }
    }
}

impl StdError for SettingsError {}

pub fn apply_set(config: &mut Config, key: &str, value: &str) -> Result<String, SettingsError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SettingsError::EmptyValue(key.to_string()));
    }

    match key {
        "default-model" => config.default_model = Some(value.to_string()),
        "host" => config.base_url = Some(value.to_string()),
        "system-prompt" => config.system_prompt = Some(value.to_string()),
        "spawn-server" => config.spawn_server = Some(parse_bool("spawn-server", value)?),
        "color" => config.color = Some(parse_bool("color", value)?),
        "ready-timeout" => {
            let secs = value.parse().map_err(|_| SettingsError::InvalidValue {
                key: "ready-timeout",
                value: value.to_string(),
                expected: "a number of seconds",
            })?;
            config.ready_timeout_secs = Some(secs);
        }
        "logos" => config.logos_path = Some(PathBuf::from(value)),
        _ => return Err(SettingsError::UnknownKey(key.to_string())),
    }
    Ok(format!("Set {key} to: {value}"))
}

pub fn apply_unset(config: &mut Config, key: &str) -> Result<String, SettingsError> {
    match key {
        "default-model" => config.default_model = None,
        "host" => config.base_url = None,
        "system-prompt" => config.system_prompt = None,
        "spawn-server" => config.spawn_server = None,
        "color" => config.color = None,
        "ready-timeout" => config.ready_timeout_secs = None,
        "logos" => config.logos_path = None,
        _ => return Err(SettingsError::UnknownKey(key.to_string())),
    }
    Ok(format!("Unset {key}"))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, SettingsError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(SettingsError::InvalidValue {
            key,
            value: value.to_string(),
            expected: "true or false",
        }),
    }
}
