//! Application configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::PlayerOptions;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
  #[error("Password cannot be empty")]
  EmptyPassword,
  #[error("Port cannot be 0")]
  InvalidPort,
  #[error("Poll interval must be between 50 and 5000 milliseconds")]
  InvalidPollInterval,
  #[error("Invalid value for {0}: {1}")]
  InvalidEnv(&'static str, String),
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
  /// Backend executable name or path (None = auto-detect).
  #[serde(default)]
  pub backend: Option<String>,

  /// Additional backend command-line arguments.
  #[serde(default)]
  pub backend_args: Vec<String>,

  /// Password for the HTTP remote.
  #[serde(default)]
  pub password: String,

  /// HTTP remote port.
  #[serde(default = "default_port")]
  pub port: u16,

  /// Use aspect/audio/subtitle keys as seek forward, OSD and seek back.
  #[serde(default = "default_remap_keys")]
  pub remap_keys: bool,

  /// Liveness poll interval in milliseconds.
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,

  /// Start shuffled from a random track.
  #[serde(default)]
  pub shuffle: bool,
}

fn default_port() -> u16 {
  8080
}

fn default_remap_keys() -> bool {
  true
}

fn default_poll_interval_ms() -> u64 {
  250
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      backend: None,
      backend_args: Vec::new(),
      password: String::new(),
      port: default_port(),
      remap_keys: default_remap_keys(),
      poll_interval_ms: default_poll_interval_ms(),
      shuffle: false,
    }
  }
}

impl AppConfig {
  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.password.is_empty() {
      return Err(ConfigError::EmptyPassword);
    }
    if self.port == 0 {
      return Err(ConfigError::InvalidPort);
    }
    if !(50..=5000).contains(&self.poll_interval_ms) {
      return Err(ConfigError::InvalidPollInterval);
    }
    Ok(())
  }

  /// Overlay `MPRC_*` environment variables.
  pub fn apply_env(self) -> Result<Self, ConfigError> {
    self.apply_vars(|key| std::env::var(key).ok())
  }

  fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    if let Some(password) = var("MPRC_PASSWORD") {
      self.password = password;
    }
    if let Some(port) = var("MPRC_PORT") {
      self.port = port
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv("MPRC_PORT", port))?;
    }
    if let Some(backend) = var("MPRC_BACKEND").filter(|s| !s.trim().is_empty()) {
      self.backend = Some(backend);
    }
    if let Some(args) = var("MPRC_BACKEND_ARGS") {
      self.backend_args = args.split_whitespace().map(String::from).collect();
    }
    if let Some(remap) = var("MPRC_REMAP_KEYS") {
      self.remap_keys = parse_flag(&remap).ok_or(ConfigError::InvalidEnv("MPRC_REMAP_KEYS", remap))?;
    }
    if let Some(shuffle) = var("MPRC_SHUFFLE") {
      self.shuffle = parse_flag(&shuffle).ok_or(ConfigError::InvalidEnv("MPRC_SHUFFLE", shuffle))?;
    }
    Ok(self)
  }

  pub fn player_options(&self) -> PlayerOptions {
    PlayerOptions {
      remap_keys: self.remap_keys,
      poll_interval: Duration::from_millis(self.poll_interval_ms),
    }
  }
}

fn parse_flag(value: &str) -> Option<bool> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn test_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.port, 8080);
    assert!(config.remap_keys);
    assert!(!config.shuffle);
    assert_eq!(config.player_options().poll_interval, Duration::from_millis(250));
    assert_eq!(config.validate(), Err(ConfigError::EmptyPassword));
  }

  #[test]
  fn test_deserialize_fills_defaults() {
    let config: AppConfig = serde_json::from_str(r#"{"password":"pw","backendArgs":["-vo","null"]}"#).unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.backend_args, vec!["-vo", "null"]);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_env_overlay() {
    let config = AppConfig::default()
      .apply_vars(vars(&[
        ("MPRC_PASSWORD", "secret"),
        ("MPRC_PORT", "9090"),
        ("MPRC_BACKEND", "/opt/mpv"),
        ("MPRC_BACKEND_ARGS", " --vo=null   --ao=null "),
        ("MPRC_REMAP_KEYS", "no"),
        ("MPRC_SHUFFLE", "1"),
      ]))
      .unwrap();
    assert_eq!(config.password, "secret");
    assert_eq!(config.port, 9090);
    assert_eq!(config.backend.as_deref(), Some("/opt/mpv"));
    assert_eq!(config.backend_args, vec!["--vo=null", "--ao=null"]);
    assert!(!config.remap_keys && config.shuffle);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_env_rejects_garbage() {
    let err = AppConfig::default()
      .apply_vars(vars(&[("MPRC_PORT", "eighty")]))
      .unwrap_err();
    assert_eq!(err, ConfigError::InvalidEnv("MPRC_PORT", "eighty".into()));
    assert!(AppConfig::default()
      .apply_vars(vars(&[("MPRC_SHUFFLE", "maybe")]))
      .is_err());
  }

  #[test]
  fn test_validate_poll_interval() {
    let config = AppConfig {
      password: "pw".into(),
      poll_interval_ms: 10,
      ..AppConfig::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::InvalidPollInterval));
  }
}
