//! Configuration loader and validator for the timetable grid engine.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub school: School,
    pub service: Service,
}

/// School identity every request is scoped by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct School {
    pub code: String,
    pub academic_year: String,
}

/// Timetable service endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    pub base_url: String,
    pub token: String,
    pub request_timeout_ms: u64,
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.school.code.trim().is_empty() {
        return Err(ConfigError::Invalid("school.code must be non-empty"));
    }
    if cfg.school.academic_year.trim().is_empty() {
        return Err(ConfigError::Invalid("school.academic_year must be non-empty"));
    }

    if cfg.service.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("service.base_url must be non-empty"));
    }
    if cfg.service.token.trim().is_empty() {
        return Err(ConfigError::Invalid("service.token must be non-empty"));
    }
    if cfg.service.request_timeout_ms == 0 {
        return Err(ConfigError::Invalid("service.request_timeout_ms must be > 0"));
    }

    Ok(())
}

/// Returns an example YAML document matching the schema.
pub fn example() -> &'static str {
    r#"school:
  code: "SC-0042"
  academic_year: "2025-2026"

service:
  base_url: "https://api.school.example/"
  token: "YOUR_SERVICE_TOKEN"
  request_timeout_ms: 10000
"#
}
