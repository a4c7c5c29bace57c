//! Configuration loader and validator for the certificate vault service.
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
    pub app: App,
    pub auth: Auth,
    pub issuer: Issuer,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub listen_addr: String,
    /// Upper bound on a single batch-generate run. Unbounded concurrent
    /// writes for very large counts would hammer the store, so a cap is
    /// enforced before any write happens.
    pub max_batch_count: u32,
}

/// Admin gating. A single static bearer token guards the admin endpoints;
/// the public verification and event listing endpoints need no credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Auth {
    pub admin_token: String,
}

/// Defaults applied to issued certificates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issuer {
    pub name: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }
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
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.listen_addr.trim().is_empty() {
        return Err(ConfigError::Invalid("app.listen_addr must be non-empty"));
    }
    if cfg.app.max_batch_count == 0 {
        return Err(ConfigError::Invalid("app.max_batch_count must be > 0"));
    }
    if cfg.auth.admin_token.trim().is_empty() {
        return Err(ConfigError::Invalid("auth.admin_token must be non-empty"));
    }
    if cfg.issuer.name.trim().is_empty() {
        return Err(ConfigError::Invalid("issuer.name must be non-empty"));
    }
    Ok(())
}

/// Example YAML configuration, kept in sync with the schema above.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  listen_addr: "127.0.0.1:8080"
  max_batch_count: 500

auth:
  admin_token: "CHANGE_ME_ADMIN_TOKEN"

issuer:
  name: "The Sportify Society"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.issuer.name, "The Sportify Society");
    }

    #[test]
    fn invalid_admin_token() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.auth.admin_token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("auth.admin_token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_batch_cap() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.max_batch_count = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("max_batch_count")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_issuer_name() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.issuer.name = "  ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.app.listen_addr, "127.0.0.1:8080");
        assert_eq!(cfg.app.max_batch_count, 500);
    }
}
