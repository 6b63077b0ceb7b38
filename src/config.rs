//! Runtime configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional
//! `rosterd.toml` in the working directory (or the file named by
//! `ROSTERD_CONFIG`), then `ROSTERD_*` environment variables with `__` between
//! nested keys (`ROSTERD_AUTH__ACTIVITY_LOG_CAP=500`). `RUST_LOG` overrides the
//! log level.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub log_level: String,
    /// `pretty` or `json`.
    pub log_format: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Opened at startup when set, as if `workspace.select` had been sent.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Password given to the bootstrap `admin` account.
    pub admin_password: String,
    pub activity_log_cap: usize,
    pub argon2: Argon2Config,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_password: "admin123".to_string(),
            activity_log_cap: 1000,
            argon2: Argon2Config::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argon2Config {
    /// KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let file_name = std::env::var("ROSTERD_CONFIG").unwrap_or_else(|_| "rosterd".into());

        let builder = Config::builder()
            .set_default("app.log_level", defaults.app.log_level)?
            .set_default("app.log_format", defaults.app.log_format)?
            .set_default("auth.admin_password", defaults.auth.admin_password)?
            .set_default("auth.activity_log_cap", defaults.auth.activity_log_cap as i64)?
            .set_default("auth.argon2.memory_cost", i64::from(defaults.auth.argon2.memory_cost))?
            .set_default("auth.argon2.time_cost", i64::from(defaults.auth.argon2.time_cost))?
            .set_default("auth.argon2.parallelism", i64::from(defaults.auth.argon2.parallelism))?
            .add_source(File::with_name(&file_name).required(false))
            .add_source(
                Environment::with_prefix("ROSTERD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("app.log_level", std::env::var("RUST_LOG").ok())?;

        let mut cfg: AppConfig = builder.build()?.try_deserialize()?;
        if cfg.auth.activity_log_cap == 0 {
            return Err(ConfigError::Message(
                "auth.activity_log_cap must be at least 1".to_string(),
            ));
        }
        if !matches!(cfg.app.log_format.as_str(), "pretty" | "json") {
            cfg.app.log_format = "pretty".to_string();
        }
        Ok(cfg)
    }

    pub fn is_json_logging(&self) -> bool {
        self.app.log_format == "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.auth.activity_log_cap, 1000);
        assert_eq!(cfg.auth.admin_password, "admin123");
        assert_eq!(cfg.app.log_level, "info");
        assert!(!cfg.is_json_logging());
        assert!(cfg.workspace.path.is_none());
    }
}
