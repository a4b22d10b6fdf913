use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{defaults, envconfig::EnvConfig, validate};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub logging: LoggingConfig,
    pub database: Option<DatabaseConfig>,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        <Self as EnvConfig>::from_env()
    }
}

impl EnvConfig for AppConfig {
    fn validate(&self) -> Result<()> {
        validate::validate(self)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub host: String,
    pub port: u16,
    /// Per-request deadline for store calls; 0 disables it.
    pub request_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            host: defaults::DEFAULT_HOST.to_string(),
            port: defaults::DEFAULT_PORT,
            request_timeout_secs: defaults::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl GeneralConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub rust_log: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rust_log: defaults::DEFAULT_RUST_LOG.to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_db_min_idle")]
    pub min_idle: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    /// 0 falls back to 15 minutes.
    pub access_ttl_secs: u64,
    /// 0 falls back to 30 days.
    pub refresh_ttl_secs: u64,
    pub min_password_length: usize,
    /// When false, refresh tokens are issued without a durable record.
    pub persist_refresh_tokens: bool,
    pub hash: HashConfig,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: defaults::DEFAULT_ISSUER.to_string(),
            access_ttl_secs: 0,
            refresh_ttl_secs: 0,
            min_password_length: defaults::DEFAULT_MIN_PASSWORD_LENGTH,
            persist_refresh_tokens: true,
            hash: HashConfig::default(),
            admin_username: None,
            admin_password: None,
        }
    }
}

impl AuthConfig {
    pub fn access_ttl(&self) -> Duration {
        match self.access_ttl_secs {
            0 => Duration::from_secs(defaults::DEFAULT_ACCESS_TTL_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        match self.refresh_ttl_secs {
            0 => Duration::from_secs(defaults::DEFAULT_REFRESH_TTL_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (self.admin_username.as_deref(), self.admin_password.as_deref()) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        }
    }
}

/// Argon2id cost parameters for newly created hashes.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: defaults::DEFAULT_HASH_MEMORY_KIB,
            iterations: defaults::DEFAULT_HASH_ITERATIONS,
            parallelism: defaults::DEFAULT_HASH_PARALLELISM,
        }
    }
}

fn default_db_max_connections() -> u32 {
    defaults::DEFAULT_DB_MAX_CONNECTIONS
}

fn default_db_min_idle() -> u32 {
    defaults::DEFAULT_DB_MIN_IDLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttls_fall_back_to_defaults() {
        let cfg = AuthConfig::default();

        assert_eq!(cfg.access_ttl(), Duration::from_secs(15 * 60));
        assert_eq!(cfg.refresh_ttl(), Duration::from_secs(30 * 24 * 60 * 60));
    }

    #[test]
    fn configured_ttls_are_used() {
        let cfg = AuthConfig {
            access_ttl_secs: 60,
            refresh_ttl_secs: 3600,
            ..AuthConfig::default()
        };

        assert_eq!(cfg.access_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.refresh_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn admin_credentials_need_both_fields() {
        let mut cfg = AuthConfig {
            admin_username: Some("admin".to_string()),
            ..AuthConfig::default()
        };
        assert!(cfg.admin_credentials().is_none());

        cfg.admin_password = Some("adminpassword".to_string());
        assert_eq!(cfg.admin_credentials(), Some(("admin", "adminpassword")));
    }

    #[test]
    fn zero_request_timeout_disables_deadline() {
        let mut general = GeneralConfig::default();
        assert_eq!(general.request_timeout(), Some(Duration::from_secs(10)));

        general.request_timeout_secs = 0;
        assert!(general.request_timeout().is_none());
    }
}
