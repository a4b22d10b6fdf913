use anyhow::{Result, bail};

use super::AppConfig;

pub fn validate(cfg: &AppConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if cfg.general.host.trim().is_empty() {
        errors.push("general.host must not be empty".to_string());
    }

    if let Some(database) = cfg.database.as_ref() {
        if database.url.trim().is_empty() {
            errors.push("database.url must not be empty".to_string());
        }

        if database.min_idle > database.max_connections {
            errors.push(format!(
                "database.min_idle ({}) must be <= database.max_connections ({})",
                database.min_idle, database.max_connections
            ));
        }
    }

    let auth = &cfg.auth;
    if auth.jwt_secret.trim().is_empty() {
        errors.push("auth.jwt_secret must not be empty".to_string());
    }

    if auth.issuer.trim().is_empty() {
        errors.push("auth.issuer must not be empty".to_string());
    }

    if auth.min_password_length == 0 {
        errors.push("auth.min_password_length must be > 0".to_string());
    }

    if auth.hash.iterations == 0 {
        errors.push("auth.hash.iterations must be > 0".to_string());
    }

    if auth.hash.parallelism == 0 {
        errors.push("auth.hash.parallelism must be > 0".to_string());
    }

    if auth.hash.memory_kib < 8 * auth.hash.parallelism {
        errors.push(format!(
            "auth.hash.memory_kib ({}) must be at least 8 * auth.hash.parallelism",
            auth.hash.memory_kib
        ));
    }

    match (auth.admin_username.as_deref(), auth.admin_password.as_deref()) {
        (Some(username), Some(password)) => {
            if username.trim().is_empty() {
                errors.push("auth.admin_username must not be empty".to_string());
            }
            if password.len() < auth.min_password_length {
                errors.push(format!(
                    "auth.admin_password must be at least {} characters",
                    auth.min_password_length
                ));
            }
        }
        (None, None) => {}
        _ => errors.push(
            "auth.admin_username and auth.admin_password must be set together".to_string(),
        ),
    }

    if errors.is_empty() {
        return Ok(());
    }

    bail!("invalid app config:\n- {}", errors.join("\n- "))
}
