use std::path::Path;

use ::config as config_rs;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Layered loading: optional config file named by `CONFIG_PATH`, then
/// `APP_`-prefixed environment variables on top (`APP_AUTH__JWT_SECRET`).
pub trait EnvConfig: Sized + DeserializeOwned {
    const PREFIX: &'static str = "APP";
    const SEPARATOR: &'static str = "__";
    const FILE_VAR: &'static str = "CONFIG_PATH";

    fn load_dotenv() {
        // Load .env from crate root (falls back to current dir if missing)
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let _ = dotenvy::from_filename(manifest_dir.join(".env")).or_else(|_| dotenvy::dotenv());
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn from_env() -> Result<Self> {
        Self::load_dotenv();
        let file = std::env::var(Self::FILE_VAR).ok().filter(|p| !p.trim().is_empty());
        Self::load(file.as_deref())
    }

    fn load(file: Option<&str>) -> Result<Self> {
        let mut builder = config_rs::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config_rs::File::with_name(path).required(true));
        }

        let settings = builder
            .add_source(
                config_rs::Environment::with_prefix(Self::PREFIX)
                    .prefix_separator("_")
                    .separator(Self::SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .with_context(|| match file {
                Some(path) => format!("failed to read config from {path} and environment"),
                None => "failed to read environment variables for config".to_string(),
            })?;

        let cfg = settings
            .try_deserialize::<Self>()
            .context("failed to deserialize config")?;

        cfg.validate()?;
        Ok(cfg)
    }
}
