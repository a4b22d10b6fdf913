pub mod configs;
pub mod defaults;
pub mod envconfig;
pub mod validate;

pub use configs::{
    AppConfig, AuthConfig, DatabaseConfig, GeneralConfig, HashConfig, LogFormat, LoggingConfig,
};
pub use envconfig::EnvConfig;
