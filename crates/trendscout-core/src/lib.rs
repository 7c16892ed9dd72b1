use thiserror::Error;

mod app_config;
mod config;
pub mod policy;
mod post;
pub mod score;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use post::{Author, Engagement, MediaKind, Platform, Post, PostIdentity, Sentiment};

/// Errors raised while loading application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
