use thiserror::Error;

use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("missing required setting: {0}")]
    MissingSetting(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("env file not found: {0}")]
    EnvFileNotFound(String),

    #[error("descriptor not found: {0}")]
    DescriptorNotFound(String),

    #[error("secret store not found: {0}")]
    SecretStoreNotFound(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, McpError>;
