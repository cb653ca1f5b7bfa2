use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use facegate_config::ConfigError;
use thiserror::Error;

pub use facegate_core::errors::AppError as CoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("failed to read password: {0}")]
    PasswordPrompt(#[source] io::Error),

    #[error("no identity named '{0}' is registered")]
    UnknownUser(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Read { path, source } => AppError::ConfigRead { path, source },
            ConfigError::Parse { path, message } => AppError::ConfigParse { path, message },
        }
    }
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::Core(err) => err.exit_code(),
            AppError::ConfigRead { .. } => ExitCode::from(2),
            AppError::ConfigParse { .. } => ExitCode::from(2),
            AppError::UnknownUser(_) => ExitCode::from(2),
            _ => ExitCode::from(1),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            AppError::Core(err) => err.tag(),
            AppError::ConfigRead { .. } => "config_read",
            AppError::ConfigParse { .. } => "config_parse",
            AppError::PasswordPrompt(_) => "password_prompt",
            AppError::UnknownUser(_) => "unknown_user",
            AppError::Io(_) => "io",
            AppError::Serialization(_) => "serialization",
        }
    }

    pub fn human_message(&self) -> String {
        match self {
            AppError::Core(err) => err.human_message(),
            other => other.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
