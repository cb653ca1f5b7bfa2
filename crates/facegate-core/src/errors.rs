use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to open video device {device}: {source}")]
    DeviceOpen {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("device capability error: {0}")]
    Capability(String),

    #[error("unsupported pixel format '{0}' for selected device")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed processing frame data: {0}")]
    FrameProcessing(String),

    #[error("capture session already finished")]
    SessionFinished,

    #[error("failed to write image {path}: {message}")]
    ImageWrite { path: PathBuf, message: String },

    #[error("missing {kind} model; provide {flag} or set ${env}")]
    MissingModel {
        kind: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    #[error("failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("{0} backend not compiled into this build")]
    BackendUnavailable(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("face verification failed: {0}")]
    Matcher(#[from] MatcherError),

    #[error("failed to hash credential: {0}")]
    Credential(String),

    #[error("failed to read identity store {path}: {source}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write identity store {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("identity store {path} is invalid: {message}")]
    InvalidStore { path: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::UnsupportedFormat(_) => ExitCode::from(2),
            AppError::Validation(_) => ExitCode::from(2),
            AppError::MissingModel { .. } => ExitCode::from(2),
            AppError::Capability(_) => ExitCode::from(3),
            AppError::ModelLoad { .. } => ExitCode::from(3),
            AppError::BackendUnavailable(_) => ExitCode::from(3),
            AppError::Matcher(_) => ExitCode::from(3),
            AppError::DeviceOpen { .. } => ExitCode::from(4),
            AppError::FrameProcessing(_) => ExitCode::from(4),
            AppError::StoreRead { .. } => ExitCode::from(5),
            AppError::StoreWrite { .. } => ExitCode::from(5),
            AppError::InvalidStore { .. } => ExitCode::from(5),
            _ => ExitCode::from(1),
        }
    }

    /// Stable machine-readable tag for callers that branch on the failure kind.
    pub fn tag(&self) -> &'static str {
        match self {
            AppError::DeviceOpen { .. } => "device_open",
            AppError::Capability(_) => "device_capability",
            AppError::UnsupportedFormat(_) => "unsupported_format",
            AppError::Io(_) => "io",
            AppError::FrameProcessing(_) => "frame_processing",
            AppError::SessionFinished => "session_finished",
            AppError::ImageWrite { .. } => "image_write",
            AppError::MissingModel { .. } => "missing_model",
            AppError::ModelLoad { .. } => "model_load",
            AppError::BackendUnavailable(_) => "backend_unavailable",
            AppError::Validation(err) => err.tag(),
            AppError::Matcher(err) => err.tag(),
            AppError::Credential(_) => "credential",
            AppError::StoreRead { .. } => "persistence_read",
            AppError::StoreWrite { .. } => "persistence_write",
            AppError::InvalidStore { .. } => "persistence_invalid",
            AppError::Serialization(_) => "serialization",
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Registration input rejected before the identity table was touched.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("username '{username}' already exists")]
    DuplicateUsername { username: String },
}

impl ValidationError {
    pub fn tag(&self) -> &'static str {
        match self {
            ValidationError::MissingField { .. } => "missing_field",
            ValidationError::DuplicateUsername { .. } => "duplicate_username",
        }
    }
}

/// Terminal capture-device failure for the current call. Never retried here.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceError {
    #[error("cannot open any capture device (tried {}): {message}", tried.join(", "))]
    CannotOpenDevice { tried: Vec<String>, message: String },

    #[error("failed to read frame from {device}: {message}")]
    ReadFailure { device: String, message: String },
}

impl DeviceError {
    pub fn tag(&self) -> &'static str {
        match self {
            DeviceError::CannotOpenDevice { .. } => "cannot_open_device",
            DeviceError::ReadFailure { .. } => "read_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatcherError {
    #[error("cannot read image {path}: {message}")]
    ImageUnreadable { path: PathBuf, message: String },

    #[error("no face detected in {path}")]
    NoFaceInImage { path: PathBuf },

    #[error("matcher backend error: {0}")]
    Backend(String),
}

impl MatcherError {
    pub fn tag(&self) -> &'static str {
        match self {
            MatcherError::ImageUnreadable { .. } => "matcher_image_unreadable",
            MatcherError::NoFaceInImage { .. } => "matcher_no_face",
            MatcherError::Backend(_) => "matcher_backend",
        }
    }
}
