use thiserror::Error;

/// All errors produced by vedit-core.
#[derive(Debug, Error)]
pub enum VeditError {
    /// A tuning parameter is out of range. Never silently clamped.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to decode {path}: {reason}")]
    Decode {
        path: std::path::PathBuf,
        reason: String,
    },

    #[error("resampler error: {0}")]
    Resample(String),

    #[error("background jobs require a Tokio runtime")]
    NoRuntime,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VeditError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        VeditError::InvalidConfiguration(msg.into())
    }

    /// `true` for the synchronous, caller-fixable rejection class.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, VeditError::InvalidConfiguration(_))
    }
}

pub type Result<T> = std::result::Result<T, VeditError>;
