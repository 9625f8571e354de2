use thiserror::Error;

use crate::caching::CacheError;
use crate::config::LoadError;
use crate::pipeline::PipelineError;

/// Top-level failure of the binary and of [`crate::runtime::Runtime`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl AppError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

impl From<crate::pipeline::SetupError> for AppError {
    fn from(err: crate::pipeline::SetupError) -> Self {
        Self::Pipeline(err.into())
    }
}
