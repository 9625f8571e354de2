use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cached {payload} value cannot be written to a sink")]
    Unsupported { payload: &'static str },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn unsupported(payload: &'static str) -> Self {
        Self::Unsupported { payload }
    }
}
