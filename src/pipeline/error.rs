use std::sync::Arc;

use thiserror::Error;

use crate::caching::CacheError;

/// Failure reported by a single stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{message}")]
    Failed { message: String },
    #[error("no output attached")]
    NoOutput,
    #[error("stage `{component}` failed: {source}")]
    Downstream {
        component: Arc<str>,
        #[source]
        source: Box<StageError>,
    },
}

impl StageError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub(crate) fn downstream(component: Arc<str>, source: StageError) -> Self {
        match source {
            // keep the innermost stage as the origin
            already @ Self::Downstream { .. } => already,
            other => Self::Downstream {
                component,
                source: Box::new(other),
            },
        }
    }

    /// Peel downstream wrappers, returning the failing stage's name and its error.
    pub(crate) fn into_origin(self, fallback: Arc<str>) -> (Arc<str>, StageError) {
        match self {
            Self::Downstream { component, source } => (component, *source),
            other => (fallback, other),
        }
    }
}

/// Structural problems detected while assembling or driving a pipeline.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("pipeline has no components")]
    Empty,
    #[error("first component `{component}` is not a starter")]
    FirstNotStarter { component: Arc<str> },
    #[error("last component `{component}` is not a finisher")]
    LastNotFinisher { component: Arc<str> },
    #[error("cannot link `{producer}` to `{consumer}`: `{producer}` is not a producer")]
    NotProducer {
        producer: Arc<str>,
        consumer: Arc<str>,
    },
    #[error("cannot link `{producer}` to `{consumer}`: `{consumer}` is not a consumer")]
    NotConsumer {
        producer: Arc<str>,
        consumer: Arc<str>,
    },
    #[error("`{producer}` rejected `{consumer}` as its consumer: {source}")]
    ConsumerRejected {
        producer: Arc<str>,
        consumer: Arc<str>,
        #[source]
        source: StageError,
    },
    #[error("component `{component}` failed to set up: {source}")]
    Component {
        component: Arc<str>,
        #[source]
        source: StageError,
    },
    #[error("components must be added before the pipeline is set up")]
    AddAfterSetup,
    #[error("pipeline is already set up")]
    AlreadySetUp,
    #[error("pipeline is not set up")]
    NotSetUp,
    #[error("`expires` is set but no `expires-cache-key` was configured")]
    MissingExpiresCacheKey,
    #[error("invalid `expires` value `{value}`: expected whole seconds from 1 to {max}", max = super::options::MAX_EXPIRES_SECS)]
    InvalidExpires { value: String },
}

impl SetupError {
    pub fn first_not_starter(component: &Arc<str>) -> Self {
        Self::FirstNotStarter {
            component: Arc::clone(component),
        }
    }

    pub fn last_not_finisher(component: &Arc<str>) -> Self {
        Self::LastNotFinisher {
            component: Arc::clone(component),
        }
    }

    pub fn invalid_expires(value: impl Into<String>) -> Self {
        Self::InvalidExpires {
            value: value.into(),
        }
    }
}

/// Failures while a set-up pipeline runs.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("stage `{component}` failed: {source}")]
    Stage {
        component: Arc<str>,
        #[source]
        source: StageError,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl ProcessingError {
    pub(crate) fn stage(starter: Arc<str>, error: StageError) -> Self {
        let (component, source) = error.into_origin(starter);
        Self::Stage { component, source }
    }

    /// Name of the stage that failed, when a stage failed.
    pub fn component(&self) -> Option<&str> {
        match self {
            Self::Stage { component, .. } => Some(component.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_stage_is_reported() {
        let inner =
            StageError::downstream(Arc::from("serializer"), StageError::failed("disk full"));
        let outer = StageError::downstream(Arc::from("transformer"), inner);

        let err = ProcessingError::stage(Arc::from("generator"), outer);
        assert_eq!(err.component(), Some("serializer"));
        assert_eq!(err.to_string(), "stage `serializer` failed: disk full");
    }

    #[test]
    fn starter_failures_name_the_starter() {
        let err = ProcessingError::stage(Arc::from("generator"), StageError::failed("no input"));
        assert_eq!(err.component(), Some("generator"));
    }
}
