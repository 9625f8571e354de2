//! Staged pipelines and their caching variants.

mod async_cache;
mod caching;
mod chain;
mod component;
mod error;
mod options;
pub(crate) mod sink;

pub use async_cache::AsyncCachePipeline;
pub use caching::CachingPipeline;
pub use component::{
    CachingComponent, Consumer, Finisher, Link, ParamValue, Parameters, PipelineComponent,
    Producer, RUN_ID, Sink, Stage, Starter,
};
pub use chain::{Lifecycle, Pipeline};
pub use error::{PipelineError, ProcessingError, SetupError, StageError};
pub use options::{
    Configuration, EXPIRES, EXPIRES_CACHE_KEY, JMX_GROUP_NAME, MAX_EXPIRES_SECS, PipelineOptions,
};
pub use sink::CachingSink;
