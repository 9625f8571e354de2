//! Result caching for staged processing pipelines.
//!
//! A [`pipeline::Pipeline`] chains components from a starter to a finisher.
//! [`pipeline::CachingPipeline`] memoizes its output under a key composed from
//! every stage, and [`pipeline::AsyncCachePipeline`] serves stale output while
//! a background refresh recomputes it.

pub mod caching;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod runtime;
pub mod stages;
pub mod telemetry;
pub mod util;
