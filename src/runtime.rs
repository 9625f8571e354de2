//! Composition root.
//!
//! Owns every shared cache instance and assembles text pipelines over them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::caching::{
    Cache, CacheConfig, CacheRefreshManager, KeyCache, MemoryCache, ResourceCache,
};
use crate::config::{RunArgs, Settings};
use crate::error::AppError;
use crate::pipeline::{AsyncCachePipeline, CachingPipeline, PipelineOptions, SetupError};
use crate::stages::{
    CompiledTemplate, FileGenerator, IncludeTransformer, ReplaceTransformer, TemplateTransformer,
    TextEvent, TextSerializer,
};

/// Stages of a text pipeline, in the order they are chained.
#[derive(Debug, Clone, Default)]
pub struct TextPipelinePlan {
    pub input: PathBuf,
    pub include_base: Option<PathBuf>,
    pub replacements: Vec<(String, String)>,
    pub template: Option<PathBuf>,
}

impl TextPipelinePlan {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }
}

impl From<&RunArgs> for TextPipelinePlan {
    fn from(args: &RunArgs) -> Self {
        Self {
            input: args.input.clone(),
            include_base: args.include_base.clone(),
            replacements: args.replacements.clone(),
            template: args.template.clone(),
        }
    }
}

pub struct Runtime {
    cache: Arc<MemoryCache>,
    keys: Arc<KeyCache>,
    resources: Arc<ResourceCache<Arc<CompiledTemplate>>>,
    refresher: Arc<CacheRefreshManager>,
    options: PipelineOptions,
}

impl Runtime {
    pub fn new(config: &CacheConfig, options: PipelineOptions) -> Result<Self, AppError> {
        let policy = config.eviction_policy();
        let refresher = CacheRefreshManager::new(config.refresh_threads_non_zero())?;
        info!(
            ?policy,
            resource_capacity = config.resource_capacity,
            refresh_threads = config.refresh_threads,
            "Cache runtime ready"
        );

        Ok(Self {
            cache: Arc::new(MemoryCache::new(policy)),
            keys: Arc::new(KeyCache::new(policy)),
            resources: Arc::new(ResourceCache::new(config.resource_capacity_non_zero())),
            refresher: Arc::new(refresher),
            options,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        Self::new(&CacheConfig::from(settings), settings.pipeline.clone())
    }

    pub fn cache(&self) -> &Arc<MemoryCache> {
        &self.cache
    }

    pub fn keys(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    pub fn resources(&self) -> &Arc<ResourceCache<Arc<CompiledTemplate>>> {
        &self.resources
    }

    pub fn refresher(&self) -> &Arc<CacheRefreshManager> {
        &self.refresher
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Assemble, but do not set up, a caching pipeline for `plan`.
    pub fn text_pipeline(
        &self,
        plan: &TextPipelinePlan,
    ) -> Result<CachingPipeline<TextEvent>, SetupError> {
        let cache: Arc<dyn Cache> = self.cache.clone();
        let mut pipeline = CachingPipeline::new(cache);
        pipeline.set_options(self.options.clone());

        pipeline.add_component(FileGenerator::new(&plan.input))?;
        if let Some(base) = &plan.include_base {
            let identity = format!("include:{}", plan.input.display());
            pipeline.add_component(IncludeTransformer::new(
                identity,
                base,
                Arc::clone(&self.keys),
            ))?;
        }
        for (from, to) in &plan.replacements {
            pipeline.add_component(ReplaceTransformer::new(from, to))?;
        }
        if let Some(template) = &plan.template {
            pipeline.add_component(TemplateTransformer::new(
                template,
                Arc::clone(&self.resources),
            ))?;
        }
        pipeline.add_component(TextSerializer::new())?;

        debug!(
            input = %plan.input.display(),
            stages = pipeline.pipeline.len(),
            "Assembled text pipeline"
        );
        Ok(pipeline)
    }

    /// Wrap `pipeline` for stale-while-revalidate serving on this runtime's refresh pool.
    pub fn serve_stale(
        &self,
        pipeline: CachingPipeline<TextEvent>,
    ) -> AsyncCachePipeline<TextEvent> {
        AsyncCachePipeline::new(pipeline, Arc::clone(&self.refresher))
    }

    /// Stop the refresh pool, waiting up to `timeout` for running refreshes.
    pub fn shutdown(&self, timeout: Duration) {
        self.refresher.shutdown(timeout);
    }
}
