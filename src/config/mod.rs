//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{num::NonZeroUsize, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::caching::{DEFAULT_REFRESH_THREADS, DEFAULT_RESOURCE_CAPACITY};
use crate::pipeline::PipelineOptions;

pub use cli::{CliArgs, Command, RunArgs, RunOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "cachepipe";
const ENV_PREFIX: &str = "CACHEPIPE";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub refresh: RefreshSettings,
    pub resources: ResourceSettings,
    pub pipeline: PipelineOptions,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Maximum stored results; `0` keeps every entry.
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub threads: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct ResourceSettings {
    pub capacity: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_run_overrides(&cli.command.args().overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    refresh: RawRefreshSettings,
    resources: RawResourceSettings,
    pipeline: PipelineOptions,
}

impl RawSettings {
    fn apply_run_overrides(&mut self, overrides: &RunOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(threads) = overrides.refresh_threads {
            self.refresh.threads = Some(threads);
        }
        if let Some(capacity) = overrides.resources_capacity {
            self.resources.capacity = Some(capacity);
        }
        if let Some(expires) = overrides.expires {
            self.pipeline.expires = Some(expires);
        }
        if let Some(seed) = overrides.expires_cache_key.as_ref() {
            self.pipeline.expires_cache_key = Some(seed.clone());
        }
        if let Some(group) = overrides.group.as_ref() {
            self.pipeline.jmx_group_name = Some(group.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            refresh,
            resources,
            pipeline,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let cache = CacheSettings {
            capacity: cache.capacity.unwrap_or(0),
        };
        let refresh = RefreshSettings {
            threads: non_zero(
                refresh.threads.unwrap_or(DEFAULT_REFRESH_THREADS.get()),
                "refresh.threads",
            )?,
        };
        let resources = ResourceSettings {
            capacity: non_zero(
                resources
                    .capacity
                    .unwrap_or(DEFAULT_RESOURCE_CAPACITY.get()),
                "resources.capacity",
            )?,
        };
        let pipeline = build_pipeline_options(pipeline)?;

        Ok(Self {
            logging,
            cache,
            refresh,
            resources,
            pipeline,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_pipeline_options(options: PipelineOptions) -> Result<PipelineOptions, LoadError> {
    options
        .normalized()
        .map_err(|err| LoadError::invalid("pipeline.expires", err.to_string()))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRefreshSettings {
    threads: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawResourceSettings {
    capacity: Option<usize>,
}

fn non_zero(value: usize, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
