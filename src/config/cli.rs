use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the cachepipe binary.
#[derive(Debug, Parser)]
#[command(
    name = "cachepipe",
    version,
    about = "Run text pipelines with result caching"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CACHEPIPE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Execute a text pipeline over a file, one or more times.
    Run(Box<RunArgs>),
    /// Print the cache key a run would use, without executing the pipeline.
    Key(Box<RunArgs>),
}

impl Command {
    pub fn args(&self) -> &RunArgs {
        match self {
            Self::Run(args) | Self::Key(args) => args,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub overrides: RunOverrides,

    /// Source file fed into the pipeline.
    #[arg(value_name = "INPUT", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Replace a literal pattern in every line; may be repeated.
    #[arg(long = "replace", value_name = "FROM=TO", value_parser = parse_pair)]
    pub replacements: Vec<(String, String)>,

    /// Expand `@include <path>` lines relative to this directory.
    #[arg(long = "include-base", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub include_base: Option<PathBuf>,

    /// Wrap the document in a template containing a `{{content}}` line.
    #[arg(long = "template", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub template: Option<PathBuf>,

    /// Run parameter visible to every stage; may be repeated.
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_pair)]
    pub params: Vec<(String, String)>,

    /// Number of times to execute the pipeline.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,

    /// Serve stale output and refresh it in the background.
    #[arg(long = "async", action = clap::ArgAction::SetTrue)]
    pub stale_while_revalidate: bool,

    /// Pause between repeated runs, in milliseconds.
    #[arg(long = "interval-ms", value_name = "MILLIS", default_value_t = 0)]
    pub interval_ms: u64,
}

/// Settings overrides accepted on the command line; they beat every file and
/// environment source.
#[derive(Debug, Args, Default, Clone)]
pub struct RunOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the result cache capacity (0 keeps every entry).
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<usize>,

    /// Override the number of concurrent refresh jobs.
    #[arg(long = "refresh-threads", value_name = "COUNT")]
    pub refresh_threads: Option<usize>,

    /// Override the compiled resource cache capacity.
    #[arg(long = "resources-capacity", value_name = "COUNT")]
    pub resources_capacity: Option<usize>,

    /// Cache output for this many seconds.
    #[arg(long = "expires", value_name = "SECONDS")]
    pub expires: Option<u64>,

    /// Key seed used when some stage cannot be cached.
    #[arg(long = "expires-cache-key", value_name = "SEED")]
    pub expires_cache_key: Option<String>,

    /// Group label stored with cached output.
    #[arg(long = "group", value_name = "NAME")]
    pub group: Option<String>,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected NAME=VALUE, got `{raw}`")),
    }
}
