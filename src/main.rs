use std::{
    io::{self, Write},
    process, thread,
    time::{Duration, Instant},
};

use cachepipe::{
    caching::Cache,
    config::{self, Command, RunArgs},
    error::AppError,
    pipeline::Parameters,
    runtime::{Runtime, TextPipelinePlan},
    telemetry,
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let runtime = Runtime::from_settings(&settings)?;
    let result = match &cli_args.command {
        Command::Run(args) => run_pipeline(&runtime, args),
        Command::Key(args) => print_key(&runtime, args),
    };

    runtime.shutdown(SHUTDOWN_GRACE);
    result
}

fn run_parameters(args: &RunArgs) -> Parameters {
    let mut parameters = Parameters::for_run();
    for (name, value) in &args.params {
        parameters.insert_text(name, value);
    }
    parameters
}

fn run_pipeline(runtime: &Runtime, args: &RunArgs) -> Result<(), AppError> {
    let plan = TextPipelinePlan::from(args);
    let mut pipeline = runtime.text_pipeline(&plan)?;
    let mut parameters = run_parameters(args);
    pipeline.setup(Box::new(io::stdout()), &mut parameters)?;

    info!(
        input = %plan.input.display(),
        content_type = pipeline.content_type().as_deref().unwrap_or("unknown"),
        cacheable = pipeline.cache_key().is_some(),
        stale_while_revalidate = args.stale_while_revalidate,
        "Pipeline ready"
    );

    let interval = Duration::from_millis(args.interval_ms);
    if args.stale_while_revalidate {
        let pipeline = runtime.serve_stale(pipeline);
        for run in 1..=args.repeat {
            pause_before(run, interval);
            let started = Instant::now();
            pipeline.execute()?;
            report_run(runtime, run, started);
        }
        if !runtime.refresher().wait_idle(SHUTDOWN_GRACE) {
            info!(
                pending = runtime.refresher().pending_count(),
                "Refreshes still running at exit"
            );
        }
    } else {
        for run in 1..=args.repeat {
            pause_before(run, interval);
            let started = Instant::now();
            pipeline.execute()?;
            report_run(runtime, run, started);
        }
    }

    Ok(())
}

fn pause_before(run: u32, interval: Duration) {
    if run > 1 && !interval.is_zero() {
        thread::sleep(interval);
    }
}

fn report_run(runtime: &Runtime, run: u32, started: Instant) {
    info!(
        run,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        cached_entries = runtime.cache().len(),
        "Run complete"
    );
}

fn print_key(runtime: &Runtime, args: &RunArgs) -> Result<(), AppError> {
    let plan = TextPipelinePlan::from(args);
    let mut pipeline = runtime.text_pipeline(&plan)?;
    let mut parameters = run_parameters(args);
    pipeline.setup(Box::new(io::sink()), &mut parameters)?;

    let mut stdout = io::stdout().lock();
    match pipeline.cache_key() {
        Some(key) => {
            writeln!(stdout, "{key}")?;
            writeln!(stdout, "last-modified: {}", pipeline.last_modified())?;
        }
        None => writeln!(stdout, "not cacheable")?,
    }
    Ok(())
}
