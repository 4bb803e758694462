//! IBP-HMM sampler CLI
//!
//! Entry point for running Gibbs sweeps in batch:
//! - `run`: sample one trial and persist statistics
//! - `check`: validate configuration and data without sampling
//! - `checkpoints`: list (and verify) persisted statistics
//!
//! Command payloads are JSON on stdout; logs go to stderr.

use clap::{Args, Parser, Subcommand};
use ibp_core::config::{load_config, ConfigError, ConfigOptions, ResolvedConfig, ValidationError};
use ibp_core::data::ObservationSet;
use ibp_core::error::{StatsError, SweepError};
use ibp_core::exit_codes::ExitCode;
use ibp_core::log_event;
use ibp_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use ibp_core::samplers::ConjugateSamplers;
use ibp_core::sequence::{EvaluationArrays, SequenceIndex};
use ibp_core::stats::{BackgroundStore, FileStore, SnapshotStore, StatsRecorder, StatsSnapshot};
use ibp_core::sweep::{SweepOrchestrator, SweepOutcome};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Gibbs sampler for beta-process hidden Markov models
#[derive(Parser)]
#[command(name = "ibp-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true, env = "IBP_LOG_LEVEL")]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Stop between iterations once this many seconds have passed
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample one trial
    Run(RunArgs),
    /// Validate configuration and data without sampling
    Check(CheckArgs),
    /// List persisted statistics
    Checkpoints(CheckpointArgs),
}

/// Configuration and data inputs shared by `run` and `check`
#[derive(Args, Debug)]
struct InputArgs {
    /// Model priors (model.json)
    #[arg(long, env = "IBP_MODEL")]
    model: Option<PathBuf>,

    /// Sampler settings (settings.json or settings.toml)
    #[arg(long, env = "IBP_SETTINGS")]
    settings: Option<PathBuf>,

    /// Observation set (JSON)
    #[arg(long)]
    data: PathBuf,

    /// Trial number
    #[arg(long)]
    trial: Option<u32>,

    /// Number of Gibbs iterations (Niter)
    #[arg(long)]
    iterations: Option<u64>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Persist statistics every N iterations (saveMin)
    #[arg(long)]
    save_min: Option<u64>,

    /// Directory for persisted statistics (saveDir)
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads for state-sequence sampling
    #[arg(long)]
    threads: Option<usize>,

    /// Continue from the latest checkpoint of this trial
    #[arg(long)]
    resume: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[derive(Args, Debug)]
struct CheckpointArgs {
    /// Directory holding persisted statistics
    #[arg(long)]
    save_dir: PathBuf,

    /// Only this trial
    #[arg(long)]
    trial: Option<u32>,

    /// Load each checkpoint and check its schema version and digest
    #[arg(long)]
    verify: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id(), get_host_id());
    let exit_code = match &cli.command {
        Commands::Run(args) => run_sampler(&cli.global, &ctx, args),
        Commands::Check(args) => run_check(&ctx, args),
        Commands::Checkpoints(args) => run_checkpoints(args),
    };

    std::process::exit(exit_code.as_i32());
}

fn config_options(input: &InputArgs) -> ConfigOptions {
    ConfigOptions {
        model_path: input.model.clone(),
        settings_path: input.settings.clone(),
        trial: input.trial,
        n_iter: input.iterations,
        ..ConfigOptions::default()
    }
}

/// Load config and data, logging provenance.
fn load_inputs(
    ctx: &LogContext,
    options: &ConfigOptions,
    data_path: &Path,
) -> Result<(ResolvedConfig, ObservationSet), ExitCode> {
    let resolved = load_config(options).map_err(|e| report_config_error(ctx, &e))?;
    log_event!(
        ctx,
        INFO,
        event_names::CONFIG_LOADED,
        Stage::Init,
        "Configuration loaded",
        model_source = tracing::field::display(&resolved.model_source),
        settings_source = tracing::field::display(&resolved.settings_source),
        obs_model = resolved.run.model.obs_model.name()
    );
    if resolved.model_path.is_none() {
        log_event!(
            ctx,
            WARN,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "No model file found; using built-in priors"
        );
    }

    let data = ObservationSet::from_file(data_path).map_err(|e| {
        eprintln!("ibp-core: failed to load data: {}", e);
        ExitCode::DataError
    })?;
    log_event!(
        ctx,
        INFO,
        event_names::DATA_LOADED,
        Stage::Init,
        "Observation set loaded",
        num_objects = data.len()
    );
    Ok((resolved, data))
}

fn run_sampler(global: &GlobalOpts, ctx: &LogContext, args: &RunArgs) -> ExitCode {
    let options = ConfigOptions {
        save_min: args.save_min,
        save_dir: args.save_dir.clone(),
        seed: args.seed,
        num_threads: args.threads,
        ..config_options(&args.input)
    };
    let (resolved, data) = match load_inputs(ctx, &options, &args.input.data) {
        Ok(inputs) => inputs,
        Err(code) => return code,
    };
    let run = Arc::new(resolved.run);
    let ctx = ctx.clone().with_trial(run.settings.trial);
    let save_dir = run.save_dir();

    let samplers = match ConjugateSamplers::new(&run.model) {
        Ok(s) => s,
        Err(e) => return report_config_error(&ctx, &e),
    };

    let file_store = FileStore::new(&save_dir, &ctx.run_id, &ctx.host_id);
    let store: Box<dyn SnapshotStore> = if run.settings.background_persist {
        match BackgroundStore::spawn(file_store) {
            Ok(s) => Box::new(s),
            Err(e) => {
                eprintln!("ibp-core: {}", e);
                return ExitCode::IoError;
            }
        }
    } else {
        Box::new(file_store)
    };
    let recorder = StatsRecorder::new(&run.settings, store);

    log_event!(
        ctx,
        INFO,
        event_names::RUN_STARTED,
        Stage::Init,
        "Starting sampler",
        n_iter = run.settings.n_iter,
        save_min = run.settings.save_min,
        save_dir = tracing::field::display(save_dir.display())
    );

    let mut orchestrator =
        match SweepOrchestrator::new(Arc::clone(&run), Arc::new(data), samplers, recorder) {
            Ok(o) => o.with_log_context(ctx.clone()),
            Err(e) => return report_sweep_error(&ctx, &e),
        };
    if let Some(secs) = global.timeout {
        orchestrator = orchestrator.with_deadline(Instant::now() + Duration::from_secs(secs));
    }

    if args.resume {
        match latest_checkpoint(&save_dir, run.settings.trial) {
            Ok(Some(snapshot)) => {
                if let Err(e) = orchestrator.restore(&snapshot) {
                    return report_sweep_error(&ctx, &e);
                }
            }
            Ok(None) => log_event!(
                ctx,
                INFO,
                event_names::SWEEP_RESTORED,
                Stage::Init,
                "No checkpoint to resume from; starting fresh"
            ),
            Err(e) => return report_stats_error(&e),
        }
    }

    let outcome = match orchestrator.run() {
        Ok(outcome) => outcome,
        Err(e) => return report_sweep_error(&ctx, &e),
    };

    let (status, completed, code) = match outcome {
        SweepOutcome::Completed { iterations } => ("completed", iterations, ExitCode::Clean),
        SweepOutcome::Cancelled { iteration } => ("cancelled", iteration, ExitCode::Interrupted),
    };
    let eval = orchestrator.evaluation_arrays().ok();
    let payload = json!({
        "run_id": ctx.run_id,
        "trial": run.settings.trial,
        "status": status,
        "iterations": completed,
        "saved_iterations": orchestrator.recorder().saved_iterations(),
        "save_dir": save_dir,
        "total_len": orchestrator.index().total_len(),
        "z_tot": eval.and_then(|e| e.z_tot),
    });
    print_json(&payload);

    log_event!(
        ctx,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Report,
        "Sampler finished",
        status = status,
        iterations = completed
    );
    code
}

fn latest_checkpoint(dir: &Path, trial: u32) -> Result<Option<StatsSnapshot>, StatsError> {
    Ok(FileStore::latest(dir, trial)?.map(|envelope| envelope.payload))
}

fn run_check(ctx: &LogContext, args: &CheckArgs) -> ExitCode {
    let options = config_options(&args.input);
    let (resolved, data) = match load_inputs(ctx, &options, &args.input.data) {
        Ok(inputs) => inputs,
        Err(code) => return code,
    };
    if let Err(e) = ConjugateSamplers::new(&resolved.run.model) {
        return report_config_error(ctx, &e);
    }
    if let Err(e) = data.check_model(&resolved.run.model.obs_model) {
        eprintln!("ibp-core: {}", e);
        return ExitCode::DataError;
    }
    let index = SequenceIndex::from_observations(&data);
    let eval = match EvaluationArrays::build(&data, &index, None) {
        Ok(eval) => eval,
        Err(e) => {
            eprintln!("ibp-core: {}", e);
            return ExitCode::DataError;
        }
    };

    print_json(&json!({
        "valid": true,
        "config": resolved.snapshot(),
        "trial": resolved.run.settings.trial,
        "n_iter": resolved.run.settings.n_iter,
        "num_objects": index.num_objects(),
        "lengths": index.lengths(),
        "total_len": index.total_len(),
        "has_true_labels": eval.true_labels_tot.is_some(),
    }));
    ExitCode::Clean
}

fn run_checkpoints(args: &CheckpointArgs) -> ExitCode {
    let entries = match FileStore::list(&args.save_dir, args.trial) {
        Ok(entries) => entries,
        Err(e) => return report_stats_error(&e),
    };

    let mut listed = Vec::with_capacity(entries.len());
    for entry in &entries {
        if args.verify {
            if let Err(e) = FileStore::load::<StatsSnapshot>(&entry.path) {
                return report_stats_error(&e);
            }
        }
        listed.push(json!({
            "trial": entry.trial,
            "iteration": entry.iteration,
            "path": entry.path,
        }));
    }
    print_json(&json!({
        "save_dir": args.save_dir,
        "verified": args.verify,
        "checkpoints": listed,
    }));
    ExitCode::Clean
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("ibp-core: failed to encode output: {}", e),
    }
}

fn report_config_error(ctx: &LogContext, error: &ConfigError) -> ExitCode {
    log_event!(
        ctx,
        ERROR,
        event_names::CONFIG_ERROR,
        Stage::Init,
        "Configuration error",
        error = tracing::field::display(error)
    );
    eprintln!("ibp-core: {}", error);
    match error {
        ConfigError::Validation(ValidationError::VersionMismatch { .. }) => ExitCode::VersionError,
        _ => ExitCode::ConfigError,
    }
}

fn report_sweep_error(ctx: &LogContext, error: &SweepError) -> ExitCode {
    if let SweepError::Config(e) = error {
        return report_config_error(ctx, e);
    }
    eprintln!("ibp-core: {}", error);
    error.exit_code()
}

fn report_stats_error(error: &StatsError) -> ExitCode {
    eprintln!("ibp-core: {}", error);
    match error {
        StatsError::Integrity { .. } | StatsError::SchemaVersion { .. } => ExitCode::VersionError,
        _ => ExitCode::IoError,
    }
}
