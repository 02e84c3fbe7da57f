use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use loveletter_bench::config::{BenchConfig, ResolvedOutputs};
use loveletter_bench::logging::init_logging;
use loveletter_bench::trial::{DEFAULT_TRIAL_COUNT, TrialRunner, Variant};

/// Win-rate sampling harness for the Love Letter game executable.
#[derive(Debug, Parser)]
#[command(
    name = "loveletter-bench",
    author,
    version,
    about = "Run the Love Letter game repeatedly and tally its winners"
)]
struct Cli {
    #[command(subcommand)]
    variant: VariantCommand,
}

#[derive(Debug, Subcommand)]
enum VariantCommand {
    /// Count wins for each of the four seats.
    PerSeat(RunArgs),
    /// Play from a random seat each game and report the win rate.
    VsRandom(RunArgs),
}

impl VariantCommand {
    fn split(self) -> (Variant, RunArgs) {
        match self {
            VariantCommand::PerSeat(args) => (Variant::PerSeat, args),
            VariantCommand::VsRandom(args) => (Variant::VersusRandom, args),
        }
    }
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Number of games to play.
    #[arg(value_name = "TRIALS", default_value_t = DEFAULT_TRIAL_COUNT)]
    trials: u64,

    /// Path to an optional YAML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the seat RNG seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the game executable. Without --config the default
    /// `-jar loveletter.jar` arguments are dropped as well.
    #[arg(long, value_name = "CMD")]
    game: Option<String>,

    /// Write one JSON row per game to this file.
    #[arg(long, value_name = "FILE")]
    jsonl: Option<String>,

    /// Write a Markdown summary to this file.
    #[arg(long, value_name = "FILE")]
    summary: Option<String>,

    /// Exit after validating the configuration (no games are played).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let (variant, args) = Cli::parse().variant.split();
    let mut config = match args.config.as_ref() {
        Some(path) => BenchConfig::from_path(path)?,
        None => BenchConfig::default(),
    };
    apply_overrides(&mut config, &args);

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();

    if args.validate_only {
        println!(
            "Configuration '{run_id}' is valid ({variant}, {} games of '{}').",
            args.trials, config.game.command
        );
        return Ok(());
    }

    let logging_guard = init_logging(&config.logging, &outputs)?;
    let runner = TrialRunner::new(config, outputs, variant);
    let summary = runner.run(args.trials)?;

    for line in summary.report.console_lines() {
        println!("{line}");
    }
    if let Some(path) = summary.jsonl_path.as_ref() {
        println!("Trial log: {}", path.display());
    }
    if let Some(path) = summary.summary_path.as_ref() {
        println!("Summary table: {}", path.display());
    }
    if let Some(guard) = logging_guard.as_ref() {
        println!("Telemetry log: {}", guard.path().display());
    }

    Ok(())
}

fn apply_overrides(config: &mut BenchConfig, args: &RunArgs) {
    if let Some(run_id) = args.run_id.clone() {
        config.run_id = run_id;
    }

    if let Some(seed) = args.seed {
        config.seats.seed = Some(seed);
    }

    if let Some(game) = args.game.clone() {
        config.game.command = game;
        if args.config.is_none() {
            config.game.args.clear();
        }
    }

    if let Some(jsonl) = args.jsonl.clone() {
        config.outputs.jsonl = Some(jsonl);
    }

    if let Some(summary) = args.summary.clone() {
        config.outputs.summary_md = Some(summary);
    }
}
