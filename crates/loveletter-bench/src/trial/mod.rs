mod external;
mod seats;

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsError, Tally, WinReport};
use crate::config::{BenchConfig, ResolvedOutputs};
use crate::seat::Seat;
use crate::winner::{WinnerFormat, WinnerParseError};

pub use external::{ExternalGame, GameLauncher, LaunchError};
pub use seats::SeatPicker;

/// Number of games played when no count is given.
pub const DEFAULT_TRIAL_COUNT: u64 = 1000;

/// Which statistic a batch collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Tally wins per fixed seat; the game picks its own seating.
    PerSeat,
    /// Play from a uniformly random seat each game and count own wins.
    VersusRandom,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::PerSeat => "per-seat",
            Variant::VersusRandom => "vs-random",
        })
    }
}

/// One completed game.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub index: u64,
    /// Seat handed to the game, if the harness chose one.
    pub seat: Option<Seat>,
    pub winner: Seat,
    pub elapsed: Duration,
}

impl TrialOutcome {
    pub fn won(&self) -> Option<bool> {
        self.seat.map(|seat| seat == self.winner)
    }
}

/// Drives a batch of games and accumulates their winners.
pub struct TrialRunner {
    config: BenchConfig,
    outputs: ResolvedOutputs,
    variant: Variant,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub report: WinReport,
    pub jsonl_path: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
}

impl TrialRunner {
    pub fn new(config: BenchConfig, outputs: ResolvedOutputs, variant: Variant) -> Self {
        Self {
            config,
            outputs,
            variant,
        }
    }

    /// Play `trial_count` games with the configured external executable.
    pub fn run(&self, trial_count: u64) -> Result<RunSummary, RunnerError> {
        let mut game = ExternalGame::new(self.config.game.clone());
        self.run_with(&mut game, trial_count)
    }

    /// Play `trial_count` games through `launcher`. The first failing game
    /// aborts the batch and nothing is reported for it: trial rows are
    /// staged next to the JSONL path and only moved into place on success.
    pub fn run_with<L: GameLauncher>(
        &self,
        launcher: &mut L,
        trial_count: u64,
    ) -> Result<RunSummary, RunnerError> {
        let staging = self.outputs.jsonl.as_deref().map(staging_path);

        let tally = match self.play_all(launcher, trial_count, staging.as_deref()) {
            Ok(tally) => tally,
            Err(err) => {
                if let Some(path) = staging.as_ref() {
                    let _ = fs::remove_file(path);
                }
                return Err(err);
            }
        };

        if let (Some(staged), Some(path)) = (staging.as_ref(), self.outputs.jsonl.as_ref()) {
            fs::rename(staged, path)?;
        }

        let report = tally.finalize();
        if let Some(path) = self.outputs.summary_md.as_ref() {
            report.write_markdown(path)?;
        }

        event!(
            target: "loveletter_bench::run",
            Level::INFO,
            run_id = %self.config.run_id,
            trials = report.trials,
            self_wins = report.self_wins,
            win_rate_pct = report.win_rate_pct,
            "trials complete"
        );

        Ok(RunSummary {
            report,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
        })
    }

    fn play_all<L: GameLauncher>(
        &self,
        launcher: &mut L,
        trial_count: u64,
        staging: Option<&Path>,
    ) -> Result<Tally, RunnerError> {
        let mut writer = match staging {
            Some(path) => {
                ensure_parent(path.parent())?;
                Some(BufWriter::new(File::create(path)?))
            }
            None => None,
        };

        let mut picker = SeatPicker::new(self.config.seats.seed);
        let mut tally = Tally::new(self.variant);

        event!(
            target: "loveletter_bench::run",
            Level::INFO,
            run_id = %self.config.run_id,
            variant = %self.variant,
            trials = trial_count,
            command = %self.config.game.command,
            "starting trials"
        );

        for index in 0..trial_count {
            let seat = match self.variant {
                Variant::PerSeat => None,
                Variant::VersusRandom => Some(picker.pick()),
            };
            let outcome = play_trial(launcher, &self.config.winner, index, seat)?;

            event!(
                target: "loveletter_bench::trial",
                Level::DEBUG,
                run_id = %self.config.run_id,
                trial_index = index,
                seat = outcome.seat.map(Seat::index),
                winner = outcome.winner.index(),
                elapsed_ms = outcome.elapsed.as_secs_f64() * 1000.0
            );

            if let Some(writer) = writer.as_mut() {
                write_trial_row(writer, &self.config.run_id, &outcome)?;
            }
            tally.record(&outcome);
        }

        if let Some(writer) = writer.as_mut() {
            writer.flush()?;
        }

        Ok(tally)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn play_trial<L: GameLauncher>(
    launcher: &mut L,
    format: &WinnerFormat,
    index: u64,
    seat: Option<Seat>,
) -> Result<TrialOutcome, RunnerError> {
    let start = Instant::now();
    let stdout = launcher
        .launch(seat)
        .map_err(|source| RunnerError::Launch { index, source })?;
    let winner = format
        .parse(&stdout)
        .map_err(|source| RunnerError::Parse { index, source })?;

    Ok(TrialOutcome {
        index,
        seat,
        winner,
        elapsed: start.elapsed(),
    })
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_trial_row(
    writer: &mut BufWriter<File>,
    run_id: &str,
    outcome: &TrialOutcome,
) -> Result<(), RunnerError> {
    let row = TrialLogRow {
        run_id,
        trial_index: outcome.index,
        seat: outcome.seat,
        winner: outcome.winner,
        won: outcome.won(),
        elapsed_ms: outcome.elapsed.as_secs_f64() * 1000.0,
    };
    serde_json::to_writer(&mut *writer, &row)?;
    writer.write_all(b"\n")?;
    Ok(())
}

#[derive(Serialize)]
struct TrialLogRow<'a> {
    run_id: &'a str,
    trial_index: u64,
    seat: Option<Seat>,
    winner: Seat,
    won: Option<bool>,
    elapsed_ms: f64,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("trial {index}: game launch failed")]
    Launch {
        index: u64,
        #[source]
        source: LaunchError,
    },
    #[error("trial {index}: unreadable game output")]
    Parse {
        index: u64,
        #[source]
        source: WinnerParseError,
    },
    #[error("I/O error writing trial artifacts")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize trial row")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("failed to write summary")]
    Analytics(#[from] AnalyticsError),
}
