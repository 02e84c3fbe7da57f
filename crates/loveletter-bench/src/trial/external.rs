use std::process::{Command, Stdio};
use std::time::Instant;

use thiserror::Error;
use tracing::{Level, event};

use crate::config::GameConfig;
use crate::seat::Seat;

/// Something that can play one game and hand back its captured stdout.
pub trait GameLauncher {
    /// Run a game to completion. `seat` is appended as the final argument
    /// when the local player's position is fixed by the harness.
    fn launch(&mut self, seat: Option<Seat>) -> Result<Vec<u8>, LaunchError>;
}

/// Launches the packaged game as a child process, one per trial.
pub struct ExternalGame {
    game: GameConfig,
}

impl ExternalGame {
    pub fn new(game: GameConfig) -> Self {
        Self { game }
    }

    fn command(&self, seat: Option<Seat>) -> Command {
        let mut cmd = Command::new(&self.game.command);
        if !self.game.args.is_empty() {
            cmd.args(&self.game.args);
        }
        if let Some(seat) = seat {
            cmd.arg(seat.to_string());
        }
        if let Some(dir) = &self.game.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl GameLauncher for ExternalGame {
    fn launch(&mut self, seat: Option<Seat>) -> Result<Vec<u8>, LaunchError> {
        let start = Instant::now();
        let child = self
            .command(seat)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                command: self.game.command.clone(),
                source,
            })?;

        let output = child.wait_with_output().map_err(LaunchError::Wait)?;

        if !output.status.success() {
            return Err(LaunchError::Status {
                status: output.status.to_string(),
                stdout_bytes: output.stdout.len(),
            });
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if let Some(timeout) = self.game.timeout_ms
            && elapsed_ms > timeout as f64
        {
            event!(
                target: "loveletter_bench::external",
                Level::WARN,
                command = %self.game.command,
                elapsed_ms,
                timeout_ms = timeout,
                "game exceeded its time budget"
            );
        }

        Ok(output.stdout)
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn game '{command}'")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting for game to exit")]
    Wait(#[source] std::io::Error),
    #[error("game exited with {status} after writing {stdout_bytes} bytes")]
    Status { status: String, stdout_bytes: usize },
}
