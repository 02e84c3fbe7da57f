use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

use crate::winner::WinnerFormat;

const DEFAULT_RUN_ID: &str = "loveletter";
const DEFAULT_GAME_COMMAND: &str = "java";
const DEFAULT_TELEMETRY: &str = "bench/out/{run_id}/telemetry.jsonl";
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root harness configuration, loaded from YAML or built from defaults.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BenchConfig {
    #[serde(default = "default_run_id")]
    pub run_id: String,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub winner: WinnerFormat,
    #[serde(default)]
    pub seats: SeatConfig,
    #[serde(default)]
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            run_id: default_run_id(),
            game: GameConfig::default(),
            winner: WinnerFormat::default(),
            seats: SeatConfig::default(),
            outputs: OutputsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: BenchConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.game.validate()?;
        validate_winner(&self.winner)?;
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: self
                .outputs
                .jsonl
                .as_deref()
                .map(|t| resolve_template(&self.run_id, t)),
            summary_md: self
                .outputs
                .summary_md
                .as_deref()
                .map(|t| resolve_template(&self.run_id, t)),
            telemetry: resolve_template(&self.run_id, &self.outputs.telemetry),
        }
    }
}

fn default_run_id() -> String {
    DEFAULT_RUN_ID.to_string()
}

/// How to launch the external game executable.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GameConfig {
    #[serde(default = "default_game_command")]
    pub command: String,
    #[serde(default = "default_game_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Soft budget per game; overruns are logged, never killed.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            command: default_game_command(),
            args: default_game_args(),
            working_dir: None,
            timeout_ms: None,
        }
    }
}

impl GameConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.command.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "game.command".to_string(),
                message: "command must not be empty".to_string(),
            });
        }

        if self.timeout_ms == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "game.timeout_ms".to_string(),
                message: "timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

fn default_game_command() -> String {
    DEFAULT_GAME_COMMAND.to_string()
}

fn default_game_args() -> Vec<String> {
    vec!["-jar".to_string(), "loveletter.jar".to_string()]
}

/// Seat selection for the randomized variant.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SeatConfig {
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Output artifact configuration. Unset paths are not written.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    #[serde(default)]
    pub jsonl: Option<String>,
    #[serde(default)]
    pub summary_md: Option<String>,
    #[serde(default = "default_telemetry")]
    pub telemetry: String,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            jsonl: None,
            summary_md: None,
            telemetry: default_telemetry(),
        }
    }
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        let telemetry = Some(&self.telemetry);
        for (label, value) in [
            ("outputs.jsonl", self.jsonl.as_ref()),
            ("outputs.summary_md", self.summary_md.as_ref()),
            ("outputs.telemetry", telemetry),
        ] {
            let Some(value) = value else {
                continue;
            };

            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn default_telemetry() -> String {
    DEFAULT_TELEMETRY.to_string()
}

/// Logging configuration; structured JSON telemetry is off by default.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn validate_winner(winner: &WinnerFormat) -> Result<(), ValidationError> {
    if winner.line_from_end == 0 {
        return Err(ValidationError::InvalidField {
            field: "winner.line_from_end".to_string(),
            message: "line offset counts from 1 (the last line)".to_string(),
        });
    }
    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: Option<PathBuf>,
    pub summary_md: Option<PathBuf>,
    pub telemetry: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_YAML: &str = r#"
run_id: "tim_vs_random"
game:
  command: "/usr/bin/java"
  args: ["-jar", "build/loveletter.jar"]
  timeout_ms: 5000
winner:
  line_from_end: 7
  column: 9
seats:
  seed: 99
outputs:
  jsonl: "bench/out/{run_id}/trials.jsonl"
  summary_md: "bench/out/{run_id}/summary.md"
logging:
  enable_structured: true
  tracing_level: "debug"
"#;

    #[test]
    fn loads_and_validates_basic_config() {
        let mut cfg: BenchConfig = serde_yaml::from_str(BASIC_YAML).expect("parse yaml");
        cfg.validate().expect("validate");

        assert_eq!(cfg.game.command, "/usr/bin/java");
        assert_eq!(cfg.game.timeout_ms, Some(5000));
        assert_eq!(cfg.seats.seed, Some(99));
        assert!(cfg.logging.enable_structured);
        assert_eq!(cfg.logging.level(), Some(Level::DEBUG));

        let outputs = cfg.resolved_outputs();
        assert_eq!(
            outputs.jsonl,
            Some(PathBuf::from("bench/out/tim_vs_random/trials.jsonl"))
        );
        assert_eq!(
            outputs.telemetry,
            PathBuf::from("bench/out/tim_vs_random/telemetry.jsonl")
        );
    }

    #[test]
    fn empty_document_uses_legacy_defaults() {
        let mut cfg: BenchConfig = serde_yaml::from_str("{}").expect("parse");
        cfg.validate().expect("defaults validate");

        assert_eq!(cfg, BenchConfig::default());
        assert_eq!(cfg.game.command, "java");
        assert_eq!(cfg.game.args, vec!["-jar", "loveletter.jar"]);
        assert_eq!(cfg.winner, WinnerFormat::default());
        assert!(cfg.resolved_outputs().jsonl.is_none());
    }

    #[test]
    fn rejects_empty_command() {
        let yaml = BASIC_YAML.replace("\"/usr/bin/java\"", "\"  \"");
        let mut cfg: BenchConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("should fail");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "game.command"
        ));
    }

    #[test]
    fn rejects_zero_line_offset() {
        let yaml = BASIC_YAML.replace("line_from_end: 7", "line_from_end: 0");
        let mut cfg: BenchConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("zero offset");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "winner.line_from_end"
        ));
    }

    #[test]
    fn rejects_invalid_run_id() {
        let yaml = BASIC_YAML.replace("tim_vs_random", "tim vs random");
        let mut cfg: BenchConfig = serde_yaml::from_str(&yaml).expect("parse");
        let err = cfg.validate().expect_err("invalid run id");
        assert!(matches!(
            err,
            ValidationError::InvalidField { field, .. } if field == "run_id"
        ));
    }

    #[test]
    fn blank_tracing_level_falls_back_to_info() {
        let yaml = BASIC_YAML.replace("\"debug\"", "\"\"");
        let mut cfg: BenchConfig = serde_yaml::from_str(&yaml).expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.logging.level(), Some(Level::INFO));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = BenchConfig::from_path("does/not/exist.yaml").expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(err.path(), Path::new("does/not/exist.yaml"));
        assert_eq!(
            err.to_string(),
            "failed to read config \"does/not/exist.yaml\""
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
