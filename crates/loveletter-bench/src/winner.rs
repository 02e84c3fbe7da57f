use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::seat::Seat;

const DEFAULT_LINE_FROM_END: usize = 7;
const DEFAULT_COLUMN: usize = 9;

/// Location of the winning seat digit inside the game log.
///
/// The game prints a free-form log and closes with a summary block. The
/// winner line is counted from the end of the output split on `\n` (a
/// trailing newline therefore contributes an empty final line), and the
/// column is a zero-based character offset within that line.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct WinnerFormat {
    #[serde(default = "default_line_from_end")]
    pub line_from_end: usize,
    #[serde(default = "default_column")]
    pub column: usize,
}

impl Default for WinnerFormat {
    fn default() -> Self {
        Self {
            line_from_end: DEFAULT_LINE_FROM_END,
            column: DEFAULT_COLUMN,
        }
    }
}

fn default_line_from_end() -> usize {
    DEFAULT_LINE_FROM_END
}

fn default_column() -> usize {
    DEFAULT_COLUMN
}

impl WinnerFormat {
    /// Extract the winning seat from raw captured stdout.
    pub fn parse(&self, output: &[u8]) -> Result<Seat, WinnerParseError> {
        let text = String::from_utf8_lossy(output);
        self.parse_text(&text)
    }

    pub fn parse_text(&self, text: &str) -> Result<Seat, WinnerParseError> {
        let line = self.winner_line(text)?;

        let found = line
            .chars()
            .nth(self.column)
            .ok_or_else(|| WinnerParseError::MissingColumn {
                column: self.column,
                line: line.to_string(),
            })?;

        let digit = found
            .to_digit(10)
            .ok_or_else(|| WinnerParseError::NotADigit {
                found,
                line: line.to_string(),
            })?;

        Seat::from_index(digit as usize).ok_or(WinnerParseError::SeatOutOfRange { digit })
    }

    fn winner_line<'a>(&self, text: &'a str) -> Result<&'a str, WinnerParseError> {
        let lines: Vec<&str> = text.split('\n').collect();
        if self.line_from_end == 0 || lines.len() < self.line_from_end {
            return Err(WinnerParseError::TooFewLines {
                found: lines.len(),
                required: self.line_from_end,
            });
        }
        Ok(lines[lines.len() - self.line_from_end])
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WinnerParseError {
    #[error("game output has {found} lines but the winner line is {required} from the end")]
    TooFewLines { found: usize, required: usize },
    #[error("winner line {line:?} has no character at column {column}")]
    MissingColumn { column: usize, line: String },
    #[error("expected a seat digit but found {found:?} in winner line {line:?}")]
    NotADigit { found: char, line: String },
    #[error("winner digit {digit} is not a seat (expected 0-3)")]
    SeatOutOfRange { digit: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_log(winner_line: &str) -> String {
        format!(
            "Round 1 begins\nPlayer 0 draws\n{winner_line}\nscores:\n  p0 1\n  p1 0\n  p2 4\n  p3 2\n"
        )
    }

    #[test]
    fn reads_digit_at_column_nine_of_seventh_line_from_end() {
        let fmt = WinnerFormat::default();
        let seat = fmt.parse(game_log("Winner = 2 extra text").as_bytes()).unwrap();
        assert_eq!(seat.index(), 2);
    }

    #[test]
    fn same_bytes_parse_to_same_seat() {
        let fmt = WinnerFormat::default();
        let log = game_log("Winner = 1, by tokens");
        let first = fmt.parse(log.as_bytes());
        let second = fmt.parse(log.as_bytes());
        assert_eq!(first, second);
        assert_eq!(first.unwrap().index(), 1);
    }

    #[test]
    fn exactly_seven_lines_selects_first_line() {
        let fmt = WinnerFormat::default();
        let text = "Winner = 3\na\nb\nc\nd\ne\nf";
        assert_eq!(text.split('\n').count(), 7);
        assert_eq!(fmt.parse_text(text).unwrap().index(), 3);
    }

    #[test]
    fn fewer_than_seven_lines_fails() {
        let fmt = WinnerFormat::default();
        let err = fmt.parse_text("a\nb\nc\nd\ne\nf").unwrap_err();
        assert_eq!(
            err,
            WinnerParseError::TooFewLines {
                found: 6,
                required: 7
            }
        );
    }

    #[test]
    fn empty_output_fails() {
        let err = WinnerFormat::default().parse(b"").unwrap_err();
        assert!(matches!(err, WinnerParseError::TooFewLines { found: 1, .. }));
    }

    #[test]
    fn short_winner_line_reports_missing_column() {
        let err = WinnerFormat::default()
            .parse_text(&game_log("Winner"))
            .unwrap_err();
        assert!(matches!(err, WinnerParseError::MissingColumn { column: 9, .. }));
    }

    #[test]
    fn non_digit_is_rejected() {
        let err = WinnerFormat::default()
            .parse_text(&game_log("Winner is: 2 extra text"))
            .unwrap_err();
        assert!(matches!(err, WinnerParseError::NotADigit { found: ':', .. }));
    }

    #[test]
    fn digit_outside_table_is_rejected() {
        let err = WinnerFormat::default()
            .parse_text(&game_log("Winner = 7"))
            .unwrap_err();
        assert_eq!(err, WinnerParseError::SeatOutOfRange { digit: 7 });
    }

    #[test]
    fn carriage_returns_do_not_shift_the_column() {
        let log = game_log("Winner = 0").replace('\n', "\r\n");
        assert_eq!(WinnerFormat::default().parse_text(&log).unwrap().index(), 0);
    }

    #[test]
    fn custom_layout_is_honoured() {
        let fmt = WinnerFormat {
            line_from_end: 1,
            column: 7,
        };
        assert_eq!(fmt.parse_text("log\nPlayer 1 wins").unwrap().index(), 1);
    }
}
