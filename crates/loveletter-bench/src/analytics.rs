use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use statrs::distribution::{Binomial, ChiSquared, ContinuousCDF, DiscreteCDF, Normal};
use thiserror::Error;

use crate::seat::{SEAT_COUNT, Seat};
use crate::trial::{TrialOutcome, Variant};

/// Probability that any one seat wins if all four play equally well.
pub const CHANCE_WIN_RATE: f64 = 1.0 / SEAT_COUNT as f64;
const CONFIDENCE_LEVEL: f64 = 0.95;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("{context}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Running win counts for one batch of trials.
///
/// Every trial credits the winning seat. When the harness chose the local
/// seat for the trial, a win at that seat also counts as a self-win.
#[derive(Debug, Clone)]
pub struct Tally {
    variant: Variant,
    trials: u64,
    seat_wins: [u64; SEAT_COUNT],
    self_wins: u64,
}

impl Tally {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            trials: 0,
            seat_wins: [0; SEAT_COUNT],
            self_wins: 0,
        }
    }

    pub fn record(&mut self, outcome: &TrialOutcome) {
        self.trials += 1;
        self.seat_wins[outcome.winner.index()] += 1;
        if outcome.won() == Some(true) {
            self.self_wins += 1;
        }
    }

    pub fn finalize(self) -> WinReport {
        let (self_wins, win_rate_pct, ci95_pct, p_value_vs_chance) = match self.variant {
            Variant::PerSeat => (None, None, None, None),
            Variant::VersusRandom => (
                Some(self.self_wins),
                win_rate_pct(self.self_wins, self.trials),
                wald_interval_pct(self.self_wins, self.trials),
                binomial_p_value(self.self_wins, self.trials, CHANCE_WIN_RATE),
            ),
        };

        WinReport {
            variant: self.variant,
            trials: self.trials,
            seat_wins: self.seat_wins,
            self_wins,
            win_rate_pct,
            ci95_pct,
            p_value_vs_chance,
            uniformity_p_value: uniformity_p_value(&self.seat_wins),
        }
    }
}

/// Final statistics for a batch, ready for printing or writing to disk.
#[derive(Debug, Clone)]
pub struct WinReport {
    pub variant: Variant,
    pub trials: u64,
    pub seat_wins: [u64; SEAT_COUNT],
    pub self_wins: Option<u64>,
    /// `None` when no trials ran.
    pub win_rate_pct: Option<f64>,
    pub ci95_pct: Option<(f64, f64)>,
    pub p_value_vs_chance: Option<f64>,
    pub uniformity_p_value: Option<f64>,
}

impl WinReport {
    /// Console summary lines.
    pub fn console_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match self.variant {
            Variant::PerSeat => {
                for seat in Seat::ALL {
                    lines.push(format!(
                        "Result: Player {seat} won {} times.",
                        self.seat_wins[seat.index()]
                    ));
                }
                if let Some(p) = self.uniformity_p_value {
                    lines.push(format!("Seat uniformity (chi-square): p = {p:.4}"));
                }
            }
            Variant::VersusRandom => {
                let wins = self.self_wins.unwrap_or(0);
                lines.push(format!("Won {wins} of {} games.", self.trials));
                match self.win_rate_pct {
                    Some(rate) => lines.push(format!(
                        "Win rate: {rate:.1}%. Random chance is {:.1}%.",
                        CHANCE_WIN_RATE * 100.0
                    )),
                    None => lines.push(format!(
                        "Win rate: n/a (no games played). Random chance is {:.1}%.",
                        CHANCE_WIN_RATE * 100.0
                    )),
                }
                if let Some((low, high)) = self.ci95_pct {
                    lines.push(format!("95% CI: [{low:.1}%, {high:.1}%]"));
                }
                if let Some(p) = self.p_value_vs_chance {
                    lines.push(format!("Binomial test vs chance: p = {p:.4}"));
                }
            }
        }
        lines
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        let mut doc = String::new();
        doc.push_str("# Love Letter Trial Summary\n\n");
        let _ = writeln!(doc, "Variant: `{}`, trials: {}\n", self.variant, self.trials);
        doc.push_str("| Seat | Wins | Share |\n");
        doc.push_str("|------|------|-------|\n");
        for seat in Seat::ALL {
            let wins = self.seat_wins[seat.index()];
            let share = win_rate_pct(wins, self.trials)
                .map(|v| format!("{v:.1}%"))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(doc, "| {seat} | {wins} | {share} |");
        }

        if let Some(p) = self.uniformity_p_value {
            let _ = writeln!(doc, "\nChi-square uniformity p-value: {p:.4}");
        }

        if let Some(wins) = self.self_wins {
            doc.push_str("\n## Random seat\n\n");
            let _ = writeln!(doc, "- Self wins: {wins}");
            match self.win_rate_pct {
                Some(rate) => {
                    let _ = writeln!(
                        doc,
                        "- Win rate: {rate:.1}% (chance {:.1}%)",
                        CHANCE_WIN_RATE * 100.0
                    );
                }
                None => doc.push_str("- Win rate: n/a\n"),
            }
            if let Some((low, high)) = self.ci95_pct {
                let _ = writeln!(doc, "- 95% CI: [{low:.1}%, {high:.1}%]");
            }
            if let Some(p) = self.p_value_vs_chance {
                let _ = writeln!(doc, "- Binomial p-value vs chance: {p:.4}");
            }
        }

        if let Some(dir) = path.as_ref().parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| AnalyticsError::Io {
                context: "creating summary directory",
                source,
            })?;
        }
        fs::write(path.as_ref(), doc).map_err(|source| AnalyticsError::Io {
            context: "writing summary markdown",
            source,
        })
    }
}

/// Percentage of `wins` over `trials`, or `None` for an empty batch.
pub fn win_rate_pct(wins: u64, trials: u64) -> Option<f64> {
    if trials == 0 {
        return None;
    }
    Some(100.0 * wins as f64 / trials as f64)
}

fn wald_interval_pct(wins: u64, trials: u64) -> Option<(f64, f64)> {
    if trials == 0 {
        return None;
    }
    let n = trials as f64;
    let p = wins as f64 / n;
    let z = Normal::new(0.0, 1.0)
        .ok()?
        .inverse_cdf(1.0 - (1.0 - CONFIDENCE_LEVEL) / 2.0);
    let margin = z * (p * (1.0 - p) / n).sqrt();
    Some((
        (p - margin).max(0.0) * 100.0,
        (p + margin).min(1.0) * 100.0,
    ))
}

/// Two-sided exact binomial test of `wins` out of `trials` against `p`.
fn binomial_p_value(wins: u64, trials: u64, p: f64) -> Option<f64> {
    if trials == 0 {
        return None;
    }
    let dist = Binomial::new(p, trials).ok()?;
    let lower = dist.cdf(wins);
    let upper = if wins == 0 {
        1.0
    } else {
        1.0 - dist.cdf(wins - 1)
    };
    Some((2.0 * lower.min(upper)).clamp(0.0, 1.0))
}

fn uniformity_p_value(seat_wins: &[u64; SEAT_COUNT]) -> Option<f64> {
    let total: u64 = seat_wins.iter().sum();
    if total == 0 {
        return None;
    }
    let expected = total as f64 / SEAT_COUNT as f64;
    let statistic: f64 = seat_wins
        .iter()
        .map(|&observed| (observed as f64 - expected).powi(2) / expected)
        .sum();
    let dist = ChiSquared::new((SEAT_COUNT - 1) as f64).ok()?;
    Some((1.0 - dist.cdf(statistic)).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outcome(seat: Option<usize>, winner: usize) -> TrialOutcome {
        TrialOutcome {
            index: 0,
            seat: seat.and_then(Seat::from_index),
            winner: Seat::from_index(winner).unwrap(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn per_seat_counts_sum_to_trials() {
        let mut tally = Tally::new(Variant::PerSeat);
        for winner in [0, 1, 1, 3, 2, 2, 2, 0, 1] {
            tally.record(&outcome(None, winner));
        }
        let report = tally.finalize();
        assert_eq!(report.seat_wins, [2, 3, 3, 1]);
        assert_eq!(report.seat_wins.iter().sum::<u64>(), report.trials);
        assert!(report.self_wins.is_none());
        assert!(report.win_rate_pct.is_none());
    }

    #[test]
    fn single_trial_seat_two_wins() {
        let mut per_seat = Tally::new(Variant::PerSeat);
        per_seat.record(&outcome(None, 2));
        let report = per_seat.finalize();
        assert_eq!(report.seat_wins, [0, 0, 1, 0]);
        assert_eq!(report.console_lines()[2], "Result: Player 2 won 1 times.");

        let mut hit = Tally::new(Variant::VersusRandom);
        hit.record(&outcome(Some(2), 2));
        let report = hit.finalize();
        assert_eq!(report.self_wins, Some(1));
        assert_eq!(report.win_rate_pct, Some(100.0));

        let mut miss = Tally::new(Variant::VersusRandom);
        miss.record(&outcome(Some(0), 2));
        let report = miss.finalize();
        assert_eq!(report.self_wins, Some(0));
        assert_eq!(report.win_rate_pct, Some(0.0));
    }

    #[test]
    fn win_rate_matches_ratio() {
        let mut tally = Tally::new(Variant::VersusRandom);
        for (seat, winner) in [(0, 0), (1, 2), (3, 3), (2, 1), (1, 1), (0, 3), (2, 2)] {
            tally.record(&outcome(Some(seat), winner));
        }
        let report = tally.finalize();
        let wins = report.self_wins.unwrap();
        assert_eq!(wins, 4);
        assert!(wins <= report.trials);
        let expected = 100.0 * wins as f64 / report.trials as f64;
        assert!((report.win_rate_pct.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_trials_reports_no_rate() {
        let report = Tally::new(Variant::VersusRandom).finalize();
        assert_eq!(report.trials, 0);
        assert_eq!(report.self_wins, Some(0));
        assert!(report.win_rate_pct.is_none());
        assert!(report.ci95_pct.is_none());
        assert!(report.p_value_vs_chance.is_none());
        assert!(report.console_lines()[1].starts_with("Win rate: n/a"));

        let per_seat = Tally::new(Variant::PerSeat).finalize();
        assert_eq!(per_seat.seat_wins, [0; SEAT_COUNT]);
        assert_eq!(
            per_seat.console_lines(),
            vec![
                "Result: Player 0 won 0 times.",
                "Result: Player 1 won 0 times.",
                "Result: Player 2 won 0 times.",
                "Result: Player 3 won 0 times.",
            ]
        );
    }

    #[test]
    fn binomial_test_flags_lopsided_results() {
        let at_chance = binomial_p_value(25, 100, CHANCE_WIN_RATE).unwrap();
        assert!(at_chance > 0.5);

        let dominant = binomial_p_value(60, 100, CHANCE_WIN_RATE).unwrap();
        assert!(dominant < 1e-6);
    }

    #[test]
    fn wald_interval_brackets_observed_rate() {
        let (low, high) = wald_interval_pct(30, 100).unwrap();
        assert!(low < 30.0 && 30.0 < high);
        assert!((high - low - 2.0 * 1.96 * (0.3f64 * 0.7 / 100.0).sqrt() * 100.0).abs() < 0.05);
    }

    #[test]
    fn uniform_seat_wins_have_high_p_value() {
        assert!(uniformity_p_value(&[250, 250, 250, 250]).unwrap() > 0.99);
        assert!(uniformity_p_value(&[700, 100, 100, 100]).unwrap() < 1e-6);
        assert!(uniformity_p_value(&[0, 0, 0, 0]).is_none());
    }

    #[test]
    fn markdown_summary_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("summary.md");

        let mut tally = Tally::new(Variant::VersusRandom);
        tally.record(&outcome(Some(1), 1));
        tally.record(&outcome(Some(0), 3));
        tally.finalize().write_markdown(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("| 1 | 1 | 50.0% |"));
        assert!(text.contains("- Self wins: 1"));
    }
}
