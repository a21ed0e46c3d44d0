//! Episode Grading
//!
//! Scores a finished episode against its hidden ground truth. Three
//! sub-scores (range accuracy, timing, risk management) are combined with
//! fixed weights; risk management also gates the pass independently of the
//! total. Every branch that decides a sub-score writes one feedback line, so
//! the feedback narrative always explains the numbers.

use serde::{Deserialize, Serialize};

use crate::ledger::{Trade, TradeSide};
use crate::scenario::GroundTruth;

const RANGE_WEIGHT: u32 = 25;
const TIMING_WEIGHT: u32 = 35;
const RISK_WEIGHT: u32 = 40;

/// Absorbs float noise when a price sits exactly on a tolerance edge.
const PRICE_EPSILON: f64 = 1e-9;

/// Chart annotation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkerKind {
    RangeHigh,
    RangeLow,
    PurgeFlag,
    Entry,
}

/// A marker placed by the user during an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamMarker {
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    pub price: f64,
    /// Bar index the marker was placed on
    pub time_index: usize,
}

impl ExamMarker {
    pub fn new(kind: MarkerKind, price: f64, time_index: usize) -> Self {
        Self {
            kind,
            price,
            time_index,
        }
    }
}

/// An intent the episode refused, reported back through the feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Replay cursor when the intent was made
    pub at_index: usize,
    pub reason: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rejected at bar {}: {}", self.at_index, self.reason)
    }
}

/// Sub-scores, each 0-100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingMetrics {
    pub range_accuracy: u32,
    pub timing: u32,
    pub risk_management: u32,
}

/// Final verdict for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResult {
    pub passed: bool,
    /// Weighted total, 0-100
    pub score: u32,
    pub feedback: Vec<String>,
    pub metrics: GradingMetrics,
}

/// Everything the grader looks at.
#[derive(Debug, Clone, Copy)]
pub struct GradingInput<'a> {
    pub markers: &'a [ExamMarker],
    pub trade: Option<&'a Trade>,
    pub ground_truth: &'a GroundTruth,
    pub balance: f64,
    pub starting_balance: f64,
    pub violations: &'a [Violation],
}

/// Episode grader
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grader {
    /// Absolute price distance a range marker may be off by
    pub tolerance: f64,
    /// Minimum weighted score to pass
    pub pass_threshold: u32,
}

impl Default for Grader {
    fn default() -> Self {
        Self {
            tolerance: 0.5,
            pass_threshold: 75,
        }
    }
}

impl Grader {
    pub fn new(tolerance: f64, pass_threshold: u32) -> Self {
        Self {
            tolerance,
            pass_threshold,
        }
    }

    /// Grade an episode. Pure: identical input, identical result.
    pub fn grade(&self, input: &GradingInput<'_>) -> ExamResult {
        let mut feedback = Vec::new();

        let range_accuracy = self.score_range(input, &mut feedback);
        let timing = self.score_timing(input, &mut feedback);
        let risk_management = self.score_risk(input, &mut feedback);

        let pnl = input.balance - input.starting_balance;
        if input.trade.is_some() {
            if pnl > 0.0 {
                feedback.push(format!("Trade closed in profit: +{:.2}.", pnl));
            } else if pnl < 0.0 {
                feedback.push(format!("Trade closed at a loss: {:.2}.", pnl));
            } else {
                feedback.push("Trade closed flat.".to_string());
            }
        }

        feedback.extend(input.violations.iter().map(|v| v.to_string()));

        let score = (RANGE_WEIGHT * range_accuracy
            + TIMING_WEIGHT * timing
            + RISK_WEIGHT * risk_management
            + 50)
            / 100;
        let passed = score >= self.pass_threshold && risk_management > 0;

        tracing::info!(
            score,
            passed,
            range_accuracy,
            timing,
            risk_management,
            "Episode graded"
        );

        ExamResult {
            passed,
            score,
            feedback,
            metrics: GradingMetrics {
                range_accuracy,
                timing,
                risk_management,
            },
        }
    }

    fn within(price: f64, target: f64, tolerance: f64) -> bool {
        (price - target).abs() <= tolerance + PRICE_EPSILON
    }

    fn first_marker(markers: &[ExamMarker], kind: MarkerKind) -> Option<&ExamMarker> {
        markers.iter().find(|m| m.kind == kind)
    }

    fn score_range(&self, input: &GradingInput<'_>, feedback: &mut Vec<String>) -> u32 {
        let truth = input.ground_truth;
        let high = Self::first_marker(input.markers, MarkerKind::RangeHigh);
        let low = Self::first_marker(input.markers, MarkerKind::RangeLow);

        let (high, low) = match (high, low) {
            (Some(high), Some(low)) => (high, low),
            (None, None) => {
                feedback.push("Range not marked: place both a range high and a range low.".to_string());
                return 0;
            }
            (None, Some(_)) => {
                feedback.push("Range high not marked.".to_string());
                return 0;
            }
            (Some(_), None) => {
                feedback.push("Range low not marked.".to_string());
                return 0;
            }
        };

        let tol = self.tolerance;
        let high_exact = Self::within(high.price, truth.range_high, tol);
        let low_exact = Self::within(low.price, truth.range_low, tol);
        if high_exact && low_exact {
            feedback.push(format!(
                "Range marked accurately: both boundaries within {:.2}.",
                tol
            ));
            return 100;
        }

        let loose = 2.0 * tol;
        if Self::within(high.price, truth.range_high, loose)
            || Self::within(low.price, truth.range_low, loose)
        {
            feedback.push(format!(
                "Range imprecise: only partly within {:.2} of the true {:.2} - {:.2}.",
                loose, truth.range_low, truth.range_high
            ));
            50
        } else {
            feedback.push(format!(
                "Range imprecise: neither boundary within {:.2} of the true {:.2} - {:.2}.",
                loose, truth.range_low, truth.range_high
            ));
            0
        }
    }

    fn score_timing(&self, input: &GradingInput<'_>, feedback: &mut Vec<String>) -> u32 {
        let direction = input.ground_truth.direction;
        match input.trade {
            None => {
                feedback.push("No trade taken.".to_string());
                0
            }
            Some(trade) if trade.side == direction => {
                feedback.push(format!("Correct direction: {} after the sweep.", direction));
                100
            }
            Some(trade) => {
                feedback.push(format!(
                    "Wrong direction: took {}, the sweep called for {}.",
                    trade.side, direction
                ));
                0
            }
        }
    }

    fn score_risk(&self, input: &GradingInput<'_>, feedback: &mut Vec<String>) -> u32 {
        let truth = input.ground_truth;
        let trade = match input.trade {
            Some(trade) => trade,
            None => {
                feedback.push("No position, no risk managed.".to_string());
                return 0;
            }
        };
        let stop = match trade.stop_loss {
            Some(stop) => stop,
            None => {
                feedback.push("No stop loss set: automatic risk management failure.".to_string());
                return 0;
            }
        };

        if trade.side != truth.direction {
            feedback.push(format!(
                "Stop loss at {:.2} protects a {} against the sweep; no risk credit.",
                stop, trade.side
            ));
            return 0;
        }

        let purge = truth.purge_price;
        let protected = match trade.side {
            TradeSide::Short => stop + PRICE_EPSILON >= purge,
            TradeSide::Long => stop - PRICE_EPSILON <= purge,
        };

        if protected {
            feedback.push(format!(
                "Stop loss at {:.2} sits beyond the purge at {:.2}.",
                stop, purge
            ));
            100
        } else {
            feedback.push(format!(
                "Stop loss at {:.2} is inside the purge at {:.2}.",
                stop, purge
            ));
            0
        }
    }
}

/// Grade with the default tolerance and pass threshold.
pub fn grade_episode(
    markers: &[ExamMarker],
    trade: Option<&Trade>,
    ground_truth: &GroundTruth,
    balance: f64,
    starting_balance: f64,
) -> ExamResult {
    Grader::default().grade(&GradingInput {
        markers,
        trade,
        ground_truth,
        balance,
        starting_balance,
        violations: &[],
    })
}
