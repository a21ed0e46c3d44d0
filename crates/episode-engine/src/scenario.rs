//! Exam Scenario Builder
//!
//! Composes a graded sweep-and-reclaim episode: an accumulation range, a
//! one-sided push into a single-bar liquidity sweep, a reclaim bar, and a
//! distribution leg away from the sweep. The hidden [`GroundTruth`] is
//! recorded alongside the candles.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::candle::{round_price, Candle, Timeframe};
use crate::error::{EpisodeError, EpisodeResult};
use crate::ledger::TradeSide;
use crate::rng::{EntropySource, RandomSource, SeededStream};
use crate::session::Killzone;
use crate::synth::{shape_bar, synthesize_seeded, PatternArchetype, SynthesisRequest};

/// Minimum length of a graded episode.
pub const MIN_SCENARIO_BARS: usize = 60;

/// Which range boundary the manipulation leg sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SweepSide {
    Above,
    Below,
}

impl SweepSide {
    /// Correct trade after the sweep: fade it.
    pub fn correct_direction(&self) -> TradeSide {
        match self {
            SweepSide::Above => TradeSide::Short,
            SweepSide::Below => TradeSide::Long,
        }
    }
}

/// Phase a bar belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioPhase {
    Accumulation,
    Manipulation,
    Distribution,
}

/// The hidden answer key for one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundTruth {
    pub range_high: f64,
    pub range_low: f64,
    /// Extreme of the sweep wick
    pub purge_price: f64,
    /// Index of the sweep bar
    pub sweep_index: usize,
    /// Index of the bar that confirms the move back inside the range
    pub reclaim_index: usize,
    pub direction: TradeSide,
}

/// Scenario geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub timeframe: Timeframe,
    pub base_price: f64,
    /// Distance from the base price to either edge of the accumulation band
    pub range_half_width: f64,
    pub accumulation_bars: usize,
    pub push_bars: usize,
    pub distribution_bars: usize,
    pub sweep: SweepSide,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::M15,
            base_price: 100.0,
            range_half_width: 2.0,
            accumulation_bars: 35,
            push_bars: 9,
            distribution_bars: 14,
            sweep: SweepSide::Above,
        }
    }
}

impl ScenarioConfig {
    pub fn for_timeframe(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            ..Self::default()
        }
    }

    /// Accumulation + push + sweep + reclaim + distribution.
    pub fn total_bars(&self) -> usize {
        self.accumulation_bars + self.push_bars + 2 + self.distribution_bars
    }

    pub fn validate(&self) -> EpisodeResult<()> {
        if !self.base_price.is_finite() || !self.range_half_width.is_finite() {
            return Err(EpisodeError::InvalidConfig(
                "scenario prices must be finite".to_string(),
            ));
        }
        if self.range_half_width <= 0.0 {
            return Err(EpisodeError::InvalidConfig(
                "range_half_width must be positive".to_string(),
            ));
        }
        // Keeps every mirrored/distribution price positive
        if self.base_price <= self.range_half_width * 6.0 {
            return Err(EpisodeError::InvalidConfig(format!(
                "base_price {} too small for range_half_width {}",
                self.base_price, self.range_half_width
            )));
        }
        if self.accumulation_bars < 10 || self.push_bars == 0 || self.distribution_bars == 0 {
            return Err(EpisodeError::InvalidConfig(
                "every scenario phase needs bars (accumulation at least 10)".to_string(),
            ));
        }
        if self.total_bars() < MIN_SCENARIO_BARS {
            return Err(EpisodeError::InvalidConfig(format!(
                "scenario needs at least {} bars, got {}",
                MIN_SCENARIO_BARS,
                self.total_bars()
            )));
        }
        Ok(())
    }
}

/// One generated episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Seed the candles were generated from
    pub seed: i64,
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
    pub ground_truth: GroundTruth,
    /// First manipulation bar
    pub manipulation_start: usize,
    /// First distribution bar
    pub distribution_start: usize,
}

impl Scenario {
    pub fn phase_of(&self, index: usize) -> ScenarioPhase {
        if index < self.manipulation_start {
            ScenarioPhase::Accumulation
        } else if index < self.distribution_start {
            ScenarioPhase::Manipulation
        } else {
            ScenarioPhase::Distribution
        }
    }

    /// Session a bar trades in; `None` for daily and slower frames.
    pub fn killzone_at(&self, index: usize) -> Option<Killzone> {
        if !self.timeframe.is_intraday() || index >= self.candles.len() {
            return None;
        }
        Some(Killzone::at(
            self.timeframe.time_of(ScenarioBuilder::session_anchor(), index),
        ))
    }
}

/// Builds validated scenarios.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    config: ScenarioConfig,
}

impl ScenarioBuilder {
    pub fn new(config: ScenarioConfig) -> EpisodeResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Intraday scenarios open at the Asia session.
    pub fn session_anchor() -> NaiveTime {
        NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default()
    }

    /// Generate the episode for `seed`. Same config and seed, same candles.
    pub fn build(&self, seed: i64) -> Scenario {
        let cfg = &self.config;
        let mut rng = SeededStream::new(seed);
        let anchor = Self::session_anchor();
        let label = |index: usize| cfg.timeframe.label_from(anchor, index);

        let base = round_price(cfg.base_price);
        let w = cfg.range_half_width;
        let wick = w * 0.1;

        // Built as an upside sweep; a downside sweep is the mirror image.
        let mut candles: Vec<Candle> = Vec::with_capacity(cfg.total_bars());

        // Accumulation: bounded, mean-reverting noise. Closes stay within
        // 0.75w of the base and wicks add at most 0.1w, so the two probe wicks
        // below (0.85w..0.95w) are the unique range extremes.
        let quarter = cfg.accumulation_bars / 4;
        let high_probe = quarter + (rng.next() * quarter as f64) as usize;
        let low_probe = 2 * quarter + (rng.next() * quarter as f64) as usize;
        let high_probe_level = base + w * rng.next_between(0.85, 0.95);
        let low_probe_level = base - w * rng.next_between(0.85, 0.95);

        let mut price = base;
        for i in 0..cfg.accumulation_bars {
            let open = price;
            let mut close = open + (rng.next() - 0.5) * w * 0.25;
            if close > base + w * 0.75 {
                close -= w * 0.25;
            }
            if close < base - w * 0.75 {
                close += w * 0.25;
            }
            let mut high = open.max(close) + rng.next() * wick;
            let mut low = open.min(close) - rng.next() * wick;
            if i == high_probe {
                high = high_probe_level;
            }
            if i == low_probe {
                low = low_probe_level;
            }
            let candle = shape_bar(label(i), open, high, low, close);
            price = candle.close;
            candles.push(candle);
        }

        let range_high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let range_low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let inside = |candle: Candle| contain(candle, range_low, range_high);

        // Manipulation push: drift toward the high without touching beyond it
        let manipulation_start = candles.len();
        let push_target = range_high - w * 0.15;
        let ceiling = push_target.max(price);
        let step = ((push_target - price) / cfg.push_bars as f64).max(0.0);
        for _ in 0..cfg.push_bars {
            let open = price;
            let close = (open + step * rng.next_between(0.75, 1.25)).min(ceiling);
            let high = open.max(close) + rng.next() * wick;
            let low = open.min(close) - rng.next() * wick;
            let candle = inside(shape_bar(label(candles.len()), open, high, low, close));
            price = candle.close;
            candles.push(candle);
        }

        // Sweep: the wick pierces the range high, the body stays inside
        let sweep_index = candles.len();
        let overshoot = w * rng.next_between(0.5, 0.75);
        let open = price;
        let close = (open - w * 0.1).max(range_low);
        let high = range_high + overshoot;
        let low = (open.min(close) - rng.next() * wick).max(range_low);
        let sweep = shape_bar(label(sweep_index), open, high, low, close);
        let purge_price = sweep.high;
        price = sweep.close;
        candles.push(sweep);

        // Reclaim: decisive close back into the range
        let reclaim_index = candles.len();
        let open = price;
        let close = (open - w * rng.next_between(0.3, 0.5)).max(range_low);
        let high = open.max(close) + rng.next() * wick;
        let low = open.min(close) - rng.next() * wick;
        let reclaim = inside(shape_bar(label(reclaim_index), open, high, low, close));
        price = reclaim.close;
        candles.push(reclaim);

        // Distribution: sustained move away from the sweep
        let distribution_start = candles.len();
        let request = SynthesisRequest::new(
            cfg.distribution_bars,
            cfg.timeframe,
            price,
            PatternArchetype::Bearish,
        )
        .with_volatility(w * 0.2)
        .starting_at(distribution_start)
        .anchored_at(anchor);
        candles.extend(synthesize_seeded(&request, &mut rng));

        let mut ground_truth = GroundTruth {
            range_high,
            range_low,
            purge_price,
            sweep_index,
            reclaim_index,
            direction: cfg.sweep.correct_direction(),
        };

        if cfg.sweep == SweepSide::Below {
            let pivot = base * 2.0;
            candles = candles.into_iter().map(|c| mirror(c, pivot)).collect();
            ground_truth.range_high = round_price(pivot - range_low);
            ground_truth.range_low = round_price(pivot - range_high);
            ground_truth.purge_price = round_price(pivot - purge_price);
        }

        tracing::info!(
            seed,
            timeframe = %cfg.timeframe,
            sweep = ?cfg.sweep,
            bars = candles.len(),
            "Generated exam scenario"
        );

        Scenario {
            seed,
            timeframe: cfg.timeframe,
            candles,
            ground_truth,
            manipulation_start,
            distribution_start,
        }
    }
}

/// Clamp a bar's wicks into `[low, high]`.
fn contain(mut candle: Candle, low: f64, high: f64) -> Candle {
    candle.high = candle.high.min(high).max(candle.open.max(candle.close));
    candle.low = candle.low.max(low).min(candle.open.min(candle.close));
    candle
}

/// Reflect a bar through `pivot`, swapping the roles of high and low.
fn mirror(candle: Candle, pivot: f64) -> Candle {
    Candle {
        time: candle.time,
        open: round_price(pivot - candle.open),
        high: round_price(pivot - candle.low),
        low: round_price(pivot - candle.high),
        close: round_price(pivot - candle.close),
    }
}

/// Generate a default graded episode.
///
/// A missing seed is drawn from the entropy source and recorded on the
/// returned scenario so the episode can still be replayed.
pub fn generate_scenario(seed: Option<i64>, timeframe: Timeframe) -> Scenario {
    let seed = seed.unwrap_or_else(|| EntropySource::new().draw_seed());
    let builder = ScenarioBuilder {
        config: ScenarioConfig::for_timeframe(timeframe),
    };
    builder.build(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unambiguous_sweep(scenario: &Scenario, side: SweepSide) {
        let truth = &scenario.ground_truth;
        let candles = &scenario.candles;
        let s = truth.sweep_index;

        match side {
            SweepSide::Above => {
                assert!(candles[s].high > truth.range_high);
                assert_eq!(candles[s].high, truth.purge_price);
                assert!(candles[s - 1].high <= truth.range_high);
                assert!(candles[s + 1].high <= truth.range_high);
                assert!(candles[..s].iter().all(|c| c.high <= truth.range_high));
            }
            SweepSide::Below => {
                assert!(candles[s].low < truth.range_low);
                assert_eq!(candles[s].low, truth.purge_price);
                assert!(candles[s - 1].low >= truth.range_low);
                assert!(candles[s + 1].low >= truth.range_low);
                assert!(candles[..s].iter().all(|c| c.low >= truth.range_low));
            }
        }

        let reclaim = &candles[truth.reclaim_index];
        assert!(reclaim.close < truth.range_high && reclaim.close > truth.range_low);
    }

    #[test]
    fn test_default_scenario_shape() {
        let scenario = generate_scenario(Some(12345), Timeframe::D1);
        assert_eq!(scenario.candles.len(), 60);
        assert_eq!(scenario.ground_truth.sweep_index, 44);
        assert_eq!(scenario.ground_truth.reclaim_index, 45);
        assert_eq!(scenario.ground_truth.direction, TradeSide::Short);
        let width = scenario.ground_truth.range_high - scenario.ground_truth.range_low;
        assert!(width > 3.38 && width < 3.82, "range width {}", width);
        assert_eq!(scenario.candles[0].time, "Day 1");
        assert_unambiguous_sweep(&scenario, SweepSide::Above);
    }

    #[test]
    fn test_same_seed_same_scenario() {
        let a = generate_scenario(Some(12345), Timeframe::D1);
        let b = generate_scenario(Some(12345), Timeframe::D1);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a.candles).unwrap(),
            serde_json::to_string(&b.candles).unwrap()
        );

        let c = generate_scenario(Some(54321), Timeframe::D1);
        assert_ne!(a.candles, c.candles);
    }

    #[test]
    fn test_invariants_hold_across_seeds() {
        for seed in 0..200 {
            for side in [SweepSide::Above, SweepSide::Below] {
                let config = ScenarioConfig {
                    sweep: side,
                    ..ScenarioConfig::default()
                };
                let scenario = ScenarioBuilder::new(config).unwrap().build(seed);
                assert!(scenario.candles.iter().all(|c| c.is_valid()), "seed {}", seed);
                for pair in scenario.candles.windows(2) {
                    assert_eq!(pair[1].open, pair[0].close, "seed {}", seed);
                }
                assert_unambiguous_sweep(&scenario, side);
            }
        }
    }

    #[test]
    fn test_downside_sweep_is_long() {
        let config = ScenarioConfig {
            sweep: SweepSide::Below,
            ..ScenarioConfig::default()
        };
        let scenario = ScenarioBuilder::new(config).unwrap().build(7);
        assert_eq!(scenario.ground_truth.direction, TradeSide::Long);
        assert!(scenario.ground_truth.purge_price < scenario.ground_truth.range_low);
        let reclaim = &scenario.candles[scenario.ground_truth.reclaim_index];
        let last = scenario.candles.last().unwrap();
        assert!(last.close > reclaim.close);
    }

    #[test]
    fn test_distribution_moves_away_from_sweep() {
        let scenario = generate_scenario(Some(2024), Timeframe::M15);
        let start = scenario.distribution_start;
        assert!(scenario.candles[start..].iter().all(|c| c.close < c.open));
        assert_eq!(scenario.phase_of(0), ScenarioPhase::Accumulation);
        assert_eq!(scenario.phase_of(44), ScenarioPhase::Manipulation);
        assert_eq!(scenario.phase_of(59), ScenarioPhase::Distribution);
    }

    #[test]
    fn test_intraday_labels_start_in_asia() {
        let scenario = generate_scenario(Some(1), Timeframe::M15);
        assert_eq!(scenario.candles[0].time, "20:00");
        assert_eq!(scenario.killzone_at(0), Some(Killzone::Asia));
        assert_eq!(generate_scenario(Some(1), Timeframe::D1).killzone_at(0), None);
    }

    #[test]
    fn test_missing_seed_is_recorded() {
        let scenario = generate_scenario(None, Timeframe::H1);
        let replay = generate_scenario(Some(scenario.seed), Timeframe::H1);
        assert_eq!(scenario.candles, replay.candles);
    }

    #[test]
    fn test_config_validation() {
        let short = ScenarioConfig {
            distribution_bars: 2,
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            ScenarioBuilder::new(short),
            Err(EpisodeError::InvalidConfig(_))
        ));

        let cramped = ScenarioConfig {
            base_price: 5.0,
            ..ScenarioConfig::default()
        };
        assert!(ScenarioBuilder::new(cramped).is_err());
        assert!(ScenarioBuilder::new(ScenarioConfig::default()).is_ok());
    }
}
