//! Candle Pattern Synthesizer
//!
//! Builds chained OHLC sequences from a base price, a pattern archetype and a
//! timeframe volatility profile. Each bar opens at the previous close.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::candle::{round_price, Candle, Timeframe};
use crate::rng::{EntropySource, RandomSource, SeededStream};

/// Generation recipe selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternArchetype {
    /// Steady up-closes
    Bullish,
    /// Steady down-closes
    Bearish,
    /// Symmetric noise
    Ranging,
    /// Run up, sweep the high, then sell off
    TurtleSoup,
    /// Thick bullish bodies followed by a bearish reversal
    ModelOne,
    /// Accumulation, manipulation and distribution legs
    ThreePhase,
    /// Impulse leg then a deep retracement
    ImpulseRetracement,
}

impl PatternArchetype {
    /// Resolve a content tag. Unknown tags fall back to [`PatternArchetype::Ranging`].
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "bullish" => PatternArchetype::Bullish,
            "bearish" => PatternArchetype::Bearish,
            "ranging" | "range" => PatternArchetype::Ranging,
            "turtle-soup" | "turtle_soup" | "sweep-and-reclaim" => PatternArchetype::TurtleSoup,
            "model-1" | "model-one" | "model_1" => PatternArchetype::ModelOne,
            "three-candles" | "three-phase" | "amd" => PatternArchetype::ThreePhase,
            "crt-ote" | "impulse-retracement" => PatternArchetype::ImpulseRetracement,
            other => {
                tracing::debug!(tag = other, "Unknown pattern archetype, using ranging recipe");
                PatternArchetype::Ranging
            }
        }
    }
}

impl std::fmt::Display for PatternArchetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternArchetype::Bullish => write!(f, "bullish"),
            PatternArchetype::Bearish => write!(f, "bearish"),
            PatternArchetype::Ranging => write!(f, "ranging"),
            PatternArchetype::TurtleSoup => write!(f, "turtle-soup"),
            PatternArchetype::ModelOne => write!(f, "model-1"),
            PatternArchetype::ThreePhase => write!(f, "three-candles"),
            PatternArchetype::ImpulseRetracement => write!(f, "crt-ote"),
        }
    }
}

/// Parameters for one synthesizer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub count: usize,
    pub timeframe: Timeframe,
    pub base_price: f64,
    pub archetype: PatternArchetype,
    /// Index of the first bar, used for time labels
    pub start_index: usize,
    /// Bar volatility; defaults to the timeframe's table value
    pub volatility: f64,
    /// Wall-clock anchor for intraday labels
    pub anchor: NaiveTime,
}

impl SynthesisRequest {
    pub fn new(
        count: usize,
        timeframe: Timeframe,
        base_price: f64,
        archetype: PatternArchetype,
    ) -> Self {
        Self {
            count,
            timeframe,
            base_price,
            archetype,
            start_index: 0,
            volatility: timeframe.volatility(),
            anchor: NaiveTime::default(),
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn starting_at(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn anchored_at(mut self, anchor: NaiveTime) -> Self {
        self.anchor = anchor;
        self
    }

    fn leg(&self, count: usize, base_price: f64, archetype: PatternArchetype, offset: usize) -> Self {
        Self {
            count,
            base_price,
            archetype,
            start_index: self.start_index + offset,
            ..self.clone()
        }
    }
}

/// Synthesize a reproducible sequence. Required wherever grading is involved.
pub fn synthesize_seeded(request: &SynthesisRequest, rng: &mut SeededStream) -> Vec<Candle> {
    synthesize(request, rng)
}

/// Synthesize cosmetic, non-graded content from an unconstrained source.
pub fn synthesize_practice(request: &SynthesisRequest, source: &mut EntropySource) -> Vec<Candle> {
    synthesize(request, source)
}

fn synthesize<R: RandomSource>(request: &SynthesisRequest, rng: &mut R) -> Vec<Candle> {
    match request.archetype {
        PatternArchetype::ThreePhase => {
            let third = request.count / 3;
            compose(
                request,
                &[
                    (third, PatternArchetype::Bullish),
                    (third, PatternArchetype::Ranging),
                    (request.count - 2 * third, PatternArchetype::Bearish),
                ],
                rng,
            )
        }
        PatternArchetype::ImpulseRetracement => {
            let impulse = ((request.count * 8) as f64 / 13.0).round() as usize;
            let impulse = impulse.clamp(request.count.min(1), request.count);
            compose(
                request,
                &[
                    (impulse, PatternArchetype::Bullish),
                    (request.count - impulse, PatternArchetype::Bearish),
                ],
                rng,
            )
        }
        _ => synthesize_leg(request, rng),
    }
}

/// Chain several single-recipe legs, each opening at the previous leg's close.
fn compose<R: RandomSource>(
    request: &SynthesisRequest,
    legs: &[(usize, PatternArchetype)],
    rng: &mut R,
) -> Vec<Candle> {
    let mut candles: Vec<Candle> = Vec::with_capacity(request.count);
    let mut price = request.base_price;

    for &(count, archetype) in legs {
        if count == 0 {
            continue;
        }
        let leg = request.leg(count, price, archetype, candles.len());
        let bars = synthesize_leg(&leg, rng);
        if let Some(last) = bars.last() {
            price = last.close;
        }
        candles.extend(bars);
    }

    candles
}

fn synthesize_leg<R: RandomSource>(request: &SynthesisRequest, rng: &mut R) -> Vec<Candle> {
    let volatility = request.volatility;
    let count = request.count as f64;
    let mut candles = Vec::with_capacity(request.count);
    let mut current_price = round_price(request.base_price);

    for i in 0..request.count {
        let open = current_price;
        let step = i as f64;
        let mut extra_high = 0.0;

        let drift = match request.archetype {
            PatternArchetype::TurtleSoup => {
                if step < count * 0.3 {
                    volatility * rng.next_between(0.5, 1.0)
                } else if step < count * 0.4 {
                    // Sweep bar: wick through the high, close back down
                    extra_high = volatility * 1.5;
                    -volatility * 0.3
                } else {
                    -volatility * rng.next_between(0.8, 1.2)
                }
            }
            PatternArchetype::ModelOne => {
                if step < count * 0.5 {
                    volatility * rng.next_between(1.2, 1.7)
                } else {
                    -volatility * rng.next_between(0.8, 1.2)
                }
            }
            PatternArchetype::Bullish => volatility * rng.next_between(0.3, 1.0),
            PatternArchetype::Bearish => -volatility * rng.next_between(0.3, 1.0),
            _ => (rng.next_unit() - 0.5) * volatility * 0.6,
        };

        let close = open + drift;
        let upper_wick = volatility * rng.next_between(0.2, 0.6);
        let lower_wick = volatility * rng.next_between(0.2, 0.6);
        let high = (open.max(close) + upper_wick).max(open + extra_high);
        let low = open.min(close) - lower_wick;

        let label = request
            .timeframe
            .label_from(request.anchor, request.start_index + i);
        let candle = shape_bar(label, open, high, low, close);
        current_price = candle.close;
        candles.push(candle);
    }

    candles
}

/// Round raw prices and clamp the wicks so the OHLC ordering always holds.
pub(crate) fn shape_bar(time: String, open: f64, high: f64, low: f64, close: f64) -> Candle {
    let open = round_price(open);
    let close = round_price(close);
    let high = round_price(high).max(open.max(close));
    let low = round_price(low).min(open.min(close));

    Candle {
        time,
        open,
        high,
        low,
        close,
    }
}

/// Endless unseeded feed for the practice simulator.
pub struct PracticeFeed {
    source: EntropySource,
    timeframe: Timeframe,
    anchor: NaiveTime,
    next_index: usize,
}

impl PracticeFeed {
    /// Chance that a bar falls in a high-activity session
    const SESSION_BURST_PROBABILITY: f64 = 0.3;
    const SESSION_BURST_MULTIPLIER: f64 = 1.5;

    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            source: EntropySource::new(),
            timeframe,
            anchor: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            next_index: 0,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Opening history for a fresh practice chart.
    pub fn seed_history(&mut self, count: usize, base_price: f64) -> Vec<Candle> {
        let request = SynthesisRequest::new(count, self.timeframe, base_price, PatternArchetype::Ranging)
            .starting_at(self.next_index)
            .anchored_at(self.anchor);
        let candles = synthesize_practice(&request, &mut self.source);
        self.next_index += candles.len();
        candles
    }

    /// Next bar chained to `prev`.
    pub fn next_candle(&mut self, prev: &Candle) -> Candle {
        let burst = self.source.next_unit() < Self::SESSION_BURST_PROBABILITY;
        let volatility = if burst {
            self.timeframe.volatility() * Self::SESSION_BURST_MULTIPLIER
        } else {
            self.timeframe.volatility()
        };

        let open = prev.close;
        let close = open + (self.source.next_unit() - 0.5) * volatility;
        let high = open.max(close) + self.source.next_unit() * volatility * 0.4;
        let low = open.min(close) - self.source.next_unit() * volatility * 0.4;

        let label = self.timeframe.label_from(self.anchor, self.next_index);
        self.next_index += 1;
        shape_bar(label, open, high, low, close)
    }

    /// `count` more bars following `prev`.
    pub fn extend(&mut self, prev: &Candle, count: usize) -> Vec<Candle> {
        let mut batch = Vec::with_capacity(count);
        let mut current = prev.clone();
        for _ in 0..count {
            current = self.next_candle(&current);
            batch.push(current.clone());
        }
        batch
    }
}
