//! Episode Engine
//!
//! Synthetic market episodes for drills and graded exams. Scenarios are
//! generated from a seed, replayed bar by bar with the future hidden, traded
//! through a single-position ledger and graded against the hidden answer
//! key that was generated alongside the candles.

pub mod candle;
pub mod config;
pub mod driver;
pub mod episode;
pub mod error;
pub mod ledger;
pub mod patterns;
pub mod progress;
pub mod replay;
pub mod rng;
pub mod scenario;
pub mod scoring;
pub mod session;
pub mod synth;

pub use candle::{round_price, Candle, Timeframe};
pub use config::EngineConfig;
pub use driver::{PlaybackDriver, SharedEpisode};
pub use episode::Episode;
pub use error::{EpisodeError, EpisodeResult};
pub use ledger::{LedgerSnapshot, PositionLedger, PotHealth, Trade, TradeSide};
pub use patterns::{CurriculumPattern, Difficulty, PatternLibrary};
pub use progress::{EpisodeSummary, ProgressSink, TracingProgressSink};
pub use replay::{ReplayController, ReplayEvent, ReplayState};
pub use rng::{EntropySource, RandomSource, SeededStream};
pub use scenario::{
    generate_scenario, GroundTruth, Scenario, ScenarioBuilder, ScenarioConfig, ScenarioPhase,
    SweepSide,
};
pub use scoring::{
    grade_episode, ExamMarker, ExamResult, Grader, GradingInput, GradingMetrics, MarkerKind,
    Violation,
};
pub use session::Killzone;
pub use synth::{
    synthesize_practice, synthesize_seeded, PatternArchetype, PracticeFeed, SynthesisRequest,
};

#[cfg(test)]
mod tests;
