//! Progress reporting
//!
//! The long-term progress store only ever hears about finished episodes.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candle::Timeframe;
use crate::scoring::GradingMetrics;

/// Final outcome of one episode, as recorded by the progress store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSummary {
    pub episode_id: Uuid,
    pub seed: i64,
    pub timeframe: Timeframe,
    pub passed: bool,
    pub score: u32,
    pub metrics: GradingMetrics,
    pub final_balance: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// One-way recipient of finished episodes.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn record(&self, summary: &EpisodeSummary) -> Result<()>;
}

/// Writes summaries to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressSink;

#[async_trait]
impl ProgressSink for TracingProgressSink {
    async fn record(&self, summary: &EpisodeSummary) -> Result<()> {
        tracing::info!(
            episode = %summary.episode_id,
            seed = summary.seed,
            timeframe = %summary.timeframe,
            passed = summary.passed,
            score = summary.score,
            final_balance = summary.final_balance,
            "Episode recorded"
        );
        Ok(())
    }
}
