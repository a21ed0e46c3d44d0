use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{EpisodeError, EpisodeResult};
use crate::replay::{MAX_RATE, MIN_RATE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    // The Pot
    pub starting_balance: f64,      // 10000
    pub position_multiplier: f64,   // 100 per price unit
    pub max_daily_loss: f64,        // 500

    // Replay
    pub replay_rate: f64,           // bars per second
    pub view_window: usize,         // 40 trailing bars
    pub initial_offset: usize,      // 30 bars of context before play
    pub allow_rewind: bool,         // false in exams

    // Grading
    pub range_tolerance: f64,       // 0.50
    pub pass_threshold: u32,        // 75
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_balance: 10_000.0,
            position_multiplier: 100.0,
            max_daily_loss: 500.0,
            replay_rate: 1.0,
            view_window: 40,
            initial_offset: 30,
            allow_rewind: false,
            range_tolerance: 0.5,
            pass_threshold: 75,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            starting_balance: var("EPISODE_STARTING_BALANCE", "10000.0")
                .parse()
                .context("EPISODE_STARTING_BALANCE must be a number")?,
            position_multiplier: var("EPISODE_POSITION_MULTIPLIER", "100.0")
                .parse()
                .context("EPISODE_POSITION_MULTIPLIER must be a number")?,
            max_daily_loss: var("EPISODE_MAX_DAILY_LOSS", "500.0")
                .parse()
                .context("EPISODE_MAX_DAILY_LOSS must be a number")?,

            replay_rate: var("EPISODE_REPLAY_RATE", "1.0")
                .parse()
                .context("EPISODE_REPLAY_RATE must be a number")?,
            view_window: var("EPISODE_VIEW_WINDOW", "40")
                .parse()
                .context("EPISODE_VIEW_WINDOW must be a bar count")?,
            initial_offset: var("EPISODE_INITIAL_OFFSET", "30")
                .parse()
                .context("EPISODE_INITIAL_OFFSET must be a bar index")?,
            allow_rewind: var("EPISODE_ALLOW_REWIND", "false")
                .parse()
                .context("EPISODE_ALLOW_REWIND must be true or false")?,

            range_tolerance: var("EPISODE_RANGE_TOLERANCE", "0.5")
                .parse()
                .context("EPISODE_RANGE_TOLERANCE must be a number")?,
            pass_threshold: var("EPISODE_PASS_THRESHOLD", "75")
                .parse()
                .context("EPISODE_PASS_THRESHOLD must be an integer")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EpisodeResult<()> {
        if !(self.starting_balance > 0.0) {
            return Err(EpisodeError::InvalidConfig(format!(
                "starting balance must be positive, got {}",
                self.starting_balance
            )));
        }
        if !(self.position_multiplier > 0.0) {
            return Err(EpisodeError::InvalidConfig(format!(
                "position multiplier must be positive, got {}",
                self.position_multiplier
            )));
        }
        if self.max_daily_loss < 0.0 {
            return Err(EpisodeError::InvalidConfig(format!(
                "max daily loss cannot be negative, got {}",
                self.max_daily_loss
            )));
        }
        if !(MIN_RATE..=MAX_RATE).contains(&self.replay_rate) {
            return Err(EpisodeError::InvalidRate(self.replay_rate));
        }
        if self.view_window == 0 {
            return Err(EpisodeError::InvalidConfig("view window must be at least 1 bar".to_string()));
        }
        if !(self.range_tolerance > 0.0) {
            return Err(EpisodeError::InvalidConfig(format!(
                "range tolerance must be positive, got {}",
                self.range_tolerance
            )));
        }
        if self.pass_threshold > 100 {
            return Err(EpisodeError::InvalidConfig(format!(
                "pass threshold must be within 0..=100, got {}",
                self.pass_threshold
            )));
        }
        Ok(())
    }
}
