//! Episode
//!
//! One graded attempt: a scenario, its replay, the position ledger, the
//! user's markers and every intent that was refused along the way. When
//! the replay completes (or the user submits early) any open position is
//! closed at the current bar and the episode is graded exactly once.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::candle::{Candle, Timeframe};
use crate::config::EngineConfig;
use crate::error::{EpisodeError, EpisodeResult};
use crate::ledger::{LedgerSnapshot, PositionLedger, PotHealth, Trade, TradeSide};
use crate::progress::EpisodeSummary;
use crate::replay::{ReplayController, ReplayEvent, ReplayState};
use crate::scenario::{generate_scenario, Scenario};
use crate::scoring::{ExamMarker, ExamResult, Grader, GradingInput, MarkerKind, Violation};

#[derive(Debug)]
pub struct Episode {
    id: Uuid,
    scenario: Scenario,
    replay: ReplayController,
    ledger: PositionLedger,
    grader: Grader,
    markers: Vec<ExamMarker>,
    violations: Vec<Violation>,
    result: Option<ExamResult>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Episode {
    pub fn new(scenario: Scenario, config: &EngineConfig) -> EpisodeResult<Self> {
        config.validate()?;

        let replay = ReplayController::new(scenario.candles.clone(), config.initial_offset)
            .with_rate(config.replay_rate)?
            .with_view_window(config.view_window)
            .with_rewind(config.allow_rewind);
        let ledger = PositionLedger::new(
            config.starting_balance,
            config.position_multiplier,
            config.max_daily_loss,
        );
        let id = Uuid::new_v4();

        tracing::info!(
            episode = %id,
            seed = scenario.seed,
            timeframe = %scenario.timeframe,
            bars = scenario.candles.len(),
            "Episode created"
        );

        Ok(Self {
            id,
            scenario,
            replay,
            ledger,
            grader: Grader::new(config.range_tolerance, config.pass_threshold),
            markers: Vec::new(),
            violations: Vec::new(),
            result: None,
            started_at: Utc::now(),
            completed_at: None,
        })
    }

    /// Generate the scenario for `seed` (or a fresh one) and wrap it.
    pub fn generate(seed: Option<i64>, timeframe: Timeframe, config: &EngineConfig) -> EpisodeResult<Self> {
        Self::new(generate_scenario(seed, timeframe), config)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn replay(&self) -> &ReplayController {
        &self.replay
    }

    pub fn markers(&self) -> &[ExamMarker] {
        &self.markers
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn result(&self) -> Option<&ExamResult> {
        self.result.as_ref()
    }

    pub fn is_graded(&self) -> bool {
        self.result.is_some()
    }

    pub fn ledger_state(&self) -> LedgerSnapshot {
        self.ledger.state()
    }

    pub fn pot_health(&self) -> PotHealth {
        self.ledger.pot_health()
    }

    pub fn visible_window(&self) -> &[Candle] {
        self.replay.visible_window()
    }

    pub fn play(&mut self) -> EpisodeResult<()> {
        if self.is_graded() {
            return Err(EpisodeError::AlreadyGraded);
        }
        self.replay.play()
    }

    pub fn pause(&mut self) -> bool {
        self.replay.pause()
    }

    pub fn reset(&mut self) -> EpisodeResult<()> {
        if self.is_graded() {
            return Err(EpisodeError::AlreadyGraded);
        }
        self.replay.reset();
        Ok(())
    }

    pub fn seek(&mut self, delta: i64) -> EpisodeResult<usize> {
        if self.is_graded() {
            return Err(EpisodeError::AlreadyGraded);
        }
        self.replay.seek(delta)
    }

    pub fn set_rate(&mut self, rate: f64) -> EpisodeResult<()> {
        self.replay.set_rate(rate)
    }

    /// Advance one bar. Marks the ledger to the new close and grades on completion.
    pub fn tick(&mut self) -> Vec<ReplayEvent> {
        let events = self.replay.tick();
        if events.is_empty() {
            return events;
        }

        if let Some(price) = self.replay.current_candle().map(|c| c.close) {
            self.ledger.mark_to_market(price);
        }
        if events
            .iter()
            .any(|e| matches!(e, ReplayEvent::Completed { .. }))
        {
            self.finalize();
        }
        events
    }

    pub fn place_marker(&mut self, kind: MarkerKind, price: f64) -> EpisodeResult<ExamMarker> {
        self.accepting_intents()?;
        if !price.is_finite() || price <= 0.0 {
            return Err(self.reject(EpisodeError::InvalidPrice(price)));
        }
        let marker = ExamMarker::new(kind, price, self.replay.cursor());
        tracing::debug!(kind = ?kind, price, index = marker.time_index, "Marker placed");
        self.markers.push(marker.clone());
        Ok(marker)
    }

    /// Enter at the current close. One trade per episode; it is the one graded.
    pub fn open_trade(&mut self, side: TradeSide, stop_loss: Option<f64>) -> EpisodeResult<Trade> {
        self.accepting_intents()?;
        if self.ledger.trade().is_some() {
            return Err(self.reject(EpisodeError::TradeAlreadyTaken));
        }
        let price = self.current_price()?;
        let index = self.replay.cursor();
        let opened = self.ledger.open(side, price, stop_loss, index).cloned();
        opened.map_err(|err| self.reject(err))
    }

    /// Exit at the current close.
    pub fn close_trade(&mut self) -> EpisodeResult<Trade> {
        self.accepting_intents()?;
        let price = self.current_price()?;
        self.ledger.close(price).map_err(|err| self.reject(err))
    }

    /// Grade now. Pauses playback and closes any open position first.
    pub fn submit(&mut self) -> EpisodeResult<ExamResult> {
        if self.is_graded() {
            return Err(EpisodeError::AlreadyGraded);
        }
        self.replay.pause();
        self.finalize();
        self.result.clone().ok_or(EpisodeError::AlreadyGraded)
    }

    pub fn summary(&self) -> Option<EpisodeSummary> {
        let result = self.result.as_ref()?;
        Some(EpisodeSummary {
            episode_id: self.id,
            seed: self.scenario.seed,
            timeframe: self.scenario.timeframe,
            passed: result.passed,
            score: result.score,
            metrics: result.metrics,
            final_balance: self.ledger.balance(),
            started_at: self.started_at,
            completed_at: self.completed_at.unwrap_or(self.started_at),
        })
    }

    fn current_price(&self) -> EpisodeResult<f64> {
        self.replay
            .current_candle()
            .map(|c| c.close)
            .ok_or(EpisodeError::InvalidPrice(0.0))
    }

    fn accepting_intents(&mut self) -> EpisodeResult<()> {
        if self.is_graded() {
            return Err(self.reject(EpisodeError::AlreadyGraded));
        }
        if self.replay.state() == ReplayState::Complete {
            return Err(self.reject(EpisodeError::ReplayComplete));
        }
        Ok(())
    }

    fn reject(&mut self, err: EpisodeError) -> EpisodeError {
        let at_index = self.replay.cursor();
        tracing::warn!(episode = %self.id, index = at_index, error = %err, "Intent rejected");
        self.violations.push(Violation {
            at_index,
            reason: err.to_string(),
        });
        err
    }

    fn finalize(&mut self) {
        if self.is_graded() {
            return;
        }
        if self.ledger.has_open_position() {
            if let Ok(price) = self.current_price() {
                if let Err(err) = self.ledger.close(price) {
                    tracing::warn!(error = %err, "Auto-close failed");
                }
            }
        }

        let result = self.grader.grade(&GradingInput {
            markers: &self.markers,
            trade: self.ledger.trade(),
            ground_truth: &self.scenario.ground_truth,
            balance: self.ledger.balance(),
            starting_balance: self.ledger.starting_balance(),
            violations: &self.violations,
        });
        tracing::info!(
            episode = %self.id,
            passed = result.passed,
            score = result.score,
            "Episode finished"
        );
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }
}
