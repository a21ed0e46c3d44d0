//! Replay Controller
//!
//! Steps through a candle sequence bar by bar while hiding future bars from
//! the user. The controller is a plain state machine: [`ReplayController::tick`]
//! is the only thing that advances the cursor, so a real timer, a paused test
//! clock, or a loop in a unit test all drive exactly the same logic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::candle::Candle;
use crate::error::{EpisodeError, EpisodeResult};

/// Slowest and fastest playback, in bars per second.
pub const MIN_RATE: f64 = 0.5;
pub const MAX_RATE: f64 = 5.0;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplayState {
    Idle,
    Playing,
    Paused,
    Complete,
}

impl std::fmt::Display for ReplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayState::Idle => write!(f, "idle"),
            ReplayState::Playing => write!(f, "playing"),
            ReplayState::Paused => write!(f, "paused"),
            ReplayState::Complete => write!(f, "complete"),
        }
    }
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplayEvent {
    Advanced { index: usize },
    Completed { index: usize },
}

type TickListener = Box<dyn FnMut(usize, &Candle) + Send>;
type CompleteListener = Box<dyn FnMut(usize) + Send>;

/// Bar-by-bar playback over a candle sequence.
pub struct ReplayController {
    candles: Vec<Candle>,
    state: ReplayState,
    cursor: usize,
    initial_offset: usize,
    rate: f64,
    view_window: usize,
    allow_rewind: bool,
    completion_sent: bool,
    tick_listeners: Vec<TickListener>,
    complete_listeners: Vec<CompleteListener>,
}

impl std::fmt::Debug for ReplayController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayController")
            .field("bars", &self.candles.len())
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("initial_offset", &self.initial_offset)
            .field("rate", &self.rate)
            .field("view_window", &self.view_window)
            .field("allow_rewind", &self.allow_rewind)
            .finish()
    }
}

impl ReplayController {
    /// Create an idle controller. The offset is clamped to the last bar.
    pub fn new(candles: Vec<Candle>, initial_offset: usize) -> Self {
        let initial_offset = initial_offset.min(candles.len().saturating_sub(1));
        Self {
            candles,
            state: ReplayState::Idle,
            cursor: initial_offset,
            initial_offset,
            rate: 1.0,
            view_window: 40,
            allow_rewind: true,
            completion_sent: false,
            tick_listeners: Vec::new(),
            complete_listeners: Vec::new(),
        }
    }

    pub fn with_rate(mut self, rate: f64) -> EpisodeResult<Self> {
        self.set_rate(rate)?;
        Ok(self)
    }

    pub fn with_view_window(mut self, size: usize) -> Self {
        self.set_view_window(size);
        self
    }

    /// Exams disable rewinding: negative seeks become no-ops.
    pub fn with_rewind(mut self, allow_rewind: bool) -> Self {
        self.allow_rewind = allow_rewind;
        self
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn initial_offset(&self) -> usize {
        self.initial_offset
    }

    pub fn last_index(&self) -> usize {
        self.candles.len().saturating_sub(1)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn view_window(&self) -> usize {
        self.view_window
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn is_complete(&self) -> bool {
        self.state == ReplayState::Complete
    }

    /// Wall-clock time between ticks at the current rate.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate)
    }

    pub fn set_rate(&mut self, rate: f64) -> EpisodeResult<()> {
        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(EpisodeError::InvalidRate(rate));
        }
        self.rate = rate;
        Ok(())
    }

    pub fn set_view_window(&mut self, size: usize) {
        self.view_window = size.max(1);
    }

    pub fn on_tick<F>(&mut self, listener: F)
    where
        F: FnMut(usize, &Candle) + Send + 'static,
    {
        self.tick_listeners.push(Box::new(listener));
    }

    pub fn on_complete<F>(&mut self, listener: F)
    where
        F: FnMut(usize) + Send + 'static,
    {
        self.complete_listeners.push(Box::new(listener));
    }

    /// Start or resume playback. At the last bar, rewinds to the initial offset first.
    pub fn play(&mut self) -> EpisodeResult<()> {
        match self.state {
            ReplayState::Complete => Err(EpisodeError::ReplayComplete),
            ReplayState::Playing => Ok(()),
            ReplayState::Idle | ReplayState::Paused => {
                if self.cursor >= self.last_index() {
                    self.cursor = self.initial_offset;
                }
                tracing::debug!(from = %self.state, cursor = self.cursor, "Replay playing");
                self.state = ReplayState::Playing;
                Ok(())
            }
        }
    }

    /// Returns whether playback was actually paused.
    pub fn pause(&mut self) -> bool {
        if self.state != ReplayState::Playing {
            return false;
        }
        self.state = ReplayState::Paused;
        tracing::debug!(cursor = self.cursor, "Replay paused");
        true
    }

    /// Back to the initial offset and `Idle`, from any state.
    pub fn reset(&mut self) {
        self.state = ReplayState::Idle;
        self.cursor = self.initial_offset;
        self.completion_sent = false;
        tracing::debug!(cursor = self.cursor, "Replay reset");
    }

    /// Move the cursor by `delta` bars, clamped to the sequence. Returns the new cursor.
    ///
    /// Negative seeks are ignored while playing or when rewinding is disabled.
    pub fn seek(&mut self, delta: i64) -> EpisodeResult<usize> {
        if self.state == ReplayState::Complete {
            return Err(EpisodeError::ReplayComplete);
        }
        if delta < 0 && (!self.allow_rewind || self.state == ReplayState::Playing) {
            tracing::debug!(delta, state = %self.state, "Rewind not allowed, seek ignored");
            return Ok(self.cursor);
        }
        let target = (self.cursor as i64).saturating_add(delta);
        self.cursor = target.clamp(0, self.last_index() as i64) as usize;
        Ok(self.cursor)
    }

    /// Advance one bar if playing. Completion is reported exactly once.
    pub fn tick(&mut self) -> Vec<ReplayEvent> {
        let mut events = Vec::new();
        if self.state != ReplayState::Playing {
            return events;
        }

        if self.cursor < self.last_index() {
            self.cursor += 1;
            let index = self.cursor;
            let candle = &self.candles[index];
            for listener in self.tick_listeners.iter_mut() {
                listener(index, candle);
            }
            events.push(ReplayEvent::Advanced { index });
        }

        if self.cursor >= self.last_index() {
            self.state = ReplayState::Complete;
            if !self.completion_sent {
                self.completion_sent = true;
                let index = self.cursor;
                for listener in self.complete_listeners.iter_mut() {
                    listener(index);
                }
                tracing::info!(index, "Replay complete");
                events.push(ReplayEvent::Completed { index });
            }
        }

        events
    }

    /// Trailing window of at most `view_window` bars ending at the cursor.
    pub fn visible_window(&self) -> &[Candle] {
        if self.candles.is_empty() {
            return &[];
        }
        let end = self.cursor + 1;
        let start = end.saturating_sub(self.view_window);
        &self.candles[start..end]
    }

    pub fn current_candle(&self) -> Option<&Candle> {
        self.candles.get(self.cursor)
    }

    /// Extend the sequence (practice feeds). Does not change state.
    pub fn append<I>(&mut self, candles: I)
    where
        I: IntoIterator<Item = Candle>,
    {
        self.candles.extend(candles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let p = 100.0 + i as f64;
                Candle {
                    time: format!("Day {}", i + 1),
                    open: p,
                    high: p + 1.0,
                    low: p - 1.0,
                    close: p + 0.5,
                }
            })
            .collect()
    }

    #[test]
    fn test_play_and_tick_advance() {
        let mut replay = ReplayController::new(candles(10), 3);
        assert_eq!(replay.state(), ReplayState::Idle);
        assert!(replay.tick().is_empty());

        replay.play().unwrap();
        assert_eq!(replay.tick(), vec![ReplayEvent::Advanced { index: 4 }]);
        assert_eq!(replay.cursor(), 4);
        assert_eq!(replay.current_candle().unwrap().time, "Day 5");
    }

    #[test]
    fn test_completion_emitted_exactly_once() {
        let mut replay = ReplayController::new(candles(6), 3);
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = completions.clone();
        replay.on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        replay.play().unwrap();
        replay.tick();
        let events = replay.tick();
        assert_eq!(
            events,
            vec![
                ReplayEvent::Advanced { index: 5 },
                ReplayEvent::Completed { index: 5 }
            ]
        );
        assert_eq!(replay.state(), ReplayState::Complete);

        for _ in 0..5 {
            assert!(replay.tick().is_empty());
        }
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cursor_monotonic_while_playing() {
        let mut replay = ReplayController::new(candles(60), 30);
        replay.play().unwrap();
        let mut last = replay.cursor();
        while !replay.is_complete() {
            replay.tick();
            assert!(replay.cursor() >= last);
            last = replay.cursor();
        }
        assert_eq!(last, 59);
    }

    #[test]
    fn test_pause_stops_advancing() {
        let mut replay = ReplayController::new(candles(10), 0);
        replay.play().unwrap();
        replay.tick();
        assert!(replay.pause());
        assert!(!replay.pause());
        assert!(replay.tick().is_empty());
        assert_eq!(replay.cursor(), 1);

        replay.play().unwrap();
        replay.tick();
        assert_eq!(replay.cursor(), 2);
    }

    #[test]
    fn test_reset_restores_initial_offset() {
        let mut replay = ReplayController::new(candles(40), 30);
        replay.play().unwrap();
        while !replay.is_complete() {
            replay.tick();
        }
        assert_eq!(replay.play(), Err(EpisodeError::ReplayComplete));
        assert_eq!(replay.seek(-1), Err(EpisodeError::ReplayComplete));

        replay.reset();
        assert_eq!(replay.state(), ReplayState::Idle);
        assert_eq!(replay.cursor(), 30);
        replay.play().unwrap();
    }

    #[test]
    fn test_play_at_last_bar_rewinds_first() {
        let mut replay = ReplayController::new(candles(10), 2);
        replay.seek(100).unwrap();
        assert_eq!(replay.cursor(), 9);
        replay.play().unwrap();
        assert_eq!(replay.cursor(), 2);
        assert_eq!(replay.state(), ReplayState::Playing);
    }

    #[test]
    fn test_seek_clamps() {
        let mut replay = ReplayController::new(candles(10), 5);
        assert_eq!(replay.seek(-100).unwrap(), 0);
        assert_eq!(replay.seek(i64::MAX).unwrap(), 9);
        assert_eq!(replay.state(), ReplayState::Idle);
    }

    #[test]
    fn test_rewind_disabled_ignores_negative_seek() {
        let mut replay = ReplayController::new(candles(10), 5).with_rewind(false);
        assert_eq!(replay.seek(-3).unwrap(), 5);
        assert_eq!(replay.seek(2).unwrap(), 7);
    }

    #[test]
    fn test_no_rewind_while_playing() {
        let mut replay = ReplayController::new(candles(20), 5);
        replay.play().unwrap();
        replay.tick();
        assert_eq!(replay.seek(-3).unwrap(), 6);
        assert_eq!(replay.seek(2).unwrap(), 8);

        replay.pause();
        assert_eq!(replay.seek(-3).unwrap(), 5);
    }

    #[test]
    fn test_visible_window() {
        let mut replay = ReplayController::new(candles(100), 10).with_view_window(40);
        assert_eq!(replay.visible_window().len(), 11);

        replay.seek(50).unwrap();
        let window = replay.visible_window();
        assert_eq!(window.len(), 40);
        assert_eq!(window.last().unwrap().time, "Day 61");
        assert_eq!(window.first().unwrap().time, "Day 22");

        assert!(ReplayController::new(Vec::new(), 0).visible_window().is_empty());
    }

    #[test]
    fn test_rate_validation() {
        let mut replay = ReplayController::new(candles(5), 0);
        assert_eq!(replay.set_rate(0.1), Err(EpisodeError::InvalidRate(0.1)));
        replay.set_rate(2.0).unwrap();
        assert_eq!(replay.tick_interval(), Duration::from_millis(500));
        assert!(ReplayController::new(candles(5), 0).with_rate(5.5).is_err());
    }

    #[test]
    fn test_tick_listener_sees_new_bar() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut replay = ReplayController::new(candles(5), 0);
        replay.on_tick(move |index, candle| {
            sink.lock().unwrap().push((index, candle.close));
        });
        replay.play().unwrap();
        replay.tick();
        replay.tick();
        assert_eq!(*seen.lock().unwrap(), vec![(1, 101.5), (2, 102.5)]);
    }

    #[test]
    fn test_append_extends_sequence() {
        let mut replay = ReplayController::new(candles(3), 0);
        replay.play().unwrap();
        replay.tick();
        replay.append(candles(3));
        assert_eq!(replay.last_index(), 5);
        replay.tick();
        replay.tick();
        assert_eq!(replay.cursor(), 3);
        assert_eq!(replay.state(), ReplayState::Playing);
    }
}
