//! Playback driver
//!
//! Owns the timer task that ticks a shared [`Episode`] at its replay rate.
//! Cancellation is cooperative: the task checks the cancel signal before
//! every tick. A tick that finds the episode locked is skipped rather than
//! queued, so advances never overlap or burst after a stall.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::episode::Episode;
use crate::error::{EpisodeError, EpisodeResult};
use crate::replay::{ReplayEvent, ReplayState};

pub type SharedEpisode = Arc<Mutex<Episode>>;

pub struct PlaybackDriver {
    episode: SharedEpisode,
    cancel_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
    disposed: bool,
}

impl PlaybackDriver {
    pub fn new(episode: SharedEpisode) -> Self {
        Self {
            episode,
            cancel_tx: None,
            handle: None,
            disposed: false,
        }
    }

    pub fn episode(&self) -> SharedEpisode {
        self.episode.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Put the episode into play and start ticking. Any previous timer is stopped first.
    pub async fn start(&mut self) -> EpisodeResult<mpsc::UnboundedReceiver<ReplayEvent>> {
        if self.disposed {
            return Err(EpisodeError::InvalidConfig("playback driver was disposed".to_string()));
        }
        self.cancel_timer().await;

        let interval = {
            let mut episode = self.episode.lock().await;
            episode.play()?;
            episode.replay().tick_interval()
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let episode = self.episode.clone();

        tracing::info!(interval_ms = interval.as_millis() as u64, "Playback driver started");
        self.handle = Some(tokio::spawn(run_timer(episode, interval, cancel_rx, event_tx)));
        self.cancel_tx = Some(cancel_tx);

        Ok(event_rx)
    }

    /// Cancel the timer and pause the episode.
    pub async fn stop(&mut self) {
        self.cancel_timer().await;
        self.episode.lock().await.pause();
        tracing::info!("Playback driver stopped");
    }

    /// Cancel the timer for good. Safe to call any number of times.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        tracing::debug!("Playback driver disposed");
    }

    async fn cancel_timer(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Playback timer task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PlaybackDriver {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn run_timer(
    episode: SharedEpisode,
    mut interval: std::time::Duration,
    mut cancel_rx: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<ReplayEvent>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    break;
                }
                continue;
            }
        }
        if *cancel_rx.borrow() {
            break;
        }

        let mut guard = match episode.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("Episode busy, tick skipped");
                continue;
            }
        };
        if guard.replay().state() != ReplayState::Playing {
            break;
        }
        let ticked = guard.tick();
        interval = guard.replay().tick_interval();
        drop(guard);

        let mut complete = false;
        for event in ticked {
            complete |= matches!(event, ReplayEvent::Completed { .. });
            let _ = events.send(event);
        }
        if complete {
            tracing::info!("Playback driver finished: replay complete");
            break;
        }
    }
}
