use thiserror::Error;

/// Rejections raised by the episode core.
///
/// Every variant is a precondition the grading subject can trip over; the
/// episode layer turns them into feedback lines rather than surfacing them
/// as crashes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EpisodeError {
    #[error("A position is already open")]
    PositionAlreadyOpen,

    #[error("A stop loss is required to open a position")]
    MissingStopLoss,

    #[error("A trade has already been taken this episode")]
    TradeAlreadyTaken,

    #[error("No open position to close")]
    NoOpenPosition,

    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    #[error("Daily loss limit reached ({daily_loss:.2} of {limit:.2}); cool-down lock active")]
    CooldownLocked { daily_loss: f64, limit: f64 },

    #[error("Replay is complete; reset before playing or seeking again")]
    ReplayComplete,

    #[error("Invalid playback rate: {0}")]
    InvalidRate(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Episode has already been graded")]
    AlreadyGraded,
}

pub type EpisodeResult<T> = Result<T, EpisodeError>;
