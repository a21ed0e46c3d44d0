//! Position Ledger
//!
//! Tracks the single simulated position of an episode and the account
//! balance it is funded from (the Pot).

use serde::{Deserialize, Serialize};

use crate::error::{EpisodeError, EpisodeResult};

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    pub fn opposite(&self) -> Self {
        match self {
            TradeSide::Long => TradeSide::Short,
            TradeSide::Short => TradeSide::Long,
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Long => write!(f, "LONG"),
            TradeSide::Short => write!(f, "SHORT"),
        }
    }
}

impl std::str::FromStr for TradeSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long" | "buy" => Ok(TradeSide::Long),
            "short" | "sell" => Ok(TradeSide::Short),
            _ => Err(anyhow::anyhow!("Invalid trade side: {}", s)),
        }
    }
}

/// A simulated position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub entry_price: f64,
    /// Always set for ledger-opened trades; optional for externally supplied records
    pub stop_loss: Option<f64>,
    pub exit_price: Option<f64>,
    /// Running while open, realized once closed
    pub pnl: f64,
    pub opened_at_index: usize,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit_price.is_none()
    }
}

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub starting_balance: f64,
    /// Realized balance
    pub balance: f64,
    /// Balance plus unrealized P&L
    pub equity: f64,
    /// Open trade, or the last closed one
    pub trade: Option<Trade>,
    pub position_open: bool,
}

/// Drawdown against the daily loss limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PotHealth {
    pub daily_loss: f64,
    pub max_daily_loss: f64,
    /// `daily_loss / max_daily_loss`, capped at 100
    pub limit_used_pct: f64,
    /// New positions are refused while locked
    pub locked: bool,
}

/// Single-position ledger.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    starting_balance: f64,
    balance: f64,
    position_multiplier: f64,
    max_daily_loss: f64,
    trade: Option<Trade>,
}

impl PositionLedger {
    pub fn new(starting_balance: f64, position_multiplier: f64, max_daily_loss: f64) -> Self {
        Self {
            starting_balance,
            balance: starting_balance,
            position_multiplier,
            max_daily_loss,
            trade: None,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn starting_balance(&self) -> f64 {
        self.starting_balance
    }

    pub fn has_open_position(&self) -> bool {
        self.trade.as_ref().is_some_and(Trade::is_open)
    }

    /// Resident trade: the open one, or the most recently closed one.
    pub fn trade(&self) -> Option<&Trade> {
        self.trade.as_ref()
    }

    fn pnl(&self, side: TradeSide, entry_price: f64, price: f64) -> f64 {
        let diff = match side {
            TradeSide::Long => price - entry_price,
            TradeSide::Short => entry_price - price,
        };
        diff * self.position_multiplier
    }

    /// Open a position. A stop loss is mandatory.
    pub fn open(
        &mut self,
        side: TradeSide,
        entry_price: f64,
        stop_loss: Option<f64>,
        opened_at_index: usize,
    ) -> EpisodeResult<&Trade> {
        if self.has_open_position() {
            return Err(EpisodeError::PositionAlreadyOpen);
        }
        let stop_loss = stop_loss.ok_or(EpisodeError::MissingStopLoss)?;
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(EpisodeError::InvalidPrice(entry_price));
        }
        if !stop_loss.is_finite() || stop_loss <= 0.0 {
            return Err(EpisodeError::InvalidPrice(stop_loss));
        }
        let health = self.pot_health();
        if health.locked {
            return Err(EpisodeError::CooldownLocked {
                daily_loss: health.daily_loss,
                limit: health.max_daily_loss,
            });
        }

        tracing::info!(
            side = %side,
            entry_price,
            stop_loss,
            index = opened_at_index,
            "Position opened"
        );

        Ok(self.trade.insert(Trade {
            side,
            entry_price,
            stop_loss: Some(stop_loss),
            exit_price: None,
            pnl: 0.0,
            opened_at_index,
        }))
    }

    /// Refresh unrealized P&L. Returns it, or `None` when flat.
    pub fn mark_to_market(&mut self, current_price: f64) -> Option<f64> {
        let (side, entry_price) = match &self.trade {
            Some(trade) if trade.is_open() => (trade.side, trade.entry_price),
            _ => return None,
        };
        let pnl = self.pnl(side, entry_price, current_price);
        if let Some(trade) = self.trade.as_mut() {
            trade.pnl = pnl;
        }
        Some(pnl)
    }

    /// Close the open position and realize its P&L into the balance.
    pub fn close(&mut self, exit_price: f64) -> EpisodeResult<Trade> {
        if !self.has_open_position() {
            return Err(EpisodeError::NoOpenPosition);
        }
        if !exit_price.is_finite() || exit_price <= 0.0 {
            return Err(EpisodeError::InvalidPrice(exit_price));
        }

        let (side, entry_price) = match &self.trade {
            Some(trade) => (trade.side, trade.entry_price),
            None => return Err(EpisodeError::NoOpenPosition),
        };
        let pnl = self.pnl(side, entry_price, exit_price);
        self.balance += pnl;

        let trade = self.trade.as_mut().ok_or(EpisodeError::NoOpenPosition)?;
        trade.exit_price = Some(exit_price);
        trade.pnl = pnl;

        tracing::info!(side = %side, exit_price, pnl, balance = self.balance, "Position closed");
        Ok(trade.clone())
    }

    pub fn pot_health(&self) -> PotHealth {
        let daily_loss = (self.starting_balance - self.balance).max(0.0);
        let limit_used_pct = if self.max_daily_loss > 0.0 {
            (daily_loss / self.max_daily_loss * 100.0).min(100.0)
        } else {
            0.0
        };
        PotHealth {
            daily_loss,
            max_daily_loss: self.max_daily_loss,
            limit_used_pct,
            locked: self.max_daily_loss > 0.0 && daily_loss >= self.max_daily_loss,
        }
    }

    pub fn state(&self) -> LedgerSnapshot {
        let unrealized = match &self.trade {
            Some(trade) if trade.is_open() => trade.pnl,
            _ => 0.0,
        };
        LedgerSnapshot {
            starting_balance: self.starting_balance,
            balance: self.balance,
            equity: self.balance + unrealized,
            trade: self.trade.clone(),
            position_open: self.has_open_position(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> PositionLedger {
        PositionLedger::new(10_000.0, 100.0, 500.0)
    }

    #[test]
    fn test_open_requires_stop_loss() {
        let mut ledger = ledger();
        assert_eq!(
            ledger.open(TradeSide::Short, 101.5, None, 45),
            Err(EpisodeError::MissingStopLoss)
        );
        assert!(ledger.trade().is_none());
    }

    #[test]
    fn test_second_open_is_rejected_and_leaves_trade_unchanged() {
        let mut ledger = ledger();
        ledger.open(TradeSide::Short, 101.5, Some(103.0), 45).unwrap();
        let before = ledger.trade().cloned();

        let err = ledger.open(TradeSide::Long, 99.0, Some(98.0), 50).unwrap_err();
        assert_eq!(err, EpisodeError::PositionAlreadyOpen);
        assert_eq!(ledger.trade().cloned(), before);
    }

    #[test]
    fn test_mark_to_market() {
        let mut ledger = ledger();
        assert_eq!(ledger.mark_to_market(100.0), None);

        ledger.open(TradeSide::Short, 101.5, Some(103.0), 45).unwrap();
        let pnl = ledger.mark_to_market(100.5).unwrap();
        assert!((pnl - 100.0).abs() < 1e-9);

        let state = ledger.state();
        assert!(state.position_open);
        assert!((state.equity - 10_100.0).abs() < 1e-9);
        assert_eq!(state.balance, 10_000.0);
    }

    #[test]
    fn test_close_realizes_pnl() {
        let mut ledger = ledger();
        ledger.open(TradeSide::Long, 100.0, Some(99.0), 10).unwrap();
        let trade = ledger.close(101.25).unwrap();

        assert_eq!(trade.exit_price, Some(101.25));
        assert!((trade.pnl - 125.0).abs() < 1e-9);
        assert!((ledger.balance() - 10_125.0).abs() < 1e-9);
        assert!(!ledger.has_open_position());
        // Closed trade stays resident until the next open
        assert_eq!(ledger.trade(), Some(&trade));

        ledger.open(TradeSide::Short, 101.0, Some(102.0), 20).unwrap();
        assert_eq!(ledger.trade().unwrap().side, TradeSide::Short);
    }

    #[test]
    fn test_close_without_position() {
        let mut ledger = ledger();
        assert_eq!(ledger.close(100.0), Err(EpisodeError::NoOpenPosition));
    }

    #[test]
    fn test_invalid_prices() {
        let mut ledger = ledger();
        assert!(matches!(
            ledger.open(TradeSide::Long, f64::NAN, Some(99.0), 0),
            Err(EpisodeError::InvalidPrice(_))
        ));
        assert!(matches!(
            ledger.open(TradeSide::Long, 100.0, Some(-1.0), 0),
            Err(EpisodeError::InvalidPrice(_))
        ));
    }

    #[test]
    fn test_cooldown_lock_after_daily_loss() {
        let mut ledger = ledger();
        ledger.open(TradeSide::Long, 100.0, Some(95.0), 0).unwrap();
        ledger.close(94.0).unwrap(); // -600

        let health = ledger.pot_health();
        assert!(health.locked);
        assert_eq!(health.limit_used_pct, 100.0);
        assert!(matches!(
            ledger.open(TradeSide::Long, 94.0, Some(93.0), 1),
            Err(EpisodeError::CooldownLocked { .. })
        ));
    }

    #[test]
    fn test_trade_serializes_with_type_tag() {
        let trade = Trade {
            side: TradeSide::Short,
            entry_price: 101.5,
            stop_loss: Some(103.0),
            exit_price: None,
            pnl: 0.0,
            opened_at_index: 45,
        };
        let json = serde_json::to_value(&trade).unwrap();
        assert_eq!(json["type"], "SHORT");
        assert_eq!(json["stopLoss"], 103.0);
        assert_eq!(json["openedAtIndex"], 45);
    }
}
