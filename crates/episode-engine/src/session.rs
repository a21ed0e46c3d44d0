//! Trading session windows (killzones).

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Killzone {
    Asia,
    London,
    NyAm,
    NyPm,
    None,
}

impl Killzone {
    /// Classify a New York wall-clock time.
    pub fn at(time: NaiveTime) -> Self {
        match time.hour() {
            2..=4 => Killzone::London,
            9..=11 => Killzone::NyAm,
            13..=15 => Killzone::NyPm,
            20..=23 | 0 => Killzone::Asia,
            _ => Killzone::None,
        }
    }

    /// Asia builds the range; entries belong to the other sessions.
    pub fn is_trading_window(&self) -> bool {
        !matches!(self, Killzone::Asia | Killzone::None)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Killzone::Asia => "Asia Range",
            Killzone::London => "London Open",
            Killzone::NyAm => "NY AM Session",
            Killzone::NyPm => "NY PM Session",
            Killzone::None => "Dead Zone",
        }
    }
}

impl std::fmt::Display for Killzone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> Killzone {
        Killzone::at(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    #[test]
    fn test_killzone_boundaries() {
        assert_eq!(at(1, 59), Killzone::None);
        assert_eq!(at(2, 0), Killzone::London);
        assert_eq!(at(4, 59), Killzone::London);
        assert_eq!(at(5, 0), Killzone::None);
        assert_eq!(at(9, 30), Killzone::NyAm);
        assert_eq!(at(13, 30), Killzone::NyPm);
        assert_eq!(at(18, 30), Killzone::None);
        assert_eq!(at(20, 0), Killzone::Asia);
        assert_eq!(at(0, 45), Killzone::Asia);
    }

    #[test]
    fn test_trading_window() {
        assert!(Killzone::London.is_trading_window());
        assert!(Killzone::NyAm.is_trading_window());
        assert!(!Killzone::Asia.is_trading_window());
        assert!(!Killzone::None.is_trading_window());
    }
}
