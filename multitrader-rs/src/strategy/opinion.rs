//! Directional opinions and positions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Short, flat or long; used for opinions, targets and held positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Short,
    #[default]
    Flat,
    Long,
}

impl Direction {
    pub fn as_i8(self) -> i8 {
        match self {
            Direction::Short => -1,
            Direction::Flat => 0,
            Direction::Long => 1,
        }
    }

    /// Sign of `value`; zero and NaN are flat
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Direction::Long
        } else if value < 0.0 {
            Direction::Short
        } else {
            Direction::Flat
        }
    }

    pub fn from_sum(sum: i64) -> Self {
        match sum.signum() {
            1 => Direction::Long,
            -1 => Direction::Short,
            _ => Direction::Flat,
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Direction::Short => Direction::Long,
            Direction::Flat => Direction::Flat,
            Direction::Long => Direction::Short,
        }
    }

    pub fn is_flat(self) -> bool {
        self == Direction::Flat
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Short => write!(f, "SHORT"),
            Direction::Flat => write!(f, "NEUTRAL"),
            Direction::Long => write!(f, "LONG"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_sign() {
        assert_eq!(Direction::from_sign(0.3), Direction::Long);
        assert_eq!(Direction::from_sign(-1e-9), Direction::Short);
        assert_eq!(Direction::from_sign(0.0), Direction::Flat);
        assert_eq!(Direction::from_sign(-0.0), Direction::Flat);
        assert_eq!(Direction::from_sign(f64::NAN), Direction::Flat);
        assert_eq!(Direction::from_sum(-3), Direction::Short);
        assert_eq!(Direction::Long.negate(), Direction::Short);
        assert_eq!(Direction::Short.as_i8(), -1);
    }
}
