//! Position state machine
//!
//! States are short, flat and long. Moving between opposite directions trades
//! twice the base unit in one order, to or from flat trades one unit.

use crate::strategy::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order adjustment that moves the position from `from` to `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlan {
    /// Signed units to trade
    pub units: i64,
    pub from: Direction,
    pub to: Direction,
}

impl OrderPlan {
    /// Report heading of the transition
    pub fn going(&self) -> &'static str {
        match self.to {
            Direction::Long => "GOING LONG",
            Direction::Short => "GOING SHORT",
            Direction::Flat => "GOING NEUTRAL",
        }
    }
}

impl fmt::Display for OrderPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {}, {:+} units)", self.going(), self.from, self.to, self.units)
    }
}

/// Minimal order moving `current` to `target`, `None` when they agree
pub fn plan_transition(current: Direction, target: Direction, unit: i64) -> Option<OrderPlan> {
    if current == target {
        return None;
    }
    let steps = i64::from(target.as_i8() - current.as_i8());
    Some(OrderPlan {
        units: steps * unit,
        from: current,
        to: target,
    })
}

/// Held position; only advanced with a confirmed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionState {
    direction: Direction,
}

impl PositionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn plan(&self, target: Direction, unit: i64) -> Option<OrderPlan> {
        plan_transition(self.direction, target, unit)
    }

    /// Apply a plan after its order was confirmed
    pub fn confirm(&mut self, plan: &OrderPlan) {
        self.direction = plan.to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Direction::{Flat, Long, Short};

    #[test]
    fn test_transition_deltas() {
        let unit = 100_000;
        assert_eq!(plan_transition(Flat, Long, unit).unwrap().units, unit);
        assert_eq!(plan_transition(Long, Short, unit).unwrap().units, -2 * unit);
        assert_eq!(plan_transition(Short, Flat, unit).unwrap().units, unit);
        assert_eq!(plan_transition(Short, Long, unit).unwrap().units, 2 * unit);
        assert_eq!(plan_transition(Long, Flat, unit).unwrap().units, -unit);
        assert_eq!(plan_transition(Flat, Short, unit).unwrap().units, -unit);
        for d in [Short, Flat, Long] {
            assert!(plan_transition(d, d, unit).is_none());
        }
    }

    #[test]
    fn test_state_only_moves_on_confirm() {
        let mut state = PositionState::new();
        assert_eq!(state.direction(), Flat);
        let plan = state.plan(Long, 10).unwrap();
        assert_eq!(state.direction(), Flat);
        state.confirm(&plan);
        assert_eq!(state.direction(), Long);
        assert_eq!(plan.going(), "GOING LONG");
        assert!(state.plan(Long, 10).is_none());
    }
}
