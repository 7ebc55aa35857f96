//! Signal combiner
//!
//! Fuses the opinions of a fixed set of strategies into one target position.

use crate::error::TradingError;
use crate::strategy::Direction;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Voting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinerPolicy {
    /// Common opinion when all opinions agree, else flat
    #[default]
    Unanimous,
    /// Sign of the sum of opinions
    SignOfSum,
}

#[derive(Debug, Clone)]
pub struct SignalCombiner {
    policy: CombinerPolicy,
    strategies: Vec<String>,
}

impl SignalCombiner {
    pub fn new(policy: CombinerPolicy, strategies: Vec<String>) -> Result<Self> {
        if strategies.is_empty() {
            return Err(TradingError::config("signal combiner needs at least one strategy").into());
        }
        let unique: BTreeSet<&String> = strategies.iter().collect();
        if unique.len() != strategies.len() {
            return Err(TradingError::config("signal combiner strategies must be unique").into());
        }
        Ok(Self { policy, strategies })
    }

    pub fn policy(&self) -> CombinerPolicy {
        self.policy
    }

    pub fn strategies(&self) -> &[String] {
        &self.strategies
    }

    /// Every configured strategy must have an opinion; extra entries are ignored
    pub fn combine(&self, opinions: &BTreeMap<String, Direction>) -> Result<Direction> {
        let votes = self
            .strategies
            .iter()
            .map(|name| {
                opinions
                    .get(name)
                    .copied()
                    .ok_or_else(|| TradingError::MissingOpinion(name.clone()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let target = match self.policy {
            CombinerPolicy::Unanimous => {
                let first = votes[0];
                if votes.iter().all(|&v| v == first) {
                    first
                } else {
                    Direction::Flat
                }
            }
            CombinerPolicy::SignOfSum => {
                Direction::from_sum(votes.iter().map(|v| i64::from(v.as_i8())).sum())
            }
        };
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Direction::{Flat, Long, Short};

    fn opinions(values: &[(&str, Direction)]) -> BTreeMap<String, Direction> {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn combiner(policy: CombinerPolicy, names: &[&str]) -> SignalCombiner {
        SignalCombiner::new(policy, names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_unanimous() {
        let c = combiner(CombinerPolicy::Unanimous, &["A", "B", "C"]);
        assert_eq!(c.combine(&opinions(&[("A", Long), ("B", Long), ("C", Long)])).unwrap(), Long);
        assert_eq!(c.combine(&opinions(&[("A", Long), ("B", Long), ("C", Short)])).unwrap(), Flat);
        assert_eq!(c.combine(&opinions(&[("A", Short), ("B", Short), ("C", Short)])).unwrap(), Short);
    }

    #[test]
    fn test_sign_of_sum() {
        let c = combiner(CombinerPolicy::SignOfSum, &["A", "B", "C"]);
        assert_eq!(c.combine(&opinions(&[("A", Long), ("B", Long), ("C", Short)])).unwrap(), Long);
        let c = combiner(CombinerPolicy::SignOfSum, &["A", "B"]);
        assert_eq!(c.combine(&opinions(&[("A", Long), ("B", Short)])).unwrap(), Flat);
    }

    #[test]
    fn test_missing_opinion_is_an_error() {
        let c = combiner(CombinerPolicy::SignOfSum, &["A", "B"]);
        let err = c.combine(&opinions(&[("A", Long)])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TradingError>(),
            Some(TradingError::MissingOpinion(name)) if name == "B"
        ));
    }

    #[test]
    fn test_construction_errors() {
        assert!(SignalCombiner::new(CombinerPolicy::Unanimous, vec![]).is_err());
        assert!(SignalCombiner::new(CombinerPolicy::Unanimous, vec!["A".into(), "A".into()]).is_err());
    }
}
