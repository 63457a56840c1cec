// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects: persisted descriptors of external conditions a step waits on
//!
//! An effect holds everything needed to check the condition later, after a
//! restart if need be, without re-running the step that produced it.

use crate::program::Amount;
use serde::{Deserialize, Serialize};

/// An external condition plus an optional deadline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub condition: Condition,
    /// Wall-clock deadline in Unix milliseconds; past it, a condition that
    /// is not yet satisfied counts as failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl Effect {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            deadline_ms: None,
        }
    }

    pub fn with_deadline(mut self, deadline_ms: Option<u64>) -> Self {
        self.deadline_ms = deadline_ms;
        self
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.deadline_ms.is_some_and(|deadline| now_ms >= deadline)
    }
}

/// Condition kinds the checker knows how to observe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// A transaction has reached a confirmation depth
    TxConfirmation {
        wallet_id: String,
        tx_id: String,
        confirmations: u32,
    },
    /// A wallet balance has crossed a bound
    AddressBalance {
        wallet_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        above: Option<Amount>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        below: Option<Amount>,
    },
    /// An exchange rate has crossed a bound
    PriceLevel {
        pair: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        above: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        below: Option<f64>,
    },
    /// Wall-clock time has reached a timestamp
    UnixTime { timestamp_ms: u64 },
    /// Every sub-condition holds
    All { conditions: Vec<Condition> },
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::TxConfirmation { .. } => "tx_confirmation",
            Condition::AddressBalance { .. } => "address_balance",
            Condition::PriceLevel { .. } => "price_level",
            Condition::UnixTime { .. } => "unix_time",
            Condition::All { .. } => "all",
        }
    }
}

/// Result of checking an effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EffectStatus {
    /// Not yet satisfied; check again later
    Pending,
    Satisfied,
    /// Permanently false; never retried
    Failed { reason: String },
}

impl EffectStatus {
    pub fn failed(reason: impl Into<String>) -> Self {
        EffectStatus::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EffectStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_inclusive_of_deadline() {
        let effect = Effect::new(Condition::UnixTime { timestamp_ms: 10 }).with_deadline(Some(100));
        assert!(!effect.is_expired(99));
        assert!(effect.is_expired(100));
        assert!(!Effect::new(Condition::UnixTime { timestamp_ms: 10 }).is_expired(u64::MAX));
    }

    #[test]
    fn effect_json_carries_no_runtime_state() {
        let effect = Effect::new(Condition::All {
            conditions: vec![
                Condition::TxConfirmation {
                    wallet_id: "btc".to_string(),
                    tx_id: "abc".to_string(),
                    confirmations: 3,
                },
                Condition::PriceLevel {
                    pair: "BTC_USD".to_string(),
                    above: None,
                    below: Some(70_000.0),
                },
            ],
        })
        .with_deadline(Some(5));

        let json = serde_json::to_value(&effect).unwrap();
        assert_eq!(json["condition"]["type"], "all");
        assert_eq!(json["condition"]["conditions"][0]["tx_id"], "abc");
        assert_eq!(json["deadline_ms"], 5);

        let back: Effect = serde_json::from_value(json).unwrap();
        assert_eq!(back, effect);
    }
}
