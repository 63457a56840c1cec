// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Programs: immutable trees of wallet actions
//!
//! A program is created once, persisted alongside its execution state, and
//! never mutated afterwards. Composition nodes (`sequence`, `parallel`,
//! `conditional`, `repeat`) are walked by structural recursion; `leaf` nodes
//! carry the concrete [`Operation`] the evaluator performs.

use crate::id::{IdGen, ProgramId};
use crate::path::NodePath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Token amount in the smallest unit, serialized as a decimal string
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = ProgramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|_| ProgramError::InvalidAmount(s.to_string()))
    }
}

impl TryFrom<String> for Amount {
    type Error = ProgramError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Amount(value)
    }
}

/// Errors found while validating a program
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProgramError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid program id: {0:?}")]
    InvalidId(String),
    #[error("{path}: {reason}")]
    Invalid { path: NodePath, reason: String },
}

/// A concrete effectful step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Send funds to an address
    Transfer {
        wallet_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        address: String,
        amount: Amount,
        #[serde(default)]
        confirmations: u32,
    },
    /// Send funds to another of the client's wallets, at the receive
    /// address it reports when the step runs
    TransferToWallet {
        wallet_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        to_wallet_id: String,
        amount: Amount,
        #[serde(default)]
        confirmations: u32,
    },
    /// Quote and execute a swap between two wallets
    Swap {
        from_wallet_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_token_id: Option<String>,
        to_wallet_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_token_id: Option<String>,
        amount: Amount,
        #[serde(default)]
        confirmations: u32,
    },
    /// Broadcast a pre-signed transaction
    BroadcastTx {
        wallet_id: String,
        raw_tx: String,
        #[serde(default)]
        confirmations: u32,
    },
    /// Wait for an existing transaction to confirm
    WaitForTx {
        wallet_id: String,
        tx_id: String,
        confirmations: u32,
    },
    /// Wait for a relative amount of time
    Delay {
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
    /// Wait for an absolute wall-clock time
    WaitUntil { timestamp_ms: u64 },
    /// Wait for a wallet balance to cross a bound
    WaitForBalance {
        wallet_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        above: Option<Amount>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        below: Option<Amount>,
    },
    /// Wait for an exchange rate to cross a bound
    WaitForPrice {
        pair: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        above: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        below: Option<f64>,
    },
    /// Tell the rest of the application something happened
    Notify { title: String, message: String },
}

impl Operation {
    /// Short name used in logs and events
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Transfer { .. } => "transfer",
            Operation::TransferToWallet { .. } => "transfer_to_wallet",
            Operation::Swap { .. } => "swap",
            Operation::BroadcastTx { .. } => "broadcast_tx",
            Operation::WaitForTx { .. } => "wait_for_tx",
            Operation::Delay { .. } => "delay",
            Operation::WaitUntil { .. } => "wait_until",
            Operation::WaitForBalance { .. } => "wait_for_balance",
            Operation::WaitForPrice { .. } => "wait_for_price",
            Operation::Notify { .. } => "notify",
        }
    }

    /// True if invoking this operation submits something to the account
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            Operation::Transfer { .. }
                | Operation::TransferToWallet { .. }
                | Operation::Swap { .. }
                | Operation::BroadcastTx { .. }
        )
    }

    fn validate(&self, path: &NodePath) -> Result<(), ProgramError> {
        let invalid = |reason: &str| ProgramError::Invalid {
            path: path.clone(),
            reason: reason.to_string(),
        };
        match self {
            Operation::Transfer { amount, .. }
            | Operation::TransferToWallet { amount, .. }
            | Operation::Swap { amount, .. } => {
                if *amount == Amount::ZERO {
                    return Err(invalid("amount must be positive"));
                }
            }
            Operation::WaitForBalance { above, below, .. } => {
                if above.is_none() && below.is_none() {
                    return Err(invalid("wait_for_balance needs `above` or `below`"));
                }
            }
            Operation::WaitForPrice { above, below, .. } => {
                if above.is_none() && below.is_none() {
                    return Err(invalid("wait_for_price needs `above` or `below`"));
                }
            }
            Operation::BroadcastTx { raw_tx, .. } if raw_tx.is_empty() => {
                return Err(invalid("raw_tx is empty"));
            }
            _ => {}
        }
        Ok(())
    }
}

/// A condition on account or application state, decided once per use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    BalanceAbove {
        wallet_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        amount: Amount,
    },
    BalanceBelow {
        wallet_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        amount: Amount,
    },
    PriceAbove { pair: String, rate: f64 },
    PriceBelow { pair: String, rate: f64 },
    /// Truthy value under `key` in application state
    StateFlag { key: String },
    Not { predicate: Box<Predicate> },
    All { predicates: Vec<Predicate> },
    Any { predicates: Vec<Predicate> },
}

/// A node in a program's action tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Children run one after another
    Sequence { children: Vec<Action> },
    /// Children run independently; done when all are done
    Parallel { children: Vec<Action> },
    Leaf {
        operation: Operation,
        /// Overrides the engine's default retry limit
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_limit: Option<u32>,
        /// Deadline for the effect this step produces
        #[serde(
            default,
            with = "humantime_serde",
            skip_serializing_if = "Option::is_none"
        )]
        timeout: Option<Duration>,
    },
    /// `then` is child 0, `otherwise` child 1
    Conditional {
        predicate: Predicate,
        then: Box<Action>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<Action>>,
    },
    /// `body` is child 0
    Repeat {
        body: Box<Action>,
        until: Predicate,
        max_iterations: u32,
    },
}

impl Action {
    pub fn leaf(operation: Operation) -> Self {
        Action::Leaf {
            operation,
            retry_limit: None,
            timeout: None,
        }
    }

    pub fn sequence(children: impl IntoIterator<Item = Action>) -> Self {
        Action::Sequence {
            children: children.into_iter().collect(),
        }
    }

    pub fn parallel(children: impl IntoIterator<Item = Action>) -> Self {
        Action::Parallel {
            children: children.into_iter().collect(),
        }
    }

    /// Set the retry limit on a leaf; other nodes are returned unchanged
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        if let Action::Leaf { retry_limit, .. } = &mut self {
            *retry_limit = Some(limit);
        }
        self
    }

    /// Set the effect timeout on a leaf; other nodes are returned unchanged
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        if let Action::Leaf { timeout, .. } = &mut self {
            *timeout = Some(duration);
        }
        self
    }

    /// Child nodes in index order
    pub fn children(&self) -> Vec<&Action> {
        match self {
            Action::Sequence { children } | Action::Parallel { children } => {
                children.iter().collect()
            }
            Action::Leaf { .. } => Vec::new(),
            Action::Conditional {
                then, otherwise, ..
            } => {
                let mut out = vec![then.as_ref()];
                if let Some(otherwise) = otherwise {
                    out.push(otherwise.as_ref());
                }
                out
            }
            Action::Repeat { body, .. } => vec![body.as_ref()],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Action::Leaf { .. })
    }

    /// Find the node at `path`, relative to this node
    pub fn get(&self, path: &NodePath) -> Option<&Action> {
        let mut node = self;
        for &index in path.indices() {
            node = node.children().into_iter().nth(index)?;
        }
        Some(node)
    }

    /// Visit every node depth-first, parents before children
    pub fn walk<'a>(&'a self, path: NodePath, visit: &mut impl FnMut(&NodePath, &'a Action)) {
        visit(&path, self);
        for (index, child) in self.children().into_iter().enumerate() {
            child.walk(path.child(index), visit);
        }
    }

    fn validate(&self, path: &NodePath) -> Result<(), ProgramError> {
        match self {
            Action::Leaf { operation, .. } => operation.validate(path)?,
            Action::Repeat { max_iterations, .. } if *max_iterations == 0 => {
                return Err(ProgramError::Invalid {
                    path: path.clone(),
                    reason: "repeat needs max_iterations >= 1".to_string(),
                });
            }
            _ => {}
        }
        for (index, child) in self.children().into_iter().enumerate() {
            child.validate(&path.child(index))?;
        }
        Ok(())
    }
}

/// An immutable, serializable description of work to perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    #[serde(default)]
    pub name: String,
    pub root: Action,
}

impl Program {
    pub fn new(id: impl Into<ProgramId>, name: impl Into<String>, root: Action) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            root,
        }
    }

    /// A program with a freshly generated id
    pub fn generate(ids: &impl IdGen, name: impl Into<String>, root: Action) -> Self {
        Self::new(ids.next(), name, root)
    }

    /// Check structural rules that serde alone cannot enforce
    pub fn validate(&self) -> Result<(), ProgramError> {
        if !self.id.is_valid() {
            return Err(ProgramError::InvalidId(self.id.to_string()));
        }
        self.root.validate(&NodePath::root())
    }

    /// Node at `path`, if it exists
    pub fn node(&self, path: &NodePath) -> Option<&Action> {
        self.root.get(path)
    }

    /// Every node path in the tree, parents before children
    pub fn paths(&self) -> Vec<NodePath> {
        let mut paths = Vec::new();
        self.root
            .walk(NodePath::root(), &mut |path, _| paths.push(path.clone()));
        paths
    }
}

#[cfg(test)]
#[path = "program_tests.rs"]
mod tests;
