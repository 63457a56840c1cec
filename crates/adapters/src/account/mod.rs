// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account/wallet capability
//!
//! The engine never talks to a wallet SDK directly; everything goes through
//! an [`AccountAdapter`]. Submissions carry an idempotency key so that a
//! step re-run after a crash is answered with the original receipt instead
//! of being executed twice.

mod noop;

pub use noop::NoOpAccountAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{AccountCall, FakeAccountAdapter};

use aq_core::Amount;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors from account operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("wallet not found: {0}")]
    WalletNotFound(String),
    #[error("transaction not found: {0}")]
    TxNotFound(String),
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("account unavailable")]
    Unavailable,
}

/// On-chain status of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Not visible yet; may still propagate
    Unknown,
    /// Seen with the given confirmation depth (0 = in mempool)
    Confirming { confirmations: u32 },
    /// Permanently rejected or dropped
    Rejected { reason: String },
}

/// Proof that a submission was accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub wallet_id: String,
    pub tx_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub idempotency_key: String,
    pub wallet_id: String,
    pub token_id: Option<String>,
    pub address: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub idempotency_key: String,
    pub from_wallet_id: String,
    pub from_token_id: Option<String>,
    pub to_wallet_id: String,
    pub to_token_id: Option<String>,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastRequest {
    pub idempotency_key: String,
    pub wallet_id: String,
    pub raw_tx: String,
}

/// Account-side changes the driver can use as wake-up signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    TransactionsChanged { wallet_id: String },
    BalanceChanged { wallet_id: String },
    BlockHeightChanged { wallet_id: String, height: u64 },
    RatesUpdated,
}

/// Adapter for wallet/account operations
#[async_trait]
pub trait AccountAdapter: Clone + Send + Sync + 'static {
    /// Current balance of a wallet (or one of its tokens)
    async fn balance(&self, wallet_id: &str, token_id: Option<&str>)
        -> Result<Amount, AccountError>;

    /// An address the wallet can receive on
    async fn receive_address(&self, wallet_id: &str) -> Result<String, AccountError>;

    /// Status of a transaction
    async fn tx_status(&self, wallet_id: &str, tx_id: &str) -> Result<TxStatus, AccountError>;

    /// Exchange rate for a currency pair such as `BTC_USD`
    async fn exchange_rate(&self, pair: &str) -> Result<f64, AccountError>;

    /// Send funds. Idempotent per `idempotency_key`.
    async fn send(&self, request: &SendRequest) -> Result<TxReceipt, AccountError>;

    /// Quote and execute a swap. Idempotent per `idempotency_key`.
    async fn swap(&self, request: &SwapRequest) -> Result<TxReceipt, AccountError>;

    /// Broadcast a pre-signed transaction. Idempotent per `idempotency_key`.
    async fn broadcast(&self, request: &BroadcastRequest) -> Result<TxReceipt, AccountError>;

    /// Subscribe to account changes
    fn subscribe(&self) -> broadcast::Receiver<AccountEvent>;
}
