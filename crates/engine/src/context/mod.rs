// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution context: the capabilities a program runs against
//!
//! The evaluator and checker are generic over [`ExecutionContext`] and never
//! know which backend they were given. [`LiveContext`] delegates to real
//! adapters. [`MockContext`] is scripted and deterministic, and is only
//! compiled for tests or with the `test-support` feature.

mod live;

pub use live::LiveContext;

#[cfg(any(test, feature = "test-support"))]
mod mock;
#[cfg(any(test, feature = "test-support"))]
pub use mock::MockContext;

use aq_adapters::{
    AccountError, AccountEvent, BroadcastRequest, DispatchError, SendRequest, StateReadError,
    SwapRequest, TxReceipt, TxStatus,
};
use aq_core::{Amount, Event};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

#[async_trait]
pub trait ExecutionContext: Send + Sync {
    /// Identifier of the caller that owns the programs run in this context
    fn client_id(&self) -> &str;

    /// Wall-clock time in milliseconds since the epoch
    fn now_ms(&self) -> u64;

    async fn balance(&self, wallet_id: &str, token_id: Option<&str>)
        -> Result<Amount, AccountError>;

    async fn receive_address(&self, wallet_id: &str) -> Result<String, AccountError>;

    async fn tx_status(&self, wallet_id: &str, tx_id: &str) -> Result<TxStatus, AccountError>;

    async fn exchange_rate(&self, pair: &str) -> Result<f64, AccountError>;

    async fn send(&self, request: &SendRequest) -> Result<TxReceipt, AccountError>;

    async fn swap(&self, request: &SwapRequest) -> Result<TxReceipt, AccountError>;

    async fn broadcast(&self, request: &BroadcastRequest) -> Result<TxReceipt, AccountError>;

    /// Hand a progress event to the rest of the application
    async fn dispatch(&self, event: Event) -> Result<(), DispatchError>;

    /// Read a value from application state
    fn read_state(&self, key: &str) -> Result<Option<Value>, StateReadError>;

    /// Account changes, used by the driver as wake-up signals
    fn subscribe(&self) -> broadcast::Receiver<AccountEvent>;
}
