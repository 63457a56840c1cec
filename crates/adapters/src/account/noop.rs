// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op account adapter for when no wallet is connected.

use super::{
    AccountAdapter, AccountError, AccountEvent, BroadcastRequest, SendRequest, SwapRequest,
    TxReceipt, TxStatus,
};
use aq_core::Amount;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Account adapter that has nothing behind it.
///
/// Every call reports [`AccountError::Unavailable`], so reads keep effects
/// pending and submissions fail through the normal retry path.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpAccountAdapter;

impl NoOpAccountAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AccountAdapter for NoOpAccountAdapter {
    async fn balance(
        &self,
        _wallet_id: &str,
        _token_id: Option<&str>,
    ) -> Result<Amount, AccountError> {
        Err(AccountError::Unavailable)
    }

    async fn receive_address(&self, _wallet_id: &str) -> Result<String, AccountError> {
        Err(AccountError::Unavailable)
    }

    async fn tx_status(&self, _wallet_id: &str, _tx_id: &str) -> Result<TxStatus, AccountError> {
        Err(AccountError::Unavailable)
    }

    async fn exchange_rate(&self, _pair: &str) -> Result<f64, AccountError> {
        Err(AccountError::Unavailable)
    }

    async fn send(&self, _request: &SendRequest) -> Result<TxReceipt, AccountError> {
        Err(AccountError::Unavailable)
    }

    async fn swap(&self, _request: &SwapRequest) -> Result<TxReceipt, AccountError> {
        Err(AccountError::Unavailable)
    }

    async fn broadcast(&self, _request: &BroadcastRequest) -> Result<TxReceipt, AccountError> {
        Err(AccountError::Unavailable)
    }

    fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        // Sender dropped immediately: subscribers see a closed channel
        let (_tx, rx) = broadcast::channel(1);
        rx
    }
}
