// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrapper for consistent observability

use crate::account::{
    AccountAdapter, AccountError, AccountEvent, BroadcastRequest, SendRequest, SwapRequest,
    TxReceipt, TxStatus,
};
use aq_core::Amount;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::Instrument;

/// Wrapper that adds tracing to any AccountAdapter
#[derive(Clone)]
pub struct TracedAccountAdapter<A> {
    inner: A,
}

impl<A> TracedAccountAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

fn log_submission(result: &Result<TxReceipt, AccountError>, elapsed: std::time::Duration) {
    match result {
        Ok(receipt) => tracing::info!(
            tx_id = %receipt.tx_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "submitted"
        ),
        Err(e) => tracing::error!(
            elapsed_ms = elapsed.as_millis() as u64,
            error = %e,
            "submission failed"
        ),
    }
}

#[async_trait]
impl<A: AccountAdapter> AccountAdapter for TracedAccountAdapter<A> {
    async fn balance(
        &self,
        wallet_id: &str,
        token_id: Option<&str>,
    ) -> Result<Amount, AccountError> {
        let result = self.inner.balance(wallet_id, token_id).await;
        match &result {
            Ok(amount) => tracing::trace!(wallet_id, token_id = ?token_id, %amount, "balance"),
            Err(e) => tracing::warn!(
                wallet_id,
                token_id = ?token_id,
                error = %e,
                "balance read failed"
            ),
        }
        result
    }

    async fn receive_address(&self, wallet_id: &str) -> Result<String, AccountError> {
        let result = self.inner.receive_address(wallet_id).await;
        if let Err(e) = &result {
            tracing::warn!(wallet_id, error = %e, "receive address failed");
        }
        result
    }

    async fn tx_status(&self, wallet_id: &str, tx_id: &str) -> Result<TxStatus, AccountError> {
        let result = self.inner.tx_status(wallet_id, tx_id).await;
        match &result {
            Ok(status) => tracing::trace!(wallet_id, tx_id, ?status, "checked"),
            Err(e) => tracing::warn!(wallet_id, tx_id, error = %e, "tx status failed"),
        }
        result
    }

    async fn exchange_rate(&self, pair: &str) -> Result<f64, AccountError> {
        let result = self.inner.exchange_rate(pair).await;
        tracing::trace!(pair, rate = ?result.as_ref().ok(), "rate");
        result
    }

    async fn send(&self, request: &SendRequest) -> Result<TxReceipt, AccountError> {
        let span = tracing::info_span!(
            "account.send",
            key = %request.idempotency_key,
            wallet_id = %request.wallet_id,
        );
        async {
            tracing::info!(address = %request.address, amount = %request.amount, "starting");

            // Precondition: nothing to send
            if request.amount.0 == 0 {
                tracing::error!("zero amount");
                return Err(AccountError::Rejected("amount must be non-zero".to_string()));
            }

            let start = std::time::Instant::now();
            let result = self.inner.send(request).await;
            log_submission(&result, start.elapsed());
            result
        }
        .instrument(span)
        .await
    }

    async fn swap(&self, request: &SwapRequest) -> Result<TxReceipt, AccountError> {
        let span = tracing::info_span!(
            "account.swap",
            key = %request.idempotency_key,
            from = %request.from_wallet_id,
            to = %request.to_wallet_id,
        );
        async {
            tracing::info!(amount = %request.amount, "starting");

            if request.amount.0 == 0 {
                tracing::error!("zero amount");
                return Err(AccountError::Rejected("amount must be non-zero".to_string()));
            }

            let start = std::time::Instant::now();
            let result = self.inner.swap(request).await;
            log_submission(&result, start.elapsed());
            result
        }
        .instrument(span)
        .await
    }

    async fn broadcast(&self, request: &BroadcastRequest) -> Result<TxReceipt, AccountError> {
        let span = tracing::info_span!(
            "account.broadcast",
            key = %request.idempotency_key,
            wallet_id = %request.wallet_id,
        );
        async {
            tracing::info!(raw_len = request.raw_tx.len(), "starting");

            let start = std::time::Instant::now();
            let result = self.inner.broadcast(request).await;
            log_submission(&result, start.elapsed());
            result
        }
        .instrument(span)
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
