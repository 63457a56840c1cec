// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::ExecutionContext;
use aq_adapters::{
    AccountAdapter, AccountError, AccountEvent, BroadcastRequest, DispatchError, Dispatcher,
    SendRequest, StateReadError, StateReader, SwapRequest, TracedAccountAdapter, TxReceipt,
    TxStatus,
};
use aq_core::{Amount, Clock, Event};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

/// Context backed by real adapters
///
/// Account calls go through a [`TracedAccountAdapter`] so every submission
/// is logged with its idempotency key.
#[derive(Clone)]
pub struct LiveContext<A, D, R, K> {
    client_id: String,
    account: TracedAccountAdapter<A>,
    dispatcher: D,
    state: R,
    clock: K,
}

impl<A, D, R, K> LiveContext<A, D, R, K>
where
    A: AccountAdapter,
    D: Dispatcher,
    R: StateReader,
    K: Clock,
{
    pub fn new(
        client_id: impl Into<String>,
        account: A,
        dispatcher: D,
        state: R,
        clock: K,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            account: TracedAccountAdapter::new(account),
            dispatcher,
            state,
            clock,
        }
    }
}

#[async_trait]
impl<A, D, R, K> ExecutionContext for LiveContext<A, D, R, K>
where
    A: AccountAdapter,
    D: Dispatcher,
    R: StateReader,
    K: Clock,
{
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    async fn balance(
        &self,
        wallet_id: &str,
        token_id: Option<&str>,
    ) -> Result<Amount, AccountError> {
        self.account.balance(wallet_id, token_id).await
    }

    async fn receive_address(&self, wallet_id: &str) -> Result<String, AccountError> {
        self.account.receive_address(wallet_id).await
    }

    async fn tx_status(&self, wallet_id: &str, tx_id: &str) -> Result<TxStatus, AccountError> {
        self.account.tx_status(wallet_id, tx_id).await
    }

    async fn exchange_rate(&self, pair: &str) -> Result<f64, AccountError> {
        self.account.exchange_rate(pair).await
    }

    async fn send(&self, request: &SendRequest) -> Result<TxReceipt, AccountError> {
        self.account.send(request).await
    }

    async fn swap(&self, request: &SwapRequest) -> Result<TxReceipt, AccountError> {
        self.account.swap(request).await
    }

    async fn broadcast(&self, request: &BroadcastRequest) -> Result<TxReceipt, AccountError> {
        self.account.broadcast(request).await
    }

    async fn dispatch(&self, event: Event) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(event).await
    }

    fn read_state(&self, key: &str) -> Result<Option<Value>, StateReadError> {
        self.state.read(key)
    }

    fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.account.subscribe()
    }
}
