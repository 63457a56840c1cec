// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted context for tests
#![cfg_attr(coverage_nightly, coverage(off))]

use super::ExecutionContext;
use aq_adapters::{
    AccountAdapter, AccountError, AccountEvent, BroadcastRequest, DispatchError, Dispatcher,
    FakeAccountAdapter, FakeDispatcher, MapStateReader, SendRequest, StateReadError, StateReader,
    SwapRequest, TxReceipt, TxStatus,
};
use aq_core::{Amount, Clock, Event, FakeClock};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

/// Deterministic context with no network or persistent account access
///
/// Balances, rates, transaction statuses, failures and the clock are all
/// scripted through the accessors. Transaction ids are generated in
/// submission order (`tx-1`, `tx-2`, ...), so two mocks given the same
/// script produce the same results.
#[derive(Clone)]
pub struct MockContext {
    client_id: String,
    account: FakeAccountAdapter,
    dispatcher: FakeDispatcher,
    state: MapStateReader,
    clock: FakeClock,
}

impl Default for MockContext {
    fn default() -> Self {
        Self::new("mock-client")
    }
}

impl MockContext {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            account: FakeAccountAdapter::new(),
            dispatcher: FakeDispatcher::new(),
            state: MapStateReader::new(),
            clock: FakeClock::new(),
        }
    }

    pub fn account(&self) -> &FakeAccountAdapter {
        &self.account
    }

    pub fn dispatcher(&self) -> &FakeDispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> &MapStateReader {
        &self.state
    }

    pub fn clock(&self) -> &FakeClock {
        &self.clock
    }
}

#[async_trait]
impl ExecutionContext for MockContext {
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
