// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake account adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    AccountAdapter, AccountError, AccountEvent, BroadcastRequest, SendRequest, SwapRequest,
    TxReceipt, TxStatus,
};
use aq_core::Amount;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Recorded account call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCall {
    Balance {
        wallet_id: String,
        token_id: Option<String>,
    },
    ReceiveAddress {
        wallet_id: String,
    },
    TxStatus {
        wallet_id: String,
        tx_id: String,
    },
    ExchangeRate {
        pair: String,
    },
    Send(SendRequest),
    Swap(SwapRequest),
    Broadcast(BroadcastRequest),
}

impl AccountCall {
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            AccountCall::Send(_) | AccountCall::Swap(_) | AccountCall::Broadcast(_)
        )
    }
}

#[derive(Default)]
struct FakeAccountState {
    balances: HashMap<(String, Option<String>), Amount>,
    rates: HashMap<String, f64>,
    txs: HashMap<String, TxStatus>,
    /// Receipts by idempotency key
    receipts: HashMap<String, TxReceipt>,
    /// Keys in the order they were first executed
    executed: Vec<String>,
    calls: Vec<AccountCall>,
    submit_failures: VecDeque<AccountError>,
    always_fail_submissions: Option<AccountError>,
    reads_failing: bool,
    submit_delay: Option<Duration>,
    next_tx: u64,
}

/// Fake account adapter for testing
///
/// Balances, rates and transaction statuses are scripted by the test.
/// Submissions debit the source wallet, create a transaction at zero
/// confirmations, and are idempotent per key.
#[derive(Clone)]
pub struct FakeAccountAdapter {
    state: Arc<Mutex<FakeAccountState>>,
    events: broadcast::Sender<AccountEvent>,
}

impl Default for FakeAccountAdapter {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(FakeAccountState::default())),
            events,
        }
    }
}

impl FakeAccountAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeAccountState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<AccountCall> {
        self.lock().calls.clone()
    }

    /// Idempotency keys of submissions that actually executed
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    pub fn set_balance(&self, wallet_id: &str, token_id: Option<&str>, amount: Amount) {
        self.lock().balances.insert(
            (wallet_id.to_string(), token_id.map(str::to_string)),
            amount,
        );
    }

    pub fn set_rate(&self, pair: &str, rate: f64) {
        self.lock().rates.insert(pair.to_string(), rate);
    }

    pub fn set_tx_status(&self, tx_id: &str, status: TxStatus) {
        self.lock().txs.insert(tx_id.to_string(), status);
    }

    /// Set the confirmation depth of a transaction
    pub fn confirm(&self, tx_id: &str, confirmations: u32) {
        self.set_tx_status(tx_id, TxStatus::Confirming { confirmations });
    }

    /// Fail the next `count` submissions with `error`
    pub fn fail_next_submissions(&self, count: usize, error: AccountError) {
        let mut state = self.lock();
        for _ in 0..count {
            state.submit_failures.push_back(error.clone());
        }
    }

    /// Fail every submission with `error` until cleared with `None`
    pub fn fail_submissions(&self, error: Option<AccountError>) {
        self.lock().always_fail_submissions = error;
    }

    /// Make every read return a network error
    pub fn set_reads_failing(&self, failing: bool) {
        self.lock().reads_failing = failing;
    }

    /// Hold every submission for `delay` before answering
    pub fn set_submit_delay(&self, delay: Option<Duration>) {
        self.lock().submit_delay = delay;
    }

    /// Publish an account event to subscribers
    pub fn emit(&self, event: AccountEvent) {
        let _ = self.events.send(event);
    }

    fn read_guard(
        &self,
        call: AccountCall,
    ) -> Result<std::sync::MutexGuard<'_, FakeAccountState>, AccountError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.reads_failing {
            return Err(AccountError::Network("scripted read failure".to_string()));
        }
        Ok(state)
    }

    async fn submit(
        &self,
        call: AccountCall,
        key: &str,
        wallet_id: &str,
        debit: Option<(Option<String>, Amount)>,
    ) -> Result<TxReceipt, AccountError> {
        let delay = self.lock().submit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.calls.push(call);

        if let Some(receipt) = state.receipts.get(key) {
            return Ok(receipt.clone());
        }
        if let Some(error) = state.submit_failures.pop_front() {
            return Err(error);
        }
        if let Some(error) = state.always_fail_submissions.clone() {
            return Err(error);
        }

        if let Some((token_id, amount)) = debit {
            let balance_key = (wallet_id.to_string(), token_id);
            let available = state.balances.get(&balance_key).copied().unwrap_or_default();
            if available < amount {
                return Err(AccountError::InsufficientFunds {
                    needed: amount,
                    available,
                });
            }
            state
                .balances
                .insert(balance_key, Amount(available.0 - amount.0));
        }

        state.next_tx += 1;
        let receipt = TxReceipt {
            wallet_id: wallet_id.to_string(),
            tx_id: format!("tx-{}", state.next_tx),
        };
        state
            .txs
            .insert(receipt.tx_id.clone(), TxStatus::Confirming { confirmations: 0 });
        state.receipts.insert(key.to_string(), receipt.clone());
        state.executed.push(key.to_string());
        Ok(receipt)
    }
}

#[async_trait]
impl AccountAdapter for FakeAccountAdapter {
    async fn balance(
        &self,
        wallet_id: &str,
        token_id: Option<&str>,
    ) -> Result<Amount, AccountError> {
        let state = self.read_guard(AccountCall::Balance {
            wallet_id: wallet_id.to_string(),
            token_id: token_id.map(str::to_string),
        })?;
        state
            .balances
            .get(&(wallet_id.to_string(), token_id.map(str::to_string)))
            .copied()
            .ok_or_else(|| AccountError::WalletNotFound(wallet_id.to_string()))
    }

    async fn receive_address(&self, wallet_id: &str) -> Result<String, AccountError> {
        let _state = self.read_guard(AccountCall::ReceiveAddress {
            wallet_id: wallet_id.to_string(),
        })?;
        Ok(format!("addr-{}", wallet_id))
    }

    async fn tx_status(&self, wallet_id: &str, tx_id: &str) -> Result<TxStatus, AccountError> {
        let state = self.read_guard(AccountCall::TxStatus {
            wallet_id: wallet_id.to_string(),
            tx_id: tx_id.to_string(),
        })?;
        Ok(state.txs.get(tx_id).cloned().unwrap_or(TxStatus::Unknown))
    }

    async fn exchange_rate(&self, pair: &str) -> Result<f64, AccountError> {
        let state = self.read_guard(AccountCall::ExchangeRate {
            pair: pair.to_string(),
        })?;
        state
            .rates
            .get(pair)
            .copied()
            .ok_or_else(|| AccountError::Network(format!("no rate for {}", pair)))
    }

    async fn send(&self, request: &SendRequest) -> Result<TxReceipt, AccountError> {
        self.submit(
            AccountCall::Send(request.clone()),
            &request.idempotency_key,
            &request.wallet_id,
            Some((request.token_id.clone(), request.amount)),
        )
        .await
    }

    async fn swap(&self, request: &SwapRequest) -> Result<TxReceipt, AccountError> {
        self.submit(
            AccountCall::Swap(request.clone()),
            &request.idempotency_key,
            &request.from_wallet_id,
            Some((request.from_token_id.clone(), request.amount)),
        )
        .await
    }

    async fn broadcast(&self, request: &BroadcastRequest) -> Result<TxReceipt, AccountError> {
        self.submit(
            AccountCall::Broadcast(request.clone()),
            &request.idempotency_key,
            &request.wallet_id,
            None,
        )
        .await
    }

    fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
