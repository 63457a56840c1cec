// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the account, event dispatch and app state

pub mod account;
pub mod dispatch;
pub mod state;
pub mod traced;

pub use account::{
    AccountAdapter, AccountError, AccountEvent, BroadcastRequest, NoOpAccountAdapter,
    SendRequest, SwapRequest, TxReceipt, TxStatus,
};
pub use dispatch::{ChannelDispatcher, DispatchError, Dispatcher};
pub use state::{is_truthy, MapStateReader, StateReadError, StateReader};
pub use traced::TracedAccountAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use account::{AccountCall, FakeAccountAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use dispatch::FakeDispatcher;
