// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress event dispatch

mod channel;

pub use channel::ChannelDispatcher;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDispatcher;

use aq_core::Event;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from dispatch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch channel closed")]
    Closed,
    #[error("dispatch failed: {0}")]
    Failed(String),
}

/// Receives progress events once their state is persisted
#[async_trait]
pub trait Dispatcher: Clone + Send + Sync + 'static {
    async fn dispatch(&self, event: Event) -> Result<(), DispatchError>;
}
