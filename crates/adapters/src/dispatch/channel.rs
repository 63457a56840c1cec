// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{DispatchError, Dispatcher};
use aq_core::Event;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Dispatcher that forwards events over an unbounded channel
#[derive(Clone, Debug)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// Create a dispatcher along with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl Dispatcher for ChannelDispatcher {
    async fn dispatch(&self, event: Event) -> Result<(), DispatchError> {
        self.tx.send(event).map_err(|_| DispatchError::Closed)
    }
}
