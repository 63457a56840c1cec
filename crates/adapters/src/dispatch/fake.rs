// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake dispatcher for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DispatchError, Dispatcher};
use aq_core::Event;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeDispatchState {
    events: Vec<Event>,
    failing: bool,
}

/// Fake dispatcher for testing
#[derive(Clone, Default)]
pub struct FakeDispatcher {
    state: Arc<Mutex<FakeDispatchState>>,
}

impl FakeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all dispatched events
    pub fn events(&self) -> Vec<Event> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .events
            .clone()
    }

    /// Names of all dispatched events, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(Event::name).collect()
    }

    /// Make every dispatch fail (events are still recorded)
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).failing = failing;
    }
}

#[async_trait]
impl Dispatcher for FakeDispatcher {
    async fn dispatch(&self, event: Event) -> Result<(), DispatchError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.events.push(event);
        if state.failing {
            return Err(DispatchError::Failed("scripted failure".to_string()));
        }
        Ok(())
    }
}
