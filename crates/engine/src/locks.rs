// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-program exclusive access
//!
//! At most one evaluation pass may run for a program at a time. The guard
//! is held from loading the state until the new state has been persisted.

use aq_core::ProgramId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Proof of exclusive access to one program
pub type ProgramGuard = OwnedMutexGuard<()>;

#[derive(Clone, Default)]
pub struct ProgramLocks {
    locks: Arc<Mutex<HashMap<ProgramId, Arc<AsyncMutex<()>>>>>,
}

impl ProgramLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, id: &ProgramId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id.clone()).or_default().clone()
    }

    /// Take the lock if nobody holds it
    pub fn try_acquire(&self, id: &ProgramId) -> Option<ProgramGuard> {
        self.lock_for(id).try_lock_owned().ok()
    }

    /// Wait until the lock is free, then take it
    pub async fn acquire(&self, id: &ProgramId) -> ProgramGuard {
        self.lock_for(id).lock_owned().await
    }

    /// Forget the lock of a finished program. A holder keeps its guard.
    pub fn remove(&self, id: &ProgramId) {
        self.locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }
}
