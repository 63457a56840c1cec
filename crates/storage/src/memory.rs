// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory program store

use crate::store::{ProgramStore, StoreError};
use aq_core::{ExecutionState, Program, ProgramId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    programs: BTreeMap<ProgramId, Program>,
    states: BTreeMap<ProgramId, ExecutionState>,
    failing_saves: u32,
    saves: u64,
}

/// Program store held in memory; clones share the same records
#[derive(Clone, Default)]
pub struct MemoryProgramStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryProgramStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of successful saves
    pub fn saves(&self) -> u64 {
        self.lock().saves
    }
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryProgramStore {
    /// Reject the next `count` saves without writing anything
    pub fn fail_next_saves(&self, count: u32) {
        self.lock().failing_saves = count;
    }
}

impl ProgramStore for MemoryProgramStore {
    fn load(&self, id: &ProgramId) -> Result<ExecutionState, StoreError> {
        self.lock()
            .states
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "states",
                id: id.clone(),
            })
    }

    fn save(&self, state: &mut ExecutionState) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.failing_saves > 0 {
            inner.failing_saves -= 1;
            return Err(StoreError::Unavailable("injected save failure".to_string()));
        }
        if let Some(stored) = inner.states.get(&state.program_id) {
            if stored.revision > state.revision {
                return Err(StoreError::Conflict {
                    id: state.program_id.clone(),
                    stored: stored.revision,
                    expected: state.revision,
                });
            }
        }
        state.revision += 1;
        inner.states.insert(state.program_id.clone(), state.clone());
        inner.saves += 1;
        Ok(())
    }

    fn delete(&self, id: &ProgramId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.states.remove(id);
        inner.programs.remove(id);
        Ok(())
    }

    fn list_active(&self) -> Result<Vec<ProgramId>, StoreError> {
        Ok(self
            .lock()
            .states
            .values()
            .filter(|state| !state.is_terminal())
            .map(|state| state.program_id.clone())
            .collect())
    }

    fn save_program(&self, program: &Program) -> Result<(), StoreError> {
        self.lock()
            .programs
            .insert(program.id.clone(), program.clone());
        Ok(())
    }

    fn load_program(&self, id: &ProgramId) -> Result<Program, StoreError> {
        self.lock()
            .programs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "programs",
                id: id.clone(),
            })
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
