// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use aq_core::{ExecutionState, Program, ProgramId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not found: {kind}/{id}")]
    NotFound { kind: &'static str, id: ProgramId },
    #[error("stale write for {id}: stored revision {stored}, writing over {expected}")]
    Conflict {
        id: ProgramId,
        stored: u64,
        expected: u64,
    },
    #[error("invalid program id: {0:?}")]
    InvalidId(ProgramId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Durable record of each program instance
///
/// `save` is the durability boundary: it either persists the whole state or
/// leaves the previously stored revision in place. On success the state's
/// `revision` is bumped to match what was written. A save whose revision is
/// behind the stored one is rejected with [`StoreError::Conflict`].
pub trait ProgramStore: Clone + Send + Sync + 'static {
    fn load(&self, id: &ProgramId) -> Result<ExecutionState, StoreError>;

    fn save(&self, state: &mut ExecutionState) -> Result<(), StoreError>;

    /// Remove the program definition and its state
    fn delete(&self, id: &ProgramId) -> Result<(), StoreError>;

    /// Ids of programs whose state is not terminal
    fn list_active(&self) -> Result<Vec<ProgramId>, StoreError>;

    fn save_program(&self, program: &Program) -> Result<(), StoreError>;

    fn load_program(&self, id: &ProgramId) -> Result<Program, StoreError>;
}
