// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use aq_adapters::{AccountError, StateReadError};
use aq_core::{ProgramError, ProgramId};
use aq_storage::StoreError;
use thiserror::Error;

/// A step could not be carried out; the evaluator retries it up to the limit
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OperationError {
    #[error("account error: {0}")]
    Account(#[from] AccountError),
    #[error("state read error: {0}")]
    State(#[from] StateReadError),
}

/// A read needed to check an effect failed; the effect stays pending
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EffectCheckError {
    #[error("account error: {0}")]
    Account(#[from] AccountError),
}

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("program {0} is already being evaluated")]
    ConcurrencyViolation(ProgramId),
    #[error("program not found: {0}")]
    ProgramNotFound(ProgramId),
    #[error("program already scheduled: {0}")]
    AlreadyScheduled(ProgramId),
    #[error("invalid program: {0}")]
    InvalidProgram(#[from] ProgramError),
}

impl RuntimeError {
    /// Map a store error, turning `NotFound` into `ProgramNotFound`
    pub(crate) fn from_store(id: &ProgramId, error: StoreError) -> Self {
        if error.is_not_found() {
            RuntimeError::ProgramNotFound(id.clone())
        } else {
            RuntimeError::Persistence(error)
        }
    }
}
