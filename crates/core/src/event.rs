// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress events dispatched to the rest of the application

use crate::id::ProgramId;
use crate::path::NodePath;
use serde::{Deserialize, Serialize};

/// Events describing program progress. The engine dispatches these but
/// never interprets what receivers do with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    ProgramStarted {
        program_id: ProgramId,
    },
    StepDone {
        program_id: ProgramId,
        path: NodePath,
        operation: String,
    },
    StepWaiting {
        program_id: ProgramId,
        path: NodePath,
        condition: String,
    },
    StepRetrying {
        program_id: ProgramId,
        path: NodePath,
        attempt: u32,
        error: String,
    },
    StepFailed {
        program_id: ProgramId,
        path: NodePath,
        reason: String,
    },
    ProgramCompleted {
        program_id: ProgramId,
    },
    ProgramFailed {
        program_id: ProgramId,
        reason: String,
    },
    ProgramCancelled {
        program_id: ProgramId,
    },
    /// Produced by a `notify` step
    Notify {
        program_id: ProgramId,
        title: String,
        message: String,
    },
}

impl Event {
    /// Event name for pattern matching, `category:action`
    pub fn name(&self) -> &'static str {
        match self {
            Event::ProgramStarted { .. } => "program:started",
            Event::StepDone { .. } => "step:done",
            Event::StepWaiting { .. } => "step:waiting",
            Event::StepRetrying { .. } => "step:retrying",
            Event::StepFailed { .. } => "step:failed",
            Event::ProgramCompleted { .. } => "program:completed",
            Event::ProgramFailed { .. } => "program:failed",
            Event::ProgramCancelled { .. } => "program:cancelled",
            Event::Notify { .. } => "notify",
        }
    }

    pub fn program_id(&self) -> &ProgramId {
        match self {
            Event::ProgramStarted { program_id }
            | Event::StepDone { program_id, .. }
            | Event::StepWaiting { program_id, .. }
            | Event::StepRetrying { program_id, .. }
            | Event::StepFailed { program_id, .. }
            | Event::ProgramCompleted { program_id }
            | Event::ProgramFailed { program_id, .. }
            | Event::ProgramCancelled { program_id }
            | Event::Notify { program_id, .. } => program_id,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
