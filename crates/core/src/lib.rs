// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aq-core: data model for the action queue engine
//!
//! This crate provides:
//! - Programs: immutable, serializable action trees
//! - Effects: persisted descriptors of conditions a step waits on
//! - Execution state: the per-program progress record
//! - Progress events, engine configuration, clock and ID abstractions

pub mod clock;
pub mod config;
pub mod effect;
pub mod event;
pub mod id;
pub mod path;
pub mod program;
pub mod state;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, EngineConfig, ParallelFailurePolicy};
pub use effect::{Condition, Effect, EffectStatus};
pub use event::Event;
pub use id::{IdGen, ProgramId, SequentialIdGen, UuidIdGen};
pub use path::NodePath;
pub use program::{Action, Amount, Operation, Predicate, Program, ProgramError};
pub use state::{Branch, ExecutionState, NodeStatus, PendingEffect, ProgramStatus};
