// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! aq-engine: evaluates programs against an execution context
//!
//! - [`evaluate`] advances a program as far as it can without waiting
//! - [`check`] decides whether a pending effect has come true
//! - [`Runtime`] runs locked, persisted passes per program
//! - [`Driver`] schedules passes and reacts to account changes

pub mod checker;
pub mod context;
mod driver;
mod error;
pub mod evaluator;
mod locks;
mod runtime;

pub use checker::check;
pub use context::{ExecutionContext, LiveContext};
pub use driver::{Driver, DriverHandle};
pub use error::{EffectCheckError, OperationError, RuntimeError};
pub use evaluator::{evaluate, Evaluation};
pub use locks::{ProgramGuard, ProgramLocks};
pub use runtime::{Runtime, TickReport, TickResults};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use context::MockContext;
