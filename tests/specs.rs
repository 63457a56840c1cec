//! Behavioral specifications for the action queue engine.
//!
//! These tests drive the public engine API end to end: programs are
//! submitted as JSON, state is persisted to a real directory, and the
//! account is scripted through the mock context.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// program/
#[path = "specs/program/scenarios.rs"]
mod program_scenarios;
#[path = "specs/program/control.rs"]
mod program_control;
#[path = "specs/program/persistence.rs"]
mod program_persistence;

// runtime/
#[path = "specs/runtime/config.rs"]
mod runtime_config;
#[path = "specs/runtime/driver.rs"]
mod runtime_driver;
