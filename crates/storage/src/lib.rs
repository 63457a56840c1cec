// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aq-storage: durable records of program definitions and execution state

mod json;
mod memory;
mod store;

pub use json::JsonProgramStore;
pub use memory::MemoryProgramStore;
pub use store::{ProgramStore, StoreError};
