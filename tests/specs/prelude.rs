//! Shared harness for the behavioral specs
//!
//! A [`World`] is one engine instance over a scripted account and a program
//! store in a temporary directory. Programs are written as JSON, the same
//! form a client would submit.

#![allow(dead_code)]

pub use aq_adapters::{AccountError, AccountEvent, SendRequest, TxStatus};
pub use aq_core::{
    Amount, EngineConfig, ExecutionState, NodePath, NodeStatus, ParallelFailurePolicy, Program,
    ProgramId, ProgramStatus,
};
pub use aq_engine::{
    DriverHandle, ExecutionContext, MockContext, Runtime, RuntimeError, TickReport,
};
pub use aq_storage::{JsonProgramStore, ProgramStore, StoreError};
pub use std::time::Duration;

use tempfile::TempDir;

pub struct World {
    dir: TempDir,
    config: EngineConfig,
    pub ctx: MockContext,
    pub runtime: Runtime<MockContext, JsonProgramStore>,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ctx = MockContext::new("spec-client");
        let store = JsonProgramStore::open(dir.path()).unwrap();
        let runtime = Runtime::new(ctx.clone(), store, config.clone());
        Self {
            dir,
            config,
            ctx,
            runtime,
        }
    }

    /// Drop the runtime and start a fresh one over the same directory and
    /// account, as after a process restart
    pub fn restart(self) -> Self {
        let store = JsonProgramStore::open(self.dir.path()).unwrap();
        let runtime = Runtime::new(self.ctx.clone(), store, self.config.clone());
        Self { runtime, ..self }
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn store(&self) -> &JsonProgramStore {
        self.runtime.store()
    }

    pub fn fund(&self, wallet_id: &str, amount: u128) {
        self.ctx.account().set_balance(wallet_id, None, Amount(amount));
    }

    pub async fn schedule(&self, json: &str) -> ProgramId {
        let program: Program = serde_json::from_str(json).unwrap();
        let id = program.id.clone();
        self.runtime.schedule(program).await.unwrap();
        id
    }

    pub async fn tick(&self, id: &ProgramId) -> TickReport {
        self.runtime.tick(id).await.unwrap()
    }

    pub fn state(&self, id: &ProgramId) -> ExecutionState {
        self.runtime.status(id).unwrap()
    }

    pub fn node(&self, id: &ProgramId, path: &str) -> NodeStatus {
        self.state(id).node(&path.parse().unwrap())
    }

    /// Names of every event dispatched so far
    pub fn events(&self) -> Vec<&'static str> {
        self.ctx.dispatcher().names()
    }

    pub fn executed(&self) -> Vec<String> {
        self.ctx.account().executed()
    }
}
