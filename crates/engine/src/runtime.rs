// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the action queue engine
//!
//! A tick is one locked pass over a program: check its pending effects,
//! evaluate, persist, and only then dispatch the pass's events. A state that
//! could not be saved is kept as uncommitted and its save is retried before
//! the program may run again.

use crate::checker;
use crate::context::ExecutionContext;
use crate::error::{OperationError, RuntimeError};
use crate::evaluator::evaluate;
use crate::locks::ProgramLocks;
use aq_core::{
    Action, EffectStatus, EngineConfig, Event, ExecutionState, Program, ProgramId, ProgramStatus,
};
use aq_storage::{ProgramStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::Instrument;

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub status: ProgramStatus,
    pub progressed: bool,
    pub error: Option<OperationError>,
    pub next_check_at_ms: Option<u64>,
}

/// Per-program results of a batch of ticks, ordered by id
pub type TickResults = Vec<(ProgramId, Result<TickReport, RuntimeError>)>;

struct Uncommitted {
    state: ExecutionState,
    events: Vec<Event>,
}

struct RuntimeInner<C, S> {
    ctx: C,
    store: S,
    config: EngineConfig,
    locks: ProgramLocks,
    programs: Mutex<HashMap<ProgramId, Arc<Program>>>,
    uncommitted: Mutex<HashMap<ProgramId, Uncommitted>>,
}

/// Runtime that coordinates checking, evaluation and persistence
pub struct Runtime<C, S> {
    inner: Arc<RuntimeInner<C, S>>,
}

impl<C, S> Clone for Runtime<C, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, S> Runtime<C, S>
where
    C: ExecutionContext + 'static,
    S: ProgramStore,
{
    pub fn new(ctx: C, store: S, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                ctx,
                store,
                config,
                locks: ProgramLocks::new(),
                programs: Mutex::new(HashMap::new()),
                uncommitted: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn context(&self) -> &C {
        &self.inner.ctx
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Persist a new program with an all-Pending state, due immediately
    pub async fn schedule(&self, program: Program) -> Result<ExecutionState, RuntimeError> {
        program.validate()?;
        let id = program.id.clone();
        let _guard = self.inner.locks.acquire(&id).await;
        match self.inner.store.load(&id) {
            Ok(_) => return Err(RuntimeError::AlreadyScheduled(id)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let now = self.inner.ctx.now_ms();
        let mut state = ExecutionState::new(&program, self.inner.ctx.client_id(), now);
        state.next_check_at_ms = Some(now);

        self.inner.store.save_program(&program)?;
        self.cache_program(Arc::new(program));
        self.commit(
            state,
            vec![Event::ProgramStarted {
                program_id: id.clone(),
            }],
        )
        .await
        .inspect(|_| tracing::info!(program_id = %id, "program scheduled"))
    }

    /// Run one pass for `id`
    ///
    /// Fails with [`RuntimeError::ConcurrencyViolation`] if a pass for the
    /// same program is already in flight.
    pub async fn tick(&self, id: &ProgramId) -> Result<TickReport, RuntimeError> {
        self.tick_with(id, false).await
    }

    async fn tick_with(
        &self,
        id: &ProgramId,
        reset_backoff: bool,
    ) -> Result<TickReport, RuntimeError> {
        let _guard = self
            .inner
            .locks
            .try_acquire(id)
            .ok_or_else(|| RuntimeError::ConcurrencyViolation(id.clone()))?;

        let span = tracing::info_span!("program.tick", program_id = %id);
        async {
            let start = std::time::Instant::now();
            let result = self.pass(id, reset_backoff).await;
            match &result {
                Ok(report) => tracing::info!(
                    status = ?report.status,
                    progressed = report.progressed,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "tick completed"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "tick failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Body of a tick; the caller holds the program's lock
    async fn pass(
        &self,
        id: &ProgramId,
        reset_backoff: bool,
    ) -> Result<TickReport, RuntimeError> {
        self.flush_uncommitted(id).await?;

        let mut state = self
            .inner
            .store
            .load(id)
            .map_err(|e| RuntimeError::from_store(id, e))?;
        if state.is_terminal() {
            return Ok(TickReport {
                status: state.status,
                progressed: false,
                error: None,
                next_check_at_ms: None,
            });
        }
        let program = self.program(id)?;

        let mut events = Vec::new();
        let mut resolved = false;
        for pending in state.pending_effects.clone() {
            let status = checker::check(&self.inner.ctx, &pending.effect).await;
            if !state.resolve_effect(&pending.path, &status) {
                continue;
            }
            resolved = true;
            match status {
                EffectStatus::Failed { reason } => {
                    tracing::warn!(path = %pending.path, reason = %reason, "effect failed");
                    events.push(Event::StepFailed {
                        program_id: id.clone(),
                        path: pending.path.clone(),
                        reason,
                    });
                }
                _ => {
                    let operation = program
                        .node(&pending.path)
                        .map(|action| match action {
                            Action::Leaf { operation, .. } => operation.name(),
                            _ => "step",
                        })
                        .unwrap_or("step");
                    events.push(Event::StepDone {
                        program_id: id.clone(),
                        path: pending.path.clone(),
                        operation: operation.to_string(),
                    });
                }
            }
        }

        let evaluation = evaluate(&self.inner.ctx, &program, state, &self.inner.config).await;
        let mut state = evaluation.state;
        events.extend(evaluation.events);
        let progressed = resolved || evaluation.progressed;

        if state.is_terminal() {
            state.next_check_at_ms = None;
        } else {
            if progressed || reset_backoff {
                state.idle_polls = 0;
            } else {
                state.idle_polls = state.idle_polls.saturating_add(1);
            }
            let delay = self.inner.config.backoff(state.idle_polls);
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            state.next_check_at_ms = Some(self.inner.ctx.now_ms().saturating_add(delay_ms));
        }

        let state = self.commit(state, events).await?;
        if state.is_terminal() {
            self.forget(id);
        }
        Ok(TickReport {
            status: state.status,
            progressed,
            error: evaluation.error,
            next_check_at_ms: state.next_check_at_ms,
        })
    }

    /// Cancel a program
    ///
    /// Waits for an in-flight pass to finish and persist first. Side effects
    /// that were already committed are not rolled back.
    pub async fn cancel(&self, id: &ProgramId) -> Result<ExecutionState, RuntimeError> {
        let _guard = self.inner.locks.acquire(id).await;
        self.flush_uncommitted(id).await?;

        let mut state = self
            .inner
            .store
            .load(id)
            .map_err(|e| RuntimeError::from_store(id, e))?;
        if state.is_terminal() {
            return Ok(state);
        }

        state.cancel(self.inner.ctx.now_ms());
        let state = self
            .commit(
                state,
                vec![Event::ProgramCancelled {
                    program_id: id.clone(),
                }],
            )
            .await?;
        tracing::info!(program_id = %id, "program cancelled");
        self.forget(id);
        Ok(state)
    }

    /// Last persisted state of a program
    pub fn status(&self, id: &ProgramId) -> Result<ExecutionState, RuntimeError> {
        self.inner
            .store
            .load(id)
            .map_err(|e| RuntimeError::from_store(id, e))
    }

    /// Tick every active program whose next check is due
    pub async fn tick_due(&self) -> Result<TickResults, RuntimeError> {
        let now = self.inner.ctx.now_ms();
        let mut due = Vec::new();
        for id in self.inner.store.list_active()? {
            if self.has_uncommitted(&id) {
                due.push(id);
                continue;
            }
            match self.inner.store.load(&id) {
                Ok(state) if state.next_check_at_ms.is_none_or(|at| at <= now) => due.push(id),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(program_id = %id, error = %e, "skipping unreadable state");
                }
            }
        }
        Ok(self.tick_many(due, false).await)
    }

    /// Tick every active program now and clear its backoff
    pub async fn tick_all(&self) -> Result<TickResults, RuntimeError> {
        let ids = self.inner.store.list_active()?;
        Ok(self.tick_many(ids, true).await)
    }

    /// Tick distinct programs concurrently
    async fn tick_many(&self, ids: Vec<ProgramId>, reset_backoff: bool) -> TickResults {
        let mut set = JoinSet::new();
        for id in ids {
            let runtime = self.clone();
            set.spawn(async move {
                let result = runtime.tick_with(&id, reset_backoff).await;
                (id, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(error = %e, "tick task failed"),
            }
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// Save `state`, retrying up to the configured attempts, then dispatch
    /// `events`. On failure the state and events are kept as uncommitted,
    /// unless the store already holds a newer revision: then the state is
    /// stale and is dropped so the next pass starts from the stored one.
    async fn commit(
        &self,
        mut state: ExecutionState,
        events: Vec<Event>,
    ) -> Result<ExecutionState, RuntimeError> {
        let id = state.program_id.clone();
        let mut last_error: Option<StoreError> = None;
        for attempt in 1..=self.inner.config.save_retries {
            match self.inner.store.save(&mut state) {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(e @ StoreError::Conflict { .. }) => {
                    tracing::error!(program_id = %id, error = %e, "discarding stale state");
                    return Err(RuntimeError::Persistence(e));
                }
                Err(e) => {
                    tracing::warn!(program_id = %id, attempt, error = %e, "save failed");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            tracing::error!(program_id = %id, error = %e, "state left uncommitted");
            self.inner
                .uncommitted
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(id, Uncommitted { state, events });
            return Err(RuntimeError::Persistence(e));
        }

        for event in events {
            let name = event.name();
            if let Err(e) = self.inner.ctx.dispatch(event).await {
                tracing::warn!(program_id = %id, event = name, error = %e, "dispatch failed");
            }
        }
        Ok(state)
    }

    /// Retry the save of a state left by an earlier failed pass
    async fn flush_uncommitted(&self, id: &ProgramId) -> Result<(), RuntimeError> {
        let pending = self
            .inner
            .uncommitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        if let Some(Uncommitted { state, events }) = pending {
            tracing::info!(program_id = %id, "retrying uncommitted save");
            self.commit(state, events).await?;
        }
        Ok(())
    }

    pub fn has_uncommitted(&self, id: &ProgramId) -> bool {
        self.inner
            .uncommitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }

    fn program(&self, id: &ProgramId) -> Result<Arc<Program>, RuntimeError> {
        if let Some(program) = self
            .inner
            .programs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
        {
            return Ok(Arc::clone(program));
        }
        let program = Arc::new(
            self.inner
                .store
                .load_program(id)
                .map_err(|e| RuntimeError::from_store(id, e))?,
        );
        self.cache_program(Arc::clone(&program));
        Ok(program)
    }

    fn cache_program(&self, program: Arc<Program>) {
        self.inner
            .programs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(program.id.clone(), program);
    }

    fn forget(&self, id: &ProgramId) {
        self.inner
            .programs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        self.inner.locks.remove(id);
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
