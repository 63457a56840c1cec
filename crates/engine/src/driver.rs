// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver loop
//!
//! Ticks due programs on a fixed interval and ticks every active program as
//! soon as the account reports a change. Stops when the shutdown channel
//! flips to `true` or its sender is dropped.

use crate::context::ExecutionContext;
use crate::error::RuntimeError;
use crate::runtime::{Runtime, TickResults};
use aq_adapters::AccountEvent;
use aq_storage::ProgramStore;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct Driver<C, S> {
    runtime: Runtime<C, S>,
    account_events: broadcast::Receiver<AccountEvent>,
    shutdown: watch::Receiver<bool>,
}

impl<C, S> Driver<C, S>
where
    C: ExecutionContext + 'static,
    S: ProgramStore,
{
    pub fn new(runtime: Runtime<C, S>, shutdown: watch::Receiver<bool>) -> Self {
        let account_events = runtime.context().subscribe();
        Self {
            runtime,
            account_events,
            shutdown,
        }
    }

    /// Run until shutdown is requested
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.runtime.config().poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut account_open = true;

        tracing::info!(
            poll_interval_ms = self.runtime.config().poll_interval.as_millis() as u64,
            "driver started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    report(self.runtime.tick_due().await);
                }

                event = self.account_events.recv(), if account_open => {
                    match event {
                        Ok(event) => {
                            tracing::debug!(?event, "account changed");
                            report(self.runtime.tick_all().await);
                        }
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "account events lagged");
                            report(self.runtime.tick_all().await);
                        }
                        Err(RecvError::Closed) => {
                            tracing::debug!("account event stream closed");
                            account_open = false;
                        }
                    }
                }

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("driver stopped");
    }
}

fn report(results: Result<TickResults, RuntimeError>) {
    let results = match results {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(error = %e, "could not list programs");
            return;
        }
    };
    for (id, result) in results {
        match result {
            Ok(_) => {}
            Err(RuntimeError::ConcurrencyViolation(_)) => {
                tracing::debug!(program_id = %id, "pass already in flight");
            }
            Err(e) => tracing::warn!(program_id = %id, error = %e, "tick failed"),
        }
    }
}

/// A driver running on its own task
pub struct DriverHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Spawn a driver for `runtime`
    pub fn spawn<C, S>(runtime: Runtime<C, S>) -> Self
    where
        C: ExecutionContext + 'static,
        S: ProgramStore,
    {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(Driver::new(runtime, rx).run());
        Self { shutdown, task }
    }

    /// Ask the driver to stop and wait for it to finish its current pass
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "driver task failed");
        }
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
