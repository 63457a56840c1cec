// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action evaluator
//!
//! One call advances a program by every step that is currently unblocked
//! and returns as soon as nothing more can happen without waiting on an
//! effect. It never blocks on external conditions.
//!
//! A pass alternates between two phases until the first one finds nothing
//! to do:
//!
//! 1. a synchronous walk over the action tree that rolls composite statuses
//!    up from their children and collects the nodes that are ready;
//! 2. an asynchronous phase that runs those nodes through the context.
//!
//! Side effects happen only in the second phase.

use crate::checker::within_bounds;
use crate::context::ExecutionContext;
use crate::error::OperationError;
use aq_adapters::{is_truthy, BroadcastRequest, SendRequest, SwapRequest};
use aq_core::{
    Action, Branch, Condition, Effect, EngineConfig, Event, ExecutionState, NodePath, NodeStatus,
    Operation, ParallelFailurePolicy, Predicate, Program, ProgramStatus,
};
use std::collections::BTreeSet;
use tracing::Instrument;

/// Result of one evaluation pass
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state: ExecutionState,
    /// Progress events, to be dispatched once `state` is persisted
    pub events: Vec<Event>,
    /// Most recent operation failure in this pass
    pub error: Option<OperationError>,
    /// Whether any node, branch or iteration changed
    pub progressed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Work {
    /// Run a leaf's operation
    Invoke(NodePath),
    /// Choose a conditional's branch
    Decide(NodePath),
    /// Test a repeat's `until` once its body is done
    Until(NodePath),
}

impl Work {
    fn path(&self) -> &NodePath {
        match self {
            Work::Invoke(path) | Work::Decide(path) | Work::Until(path) => path,
        }
    }
}

enum Outcome {
    Done,
    Wait(Condition),
}

/// Advance `program` from `state` as far as it can go without waiting
pub async fn evaluate<C>(
    ctx: &C,
    program: &Program,
    state: ExecutionState,
    config: &EngineConfig,
) -> Evaluation
where
    C: ExecutionContext + ?Sized,
{
    let span = tracing::info_span!("evaluate", program_id = %program.id);
    Evaluator {
        ctx,
        program,
        config,
        state,
        events: Vec::new(),
        error: None,
        deferred: BTreeSet::new(),
    }
    .run()
    .instrument(span)
    .await
}

struct Evaluator<'a, C: ?Sized> {
    ctx: &'a C,
    program: &'a Program,
    config: &'a EngineConfig,
    state: ExecutionState,
    events: Vec<Event>,
    error: Option<OperationError>,
    /// Nodes that failed in this pass; they are retried in the next one
    deferred: BTreeSet<NodePath>,
}

impl<C> Evaluator<'_, C>
where
    C: ExecutionContext + ?Sized,
{
    async fn run(mut self) -> Evaluation {
        if self.state.is_terminal() {
            return self.finish(false);
        }

        let start = std::time::Instant::now();
        let before = (
            self.state.nodes.clone(),
            self.state.branches.clone(),
            self.state.iterations.clone(),
        );

        self.recover_interrupted();

        loop {
            let work = {
                let mut planner = Planner {
                    state: &mut self.state,
                    policy: self.config.parallel_failure,
                    deferred: &self.deferred,
                    work: Vec::new(),
                };
                planner.visit(&NodePath::root(), &self.program.root);
                planner.work
            };
            if work.is_empty() {
                break;
            }

            for item in work {
                let failed = match item {
                    Work::Invoke(path) => self.invoke(&path).await,
                    Work::Decide(path) => self.decide(&path).await,
                    Work::Until(path) => self.until(&path).await,
                };
                // Re-plan so the failure propagates before more work runs
                if failed {
                    break;
                }
            }
        }

        let progressed = before
            != (
                self.state.nodes.clone(),
                self.state.branches.clone(),
                self.state.iterations.clone(),
            );
        self.settle_program_status(progressed);

        tracing::info!(
            status = ?self.state.status,
            waiting = self.state.pending_effects.len(),
            events = self.events.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "evaluated"
        );
        self.finish(progressed)
    }

    fn finish(self, progressed: bool) -> Evaluation {
        Evaluation {
            state: self.state,
            events: self.events,
            error: self.error,
            progressed,
        }
    }

    /// A leaf left `Active` was interrupted mid-pass; run it again. Its
    /// idempotency key is unchanged, so a submission that did go through
    /// is answered with the original receipt.
    fn recover_interrupted(&mut self) {
        let program = self.program;
        let interrupted: Vec<NodePath> = self
            .state
            .nodes
            .iter()
            .filter(|(path, status)| {
                **status == NodeStatus::Active && program.node(path).is_some_and(Action::is_leaf)
            })
            .map(|(path, _)| path.clone())
            .collect();
        for path in interrupted {
            tracing::warn!(%path, "re-running interrupted step");
            self.state.set_node(&path, NodeStatus::Pending);
        }
    }

    fn settle_program_status(&mut self, progressed: bool) {
        let program_id = self.program.id.clone();
        match self.state.node(&NodePath::root()) {
            NodeStatus::Done | NodeStatus::Skipped => {
                self.state.status = ProgramStatus::Completed;
                self.state.next_check_at_ms = None;
                self.events.push(Event::ProgramCompleted { program_id });
            }
            NodeStatus::Failed | NodeStatus::Cancelled => {
                let reason = self
                    .state
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "program failed".to_string());
                self.state.status = ProgramStatus::Failed;
                self.state.next_check_at_ms = None;
                self.events.push(Event::ProgramFailed { program_id, reason });
            }
            _ if !self.state.pending_effects.is_empty() => {
                self.state.status = ProgramStatus::WaitingOnEffect;
            }
            _ => self.state.status = ProgramStatus::Running,
        }
        if progressed || self.state.is_terminal() {
            self.state.updated_at_ms = self.ctx.now_ms();
        }
    }

    /// Record a failed invocation; returns true if the node is now Failed
    fn record_failure(&mut self, path: &NodePath, limit: u32, error: OperationError) -> bool {
        let attempts = self.state.record_attempt(path);
        let program_id = self.program.id.clone();
        let terminal = attempts > limit;
        if terminal {
            tracing::warn!(%path, attempts, error = %error, "step failed");
            self.state.set_node(path, NodeStatus::Failed);
            self.state.last_error = Some(format!("{}: {}", path, error));
            self.events.push(Event::StepFailed {
                program_id,
                path: path.clone(),
                reason: error.to_string(),
            });
        } else {
            tracing::warn!(%path, attempts, limit, error = %error, "step will be retried");
            self.state.set_node(path, NodeStatus::Pending);
            self.deferred.insert(path.clone());
            self.events.push(Event::StepRetrying {
                program_id,
                path: path.clone(),
                attempt: attempts,
                error: error.to_string(),
            });
        }
        self.error = Some(error);
        terminal
    }

    async fn invoke(&mut self, path: &NodePath) -> bool {
        let program = self.program;
        let Some(Action::Leaf {
            operation,
            retry_limit,
            timeout,
        }) = program.node(path)
        else {
            return false;
        };
        if self.state.node(path) != NodeStatus::Pending {
            return false;
        }

        self.state.set_node(path, NodeStatus::Active);
        let key = self.idempotency_key(path);

        match self.run_operation(operation, &key).await {
            Ok(Outcome::Done) => {
                tracing::info!(%path, operation = operation.name(), "step done");
                self.state.set_node(path, NodeStatus::Done);
                self.events.push(Event::StepDone {
                    program_id: self.program.id.clone(),
                    path: path.clone(),
                    operation: operation.name().to_string(),
                });
                false
            }
            Ok(Outcome::Wait(condition)) => {
                tracing::info!(%path, condition = condition.name(), "step waiting");
                let deadline = timeout.map(|timeout| {
                    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    self.ctx.now_ms().saturating_add(millis)
                });
                self.events.push(Event::StepWaiting {
                    program_id: self.program.id.clone(),
                    path: path.clone(),
                    condition: condition.name().to_string(),
                });
                self.state
                    .wait_on(path, Effect::new(condition).with_deadline(deadline));
                false
            }
            Err(e) => {
                let limit = retry_limit.unwrap_or(self.config.retry_limit);
                self.record_failure(path, limit, e)
            }
        }
    }

    /// Key for account submissions: stable while a step is re-run from the
    /// same attempt, distinct across attempts and repeat iterations
    fn idempotency_key(&self, path: &NodePath) -> String {
        let attempt = self.state.attempts(path);
        let mut generations = Vec::new();
        let mut ancestor = path.parent();
        while let Some(current) = ancestor {
            if let Some(n) = self.state.iterations.get(&current).filter(|n| **n > 0) {
                generations.push(n.to_string());
            }
            ancestor = current.parent();
        }
        if generations.is_empty() {
            format!("{}/{}/{}", self.program.id, path, attempt)
        } else {
            generations.reverse();
            format!(
                "{}/{}~{}/{}",
                self.program.id,
                path,
                generations.join("."),
                attempt
            )
        }
    }

    async fn run_operation(
        &mut self,
        operation: &Operation,
        key: &str,
    ) -> Result<Outcome, OperationError> {
        let ctx = self.ctx;
        let outcome = match operation {
            Operation::Transfer {
                wallet_id,
                token_id,
                address,
                amount,
                confirmations,
            } => {
                let receipt = ctx
                    .send(&SendRequest {
                        idempotency_key: key.to_string(),
                        wallet_id: wallet_id.clone(),
                        token_id: token_id.clone(),
                        address: address.clone(),
                        amount: *amount,
                    })
                    .await?;
                confirmation(receipt.wallet_id, receipt.tx_id, *confirmations)
            }
            Operation::TransferToWallet {
                wallet_id,
                token_id,
                to_wallet_id,
                amount,
                confirmations,
            } => {
                let address = ctx.receive_address(to_wallet_id).await?;
                let receipt = ctx
                    .send(&SendRequest {
                        idempotency_key: key.to_string(),
                        wallet_id: wallet_id.clone(),
                        token_id: token_id.clone(),
                        address,
                        amount: *amount,
                    })
                    .await?;
                confirmation(receipt.wallet_id, receipt.tx_id, *confirmations)
            }
            Operation::Swap {
                from_wallet_id,
                from_token_id,
                to_wallet_id,
                to_token_id,
                amount,
                confirmations,
            } => {
                let receipt = ctx
                    .swap(&SwapRequest {
                        idempotency_key: key.to_string(),
                        from_wallet_id: from_wallet_id.clone(),
                        from_token_id: from_token_id.clone(),
                        to_wallet_id: to_wallet_id.clone(),
                        to_token_id: to_token_id.clone(),
                        amount: *amount,
                    })
                    .await?;
                confirmation(receipt.wallet_id, receipt.tx_id, *confirmations)
            }
            Operation::BroadcastTx {
                wallet_id,
                raw_tx,
                confirmations,
            } => {
                let receipt = ctx
                    .broadcast(&BroadcastRequest {
                        idempotency_key: key.to_string(),
                        wallet_id: wallet_id.clone(),
                        raw_tx: raw_tx.clone(),
                    })
                    .await?;
                confirmation(receipt.wallet_id, receipt.tx_id, *confirmations)
            }
            Operation::WaitForTx {
                wallet_id,
                tx_id,
                confirmations,
            } => Outcome::Wait(Condition::TxConfirmation {
                wallet_id: wallet_id.clone(),
                tx_id: tx_id.clone(),
                confirmations: *confirmations,
            }),
            Operation::Delay { duration } => {
                let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                Outcome::Wait(Condition::UnixTime {
                    timestamp_ms: ctx.now_ms().saturating_add(millis),
                })
            }
            Operation::WaitUntil { timestamp_ms } => Outcome::Wait(Condition::UnixTime {
                timestamp_ms: *timestamp_ms,
            }),
            Operation::WaitForBalance {
                wallet_id,
                token_id,
                above,
                below,
            } => Outcome::Wait(Condition::AddressBalance {
                wallet_id: wallet_id.clone(),
                token_id: token_id.clone(),
                above: *above,
                below: *below,
            }),
            Operation::WaitForPrice { pair, above, below } => {
                Outcome::Wait(Condition::PriceLevel {
                    pair: pair.clone(),
                    above: *above,
                    below: *below,
                })
            }
            Operation::Notify { title, message } => {
                self.events.push(Event::Notify {
                    program_id: self.program.id.clone(),
                    title: title.clone(),
                    message: message.clone(),
                });
                Outcome::Done
            }
        };
        Ok(outcome)
    }

    async fn decide(&mut self, path: &NodePath) -> bool {
        let program = self.program;
        let Some(Action::Conditional {
            predicate,
            otherwise,
            ..
        }) = program.node(path)
        else {
            return false;
        };
        if self.state.branches.contains_key(path) {
            return false;
        }

        match self.predicate(predicate).await {
            Ok(holds) => {
                let branch = if holds { Branch::Then } else { Branch::Otherwise };
                tracing::debug!(%path, ?branch, "branch chosen");
                self.state.branches.insert(path.clone(), branch);

                let untaken = match branch {
                    Branch::Then => otherwise.as_deref(),
                    Branch::Otherwise => program.node(&path.child(0)),
                };
                if let Some(untaken) = untaken {
                    let untaken_path = path.child(1 - branch.child_index());
                    settle_subtree(&mut self.state, &untaken_path, untaken, NodeStatus::Skipped);
                }
                false
            }
            Err(e) => self.record_failure(path, self.config.retry_limit, e),
        }
    }

    async fn until(&mut self, path: &NodePath) -> bool {
        let program = self.program;
        let Some(Action::Repeat {
            until,
            max_iterations,
            ..
        }) = program.node(path)
        else {
            return false;
        };
        if self.state.node(path).is_terminal() {
            return false;
        }

        let holds = match self.predicate(until).await {
            Ok(holds) => holds,
            Err(e) => return self.record_failure(path, self.config.retry_limit, e),
        };

        let iterations = self.state.iterations.entry(path.clone()).or_insert(0);
        *iterations += 1;
        let iterations = *iterations;

        if holds {
            tracing::debug!(%path, iterations, "repeat done");
            self.state.set_node(path, NodeStatus::Done);
            false
        } else if iterations >= *max_iterations {
            let reason = format!("until not met after {} iterations", iterations);
            tracing::warn!(%path, iterations, "repeat exhausted");
            self.state.set_node(path, NodeStatus::Failed);
            self.state.last_error = Some(format!("{}: {}", path, reason));
            self.events.push(Event::StepFailed {
                program_id: self.program.id.clone(),
                path: path.clone(),
                reason,
            });
            true
        } else {
            tracing::debug!(%path, iterations, "repeating");
            self.state.reset_subtree(path);
            false
        }
    }

    /// Decide a predicate. All reads happen first, then the boolean
    /// structure is folded over the results.
    async fn predicate(&self, predicate: &Predicate) -> Result<bool, OperationError> {
        let mut atoms = Vec::new();
        collect_atoms(predicate, &mut atoms);

        let mut values = Vec::with_capacity(atoms.len());
        for atom in atoms {
            values.push(self.atom(atom).await?);
        }
        Ok(combine(predicate, &mut values.into_iter()))
    }

    async fn atom(&self, predicate: &Predicate) -> Result<bool, OperationError> {
        let ctx = self.ctx;
        Ok(match predicate {
            Predicate::BalanceAbove {
                wallet_id,
                token_id,
                amount,
            } => {
                let balance = ctx.balance(wallet_id, token_id.as_deref()).await?;
                within_bounds(balance, Some(*amount), None)
            }
            Predicate::BalanceBelow {
                wallet_id,
                token_id,
                amount,
            } => {
                let balance = ctx.balance(wallet_id, token_id.as_deref()).await?;
                within_bounds(balance, None, Some(*amount))
            }
            Predicate::PriceAbove { pair, rate } => {
                within_bounds(ctx.exchange_rate(pair).await?, Some(*rate), None)
            }
            Predicate::PriceBelow { pair, rate } => {
                within_bounds(ctx.exchange_rate(pair).await?, None, Some(*rate))
            }
            Predicate::StateFlag { key } => ctx.read_state(key)?.is_some_and(|v| is_truthy(&v)),
            Predicate::Not { .. } | Predicate::All { .. } | Predicate::Any { .. } => false,
        })
    }
}

fn confirmation(wallet_id: String, tx_id: String, confirmations: u32) -> Outcome {
    if confirmations == 0 {
        Outcome::Done
    } else {
        Outcome::Wait(Condition::TxConfirmation {
            wallet_id,
            tx_id,
            confirmations,
        })
    }
}

fn collect_atoms<'p>(predicate: &'p Predicate, out: &mut Vec<&'p Predicate>) {
    match predicate {
        Predicate::Not { predicate } => collect_atoms(predicate, out),
        Predicate::All { predicates } | Predicate::Any { predicates } => {
            for predicate in predicates {
                collect_atoms(predicate, out);
            }
        }
        atom => out.push(atom),
    }
}

/// Fold atom results back into the predicate's structure. Consumes exactly
/// one value per atom, in the order `collect_atoms` produced them.
fn combine(predicate: &Predicate, values: &mut std::vec::IntoIter<bool>) -> bool {
    match predicate {
        Predicate::Not { predicate } => !combine(predicate, values),
        Predicate::All { predicates } => {
            let results: Vec<bool> = predicates.iter().map(|p| combine(p, values)).collect();
            results.into_iter().all(|v| v)
        }
        Predicate::Any { predicates } => {
            let results: Vec<bool> = predicates.iter().map(|p| combine(p, values)).collect();
            results.into_iter().any(|v| v)
        }
        _ => values.next().unwrap_or(false),
    }
}

/// Set every unfinished node at or below `path` to `status` and drop their
/// pending effects
fn settle_subtree(
    state: &mut ExecutionState,
    path: &NodePath,
    action: &Action,
    status: NodeStatus,
) {
    let mut paths = Vec::new();
    action.walk(path.clone(), &mut |p, _| paths.push(p.clone()));
    for p in &paths {
        if !state.node(p).is_terminal() {
            state.set_node(p, status);
        }
    }
    state
        .pending_effects
        .retain(|pending| !pending.path.starts_with(path));
}

/// Synchronous roll-up walk
struct Planner<'s> {
    state: &'s mut ExecutionState,
    policy: ParallelFailurePolicy,
    deferred: &'s BTreeSet<NodePath>,
    work: Vec<Work>,
}

impl Planner<'_> {
    /// Bring the node at `path` up to date with its children and queue any
    /// ready work beneath it. Returns the node's status.
    fn visit(&mut self, path: &NodePath, action: &Action) -> NodeStatus {
        let current = self.state.node(path);
        if current.is_terminal() {
            return current;
        }

        let status = match action {
            Action::Leaf { .. } => {
                if current == NodeStatus::Pending {
                    self.queue(Work::Invoke(path.clone()));
                }
                return current;
            }
            Action::Sequence { children } => self.visit_sequence(path, children),
            Action::Parallel { children } => self.visit_parallel(path, children),
            Action::Conditional {
                then, otherwise, ..
            } => self.visit_conditional(path, then, otherwise.as_deref()),
            Action::Repeat { body, .. } => self.visit_repeat(path, body),
        };
        self.state.set_node(path, status);
        status
    }

    fn queue(&mut self, work: Work) {
        if !self.deferred.contains(work.path()) {
            self.work.push(work);
        }
    }

    fn visit_sequence(&mut self, path: &NodePath, children: &[Action]) -> NodeStatus {
        for (index, child) in children.iter().enumerate() {
            match self.visit(&path.child(index), child) {
                NodeStatus::Done | NodeStatus::Skipped => continue,
                NodeStatus::Failed | NodeStatus::Cancelled => {
                    for (rest, sibling) in children.iter().enumerate().skip(index + 1) {
                        settle_subtree(self.state, &path.child(rest), sibling, NodeStatus::Failed);
                    }
                    return NodeStatus::Failed;
                }
                _ => return NodeStatus::Active,
            }
        }
        NodeStatus::Done
    }

    fn visit_parallel(&mut self, path: &NodePath, children: &[Action]) -> NodeStatus {
        let statuses: Vec<NodeStatus> = children
            .iter()
            .enumerate()
            .map(|(index, child)| self.visit(&path.child(index), child))
            .collect();

        let failed = statuses
            .iter()
            .any(|s| matches!(s, NodeStatus::Failed | NodeStatus::Cancelled));
        if failed {
            return match self.policy {
                ParallelFailurePolicy::CancelSiblings => {
                    for (index, child) in children.iter().enumerate() {
                        if !statuses[index].is_terminal() {
                            let child_path = path.child(index);
                            self.work.retain(|w| !w.path().starts_with(&child_path));
                            settle_subtree(self.state, &child_path, child, NodeStatus::Cancelled);
                        }
                    }
                    NodeStatus::Failed
                }
                ParallelFailurePolicy::WaitForSiblings => {
                    if statuses.iter().all(|s| s.is_terminal()) {
                        NodeStatus::Failed
                    } else {
                        NodeStatus::Active
                    }
                }
            };
        }

        if statuses
            .iter()
            .all(|s| matches!(s, NodeStatus::Done | NodeStatus::Skipped))
        {
            NodeStatus::Done
        } else {
            NodeStatus::Active
        }
    }

    fn visit_conditional(
        &mut self,
        path: &NodePath,
        then: &Action,
        otherwise: Option<&Action>,
    ) -> NodeStatus {
        let Some(branch) = self.state.branches.get(path).copied() else {
            self.queue(Work::Decide(path.clone()));
            return NodeStatus::Active;
        };
        let taken = match branch {
            Branch::Then => Some(then),
            Branch::Otherwise => otherwise,
        };
        let Some(taken) = taken else {
            return NodeStatus::Done;
        };
        match self.visit(&path.child(branch.child_index()), taken) {
            NodeStatus::Done | NodeStatus::Skipped => NodeStatus::Done,
            NodeStatus::Failed | NodeStatus::Cancelled => NodeStatus::Failed,
            _ => NodeStatus::Active,
        }
    }

    fn visit_repeat(&mut self, path: &NodePath, body: &Action) -> NodeStatus {
        match self.visit(&path.child(0), body) {
            NodeStatus::Done | NodeStatus::Skipped => {
                self.queue(Work::Until(path.clone()));
                NodeStatus::Active
            }
            NodeStatus::Failed | NodeStatus::Cancelled => NodeStatus::Failed,
            _ => NodeStatus::Active,
        }
    }
}

#[cfg(test)]
#[path = "evaluator_tests.rs"]
mod tests;
