// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution state: the persisted progress record of one program instance

use crate::effect::{Effect, EffectStatus};
use crate::id::ProgramId;
use crate::path::NodePath;
use crate::program::{Action, Program};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of a single node in the action tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Pending,
    /// Started and not finished. Leaves are only Active within a pass;
    /// composites stay Active while any child is in progress.
    Active,
    /// Leaf waiting on an effect listed in `pending_effects`
    WaitingOnEffect,
    Done,
    Failed,
    /// Untaken conditional branch
    Skipped,
    Cancelled,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Done | NodeStatus::Failed | NodeStatus::Skipped | NodeStatus::Cancelled
        )
    }

    /// True once the node has begun and has not yet finished
    pub fn is_in_flight(self) -> bool {
        matches!(self, NodeStatus::Active | NodeStatus::WaitingOnEffect)
    }
}

/// Overall status of a program instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    #[default]
    Running,
    WaitingOnEffect,
    Completed,
    Failed,
    Cancelled,
}

impl ProgramStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProgramStatus::Completed | ProgramStatus::Failed | ProgramStatus::Cancelled
        )
    }
}

/// Branch recorded for a conditional once its predicate has been decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Then,
    Otherwise,
}

impl Branch {
    pub fn child_index(self) -> usize {
        match self {
            Branch::Then => 0,
            Branch::Otherwise => 1,
        }
    }
}

/// An effect blocking the leaf at `path`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEffect {
    pub path: NodePath,
    pub effect: Effect,
}

/// Persisted progress record for one program instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub program_id: ProgramId,
    pub client_id: String,
    pub status: ProgramStatus,
    /// Cursor: status of every node; absent means `Pending`
    #[serde(default)]
    pub nodes: BTreeMap<NodePath, NodeStatus>,
    #[serde(default)]
    pub pending_effects: Vec<PendingEffect>,
    /// Failed invocations per leaf
    #[serde(default)]
    pub attempts: BTreeMap<NodePath, u32>,
    #[serde(default)]
    pub branches: BTreeMap<NodePath, Branch>,
    /// Completed iterations per repeat node
    #[serde(default)]
    pub iterations: BTreeMap<NodePath, u32>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Bumped by the store on every successful save
    #[serde(default)]
    pub revision: u64,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    /// Earliest time the driver should check this program again
    #[serde(default)]
    pub next_check_at_ms: Option<u64>,
    /// Consecutive driver passes that made no progress
    #[serde(default)]
    pub idle_polls: u32,
}

impl ExecutionState {
    /// Initial state for a freshly scheduled program: every node Pending
    pub fn new(program: &Program, client_id: impl Into<String>, now_ms: u64) -> Self {
        let nodes = program
            .paths()
            .into_iter()
            .map(|path| (path, NodeStatus::Pending))
            .collect();
        Self {
            program_id: program.id.clone(),
            client_id: client_id.into(),
            status: ProgramStatus::Running,
            nodes,
            pending_effects: Vec::new(),
            attempts: BTreeMap::new(),
            branches: BTreeMap::new(),
            iterations: BTreeMap::new(),
            last_error: None,
            revision: 0,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            next_check_at_ms: None,
            idle_polls: 0,
        }
    }

    pub fn node(&self, path: &NodePath) -> NodeStatus {
        self.nodes.get(path).copied().unwrap_or_default()
    }

    pub fn set_node(&mut self, path: &NodePath, status: NodeStatus) {
        self.nodes.insert(path.clone(), status);
    }

    pub fn attempts(&self, path: &NodePath) -> u32 {
        self.attempts.get(path).copied().unwrap_or(0)
    }

    /// Record one more failed invocation and return the new count
    pub fn record_attempt(&mut self, path: &NodePath) -> u32 {
        let count = self.attempts.entry(path.clone()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn effect_for(&self, path: &NodePath) -> Option<&Effect> {
        self.pending_effects
            .iter()
            .find(|pending| &pending.path == path)
            .map(|pending| &pending.effect)
    }

    /// Park the leaf at `path` on `effect`
    pub fn wait_on(&mut self, path: &NodePath, effect: Effect) {
        self.pending_effects.retain(|pending| &pending.path != path);
        self.pending_effects.push(PendingEffect {
            path: path.clone(),
            effect,
        });
        self.set_node(path, NodeStatus::WaitingOnEffect);
    }

    /// Apply an effect check result to the leaf waiting at `path`.
    ///
    /// Returns true if the state changed. Pending results, and results for
    /// leaves that are not waiting, leave the state untouched.
    pub fn resolve_effect(&mut self, path: &NodePath, status: &EffectStatus) -> bool {
        if self.node(path) != NodeStatus::WaitingOnEffect {
            return false;
        }
        match status {
            EffectStatus::Pending => false,
            EffectStatus::Satisfied => {
                self.pending_effects.retain(|pending| &pending.path != path);
                self.set_node(path, NodeStatus::Done);
                true
            }
            EffectStatus::Failed { reason } => {
                self.pending_effects.retain(|pending| &pending.path != path);
                self.set_node(path, NodeStatus::Failed);
                self.last_error = Some(format!("{}: {}", path, reason));
                true
            }
        }
    }

    /// Return every node strictly beneath `path` to its initial state so a
    /// repeat body can run again
    pub fn reset_subtree(&mut self, path: &NodePath) {
        let below = |p: &NodePath| p.starts_with(path) && p != path;
        for (node_path, status) in self.nodes.iter_mut() {
            if below(node_path) {
                *status = NodeStatus::Pending;
            }
        }
        self.pending_effects.retain(|pending| !below(&pending.path));
        self.attempts.retain(|p, _| !below(p));
        self.branches.retain(|p, _| !below(p));
        self.iterations.retain(|p, _| !below(p));
    }

    /// Stop all further work. Already committed side effects stay committed.
    pub fn cancel(&mut self, now_ms: u64) {
        for status in self.nodes.values_mut() {
            if !status.is_terminal() {
                *status = NodeStatus::Cancelled;
            }
        }
        self.pending_effects.clear();
        self.status = ProgramStatus::Cancelled;
        self.next_check_at_ms = None;
        self.updated_at_ms = now_ms;
    }

    /// Paths of leaves currently waiting on an effect
    pub fn waiting_paths(&self) -> Vec<NodePath> {
        self.nodes
            .iter()
            .filter(|(_, status)| **status == NodeStatus::WaitingOnEffect)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Check the structural invariants that must hold between passes.
    ///
    /// - every waiting leaf has exactly one pending effect and vice versa
    /// - under a sequence, no child has started before its predecessor is done
    pub fn check_invariants(&self, program: &Program) -> Result<(), String> {
        let mut waiting = self.waiting_paths();
        let mut effect_paths: Vec<NodePath> =
            self.pending_effects.iter().map(|p| p.path.clone()).collect();
        waiting.sort();
        effect_paths.sort();
        if waiting != effect_paths {
            return Err(format!(
                "waiting leaves {:?} do not match pending effects {:?}",
                waiting, effect_paths
            ));
        }

        let mut violation = None;
        program.root.walk(NodePath::root(), &mut |path, action| {
            let Action::Sequence { children } = action else {
                return;
            };
            for index in 1..children.len() {
                let before = self.node(&path.child(index - 1));
                let after = self.node(&path.child(index));
                let started = after.is_in_flight() || after == NodeStatus::Done;
                if started && before != NodeStatus::Done && violation.is_none() {
                    violation = Some(format!(
                        "{} is {:?} while predecessor is {:?}",
                        path.child(index),
                        after,
                        before
                    ));
                }
            }
        });
        match violation {
            Some(v) => Err(v),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
