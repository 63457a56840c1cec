//! Control flow specs
//!
//! Conditionals, repeats and cancellation as seen from outside the engine.

use crate::prelude::*;
use similar_asserts::assert_eq;

const TOP_UP_IF_LOW: &str = r#"{
    "id": "top-up",
    "root": {
        "type": "conditional",
        "predicate": { "kind": "balance_below", "wallet_id": "hot", "amount": "50" },
        "then": {
            "type": "leaf",
            "operation": {
                "op": "swap",
                "from_wallet_id": "cold",
                "to_wallet_id": "hot",
                "amount": "100"
            }
        },
        "otherwise": {
            "type": "leaf",
            "operation": { "op": "notify", "title": "skipped", "message": "hot wallet funded" }
        }
    }
}"#;

const SWEEP: &str = r#"{
    "id": "sweep",
    "root": {
        "type": "repeat",
        "max_iterations": 10,
        "until": { "kind": "balance_below", "wallet_id": "w1", "amount": "30" },
        "body": {
            "type": "leaf",
            "operation": {
                "op": "transfer",
                "wallet_id": "w1",
                "address": "bc1-vault",
                "amount": "25"
            }
        }
    }
}"#;

const PAUSABLE: &str = r#"{
    "id": "dca",
    "root": {
        "type": "sequence",
        "children": [
            { "type": "leaf", "operation": { "op": "delay", "duration": "1h" } },
            {
                "type": "leaf",
                "operation": {
                    "op": "transfer",
                    "wallet_id": "w1",
                    "address": "bc1-dest",
                    "amount": "5"
                }
            }
        ]
    }
}"#;

#[tokio::test]
async fn conditional_takes_then_branch_when_predicate_holds() {
    let world = World::new();
    world.fund("hot", 10);
    world.fund("cold", 500);
    let id = world.schedule(TOP_UP_IF_LOW).await;

    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::Completed);
    assert_eq!(world.node(&id, "0"), NodeStatus::Done);
    assert_eq!(world.node(&id, "1"), NodeStatus::Skipped);
    assert_eq!(world.executed(), vec!["top-up/0/0".to_string()]);
    assert!(!world.events().contains(&"notify"));
}

#[tokio::test]
async fn conditional_takes_otherwise_branch_when_predicate_fails() {
    let world = World::new();
    world.fund("hot", 80);
    let id = world.schedule(TOP_UP_IF_LOW).await;

    world.tick(&id).await;

    assert_eq!(world.node(&id, "0"), NodeStatus::Skipped);
    assert_eq!(world.node(&id, "1"), NodeStatus::Done);
    assert!(world.executed().is_empty());
    assert!(world.events().contains(&"notify"));
}

#[tokio::test]
async fn repeat_sweeps_until_balance_is_low() {
    let world = World::new();
    world.fund("w1", 100);
    let id = world.schedule(SWEEP).await;

    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::Completed);
    assert_eq!(
        world.executed(),
        vec!["sweep/0/0", "sweep/0~1/0", "sweep/0~2/0"]
    );
    assert_eq!(
        world.state(&id).iterations.get(&NodePath::root()),
        Some(&3)
    );
}

#[tokio::test]
async fn cancelled_program_never_runs_remaining_steps() {
    let world = World::new();
    world.fund("w1", 100);
    let id = world.schedule(PAUSABLE).await;
    world.tick(&id).await;

    let state = world.runtime.cancel(&id).await.unwrap();
    world.ctx.clock().advance(Duration::from_secs(3600));
    let report = world.tick(&id).await;

    assert_eq!(state.status, ProgramStatus::Cancelled);
    assert_eq!(report.status, ProgramStatus::Cancelled);
    assert_eq!(world.node(&id, "1"), NodeStatus::Cancelled);
    assert!(world.executed().is_empty());
    assert_eq!(world.events().last(), Some(&"program:cancelled"));
}
