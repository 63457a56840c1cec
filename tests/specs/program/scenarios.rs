//! Program execution specs
//!
//! The three reference scenarios: a two-step sequence waiting on a
//! confirmation, a step that exhausts its retries, and a parallel block
//! with one fast and one slow child.

use crate::prelude::*;
use similar_asserts::assert_eq;

const PAY_THEN_CONFIRM: &str = r#"{
    "id": "pay",
    "name": "pay then confirm",
    "root": {
        "type": "sequence",
        "children": [
            {
                "type": "leaf",
                "operation": {
                    "op": "transfer",
                    "wallet_id": "w1",
                    "address": "bc1-dest",
                    "amount": "25"
                }
            },
            {
                "type": "leaf",
                "operation": {
                    "op": "wait_for_tx",
                    "wallet_id": "w1",
                    "tx_id": "tx-1",
                    "confirmations": 3
                }
            }
        ]
    }
}"#;

const ALWAYS_FAILS: &str = r#"{
    "id": "doomed",
    "root": {
        "type": "leaf",
        "retry_limit": 2,
        "operation": {
            "op": "transfer",
            "wallet_id": "w1",
            "address": "bc1-dest",
            "amount": "25"
        }
    }
}"#;

const FAST_AND_SLOW: &str = r#"{
    "id": "fan-out",
    "root": {
        "type": "parallel",
        "children": [
            {
                "type": "leaf",
                "operation": { "op": "notify", "title": "started", "message": "fan-out" }
            },
            {
                "type": "leaf",
                "operation": { "op": "delay", "duration": "10m" }
            }
        ]
    }
}"#;

#[tokio::test]
async fn sequence_waits_for_confirmation_then_completes() {
    let world = World::new();
    world.fund("w1", 100);
    let id = world.schedule(PAY_THEN_CONFIRM).await;

    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::WaitingOnEffect);
    assert_eq!(world.node(&id, "0"), NodeStatus::Done);
    assert_eq!(world.node(&id, "1"), NodeStatus::WaitingOnEffect);
    assert_eq!(world.state(&id).pending_effects.len(), 1);

    world.ctx.account().confirm("tx-1", 2);
    assert_eq!(world.tick(&id).await.status, ProgramStatus::WaitingOnEffect);

    world.ctx.account().confirm("tx-1", 3);
    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::Completed);
    assert_eq!(world.node(&id, "1"), NodeStatus::Done);
    assert_eq!(world.executed(), vec!["pay/0/0".to_string()]);
    assert_eq!(
        world.events(),
        vec![
            "program:started",
            "step:done",
            "step:waiting",
            "step:done",
            "program:completed",
        ]
    );
}

#[tokio::test]
async fn failing_step_is_retried_then_fails_program() {
    let world = World::new();
    world
        .ctx
        .account()
        .fail_submissions(Some(AccountError::Network("connection refused".into())));
    let id = world.schedule(ALWAYS_FAILS).await;

    let statuses = [
        world.tick(&id).await.status,
        world.tick(&id).await.status,
        world.tick(&id).await.status,
    ];

    assert_eq!(
        statuses,
        [
            ProgramStatus::Running,
            ProgramStatus::Running,
            ProgramStatus::Failed,
        ]
    );
    assert_eq!(world.node(&id, "root"), NodeStatus::Failed);
    assert_eq!(
        world.state(&id).last_error.as_deref(),
        Some("root: account error: network error: connection refused")
    );
    assert!(world.executed().is_empty());
}

#[tokio::test]
async fn parallel_children_finish_independently() {
    let world = World::new();
    let id = world.schedule(FAST_AND_SLOW).await;

    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::WaitingOnEffect);
    assert_eq!(world.node(&id, "0"), NodeStatus::Done);
    assert_eq!(world.node(&id, "1"), NodeStatus::WaitingOnEffect);

    world.ctx.clock().advance(Duration::from_secs(600));
    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::Completed);
    assert!(world.events().contains(&"notify"));
}
