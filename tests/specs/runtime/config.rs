//! Engine configuration specs

use crate::prelude::*;
use similar_asserts::assert_eq;

const SPLIT_PAYMENT: &str = r#"{
    "id": "split",
    "root": {
        "type": "parallel",
        "children": [
            {
                "type": "leaf",
                "operation": {
                    "op": "transfer",
                    "wallet_id": "empty",
                    "address": "bc1-a",
                    "amount": "10"
                }
            },
            {
                "type": "leaf",
                "operation": { "op": "delay", "duration": "5m" }
            }
        ]
    }
}"#;

fn load(toml: &str) -> EngineConfig {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, toml).unwrap();
    EngineConfig::load(&path).unwrap()
}

#[tokio::test]
async fn cancel_siblings_policy_stops_parallel_block() {
    let config = load(
        r#"
        retry_limit = 0
        parallel_failure = "cancel_siblings"
        "#,
    );
    let world = World::with_config(config);
    let id = world.schedule(SPLIT_PAYMENT).await;

    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::Failed);
    assert_eq!(world.node(&id, "0"), NodeStatus::Failed);
    assert_eq!(world.node(&id, "1"), NodeStatus::Cancelled);
}

#[tokio::test]
async fn default_policy_lets_siblings_finish() {
    let config = load("retry_limit = 0\n");
    let world = World::with_config(config);
    let id = world.schedule(SPLIT_PAYMENT).await;

    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::WaitingOnEffect);
    assert_eq!(world.node(&id, "1"), NodeStatus::WaitingOnEffect);

    world.ctx.clock().advance(Duration::from_secs(300));
    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::Failed);
    assert_eq!(world.node(&id, "1"), NodeStatus::Done);
}

#[tokio::test]
async fn poll_interval_sets_next_check() {
    let config = load("poll_interval = \"30s\"\nmax_backoff = \"2m\"\n");
    let world = World::with_config(config);
    let id = world.schedule(SPLIT_PAYMENT).await;
    world.fund("empty", 100);
    let now = world.ctx.now_ms();

    let next = [
        world.tick(&id).await.next_check_at_ms,
        world.tick(&id).await.next_check_at_ms,
        world.tick(&id).await.next_check_at_ms,
        world.tick(&id).await.next_check_at_ms,
    ];

    assert_eq!(
        next,
        [
            Some(now + 30_000),
            Some(now + 60_000),
            Some(now + 120_000),
            Some(now + 120_000),
        ]
    );
}
