//! Driver specs
//!
//! A running driver picks up due programs on its own and reacts to account
//! changes without waiting for the next poll.

use crate::prelude::*;
use similar_asserts::assert_eq;

const WAIT_FOR_DEPOSIT: &str = r#"{
    "id": "deposit",
    "root": {
        "type": "sequence",
        "children": [
            {
                "type": "leaf",
                "operation": { "op": "wait_for_balance", "wallet_id": "w1", "above": "999" }
            },
            {
                "type": "leaf",
                "operation": { "op": "notify", "title": "funded", "message": "deposit arrived" }
            }
        ]
    }
}"#;

async fn eventually(world: &World, id: &ProgramId, status: ProgramStatus) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while world.state(id).status != status {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "{} never reached {:?}", id, status);
}

#[tokio::test]
async fn driver_completes_program_after_deposit_event() {
    let world = World::with_config(EngineConfig {
        poll_interval: Duration::from_secs(3600),
        max_backoff: Duration::from_secs(3600),
        ..EngineConfig::default()
    });
    let id = world.schedule(WAIT_FOR_DEPOSIT).await;
    let driver = DriverHandle::spawn(world.runtime.clone());
    eventually(&world, &id, ProgramStatus::WaitingOnEffect).await;

    world.fund("w1", 1_000);
    world.ctx.account().emit(AccountEvent::TransactionsChanged {
        wallet_id: "w1".to_string(),
    });
    eventually(&world, &id, ProgramStatus::Completed).await;
    driver.shutdown().await;

    assert_eq!(
        world.events(),
        vec![
            "program:started",
            "step:waiting",
            "step:done",
            "notify",
            "step:done",
            "program:completed",
        ]
    );
}

#[tokio::test]
async fn driver_polls_without_events() {
    let world = World::with_config(EngineConfig {
        poll_interval: Duration::from_millis(10),
        max_backoff: Duration::from_millis(10),
        ..EngineConfig::default()
    });
    let id = world.schedule(WAIT_FOR_DEPOSIT).await;
    let driver = DriverHandle::spawn(world.runtime.clone());
    eventually(&world, &id, ProgramStatus::WaitingOnEffect).await;

    world.fund("w1", 1_000);
    world.ctx.clock().advance(Duration::from_secs(1));
    eventually(&world, &id, ProgramStatus::Completed).await;
    driver.shutdown().await;
}
