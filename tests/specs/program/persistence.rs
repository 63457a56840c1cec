//! Persistence specs
//!
//! State lives on disk between passes, survives a restart, and resuming
//! never repeats a submission that already went through.

use crate::prelude::*;
use similar_asserts::assert_eq;

const PAY_THEN_CONFIRM: &str = r#"{
    "id": "pay",
    "root": {
        "type": "sequence",
        "children": [
            {
                "type": "leaf",
                "operation": {
                    "op": "transfer",
                    "wallet_id": "w1",
                    "address": "bc1-dest",
                    "amount": "40",
                    "confirmations": 1
                }
            },
            {
                "type": "leaf",
                "operation": { "op": "notify", "title": "paid", "message": "40 sent" }
            }
        ]
    }
}"#;

#[tokio::test]
async fn state_is_written_as_json_after_each_pass() {
    let world = World::new();
    world.fund("w1", 100);
    let id = world.schedule(PAY_THEN_CONFIRM).await;
    world.tick(&id).await;

    let text = std::fs::read_to_string(world.path().join("states/pay.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(json["status"], "waiting_on_effect");
    assert_eq!(json["revision"], 2);
    assert_eq!(json["nodes"]["0"], "waiting_on_effect");
    assert_eq!(json["pending_effects"][0]["path"], "0");
    let condition = &json["pending_effects"][0]["effect"]["condition"];
    assert_eq!(condition["type"], "tx_confirmation");
    assert_eq!(condition["tx_id"], "tx-1");
    assert!(world.path().join("programs/pay.json").exists());
}

#[tokio::test]
async fn waiting_program_resumes_after_restart() {
    let world = World::new();
    world.fund("w1", 100);
    let id = world.schedule(PAY_THEN_CONFIRM).await;
    world.tick(&id).await;

    let world = world.restart();
    world.ctx.account().confirm("tx-1", 1);
    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::Completed);
    assert_eq!(world.executed(), vec!["pay/0/0".to_string()]);
    assert_eq!(world.ctx.balance("w1", None).await.unwrap(), Amount(60));
}

#[tokio::test]
async fn interrupted_submission_is_not_repeated() {
    let world = World::new();
    world.fund("w1", 100);
    let id = world.schedule(PAY_THEN_CONFIRM).await;

    // The transfer reached the account but the process died before saving
    world
        .ctx
        .send(&SendRequest {
            idempotency_key: "pay/0/0".to_string(),
            wallet_id: "w1".to_string(),
            token_id: None,
            address: "bc1-dest".to_string(),
            amount: Amount(40),
        })
        .await
        .unwrap();
    let mut state = world.state(&id);
    state.set_node(&NodePath::root(), NodeStatus::Active);
    state.set_node(&"0".parse().unwrap(), NodeStatus::Active);
    world.store().save(&mut state).unwrap();

    let world = world.restart();
    let report = world.tick(&id).await;

    assert_eq!(report.status, ProgramStatus::WaitingOnEffect);
    assert_eq!(world.node(&id, "0"), NodeStatus::WaitingOnEffect);
    assert_eq!(world.executed(), vec!["pay/0/0".to_string()]);
    assert_eq!(world.ctx.balance("w1", None).await.unwrap(), Amount(60));
}

#[tokio::test]
async fn due_programs_are_found_on_disk() {
    let world = World::new();
    world.fund("w1", 100);
    let id = world.schedule(PAY_THEN_CONFIRM).await;
    std::fs::write(world.path().join("states/garbage.json"), "{ not json").unwrap();

    let world = world.restart();
    let results = world.runtime.tick_due().await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, id);
    assert_eq!(
        results[0].1.as_ref().unwrap().status,
        ProgramStatus::WaitingOnEffect
    );
}

#[tokio::test]
async fn stale_state_is_rejected() {
    let world = World::new();
    let id = world.schedule(PAY_THEN_CONFIRM).await;
    let mut stale = world.state(&id);
    let mut fresh = world.state(&id);
    world.store().save(&mut fresh).unwrap();

    let err = world.store().save(&mut stale).unwrap_err();

    assert!(matches!(err, StoreError::Conflict { .. }), "{}", err);
}
