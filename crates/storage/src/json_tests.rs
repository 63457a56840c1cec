// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use aq_core::{Action, Amount, NodePath, NodeStatus, Operation, ProgramStatus};
use tempfile::TempDir;

fn program(id: &str) -> Program {
    Program::new(
        id,
        "payout",
        Action::sequence([
            Action::leaf(Operation::Transfer {
                wallet_id: "w1".into(),
                token_id: None,
                address: "addr-1".into(),
                amount: Amount(1_000),
                confirmations: 1,
            }),
            Action::leaf(Operation::Notify {
                title: "done".into(),
                message: "paid".into(),
            }),
        ]),
    )
}

fn open() -> (TempDir, JsonProgramStore) {
    let dir = TempDir::new().unwrap();
    let store = JsonProgramStore::open(dir.path().join("store")).unwrap();
    (dir, store)
}

#[test]
fn program_definition_survives_reopen() {
    let (dir, store) = open();
    let program = program("p1");
    store.save_program(&program).unwrap();

    let reopened = JsonProgramStore::open(dir.path().join("store")).unwrap();
    assert_eq!(reopened.load_program(&program.id).unwrap(), program);
}

#[test]
fn save_bumps_revision_and_load_returns_it() {
    let (_dir, store) = open();
    let program = program("p1");
    let mut state = ExecutionState::new(&program, "client", 1_000);
    state.set_node(&NodePath::from([0]), NodeStatus::Done);

    store.save(&mut state).unwrap();
    assert_eq!(state.revision, 1);
    store.save(&mut state).unwrap();
    assert_eq!(state.revision, 2);

    assert_eq!(store.load(&program.id).unwrap(), state);
}

#[test]
fn stale_save_is_rejected() {
    let (_dir, store) = open();
    let program = program("p1");
    let mut state = ExecutionState::new(&program, "client", 1_000);
    store.save(&mut state).unwrap();

    let mut stale = state.clone();
    store.save(&mut state).unwrap();

    let err = store.save(&mut stale).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { stored: 2, expected: 1, .. }));
    assert_eq!(stale.revision, 1);
}

#[test]
fn missing_records_are_not_found() {
    let (_dir, store) = open();
    let id = ProgramId::new("nope");

    assert!(store.load(&id).unwrap_err().is_not_found());
    assert!(store.load_program(&id).unwrap_err().is_not_found());
}

#[test]
fn list_active_skips_terminal_programs() {
    let (_dir, store) = open();
    for id in ["a", "b", "c"] {
        let mut state = ExecutionState::new(&program(id), "client", 0);
        if id == "b" {
            state.status = ProgramStatus::Completed;
        }
        store.save(&mut state).unwrap();
    }

    assert_eq!(
        store.list_active().unwrap(),
        vec![ProgramId::new("a"), ProgramId::new("c")]
    );
}

#[test]
fn list_active_ignores_stray_files() {
    let (_dir, store) = open();
    std::fs::write(store.base_path().join("states").join("notes.txt"), "hi").unwrap();
    std::fs::write(store.base_path().join("states").join("broken.json"), "{").unwrap();

    assert!(store.list_active().unwrap().is_empty());
}

#[test]
fn ids_that_escape_the_store_are_rejected() {
    let (dir, store) = open();
    let program = program("../../outside");
    let mut state = ExecutionState::new(&program, "client", 0);

    assert!(matches!(
        store.save_program(&program),
        Err(StoreError::InvalidId(_))
    ));
    assert!(matches!(store.save(&mut state), Err(StoreError::InvalidId(_))));
    assert!(matches!(store.load(&program.id), Err(StoreError::InvalidId(_))));
    assert_eq!(state.revision, 0);
    assert!(!dir.path().join("outside.json").exists());
    assert!(!dir.path().join("store").join("outside.json").exists());
}

#[test]
fn delete_removes_both_documents() {
    let (_dir, store) = open();
    let program = program("p1");
    let mut state = ExecutionState::new(&program, "client", 0);
    store.save_program(&program).unwrap();
    store.save(&mut state).unwrap();

    store.delete(&program.id).unwrap();
    store.delete(&program.id).unwrap();

    assert!(store.load(&program.id).unwrap_err().is_not_found());
    assert!(store.load_program(&program.id).unwrap_err().is_not_found());
}

#[test]
fn no_temp_files_left_after_save() {
    let (_dir, store) = open();
    let mut state = ExecutionState::new(&program("p1"), "client", 0);
    store.save(&mut state).unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(store.base_path().join("states"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
