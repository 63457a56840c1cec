// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn transfer(amount: u128) -> Action {
    Action::leaf(Operation::Transfer {
        wallet_id: "btc".to_string(),
        token_id: None,
        address: "bc1qexample".to_string(),
        amount: Amount(amount),
        confirmations: 0,
    })
}

fn flag(key: &str) -> Predicate {
    Predicate::StateFlag {
        key: key.to_string(),
    }
}

#[test]
fn program_parses_from_json() {
    let json = r#"{
        "id": "p-1",
        "name": "dca",
        "root": {
            "type": "sequence",
            "children": [
                {
                    "type": "leaf",
                    "operation": {
                        "op": "transfer",
                        "wallet_id": "btc",
                        "address": "bc1q",
                        "amount": "150000"
                    },
                    "retry_limit": 4
                },
                {
                    "type": "leaf",
                    "operation": { "op": "delay", "duration": "10m" },
                    "timeout": "1h"
                }
            ]
        }
    }"#;

    let program: Program = serde_json::from_str(json).unwrap();
    assert_eq!(program.id, ProgramId::new("p-1"));

    let Action::Sequence { children } = &program.root else {
        panic!("expected sequence root");
    };
    assert_eq!(
        children[0],
        Action::leaf(Operation::Transfer {
            wallet_id: "btc".to_string(),
            token_id: None,
            address: "bc1q".to_string(),
            amount: Amount(150_000),
            confirmations: 0,
        })
        .with_retry_limit(4)
    );
    assert_eq!(
        children[1],
        Action::leaf(Operation::Delay {
            duration: Duration::from_secs(600)
        })
        .with_timeout(Duration::from_secs(3600))
    );
}

#[test]
fn amounts_serialize_as_strings() {
    let big = Amount(u128::MAX);
    let json = serde_json::to_string(&big).unwrap();
    assert_eq!(json, format!("\"{}\"", u128::MAX));
    assert_eq!(serde_json::from_str::<Amount>(&json).unwrap(), big);
}

#[parameterized(
    negative = { "\"-5\"" },
    decimal = { "\"1.5\"" },
    word = { "\"lots\"" },
)]
fn amounts_reject_non_integers(json: &str) {
    assert!(serde_json::from_str::<Amount>(json).is_err());
}

#[test]
fn node_lookup_follows_child_indices() {
    let program = Program::new(
        "p",
        "",
        Action::sequence([
            transfer(1),
            Action::Conditional {
                predicate: flag("go"),
                then: Box::new(transfer(2)),
                otherwise: Some(Box::new(transfer(3))),
            },
        ]),
    );

    assert_eq!(program.node(&NodePath::from([0])), Some(&transfer(1)));
    assert_eq!(program.node(&NodePath::from([1, 1])), Some(&transfer(3)));
    assert_eq!(program.node(&NodePath::from([2])), None);
    assert_eq!(program.node(&NodePath::from([0, 0])), None);
}

#[test]
fn paths_list_parents_before_children() {
    let program = Program::new(
        "p",
        "",
        Action::sequence([transfer(1), Action::parallel([transfer(2), transfer(3)])]),
    );

    let paths: Vec<String> = program.paths().iter().map(|p| p.to_string()).collect();
    assert_eq!(paths, vec!["root", "0", "1", "1.0", "1.1"]);
}

#[test]
fn validate_accepts_well_formed_program() {
    let program = Program::new(
        "p",
        "",
        Action::Repeat {
            body: Box::new(transfer(10)),
            until: flag("done"),
            max_iterations: 3,
        },
    );
    assert_eq!(program.validate(), Ok(()));
}

#[parameterized(
    empty = { "" },
    traversal = { "../../outside" },
    nested = { "programs/pay" },
)]
fn validate_rejects_ids_that_are_not_file_names(id: &str) {
    let program = Program::new(id, "", transfer(10));
    assert_eq!(
        program.validate(),
        Err(ProgramError::InvalidId(id.to_string()))
    );
}

#[parameterized(
    zero_transfer = { transfer(0), "0" },
    unbounded_balance_wait = {
        Action::leaf(Operation::WaitForBalance {
            wallet_id: "eth".to_string(),
            token_id: None,
            above: None,
            below: None,
        }),
        "0"
    },
    zero_iteration_repeat = {
        Action::Repeat {
            body: Box::new(transfer(1)),
            until: flag("x"),
            max_iterations: 0,
        },
        "0"
    },
)]
fn validate_reports_offending_path(bad: Action, expected_path: &str) {
    let program = Program::new("p", "", Action::sequence([bad]));
    match program.validate() {
        Err(ProgramError::Invalid { path, .. }) => assert_eq!(path.to_string(), expected_path),
        other => panic!("expected invalid program, got {:?}", other),
    }
}

#[test]
fn leaf_builders_ignore_composites() {
    let seq = Action::sequence([transfer(1)]);
    assert_eq!(seq.clone().with_retry_limit(9), seq);
    assert_eq!(seq.clone().with_timeout(Duration::from_secs(1)), seq);
}

#[test]
fn generated_programs_get_distinct_ids() {
    let ids = crate::id::SequentialIdGen::new("dca");
    let first = Program::generate(&ids, "weekly buy", transfer(1));
    let second = Program::generate(&ids, "weekly buy", transfer(1));

    assert_eq!(first.id, ProgramId::new("dca-1"));
    assert_eq!(second.id, ProgramId::new("dca-2"));
    assert_eq!(first.root, second.root);
}
