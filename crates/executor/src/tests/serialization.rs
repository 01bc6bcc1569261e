//! Serialization tests for operations and errors.
//!
//! Operations are what a driver receives, so their JSON form must survive a
//! round trip and stay compact when clauses are unset.

use std::collections::BTreeMap;

use crate::operation::{Assignment, Criteria, ModifyOp, Operation, OrderBy, Param, Target};
use crate::{DocPath, Document, Error, Value};

fn round_trip(op: &Operation) {
    let json = serde_json::to_string(op).expect("Failed to serialize operation");
    let restored: Operation = serde_json::from_str(&json).expect("Failed to deserialize operation");
    assert_eq!(&restored, op, "Operation round-trip failed for: {}", json);
}

#[test]
fn test_update_with_full_criteria() {
    let mut params = BTreeMap::new();
    params.insert("min".to_string(), Value::Sint(-3));
    round_trip(&Operation::Update {
        target: Target::new("test", "users"),
        criteria: Criteria {
            filter: Some("age > :min".into()),
            order_by: vec![OrderBy::desc("age"), OrderBy::asc("id")],
            limit: Some(5),
            params,
            ..Criteria::default()
        },
        assignments: vec![
            Assignment {
                column: "age".into(),
                value: Param::expr("age + 1"),
            },
            Assignment {
                column: "name".into(),
                value: Param::Value(Value::Null),
            },
        ],
    });
}

#[test]
fn test_document_operations() {
    let target = Target::new("test", "people");
    round_trip(&Operation::Add {
        target: target.clone(),
        documents: vec![
            Document::parse(r#"{"_id": "a", "tags": ["x", "y"]}"#).unwrap(),
            Document::parse(r#"{"nested": {"n": 1.5}}"#).unwrap(),
        ],
    });
    round_trip(&Operation::Modify {
        target,
        criteria: Criteria::default(),
        operations: vec![
            ModifyOp::Set {
                path: "$.a.b".parse::<DocPath>().unwrap(),
                value: Param::Value(Value::from("v")),
            },
            ModifyOp::ArrayDelete {
                path: "tags[0]".parse::<DocPath>().unwrap(),
            },
        ],
    });
}

#[test]
fn test_unset_clauses_are_omitted() {
    let op = Operation::Delete {
        target: Target::new("s", "t"),
        criteria: Criteria::default(),
    };
    let json = serde_json::to_value(&op).unwrap();
    let criteria = &json["Delete"]["criteria"];
    assert_eq!(criteria.as_object().unwrap().len(), 1);
    assert_eq!(criteria["offset"], 0);
}

#[test]
fn test_missing_optional_fields_default() {
    let op: Operation =
        serde_json::from_str(r#"{"Select": {"target": {"schema": "s", "name": "t"}}}"#).unwrap();
    assert_eq!(op, Operation::statement(crate::OpKind::Select, Target::new("s", "t")).unwrap());

    let op: Operation = serde_json::from_str(r#"{"Sql": {"query": "SELECT 1"}}"#).unwrap();
    assert!(matches!(op, Operation::Sql { params, .. } if params.is_empty()));
}

#[test]
fn test_unknown_fields_are_rejected() {
    let result: Result<Operation, _> =
        serde_json::from_str(r#"{"ListSchemas": {"pattern": "%", "extra": 1}}"#);
    assert!(result.is_err());
}

#[test]
fn test_non_object_document_is_rejected() {
    let result: Result<Operation, _> = serde_json::from_str(
        r#"{"Add": {"target": {"schema": "s", "name": "t"}, "documents": [[1]]}}"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_error_round_trip_keeps_code() {
    let errors = [
        Error::Driver {
            code: 1146,
            message: "Table 'test.t' doesn't exist".into(),
        },
        Error::IndexOutOfRange { index: 4, count: 2 },
        Error::missing_name("schema"),
    ];
    for err in errors {
        let json = serde_json::to_string(&err).unwrap();
        let restored: Error = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.code(), err.code());
        assert_eq!(restored.to_string(), err.to_string());
    }
}
