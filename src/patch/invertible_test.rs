use serde_json::json;
use serde_json::Value;

use super::*;
use crate::PatchError;

fn replay(ops: &[Operation]) -> Value {
    let mut doc = json!({});
    apply_patch(&mut doc, ops, ApplyMode::Replay).unwrap();
    doc
}

fn has_composite(op: &Operation) -> bool {
    match op.value() {
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        _ => false,
    }
}

#[test]
fn simplify_passes_scalars_through() {
    let op = Operation::add("/a", json!(1));
    assert_eq!(simplify(op.clone()), vec![op]);
}

#[test]
fn simplify_decomposes_objects_into_shell_and_leaves() {
    let ops = simplify(Operation::add("/a", json!({"b": 1, "c": 2})));
    assert_eq!(
        ops,
        vec![
            Operation::add("/a", json!({})),
            Operation::add("/a/b", json!(1)),
            Operation::add("/a/c", json!(2)),
        ]
    );
}

#[test]
fn simplify_decomposes_nested_arrays() {
    let ops = simplify(Operation::replace("/x", json!([[1], {"k": null}])));
    assert_eq!(
        ops,
        vec![
            Operation::replace("/x", json!([])),
            Operation::add("/x/0", json!([])),
            Operation::add("/x/0/0", json!(1)),
            Operation::add("/x/1", json!({})),
            Operation::add("/x/1/k", json!(null)),
        ]
    );
}

#[test]
fn simplify_keeps_test_children_as_tests() {
    let ops = simplify(Operation::test("/t", json!({"a": 1})));
    assert_eq!(
        ops,
        vec![Operation::test("/t", json!({})), Operation::test("/t/a", json!(1))]
    );
}

#[test]
fn simplify_keeps_empty_containers_whole() {
    let op = Operation::add("/e", json!([]));
    assert_eq!(simplify(op.clone()), vec![op]);
}

#[test]
fn remove_gains_pre_image_test() {
    let doc = json!({"a": {"b": 1, "c": 2}});
    let ops = make_invertible(&[Operation::remove("/a/b")], &doc).unwrap();
    assert_eq!(ops, vec![Operation::test("/a/b", json!(1)), Operation::remove("/a/b")]);
}

#[test]
fn replace_gains_simplified_pre_image_test() {
    let doc = json!({"a": {"b": 1}});
    let ops = make_invertible(&[Operation::replace("/a", json!(5))], &doc).unwrap();
    assert_eq!(
        ops,
        vec![
            Operation::test("/a", json!({})),
            Operation::test("/a/b", json!(1)),
            Operation::replace("/a", json!(5)),
        ]
    );
}

#[test]
fn copy_becomes_add_of_resolved_value() {
    let doc = json!({"src": {"k": "v"}});
    let ops = make_invertible(&[Operation::copy("/src", "/dst")], &doc).unwrap();
    assert_eq!(
        ops,
        vec![Operation::add("/dst", json!({})), Operation::add("/dst/k", json!("v"))]
    );
    assert!(ops.iter().all(|op| !matches!(op, Operation::Copy { .. })));
}

#[test]
fn append_is_resolved_to_concrete_index() {
    let doc = json!({"l": [0]});
    let ops = make_invertible(&[Operation::add("/l/-", json!({"n": 1}))], &doc).unwrap();
    assert_eq!(
        ops,
        vec![Operation::add("/l/1", json!({})), Operation::add("/l/1/n", json!(1))]
    );
}

#[test]
fn later_operations_see_earlier_ones() {
    let doc = json!({});
    let patch = [Operation::add("/a", json!(1)), Operation::remove("/a")];
    let result = apply_invertible(&patch, &doc).unwrap();
    assert_eq!(result.document, json!({}));
    assert_eq!(
        result.ops,
        vec![
            Operation::add("/a", json!(1)),
            Operation::test("/a", json!(1)),
            Operation::remove("/a"),
        ]
    );
}

#[test]
fn pre_images_come_from_the_document_before_each_operation() {
    let doc = json!({"a": 1});
    let patch = [
        Operation::replace("/a", json!(2)),
        Operation::replace("/a", json!(3)),
        Operation::remove("/a"),
    ];
    let result = apply_invertible(&patch, &doc).unwrap();
    assert_eq!(
        result.ops,
        vec![
            Operation::test("/a", json!(1)),
            Operation::replace("/a", json!(2)),
            Operation::test("/a", json!(2)),
            Operation::replace("/a", json!(3)),
            Operation::test("/a", json!(3)),
            Operation::remove("/a"),
        ]
    );
    // Every logged test holds when the log is applied strictly
    let mut strict = doc.clone();
    apply_patch(&mut strict, &result.ops, ApplyMode::Strict).unwrap();
    assert_eq!(strict, json!({}));
}

#[test]
fn empty_key_under_root_is_rejected() {
    let doc = json!({"src": {"": 5, "b": 2}});
    let value = json!({"": 5, "b": 2});
    let patches = [
        vec![Operation::add("/", value.clone())],
        vec![Operation::replace("/", value.clone())],
        vec![Operation::test("/", value.clone())],
        vec![Operation::copy("/src", "/")],
    ];
    for patch in patches {
        let err = apply_invertible(&patch, &doc).unwrap_err();
        assert!(matches!(err, PatchError::InvalidPatchOperation(_)), "{patch:?}: {err:?}");
    }
}

#[test]
fn empty_key_below_root_replays() {
    let patch = [
        Operation::add("/a", json!({"": 5, "b": 2})),
        Operation::add("/", json!({"a": {"": {"": 1}}})),
    ];
    let result = apply_invertible(&patch, &json!({})).unwrap();
    assert_eq!(result.document, json!({"a": {"": {"": 1}}}));
    assert_eq!(replay(&result.ops), result.document);
}

#[test]
fn failed_test_aborts_without_touching_input() {
    let doc = json!({"a": 1});
    let err = apply_invertible(&[Operation::add("/b", json!(2)), Operation::test("/a", json!(9))], &doc)
        .unwrap_err();
    assert_eq!(err, PatchError::TestFailed { path: "/a".into() });
    assert_eq!(doc, json!({"a": 1}));
}

#[test]
fn missing_pre_image_is_not_found() {
    let err = make_invertible(&[Operation::remove("/nope")], &json!({})).unwrap_err();
    assert!(matches!(err, PatchError::NotFound { .. }));
}

#[test]
fn relative_path_is_invalid() {
    let err = make_invertible(&[Operation::add("a", json!(1))], &json!({})).unwrap_err();
    assert!(matches!(err, PatchError::InvalidPatchOperation(_)));
}

#[test]
fn replaying_invertible_patch_matches_original_semantics() {
    let doc = json!({"a": {"x": [1, 2]}, "n": 0});
    let patch = [
        Operation::add("/b", json!({"deep": {"list": [1, {"z": 2}]}})),
        Operation::replace("/a/x", json!({"now": "object"})),
        Operation::copy("/b/deep", "/c"),
        Operation::remove("/n"),
        Operation::add("/a/x/extra", json!([])),
    ];

    let mut expected = doc.clone();
    apply_patch(&mut expected, &patch, ApplyMode::Strict).unwrap();

    let result = apply_invertible(&patch, &doc).unwrap();
    assert_eq!(result.document, expected);
    assert!(result.ops.iter().all(|op| !has_composite(op)));

    let mut replayed = doc.clone();
    apply_patch(&mut replayed, &result.ops, ApplyMode::Replay).unwrap();
    assert_eq!(replayed, expected);
}

#[test]
fn spec_scenario_log_entries() {
    let first = make_invertible(&[Operation::add("/a", json!({"b": 1, "c": 2}))], &json!({})).unwrap();
    assert_eq!(
        first,
        vec![
            Operation::add("/a", json!({})),
            Operation::add("/a/b", json!(1)),
            Operation::add("/a/c", json!(2)),
        ]
    );
    let state = replay(&first);
    let second = make_invertible(&[Operation::remove("/a/b")], &state).unwrap();
    assert_eq!(second, vec![Operation::test("/a/b", json!(1)), Operation::remove("/a/b")]);

    let all: Vec<Operation> = first.into_iter().chain(second).collect();
    assert_eq!(replay(&all), json!({"a": {"c": 2}}));
}
