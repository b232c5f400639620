//! Shape tests for the persisted change schema: tag discriminator, field
//! presence rules, and the null-as-clear sentinel on `SetValue`.
#![cfg(feature = "serde")]

use serde_json::json;
use treetx::{
    BuildNode, Change, Constraint, ConstraintEffect, DetachedSequenceId, EditNode, NodeId,
    StablePlace, StableRange, TraitLocation,
};

fn node(id: u64) -> NodeId {
    NodeId::new(id)
}

fn round_trips(change: &Change) {
    let encoded = serde_json::to_value(change).expect("changes serialize");
    let decoded: Change = serde_json::from_value(encoded).expect("changes deserialize");
    assert_eq!(&decoded, change);
}

#[test]
fn changes_are_tagged_on_type() {
    let change = Change::build(
        [BuildNode::leaf(node(2), "paragraph").into()],
        DetachedSequenceId::new(0),
    );
    assert_eq!(
        serde_json::to_value(&change).unwrap(),
        json!({
            "type": "Build",
            "source": [{ "identifier": 2, "definition": "paragraph" }],
            "destination": 0,
        })
    );
    round_trips(&change);
}

#[test]
fn detached_references_encode_as_bare_ids() {
    let inline: EditNode = BuildNode::leaf(node(2), "x").into();
    let reference = EditNode::Detached(DetachedSequenceId::new(3));
    assert_eq!(
        serde_json::to_value(&inline).unwrap(),
        json!({ "identifier": 2, "definition": "x" })
    );
    assert_eq!(serde_json::to_value(&reference).unwrap(), json!(3));

    let decoded: EditNode = serde_json::from_value(json!(3)).unwrap();
    assert_eq!(decoded, reference);
}

#[test]
fn build_nodes_omit_empty_traits_and_absent_payloads() {
    let nested = BuildNode::leaf(node(2), "sentence")
        .with_payload("hi")
        .with_trait("words", [EditNode::Detached(DetachedSequenceId::new(1))]);
    assert_eq!(
        serde_json::to_value(EditNode::from(nested)).unwrap(),
        json!({
            "identifier": 2,
            "definition": "sentence",
            "traits": { "words": [1] },
            "payload": { "String": "hi" },
        })
    );
}

#[test]
fn insert_encodes_its_stable_place() {
    let change = Change::insert(
        DetachedSequenceId::new(0),
        StablePlace::at_start_of(TraitLocation::new(node(1), "children")),
    );
    assert_eq!(
        serde_json::to_value(&change).unwrap(),
        json!({
            "type": "Insert",
            "source": 0,
            "destination": {
                "side": "After",
                "reference": { "parent": 1, "label": "children" },
            },
        })
    );
    round_trips(&change);
}

#[test]
fn detach_omits_an_absent_destination() {
    let discard = Change::detach(StableRange::only(node(2)));
    let keep = Change::detach_to(StableRange::only(node(2)), DetachedSequenceId::new(4));

    let discard_encoded = serde_json::to_value(&discard).unwrap();
    assert!(discard_encoded.get("destination").is_none());
    assert_eq!(
        discard_encoded.get("source").unwrap().get("start").unwrap(),
        &json!({ "side": "Before", "reference": 2 })
    );

    let keep_encoded = serde_json::to_value(&keep).unwrap();
    assert_eq!(keep_encoded.get("destination").unwrap(), &json!(4));

    round_trips(&discard);
    round_trips(&keep);
}

#[test]
fn constraint_fields_are_absent_by_omission() {
    let bare = Change::Constraint(Constraint::new(
        StableRange::only(node(2)),
        ConstraintEffect::ValidRetry,
    ));
    let encoded = serde_json::to_value(&bare).unwrap();
    assert_eq!(encoded.get("type").unwrap(), &json!("Constraint"));
    assert_eq!(encoded.get("effect").unwrap(), &json!("ValidRetry"));
    for absent in ["length", "parentNode", "label", "identityHash", "contentHash"] {
        assert!(encoded.get(absent).is_none(), "{absent} should be omitted");
    }

    let full = Change::Constraint(
        Constraint::new(StableRange::only(node(2)), ConstraintEffect::InvalidRetry)
            .with_length(1)
            .with_parent_node(node(1))
            .with_label("children"),
    );
    let encoded = serde_json::to_value(&full).unwrap();
    assert_eq!(encoded.get("length").unwrap(), &json!(1));
    assert_eq!(encoded.get("parentNode").unwrap(), &json!(1));
    assert_eq!(encoded.get("label").unwrap(), &json!("children"));

    round_trips(&bare);
    round_trips(&full);
}

#[test]
fn set_value_payload_is_always_present() {
    let set = Change::set_payload(node(2), 7u64);
    assert_eq!(
        serde_json::to_value(&set).unwrap(),
        json!({
            "type": "SetValue",
            "nodeToModify": 2,
            "payload": { "U64": 7 },
        })
    );

    // the clearing sentinel is an explicit null, not an omitted field
    let clear = Change::clear_payload(node(2));
    assert_eq!(
        serde_json::to_value(&clear).unwrap(),
        json!({
            "type": "SetValue",
            "nodeToModify": 2,
            "payload": null,
        })
    );

    round_trips(&set);
    round_trips(&clear);
}

#[test]
fn payload_bytes_round_trip() {
    let change = Change::set_payload(node(2), vec![0u8, 1, 254]);
    round_trips(&change);
}

#[test]
fn unknown_discriminators_die_in_the_decoder() {
    let result: Result<Change, _> = serde_json::from_value(json!({
        "type": "Transmogrify",
        "source": 0,
    }));
    assert!(result.is_err());
}
