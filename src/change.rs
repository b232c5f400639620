// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The change model: edit fragments and the five change kinds.
//!
//! A [`Change`] is the atomic unit of edit. An edit is an ordered sequence
//! of changes applied by a [`Transaction`](crate::transaction::Transaction)
//! against a baseline snapshot; the five kinds and the [`EditNode`] fragment
//! type together form the persisted schema for edits: consumers serialize
//! these (the `serde` feature) and deliver them, the engine interprets them.
//!
//! Wire shape (with the `serde` feature):
//!
//! - `Change` is internally tagged on a `"type"` discriminator, with
//!   camelCase field names.
//! - `Detach::destination` and the optional `Constraint` fields are absent
//!   by omission.
//! - `SetValue::payload` is always present; JSON `null` is the explicit
//!   clearing sentinel, distinct from not emitting a `SetValue` at all.
//! - An `EditNode` is either a bare detached-sequence id (a number) or an
//!   inline node (an object); the two are structurally disjoint.
//!
//! Unknown discriminators are a schema mismatch and die in the decoder; the
//! interpreter itself only ever sees well-typed changes.

use crate::{
    identifiers::{Definition, DetachedSequenceId, NodeId, TraitLabel},
    payload::Payload,
    place::{StablePlace, StableRange},
};
use std::collections::BTreeMap;

/// A recursive edit fragment describing new tree content.
///
/// Leaves may be inline nodes or references to previously produced detached
/// sequences, which expand in place (and are consumed by the expansion).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum EditNode {
    Detached(DetachedSequenceId),
    Node(BuildNode),
}

impl From<DetachedSequenceId> for EditNode {
    fn from(id: DetachedSequenceId) -> Self {
        Self::Detached(id)
    }
}

impl From<BuildNode> for EditNode {
    fn from(node: BuildNode) -> Self {
        Self::Node(node)
    }
}

/// An inline node inside a `Build` change's source forest.
///
/// Child lists are ordered; the map of labels is a `BTreeMap` so that a
/// fragment has one canonical form and traversal is deterministic.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BuildNode {
    pub identifier: NodeId,
    pub definition: Definition,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "BTreeMap::is_empty")
    )]
    pub traits: BTreeMap<TraitLabel, Vec<EditNode>>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub payload: Option<Payload>,
}

impl BuildNode {
    /// A childless, payload-less node.
    pub fn leaf(identifier: NodeId, definition: impl Into<Definition>) -> Self {
        Self {
            identifier,
            definition: definition.into(),
            traits: BTreeMap::new(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_trait(
        mut self,
        label: impl Into<TraitLabel>,
        children: impl IntoIterator<Item = EditNode>,
    ) -> Self {
        let children: Vec<EditNode> = children.into_iter().collect();
        if !children.is_empty() {
            self.traits.insert(label.into(), children);
        }
        self
    }
}

/// How a violated [`Constraint`] classifies the edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum ConstraintEffect {
    /// The violation is advisory: the change applies and the edit goes on.
    /// Peers may use the recorded violation to detect non-semantic
    /// conflicts and retry.
    ValidRetry,
    /// The violation invalidates the edit against this baseline; it may be
    /// retried against a different one.
    InvalidRetry,
}

/// An assertion about a range in the current view. Never mutates the view.
///
/// Each optional field, when present, is one property to check; the first
/// violated check decides the outcome according to `effect`.
///
/// `identity_hash` and `content_hash` are acknowledged by the schema but
/// their evaluation is reserved; a change carrying either is an
/// implementation defect today and the interpreter fails fast on it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Constraint {
    pub to_constrain: StableRange,
    pub effect: ConstraintEffect,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub length: Option<usize>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub parent_node: Option<NodeId>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub label: Option<TraitLabel>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub identity_hash: Option<u64>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub content_hash: Option<u64>,
}

impl Constraint {
    /// A constraint over `to_constrain` with no properties to check (which
    /// still validates that the range itself resolves).
    pub fn new(to_constrain: StableRange, effect: ConstraintEffect) -> Self {
        Self {
            to_constrain,
            effect,
            length: None,
            parent_node: None,
            label: None,
            identity_hash: None,
            content_hash: None,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_parent_node(mut self, parent: NodeId) -> Self {
        self.parent_node = Some(parent);
        self
    }

    pub fn with_label(mut self, label: impl Into<TraitLabel>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// One of the five change kinds; the atomic unit of edit.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", rename_all_fields = "camelCase")
)]
pub enum Change {
    /// Construct new tree content and register it as a detached sequence
    /// under `destination`.
    Build {
        source: Vec<EditNode>,
        destination: DetachedSequenceId,
    },
    /// Consume the detached sequence `source` and splice it in at
    /// `destination`.
    Insert {
        source: DetachedSequenceId,
        destination: StablePlace,
    },
    /// Remove the run of siblings designated by `source`. With a
    /// `destination`, the removed nodes become a detached sequence for
    /// later reinsertion; without one, they are discarded.
    Detach {
        source: StableRange,
        #[cfg_attr(
            feature = "serde",
            serde(default, skip_serializing_if = "Option::is_none")
        )]
        destination: Option<DetachedSequenceId>,
    },
    /// Assert properties of a range without mutating anything.
    Constraint(Constraint),
    /// Set or clear the payload of one node. `payload` is always present:
    /// `None` is the explicit clearing sentinel ("no change" is expressed
    /// by not emitting a `SetValue` at all).
    SetValue {
        node_to_modify: NodeId,
        payload: Option<Payload>,
    },
}

impl Change {
    pub fn build(
        source: impl IntoIterator<Item = EditNode>,
        destination: DetachedSequenceId,
    ) -> Self {
        Self::Build {
            source: source.into_iter().collect(),
            destination,
        }
    }

    pub fn insert(source: DetachedSequenceId, destination: StablePlace) -> Self {
        Self::Insert {
            source,
            destination,
        }
    }

    /// Detach and discard.
    pub fn detach(source: StableRange) -> Self {
        Self::Detach {
            source,
            destination: None,
        }
    }

    /// Detach, keeping the removed run for reinsertion.
    pub fn detach_to(source: StableRange, destination: DetachedSequenceId) -> Self {
        Self::Detach {
            source,
            destination: Some(destination),
        }
    }

    pub fn set_payload(node_to_modify: NodeId, payload: impl Into<Payload>) -> Self {
        Self::SetValue {
            node_to_modify,
            payload: Some(payload.into()),
        }
    }

    pub fn clear_payload(node_to_modify: NodeId) -> Self {
        Self::SetValue {
            node_to_modify,
            payload: None,
        }
    }
}

impl From<Constraint> for Change {
    fn from(constraint: Constraint) -> Self {
        Self::Constraint(constraint)
    }
}
