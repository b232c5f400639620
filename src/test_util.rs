// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Implementation of the `quickcheck::Arbitrary` trait for the change model
//! and a generator for small baseline trees.
//!
//! The distributions here are deliberately skewed towards tiny id pools:
//! interesting interpreter behavior happens when a generated change refers
//! to a node or sequence that actually exists (or existed and was
//! consumed), so wild 64-bit ids would make every generated edit trivially
//! Invalid. Reserved constraint kinds (`identity_hash`, `content_hash`) are
//! never generated, since the interpreter fails fast on them by design.

use crate::{
    Change, Constraint, ConstraintEffect, Definition, DetachedSequenceId, EditNode, NodeId,
    Payload, PlaceReference, Side, Snapshot, SnapshotNode, StablePlace, StableRange, TraitLabel,
    TraitLocation, change::BuildNode,
};
use quickcheck::{Arbitrary, Gen};

const LABELS: [&str; 4] = ["children", "items", "cells", "annotations"];
const DEFINITIONS: [&str; 5] = ["paragraph", "text", "table", "row", "inline"];

impl Arbitrary for NodeId {
    fn arbitrary(g: &mut Gen) -> Self {
        // Mostly draw from the pool the TestTree generator uses, so that
        // generated changes hit live nodes often.
        let wild = u64::arbitrary(g).saturating_add(1);
        let choices = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, wild];
        Self::new(*g.choose(&choices).unwrap())
    }
}

impl Arbitrary for DetachedSequenceId {
    fn arbitrary(g: &mut Gen) -> Self {
        // Few slots: collisions on the registry are the interesting case.
        let choices = [0, 0, 0, 1, 1, 2, 3];
        Self::new(*g.choose(&choices).unwrap())
    }
}

impl Arbitrary for TraitLabel {
    fn arbitrary(g: &mut Gen) -> Self {
        Self::from(*g.choose(&LABELS).unwrap())
    }
}

impl Arbitrary for Definition {
    fn arbitrary(g: &mut Gen) -> Self {
        Self::from(*g.choose(&DEFINITIONS).unwrap())
    }
}

impl Arbitrary for Payload {
    fn arbitrary(g: &mut Gen) -> Self {
        match *g.choose(&["bytes", "string", "double", "u64", "i64", "bool"]).unwrap() {
            "bytes" => Self::Bytes(<_>::arbitrary(g)),
            "string" => Self::String(<_>::arbitrary(g)),
            // NaN payloads would make every equality-based property flaky
            "double" => {
                let value = f64::arbitrary(g);
                Self::Double(if value.is_nan() { 0.0 } else { value })
            }
            "u64" => Self::U64(<_>::arbitrary(g)),
            "i64" => Self::I64(<_>::arbitrary(g)),
            "bool" => Self::Bool(<_>::arbitrary(g)),
            _ => unreachable!(),
        }
    }
}

impl Arbitrary for Side {
    fn arbitrary(g: &mut Gen) -> Self {
        *g.choose(&[Side::Before, Side::After]).unwrap()
    }
}

impl Arbitrary for TraitLocation {
    fn arbitrary(g: &mut Gen) -> Self {
        Self {
            parent: NodeId::arbitrary(g),
            label: TraitLabel::arbitrary(g),
        }
    }
}

impl Arbitrary for PlaceReference {
    fn arbitrary(g: &mut Gen) -> Self {
        if bool::arbitrary(g) {
            Self::Sibling(NodeId::arbitrary(g))
        } else {
            Self::TraitBoundary(TraitLocation::arbitrary(g))
        }
    }
}

impl Arbitrary for StablePlace {
    fn arbitrary(g: &mut Gen) -> Self {
        Self {
            side: Side::arbitrary(g),
            reference: PlaceReference::arbitrary(g),
        }
    }
}

impl Arbitrary for StableRange {
    fn arbitrary(g: &mut Gen) -> Self {
        // Bias towards ranges that actually resolve: a single node or a
        // whole trait, with fully arbitrary endpoint pairs as the tail.
        match *g.choose(&["only", "only", "all", "pair"]).unwrap() {
            "only" => Self::only(NodeId::arbitrary(g)),
            "all" => Self::all_of(TraitLocation::arbitrary(g)),
            "pair" => Self {
                start: StablePlace::arbitrary(g),
                end: StablePlace::arbitrary(g),
            },
            _ => unreachable!(),
        }
    }
}

impl Arbitrary for BuildNode {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut node = Self::leaf(NodeId::arbitrary(g), Definition::arbitrary(g));
        if bool::arbitrary(g) {
            node.payload = Some(Payload::arbitrary(g));
        }
        if g.size() > 1 && bool::arbitrary(g) {
            // penalize nesting
            let mut inner = Gen::new(g.size() / 2);
            let count = usize::arbitrary(g) % 3;
            node = node.with_trait(
                TraitLabel::arbitrary(g),
                (0..count).map(|_| EditNode::arbitrary(&mut inner)),
            );
        }
        node
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        if self.traits.is_empty() && self.payload.is_none() {
            return quickcheck::empty_shrinker();
        }
        Box::new(std::iter::once(Self::leaf(
            self.identifier,
            self.definition.clone(),
        )))
    }
}

impl Arbitrary for EditNode {
    fn arbitrary(g: &mut Gen) -> Self {
        // references are rarer than inline nodes
        if u8::arbitrary(g) % 4 == 0 {
            Self::Detached(DetachedSequenceId::arbitrary(g))
        } else {
            Self::Node(BuildNode::arbitrary(g))
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match self {
            Self::Detached(_) => quickcheck::empty_shrinker(),
            Self::Node(node) => Box::new(node.shrink().map(Self::Node)),
        }
    }
}

impl Arbitrary for ConstraintEffect {
    fn arbitrary(g: &mut Gen) -> Self {
        *g.choose(&[Self::ValidRetry, Self::InvalidRetry]).unwrap()
    }
}

impl Arbitrary for Constraint {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut constraint =
            Self::new(StableRange::arbitrary(g), ConstraintEffect::arbitrary(g));
        if bool::arbitrary(g) {
            constraint.length = Some(usize::arbitrary(g) % 4);
        }
        if bool::arbitrary(g) {
            constraint.parent_node = Some(NodeId::arbitrary(g));
        }
        if bool::arbitrary(g) {
            constraint.label = Some(TraitLabel::arbitrary(g));
        }
        // identity_hash/content_hash stay None: the interpreter fails fast
        // on the reserved kinds.
        constraint
    }
}

impl Arbitrary for Change {
    fn arbitrary(g: &mut Gen) -> Self {
        match *g
            .choose(&["build", "insert", "detach", "constraint", "set_value"])
            .unwrap()
        {
            "build" => {
                let mut inner = Gen::new((g.size() / 2).max(1));
                let count = usize::arbitrary(g) % 3;
                Self::build(
                    (0..count).map(|_| EditNode::arbitrary(&mut inner)),
                    DetachedSequenceId::arbitrary(g),
                )
            }
            "insert" => Self::insert(DetachedSequenceId::arbitrary(g), StablePlace::arbitrary(g)),
            "detach" => {
                let destination = bool::arbitrary(g).then(|| DetachedSequenceId::arbitrary(g));
                Self::Detach {
                    source: StableRange::arbitrary(g),
                    destination,
                }
            }
            "constraint" => Self::Constraint(Constraint::arbitrary(g)),
            "set_value" => Self::SetValue {
                node_to_modify: NodeId::arbitrary(g),
                payload: bool::arbitrary(g).then(|| Payload::arbitrary(g)),
            },
            _ => unreachable!(),
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match self {
            Self::Build {
                source,
                destination,
            } => {
                let destination = *destination;
                Box::new(
                    source
                        .shrink()
                        .map(move |source| Self::build(source, destination)),
                )
            }
            _ => quickcheck::empty_shrinker(),
        }
    }
}

/// A small well-formed baseline tree, for driving the interpreter with
/// generated edits. Node ids come from the same pool the change generators
/// draw from, so references hit live nodes often.
#[derive(Clone, Debug)]
pub struct TestTree(pub Snapshot);

impl Arbitrary for TestTree {
    fn arbitrary(g: &mut Gen) -> Self {
        let root = NodeId::new(1);
        let mut nodes = vec![SnapshotNode::new(root, Definition::arbitrary(g))];
        let mut placed = vec![root];
        let extra = usize::arbitrary(g) % 8;
        for i in 0..extra {
            let id = NodeId::new(2 + i as u64);
            let mut node = SnapshotNode::new(id, Definition::arbitrary(g));
            if bool::arbitrary(g) {
                node.payload = Some(Payload::arbitrary(g));
            }
            nodes.push(node);

            let parent = *g.choose(&placed).unwrap();
            let label = TraitLabel::arbitrary(g);
            let record = nodes
                .iter_mut()
                .find(|node| node.identifier == parent)
                .expect("parent was drawn from placed ids");
            let mut children = record.traits.get(&label).cloned().unwrap_or_default();
            children.push_back(id);
            record.traits.insert(label, children);

            placed.push(id);
        }
        Self(Snapshot::from_nodes(root, nodes).expect("generated tree is well-formed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[quickcheck]
    fn generated_changes_are_self_equal(change: Change) -> bool {
        // mostly a smoke test that generation terminates on nested builds
        change == change.clone()
    }

    #[quickcheck]
    fn generated_trees_are_rooted_at_one(tree: TestTree) -> bool {
        tree.0.root() == NodeId::new(1) && tree.0.has_node(NodeId::new(1))
    }
}
