// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Immutable, structurally-shared snapshots of the tree.
//!
//! A [`Snapshot`] is a read-only view of the whole document tree at a point
//! in time: a persistent map from [`NodeId`] to per-node records plus a
//! designated root. Every mutator on it is copy-on-write (it returns a new
//! `Snapshot` sharing almost all structure with the old one), so a baseline
//! can be held by any number of readers while transactions derive edited
//! views from it. Cloning a snapshot is O(1); the per-edit cost of the
//! mutators is logarithmic in the tree size, not linear.
//!
//! Alongside the node records, a snapshot maintains a parent index mapping
//! each parented node to the [`TraitLocation`] that contains it. Parent
//! back-references are deliberately not part of the node records themselves;
//! the index is how the engine answers "is this node parented" and resolves
//! sibling-anchored places without pointer cycles.
//!
//! Trait child lists are normalized: a label maps to a non-empty list or is
//! absent. This keeps structurally equal trees `==` regardless of their
//! edit history.
//!
//! The mutators assume their preconditions (stated on each method) and
//! panic when violated: a caller that breaks the snapshot contract is a
//! defect, not a recoverable condition. User-level outcomes are decided
//! earlier, by the interpreter and the [`crate::validation`] primitives.

use crate::{
    TreeRandomState,
    identifiers::{Definition, NodeId, TraitLabel, TraitLocation},
    payload::Payload,
    place::{PlaceReference, Side, StablePlace, StableRange},
    validation::{self, ResolvedPlace, ResolvedRange},
};
use std::{collections::VecDeque, error, fmt};

/// The per-node trait map: label to ordered, non-empty child list.
pub type TraitMap = im::HashMap<TraitLabel, im::Vector<NodeId>, TreeRandomState>;

type NodeMap = im::HashMap<NodeId, SnapshotNode, TreeRandomState>;
type ParentMap = im::HashMap<NodeId, TraitLocation, TreeRandomState>;

/// The record a snapshot stores per node.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotNode {
    pub identifier: NodeId,
    pub definition: Definition,
    pub traits: TraitMap,
    pub payload: Option<Payload>,
}

impl SnapshotNode {
    /// A childless, payload-less record.
    pub fn new(identifier: NodeId, definition: impl Into<Definition>) -> Self {
        Self {
            identifier,
            definition: definition.into(),
            traits: TraitMap::default(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Adds a child list under `label`. Empty lists are normalized away.
    pub fn with_trait(
        mut self,
        label: impl Into<TraitLabel>,
        children: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        let children: im::Vector<NodeId> = children.into_iter().collect();
        if !children.is_empty() {
            self.traits.insert(label.into(), children);
        }
        self
    }
}

/// Why a set of node records does not form a tree.
///
/// Returned by [`Snapshot::from_nodes`]; never produced once a snapshot
/// exists, since the copy-on-write mutators preserve tree shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MalformedTreeError {
    /// Two records carry the same identifier.
    DuplicateIdentifier(NodeId),
    /// The designated root has no record.
    MissingRoot(NodeId),
    /// A record maps a label to an empty child list.
    EmptyTrait { parent: NodeId, label: TraitLabel },
    /// A child list references an identifier with no record.
    UnknownChild { parent: NodeId, child: NodeId },
    /// An identifier appears in more than one child list (or twice in one).
    MultiplyParented(NodeId),
    /// The designated root appears in a child list.
    ParentedRoot(NodeId),
    /// A record is not reachable from the root.
    Unreachable(NodeId),
}

impl fmt::Display for MalformedTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateIdentifier(id) => write!(f, "duplicate node record for {id}"),
            Self::MissingRoot(id) => write!(f, "no record for root {id}"),
            Self::EmptyTrait { parent, label } => {
                write!(f, "empty trait {label} under {parent} (normalize it away)")
            }
            Self::UnknownChild { parent, child } => {
                write!(f, "{parent} references unknown child {child}")
            }
            Self::MultiplyParented(id) => write!(f, "{id} appears in more than one child list"),
            Self::ParentedRoot(id) => write!(f, "root {id} appears in a child list"),
            Self::Unreachable(id) => write!(f, "{id} is not reachable from the root"),
        }
    }
}

impl error::Error for MalformedTreeError {}

/// An immutable tree: node records, a root, and the derived parent index.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    root: NodeId,
    nodes: NodeMap,
    parents: ParentMap,
}

impl Snapshot {
    /// A tree holding only the given root record.
    ///
    /// The record may already carry traits as long as the referenced
    /// children come along via [`Snapshot::from_nodes`] instead; a root
    /// with dangling children is rejected there and a defect here.
    pub fn new(root: SnapshotNode) -> Self {
        assert!(
            root.traits.is_empty(),
            "Snapshot::new takes a childless root; use Snapshot::from_nodes for populated trees"
        );
        let identifier = root.identifier;
        let mut nodes = NodeMap::default();
        nodes.insert(identifier, root);
        Self {
            root: identifier,
            nodes,
            parents: ParentMap::default(),
        }
    }

    /// Builds a snapshot from a root id and the full set of records,
    /// validating tree shape: unique ids, known children, a single parent
    /// per node, an unparented root, and full reachability.
    pub fn from_nodes(
        root: NodeId,
        nodes: impl IntoIterator<Item = SnapshotNode>,
    ) -> Result<Self, MalformedTreeError> {
        let mut map = NodeMap::default();
        for node in nodes {
            let id = node.identifier;
            if map.insert(id, node).is_some() {
                return Err(MalformedTreeError::DuplicateIdentifier(id));
            }
        }
        if !map.contains_key(&root) {
            return Err(MalformedTreeError::MissingRoot(root));
        }

        let mut parents = ParentMap::default();
        for (id, node) in map.iter() {
            for (label, children) in node.traits.iter() {
                if children.is_empty() {
                    return Err(MalformedTreeError::EmptyTrait {
                        parent: *id,
                        label: label.clone(),
                    });
                }
                for child in children.iter() {
                    if !map.contains_key(child) {
                        return Err(MalformedTreeError::UnknownChild {
                            parent: *id,
                            child: *child,
                        });
                    }
                    let location = TraitLocation {
                        parent: *id,
                        label: label.clone(),
                    };
                    if parents.insert(*child, location).is_some() {
                        return Err(MalformedTreeError::MultiplyParented(*child));
                    }
                }
            }
        }
        if parents.contains_key(&root) {
            return Err(MalformedTreeError::ParentedRoot(root));
        }

        // every record must be reachable from the root
        let mut seen = 0usize;
        let mut queue = VecDeque::from([root]);
        let mut visited = im::HashSet::<NodeId, TreeRandomState>::default();
        visited.insert(root);
        while let Some(id) = queue.pop_front() {
            seen += 1;
            for (_, children) in map[&id].traits.iter() {
                for child in children.iter() {
                    if visited.insert(*child).is_none() {
                        queue.push_back(*child);
                    }
                }
            }
        }
        if seen != map.len() {
            let unreachable = map
                .keys()
                .find(|id| !visited.contains(*id))
                .copied()
                .expect("seen < len implies some id was never visited");
            return Err(MalformedTreeError::Unreachable(unreachable));
        }

        Ok(Self {
            root,
            nodes: map,
            parents,
        })
    }

    /// The designated root of the tree.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The number of node records, including any that detach-and-discard
    /// edits have made unreachable.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get_node(&self, id: NodeId) -> Option<&SnapshotNode> {
        self.nodes.get(&id)
    }

    /// The record for `id`. Precondition: `has_node(id)`.
    pub fn node(&self, id: NodeId) -> &SnapshotNode {
        self.get_node(id)
            .unwrap_or_else(|| panic!("no record for {id} in this snapshot"))
    }

    /// Where `id` currently sits, if it is parented at all. The root and
    /// detached nodes have no location.
    pub fn parent_of(&self, id: NodeId) -> Option<&TraitLocation> {
        self.parents.get(&id)
    }

    /// All node ids with a record in this snapshot, in no particular order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// The ordered children of the given trait; empty if the parent has no
    /// such trait (or no record at all).
    pub fn trait_children(&self, location: &TraitLocation) -> im::Vector<NodeId> {
        self.nodes
            .get(&location.parent)
            .and_then(|node| node.traits.get(&location.label))
            .cloned()
            .unwrap_or_default()
    }

    /// The integer offset a stable place resolves to within its containing
    /// trait, or `None` when the place does not resolve against this
    /// snapshot (absent anchor, unparented sibling anchor, absent trait
    /// parent).
    pub fn find_index_within_trait(&self, place: &StablePlace) -> Option<usize> {
        match &place.reference {
            PlaceReference::Sibling(anchor) => {
                let location = self.parent_of(*anchor)?;
                let at = self.trait_children(location).index_of(anchor)?;
                Some(match place.side {
                    Side::Before => at,
                    Side::After => at + 1,
                })
            }
            PlaceReference::TraitBoundary(location) => {
                if !self.has_node(location.parent) {
                    return None;
                }
                Some(match place.side {
                    Side::After => 0,
                    Side::Before => self.trait_children(location).len(),
                })
            }
        }
    }

    /// Adds the given records. Precondition: none of the ids already has a
    /// record, and every child referenced by a new record either arrives in
    /// the same batch or already exists unparented in this snapshot. The
    /// referenced children become parented under the new records.
    pub fn insert_snapshot_nodes(
        &self,
        new_nodes: impl IntoIterator<Item = (NodeId, SnapshotNode)>,
    ) -> Self {
        let inserted: Vec<(NodeId, SnapshotNode)> = new_nodes.into_iter().collect();
        let mut nodes = self.nodes.clone();
        for (id, node) in &inserted {
            assert_eq!(
                *id, node.identifier,
                "insert_snapshot_nodes: map key does not match record identifier"
            );
            assert!(
                nodes.insert(*id, node.clone()).is_none(),
                "insert_snapshot_nodes: {id} already has a record"
            );
        }
        let mut parents = self.parents.clone();
        for (id, node) in &inserted {
            for (label, children) in node.traits.iter() {
                for child in children.iter() {
                    assert!(
                        nodes.contains_key(child),
                        "insert_snapshot_nodes: {id} references unknown child {child}"
                    );
                    let location = TraitLocation {
                        parent: *id,
                        label: label.clone(),
                    };
                    assert!(
                        parents.insert(*child, location).is_none(),
                        "insert_snapshot_nodes: child {child} is already parented"
                    );
                }
            }
        }
        Self {
            root: self.root,
            nodes,
            parents,
        }
    }

    /// Removes exactly the given records. Precondition: each id has a
    /// record, none of them is parented, and none is the root. Parent-index
    /// entries of the removed records' direct children are cleared, so the
    /// index never references a missing record; deeper descendants keep
    /// their records (unreachable residue, bounded by the edit).
    pub fn delete_nodes(&self, ids: &[NodeId]) -> Self {
        let mut nodes = self.nodes.clone();
        let mut parents = self.parents.clone();
        for id in ids {
            assert_ne!(*id, self.root, "delete_nodes: refusing to delete the root");
            assert!(
                parents.get(id).is_none(),
                "delete_nodes: {id} is still parented"
            );
            let node = nodes
                .remove(id)
                .unwrap_or_else(|| panic!("delete_nodes: no record for {id}"));
            for (_, children) in node.traits.iter() {
                for child in children.iter() {
                    let prev = parents.remove(child);
                    debug_assert!(
                        prev.is_some_and(|location| location.parent == *id),
                        "parent index disagreed with {id}'s child list"
                    );
                }
            }
        }
        Self {
            root: self.root,
            nodes,
            parents,
        }
    }

    /// Replaces the record for `id`. Precondition: a record exists, and the
    /// replacement keeps identifier and child lists unchanged; child lists
    /// are edited through the splice primitives, not record replacement.
    pub fn replace_node_data(&self, id: NodeId, node: SnapshotNode) -> Self {
        assert_eq!(
            id, node.identifier,
            "replace_node_data: replacement changes the identifier"
        );
        let current = self.node(id);
        assert_eq!(
            current.traits, node.traits,
            "replace_node_data: replacement changes child lists"
        );
        let mut nodes = self.nodes.clone();
        nodes.insert(id, node);
        Self {
            root: self.root,
            nodes,
            parents: self.parents.clone(),
        }
    }

    /// Removes the contiguous run of siblings designated by `range`,
    /// returning the residual snapshot and the removed ids in trait order.
    /// The removed nodes keep their records (they are detached, not
    /// deleted) so a later splice can re-parent them.
    ///
    /// Precondition: `range` validates as `Valid` against this snapshot.
    pub fn detach_range(&self, range: &StableRange) -> (Self, Vec<NodeId>) {
        let ResolvedRange {
            location,
            start_index,
            end_index,
        } = validation::range_from_stable_range(self, range)
            .expect("detach_range requires a validated range");

        let mut remaining = self.trait_children(&location);
        let mut removed = remaining.split_off(start_index);
        let rest = removed.split_off(end_index - start_index);
        remaining.append(rest);
        let removed: Vec<NodeId> = removed.into_iter().collect();

        let mut out = self.with_trait_children(&location, remaining);
        for id in &removed {
            let prev = out.parents.remove(id);
            debug_assert!(prev.is_some(), "detached node {id} had no parent entry");
        }
        (out, removed)
    }

    /// Splices `ids` into the trait designated by `destination`, preserving
    /// their order, and re-parents them there.
    ///
    /// Precondition: `destination` validates as `Valid` against this
    /// snapshot, every id has a record, and none of them is parented.
    pub fn insert_into_trait(&self, ids: &[NodeId], destination: &StablePlace) -> Self {
        let ResolvedPlace { location, index } = validation::resolve_place(self, destination)
            .expect("insert_into_trait requires a validated place");

        let mut children = self.trait_children(&location);
        let tail = children.split_off(index);
        children.extend(ids.iter().copied());
        children.append(tail);

        let mut out = self.with_trait_children(&location, children);
        for id in ids {
            assert!(
                out.nodes.contains_key(id),
                "insert_into_trait: no record for {id}"
            );
            assert!(
                out.parents.insert(*id, location.clone()).is_none(),
                "insert_into_trait: {id} is already parented"
            );
        }
        out
    }

    /// Replaces one child list wholesale, normalizing empty lists away.
    /// Parent-index maintenance is the caller's job.
    fn with_trait_children(
        &self,
        location: &TraitLocation,
        children: im::Vector<NodeId>,
    ) -> Self {
        let mut node = self.node(location.parent).clone();
        if children.is_empty() {
            node.traits.remove(&location.label);
        } else {
            node.traits.insert(location.label.clone(), children);
        }
        let mut nodes = self.nodes.clone();
        nodes.insert(location.parent, node);
        Self {
            root: self.root,
            nodes,
            parents: self.parents.clone(),
        }
    }
}
