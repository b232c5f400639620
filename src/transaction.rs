// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The transaction interpreter: ordered changes in, classified outcome out.
//!
//! A [`Transaction`] owns an evolving view derived from a baseline
//! [`Snapshot`] plus a private registry of detached sequences. Changes are
//! applied strictly in submission order; each one either applies (the view
//! and registry advance together) or fails with a classification, which
//! closes the transaction and freezes the outcome. Nothing outside the
//! transaction is ever mutated (the baseline is immutable and the view is
//! derived from it copy-on-write), so abandoning a transaction at any point
//! is safe and costs nothing beyond memory.
//!
//! # Outcome classification
//!
//! Every change has three exit paths, surfaced as [`EditResult`]:
//!
//! - [`EditResult::Malformed`]: the change could not be interpreted
//!   against *any* snapshot: a detached-sequence reference that does not
//!   exist or was already consumed, a destination that would overwrite a
//!   live sequence, a duplicate identifier within one `Build`. Peers should
//!   reject such an edit outright.
//! - [`EditResult::Invalid`]: well-formed, but this snapshot's state
//!   prevents application (a referenced node is absent, a range no longer
//!   resolves). The edit may be retried against a different baseline.
//! - [`EditResult::Applied`]: the change took effect.
//!
//! Malformed dominates Invalid whenever one change trips both.
//!
//! # Detached sequences are linear
//!
//! The registry enforces a use-once discipline: `Build` and
//! `Detach`-with-destination write a sequence, `Insert` and
//! `Build`-by-reference consume one. Writing to an occupied slot or reading
//! from an empty one is Malformed, and a sequence still unconsumed when the
//! transaction closes makes the whole edit Malformed; storing content and
//! never using it is a policy error, not a leak to be tolerated.
//!
//! # Example
//!
//! ```
//! use treetx::{
//!     BuildNode, Change, DetachedSequenceId, EditResult, NodeId, StablePlace, TraitLocation,
//!     Transaction, tree,
//! };
//!
//! let baseline = tree!((1, "doc"));
//! let mut tx = Transaction::new(baseline.clone());
//!
//! // Build a paragraph as a detached sequence, then splice it in.
//! let seq = DetachedSequenceId::new(0);
//! let paragraph = BuildNode::leaf(NodeId::new(2), "paragraph").with_payload("hello");
//! tx.apply(Change::build([paragraph.into()], seq));
//! tx.apply(Change::insert(
//!     seq,
//!     StablePlace::at_start_of(TraitLocation::new(NodeId::new(1), "children")),
//! ));
//!
//! let outcome = tx.close();
//! assert_eq!(outcome.result, EditResult::Applied);
//! assert_eq!(outcome.view.node(NodeId::new(2)).payload, Some("hello".into()));
//! // the baseline is untouched
//! assert!(!baseline.has_node(NodeId::new(2)));
//! ```

use crate::{
    change::{Change, Constraint, ConstraintEffect, EditNode},
    create_map,
    identifiers::{DetachedSequenceId, NodeId},
    payload::Payload,
    place::{StablePlace, StableRange},
    snapshot::{Snapshot, SnapshotNode, TraitMap},
    validation::{self, Validity},
};
use smallvec::SmallVec;
use std::collections::HashMap;

/// The three-valued outcome of a change, and of a whole edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditResult {
    /// The change (or edit) produced a valid resulting snapshot.
    Applied,
    /// Well-formed, but inapplicable to this baseline's state.
    Invalid,
    /// Uninterpretable against any snapshot; reject outright.
    Malformed,
}

/// What a closed transaction hands back.
///
/// When `result` is not [`EditResult::Applied`], `view` is not to be
/// committed anywhere; it is returned for inspection only.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionOutcome {
    pub result: EditResult,
    pub view: Snapshot,
}

/// Node ids held under one [`DetachedSequenceId`]. Most sequences hold a
/// node or two, so the ids live inline.
type NodeIdSequence = SmallVec<[NodeId; 2]>;

type DetachedMap = HashMap<DetachedSequenceId, NodeIdSequence, crate::TreeRandomState>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Open,
    Closed,
}

/// A single edit in progress: an evolving view plus the detached registry.
///
/// Construction never fails; every subsequent misstep is reported through
/// [`EditResult`], and the first non-`Applied` result closes the
/// transaction for good. Applying to a closed transaction is an inert
/// no-op that re-reports the terminal outcome.
#[derive(Clone, Debug)]
pub struct Transaction {
    view: Snapshot,
    detached: DetachedMap,
    status: Status,
    result: EditResult,
}

impl Transaction {
    /// Opens a transaction over the given baseline.
    pub fn new(initial: Snapshot) -> Self {
        Self {
            view: initial,
            detached: create_map(),
            status: Status::Open,
            result: EditResult::Applied,
        }
    }

    /// The current evolving view. Valid at any point, including mid-edit;
    /// callers must treat it as provisional until [`Transaction::close`]
    /// reports [`EditResult::Applied`].
    pub fn current_view(&self) -> &Snapshot {
        &self.view
    }

    /// Whether further changes will be interpreted.
    pub fn is_open(&self) -> bool {
        self.status == Status::Open
    }

    /// The running outcome: `Applied` while everything has applied so far,
    /// otherwise the frozen failure classification.
    pub fn result(&self) -> EditResult {
        self.result
    }

    /// Applies one change. On success the view and the detached registry
    /// advance together; on failure neither moves, the transaction closes,
    /// and the returned classification is frozen as the edit outcome.
    pub fn apply(&mut self, change: Change) -> EditResult {
        if self.status == Status::Closed {
            return self.result;
        }
        let result = match change {
            Change::Build {
                source,
                destination,
            } => self.apply_build(source, destination),
            Change::Insert {
                source,
                destination,
            } => self.apply_insert(source, destination),
            Change::Detach {
                source,
                destination,
            } => self.apply_detach(source, destination),
            Change::Constraint(constraint) => self.apply_constraint(constraint),
            Change::SetValue {
                node_to_modify,
                payload,
            } => self.apply_set_value(node_to_modify, payload),
        };
        if result != EditResult::Applied {
            self.status = Status::Closed;
            self.result = result;
        }
        result
    }

    /// Closes the transaction and reports the final outcome.
    ///
    /// A transaction that is still open and still holds unconsumed detached
    /// sequences is Malformed, whatever else happened; a transaction that
    /// already failed keeps its frozen classification.
    pub fn close(mut self) -> TransactionOutcome {
        if self.status == Status::Open {
            if !self.detached.is_empty() {
                self.result = EditResult::Malformed;
            }
            self.status = Status::Closed;
        }
        TransactionOutcome {
            result: self.result,
            view: self.view,
        }
    }

    fn apply_build(&mut self, source: Vec<EditNode>, destination: DetachedSequenceId) -> EditResult {
        if self.detached.contains_key(&destination) {
            // would overwrite a live sequence
            return EditResult::Malformed;
        }

        // Expand the source forest depth-first. Detached references are
        // consumed on reference and splice their ids in place; inline nodes
        // become snapshot records. Nothing below mutates the transaction
        // until the whole forest has been classified.
        let mut consumed: Vec<DetachedSequenceId> = Vec::new();
        let mut new_nodes: HashMap<NodeId, SnapshotNode, crate::TreeRandomState> = create_map();
        let mut top_ids = NodeIdSequence::new();
        let mut stack: Vec<&crate::change::BuildNode> = Vec::new();
        let mut unresolved_reference = false;
        let mut duplicate_in_build = false;
        let mut id_already_present = false;

        for edit_node in &source {
            match edit_node {
                EditNode::Detached(id) => {
                    match consume_reference(&self.detached, &mut consumed, *id) {
                        Some(ids) => top_ids.extend_from_slice(ids),
                        None => unresolved_reference = true,
                    }
                }
                EditNode::Node(node) => {
                    top_ids.push(node.identifier);
                    stack.push(node);
                }
            }
        }

        while let Some(build_node) = stack.pop() {
            let mut traits = TraitMap::default();
            for (label, children) in &build_node.traits {
                let mut resolved = im::Vector::new();
                for child in children {
                    match child {
                        EditNode::Detached(id) => {
                            match consume_reference(&self.detached, &mut consumed, *id) {
                                Some(ids) => resolved.extend(ids.iter().copied()),
                                None => unresolved_reference = true,
                            }
                        }
                        EditNode::Node(child) => {
                            resolved.push_back(child.identifier);
                            stack.push(child);
                        }
                    }
                }
                if !resolved.is_empty() {
                    traits.insert(label.clone(), resolved);
                }
            }
            let record = SnapshotNode {
                identifier: build_node.identifier,
                definition: build_node.definition.clone(),
                traits,
                payload: build_node.payload.clone(),
            };
            if new_nodes.insert(build_node.identifier, record).is_some() {
                duplicate_in_build = true;
            }
            if self.view.has_node(build_node.identifier) {
                id_already_present = true;
            }
        }

        // Malformed has priority over Invalid.
        if unresolved_reference || duplicate_in_build {
            return EditResult::Malformed;
        }
        if id_already_present {
            return EditResult::Invalid;
        }

        for id in consumed {
            self.detached.remove(&id);
        }
        self.view = self.view.insert_snapshot_nodes(new_nodes);
        self.detached.insert(destination, top_ids);
        EditResult::Applied
    }

    fn apply_insert(
        &mut self,
        source: DetachedSequenceId,
        destination: StablePlace,
    ) -> EditResult {
        if !self.detached.contains_key(&source) {
            return EditResult::Malformed;
        }
        match validation::validate_stable_place(&self.view, &destination) {
            Validity::Malformed => return EditResult::Malformed,
            Validity::Invalid => return EditResult::Invalid,
            Validity::Valid => {}
        }
        let ids = self
            .detached
            .remove(&source)
            .expect("presence was checked above");
        self.view = self.view.insert_into_trait(&ids, &destination);
        EditResult::Applied
    }

    fn apply_detach(
        &mut self,
        source: StableRange,
        destination: Option<DetachedSequenceId>,
    ) -> EditResult {
        match validation::validate_stable_range(&self.view, &source) {
            Validity::Malformed => return EditResult::Malformed,
            Validity::Invalid => return EditResult::Invalid,
            Validity::Valid => {}
        }
        if let Some(destination) = destination {
            if self.detached.contains_key(&destination) {
                // would overwrite a live sequence
                return EditResult::Malformed;
            }
        }
        let (residual, ids) = self.view.detach_range(&source);
        match destination {
            Some(destination) => {
                self.view = residual;
                self.detached
                    .insert(destination, NodeIdSequence::from_vec(ids));
            }
            None => {
                // discarded for good; the records go too
                self.view = residual.delete_nodes(&ids);
            }
        }
        EditResult::Applied
    }

    fn apply_constraint(&mut self, constraint: Constraint) -> EditResult {
        let on_violation = match constraint.effect {
            ConstraintEffect::ValidRetry => EditResult::Applied,
            ConstraintEffect::InvalidRetry => EditResult::Invalid,
        };
        match validation::validate_stable_range(&self.view, &constraint.to_constrain) {
            Validity::Malformed => return EditResult::Malformed,
            Validity::Invalid => return on_violation,
            Validity::Valid => {}
        }
        let resolved = validation::range_from_stable_range(&self.view, &constraint.to_constrain)
            .expect("range was validated above");
        if let Some(length) = constraint.length {
            if length != resolved.len() {
                return on_violation;
            }
        }
        if let Some(parent_node) = constraint.parent_node {
            if parent_node != resolved.location.parent {
                return on_violation;
            }
        }
        if let Some(label) = &constraint.label {
            if *label != resolved.location.label {
                return on_violation;
            }
        }
        assert!(
            constraint.identity_hash.is_none() && constraint.content_hash.is_none(),
            "hash constraints are acknowledged by the schema but not implemented; \
             refusing to silently ignore one"
        );
        EditResult::Applied
    }

    fn apply_set_value(&mut self, node_to_modify: NodeId, payload: Option<Payload>) -> EditResult {
        if !self.view.has_node(node_to_modify) {
            return EditResult::Invalid;
        }
        let mut record = self.view.node(node_to_modify).clone();
        // None is the explicit clearing sentinel; "no change" is expressed
        // by not emitting a SetValue at all.
        record.payload = payload;
        self.view = self.view.replace_node_data(node_to_modify, record);
        EditResult::Applied
    }
}

/// Looks up a detached reference for consumption. A reference resolves at
/// most once per change; the second sight of the same id, or an id with no
/// live sequence, is an unresolved reference.
fn consume_reference<'registry>(
    registry: &'registry DetachedMap,
    consumed: &mut Vec<DetachedSequenceId>,
    id: DetachedSequenceId,
) -> Option<&'registry [NodeId]> {
    if consumed.contains(&id) {
        return None;
    }
    let ids = registry.get(&id)?;
    consumed.push(id);
    Some(ids.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        change::BuildNode,
        identifiers::{TraitLabel, TraitLocation},
        test_util::TestTree,
        tree,
    };

    fn seq(n: u32) -> DetachedSequenceId {
        DetachedSequenceId::new(n)
    }

    #[test]
    fn build_registers_top_level_ids_in_input_order() {
        let mut tx = Transaction::new(tree!((1, "root")));
        assert_eq!(
            tx.apply(Change::build(
                [
                    BuildNode::leaf(NodeId::new(10), "x").into(),
                    BuildNode::leaf(NodeId::new(11), "x").into(),
                ],
                seq(0),
            )),
            EditResult::Applied
        );
        assert_eq!(
            tx.detached[&seq(0)].as_slice(),
            &[NodeId::new(10), NodeId::new(11)]
        );
        // built but not yet inserted: present in the view, unparented
        assert!(tx.current_view().has_node(NodeId::new(10)));
        assert_eq!(tx.current_view().parent_of(NodeId::new(10)), None);
    }

    #[test]
    fn build_by_reference_consumes_and_splices() {
        let mut tx = Transaction::new(tree!((1, "root")));
        tx.apply(Change::build(
            [BuildNode::leaf(NodeId::new(10), "leaf").into()],
            seq(0),
        ));
        // wrap the detached leaf in a new parent
        let wrapper = BuildNode::leaf(NodeId::new(11), "wrapper")
            .with_trait("items", [EditNode::Detached(seq(0))]);
        assert_eq!(
            tx.apply(Change::build([wrapper.into()], seq(1))),
            EditResult::Applied
        );

        // the reference was consumed...
        assert!(!tx.detached.contains_key(&seq(0)));
        assert_eq!(tx.detached[&seq(1)].as_slice(), &[NodeId::new(11)]);
        // ...and the leaf is now parented under the wrapper
        assert_eq!(
            tx.current_view().parent_of(NodeId::new(10)),
            Some(&TraitLocation::new(NodeId::new(11), "items"))
        );
    }

    #[test]
    fn build_into_an_occupied_slot_is_malformed() {
        let mut tx = Transaction::new(tree!((1, "root")));
        tx.apply(Change::build(
            [BuildNode::leaf(NodeId::new(10), "x").into()],
            seq(0),
        ));
        let registry_before = tx.detached.clone();
        assert_eq!(
            tx.apply(Change::build(
                [BuildNode::leaf(NodeId::new(11), "x").into()],
                seq(0),
            )),
            EditResult::Malformed
        );
        assert_eq!(tx.detached, registry_before);
        assert!(!tx.is_open());
    }

    #[test]
    fn failed_build_consumes_nothing() {
        let mut tx = Transaction::new(tree!((1, "root")));
        tx.apply(Change::build(
            [BuildNode::leaf(NodeId::new(10), "x").into()],
            seq(0),
        ));
        // references seq(0) twice: the second sight is unresolved
        let twice = [
            EditNode::Detached(seq(0)),
            EditNode::Detached(seq(0)),
        ];
        let view_before = tx.current_view().clone();
        assert_eq!(tx.apply(Change::build(twice, seq(1))), EditResult::Malformed);
        assert!(tx.detached.contains_key(&seq(0)), "failed build must not consume");
        assert_eq!(*tx.current_view(), view_before);
    }

    #[test]
    fn closed_transactions_are_inert() {
        let mut tx = Transaction::new(tree!((1, "root")));
        assert_eq!(
            tx.apply(Change::insert(
                seq(9),
                StablePlace::at_start_of(TraitLocation::new(NodeId::new(1), "children")),
            )),
            EditResult::Malformed
        );
        // anything after the failure re-reports the frozen outcome
        assert_eq!(
            tx.apply(Change::set_payload(NodeId::new(1), "ignored")),
            EditResult::Malformed
        );
        let outcome = tx.close();
        assert_eq!(outcome.result, EditResult::Malformed);
        assert_eq!(outcome.view.node(NodeId::new(1)).payload, None);
    }

    #[test]
    fn hash_constraints_fail_fast() {
        let baseline = tree!((1, "root" => { "children" => [(2, "x")] }));
        let mut tx = Transaction::new(baseline);
        let mut constraint = Constraint::new(
            StableRange::only(NodeId::new(2)),
            ConstraintEffect::InvalidRetry,
        );
        constraint.identity_hash = Some(42);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tx.apply(Change::Constraint(constraint))
        }));
        assert!(result.is_err(), "unimplemented constraint kinds must panic");
    }

    // ---- universal invariants, driven by generated edits ----

    fn registry_is_consistent(tx: &Transaction) -> bool {
        let mut seen: std::collections::HashSet<NodeId> = std::collections::HashSet::new();
        tx.detached.values().flat_map(|ids| ids.iter()).all(|id| {
            tx.view.has_node(*id) && tx.view.parent_of(*id).is_none() && seen.insert(*id)
        })
    }

    fn parents_are_unique(view: &Snapshot) -> bool {
        let mut seen: std::collections::HashSet<NodeId> = std::collections::HashSet::new();
        for id in view.node_ids() {
            for (label, children) in view.node(id).traits.iter() {
                for child in children.iter() {
                    if !seen.insert(*child) {
                        return false;
                    }
                    let expected = TraitLocation {
                        parent: id,
                        label: label.clone(),
                    };
                    if view.parent_of(*child) != Some(&expected) {
                        return false;
                    }
                }
            }
        }
        true
    }

    #[quickcheck]
    fn baselines_are_never_mutated(tree: TestTree, changes: Vec<Change>) -> bool {
        let baseline = tree.0;
        let pristine = baseline.clone();
        let mut tx = Transaction::new(baseline.clone());
        for change in changes {
            tx.apply(change);
        }
        let _ = tx.close();
        baseline == pristine
    }

    #[quickcheck]
    fn registry_and_parents_stay_consistent(tree: TestTree, changes: Vec<Change>) -> bool {
        let mut tx = Transaction::new(tree.0);
        for change in changes {
            tx.apply(change);
            if !registry_is_consistent(&tx) || !parents_are_unique(&tx.view) {
                return false;
            }
        }
        true
    }

    #[quickcheck]
    fn close_reports_unconsumed_sequences_as_malformed(
        tree: TestTree,
        changes: Vec<Change>,
    ) -> bool {
        let mut tx = Transaction::new(tree.0);
        for change in changes {
            tx.apply(change);
        }
        let open = tx.is_open();
        let pending = !tx.detached.is_empty();
        let running = tx.result();
        let outcome = tx.close();
        if open && pending {
            outcome.result == EditResult::Malformed
        } else {
            outcome.result == running
        }
    }

    #[quickcheck]
    fn constraints_never_mutate_the_view(tree: TestTree, constraint: Constraint) -> bool {
        let mut tx = Transaction::new(tree.0);
        let before = tx.current_view().clone();
        if constraint.identity_hash.is_some() || constraint.content_hash.is_some() {
            // reserved kinds panic by design; nothing to check here
            return true;
        }
        tx.apply(Change::Constraint(constraint));
        *tx.current_view() == before
    }

    #[quickcheck]
    fn applied_views_only_grow_from_applied_changes(tree: TestTree, changes: Vec<Change>) -> bool {
        // a failing change leaves the view exactly as it was
        let mut tx = Transaction::new(tree.0);
        for change in changes {
            let before = tx.current_view().clone();
            let result = tx.apply(change);
            if result != EditResult::Applied && *tx.current_view() != before {
                return false;
            }
        }
        true
    }

    #[quickcheck]
    fn generated_trees_are_well_formed(tree: TestTree) -> bool {
        // sanity for the test-tree generator itself
        parents_are_unique(&tree.0)
    }

    #[test]
    fn detach_then_close_without_insert_is_malformed() {
        let baseline = tree!((1, "root" => { "children" => [(2, "x")] }));
        let mut tx = Transaction::new(baseline);
        assert_eq!(
            tx.apply(Change::detach_to(StableRange::only(NodeId::new(2)), seq(0))),
            EditResult::Applied
        );
        assert_eq!(tx.close().result, EditResult::Malformed);
    }

    #[test]
    fn labels_do_not_leak_across_traits() {
        // moving a node between traits updates its recorded location
        let baseline = tree!((1, "root" => {
            "left" => [(2, "x")],
            "right" => [(3, "x")],
        }));
        let mut tx = Transaction::new(baseline);
        tx.apply(Change::detach_to(StableRange::only(NodeId::new(2)), seq(0)));
        tx.apply(Change::insert(seq(0), StablePlace::after(NodeId::new(3))));
        let outcome = tx.close();
        assert_eq!(outcome.result, EditResult::Applied);
        assert_eq!(
            outcome.view.parent_of(NodeId::new(2)),
            Some(&TraitLocation {
                parent: NodeId::new(1),
                label: TraitLabel::from("right"),
            })
        );
    }
}
