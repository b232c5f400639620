// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Pure classification of stable places and ranges against a snapshot.
//!
//! These primitives are stateless functions over the [`Snapshot`] read
//! interface. The interpreter calls them before every positional mutation
//! and maps their three-valued answer directly onto the edit outcome.
//!
//! # Classification table
//!
//! | Condition | [`Validity`] |
//! |---|---|
//! | sibling anchor has no record in the view | `Invalid` |
//! | sibling anchor is unparented (the root, or currently detached) | `Invalid` |
//! | trait-boundary parent has no record in the view | `Invalid` |
//! | range endpoints resolve into different traits | `Invalid` |
//! | range endpoints resolve inverted (start after end) | `Invalid` |
//! | otherwise | `Valid` |
//!
//! Every non-`Valid` condition above depends on the state of the snapshot
//! the place is resolved against (the same place could resolve cleanly
//! against a different baseline), which is exactly what `Invalid`
//! means. `Malformed` is reserved for specifications that could not resolve
//! against *any* snapshot; the typed place and range model cannot represent
//! such a specification (there is no way to write a place with both, or
//! neither, of a sibling anchor and a trait boundary), so these functions
//! never return it. The variant exists because the classification is a
//! three-valued contract shared with the decoder of the persisted change
//! format, where contradictory or truncated specifications die with
//! `Malformed` before reaching the interpreter.

use crate::{
    identifiers::TraitLocation,
    place::{PlaceReference, StablePlace, StableRange},
    snapshot::Snapshot,
};

/// The three-valued answer of place/range classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validity {
    /// Resolves against the given snapshot.
    Valid,
    /// Well-formed, but the snapshot's current state prevents resolution.
    Invalid,
    /// Could not resolve against any snapshot. Not produced by the typed
    /// model; see the module docs.
    Malformed,
}

/// A place resolved to a concrete trait and offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPlace {
    pub location: TraitLocation,
    /// Insertion offset within the trait: `0..=len`.
    pub index: usize,
}

/// A range resolved to a concrete trait and a `start..end` sibling run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRange {
    pub location: TraitLocation,
    pub start_index: usize,
    pub end_index: usize,
}

impl ResolvedRange {
    /// Number of siblings the range covers.
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }
}

/// The trait a place addresses, if its anchor resolves.
pub fn containing_trait(view: &Snapshot, place: &StablePlace) -> Option<TraitLocation> {
    match &place.reference {
        PlaceReference::Sibling(anchor) => view.parent_of(*anchor).cloned(),
        PlaceReference::TraitBoundary(location) => {
            view.has_node(location.parent).then(|| location.clone())
        }
    }
}

/// Resolves a place to a concrete trait and offset, or `None` when the
/// snapshot's state prevents it.
pub fn resolve_place(view: &Snapshot, place: &StablePlace) -> Option<ResolvedPlace> {
    let location = containing_trait(view, place)?;
    let index = view.find_index_within_trait(place)?;
    Some(ResolvedPlace { location, index })
}

/// Classifies a place against a snapshot. See the module-level table.
pub fn validate_stable_place(view: &Snapshot, place: &StablePlace) -> Validity {
    if resolve_place(view, place).is_some() {
        Validity::Valid
    } else {
        Validity::Invalid
    }
}

/// Resolves a range to a concrete trait and sibling run, or `None` when
/// either endpoint fails to resolve, the endpoints land in different
/// traits, or they are inverted.
pub fn range_from_stable_range(view: &Snapshot, range: &StableRange) -> Option<ResolvedRange> {
    let start = resolve_place(view, &range.start)?;
    let end = resolve_place(view, &range.end)?;
    (start.location == end.location && start.index <= end.index).then_some(ResolvedRange {
        location: end.location,
        start_index: start.index,
        end_index: end.index,
    })
}

/// Classifies a range against a snapshot. See the module-level table.
pub fn validate_stable_range(view: &Snapshot, range: &StableRange) -> Validity {
    if range_from_stable_range(view, range).is_some() {
        Validity::Valid
    } else {
        Validity::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{identifiers::NodeId, tree};

    fn two_traits() -> Snapshot {
        tree!((1, "root" => {
            "left" => [(2, "x"), (3, "x")],
            "right" => [(4, "x")],
        }))
    }

    #[test]
    fn places_anchored_on_live_siblings_are_valid() {
        let view = two_traits();
        assert_eq!(
            validate_stable_place(&view, &StablePlace::before(NodeId::new(3))),
            Validity::Valid
        );
        assert_eq!(
            resolve_place(&view, &StablePlace::after(NodeId::new(2))),
            Some(ResolvedPlace {
                location: TraitLocation::new(NodeId::new(1), "left"),
                index: 1,
            })
        );
    }

    #[test]
    fn absent_or_unparented_anchors_are_invalid() {
        let view = two_traits();
        // no record
        assert_eq!(
            validate_stable_place(&view, &StablePlace::before(NodeId::new(99))),
            Validity::Invalid
        );
        // the root is unparented
        assert_eq!(
            validate_stable_place(&view, &StablePlace::after(NodeId::new(1))),
            Validity::Invalid
        );
        // absent trait parent
        let gone = TraitLocation::new(NodeId::new(99), "left");
        assert_eq!(
            validate_stable_place(&view, &StablePlace::at_start_of(gone)),
            Validity::Invalid
        );
    }

    #[test]
    fn boundary_places_resolve_even_for_missing_labels() {
        let view = two_traits();
        // a trait that does not exist yet still has a well-defined start/end
        let empty = TraitLocation::new(NodeId::new(4), "children");
        assert_eq!(
            resolve_place(&view, &StablePlace::at_start_of(empty.clone())),
            Some(ResolvedPlace {
                location: empty.clone(),
                index: 0,
            })
        );
        assert_eq!(
            resolve_place(&view, &StablePlace::at_end_of(empty.clone())),
            Some(ResolvedPlace {
                location: empty,
                index: 0,
            })
        );
    }

    #[test]
    fn ranges_must_stay_within_one_trait() {
        let view = two_traits();
        let crossing = StableRange::new(
            StablePlace::before(NodeId::new(2)),
            StablePlace::after(NodeId::new(4)),
        );
        assert_eq!(validate_stable_range(&view, &crossing), Validity::Invalid);
        assert_eq!(range_from_stable_range(&view, &crossing), None);
    }

    #[test]
    fn inverted_ranges_are_invalid() {
        let view = two_traits();
        let inverted = StableRange::new(
            StablePlace::after(NodeId::new(3)),
            StablePlace::before(NodeId::new(2)),
        );
        assert_eq!(validate_stable_range(&view, &inverted), Validity::Invalid);
    }

    #[test]
    fn resolved_ranges_carry_the_sibling_run() {
        let view = two_traits();
        let all = StableRange::all_of(TraitLocation::new(NodeId::new(1), "left"));
        let resolved = range_from_stable_range(&view, &all).unwrap();
        assert_eq!(resolved.start_index, 0);
        assert_eq!(resolved.end_index, 2);
        assert_eq!(resolved.len(), 2);
        assert!(!resolved.is_empty());
    }
}
