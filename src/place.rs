// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Stable positions within traits.
//!
//! A [`StablePlace`] names a gap between siblings in a way that survives
//! concurrent edits nearby: instead of a bare integer index, it anchors to a
//! sibling node (insert before or after *that node*, wherever it currently
//! sits) or to an end of the trait itself (insert at the very start or end,
//! however many siblings there currently are).
//!
//! A [`StableRange`] is an ordered pair of places which, once resolved
//! against a snapshot, designates a contiguous run of siblings in a single
//! trait. Resolution and classification live in [`crate::validation`];
//! this module is only the vocabulary.

use crate::identifiers::{NodeId, TraitLocation};

/// Which side of the anchor a place designates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Side {
    Before,
    After,
}

/// What a [`StablePlace`] is anchored to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum PlaceReference {
    /// A sibling node currently parented in the target trait.
    Sibling(NodeId),
    /// An end of the trait itself. Combined with [`Side::After`] this is the
    /// start of the trait (after its leading edge); with [`Side::Before`]
    /// it is the end (before its trailing edge).
    TraitBoundary(TraitLocation),
}

/// A position within a trait that is robust to edits nearby.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct StablePlace {
    pub side: Side,
    pub reference: PlaceReference,
}

impl StablePlace {
    /// The gap immediately before `sibling`.
    pub fn before(sibling: NodeId) -> Self {
        Self {
            side: Side::Before,
            reference: PlaceReference::Sibling(sibling),
        }
    }

    /// The gap immediately after `sibling`.
    pub fn after(sibling: NodeId) -> Self {
        Self {
            side: Side::After,
            reference: PlaceReference::Sibling(sibling),
        }
    }

    /// The start of the given trait, whatever its current contents.
    pub fn at_start_of(location: TraitLocation) -> Self {
        Self {
            side: Side::After,
            reference: PlaceReference::TraitBoundary(location),
        }
    }

    /// The end of the given trait, whatever its current contents.
    pub fn at_end_of(location: TraitLocation) -> Self {
        Self {
            side: Side::Before,
            reference: PlaceReference::TraitBoundary(location),
        }
    }
}

/// An ordered pair of places designating a contiguous run of siblings.
///
/// `start` must resolve at or before `end`, and both must resolve within
/// the same trait; ranges that fail either condition are classified by
/// [`crate::validation::validate_stable_range`], never silently clamped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct StableRange {
    pub start: StablePlace,
    pub end: StablePlace,
}

impl StableRange {
    pub fn new(start: StablePlace, end: StablePlace) -> Self {
        Self { start, end }
    }

    /// The range covering exactly `node` within its current trait.
    pub fn only(node: NodeId) -> Self {
        Self {
            start: StablePlace::before(node),
            end: StablePlace::after(node),
        }
    }

    /// The range covering the entire given trait.
    pub fn all_of(location: TraitLocation) -> Self {
        Self {
            start: StablePlace::at_start_of(location.clone()),
            end: StablePlace::at_end_of(location),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::NodeId;

    #[test]
    fn constructors_pick_the_documented_sides() {
        let n = NodeId::new(7);
        assert_eq!(StablePlace::before(n).side, Side::Before);
        assert_eq!(StablePlace::after(n).side, Side::After);

        let location = TraitLocation::new(NodeId::new(1), "children");
        // start-of-trait sits after the leading edge, end-of-trait before
        // the trailing edge
        assert_eq!(StablePlace::at_start_of(location.clone()).side, Side::After);
        assert_eq!(StablePlace::at_end_of(location).side, Side::Before);
    }

    #[test]
    fn only_covers_a_single_node() {
        let n = NodeId::new(7);
        let range = StableRange::only(n);
        assert_eq!(range.start, StablePlace::before(n));
        assert_eq!(range.end, StablePlace::after(n));
    }
}
