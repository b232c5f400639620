// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Identifier and location value types for the tree model.
//!
//! Everything in the engine is addressed by value: nodes by [`NodeId`],
//! detached sequences by [`DetachedSequenceId`], named child lists by
//! [`TraitLabel`], and a specific child list in a specific node by
//! [`TraitLocation`]. Ids are the only currency of reference between the
//! interpreter, the snapshot, and the change model; no part of the engine
//! holds pointers into another part's data.
//!
//! None of these identifiers are minted here. Hosts generate node ids
//! (typically from a session-scoped allocator) and detached-sequence ids
//! (typically a per-edit counter); the engine only checks and moves them.

use std::fmt;

/// Globally unique identifier of a tree node.
///
/// Equality and hashing are part of the contract; ordering is not. The
/// inner representation is a plain 64-bit value so that ids stay cheap to
/// copy and compact on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Creates a node id from its raw bits.
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits of this id.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:#x})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identifier of a detached sequence: an ordered run of nodes that is held
/// in a transaction's private registry between the change that produced it
/// and the change that consumes it.
///
/// Deliberately a distinct type from [`NodeId`] so a change cannot confuse
/// the two; the registry is keyed by these and nothing else.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[repr(transparent)]
pub struct DetachedSequenceId(u32);

impl DetachedSequenceId {
    /// Creates a detached-sequence id from its raw value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value of this id.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for DetachedSequenceId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Debug for DetachedSequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DetachedSequenceId({})", self.0)
    }
}

impl fmt::Display for DetachedSequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Label of a named child list ("trait") under a parent node.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TraitLabel(Box<str>);

impl TraitLabel {
    pub fn new(label: impl Into<Box<str>>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TraitLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl fmt::Debug for TraitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraitLabel({:?})", &*self.0)
    }
}

impl fmt::Display for TraitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque node definition: what kind of node this is, in the host's schema.
///
/// The engine never interprets definitions; it copies them from edit
/// fragments into snapshot records and hands them back on lookup.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Definition(Box<str>);

impl Definition {
    pub fn new(definition: impl Into<Box<str>>) -> Self {
        Self(definition.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Definition {
    fn from(definition: &str) -> Self {
        Self::new(definition)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Definition({:?})", &*self.0)
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A specific trait under a specific parent: the address of one child list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct TraitLocation {
    pub parent: NodeId,
    pub label: TraitLabel,
}

impl TraitLocation {
    pub fn new(parent: NodeId, label: impl Into<TraitLabel>) -> Self {
        Self {
            parent,
            label: label.into(),
        }
    }
}

impl From<String> for TraitLabel {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

impl From<String> for Definition {
    fn from(definition: String) -> Self {
        Self::new(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_round_trips_raw_bits() {
        let id = NodeId::new(0xdead_beef);
        assert_eq!(id.as_u64(), 0xdead_beef);
        assert_eq!(NodeId::from(0xdead_beef), id);
    }

    #[test]
    fn node_id_debug_is_compact_hex() {
        assert_eq!(format!("{:?}", NodeId::new(255)), "NodeId(0xff)");
        assert_eq!(format!("{}", NodeId::new(255)), "0xff");
    }

    #[test]
    fn labels_and_definitions_compare_by_content() {
        assert_eq!(TraitLabel::from("children"), TraitLabel::new("children"));
        assert_ne!(TraitLabel::from("children"), TraitLabel::from("cells"));
        assert_eq!(Definition::from("paragraph").as_str(), "paragraph");
    }

    #[test]
    fn trait_location_addresses_one_child_list() {
        let a = TraitLocation::new(NodeId::new(1), "children");
        let b = TraitLocation::new(NodeId::new(1), "children");
        let c = TraitLocation::new(NodeId::new(2), "children");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
