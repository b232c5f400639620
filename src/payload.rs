// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Opaque leaf values carried by tree nodes.
//!
//! A [`Payload`] is data the engine stores but never interprets: the
//! interpreter copies payloads between edit fragments and snapshot records
//! and compares them for equality in tests, nothing more. Deep validation
//! (schemas, serializability of host data) is the host's concern.
//!
//! Payload presence is tri-state from a caller's point of view: a node may
//! have no payload, a `SetValue` change may set one, and a `SetValue` change
//! may explicitly clear one. The clearing sentinel is modelled at the change
//! layer (`Option<Payload>` with `None` meaning "clear"); this module only
//! defines the value itself.

use std::fmt;

/// An opaque primitive value attached to a node.
// NOTE: Why no U32 or I32? Make this a serialization concern.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Payload {
    // The #[serde] here gets efficient encoding of byte-arrays for
    // protocols that support it (like msgpack):
    // <https://docs.rs/rmp-serde/1/rmp_serde/index.html#efficient-storage-of-u8-types>
    Bytes(#[cfg_attr(feature = "serde", serde(with = "serde_bytes"))] Vec<u8>),
    String(String),
    Double(f64),
    U64(u64),
    I64(i64),
    Bool(bool),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Bytes(v) => write!(f, "b{v:02x?}"),
            Payload::String(v) => write!(f, "{v:?}"),
            Payload::Double(v) => write!(f, "{v:?}"),
            Payload::U64(v) => write!(f, "{v}u64"),
            Payload::I64(v) => write!(f, "{v}i64"),
            Payload::Bool(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$t> for Payload {
                fn from(value: $t) -> Self {
                    Self::$variant(value.into())
                }
            }
        )+
    };
}

impl_from! {
    Vec<u8> => Bytes,
    String => String,
    &str => String,
    f64 => Double,
    u64 => U64,
    i64 => I64,
    bool => Bool,
}

macro_rules! impl_partial_eq {
    ({$($t:ty => $variant:ident),+ $(,)?}) => {
        $(
            impl PartialEq<$t> for Payload {
                fn eq(&self, other: &$t) -> bool {
                    matches!(self, Self::$variant(v) if v == other)
                }
            }
        )+
    };
}

impl_partial_eq!({
    str => String,
    &str => String,
    f64 => Double,
    u64 => U64,
    i64 => I64,
    bool => Bool,
});

impl PartialEq<[u8]> for Payload {
    fn eq(&self, other: &[u8]) -> bool {
        matches!(self, Self::Bytes(v) if v == other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_comparisons() {
        assert_eq!(Payload::from("hello"), "hello");
        assert_eq!(Payload::from(42u64), 42u64);
        assert_eq!(Payload::from(-3i64), -3i64);
        assert_eq!(Payload::from(true), true);
        assert_ne!(Payload::from("hello"), "world");
        // no cross-variant equality, even for numerically equal values
        assert_ne!(Payload::from(1i64), 1u64);
    }

    #[test]
    fn debug_is_terse() {
        assert_eq!(format!("{:?}", Payload::from("x")), "\"x\"");
        assert_eq!(format!("{:?}", Payload::from(7u64)), "7u64");
    }
}
