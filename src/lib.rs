// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # treetx: Transactional Edits for an Ordered, Labelled Tree
//!
//! This crate implements the edit engine for the in-memory document model
//! of a collaborative editing platform: an ordered tree whose nodes carry
//! an opaque definition, an optional opaque payload, and named, ordered
//! child lists ("traits"). Given an immutable baseline [`Snapshot`] and a
//! sequence of [`Change`]s, a [`Transaction`] produces either a new
//! snapshot with all changes applied atomically, or a classified rejection
//! with the baseline untouched.
//!
//! ## Core Concepts
//!
//! - [`Snapshot`]: an immutable, structurally-shared view of the whole
//!   tree. Its mutators are copy-on-write and cost O(log n) per edit; a
//!   baseline can be shared across any number of concurrent readers and
//!   transactions because nothing ever mutates it in place.
//! - [`Transaction`]: the interpreter. It consumes changes one at a time
//!   in submission order, maintains an evolving view plus a private
//!   registry of *detached sequences*, and decides the edit outcome.
//! - **Detached sequences**: ordered runs of nodes that exist in the view
//!   but have no parent, i.e. content that has been built, or detached from a
//!   trait, and not yet spliced back in. They are a linear resource:
//!   produced once, consumed exactly once. Leftovers at close time make
//!   the whole edit Malformed.
//! - [`StablePlace`] / [`StableRange`]: positions and sibling runs
//!   specified relative to anchor nodes or trait boundaries rather than
//!   bare indices, so they stay meaningful across nearby edits.
//! - [`EditResult`]: the three-valued outcome. `Malformed` edits are
//!   nonsense against any snapshot and should be rejected outright by
//!   peers; `Invalid` edits lost a race against this particular baseline
//!   and may be retried against another; `Applied` edits yield a new
//!   snapshot.
//!
//! The five change kinds are `Build` (construct new content as a detached
//! sequence), `Insert` (splice a detached sequence in), `Detach` (remove a
//! sibling run, keeping it for reinsertion or discarding it), `Constraint`
//! (assert properties of a range without mutating it), and `SetValue` (set
//! or clear one node's payload). Together with [`EditNode`] they form the
//! persisted edit schema; enable the `serde` feature (default) to
//! serialize them.
//!
//! ## Example
//!
//! ```
//! use treetx::{Change, DetachedSequenceId, EditResult, NodeId, StablePlace, Transaction, tree};
//!
//! // A document with three siblings under the root.
//! let baseline = tree!((1, "list" => {
//!     "items" => [(2, "entry"), (3, "entry"), (4, "entry")],
//! }));
//!
//! // Move node 2 to the end of its trait.
//! let mut tx = Transaction::new(baseline.clone());
//! let moved = DetachedSequenceId::new(0);
//! tx.apply(Change::detach_to(treetx::StableRange::only(NodeId::new(2)), moved));
//! tx.apply(Change::insert(moved, StablePlace::after(NodeId::new(4))));
//!
//! let outcome = tx.close();
//! assert_eq!(outcome.result, EditResult::Applied);
//!
//! let items = outcome.view.trait_children(&treetx::TraitLocation::new(NodeId::new(1), "items"));
//! let order: Vec<_> = items.iter().map(|id| id.as_u64()).collect();
//! assert_eq!(order, [3, 4, 2]);
//!
//! // The baseline still shows the old order.
//! let items = baseline.trait_children(&treetx::TraitLocation::new(NodeId::new(1), "items"));
//! assert_eq!(items.iter().map(|id| id.as_u64()).collect::<Vec<_>>(), [2, 3, 4]);
//! ```
//!
//! ## Scope of this Crate
//!
//! This crate is the interpreter and its data model, nothing more. It does
//! no I/O, holds no locks, and spawns no threads; a transaction is owned
//! by one caller and applies changes strictly sequentially. The wire
//! protocol that moves edits between peers, the op log that persists them,
//! and the consensus layer that orders them are the host's concern: the
//! host hands this crate a baseline and an ordered sequence of changes and
//! gets back an outcome. Aborting an edit is just dropping the
//! transaction: since the baseline is immutable and the engine performed
//! no I/O, there is nothing to clean up.
//!
//! Real-time operational transformation of concurrent edits is explicitly
//! out of scope: the engine applies one ordered change sequence against
//! one baseline, and the distributed protocol above decides what a
//! non-`Applied` outcome means for retry.
//!
//! ## Features
//!
//! - `serde`: serialization for the persisted change schema ([`Change`],
//!   [`EditNode`], places, payloads). Enabled by default.
//! - `arbitrary`: implements `quickcheck::Arbitrary` for the change model,
//!   useful for property-based testing against the engine.
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::{
    hash::BuildHasher,
    sync::atomic::{AtomicBool, Ordering},
};

// Use a constant seed for hashing to make performance benchmarks have less variance.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

pub mod change;
pub use change::{BuildNode, Change, Constraint, ConstraintEffect, EditNode};
pub mod identifiers;
pub use identifiers::{Definition, DetachedSequenceId, NodeId, TraitLabel, TraitLocation};
pub mod payload;
pub use payload::Payload;
pub mod place;
pub use place::{PlaceReference, Side, StablePlace, StableRange};
pub mod snapshot;
pub use snapshot::{MalformedTreeError, Snapshot, SnapshotNode};
pub mod transaction;
pub use transaction::{EditResult, Transaction, TransactionOutcome};
pub mod validation;
pub use validation::{ResolvedPlace, ResolvedRange, Validity};

/// Macros usable for tests and initialization
pub mod macros;

#[cfg(any(test, feature = "arbitrary"))]
pub mod test_util;
#[cfg(any(test, feature = "arbitrary"))]
pub use test_util::TestTree;

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes all data structures behave deterministically.
///
/// This should only be enabled for testing, as it increases the odds of DoS
/// scenarios.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
///
/// Should be used internally and for testing.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

/// Create a random state for a hashmap.
/// If `enable_determinism` has been used, this will return a deterministic
/// decidedly non-random RandomState, useful in tests.
#[inline]
fn make_random_state() -> RandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        // Create an instance of the standard ahash random state.
        // This will be random, and will not be the same for any two runs.
        RandomState::new()
    }
}

pub(crate) fn create_map<K, V>() -> std::collections::HashMap<K, V, TreeRandomState> {
    std::collections::HashMap::with_hasher(TreeRandomState::default())
}

/// A small wrapper around the standard ahash RandomState that falls back to
/// a fixed-seed state once [`enable_determinism`] has been called.
///
/// Every hash-keyed structure in the engine (the snapshot's node map and
/// parent index, per-node trait maps, the transaction's detached registry)
/// is specialized over this, so flipping the switch makes whole runs
/// reproducible without threading a hasher through every constructor.
#[derive(Clone)]
pub struct TreeRandomState {
    inner: RandomState,
}

impl Default for TreeRandomState {
    #[inline]
    fn default() -> Self {
        Self {
            inner: make_random_state(),
        }
    }
}

// All we do is delegate to the wrapped 'inner' RandomState; the
// indirection exists purely so Default can consult the determinism switch.
impl BuildHasher for TreeRandomState {
    type Hasher = <RandomState as BuildHasher>::Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}
