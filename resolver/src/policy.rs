//! Settlement policies.
//!
//! The embedding system supplies a [`ChordPolicy`] at construction time to
//! answer the questions the resolver cannot answer from timing alone: how a
//! still-undecided key should settle when another key is pressed, how long a
//! key may stay undecided, and which modifiers are safe to activate eagerly.

use crate::event::Transition;
use crate::handedness::HandPartition;
use crate::keycode::{Keycode, Mods};
use crate::ticks::Ticks;

/// Hold timeout applied when a policy does not override it, in ticks.
pub const DEFAULT_HOLD_TIMEOUT: Ticks = 1000;

/// How an undecided dual-role key settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// The key was meant to be held; its hold sense activates.
    Hold,
    /// The key was a tap; its tap sense fires as a press/release pair.
    Tap,
}

/// Strategy interface for settlement decisions.
///
/// Implementations must not call back into the resolver and must not keep
/// references to the transitions they are shown; both are read-only views
/// valid for the duration of the call.
pub trait ChordPolicy {
    /// Decide how `pending` settles, given that `other` was pressed before
    /// `pending` resolved.
    fn classify(&self, pending: &Transition, other: &Transition) -> Settle;

    /// Hold timeout for a dual-role keycode, in ticks. Returning 0 disables
    /// dual-role deferral for that key entirely; it acts as a normal key.
    fn timeout_for(&self, key: Keycode) -> Ticks {
        let _ = key;
        DEFAULT_HOLD_TIMEOUT
    }

    /// Whether a mod-tap's modifier mask should be applied while the key is
    /// still undecided.
    fn eager_mods(&self, mods: Mods) -> bool {
        mods.only_ctrl_shift()
    }
}

/// Default policy: settle as hold iff the two keys sit on opposite halves of
/// the board, tap otherwise.
#[derive(Debug, Clone, Copy)]
pub struct OppositeHands {
    partition: HandPartition,
}

impl OppositeHands {
    pub const fn new(partition: HandPartition) -> Self {
        Self { partition }
    }
}

impl ChordPolicy for OppositeHands {
    fn classify(&self, pending: &Transition, other: &Transition) -> Settle {
        if self.partition.opposite_hands(pending.pos, other.pos) {
            Settle::Hold
        } else {
            Settle::Tap
        }
    }
}
