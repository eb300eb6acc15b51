//! Tap/hold resolution for dual-role keys.
//!
//! A dual-role key means one thing when tapped briefly and another (usually a
//! modifier or layer switch) when held. This crate decides which one the user
//! meant, with no lookahead, from timestamped key transitions and a periodic
//! timeout poll. The embedding system feeds every transition through
//! [`Resolver::filter`] and calls [`Resolver::on_tick`] once per scan cycle;
//! resolved events come back through the host's [`EventSink`].
//!
//! ```
//! use chordal_resolver::handedness::HandPartition;
//! use chordal_resolver::{
//!     EventSink, Keycode, Mods, OppositeHands, Pos, Resolver, Transition,
//! };
//!
//! struct Collect(Vec<Transition>);
//! impl EventSink for Collect {
//!     fn emit(&mut self, t: Transition) {
//!         self.0.push(t);
//!     }
//! }
//!
//! let policy = OppositeHands::new(HandPartition::row_split(2));
//! let mut resolver = Resolver::new(&policy);
//! let mut sink = Collect(Vec::new());
//!
//! let key = Keycode::mod_tap(Mods::CTL, Keycode::A);
//! let pos = Pos::new(1, 0);
//! resolver.filter(&Transition::press(pos, key, 100), &mut sink);
//! resolver.filter(&Transition::release(pos, key, 150), &mut sink);
//!
//! // A quick tap resolves to a press/release pair of the tap sense.
//! assert_eq!(sink.0.len(), 2);
//! assert_eq!(sink.0[0].tap_count, 1);
//! ```

pub mod event;
pub mod handedness;
pub mod keycode;
pub mod policy;
pub mod resolver;
pub mod ticks;

pub use event::{Pos, Transition};
pub use keycode::{DualRole, Keycode, Mods};
pub use policy::{ChordPolicy, OppositeHands, Settle, DEFAULT_HOLD_TIMEOUT};
pub use resolver::{EventSink, Filtered, Resolver};
