//! The tap/hold resolution state machine.
//!
//! The resolver sits between the host's matrix scanner and its normal input
//! pipeline. It owns at most one undecided ("pending") dual-role press at a
//! time. Transitions enter through [`Resolver::filter`]; the host's scan loop
//! calls [`Resolver::on_tick`] every cycle so deadline expiry can settle a
//! pending key as a hold. Resolved events leave through the host-provided
//! [`EventSink`].

use arraydeque::ArrayDeque;

use crate::event::Transition;
use crate::keycode::{DualRole, Mods};
use crate::policy::{ChordPolicy, Settle};
use crate::ticks::{deadline_reached, Ticks};

/// What the filter decided about a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filtered {
    /// The resolver took ownership of the transition; the host pipeline must
    /// not act on it. Its resolved form arrives later through the sink.
    Suppress,
    /// Not the resolver's concern; the host processes it as normal.
    Passthrough,
}

/// Host pipeline half of the embedding contract.
///
/// `emit` receives fully resolved transitions in pipeline order; for a tap
/// settlement the press always precedes the release. The eager-modifier
/// methods are optional refinements for hosts that track modifier state.
pub trait EventSink {
    /// Deliver a resolved transition to the normal input pipeline.
    fn emit(&mut self, t: Transition);

    /// Make `mods` effective immediately while their key is still undecided.
    fn apply_eager_mods(&mut self, mods: Mods) {
        let _ = mods;
    }

    /// Undo a previous [`EventSink::apply_eager_mods`]. Always called before
    /// the settlement emits, which carry the key's durable meaning.
    fn revert_eager_mods(&mut self, mods: Mods) {
        let _ = mods;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolverState {
    Idle,
    Unsettled,
    Settling,
}

/// The deferred dual-role press. Exists exactly while the resolver is
/// unsettled.
#[derive(Debug, Clone, Copy)]
struct Pending {
    transition: Transition,
    deadline: Ticks,
    /// Another key was pressed before this one resolved.
    chorded: bool,
    /// Modifiers applied eagerly on deferral, to revert at settlement.
    eager: Mods,
}

/// How a settlement replays the pending press.
#[derive(Debug, Clone, Copy)]
enum SettleAs {
    /// Replay the original press unchanged; its hold sense activates.
    Hold,
    /// Tap recognized by the key's own release.
    TapOnRelease { release_ts: Ticks },
    /// Tap forced early by a same-hand chord decision.
    TapInterrupted,
}

/// The tap/hold resolver. One per keyboard, owned by the embedding system
/// and threaded through its scan loop.
pub struct Resolver<'a> {
    state: ResolverState,
    pending: Option<Pending>,
    policy: &'a dyn ChordPolicy,
    /// Transitions suppressed during a settlement, awaiting re-evaluation.
    /// The source of this design re-entered its filter recursively; a deque
    /// drained by a loop keeps the stack depth flat.
    replay: ArrayDeque<[Transition; 4]>,
}

impl<'a> Resolver<'a> {
    pub fn new(policy: &'a dyn ChordPolicy) -> Self {
        Self {
            state: ResolverState::Idle,
            pending: None,
            policy,
            replay: ArrayDeque::new(),
        }
    }

    /// Primary entry point: run one key transition through the resolver.
    ///
    /// [`Filtered::Suppress`] means the resolver owns the event now and the
    /// host pipeline must skip it; [`Filtered::Passthrough`] means the host
    /// should process it as if the resolver did not exist.
    pub fn filter(&mut self, t: &Transition, sink: &mut dyn EventSink) -> Filtered {
        match self.state {
            // Transitions seen while settling are the resolver's own replay,
            // already destined for the host pipeline. Forward unexamined.
            ResolverState::Settling => Filtered::Passthrough,
            ResolverState::Idle => {
                if self.defer_press(t, sink) {
                    Filtered::Suppress
                } else {
                    Filtered::Passthrough
                }
            }
            ResolverState::Unsettled => self.filter_unsettled(t, sink),
        }
    }

    /// Secondary entry point: called by the host once per scan cycle.
    ///
    /// Deadline expiry is itself the hold signal: the user held long enough
    /// without another key interrupting.
    pub fn on_tick(&mut self, now: Ticks, sink: &mut dyn EventSink) {
        if self.state != ResolverState::Unsettled {
            return;
        }
        let expired = match &self.pending {
            Some(p) => deadline_reached(now, p.deadline),
            None => false,
        };
        if expired {
            if let Some(p) = self.pending.take() {
                self.settle(p, SettleAs::Hold, sink);
            }
        }
    }

    /// Another key was pressed while the current pending key was undecided.
    /// False when nothing is pending.
    pub fn pending_chorded(&self) -> bool {
        self.pending.map(|p| p.chorded).unwrap_or(false)
    }

    /// Idle-state press check. Returns true if `t` became the pending entry.
    fn defer_press(&mut self, t: &Transition, sink: &mut dyn EventSink) -> bool {
        if !t.pressed || t.tap_count != 0 {
            return false;
        }
        let dual = match t.keycode.dual_role() {
            Some(dual) => dual,
            None => return false,
        };
        let timeout = self.policy.timeout_for(t.keycode);
        if timeout == 0 {
            // Configured as a normal key; never defer.
            return false;
        }
        let eager = match dual {
            DualRole::ModTap(mods) if self.policy.eager_mods(mods) => {
                sink.apply_eager_mods(mods);
                mods
            }
            _ => Mods::NONE,
        };
        self.pending = Some(Pending {
            transition: *t,
            deadline: t.ts.wrapping_add(timeout),
            chorded: false,
            eager,
        });
        self.state = ResolverState::Unsettled;
        true
    }

    fn filter_unsettled(&mut self, t: &Transition, sink: &mut dyn EventSink) -> Filtered {
        let pending_pos = match &self.pending {
            Some(p) => p.transition.pos,
            None => return Filtered::Passthrough,
        };

        if t.pos == pending_pos && !t.pressed {
            // The pending key's own release, before timeout and before any
            // other key: a clean tap.
            if let Some(p) = self.pending.take() {
                self.settle(p, SettleAs::TapOnRelease { release_ts: t.ts }, sink);
            }
            return Filtered::Suppress;
        }

        if t.pos != pending_pos && t.pressed {
            let decision = match self.pending.as_mut() {
                Some(p) => {
                    p.chorded = true;
                    self.policy.classify(&p.transition, t)
                }
                None => return Filtered::Passthrough,
            };
            if let Some(p) = self.pending.take() {
                match decision {
                    Settle::Hold => self.settle(p, SettleAs::Hold, sink),
                    Settle::Tap => self.settle(p, SettleAs::TapInterrupted, sink),
                }
            }
            // The trigger was suppressed for the caller; re-evaluate it now
            // that the machine is idle again. It may start a new cycle.
            let _ = self.replay.push_back(*t);
            self.drain_replay(sink);
            return Filtered::Suppress;
        }

        // Release of an unrelated key, or a repeat of the pending press.
        // Upstream guarantees one event per edge, so nothing else reaches
        // here.
        Filtered::Passthrough
    }

    /// Emit the pending key's resolved meaning. Settling is entered before
    /// the first emit and left only after the last, so emit-triggered side
    /// effects cannot re-enter the filter logic.
    fn settle(&mut self, p: Pending, how: SettleAs, sink: &mut dyn EventSink) {
        self.state = ResolverState::Settling;
        if !p.eager.is_empty() {
            // The settlement emits carry the key's durable meaning; the
            // optimistic modifiers must not linger on top of them.
            sink.revert_eager_mods(p.eager);
        }
        match how {
            SettleAs::Hold => sink.emit(p.transition),
            SettleAs::TapOnRelease { release_ts } => {
                let mut press = p.transition;
                press.tap_count = 1;
                press.interrupted = false;
                let mut release = press;
                release.pressed = false;
                release.ts = release_ts;
                sink.emit(press);
                sink.emit(release);
            }
            SettleAs::TapInterrupted => {
                let mut press = p.transition;
                press.tap_count = 1;
                press.interrupted = true;
                let mut release = press;
                release.pressed = false;
                sink.emit(press);
                sink.emit(release);
            }
        }
        self.state = ResolverState::Idle;
    }

    /// Bounded trampoline for transitions suppressed during a settlement.
    fn drain_replay(&mut self, sink: &mut dyn EventSink) {
        while let Some(t) = self.replay.pop_front() {
            if !self.defer_press(&t, sink) {
                // Not a deferrable press; it belongs to the host pipeline.
                // Forward it under the Settling guard so nothing re-examines
                // it on the way through.
                self.state = ResolverState::Settling;
                sink.emit(t);
                self.state = ResolverState::Idle;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::Pos;
    use crate::handedness::HandPartition;
    use crate::keycode::Keycode;
    use crate::policy::OppositeHands;

    // Split board wired with rows 0..2 on the left half.
    const PARTITION: HandPartition = HandPartition::row_split(2);
    const POLICY: OppositeHands = OppositeHands::new(PARTITION);

    const RSFT: Mods = Mods(Mods::RIGHT_HAND.0 | Mods::SFT.0);
    const MT_A: Keycode = Keycode::mod_tap(Mods::CTL, Keycode::A);
    const MT_S: Keycode = Keycode::mod_tap(Mods::ALT, Keycode::S);
    const MT_N: Keycode = Keycode::mod_tap(RSFT, Keycode::N);

    // Left-hand home row and two right-hand keys.
    const P_A: Pos = Pos::new(1, 0);
    const P_S: Pos = Pos::new(1, 1);
    const P_D: Pos = Pos::new(1, 2);
    const P_J: Pos = Pos::new(2, 7);
    const P_N: Pos = Pos::new(2, 6);

    #[derive(Default)]
    struct Recording {
        emitted: Vec<Transition>,
        applied: Vec<Mods>,
        reverted: Vec<Mods>,
    }

    impl EventSink for Recording {
        fn emit(&mut self, t: Transition) {
            self.emitted.push(t);
        }
        fn apply_eager_mods(&mut self, mods: Mods) {
            self.applied.push(mods);
        }
        fn revert_eager_mods(&mut self, mods: Mods) {
            self.reverted.push(mods);
        }
    }

    fn press(pos: Pos, kc: Keycode, ts: Ticks) -> Transition {
        Transition::press(pos, kc, ts)
    }

    fn release(pos: Pos, kc: Keycode, ts: Ticks) -> Transition {
        Transition::release(pos, kc, ts)
    }

    #[test]
    fn quick_tap_settles_on_release() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        assert_eq!(
            r.filter(&press(P_A, MT_A, 100), &mut sink),
            Filtered::Suppress
        );
        assert_eq!(r.state, ResolverState::Unsettled);
        assert!(sink.emitted.is_empty());

        assert_eq!(
            r.filter(&release(P_A, MT_A, 150), &mut sink),
            Filtered::Suppress
        );
        assert_eq!(r.state, ResolverState::Idle);
        assert!(r.pending.is_none());

        let mut want_press = press(P_A, MT_A, 100);
        want_press.tap_count = 1;
        let mut want_release = want_press;
        want_release.pressed = false;
        want_release.ts = 150;
        assert_eq!(sink.emitted, vec![want_press, want_release]);
    }

    #[test]
    fn timeout_settles_hold() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        let down = press(P_A, MT_A, 100);
        assert_eq!(r.filter(&down, &mut sink), Filtered::Suppress);

        // Default timeout is 1000 ticks; the deadline is 1100.
        r.on_tick(1099, &mut sink);
        assert_eq!(r.state, ResolverState::Unsettled);
        assert!(sink.emitted.is_empty());

        r.on_tick(1200, &mut sink);
        assert_eq!(r.state, ResolverState::Idle);
        assert!(r.pending.is_none());
        // The hold emit is the original press, unchanged.
        assert_eq!(sink.emitted, vec![down]);
    }

    #[test]
    fn opposite_hand_chord_settles_hold() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        let down_a = press(P_A, MT_A, 100);
        let down_j = press(P_J, Keycode::J, 150);
        assert_eq!(r.filter(&down_a, &mut sink), Filtered::Suppress);
        assert_eq!(r.filter(&down_j, &mut sink), Filtered::Suppress);

        // A settles as hold; J is plain, so the trampoline forwards it.
        assert_eq!(sink.emitted, vec![down_a, down_j]);
        assert_eq!(r.state, ResolverState::Idle);
        assert!(r.pending.is_none());
    }

    #[test]
    fn chord_trigger_can_start_new_cycle() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        let down_a = press(P_A, MT_A, 100);
        let down_n = press(P_N, MT_N, 150);
        assert_eq!(r.filter(&down_a, &mut sink), Filtered::Suppress);
        assert_eq!(r.filter(&down_n, &mut sink), Filtered::Suppress);

        // A settles as hold; N is itself dual-role and becomes the new
        // pending key instead of being forwarded.
        assert_eq!(sink.emitted, vec![down_a]);
        assert_eq!(r.state, ResolverState::Unsettled);
        assert_eq!(r.pending.map(|p| p.transition), Some(down_n));
    }

    #[test]
    fn same_hand_sequence_settles_tap() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        let down_a = press(P_A, MT_A, 100);
        let down_d = press(P_D, Keycode::D, 150);
        assert_eq!(r.filter(&down_a, &mut sink), Filtered::Suppress);
        assert_eq!(r.filter(&down_d, &mut sink), Filtered::Suppress);

        let mut want_press = down_a;
        want_press.tap_count = 1;
        want_press.interrupted = true;
        let mut want_release = want_press;
        want_release.pressed = false;
        assert_eq!(sink.emitted, vec![want_press, want_release, down_d]);
        assert_eq!(r.state, ResolverState::Idle);
    }

    #[test]
    fn idle_passthrough_for_plain_keys() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        for t in [
            press(P_J, Keycode::J, 10),
            release(P_J, Keycode::J, 20),
            release(P_A, MT_A, 30), // release without a pending press
        ] {
            assert_eq!(r.filter(&t, &mut sink), Filtered::Passthrough);
        }
        assert!(sink.emitted.is_empty());
        assert!(sink.applied.is_empty());
        assert_eq!(r.state, ResolverState::Idle);
    }

    #[test]
    fn zero_timeout_disables_deferral() {
        struct NeverDefer;
        impl ChordPolicy for NeverDefer {
            fn classify(&self, _: &Transition, _: &Transition) -> Settle {
                Settle::Tap
            }
            fn timeout_for(&self, _: Keycode) -> Ticks {
                0
            }
        }
        let policy = NeverDefer;
        let mut r = Resolver::new(&policy);
        let mut sink = Recording::default();

        assert_eq!(
            r.filter(&press(P_A, MT_A, 100), &mut sink),
            Filtered::Passthrough
        );
        assert!(sink.emitted.is_empty());
        assert_eq!(r.state, ResolverState::Idle);
    }

    #[test]
    fn tap_count_gate_skips_resolved_taps() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        let mut repeat = press(P_A, MT_A, 100);
        repeat.tap_count = 1;
        assert_eq!(r.filter(&repeat, &mut sink), Filtered::Passthrough);
        assert_eq!(r.state, ResolverState::Idle);
    }

    #[test]
    fn settling_state_forwards_everything() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        r.state = ResolverState::Settling;
        assert_eq!(
            r.filter(&press(P_A, MT_A, 100), &mut sink),
            Filtered::Passthrough
        );
        assert_eq!(r.state, ResolverState::Settling);
        assert!(r.pending.is_none());
        assert!(sink.emitted.is_empty());
    }

    #[test]
    fn unrelated_release_leaves_pending_undisturbed() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        assert_eq!(
            r.filter(&press(P_A, MT_A, 100), &mut sink),
            Filtered::Suppress
        );
        // A release (e.g. of a key pressed before A) is not a chord signal.
        assert_eq!(
            r.filter(&release(P_J, Keycode::J, 120), &mut sink),
            Filtered::Passthrough
        );
        assert_eq!(r.state, ResolverState::Unsettled);
        assert!(!r.pending_chorded());

        r.on_tick(1100, &mut sink);
        assert_eq!(sink.emitted, vec![press(P_A, MT_A, 100)]);
    }

    #[test]
    fn deadline_expiry_works_across_wrap() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        // 65000 + 1000 wraps to 464.
        let down = press(P_A, MT_A, 65000);
        assert_eq!(r.filter(&down, &mut sink), Filtered::Suppress);

        r.on_tick(65500, &mut sink);
        assert_eq!(r.state, ResolverState::Unsettled);
        r.on_tick(400, &mut sink);
        assert_eq!(r.state, ResolverState::Unsettled);
        r.on_tick(464, &mut sink);
        assert_eq!(r.state, ResolverState::Idle);
        assert_eq!(sink.emitted, vec![down]);
    }

    #[test]
    fn eager_mods_applied_then_reverted_on_tap() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        r.filter(&press(P_A, MT_A, 100), &mut sink);
        assert_eq!(sink.applied, vec![Mods::CTL]);
        assert!(sink.reverted.is_empty());

        r.filter(&release(P_A, MT_A, 150), &mut sink);
        assert_eq!(sink.reverted, vec![Mods::CTL]);
    }

    #[test]
    fn eager_mods_reverted_before_hold_replay() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        r.filter(&press(P_A, MT_A, 100), &mut sink);
        r.on_tick(1100, &mut sink);

        // The revert precedes the hold emit; the replayed press is what
        // makes the modifier durable in the host.
        assert_eq!(sink.applied, vec![Mods::CTL]);
        assert_eq!(sink.reverted, vec![Mods::CTL]);
        assert_eq!(sink.emitted, vec![press(P_A, MT_A, 100)]);
    }

    #[test]
    fn alt_mod_tap_is_not_eager() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        r.filter(&press(P_S, MT_S, 100), &mut sink);
        assert!(sink.applied.is_empty());

        r.filter(&release(P_S, MT_S, 130), &mut sink);
        assert!(sink.reverted.is_empty());
        assert_eq!(sink.emitted.len(), 2);
    }

    #[test]
    fn layer_tap_has_no_eager_mods() {
        let mut r = Resolver::new(&POLICY);
        let mut sink = Recording::default();

        let lt = Keycode::layer_tap(1, Keycode::TAB);
        r.filter(&press(P_A, lt, 100), &mut sink);
        assert!(sink.applied.is_empty());
        assert_eq!(r.state, ResolverState::Unsettled);
    }
}
