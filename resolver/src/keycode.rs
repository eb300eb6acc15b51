//! Keycode packing for plain and dual-role keys.
//!
//! A [`Keycode`] is a bare `u16`. Plain keys carry their HID usage id in the
//! low byte. Dual-role keys pack their hold meaning into the upper bits:
//! `0x2000..=0x3FFF` are modifier-taps (five bits of modifier mask in bits
//! 8..=12) and `0x4000..=0x4FFF` are layer-taps (four bits of layer index in
//! bits 8..=11). Everything else is not the resolver's concern and passes
//! through it untouched.

/// Modifier bitmask. Bits 0..=3 are Ctrl, Shift, Alt and Gui; bit 4 selects
/// the right-hand variants of the whole mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mods(pub u8);

impl Mods {
    pub const NONE: Mods = Mods(0);
    pub const CTL: Mods = Mods(0x01);
    pub const SFT: Mods = Mods(0x02);
    pub const ALT: Mods = Mods(0x04);
    pub const GUI: Mods = Mods(0x08);
    /// Marks the whole mask as the right-hand variants.
    pub const RIGHT_HAND: Mods = Mods(0x10);

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Mods) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when the mask holds nothing besides Ctrl and/or Shift, of either
    /// hand. Those are the modifiers whose early activation is harmless if
    /// the key later turns out to be a tap; Alt and Gui are not (focus
    /// switchers, menu activation).
    pub const fn only_ctrl_shift(self) -> bool {
        let relevant = self.0 & !(Self::RIGHT_HAND.0);
        relevant != 0 && relevant & !(Self::CTL.0 | Self::SFT.0) == 0
    }
}

impl core::ops::BitOr for Mods {
    type Output = Mods;
    fn bitor(self, rhs: Mods) -> Mods {
        Mods(self.0 | rhs.0)
    }
}

impl core::fmt::Display for Mods {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let side = if self.contains(Self::RIGHT_HAND) { 'r' } else { 'l' };
        let mut first = true;
        for (bit, name) in [
            (Self::CTL, "ctl"),
            (Self::SFT, "sft"),
            (Self::ALT, "alt"),
            (Self::GUI, "gui"),
        ] {
            if self.contains(bit) {
                if !first {
                    f.write_str("+")?;
                }
                write!(f, "{side}{name}")?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

const MOD_TAP_BASE: u16 = 0x2000;
const MOD_TAP_MASK: u16 = 0xE000;
const LAYER_TAP_BASE: u16 = 0x4000;
const LAYER_TAP_MASK: u16 = 0xF000;

/// A key's logical code, possibly carrying a dual-role encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Keycode(pub u16);

/// Hold meaning of a dual-role keycode, derived from its encoding and never
/// stored anywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualRole {
    /// Holding applies a modifier mask.
    ModTap(Mods),
    /// Holding activates a layer.
    LayerTap(u8),
}

impl Keycode {
    /// The null sentinel; not a key.
    pub const NONE: Keycode = Keycode(0);

    pub const A: Keycode = Keycode(0x04);
    pub const B: Keycode = Keycode(0x05);
    pub const C: Keycode = Keycode(0x06);
    pub const D: Keycode = Keycode(0x07);
    pub const E: Keycode = Keycode(0x08);
    pub const F: Keycode = Keycode(0x09);
    pub const G: Keycode = Keycode(0x0A);
    pub const H: Keycode = Keycode(0x0B);
    pub const I: Keycode = Keycode(0x0C);
    pub const J: Keycode = Keycode(0x0D);
    pub const K: Keycode = Keycode(0x0E);
    pub const L: Keycode = Keycode(0x0F);
    pub const M: Keycode = Keycode(0x10);
    pub const N: Keycode = Keycode(0x11);
    pub const O: Keycode = Keycode(0x12);
    pub const P: Keycode = Keycode(0x13);
    pub const Q: Keycode = Keycode(0x14);
    pub const R: Keycode = Keycode(0x15);
    pub const S: Keycode = Keycode(0x16);
    pub const T: Keycode = Keycode(0x17);
    pub const U: Keycode = Keycode(0x18);
    pub const V: Keycode = Keycode(0x19);
    pub const W: Keycode = Keycode(0x1A);
    pub const X: Keycode = Keycode(0x1B);
    pub const Y: Keycode = Keycode(0x1C);
    pub const Z: Keycode = Keycode(0x1D);
    pub const KB1: Keycode = Keycode(0x1E);
    pub const KB2: Keycode = Keycode(0x1F);
    pub const KB3: Keycode = Keycode(0x20);
    pub const KB4: Keycode = Keycode(0x21);
    pub const KB5: Keycode = Keycode(0x22);
    pub const KB6: Keycode = Keycode(0x23);
    pub const KB7: Keycode = Keycode(0x24);
    pub const KB8: Keycode = Keycode(0x25);
    pub const KB9: Keycode = Keycode(0x26);
    pub const KB0: Keycode = Keycode(0x27);
    pub const ENTER: Keycode = Keycode(0x28);
    pub const ESCAPE: Keycode = Keycode(0x29);
    pub const BSPACE: Keycode = Keycode(0x2A);
    pub const TAB: Keycode = Keycode(0x2B);
    pub const SPACE: Keycode = Keycode(0x2C);
    pub const MINUS: Keycode = Keycode(0x2D);
    pub const EQUAL: Keycode = Keycode(0x2E);
    pub const SCOLON: Keycode = Keycode(0x33);
    pub const QUOTE: Keycode = Keycode(0x34);
    pub const COMMA: Keycode = Keycode(0x36);
    pub const DOT: Keycode = Keycode(0x37);
    pub const SLASH: Keycode = Keycode(0x38);

    /// Packs a modifier-tap key: `base` when tapped, `mods` when held.
    pub const fn mod_tap(mods: Mods, base: Keycode) -> Keycode {
        Keycode(MOD_TAP_BASE | ((mods.0 as u16 & 0x1F) << 8) | (base.0 & 0xFF))
    }

    /// Packs a layer-tap key: `base` when tapped, layer `layer` when held.
    pub const fn layer_tap(layer: u8, base: Keycode) -> Keycode {
        Keycode(LAYER_TAP_BASE | ((layer as u16 & 0xF) << 8) | (base.0 & 0xFF))
    }

    pub const fn is_mod_tap(self) -> bool {
        self.0 & MOD_TAP_MASK == MOD_TAP_BASE
    }

    pub const fn is_layer_tap(self) -> bool {
        self.0 & LAYER_TAP_MASK == LAYER_TAP_BASE
    }

    /// The tap meaning of a dual-role key, or the key itself when plain.
    pub const fn tap_key(self) -> Keycode {
        if self.is_mod_tap() || self.is_layer_tap() {
            Keycode(self.0 & 0xFF)
        } else {
            self
        }
    }

    /// The hold meaning encoded in this keycode, if it has one.
    pub const fn dual_role(self) -> Option<DualRole> {
        if self.is_mod_tap() {
            Some(DualRole::ModTap(Mods((self.0 >> 8) as u8 & 0x1F)))
        } else if self.is_layer_tap() {
            Some(DualRole::LayerTap((self.0 >> 8) as u8 & 0xF))
        } else {
            None
        }
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
            Self::D => "d",
            Self::E => "e",
            Self::F => "f",
            Self::G => "g",
            Self::H => "h",
            Self::I => "i",
            Self::J => "j",
            Self::K => "k",
            Self::L => "l",
            Self::M => "m",
            Self::N => "n",
            Self::O => "o",
            Self::P => "p",
            Self::Q => "q",
            Self::R => "r",
            Self::S => "s",
            Self::T => "t",
            Self::U => "u",
            Self::V => "v",
            Self::W => "w",
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
            Self::KB1 => "1",
            Self::KB2 => "2",
            Self::KB3 => "3",
            Self::KB4 => "4",
            Self::KB5 => "5",
            Self::KB6 => "6",
            Self::KB7 => "7",
            Self::KB8 => "8",
            Self::KB9 => "9",
            Self::KB0 => "0",
            Self::ENTER => "enter",
            Self::ESCAPE => "esc",
            Self::BSPACE => "bspc",
            Self::TAB => "tab",
            Self::SPACE => "space",
            Self::MINUS => "mins",
            Self::EQUAL => "eql",
            Self::SCOLON => "scln",
            Self::QUOTE => "quot",
            Self::COMMA => "comm",
            Self::DOT => "dot",
            Self::SLASH => "slsh",
            _ => return None,
        })
    }
}

impl core::fmt::Display for Keycode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.dual_role() {
            Some(DualRole::ModTap(mods)) => write!(f, "mt({mods},{})", self.tap_key()),
            Some(DualRole::LayerTap(layer)) => write!(f, "lt({layer},{})", self.tap_key()),
            None => match self.name() {
                Some(name) => f.write_str(name),
                None => write!(f, "0x{:04X}", self.0),
            },
        }
    }
}
