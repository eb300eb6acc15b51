//! Keymap configuration text format.
//!
//! One directive per line, `#` starts a comment:
//!
//! ```text
//! matrix 4 12          # rows cols
//! split rows 2         # left hand is rows 0..2; also: split cols N
//! timeout 1000         # default hold timeout in ticks
//! key 1 0 mt(lctl,a)   # row col keycode
//! key 2 7 j
//! timeout-for 1 0 200  # per-key override, in ticks; 0 disables deferral
//! ```
//!
//! `matrix` must precede `key` lines. `timeout-for` must reference a
//! position that holds a dual-role key.

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use chordal_resolver::event::Pos;
use chordal_resolver::handedness::HandPartition;
use chordal_resolver::keycode::{Keycode, Mods};
use chordal_resolver::policy::{ChordPolicy, Settle, DEFAULT_HOLD_TIMEOUT};
use chordal_resolver::ticks::Ticks;
use chordal_resolver::Transition;

static KEY_NAMES: Lazy<FxHashMap<&'static str, Keycode>> = Lazy::new(|| {
    [
        ("a", Keycode::A),
        ("b", Keycode::B),
        ("c", Keycode::C),
        ("d", Keycode::D),
        ("e", Keycode::E),
        ("f", Keycode::F),
        ("g", Keycode::G),
        ("h", Keycode::H),
        ("i", Keycode::I),
        ("j", Keycode::J),
        ("k", Keycode::K),
        ("l", Keycode::L),
        ("m", Keycode::M),
        ("n", Keycode::N),
        ("o", Keycode::O),
        ("p", Keycode::P),
        ("q", Keycode::Q),
        ("r", Keycode::R),
        ("s", Keycode::S),
        ("t", Keycode::T),
        ("u", Keycode::U),
        ("v", Keycode::V),
        ("w", Keycode::W),
        ("x", Keycode::X),
        ("y", Keycode::Y),
        ("z", Keycode::Z),
        ("1", Keycode::KB1),
        ("2", Keycode::KB2),
        ("3", Keycode::KB3),
        ("4", Keycode::KB4),
        ("5", Keycode::KB5),
        ("6", Keycode::KB6),
        ("7", Keycode::KB7),
        ("8", Keycode::KB8),
        ("9", Keycode::KB9),
        ("0", Keycode::KB0),
        ("enter", Keycode::ENTER),
        ("esc", Keycode::ESCAPE),
        ("bspc", Keycode::BSPACE),
        ("tab", Keycode::TAB),
        ("space", Keycode::SPACE),
        ("mins", Keycode::MINUS),
        ("eql", Keycode::EQUAL),
        ("scln", Keycode::SCOLON),
        ("quot", Keycode::QUOTE),
        ("comm", Keycode::COMMA),
        ("dot", Keycode::DOT),
        ("slsh", Keycode::SLASH),
    ]
    .into_iter()
    .collect()
});

static MOD_NAMES: Lazy<FxHashMap<&'static str, Mods>> = Lazy::new(|| {
    [
        ("lctl", Mods::CTL),
        ("lsft", Mods::SFT),
        ("lalt", Mods::ALT),
        ("lgui", Mods::GUI),
        ("rctl", Mods(Mods::CTL.0 | Mods::RIGHT_HAND.0)),
        ("rsft", Mods(Mods::SFT.0 | Mods::RIGHT_HAND.0)),
        ("ralt", Mods(Mods::ALT.0 | Mods::RIGHT_HAND.0)),
        ("rgui", Mods(Mods::GUI.0 | Mods::RIGHT_HAND.0)),
    ]
    .into_iter()
    .collect()
});

fn parse_plain(s: &str) -> Result<Keycode> {
    let s = s.trim();
    KEY_NAMES
        .get(s)
        .copied()
        .ok_or_else(|| anyhow!("unknown key name: {s}"))
}

fn parse_mods(s: &str) -> Result<Mods> {
    let mut acc = Mods::NONE;
    let mut side: Option<bool> = None;
    for part in s.split('+') {
        let part = part.trim();
        let &m = MOD_NAMES
            .get(part)
            .ok_or_else(|| anyhow!("unknown modifier: {part}"))?;
        let right = m.contains(Mods::RIGHT_HAND);
        if let Some(prev) = side {
            if prev != right {
                // One side bit covers the whole mask, same as the encoding.
                bail!("cannot mix left- and right-hand modifiers: {s}");
            }
        }
        side = Some(right);
        acc = acc | m;
    }
    if acc.is_empty() {
        bail!("empty modifier list");
    }
    Ok(acc)
}

/// Parses `mt(mods,key)`, `lt(layer,key)` or a plain key name.
pub fn parse_keycode(s: &str) -> Result<Keycode> {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix("mt(").and_then(|r| r.strip_suffix(')')) {
        let (mods, base) = inner
            .split_once(',')
            .ok_or_else(|| anyhow!("expected mt(mods,key): {s}"))?;
        return Ok(Keycode::mod_tap(parse_mods(mods)?, parse_plain(base)?));
    }
    if let Some(inner) = s.strip_prefix("lt(").and_then(|r| r.strip_suffix(')')) {
        let (layer, base) = inner
            .split_once(',')
            .ok_or_else(|| anyhow!("expected lt(layer,key): {s}"))?;
        let layer: u8 = layer
            .trim()
            .parse()
            .with_context(|| format!("invalid layer index in {s}"))?;
        if layer > 15 {
            bail!("layer index out of range (max 15): {layer}");
        }
        return Ok(Keycode::layer_tap(layer, parse_plain(base)?));
    }
    parse_plain(s)
}

/// A parsed keymap: matrix geometry, hand partition, per-position keycodes
/// and timeout overrides.
#[derive(Debug, Clone)]
pub struct Keymap {
    pub rows: u8,
    pub cols: u8,
    pub partition: HandPartition,
    pub default_timeout: Ticks,
    keys: FxHashMap<Pos, Keycode>,
    timeout_overrides: FxHashMap<Keycode, Ticks>,
}

impl Keymap {
    pub fn parse(text: &str) -> Result<Keymap> {
        let mut geometry: Option<(u8, u8)> = None;
        let mut partition: Option<HandPartition> = None;
        let mut default_timeout = DEFAULT_HOLD_TIMEOUT;
        let mut keys: FxHashMap<Pos, Keycode> = FxHashMap::default();
        let mut overrides: Vec<(Pos, Ticks, usize)> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut words = line.split_whitespace();
            let Some(directive) = words.next() else {
                continue;
            };
            let rest: Vec<&str> = words.collect();
            match directive {
                "matrix" => {
                    let [rows, cols] = rest[..] else {
                        bail!("line {lineno}: expected 'matrix ROWS COLS'");
                    };
                    let rows: u8 = rows
                        .parse()
                        .with_context(|| format!("line {lineno}: invalid row count"))?;
                    let cols: u8 = cols
                        .parse()
                        .with_context(|| format!("line {lineno}: invalid column count"))?;
                    if rows == 0 || cols == 0 {
                        bail!("line {lineno}: matrix dimensions must be nonzero");
                    }
                    geometry = Some((rows, cols));
                }
                "split" => {
                    let [axis, boundary] = rest[..] else {
                        bail!("line {lineno}: expected 'split rows|cols BOUNDARY'");
                    };
                    let boundary: u8 = boundary
                        .parse()
                        .with_context(|| format!("line {lineno}: invalid boundary"))?;
                    let (rows, cols) = geometry
                        .ok_or_else(|| anyhow!("line {lineno}: 'matrix' must precede 'split'"))?;
                    partition = Some(match axis {
                        "rows" => {
                            if boundary == 0 || boundary >= rows {
                                bail!("line {lineno}: split boundary {boundary} outside 1..{rows}");
                            }
                            HandPartition::row_split(boundary)
                        }
                        "cols" => {
                            if boundary == 0 || boundary >= cols {
                                bail!("line {lineno}: split boundary {boundary} outside 1..{cols}");
                            }
                            HandPartition::col_split(boundary)
                        }
                        other => bail!("line {lineno}: unknown split axis '{other}'"),
                    });
                }
                "timeout" => {
                    let [ticks] = rest[..] else {
                        bail!("line {lineno}: expected 'timeout TICKS'");
                    };
                    default_timeout = ticks
                        .parse()
                        .with_context(|| format!("line {lineno}: invalid timeout"))?;
                }
                "key" => {
                    let (rows, cols) = geometry
                        .ok_or_else(|| anyhow!("line {lineno}: 'matrix' must precede 'key'"))?;
                    if rest.len() < 3 {
                        bail!("line {lineno}: expected 'key ROW COL KEYCODE'");
                    }
                    let pos = parse_pos(rest[0], rest[1])
                        .with_context(|| format!("line {lineno}: invalid position"))?;
                    if pos.row >= rows || pos.col >= cols {
                        bail!(
                            "line {lineno}: position ({},{}) outside {rows}x{cols} matrix",
                            pos.row,
                            pos.col
                        );
                    }
                    // Keycode expressions may contain spaces after commas.
                    let expr: String = rest[2..].concat();
                    let keycode = parse_keycode(&expr)
                        .with_context(|| format!("line {lineno}: invalid keycode"))?;
                    if keys.insert(pos, keycode).is_some() {
                        bail!(
                            "line {lineno}: position ({},{}) assigned twice",
                            pos.row,
                            pos.col
                        );
                    }
                }
                "timeout-for" => {
                    let [row, col, ticks] = rest[..] else {
                        bail!("line {lineno}: expected 'timeout-for ROW COL TICKS'");
                    };
                    let pos = parse_pos(row, col)
                        .with_context(|| format!("line {lineno}: invalid position"))?;
                    let ticks: Ticks = ticks
                        .parse()
                        .with_context(|| format!("line {lineno}: invalid timeout"))?;
                    overrides.push((pos, ticks, lineno));
                }
                other => bail!("line {lineno}: unknown directive '{other}'"),
            }
        }

        let (rows, cols) = geometry.ok_or_else(|| anyhow!("missing 'matrix' directive"))?;
        let partition = partition.unwrap_or(HandPartition::row_split(rows / 2));

        let mut timeout_overrides: FxHashMap<Keycode, Ticks> = FxHashMap::default();
        for (pos, ticks, lineno) in overrides {
            let keycode = keys.get(&pos).copied().ok_or_else(|| {
                anyhow!(
                    "line {lineno}: timeout-for ({},{}) has no key assigned",
                    pos.row,
                    pos.col
                )
            })?;
            if keycode.dual_role().is_none() {
                bail!(
                    "line {lineno}: timeout-for ({},{}) targets the plain key '{keycode}'",
                    pos.row,
                    pos.col
                );
            }
            timeout_overrides.insert(keycode, ticks);
        }

        Ok(Keymap {
            rows,
            cols,
            partition,
            default_timeout,
            keys,
            timeout_overrides,
        })
    }

    pub fn keycode_at(&self, pos: Pos) -> Option<Keycode> {
        self.keys.get(&pos).copied()
    }

    pub fn mapped_keys(&self) -> usize {
        self.keys.len()
    }

    /// Builds the settlement policy this keymap describes.
    pub fn policy(&self) -> KeymapPolicy {
        KeymapPolicy {
            partition: self.partition,
            default_timeout: self.default_timeout,
            overrides: self.timeout_overrides.clone(),
        }
    }
}

fn parse_pos(row: &str, col: &str) -> Result<Pos> {
    Ok(Pos::new(row.parse()?, col.parse()?))
}

/// Opposite-hands classification over the configured partition, with
/// per-key timeout overrides from the keymap.
#[derive(Debug, Clone)]
pub struct KeymapPolicy {
    partition: HandPartition,
    default_timeout: Ticks,
    overrides: FxHashMap<Keycode, Ticks>,
}

impl ChordPolicy for KeymapPolicy {
    fn classify(&self, pending: &Transition, other: &Transition) -> Settle {
        if self.partition.opposite_hands(pending.pos, other.pos) {
            Settle::Hold
        } else {
            Settle::Tap
        }
    }

    fn timeout_for(&self, key: Keycode) -> Ticks {
        self.overrides
            .get(&key)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}
