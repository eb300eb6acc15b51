//! Simulation script driver.
//!
//! Scripts are whitespace-separated `kind:value` items:
//!
//! ```text
//! t:100 d:1,0 t:50 d:2,7 u:2,7 u:1,0
//! ```
//!
//! `d:R,C` presses the key at matrix position (R,C), `u:R,C` releases it and
//! `t:N` advances the virtual clock by N ticks, polling the resolver once per
//! tick the way a firmware scan loop would. Every event the host pipeline
//! receives is logged and collected into the returned output.

use anyhow::{anyhow, bail, Context, Result};

use chordal_resolver::event::{Pos, Transition};
use chordal_resolver::keycode::Mods;
use chordal_resolver::resolver::{EventSink, Filtered, Resolver};
use chordal_resolver::ticks::Ticks;

use crate::cfg::Keymap;

/// The host's normal input pipeline, reduced to an event log.
#[derive(Default)]
struct Pipeline {
    lines: Vec<String>,
}

impl Pipeline {
    fn handle(&mut self, t: Transition) {
        let arrow = if t.pressed { '↓' } else { '↑' };
        // A dual-role record with tap_count 0 reaches the pipeline in its
        // hold sense; tap_count 1 is a resolved tap.
        let sense = match t.keycode.dual_role() {
            Some(_) if t.tap_count == 0 => " hold",
            Some(_) => " tap",
            None => "",
        };
        let interrupted = if t.interrupted { " interrupted" } else { "" };
        let line = format!(
            "out:{arrow}{} ({},{}) t={}{sense}{interrupted}",
            t.keycode, t.pos.row, t.pos.col, t.ts
        );
        log::info!("{line}");
        self.lines.push(line);
    }
}

impl EventSink for Pipeline {
    fn emit(&mut self, t: Transition) {
        self.handle(t);
    }

    fn apply_eager_mods(&mut self, mods: Mods) {
        let line = format!("out:eager↓{mods}");
        log::info!("{line}");
        self.lines.push(line);
    }

    fn revert_eager_mods(&mut self, mods: Mods) {
        let line = format!("out:eager↑{mods}");
        log::info!("{line}");
        self.lines.push(line);
    }
}

/// Runs a simulation script against a keymap and returns the pipeline
/// output, one line per event, joined with newlines.
pub fn run(keymap: &Keymap, script: &str) -> Result<String> {
    let policy = keymap.policy();
    let mut resolver = Resolver::new(&policy);
    let mut pipeline = Pipeline::default();
    let mut now: Ticks = 0;

    let items = script
        .lines()
        .flat_map(|l| l.split('#').next().unwrap_or("").split_whitespace());
    for item in items {
        let (kind, val) = item
            .split_once(':')
            .ok_or_else(|| anyhow!("invalid item {item}, expected kind:value"))?;
        match kind {
            "t" | "🕐" => {
                let n: u16 = val
                    .parse()
                    .with_context(|| format!("invalid tick count in {item}"))?;
                for _ in 0..n {
                    now = now.wrapping_add(1);
                    resolver.on_tick(now, &mut pipeline);
                }
            }
            "d" | "↓" | "u" | "↑" => {
                let pos = parse_pos(val)
                    .with_context(|| format!("invalid position in {item}"))?;
                let keycode = keymap.keycode_at(pos).ok_or_else(|| {
                    anyhow!("no key configured at ({},{})", pos.row, pos.col)
                })?;
                let pressed = matches!(kind, "d" | "↓");
                let t = if pressed {
                    Transition::press(pos, keycode, now)
                } else {
                    Transition::release(pos, keycode, now)
                };
                log::debug!(
                    "in:{}{keycode} ({},{}) t={now}",
                    if pressed { '↓' } else { '↑' },
                    pos.row,
                    pos.col
                );
                if resolver.filter(&t, &mut pipeline) == Filtered::Passthrough {
                    pipeline.handle(t);
                }
            }
            _ => bail!("invalid item {item}, kinds are t/d/u"),
        }
    }

    Ok(pipeline.lines.join("\n"))
}

fn parse_pos(val: &str) -> Result<Pos> {
    let (row, col) = val
        .split_once(',')
        .ok_or_else(|| anyhow!("expected row,col"))?;
    Ok(Pos::new(row.parse()?, col.parse()?))
}
