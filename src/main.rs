use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use simplelog::*;

use std::path::PathBuf;

use chordal::cfg::Keymap;
use chordal::{default_cfg, default_sim, sim};

#[derive(Parser, Debug)]
#[command(author, version, verbatim_doc_comment)]
/// chordal: a tap/hold resolution checker for dual-role keymaps
///
/// chordal reads a keymap description and a script of timed key events,
/// resolves every dual-role press the way the embedded engine would, and
/// prints the stream of events the host pipeline receives. Use it to check
/// that home-row modifier layouts settle taps, holds and chords the way you
/// expect before flashing them.
struct Args {
    /// Keymap configuration file. If not specified, defaults to chordal.cfg
    /// in the current working directory and
    /// '$XDG_CONFIG_HOME/chordal/chordal.cfg'
    #[arg(short, long, verbatim_doc_comment)]
    cfg: Option<PathBuf>,

    /// Simulation script. If not specified, defaults to testing/sim.txt in
    /// the current working directory and '$XDG_CONFIG_HOME/chordal/sim.txt'
    #[arg(short, long, verbatim_doc_comment)]
    sim: Option<PathBuf>,
}

fn log_init() {
    let mut log_cfg = ConfigBuilder::new();
    if let Err(e) = log_cfg.set_time_offset_to_local() {
        eprintln!("WARNING: could not set log TZ to local: {e:?}");
    };
    log_cfg.set_time_format_rfc3339();
    CombinedLogger::init(vec![TermLogger::new(
        LevelFilter::Debug,
        log_cfg.build(),
        TerminalMode::Mixed,
        ColorChoice::AlwaysAnsi,
    )])
    .expect("logger can init");
}

fn cli_init() -> Result<(PathBuf, PathBuf)> {
    let args = Args::parse();
    let cfg_path = args
        .cfg
        .or_else(|| default_cfg().into_iter().next())
        .filter(|p| p.exists());
    let sim_path = args
        .sim
        .or_else(|| default_sim().into_iter().next())
        .filter(|p| p.exists());

    let Some(cfg_path) = cfg_path else {
        bail!("Could not find a keymap config\nFor more info, pass the `-h` or `--help` flags.");
    };
    let Some(sim_path) = sim_path else {
        bail!("Could not find a simulation script\nFor more info, pass the `-h` or `--help` flags.");
    };
    Ok((cfg_path, sim_path))
}

fn main_impl() -> Result<()> {
    log_init();
    let (cfg_path, sim_path) = cli_init()?;
    info!("chordal v{} starting", env!("CARGO_PKG_VERSION"));

    let keymap = Keymap::parse(&std::fs::read_to_string(&cfg_path)?)
        .with_context(|| format!("parsing {}", cfg_path.display()))?;
    info!(
        "keymap: {}x{} matrix, {} keys mapped, default timeout {} ticks",
        keymap.rows,
        keymap.cols,
        keymap.mapped_keys(),
        keymap.default_timeout
    );

    let script = std::fs::read_to_string(&sim_path)
        .with_context(|| format!("reading {}", sim_path.display()))?;
    let out = sim::run(&keymap, &script)?;
    info!("simulation produced {} events", out.lines().count());
    Ok(())
}

fn main() -> Result<()> {
    let ret = main_impl();
    if let Err(ref e) = ret {
        log::error!("main got error {e:?}");
    }
    ret
}
