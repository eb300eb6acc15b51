use std::path::PathBuf;

pub mod cfg;
pub mod sim;


pub fn default_cfg() -> Vec<PathBuf> {
    let mut cfgs = Vec::new();

    let default = PathBuf::from("chordal.cfg");
    if default.is_file() {
        cfgs.push(default);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let fallback = config_dir.join("chordal").join("chordal.cfg");
        if fallback.is_file() {
            cfgs.push(fallback);
        }
    }

    cfgs
}

pub fn default_sim() -> Vec<PathBuf> {
    let mut sims = Vec::new();

    let default = PathBuf::from("testing/sim.txt");
    if default.is_file() {
        sims.push(default);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let fallback = config_dir.join("chordal").join("sim.txt");
        if fallback.is_file() {
            sims.push(fallback);
        }
    }

    sims
}
