//! I/O for observation files, configuration and analysis sidecars
//!
//! The engine itself never touches the filesystem; these helpers belong to
//! the orchestration side (CLI, batch runner) and to tests.

mod json;

pub use json::{
    read_analysis, read_band_scenes, read_config, read_observations, sidecar_path,
    write_analysis, write_json, write_sidecar,
};
