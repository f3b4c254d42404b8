//! Viewmeasure replay shell
//!
//! Drives a measurement session from a JSON script of viewer, keyboard and
//! panel steps, persisting to disk and writing CSV exports.

mod replay;
mod script;
mod shortcuts;
mod ui;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches, Parser};
use viewmeasure_core::export::CSV_FILE_NAME;
use viewmeasure_core::storage::{FileStorage, create_default_storage};
use viewmeasure_core::{MemoryStorage, Storage};

pub use replay::{Replay, ReplayError};
pub use script::{Script, Step};
pub use shortcuts::{Shortcut, ShortcutRegistry};
pub use ui::{apply_panel_action, panel_view};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "viewmeasure")]
#[command(about = "Replay measurement scripts against a viewer session")]
pub struct Cli {
    /// Replay script (JSON).
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,
    /// Directory for persisted measurements; defaults to the user data dir.
    #[arg(long, value_name = "DIR", conflicts_with = "memory")]
    store: Option<PathBuf>,
    /// Keep measurements in memory only.
    #[arg(long)]
    memory: bool,
    /// Where CSV exports are written.
    #[arg(long, value_name = "FILE", default_value = CSV_FILE_NAME)]
    out: PathBuf,
}

/// Parse arguments and replay the script.
pub fn run<I, T>(args: I) -> Result<(), ReplayError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = Cli::command()
        .after_help(ShortcutRegistry::help_text())
        .get_matches_from(args);
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let json = std::fs::read_to_string(&cli.script).map_err(|source| ReplayError::Read {
        path: cli.script.clone(),
        source,
    })?;
    let script = Script::from_json(&json)?;

    if cli.memory {
        return replay_with(&script, Arc::new(MemoryStorage::new()), &cli.out);
    }
    let storage = match &cli.store {
        Some(dir) => Arc::new(FileStorage::new(dir.clone())?),
        None => create_default_storage()?,
    };
    log::info!("Storing measurements in {}", storage.base_path().display());
    replay_with(&script, storage, &cli.out)
}

fn replay_with<S: Storage>(script: &Script, storage: Arc<S>, out: &Path) -> Result<(), ReplayError> {
    let mut replay = Replay::start(script, storage)?.with_output(out);
    replay.run(script)?;

    let session = replay.session();
    for measurement in session.measurements() {
        println!("{}\t{}", measurement.name, measurement.label());
    }
    if session.persistence_degraded() {
        let stats = session.write_stats();
        eprintln!(
            "warning: {} of {} writes failed; some measurements were not saved",
            stats.failed,
            stats.applied + stats.failed
        );
    }
    Ok(())
}
