//! Kaleido CLI
//!
//! Headless shell around the visualizer core:
//! - `check` probes the environment and prints the capability report
//! - `config` inspects and edits the persisted configuration
//! - `run` mounts a full session and draws a terminal level meter

mod shell;

use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kaleido_core::{check_environment, ConfigStore, HostBundle, VizContext};
use kaleido_host::{
    FileStorage, ManualScheduler, MemoryStorage, NativeMedia, NativeProbe, Scheduler,
    StorageProvider,
};

#[derive(Parser)]
#[command(name = "kaleido", version, about = "Audio-reactive visualizer, headless shell")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe the environment and report compatibility
    Check {
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or modify the persisted configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run the visualizer for a fixed number of frames
    Run {
        /// Frames to run before exiting
        #[arg(long, default_value_t = 300)]
        frames: u64,
        /// Seed for reproducible preset picks
        #[arg(long)]
        seed: Option<u64>,
        /// Preset to load instead of the configured one
        #[arg(long)]
        preset: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Restore the default configuration
    Reset,
    /// Write the configuration to a file, or stdout when omitted
    Export { path: Option<PathBuf> },
    /// Merge a configuration document from a file
    Import { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check { json } => cmd_check(json),
        Command::Config { action } => cmd_config(action),
        Command::Run {
            frames,
            seed,
            preset,
        } => cmd_run(frames, seed, preset),
    }
}

/// File storage when a config directory exists, memory otherwise
fn open_storage() -> Box<dyn StorageProvider> {
    match FileStorage::new() {
        Ok(storage) => Box::new(storage),
        Err(err) => {
            warn!("config directory unavailable, changes will not persist: {err}");
            Box::new(MemoryStorage::new())
        }
    }
}

fn cmd_check(json: bool) -> anyhow::Result<()> {
    let report = check_environment(&NativeProbe);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "compatible: {}   score: {}/100 ({:?} tier)",
        report.compatible, report.score, report.tier
    );
    for error in &report.errors {
        println!("  error:   {error}");
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    for advice in &report.recommendations {
        println!("  advice:  {advice}");
    }
    Ok(())
}

fn cmd_config(action: ConfigAction) -> anyhow::Result<()> {
    let mut store = ConfigStore::load(open_storage());
    match action {
        ConfigAction::Show => println!("{}", store.export_snapshot()?),
        ConfigAction::Reset => {
            store.reset_to_defaults();
            println!("configuration reset to defaults");
        }
        ConfigAction::Export { path } => {
            let document = store.export_snapshot()?;
            match path {
                Some(path) => {
                    fs::write(&path, document)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("configuration exported to {}", path.display());
                }
                None => println!("{document}"),
            }
        }
        ConfigAction::Import { path } => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            store.import_snapshot(&raw)?;
            println!("configuration imported from {}", path.display());
        }
    }
    Ok(())
}

fn cmd_run(frames: u64, seed: Option<u64>, preset: Option<String>) -> anyhow::Result<()> {
    let paint_ms = 1000.0 / 60.0;
    let scheduler = Rc::new(ManualScheduler::with_paint_interval(paint_ms));

    let context = VizContext::new(HostBundle {
        probe: Rc::new(NativeProbe),
        storage: open_storage(),
        media: Rc::new(NativeMedia),
        renderer_factory: Rc::new(shell::MeterFactory),
        catalog: Rc::new(shell::DemoCatalog),
        scheduler: Rc::clone(&scheduler) as Rc<dyn Scheduler>,
        surface: Rc::new(shell::TermSurface::new(80, 24)),
    });

    if let Some(seed) = seed {
        context.engine().seed_rng(seed);
    }
    context.mount()?;
    if let Some(preset) = preset {
        context.request_preset(&preset)?;
    }
    info!(
        source = context.audio_source().unwrap_or("none"),
        frames, "session mounted"
    );

    // Drive the virtual clock at the paint cadence in real time
    let step = Duration::from_micros((paint_ms * 1000.0) as u64);
    for _ in 0..frames {
        scheduler.advance(paint_ms);
        thread::sleep(step);
    }

    if let Some(sample) = context.engine().latest_sample() {
        info!(
            fps = sample.fps,
            frame_time_ms = sample.frame_time_ms,
            "final sample"
        );
    }
    for recommendation in context.performance_recommendations() {
        warn!("{recommendation}");
    }
    context.dispose();
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from(["kaleido", "run", "--frames", "10", "--seed", "7"]).unwrap();
        match cli.command {
            Command::Run { frames, seed, .. } => {
                assert_eq!(frames, 10);
                assert_eq!(seed, Some(7));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_config_subcommands_parse() {
        assert!(Cli::try_parse_from(["kaleido", "config", "show"]).is_ok());
        assert!(Cli::try_parse_from(["kaleido", "config", "import"]).is_err());
    }
}
