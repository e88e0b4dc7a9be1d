//! Binary entrypoint for winpin.
//!
//! Thin presentation layer over the core crates: every subcommand maps
//! onto the enumerator, the store, or the reconciler. The default
//! subcommand runs the reconciliation service until interrupted.

use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use store::{PositionStore, SavedPosition, ident};
use tokio_util::sync::CancellationToken;
use tracing::info;
use winpin_engine::{EngineCfg, Reconciler};
use winops::WindowSnapshot;

/// Default seconds between periodic reconciliation passes.
const DEFAULT_TICK_SECS: u64 = 5;
/// Default startup grace delay in seconds before the first pass.
const DEFAULT_GRACE_SECS: u64 = 2;

#[derive(Parser, Debug)]
#[command(name = "winpin", about = "Keeps windows where you put them", version)]
/// Command-line interface for the `winpin` binary.
struct Cli {
    /// Optional subcommand; the default is `run`.
    #[command(subcommand)]
    command: Option<Command>,

    /// Logging controls
    #[command(flatten)]
    log: logging::LogArgs,

    /// Override the storage directory (default: the per-user config dir)
    #[arg(long, value_name = "PATH")]
    store_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
/// Top-level CLI subcommands.
enum Command {
    /// Run the reconciliation service until interrupted
    Run {
        /// Seconds between periodic passes
        #[arg(long, default_value_t = DEFAULT_TICK_SECS)]
        tick: u64,

        /// Startup grace delay in seconds before the first pass
        #[arg(long, default_value_t = DEFAULT_GRACE_SECS)]
        grace: u64,
    },

    /// List the currently visible windows and their identity keys
    List,

    /// Print all saved positions
    Saved,

    /// Save the current geometry of every window whose title contains PATTERN
    Save {
        /// Case-insensitive title substring
        pattern: String,
    },

    /// Run one reconciliation pass now and report the result
    Apply,

    /// Bring the first window whose title contains PATTERN to the front
    Focus {
        /// Case-insensitive title substring
        pattern: String,
    },

    /// Delete one saved position by its identity key
    Delete {
        /// Identity key exactly as printed by `saved`
        key: String,
    },
}

fn open_store(dir: Option<&PathBuf>) -> store::Result<PositionStore> {
    match dir {
        Some(dir) => PositionStore::open_in(dir),
        None => PositionStore::open(),
    }
}

fn snapshot_key(win: &WindowSnapshot) -> String {
    ident::window_key(
        &win.title,
        &win.class_name,
        &win.executable,
        win.style,
        win.ex_style,
    )
}

/// Windows whose title contains `pattern`, case-insensitively.
fn matching<'a>(windows: &'a [WindowSnapshot], pattern: &str) -> Vec<&'a WindowSnapshot> {
    let needle = pattern.to_lowercase();
    windows
        .iter()
        .filter(|w| w.title.to_lowercase().contains(&needle))
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("winpin: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let ops = winops::native();
    let positions = Arc::new(open_store(cli.store_dir.as_ref())?);

    let command = cli.command.unwrap_or(Command::Run {
        tick: DEFAULT_TICK_SECS,
        grace: DEFAULT_GRACE_SECS,
    });

    match command {
        Command::Run { tick, grace } => {
            let cfg = EngineCfg {
                tick: Duration::from_secs(tick.max(1)),
                grace: Duration::from_secs(grace),
            };
            let engine = Arc::new(Reconciler::new(ops, positions, cfg));
            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, stopping");
                    signal_cancel.cancel();
                }
            });
            engine.run(cancel).await;
        }
        Command::List => {
            let windows = winops::enumerate_windows(ops.as_ref())?;
            for win in &windows {
                println!(
                    "{:>6},{:<6} {:>5}x{:<5} pid {:<6} {}",
                    win.window_rect.x,
                    win.window_rect.y,
                    win.window_rect.w,
                    win.window_rect.h,
                    win.pid,
                    snapshot_key(win),
                );
            }
            println!("{} windows", windows.len());
        }
        Command::Saved => {
            let all = positions.list()?;
            for (key, pos) in &all {
                println!(
                    "{:>6},{:<6} {:>5}x{:<5} {}",
                    pos.x, pos.y, pos.width, pos.height, key
                );
            }
            println!("{} saved positions ({})", all.len(), positions.path().display());
        }
        Command::Save { pattern } => {
            let windows = winops::enumerate_windows(ops.as_ref())?;
            let matches = matching(&windows, &pattern);
            if matches.is_empty() {
                return Err(format!("no visible window title contains {pattern:?}").into());
            }
            for win in matches {
                let key = snapshot_key(win);
                positions.save(
                    &key,
                    SavedPosition {
                        x: win.window_rect.x,
                        y: win.window_rect.y,
                        width: win.window_rect.w,
                        height: win.window_rect.h,
                    },
                )?;
                println!("saved {key}");
            }
        }
        Command::Apply => {
            let engine = Arc::new(Reconciler::new(ops, positions, EngineCfg::default()));
            let report = engine.reconcile_now().await;
            println!(
                "matched {}, applied {}, failed {}",
                report.matched, report.applied, report.failed
            );
        }
        Command::Focus { pattern } => {
            let windows = winops::enumerate_windows(ops.as_ref())?;
            let matches = matching(&windows, &pattern);
            let Some(win) = matches.first() else {
                return Err(format!("no visible window title contains {pattern:?}").into());
            };
            winops::raise_window(ops.as_ref(), win.handle)?;
            println!("focused {}", win.title);
        }
        Command::Delete { key } => {
            positions.delete(&key)?;
            println!("deleted {key}");
        }
    }
    Ok(())
}
