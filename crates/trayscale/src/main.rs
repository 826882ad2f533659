//! `trayscale`: terminal front-end for the local Tailscale daemon.
//!
//! A background poller publishes daemon snapshots; a forwarder task hands
//! each one to the UI thread, which reconciles the peer pages, the status
//! switch and the tray mirror. Commands run on worker tasks and post their
//! results back the same way.
//!
//! Logs are written to a file (default `<cache dir>/trayscale.log`) so they
//! never corrupt the terminal.

mod action;
mod app;
mod desktop;
mod event;
mod screens;
mod stack;
mod theme;
mod tui;
mod widgets;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use directories::{BaseDirs, ProjectDirs, UserDirs};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use trayscale_config::{load_settings_from, settings_path};
use trayscale_core::state::{UiHandle, ui_channel};
use trayscale_core::tray::TrayFactory;
use trayscale_core::{
    Daemon, Dispatcher, Interaction, LocalDaemon, Poller, SnapshotStream, TrayBackend,
};

use crate::app::{App, AppContext, RENDER_RATE, TICK_RATE};
use crate::event::Events;
use crate::desktop::{TerminalTray, TrayMirror, WindowInteraction};

/// Terminal front-end for Tailscale with a tray menu and notifications.
#[derive(Parser, Debug)]
#[command(name = "trayscale", version, about)]
struct Cli {
    /// Start hidden in the tray instead of opening the window
    #[arg(long)]
    hide_window: bool,

    /// Log file path (defaults to trayscale.log in the cache directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "deedles", "Trayscale").map(|d| d.cache_dir().to_path_buf())
}

fn downloads_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|u| u.download_dir().map(Path::to_path_buf))
        .or_else(|| BaseDirs::new().map(|b| b.home_dir().to_path_buf()))
        .unwrap_or_else(std::env::temp_dir)
}

/// Set up file-based tracing. Nothing may log to stdout/stderr while the
/// terminal is in raw mode. The returned guard flushes on drop.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "trayscale={log_level},trayscale_core={log_level},trayscale_config={log_level}"
        ))
    });

    let log_file = cli.log_file.clone().unwrap_or_else(|| {
        cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("trayscale.log")
    });
    let log_dir = log_file
        .parent()
        .map_or_else(std::env::temp_dir, Path::to_path_buf);
    let log_filename = log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("trayscale.log"));
    let _ = std::fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::never(&log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

/// Cancel the root token on Ctrl-C.
fn spawn_signal_handler(root: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            () = root.cancelled() => {}
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("interrupt received, shutting down");
                    root.cancel();
                }
                Err(e) => warn!(error = %e, "cannot listen for interrupts"),
            },
        }
    });
}

/// Hand every published snapshot to the UI thread.
///
/// The poller's initial placeholder snapshot is not forwarded; the window
/// starts from it anyway and the first real poll follows immediately.
fn forward_snapshots(mut snapshots: SnapshotStream, ui: UiHandle<App>, root: CancellationToken) {
    tokio::spawn(async move {
        loop {
            let snapshot = tokio::select! {
                () = root.cancelled() => break,
                next = snapshots.changed() => match next {
                    Some(snapshot) => snapshot,
                    None => break,
                },
            };
            if !ui.post(move |app| app.on_snapshot(snapshot)) {
                break;
            }
        }
        debug!("snapshot forwarder stopped");
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Hooks go in before the terminal enters raw mode.
    tui::install_hooks()?;

    let _log_guard = setup_tracing(&cli);

    let settings_path = settings_path();
    let settings = load_settings_from(&settings_path)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        settings = %settings_path.display(),
        hide_window = cli.hide_window,
        "starting trayscale"
    );

    let daemon: Arc<dyn Daemon> = Arc::new(LocalDaemon::new(&settings.daemon_config()?)?);
    let root = CancellationToken::new();
    spawn_signal_handler(root.clone());

    let poller = Poller::spawn(Arc::clone(&daemon), settings.polling_interval(), root.clone());
    let (ui, queue) = ui_channel::<App>();
    forward_snapshots(poller.handle().watch(), ui.clone(), root.clone());

    let interaction: Arc<dyn Interaction> = Arc::new(WindowInteraction::new(ui.clone()));
    let dispatcher = Dispatcher::new(daemon, poller.handle(), root.clone(), interaction);

    let mirror = TrayMirror::default();
    let tray_factory: TrayFactory = {
        let mirror = mirror.clone();
        let icon_path = cache_dir().map(|d| d.join("tray-icon.png"));
        Box::new(move || -> Box<dyn TrayBackend> {
            Box::new(TerminalTray::new(mirror.clone(), icon_path.clone()))
        })
    };
    let (tray_events, tray_rx) = mpsc::unbounded_channel();

    let app = App::new(AppContext {
        poller: poller.handle(),
        dispatcher,
        ui,
        root: root.clone(),
        settings,
        settings_path,
        tray_factory,
        tray_events,
        mirror,
        downloads: downloads_dir(),
        show_window: !cli.hide_window,
    });
    let events = Events::new(queue, tray_rx, root.clone()).with_terminal(TICK_RATE, RENDER_RATE);
    let result = app.run(events).await;

    root.cancel();
    poller.join().await;
    info!("trayscale stopped");
    result
}
