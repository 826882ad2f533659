// ── Tray and notification bridge ──
//
// Follows the snapshot through a few derivations: online-ness drives
// desktop notifications, icon and menu state drive the tray. The tray itself
// runs its own event loop on a dedicated thread and talks to the UI thread
// only through channels.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use strum::Display;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::display::machine_label;
use crate::model::Snapshot;
use crate::state::{Derived, Source, Subscription};

/// Application ID used for the tray item and notification icon.
pub const APP_ID: &str = "dev.deedles.Trayscale";

pub const NOTIFICATION_ID: &str = "tailscale-status";
pub const NOTIFICATION_TITLE: &str = "Tailscale Status";

// ── Tray state ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum TrayIcon {
    Active,
    Inactive,
    /// Online and routing through an exit node.
    ExitNode,
}

impl TrayIcon {
    pub fn for_snapshot(snapshot: &Snapshot) -> Self {
        if !snapshot.online() {
            Self::Inactive
        } else if snapshot.exit_node_active() {
            Self::ExitNode
        } else {
            Self::Active
        }
    }
}

/// Activations the tray sends back to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    Show,
    Connect,
    Disconnect,
    UseExitNode(bool),
    ShowSelf,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MenuState {
    pub online: bool,
    pub exit_node_in_use: bool,
    /// `name (address)` of the local machine, once it has an address.
    pub machine: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    Separator,
    Entry {
        label: String,
        enabled: bool,
        event: TrayEvent,
    },
}

impl MenuState {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let online = snapshot.online();
        let machine = snapshot
            .self_peer
            .as_ref()
            .filter(|_| online)
            .filter(|p| p.primary_addr().is_some())
            .map(machine_label);
        Self {
            online,
            exit_node_in_use: snapshot.exit_node_active(),
            machine,
        }
    }

    pub fn build_menu(&self) -> Vec<MenuItem> {
        let connected = self.machine.is_some();
        let entry = |label: &str, enabled: bool, event: TrayEvent| MenuItem::Entry {
            label: label.to_owned(),
            enabled,
            event,
        };

        let (conn_label, conn_event) = if self.online {
            ("Disconnect", TrayEvent::Disconnect)
        } else {
            ("Connect", TrayEvent::Connect)
        };
        let exit_label = if self.exit_node_in_use {
            "Disable exit node"
        } else {
            "Enable exit node"
        };
        let machine = format!(
            "This machine: {}",
            self.machine.as_deref().unwrap_or("Not connected")
        );

        vec![
            entry("Show", true, TrayEvent::Show),
            MenuItem::Separator,
            entry(conn_label, true, conn_event),
            entry(
                exit_label,
                connected,
                TrayEvent::UseExitNode(!self.exit_node_in_use),
            ),
            entry(&machine, connected, TrayEvent::ShowSelf),
            MenuItem::Separator,
            entry("Quit", true, TrayEvent::Quit),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayUpdate {
    Icon(TrayIcon),
    Menu(MenuState),
    Shutdown,
}

// ── Tray worker ─────────────────────────────────────────────────────

/// The tray side of the channels, handed to a backend's event loop.
pub struct TrayLink {
    pub updates: std_mpsc::Receiver<TrayUpdate>,
    pub events: mpsc::UnboundedSender<TrayEvent>,
    ready: Option<Box<dyn FnOnce() + Send>>,
}

impl TrayLink {
    /// Signal that the tray is up. Only the first call has an effect.
    pub fn ready(&mut self) {
        if let Some(ready) = self.ready.take() {
            ready();
        }
    }
}

/// A tray implementation with its own event loop.
pub trait TrayBackend: Send + 'static {
    /// Run until [`TrayUpdate::Shutdown`] arrives or the update channel
    /// closes.
    fn run(self: Box<Self>, link: TrayLink);
}

/// A running tray thread.
pub struct TrayWorker {
    updates: std_mpsc::Sender<TrayUpdate>,
    thread: Option<JoinHandle<()>>,
}

impl TrayWorker {
    pub fn start(
        backend: Box<dyn TrayBackend>,
        events: mpsc::UnboundedSender<TrayEvent>,
        on_ready: impl FnOnce() + Send + 'static,
    ) -> io::Result<Self> {
        let (updates, rx) = std_mpsc::channel();
        let link = TrayLink {
            updates: rx,
            events,
            ready: Some(Box::new(on_ready)),
        };
        let thread = thread::Builder::new()
            .name("tray".into())
            .spawn(move || backend.run(link))?;
        Ok(Self {
            updates,
            thread: Some(thread),
        })
    }

    pub fn update(&self, update: TrayUpdate) {
        if self.updates.send(update).is_err() {
            debug!("tray loop already gone");
        }
    }

    /// Ask the tray loop to exit and return at once. The thread is joined
    /// on a short-lived reaper thread so the caller never blocks on the
    /// tray's event loop.
    pub fn stop(mut self) {
        let Some(thread) = self.signal() else {
            return;
        };
        let reaper = thread::Builder::new()
            .name("tray-reaper".into())
            .spawn(move || reap(thread));
        if let Err(e) = reaper {
            warn!(error = %e, "tray thread left detached");
        }
    }

    /// Ask the tray loop to exit and wait for its thread. Only for use once
    /// the UI loop has finished.
    pub fn join(mut self) {
        if let Some(thread) = self.signal() {
            reap(thread);
        }
    }

    fn signal(&mut self) -> Option<JoinHandle<()>> {
        let thread = self.thread.take()?;
        let _ = self.updates.send(TrayUpdate::Shutdown);
        Some(thread)
    }
}

fn reap(thread: JoinHandle<()>) {
    if thread.join().is_err() {
        warn!("tray thread panicked");
    } else {
        info!("tray stopped");
    }
}

impl Drop for TrayWorker {
    fn drop(&mut self) {
        // Detached: the loop sees Shutdown (or the closed channel) and exits.
        let _ = self.signal();
    }
}

// ── Notifications ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: &'static str,
    pub icon: &'static str,
    pub title: &'static str,
    pub body: &'static str,
}

impl Notification {
    pub fn status(online: bool) -> Self {
        Self {
            id: NOTIFICATION_ID,
            icon: APP_ID,
            title: NOTIFICATION_TITLE,
            body: if online {
                "Tailscale is connected."
            } else {
                "Tailscale is not connected."
            },
        }
    }
}

/// Delivers desktop notifications. Called on the UI thread.
pub trait Notifier {
    fn notify(&self, notification: &Notification);
}

// ── Bridge ──────────────────────────────────────────────────────────

pub type TrayFactory = Box<dyn Fn() -> Box<dyn TrayBackend>>;

/// Keeps tray and notifications in step with the snapshot cell, and the
/// tray worker in step with the tray preference.
pub struct TrayBridge {
    online: Derived<Option<bool>>,
    icon: Derived<TrayIcon>,
    menu: Derived<MenuState>,
    worker: Rc<RefCell<Option<TrayWorker>>>,
    _subscriptions: Vec<Subscription>,
}

impl TrayBridge {
    /// `snapshot` is `None` until the first poll completes.
    pub fn new<S, E>(
        snapshot: &S,
        enabled: &E,
        notifier: Rc<dyn Notifier>,
        factory: TrayFactory,
        events: mpsc::UnboundedSender<TrayEvent>,
    ) -> Self
    where
        S: Source<Option<Arc<Snapshot>>>,
        E: Source<bool>,
    {
        let online = Derived::map(snapshot, |s: &Option<Arc<Snapshot>>| {
            s.as_deref().map(Snapshot::online)
        });
        let icon = Derived::map(snapshot, |s: &Option<Arc<Snapshot>>| {
            s.as_deref().map_or(TrayIcon::Inactive, TrayIcon::for_snapshot)
        });
        let menu = Derived::map(snapshot, |s: &Option<Arc<Snapshot>>| {
            s.as_deref().map(MenuState::from_snapshot).unwrap_or_default()
        });
        let worker: Rc<RefCell<Option<TrayWorker>>> = Rc::new(RefCell::new(None));

        let mut subs = Vec::new();

        subs.push(online.listen(move |online| {
            if let Some(online) = *online {
                info!(online, "connection status changed");
                notifier.notify(&Notification::status(online));
            }
        }));

        let w = Rc::clone(&worker);
        subs.push(icon.listen(move |icon| {
            if let Some(worker) = w.borrow().as_ref() {
                worker.update(TrayUpdate::Icon(*icon));
            }
        }));

        let w = Rc::clone(&worker);
        subs.push(menu.listen(move |menu| {
            if let Some(worker) = w.borrow().as_ref() {
                worker.update(TrayUpdate::Menu(menu.clone()));
            }
        }));

        let toggle = {
            let worker = Rc::clone(&worker);
            let (icon, menu) = (icon.clone(), menu.clone());
            move |on: bool| {
                if !on {
                    let stopped = worker.borrow_mut().take();
                    if let Some(stopped) = stopped {
                        stopped.stop();
                    }
                    return;
                }
                if worker.borrow().is_some() {
                    return;
                }
                match TrayWorker::start(factory(), events.clone(), || debug!("tray ready")) {
                    Ok(started) => {
                        info!("tray started");
                        started.update(TrayUpdate::Icon(icon.get()));
                        started.update(TrayUpdate::Menu(menu.get()));
                        *worker.borrow_mut() = Some(started);
                    }
                    Err(e) => warn!(error = %e, "failed to start tray"),
                }
            }
        };
        toggle(enabled.get());
        subs.push(enabled.listen(move |on| toggle(*on)));

        Self {
            online,
            icon,
            menu,
            worker,
            _subscriptions: subs,
        }
    }

    pub fn online(&self) -> Option<bool> {
        self.online.get()
    }

    pub fn icon(&self) -> TrayIcon {
        self.icon.get()
    }

    pub fn menu(&self) -> MenuState {
        self.menu.get()
    }

    pub fn tray_running(&self) -> bool {
        self.worker.borrow().is_some()
    }

    /// Stop the tray worker, if any, and wait for it. Used on shutdown,
    /// after the UI loop has exited.
    pub fn shutdown(&self) {
        let stopped = self.worker.borrow_mut().take();
        if let Some(stopped) = stopped {
            stopped.join();
        }
    }
}
