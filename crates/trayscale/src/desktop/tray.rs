// ── Terminal tray ──
//
// A tray backend for terminals: the tray thread publishes its icon and menu
// into a lock-free mirror the window reads while drawing, and writes the
// current icon to disk for external status bars. Menu activations come back
// from the window through the sender the tray was started with.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use trayscale_core::{MenuItem, TrayBackend, TrayEvent, TrayIcon, TrayLink, TrayUpdate};

use super::assets;

/// What the tray currently shows. Default while no tray runs.
#[derive(Debug, Clone, Default)]
pub struct TrayView {
    /// `None` while the tray is not running.
    pub icon: Option<TrayIcon>,
    pub menu: Vec<MenuItem>,
    events: Option<mpsc::UnboundedSender<TrayEvent>>,
}

impl TrayView {
    pub fn running(&self) -> bool {
        self.icon.is_some()
    }

    #[cfg(test)]
    pub fn showing(icon: TrayIcon, menu: Vec<MenuItem>) -> Self {
        Self {
            icon: Some(icon),
            menu,
            events: None,
        }
    }
}

/// Shared between the tray thread (writer) and the window (reader).
#[derive(Debug, Clone, Default)]
pub struct TrayMirror {
    state: Arc<ArcSwap<TrayView>>,
}

impl TrayMirror {
    pub fn load(&self) -> Arc<TrayView> {
        self.state.load_full()
    }

    fn update(&self, mut f: impl FnMut(&mut TrayView)) {
        self.state.rcu(|current| {
            let mut next = TrayView::clone(current);
            f(&mut next);
            next
        });
    }

    /// Activate a menu entry as if it had been clicked. Returns `false` when
    /// no tray is running.
    pub fn activate(&self, event: TrayEvent) -> bool {
        self.state
            .load()
            .events
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }
}

pub struct TerminalTray {
    mirror: TrayMirror,
    icon_path: Option<PathBuf>,
}

impl TerminalTray {
    pub fn new(mirror: TrayMirror, icon_path: Option<PathBuf>) -> Self {
        Self { mirror, icon_path }
    }

    fn write_icon(&self, icon: TrayIcon) {
        let Some(path) = &self.icon_path else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(error = %e, dir = %parent.display(), "cannot create icon directory");
                return;
            }
        }
        match fs::write(path, assets::tray_icon_png(icon)) {
            Ok(()) => debug!(%icon, path = %path.display(), "tray icon written"),
            Err(e) => warn!(error = %e, path = %path.display(), "failed to write tray icon"),
        }
    }
}

impl TrayBackend for TerminalTray {
    fn run(self: Box<Self>, mut link: TrayLink) {
        let events = link.events.clone();
        self.mirror.update(|view| view.events = Some(events.clone()));
        link.ready();
        info!("terminal tray running");

        while let Ok(update) = link.updates.recv() {
            match update {
                TrayUpdate::Icon(icon) => {
                    self.mirror.update(|view| view.icon = Some(icon));
                    self.write_icon(icon);
                }
                TrayUpdate::Menu(state) => {
                    let menu = state.build_menu();
                    self.mirror.update(|view| view.menu.clone_from(&menu));
                }
                TrayUpdate::Shutdown => break,
            }
        }

        self.mirror.update(|view| *view = TrayView::default());
        info!("terminal tray stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::rc::Rc;

    use trayscale_core::state::Cell;
    use trayscale_core::tray::TrayFactory;
    use trayscale_core::{MenuState, Notification, Notifier, Snapshot, TrayBridge};

    use super::*;

    struct Silent;

    impl Notifier for Silent {
        fn notify(&self, _: &Notification) {}
    }

    fn wait_for(mirror: &TrayMirror, f: impl Fn(&TrayView) -> bool) {
        for _ in 0..200 {
            if f(&mirror.load()) {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("tray mirror never reached the expected state: {:?}", mirror.load());
    }

    #[test]
    fn mirror_follows_the_tray_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let icon_path = dir.path().join("tray-icon.png");
        let mirror = TrayMirror::default();

        let factory: TrayFactory = {
            let mirror = mirror.clone();
            let icon_path = icon_path.clone();
            Box::new(move || -> Box<dyn TrayBackend> {
                Box::new(TerminalTray::new(mirror.clone(), Some(icon_path.clone())))
            })
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let snapshot: Cell<Option<Arc<Snapshot>>> = Cell::new(None);
        let enabled = Cell::new(true);
        let notifier: Rc<dyn Notifier> = Rc::new(Silent);
        let bridge = TrayBridge::new(&snapshot, &enabled, notifier, factory, tx);

        wait_for(&mirror, |v| v.running() && !v.menu.is_empty());
        assert_eq!(mirror.load().icon, Some(TrayIcon::Inactive));
        assert_eq!(mirror.load().menu, MenuState::default().build_menu());
        assert_eq!(
            fs::read(&icon_path).unwrap(),
            assets::tray_icon_png(TrayIcon::Inactive)
        );

        assert!(mirror.activate(TrayEvent::Show));
        assert_eq!(rx.try_recv().unwrap(), TrayEvent::Show);

        enabled.set(false);
        assert!(!bridge.tray_running());
        assert!(!mirror.load().running());
        assert!(!mirror.activate(TrayEvent::Quit));
    }

    #[test]
    fn update_is_copy_on_write() {
        let mirror = TrayMirror::default();
        let before = mirror.load();
        let mut calls = 0;
        mirror.update(|view| {
            calls += 1;
            view.icon = Some(TrayIcon::ExitNode);
        });
        assert_eq!(before.icon, None);
        assert_eq!(mirror.load().icon, Some(TrayIcon::ExitNode));
        assert_eq!(calls, 1);
    }
}
