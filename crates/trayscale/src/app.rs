//! Application core: event loop, observable state and action dispatch.
//!
//! `App` lives on the UI thread and owns every `Rc` node of the state graph.
//! Background work (the poller forwarder, commands, confirmation requests)
//! reaches it only through the [`UiHandle`] it was built with.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use directories::BaseDirs;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use trayscale_config::{Settings, save_settings_to};
use trayscale_core::state::{Cell, Derived, Source, Subscription, UiHandle};
use trayscale_core::tray::TrayFactory;
use trayscale_core::{
    Command, CoreError, Dispatcher, Login, NodeKey, Notifier, Outcome, PageKind, Placeholder,
    PollerHandle, Profiles, Reconciler, Snapshot, ToggleSwitch, TrayBridge, TrayEvent, TrayIcon,
};

use crate::action::{Action, Confirm, Panel, Reply};
use crate::desktop::{ToastNotifier, TrayMirror};
use crate::event::{Event, Events, Input};
use crate::screens::pages::{self, ListEntry, NetCheckView};
use crate::screens::{AboutPanel, PrefRow, PrefsPanel, tray};
use crate::stack::{LocalSwitch, PeerView, Row, WindowStack};
use crate::theme;
use crate::tui::{self, Screen};
use crate::widgets::dialog;
use crate::widgets::fmt::{fmt_interval, parse_interval};
use crate::widgets::prompt::{Prompt, PromptKind, PromptOutcome};
use crate::widgets::toast::{Toast, Toasts};

pub const TICK_RATE: Duration = Duration::from_millis(250);
pub const RENDER_RATE: Duration = Duration::from_millis(33);
const LIST_WIDTH: u16 = 34;

/// Everything the window needs from `main`.
pub struct AppContext {
    pub poller: PollerHandle,
    pub dispatcher: Dispatcher,
    pub ui: UiHandle<App>,
    pub root: CancellationToken,
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub tray_factory: TrayFactory,
    pub tray_events: mpsc::UnboundedSender<TrayEvent>,
    pub mirror: TrayMirror,
    /// Where received files are saved.
    pub downloads: PathBuf,
    /// Show the window at startup.
    pub show_window: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    List,
    Page,
}

enum Overlay {
    Help,
    Confirm(Confirm),
    Prompt(Prompt),
    TrayMenu,
    /// Login profile chooser; the cursor indexes `Profiles::all`.
    Profiles(usize),
}

/// What to undo or announce once a command finishes.
#[derive(Debug, Clone)]
pub enum Followup {
    None,
    Status,
    Switch(NodeKey, LocalSwitch),
    Success(String),
}

enum TrayKey {
    Moved,
    Activated,
    Ignored,
}

pub struct App {
    running: bool,
    visible: bool,
    panel: Panel,
    focus: Focus,
    selected: usize,
    overlay: Option<Overlay>,
    toasts: Toasts,

    snapshot: Cell<Option<Arc<Snapshot>>>,
    tray_enabled: Cell<bool>,
    online: Derived<bool>,
    operator_warning: Derived<bool>,
    /// The connect/disconnect switch in the header.
    status: Rc<RefCell<ToggleSwitch>>,
    reconciler: Reconciler<WindowStack>,
    bridge: TrayBridge,
    mirror: TrayMirror,
    tray_cursor: usize,

    prefs: PrefsPanel,
    about: AboutPanel,
    netcheck: Option<NetCheckView>,
    settings: Settings,
    settings_path: PathBuf,
    downloads: PathBuf,

    poller: PollerHandle,
    dispatcher: Dispatcher,
    ui: UiHandle<App>,
    root: CancellationToken,
    _subscriptions: Vec<Subscription>,
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_default()
}

/// `~/x` to `$HOME/x`; anything else unchanged.
fn expand_home(text: &str) -> PathBuf {
    match (text.strip_prefix("~/"), BaseDirs::new()) {
        (Some(rest), Some(dirs)) => dirs.home_dir().join(rest),
        _ => PathBuf::from(text),
    }
}

impl App {
    pub fn new(ctx: AppContext) -> Self {
        let snapshot: Cell<Option<Arc<Snapshot>>> = Cell::new(None);
        let tray_enabled = Cell::new(ctx.settings.tray_icon);
        let toasts = Toasts::default();

        let notifier: Rc<dyn Notifier> = Rc::new(ToastNotifier::new(toasts.clone()));
        let bridge = TrayBridge::new(
            &snapshot,
            &tray_enabled,
            notifier,
            ctx.tray_factory,
            ctx.tray_events,
        );

        let online = Derived::map(&snapshot, |s: &Option<Arc<Snapshot>>| {
            s.as_deref().is_some_and(Snapshot::online)
        });
        let status = Rc::new(RefCell::new(ToggleSwitch::new(online.get())));
        let sync = {
            let status = Rc::clone(&status);
            online.listen(move |on| status.borrow_mut().sync(*on))
        };

        let user = current_user();
        let operator_warning = Derived::map(&snapshot, move |s: &Option<Arc<Snapshot>>| {
            s.as_deref()
                .is_some_and(|s| s.reachable && !user.is_empty() && !s.operator_is(&user))
        });

        let visible = ctx.show_window || !bridge.tray_running();

        Self {
            running: true,
            visible,
            panel: Panel::default(),
            focus: Focus::List,
            selected: 0,
            overlay: None,
            toasts,
            snapshot,
            tray_enabled,
            online,
            operator_warning,
            status,
            reconciler: Reconciler::new(WindowStack::default()),
            bridge,
            mirror: ctx.mirror,
            tray_cursor: 0,
            prefs: PrefsPanel::default(),
            about: AboutPanel::default(),
            netcheck: None,
            settings: ctx.settings,
            settings_path: ctx.settings_path,
            downloads: ctx.downloads,
            poller: ctx.poller,
            dispatcher: ctx.dispatcher,
            ui: ctx.ui,
            root: ctx.root,
            _subscriptions: vec![sync],
        }
    }

    /// Run the event loop until quit or root cancellation.
    pub async fn run(mut self, mut events: Events<App>) -> Result<()> {
        let mut screen = Screen::open()?;
        info!("window event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };
            match event {
                Event::Input(Input::Key(key)) => {
                    if let Some(action) = self.handle_key(key) {
                        self.process_action(action);
                    }
                }
                Event::Input(Input::Tick) => self.toasts.tick(Instant::now()),
                Event::Input(Input::Resize | Input::Render) => {
                    screen.draw(|frame| self.render(frame))?;
                }
                Event::Task(task) => {
                    task(&mut self);
                    events.drain(&mut self);
                }
                Event::Tray(event) => self.on_tray_event(event),
                Event::Shutdown => {
                    info!("shutdown requested");
                    self.running = false;
                }
            }
        }

        self.bridge.shutdown();
        drop(events);
        drop(screen);
        info!("window event loop ended");
        Ok(())
    }

    fn quit(&mut self) {
        info!("quitting");
        self.running = false;
        self.root.cancel();
    }

    // ── Incoming state ──────────────────────────────────────────────

    /// A snapshot from the poller. Switches with a command in flight keep
    /// the requested position until the command reports back.
    pub fn on_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        let selected = self.current_key();
        if self.snapshot.set(Some(Arc::clone(&snapshot))) {
            debug!(state = ?snapshot.backend_state, reachable = snapshot.reachable, "snapshot changed");
        }
        self.reconciler.apply(&snapshot);

        if let Some(index) =
            selected.and_then(|key| self.reconciler.views().position(|(k, _)| *k == key))
        {
            self.selected = index;
        }
        let len = self.reconciler.visible_len();
        self.selected = self.selected.min(len.saturating_sub(1));
        if len == 0 {
            self.focus = Focus::List;
        }
    }

    pub fn on_command_result(&mut self, followup: Followup, result: Result<Outcome, CoreError>) {
        match result {
            Ok(outcome) => self.on_outcome(&followup, outcome),
            Err(e) => self.on_command_error(&followup, &e),
        }
    }

    fn on_outcome(&mut self, followup: &Followup, outcome: Outcome) {
        match outcome {
            Outcome::Done => {
                self.settle(followup, true);
                if let Followup::Success(message) = followup {
                    self.toasts.push(Toast::success(message.clone()));
                }
            }
            Outcome::Login(login) => {
                self.status.borrow_mut().revert();
                match login {
                    Login::Declined => debug!("login declined"),
                    Login::Opened => self
                        .toasts
                        .push(Toast::info("Continue logging in with your browser")),
                    Login::BrowserFailed(reason) => self
                        .toasts
                        .push(Toast::error(format!("Could not open a browser: {reason}"))),
                }
            }
            Outcome::NetCheck { report, derp } => {
                info!(
                    udp = report.udp,
                    preferred = report.preferred_derp_name(&derp),
                    "network check finished"
                );
                self.netcheck = Some(NetCheckView { report, derp });
                self.toasts.push(Toast::success("Network check finished"));
            }
            Outcome::Saved(path) => {
                self.toasts
                    .push(Toast::success(format!("Saved {}", path.display())));
            }
        }
    }

    fn on_command_error(&mut self, followup: &Followup, error: &CoreError) {
        self.settle(followup, false);
        match error {
            CoreError::Cancelled { .. } => {}
            CoreError::InternalInvariant { op, message } => {
                error!(op, message, "internal invariant violated, aborting");
                tui::restore();
                std::process::abort();
            }
            CoreError::InvalidInput { message, .. } => {
                self.toasts.push(Toast::warning(message.clone()));
            }
            other => self.toasts.push(Toast::error(other.to_string())),
        }
    }

    /// Release the switch a command was holding: keep what the user asked
    /// for when it `succeeded`, otherwise fall back to the daemon's value.
    fn settle(&mut self, followup: &Followup, succeeded: bool) {
        let settle = |switch: &mut ToggleSwitch| {
            if succeeded {
                switch.finish();
            } else {
                switch.revert();
            }
        };
        match followup {
            Followup::Status => settle(&mut self.status.borrow_mut()),
            Followup::Switch(key, which) => {
                if let Some(view) = self.reconciler.view_mut(key) {
                    settle(view.switches.get_mut(*which));
                }
            }
            Followup::None | Followup::Success(_) => {}
        }
    }

    pub fn on_tray_event(&mut self, event: TrayEvent) {
        debug!(?event, "tray activation");
        match event {
            TrayEvent::Show => self.process_action(Action::ShowWindow),
            TrayEvent::Connect => self.request_status(true),
            TrayEvent::Disconnect => self.request_status(false),
            TrayEvent::UseExitNode(on) => self.dispatch(Command::UseExitNode(on), Followup::None),
            TrayEvent::ShowSelf => self.process_action(Action::ShowSelf),
            TrayEvent::Quit => self.process_action(Action::Quit),
        }
    }

    /// Show a confirmation dialog, answering any open one with no.
    pub fn ask(&mut self, confirm: Confirm) {
        if let Some(Overlay::Confirm(previous)) = self.overlay.take() {
            debug!(title = previous.title, "replacing open question");
            Self::answer(previous, false);
        }
        self.visible = true;
        self.overlay = Some(Overlay::Confirm(confirm));
    }

    fn answer(confirm: Confirm, yes: bool) -> Option<Action> {
        match confirm.reply {
            Reply::Channel(tx) => {
                if tx.send(yes).is_err() {
                    debug!(title = confirm.title, "question no longer awaited");
                }
                None
            }
            Reply::Then(action) => yes.then_some(*action),
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    fn dispatch(&self, command: Command, followup: Followup) {
        debug!(op = command.name(), "dispatching");
        let ui = self.ui.clone();
        let handle = self.dispatcher.spawn(command, move |result| {
            if !ui.post(move |app| app.on_command_result(followup, result)) {
                debug!("window gone before the command finished");
            }
        });
        drop(handle);
    }

    fn request_status(&mut self, on: bool) {
        let send = self.status.borrow_mut().request(on);
        if let Some(on) = send {
            let command = if on {
                Command::Connect
            } else {
                Command::Disconnect
            };
            self.dispatch(command, Followup::Status);
        }
    }

    fn save_settings(&self) {
        match save_settings_to(&self.settings_path, &self.settings) {
            Ok(()) => debug!(path = %self.settings_path.display(), "settings saved"),
            Err(e) => {
                warn!(error = %e, path = %self.settings_path.display(), "failed to save settings");
                self.toasts
                    .push(Toast::error(format!("Could not save settings: {e}")));
            }
        }
    }

    // ── Selection ───────────────────────────────────────────────────

    fn profiles(&self) -> Profiles {
        self.snapshot
            .with(|s| s.as_deref().map(|s| s.profiles.clone()))
            .unwrap_or_default()
    }

    fn current(&self) -> Option<(&NodeKey, &PeerView)> {
        if self.reconciler.visible_len() == 0 {
            return None;
        }
        self.reconciler.view_at(self.selected)
    }

    fn current_key(&self) -> Option<NodeKey> {
        self.current().map(|(key, _)| key.clone())
    }

    fn current_view_mut(&mut self) -> Option<&mut PeerView> {
        let key = self.current_key()?;
        self.reconciler.view_mut(&key)
    }

    fn select_self(&mut self) {
        if let Some(index) = self
            .reconciler
            .views()
            .position(|(_, view)| view.kind == PageKind::SelfPage)
        {
            self.selected = index;
            self.focus = Focus::Page;
        }
    }

    // ── Keys ────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }

        if let Some(overlay) = self.overlay.take() {
            return self.overlay_key(overlay, key);
        }

        if !self.visible {
            return match self.tray_key(key) {
                TrayKey::Ignored if key.code == KeyCode::Char('q') => Some(Action::Quit),
                _ => None,
            };
        }

        match self.panel {
            Panel::Pages => {}
            Panel::Prefs => return self.prefs_key(key),
            Panel::About => return self.about_key(key),
        }

        match key.code {
            KeyCode::Char('?') => Some(Action::ToggleHelp),
            KeyCode::Char('c') => Some(Action::ToggleStatus),
            KeyCode::Char('r') => Some(Action::Refresh),
            KeyCode::Char('t') => Some(Action::OpenTrayMenu),
            KeyCode::Char('p') => Some(Action::ChooseProfile),
            KeyCode::Char(',') => Some(Action::OpenPanel(Panel::Prefs)),
            KeyCode::Char('i') => Some(Action::OpenPanel(Panel::About)),
            KeyCode::Char('q') => Some(Action::CloseWindow),
            _ => match self.focus {
                Focus::List => self.list_key(key),
                Focus::Page => self.page_key(key),
            },
        }
    }

    fn overlay_key(&mut self, overlay: Overlay, key: KeyEvent) -> Option<Action> {
        match overlay {
            Overlay::Help => {
                if !matches!(key.code, KeyCode::Esc | KeyCode::Char('?' | 'q')) {
                    self.overlay = Some(Overlay::Help);
                }
                None
            }
            Overlay::Confirm(confirm) => match key.code {
                KeyCode::Char('y' | 'Y') => Self::answer(confirm, true),
                KeyCode::Char('n' | 'N') | KeyCode::Esc => Self::answer(confirm, false),
                _ => {
                    self.overlay = Some(Overlay::Confirm(confirm));
                    None
                }
            },
            Overlay::Prompt(mut prompt) => {
                match prompt.handle_key(key) {
                    PromptOutcome::Editing => self.overlay = Some(Overlay::Prompt(prompt)),
                    PromptOutcome::Cancel => {}
                    PromptOutcome::Submit(text) => self.submit_prompt(prompt, &text),
                }
                None
            }
            Overlay::Profiles(cursor) => self.profiles_key(cursor, key),
            Overlay::TrayMenu => {
                match self.tray_key(key) {
                    TrayKey::Activated => {}
                    TrayKey::Ignored if matches!(key.code, KeyCode::Esc | KeyCode::Char('t')) => {}
                    TrayKey::Moved | TrayKey::Ignored => self.overlay = Some(Overlay::TrayMenu),
                }
                None
            }
        }
    }

    fn profiles_key(&mut self, cursor: usize, key: KeyEvent) -> Option<Action> {
        let profiles = self.profiles();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                let last = profiles.all.len().saturating_sub(1);
                self.overlay = Some(Overlay::Profiles((cursor + 1).min(last)));
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.overlay = Some(Overlay::Profiles(cursor.saturating_sub(1)));
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => profiles
                .all
                .get(cursor)
                .map(|p| Action::SwitchProfile(p.id.clone())),
            KeyCode::Esc | KeyCode::Char('p' | 'q') => None,
            _ => {
                self.overlay = Some(Overlay::Profiles(cursor));
                None
            }
        }
    }

    /// Menu navigation shared by the tray overlay and the hidden window.
    fn tray_key(&mut self, key: KeyEvent) -> TrayKey {
        let view = self.mirror.load();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.tray_cursor = tray::step(&view.menu, self.tray_cursor, true);
                TrayKey::Moved
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.tray_cursor = tray::step(&view.menu, self.tray_cursor, false);
                TrayKey::Moved
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let Some(event) = tray::event_at(&view.menu, self.tray_cursor) else {
                    return TrayKey::Moved;
                };
                if !self.mirror.activate(event) {
                    debug!(?event, "no tray to deliver the activation");
                }
                TrayKey::Activated
            }
            _ => TrayKey::Ignored,
        }
    }

    fn prefs_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.prefs.move_cursor(true),
            KeyCode::Char('k') | KeyCode::Up => self.prefs.move_cursor(false),
            KeyCode::Enter | KeyCode::Char(' ') => {
                return Some(match self.prefs.selected() {
                    PrefRow::TrayIcon => Action::ToggleTrayIcon,
                    PrefRow::PollingInterval => Action::Prompt(PromptKind::PollingInterval),
                    PrefRow::ControlServer => Action::Prompt(PromptKind::ControlServer),
                });
            }
            KeyCode::Esc | KeyCode::Char('q' | ',') => return Some(Action::OpenPanel(Panel::Pages)),
            _ => {}
        }
        None
    }

    fn about_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.about.scroll(true),
            KeyCode::Char('k') | KeyCode::Up => self.about.scroll(false),
            KeyCode::Esc | KeyCode::Char('q' | 'i') => return Some(Action::OpenPanel(Panel::Pages)),
            _ => {}
        }
        None
    }

    fn list_key(&mut self, key: KeyEvent) -> Option<Action> {
        let len = self.reconciler.visible_len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.selected = (self.selected + 1).min(len.saturating_sub(1));
            }
            KeyCode::Char('k') | KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Enter | KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => {
                if len > 0 {
                    self.focus = Focus::Page;
                }
            }
            KeyCode::Esc => {
                if self.toasts.current().is_some() {
                    self.toasts.dismiss();
                } else {
                    return Some(Action::CloseWindow);
                }
            }
            _ => {}
        }
        None
    }

    fn page_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Esc | KeyCode::Tab | KeyCode::Left | KeyCode::Char('h') => {
                self.focus = Focus::List;
                None
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if let Some(view) = self.current_view_mut() {
                    view.move_cursor(true);
                }
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if let Some(view) = self.current_view_mut() {
                    view.move_cursor(false);
                }
                None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let (_, view) = self.current()?;
                view.selected().map(Action::Activate)
            }
            KeyCode::Char('x') => match self.current()?.1.selected()? {
                Row::Route(route) => Some(Action::RemoveRoute(route)),
                _ => None,
            },
            KeyCode::Char('d') => match self.current()?.1.selected()? {
                Row::File(name) => Some(Action::AskDeleteFile(name)),
                _ => None,
            },
            _ => None,
        }
    }

    // ── Actions ─────────────────────────────────────────────────────

    fn process_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.quit(),

            Action::CloseWindow => {
                if self.bridge.tray_running() {
                    info!("hiding window to the tray");
                    self.visible = false;
                    self.tray_cursor = tray::first(&self.mirror.load().menu);
                } else {
                    self.quit();
                }
            }

            Action::ShowWindow => self.visible = true,

            Action::ShowSelf => {
                self.visible = true;
                self.panel = Panel::Pages;
                self.select_self();
            }

            Action::ToggleHelp => self.overlay = Some(Overlay::Help),

            Action::OpenPanel(panel) => self.panel = panel,

            Action::ToggleStatus => {
                let on = !self.status.borrow().active();
                self.request_status(on);
            }

            Action::Refresh => {
                debug!("manual refresh");
                self.poller.poll_now();
            }

            Action::OpenTrayMenu => {
                if self.bridge.tray_running() {
                    self.tray_cursor = tray::first(&self.mirror.load().menu);
                    self.overlay = Some(Overlay::TrayMenu);
                } else {
                    self.toasts
                        .push(Toast::warning("The tray icon is turned off in preferences"));
                }
            }

            Action::Activate(row) => self.activate(row),

            Action::ChooseProfile => {
                let profiles = self.profiles();
                if profiles.can_switch() {
                    let cursor = profiles.current_index().unwrap_or(0);
                    self.overlay = Some(Overlay::Profiles(cursor));
                } else {
                    self.toasts
                        .push(Toast::info("There are no other login profiles to switch to"));
                }
            }

            Action::SwitchProfile(id) => {
                let profiles = self.profiles();
                let Some(profile) = profiles.get(&id) else {
                    debug!(profile = %id, "profile vanished before switching");
                    return;
                };
                info!(profile = %profile.name, "switching login profile");
                let done = format!("Switched to {}", profile.name);
                self.dispatch(Command::SwitchProfile(id), Followup::Success(done));
            }

            Action::RemoveRoute(route) => {
                self.dispatch(Command::RemoveRoute(route), Followup::None);
            }

            Action::AskDeleteFile(name) => self.ask(Confirm {
                title: "Delete File".into(),
                body: format!("Delete {name}? This cannot be undone."),
                reply: Reply::Then(Box::new(Action::DeleteFile(name))),
            }),

            Action::DeleteFile(name) => {
                let done = format!("Deleted {name}");
                self.dispatch(Command::DeleteFile(name), Followup::Success(done));
            }

            Action::Prompt(kind) => {
                let initial = match &kind {
                    PromptKind::PollingInterval => fmt_interval(self.settings.polling_interval()),
                    PromptKind::ControlServer => self.settings.control_plane_server.clone(),
                    PromptKind::AddRoute | PromptKind::SendFile { .. } => String::new(),
                };
                self.overlay = Some(Overlay::Prompt(Prompt::new(kind, initial)));
            }

            Action::ToggleTrayIcon => {
                self.settings.tray_icon = !self.settings.tray_icon;
                info!(enabled = self.settings.tray_icon, "tray icon preference changed");
                self.tray_enabled.set(self.settings.tray_icon);
                self.save_settings();
                if !self.bridge.tray_running() {
                    self.visible = true;
                }
            }
        }
    }

    fn activate(&mut self, row: Row) {
        match row {
            Row::Switch(which) => {
                let Some(key) = self.current_key() else {
                    return;
                };
                let Some(view) = self.reconciler.view_mut(&key) else {
                    return;
                };
                let switch = view.switches.get_mut(which);
                let requested = !switch.active();
                if let Some(on) = switch.request(requested) {
                    self.dispatch(which.command(on), Followup::Switch(key, which));
                }
            }
            Row::Route(route) => self.process_action(Action::RemoveRoute(route)),
            Row::AddRoute => self.process_action(Action::Prompt(PromptKind::AddRoute)),
            Row::File(name) => {
                let dir = self.downloads.clone();
                self.dispatch(Command::SaveFile { name, dir }, Followup::None);
            }
            Row::NetCheck => {
                self.toasts.push(Toast::info("Running network check…"));
                self.dispatch(Command::NetCheck, Followup::None);
            }
            Row::ExitNode { in_use: true } | Row::MullvadNode { in_use: true, .. } => {
                self.dispatch(Command::SelectExitNode(None), Followup::None);
            }
            Row::ExitNode { in_use: false } => {
                if let Some(key) = self.current_key() {
                    self.select_exit_node(&key);
                }
            }
            Row::MullvadNode { key, in_use: false } => self.select_exit_node(&key),
            Row::SendFile => {
                let Some((_, view)) = self.current() else {
                    return;
                };
                let Some(page) = &view.page else {
                    return;
                };
                let kind = PromptKind::SendFile {
                    node: page.stable_id.clone(),
                    peer: page.name.clone(),
                };
                self.process_action(Action::Prompt(kind));
            }
        }
    }

    fn select_exit_node(&self, key: &NodeKey) {
        let peer = self.snapshot.with(|s| {
            s.as_deref()
                .and_then(|s| s.peers.iter().find(|p| p.node_key == *key).cloned())
        });
        if let Some(peer) = peer {
            self.dispatch(Command::SelectExitNode(Some(peer)), Followup::None);
        } else {
            debug!(node = %key, "exit node vanished before selection");
        }
    }

    fn submit_prompt(&mut self, mut prompt: Prompt, text: &str) {
        match prompt.kind.clone() {
            PromptKind::AddRoute => {
                self.dispatch(Command::AddRoute(text.to_owned()), Followup::None);
            }
            PromptKind::SendFile { node, peer } => {
                let path = expand_home(text.trim());
                let done = format!("Sent {} to {peer}", file_label(&path));
                self.dispatch(Command::SendFile { node, path }, Followup::Success(done));
            }
            PromptKind::PollingInterval => match parse_interval(text) {
                Ok(interval) => {
                    self.settings.set_polling_interval(interval);
                    let applied = self.settings.polling_interval();
                    self.poller.set_interval(applied);
                    self.save_settings();
                    self.toasts.push(Toast::success(format!(
                        "Polling every {}",
                        fmt_interval(applied)
                    )));
                }
                Err(e) => {
                    prompt.set_error(e);
                    self.overlay = Some(Overlay::Prompt(prompt));
                }
            },
            PromptKind::ControlServer => match Settings::validate_control_url(text) {
                Ok(()) => {
                    text.trim().clone_into(&mut self.settings.control_plane_server);
                    self.save_settings();
                    let url = self.settings.control_url().to_owned();
                    let done = format!("Control server set to {url}");
                    self.dispatch(Command::SetControlUrl(url), Followup::Success(done));
                }
                Err(e) => {
                    prompt.set_error(e.to_string());
                    self.overlay = Some(Overlay::Prompt(prompt));
                }
            },
        }
    }

    // ── Rendering ───────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        if !self.visible {
            tray::render_hidden(frame, area, &self.mirror.load(), self.tray_cursor);
            self.toasts.render(frame, area);
            return;
        }

        let warning = self.operator_warning.get();
        let [header, body, footer] = Layout::vertical([
            Constraint::Length(if warning { 2 } else { 1 }),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(area);

        self.render_header(frame, header, warning);
        match self.panel {
            Panel::Pages => self.render_pages(frame, body),
            Panel::Prefs => self.prefs.render(frame, body, &self.settings),
            Panel::About => self.about.render(frame, body),
        }
        self.render_footer(frame, footer);

        match &self.overlay {
            Some(Overlay::Help) => dialog::render_help(frame, area),
            Some(Overlay::Confirm(c)) => dialog::render_confirm(frame, area, &c.title, &c.body),
            Some(Overlay::Prompt(p)) => p.render(frame, area),
            Some(Overlay::TrayMenu) => {
                tray::render_tray_menu(frame, area, &self.mirror.load(), self.tray_cursor);
            }
            Some(Overlay::Profiles(cursor)) => {
                let profiles = self.profiles();
                let names: Vec<&str> = profiles.all.iter().map(|p| p.name.as_str()).collect();
                dialog::render_choice(
                    frame,
                    area,
                    "Login Profile",
                    &names,
                    *cursor,
                    profiles.current_index(),
                );
            }
            None => {}
        }

        self.toasts.render(frame, area);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, warning: bool) {
        let status = *self.status.borrow();
        let (text, style) = match (status.active(), status.active() == status.committed()) {
            (true, true) => ("[ on] Connected", theme::switch_on()),
            (false, true) => ("[off] Not connected", theme::switch_off()),
            (true, false) => ("[ on…] Connecting", theme::switch_pending()),
            (false, false) => ("[off…] Disconnecting", theme::switch_pending()),
        };

        let tray = match self.mirror.load().icon {
            Some(TrayIcon::Active) => Span::styled("tray ●", Style::default().fg(theme::SUCCESS_GREEN)),
            Some(TrayIcon::ExitNode) => Span::styled("tray ◆", Style::default().fg(theme::NEON_CYAN)),
            Some(TrayIcon::Inactive) => Span::styled("tray ○", theme::switch_off()),
            None => Span::styled("no tray", theme::key_hint()),
        };

        let mut spans = vec![
            Span::styled(" Trayscale ", theme::title_style()),
            Span::styled(text, style),
            Span::raw("  "),
            tray,
        ];
        let profiles = self.profiles();
        if let Some(current) = profiles.current() {
            spans.push(Span::styled(format!("  {}", current.name), theme::text()));
            if profiles.can_switch() {
                spans.push(Span::styled(" (p to switch)", theme::key_hint()));
            }
        }
        let mut lines = vec![Line::from(spans)];
        if warning {
            lines.push(Line::from(Span::styled(
                " ! The current user is not the Tailscale operator. Run: sudo tailscale set --operator=$USER",
                Style::default().fg(theme::ELECTRIC_YELLOW),
            )));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_pages(&self, frame: &mut Frame, area: Rect) {
        let stack = self.reconciler.stack();
        if stack.peers_hidden() || stack.placeholder().is_some() {
            let placeholder = stack.placeholder().unwrap_or(Placeholder::Unreachable);
            pages::render_placeholder(frame, area, placeholder);
            return;
        }

        let [list, page] =
            Layout::horizontal([Constraint::Length(LIST_WIDTH), Constraint::Min(0)]).areas(area);
        let entries: Vec<ListEntry> = self
            .reconciler
            .views()
            .map(|(_, view)| ListEntry::for_view(view))
            .collect();
        pages::render_list(frame, list, &entries, self.selected, self.focus == Focus::List);

        if let Some((_, view)) = self.current() {
            let netcheck = (view.kind == PageKind::SelfPage)
                .then_some(self.netcheck.as_ref())
                .flatten();
            pages::render_page(
                frame,
                page,
                view,
                self.focus == Focus::Page,
                netcheck,
                Utc::now(),
            );
        }
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let hints: &[(&str, &str)] = match (self.panel, self.focus) {
            (Panel::Prefs, _) => &[("j/k", "move"), ("Enter", "change"), ("Esc", "back")],
            (Panel::About, _) => &[("j/k", "scroll"), ("Esc", "back")],
            (Panel::Pages, Focus::List) => &[
                ("j/k", "select"),
                ("Enter", "open"),
                ("c", "connect"),
                ("p", "profile"),
                (",", "prefs"),
                ("?", "help"),
                ("q", "close"),
            ],
            (Panel::Pages, Focus::Page) => &[
                ("j/k", "move"),
                ("Enter", "activate"),
                ("x", "remove route"),
                ("d", "delete file"),
                ("Esc", "back"),
            ],
        };
        let mut spans = Vec::new();
        for (key, what) in hints {
            spans.push(Span::styled(format!(" {key} "), theme::key_hint_key()));
            spans.push(Span::styled(format!("{what} "), theme::key_hint()));
        }
        if self.online.get() {
            if let Some(addr) = self.snapshot.with(|s| s.as_deref().and_then(Snapshot::self_addr)) {
                spans.push(Span::styled(format!("  {addr}"), theme::text()));
            }
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
