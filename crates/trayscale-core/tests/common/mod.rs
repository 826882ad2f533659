// Shared test doubles for the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use trayscale_core::display::display_name;
use trayscale_core::model::prefs::normalize_routes;
use trayscale_core::{
    BackendState, CoreError, Daemon, DerpMap, FileReader, Interaction, LoginProfile,
    NetCheckReport, NodeKey, Notification, Notifier, PeerInfo, Prefs, ProfileId, Profiles,
    RoutePrefix, StableNodeId, StatusFields, TrayBackend, TrayLink, TrayUpdate, WaitingFile,
};

// ── Fake daemon ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Status,
    Prefs,
    Start,
    Stop,
    StartLogin,
    SetExitNode(Option<NodeKey>),
    SetUseExitNode(bool),
    AdvertiseExitNode(bool),
    AdvertiseRoutes(Vec<RoutePrefix>),
    SetAllowLanAccess(bool),
    SetAcceptRoutes(bool),
    SetControlUrl(String),
    NetCheck(bool),
    PushFile {
        node: StableNodeId,
        size: u64,
        name: String,
        body: Vec<u8>,
    },
    AwaitWaitingFiles,
    GetWaitingFile(String),
    DeleteWaitingFile(String),
    Profiles,
    SwitchProfile(ProfileId),
}

#[derive(Default)]
pub struct FakeState {
    pub status: StatusFields,
    pub prefs: Prefs,
    pub files: Vec<(WaitingFile, Vec<u8>)>,
    pub profiles: Profiles,
    pub calls: Vec<Call>,
    /// Operations that fail with a scripted rejection.
    pub failing: HashSet<&'static str>,
    /// Status calls fail as if the socket were gone.
    pub unreachable: bool,
    /// Delay applied inside every status call.
    pub status_delay: Option<Duration>,
    /// Bump a handshake timestamp on every status call.
    pub churn: bool,
}

/// In-memory daemon that records calls and applies mutations to its own
/// state, so the next status/prefs reflect them.
#[derive(Default)]
pub struct FakeDaemon {
    state: Mutex<FakeState>,
}

impl FakeDaemon {
    pub fn new(status: StatusFields, prefs: Prefs) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                status,
                prefs,
                ..FakeState::default()
            }),
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub fn count(&self, call: &Call) -> usize {
        self.with(|s| s.calls.iter().filter(|c| *c == call).count())
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !matches!(
                    c,
                    Call::Status | Call::Prefs | Call::AwaitWaitingFiles | Call::Profiles
                )
            })
            .collect()
    }

    fn record(&self, op: &'static str, call: Call) -> Result<(), CoreError> {
        self.with(|s| {
            s.calls.push(call);
            if s.failing.contains(op) {
                return Err(CoreError::DaemonRejected {
                    op,
                    status: 500,
                    message: "scripted failure".into(),
                });
            }
            Ok(())
        })
    }
}

#[async_trait]
impl Daemon for FakeDaemon {
    async fn status(&self, _scope: &CancellationToken) -> Result<StatusFields, CoreError> {
        let delay = self.with(|s| s.status_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record("status", Call::Status)?;
        self.with(|s| {
            if s.unreachable {
                return Err(CoreError::DaemonUnavailable {
                    op: "status",
                    reason: "connection refused".into(),
                });
            }
            if s.churn {
                for peer in &mut s.status.peers {
                    peer.last_handshake =
                        Some(peer.last_handshake.unwrap_or_default() + chrono::Duration::seconds(1));
                }
            }
            Ok(s.status.clone())
        })
    }

    async fn prefs(&self, _scope: &CancellationToken) -> Result<Prefs, CoreError> {
        self.record("prefs", Call::Prefs)?;
        Ok(self.with(|s| s.prefs.clone()))
    }

    async fn start(&self, _scope: &CancellationToken) -> Result<(), CoreError> {
        self.record("start", Call::Start)?;
        self.with(|s| s.status.backend_state = BackendState::Running);
        Ok(())
    }

    async fn stop(&self, _scope: &CancellationToken) -> Result<(), CoreError> {
        self.record("stop", Call::Stop)?;
        self.with(|s| s.status.backend_state = BackendState::Stopped);
        Ok(())
    }

    async fn start_login(&self, _scope: &CancellationToken) -> Result<(), CoreError> {
        self.record("start_login", Call::StartLogin)
    }

    async fn profiles(&self, _scope: &CancellationToken) -> Result<Profiles, CoreError> {
        self.record("profiles", Call::Profiles)?;
        Ok(self.with(|s| s.profiles.clone()))
    }

    /// Switching logs in as the other profile; the fake's tailnet is
    /// otherwise unchanged.
    async fn switch_profile(
        &self,
        _scope: &CancellationToken,
        id: &ProfileId,
    ) -> Result<(), CoreError> {
        self.record("switch_profile", Call::SwitchProfile(id.clone()))?;
        self.with(|s| s.profiles.current = Some(id.clone()));
        Ok(())
    }

    async fn set_exit_node(
        &self,
        _scope: &CancellationToken,
        peer: Option<&PeerInfo>,
    ) -> Result<(), CoreError> {
        self.record("set_exit_node", Call::SetExitNode(peer.map(|p| p.node_key.clone())))?;
        self.with(|s| {
            s.prefs.exit_node_id = peer.map(|p| p.stable_id.clone());
            s.prefs.exit_node_ip = None;
        });
        Ok(())
    }

    async fn set_use_exit_node(
        &self,
        _scope: &CancellationToken,
        enabled: bool,
    ) -> Result<(), CoreError> {
        self.record("set_use_exit_node", Call::SetUseExitNode(enabled))
    }

    async fn advertise_exit_node(
        &self,
        _scope: &CancellationToken,
        enabled: bool,
    ) -> Result<(), CoreError> {
        self.record("advertise_exit_node", Call::AdvertiseExitNode(enabled))?;
        self.with(|s| s.prefs.advertises_exit_node = enabled);
        Ok(())
    }

    async fn advertise_routes(
        &self,
        _scope: &CancellationToken,
        routes: &[RoutePrefix],
    ) -> Result<(), CoreError> {
        self.record("advertise_routes", Call::AdvertiseRoutes(routes.to_vec()))?;
        self.with(|s| s.prefs.advertise_routes = normalize_routes(routes.iter().copied()));
        Ok(())
    }

    async fn set_allow_lan_access(
        &self,
        _scope: &CancellationToken,
        allow: bool,
    ) -> Result<(), CoreError> {
        self.record("set_allow_lan_access", Call::SetAllowLanAccess(allow))?;
        self.with(|s| s.prefs.exit_node_allow_lan_access = allow);
        Ok(())
    }

    async fn set_accept_routes(
        &self,
        _scope: &CancellationToken,
        accept: bool,
    ) -> Result<(), CoreError> {
        self.record("set_accept_routes", Call::SetAcceptRoutes(accept))?;
        self.with(|s| s.prefs.accept_routes = accept);
        Ok(())
    }

    async fn set_control_url(&self, _scope: &CancellationToken, url: &str) -> Result<(), CoreError> {
        self.record("set_control_url", Call::SetControlUrl(url.to_owned()))?;
        self.with(|s| s.prefs.control_url = url.to_owned());
        Ok(())
    }

    async fn net_check(
        &self,
        _scope: &CancellationToken,
        full: bool,
    ) -> Result<(NetCheckReport, DerpMap), CoreError> {
        self.record("net_check", Call::NetCheck(full))?;
        Ok((NetCheckReport::default(), DerpMap::default()))
    }

    async fn push_file(
        &self,
        _scope: &CancellationToken,
        node: &StableNodeId,
        size: u64,
        name: &str,
        mut body: FileReader,
    ) -> Result<(), CoreError> {
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)
            .await
            .map_err(|e| CoreError::DaemonUnavailable {
                op: "push_file",
                reason: e.to_string(),
            })?;
        self.record(
            "push_file",
            Call::PushFile {
                node: node.clone(),
                size,
                name: name.to_owned(),
                body: bytes,
            },
        )
    }

    async fn await_waiting_files(
        &self,
        _scope: &CancellationToken,
    ) -> Result<Vec<WaitingFile>, CoreError> {
        self.record("await_waiting_files", Call::AwaitWaitingFiles)?;
        Ok(self.with(|s| s.files.iter().map(|(f, _)| f.clone()).collect()))
    }

    async fn get_waiting_file(
        &self,
        _scope: &CancellationToken,
        name: &str,
    ) -> Result<(FileReader, u64), CoreError> {
        self.record("get_waiting_file", Call::GetWaitingFile(name.to_owned()))?;
        let found = self.with(|s| {
            s.files
                .iter()
                .find(|(f, _)| f.name == name)
                .map(|(_, body)| body.clone())
        });
        let body = found.ok_or_else(|| CoreError::DaemonRejected {
            op: "get_waiting_file",
            status: 404,
            message: "not found".into(),
        })?;
        let size = body.len() as u64;
        Ok((Box::pin(io::Cursor::new(body)), size))
    }

    async fn delete_waiting_file(
        &self,
        _scope: &CancellationToken,
        name: &str,
    ) -> Result<(), CoreError> {
        self.record("delete_waiting_file", Call::DeleteWaitingFile(name.to_owned()))?;
        self.with(|s| s.files.retain(|(f, _)| f.name != name));
        Ok(())
    }
}

// ── Builders ────────────────────────────────────────────────────────

pub const SUFFIX: &str = "tail-scale.ts.net";

pub fn peer(key: &str, host: &str, addr: &str) -> PeerInfo {
    let dns = format!("{host}.{SUFFIX}.");
    PeerInfo {
        node_key: NodeKey::new(key),
        stable_id: StableNodeId::new(format!("n{host}")),
        host_name: host.into(),
        display_name: display_name(&dns, SUFFIX, host),
        dns_name: dns,
        addresses: vec![addr.parse().unwrap()],
        online: true,
        ..PeerInfo::default()
    }
}

pub fn status(state: BackendState, me: Option<PeerInfo>, peers: Vec<PeerInfo>) -> StatusFields {
    StatusFields {
        backend_state: state,
        auth_url: None,
        self_peer: me.map(|mut p| {
            p.is_self = true;
            p
        }),
        peers,
        magic_dns_suffix: SUFFIX.into(),
    }
}

pub fn route(s: &str) -> RoutePrefix {
    s.parse().unwrap()
}

pub fn login(id: &str, name: &str) -> LoginProfile {
    LoginProfile {
        id: ProfileId::new(id),
        name: name.into(),
        tailnet: "example.com".into(),
    }
}

// ── Collaborators ───────────────────────────────────────────────────

/// Answers every confirmation with a fixed reply and records URLs.
pub struct ScriptedInteraction {
    pub reply: bool,
    pub confirms: Mutex<Vec<(String, String)>>,
    pub opened: Mutex<Vec<String>>,
}

impl ScriptedInteraction {
    pub fn new(reply: bool) -> Arc<Self> {
        Arc::new(Self {
            reply,
            confirms: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn confirm(&self, title: &str, body: &str) -> bool {
        self.confirms
            .lock()
            .unwrap()
            .push((title.to_owned(), body.to_owned()));
        self.reply
    }

    fn open_url(&self, url: &str) -> io::Result<()> {
        self.opened.lock().unwrap().push(url.to_owned());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn bodies(&self) -> Vec<&'static str> {
        self.sent.borrow().iter().map(|n| n.body).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.sent.borrow_mut().push(notification.clone());
    }
}

/// Tray backend that records updates until shut down.
pub struct RecordingTray {
    pub seen: Arc<Mutex<Vec<TrayUpdate>>>,
}

impl TrayBackend for RecordingTray {
    fn run(self: Box<Self>, mut link: TrayLink) {
        link.ready();
        while let Ok(update) = link.updates.recv() {
            if update == TrayUpdate::Shutdown {
                break;
            }
            self.seen.lock().unwrap().push(update);
        }
    }
}
