// ── Status snapshot ──
//
// One immutable view of the daemon per poll. Published behind an `Arc` and
// never mutated afterwards; a newer snapshot replaces it wholesale.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::time::Instant;

use super::peer::PeerInfo;
use super::prefs::Prefs;
use super::profile::Profiles;

/// The daemon's backend state machine.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum BackendState {
    #[default]
    NoState,
    NeedsLogin,
    NeedsMachineAuth,
    Stopped,
    Starting,
    Running,
}

impl BackendState {
    /// States in which the peer stack is replaced by the placeholder page.
    pub fn is_disconnected(self) -> bool {
        matches!(self, Self::NoState | Self::Stopped)
    }
}

/// A Taildrop file waiting for local acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitingFile {
    pub name: String,
    pub size: u64,
}

/// Everything one poll learned about the daemon.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The poll succeeded. When false, the remaining fields carry the last
    /// known detail.
    pub reachable: bool,
    pub backend_state: BackendState,
    /// Present only in `NeedsLogin`, and only once the daemon has an URL.
    /// A `NeedsLogin` snapshot without one is normal right after logout;
    /// connecting then starts an interactive login to produce it.
    pub auth_url: Option<String>,
    /// The local node. `None` until the first successful poll.
    pub self_peer: Option<PeerInfo>,
    /// Remote peers in daemon order, keys distinct and never the self key.
    pub peers: Vec<PeerInfo>,
    pub prefs: Prefs,
    pub waiting_files: Vec<WaitingFile>,
    pub magic_dns_suffix: String,
    pub profiles: Profiles,
    pub captured_at: Instant,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            reachable: false,
            backend_state: BackendState::NoState,
            auth_url: None,
            self_peer: None,
            peers: Vec::new(),
            prefs: Prefs::default(),
            waiting_files: Vec::new(),
            magic_dns_suffix: String::new(),
            profiles: Profiles::default(),
            captured_at: Instant::now(),
        }
    }
}

impl Snapshot {
    /// Build a snapshot, enforcing the auth-URL and key invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend_state: BackendState,
        auth_url: Option<String>,
        self_peer: Option<PeerInfo>,
        peers: Vec<PeerInfo>,
        prefs: Prefs,
        waiting_files: Vec<WaitingFile>,
        magic_dns_suffix: String,
    ) -> Self {
        let auth_url = auth_url
            .filter(|url| !url.is_empty())
            .filter(|_| backend_state == BackendState::NeedsLogin);

        let self_key = self_peer.as_ref().map(|p| p.node_key.clone());
        let mut seen = std::collections::HashSet::new();
        let peers = peers
            .into_iter()
            .filter(|p| Some(&p.node_key) != self_key.as_ref())
            .filter(|p| seen.insert(p.node_key.clone()))
            .collect();

        Self {
            reachable: true,
            backend_state,
            auth_url,
            self_peer,
            peers,
            prefs,
            waiting_files,
            magic_dns_suffix,
            profiles: Profiles::default(),
            captured_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_profiles(mut self, profiles: Profiles) -> Self {
        self.profiles = profiles;
        self
    }

    /// A failed poll: same detail as `prior`, marked unreachable.
    pub fn unreachable(prior: &Self) -> Self {
        Self {
            reachable: false,
            captured_at: Instant::now(),
            ..prior.clone()
        }
    }

    /// Reachable and `Running`.
    pub fn online(&self) -> bool {
        self.reachable && self.backend_state == BackendState::Running
    }

    pub fn needs_auth(&self) -> bool {
        self.backend_state == BackendState::NeedsLogin
    }

    /// `{self} ∪ peers`, self first.
    pub fn all_peers(&self) -> impl Iterator<Item = &PeerInfo> {
        self.self_peer.iter().chain(self.peers.iter())
    }

    pub fn exit_node_active(&self) -> bool {
        self.prefs.exit_node_selected()
    }

    /// The peer currently used as exit node, found by ID then by address.
    pub fn exit_node(&self) -> Option<&PeerInfo> {
        if let Some(id) = &self.prefs.exit_node_id {
            if let Some(peer) = self.peers.iter().find(|p| &p.stable_id == id) {
                return Some(peer);
            }
        }
        let ip = self.prefs.exit_node_ip?;
        self.peers.iter().find(|p| p.addresses.contains(&ip))
    }

    pub fn self_addr(&self) -> Option<IpAddr> {
        self.self_peer.as_ref().and_then(PeerInfo::primary_addr)
    }

    /// Whether `user` is the daemon's configured operator.
    pub fn operator_is(&self, user: &str) -> bool {
        !user.is_empty() && self.prefs.operator_user == user
    }

    /// Full structural equality, timestamps and handshake data included.
    pub fn identical(&self, other: &Self) -> bool {
        self == other
            && self.captured_at == other.captured_at
            && self
                .all_peers()
                .zip(other.all_peers())
                .all(|(a, b)| a.identical(b))
    }
}

/// Equality over the fields the UI depends on; `captured_at` is ignored.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.reachable == other.reachable
            && self.backend_state == other.backend_state
            && self.auth_url == other.auth_url
            && self.self_peer == other.self_peer
            && self.peers == other.peers
            && self.prefs == other.prefs
            && self.waiting_files == other.waiting_files
            && self.magic_dns_suffix == other.magic_dns_suffix
            && self.profiles == other.profiles
    }
}

impl Eq for Snapshot {}
