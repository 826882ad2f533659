// ── Peer domain types ──

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::prefs::RoutePrefix;

/// Tag carried by Mullvad exit nodes.
pub const MULLVAD_TAG: &str = "tag:mullvad-exit-node";

/// Capability granting access to Mullvad exit nodes.
pub const MULLVAD_CAP: &str = "mullvad";

// ── Identifiers ─────────────────────────────────────────────────────

/// Opaque, stable identifier for a node (its node public key).
///
/// The reconciler keys per-peer views by this value.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The control plane's stable node ID. Taildrop pushes and exit-node
/// selection address peers by this ID rather than by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableNodeId(String);

impl StableNodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for StableNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Location ────────────────────────────────────────────────────────

/// Where a node says it is. Only Mullvad exit nodes report one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    /// ISO 3166-1 alpha-2, upper case.
    pub country_code: String,
    /// May carry a state suffix, as in `"Dallas, TX"`.
    pub city: String,
    pub city_code: String,
}

impl Location {
    /// Regional indicator pair for the country code, or an empty string
    /// when the code is not two ASCII letters.
    pub fn flag(&self) -> String {
        let code = self.country_code.as_bytes();
        if code.len() != 2 || !code.iter().all(u8::is_ascii_alphabetic) {
            return String::new();
        }
        code.iter()
            .filter_map(|c| char::from_u32(0x1F1E6 + u32::from(c.to_ascii_uppercase() - b'A')))
            .collect()
    }

    /// `"🇸🇪 Sweden"`
    pub fn country_label(&self) -> String {
        format!("{} {}", self.flag(), self.country).trim().to_owned()
    }

    /// `"🇸🇪 Gothenburg, Sweden"`
    pub fn long_label(&self) -> String {
        format!("{} {}, {}", self.flag(), self.city, self.country)
            .trim()
            .to_owned()
    }

    /// Split `"Dallas, TX"` into `("Dallas", "TX")`. Cities without a
    /// two-letter state suffix come back with an empty state.
    pub fn city_and_state(&self) -> (&str, &str) {
        let city = self.city.trim_end();
        let Some((head, state)) = city.rsplit_once(char::is_whitespace) else {
            return (city, "");
        };
        let is_state = state.len() == 2 && state.bytes().all(|b| b.is_ascii_uppercase());
        if !is_state || head.trim().is_empty() {
            return (city, "");
        }
        let head = head.trim_end();
        (head.strip_suffix(',').unwrap_or(head), state)
    }
}

// ── PeerInfo ────────────────────────────────────────────────────────

/// One node of the tailnet as seen in a single poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerInfo {
    pub node_key: NodeKey,
    pub stable_id: StableNodeId,
    pub host_name: String,
    pub dns_name: String,
    /// Suffix-trimmed, IDN-decoded and truncated; see [`crate::display`].
    pub display_name: String,
    /// Sorted by IP byte order, deduplicated.
    pub addresses: Vec<IpAddr>,
    pub is_self: bool,
    /// This node is the exit node currently in use.
    pub is_exit_node: bool,
    pub offers_exit_node: bool,
    pub online: bool,
    pub is_mullvad: bool,
    pub location: Option<Location>,
    pub last_seen: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub tags: BTreeSet<String>,
    pub capabilities: BTreeSet<String>,
    /// Subnet routes this peer serves, zero-bit prefixes excluded.
    pub primary_routes: Vec<RoutePrefix>,

    // Not displayed; changes on every handshake.
    pub last_handshake: Option<DateTime<Utc>>,
    pub last_write: Option<DateTime<Utc>>,
}

impl PeerInfo {
    /// Whether this node may use Mullvad exit nodes.
    pub fn can_mullvad(&self) -> bool {
        self.capabilities.contains(MULLVAD_CAP)
    }

    /// Smallest address, used to identify the machine in short labels.
    pub fn primary_addr(&self) -> Option<IpAddr> {
        self.addresses.iter().min().copied()
    }

    /// Full structural equality, handshake bookkeeping included.
    pub fn identical(&self, other: &Self) -> bool {
        self == other
            && self.last_handshake == other.last_handshake
            && self.last_write == other.last_write
    }
}

/// Equality over what the UI renders. Handshake and write timestamps move
/// on every poll of an idle tailnet and are deliberately left out.
impl PartialEq for PeerInfo {
    fn eq(&self, other: &Self) -> bool {
        self.node_key == other.node_key
            && self.stable_id == other.stable_id
            && self.host_name == other.host_name
            && self.dns_name == other.dns_name
            && self.display_name == other.display_name
            && self.addresses == other.addresses
            && self.is_self == other.is_self
            && self.is_exit_node == other.is_exit_node
            && self.offers_exit_node == other.offers_exit_node
            && self.online == other.online
            && self.is_mullvad == other.is_mullvad
            && self.location == other.location
            && self.last_seen == other.last_seen
            && self.created == other.created
            && self.rx_bytes == other.rx_bytes
            && self.tx_bytes == other.tx_bytes
            && self.tags == other.tags
            && self.capabilities == other.capabilities
            && self.primary_routes == other.primary_routes
    }
}

impl Eq for PeerInfo {}
