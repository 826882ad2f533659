// ── Local API wire types ──
//
// Serde mirrors of the daemon's JSON. Field names follow the daemon's
// PascalCase; Go encodes empty slices and maps as `null`, so collection
// fields go through `null_default`.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

// ── Status ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status {
    #[serde(default)]
    pub backend_state: String,
    #[serde(default, rename = "AuthURL")]
    pub auth_url: String,
    #[serde(default, rename = "Self")]
    pub self_status: Option<PeerStatus>,
    #[serde(default, deserialize_with = "null_default")]
    pub peer: IndexMap<String, PeerStatus>,
    #[serde(default)]
    pub current_tailnet: Option<TailnetStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TailnetStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "MagicDNSSuffix")]
    pub magic_dns_suffix: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PeerStatus {
    #[serde(default, rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default, rename = "DNSName")]
    pub dns_name: String,
    #[serde(default, rename = "TailscaleIPs", deserialize_with = "null_default")]
    pub tailscale_ips: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub primary_routes: Vec<String>,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub exit_node: bool,
    #[serde(default)]
    pub exit_node_option: bool,
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub tx_bytes: u64,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
    #[serde(default)]
    pub last_write: Option<String>,
    #[serde(default)]
    pub last_handshake: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub cap_map: BTreeMap<String, serde_json::Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub city_code: String,
}

// ── Prefs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Prefs {
    #[serde(default, rename = "ControlURL")]
    pub control_url: String,
    #[serde(default)]
    pub route_all: bool,
    #[serde(default, rename = "ExitNodeID")]
    pub exit_node_id: String,
    #[serde(default, rename = "ExitNodeIP")]
    pub exit_node_ip: String,
    #[serde(default, rename = "ExitNodeAllowLANAccess")]
    pub exit_node_allow_lan_access: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub advertise_routes: Vec<String>,
    #[serde(default)]
    pub operator_user: String,
}

// ── Profiles ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginProfile {
    #[serde(default, rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub network_profile: Option<NetworkProfile>,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkProfile {
    #[serde(default)]
    pub domain_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserProfile {
    #[serde(default)]
    pub login_name: String,
}

// ── Taildrop ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitingFile {
    pub name: String,
    #[serde(default)]
    pub size: i64,
}

// ── Netcheck ────────────────────────────────────────────────────────

/// The daemon encodes tri-state checks either as JSON booleans or as the
/// strings `"true"`, `"false"` and `""`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OptBool {
    Bool(bool),
    Text(String),
}

impl OptBool {
    pub fn get(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetcheckReport {
    #[serde(default, rename = "UDP")]
    pub udp: bool,
    #[serde(default, rename = "IPv4")]
    pub ipv4: bool,
    #[serde(default, rename = "IPv6")]
    pub ipv6: bool,
    #[serde(default, rename = "GlobalV4")]
    pub global_v4: String,
    #[serde(default, rename = "GlobalV6")]
    pub global_v6: String,
    #[serde(default, rename = "UPnP")]
    pub upnp: Option<OptBool>,
    #[serde(default, rename = "PMP")]
    pub pmp: Option<OptBool>,
    #[serde(default, rename = "PCP")]
    pub pcp: Option<OptBool>,
    #[serde(default, rename = "CaptivePortal")]
    pub captive_portal: Option<OptBool>,
    #[serde(default, rename = "HairPinning")]
    pub hair_pinning: Option<OptBool>,
    #[serde(default, rename = "PreferredDERP")]
    pub preferred_derp: u32,
    /// Nanoseconds, keyed by region ID.
    #[serde(default, rename = "RegionLatency", deserialize_with = "null_default")]
    pub region_latency: BTreeMap<u32, u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DerpMap {
    #[serde(default, deserialize_with = "null_default")]
    pub regions: BTreeMap<u32, DerpRegion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DerpRegion {
    #[serde(default, rename = "RegionID")]
    pub region_id: u32,
    #[serde(default)]
    pub region_code: String,
    #[serde(default)]
    pub region_name: String,
}

// ── Requests ────────────────────────────────────────────────────────

/// Body for `POST /localapi/v0/start`. `update_prefs` is the full prefs
/// object as read from the daemon, so fields this crate does not model
/// survive the round trip.
#[derive(Debug, Serialize)]
pub struct StartOptions {
    #[serde(rename = "UpdatePrefs")]
    pub update_prefs: serde_json::Value,
}
