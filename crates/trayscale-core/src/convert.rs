// ── Wire-to-domain conversion ──
//
// Translates the daemon's loosely typed JSON into the domain model. Bad
// addresses or prefixes inside an otherwise valid response are dropped with
// a debug log rather than failing the whole poll.

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use tracing::debug;

use crate::daemon::StatusFields;
use crate::daemon::wire;
use crate::display;
use crate::model::peer::MULLVAD_TAG;
use crate::model::prefs::normalize_routes;
use crate::model::{
    BackendState, DerpMap, DerpRegion, Location, LoginProfile, NetCheckReport, NodeKey, PeerInfo,
    Prefs, ProfileId, Profiles, RoutePrefix, StableNodeId, WaitingFile,
};

/// Go's zero `time.Time` serializes as year 1; treat it as absent.
fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc);
    (parsed.year() > 1).then_some(parsed)
}

fn parse_addrs(raw: &[String]) -> Vec<IpAddr> {
    let mut addrs: Vec<IpAddr> = raw
        .iter()
        .filter_map(|a| match a.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                debug!(addr = %a, "ignoring unparsable address");
                None
            }
        })
        .collect();
    addrs.sort();
    addrs.dedup();
    addrs
}

fn parse_prefixes(raw: &[String]) -> Vec<RoutePrefix> {
    raw.iter()
        .filter_map(|p| match p.parse() {
            Ok(prefix) => Some(prefix),
            Err(_) => {
                debug!(prefix = %p, "ignoring unparsable prefix");
                None
            }
        })
        .collect()
}

fn peer_info(raw: &wire::PeerStatus, magic_dns_suffix: &str, is_self: bool) -> PeerInfo {
    let tags: BTreeSet<String> = raw.tags.iter().cloned().collect();
    let capabilities: BTreeSet<String> = raw
        .cap_map
        .keys()
        .chain(raw.capabilities.iter())
        .cloned()
        .collect();

    PeerInfo {
        node_key: NodeKey::new(raw.public_key.clone()),
        stable_id: StableNodeId::new(raw.id.clone()),
        host_name: raw.host_name.clone(),
        dns_name: raw.dns_name.clone(),
        display_name: display::display_name(&raw.dns_name, magic_dns_suffix, &raw.host_name),
        addresses: parse_addrs(&raw.tailscale_ips),
        is_self,
        is_exit_node: raw.exit_node,
        offers_exit_node: raw.exit_node_option,
        online: raw.online,
        is_mullvad: tags.contains(MULLVAD_TAG),
        location: raw.location.as_ref().map(|l| Location {
            country: l.country.clone(),
            country_code: l.country_code.to_ascii_uppercase(),
            city: l.city.clone(),
            city_code: l.city_code.clone(),
        }),
        last_seen: parse_time(raw.last_seen.as_deref()),
        created: parse_time(raw.created.as_deref()),
        rx_bytes: raw.rx_bytes,
        tx_bytes: raw.tx_bytes,
        tags,
        capabilities,
        primary_routes: normalize_routes(parse_prefixes(&raw.primary_routes)),
        last_handshake: parse_time(raw.last_handshake.as_deref()),
        last_write: parse_time(raw.last_write.as_deref()),
    }
}

pub(crate) fn status_fields(status: &wire::Status) -> StatusFields {
    let magic_dns_suffix = status
        .current_tailnet
        .as_ref()
        .map(|t| t.magic_dns_suffix.clone())
        .unwrap_or_default();

    let backend_state = status.backend_state.parse().unwrap_or_else(|_| {
        debug!(state = %status.backend_state, "unknown backend state");
        BackendState::NoState
    });

    let self_peer = status
        .self_status
        .as_ref()
        .filter(|s| !s.public_key.is_empty())
        .map(|s| peer_info(s, &magic_dns_suffix, true));

    let peers = status
        .peer
        .values()
        .map(|p| peer_info(p, &magic_dns_suffix, false))
        .collect();

    StatusFields {
        backend_state,
        auth_url: (!status.auth_url.is_empty()).then(|| status.auth_url.clone()),
        self_peer,
        peers,
        magic_dns_suffix,
    }
}

pub(crate) fn prefs(raw: &wire::Prefs) -> Prefs {
    let all_routes = parse_prefixes(&raw.advertise_routes);
    let [v4, v6] = RoutePrefix::exit_routes();
    let advertises_exit_node = all_routes.contains(&v4) && all_routes.contains(&v6);

    Prefs {
        advertises_exit_node,
        exit_node_allow_lan_access: raw.exit_node_allow_lan_access,
        accept_routes: raw.route_all,
        advertise_routes: normalize_routes(all_routes),
        control_url: raw.control_url.clone(),
        exit_node_id: (!raw.exit_node_id.is_empty())
            .then(|| StableNodeId::new(raw.exit_node_id.clone())),
        exit_node_ip: raw.exit_node_ip.parse().ok(),
        operator_user: raw.operator_user.clone(),
    }
}

fn login_profile(raw: wire::LoginProfile) -> LoginProfile {
    let login = raw.user_profile.map(|u| u.login_name).unwrap_or_default();
    LoginProfile {
        id: ProfileId::new(raw.id),
        name: if raw.name.is_empty() { login } else { raw.name },
        tailnet: raw.network_profile.map(|n| n.domain_name).unwrap_or_default(),
    }
}

pub(crate) fn profiles(current: wire::LoginProfile, all: Vec<wire::LoginProfile>) -> Profiles {
    Profiles::new(
        Some(login_profile(current)),
        all.into_iter().map(login_profile).collect(),
    )
}

pub(crate) fn waiting_files(raw: Vec<wire::WaitingFile>) -> Vec<WaitingFile> {
    raw.into_iter()
        .map(|f| WaitingFile {
            name: f.name,
            size: u64::try_from(f.size).unwrap_or(0),
        })
        .collect()
}

fn opt(raw: Option<&wire::OptBool>) -> Option<bool> {
    raw.and_then(wire::OptBool::get)
}

pub(crate) fn netcheck(raw: &wire::NetcheckReport) -> NetCheckReport {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_owned());
    NetCheckReport {
        udp: raw.udp,
        ipv4: raw.ipv4,
        ipv6: raw.ipv6,
        global_v4: non_empty(&raw.global_v4),
        global_v6: non_empty(&raw.global_v6),
        upnp: opt(raw.upnp.as_ref()),
        pmp: opt(raw.pmp.as_ref()),
        pcp: opt(raw.pcp.as_ref()),
        captive_portal: opt(raw.captive_portal.as_ref()),
        hair_pinning: opt(raw.hair_pinning.as_ref()),
        preferred_derp: raw.preferred_derp,
        region_latency: raw
            .region_latency
            .iter()
            .map(|(id, ns)| (*id, Duration::from_nanos(*ns)))
            .collect(),
    }
}

pub(crate) fn derp_map(raw: &wire::DerpMap) -> DerpMap {
    DerpMap {
        regions: raw
            .regions
            .iter()
            .map(|(id, r)| {
                (
                    *id,
                    DerpRegion {
                        id: *id,
                        code: r.region_code.clone(),
                        name: r.region_name.clone(),
                    },
                )
            })
            .collect(),
    }
}
