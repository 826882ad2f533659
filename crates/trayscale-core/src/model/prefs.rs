// ── Node preferences ──

use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use super::peer::StableNodeId;

// ── RoutePrefix ─────────────────────────────────────────────────────

/// A CIDR prefix, ordered by address family width, then prefix length,
/// then address.
///
/// Parsing masks host bits, so `10.0.0.1/24` and `10.0.0.0/24` are the
/// same route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutePrefix(IpNet);

impl RoutePrefix {
    pub fn new(net: IpNet) -> Self {
        Self(net.trunc())
    }

    pub fn net(&self) -> IpNet {
        self.0
    }

    pub fn addr(&self) -> IpAddr {
        self.0.addr()
    }

    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }

    /// `0.0.0.0/0` or `::/0`.
    pub fn is_zero_bits(&self) -> bool {
        self.0.prefix_len() == 0
    }

    fn addr_bits(&self) -> u8 {
        self.0.max_prefix_len()
    }

    /// The two routes that together mean "this node is an exit node".
    pub fn exit_routes() -> [Self; 2] {
        [
            Self(IpNet::V4(ipnet::Ipv4Net::default())),
            Self(IpNet::V6(ipnet::Ipv6Net::default())),
        ]
    }
}

impl Ord for RoutePrefix {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr_bits()
            .cmp(&other.addr_bits())
            .then_with(|| self.prefix_len().cmp(&other.prefix_len()))
            .then_with(|| self.addr().cmp(&other.addr()))
    }
}

impl PartialOrd for RoutePrefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RoutePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoutePrefix {
    type Err = ipnet::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<IpNet>().map(Self::new)
    }
}

impl From<IpNet> for RoutePrefix {
    fn from(net: IpNet) -> Self {
        Self::new(net)
    }
}

// ── Prefs ───────────────────────────────────────────────────────────

/// The subset of daemon preferences the UI shows and edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefs {
    pub advertises_exit_node: bool,
    pub exit_node_allow_lan_access: bool,
    pub accept_routes: bool,
    /// User-visible routes in daemon order: deduplicated, zero-bit
    /// prefixes removed.
    pub advertise_routes: Vec<RoutePrefix>,
    pub control_url: String,
    pub exit_node_id: Option<StableNodeId>,
    pub exit_node_ip: Option<IpAddr>,
    pub operator_user: String,
}

impl Prefs {
    /// Routes sorted for display.
    pub fn sorted_routes(&self) -> Vec<RoutePrefix> {
        let mut routes = self.advertise_routes.clone();
        routes.sort();
        routes
    }

    pub fn exit_node_selected(&self) -> bool {
        self.exit_node_id.is_some() || self.exit_node_ip.is_some()
    }
}

/// Order-preserving dedup that also drops zero-bit prefixes.
pub fn normalize_routes(routes: impl IntoIterator<Item = RoutePrefix>) -> Vec<RoutePrefix> {
    let mut out: Vec<RoutePrefix> = Vec::new();
    for route in routes {
        if route.is_zero_bits() || out.contains(&route) {
            continue;
        }
        out.push(route);
    }
    out
}

/// Add `route` unless already present.
pub fn with_route(routes: &[RoutePrefix], route: RoutePrefix) -> Vec<RoutePrefix> {
    normalize_routes(routes.iter().copied().chain(std::iter::once(route)))
}

/// Remove every occurrence of `route`.
pub fn without_route(routes: &[RoutePrefix], route: RoutePrefix) -> Vec<RoutePrefix> {
    routes.iter().copied().filter(|r| *r != route).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn p(s: &str) -> RoutePrefix {
        s.parse().unwrap()
    }

    #[test]
    fn ordering_is_family_then_bits_then_addr() {
        let mut routes = vec![
            p("fd7a::/48"),
            p("10.0.0.0/24"),
            p("192.168.0.0/16"),
            p("10.0.0.0/8"),
            p("0.0.0.0/0"),
            p("::/0"),
        ];
        routes.sort();
        let shown: Vec<String> = routes.iter().map(ToString::to_string).collect();
        assert_eq!(
            shown,
            [
                "0.0.0.0/0",
                "10.0.0.0/8",
                "192.168.0.0/16",
                "10.0.0.0/24",
                "::/0",
                "fd7a::/48"
            ]
        );
    }

    #[test]
    fn ordering_is_total() {
        let all = [
            p("10.0.0.0/24"),
            p("10.0.0.0/24"),
            p("10.0.1.0/24"),
            p("10.0.0.0/16"),
            p("::/0"),
            p("fd00::/8"),
        ];
        for a in &all {
            for b in &all {
                let lt = a < b;
                let eq = a == b;
                let gt = a > b;
                assert_eq!([lt, eq, gt].iter().filter(|x| **x).count(), 1, "{a} vs {b}");
                assert_eq!(a.cmp(b) == Ordering::Equal, eq);
            }
        }
    }

    #[test]
    fn parse_masks_host_bits() {
        assert_eq!(p("10.0.0.7/24"), p("10.0.0.0/24"));
        assert!("not-a-prefix".parse::<RoutePrefix>().is_err());
    }

    #[test]
    fn normalize_dedups_in_order_and_drops_exit_routes() {
        let routes = normalize_routes([
            p("10.1.0.0/16"),
            p("0.0.0.0/0"),
            p("10.0.0.0/24"),
            p("10.1.0.0/16"),
            p("::/0"),
        ]);
        assert_eq!(routes, vec![p("10.1.0.0/16"), p("10.0.0.0/24")]);
    }

    #[test]
    fn add_then_remove_restores_original() {
        let original = vec![p("192.168.1.0/24"), p("10.0.0.0/8")];
        let added = with_route(&original, p("10.0.0.0/24"));
        assert_eq!(added.len(), 3);
        assert_eq!(without_route(&added, p("10.0.0.0/24")), original);
    }

    #[test]
    fn adding_existing_route_is_noop() {
        let original = vec![p("10.0.0.0/24")];
        assert_eq!(with_route(&original, p("10.0.0.0/24")), original);
    }
}
