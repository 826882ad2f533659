// ── Page models ──
//
// What a peer page shows, computed from one peer and the snapshot it came
// from. Views render these; they never read the snapshot themselves.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use super::mullvad::{MULLVAD_PAGE_KEY, MULLVAD_PAGE_TITLE, MullvadSection};
use crate::display::{PeerIcon, page_title};
use crate::model::{NodeKey, PeerInfo, RoutePrefix, Snapshot, StableNodeId, WaitingFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    SelfPage,
    PeerPage,
    /// Every Mullvad exit node on one page.
    Mullvad,
}

impl PageKind {
    pub fn of(peer: &PeerInfo) -> Self {
        if peer.is_self {
            Self::SelfPage
        } else {
            Self::PeerPage
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageModel {
    pub kind: PageKind,
    pub key: NodeKey,
    pub stable_id: StableNodeId,
    pub title: String,
    pub name: String,
    pub icon: PeerIcon,
    /// Sorted by IP byte order.
    pub addresses: Vec<IpAddr>,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub is_exit_node: bool,
    pub offers_exit_node: bool,
    pub is_mullvad: bool,
    /// Subnet routes served by a remote peer.
    pub primary_routes: Vec<RoutePrefix>,
    /// Present on the self page only.
    pub local: Option<LocalSection>,
    /// Present on the Mullvad page only.
    pub mullvad: Option<MullvadSection>,
}

/// Controls only the local machine's page carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSection {
    pub advertise_exit_node: bool,
    pub allow_lan_access: bool,
    pub accept_routes: bool,
    /// Sorted by `(bit length, prefix length, address)`, zero-bit prefixes
    /// excluded.
    pub routes: Vec<RoutePrefix>,
    pub files: Vec<WaitingFile>,
    pub exit_node_active: bool,
}

impl LocalSection {
    pub fn files_visible(&self) -> bool {
        !self.files.is_empty()
    }
}

impl PageModel {
    pub fn build(peer: &PeerInfo, snapshot: &Snapshot) -> Self {
        let kind = PageKind::of(peer);

        let mut addresses = peer.addresses.clone();
        addresses.sort();

        let mut primary_routes = peer.primary_routes.clone();
        primary_routes.retain(|r| !r.is_zero_bits());
        primary_routes.sort();

        let local = (kind == PageKind::SelfPage).then(|| LocalSection {
            advertise_exit_node: snapshot.prefs.advertises_exit_node,
            allow_lan_access: snapshot.prefs.exit_node_allow_lan_access,
            accept_routes: snapshot.prefs.accept_routes,
            routes: snapshot.prefs.sorted_routes(),
            files: snapshot.waiting_files.clone(),
            exit_node_active: snapshot.exit_node_active(),
        });

        Self {
            kind,
            key: peer.node_key.clone(),
            stable_id: peer.stable_id.clone(),
            title: page_title(peer),
            name: peer.display_name.clone(),
            icon: PeerIcon::for_peer(peer),
            addresses,
            online: peer.online,
            last_seen: peer.last_seen,
            created: peer.created,
            rx_bytes: peer.rx_bytes,
            tx_bytes: peer.tx_bytes,
            is_exit_node: peer.is_exit_node,
            offers_exit_node: peer.offers_exit_node,
            is_mullvad: peer.is_mullvad,
            primary_routes,
            local,
            mullvad: None,
        }
    }

    /// The Mullvad page. Its icon and subtitle follow the Mullvad exit node
    /// in use, if there is one.
    pub fn mullvad(snapshot: &Snapshot) -> Self {
        let section = MullvadSection::build(snapshot);
        let in_use = section.current.is_some();
        Self {
            kind: PageKind::Mullvad,
            key: NodeKey::new(MULLVAD_PAGE_KEY),
            stable_id: StableNodeId::default(),
            title: MULLVAD_PAGE_TITLE.to_owned(),
            name: MULLVAD_PAGE_TITLE.to_owned(),
            icon: if in_use {
                PeerIcon::Workgroup
            } else {
                PeerIcon::Server
            },
            addresses: Vec::new(),
            online: true,
            last_seen: None,
            created: None,
            rx_bytes: 0,
            tx_bytes: 0,
            is_exit_node: in_use,
            offers_exit_node: true,
            is_mullvad: true,
            primary_routes: Vec::new(),
            local: None,
            mullvad: Some(section),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{BackendState, Prefs};

    fn local_peer() -> PeerInfo {
        PeerInfo {
            node_key: NodeKey::new("nodekey:self"),
            display_name: "alpha".into(),
            is_self: true,
            addresses: vec![
                "fd7a:115c:a1e0::1".parse().unwrap(),
                "100.64.0.1".parse().unwrap(),
            ],
            ..PeerInfo::default()
        }
    }

    #[test]
    fn self_page_carries_local_controls() {
        let prefs = Prefs {
            accept_routes: true,
            advertise_routes: vec!["10.0.0.0/24".parse().unwrap(), "10.0.0.0/8".parse().unwrap()],
            ..Prefs::default()
        };
        let snapshot = Snapshot::new(
            BackendState::Running,
            None,
            Some(local_peer()),
            Vec::new(),
            prefs,
            Vec::new(),
            String::new(),
        );

        let page = PageModel::build(&local_peer(), &snapshot);
        assert_eq!(page.kind, PageKind::SelfPage);
        assert_eq!(page.title, "alpha [This machine]");
        assert_eq!(
            page.addresses,
            vec![
                "100.64.0.1".parse::<IpAddr>().unwrap(),
                "fd7a:115c:a1e0::1".parse().unwrap()
            ]
        );

        let local = page.local.unwrap();
        assert!(local.accept_routes);
        assert!(!local.files_visible());
        assert_eq!(
            local.routes.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["10.0.0.0/8", "10.0.0.0/24"]
        );
    }

    #[test]
    fn remote_pages_have_no_local_section() {
        let peer = PeerInfo {
            node_key: NodeKey::new("nodekey:beta"),
            display_name: "beta".into(),
            offers_exit_node: true,
            ..PeerInfo::default()
        };
        let page = PageModel::build(&peer, &Snapshot::default());
        assert_eq!(page.kind, PageKind::PeerPage);
        assert_eq!(page.icon, PeerIcon::Server);
        assert!(page.local.is_none());
    }
}
