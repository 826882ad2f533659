// ── Mullvad exit nodes ──
//
// Mullvad exit nodes share one page, grouped by country and then city,
// instead of getting a page each. The page exists while the local node may
// use them.

use std::collections::BTreeMap;

use crate::model::{Location, NodeKey, PeerInfo, Snapshot, StableNodeId};

/// Key of the Mullvad page in the view map. Real node keys carry a
/// `nodekey:` prefix, so it cannot collide with a peer.
pub const MULLVAD_PAGE_KEY: &str = "mullvad";

pub const MULLVAD_PAGE_TITLE: &str = "Mullvad Exit Nodes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MullvadNode {
    pub key: NodeKey,
    pub stable_id: StableNodeId,
    pub city: String,
    pub host_name: String,
    pub online: bool,
    /// Currently used as exit node.
    pub in_use: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MullvadCountry {
    pub code: String,
    /// Flag and country name.
    pub label: String,
    /// Sorted by state, city, then host name.
    pub nodes: Vec<MullvadNode>,
}

impl MullvadCountry {
    /// The exit node in use is in this country.
    pub fn in_use(&self) -> bool {
        self.nodes.iter().any(|n| n.in_use)
    }
}

struct Group<'a> {
    label: String,
    peers: Vec<(&'a PeerInfo, &'a Location)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MullvadSection {
    /// Sorted by country name.
    pub countries: Vec<MullvadCountry>,
    /// Long location of the Mullvad exit node in use, if any.
    pub current: Option<String>,
}

impl MullvadSection {
    /// Whether the page is shown for `snapshot` at all.
    pub fn available(snapshot: &Snapshot) -> bool {
        snapshot.online()
            && snapshot
                .self_peer
                .as_ref()
                .is_some_and(PeerInfo::can_mullvad)
    }

    pub fn build(snapshot: &Snapshot) -> Self {
        let exit_id = snapshot.exit_node().map(|p| p.stable_id.clone());
        let unknown = Location {
            country: "Unknown location".into(),
            ..Location::default()
        };

        // Keyed by (country name, code).
        let mut by_country: BTreeMap<(String, String), Group<'_>> = BTreeMap::new();
        for peer in snapshot.peers.iter().filter(|p| p.is_mullvad) {
            let location = peer.location.as_ref().unwrap_or(&unknown);
            by_country
                .entry((location.country.clone(), location.country_code.clone()))
                .or_insert_with(|| Group {
                    label: location.country_label(),
                    peers: Vec::new(),
                })
                .peers
                .push((peer, location));
        }

        let mut current = None;
        let countries = by_country
            .into_iter()
            .map(|((_, code), Group { label, mut peers })| {
                peers.sort_by(|(a, la), (b, lb)| {
                    let (city_a, state_a) = la.city_and_state();
                    let (city_b, state_b) = lb.city_and_state();
                    state_a
                        .cmp(state_b)
                        .then_with(|| city_a.cmp(city_b))
                        .then_with(|| a.host_name.cmp(&b.host_name))
                });
                let nodes = peers
                    .into_iter()
                    .map(|(peer, location)| {
                        let in_use = exit_id.as_ref() == Some(&peer.stable_id);
                        if in_use {
                            current = Some(location.long_label());
                        }
                        MullvadNode {
                            key: peer.node_key.clone(),
                            stable_id: peer.stable_id.clone(),
                            city: location.city.clone(),
                            host_name: peer.host_name.clone(),
                            online: peer.online,
                            in_use,
                        }
                    })
                    .collect();
                MullvadCountry { code, label, nodes }
            })
            .collect();

        Self { countries, current }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MullvadNode> {
        self.countries.iter().flat_map(|c| c.nodes.iter())
    }
}
