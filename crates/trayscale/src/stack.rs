//! The window's side of the page stack: one [`PeerView`] per node, each
//! holding its page model, the switches on it and a cursor over its rows.

use strum::Display;
use tracing::debug;

use trayscale_core::reconcile::LocalSection;
use trayscale_core::{
    Command, NodeKey, PageKind, PageModel, PeerStack, Placeholder, RoutePrefix, ToggleSwitch,
};

/// The three preference switches on the self page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LocalSwitch {
    #[strum(serialize = "Advertise exit node")]
    AdvertiseExitNode,
    #[strum(serialize = "Allow LAN access")]
    AllowLanAccess,
    #[strum(serialize = "Accept routes")]
    AcceptRoutes,
}

impl LocalSwitch {
    pub const ALL: [Self; 3] = [
        Self::AdvertiseExitNode,
        Self::AllowLanAccess,
        Self::AcceptRoutes,
    ];

    pub fn command(self, on: bool) -> Command {
        match self {
            Self::AdvertiseExitNode => Command::AdvertiseExitNode(on),
            Self::AllowLanAccess => Command::AllowLanAccess(on),
            Self::AcceptRoutes => Command::AcceptRoutes(on),
        }
    }

    fn committed(self, local: &LocalSection) -> bool {
        match self {
            Self::AdvertiseExitNode => local.advertise_exit_node,
            Self::AllowLanAccess => local.allow_lan_access,
            Self::AcceptRoutes => local.accept_routes,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalSwitches {
    advertise_exit_node: ToggleSwitch,
    allow_lan_access: ToggleSwitch,
    accept_routes: ToggleSwitch,
}

impl LocalSwitches {
    pub fn get(&self, which: LocalSwitch) -> ToggleSwitch {
        match which {
            LocalSwitch::AdvertiseExitNode => self.advertise_exit_node,
            LocalSwitch::AllowLanAccess => self.allow_lan_access,
            LocalSwitch::AcceptRoutes => self.accept_routes,
        }
    }

    pub fn get_mut(&mut self, which: LocalSwitch) -> &mut ToggleSwitch {
        match which {
            LocalSwitch::AdvertiseExitNode => &mut self.advertise_exit_node,
            LocalSwitch::AllowLanAccess => &mut self.allow_lan_access,
            LocalSwitch::AcceptRoutes => &mut self.accept_routes,
        }
    }

    fn sync(&mut self, local: &LocalSection) {
        for which in LocalSwitch::ALL {
            self.get_mut(which).sync(which.committed(local));
        }
    }
}

/// A selectable line in a page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Switch(LocalSwitch),
    Route(RoutePrefix),
    AddRoute,
    File(String),
    NetCheck,
    /// Use or stop using this peer as exit node.
    ExitNode { in_use: bool },
    SendFile,
    /// A Mullvad exit node on the Mullvad page.
    MullvadNode { key: NodeKey, in_use: bool },
}

#[derive(Debug)]
pub struct PeerView {
    pub kind: PageKind,
    /// `None` until the first update after creation.
    pub page: Option<PageModel>,
    pub switches: LocalSwitches,
    cursor: usize,
}

impl PeerView {
    fn new(kind: PageKind) -> Self {
        Self {
            kind,
            page: None,
            switches: LocalSwitches::default(),
            cursor: 0,
        }
    }

    /// Selectable rows, top to bottom.
    pub fn rows(&self) -> Vec<Row> {
        let Some(page) = &self.page else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        match (&page.local, &page.mullvad) {
            (Some(local), _) => {
                rows.extend(LocalSwitch::ALL.map(Row::Switch));
                rows.extend(local.routes.iter().copied().map(Row::Route));
                rows.push(Row::AddRoute);
                rows.extend(local.files.iter().map(|f| Row::File(f.name.clone())));
                rows.push(Row::NetCheck);
            }
            (None, Some(mullvad)) => {
                rows.extend(mullvad.nodes().map(|n| Row::MullvadNode {
                    key: n.key.clone(),
                    in_use: n.in_use,
                }));
            }
            (None, None) => {
                if page.offers_exit_node {
                    rows.push(Row::ExitNode {
                        in_use: page.is_exit_node,
                    });
                }
                rows.push(Row::SendFile);
            }
        }
        rows
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> Option<Row> {
        self.rows().into_iter().nth(self.cursor)
    }

    pub fn move_cursor(&mut self, down: bool) {
        let len = self.rows().len();
        self.cursor = if down {
            (self.cursor + 1).min(len.saturating_sub(1))
        } else {
            self.cursor.saturating_sub(1)
        };
    }

    pub fn title(&self) -> &str {
        self.page.as_ref().map_or("", |p| p.title.as_str())
    }
}

/// Tracks what the reconciler asked the window to show.
#[derive(Debug, Default)]
pub struct WindowStack {
    placeholder: Option<Placeholder>,
    peers_hidden: bool,
}

impl WindowStack {
    pub fn placeholder(&self) -> Option<Placeholder> {
        self.placeholder
    }

    pub fn peers_hidden(&self) -> bool {
        self.peers_hidden
    }
}

impl PeerStack for WindowStack {
    type View = PeerView;

    fn create(&mut self, kind: PageKind, key: &NodeKey) -> PeerView {
        debug!(node = %key, ?kind, "page created");
        PeerView::new(kind)
    }

    fn destroy(&mut self, key: &NodeKey, _view: PeerView) {
        debug!(node = %key, "page destroyed");
    }

    fn update(&mut self, view: &mut PeerView, page: PageModel) {
        if let Some(local) = &page.local {
            view.switches.sync(local);
        }
        view.page = Some(page);
        let last = view.rows().len().saturating_sub(1);
        view.cursor = view.cursor.min(last);
    }

    fn set_placeholder(&mut self, placeholder: Option<Placeholder>) {
        self.placeholder = placeholder;
    }

    fn set_peers_hidden(&mut self, hidden: bool) {
        self.peers_hidden = hidden;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use trayscale_core::model::peer::MULLVAD_CAP;
    use trayscale_core::{
        BackendState, Location, MULLVAD_PAGE_KEY, PeerInfo, Prefs, Reconciler, Snapshot,
        StableNodeId, WaitingFile,
    };

    use super::*;

    fn peer(key: &str, is_self: bool) -> PeerInfo {
        PeerInfo {
            node_key: NodeKey::new(key),
            stable_id: StableNodeId::new(format!("n{key}")),
            display_name: key.into(),
            is_self,
            offers_exit_node: !is_self,
            addresses: vec!["100.64.0.9".parse().unwrap()],
            ..PeerInfo::default()
        }
    }

    fn snapshot(prefs: Prefs, files: Vec<WaitingFile>) -> Snapshot {
        Snapshot::new(
            BackendState::Running,
            None,
            Some(peer("me", true)),
            vec![peer("beta", false)],
            prefs,
            files,
            String::new(),
        )
    }

    #[test]
    fn self_page_rows_follow_sections() {
        let prefs = Prefs {
            advertise_routes: vec!["10.0.0.0/24".parse().unwrap()],
            ..Prefs::default()
        };
        let files = vec![WaitingFile {
            name: "notes.txt".into(),
            size: 12,
        }];
        let mut r = Reconciler::new(WindowStack::default());
        r.apply(&snapshot(prefs, files));

        let (_, view) = r.view_at(0).unwrap();
        assert_eq!(
            view.rows(),
            vec![
                Row::Switch(LocalSwitch::AdvertiseExitNode),
                Row::Switch(LocalSwitch::AllowLanAccess),
                Row::Switch(LocalSwitch::AcceptRoutes),
                Row::Route("10.0.0.0/24".parse().unwrap()),
                Row::AddRoute,
                Row::File("notes.txt".into()),
                Row::NetCheck,
            ]
        );

        let (_, beta) = r.view_at(1).unwrap();
        assert_eq!(
            beta.rows(),
            vec![Row::ExitNode { in_use: false }, Row::SendFile]
        );
    }

    #[test]
    fn updates_sync_switches_and_clamp_cursor() {
        let prefs = Prefs {
            accept_routes: true,
            advertise_routes: vec!["10.0.0.0/24".parse().unwrap()],
            ..Prefs::default()
        };
        let mut r = Reconciler::new(WindowStack::default());
        r.apply(&snapshot(prefs, Vec::new()));

        let key = NodeKey::new("me");
        let view = r.view_mut(&key).unwrap();
        assert!(view.switches.get(LocalSwitch::AcceptRoutes).active());
        for _ in 0..10 {
            view.move_cursor(true);
        }
        assert_eq!(view.selected(), Some(Row::NetCheck));
        view.switches.get_mut(LocalSwitch::AllowLanAccess).request(true);

        r.apply(&snapshot(Prefs::default(), Vec::new()));
        let view = r.view(&key).unwrap();
        assert!(!view.switches.get(LocalSwitch::AcceptRoutes).active());
        assert!(view.switches.get(LocalSwitch::AllowLanAccess).active());
        assert_eq!(view.cursor(), 4, "one row fewer after the route went away");
        assert_eq!(view.selected(), Some(Row::NetCheck));
    }

    #[test]
    fn switch_in_flight_survives_snapshots_until_settled() {
        let mut r = Reconciler::new(WindowStack::default());
        r.apply(&snapshot(Prefs::default(), Vec::new()));

        let key = NodeKey::new("me");
        let lan = r.view_mut(&key).unwrap().switches.get_mut(LocalSwitch::AllowLanAccess);
        assert_eq!(lan.request(true), Some(true));

        // Periodic polls keep reporting the old value while the command runs.
        r.apply(&snapshot(Prefs::default(), Vec::new()));
        r.apply(&snapshot(Prefs::default(), Vec::new()));
        let lan = r.view(&key).unwrap().switches.get(LocalSwitch::AllowLanAccess);
        assert!(lan.active() && lan.in_flight());

        let allowed = Prefs {
            exit_node_allow_lan_access: true,
            ..Prefs::default()
        };
        r.apply(&snapshot(allowed, Vec::new()));
        let lan = r.view_mut(&key).unwrap().switches.get_mut(LocalSwitch::AllowLanAccess);
        lan.finish();
        assert!(lan.active() && lan.committed() && !lan.in_flight());
    }

    #[test]
    fn mullvad_page_lists_one_row_per_node() {
        let mut me = peer("me", true);
        me.capabilities.insert(MULLVAD_CAP.into());
        let relays = [("se-sto", "SE", "Sweden"), ("de-fra", "DE", "Germany")].map(
            |(host, code, country)| PeerInfo {
                host_name: host.into(),
                is_mullvad: true,
                location: Some(Location {
                    country: country.into(),
                    country_code: code.into(),
                    ..Location::default()
                }),
                ..peer(&format!("nodekey:{host}"), false)
            },
        );
        let prefs = Prefs {
            exit_node_id: Some(StableNodeId::new("nnodekey:se-sto")),
            ..Prefs::default()
        };
        let snapshot = Snapshot::new(
            BackendState::Running,
            None,
            Some(me),
            relays.into(),
            prefs,
            Vec::new(),
            String::new(),
        );
        let mut r = Reconciler::new(WindowStack::default());
        r.apply(&snapshot);

        assert_eq!(r.visible_len(), 2, "relays get no pages of their own");
        let view = r.view(&NodeKey::new(MULLVAD_PAGE_KEY)).unwrap();
        assert_eq!(view.kind, PageKind::Mullvad);
        assert_eq!(
            view.rows(),
            vec![
                Row::MullvadNode {
                    key: NodeKey::new("nodekey:de-fra"),
                    in_use: false,
                },
                Row::MullvadNode {
                    key: NodeKey::new("nodekey:se-sto"),
                    in_use: true,
                },
            ]
        );
    }

    #[test]
    fn hidden_and_placeholder_are_tracked() {
        let mut r = Reconciler::new(WindowStack::default());
        assert_eq!(r.stack().placeholder(), Some(Placeholder::Unreachable));

        r.apply(&snapshot(Prefs::default(), Vec::new()));
        assert_eq!(r.stack().placeholder(), None);
        assert!(!r.stack().peers_hidden());

        let mut stopped = snapshot(Prefs::default(), Vec::new());
        stopped.backend_state = BackendState::Stopped;
        r.apply(&stopped);
        assert!(r.stack().peers_hidden());
        assert_eq!(r.stack().placeholder(), Some(Placeholder::Disconnected));
    }

    #[test]
    fn switch_commands() {
        assert_eq!(
            LocalSwitch::AllowLanAccess.command(true),
            Command::AllowLanAccess(true)
        );
        assert_eq!(LocalSwitch::AdvertiseExitNode.to_string(), "Advertise exit node");
    }
}
