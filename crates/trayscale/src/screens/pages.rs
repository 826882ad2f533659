//! The page list and the page bodies.

use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use trayscale_core::display::PeerIcon;
use trayscale_core::reconcile::LocalSection;
use trayscale_core::{
    DerpMap, MullvadSection, NetCheckReport, PageModel, Placeholder, ToggleSwitch,
};

use crate::stack::{LocalSwitch, PeerView, Row};
use crate::theme;
use crate::widgets::fmt::{fmt_ago, fmt_bytes, fmt_date, fmt_latency, yes_no};

/// Latency rows shown under the netcheck report.
const MAX_LATENCIES: usize = 8;

/// The last netcheck result, kept until the next run.
#[derive(Debug, Clone)]
pub struct NetCheckView {
    pub report: NetCheckReport,
    pub derp: DerpMap,
}

/// One line of the page list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub title: String,
    pub icon: Option<PeerIcon>,
    pub online: bool,
}

impl ListEntry {
    pub fn for_view(view: &PeerView) -> Self {
        Self {
            title: view.title().to_owned(),
            icon: view.page.as_ref().map(|p| p.icon),
            online: view.page.as_ref().is_some_and(|p| p.online),
        }
    }
}

fn icon_glyph(icon: Option<PeerIcon>) -> &'static str {
    match icon {
        Some(PeerIcon::Workgroup) => "⇄",
        Some(PeerIcon::Server) => "▣",
        Some(PeerIcon::RemoteFolder) => "□",
        None => " ",
    }
}

fn panel_block(title: &str, focused: bool) -> Block<'static> {
    Block::default()
        .title(format!(" {title} "))
        .title_style(theme::title_style())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(if focused {
            theme::border_focused()
        } else {
            theme::border_default()
        })
}

pub fn render_list(frame: &mut Frame, area: Rect, entries: &[ListEntry], selected: usize, focused: bool) {
    let items: Vec<ListItem> = entries
        .iter()
        .map(|e| {
            let dot = if e.online {
                Span::styled("● ", Style::default().fg(theme::SUCCESS_GREEN))
            } else {
                Span::styled("○ ", theme::switch_off())
            };
            ListItem::new(Line::from(vec![
                dot,
                Span::styled(format!("{} ", icon_glyph(e.icon)), theme::key_hint()),
                Span::styled(e.title.clone(), theme::text()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(panel_block("Machines", focused))
        .highlight_style(theme::selected())
        .highlight_symbol("▸");
    let mut state = ListState::default().with_selected((!entries.is_empty()).then_some(selected));
    frame.render_stateful_widget(list, area, &mut state);
}

pub fn render_placeholder(frame: &mut Frame, area: Rect, placeholder: Placeholder) {
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(Placeholder::TITLE, theme::title_style())),
        Line::from(""),
        Line::from(Span::styled(placeholder.hint(), theme::text())),
    ];
    match placeholder {
        Placeholder::NeedsLogin | Placeholder::Disconnected => {
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::styled("c ", theme::key_hint_key()),
                Span::styled("to connect", theme::key_hint()),
            ]));
        }
        Placeholder::Unreachable | Placeholder::Empty => {}
    }
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(panel_block("Tailscale", false))
            .wrap(Wrap { trim: true }),
        area,
    );
}

// ── Page bodies ─────────────────────────────────────────────────────

/// Builds the body lines, tracking which line the cursor is on.
struct Body<'a> {
    lines: Vec<Line<'static>>,
    view: &'a PeerView,
    focused: bool,
    row: usize,
    cursor_line: usize,
}

impl Body<'_> {
    fn section(&mut self, title: &str) {
        if !self.lines.is_empty() {
            self.lines.push(Line::from(""));
        }
        self.lines
            .push(Line::from(Span::styled(title.to_owned(), theme::section())));
    }

    fn field(&mut self, label: &str, value: impl Into<String>) {
        self.lines.push(Line::from(vec![
            Span::styled(format!("  {label:<14}"), theme::key_hint()),
            Span::styled(value.into(), theme::text()),
        ]));
    }

    fn plain(&mut self, text: impl Into<String>) {
        self.lines
            .push(Line::from(Span::styled(format!("  {}", text.into()), theme::text())));
    }

    /// A selectable row. `spans` follow the cursor marker.
    fn row(&mut self, mut spans: Vec<Span<'static>>) {
        let here = self.row == self.view.cursor();
        self.row += 1;
        let marker = if here && self.focused { "▸ " } else { "  " };
        spans.insert(0, Span::styled(marker, theme::key_hint_key()));
        let mut line = Line::from(spans);
        if here {
            self.cursor_line = self.lines.len();
            if self.focused {
                line = line.style(Style::default().bg(theme::BG_HIGHLIGHT));
            }
        }
        self.lines.push(line);
    }

    fn action(&mut self, label: &str) {
        self.row(vec![Span::styled(
            label.to_owned(),
            Style::default().fg(theme::NEON_CYAN),
        )]);
    }

    fn switch(&mut self, which: LocalSwitch, switch: ToggleSwitch) {
        let (text, style) = match (switch.active(), switch.active() == switch.committed()) {
            (true, true) => ("[ on]", theme::switch_on()),
            (false, true) => ("[off]", theme::switch_off()),
            (true, false) => ("[ on…]", theme::switch_pending()),
            (false, false) => ("[off…]", theme::switch_pending()),
        };
        self.row(vec![
            Span::styled(text, style),
            Span::styled(format!(" {which}"), theme::text()),
        ]);
    }

    fn addresses(&mut self, page: &PageModel) {
        self.section("Addresses");
        if page.addresses.is_empty() {
            self.plain("none");
        }
        for addr in &page.addresses {
            self.plain(addr.to_string());
        }
    }

    fn local(&mut self, local: &LocalSection, netcheck: Option<&NetCheckView>) {
        self.section("Preferences");
        for which in LocalSwitch::ALL {
            self.switch(which, self.view.switches.get(which));
        }
        if local.exit_node_active {
            self.plain("Using an exit node");
        }

        self.section("Advertised Routes");
        for route in &local.routes {
            self.row(vec![
                Span::styled(route.to_string(), theme::text()),
                Span::styled("  x remove", theme::key_hint()),
            ]);
        }
        self.action("+ Add route");

        if local.files_visible() {
            self.section("Waiting Files");
            for file in &local.files {
                self.row(vec![
                    Span::styled(file.name.clone(), theme::text()),
                    Span::styled(format!("  {}", fmt_bytes(file.size)), theme::key_hint()),
                    Span::styled("  Enter save  d delete", theme::key_hint()),
                ]);
            }
        }

        self.section("Network Check");
        self.action("Run network check");
        if let Some(nc) = netcheck {
            self.netcheck(nc);
        }
    }

    fn netcheck(&mut self, nc: &NetCheckView) {
        let r = &nc.report;
        self.field("UDP", yes_no(Some(r.udp)));
        let v4 = match &r.global_v4 {
            Some(addr) if r.ipv4 => format!("yes, {addr}"),
            _ => yes_no(Some(r.ipv4)).to_owned(),
        };
        self.field("IPv4", v4);
        let v6 = match &r.global_v6 {
            Some(addr) if r.ipv6 => format!("yes, {addr}"),
            _ => yes_no(Some(r.ipv6)).to_owned(),
        };
        self.field("IPv6", v6);
        self.field("UPnP", yes_no(r.upnp));
        self.field("NAT-PMP", yes_no(r.pmp));
        self.field("PCP", yes_no(r.pcp));
        self.field("Hair pinning", yes_no(r.hair_pinning));
        self.field("Captive portal", yes_no(r.captive_portal));
        self.field(
            "Preferred DERP",
            r.preferred_derp_name(&nc.derp).unwrap_or_else(|| "-".into()),
        );
        for (name, latency) in r.derp_latencies(&nc.derp).into_iter().take(MAX_LATENCIES) {
            self.lines.push(Line::from(vec![
                Span::styled(format!("    {name:<22}"), theme::text()),
                Span::styled(fmt_latency(latency), theme::key_hint()),
            ]));
        }
    }

    fn mullvad(&mut self, mullvad: &MullvadSection) {
        self.section("Exit Node");
        self.field(
            "Location",
            mullvad.current.clone().unwrap_or_else(|| "not in use".into()),
        );

        for country in &mullvad.countries {
            if country.in_use() {
                self.section(&format!("{}  (current exit node location)", country.label));
            } else {
                self.section(&country.label);
            }
            for node in &country.nodes {
                let (mark, style) = if node.in_use {
                    ("[ on]", theme::switch_on())
                } else {
                    ("[off]", theme::switch_off())
                };
                let mut spans = vec![
                    Span::styled(mark, style),
                    Span::styled(format!(" {:<18}", node.city), theme::text()),
                    Span::styled(node.host_name.clone(), theme::key_hint()),
                ];
                if !node.online {
                    spans.push(Span::styled("  offline", theme::switch_off()));
                }
                self.row(spans);
            }
        }
    }

    fn remote(&mut self, page: &PageModel, now: DateTime<Utc>) {
        self.section("Status");
        if page.online {
            self.field("Online", "yes");
        } else {
            let seen = page
                .last_seen
                .map_or_else(|| "never".to_owned(), |t| fmt_ago(t, now));
            self.field("Online", format!("no, last seen {seen}"));
        }
        if let Some(created) = page.created {
            self.field("Created", fmt_date(created));
        }
        self.field("Received", fmt_bytes(page.rx_bytes));
        self.field("Sent", fmt_bytes(page.tx_bytes));

        if !page.primary_routes.is_empty() {
            self.section("Subnet Routes");
            for route in &page.primary_routes {
                self.plain(route.to_string());
            }
        }

        self.section("Actions");
        for row in self.view.rows() {
            match row {
                Row::ExitNode { in_use: true } => self.action("Stop using as exit node"),
                Row::ExitNode { in_use: false } => self.action("Use as exit node"),
                Row::SendFile => self.action("Send file…"),
                _ => {}
            }
        }
    }
}

pub fn render_page(
    frame: &mut Frame,
    area: Rect,
    view: &PeerView,
    focused: bool,
    netcheck: Option<&NetCheckView>,
    now: DateTime<Utc>,
) {
    let block = panel_block(view.title(), focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(page) = &view.page else {
        return;
    };

    let mut body = Body {
        lines: Vec::new(),
        view,
        focused,
        row: 0,
        cursor_line: 0,
    };
    match (&page.local, &page.mullvad) {
        (Some(local), _) => {
            body.addresses(page);
            body.local(local, netcheck);
        }
        (None, Some(mullvad)) => body.mullvad(mullvad),
        (None, None) => {
            body.addresses(page);
            body.remote(page, now);
        }
    }

    let height = usize::from(inner.height.max(1));
    let scroll = body.cursor_line.saturating_sub(height - 1);
    frame.render_widget(
        Paragraph::new(body.lines).scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0)),
        inner,
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use ratatui::{Terminal, backend::TestBackend, buffer::Buffer};

    use trayscale_core::model::peer::MULLVAD_CAP;
    use trayscale_core::{
        BackendState, Location, MULLVAD_PAGE_KEY, NodeKey, PeerInfo, Prefs, Reconciler, Snapshot,
        StableNodeId, WaitingFile,
    };

    use super::*;
    use crate::stack::WindowStack;

    fn text(buffer: &Buffer) -> String {
        let area = buffer.area;
        let mut out = String::new();
        for y in 0..area.height {
            for x in 0..area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn reconciled() -> Reconciler<WindowStack> {
        let me = PeerInfo {
            node_key: NodeKey::new("nodekey:me"),
            display_name: "alpha".into(),
            is_self: true,
            online: true,
            addresses: vec!["100.64.0.1".parse().unwrap()],
            ..PeerInfo::default()
        };
        let beta = PeerInfo {
            node_key: NodeKey::new("nodekey:beta"),
            stable_id: StableNodeId::new("nBeta"),
            display_name: "beta".into(),
            offers_exit_node: true,
            last_seen: Some(now() - chrono::Duration::hours(3)),
            rx_bytes: 2048,
            addresses: vec!["100.64.0.2".parse().unwrap()],
            ..PeerInfo::default()
        };
        let prefs = Prefs {
            accept_routes: true,
            advertise_routes: vec!["10.0.0.0/24".parse().unwrap()],
            ..Prefs::default()
        };
        let files = vec![WaitingFile {
            name: "report.pdf".into(),
            size: 1_000,
        }];
        let snapshot = Snapshot::new(
            BackendState::Running,
            None,
            Some(me),
            vec![beta],
            prefs,
            files,
            String::new(),
        );
        let mut r = Reconciler::new(WindowStack::default());
        r.apply(&snapshot);
        r
    }

    fn draw(f: impl FnOnce(&mut Frame)) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 30)).unwrap();
        terminal.draw(f).unwrap();
        text(terminal.backend().buffer())
    }

    #[test]
    fn self_page_shows_switches_routes_and_files() {
        let r = reconciled();
        let (_, view) = r.view_at(0).unwrap();
        let screen = draw(|f| render_page(f, f.area(), view, true, None, now()));

        assert!(screen.contains("alpha [This machine]"), "{screen}");
        assert!(screen.contains("100.64.0.1"));
        assert!(screen.contains("▸ [off] Advertise exit node"), "{screen}");
        assert!(screen.contains("[ on] Accept routes"));
        assert!(screen.contains("10.0.0.0/24"));
        assert!(screen.contains("+ Add route"));
        assert!(screen.contains("report.pdf"));
        assert!(screen.contains("Run network check"));
    }

    #[test]
    fn pending_switch_is_marked() {
        let mut r = reconciled();
        let view = r.view_mut(&NodeKey::new("nodekey:me")).unwrap();
        view.switches.get_mut(LocalSwitch::AllowLanAccess).request(true);
        let (_, view) = r.view_at(0).unwrap();
        let screen = draw(|f| render_page(f, f.area(), view, false, None, now()));
        assert!(screen.contains("[ on…] Allow LAN access"), "{screen}");
    }

    #[test]
    fn peer_page_shows_status_and_actions() {
        let r = reconciled();
        let (_, view) = r.view_at(1).unwrap();
        let screen = draw(|f| render_page(f, f.area(), view, true, None, now()));

        assert!(screen.contains("no, last seen 3h ago"), "{screen}");
        assert!(screen.contains("Use as exit node"));
        assert!(screen.contains("Send file"));
        assert!(!screen.contains("Advertised Routes"));
    }

    #[test]
    fn netcheck_report_is_listed_by_latency() {
        let r = reconciled();
        let (_, view) = r.view_at(0).unwrap();
        let mut report = NetCheckReport {
            udp: true,
            ipv4: true,
            global_v4: Some("203.0.113.7:41641".into()),
            ..NetCheckReport::default()
        };
        report
            .region_latency
            .insert(1, std::time::Duration::from_millis(80));
        report
            .region_latency
            .insert(2, std::time::Duration::from_millis(12));
        let mut derp = DerpMap::default();
        for (id, name) in [(1, "New York City"), (2, "Frankfurt")] {
            derp.regions.insert(
                id,
                trayscale_core::DerpRegion {
                    id,
                    code: String::new(),
                    name: name.into(),
                },
            );
        }
        let nc = NetCheckView { report, derp };

        let screen = draw(|f| render_page(f, f.area(), view, false, Some(&nc), now()));
        assert!(screen.contains("yes, 203.0.113.7:41641"), "{screen}");
        assert!(screen.contains("Preferred DERP-"));
        let frankfurt = screen.find("Frankfurt").unwrap();
        let nyc = screen.find("New York City").unwrap();
        assert!(frankfurt < nyc);
    }

    #[test]
    fn mullvad_page_groups_nodes_under_countries() {
        let me = PeerInfo {
            node_key: NodeKey::new("nodekey:me"),
            is_self: true,
            online: true,
            capabilities: [MULLVAD_CAP.to_owned()].into(),
            ..PeerInfo::default()
        };
        let relay = |host: &str, country: &str, code: &str, city: &str| PeerInfo {
            node_key: NodeKey::new(format!("nodekey:{host}")),
            stable_id: StableNodeId::new(format!("n{host}")),
            host_name: host.into(),
            online: true,
            is_mullvad: true,
            offers_exit_node: true,
            location: Some(Location {
                country: country.into(),
                country_code: code.into(),
                city: city.into(),
                city_code: String::new(),
            }),
            ..PeerInfo::default()
        };
        let prefs = Prefs {
            exit_node_id: Some(StableNodeId::new("nse-sto-wg-001")),
            ..Prefs::default()
        };
        let snapshot = Snapshot::new(
            BackendState::Running,
            None,
            Some(me),
            vec![
                relay("se-sto-wg-001", "Sweden", "SE", "Stockholm"),
                relay("de-fra-wg-001", "Germany", "DE", "Frankfurt"),
            ],
            prefs,
            Vec::new(),
            String::new(),
        );
        let mut r = Reconciler::new(WindowStack::default());
        r.apply(&snapshot);

        let view = r.view(&NodeKey::new(MULLVAD_PAGE_KEY)).unwrap();
        let screen = draw(|f| render_page(f, f.area(), view, true, None, now()));
        assert!(screen.contains("Mullvad Exit Nodes"), "{screen}");
        assert!(screen.contains("Stockholm, Sweden"), "{screen}");
        assert!(screen.contains("Sweden  (current exit node location)"));
        assert!(screen.contains("[ on] Stockholm"));
        assert!(screen.contains("[off] Frankfurt"));
        assert!(!screen.contains("Addresses"));
        let germany = screen.find("Germany").unwrap();
        let sweden = screen.find("Sweden  (current").unwrap();
        assert!(germany < sweden);
    }

    #[test]
    fn placeholder_offers_to_connect() {
        let screen = draw(|f| render_placeholder(f, f.area(), Placeholder::Disconnected));
        assert!(screen.contains("Not Connected"));
        assert!(screen.contains("to connect"));
    }

    #[test]
    fn list_marks_online_peers() {
        let r = reconciled();
        let entries: Vec<ListEntry> = r.views().map(|(_, v)| ListEntry::for_view(v)).collect();
        assert!(entries[0].online);
        assert!(!entries[1].online);
        let screen = draw(|f| render_list(f, f.area(), &entries, 1, true));
        assert!(screen.contains("▸○ ▣ beta"), "{screen}");
    }
}
