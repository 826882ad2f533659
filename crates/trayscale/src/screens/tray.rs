//! The tray menu, drawn from the tray mirror.
//!
//! Shown as an overlay while the window is open and as the whole screen
//! while it is hidden to the tray.

use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};

use trayscale_core::{MenuItem, TrayEvent, TrayIcon};

use crate::desktop::TrayView;
use crate::theme;
use crate::widgets::centered;

fn selectable(item: &MenuItem) -> bool {
    matches!(item, MenuItem::Entry { enabled: true, .. })
}

/// First selectable entry.
pub fn first(menu: &[MenuItem]) -> usize {
    menu.iter().position(selectable).unwrap_or(0)
}

/// Next selectable entry in the given direction, staying put at either end.
pub fn step(menu: &[MenuItem], cursor: usize, down: bool) -> usize {
    let found = if down {
        menu.iter()
            .enumerate()
            .skip(cursor + 1)
            .find(|(_, item)| selectable(item))
    } else {
        menu.iter()
            .enumerate()
            .take(cursor)
            .rev()
            .find(|(_, item)| selectable(item))
    };
    found.map_or(cursor, |(i, _)| i)
}

/// The event behind the entry under the cursor, if it can be activated.
pub fn event_at(menu: &[MenuItem], cursor: usize) -> Option<TrayEvent> {
    match menu.get(cursor)? {
        MenuItem::Entry {
            enabled: true,
            event,
            ..
        } => Some(*event),
        _ => None,
    }
}

fn icon_line(icon: Option<TrayIcon>) -> Line<'static> {
    let (glyph, label, color) = match icon {
        Some(TrayIcon::Active) => ("●", "connected", theme::SUCCESS_GREEN),
        Some(TrayIcon::ExitNode) => ("◆", "connected through exit node", theme::NEON_CYAN),
        Some(TrayIcon::Inactive) => ("○", "not connected", theme::BORDER_GRAY),
        None => ("×", "tray not running", theme::ERROR_RED),
    };
    Line::from(vec![
        Span::styled(format!(" {glyph} "), Style::default().fg(color)),
        Span::styled(label, theme::key_hint()),
    ])
}

fn menu_lines(view: &TrayView, cursor: usize) -> Vec<Line<'static>> {
    let mut lines = vec![icon_line(view.icon), Line::from("")];
    for (i, item) in view.menu.iter().enumerate() {
        match item {
            MenuItem::Separator => lines.push(Line::from(Span::styled(
                " ────────────────────",
                theme::border_default(),
            ))),
            MenuItem::Entry { label, enabled, .. } => {
                let style = match (*enabled, i == cursor) {
                    (false, _) => theme::disabled(),
                    (true, true) => theme::selected(),
                    (true, false) => theme::text(),
                };
                let marker = if i == cursor && *enabled { "▸ " } else { "  " };
                lines.push(Line::from(Span::styled(format!("{marker}{label}"), style)));
            }
        }
    }
    lines
}

/// Popup form over the window.
pub fn render_tray_menu(frame: &mut Frame, area: Rect, view: &TrayView, cursor: usize) {
    let lines = menu_lines(view, cursor);
    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX).saturating_add(2);
    let popup = centered(area, 44, height);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Tray ")
                .title_style(theme::title_style())
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(theme::border_focused())
                .style(Style::default().bg(theme::BG_DARK)),
        ),
        popup,
    );
}

/// Full-screen form while the window is hidden.
pub fn render_hidden(frame: &mut Frame, area: Rect, view: &TrayView, cursor: usize) {
    let mut lines = menu_lines(view, cursor);
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" Enter ", theme::key_hint_key()),
        Span::styled("activate   ", theme::key_hint()),
        Span::styled("q ", theme::key_hint_key()),
        Span::styled("quit", theme::key_hint()),
    ]));
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Trayscale ")
                .title_style(theme::title_style())
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(theme::border_default()),
        ),
        area,
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use ratatui::{Terminal, backend::TestBackend};

    use trayscale_core::MenuState;

    use super::*;

    fn offline_menu() -> Vec<MenuItem> {
        MenuState::default().build_menu()
    }

    #[test]
    fn cursor_skips_separators_and_disabled_entries() {
        let menu = offline_menu();
        // Show, ---, Connect, Enable exit node (off), This machine (off), ---, Quit
        assert_eq!(first(&menu), 0);
        assert_eq!(step(&menu, 0, true), 2);
        assert_eq!(step(&menu, 2, true), 6);
        assert_eq!(step(&menu, 6, true), 6);
        assert_eq!(step(&menu, 6, false), 2);
        assert_eq!(step(&menu, 0, false), 0);
    }

    #[test]
    fn only_enabled_entries_activate() {
        let menu = offline_menu();
        assert_eq!(event_at(&menu, 2), Some(TrayEvent::Connect));
        assert_eq!(event_at(&menu, 1), None);
        assert_eq!(event_at(&menu, 3), None);
        assert_eq!(event_at(&menu, 99), None);
    }

    #[test]
    fn hidden_screen_lists_the_menu() {
        let view = TrayView::showing(TrayIcon::Inactive, offline_menu());
        let mut terminal = Terminal::new(TestBackend::new(50, 16)).unwrap();
        terminal
            .draw(|f| render_hidden(f, f.area(), &view, 2))
            .unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(screen.contains("not connected"));
        assert!(screen.contains("▸ Connect"));
        assert!(screen.contains("This machine: Not connected"));
    }

    #[test]
    fn hidden_screen_layout() {
        let view = TrayView::showing(TrayIcon::Inactive, offline_menu());
        let mut terminal = Terminal::new(TestBackend::new(40, 13)).unwrap();
        terminal
            .draw(|f| render_hidden(f, f.area(), &view, 2))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let inner: Vec<String> = (1..12u16)
            .map(|y| {
                (1..39u16)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect::<String>()
                    .trim_end()
                    .to_owned()
            })
            .collect();
        insta::assert_snapshot!(inner.join("\n"), @r"
         ○ not connected

          Show
         ────────────────────
        ▸ Connect
          Enable exit node
          This machine: Not connected
         ────────────────────
          Quit

         Enter activate   q quit
        ");
    }
}
