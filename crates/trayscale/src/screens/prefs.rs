//! Preferences panel.

use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};

use trayscale_config::Settings;

use crate::theme;
use crate::widgets::fmt::fmt_interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefRow {
    TrayIcon,
    PollingInterval,
    ControlServer,
}

impl PrefRow {
    pub const ALL: [Self; 3] = [Self::TrayIcon, Self::PollingInterval, Self::ControlServer];

    fn label(self) -> &'static str {
        match self {
            Self::TrayIcon => "Show tray icon",
            Self::PollingInterval => "Polling interval",
            Self::ControlServer => "Control server",
        }
    }

    fn value(self, settings: &Settings) -> String {
        match self {
            Self::TrayIcon => if settings.tray_icon { "on" } else { "off" }.into(),
            Self::PollingInterval => fmt_interval(settings.polling_interval()),
            Self::ControlServer => settings.control_url().to_owned(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PrefsPanel {
    cursor: usize,
}

impl PrefsPanel {
    pub fn selected(&self) -> PrefRow {
        PrefRow::ALL[self.cursor.min(PrefRow::ALL.len() - 1)]
    }

    pub fn move_cursor(&mut self, down: bool) {
        self.cursor = if down {
            (self.cursor + 1).min(PrefRow::ALL.len() - 1)
        } else {
            self.cursor.saturating_sub(1)
        };
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, settings: &Settings) {
        let block = Block::default()
            .title(" Preferences ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());

        let mut lines = vec![Line::from("")];
        for row in PrefRow::ALL {
            let here = row == self.selected();
            let marker = if here { "▸ " } else { "  " };
            let mut line = Line::from(vec![
                Span::styled(marker, theme::key_hint_key()),
                Span::styled(format!("{:<20}", row.label()), theme::text()),
                Span::styled(row.value(settings), Style::default().fg(theme::NEON_CYAN)),
            ]);
            if here {
                line = line.style(Style::default().bg(theme::BG_HIGHLIGHT));
            }
            lines.push(line);
        }
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("  Enter ", theme::key_hint_key()),
            Span::styled("change   ", theme::key_hint()),
            Span::styled("Esc ", theme::key_hint_key()),
            Span::styled("back", theme::key_hint()),
        ]));

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use ratatui::{Terminal, backend::TestBackend};

    use super::*;

    #[test]
    fn cursor_stays_in_range() {
        let mut panel = PrefsPanel::default();
        panel.move_cursor(false);
        assert_eq!(panel.selected(), PrefRow::TrayIcon);
        for _ in 0..5 {
            panel.move_cursor(true);
        }
        assert_eq!(panel.selected(), PrefRow::ControlServer);
    }

    #[test]
    fn shows_current_values() {
        let mut settings = Settings {
            tray_icon: false,
            ..Settings::default()
        };
        settings.set_polling_interval(Duration::from_secs(10));

        let mut terminal = Terminal::new(TestBackend::new(70, 10)).unwrap();
        terminal
            .draw(|f| PrefsPanel::default().render(f, f.area(), &settings))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|c| c.symbol()).collect();

        assert!(screen.contains("Show tray icon      off"), "{screen}");
        assert!(screen.contains("10s"));
        assert!(screen.contains("https://controlplane.tailscale.com"));
    }
}
