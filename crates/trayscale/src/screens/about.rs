//! About panel: name, version, description and the license text.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
};

use crate::desktop::assets::LICENSE;
use crate::theme;

pub const NAME: &str = "Trayscale";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const WEBSITE: &str = "https://github.com/DeedleFake/trayscale";

#[derive(Debug, Default)]
pub struct AboutPanel {
    scroll: u16,
}

impl AboutPanel {
    pub fn scroll(&mut self, down: bool) {
        self.scroll = if down {
            self.scroll.saturating_add(1)
        } else {
            self.scroll.saturating_sub(1)
        };
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" About ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [header, license] =
            Layout::vertical([Constraint::Length(5), Constraint::Min(0)]).areas(inner);

        let lines = vec![
            Line::from(vec![
                Span::styled(NAME, theme::title_style()),
                Span::styled(format!(" {VERSION}"), theme::key_hint()),
            ]),
            Line::from(Span::styled(DESCRIPTION, theme::text())),
            Line::from(Span::styled(WEBSITE, theme::key_hint())),
            Line::from(""),
            Line::from(Span::styled("License", theme::section())),
        ];
        frame.render_widget(Paragraph::new(lines), header);

        // Keep at least one screenful of text in view.
        let total = u16::try_from(LICENSE.lines().count()).unwrap_or(u16::MAX);
        let scroll = self.scroll.min(total.saturating_sub(license.height));
        frame.render_widget(
            Paragraph::new(LICENSE)
                .style(theme::text())
                .wrap(Wrap { trim: false })
                .scroll((scroll, 0)),
            license,
        );
    }
}
