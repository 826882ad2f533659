//! Confirmation dialog and keyboard help overlay.

use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
};

use super::centered;
use crate::theme;

fn dialog_block(title: &str, border: Style) -> Block<'_> {
    Block::default()
        .title(format!(" {title} "))
        .title_style(theme::title_style())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border)
        .style(Style::default().bg(theme::BG_DARK))
}

/// A yes/no question. `y` answers yes; `n` and Esc answer no.
pub fn render_confirm(frame: &mut Frame, area: Rect, title: &str, body: &str) {
    let dialog = centered(area, 56, 7);
    frame.render_widget(Clear, dialog);

    let block = dialog_block(title, Style::default().fg(theme::ELECTRIC_YELLOW));
    let inner = block.inner(dialog);
    frame.render_widget(block, dialog);

    let text = vec![
        Line::from(Span::styled(format!(" {body}"), theme::text())),
        Line::from(""),
        Line::from(vec![
            Span::styled(" y ", theme::key_hint_key()),
            Span::styled("yes    ", theme::key_hint()),
            Span::styled("n ", theme::key_hint_key()),
            Span::styled("no", theme::key_hint()),
        ]),
    ];
    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), inner);
}

/// A list to pick one entry from. `current` is marked; Enter picks the
/// entry under `cursor`.
pub fn render_choice(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    entries: &[&str],
    cursor: usize,
    current: Option<usize>,
) {
    let height = u16::try_from(entries.len()).unwrap_or(u16::MAX).saturating_add(4);
    let dialog = centered(area, 48, height);
    frame.render_widget(Clear, dialog);

    let block = dialog_block(title, theme::border_focused());
    let inner = block.inner(dialog);
    frame.render_widget(block, dialog);

    let mut lines: Vec<Line> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let marker = if i == cursor { "▸ " } else { "  " };
            let check = if Some(i) == current { "● " } else { "  " };
            let line = Line::from(vec![
                Span::styled(marker, theme::key_hint_key()),
                Span::styled(check, Style::default().fg(theme::SUCCESS_GREEN)),
                Span::styled((*entry).to_owned(), theme::text()),
            ]);
            if i == cursor {
                line.style(Style::default().bg(theme::BG_HIGHLIGHT))
            } else {
                line
            }
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" Enter ", theme::key_hint_key()),
        Span::styled("switch  ", theme::key_hint()),
        Span::styled("Esc ", theme::key_hint_key()),
        Span::styled("cancel", theme::key_hint()),
    ]));
    frame.render_widget(Paragraph::new(lines), inner);
}

const BINDINGS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("j/k ↑/↓", "Move up/down"),
            ("Tab", "Switch list / page"),
            ("Enter", "Open / activate"),
            ("Esc", "Back / hide window"),
        ],
    ),
    (
        "Page",
        &[
            ("x", "Remove advertised route"),
            ("d", "Delete waiting file"),
        ],
    ),
    (
        "Global",
        &[
            ("c", "Connect / disconnect"),
            ("r", "Refresh now"),
            ("t", "Tray menu"),
            ("p", "Switch login profile"),
            (",", "Preferences"),
            ("i", "About"),
            ("q", "Hide window / quit"),
            ("Ctrl+c", "Quit"),
        ],
    ),
];

pub fn render_help(frame: &mut Frame, area: Rect) {
    let help = centered(area, 50, 25);
    frame.render_widget(Clear, help);

    let block = dialog_block("Keyboard Shortcuts", theme::border_focused());
    let inner = block.inner(help);
    frame.render_widget(block, help);

    let mut lines = Vec::new();
    for (section, keys) in BINDINGS {
        lines.push(Line::from(Span::styled(
            format!("  {section}"),
            Style::default().fg(theme::NEON_CYAN),
        )));
        for (key, what) in *keys {
            lines.push(Line::from(vec![
                Span::styled(format!("  {key:<10}"), theme::key_hint_key()),
                Span::styled(*what, theme::key_hint()),
            ]));
        }
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "                  Esc or ? to close",
        theme::key_hint(),
    )));

    frame.render_widget(Paragraph::new(lines), inner);
}
