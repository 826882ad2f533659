//! Single-line text prompt drawn as a centered dialog.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use tui_input::{Input, InputRequest};

use trayscale_core::StableNodeId;

use super::centered;
use crate::theme;

/// What the typed text is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    AddRoute,
    SendFile { node: StableNodeId, peer: String },
    PollingInterval,
    ControlServer,
}

impl PromptKind {
    pub fn title(&self) -> String {
        match self {
            Self::AddRoute => " Add Route ".into(),
            Self::SendFile { peer, .. } => format!(" Send File to {peer} "),
            Self::PollingInterval => " Polling Interval ".into(),
            Self::ControlServer => " Control Plane Server ".into(),
        }
    }

    fn hint(&self) -> &'static str {
        match self {
            Self::AddRoute => "CIDR prefix, e.g. 192.168.1.0/24",
            Self::SendFile { .. } => "Path of the file to send",
            Self::PollingInterval => "Seconds or a duration like 1m 30s (at least 1s)",
            Self::ControlServer => "Empty for the default Tailscale server",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Editing,
    Cancel,
    Submit(String),
}

#[derive(Debug)]
pub struct Prompt {
    pub kind: PromptKind,
    input: Input,
    error: Option<String>,
}

impl Prompt {
    pub fn new(kind: PromptKind, initial: impl Into<String>) -> Self {
        Self {
            kind,
            input: Input::new(initial.into()),
            error: None,
        }
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }

    /// Keep the prompt open and show why the text was refused.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PromptOutcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let request = match key.code {
            KeyCode::Esc => return PromptOutcome::Cancel,
            KeyCode::Enter => return PromptOutcome::Submit(self.input.value().to_owned()),
            KeyCode::Char('a') if ctrl => InputRequest::GoToStart,
            KeyCode::Char('e') if ctrl => InputRequest::GoToEnd,
            KeyCode::Char('w') if ctrl => InputRequest::DeletePrevWord,
            KeyCode::Char('u') if ctrl => InputRequest::DeleteLine,
            KeyCode::Char(c) if !ctrl => InputRequest::InsertChar(c),
            KeyCode::Backspace => InputRequest::DeletePrevChar,
            KeyCode::Delete => InputRequest::DeleteNextChar,
            KeyCode::Left => InputRequest::GoToPrevChar,
            KeyCode::Right => InputRequest::GoToNextChar,
            KeyCode::Home => InputRequest::GoToStart,
            KeyCode::End => InputRequest::GoToEnd,
            _ => return PromptOutcome::Editing,
        };
        if self.input.handle(request).is_some_and(|changed| changed.value) {
            self.error = None;
        }
        PromptOutcome::Editing
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let dialog = centered(area, 64, 7);
        frame.render_widget(Clear, dialog);

        let block = Block::default()
            .title(self.kind.title())
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused())
            .style(Style::default().bg(theme::BG_DARK));
        let inner = block.inner(dialog);
        frame.render_widget(block, dialog);

        let [hint_area, input_area, status_area, keys_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(inner);

        frame.render_widget(
            Paragraph::new(Span::styled(format!(" {}", self.kind.hint()), theme::key_hint())),
            hint_area,
        );

        let width = usize::from(input_area.width.saturating_sub(3)).max(1);
        let scroll = self.input.visual_scroll(width);
        let text = Line::from(vec![
            Span::styled(" > ", theme::key_hint_key()),
            Span::styled(self.input.value(), Style::default().fg(theme::NEON_CYAN)),
        ]);
        frame.render_widget(
            Paragraph::new(text).scroll((0, u16::try_from(scroll).unwrap_or(0))),
            input_area,
        );
        let cursor = self.input.visual_cursor().saturating_sub(scroll);
        frame.set_cursor_position((
            input_area.x + 3 + u16::try_from(cursor).unwrap_or(0),
            input_area.y,
        ));

        if let Some(error) = &self.error {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!(" {error}"),
                    Style::default().fg(theme::ERROR_RED),
                )),
                status_area,
            );
        }

        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(" Enter ", theme::key_hint_key()),
                Span::styled("submit  ", theme::key_hint()),
                Span::styled("Esc ", theme::key_hint_key()),
                Span::styled("cancel", theme::key_hint()),
            ])),
            keys_area,
        );
    }
}
