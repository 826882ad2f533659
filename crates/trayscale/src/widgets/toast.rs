//! Transient messages shown in the bottom-right corner.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};

use crate::theme;

/// How long a toast stays on screen.
pub const TOAST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, ToastLevel::Success)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, ToastLevel::Error)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, ToastLevel::Warning)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, ToastLevel::Info)
    }

    fn new(message: impl Into<String>, level: ToastLevel) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }
}

#[derive(Default)]
struct Queue {
    shown: Option<(Toast, Instant)>,
    pending: VecDeque<Toast>,
}

/// Shared toast queue. Clones push into the same queue; the notifier and
/// the window each hold one.
#[derive(Clone, Default)]
pub struct Toasts {
    queue: Rc<RefCell<Queue>>,
}

impl Toasts {
    pub fn push(&self, toast: Toast) {
        self.queue.borrow_mut().pending.push_back(toast);
    }

    /// Expire the current toast and promote the next one.
    pub fn tick(&self, now: Instant) {
        let mut queue = self.queue.borrow_mut();
        if queue
            .shown
            .as_ref()
            .is_some_and(|(_, since)| now.saturating_duration_since(*since) >= TOAST_TIMEOUT)
        {
            queue.shown = None;
        }
        if queue.shown.is_none() {
            queue.shown = queue.pending.pop_front().map(|next| (next, now));
        }
    }

    pub fn dismiss(&self) {
        self.queue.borrow_mut().shown = None;
    }

    pub fn current(&self) -> Option<Toast> {
        self.queue.borrow().shown.as_ref().map(|(t, _)| t.clone())
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let Some(toast) = self.current() else {
            return;
        };

        let msg_len = u16::try_from(toast.message.chars().count()).unwrap_or(u16::MAX);
        let width = msg_len
            .saturating_add(6)
            .clamp(20, 70)
            .min(area.width.saturating_sub(2));
        let height = 3u16;

        let x = area.width.saturating_sub(width + 1);
        let y = area.height.saturating_sub(height + 2);
        let toast_area = Rect::new(area.x + x, area.y + y, width, height);

        let (border_color, icon) = match toast.level {
            ToastLevel::Success => (theme::SUCCESS_GREEN, "✓"),
            ToastLevel::Error => (theme::ERROR_RED, "✗"),
            ToastLevel::Warning => (theme::ELECTRIC_YELLOW, "!"),
            ToastLevel::Info => (theme::NEON_CYAN, "·"),
        };

        frame.render_widget(Clear, toast_area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color))
            .style(Style::default().bg(theme::BG_DARK));

        let inner = block.inner(toast_area);
        frame.render_widget(block, toast_area);

        let line = Line::from(vec![
            Span::styled(format!(" {icon} "), Style::default().fg(border_color)),
            Span::styled(toast.message, theme::text()),
        ]);
        frame.render_widget(Paragraph::new(line), inner);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn toasts_show_in_order_and_expire() {
        let toasts = Toasts::default();
        let start = Instant::now();
        toasts.push(Toast::info("first"));
        toasts.push(Toast::error("second"));

        toasts.tick(start);
        assert_eq!(toasts.current(), Some(Toast::info("first")));

        toasts.tick(start + Duration::from_secs(1));
        assert_eq!(toasts.current(), Some(Toast::info("first")));

        toasts.tick(start + TOAST_TIMEOUT);
        assert_eq!(toasts.current(), Some(Toast::error("second")));

        toasts.tick(start + TOAST_TIMEOUT * 2);
        assert_eq!(toasts.current(), None);
    }

    #[test]
    fn clones_share_the_queue() {
        let toasts = Toasts::default();
        toasts.clone().push(Toast::warning("shared"));
        toasts.tick(Instant::now());
        assert_eq!(toasts.current().map(|t| t.level), Some(ToastLevel::Warning));

        toasts.dismiss();
        assert_eq!(toasts.current(), None);
    }
}
