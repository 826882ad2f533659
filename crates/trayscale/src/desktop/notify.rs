use tracing::info;

use trayscale_core::{Notification, Notifier};

use crate::widgets::toast::{Toast, Toasts};

/// Shows desktop notifications as toasts in the window and records them in
/// the log.
pub struct ToastNotifier {
    toasts: Toasts,
}

impl ToastNotifier {
    pub fn new(toasts: Toasts) -> Self {
        Self { toasts }
    }
}

impl Notifier for ToastNotifier {
    fn notify(&self, notification: &Notification) {
        info!(
            id = notification.id,
            icon = notification.icon,
            title = notification.title,
            body = notification.body,
            "notification"
        );
        self.toasts.push(Toast::info(notification.body));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn notifications_become_toasts() {
        let toasts = Toasts::default();
        let notifier = ToastNotifier::new(toasts.clone());
        notifier.notify(&Notification::status(true));
        toasts.tick(Instant::now());
        assert_eq!(toasts.current(), Some(Toast::info("Tailscale is connected.")));
    }
}
