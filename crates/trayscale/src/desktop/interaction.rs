use std::io;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, info};

use trayscale_core::Interaction;
use trayscale_core::state::UiHandle;

use crate::action::{Confirm, Reply};
use crate::app::App;

/// Asks questions through the window's confirmation dialog and opens URLs
/// in the desktop's browser.
pub struct WindowInteraction {
    ui: UiHandle<App>,
}

impl WindowInteraction {
    pub fn new(ui: UiHandle<App>) -> Self {
        Self { ui }
    }
}

#[async_trait]
impl Interaction for WindowInteraction {
    async fn confirm(&self, title: &str, body: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        let confirm = Confirm {
            title: title.to_owned(),
            body: body.to_owned(),
            reply: Reply::Channel(tx),
        };
        if !self.ui.post(move |app| app.ask(confirm)) {
            debug!("window gone before the question could be asked");
            return false;
        }
        // A dialog dropped without an answer counts as no.
        rx.await.unwrap_or(false)
    }

    fn open_url(&self, url: &str) -> io::Result<()> {
        info!(url, "opening browser");
        open::that(url)
    }
}
