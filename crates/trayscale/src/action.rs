//! Intents produced by key handling and tray activations. `App::process_action`
//! is the only place they take effect.

use tokio::sync::oneshot;

use trayscale_core::{ProfileId, RoutePrefix};

use crate::stack::Row;
use crate::widgets::prompt::PromptKind;

/// Which part of the window fills the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    #[default]
    Pages,
    Prefs,
    About,
}

#[derive(Debug)]
pub enum Action {
    Quit,
    /// Hide the window if the tray runs, quit otherwise.
    CloseWindow,
    ShowWindow,
    /// Show the window on the local machine's page.
    ShowSelf,
    ToggleHelp,
    OpenPanel(Panel),
    /// Flip the connect/disconnect switch.
    ToggleStatus,
    Refresh,
    OpenTrayMenu,
    /// Open the login profile chooser.
    ChooseProfile,
    SwitchProfile(ProfileId),
    /// Enter on a page row.
    Activate(Row),
    RemoveRoute(RoutePrefix),
    AskDeleteFile(String),
    DeleteFile(String),
    Prompt(PromptKind),
    ToggleTrayIcon,
}

/// Where the answer to a confirmation dialog goes.
#[derive(Debug)]
pub enum Reply {
    /// A command task is waiting on it.
    Channel(oneshot::Sender<bool>),
    /// Run this action on yes.
    Then(Box<Action>),
}

#[derive(Debug)]
pub struct Confirm {
    pub title: String,
    pub body: String,
    pub reply: Reply,
}
