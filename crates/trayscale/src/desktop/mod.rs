//! Desktop collaborators of the state core: the tray backend, the notifier,
//! the interaction surface and the bundled assets.

pub mod assets;
pub mod interaction;
pub mod notify;
pub mod tray;

pub use interaction::WindowInteraction;
pub use notify::ToastNotifier;
pub use tray::{TerminalTray, TrayMirror, TrayView};
