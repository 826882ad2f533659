pub mod about;
pub mod pages;
pub mod prefs;
pub mod tray;

pub use about::AboutPanel;
pub use pages::{ListEntry, NetCheckView};
pub use prefs::{PrefRow, PrefsPanel};
