// trayscale-core: Reactive state core between the Tailscale daemon and the UI.

pub mod config;
mod convert;
pub mod daemon;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod model;
pub mod poller;
pub mod reconcile;
pub mod state;
pub mod stream;
pub mod tray;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DaemonConfig, Endpoint};
pub use daemon::{Daemon, FileReader, LocalDaemon, StatusFields};
pub use dispatch::{Command, Dispatcher, Interaction, Login, Outcome};
pub use error::CoreError;
pub use poller::{Poller, PollerHandle};
pub use reconcile::{
    MULLVAD_PAGE_KEY, MullvadCountry, MullvadNode, MullvadSection, PageKind, PageModel, PeerStack,
    Placeholder, Reconciler, ToggleSwitch,
};
pub use stream::SnapshotStream;
pub use tray::{
    MenuItem, MenuState, Notification, Notifier, TrayBackend, TrayBridge, TrayEvent, TrayIcon,
    TrayLink, TrayUpdate, TrayWorker,
};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BackendState, DerpMap, DerpRegion, Location, LoginProfile, NetCheckReport, NodeKey, PeerInfo,
    Prefs, ProfileId, Profiles, RoutePrefix, Snapshot, StableNodeId, WaitingFile,
};
