// ── Domain model ──
//
// Immutable value types describing one daemon poll. Everything here is
// produced by `convert` from the daemon's wire format and consumed by the
// state, reconcile and tray layers.

pub mod netcheck;
pub mod peer;
pub mod prefs;
pub mod profile;
pub mod snapshot;

pub use netcheck::{DerpMap, DerpRegion, NetCheckReport};
pub use peer::{Location, NodeKey, PeerInfo, StableNodeId};
pub use profile::{LoginProfile, ProfileId, Profiles};
pub use prefs::{Prefs, RoutePrefix};
pub use snapshot::{BackendState, Snapshot, WaitingFile};
