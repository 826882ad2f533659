// ── Daemon adapter ──
//
// One contract over the daemon. Some operations are local API calls over
// the daemon's socket, others shell out to the CLI; callers cannot tell
// which. Every operation runs under a cancellation scope and fails with a
// `CoreError` tagged with its name. Nothing here retries.

mod cli;
mod local;
pub mod wire;

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::model::{
    BackendState, DerpMap, NetCheckReport, PeerInfo, Prefs, ProfileId, Profiles, RoutePrefix,
    StableNodeId, WaitingFile,
};

pub use cli::{CliOutput, CliRunner};
pub use local::LocalDaemon;

/// Streamed file contents for Taildrop transfers.
pub type FileReader = Pin<Box<dyn AsyncRead + Send>>;

/// The status half of a snapshot, as reported by one status call.
#[derive(Debug, Clone, Default)]
pub struct StatusFields {
    pub backend_state: BackendState,
    pub auth_url: Option<String>,
    pub self_peer: Option<PeerInfo>,
    pub peers: Vec<PeerInfo>,
    pub magic_dns_suffix: String,
}

/// Operations the UI can ask of the daemon.
///
/// Injected wherever it is needed so tests can substitute a fake.
#[async_trait]
pub trait Daemon: Send + Sync {
    async fn status(&self, scope: &CancellationToken) -> Result<StatusFields, CoreError>;

    async fn prefs(&self, scope: &CancellationToken) -> Result<Prefs, CoreError>;

    /// Connect the local node.
    async fn start(&self, scope: &CancellationToken) -> Result<(), CoreError>;

    /// Disconnect the local node.
    async fn stop(&self, scope: &CancellationToken) -> Result<(), CoreError>;

    /// Begin an interactive login so the daemon produces an auth URL.
    async fn start_login(&self, scope: &CancellationToken) -> Result<(), CoreError>;

    /// Use `peer` as exit node, or clear the exit node with `None`.
    async fn set_exit_node(
        &self,
        scope: &CancellationToken,
        peer: Option<&PeerInfo>,
    ) -> Result<(), CoreError>;

    /// Toggle use of the most recently selected exit node.
    async fn set_use_exit_node(
        &self,
        scope: &CancellationToken,
        enabled: bool,
    ) -> Result<(), CoreError>;

    async fn advertise_exit_node(
        &self,
        scope: &CancellationToken,
        enabled: bool,
    ) -> Result<(), CoreError>;

    /// Replace the advertised routes. The current exit-node advertisement is
    /// kept as it is.
    async fn advertise_routes(
        &self,
        scope: &CancellationToken,
        routes: &[RoutePrefix],
    ) -> Result<(), CoreError>;

    async fn set_allow_lan_access(
        &self,
        scope: &CancellationToken,
        allow: bool,
    ) -> Result<(), CoreError>;

    async fn set_accept_routes(
        &self,
        scope: &CancellationToken,
        accept: bool,
    ) -> Result<(), CoreError>;

    /// An empty `url` selects the default control server.
    async fn set_control_url(&self, scope: &CancellationToken, url: &str)
    -> Result<(), CoreError>;

    /// The current login profile and every profile the daemon knows.
    async fn profiles(&self, scope: &CancellationToken) -> Result<Profiles, CoreError>;

    /// Make `id` the current profile. The daemon reconnects with that login.
    async fn switch_profile(
        &self,
        scope: &CancellationToken,
        id: &ProfileId,
    ) -> Result<(), CoreError>;

    /// Run network diagnostics. `full` asks for a full report with every
    /// check's detail (`netcheck --verbose`).
    async fn net_check(
        &self,
        scope: &CancellationToken,
        full: bool,
    ) -> Result<(NetCheckReport, DerpMap), CoreError>;

    async fn push_file(
        &self,
        scope: &CancellationToken,
        node: &StableNodeId,
        size: u64,
        name: &str,
        body: FileReader,
    ) -> Result<(), CoreError>;

    /// Files waiting to be acknowledged. May block briefly server-side.
    async fn await_waiting_files(
        &self,
        scope: &CancellationToken,
    ) -> Result<Vec<WaitingFile>, CoreError>;

    async fn get_waiting_file(
        &self,
        scope: &CancellationToken,
        name: &str,
    ) -> Result<(FileReader, u64), CoreError>;

    async fn delete_waiting_file(
        &self,
        scope: &CancellationToken,
        name: &str,
    ) -> Result<(), CoreError>;
}

/// Run `fut` unless `scope` ends first.
pub(crate) async fn scoped<T>(
    op: &'static str,
    scope: &CancellationToken,
    fut: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CoreError> {
    tokio::select! {
        biased;
        () = scope.cancelled() => Err(CoreError::Cancelled { op }),
        result = fut => result,
    }
}
