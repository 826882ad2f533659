// ── Daemon connection configuration ──

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Default path of tailscaled's local API socket.
pub const DEFAULT_SOCKET: &str = "/var/run/tailscale/tailscaled.sock";

/// Default CLI binary, resolved through `PATH`.
pub const DEFAULT_COMMAND: &str = "tailscale";

/// Control server used when the user has not configured one.
pub const DEFAULT_CONTROL_URL: &str = "https://controlplane.tailscale.com";

/// Where the local API lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// HTTP over a unix domain socket (the daemon's normal mode).
    UnixSocket(PathBuf),
    /// Plain HTTP base URL.
    Http(Url),
}

/// Configuration for [`LocalDaemon`](crate::daemon::LocalDaemon).
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub endpoint: Endpoint,
    /// CLI binary used for operations the local API does not cover.
    pub command: String,
    /// Upper bound on a single local API request.
    pub request_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::UnixSocket(PathBuf::from(DEFAULT_SOCKET)),
            command: DEFAULT_COMMAND.into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
