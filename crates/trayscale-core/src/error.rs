// ── Core error types ──
//
// Every failure the core reports is one of six kinds, each tagged with the
// name of the operation that produced it. Transport errors from reqwest and
// subprocess failures are translated here so consumers never match on HTTP
// status codes or exit statuses directly.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Daemon errors ────────────────────────────────────────────────
    /// The RPC never got an answer: socket missing, connection refused,
    /// body cut short.
    #[error("{op}: daemon unavailable: {reason}")]
    DaemonUnavailable { op: &'static str, reason: String },

    /// The daemon answered, but with an error.
    #[error("{op}: daemon rejected request (HTTP {status}): {message}")]
    DaemonRejected {
        op: &'static str,
        status: u16,
        message: String,
    },

    /// The CLI exited non-zero. `output` is its captured stdout+stderr.
    #[error("{op}: command failed ({status}): {output}")]
    CliFailed {
        op: &'static str,
        status: String,
        output: String,
    },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("{op}: invalid input: {message}")]
    InvalidInput { op: &'static str, message: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("{op}: cancelled")]
    Cancelled { op: &'static str },

    /// A bug. The UI thread aborts after logging one of these.
    #[error("{op}: internal invariant violated: {message}")]
    InternalInvariant { op: &'static str, message: String },
}

impl CoreError {
    /// The operation this error is tagged with.
    pub fn op(&self) -> &'static str {
        match self {
            Self::DaemonUnavailable { op, .. }
            | Self::DaemonRejected { op, .. }
            | Self::CliFailed { op, .. }
            | Self::InvalidInput { op, .. }
            | Self::Cancelled { op }
            | Self::InternalInvariant { op, .. } => op,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Poll failures of these kinds are expected while the daemon restarts
    /// and are recovered from on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::DaemonUnavailable { .. } | Self::DaemonRejected { .. }
        )
    }

    pub(crate) fn invalid(op: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            op,
            message: message.into(),
        }
    }

    /// Translate a reqwest failure for `op`.
    pub(crate) fn from_http(op: &'static str, err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::DaemonRejected {
                op,
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        if err.is_decode() {
            return Self::DaemonRejected {
                op,
                status: 200,
                message: format!("malformed response: {err}"),
            };
        }
        Self::DaemonUnavailable {
            op,
            reason: err.to_string(),
        }
    }
}
