// ── Command dispatcher ──
//
// Turns user intents into daemon calls. Each command runs on its own task
// under a 30-second scope derived from the root token; a successful command
// is followed by a poll-now so the UI sees its effect promptly. Failures are
// logged here and handed back so the caller can revert optimistic state.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::daemon::{Daemon, scoped};
use crate::error::CoreError;
use crate::model::prefs::{with_route, without_route};
use crate::model::{DerpMap, NetCheckReport, PeerInfo, ProfileId, RoutePrefix, StableNodeId};
use crate::poller::PollerHandle;

/// Ceiling on any single command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

pub const LOGIN_TITLE: &str = "Login Required";
pub const LOGIN_BODY: &str = "Open a browser to authenticate with Tailscale?";

const MAX_SAVE_ATTEMPTS: u32 = 1000;

/// User-facing collaborators a command may need.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Ask a yes/no question. Dismissal counts as no.
    async fn confirm(&self, title: &str, body: &str) -> bool;

    /// Hand `url` to the system browser.
    fn open_url(&self, url: &str) -> io::Result<()>;
}

// ── Commands ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    Disconnect,
    /// Use this peer as exit node, or stop using one.
    SelectExitNode(Option<PeerInfo>),
    UseExitNode(bool),
    AdvertiseExitNode(bool),
    /// Text typed into the add-route prompt.
    AddRoute(String),
    RemoveRoute(RoutePrefix),
    AllowLanAccess(bool),
    AcceptRoutes(bool),
    SetControlUrl(String),
    NetCheck,
    SendFile { node: StableNodeId, path: PathBuf },
    SaveFile { name: String, dir: PathBuf },
    DeleteFile(String),
    /// Log in with another of the daemon's profiles.
    SwitchProfile(ProfileId),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::SelectExitNode(_) => "set_exit_node",
            Self::UseExitNode(_) => "set_use_exit_node",
            Self::AdvertiseExitNode(_) => "advertise_exit_node",
            Self::AddRoute(_) => "add_route",
            Self::RemoveRoute(_) => "remove_route",
            Self::AllowLanAccess(_) => "set_allow_lan_access",
            Self::AcceptRoutes(_) => "set_accept_routes",
            Self::SetControlUrl(_) => "set_control_url",
            Self::NetCheck => "net_check",
            Self::SendFile { .. } => "send_file",
            Self::SaveFile { .. } => "save_file",
            Self::DeleteFile(_) => "delete_file",
            Self::SwitchProfile(_) => "switch_profile",
        }
    }
}

/// How the login prompt of a connect intent ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Login {
    Declined,
    Opened,
    /// The user accepted but no browser could be launched.
    BrowserFailed(String),
}

#[derive(Debug)]
pub enum Outcome {
    Done,
    Login(Login),
    NetCheck {
        report: NetCheckReport,
        derp: DerpMap,
    },
    Saved(PathBuf),
}

impl Outcome {
    /// Whether the daemon may have changed.
    fn forces_poll(&self) -> bool {
        !matches!(self, Self::Login(_) | Self::NetCheck { .. })
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────

struct Inner {
    daemon: Arc<dyn Daemon>,
    poller: PollerHandle,
    root: CancellationToken,
    interaction: Arc<dyn Interaction>,
}

/// Cheaply cloneable; every clone dispatches onto the same daemon.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(
        daemon: Arc<dyn Daemon>,
        poller: PollerHandle,
        root: CancellationToken,
        interaction: Arc<dyn Interaction>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                daemon,
                poller,
                root,
                interaction,
            }),
        }
    }

    /// Run `command` on a worker task and pass its result to `done`.
    pub fn spawn(
        &self,
        command: Command,
        done: impl FnOnce(Result<Outcome, CoreError>) + Send + 'static,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { done(this.run(command).await) })
    }

    /// Run `command` to completion on the current task.
    pub async fn run(&self, command: Command) -> Result<Outcome, CoreError> {
        let op = command.name();
        debug!(op, "dispatching command");

        let result = self.execute(command).await;
        match &result {
            Ok(outcome) if outcome.forces_poll() => self.inner.poller.poll_now(),
            Ok(_) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) if e.is_invalid_input() => debug!(op, error = %e, "command input rejected"),
            Err(e) => error!(op, error = %e, "command failed"),
        }
        result
    }

    async fn execute(&self, command: Command) -> Result<Outcome, CoreError> {
        let op = command.name();

        if matches!(command, Command::Connect) {
            let latest = self.inner.poller.latest();
            if latest.needs_auth() {
                if let Some(url) = latest.auth_url.clone() {
                    return self.login(&url).await;
                }
                info!("login required but no auth URL yet, starting interactive login");
                let daemon = Arc::clone(&self.inner.daemon);
                return self
                    .scoped(op, |scope| async move {
                        daemon.start_login(&scope).await.map(|()| Outcome::Done)
                    })
                    .await;
            }
        }

        let this = self.clone();
        self.scoped(op, |scope| async move { this.perform(command, &scope).await })
            .await
    }

    /// Run `f` under a fresh child scope bounded by [`COMMAND_TIMEOUT`].
    async fn scoped<Fut>(
        &self,
        op: &'static str,
        f: impl FnOnce(CancellationToken) -> Fut,
    ) -> Result<Outcome, CoreError>
    where
        Fut: Future<Output = Result<Outcome, CoreError>>,
    {
        let scope = self.inner.root.child_token();
        let fut = f(scope.clone());
        let result = tokio::time::timeout(COMMAND_TIMEOUT, fut).await;
        scope.cancel();
        result.unwrap_or_else(|_| {
            Err(CoreError::DaemonUnavailable {
                op,
                reason: format!("timed out after {}s", COMMAND_TIMEOUT.as_secs()),
            })
        })
    }

    async fn login(&self, url: &str) -> Result<Outcome, CoreError> {
        let accepted = tokio::select! {
            biased;
            () = self.inner.root.cancelled() => return Err(CoreError::Cancelled { op: "connect" }),
            accepted = self.inner.interaction.confirm(LOGIN_TITLE, LOGIN_BODY) => accepted,
        };
        if !accepted {
            return Ok(Outcome::Login(Login::Declined));
        }
        match self.inner.interaction.open_url(url) {
            Ok(()) => Ok(Outcome::Login(Login::Opened)),
            Err(e) => {
                warn!(error = %e, "failed to open browser for login");
                Ok(Outcome::Login(Login::BrowserFailed(e.to_string())))
            }
        }
    }

    async fn perform(&self, command: Command, scope: &CancellationToken) -> Result<Outcome, CoreError> {
        let daemon = self.inner.daemon.as_ref();

        match command {
            Command::Connect => daemon.start(scope).await?,
            Command::Disconnect => daemon.stop(scope).await?,
            Command::SelectExitNode(peer) => {
                if peer.is_some() && self.inner.poller.latest().prefs.advertises_exit_node {
                    if let Err(e) = daemon.advertise_exit_node(scope, false).await {
                        error!(error = %e, "failed to stop advertising exit node");
                    }
                }
                daemon.set_exit_node(scope, peer.as_ref()).await?;
            }
            Command::UseExitNode(enabled) => daemon.set_use_exit_node(scope, enabled).await?,
            Command::AdvertiseExitNode(enabled) => {
                if enabled && self.inner.poller.latest().exit_node_active() {
                    daemon.set_exit_node(scope, None).await?;
                }
                daemon.advertise_exit_node(scope, enabled).await?;
            }
            Command::AddRoute(text) => {
                let route = parse_route(&text)?;
                let prefs = daemon.prefs(scope).await?;
                let routes = with_route(&prefs.advertise_routes, route);
                daemon.advertise_routes(scope, &routes).await?;
            }
            Command::RemoveRoute(route) => {
                let prefs = daemon.prefs(scope).await?;
                let routes = without_route(&prefs.advertise_routes, route);
                daemon.advertise_routes(scope, &routes).await?;
            }
            Command::AllowLanAccess(allow) => daemon.set_allow_lan_access(scope, allow).await?,
            Command::AcceptRoutes(accept) => daemon.set_accept_routes(scope, accept).await?,
            Command::SetControlUrl(url) => daemon.set_control_url(scope, url.trim()).await?,
            Command::NetCheck => {
                let (report, derp) = daemon.net_check(scope, true).await?;
                return Ok(Outcome::NetCheck { report, derp });
            }
            Command::SendFile { node, path } => send_file(daemon, scope, &node, &path).await?,
            Command::SaveFile { name, dir } => {
                let saved = save_file(daemon, scope, &name, &dir).await?;
                return Ok(Outcome::Saved(saved));
            }
            Command::DeleteFile(name) => daemon.delete_waiting_file(scope, &name).await?,
            Command::SwitchProfile(id) => {
                let profiles = self.inner.poller.latest().profiles.clone();
                let Some(profile) = profiles.get(&id) else {
                    let message = format!("unknown profile {id}");
                    return Err(CoreError::invalid("switch_profile", message));
                };
                if profiles.current.as_ref() == Some(&id) {
                    debug!(profile = %profile.name, "profile already current");
                    return Ok(Outcome::Done);
                }
                info!(profile = %profile.name, "switching profile");
                daemon.switch_profile(scope, &id).await?;
            }
        }
        Ok(Outcome::Done)
    }
}

/// Parse the add-route prompt. Zero-bit prefixes belong to the exit-node
/// switch and are refused here.
fn parse_route(text: &str) -> Result<RoutePrefix, CoreError> {
    const OP: &str = "add_route";
    let route: RoutePrefix = text
        .parse()
        .map_err(|e| CoreError::invalid(OP, format!("{:?} is not a CIDR prefix: {e}", text.trim())))?;
    if route.is_zero_bits() {
        return Err(CoreError::invalid(
            OP,
            "use the exit node switch to advertise a default route",
        ));
    }
    Ok(route)
}

// ── Taildrop ────────────────────────────────────────────────────────

fn file_error(op: &'static str, path: &Path, err: &io::Error) -> CoreError {
    CoreError::invalid(op, format!("{}: {err}", path.display()))
}

async fn send_file(
    daemon: &dyn Daemon,
    scope: &CancellationToken,
    node: &StableNodeId,
    path: &Path,
) -> Result<(), CoreError> {
    const OP: &str = "send_file";
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CoreError::invalid(OP, format!("{} is not a file", path.display())))?;
    let file = File::open(path).await.map_err(|e| file_error(OP, path, &e))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| file_error(OP, path, &e))?
        .len();

    info!(%node, name, size, "sending file");
    daemon
        .push_file(scope, node, size, &name, Box::pin(file))
        .await
}

/// Copy a waiting file into `dir`, then remove it from the daemon.
async fn save_file(
    daemon: &dyn Daemon,
    scope: &CancellationToken,
    name: &str,
    dir: &Path,
) -> Result<PathBuf, CoreError> {
    const OP: &str = "save_file";
    let file_name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CoreError::invalid(OP, format!("{name:?} is not a file name")))?;

    let (mut reader, size) = daemon.get_waiting_file(scope, name).await?;
    let (dest, mut file) = create_unique(dir, file_name)
        .await
        .map_err(|e| file_error(OP, dir, &e))?;

    let copied = scoped(OP, scope, async {
        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| file_error(OP, &dest, &e))?;
        file.flush().await.map_err(|e| file_error(OP, &dest, &e))?;
        Ok(written)
    })
    .await;
    let written = match copied {
        Ok(written) => written,
        Err(e) => {
            drop(file);
            if let Err(rm) = fs::remove_file(&dest).await {
                debug!(error = %rm, dest = %dest.display(), "could not remove partial file");
            }
            return Err(e);
        }
    };
    if size != 0 && written != size {
        warn!(name, size, written, "waiting file size mismatch");
    }

    daemon.delete_waiting_file(scope, name).await?;
    info!(name, dest = %dest.display(), "saved waiting file");
    Ok(dest)
}

/// Create `dir/name`, or `dir/stem (n).ext` if taken.
async fn create_unique(dir: &Path, name: &str) -> io::Result<(PathBuf, File)> {
    fs::create_dir_all(dir).await?;
    let stem = Path::new(name)
        .file_stem()
        .map_or_else(|| name.to_owned(), |s| s.to_string_lossy().into_owned());
    let ext = Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for n in 0..MAX_SAVE_ATTEMPTS {
        let candidate = if n == 0 {
            dir.join(name)
        } else {
            dir.join(format!("{stem} ({n}){ext}"))
        };
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {name}"),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn route_prompt_rejects_garbage() {
        let err = parse_route("10.0.0.300/24").unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(err.op(), "add_route");
    }

    #[test]
    fn route_prompt_rejects_default_route() {
        assert!(parse_route("0.0.0.0/0").unwrap_err().is_invalid_input());
        assert!(parse_route("::/0").unwrap_err().is_invalid_input());
    }

    #[test]
    fn route_prompt_trims_and_masks() {
        assert_eq!(parse_route(" 10.0.0.7/24 ").unwrap().to_string(), "10.0.0.0/24");
    }

    #[tokio::test]
    async fn unique_names_do_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _f1) = create_unique(dir.path(), "photo.jpg").await.unwrap();
        let (second, _f2) = create_unique(dir.path(), "photo.jpg").await.unwrap();
        let (third, _f3) = create_unique(dir.path(), "photo.jpg").await.unwrap();

        assert_eq!(first, dir.path().join("photo.jpg"));
        assert_eq!(second, dir.path().join("photo (1).jpg"));
        assert_eq!(third, dir.path().join("photo (2).jpg"));
    }

    #[test]
    fn read_only_outcomes_do_not_force_polls() {
        assert!(Outcome::Done.forces_poll());
        assert!(Outcome::Saved(PathBuf::new()).forces_poll());
        assert!(!Outcome::Login(Login::Opened).forces_poll());
    }
}
