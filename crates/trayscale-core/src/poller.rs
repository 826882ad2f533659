// ── Poller ──
//
// A single background task that turns daemon state into a sequence of
// snapshots. It polls, publishes, then waits for cancellation, the timer,
// a poll-now request or an interval change, whichever comes first.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::daemon::Daemon;
use crate::error::CoreError;
use crate::model::Snapshot;
use crate::stream::SnapshotStream;

/// Shortest allowed polling interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Interval used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on one status+prefs+files+profiles round.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

const BROADCAST_CAPACITY: usize = 16;

pub fn clamp_interval(interval: Duration) -> Duration {
    interval.max(MIN_INTERVAL)
}

struct Shared {
    poll_now: Notify,
    interval: watch::Sender<Duration>,
    latest: watch::Sender<Arc<Snapshot>>,
    events: broadcast::Sender<Arc<Snapshot>>,
}

/// Cheaply cloneable control surface of a running poller.
#[derive(Clone)]
pub struct PollerHandle {
    shared: Arc<Shared>,
}

impl PollerHandle {
    /// Request an immediate poll. Requests made while a poll is in flight
    /// collapse into one follow-up poll.
    pub fn poll_now(&self) {
        trace!("poll-now requested");
        self.shared.poll_now.notify_one();
    }

    /// Change the interval, clamped to [`MIN_INTERVAL`]. An in-flight poll
    /// is not disturbed; the new period applies from the next wait.
    pub fn set_interval(&self, interval: Duration) {
        let interval = clamp_interval(interval);
        self.shared.interval.send_if_modified(|current| {
            if *current == interval {
                return false;
            }
            debug!(?interval, "polling interval changed");
            *current = interval;
            true
        });
    }

    pub fn interval(&self) -> Duration {
        *self.shared.interval.borrow()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<Snapshot> {
        self.shared.latest.borrow().clone()
    }

    /// Every publication, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.shared.events.subscribe()
    }

    pub fn watch(&self) -> SnapshotStream {
        SnapshotStream::new(self.shared.latest.subscribe())
    }

    fn publish(&self, snapshot: Arc<Snapshot>) {
        self.shared.latest.send_replace(snapshot.clone());
        // No subscribers is fine.
        let _ = self.shared.events.send(snapshot);
    }
}

/// The poller task and its handle.
pub struct Poller {
    handle: PollerHandle,
    task: JoinHandle<()>,
}

impl Poller {
    /// Spawn the polling loop. It runs until `cancel` fires.
    pub fn spawn(daemon: Arc<dyn Daemon>, interval: Duration, cancel: CancellationToken) -> Self {
        let (interval_tx, _) = watch::channel(clamp_interval(interval));
        let (latest_tx, _) = watch::channel(Arc::new(Snapshot::default()));
        let (events_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        let handle = PollerHandle {
            shared: Arc::new(Shared {
                poll_now: Notify::new(),
                interval: interval_tx,
                latest: latest_tx,
                events: events_tx,
            }),
        };

        let task = tokio::spawn(poll_task(daemon, handle.clone(), cancel));
        Self { handle, task }
    }

    pub fn handle(&self) -> PollerHandle {
        self.handle.clone()
    }

    /// Wait for the loop to exit after cancellation.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "poller task ended abnormally");
        }
    }
}

async fn poll_task(daemon: Arc<dyn Daemon>, handle: PollerHandle, cancel: CancellationToken) {
    let mut interval_rx = handle.shared.interval.subscribe();
    let mut prior = handle.latest();

    info!(interval = ?handle.interval(), "poller started");

    loop {
        let snapshot = Arc::new(poll_once(daemon.as_ref(), &cancel, &prior).await);
        if cancel.is_cancelled() {
            break;
        }
        if snapshot.reachable != prior.reachable {
            info!(reachable = snapshot.reachable, "daemon reachability changed");
        }
        handle.publish(snapshot.clone());
        prior = snapshot;

        let period = *interval_rx.borrow_and_update();
        let timer = tokio::time::sleep(period);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("poller stopped");
                    return;
                }
                () = handle.shared.poll_now.notified() => break,
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let period = *interval_rx.borrow_and_update();
                    timer.as_mut().reset(Instant::now() + period);
                }
                () = &mut timer => break,
            }
        }
    }

    info!("poller stopped");
}

/// One round of status, prefs, waiting files and login profiles.
///
/// Any failure of status or prefs yields an unreachable copy of `prior`.
/// Taildrop may be disabled on the node, so a failed file listing only
/// keeps the previous list; profiles are treated the same way.
async fn poll_once(daemon: &dyn Daemon, cancel: &CancellationToken, prior: &Snapshot) -> Snapshot {
    let scope = cancel.child_token();
    let round = async {
        let status = daemon.status(&scope).await?;
        let prefs = daemon.prefs(&scope).await?;
        let files = match daemon.await_waiting_files(&scope).await {
            Ok(files) => files,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                debug!(error = %e, "waiting files unavailable");
                prior.waiting_files.clone()
            }
        };
        let profiles = match daemon.profiles(&scope).await {
            Ok(profiles) => profiles,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                debug!(error = %e, "login profiles unavailable");
                prior.profiles.clone()
            }
        };
        Ok::<_, CoreError>((status, prefs, files, profiles))
    };

    let result = match tokio::time::timeout(POLL_TIMEOUT, round).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::DaemonUnavailable {
            op: "status",
            reason: format!("no answer within {}s", POLL_TIMEOUT.as_secs()),
        }),
    };
    scope.cancel();

    match result {
        Ok((status, prefs, files, profiles)) => {
            trace!(state = %status.backend_state, peers = status.peers.len(), "poll succeeded");
            Snapshot::new(
                status.backend_state,
                status.auth_url,
                status.self_peer,
                status.peers,
                prefs,
                files,
                status.magic_dns_suffix,
            )
            .with_profiles(profiles)
        }
        Err(e) => {
            if !cancel.is_cancelled() && !e.is_cancelled() {
                error!(op = e.op(), error = %e, "poll failed");
            }
            Snapshot::unreachable(prior)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn interval_clamped_to_one_second() {
        assert_eq!(clamp_interval(Duration::from_millis(200)), MIN_INTERVAL);
        assert_eq!(clamp_interval(Duration::ZERO), MIN_INTERVAL);
        assert_eq!(
            clamp_interval(Duration::from_secs(7)),
            Duration::from_secs(7)
        );
    }
}
