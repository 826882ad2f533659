/// A two-position switch bound to a daemon preference.
///
/// `committed` mirrors the last snapshot; `active` is what the user sees.
/// They differ only while a command is in flight. Snapshots that arrive in
/// that window update `committed` but leave `active` alone, so the switch
/// does not jump back before the command finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToggleSwitch {
    committed: bool,
    active: bool,
    in_flight: bool,
    /// A snapshot landed while the command was in flight.
    synced: bool,
}

impl ToggleSwitch {
    pub fn new(committed: bool) -> Self {
        Self {
            committed,
            active: committed,
            ..Self::default()
        }
    }

    pub fn committed(&self) -> bool {
        self.committed
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// The user moved the switch to `requested`. Returns the value to send
    /// to the daemon, or `None` when nothing needs to change.
    pub fn request(&mut self, requested: bool) -> Option<bool> {
        self.active = requested;
        let send = (requested != self.committed).then_some(requested);
        if send.is_some() {
            self.in_flight = true;
            self.synced = false;
        }
        send
    }

    /// A snapshot reported the daemon's value.
    pub fn sync(&mut self, committed: bool) {
        self.committed = committed;
        if self.in_flight {
            self.synced = true;
        } else {
            self.active = committed;
        }
    }

    /// The command succeeded. Shows the daemon's value if a snapshot already
    /// reported it; otherwise the next [`sync`](Self::sync) does.
    pub fn finish(&mut self) {
        self.in_flight = false;
        if self.synced {
            self.active = self.committed;
        }
    }

    /// The command failed; show the committed value again.
    pub fn revert(&mut self) {
        self.in_flight = false;
        self.active = self.committed;
    }
}
