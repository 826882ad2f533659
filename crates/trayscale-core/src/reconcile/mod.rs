// ── UI reconciler ──
//
// Maps each snapshot onto the stack of peer pages. Views are owned here,
// keyed by node key, and this is the only code that creates, updates or
// destroys them. The concrete widgets live behind `PeerStack`.

mod mullvad;
mod page;
mod switch;

use indexmap::IndexMap;
use tracing::debug;

use crate::model::{BackendState, NodeKey, Snapshot};

pub use mullvad::{
    MULLVAD_PAGE_KEY, MULLVAD_PAGE_TITLE, MullvadCountry, MullvadNode, MullvadSection,
};
pub use page::{LocalSection, PageKind, PageModel};
pub use switch::ToggleSwitch;

/// Why the "Not Connected" page is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// The last poll failed.
    Unreachable,
    /// The backend is stopped or has no state yet.
    Disconnected,
    /// The node must be logged in first.
    NeedsLogin,
    /// Connected, but there are no pages to show.
    Empty,
}

impl Placeholder {
    pub const TITLE: &str = "Not Connected";

    pub fn hint(self) -> &'static str {
        match self {
            Self::Unreachable => "The Tailscale daemon is not responding.",
            Self::Disconnected => "Tailscale is not connected.",
            Self::NeedsLogin => "Log in to Tailscale to connect this machine.",
            Self::Empty => "No machines to show.",
        }
    }
}

/// The widget side of the page stack.
pub trait PeerStack {
    type View;

    /// Build an empty view for a node that just appeared.
    fn create(&mut self, kind: PageKind, key: &NodeKey) -> Self::View;

    /// Detach and drop a view whose node is gone.
    fn destroy(&mut self, key: &NodeKey, view: Self::View);

    /// Refresh a view from its page model.
    fn update(&mut self, view: &mut Self::View, page: PageModel);

    /// Show the placeholder, or hide it with `None`.
    fn set_placeholder(&mut self, placeholder: Option<Placeholder>);

    /// Hide or reveal every peer view at once.
    fn set_peers_hidden(&mut self, hidden: bool);
}

pub struct Reconciler<S: PeerStack> {
    stack: S,
    views: IndexMap<NodeKey, S::View>,
    hidden: bool,
    placeholder: Option<Placeholder>,
}

impl<S: PeerStack> Reconciler<S> {
    pub fn new(mut stack: S) -> Self {
        stack.set_placeholder(Some(Placeholder::Unreachable));
        Self {
            stack,
            views: IndexMap::new(),
            hidden: false,
            placeholder: Some(Placeholder::Unreachable),
        }
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    /// Number of peer views currently shown.
    pub fn visible_len(&self) -> usize {
        if self.hidden { 0 } else { self.views.len() }
    }

    pub fn placeholder(&self) -> Option<Placeholder> {
        self.placeholder
    }

    /// Views in display order, whether or not they are hidden.
    pub fn views(&self) -> impl Iterator<Item = (&NodeKey, &S::View)> {
        self.views.iter()
    }

    pub fn view(&self, key: &NodeKey) -> Option<&S::View> {
        self.views.get(key)
    }

    pub fn view_mut(&mut self, key: &NodeKey) -> Option<&mut S::View> {
        self.views.get_mut(key)
    }

    pub fn view_at(&self, index: usize) -> Option<(&NodeKey, &S::View)> {
        self.views.get_index(index)
    }

    /// Bring the page stack in line with `snapshot`.
    pub fn apply(&mut self, snapshot: &Snapshot) {
        if !snapshot.reachable || snapshot.backend_state.is_disconnected() {
            let reason = if snapshot.reachable {
                Placeholder::Disconnected
            } else {
                Placeholder::Unreachable
            };
            self.set_hidden(true);
            self.show_placeholder(Some(reason));
            return;
        }

        let pages = pages_for(snapshot);

        let stale: Vec<NodeKey> = self
            .views
            .keys()
            .filter(|key| !pages.iter().any(|p| &p.key == *key))
            .cloned()
            .collect();
        for key in stale {
            if let Some(view) = self.views.shift_remove(&key) {
                debug!(node = %key, "removing page");
                self.stack.destroy(&key, view);
            }
        }

        let empty = pages.is_empty();
        let (old, new): (Vec<PageModel>, Vec<PageModel>) = pages
            .into_iter()
            .partition(|p| self.views.contains_key(&p.key));

        for page in &new {
            debug!(node = %page.key, kind = ?page.kind, "adding page");
            let view = self.stack.create(page.kind, &page.key);
            self.views.insert(page.key.clone(), view);
        }

        for page in old.into_iter().chain(new) {
            if let Some(view) = self.views.get_mut(&page.key) {
                self.stack.update(view, page);
            }
        }

        self.set_hidden(false);
        let placeholder = empty.then(|| {
            if snapshot.backend_state == BackendState::NeedsLogin {
                Placeholder::NeedsLogin
            } else {
                Placeholder::Empty
            }
        });
        self.show_placeholder(placeholder);
    }

    fn set_hidden(&mut self, hidden: bool) {
        if self.hidden != hidden {
            self.hidden = hidden;
            self.stack.set_peers_hidden(hidden);
        }
    }

    fn show_placeholder(&mut self, placeholder: Option<Placeholder>) {
        if self.placeholder != placeholder {
            self.placeholder = placeholder;
            self.stack.set_placeholder(placeholder);
        }
    }
}

/// Self first, then the Mullvad page when it is offered, then every other
/// peer in daemon order. Mullvad exit nodes only appear on their own page.
fn pages_for(snapshot: &Snapshot) -> Vec<PageModel> {
    let mut pages: Vec<PageModel> = snapshot
        .self_peer
        .iter()
        .map(|me| PageModel::build(me, snapshot))
        .collect();
    if MullvadSection::available(snapshot) {
        pages.push(PageModel::mullvad(snapshot));
    }
    pages.extend(
        snapshot
            .peers
            .iter()
            .filter(|p| !p.is_mullvad)
            .map(|p| PageModel::build(p, snapshot)),
    );
    pages
}
