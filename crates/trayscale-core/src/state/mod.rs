//! Observable state for the UI thread.
//!
//! A small push/pull dependency graph:
//!
//! - [`Cell`] holds a value and publishes every distinct `set`.
//! - [`Derived`] is a memoized pure function of one or more upstream
//!   sources, invalidated by push and evaluated on pull.
//! - [`Unique`] drops republications equal to the previous value.
//!
//! Nodes are `Rc`-based and therefore `!Send`: every `set` and every
//! listener runs on the thread that owns the graph. Background tasks reach
//! that thread through [`UiHandle::post`].
//!
//! Listeners must return quickly. Long work belongs on a spawned task that
//! posts its result back.

mod cell;
mod derived;
mod node;
mod schedule;

pub use cell::Cell;
pub use derived::{Derived, Unique};
pub use node::Subscription;
pub use schedule::{UiHandle, UiQueue, UiTask, ui_channel};

/// Anything a [`Derived`] can depend on.
pub trait Source<T>: Clone + 'static {
    /// The current value, evaluating lazily if needed.
    fn get(&self) -> T;

    /// Invoke `f` for every distinct publication. Dropping the returned
    /// subscription detaches `f`.
    fn listen(&self, f: impl Fn(&T) + 'static) -> Subscription;
}
