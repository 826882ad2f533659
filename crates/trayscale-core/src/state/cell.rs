// ── Writable state cell ──

use std::rc::Rc;

use super::Source;
use super::node::{Node, Subscription};

/// Holds the latest `T`; `set` publishes when the value differs from the
/// last one under the cell's equality predicate.
pub struct Cell<T> {
    node: Rc<Node<T>>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Cell<T> {
    pub fn new(value: T) -> Self {
        Self::with_eq(value, PartialEq::eq)
    }
}

impl<T: Clone + 'static> Cell<T> {
    /// A cell deduplicating with `eq` instead of `PartialEq`.
    pub fn with_eq(value: T, eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self {
            node: Rc::new(Node::new(value, eq)),
        }
    }

    /// Publish `value`. Returns whether listeners were notified.
    pub fn set(&self, value: T) -> bool {
        self.node.publish(value)
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.node.with(f)
    }
}

impl<T: Clone + 'static> Source<T> for Cell<T> {
    fn get(&self) -> T {
        self.node.get()
    }

    fn listen(&self, f: impl Fn(&T) + 'static) -> Subscription {
        self.node.listen(f)
    }
}
