// Shared publication machinery for cells and derivations.

use std::cell::{Cell as StdCell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<dyn Fn(&T)>;

/// Handle returned by `listen`. Dropping it detaches the listener.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Detach now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the listener attached for as long as its source lives.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A value plus its listeners.
///
/// Publications made from inside a listener are queued and delivered after
/// the current one, so every listener sees values in `set` order.
pub(crate) struct Node<T> {
    value: RefCell<T>,
    eq: Box<dyn Fn(&T, &T) -> bool>,
    listeners: RefCell<Vec<(u64, Listener<T>)>>,
    next_id: StdCell<u64>,
    pending: RefCell<VecDeque<T>>,
    notifying: StdCell<bool>,
}

impl<T: Clone + 'static> Node<T> {
    pub(crate) fn new(value: T, eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self {
            value: RefCell::new(value),
            eq: Box::new(eq),
            listeners: RefCell::new(Vec::new()),
            next_id: StdCell::new(0),
            pending: RefCell::new(VecDeque::new()),
            notifying: StdCell::new(false),
        }
    }

    pub(crate) fn get(&self) -> T {
        self.value.borrow().clone()
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    pub(crate) fn has_listeners(&self) -> bool {
        !self.listeners.borrow().is_empty()
    }

    /// Store `value` and notify, unless it equals the current value.
    pub(crate) fn publish(&self, value: T) -> bool {
        if (self.eq)(&self.value.borrow(), &value) {
            return false;
        }
        *self.value.borrow_mut() = value.clone();
        self.pending.borrow_mut().push_back(value);

        if self.notifying.replace(true) {
            return true;
        }
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(next) = next else { break };
            let listeners: Vec<Listener<T>> = self
                .listeners
                .borrow()
                .iter()
                .map(|(_, l)| Rc::clone(l))
                .collect();
            for listener in listeners {
                listener(&next);
            }
        }
        self.notifying.set(false);
        true
    }

    pub(crate) fn listen(self: &Rc<Self>, f: impl Fn(&T) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::new(f)));

        let weak: Weak<Self> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(node) = weak.upgrade() {
                node.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }
}
