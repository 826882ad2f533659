// ── Derived values ──
//
// Upstream publications mark a derivation dirty. A dirty derivation is
// re-evaluated when read, or immediately if something is listening to it.

use std::cell::{Cell as StdCell, RefCell};
use std::rc::Rc;

use super::Source;
use super::node::{Node, Subscription};

struct Inner<U> {
    node: Rc<Node<U>>,
    compute: Box<dyn Fn() -> U>,
    dirty: StdCell<bool>,
    upstream: RefCell<Vec<Subscription>>,
}

impl<U: Clone + 'static> Inner<U> {
    fn refresh(&self) {
        if self.dirty.replace(false) {
            self.node.publish((self.compute)());
        }
    }

    fn invalidate(&self) {
        self.dirty.set(true);
        if self.node.has_listeners() {
            self.refresh();
        }
    }

    fn attach<T, S: Source<T>>(self: &Rc<Self>, src: &S) {
        let weak = Rc::downgrade(self);
        let sub = src.listen(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate();
            }
        });
        self.upstream.borrow_mut().push(sub);
    }
}

/// A memoized pure function of upstream sources.
pub struct Derived<U> {
    inner: Rc<Inner<U>>,
}

impl<U> Clone for Derived<U> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<U: Clone + PartialEq + 'static> Derived<U> {
    pub fn map<T: 'static, S: Source<T>>(src: &S, f: impl Fn(&T) -> U + 'static) -> Self {
        Self::map_with_eq(src, f, PartialEq::eq)
    }

    pub fn map2<A: 'static, B: 'static, SA: Source<A>, SB: Source<B>>(
        a: &SA,
        b: &SB,
        f: impl Fn(&A, &B) -> U + 'static,
    ) -> Self {
        let (ca, cb) = (a.clone(), b.clone());
        let inner = Self::build(move || f(&ca.get(), &cb.get()), PartialEq::eq);
        inner.attach(a);
        inner.attach(b);
        Self { inner }
    }
}

impl<U: Clone + 'static> Derived<U> {
    /// Like [`map`](Self::map) with a custom equality for deduplication.
    pub fn map_with_eq<T: 'static, S: Source<T>>(
        src: &S,
        f: impl Fn(&T) -> U + 'static,
        eq: impl Fn(&U, &U) -> bool + 'static,
    ) -> Self {
        let upstream = src.clone();
        let inner = Self::build(move || f(&upstream.get()), eq);
        inner.attach(src);
        Self { inner }
    }

    fn build(
        compute: impl Fn() -> U + 'static,
        eq: impl Fn(&U, &U) -> bool + 'static,
    ) -> Rc<Inner<U>> {
        let initial = compute();
        Rc::new(Inner {
            node: Rc::new(Node::new(initial, eq)),
            compute: Box::new(compute),
            dirty: StdCell::new(false),
            upstream: RefCell::new(Vec::new()),
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&U) -> R) -> R {
        self.inner.refresh();
        self.inner.node.with(f)
    }
}

impl<U: Clone + 'static> Source<U> for Derived<U> {
    fn get(&self) -> U {
        self.inner.refresh();
        self.inner.node.get()
    }

    fn listen(&self, f: impl Fn(&U) + 'static) -> Subscription {
        self.inner.refresh();
        self.inner.node.listen(f)
    }
}

/// Passes through only values that differ from the previous one.
pub struct Unique<T>(Derived<T>);

impl<T> Clone for Unique<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Clone + PartialEq + 'static> Unique<T> {
    pub fn new<S: Source<T>>(src: &S) -> Self {
        Self(Derived::map(src, T::clone))
    }
}

impl<T: Clone + 'static> Source<T> for Unique<T> {
    fn get(&self) -> T {
        self.0.get()
    }

    fn listen(&self, f: impl Fn(&T) + 'static) -> Subscription {
        self.0.listen(f)
    }
}
