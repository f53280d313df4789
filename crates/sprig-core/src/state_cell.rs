use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Token identifying one subscription on a [`StateCell`].
pub type SubscriptionId = u64;

type Subscriber<T> = Rc<dyn Fn(&T)>;

struct StateCellInner<T: Clone + 'static> {
    value: RefCell<T>,
    version: Cell<u64>,
    sealed: Cell<bool>,
    subscribers: RefCell<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_subscription_id: Cell<SubscriptionId>,
}

/// Reactive value holder notifying subscribers on every successful write.
///
/// Each component instance owns exactly one cell. Once the owning instance
/// is destroyed the cell is sealed: writes become silent no-ops so stray
/// timer callbacks cannot touch torn-down state.
pub struct StateCell<T: Clone + 'static> {
    inner: Rc<StateCellInner<T>>,
}

impl<T: Clone + 'static> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> PartialEq for StateCell<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Eq for StateCell<T> {}

impl<T: Clone + 'static> StateCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(StateCellInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                sealed: Cell::new(false),
                subscribers: RefCell::new(Vec::new()),
                next_subscription_id: Cell::new(1),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of successful writes since creation. Strictly increasing.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Replaces the value, bumps the version, and synchronously notifies
    /// subscribers in registration order. No-op once the cell is sealed.
    pub fn set(&self, value: T) {
        if self.inner.sealed.get() {
            return;
        }
        *self.inner.value.borrow_mut() = value;
        self.inner.version.set(self.inner.version.get() + 1);
        self.notify();
    }

    /// Mutates the value in place, then behaves like [`StateCell::set`].
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        if self.inner.sealed.get() {
            return;
        }
        f(&mut self.inner.value.borrow_mut());
        self.inner.version.set(self.inner.version.get() + 1);
        self.notify();
    }

    /// Registers a callback invoked on every future write.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = self.inner.next_subscription_id.get();
        self.inner.next_subscription_id.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(callback)));
        id
    }

    /// Removes a subscription. Unknown or already removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .subscribers
            .borrow_mut()
            .retain(|(registered, _)| *registered != id);
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.get()
    }

    /// Seals the cell and drops its subscribers. Later writes are no-ops.
    pub(crate) fn seal(&self) {
        self.inner.sealed.set(true);
        self.inner.subscribers.borrow_mut().clear();
    }

    fn notify(&self) {
        let subscribers: Vec<(SubscriptionId, Subscriber<T>)> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(id, callback)| (*id, Rc::clone(callback)))
            .collect();
        let current = self.inner.value.borrow().clone();
        for (id, callback) in subscribers {
            // A callback earlier in this batch may have unsubscribed us.
            let still_registered = self
                .inner
                .subscribers
                .borrow()
                .iter()
                .any(|(registered, _)| *registered == id);
            if still_registered {
                callback(&current);
            }
        }
    }
}

impl<T: fmt::Debug + Clone + 'static> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("value", &self.get())
            .field("version", &self.version())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}
