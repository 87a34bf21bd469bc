#![forbid(unsafe_code)]

//! Minimal observer subject with RAII unsubscription.
//!
//! Used for the layer registry's "something mounted or unmounted"
//! rebroadcast, modeled as an explicit subject rather than a synthetic
//! document event so the signal stays host-agnostic.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 3. A subscriber dropped during `notify()` by an earlier subscriber is
//!    skipped, not invoked.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

struct Entry {
    id: u64,
    callback: Rc<dyn Fn()>,
}

#[derive(Default)]
struct SubjectInner {
    entries: RefCell<Vec<Entry>>,
    next_id: Cell<u64>,
}

/// A broadcast point: `subscribe` to be called on every `notify`.
#[derive(Clone, Default)]
pub struct Subject {
    inner: Rc<SubjectInner>,
}

impl Subject {
    /// Create a subject with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; it runs on every [`Subject::notify`] until the
    /// returned [`Subscription`] is dropped.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.entries.borrow_mut().push(Entry {
            id,
            callback: Rc::new(callback),
        });
        Subscription {
            id,
            subject: Rc::downgrade(&self.inner),
        }
    }

    /// Invoke all current subscribers in registration order.
    pub fn notify(&self) {
        // Snapshot so subscribers may subscribe/unsubscribe re-entrantly.
        let snapshot: Vec<(u64, Rc<dyn Fn()>)> = self
            .inner
            .entries
            .borrow()
            .iter()
            .map(|e| (e.id, Rc::clone(&e.callback)))
            .collect();
        for (id, callback) in snapshot {
            let alive = self.inner.entries.borrow().iter().any(|e| e.id == id);
            if alive {
                callback();
            }
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.entries.borrow().len()
    }
}

impl std::fmt::Debug for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// RAII guard for a subject subscription; unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    subject: Weak<SubjectInner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subject) = self.subject.upgrade() {
            subject.entries.borrow_mut().retain(|e| e.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_runs_subscribers_in_order() {
        let subject = Subject::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let subs: Vec<_> = (0..3)
            .map(|i| {
                let log = Rc::clone(&log);
                subject.subscribe(move || log.borrow_mut().push(i))
            })
            .collect();
        subject.notify();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let subject = Subject::new();
        let count = Rc::new(Cell::new(0u32));
        let sub = {
            let count = Rc::clone(&count);
            subject.subscribe(move || count.set(count.get() + 1))
        };
        subject.notify();
        drop(sub);
        subject.notify();
        assert_eq!(count.get(), 1);
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_removed_mid_notify_is_skipped() {
        let subject = Subject::new();
        let second_ran = Rc::new(Cell::new(false));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let _first = {
            let slot = Rc::clone(&slot);
            subject.subscribe(move || {
                // Drop the second subscription before it runs.
                slot.borrow_mut().take();
            })
        };
        let second = {
            let second_ran = Rc::clone(&second_ran);
            subject.subscribe(move || second_ran.set(true))
        };
        *slot.borrow_mut() = Some(second);

        subject.notify();
        assert!(!second_ran.get());
    }
}
