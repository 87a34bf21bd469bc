#![forbid(unsafe_code)]

//! "Schedule after the current turn" task queue.
//!
//! The core never performs timer- or network-based async work; the only
//! suspension it needs is deferring a closure to a later turn of the event
//! loop (the browser's zero-delay timeout). [`TaskQueue`] makes that
//! primitive explicit so hosts can drive it from whatever loop they own.
//!
//! # Invariants
//!
//! 1. Tasks run in schedule order.
//! 2. A task scheduled while a turn is draining runs on the *next* turn,
//!    never the current one.
//! 3. A canceled task never runs; cancellation after the task ran is a
//!    no-op.
//!
//! # Failure Modes
//!
//! - Canceling through a handle whose queue was dropped is a no-op.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

type Task = Box<dyn FnOnce()>;

#[derive(Default)]
struct QueueInner {
    tasks: RefCell<VecDeque<(u64, Task)>>,
    next_id: Cell<u64>,
}

/// Single-threaded deferred task queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    inner: Rc<QueueInner>,
}

impl TaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run on the next turn. Returns a cancelation handle.
    pub fn schedule(&self, task: impl FnOnce() + 'static) -> TaskHandle {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.tasks.borrow_mut().push_back((id, Box::new(task)));
        TaskHandle {
            id,
            queue: Rc::downgrade(&self.inner),
        }
    }

    /// Run one turn: every task scheduled before this call, in order.
    ///
    /// Tasks scheduled by running tasks are left for the following turn.
    pub fn run_turn(&self) {
        let pending = self.inner.tasks.borrow().len();
        for _ in 0..pending {
            let next = self.inner.tasks.borrow_mut().pop_front();
            match next {
                Some((_, task)) => task(),
                None => break,
            }
        }
    }

    /// Number of tasks currently pending.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.tasks.borrow().len()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Handle to a scheduled task. Dropping the handle does *not* cancel the
/// task; call [`TaskHandle::cancel`] to clear it on teardown.
#[derive(Debug)]
pub struct TaskHandle {
    id: u64,
    queue: Weak<QueueInner>,
}

impl TaskHandle {
    /// Remove the task from the queue if it has not run yet.
    pub fn cancel(self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.tasks.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}
