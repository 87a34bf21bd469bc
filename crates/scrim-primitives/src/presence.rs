#![forbid(unsafe_code)]

//! Presence state machine for exit animations.
//!
//! A node whose owner wants it gone may need to stay in the tree until its
//! exit animation finishes. [`Presence`] tracks that with three states:
//! `Mounted`, `UnmountSuspended` (owner said absent but an animation is
//! running), and `Unmounted`. The transition table itself is a pure
//! function, [`transition`], so it can be checked exhaustively.
//!
//! # Invariants
//!
//! 1. All transitions apply synchronously; there is no deferred state.
//! 2. `prev_animation_name` tracks the animation that was current while
//!    mounted, and `"none"` otherwise, so a *change* of animation on
//!    becoming absent is what suspends unmount.
//! 3. Undefined (state, event) pairs are ignored.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use scrim_dom::{Document, EventPayload, EventType, ListenerGuard, NodeId, Phase};
use tracing::trace;

/// Lifecycle state of a conditionally rendered node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Mounted,
    UnmountSuspended,
    Unmounted,
}

/// Inputs to the presence machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    Mount,
    Unmount,
    AnimationOut,
    AnimationEnd,
}

/// The transition table. Returns `None` for pairs with no defined edge.
#[must_use]
pub fn transition(state: PresenceState, event: PresenceEvent) -> Option<PresenceState> {
    use PresenceEvent as E;
    use PresenceState as S;
    match (state, event) {
        (S::Mounted, E::Unmount) => Some(S::Unmounted),
        (S::Mounted, E::AnimationOut) => Some(S::UnmountSuspended),
        (S::UnmountSuspended, E::Mount) => Some(S::Mounted),
        (S::UnmountSuspended, E::AnimationEnd) => Some(S::Unmounted),
        (S::Unmounted, E::Mount) => Some(S::Mounted),
        _ => None,
    }
}

struct PresenceInner {
    doc: Document,
    state: Cell<PresenceState>,
    node: Cell<Option<NodeId>>,
    /// Animation name observed while mounted; `"none"` otherwise.
    prev_animation_name: RefCell<String>,
    present: Cell<bool>,
}

impl PresenceInner {
    fn current_animation_name(&self) -> String {
        self.node
            .get()
            .map_or_else(|| "none".to_owned(), |n| self.doc.animation_name(n))
    }

    fn send(&self, event: PresenceEvent) {
        let state = self.state.get();
        if let Some(next) = transition(state, event) {
            trace!(?state, ?event, ?next, "presence transition");
            self.state.set(next);
        } else {
            trace!(?state, ?event, "presence event ignored");
        }
        // Track the animation seen while mounted so set_present can tell a
        // newly started exit animation from a carried-over one.
        let name = if self.state.get() == PresenceState::Mounted {
            self.current_animation_name()
        } else {
            "none".to_owned()
        };
        *self.prev_animation_name.borrow_mut() = name;
    }
}

/// Driver for one conditionally rendered node.
pub struct Presence {
    inner: Rc<PresenceInner>,
    animation_guards: Vec<ListenerGuard>,
}

impl Presence {
    /// Create a machine whose initial state reflects `present`.
    #[must_use]
    pub fn new(doc: &Document, present: bool) -> Self {
        let initial = if present {
            PresenceState::Mounted
        } else {
            PresenceState::Unmounted
        };
        Self {
            inner: Rc::new(PresenceInner {
                doc: doc.clone(),
                state: Cell::new(initial),
                node: Cell::new(None),
                prev_animation_name: RefCell::new("none".to_owned()),
                present: Cell::new(present),
            }),
            animation_guards: Vec::new(),
        }
    }

    /// Point the machine at the rendered node, or detach it with `None`.
    ///
    /// Detaching while an exit animation was pending completes the unmount,
    /// since there is no node left to animate.
    pub fn set_node(&mut self, node: Option<NodeId>) {
        self.animation_guards.clear();
        self.inner.node.set(node);
        let Some(node) = node else {
            self.inner.send(PresenceEvent::AnimationEnd);
            return;
        };
        let doc = &self.inner.doc;

        self.animation_guards.push(doc.on_node(
            node,
            EventType::AnimationStart,
            Phase::Bubble,
            {
                let inner = Rc::clone(&self.inner);
                move |_, event| {
                    if event.target() != node {
                        return;
                    }
                    // An animation that starts while mounted becomes the
                    // baseline for the next present -> absent comparison.
                    if inner.state.get() == PresenceState::Mounted {
                        *inner.prev_animation_name.borrow_mut() = inner.current_animation_name();
                    }
                }
            },
        ));

        for event_type in [EventType::AnimationEnd, EventType::AnimationCancel] {
            self.animation_guards.push(doc.on_node(node, event_type, Phase::Bubble, {
                let inner = Rc::clone(&self.inner);
                move |_, event| {
                    if event.target() != node {
                        return;
                    }
                    let name = match event.payload() {
                        EventPayload::AnimationEnd { name }
                        | EventPayload::AnimationCancel { name } => name.clone(),
                        _ => return,
                    };
                    // The computed name may be a comma-separated list.
                    if inner.current_animation_name().contains(&name) {
                        inner.send(PresenceEvent::AnimationEnd);
                    }
                }
            }));
        }
    }

    /// Owner toggled presence.
    pub fn set_present(&self, present: bool) {
        let inner = &self.inner;
        let was_present = inner.present.replace(present);
        if present {
            inner.send(PresenceEvent::Mount);
            return;
        }
        let current = inner.current_animation_name();
        let display_none = inner
            .node
            .get()
            .is_some_and(|n| inner.doc.display(n) == scrim_dom::Display::None);
        if current == "none" || display_none {
            // Nothing will animate; unmount immediately.
            inner.send(PresenceEvent::Unmount);
        } else if was_present && *inner.prev_animation_name.borrow() != current {
            // A new animation kicked in as the node became absent: that is
            // the exit animation, so hold the unmount until it finishes.
            inner.send(PresenceEvent::AnimationOut);
        } else {
            inner.send(PresenceEvent::Unmount);
        }
    }

    /// Whether the node should currently be kept in the tree.
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(
            self.inner.state.get(),
            PresenceState::Mounted | PresenceState::UnmountSuspended
        )
    }

    #[must_use]
    pub fn state(&self) -> PresenceState {
        self.inner.state.get()
    }
}
