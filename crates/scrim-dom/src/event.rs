#![forbid(unsafe_code)]

//! Synthetic event types dispatched through a [`Document`].
//!
//! Events travel a capture phase (document, then root towards the target)
//! followed by a bubble phase (target towards the root, then document).
//! Listeners may call [`Event::prevent_default`]; the dispatcher's caller
//! observes the flag on the returned event and decides whether to apply the
//! platform default action.
//!
//! [`Document`]: crate::document::Document

use bitflags::bitflags;

use crate::node::NodeId;

/// The input device class behind a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerType {
    Mouse,
    Touch,
    Pen,
}

/// Keyboard key identity, reduced to what the primitives route on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Escape,
    Enter,
    Char(char),
}

bitflags! {
    /// Keyboard modifier state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT = 1 << 1;
        const CTRL = 1 << 2;
        const META = 1 << 3;
    }
}

/// Event payload, one variant per event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    PointerDown { pointer_type: PointerType },
    Click,
    /// Focus arrived; `related_target` is the node focus left, if any.
    FocusIn { related_target: Option<NodeId> },
    /// Focus left; `related_target` is the node focus moved to. `None`
    /// means the platform took focus away (window switch, node removal).
    FocusOut { related_target: Option<NodeId> },
    KeyDown { key: Key, modifiers: Modifiers },
    AnimationStart { name: String },
    AnimationEnd { name: String },
    AnimationCancel { name: String },
}

impl EventPayload {
    /// The event type of this payload.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Self::PointerDown { .. } => EventType::PointerDown,
            Self::Click => EventType::Click,
            Self::FocusIn { .. } => EventType::FocusIn,
            Self::FocusOut { .. } => EventType::FocusOut,
            Self::KeyDown { .. } => EventType::KeyDown,
            Self::AnimationStart { .. } => EventType::AnimationStart,
            Self::AnimationEnd { .. } => EventType::AnimationEnd,
            Self::AnimationCancel { .. } => EventType::AnimationCancel,
        }
    }
}

/// Event type tag, used to key listener registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    PointerDown,
    Click,
    FocusIn,
    FocusOut,
    KeyDown,
    AnimationStart,
    AnimationEnd,
    AnimationCancel,
}

/// Which half of the dispatch a listener runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Capture,
    Bubble,
}

/// A dispatched event.
///
/// # Failure Modes
///
/// - Dispatching at a detached target is a silent no-op; the returned event
///   carries `default_prevented() == false`.
#[derive(Debug)]
pub struct Event {
    target: NodeId,
    payload: EventPayload,
    default_prevented: bool,
}

impl Event {
    pub(crate) fn new(target: NodeId, payload: EventPayload) -> Self {
        Self {
            target,
            payload,
            default_prevented: false,
        }
    }

    /// The node the event was dispatched at.
    #[inline]
    #[must_use]
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// The event payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// The event type.
    #[inline]
    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Suppress the platform default action for this event.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Whether a listener suppressed the default action.
    #[inline]
    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}
