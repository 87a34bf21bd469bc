#![forbid(unsafe_code)]

//! Retained document substrate for the scrim primitives.
//!
//! This crate provides the tree, focus, event, and scheduling model the
//! interaction primitives in `scrim-primitives` are written against:
//!
//! - [`Document`]: a single-threaded node arena with containment and
//!   document-order queries, an active-element focus model, and
//!   capture/bubble event dispatch.
//! - [`TaskQueue`] / [`Document::schedule`]: an explicit "run after the
//!   current turn" primitive standing in for zero-delay timers.
//! - [`Subject`]: an observer subject with RAII unsubscription.
//!
//! All state is transient, in-memory, and scoped to one document; there is
//! no parallelism and no ambient global state.

pub mod document;
pub mod event;
pub mod node;
pub mod schedule;
pub mod subject;

pub use document::{Document, ListenerGuard, ListenerTarget, MutationRecord, ObserverGuard};
pub use event::{Event, EventPayload, EventType, Key, Modifiers, Phase, PointerType};
pub use node::{Display, NodeFlags, NodeId, NodeSpec, Role, Visibility};
pub use schedule::{TaskHandle, TaskQueue};
pub use subject::{Subject, Subscription};
