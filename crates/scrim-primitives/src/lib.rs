#![forbid(unsafe_code)]

//! Unstyled interaction primitives over the `scrim-dom` substrate.
//!
//! Each module is one primitive:
//!
//! - [`layer`]: dismissable layer stack with outside-interaction dismissal
//!   and body pointer-events management.
//! - [`focus_scope`]: focus trapping, Tab looping, and mount/unmount
//!   autofocus for a container.
//! - [`presence`]: keep-until-exit-animation-finishes state machine.
//! - [`collection`]: document-order item registry for composite widgets.
//! - [`outside`]: the pointer/focus outside-interaction detectors the
//!   layer machinery is built on.
//! - [`tabbable`]: tab-order queries shared by the focus primitives.
//!
//! All registries are document-scoped values the caller owns; nothing here
//! is ambient or global. Every mounted thing is an RAII guard.

pub mod collection;
pub mod focus_scope;
pub mod layer;
pub mod outside;
pub mod presence;
pub mod tabbable;

pub use collection::{Collection, CollectionItemGuard};
pub use focus_scope::{AutoFocusEvent, FocusScope, FocusScopeOptions, FocusScopeStack};
pub use layer::{
    Branch, EscapeKeyDownEvent, InteractOrigin, InteractOutsideEvent, Layer, LayerOptions,
    LayerRegistry,
};
pub use outside::{
    FocusOutside, FocusOutsideDetector, InsideFlag, PointerDownOutside, PointerDownOutsideDetector,
};
pub use presence::{Presence, PresenceEvent, PresenceState, transition};
