#![forbid(unsafe_code)]

//! Facade crate re-exporting the scrim substrate and primitives.
//!
//! Most users want this crate: it surfaces the document substrate from
//! [`scrim_dom`] under [`dom`] and the interaction primitives from
//! [`scrim_primitives`] at the top level.
//!
//! ```
//! use scrim::dom::{Document, NodeSpec};
//! use scrim::{LayerOptions, LayerRegistry};
//!
//! let doc = Document::new();
//! let registry = LayerRegistry::new(&doc);
//! let node = doc.create_child(doc.body(), NodeSpec::new());
//! let layer = registry.mount(node, LayerOptions::new());
//! assert!(layer.is_top());
//! ```

pub use scrim_dom as dom;

pub use scrim_primitives::{
    AutoFocusEvent, Branch, Collection, CollectionItemGuard, EscapeKeyDownEvent, FocusOutside,
    FocusOutsideDetector, FocusScope, FocusScopeOptions, FocusScopeStack, InsideFlag,
    InteractOrigin, InteractOutsideEvent, Layer, LayerOptions, LayerRegistry, Presence,
    PresenceEvent, PresenceState, PointerDownOutside, PointerDownOutsideDetector, transition,
};
pub use scrim_primitives::{collection, focus_scope, layer, outside, presence, tabbable};
