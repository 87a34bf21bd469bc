#![forbid(unsafe_code)]

//! Node identity, behavior flags, and per-node style state.
//!
//! A [`NodeId`] is an opaque, non-owning handle into a [`Document`]'s arena.
//! Ids are monotonic and never reused, so a stale id held across a removal
//! can never alias a newly created node; every dereference inside the
//! document re-validates liveness first.
//!
//! [`Document`]: crate::document::Document

use bitflags::bitflags;

/// Unique identifier for a node in a document.
///
/// Copyable and hashable; holding one does not keep the node alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

bitflags! {
    /// Behavior flags for a node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// The node refuses focus and sequential navigation.
        const DISABLED = 1 << 0;
        /// The node holds selectable text (focus with `select` highlights it).
        const TEXT_SELECTABLE = 1 << 1;
    }
}

/// Semantic role of a node.
///
/// Only roles the primitives act on are modeled; everything else is
/// [`Role::Generic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Generic,
    /// Link-like nodes are excluded from auto-focus candidate lists.
    Link,
    Dialog,
    Menu,
    MenuItem,
}

/// Computed display of a node. `None` removes the subtree from layout and
/// from visibility walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Block,
    None,
}

/// Computed visibility of a node. Unlike [`Display::None`], `Hidden` only
/// affects the node itself in visibility queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Specification for a new node, builder-style.
///
/// # Example
///
/// ```
/// use scrim_dom::{NodeSpec, Role};
///
/// let spec = NodeSpec::new().tab_index(0).role(Role::Link);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    pub(crate) tab_index: Option<i32>,
    pub(crate) flags: NodeFlags,
    pub(crate) role: Role,
    pub(crate) display: Display,
    pub(crate) visibility: Visibility,
    pub(crate) animation_name: Option<String>,
}

impl NodeSpec {
    /// Create a spec for a plain, unfocusable node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tab index. `0` and above makes the node tabbable; a negative
    /// value makes it focusable only programmatically.
    pub fn tab_index(mut self, value: i32) -> Self {
        self.tab_index = Some(value);
        self
    }

    /// Mark the node disabled.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.flags.set(NodeFlags::DISABLED, disabled);
        self
    }

    /// Mark the node as holding selectable text.
    pub fn text_selectable(mut self) -> Self {
        self.flags.insert(NodeFlags::TEXT_SELECTABLE);
        self
    }

    /// Set the semantic role.
    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Set the computed display.
    pub fn display(mut self, display: Display) -> Self {
        self.display = display;
        self
    }

    /// Set the computed visibility.
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the computed animation name (`"none"` when unset).
    pub fn animation_name(mut self, name: impl Into<String>) -> Self {
        self.animation_name = Some(name.into());
        self
    }
}

/// Per-node state stored in the document arena.
#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) tab_index: Option<i32>,
    pub(crate) flags: NodeFlags,
    pub(crate) role: Role,
    pub(crate) display: Display,
    pub(crate) visibility: Visibility,
    /// Inline pointer-events value. Empty string means "not set"; restores
    /// must be byte-for-byte, so this is a raw string, not an enum.
    pub(crate) pointer_events: String,
    pub(crate) animation_name: String,
    pub(crate) attributes: ahash::AHashMap<String, String>,
    /// Whether the node's text is currently selected (set by focus-with-select).
    pub(crate) text_selected: bool,
}

impl NodeData {
    pub(crate) fn from_spec(spec: NodeSpec) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            tab_index: spec.tab_index,
            flags: spec.flags,
            role: spec.role,
            display: spec.display,
            visibility: spec.visibility,
            pointer_events: String::new(),
            animation_name: spec.animation_name.unwrap_or_else(|| "none".to_owned()),
            attributes: ahash::AHashMap::new(),
            text_selected: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_defaults() {
        let data = NodeData::from_spec(NodeSpec::new());
        assert_eq!(data.tab_index, None);
        assert_eq!(data.animation_name, "none");
        assert_eq!(data.pointer_events, "");
        assert!(!data.flags.contains(NodeFlags::DISABLED));
    }

    #[test]
    fn spec_builder_round_trip() {
        let data = NodeData::from_spec(
            NodeSpec::new()
                .tab_index(-1)
                .disabled(true)
                .role(Role::Link)
                .display(Display::None)
                .visibility(Visibility::Hidden)
                .animation_name("fade-out"),
        );
        assert_eq!(data.tab_index, Some(-1));
        assert!(data.flags.contains(NodeFlags::DISABLED));
        assert_eq!(data.role, Role::Link);
        assert_eq!(data.display, Display::None);
        assert_eq!(data.visibility, Visibility::Hidden);
        assert_eq!(data.animation_name, "fade-out");
    }

    #[test]
    fn node_ids_are_ordered_by_creation() {
        assert!(NodeId::new(1) < NodeId::new(2));
        assert_eq!(NodeId::new(7).raw(), 7);
    }
}
