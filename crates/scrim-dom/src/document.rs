#![forbid(unsafe_code)]

//! The retained document: node arena, focus model, and event dispatch.
//!
//! A [`Document`] is a cloneable handle (`Rc` inner) to a single-threaded
//! node tree with a body, an active (focused) element, listener and
//! mutation-observer registries, and a deferred task queue. It is the
//! substrate every primitive in this workspace operates on; nothing here
//! knows about layers, scopes, or presence.
//!
//! # Invariants
//!
//! 1. Node ids are never reused; a removed node's id stays dead forever.
//! 2. `active_element()` always names a live node; removing the focused
//!    subtree silently moves focus to the body (the platform fallback the
//!    focus primitives must correct).
//! 3. Dispatch runs capture (document, then root towards target) before
//!    bubble (target towards root, then document). Listeners removed
//!    mid-dispatch do not run; listeners added mid-dispatch run only for
//!    later events.
//! 4. Mutation observers are notified after a removal completes, in
//!    registration order, only when their root still contains the
//!    removal's parent.
//!
//! # Failure Modes
//!
//! - Every query against a missing or detached node is a silent no-op
//!   (`false`, `None`, or empty), never a panic.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tracing::{debug, trace};

use crate::event::{Event, EventPayload, EventType, Phase};
use crate::node::{Display, NodeData, NodeFlags, NodeId, NodeSpec, Role, Visibility};
use crate::schedule::{TaskHandle, TaskQueue};

/// What a listener is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerTarget {
    /// Runs for every event reaching the document boundary of its phase.
    Document,
    /// Runs when the node is on the event's propagation path.
    Node(NodeId),
}

type ListenerCallback = Rc<dyn Fn(&Document, &mut Event)>;
type ObserverCallback = Rc<dyn Fn(&Document, &[MutationRecord])>;

struct ListenerEntry {
    id: u64,
    target: ListenerTarget,
    event_type: EventType,
    phase: Phase,
    callback: ListenerCallback,
}

struct ObserverEntry {
    id: u64,
    root: NodeId,
    callback: ObserverCallback,
}

/// One removal delivered to mutation observers.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    /// Parent the subtree was detached from (`None` for a free subtree).
    pub parent: Option<NodeId>,
    /// Every node of the removed subtree, in former document order.
    pub removed: Vec<NodeId>,
}

struct DocumentInner {
    nodes: RefCell<AHashMap<NodeId, NodeData>>,
    root: NodeId,
    body: NodeId,
    next_node_id: Cell<u64>,
    active: Cell<NodeId>,
    listeners: RefCell<Vec<ListenerEntry>>,
    next_listener_id: Cell<u64>,
    observers: RefCell<Vec<ObserverEntry>>,
    next_observer_id: Cell<u64>,
    tasks: TaskQueue,
}

/// Cloneable handle to a retained document tree.
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.inner.nodes.borrow().len())
            .field("active", &self.inner.active.get())
            .finish()
    }
}

impl Document {
    /// Create a document with a root and a body node; the body holds focus.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = AHashMap::new();
        let root = NodeId::new(0);
        let body = NodeId::new(1);
        nodes.insert(root, NodeData::from_spec(NodeSpec::new()));
        let mut body_data = NodeData::from_spec(NodeSpec::new());
        body_data.parent = Some(root);
        nodes.insert(body, body_data);
        if let Some(root_data) = nodes.get_mut(&root) {
            root_data.children.push(body);
        }
        Self {
            inner: Rc::new(DocumentInner {
                nodes: RefCell::new(nodes),
                root,
                body,
                next_node_id: Cell::new(2),
                active: Cell::new(body),
                listeners: RefCell::new(Vec::new()),
                next_listener_id: Cell::new(0),
                observers: RefCell::new(Vec::new()),
                next_observer_id: Cell::new(0),
                tasks: TaskQueue::new(),
            }),
        }
    }

    /// The document root.
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    /// The body node (focus fallback, pointer-events host).
    #[inline]
    #[must_use]
    pub fn body(&self) -> NodeId {
        self.inner.body
    }

    // --- Tree construction and removal ---

    /// Create a detached node from `spec`.
    pub fn create_node(&self, spec: NodeSpec) -> NodeId {
        let id = NodeId::new(self.inner.next_node_id.get());
        self.inner.next_node_id.set(id.raw() + 1);
        self.inner
            .nodes
            .borrow_mut()
            .insert(id, NodeData::from_spec(spec));
        id
    }

    /// Create a node from `spec` and append it to `parent`.
    pub fn create_child(&self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let id = self.create_node(spec);
        self.append_child(parent, id);
        id
    }

    /// Append a detached `child` under `parent`. No-op (returns `false`)
    /// if either node is missing, the child already has a parent, or the
    /// append would create a cycle.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> bool {
        if parent == child || self.contains(child, parent) {
            return false;
        }
        let mut nodes = self.inner.nodes.borrow_mut();
        if !nodes.contains_key(&parent) {
            return false;
        }
        match nodes.get_mut(&child) {
            Some(data) if data.parent.is_none() => data.parent = Some(parent),
            _ => return false,
        }
        if let Some(data) = nodes.get_mut(&parent) {
            data.children.push(child);
        }
        true
    }

    /// Remove `node` and its subtree, then notify mutation observers whose
    /// root still contains the detachment point.
    ///
    /// If the focused element is inside the removed subtree, focus silently
    /// falls back to the body (no focus events fire, matching engines that
    /// drop focus on removal).
    pub fn remove(&self, node: NodeId) {
        let (parent, removed) = {
            let mut nodes = self.inner.nodes.borrow_mut();
            if !nodes.contains_key(&node) {
                return;
            }
            let parent = nodes.get(&node).and_then(|d| d.parent);
            if let Some(parent_data) = parent.and_then(|p| nodes.get_mut(&p)) {
                parent_data.children.retain(|c| *c != node);
            }
            let mut removed = Vec::new();
            let mut stack = vec![node];
            while let Some(current) = stack.pop() {
                if let Some(data) = nodes.remove(&current) {
                    // Children pushed in reverse keeps preorder in `removed`.
                    for child in data.children.iter().rev() {
                        stack.push(*child);
                    }
                    removed.push(current);
                }
            }
            (parent, removed)
        };
        if removed.contains(&self.inner.active.get()) {
            self.inner.active.set(self.inner.body);
        }
        debug!(node = node.raw(), count = removed.len(), "subtree removed");
        let record = MutationRecord { parent, removed };
        self.notify_observers(&record);
    }

    fn notify_observers(&self, record: &MutationRecord) {
        let snapshot: Vec<(u64, NodeId, ObserverCallback)> = self
            .inner
            .observers
            .borrow()
            .iter()
            .map(|o| (o.id, o.root, Rc::clone(&o.callback)))
            .collect();
        let records = std::slice::from_ref(record);
        for (id, observer_root, callback) in snapshot {
            let alive = self
                .inner
                .observers
                .borrow()
                .iter()
                .any(|o| o.id == id);
            if !alive {
                continue;
            }
            let in_scope = match record.parent {
                Some(parent) => self.contains(observer_root, parent),
                None => false,
            };
            if in_scope {
                callback(self, records);
            }
        }
    }

    // --- Structure queries ---

    /// Whether `node` is still in the arena (attached or not).
    #[must_use]
    pub fn exists(&self, node: NodeId) -> bool {
        self.inner.nodes.borrow().contains_key(&node)
    }

    /// Parent of `node`, if any.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.nodes.borrow().get(&node)?.parent
    }

    /// Children of `node` in insertion order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .nodes
            .borrow()
            .get(&node)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    /// Whether `ancestor` contains `node` (inclusive: a node contains itself).
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let nodes = self.inner.nodes.borrow();
        if !nodes.contains_key(&ancestor) {
            return false;
        }
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = nodes.get(&id).and_then(|d| d.parent);
        }
        false
    }

    /// Whether `node` is reachable from the document root.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.exists(node) && self.contains(self.inner.root, node)
    }

    /// Preorder traversal of `container`'s subtree, container first.
    #[must_use]
    pub fn subtree(&self, container: NodeId) -> Vec<NodeId> {
        let nodes = self.inner.nodes.borrow();
        if !nodes.contains_key(&container) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut stack = vec![container];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(data) = nodes.get(&current) {
                for child in data.children.iter().rev() {
                    stack.push(*child);
                }
            }
        }
        out
    }

    /// Index of every connected node in document (preorder) position.
    #[must_use]
    pub fn document_positions(&self) -> AHashMap<NodeId, usize> {
        self.subtree(self.inner.root)
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect()
    }

    /// Descendants of `container` (inclusive) carrying attribute `name`,
    /// in document order.
    #[must_use]
    pub fn descendants_with_attribute(&self, container: NodeId, name: &str) -> Vec<NodeId> {
        let ordered = self.subtree(container);
        let nodes = self.inner.nodes.borrow();
        ordered
            .into_iter()
            .filter(|id| {
                nodes
                    .get(id)
                    .is_some_and(|d| d.attributes.contains_key(name))
            })
            .collect()
    }

    // --- Attributes and computed style ---

    /// Set attribute `name` on `node`. Returns `false` if the node is gone.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> bool {
        match self.inner.nodes.borrow_mut().get_mut(&node) {
            Some(data) => {
                data.attributes.insert(name.to_owned(), value.to_owned());
                true
            }
            None => false,
        }
    }

    /// Remove attribute `name` from `node`.
    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(data) = self.inner.nodes.borrow_mut().get_mut(&node) {
            data.attributes.remove(name);
        }
    }

    /// Read attribute `name` from `node`.
    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .nodes
            .borrow()
            .get(&node)?
            .attributes
            .get(name)
            .cloned()
    }

    /// Computed animation name (`"none"` for missing nodes).
    #[must_use]
    pub fn animation_name(&self, node: NodeId) -> String {
        self.inner
            .nodes
            .borrow()
            .get(&node)
            .map_or_else(|| "none".to_owned(), |d| d.animation_name.clone())
    }

    /// Set the computed animation name.
    pub fn set_animation_name(&self, node: NodeId, name: impl Into<String>) {
        if let Some(data) = self.inner.nodes.borrow_mut().get_mut(&node) {
            data.animation_name = name.into();
        }
    }

    /// Computed display (`Block` for missing nodes).
    #[must_use]
    pub fn display(&self, node: NodeId) -> Display {
        self.inner
            .nodes
            .borrow()
            .get(&node)
            .map_or(Display::Block, |d| d.display)
    }

    /// Set the computed display.
    pub fn set_display(&self, node: NodeId, display: Display) {
        if let Some(data) = self.inner.nodes.borrow_mut().get_mut(&node) {
            data.display = display;
        }
    }

    /// Computed visibility (`Visible` for missing nodes).
    #[must_use]
    pub fn visibility(&self, node: NodeId) -> Visibility {
        self.inner
            .nodes
            .borrow()
            .get(&node)
            .map_or(Visibility::Visible, |d| d.visibility)
    }

    /// Set the computed visibility.
    pub fn set_visibility(&self, node: NodeId, visibility: Visibility) {
        if let Some(data) = self.inner.nodes.borrow_mut().get_mut(&node) {
            data.visibility = visibility;
        }
    }

    /// Inline pointer-events value, raw (empty string when unset).
    #[must_use]
    pub fn pointer_events(&self, node: NodeId) -> String {
        self.inner
            .nodes
            .borrow()
            .get(&node)
            .map(|d| d.pointer_events.clone())
            .unwrap_or_default()
    }

    /// Set the inline pointer-events value verbatim.
    pub fn set_pointer_events(&self, node: NodeId, value: impl Into<String>) {
        if let Some(data) = self.inner.nodes.borrow_mut().get_mut(&node) {
            data.pointer_events = value.into();
        }
    }

    /// Tab index of `node`.
    #[must_use]
    pub fn tab_index(&self, node: NodeId) -> Option<i32> {
        self.inner.nodes.borrow().get(&node)?.tab_index
    }

    /// Set or clear the tab index.
    pub fn set_tab_index(&self, node: NodeId, tab_index: Option<i32>) {
        if let Some(data) = self.inner.nodes.borrow_mut().get_mut(&node) {
            data.tab_index = tab_index;
        }
    }

    /// Whether `node` is disabled.
    #[must_use]
    pub fn is_disabled(&self, node: NodeId) -> bool {
        self.inner
            .nodes
            .borrow()
            .get(&node)
            .is_some_and(|d| d.flags.contains(NodeFlags::DISABLED))
    }

    /// Set the disabled flag.
    pub fn set_disabled(&self, node: NodeId, disabled: bool) {
        if let Some(data) = self.inner.nodes.borrow_mut().get_mut(&node) {
            data.flags.set(NodeFlags::DISABLED, disabled);
        }
    }

    /// Semantic role of `node` (`Generic` for missing nodes).
    #[must_use]
    pub fn role(&self, node: NodeId) -> Role {
        self.inner
            .nodes
            .borrow()
            .get(&node)
            .map_or(Role::Generic, |d| d.role)
    }

    /// Whether a focus-with-select left the node's text selected.
    #[must_use]
    pub fn is_text_selected(&self, node: NodeId) -> bool {
        self.inner
            .nodes
            .borrow()
            .get(&node)
            .is_some_and(|d| d.text_selected)
    }

    /// Whether `node` is hidden by `visibility: hidden` on itself or
    /// `display: none` anywhere up to (and excluding) `boundary`.
    ///
    /// With `boundary = None` the walk runs to the root.
    #[must_use]
    pub fn is_effectively_hidden(&self, node: NodeId, boundary: Option<NodeId>) -> bool {
        let nodes = self.inner.nodes.borrow();
        let Some(data) = nodes.get(&node) else {
            return true;
        };
        if data.visibility == Visibility::Hidden {
            return true;
        }
        let mut current = Some(node);
        while let Some(id) = current {
            if boundary == Some(id) {
                return false;
            }
            let Some(data) = nodes.get(&id) else {
                return true;
            };
            if data.display == Display::None {
                return true;
            }
            current = data.parent;
        }
        false
    }

    // --- Focus model ---

    /// The node currently holding focus (the body when nothing else does).
    #[inline]
    #[must_use]
    pub fn active_element(&self) -> NodeId {
        self.inner.active.get()
    }

    /// Whether `node` can receive focus right now.
    ///
    /// The body always can; anything else needs to be connected, carry a
    /// tab index, be enabled, and be effectively visible.
    #[must_use]
    pub fn can_focus(&self, node: NodeId) -> bool {
        if node == self.inner.body {
            return true;
        }
        self.is_connected(node)
            && self.tab_index(node).is_some()
            && !self.is_disabled(node)
            && !self.is_effectively_hidden(node, None)
    }

    /// Try to move focus to `node`. Returns whether focus actually moved.
    ///
    /// A successful move dispatches `FocusOut` at the old node (related
    /// target = new) and `FocusIn` at the new node (related target = old).
    /// With `select`, a text-selectable target gets its text selected.
    /// Unfocusable targets and refocusing the already-active node are
    /// silent no-ops.
    pub fn focus(&self, node: NodeId, select: bool) -> bool {
        if !self.can_focus(node) {
            return false;
        }
        let old = self.inner.active.get();
        if old == node {
            return false;
        }
        {
            let mut nodes = self.inner.nodes.borrow_mut();
            if let Some(old_data) = nodes.get_mut(&old) {
                old_data.text_selected = false;
            }
            if select
                && let Some(data) = nodes.get_mut(&node)
                && data.flags.contains(NodeFlags::TEXT_SELECTABLE)
            {
                data.text_selected = true;
            }
        }
        self.inner.active.set(node);
        debug!(from = old.raw(), to = node.raw(), "focus moved");
        if self.exists(old) {
            self.dispatch(
                old,
                EventPayload::FocusOut {
                    related_target: Some(node),
                },
            );
        }
        self.dispatch(
            node,
            EventPayload::FocusIn {
                related_target: self.exists(old).then_some(old),
            },
        );
        true
    }

    // --- Listeners and dispatch ---

    /// Register a listener; removed when the returned guard drops.
    pub fn add_listener(
        &self,
        target: ListenerTarget,
        event_type: EventType,
        phase: Phase,
        callback: impl Fn(&Document, &mut Event) + 'static,
    ) -> ListenerGuard {
        let id = self.inner.next_listener_id.get();
        self.inner.next_listener_id.set(id + 1);
        self.inner.listeners.borrow_mut().push(ListenerEntry {
            id,
            target,
            event_type,
            phase,
            callback: Rc::new(callback),
        });
        ListenerGuard {
            id,
            document: Rc::downgrade(&self.inner),
        }
    }

    /// Register a document-level listener.
    pub fn on_document(
        &self,
        event_type: EventType,
        phase: Phase,
        callback: impl Fn(&Document, &mut Event) + 'static,
    ) -> ListenerGuard {
        self.add_listener(ListenerTarget::Document, event_type, phase, callback)
    }

    /// Register a node-level listener.
    pub fn on_node(
        &self,
        node: NodeId,
        event_type: EventType,
        phase: Phase,
        callback: impl Fn(&Document, &mut Event) + 'static,
    ) -> ListenerGuard {
        self.add_listener(ListenerTarget::Node(node), event_type, phase, callback)
    }

    /// Dispatch `payload` at `target` through both phases and return the
    /// event so the caller can check `default_prevented()`.
    pub fn dispatch(&self, target: NodeId, payload: EventPayload) -> Event {
        let mut event = Event::new(target, payload);
        if !self.exists(target) {
            return event;
        }
        trace!(node = target.raw(), event = ?event.event_type(), "dispatch");
        // Path from root (or detachment point) down to the target.
        let mut path = Vec::new();
        {
            let nodes = self.inner.nodes.borrow();
            let mut current = Some(target);
            while let Some(id) = current {
                path.push(id);
                current = nodes.get(&id).and_then(|d| d.parent);
            }
        }
        path.reverse();

        let event_type = event.event_type();
        let snapshot: Vec<(u64, ListenerTarget, Phase, ListenerCallback)> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|e| e.event_type == event_type)
            .map(|e| (e.id, e.target, e.phase, Rc::clone(&e.callback)))
            .collect();

        let alive = |id: u64| {
            self.inner
                .listeners
                .borrow()
                .iter()
                .any(|e| e.id == id)
        };

        // Capture: document boundary, then root towards target.
        for (id, target_kind, phase, callback) in &snapshot {
            if *phase == Phase::Capture
                && *target_kind == ListenerTarget::Document
                && alive(*id)
            {
                callback(self, &mut event);
            }
        }
        for node in &path {
            for (id, target_kind, phase, callback) in &snapshot {
                if *phase == Phase::Capture
                    && *target_kind == ListenerTarget::Node(*node)
                    && alive(*id)
                {
                    callback(self, &mut event);
                }
            }
        }

        // Bubble: target towards root, then document boundary.
        for node in path.iter().rev() {
            for (id, target_kind, phase, callback) in &snapshot {
                if *phase == Phase::Bubble
                    && *target_kind == ListenerTarget::Node(*node)
                    && alive(*id)
                {
                    callback(self, &mut event);
                }
            }
        }
        for (id, target_kind, phase, callback) in &snapshot {
            if *phase == Phase::Bubble && *target_kind == ListenerTarget::Document && alive(*id) {
                callback(self, &mut event);
            }
        }
        event
    }

    // --- Mutation observation ---

    /// Observe subtree removals under `root`; disconnects when the guard
    /// drops.
    pub fn observe(
        &self,
        root: NodeId,
        callback: impl Fn(&Document, &[MutationRecord]) + 'static,
    ) -> ObserverGuard {
        let id = self.inner.next_observer_id.get();
        self.inner.next_observer_id.set(id + 1);
        self.inner.observers.borrow_mut().push(ObserverEntry {
            id,
            root,
            callback: Rc::new(callback),
        });
        ObserverGuard {
            id,
            document: Rc::downgrade(&self.inner),
        }
    }

    // --- Deferred tasks ---

    /// Schedule `task` for the next turn of the host loop.
    pub fn schedule(&self, task: impl FnOnce() + 'static) -> TaskHandle {
        self.inner.tasks.schedule(task)
    }

    /// Run one turn of deferred tasks.
    pub fn run_tasks(&self) {
        self.inner.tasks.run_turn();
    }

    /// Number of deferred tasks currently pending.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.pending()
    }
}

/// RAII guard removing a listener on drop.
#[derive(Debug)]
pub struct ListenerGuard {
    id: u64,
    document: Weak<DocumentInner>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(document) = self.document.upgrade() {
            document.listeners.borrow_mut().retain(|e| e.id != self.id);
        }
    }
}

/// RAII guard disconnecting a mutation observer on drop.
#[derive(Debug)]
pub struct ObserverGuard {
    id: u64,
    document: Weak<DocumentInner>,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if let Some(document) = self.document.upgrade() {
            document.observers.borrow_mut().retain(|e| e.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Key, Modifiers};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn focusable() -> NodeSpec {
        NodeSpec::new().tab_index(0)
    }

    #[test]
    fn new_document_focuses_body() {
        let doc = Document::new();
        assert_eq!(doc.active_element(), doc.body());
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn append_rejects_cycles_and_reparenting() {
        let doc = Document::new();
        let a = doc.create_child(doc.body(), NodeSpec::new());
        let b = doc.create_child(a, NodeSpec::new());
        assert!(!doc.append_child(b, a), "cycle");
        assert!(!doc.append_child(doc.body(), b), "already parented");
        assert!(!doc.append_child(a, a), "self");
    }

    #[test]
    fn contains_is_inclusive() {
        let doc = Document::new();
        let a = doc.create_child(doc.body(), NodeSpec::new());
        let b = doc.create_child(a, NodeSpec::new());
        assert!(doc.contains(a, a));
        assert!(doc.contains(a, b));
        assert!(doc.contains(doc.root(), b));
        assert!(!doc.contains(b, a));
    }

    #[test]
    fn subtree_is_preorder() {
        let doc = Document::new();
        let a = doc.create_child(doc.body(), NodeSpec::new());
        let a1 = doc.create_child(a, NodeSpec::new());
        let a2 = doc.create_child(a, NodeSpec::new());
        let a1x = doc.create_child(a1, NodeSpec::new());
        assert_eq!(doc.subtree(a), vec![a, a1, a1x, a2]);
    }

    #[test]
    fn remove_invalidates_ids_and_notifies_in_order() {
        let doc = Document::new();
        let a = doc.create_child(doc.body(), NodeSpec::new());
        let b = doc.create_child(a, NodeSpec::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _guard = doc.observe(doc.body(), {
            let seen = Rc::clone(&seen);
            move |_, records| {
                seen.borrow_mut()
                    .extend(records.iter().flat_map(|r| r.removed.clone()));
            }
        });
        doc.remove(a);
        assert!(!doc.exists(a));
        assert!(!doc.exists(b));
        assert_eq!(*seen.borrow(), vec![a, b]);
    }

    #[test]
    fn observer_outside_removal_scope_not_notified() {
        let doc = Document::new();
        let sibling = doc.create_child(doc.body(), NodeSpec::new());
        let other = doc.create_child(doc.body(), NodeSpec::new());
        let fired = Rc::new(Cell::new(false));
        let _guard = doc.observe(sibling, {
            let fired = Rc::clone(&fired);
            move |_, _| fired.set(true)
        });
        doc.remove(other);
        assert!(!fired.get());
    }

    #[test]
    fn removing_focused_subtree_falls_back_to_body_silently() {
        let doc = Document::new();
        let container = doc.create_child(doc.body(), NodeSpec::new());
        let field = doc.create_child(container, focusable());
        assert!(doc.focus(field, false));

        let focus_events = Rc::new(Cell::new(0u32));
        let _g = doc.on_document(EventType::FocusIn, Phase::Bubble, {
            let focus_events = Rc::clone(&focus_events);
            move |_, _| focus_events.set(focus_events.get() + 1)
        });
        doc.remove(container);
        assert_eq!(doc.active_element(), doc.body());
        assert_eq!(focus_events.get(), 0, "fallback fires no focus events");
    }

    #[test]
    fn focus_rejects_unfocusable_targets() {
        let doc = Document::new();
        let plain = doc.create_child(doc.body(), NodeSpec::new());
        let disabled = doc.create_child(doc.body(), focusable().disabled(true));
        let hidden = doc.create_child(doc.body(), focusable().display(Display::None));
        let detached = doc.create_node(focusable());
        assert!(!doc.focus(plain, false));
        assert!(!doc.focus(disabled, false));
        assert!(!doc.focus(hidden, false));
        assert!(!doc.focus(detached, false));
        assert_eq!(doc.active_element(), doc.body());
    }

    #[test]
    fn focus_dispatches_out_then_in_with_related_targets() {
        let doc = Document::new();
        let a = doc.create_child(doc.body(), focusable());
        let b = doc.create_child(doc.body(), focusable());
        doc.focus(a, false);

        let log = Rc::new(RefCell::new(Vec::new()));
        let _out = doc.on_document(EventType::FocusOut, Phase::Bubble, {
            let log = Rc::clone(&log);
            move |_, event| {
                if let EventPayload::FocusOut { related_target } = event.payload() {
                    log.borrow_mut().push(("out", event.target(), *related_target));
                }
            }
        });
        let _in = doc.on_document(EventType::FocusIn, Phase::Bubble, {
            let log = Rc::clone(&log);
            move |_, event| {
                if let EventPayload::FocusIn { related_target } = event.payload() {
                    log.borrow_mut().push(("in", event.target(), *related_target));
                }
            }
        });
        assert!(doc.focus(b, false));
        assert_eq!(
            *log.borrow(),
            vec![("out", a, Some(b)), ("in", b, Some(a))]
        );
    }

    #[test]
    fn refocusing_active_node_is_noop() {
        let doc = Document::new();
        let a = doc.create_child(doc.body(), focusable());
        assert!(doc.focus(a, false));
        assert!(!doc.focus(a, false));
    }

    #[test]
    fn focus_with_select_selects_text_and_clears_on_leave() {
        let doc = Document::new();
        let input = doc.create_child(doc.body(), focusable().text_selectable());
        let other = doc.create_child(doc.body(), focusable());
        assert!(doc.focus(input, true));
        assert!(doc.is_text_selected(input));
        assert!(doc.focus(other, true));
        assert!(!doc.is_text_selected(input));
        assert!(!doc.is_text_selected(other), "non-selectable never selects");
    }

    #[test]
    fn dispatch_runs_capture_before_bubble_along_path() {
        let doc = Document::new();
        let outer = doc.create_child(doc.body(), NodeSpec::new());
        let inner = doc.create_child(outer, NodeSpec::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let push = |label: &'static str, log: &Rc<RefCell<Vec<&'static str>>>| {
            let log = Rc::clone(log);
            move |_: &Document, _: &mut Event| log.borrow_mut().push(label)
        };
        let _g1 = doc.on_document(EventType::Click, Phase::Capture, push("doc-capture", &log));
        let _g2 = doc.on_node(outer, EventType::Click, Phase::Capture, push("outer-capture", &log));
        let _g3 = doc.on_node(inner, EventType::Click, Phase::Bubble, push("inner-bubble", &log));
        let _g4 = doc.on_node(outer, EventType::Click, Phase::Bubble, push("outer-bubble", &log));
        let _g5 = doc.on_document(EventType::Click, Phase::Bubble, push("doc-bubble", &log));

        doc.dispatch(inner, EventPayload::Click);
        assert_eq!(
            *log.borrow(),
            vec![
                "doc-capture",
                "outer-capture",
                "inner-bubble",
                "outer-bubble",
                "doc-bubble"
            ]
        );
    }

    #[test]
    fn listener_removed_mid_dispatch_does_not_run() {
        let doc = Document::new();
        let slot: Rc<RefCell<Option<ListenerGuard>>> = Rc::new(RefCell::new(None));
        let ran = Rc::new(Cell::new(false));

        let _first = doc.on_document(EventType::Click, Phase::Bubble, {
            let slot = Rc::clone(&slot);
            move |_, _| {
                slot.borrow_mut().take();
            }
        });
        let second = doc.on_document(EventType::Click, Phase::Bubble, {
            let ran = Rc::clone(&ran);
            move |_, _| ran.set(true)
        });
        *slot.borrow_mut() = Some(second);

        doc.dispatch(doc.body(), EventPayload::Click);
        assert!(!ran.get());
    }

    #[test]
    fn dropped_guard_removes_listener() {
        let doc = Document::new();
        let count = Rc::new(Cell::new(0u32));
        let guard = doc.on_document(EventType::KeyDown, Phase::Bubble, {
            let count = Rc::clone(&count);
            move |_, _| count.set(count.get() + 1)
        });
        doc.dispatch(
            doc.body(),
            EventPayload::KeyDown {
                key: Key::Escape,
                modifiers: Modifiers::empty(),
            },
        );
        drop(guard);
        doc.dispatch(
            doc.body(),
            EventPayload::KeyDown {
                key: Key::Escape,
                modifiers: Modifiers::empty(),
            },
        );
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dispatch_at_missing_node_is_noop() {
        let doc = Document::new();
        let node = doc.create_child(doc.body(), NodeSpec::new());
        doc.remove(node);
        let event = doc.dispatch(node, EventPayload::Click);
        assert!(!event.default_prevented());
    }

    #[test]
    fn effectively_hidden_respects_boundary() {
        let doc = Document::new();
        let container = doc.create_child(doc.body(), NodeSpec::new().display(Display::None));
        let child = doc.create_child(container, focusable());
        assert!(doc.is_effectively_hidden(child, None));
        // Stopping at the container excludes its display from the walk.
        assert!(!doc.is_effectively_hidden(child, Some(container)));
        doc.set_visibility(child, Visibility::Hidden);
        assert!(doc.is_effectively_hidden(child, Some(container)));
    }

    #[test]
    fn pointer_events_round_trips_verbatim() {
        let doc = Document::new();
        assert_eq!(doc.pointer_events(doc.body()), "");
        doc.set_pointer_events(doc.body(), "none");
        assert_eq!(doc.pointer_events(doc.body()), "none");
        doc.set_pointer_events(doc.body(), "");
        assert_eq!(doc.pointer_events(doc.body()), "");
    }

    mod tree_properties {
        use super::*;
        use proptest::prelude::*;

        /// Build a tree by attaching node `i` under one of nodes `0..i`.
        fn build(doc: &Document, parents: &[usize]) -> Vec<NodeId> {
            let mut ids = vec![doc.body()];
            for parent in parents {
                let parent_id = ids[*parent % ids.len()];
                ids.push(doc.create_child(parent_id, NodeSpec::new()));
            }
            ids
        }

        proptest! {
            #[test]
            fn positions_respect_ancestry(parents in proptest::collection::vec(0usize..64, 1..32)) {
                let doc = Document::new();
                let ids = build(&doc, &parents);
                let positions = doc.document_positions();
                for id in &ids {
                    // Every ancestor sits strictly before its descendants.
                    let mut current = doc.parent(*id);
                    while let Some(ancestor) = current {
                        prop_assert!(positions[&ancestor] < positions[id]);
                        prop_assert!(doc.contains(ancestor, *id));
                        current = doc.parent(ancestor);
                    }
                }
            }

            #[test]
            fn removal_detaches_exactly_the_subtree(parents in proptest::collection::vec(0usize..64, 2..32)) {
                let doc = Document::new();
                let ids = build(&doc, &parents);
                let victim = ids[1 + parents.len() / 2];
                let expected_gone = doc.subtree(victim);
                doc.remove(victim);
                for id in &ids {
                    if expected_gone.contains(id) {
                        prop_assert!(!doc.exists(*id));
                    } else {
                        prop_assert!(doc.is_connected(*id));
                    }
                }
            }
        }
    }

    #[test]
    fn attribute_queries_follow_document_order() {
        let doc = Document::new();
        let container = doc.create_child(doc.body(), NodeSpec::new());
        let first = doc.create_child(container, NodeSpec::new());
        let second = doc.create_child(container, NodeSpec::new());
        // Register in reverse of document order.
        doc.set_attribute(second, "data-item", "");
        doc.set_attribute(first, "data-item", "");
        assert_eq!(
            doc.descendants_with_attribute(container, "data-item"),
            vec![first, second]
        );
    }
}
