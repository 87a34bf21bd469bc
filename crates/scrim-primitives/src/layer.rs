#![forbid(unsafe_code)]

//! Dismissable layer stack.
//!
//! A [`LayerRegistry`] is scoped to one [`Document`] and tracks every
//! mounted layer, the subset that disabled outside pointer events, and the
//! branch nodes exempt from outside detection. Layers are RAII: mounting
//! returns a [`Layer`] guard and dropping it unmounts.
//!
//! # Invariants
//!
//! 1. Interactivity is computed over the *current document order* of the
//!    mounted layers, not mount order: with any layer holding the body's
//!    pointer events disabled, exactly the layers at or above the
//!    highest such layer are interactive.
//! 2. The body's previous `pointer-events` style is saved once, when the
//!    first disabling layer mounts, and restored byte for byte when the
//!    last one unmounts.
//! 3. Escape dismisses only the topmost layer.
//! 4. The dismiss chain runs specific callback, then interact-outside
//!    callback, then `on_dismiss`, and stops as soon as a callback calls
//!    `prevent_default`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use scrim_dom::{
    Document, EventPayload, EventType, Key, ListenerGuard, Modifiers, NodeId, Phase, PointerType,
    Subject, Subscription,
};
use tracing::debug;

use crate::outside::{
    FocusOutside, FocusOutsideDetector, PointerDownOutside, PointerDownOutsideDetector,
};

/// How an outside interaction reached the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractOrigin {
    Pointer(PointerType),
    Focus,
}

/// Cancelable notification that something interacted outside a layer.
#[derive(Debug)]
pub struct InteractOutsideEvent {
    target: NodeId,
    origin: InteractOrigin,
    prevented: Cell<bool>,
}

impl InteractOutsideEvent {
    fn new(target: NodeId, origin: InteractOrigin) -> Self {
        Self {
            target,
            origin,
            prevented: Cell::new(false),
        }
    }

    #[must_use]
    pub fn target(&self) -> NodeId {
        self.target
    }

    #[must_use]
    pub fn origin(&self) -> InteractOrigin {
        self.origin
    }

    /// Stop the dismiss chain for this interaction.
    pub fn prevent_default(&self) {
        self.prevented.set(true);
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.prevented.get()
    }
}

/// Cancelable notification that Escape was pressed on the topmost layer.
#[derive(Debug)]
pub struct EscapeKeyDownEvent {
    modifiers: Modifiers,
    prevented: Cell<bool>,
}

impl EscapeKeyDownEvent {
    fn new(modifiers: Modifiers) -> Self {
        Self {
            modifiers,
            prevented: Cell::new(false),
        }
    }

    #[must_use]
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Keep the layer open despite Escape.
    pub fn prevent_default(&self) {
        self.prevented.set(true);
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.prevented.get()
    }
}

type EscapeCallback = Rc<dyn Fn(&EscapeKeyDownEvent)>;
type OutsideCallback = Rc<dyn Fn(&InteractOutsideEvent)>;
type DismissCallback = Rc<dyn Fn()>;

/// Per-layer behavior configuration.
#[derive(Default, Clone)]
pub struct LayerOptions {
    disable_outside_pointer_events: bool,
    on_escape_key_down: Option<EscapeCallback>,
    on_pointer_down_outside: Option<OutsideCallback>,
    on_focus_outside: Option<OutsideCallback>,
    on_interact_outside: Option<OutsideCallback>,
    on_dismiss: Option<DismissCallback>,
}

impl LayerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While this layer is mounted, pointer events outside the interactive
    /// layers are disabled at the body.
    #[must_use]
    pub fn disable_outside_pointer_events(mut self, disable: bool) -> Self {
        self.disable_outside_pointer_events = disable;
        self
    }

    #[must_use]
    pub fn on_escape_key_down(mut self, cb: impl Fn(&EscapeKeyDownEvent) + 'static) -> Self {
        self.on_escape_key_down = Some(Rc::new(cb));
        self
    }

    #[must_use]
    pub fn on_pointer_down_outside(mut self, cb: impl Fn(&InteractOutsideEvent) + 'static) -> Self {
        self.on_pointer_down_outside = Some(Rc::new(cb));
        self
    }

    #[must_use]
    pub fn on_focus_outside(mut self, cb: impl Fn(&InteractOutsideEvent) + 'static) -> Self {
        self.on_focus_outside = Some(Rc::new(cb));
        self
    }

    /// Runs after the specific outside callback for both pointer and focus
    /// interactions.
    #[must_use]
    pub fn on_interact_outside(mut self, cb: impl Fn(&InteractOutsideEvent) + 'static) -> Self {
        self.on_interact_outside = Some(Rc::new(cb));
        self
    }

    #[must_use]
    pub fn on_dismiss(mut self, cb: impl Fn() + 'static) -> Self {
        self.on_dismiss = Some(Rc::new(cb));
        self
    }
}

struct RegistryInner {
    doc: Document,
    /// Mount order; document order is recomputed on demand.
    layers: RefCell<Vec<NodeId>>,
    /// Layers that disabled outside pointer events, in disable order.
    disabled: RefCell<Vec<NodeId>>,
    branches: RefCell<Vec<NodeId>>,
    saved_body_pointer_events: RefCell<Option<String>>,
    updates: Subject,
}

impl RegistryInner {
    /// Mounted layers sorted by current document position. Detached layers
    /// sort after connected ones, keeping their mount order.
    fn ordered_layers(&self) -> Vec<NodeId> {
        let positions = self.doc.document_positions();
        let mut layers = self.layers.borrow().clone();
        layers.sort_by_key(|node| positions.get(node).copied().unwrap_or(usize::MAX));
        layers
    }

    fn is_top(&self, node: NodeId) -> bool {
        self.ordered_layers().last() == Some(&node)
    }

    /// Whether `node`'s layer receives pointer events under the current
    /// stack. With no disabling layer mounted everything is interactive;
    /// otherwise only layers at or above the highest disabling layer are.
    fn is_pointer_events_enabled(&self, node: NodeId) -> bool {
        let disabled = self.disabled.borrow();
        let Some(highest) = disabled.last() else {
            return true;
        };
        let layers = self.ordered_layers();
        let highest_index = layers
            .iter()
            .position(|l| l == highest)
            .map_or(-1, |i| i as isize);
        let index = layers
            .iter()
            .position(|l| l == &node)
            .map_or(-1, |i| i as isize);
        index >= highest_index
    }

    fn in_branch(&self, target: NodeId) -> bool {
        self.branches
            .borrow()
            .iter()
            .any(|branch| self.doc.contains(*branch, target))
    }

    /// Reapply per-layer inline pointer-events after any stack change.
    fn recompute_layer_styles(&self) {
        let body_disabled = !self.disabled.borrow().is_empty();
        for layer in self.layers.borrow().iter() {
            let style = if body_disabled {
                if self.is_pointer_events_enabled(*layer) {
                    "auto"
                } else {
                    "none"
                }
            } else {
                ""
            };
            self.doc.set_pointer_events(*layer, style);
        }
    }

    fn changed(&self) {
        self.recompute_layer_styles();
        self.updates.notify();
    }
}

/// Document-scoped registry of dismissable layers.
#[derive(Clone)]
pub struct LayerRegistry {
    inner: Rc<RegistryInner>,
}

impl LayerRegistry {
    #[must_use]
    pub fn new(doc: &Document) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                doc: doc.clone(),
                layers: RefCell::new(Vec::new()),
                disabled: RefCell::new(Vec::new()),
                branches: RefCell::new(Vec::new()),
                saved_body_pointer_events: RefCell::new(None),
                updates: Subject::new(),
            }),
        }
    }

    /// Mount `node` as a dismissable layer. The layer unmounts when the
    /// returned guard is dropped.
    pub fn mount(&self, node: NodeId, options: LayerOptions) -> Layer {
        let inner = &self.inner;
        let doc = &inner.doc;

        if options.disable_outside_pointer_events {
            let mut disabled = inner.disabled.borrow_mut();
            if disabled.is_empty() {
                let body = doc.body();
                *inner.saved_body_pointer_events.borrow_mut() =
                    Some(doc.pointer_events(body));
                doc.set_pointer_events(body, "none");
            }
            disabled.push(node);
        }
        inner.layers.borrow_mut().push(node);

        let escape_guard = doc.on_document(EventType::KeyDown, Phase::Bubble, {
            let inner = Rc::clone(inner);
            let on_escape = options.on_escape_key_down.clone();
            let on_dismiss = options.on_dismiss.clone();
            move |_, event| {
                let EventPayload::KeyDown { key, modifiers } = event.payload() else {
                    return;
                };
                if *key != Key::Escape || !inner.is_top(node) {
                    return;
                }
                let escape = EscapeKeyDownEvent::new(*modifiers);
                if let Some(cb) = &on_escape {
                    cb(&escape);
                }
                if !escape.default_prevented()
                    && let Some(dismiss) = &on_dismiss
                {
                    event.prevent_default();
                    dismiss();
                }
            }
        });

        let pointer_detector = PointerDownOutsideDetector::install(doc, node, {
            let inner = Rc::clone(inner);
            let on_pointer = options.on_pointer_down_outside.clone();
            let on_interact = options.on_interact_outside.clone();
            let on_dismiss = options.on_dismiss.clone();
            Rc::new(move |_, detail: &PointerDownOutside| {
                if !inner.is_pointer_events_enabled(node) || inner.in_branch(detail.target) {
                    return;
                }
                let event = InteractOutsideEvent::new(
                    detail.target,
                    InteractOrigin::Pointer(detail.pointer_type),
                );
                if let Some(cb) = &on_pointer {
                    cb(&event);
                }
                if let Some(cb) = &on_interact {
                    cb(&event);
                }
                if !event.default_prevented()
                    && let Some(dismiss) = &on_dismiss
                {
                    dismiss();
                }
            })
        });

        let focus_detector = FocusOutsideDetector::install(doc, node, {
            let inner = Rc::clone(inner);
            let on_focus = options.on_focus_outside.clone();
            let on_interact = options.on_interact_outside.clone();
            let on_dismiss = options.on_dismiss.clone();
            Rc::new(move |_, detail: &FocusOutside| {
                if inner.in_branch(detail.target) {
                    return;
                }
                let event = InteractOutsideEvent::new(detail.target, InteractOrigin::Focus);
                if let Some(cb) = &on_focus {
                    cb(&event);
                }
                if let Some(cb) = &on_interact {
                    cb(&event);
                }
                if !event.default_prevented()
                    && let Some(dismiss) = &on_dismiss
                {
                    dismiss();
                }
            })
        });

        inner.changed();
        debug!(
            node = node.raw(),
            layers = inner.layers.borrow().len(),
            disabled = inner.disabled.borrow().len(),
            "layer mounted"
        );

        Layer {
            inner: Rc::clone(inner),
            node,
            disables_outside_pointer_events: options.disable_outside_pointer_events,
            _escape_guard: escape_guard,
            _pointer_detector: pointer_detector,
            _focus_detector: focus_detector,
        }
    }

    /// Exempt `node`'s subtree from outside detection while the returned
    /// guard lives.
    pub fn register_branch(&self, node: NodeId) -> Branch {
        self.inner.branches.borrow_mut().push(node);
        Branch {
            inner: Rc::clone(&self.inner),
            node,
        }
    }

    /// Run `callback` whenever the layer stack changes.
    pub fn subscribe_updates(&self, callback: impl Fn() + 'static) -> Subscription {
        self.inner.updates.subscribe(callback)
    }

    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.inner.layers.borrow().len()
    }

    /// Whether any mounted layer currently holds body pointer events off.
    #[must_use]
    pub fn is_body_pointer_events_disabled(&self) -> bool {
        !self.inner.disabled.borrow().is_empty()
    }

    /// Mounted layer nodes in current document order.
    #[must_use]
    pub fn ordered_layers(&self) -> Vec<NodeId> {
        self.inner.ordered_layers()
    }

    #[must_use]
    pub fn is_pointer_events_enabled(&self, node: NodeId) -> bool {
        self.inner.is_pointer_events_enabled(node)
    }
}

/// A mounted dismissable layer. Dropping unmounts it and unwinds any body
/// style it contributed.
pub struct Layer {
    inner: Rc<RegistryInner>,
    node: NodeId,
    disables_outside_pointer_events: bool,
    _escape_guard: ListenerGuard,
    _pointer_detector: PointerDownOutsideDetector,
    _focus_detector: FocusOutsideDetector,
}

impl Layer {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn is_pointer_events_enabled(&self) -> bool {
        self.inner.is_pointer_events_enabled(self.node)
    }

    #[must_use]
    pub fn is_top(&self) -> bool {
        self.inner.is_top(self.node)
    }
}

impl Drop for Layer {
    fn drop(&mut self) {
        let inner = &self.inner;
        {
            let mut layers = inner.layers.borrow_mut();
            if let Some(pos) = layers.iter().position(|l| *l == self.node) {
                layers.remove(pos);
            }
        }
        if self.disables_outside_pointer_events {
            let mut disabled = inner.disabled.borrow_mut();
            if let Some(pos) = disabled.iter().position(|l| *l == self.node) {
                disabled.remove(pos);
            }
            if disabled.is_empty()
                && let Some(saved) = inner.saved_body_pointer_events.borrow_mut().take()
            {
                inner.doc.set_pointer_events(inner.doc.body(), saved);
            }
        }
        inner.doc.set_pointer_events(self.node, "");
        inner.changed();
        debug!(
            node = self.node.raw(),
            layers = inner.layers.borrow().len(),
            "layer unmounted"
        );
    }
}

/// A registered branch; dropping removes the exemption.
pub struct Branch {
    inner: Rc<RegistryInner>,
    node: NodeId,
}

impl Branch {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl Drop for Branch {
    fn drop(&mut self) {
        let mut branches = self.inner.branches.borrow_mut();
        if let Some(pos) = branches.iter().position(|b| *b == self.node) {
            branches.remove(pos);
        }
    }
}
