#![forbid(unsafe_code)]

//! Focus containment for a container subtree.
//!
//! A [`FocusScope`] optionally traps focus inside its container (redirecting
//! strays back in), loops Tab at the tabbable edges, and manages mount and
//! unmount autofocus. Scopes nest through a [`FocusScopeStack`]: attaching a
//! new scope pauses the one below it, and detaching resumes it.
//!
//! # Invariants
//!
//! 1. At most one scope per stack is active; the rest are paused and ignore
//!    every focus event and Tab keystroke.
//! 2. A focusout with no related target is left alone; only moves toward a
//!    known outside target are redirected.
//! 3. Unmount focus restoration runs one turn after detach, after the stack
//!    entry is still ordered behind any scope mounted in the same turn.
//!
//! # Failure Modes
//!
//! - If the previously focused node is gone by the time restoration runs,
//!   focus falls back to the body.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use scrim_dom::{
    Document, EventPayload, EventType, Key, ListenerGuard, Modifiers, NodeId, ObserverGuard, Phase,
};
use tracing::debug;

use crate::tabbable::{focus_first, remove_links, tabbable_candidates, tabbable_edges};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

/// Cancelable autofocus signal delivered on mount and unmount.
#[derive(Debug, Default)]
pub struct AutoFocusEvent {
    prevented: Cell<bool>,
}

impl AutoFocusEvent {
    fn new() -> Self {
        Self::default()
    }

    /// Keep focus where it is; the caller will handle placement.
    pub fn prevent_default(&self) {
        self.prevented.set(true);
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.prevented.get()
    }
}

type AutoFocusCallback = Rc<dyn Fn(&AutoFocusEvent)>;

/// Per-scope behavior configuration.
#[derive(Default, Clone)]
pub struct FocusScopeOptions {
    looped: bool,
    trapped: bool,
    on_mount_auto_focus: Option<AutoFocusCallback>,
    on_unmount_auto_focus: Option<AutoFocusCallback>,
}

impl FocusScopeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap Tab and Shift+Tab at the tabbable edges.
    #[must_use]
    pub fn looped(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    /// Redirect focus back inside whenever it tries to leave.
    #[must_use]
    pub fn trapped(mut self, trapped: bool) -> Self {
        self.trapped = trapped;
        self
    }

    #[must_use]
    pub fn on_mount_auto_focus(mut self, cb: impl Fn(&AutoFocusEvent) + 'static) -> Self {
        self.on_mount_auto_focus = Some(Rc::new(cb));
        self
    }

    #[must_use]
    pub fn on_unmount_auto_focus(mut self, cb: impl Fn(&AutoFocusEvent) + 'static) -> Self {
        self.on_unmount_auto_focus = Some(Rc::new(cb));
        self
    }
}

struct ScopeShared {
    id: u64,
    paused: Cell<bool>,
}

impl ScopeShared {
    fn new() -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            paused: Cell::new(false),
        }
    }
}

/// LIFO stack coordinating nested focus scopes.
///
/// The stack does not own scopes; it only tracks pause state so that the
/// most recently attached scope is the single active one.
#[derive(Clone, Default)]
pub struct FocusScopeStack {
    inner: Rc<RefCell<Vec<Rc<ScopeShared>>>>,
}

impl FocusScopeStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, scope: Rc<ScopeShared>) {
        let mut stack = self.inner.borrow_mut();
        if let Some(top) = stack.last() {
            top.paused.set(true);
        }
        stack.retain(|s| s.id != scope.id);
        stack.push(scope);
    }

    fn remove(&self, id: u64) {
        let mut stack = self.inner.borrow_mut();
        stack.retain(|s| s.id != id);
        if let Some(top) = stack.last() {
            top.paused.set(false);
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.borrow().len()
    }
}

/// An attached focus scope. Dropping detaches it, schedules focus
/// restoration, and resumes the scope below it on the stack.
pub struct FocusScope {
    doc: Document,
    stack: FocusScopeStack,
    container: NodeId,
    shared: Rc<ScopeShared>,
    previously_focused: NodeId,
    on_unmount_auto_focus: Option<AutoFocusCallback>,
    guards: Vec<ListenerGuard>,
    observer: Option<ObserverGuard>,
}

impl FocusScope {
    /// Attach a scope around `container` and run mount autofocus.
    pub fn attach(
        doc: &Document,
        stack: &FocusScopeStack,
        container: NodeId,
        options: FocusScopeOptions,
    ) -> Self {
        let shared = Rc::new(ScopeShared::new());
        stack.add(Rc::clone(&shared));

        let previously_focused = doc.active_element();
        let last_focused: Rc<Cell<Option<NodeId>>> = Rc::new(Cell::new(None));
        let mut guards = Vec::new();
        let mut observer = None;

        if options.trapped {
            guards.push(doc.on_document(EventType::FocusIn, Phase::Bubble, {
                let shared = Rc::clone(&shared);
                let last_focused = Rc::clone(&last_focused);
                move |doc, event| {
                    if shared.paused.get() {
                        return;
                    }
                    let target = event.target();
                    if doc.contains(container, target) {
                        last_focused.set(Some(target));
                    } else {
                        refocus_last(doc, &last_focused);
                    }
                }
            }));
            guards.push(doc.on_document(EventType::FocusOut, Phase::Bubble, {
                let shared = Rc::clone(&shared);
                let last_focused = Rc::clone(&last_focused);
                move |doc, event| {
                    if shared.paused.get() {
                        return;
                    }
                    let EventPayload::FocusOut { related_target } = event.payload() else {
                        return;
                    };
                    // No related target means the host itself took focus
                    // away (window blur, element removal); leave it be.
                    let Some(related) = related_target else {
                        return;
                    };
                    if !doc.contains(container, *related) {
                        refocus_last(doc, &last_focused);
                    }
                }
            }));
            // When the focused element is removed out from under us, focus
            // lands on the body without events; watch for that and pull it
            // back to the container.
            observer = Some(doc.observe(container, move |doc, records| {
                if doc.active_element() != doc.body() {
                    return;
                }
                if records.iter().any(|r| !r.removed.is_empty()) {
                    doc.focus(container, false);
                }
            }));
        }

        guards.push(doc.on_node(container, EventType::KeyDown, Phase::Bubble, {
            let shared = Rc::clone(&shared);
            let looped = options.looped;
            let trapped = options.trapped;
            move |doc, event| {
                handle_tab(doc, event, container, &shared, looped, trapped);
            }
        }));

        let scope = Self {
            doc: doc.clone(),
            stack: stack.clone(),
            container,
            shared,
            previously_focused,
            on_unmount_auto_focus: options.on_unmount_auto_focus.clone(),
            guards,
            observer,
        };

        if !doc.contains(container, previously_focused) {
            let signal = AutoFocusEvent::new();
            if let Some(cb) = &options.on_mount_auto_focus {
                cb(&signal);
            }
            if !signal.default_prevented() {
                let candidates = remove_links(doc, tabbable_candidates(doc, container));
                focus_first(doc, &candidates, true);
                if doc.active_element() == previously_focused {
                    doc.focus(container, false);
                }
            }
        }
        debug!(container = container.raw(), depth = stack.depth(), "focus scope attached");

        scope
    }

    /// Stop reacting to focus events and Tab until [`FocusScope::resume`].
    pub fn pause(&self) {
        self.shared.paused.set(true);
    }

    pub fn resume(&self) {
        self.shared.paused.set(false);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.paused.get()
    }

    #[must_use]
    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Detach explicitly; equivalent to dropping the scope.
    pub fn detach(self) {}
}

impl Drop for FocusScope {
    fn drop(&mut self) {
        // Reactive behavior stops immediately; restoration is deferred a
        // turn so a scope replacing this one can claim focus first.
        self.guards.clear();
        self.observer = None;
        let doc = self.doc.clone();
        let stack = self.stack.clone();
        let scope_id = self.shared.id;
        let previously_focused = self.previously_focused;
        let on_unmount = self.on_unmount_auto_focus.take();
        let _ = self.doc.schedule(move || {
            let signal = AutoFocusEvent::new();
            if let Some(cb) = &on_unmount {
                cb(&signal);
            }
            if !signal.default_prevented() {
                let target = if doc.is_connected(previously_focused) {
                    previously_focused
                } else {
                    doc.body()
                };
                doc.focus(target, true);
            }
            stack.remove(scope_id);
        });
    }
}

fn refocus_last(doc: &Document, last_focused: &Cell<Option<NodeId>>) {
    if let Some(last) = last_focused.get() {
        doc.focus(last, true);
    }
}

fn handle_tab(
    doc: &Document,
    event: &mut scrim_dom::Event,
    container: NodeId,
    shared: &ScopeShared,
    looped: bool,
    trapped: bool,
) {
    if !(looped || trapped) || shared.paused.get() {
        return;
    }
    let EventPayload::KeyDown { key, modifiers } = event.payload() else {
        return;
    };
    if *key != Key::Tab
        || modifiers.intersects(Modifiers::ALT | Modifiers::CTRL | Modifiers::META)
    {
        return;
    }
    let shift = modifiers.contains(Modifiers::SHIFT);
    let focused = doc.active_element();
    match tabbable_edges(doc, container) {
        (Some(first), Some(last)) => {
            if !shift && focused == last {
                if looped {
                    event.prevent_default();
                    doc.focus(first, true);
                }
            } else if shift && focused == first && looped {
                event.prevent_default();
                doc.focus(last, true);
            }
        }
        // Nothing tabbable: pin focus on the container itself.
        _ => {
            if focused == container {
                event.prevent_default();
            }
        }
    }
}
