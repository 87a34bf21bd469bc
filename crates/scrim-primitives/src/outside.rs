#![forbid(unsafe_code)]

//! Outside-interaction detection for a surface node.
//!
//! Both detectors pair a capture-phase listener on the surface (which marks
//! "this dispatch started inside") with a document-level listener that
//! classifies the event once it has bubbled all the way up. The marker is a
//! tiny explicit state machine, [`InsideFlag`], rather than an ad-hoc
//! mutable ref.
//!
//! # Invariants
//!
//! 1. The document-level pointerdown listener is installed one turn after
//!    [`PointerDownOutsideDetector::install`], so the press that mounted
//!    the surface can never be classified against it.
//! 2. A touch press outside defers its verdict to the next click; a newer
//!    deferred verdict replaces an older pending one, and a press inside
//!    clears any pending verdict.
//! 3. The focus inside-flag is set by focus entering the surface (capture)
//!    and cleared by focus leaving it (capture); the document-level
//!    focusin listener only reads it.
//!
//! # Failure Modes
//!
//! - Dropping a detector before its deferred install ran cancels the
//!   install; no listener leaks onto the document.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use scrim_dom::{
    Document, EventPayload, EventType, ListenerGuard, NodeId, Phase, PointerType, TaskHandle,
};
use tracing::trace;

/// Latch recording whether the event being dispatched passed through the
/// watched surface on its way down.
///
/// Only two transitions mutate it: [`InsideFlag::mark_inside`] (capture
/// listener on the surface) and [`InsideFlag::reset_on_next_dispatch`]
/// (document-level listener consuming the verdict).
#[derive(Debug, Default)]
pub struct InsideFlag {
    inside: Cell<bool>,
}

impl InsideFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the current dispatch started inside the surface.
    pub fn mark_inside(&self) {
        self.inside.set(true);
    }

    /// Consume the verdict: returns whether the dispatch was inside and
    /// rearms the flag for the next one.
    pub fn reset_on_next_dispatch(&self) -> bool {
        self.inside.replace(false)
    }

    /// Peek without rearming.
    #[must_use]
    pub fn is_inside(&self) -> bool {
        self.inside.get()
    }
}

/// A pointerdown that landed outside the watched surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerDownOutside {
    pub target: NodeId,
    pub pointer_type: PointerType,
}

/// A focus move that landed outside the watched surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusOutside {
    pub target: NodeId,
}

type PointerOutsideHandler = Rc<dyn Fn(&Document, &PointerDownOutside)>;
type FocusOutsideHandler = Rc<dyn Fn(&Document, &FocusOutside)>;
type PendingVerdict = Rc<RefCell<Option<Box<dyn FnOnce(&Document)>>>>;

/// Watches the document for pointerdowns that did not pass through
/// `surface`, reporting them to `on_outside`.
pub struct PointerDownOutsideDetector {
    _surface_guard: ListenerGuard,
    _click_guard: ListenerGuard,
    _document_guard: Rc<RefCell<Option<ListenerGuard>>>,
    install_task: Option<TaskHandle>,
}

impl PointerDownOutsideDetector {
    pub fn install(doc: &Document, surface: NodeId, on_outside: PointerOutsideHandler) -> Self {
        let flag = Rc::new(InsideFlag::new());

        let surface_guard = doc.on_node(surface, EventType::PointerDown, Phase::Capture, {
            let flag = Rc::clone(&flag);
            move |_, _| flag.mark_inside()
        });

        // Deferred touch verdicts live here; the click listener is permanent
        // and simply drains whatever is pending.
        let pending: PendingVerdict = Rc::new(RefCell::new(None));
        let click_guard = doc.on_document(EventType::Click, Phase::Bubble, {
            let pending = Rc::clone(&pending);
            move |doc, _| {
                let verdict = pending.borrow_mut().take();
                if let Some(verdict) = verdict {
                    verdict(doc);
                }
            }
        });

        // Install the classifier on the next turn so the press currently
        // being dispatched (the one that mounted this surface) is not
        // treated as outside.
        let document_guard: Rc<RefCell<Option<ListenerGuard>>> = Rc::new(RefCell::new(None));
        let install_task = doc.schedule({
            let doc = doc.clone();
            let slot = Rc::clone(&document_guard);
            move || {
                let guard = doc.on_document(EventType::PointerDown, Phase::Bubble, {
                    let flag = Rc::clone(&flag);
                    let pending = Rc::clone(&pending);
                    move |doc, event| {
                        let was_inside = flag.reset_on_next_dispatch();
                        let EventPayload::PointerDown { pointer_type } = event.payload() else {
                            return;
                        };
                        if was_inside {
                            // Press inside invalidates any deferred verdict.
                            pending.borrow_mut().take();
                            return;
                        }
                        let detail = PointerDownOutside {
                            target: event.target(),
                            pointer_type: *pointer_type,
                        };
                        trace!(
                            node = detail.target.raw(),
                            pointer = ?detail.pointer_type,
                            "pointer down outside"
                        );
                        if detail.pointer_type == PointerType::Touch {
                            let on_outside = Rc::clone(&on_outside);
                            *pending.borrow_mut() =
                                Some(Box::new(move |doc: &Document| on_outside(doc, &detail)));
                        } else {
                            on_outside(doc, &detail);
                        }
                    }
                });
                *slot.borrow_mut() = Some(guard);
            }
        });

        Self {
            _surface_guard: surface_guard,
            _click_guard: click_guard,
            _document_guard: document_guard,
            install_task: Some(install_task),
        }
    }
}

impl Drop for PointerDownOutsideDetector {
    fn drop(&mut self) {
        if let Some(task) = self.install_task.take() {
            task.cancel();
        }
    }
}

/// Watches the document for focus moves that did not enter `surface`.
pub struct FocusOutsideDetector {
    _focus_guard: ListenerGuard,
    _blur_guard: ListenerGuard,
    _document_guard: ListenerGuard,
}

impl FocusOutsideDetector {
    pub fn install(doc: &Document, surface: NodeId, on_outside: FocusOutsideHandler) -> Self {
        let flag = Rc::new(InsideFlag::new());

        let focus_guard = doc.on_node(surface, EventType::FocusIn, Phase::Capture, {
            let flag = Rc::clone(&flag);
            move |_, _| flag.mark_inside()
        });
        let blur_guard = doc.on_node(surface, EventType::FocusOut, Phase::Capture, {
            let flag = Rc::clone(&flag);
            move |_, _| {
                let _ = flag.reset_on_next_dispatch();
            }
        });

        let document_guard = doc.on_document(EventType::FocusIn, Phase::Bubble, {
            move |doc, event| {
                if flag.is_inside() {
                    return;
                }
                let detail = FocusOutside {
                    target: event.target(),
                };
                trace!(node = detail.target.raw(), "focus outside");
                on_outside(doc, &detail);
            }
        });

        Self {
            _focus_guard: focus_guard,
            _blur_guard: blur_guard,
            _document_guard: document_guard,
        }
    }
}
