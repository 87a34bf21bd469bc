#![forbid(unsafe_code)]

//! Ordered item registry for composite widgets.
//!
//! Menus and lists need their registered items back in *document* order, no
//! matter what order registration happened in. Items mark their node with a
//! collection attribute; ordering queries walk the container subtree and
//! intersect with the registry.
//!
//! # Invariants
//!
//! 1. `ordered_items` reflects current document order, not registration
//!    order.
//! 2. Items whose node left the tree are omitted from ordering queries but
//!    stay registered until their guard drops.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ahash::AHashMap;
use scrim_dom::{Document, NodeId};

/// Attribute marking a node as a registered collection item.
pub const ITEM_ATTRIBUTE: &str = "data-scrim-collection-item";

struct CollectionInner<D> {
    doc: Document,
    container: Cell<Option<NodeId>>,
    items: RefCell<AHashMap<NodeId, D>>,
}

/// Document-order registry of items carrying per-item data `D`.
#[derive(Clone)]
pub struct Collection<D> {
    inner: Rc<CollectionInner<D>>,
}

impl<D: Clone> Collection<D> {
    #[must_use]
    pub fn new(doc: &Document) -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                doc: doc.clone(),
                container: Cell::new(None),
                items: RefCell::new(AHashMap::new()),
            }),
        }
    }

    /// Set the container whose subtree defines item order.
    pub fn set_container(&self, container: Option<NodeId>) {
        self.inner.container.set(container);
    }

    /// Register `node` with its data. The registration lives until the
    /// returned guard is dropped.
    pub fn register_item(&self, node: NodeId, data: D) -> CollectionItemGuard<D> {
        self.inner.doc.set_attribute(node, ITEM_ATTRIBUTE, "");
        self.inner.items.borrow_mut().insert(node, data);
        CollectionItemGuard {
            inner: Rc::clone(&self.inner),
            node,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Registered items currently inside the container, in document order.
    #[must_use]
    pub fn ordered_items(&self) -> Vec<(NodeId, D)> {
        let Some(container) = self.inner.container.get() else {
            return Vec::new();
        };
        let marked = self
            .inner
            .doc
            .descendants_with_attribute(container, ITEM_ATTRIBUTE);
        let items = self.inner.items.borrow();
        marked
            .into_iter()
            .filter_map(|node| items.get(&node).map(|data| (node, data.clone())))
            .collect()
    }

    /// Document-order nodes of the registered items.
    #[must_use]
    pub fn ordered_nodes(&self) -> Vec<NodeId> {
        self.ordered_items().into_iter().map(|(node, _)| node).collect()
    }
}

/// RAII registration for one item; dropping unregisters it and removes the
/// marker attribute.
pub struct CollectionItemGuard<D> {
    inner: Rc<CollectionInner<D>>,
    node: NodeId,
}

impl<D> CollectionItemGuard<D> {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl<D> Drop for CollectionItemGuard<D> {
    fn drop(&mut self) {
        self.inner.items.borrow_mut().remove(&self.node);
        self.inner.doc.remove_attribute(self.node, ITEM_ATTRIBUTE);
    }
}
