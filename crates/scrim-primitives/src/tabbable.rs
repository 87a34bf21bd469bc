#![forbid(unsafe_code)]

//! Pure tab-order queries over a container.
//!
//! Candidate enumeration walks the container subtree in document order;
//! visibility is checked up to (and excluding) the container so a scope can
//! live inside a hidden host while its own content is being measured.
//!
//! # Failure Modes
//!
//! - Empty candidate lists and containers with nothing tabbable produce
//!   `None` / `false` results, never errors.

use scrim_dom::{Display, Document, NodeId, Role};

/// Tabbable candidates inside `container` (exclusive), in document order.
///
/// A candidate has a non-negative tab index, is enabled, and is not
/// `display: none` itself. Deeper visibility is the caller's concern; see
/// [`find_visible`].
#[must_use]
pub fn tabbable_candidates(doc: &Document, container: NodeId) -> Vec<NodeId> {
    doc.subtree(container)
        .into_iter()
        .filter(|node| *node != container)
        .filter(|node| {
            doc.tab_index(*node).is_some_and(|t| t >= 0)
                && !doc.is_disabled(*node)
                && doc.display(*node) != Display::None
        })
        .collect()
}

/// First candidate not hidden up to (excluding) `container`.
#[must_use]
pub fn find_visible(doc: &Document, candidates: &[NodeId], container: NodeId) -> Option<NodeId> {
    candidates
        .iter()
        .copied()
        .find(|node| !doc.is_effectively_hidden(*node, Some(container)))
}

/// First and last visible tabbable elements inside `container`.
#[must_use]
pub fn tabbable_edges(doc: &Document, container: NodeId) -> (Option<NodeId>, Option<NodeId>) {
    let candidates = tabbable_candidates(doc, container);
    let first = find_visible(doc, &candidates, container);
    let reversed: Vec<NodeId> = candidates.into_iter().rev().collect();
    let last = find_visible(doc, &reversed, container);
    (first, last)
}

/// Filter out link-like nodes, which are excluded from auto-focus.
#[must_use]
pub fn remove_links(doc: &Document, candidates: Vec<NodeId>) -> Vec<NodeId> {
    candidates
        .into_iter()
        .filter(|node| doc.role(*node) != Role::Link)
        .collect()
}

/// Attempt to focus each candidate in turn until one takes focus.
///
/// Returns `true` once focus moved onto a candidate. Mirrors the "did the
/// active element actually change" check rather than trusting a single
/// focus call, since a candidate may refuse focus or a listener may
/// redirect it.
pub fn focus_first(doc: &Document, candidates: &[NodeId], select: bool) -> bool {
    let previously = doc.active_element();
    for candidate in candidates {
        doc.focus(*candidate, select);
        if doc.active_element() != previously && doc.active_element() == *candidate {
            return true;
        }
    }
    false
}
