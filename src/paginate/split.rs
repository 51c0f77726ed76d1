//! Overflow splitting: divide one too-tall element across a page boundary.
//!
//! Trailing children are peeled off the end of the element, one at a time,
//! into a same-tag clone until what is left fits. Printed documents overflow
//! at the end, so taking from the end approximates a real break without a
//! line-breaking algorithm.
//!
//! When a single child is left and it is still too tall, the split descends
//! into that child, so wrappers around long content break too.

use crate::config::PaginationConfig;
use crate::dom::{Document, NodeId};
use crate::geometry::LayoutProbe;

/// Tags that are never divided internally.
const ATOMIC_TAGS: &[&str] = &[
    "li", "p", "h1", "h2", "h3", "h4", "h5", "h6", "img", "ul", "ol", "table", "thead", "tbody",
    "tfoot", "tr", "td", "th",
];

pub fn is_atomic(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).is_some_and(|t| ATOMIC_TAGS.contains(&t))
}

/// Result of a successful split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOutcome {
    /// Detached clone holding the overflowing tail, in original order.
    pub fragment: NodeId,
    /// The original element ended up empty and was removed; the fragment
    /// carries its `id` now.
    pub original_removed: bool,
}

/// Try to shrink `element` to `available_height` (outer height, margins
/// included) by moving its trailing children into a fragment.
///
/// Returns `None`, leaving the tree as it was, when the element must move
/// whole or stay: no children, atomic tag, break avoidance, keep-together
/// class, already fits, or not measurable.
pub fn split_element_to_fit(
    doc: &mut Document,
    probe: &dyn LayoutProbe,
    element: NodeId,
    available_height: f64,
    config: &PaginationConfig,
) -> Option<SplitOutcome> {
    if doc.children(element).is_empty() || is_atomic(doc, element) {
        return None;
    }
    if doc.has_any_class(element, &config.markers.keep_together) {
        return None;
    }
    let metrics = probe.measure(doc, element)?;
    if metrics.avoid_break_inside {
        return None;
    }
    let limit = available_height + config.tolerance;
    if metrics.outer_height() <= limit {
        return None;
    }

    let fragment = doc.clone_shallow(element);
    doc.remove_attr(fragment, "id");

    let mut moved = 0usize;
    while let Some(&last) = doc.children(element).last() {
        if doc.is_blank(last) {
            doc.prepend_child(fragment, last);
            continue;
        }
        if is_sole_content(doc, element, last) {
            if let Some(tail) = split_sole_child(doc, probe, element, last, available_height, config) {
                doc.prepend_child(fragment, tail);
                moved += 1;
                break;
            }
        }
        doc.prepend_child(fragment, last);
        moved += 1;
        if !doc.has_content(element) {
            break;
        }
        match probe.measure(doc, element) {
            Some(m) if m.outer_height() > limit => {}
            _ => break,
        }
    }

    if moved == 0 {
        for child in doc.children(fragment).to_vec() {
            doc.append_child(element, child);
        }
        return None;
    }

    let original_removed = !doc.has_content(element);
    if original_removed {
        // Blank leftovers belong in front of the moved content.
        for child in doc.children(element).iter().rev().copied().collect::<Vec<_>>() {
            doc.prepend_child(fragment, child);
        }
        if let Some(id) = doc.attr(element, "id").map(str::to_string) {
            doc.set_attr(fragment, "id", &id);
        }
        doc.remove(element);
    }

    log::debug!(
        "split {:?}: moved {moved} node(s) to fragment {:?}{}",
        element,
        fragment,
        if original_removed { ", original emptied" } else { "" }
    );

    Some(SplitOutcome {
        fragment,
        original_removed,
    })
}

fn is_sole_content(doc: &Document, element: NodeId, child: NodeId) -> bool {
    doc.children(element)
        .iter()
        .all(|&c| c == child || doc.is_blank(c))
}

/// Split the only remaining child of `element` in place, against the room
/// `element` leaves it. Returns the child's tail, or `None` when the child
/// has to move whole.
fn split_sole_child(
    doc: &mut Document,
    probe: &dyn LayoutProbe,
    element: NodeId,
    child: NodeId,
    available_height: f64,
    config: &PaginationConfig,
) -> Option<NodeId> {
    let outer = probe.measure(doc, element)?;
    let inner = probe.measure(doc, child)?;
    let room = available_height - (outer.outer_height() - inner.outer_height());
    let index = doc.index_in_parent(child)?;
    let outcome = split_element_to_fit(doc, probe, child, room.max(0.0), config)?;
    if outcome.original_removed {
        undo_split(doc, child, outcome, element, index);
        return None;
    }
    Some(outcome.fragment)
}

/// Put a split back the way it was: the fragment's children return to the
/// end of `element`, which is re-inserted at `index` under `parent` when it
/// had been removed.
pub fn undo_split(
    doc: &mut Document,
    element: NodeId,
    outcome: SplitOutcome,
    parent: NodeId,
    index: usize,
) {
    if outcome.original_removed {
        let anchor = doc.children(parent).get(index).copied();
        match anchor {
            Some(a) => doc.insert_before(a, element),
            None => doc.append_child(parent, element),
        }
    }
    for child in doc.children(outcome.fragment).to_vec() {
        doc.append_child(element, child);
    }
    doc.remove(outcome.fragment);
}
