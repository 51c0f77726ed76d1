//! # Page Break Decisions
//!
//! Where does a page body have to be divided? This module encodes the rules
//! that decide it, separately from the machinery that moves nodes around:
//! forced breaks win outright, otherwise the first child that crosses the
//! usable bottom edge is the candidate, and a heading directly above it is
//! pulled along so it is never stranded at the foot of a page.

use crate::config::PaginationConfig;
use crate::dom::{Document, NodeId};
use crate::geometry::{content_height, LayoutProbe, PageGeometry};

/// Decide what to do with a page body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakDecision {
    /// Content fits the page.
    Fits,
    /// A child carrying a force-break class starts the next page.
    Forced(NodeId),
    /// Content overflows; the next page starts at this child.
    Overflow(NodeId),
    /// Content overflows but no child can be blamed (or the body is not
    /// measurable); leave the page alone this pass.
    Unresolved,
}

pub fn is_heading(doc: &Document, node: NodeId) -> bool {
    matches!(doc.tag(node), Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6"))
}

/// Heading text without the number the engine prefixes to it.
pub fn heading_text(doc: &Document, heading: NodeId, config: &PaginationConfig) -> String {
    doc.children(heading)
        .iter()
        .filter(|&&c| !doc.has_class(c, &config.markers.heading_number))
        .map(|&c| doc.text_content(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Whether the body's content fits the page.
pub fn body_fits(
    doc: &Document,
    probe: &dyn LayoutProbe,
    body: NodeId,
    geometry: &PageGeometry,
    config: &PaginationConfig,
) -> bool {
    content_height(doc, probe, body)
        .map_or(true, |h| h <= geometry.available_height + config.tolerance)
}

/// First child whose bottom edge (margin included) crosses the usable
/// bottom of the page.
pub fn first_overflowing_child(
    doc: &Document,
    probe: &dyn LayoutProbe,
    children: &[NodeId],
    geometry: &PageGeometry,
    config: &PaginationConfig,
) -> Option<usize> {
    let boundary = geometry.content_bottom() + config.tolerance;
    children.iter().position(|&child| {
        probe
            .measure(doc, child)
            .is_some_and(|m| m.outer_bottom() > boundary)
    })
}

/// Given a body whose insets are already applied, decide how to break it.
pub fn decide_break(
    doc: &Document,
    probe: &dyn LayoutProbe,
    body: NodeId,
    geometry: &PageGeometry,
    config: &PaginationConfig,
) -> BreakDecision {
    let children = doc.element_children(body);

    if let Some(&forced) = children
        .iter()
        .skip(1)
        .find(|&&c| doc.has_any_class(c, &config.markers.force_break))
    {
        return BreakDecision::Forced(forced);
    }

    if body_fits(doc, probe, body, geometry, config) {
        return BreakDecision::Fits;
    }

    let Some(idx) = first_overflowing_child(doc, probe, &children, geometry, config) else {
        return BreakDecision::Unresolved;
    };

    // Keep a heading with the block it introduces.
    if idx > 0 {
        let previous = children[idx - 1];
        if is_heading(doc, previous) && !config.is_orphan_exempt(&heading_text(doc, previous, config)) {
            return BreakDecision::Overflow(previous);
        }
    }

    BreakDecision::Overflow(children[idx])
}
