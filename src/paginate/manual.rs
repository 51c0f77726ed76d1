//! Manual break enforcement.
//!
//! Authors mark "start a new page here" with a force-break class. The
//! driver already honors markers on direct body children; this pass finds
//! markers buried inside containers and splits the container around them so
//! the marker still starts a page.

use crate::config::{Markers, PaginationConfig};
use crate::dom::{Document, NodeId};

use super::content_pages;
use super::shell::{insert_page_after, PageParts};

/// A force-break marker with nothing inside it.
pub fn is_bare_marker(doc: &Document, node: NodeId, markers: &Markers) -> bool {
    doc.has_any_class(node, &markers.force_break) && !doc.has_content(node)
}

/// Act on the first marker (document order) that is preceded by content on
/// its page. Returns whether the tree changed; callers re-invoke until it
/// reports `false`.
pub fn enforce_manual_breaks(doc: &mut Document, config: &PaginationConfig) -> bool {
    let markers = &config.markers;
    for page in content_pages(doc, markers) {
        if !doc.is_attached(page) {
            continue;
        }
        let parts = PageParts::resolve(doc, page, markers);
        for (index, child) in doc.element_children(parts.body).into_iter().enumerate() {
            if index > 0 && doc.has_any_class(child, &markers.force_break) {
                split_at_direct_marker(doc, &parts, child, config);
                return true;
            }
            let nested: Vec<NodeId> = doc
                .descendants(child)
                .into_iter()
                .filter(|&n| doc.has_any_class(n, &markers.force_break))
                .collect();
            for marker in nested {
                if index > 0 || content_precedes(doc, child, marker, config) {
                    split_at_nested_marker(doc, &parts, child, marker, config);
                    return true;
                }
            }
        }
    }
    false
}

/// Whether anything printable sits before `marker` inside `container`.
/// Wrappers on the path down to the marker and bare markers don't count.
fn content_precedes(doc: &Document, container: NodeId, marker: NodeId, config: &PaginationConfig) -> bool {
    for node in doc.descendants(container) {
        if node == marker {
            return false;
        }
        if doc.is_ancestor_of(node, marker) {
            continue;
        }
        if doc.is_element(node) {
            if !is_bare_marker(doc, node, &config.markers) {
                return true;
            }
        } else if !doc.is_blank(node) {
            return true;
        }
    }
    false
}

/// Where a page that opens at `marker` starts. A bare marker is removed,
/// together with any bare markers right behind it, and the page starts at
/// the next real sibling; `None` when nothing follows.
pub fn break_start(doc: &mut Document, marker: NodeId, markers: &Markers) -> Option<NodeId> {
    if !is_bare_marker(doc, marker, markers) {
        return Some(marker);
    }
    let mut start = None;
    for sibling in doc.following_siblings(marker) {
        if doc.is_blank(sibling) {
            continue;
        }
        if is_bare_marker(doc, sibling, markers) {
            doc.remove(sibling);
            continue;
        }
        start = Some(sibling);
        break;
    }
    doc.remove(marker);
    start
}

fn split_at_direct_marker(doc: &mut Document, parts: &PageParts, marker: NodeId, config: &PaginationConfig) {
    if let Some(start) = break_start(doc, marker, &config.markers) {
        let shell = insert_page_after(doc, parts, &config.markers);
        doc.move_from(start, shell.body);
        log::debug!("manual break: moved content from {start:?} to new page {:?}", shell.page);
    }
}

fn split_at_nested_marker(
    doc: &mut Document,
    parts: &PageParts,
    container: NodeId,
    marker: NodeId,
    config: &PaginationConfig,
) {
    let markers = &config.markers;
    let after_container = doc.following_siblings(container);

    // Peel the marker and everything after it out of each ancestor, up to
    // and including the container, into a chain of shallow clones.
    let mut head = marker;
    let mut level = doc.parent(marker).unwrap_or(container);
    let top_clone = loop {
        let clone = doc.clone_shallow(level);
        doc.remove_attr(clone, "id");
        doc.move_from(head, clone);
        doc.insert_after(level, clone);
        let parent = doc.parent(level);
        if !doc.has_content(level) {
            doc.remove(level);
        }
        if level == container {
            break clone;
        }
        head = clone;
        level = parent.unwrap_or(container);
    };

    if doc.has_content(marker) {
        doc.remove_classes(marker, &markers.force_break);
    } else {
        let mut empty = doc.parent(marker);
        doc.remove(marker);
        while let Some(node) = empty {
            if doc.has_content(node) {
                break;
            }
            let up = doc.parent(node);
            doc.remove(node);
            if node == top_clone {
                break;
            }
            empty = up;
        }
    }

    let start = if doc.is_attached(top_clone) {
        Some(top_clone)
    } else {
        after_container.into_iter().find(|&n| doc.is_attached(n))
    };
    if let Some(start) = start {
        let shell = insert_page_after(doc, parts, markers);
        doc.move_from(start, shell.body);
        log::debug!("manual break: split container at nested marker onto page {:?}", shell.page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html;

    fn run(markup: &str) -> (String, bool) {
        let config = PaginationConfig::default();
        let mut doc = html::parse(markup).unwrap();
        let changed = enforce_manual_breaks(&mut doc, &config);
        (html::serialize(&doc), changed)
    }

    #[test]
    fn nested_marker_splits_its_container() {
        let (out, changed) = run(
            r#"<div class="page"><div class="page-body"><section><p>a</p><div class="page-break"><p>b</p></div><p>c</p></section><p>d</p></div></div>"#,
        );
        assert!(changed);
        assert_eq!(
            out,
            r#"<div class="page"><div class="page-body"><section><p>a</p></section></div></div><div class="page"><div class="page-body"><section><div><p>b</p></div><p>c</p></section><p>d</p></div></div>"#
        );
    }

    #[test]
    fn empty_marker_is_dropped_with_its_wrappers() {
        let (out, changed) = run(
            r#"<div class="page"><div class="page-body"><section><p>a</p><div><span class="page-break"></span></div></section><p>d</p></div></div>"#,
        );
        assert!(changed);
        assert_eq!(
            out,
            r#"<div class="page"><div class="page-body"><section><p>a</p></section></div></div><div class="page"><div class="page-body"><p>d</p></div></div>"#
        );
    }

    #[test]
    fn direct_marker_after_content_starts_new_page() {
        let (out, changed) = run(
            r#"<div class="page"><div class="page-body"><p>a</p><div class="page-break"></div><p>b</p></div></div>"#,
        );
        assert!(changed);
        assert_eq!(
            out,
            r#"<div class="page"><div class="page-body"><p>a</p></div></div><div class="page"><div class="page-body"><p>b</p></div></div>"#
        );
    }

    #[test]
    fn marker_already_at_top_is_left_alone() {
        let markup = r#"<div class="page"><div class="page-body"><section><div class="page-break"><p>b</p></div></section><p>c</p></div></div>"#;
        let (out, changed) = run(markup);
        assert!(!changed);
        assert_eq!(out, markup);
    }

    #[test]
    fn later_marker_in_a_container_is_enforced() {
        let (out, changed) = run(
            r#"<div class="page"><div class="page-body"><section><div class="page-break"><p id="b">b</p></div><p id="c">c</p><div class="page-break"><p id="d">d</p></div></section></div></div>"#,
        );
        assert!(changed);
        assert_eq!(
            out,
            r#"<div class="page"><div class="page-body"><section><div class="page-break"><p id="b">b</p></div><p id="c">c</p></section></div></div><div class="page"><div class="page-body"><section><div><p id="d">d</p></div></section></div></div>"#
        );
    }

    #[test]
    fn markers_inside_a_leading_marker_are_enforced() {
        let (out, changed) = run(
            r#"<div class="page"><div class="page-body"><div class="page-break"><p>a</p><div class="page-break"><p>b</p></div></div></div></div>"#,
        );
        assert!(changed);
        assert_eq!(
            out,
            r#"<div class="page"><div class="page-body"><div class="page-break"><p>a</p></div></div></div><div class="page"><div class="page-body"><div class="page-break"><div><p>b</p></div></div></div></div>"#
        );
    }

    #[test]
    fn enforcement_settles_after_every_marker_fired() {
        let config = PaginationConfig::default();
        let mut doc = html::parse(
            r#"<div class="page"><div class="page-body"><section><div class="page-break"><p>b</p></div><p>c</p><div class="page-break"><p>d</p></div><p>e</p><div class="page-break"><p>f</p></div></section></div></div>"#,
        )
        .unwrap();
        let mut fired = 0;
        while enforce_manual_breaks(&mut doc, &config) {
            fired += 1;
            assert!(fired < 10, "manual breaks keep firing");
        }
        assert_eq!(fired, 2);
        assert_eq!(content_pages(&doc, &config.markers).len(), 3);
    }

    #[test]
    fn bare_marker_start_skips_following_bare_markers() {
        let markers = Markers::default();
        let mut doc = html::parse(
            r#"<div id="body"><p>a</p><div id="m" class="page-break"></div> <div class="page-break"></div><p id="b">b</p></div>"#,
        )
        .unwrap();
        let marker = doc.element_by_id("m").unwrap();
        let start = break_start(&mut doc, marker, &markers);
        assert_eq!(start, doc.element_by_id("b"));
        assert_eq!(html::serialize(&doc), r#"<div id="body"><p>a</p> <p id="b">b</p></div>"#);

        let mut doc = html::parse(r#"<div><p>a</p><div id="m" class="page-break"></div></div>"#).unwrap();
        let marker = doc.element_by_id("m").unwrap();
        assert_eq!(break_start(&mut doc, marker, &markers), None);
        assert_eq!(html::serialize(&doc), "<div><p>a</p></div>");
    }

    #[test]
    fn only_the_first_marker_fires_per_call() {
        let config = PaginationConfig::default();
        let mut doc = html::parse(
            r#"<div class="page"><div class="page-body"><p>a</p><div class="page-break"><p>b</p></div><p>c</p><div class="page-break"><p>d</p></div></div></div>"#,
        )
        .unwrap();
        assert!(enforce_manual_breaks(&mut doc, &config));
        assert_eq!(content_pages(&doc, &config.markers).len(), 2);
        assert!(enforce_manual_breaks(&mut doc, &config));
        assert_eq!(content_pages(&doc, &config.markers).len(), 3);
        assert!(!enforce_manual_breaks(&mut doc, &config));
    }

    #[test]
    fn cover_pages_are_not_considered() {
        let config = PaginationConfig::default();
        let mut doc = html::parse(
            r#"<div class="page cover"><div class="page-body"><p>a</p><div class="page-break"><p>b</p></div></div></div>"#,
        )
        .unwrap();
        assert!(!enforce_manual_breaks(&mut doc, &config));
    }
}
