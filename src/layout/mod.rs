//! # Block Layout
//!
//! A deterministic [`LayoutProbe`] for running the paginator without a
//! browser: dry runs from the CLI, server-side previews, and tests.
//!
//! The model is deliberately plain:
//!
//! 1. Elements stack vertically. Margins do not collapse.
//! 2. An explicit `height` is a border-box height; otherwise the height is
//!    padding plus content.
//! 3. Runs of text and inline elements become lines of `line_height` pixels,
//!    `chars_per_line` characters each.
//! 4. A page is a fixed-height box. Its header is pinned to the top, its
//!    footer to the bottom, and its body starts at the page top and grows
//!    with its content, so an overfull body sticks out past the page bottom
//!    where the paginator can see it.
//!
//! Geometry for the whole document is computed in one sweep and cached for
//! the document revision it was taken at.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::Markers;
use crate::dom::{Document, NodeId, NodeKind};
use crate::geometry::{BoxMetrics, LayoutProbe};
use crate::style::{parse_length, InlineStyle};

const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "br", "cite", "code", "em", "i", "kbd", "label", "mark", "q",
    "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var",
];

const NOT_RENDERED: &[&str] = &[
    "head", "script", "style", "title", "meta", "link", "template", "noscript",
];

/// Settings for [`BlockLayout`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockLayoutConfig {
    /// Height of a page without an explicit `height`. US Letter at 96 dpi.
    pub page_height: f64,
    pub line_height: f64,
    pub chars_per_line: usize,
}

impl Default for BlockLayoutConfig {
    fn default() -> Self {
        Self {
            page_height: 1056.0,
            line_height: 20.0,
            chars_per_line: 90,
        }
    }
}

type Snapshot = (u64, u64, HashMap<NodeId, BoxMetrics>);

/// Block-flow layout probe.
#[derive(Debug)]
pub struct BlockLayout {
    config: BlockLayoutConfig,
    markers: Markers,
    cache: RefCell<Option<Snapshot>>,
}

impl BlockLayout {
    pub fn new(config: BlockLayoutConfig, markers: Markers) -> Self {
        Self {
            config,
            markers,
            cache: RefCell::new(None),
        }
    }

    fn snapshot_is_current(&self, doc: &Document) -> bool {
        matches!(&*self.cache.borrow(), Some((id, rev, _)) if *id == doc.id() && *rev == doc.revision())
    }

    fn refresh(&self, doc: &Document) {
        if self.snapshot_is_current(doc) {
            return;
        }
        let mut flow = Flow {
            doc,
            markers: &self.markers,
            config: &self.config,
            boxes: HashMap::new(),
        };
        flow.place_children(doc.root(), 0.0);
        *self.cache.borrow_mut() = Some((doc.id(), doc.revision(), flow.boxes));
    }
}

impl LayoutProbe for BlockLayout {
    fn measure(&self, doc: &Document, node: NodeId) -> Option<BoxMetrics> {
        if !doc.is_attached(node) {
            return None;
        }
        self.refresh(doc);
        self.cache
            .borrow()
            .as_ref()
            .and_then(|(_, _, boxes)| boxes.get(&node).copied())
    }

    fn detach(&self) {
        self.cache.borrow_mut().take();
    }
}

/// One layout sweep over a document.
struct Flow<'a> {
    doc: &'a Document,
    markers: &'a Markers,
    config: &'a BlockLayoutConfig,
    boxes: HashMap<NodeId, BoxMetrics>,
}

impl Flow<'_> {
    fn is_inline(&self, node: NodeId) -> bool {
        match self.doc.kind(node) {
            NodeKind::Text(_) => true,
            NodeKind::Element(el) => INLINE_ELEMENTS.contains(&el.name.as_str()),
            _ => false,
        }
    }

    fn style_of(&self, node: NodeId) -> InlineStyle {
        InlineStyle::parse(self.doc.attr(node, "style").unwrap_or(""))
    }

    /// Lay out the children of `parent` starting at `y`; returns the height
    /// they occupy.
    fn place_children(&mut self, parent: NodeId, y: f64) -> f64 {
        let doc = self.doc;
        let mut cursor = y;
        let mut run: Vec<NodeId> = Vec::new();
        for &child in doc.children(parent) {
            match doc.kind(child) {
                NodeKind::Element(_) | NodeKind::Text(_) if self.is_inline(child) => run.push(child),
                NodeKind::Element(_) => {
                    cursor += self.flush_inline(&mut run, cursor);
                    cursor += self.place(child, cursor);
                }
                _ => {}
            }
        }
        cursor += self.flush_inline(&mut run, cursor);
        cursor - y
    }

    /// Turn a run of inline content into line boxes.
    fn flush_inline(&mut self, run: &mut Vec<NodeId>, y: f64) -> f64 {
        if run.is_empty() {
            return 0.0;
        }
        let text: String = run.iter().map(|&n| self.doc.text_content(n)).collect();
        let chars = text.split_whitespace().collect::<Vec<_>>().join(" ").chars().count();
        let lines = chars.div_ceil(self.config.chars_per_line.max(1));
        let height = lines as f64 * self.config.line_height;
        for node in run.drain(..) {
            if self.doc.is_element(node) {
                let line_box = BoxMetrics {
                    top: y,
                    bottom: y + height,
                    height,
                    ..Default::default()
                };
                self.boxes.insert(node, line_box);
                for inner in self.doc.descendants(node) {
                    if self.doc.is_element(inner) {
                        self.boxes.insert(inner, line_box);
                    }
                }
            }
        }
        height
    }

    /// Lay out one element with its margin box starting at `y`; returns
    /// its outer height.
    fn place(&mut self, node: NodeId, y: f64) -> f64 {
        let doc = self.doc;
        let tag = doc.tag(node).unwrap_or("");
        let style = self.style_of(node);
        if NOT_RENDERED.contains(&tag) || style.is_hidden() {
            self.collapse(node, y);
            return 0.0;
        }

        let margin = style.margin();
        let padding = style.padding();
        let top = y + margin.top;

        let height = if doc.has_class(node, &self.markers.page) {
            self.place_page(node, top, &style)
        } else if tag == "img" {
            style
                .height()
                .or_else(|| doc.attr(node, "height").and_then(parse_length))
                .unwrap_or(0.0)
        } else {
            let content = self.place_children(node, top + padding.top);
            style
                .height()
                .unwrap_or(padding.top + content + padding.bottom)
        };

        self.boxes.insert(
            node,
            BoxMetrics {
                top,
                bottom: top + height,
                height,
                padding_top: padding.top,
                padding_bottom: padding.bottom,
                margin_top: margin.top,
                margin_bottom: margin.bottom,
                avoid_break_inside: style.avoids_break_inside(),
            },
        );
        margin.top + height + margin.bottom
    }

    /// A page: fixed height, pinned header/footer, overlaid body.
    fn place_page(&mut self, page: NodeId, top: f64, style: &InlineStyle) -> f64 {
        let height = style.height().unwrap_or(self.config.page_height);
        let bottom = top + height;
        let mut cursor = top + style.padding().top;

        let doc = self.doc;
        for child in doc.element_children(page) {
            let el = doc.element(child);
            let is_header = el.is_some_and(|e| e.name == "header" || e.has_class(&self.markers.header));
            let is_footer = el.is_some_and(|e| e.name == "footer" || e.has_class(&self.markers.footer));
            let is_body = el.is_some_and(|e| e.has_class(&self.markers.body));

            if is_header || is_body {
                self.place(child, top);
            } else if is_footer {
                let outer = self.place(child, top);
                self.shift(child, bottom - top - outer);
            } else {
                cursor += self.place(child, cursor);
            }
        }
        height
    }

    /// Move an already placed subtree down by `dy`.
    fn shift(&mut self, node: NodeId, dy: f64) {
        let mut nodes = vec![node];
        nodes.extend(self.doc.descendants(node));
        for n in nodes {
            if let Some(b) = self.boxes.get_mut(&n) {
                b.top += dy;
                b.bottom += dy;
            }
        }
    }

    fn collapse(&mut self, node: NodeId, y: f64) {
        let empty = BoxMetrics {
            top: y,
            bottom: y,
            ..Default::default()
        };
        self.boxes.insert(node, empty);
        for inner in self.doc.descendants(node) {
            if self.doc.is_element(inner) {
                self.boxes.insert(inner, empty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html;

    fn layout() -> BlockLayout {
        BlockLayout::new(
            BlockLayoutConfig {
                page_height: 800.0,
                line_height: 20.0,
                chars_per_line: 10,
            },
            Markers::default(),
        )
    }

    fn find(doc: &Document, id: &str) -> NodeId {
        doc.element_by_id(id).unwrap()
    }

    #[test]
    fn blocks_stack_with_margins_and_padding() {
        let doc = html::parse(
            r#"<div id="outer" style="padding: 10px"><div id="a" style="height: 100px; margin-bottom: 5px"></div><div id="b" style="height: 50px"></div></div>"#,
        )
        .unwrap();
        let probe = layout();
        let outer = probe.measure(&doc, find(&doc, "outer")).unwrap();
        let b = probe.measure(&doc, find(&doc, "b")).unwrap();
        assert_eq!(outer.height, 10.0 + 100.0 + 5.0 + 50.0 + 10.0);
        assert_eq!(b.top, 10.0 + 105.0);
        assert_eq!(outer.padding_top, 10.0);
    }

    #[test]
    fn text_wraps_into_lines() {
        let doc = html::parse(r#"<p id="p">aaaaa bbbbb <span id="s">ccccc</span></p>"#).unwrap();
        let probe = layout();
        // 17 characters at 10 per line.
        assert_eq!(probe.measure(&doc, find(&doc, "p")).unwrap().height, 40.0);
        assert_eq!(probe.measure(&doc, find(&doc, "s")).unwrap().height, 40.0);
    }

    #[test]
    fn page_pins_header_and_footer() {
        let doc = html::parse(
            r#"<div class="page" id="pg"><div class="page-header" id="h" style="height: 40px"></div><div class="page-body" id="body"><div style="height: 900px"></div></div><div class="page-footer" id="f" style="height: 30px"></div></div><div class="page" id="pg2"></div>"#,
        )
        .unwrap();
        let probe = layout();
        let page = probe.measure(&doc, find(&doc, "pg")).unwrap();
        let footer = probe.measure(&doc, find(&doc, "f")).unwrap();
        let body = probe.measure(&doc, find(&doc, "body")).unwrap();
        let next = probe.measure(&doc, find(&doc, "pg2")).unwrap();
        assert_eq!(page.height, 800.0);
        assert_eq!(footer.top, 770.0);
        assert_eq!(body.top, 0.0);
        assert_eq!(body.bottom, 900.0);
        assert_eq!(next.top, 800.0);
    }

    #[test]
    fn cache_follows_revisions() {
        let mut doc = html::parse(r#"<div id="a" style="height: 10px"></div>"#).unwrap();
        let probe = layout();
        let a = find(&doc, "a");
        assert_eq!(probe.measure(&doc, a).unwrap().height, 10.0);
        doc.set_attr(a, "style", "height: 30px");
        assert_eq!(probe.measure(&doc, a).unwrap().height, 30.0);
        doc.remove(a);
        assert!(probe.measure(&doc, a).is_none());
    }

    #[test]
    fn hidden_and_head_content_take_no_space() {
        let doc = html::parse(
            r#"<head><title>x</title></head><div id="h" style="display: none; height: 50px"></div><div id="v" style="height: 5px"></div>"#,
        )
        .unwrap();
        let probe = layout();
        assert_eq!(probe.measure(&doc, find(&doc, "h")).unwrap().height, 0.0);
        assert_eq!(probe.measure(&doc, find(&doc, "v")).unwrap().top, 0.0);
    }
}
