//! # Geometry Prober
//!
//! Folio does not lay out CSS. It asks a [`LayoutProbe`] (a headless
//! browser, a print-layout library, or [`crate::layout::BlockLayout`]) where
//! things ended up, and rewrites the tree until the answers are acceptable.
//!
//! Measurements are only valid for the document revision they were taken
//! at. Every helper here re-queries the probe; nothing is cached across a
//! mutation.

use crate::dom::{Document, NodeId};
use crate::error::FolioError;
use crate::style::{format_px, InlineStyle};

/// Rendered box of one element, in CSS pixels from the document top.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoxMetrics {
    /// Top of the border box.
    pub top: f64,
    /// Bottom of the border box.
    pub bottom: f64,
    pub height: f64,
    pub padding_top: f64,
    pub padding_bottom: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    /// `break-inside: avoid` (or the legacy `page-break-inside`).
    pub avoid_break_inside: bool,
}

impl BoxMetrics {
    /// Height including vertical margins.
    pub fn outer_height(&self) -> f64 {
        self.height + self.margin_top + self.margin_bottom
    }

    /// Bottom edge including the bottom margin.
    pub fn outer_bottom(&self) -> f64 {
        self.bottom + self.margin_bottom
    }
}

/// The host's layout engine.
///
/// `measure` must reflect the document as it is *now*. Returning `None`
/// means "not measurable at the moment" and makes the engine skip that node
/// for the current pass.
pub trait LayoutProbe {
    fn measure(&self, doc: &Document, node: NodeId) -> Option<BoxMetrics>;

    /// Prepare an isolated rendering surface for `doc`. Failing here is the
    /// only fatal environment error of an export.
    fn attach(&self, _doc: &Document) -> Result<(), FolioError> {
        Ok(())
    }

    /// Yield point between passes, giving the host a chance to reflow.
    fn settle(&self, _doc: &Document) {}

    /// Tear the rendering surface down. Called on every exit path.
    fn detach(&self) {}
}

/// Space reservations of one page, measured after the last mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_top: f64,
    pub page_bottom: f64,
    pub top_inset: f64,
    pub bottom_inset: f64,
    pub available_height: f64,
}

impl PageGeometry {
    /// Measure a page and its optional header/footer.
    ///
    /// `top_inset` is the larger of the page's own top padding and the
    /// header's reach into the page; `bottom_inset` likewise for the
    /// footer, plus the footer buffer.
    pub fn probe(
        doc: &Document,
        probe: &dyn LayoutProbe,
        page: NodeId,
        header: Option<NodeId>,
        footer: Option<NodeId>,
        footer_buffer: f64,
    ) -> Option<Self> {
        let page_box = probe.measure(doc, page)?;

        let header_reach = header
            .and_then(|h| probe.measure(doc, h))
            .map(|h| h.bottom - page_box.top)
            .unwrap_or(0.0);
        let footer_reach = footer
            .and_then(|f| probe.measure(doc, f))
            .map(|f| page_box.bottom - f.top)
            .unwrap_or(0.0);

        let top_inset = page_box.padding_top.max(header_reach);
        let bottom_inset = page_box.padding_bottom.max(footer_reach) + footer_buffer;
        let available_height = (page_box.height - top_inset - bottom_inset).max(0.0);

        Some(Self {
            page_top: page_box.top,
            page_bottom: page_box.bottom,
            top_inset,
            bottom_inset,
            available_height,
        })
    }

    /// Lowest point content may reach.
    pub fn content_bottom(&self) -> f64 {
        self.page_bottom - self.bottom_inset
    }
}

/// Height of a body's actual content, independent of the inset padding.
pub fn content_height(doc: &Document, probe: &dyn LayoutProbe, body: NodeId) -> Option<f64> {
    let m = probe.measure(doc, body)?;
    Some((m.height - m.padding_top - m.padding_bottom).max(0.0))
}

/// Write the page insets as the body's vertical padding. Leaves the
/// attribute untouched when nothing changes.
pub fn apply_insets(doc: &mut Document, body: NodeId, geometry: &PageGeometry) {
    let mut style = InlineStyle::parse(doc.attr(body, "style").unwrap_or(""));
    let padding = style.padding();
    let top_same = (padding.top - geometry.top_inset).abs() < 0.005;
    let bottom_same = (padding.bottom - geometry.bottom_inset).abs() < 0.005;
    if top_same && bottom_same {
        return;
    }
    style.set("padding-top", &format_px(geometry.top_inset));
    style.set("padding-bottom", &format_px(geometry.bottom_inset));
    doc.set_attr(body, "style", &style.to_string());
}
