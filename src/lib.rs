//! # Folio
//!
//! Repaginates styled HTML proposals into fixed-size printable pages.
//!
//! Authors write a proposal as a handful of `page` containers and let the
//! content run long. Before the document goes to an HTML-to-PDF service,
//! Folio measures every page, moves whatever does not fit onto new pages
//! cloned from the original (same header, same footer), honours manual
//! page breaks, numbers the headings and rebuilds the table of contents
//! with final page numbers.
//!
//! Folio does not lay out CSS itself. Geometry comes from a
//! [`LayoutProbe`]: a headless browser in production, or the built-in
//! [`BlockLayout`] for dry runs and tests.
//!
//! ## Architecture
//!
//! ```text
//! Input (HTML string)
//!       ↓
//!   [dom]       — Arena tree + tolerant HTML codec
//!       ↓
//!   [geometry]  — LayoutProbe: where did everything end up?
//!       ↓
//!   [paginate]  — Driver passes, splitting, manual breaks, remediation
//!       ↓
//!   [toc]       — Heading numbers, TOC reflow, page numbers
//!       ↓
//!   [export]    — Serialize, compress, hand off to the PDF backend
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod export;
pub mod geometry;
pub mod layout;
pub mod paginate;
pub mod style;
pub mod toc;

pub use config::PaginationConfig;
pub use error::FolioError;
pub use export::{export_html, Paginated};
pub use geometry::LayoutProbe;
pub use layout::{BlockLayout, BlockLayoutConfig};
pub use paginate::PaginationReport;

/// Paginate an HTML document with the built-in block layout.
///
/// This is the quickest way in: no browser, deterministic geometry.
pub fn paginate_html(
    html: &str,
    layout: BlockLayoutConfig,
    config: &PaginationConfig,
) -> Result<Paginated, FolioError> {
    let probe = BlockLayout::new(layout, config.markers.clone());
    export_html(html, &probe, config)
}
