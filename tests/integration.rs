//! Integration tests for the Folio pagination pipeline.
//!
//! These tests run whole documents through `paginate` with the block
//! layout as the geometry source. They verify:
//! - Content that fits is left alone
//! - Overflow moves onto new pages without reordering or losing content
//! - Forced breaks and the heading-orphan rule
//! - TOC continuation and page numbers
//! - Re-running on paginated output changes nothing

use folio::config::PaginationConfig;
use folio::dom::{html, Document, NodeId};
use folio::geometry::{content_height, LayoutProbe, PageGeometry};
use folio::layout::{BlockLayout, BlockLayoutConfig};
use folio::paginate::shell::{find_body, find_footer, find_header};
use folio::paginate::{all_pages, content_pages, paginate, PaginationReport};
use folio::{export_html, paginate_html};

// ─── Helpers ────────────────────────────────────────────────────

const PAGE_HEIGHT: f64 = 800.0;

fn config() -> PaginationConfig {
    PaginationConfig {
        footer_buffer: 0.0,
        ..Default::default()
    }
}

fn probe(config: &PaginationConfig) -> BlockLayout {
    BlockLayout::new(
        BlockLayoutConfig {
            page_height: PAGE_HEIGHT,
            ..Default::default()
        },
        config.markers.clone(),
    )
}

fn page(body: &str) -> String {
    format!(r#"<div class="page"><div class="page-body">{body}</div></div>"#)
}

fn block(id: &str, height: u32) -> String {
    format!(r#"<div id="{id}" style="height: {height}px"></div>"#)
}

fn run(markup: &str) -> (Document, PaginationReport) {
    let config = config();
    let mut doc = html::parse(markup).unwrap();
    let report = paginate(&mut doc, &probe(&config), &config);
    (doc, report)
}

/// `id`s of each content page's direct body children.
fn bodies(doc: &Document) -> Vec<Vec<String>> {
    let markers = config().markers;
    content_pages(doc, &markers)
        .into_iter()
        .map(|p| {
            let body = find_body(doc, p, &markers).unwrap();
            doc.element_children(body)
                .into_iter()
                .map(|c| doc.attr(c, "id").unwrap_or("-").to_string())
                .collect()
        })
        .collect()
}

/// Every `id` under the content pages, in document order.
fn content_ids(doc: &Document) -> Vec<String> {
    let markers = config().markers;
    content_pages(doc, &markers)
        .into_iter()
        .flat_map(|p| doc.descendants(p))
        .filter_map(|n| doc.attr(n, "id").map(str::to_string))
        .collect()
}

fn assert_no_overflow(doc: &Document, config: &PaginationConfig) {
    let probe = probe(config);
    let markers = &config.markers;
    for p in content_pages(doc, markers) {
        let body = find_body(doc, p, markers).unwrap();
        let geometry = PageGeometry::probe(
            doc,
            &probe,
            p,
            find_header(doc, p, markers),
            find_footer(doc, p, markers),
            config.footer_buffer,
        )
        .unwrap();
        let height = content_height(doc, &probe, body).unwrap();
        assert!(
            height <= geometry.available_height + config.tolerance,
            "page {p:?} holds {height}px of content in {}px",
            geometry.available_height
        );
        assert!(!doc.element_children(body).is_empty(), "page {p:?} is empty");
    }
}

fn page_number_of(doc: &Document, node: NodeId) -> Option<usize> {
    let markers = config().markers;
    all_pages(doc, &markers)
        .into_iter()
        .position(|p| p == node || doc.is_ancestor_of(p, node))
        .map(|i| i + 1)
}

fn with_class(doc: &Document, class: &str) -> Vec<NodeId> {
    doc.descendants(doc.root())
        .into_iter()
        .filter(|&n| doc.has_class(n, class))
        .collect()
}

// ─── Basic Pagination ───────────────────────────────────────────

#[test]
fn test_fitting_content_is_untouched() {
    let markup = page(r#"<p id="a">First paragraph.</p><p id="b">Second.</p><p id="c">Third.</p>"#);
    let (doc, report) = run(&markup);
    assert_eq!(report.pages, 1);
    assert!(!report.changed);
    assert_eq!(html::serialize(&doc), markup);
}

#[test]
fn test_overflow_produces_two_pages() {
    let blocks: String = (0..12).map(|i| block(&format!("b{i}"), 100)).collect();
    let (doc, report) = run(&page(&format!(r#"<div id="wrap">{blocks}</div>"#)));

    assert_eq!(report.pages, 2);
    assert_eq!(report.overflowing_pages, 0);
    assert_no_overflow(&doc, &config());

    let expected: Vec<String> = std::iter::once("wrap".to_string())
        .chain((0..12).map(|i| format!("b{i}")))
        .collect();
    assert_eq!(content_ids(&doc), expected);
}

#[test]
fn test_many_pages_of_paragraphs() {
    let text = "word ".repeat(80);
    let paragraphs: String = (0..60).map(|i| format!(r#"<p id="p{i}">{text}</p>"#)).collect();
    let (doc, report) = run(&page(&paragraphs));

    // 80 words are 5 lines of 20px; 8 paragraphs fit on a page.
    assert_eq!(report.pages, 8);
    assert_no_overflow(&doc, &config());
    let expected: Vec<String> = (0..60).map(|i| format!("p{i}")).collect();
    assert_eq!(content_ids(&doc), expected);
}

#[test]
fn test_empty_pages_are_removed() {
    let markup = format!(
        "{}{}{}",
        page(r#"<p id="a">a</p>"#),
        page("  "),
        page(r#"<p id="b">b</p>"#)
    );
    let (doc, _) = run(&markup);
    assert_eq!(bodies(&doc), vec![vec!["a"], vec!["b"]]);
}

#[test]
fn test_cover_page_is_never_split() {
    let markup = format!(
        r#"<div class="page cover"><div class="page-body">{}</div></div>{}"#,
        block("hero", 2000),
        page(r#"<p id="a">a</p>"#)
    );
    let (doc, report) = run(&markup);
    assert_eq!(report.pages, 2);
    assert_eq!(bodies(&doc), vec![vec!["a"]]);
}

// ─── Breaks ─────────────────────────────────────────────────────

#[test]
fn test_forced_break_starts_a_page() {
    let (doc, report) = run(&page(
        r#"<p id="a">a</p><p id="b">b</p><div id="c" class="page-break"><p>c</p></div><p id="d">d</p>"#,
    ));
    assert_eq!(report.pages, 2);
    assert_eq!(bodies(&doc), vec![vec!["a", "b"], vec!["c", "d"]]);
}

#[test]
fn test_nested_forced_break() {
    let (doc, _) = run(&page(
        r#"<section id="s"><p id="a">a</p><div class="page-break"><p id="b">b</p></div><p id="c">c</p></section>"#,
    ));
    let pages = bodies(&doc);
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0], vec!["s"]);
    assert_eq!(content_ids(&doc), vec!["s", "a", "b", "c"]);
    assert!(with_class(&doc, "page-break").is_empty());
}

#[test]
fn test_every_nested_break_starts_a_page() {
    let (doc, report) = run(&page(
        r#"<section id="s"><div class="page-break"><p id="b">b</p></div><p id="c">c</p><div class="page-break"><p id="d">d</p></div></section>"#,
    ));
    assert_eq!(report.pages, 2);
    assert_eq!(bodies(&doc), vec![vec!["s"], vec!["-"]]);
    assert_eq!(content_ids(&doc), vec!["s", "b", "c", "d"]);
}

#[test]
fn test_trailing_empty_break_adds_no_page() {
    let (doc, report) = run(&page(r#"<p id="a">a</p><div class="page-break"></div>"#));
    assert_eq!(report.pages, 1);
    assert_eq!(bodies(&doc), vec![vec!["a"]]);
    assert!(with_class(&doc, "page-break").is_empty());
}

#[test]
fn test_heading_moves_with_its_paragraph() {
    let (doc, _) = run(&page(&format!(
        r#"{}<h2 id="h">Scope</h2><p id="p" style="height: 100px">Details</p>"#,
        block("a", 700)
    )));
    assert_eq!(bodies(&doc), vec![vec!["a"], vec!["h", "p"]]);
}

#[test]
fn test_exempt_heading_stays_behind() {
    let (doc, _) = run(&page(&format!(
        r#"{}<h2 id="h">Proposed Pricing</h2><p id="p" style="height: 100px">Table</p>"#,
        block("a", 700)
    )));
    assert_eq!(bodies(&doc), vec![vec!["a", "h"], vec!["p"]]);
}

#[test]
fn test_exempt_headings_are_configurable() {
    let mut config = config();
    config.orphan_exempt_headings = vec!["Scope".to_string()];
    let mut doc = html::parse(&page(&format!(
        r#"{}<h2 id="h">Scope</h2><p id="p" style="height: 100px">Details</p>"#,
        block("a", 700)
    )))
    .unwrap();
    paginate(&mut doc, &probe(&config), &config);
    assert_eq!(bodies(&doc), vec![vec!["a", "h"], vec!["p"]]);
}

// ─── Termination ────────────────────────────────────────────────

#[test]
fn test_deep_nesting_terminates_and_splits() {
    let blocks: String = (0..30).map(|i| block(&format!("b{i}"), 100)).collect();
    let open: String = (0..40).map(|_| "<div>").collect();
    let close: String = (0..40).map(|_| "</div>").collect();
    let (doc, report) = run(&page(&format!("{open}{blocks}{close}")));

    assert!(report.passes <= config().limits.max_passes);
    assert_eq!(report.pages, 4);
    assert_no_overflow(&doc, &config());
    let expected: Vec<String> = (0..30).map(|i| format!("b{i}")).collect();
    assert_eq!(content_ids(&doc), expected);
}

#[test]
fn test_unfittable_content_is_reported_not_looped() {
    let (doc, report) = run(&page(r#"<img id="big" height="3000">"#));
    assert!(report.budget_exhausted);
    assert_eq!(report.overflowing_pages, 1);
    assert_eq!(content_ids(&doc), vec!["big"]);
}

// ─── Headers, Footers, Page Numbers ─────────────────────────────

fn chrome_page(body: &str) -> String {
    format!(
        r#"<div class="page"><div class="page-header" style="height: 60px">Acme</div><div class="page-body">{body}</div><div class="page-footer" style="height: 40px"><span class="page-number"></span>/<span class="page-total"></span></div></div>"#
    )
}

#[test]
fn test_continuation_pages_repeat_chrome() {
    let blocks: String = (0..15).map(|i| block(&format!("b{i}"), 100)).collect();
    let (doc, report) = run(&chrome_page(&blocks));

    // 700px of room between header and footer: seven blocks per page.
    assert_eq!(report.pages, 3);
    assert_no_overflow(&doc, &config());
    assert_eq!(with_class(&doc, "page-header").len(), 3);
    let numbers: Vec<String> = with_class(&doc, "page-number")
        .into_iter()
        .map(|n| doc.text_content(n))
        .collect();
    assert_eq!(numbers, vec!["1", "2", "3"]);
    assert!(with_class(&doc, "page-total").iter().all(|&n| doc.text_content(n) == "3"));
}

// ─── Table of Contents ──────────────────────────────────────────

fn proposal(sections: usize) -> String {
    let toc = r#"<div class="page toc"><div class="page-body"><h1 class="toc-title">Contents</h1><ol class="toc-list"></ol></div></div>"#;
    let body: String = (1..=sections)
        .map(|i| format!(r#"<h2>Section {i}</h2><p style="height: 150px">Body</p><h3>Detail {i}</h3><p>More</p>"#))
        .collect();
    format!(
        r#"<div class="page cover"><div class="page-body"><h1>Proposal</h1></div></div>{toc}{}"#,
        chrome_page(&body)
    )
}

#[test]
fn test_toc_lists_every_heading_with_its_page() {
    let (doc, report) = run(&proposal(12));

    let headings: Vec<NodeId> = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|&n| matches!(doc.tag(n), Some("h2" | "h3")))
        .collect();
    let entries = with_class(&doc, "toc-entry");
    assert_eq!(entries.len(), headings.len());
    assert_eq!(report.toc_entries, headings.len());

    for slot in with_class(&doc, "toc-page") {
        let anchor = doc.attr(slot, "data-anchor").unwrap();
        let heading = doc.element_by_id(anchor).unwrap();
        let expected = page_number_of(&doc, heading).unwrap();
        assert_eq!(doc.text_content(slot), expected.to_string(), "entry #{anchor}");
    }
    assert_no_overflow(&doc, &config());
}

#[test]
fn test_long_toc_continues() {
    let config = config();
    let body: String = (1..=30).map(|i| format!("<h2>Heading {i}</h2>")).collect();
    let markup = format!(
        r#"<div class="page toc" style="height: 230px"><div class="page-body"><h1 class="toc-title">Contents</h1><ol class="toc-list"></ol></div></div>{}"#,
        page(&body)
    );
    let mut doc = html::parse(&markup).unwrap();
    let report = paginate(&mut doc, &probe(&config), &config);

    assert_eq!(report.toc_pages, 3);
    let titles: Vec<String> = with_class(&doc, "toc-title")
        .into_iter()
        .map(|n| doc.text_content(n))
        .collect();
    assert_eq!(titles, vec!["Contents", "Contents (CONTINUED)", "Contents (CONTINUED)"]);
    let toc_pages: Vec<NodeId> = with_class(&doc, "toc");
    for p in toc_pages {
        let entries = doc
            .descendants(p)
            .into_iter()
            .filter(|&n| doc.has_class(n, "toc-entry"))
            .count();
        assert_eq!(entries, 10);
    }
}

// ─── Browser Markup ─────────────────────────────────────────────

#[test]
fn test_full_document_with_implied_end_tags() {
    // Unclosed paragraphs are siblings, and the script keeps its `<`.
    let paragraphs: String = (0..50).map(|i| format!(r#"<p id="p{i}">Paragraph {i}"#)).collect();
    let markup = format!(
        r#"<!DOCTYPE html><html><head><script>if (a<b) {{ go(); }}</script></head><body>{}</body></html>"#,
        page(&paragraphs)
    );
    let (doc, report) = run(&markup);

    assert_eq!(report.pages, 2);
    let pages = bodies(&doc);
    assert_eq!(pages[0].len(), 40);
    assert_eq!(pages[1].len(), 10);
    let expected: Vec<String> = (0..50).map(|i| format!("p{i}")).collect();
    assert_eq!(content_ids(&doc), expected);
    assert_no_overflow(&doc, &config());
    assert!(html::serialize(&doc).contains("<script>if (a<b) { go(); }</script>"));
}

// ─── Idempotence ────────────────────────────────────────────────

#[test]
fn test_second_run_changes_nothing() {
    let config = PaginationConfig::default();
    let layout = BlockLayoutConfig {
        page_height: PAGE_HEIGHT,
        ..Default::default()
    };
    let first = paginate_html(&proposal(10), layout.clone(), &config).unwrap();
    assert!(first.report.changed);
    assert_eq!(first.report.overflowing_pages, 0);

    let second = paginate_html(&first.html, layout, &config).unwrap();
    assert!(!second.report.changed);
    assert_eq!(second.report.passes, 1);
    assert_eq!(second.html, first.html);
}

#[test]
fn test_export_detaches_surface() {
    struct Counting {
        inner: BlockLayout,
        detached: std::cell::Cell<u32>,
    }
    impl LayoutProbe for Counting {
        fn measure(&self, doc: &Document, node: NodeId) -> Option<folio::geometry::BoxMetrics> {
            self.inner.measure(doc, node)
        }
        fn detach(&self) {
            self.detached.set(self.detached.get() + 1);
        }
    }

    let probe = Counting {
        inner: probe(&config()),
        detached: std::cell::Cell::new(0),
    };
    for _ in 0..3 {
        export_html(&page("<p>a</p>"), &probe, &config()).unwrap();
    }
    assert_eq!(probe.detached.get(), 3);
}
