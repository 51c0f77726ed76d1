//! # Table of Contents and Page Metadata
//!
//! Runs after every pagination pass:
//!
//! 1. Number the second- and third-level headings (`2`, `2.1`, ...) and
//!    give each a unique anchor.
//! 2. Rebuild the TOC from scratch, one entry at a time, opening a
//!    continuation page whenever the current TOC page overflows.
//! 3. Write page numbers and the page count into the footer slots.
//! 4. Back-fill each TOC entry with the page its heading ended up on.
//!
//! Every step writes only what differs, so refreshing a stable document
//! leaves its markup byte-identical.

use std::collections::{HashMap, HashSet};

use crate::config::{Markers, PaginationConfig};
use crate::dom::{Document, NodeId};
use crate::geometry::{apply_insets, LayoutProbe, PageGeometry};
use crate::paginate::all_pages;
use crate::paginate::page_break::{body_fits, heading_text};
use crate::paginate::shell::{create_page_shell, PageParts};

const ENTRY_CLASS: &str = "toc-entry";
const ENTRY_NUMBER_CLASS: &str = "toc-number";
const ENTRY_TEXT_CLASS: &str = "toc-text";
const ENTRY_PAGE_CLASS: &str = "toc-page";
const ORIGINAL_TITLE_ATTR: &str = "data-toc-title";

/// One numbered heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRecord {
    /// 2 or 3.
    pub level: u8,
    pub number: String,
    pub text: String,
    pub anchor: String,
    pub node: NodeId,
}

/// What the TOC looks like after a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TocSummary {
    pub pages: usize,
    pub entries: usize,
}

/// The top-level page containing `node`, if any.
fn page_of(doc: &Document, node: NodeId, markers: &Markers) -> Option<NodeId> {
    let mut found = None;
    let mut cur = Some(node);
    while let Some(n) = cur {
        if doc.has_class(n, &markers.page) {
            found = Some(n);
        }
        cur = doc.parent(n);
    }
    found
}

fn in_page_chrome(doc: &Document, node: NodeId, markers: &Markers) -> bool {
    let mut cur = doc.parent(node);
    while let Some(n) = cur {
        if doc.has_class(n, &markers.page) {
            return false;
        }
        let chrome = matches!(doc.tag(n), Some("header" | "footer"))
            || doc.has_class(n, &markers.header)
            || doc.has_class(n, &markers.footer);
        if chrome {
            return true;
        }
        cur = doc.parent(n);
    }
    false
}

fn is_numbered_heading(doc: &Document, node: NodeId, markers: &Markers) -> bool {
    if !matches!(doc.tag(node), Some("h2" | "h3")) || doc.has_class(node, &markers.no_number) {
        return false;
    }
    if in_page_chrome(doc, node, markers) {
        return false;
    }
    !page_of(doc, node, markers)
        .is_some_and(|p| doc.has_class(p, &markers.cover) || doc.has_class(p, &markers.toc))
}

fn unique_anchor(text: &str, taken: &HashSet<String>) -> String {
    let mut base = slug::slugify(text);
    if base.is_empty() {
        base = "section".to_string();
    }
    if !taken.contains(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

/// Number the eligible headings in document order and anchor them.
///
/// `h2` bumps the major counter and resets the minor one; `h3` bumps the
/// minor counter. The number lives in a leading `heading-number` span that
/// later runs update in place.
pub fn number_headings(doc: &mut Document, config: &PaginationConfig) -> Vec<HeadingRecord> {
    let markers = &config.markers;
    let all = doc.descendants(doc.root());
    let headings: Vec<NodeId> = all
        .iter()
        .copied()
        .filter(|&n| is_numbered_heading(doc, n, markers))
        .collect();

    // Ids on anything that is not a numbered heading are off limits.
    let heading_set: HashSet<NodeId> = headings.iter().copied().collect();
    let mut taken: HashSet<String> = all
        .iter()
        .filter(|n| !heading_set.contains(n))
        .filter_map(|&n| doc.attr(n, "id"))
        .map(str::to_string)
        .collect();

    let (mut major, mut minor) = (0u32, 0u32);
    let mut records = Vec::with_capacity(headings.len());
    for heading in headings {
        let level = if doc.tag(heading) == Some("h2") { 2 } else { 3 };
        let number = if level == 2 {
            major += 1;
            minor = 0;
            major.to_string()
        } else {
            minor += 1;
            format!("{major}.{minor}")
        };

        let span = doc
            .children(heading)
            .iter()
            .copied()
            .find(|&c| doc.has_class(c, &markers.heading_number));
        match span {
            Some(span) => doc.set_text_content(span, &number),
            None => {
                let span = doc.create_element("span");
                doc.set_attr(span, "class", &markers.heading_number);
                doc.set_text_content(span, &number);
                doc.prepend_child(heading, span);
            }
        }

        let text = heading_text(doc, heading, config);
        let anchor = match doc.attr(heading, "id") {
            Some(id) if !id.is_empty() && !taken.contains(id) => id.to_string(),
            _ => {
                let anchor = unique_anchor(&text, &taken);
                doc.set_attr(heading, "id", &anchor);
                anchor
            }
        };
        taken.insert(anchor.clone());

        records.push(HeadingRecord {
            level,
            number,
            text,
            anchor,
            node: heading,
        });
    }
    records
}

fn find_toc_list(doc: &Document, body: NodeId, markers: &Markers) -> Option<NodeId> {
    let nodes = doc.descendants(body);
    nodes
        .iter()
        .copied()
        .find(|&n| doc.has_class(n, &markers.toc_list))
        .or_else(|| nodes.iter().copied().find(|&n| matches!(doc.tag(n), Some("ol" | "ul"))))
}

fn find_toc_title(doc: &Document, body: NodeId, markers: &Markers) -> Option<NodeId> {
    let nodes = doc.descendants(body);
    nodes
        .iter()
        .copied()
        .find(|&n| doc.has_class(n, &markers.toc_title))
        .or_else(|| nodes.iter().copied().find(|&n| matches!(doc.tag(n), Some("h1" | "h2" | "h3"))))
}

fn page_numbers(doc: &Document, markers: &Markers) -> HashMap<NodeId, usize> {
    all_pages(doc, markers)
        .into_iter()
        .enumerate()
        .map(|(i, p)| (p, i + 1))
        .collect()
}

fn build_entry(doc: &mut Document, record: &HeadingRecord, page_number: Option<usize>) -> NodeId {
    let li = doc.create_element("li");
    doc.set_attr(li, "class", &format!("{ENTRY_CLASS} toc-level-{}", record.level));

    let link = doc.create_element("a");
    doc.set_attr(link, "href", &format!("#{}", record.anchor));
    let number = doc.create_element("span");
    doc.set_attr(number, "class", ENTRY_NUMBER_CLASS);
    doc.set_text_content(number, &record.number);
    let gap = doc.create_text(" ");
    let text = doc.create_element("span");
    doc.set_attr(text, "class", ENTRY_TEXT_CLASS);
    doc.set_text_content(text, &record.text);
    doc.append_child(link, number);
    doc.append_child(link, gap);
    doc.append_child(link, text);

    let page = doc.create_element("span");
    doc.set_attr(page, "class", ENTRY_PAGE_CLASS);
    doc.set_attr(page, "data-anchor", &record.anchor);
    if let Some(n) = page_number {
        doc.set_text_content(page, &n.to_string());
    }

    doc.append_child(li, link);
    doc.append_child(li, page);
    li
}

fn toc_page_overflows(
    doc: &mut Document,
    probe: &dyn LayoutProbe,
    parts: &PageParts,
    config: &PaginationConfig,
) -> bool {
    let Some(geometry) =
        PageGeometry::probe(doc, probe, parts.page, parts.header, parts.footer, config.footer_buffer)
    else {
        return false;
    };
    apply_insets(doc, parts.body, &geometry);
    !body_fits(doc, probe, parts.body, &geometry, config)
}

/// The authored TOC page pieces that continuation pages are cloned from.
struct TocTemplate {
    page: NodeId,
    header: Option<NodeId>,
    footer: Option<NodeId>,
    title: Option<NodeId>,
    base_title: Option<String>,
    list: NodeId,
}

impl TocTemplate {
    /// Insert an empty continuation page after `after`; returns its parts
    /// and its entry list.
    fn continuation(
        &self,
        doc: &mut Document,
        after: NodeId,
        config: &PaginationConfig,
    ) -> (PageParts, NodeId) {
        let shell = create_page_shell(doc, self.page, self.header, self.footer, &config.markers);
        doc.insert_after(after, shell.page);

        if let Some(title) = self.title {
            let copy = doc.clone_deep(title);
            doc.remove_attr(copy, "id");
            let base = self.base_title.as_deref().unwrap_or_default();
            doc.set_text_content(copy, &format!("{base}{}", config.continued_suffix));
            doc.set_attr(copy, ORIGINAL_TITLE_ATTR, base);
            doc.append_child(shell.body, copy);
        }
        let list = doc.clone_shallow(self.list);
        doc.remove_attr(list, "id");
        doc.append_child(shell.body, list);
        (shell.parts(), list)
    }
}

/// Rebuild the TOC from `records`.
///
/// Everything but the first TOC page is discarded and its list emptied.
/// Entries are appended one by one; an entry that makes its page overflow
/// moves to a new continuation page. A single entry that does not fit an
/// empty page stays where it is.
pub fn reflow_toc(
    doc: &mut Document,
    probe: &dyn LayoutProbe,
    config: &PaginationConfig,
    records: &[HeadingRecord],
) -> TocSummary {
    let markers = &config.markers;
    let toc_pages: Vec<NodeId> = all_pages(doc, markers)
        .into_iter()
        .filter(|&p| doc.has_class(p, &markers.toc))
        .collect();
    let Some((&first, extra)) = toc_pages.split_first() else {
        return TocSummary::default();
    };
    for &page in extra {
        doc.remove(page);
    }

    let parts = PageParts::resolve(doc, first, markers);
    let Some(list) = find_toc_list(doc, parts.body, markers) else {
        log::debug!("TOC page {first:?} has no entry list; leaving it as authored");
        return TocSummary { pages: 1, entries: 0 };
    };
    for child in doc.children(list).to_vec() {
        doc.remove(child);
    }

    if records.is_empty() {
        doc.remove(first);
        return TocSummary::default();
    }

    let title = find_toc_title(doc, parts.body, markers);
    let template = TocTemplate {
        page: first,
        header: parts.header,
        footer: parts.footer,
        title,
        base_title: title.map(|t| match doc.attr(t, ORIGINAL_TITLE_ATTR) {
            Some(original) => original.to_string(),
            None => doc.text_content(t).trim().to_string(),
        }),
        list,
    };

    let numbers = page_numbers(doc, markers);
    let mut current = parts;
    let mut current_list = list;
    let mut on_page = 0usize;
    let mut pages = 1usize;
    for record in records {
        let page_number = page_of(doc, record.node, markers).and_then(|p| numbers.get(&p).copied());
        let entry = build_entry(doc, record, page_number);
        doc.append_child(current_list, entry);
        if on_page > 0 && toc_page_overflows(doc, probe, &current, config) {
            doc.remove(entry);
            let (next, next_list) = template.continuation(doc, current.page, config);
            doc.append_child(next_list, entry);
            current = next;
            current_list = next_list;
            on_page = 0;
            pages += 1;
        }
        on_page += 1;
    }
    toc_page_overflows(doc, probe, &current, config);

    log::debug!("TOC rebuilt: {} entries on {pages} page(s)", records.len());
    TocSummary {
        pages,
        entries: records.len(),
    }
}

/// Fill every page-number slot with its page's position and every
/// page-total slot with the page count. Returns the page count.
pub fn assign_page_numbers(doc: &mut Document, markers: &Markers) -> usize {
    let pages = all_pages(doc, markers);
    let total = pages.len();
    for (i, &page) in pages.iter().enumerate() {
        for node in doc.descendants(page) {
            if doc.has_class(node, &markers.page_number) {
                doc.set_text_content(node, &(i + 1).to_string());
            } else if doc.has_class(node, &markers.page_total) {
                doc.set_text_content(node, &total.to_string());
            }
        }
    }
    total
}

/// Point every TOC entry at the page its heading is on now.
pub fn backfill_toc_page_numbers(doc: &mut Document, markers: &Markers) {
    let numbers = page_numbers(doc, markers);
    let nodes = doc.descendants(doc.root());
    let ids: HashMap<String, NodeId> = nodes
        .iter()
        .filter_map(|&n| doc.attr(n, "id").map(|id| (id.to_string(), n)))
        .collect();

    let slots: Vec<(NodeId, String)> = nodes
        .iter()
        .filter(|&&n| doc.has_class(n, ENTRY_PAGE_CLASS))
        .filter_map(|&n| doc.attr(n, "data-anchor").map(|a| (n, a.to_string())))
        .collect();
    for (slot, anchor) in slots {
        let number = ids
            .get(&anchor)
            .and_then(|&target| page_of(doc, target, markers))
            .and_then(|page| numbers.get(&page));
        match number {
            Some(n) => doc.set_text_content(slot, &n.to_string()),
            None => log::debug!("TOC entry for #{anchor} points at no page"),
        }
    }
}

/// Number headings, rebuild the TOC and write all page numbers.
pub fn refresh_metadata(doc: &mut Document, probe: &dyn LayoutProbe, config: &PaginationConfig) -> TocSummary {
    let records = number_headings(doc, config);
    let summary = reflow_toc(doc, probe, config, &records);
    assign_page_numbers(doc, &config.markers);
    backfill_toc_page_numbers(doc, &config.markers);
    summary
}
