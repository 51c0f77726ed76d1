//! # Pagination Driver
//!
//! Walks the content pages with a work queue, measures each one, and
//! carries whatever does not fit onto a freshly built page right after it.
//! Passes repeat until the document stops changing, bounded by the limits
//! in [`crate::config::Limits`]:
//!
//! ```text
//!   queue ─→ measure ─→ fits ──────────────→ done
//!              │
//!              └─→ split point ─→ split in place? ─→ fragment ─┐
//!                                      │                       ├─→ new page, requeue
//!                                      └─→ move suffix whole ──┘
//! ```
//!
//! Nothing here fails. Pages that cannot be measured are skipped for the
//! pass, pages that refuse to converge are abandoned after their retry
//! budget, and the remediation sweep at the end forces whatever still
//! overflows onto later pages.

pub mod manual;
pub mod page_break;
pub mod shell;
pub mod split;

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use serde::Serialize;

use crate::config::{Markers, PaginationConfig};
use crate::dom::{Document, NodeId};
use crate::geometry::{apply_insets, LayoutProbe, PageGeometry};
use crate::toc;

use self::manual::{break_start, enforce_manual_breaks};
use self::page_break::{body_fits, decide_break, first_overflowing_child, is_heading, BreakDecision};
use self::shell::{find_body, find_footer, find_header, insert_page_after, PageParts};
use self::split::{split_element_to_fit, undo_split};

/// Summary of one [`paginate`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationReport {
    /// Driver passes that ran.
    pub passes: usize,
    /// Whether any pass or the remediation sweep changed the document.
    pub changed: bool,
    /// Pages in the final document, cover and TOC included.
    pub pages: usize,
    /// Content pages that still overflow after remediation.
    pub overflowing_pages: usize,
    /// Moves made by the remediation sweep.
    pub forced_moves: usize,
    /// The time budget or the pass limit ran out before convergence.
    pub budget_exhausted: bool,
    pub toc_pages: usize,
    pub toc_entries: usize,
}

/// Every top-level page in document order. Pages nested inside another page
/// are treated as content.
pub fn all_pages(doc: &Document, markers: &Markers) -> Vec<NodeId> {
    doc.descendants(doc.root())
        .into_iter()
        .filter(|&n| doc.has_class(n, &markers.page))
        .filter(|&n| {
            let mut cur = doc.parent(n);
            while let Some(p) = cur {
                if doc.has_class(p, &markers.page) {
                    return false;
                }
                cur = doc.parent(p);
            }
            true
        })
        .collect()
}

/// Pages the driver is responsible for: everything except cover pages and
/// the TOC, which is laid out by [`crate::toc`].
pub fn content_pages(doc: &Document, markers: &Markers) -> Vec<NodeId> {
    all_pages(doc, markers)
        .into_iter()
        .filter(|&p| !doc.has_class(p, &markers.cover) && !doc.has_class(p, &markers.toc))
        .collect()
}

fn measure_page(
    doc: &Document,
    probe: &dyn LayoutProbe,
    parts: &PageParts,
    config: &PaginationConfig,
) -> Option<PageGeometry> {
    PageGeometry::probe(doc, probe, parts.page, parts.header, parts.footer, config.footer_buffer)
}

/// Content pages whose body does not fit. Read-only; pages without a body
/// or without geometry are not reported.
pub fn overflowing_pages(doc: &Document, probe: &dyn LayoutProbe, config: &PaginationConfig) -> Vec<NodeId> {
    let markers = &config.markers;
    content_pages(doc, markers)
        .into_iter()
        .filter(|&page| {
            let Some(body) = find_body(doc, page, markers) else {
                return false;
            };
            let header = find_header(doc, page, markers);
            let footer = find_footer(doc, page, markers);
            PageGeometry::probe(doc, probe, page, header, footer, config.footer_buffer)
                .is_some_and(|g| !body_fits(doc, probe, body, &g, config))
        })
        .collect()
}

/// Paginate a document in place.
///
/// Runs driver passes, each followed by a heading/TOC/page-number refresh,
/// until a pass changes nothing and no page overflows, then forces any
/// remaining overflow onto new pages.
pub fn paginate(doc: &mut Document, probe: &dyn LayoutProbe, config: &PaginationConfig) -> PaginationReport {
    let limits = &config.limits;
    let deadline = Instant::now() + limits.time_budget();
    let mut report = PaginationReport::default();
    let mut converged = false;

    while report.passes < limits.max_passes {
        if Instant::now() >= deadline {
            log::warn!("pagination time budget of {}ms exhausted", limits.time_budget_ms);
            break;
        }
        probe.settle(doc);
        let changed = run_pass(doc, probe, config, Some(deadline));
        report.passes += 1;
        report.changed |= changed;
        toc::refresh_metadata(doc, probe, config);

        if !changed && overflowing_pages(doc, probe, config).is_empty() {
            converged = true;
            break;
        }
    }
    if !converged {
        report.budget_exhausted = true;
        log::warn!("pagination did not converge after {} pass(es)", report.passes);
    }

    let mut summary = toc::refresh_metadata(doc, probe, config);
    if !overflowing_pages(doc, probe, config).is_empty() {
        report.forced_moves = remediate(doc, probe, config);
        if report.forced_moves > 0 {
            report.changed = true;
            summary = toc::refresh_metadata(doc, probe, config);
        }
    }

    report.pages = all_pages(doc, &config.markers).len();
    report.overflowing_pages = overflowing_pages(doc, probe, config).len();
    report.toc_pages = summary.pages;
    report.toc_entries = summary.entries;
    log::debug!("pagination finished: {report:?}");
    report
}

/// One driver pass over every content page. Returns whether anything was
/// moved, removed or re-inset.
pub fn run_pass(
    doc: &mut Document,
    probe: &dyn LayoutProbe,
    config: &PaginationConfig,
    deadline: Option<Instant>,
) -> bool {
    let limits = &config.limits;
    let markers = &config.markers;
    let mut changed = false;

    let mut queue: VecDeque<NodeId> = content_pages(doc, markers).into();
    let mut retries: HashMap<NodeId, u32> = HashMap::new();
    let mut steps = 0usize;

    while let Some(page) = queue.pop_front() {
        steps += 1;
        if steps > limits.max_steps_per_pass {
            log::warn!(
                "pagination pass stopped at the step ceiling ({} steps)",
                limits.max_steps_per_pass
            );
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::warn!("pagination pass interrupted by the time budget");
            break;
        }
        if !doc.is_attached(page) {
            continue;
        }

        let before = doc.revision();
        let parts = PageParts::resolve(doc, page, markers);
        changed |= doc.revision() != before;
        if !doc.has_content(parts.body) {
            log::debug!("removing empty page {page:?}");
            doc.remove(page);
            changed = true;
            continue;
        }

        let attempts = retries.entry(page).or_insert(0);
        *attempts += 1;
        if *attempts > limits.max_page_retries {
            if *attempts == limits.max_page_retries + 1 {
                log::warn!("page {page:?} still unresolved after {} attempts; giving up this pass", limits.max_page_retries);
            }
            continue;
        }

        let step = process_page(doc, probe, config, &parts);
        changed |= step.changed;
        for next in step.revisit.into_iter().rev() {
            queue.push_front(next);
        }
    }

    if enforce_manual_breaks(doc, config) {
        log::debug!("manual break enforced after pass");
        changed = true;
    }
    changed
}

/// What handling one page did.
#[derive(Debug, Default)]
struct PageStep {
    changed: bool,
    /// Pages to process next, in document order.
    revisit: Vec<NodeId>,
}

/// Measure one page and break it if needed.
fn process_page(
    doc: &mut Document,
    probe: &dyn LayoutProbe,
    config: &PaginationConfig,
    parts: &PageParts,
) -> PageStep {
    let Some(geometry) = measure_page(doc, probe, parts, config) else {
        log::debug!("page {:?} has no geometry; skipping this pass", parts.page);
        return PageStep::default();
    };
    let before = doc.revision();
    apply_insets(doc, parts.body, &geometry);
    let no_break = PageStep {
        changed: doc.revision() != before,
        revisit: Vec::new(),
    };

    let (mut split_at, forced) = match decide_break(doc, probe, parts.body, &geometry, config) {
        BreakDecision::Fits | BreakDecision::Unresolved => return no_break,
        BreakDecision::Forced(node) => (node, true),
        BreakDecision::Overflow(node) => (node, false),
    };
    if doc.parent(split_at) != Some(parts.body) {
        return no_break;
    }
    if forced {
        // An empty marker is dropped rather than printed as a blank page.
        match break_start(doc, split_at, &config.markers) {
            Some(start) => split_at = start,
            None => {
                log::debug!("page {:?}: dropped trailing empty break marker", parts.page);
                return PageStep {
                    changed: true,
                    revisit: vec![parts.page],
                };
            }
        }
    }

    let children = doc.element_children(parts.body);
    let Some(&first) = children.first() else {
        return no_break;
    };

    // A leading element that fits on its own stays; the break moves down.
    if !forced && split_at == first && !is_heading(doc, split_at) && children.len() > 1 {
        let fits_whole = probe
            .measure(doc, split_at)
            .is_some_and(|m| m.outer_height() <= geometry.available_height + config.tolerance);
        if fits_whole {
            split_at = children[1];
        }
    }

    let followers = doc.following_siblings(split_at);
    let fragment = if forced {
        None
    } else {
        split_in_place(doc, probe, config, parts.body, split_at, &geometry, split_at == first)
    };
    if fragment.is_none() && split_at == first {
        // Moving the whole body would just recreate this page.
        match children.get(1) {
            Some(&next) => split_at = next,
            None => {
                log::debug!("page {:?}: sole element cannot be split; leaving it", parts.page);
                return no_break;
            }
        }
    }

    let shell = insert_page_after(doc, parts, &config.markers);
    match fragment {
        Some(fragment) => {
            doc.append_child(shell.body, fragment);
            for node in followers {
                doc.append_child(shell.body, node);
            }
        }
        None => doc.move_from(split_at, shell.body),
    }
    log::debug!(
        "page {:?} broken at {:?}{}; continued on {:?}",
        parts.page,
        split_at,
        if fragment.is_some() { " (split)" } else { "" },
        shell.page
    );

    let new_parts = shell.parts();
    let mut revisit = Vec::new();
    for p in [parts, &new_parts] {
        if let Some(g) = measure_page(doc, probe, p, config) {
            apply_insets(doc, p.body, &g);
        }
    }
    if !doc.has_content(parts.body) {
        doc.remove(parts.page);
    } else {
        let still_overflows = measure_page(doc, probe, parts, config)
            .is_some_and(|g| !body_fits(doc, probe, parts.body, &g, config));
        if still_overflows {
            revisit.push(parts.page);
        }
    }
    revisit.push(shell.page);
    PageStep {
        changed: true,
        revisit,
    }
}

/// Split `element` against the space left below its top edge. A split that
/// would empty the page's leading element is undone.
fn split_in_place(
    doc: &mut Document,
    probe: &dyn LayoutProbe,
    config: &PaginationConfig,
    body: NodeId,
    element: NodeId,
    geometry: &PageGeometry,
    is_first: bool,
) -> Option<NodeId> {
    let metrics = probe.measure(doc, element)?;
    let remaining = (geometry.content_bottom() - (metrics.top - metrics.margin_top)).max(0.0);
    let index = doc.index_in_parent(element)?;
    let outcome = split_element_to_fit(doc, probe, element, remaining, config)?;
    if outcome.original_removed && is_first {
        undo_split(doc, element, outcome, body, index);
        return None;
    }
    Some(outcome.fragment)
}

/// Last resort for pages that still overflow: move the first crossing child
/// (or the last child) and everything after it onto a new page. Returns the
/// number of moves made.
pub fn remediate(doc: &mut Document, probe: &dyn LayoutProbe, config: &PaginationConfig) -> usize {
    let mut moves = 0;
    let mut skipped: HashSet<NodeId> = HashSet::new();

    while moves < config.limits.max_forced_moves {
        let Some(page) = overflowing_pages(doc, probe, config)
            .into_iter()
            .find(|p| !skipped.contains(p))
        else {
            break;
        };
        let parts = PageParts::resolve(doc, page, &config.markers);
        let Some(geometry) = measure_page(doc, probe, &parts, config) else {
            skipped.insert(page);
            continue;
        };
        apply_insets(doc, parts.body, &geometry);

        let children = doc.element_children(parts.body);
        let index = first_overflowing_child(doc, probe, &children, &geometry, config)
            .unwrap_or(children.len().saturating_sub(1))
            .max(1);
        let Some(&start) = children.get(index) else {
            skipped.insert(page);
            continue;
        };

        let shell = insert_page_after(doc, &parts, &config.markers);
        doc.move_from(start, shell.body);
        for p in [parts, shell.parts()] {
            if let Some(g) = measure_page(doc, probe, &p, config) {
                apply_insets(doc, p.body, &g);
            }
        }
        moves += 1;
        log::warn!("forced content of page {page:?} onto a new page ({moves}/{})", config.limits.max_forced_moves);
    }
    moves
}
