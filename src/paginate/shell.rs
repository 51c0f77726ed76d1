//! Page shells: empty continuation pages and normalized page bodies.

use crate::config::Markers;
use crate::dom::{Document, NodeId};

/// The structural parts of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParts {
    pub page: NodeId,
    pub header: Option<NodeId>,
    pub footer: Option<NodeId>,
    pub body: NodeId,
}

impl PageParts {
    /// Locate header and footer among the page's direct children and make
    /// sure a body exists.
    pub fn resolve(doc: &mut Document, page: NodeId, markers: &Markers) -> Self {
        let header = find_header(doc, page, markers);
        let footer = find_footer(doc, page, markers);
        let body = ensure_page_body(doc, page, header, footer, markers);
        Self {
            page,
            header,
            footer,
            body,
        }
    }
}

pub fn find_header(doc: &Document, page: NodeId, markers: &Markers) -> Option<NodeId> {
    doc.element_children(page)
        .into_iter()
        .find(|&c| doc.tag(c) == Some("header") || doc.has_class(c, &markers.header))
}

pub fn find_footer(doc: &Document, page: NodeId, markers: &Markers) -> Option<NodeId> {
    doc.element_children(page)
        .into_iter()
        .find(|&c| doc.tag(c) == Some("footer") || doc.has_class(c, &markers.footer))
}

pub fn find_body(doc: &Document, page: NodeId, markers: &Markers) -> Option<NodeId> {
    doc.element_children(page)
        .into_iter()
        .find(|&c| doc.has_class(c, &markers.body))
}

/// Return the page's body, wrapping every non-header, non-footer child into
/// a new one when the page was authored without it. Idempotent.
pub fn ensure_page_body(
    doc: &mut Document,
    page: NodeId,
    header: Option<NodeId>,
    footer: Option<NodeId>,
    markers: &Markers,
) -> NodeId {
    if let Some(body) = find_body(doc, page, markers) {
        return body;
    }

    let body = doc.create_element("div");
    doc.set_attr(body, "class", &markers.body);
    let content: Vec<NodeId> = doc
        .children(page)
        .iter()
        .copied()
        .filter(|&c| Some(c) != header && Some(c) != footer)
        .collect();
    for node in content {
        doc.append_child(body, node);
    }
    match footer {
        Some(f) => doc.insert_before(f, body),
        None => doc.append_child(page, body),
    }
    body
}

/// A freshly built, still detached page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageShell {
    pub page: NodeId,
    pub header: Option<NodeId>,
    pub footer: Option<NodeId>,
    pub body: NodeId,
}

impl PageShell {
    pub fn parts(&self) -> PageParts {
        PageParts {
            page: self.page,
            header: self.header,
            footer: self.footer,
            body: self.body,
        }
    }
}

/// Build an empty page that looks like `template`: same attributes (minus
/// `id`), deep copies of its header and footer around an empty body. No
/// `id` is copied anywhere, so ids stay unique across continuation pages.
///
/// The caller inserts the page and fills the body.
pub fn create_page_shell(
    doc: &mut Document,
    template: NodeId,
    header: Option<NodeId>,
    footer: Option<NodeId>,
    markers: &Markers,
) -> PageShell {
    let page = doc.clone_shallow(template);
    doc.remove_attr(page, "id");

    let header = header.map(|h| {
        let copy = clone_without_ids(doc, h);
        doc.append_child(page, copy);
        copy
    });

    let body = doc.create_element("div");
    doc.set_attr(body, "class", &markers.body);
    doc.append_child(page, body);

    let footer = footer.map(|f| {
        let copy = clone_without_ids(doc, f);
        doc.append_child(page, copy);
        copy
    });

    PageShell {
        page,
        header,
        footer,
        body,
    }
}

fn clone_without_ids(doc: &mut Document, node: NodeId) -> NodeId {
    let copy = doc.clone_deep(node);
    doc.remove_attr(copy, "id");
    for inner in doc.descendants(copy) {
        doc.remove_attr(inner, "id");
    }
    copy
}

/// Build a shell for `parts` and insert it right after that page.
pub fn insert_page_after(doc: &mut Document, parts: &PageParts, markers: &Markers) -> PageShell {
    let shell = create_page_shell(doc, parts.page, parts.header, parts.footer, markers);
    doc.insert_after(parts.page, shell.page);
    shell
}
