//! HTML codec for the document tree.
//!
//! Parsing goes through `html5ever`, so input is read the way a browser
//! reads it: implied end tags, raw-text `script`/`style` bodies, table
//! fix-ups and entity decoding all follow the HTML parsing algorithm. The
//! parser builds an `RcDom`, which is then copied into the arena.
//!
//! Markup that starts with a doctype or an `<html>` tag is parsed as a full
//! document. Anything else is parsed as a fragment in `<body>` context and
//! comes back without the `html`/`head`/`body` scaffolding.
//!
//! Serialization drives `html5ever`'s own serializer over the arena, so
//! escaping, void elements and raw-text elements come out right as well.

use std::io;

use html5ever::serialize::{serialize as write_html, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, parse_fragment, LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::{Document, NodeId, NodeKind};
use crate::error::FolioError;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

fn html_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(local))
}

/// Whether the markup is a whole document rather than a body fragment.
fn is_full_document(html: &str) -> bool {
    let head: String = html.trim_start().chars().take(9).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Parse an HTML string into a fresh [`Document`].
pub fn parse(html: &str) -> Result<Document, FolioError> {
    let full = is_full_document(html);
    let opts = ParseOpts::default();
    let dom: RcDom = if full {
        parse_document(RcDom::default(), opts)
            .from_utf8()
            .read_from(&mut html.as_bytes())
    } else {
        parse_fragment(RcDom::default(), opts, html_name("body"), Vec::new())
            .from_utf8()
            .read_from(&mut html.as_bytes())
    }
    .map_err(|e| FolioError::Parse {
        message: e.to_string(),
    })?;

    let mut doc = Document::new();
    let root = doc.root();
    let top = dom.document.children.borrow();
    if full {
        for child in top.iter() {
            convert(&mut doc, child, root);
        }
    } else {
        // Fragment content hangs off a synthetic <html> element.
        for scaffold in top.iter() {
            for child in scaffold.children.borrow().iter() {
                convert(&mut doc, child, root);
            }
        }
    }
    Ok(doc)
}

fn attr_name(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{prefix}:{}", name.local),
        None => name.local.to_string(),
    }
}

fn convert(doc: &mut Document, handle: &Handle, parent: NodeId) {
    let node = match &handle.data {
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                convert(doc, child, parent);
            }
            return;
        }
        NodeData::ProcessingInstruction { .. } => return,
        NodeData::Doctype { name, .. } => doc.create_doctype(name),
        NodeData::Text { contents } => doc.create_text(&contents.borrow()),
        NodeData::Comment { contents } => doc.create_comment(contents),
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let el = doc.create_element(&name.local);
            for attr in attrs.borrow().iter() {
                doc.set_attr(el, &attr_name(&attr.name), &attr.value);
            }
            if let Some(contents) = template_contents.borrow().as_ref() {
                for child in contents.children.borrow().iter() {
                    convert(doc, child, el);
                }
            }
            el
        }
    };
    doc.append_child(parent, node);
    for child in handle.children.borrow().iter() {
        convert(doc, child, node);
    }
}

/// A node of the arena, seen through `html5ever`'s serializer.
struct Subtree<'a> {
    doc: &'a Document,
    node: NodeId,
}

impl Serialize for Subtree<'_> {
    fn serialize<S: Serializer>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()> {
        match traversal_scope {
            TraversalScope::IncludeNode => write_node(self.doc, self.node, serializer),
            TraversalScope::ChildrenOnly(_) => {
                for &child in self.doc.children(self.node) {
                    write_node(self.doc, child, serializer)?;
                }
                Ok(())
            }
        }
    }
}

fn write_node<S: Serializer>(doc: &Document, node: NodeId, serializer: &mut S) -> io::Result<()> {
    match doc.kind(node) {
        NodeKind::Root => {
            for &child in doc.children(node) {
                write_node(doc, child, serializer)?;
            }
            Ok(())
        }
        NodeKind::Doctype(name) => serializer.write_doctype(name),
        NodeKind::Comment(text) => serializer.write_comment(text),
        NodeKind::Text(text) => serializer.write_text(text),
        NodeKind::Element(el) => {
            let name = html_name(&el.name);
            let attrs: Vec<(QualName, &str)> = el
                .attrs
                .iter()
                .map(|(key, value)| (QualName::new(None, Namespace::from(""), LocalName::from(key.as_str())), value.as_str()))
                .collect();
            serializer.start_elem(name.clone(), attrs.iter().map(|(key, value)| (key, *value)))?;
            for &child in doc.children(node) {
                write_node(doc, child, serializer)?;
            }
            serializer.end_elem(name)
        }
    }
}

fn to_html(doc: &Document, node: NodeId, traversal_scope: TraversalScope) -> String {
    let mut out = Vec::new();
    let opts = SerializeOpts {
        traversal_scope,
        ..Default::default()
    };
    // Writing into a Vec cannot fail.
    if let Err(e) = write_html(&mut out, &Subtree { doc, node }, opts) {
        log::error!("serializing {node:?} failed: {e}");
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Serialize the whole document back to HTML.
pub fn serialize(doc: &Document) -> String {
    to_html(doc, doc.root(), TraversalScope::ChildrenOnly(None))
}

/// Serialize a single subtree (the node itself included).
pub fn serialize_node(doc: &Document, node: NodeId) -> String {
    to_html(doc, node, TraversalScope::IncludeNode)
}
