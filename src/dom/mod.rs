//! # Document Tree
//!
//! An arena-backed mutable tree holding the cloned proposal markup while it
//! is being repaginated. Nodes are addressed by [`NodeId`], a stable index
//! that survives every move: pagination only ever reparents nodes, so a
//! heading found in pass one is the same `NodeId` in pass seven.
//!
//! Detached nodes stay in the arena until the document is dropped. A node is
//! *attached* while its parent chain reaches the root.
//!
//! Every mutation bumps [`Document::revision`]. Layout probes key their
//! geometry caches on `(Document::id, revision)` so a measurement is never
//! trusted across a structural change.

pub mod html;

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// An element: tag name as the parser reports it (lower case for HTML)
/// plus attributes in source order. Attribute values are stored decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

/// The different kinds of nodes in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Doctype(String),
    Element(Element),
    /// Decoded text.
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A mutable document tree.
#[derive(Debug)]
pub struct Document {
    id: u64,
    nodes: Vec<NodeData>,
    revision: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document containing only the root node.
    pub fn new() -> Self {
        Self {
            id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            revision: 0,
        }
    }

    /// Process-unique identity of this document.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Monotonic mutation counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        self.touch();
        id
    }

    // ── Construction ────────────────────────────────────────────

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element(Element::new(name)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment(text.to_string()))
    }

    pub fn create_doctype(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Doctype(name.to_string()))
    }

    /// Copy a node's kind and attributes without its children. The copy is
    /// detached.
    pub fn clone_shallow(&mut self, node: NodeId) -> NodeId {
        let kind = self.nodes[node.0].kind.clone();
        self.push(kind)
    }

    /// Copy a node and its whole subtree. The copy is detached.
    pub fn clone_deep(&mut self, node: NodeId) -> NodeId {
        let copy = self.clone_shallow(node);
        let children = self.nodes[node.0].children.clone();
        for child in children {
            let child_copy = self.clone_deep(child);
            self.link(copy, child_copy, None);
        }
        copy
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes[node.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    /// Lower-cased tag name, `None` for non-elements.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.name.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    pub fn first_element_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).iter().copied().find(|&c| self.is_element(c))
    }

    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&c| c == node)
    }

    /// Siblings after `node`, in order.
    pub fn following_siblings(&self, node: NodeId) -> Vec<NodeId> {
        match (self.parent(node), self.index_in_parent(node)) {
            (Some(parent), Some(idx)) => self.children(parent)[idx + 1..].to_vec(),
            _ => Vec::new(),
        }
    }

    /// All descendants of `node` in document (preorder) order, `node` excluded.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Whether `ancestor` is a proper ancestor of `node`.
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.parent(node);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    /// Whether the node's parent chain reaches the root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        node == self.root() || self.is_ancestor_of(self.root(), node)
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|el| el.attr(name))
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node).is_some_and(|el| el.has_class(class))
    }

    pub fn has_any_class(&self, node: NodeId, classes: &[String]) -> bool {
        self.element(node)
            .is_some_and(|el| el.classes().any(|c| classes.iter().any(|k| k == c)))
    }

    /// Find the attached element carrying `id="..."`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&n| self.attr(n, "id") == Some(id))
    }

    /// Concatenated text of a subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) | NodeKind::Root => {
                for &child in self.children(node) {
                    self.collect_text(child, out);
                }
            }
            NodeKind::Comment(_) | NodeKind::Doctype(_) => {}
        }
    }

    /// Whitespace-only text and comments carry no printable content.
    pub fn is_blank(&self, node: NodeId) -> bool {
        match self.kind(node) {
            NodeKind::Text(text) => text.trim().is_empty(),
            NodeKind::Comment(_) | NodeKind::Doctype(_) => true,
            NodeKind::Element(_) | NodeKind::Root => false,
        }
    }

    /// Whether any child is an element or non-blank text.
    pub fn has_content(&self, node: NodeId) -> bool {
        self.children(node).iter().any(|&c| !self.is_blank(c))
    }

    // ── Mutation ────────────────────────────────────────────────

    fn unlink(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId, at: Option<usize>) {
        debug_assert!(parent != child && !self.is_ancestor_of(child, parent));
        self.unlink(child);
        let siblings = &mut self.nodes[parent.0].children;
        match at {
            Some(idx) if idx <= siblings.len() => siblings.insert(idx, child),
            _ => siblings.push(child),
        }
        self.nodes[child.0].parent = Some(parent);
        self.touch();
    }

    /// Detach `child` from wherever it is and append it to `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.link(parent, child, None);
    }

    /// Detach `child` and make it the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.link(parent, child, Some(0));
    }

    /// Insert `child` into `reference`'s parent, right before `reference`.
    /// No-op when `reference` is detached.
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) {
        if reference == child {
            return;
        }
        self.unlink(child);
        if let (Some(parent), Some(idx)) = (self.parent(reference), self.index_in_parent(reference)) {
            self.link(parent, child, Some(idx));
        }
    }

    /// Insert `child` into `reference`'s parent, right after `reference`.
    /// No-op when `reference` is detached.
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) {
        if reference == child {
            return;
        }
        self.unlink(child);
        if let (Some(parent), Some(idx)) = (self.parent(reference), self.index_in_parent(reference)) {
            self.link(parent, child, Some(idx + 1));
        }
    }

    /// Detach a node (and its subtree) from the tree.
    pub fn remove(&mut self, node: NodeId) {
        if self.parent(node).is_some() {
            self.unlink(node);
            self.touch();
        }
    }

    /// Move `start` and every sibling after it, in order, to the end of
    /// `new_parent`.
    pub fn move_from(&mut self, start: NodeId, new_parent: NodeId) {
        let mut run = vec![start];
        run.extend(self.following_siblings(start));
        for node in run {
            self.append_child(new_parent, node);
        }
    }

    /// Set an attribute, replacing any previous value. Writing the value it
    /// already has is not a mutation.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(node) {
            match el.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                Some((_, v)) if v == value => return,
                Some((_, v)) => *v = value.to_string(),
                None => el.attrs.push((name.to_string(), value.to_string())),
            }
            self.touch();
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(el) = self.element_mut(node) {
            let before = el.attrs.len();
            el.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
            if el.attrs.len() != before {
                self.touch();
            }
        }
    }

    /// Remove the given classes; drops the attribute when nothing is left.
    pub fn remove_classes(&mut self, node: NodeId, classes: &[String]) {
        let Some(el) = self.element(node) else {
            return;
        };
        if !el.classes().any(|c| classes.iter().any(|k| k == c)) {
            return;
        }
        let kept: Vec<String> = el
            .classes()
            .filter(|c| !classes.iter().any(|k| k == c))
            .map(str::to_string)
            .collect();
        if kept.is_empty() {
            self.remove_attr(node, "class");
        } else {
            self.set_attr(node, "class", &kept.join(" "));
        }
    }

    /// Replace all children with a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        if let [only] = self.children(node) {
            if matches!(self.kind(*only), NodeKind::Text(current) if current == text) {
                return;
            }
        }
        for child in self.children(node).to_vec() {
            self.unlink(child);
        }
        let text_node = self.create_text(text);
        self.append_child(node, text_node);
    }
}
