//! # Document Tree
//!
//! Arena of nodes keyed by `NodeKey`. The root always exists and is shared by
//! every collaborating peer (`ROOT_KEY`). All structural edits go through the
//! four primitives `insert_subtree`, `remove_subtree`, `move_node` and
//! `set_text`, which are exactly what the editor's mutations replay.

use crate::error::{DocumentError, DocumentResult};
use crate::node::{Node, NodeKey, NodeKind};
use crate::serializer::SerializedNode;
use std::collections::{HashMap, HashSet};

/// Key of the root node on every site
pub const ROOT_KEY: NodeKey = NodeKey(0);

#[derive(Debug, Clone)]
pub struct Document {
    nodes: HashMap<NodeKey, Node>,
    site: u32,
    clock: u32,
}

impl Document {
    /// Empty document owned by `site`. Sites start at 1; site 0 is reserved
    /// for the root.
    pub fn new(site: u32) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_KEY, Node::new(ROOT_KEY, NodeKind::Root));
        Self {
            nodes,
            site,
            clock: 0,
        }
    }

    /// One paragraph per string, each holding a single text node
    pub fn from_paragraphs(site: u32, paragraphs: &[&str]) -> Self {
        let mut doc = Self::new(site);
        for text in paragraphs {
            let paragraph = doc.push_child(ROOT_KEY, NodeKind::Paragraph);
            doc.push_child(paragraph, NodeKind::text(*text));
        }
        doc
    }

    /// Same content, keys and clock, allocating future keys as `site`.
    /// Used to seed a collaborating peer from a shared snapshot.
    pub fn fork(&self, site: u32) -> Self {
        let mut doc = self.clone();
        doc.site = site;
        doc.clock = doc
            .nodes
            .keys()
            .filter(|key| key.site() == site)
            .map(|key| key.clock())
            .max()
            .unwrap_or(0);
        doc
    }

    pub fn site(&self) -> u32 {
        self.site
    }

    pub fn allocate_key(&mut self) -> NodeKey {
        self.clock += 1;
        NodeKey::new(self.site, self.clock)
    }

    pub fn root(&self) -> NodeKey {
        ROOT_KEY
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children(ROOT_KEY).is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(&key)
    }

    pub fn node(&self, key: NodeKey) -> DocumentResult<&Node> {
        self.nodes.get(&key).ok_or(DocumentError::NodeNotFound(key))
    }

    pub fn kind(&self, key: NodeKey) -> Option<&NodeKind> {
        self.nodes.get(&key).map(|node| &node.kind)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&key).and_then(|node| node.parent)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&key)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_in_parent(&self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.children(parent).iter().position(|child| *child == key)
    }

    pub fn previous_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let index = self.index_in_parent(key)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    pub fn next_sibling(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = self.parent(key)?;
        let index = self.index_in_parent(key)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn text(&self, key: NodeKey) -> Option<&str> {
        self.kind(key).and_then(NodeKind::as_text)
    }

    pub fn is_text(&self, key: NodeKey) -> bool {
        self.text(key).is_some()
    }

    /// Character length of a text node, 0 for anything else
    pub fn text_len(&self, key: NodeKey) -> usize {
        self.text(key).map(|text| text.chars().count()).unwrap_or(0)
    }

    /// Strict ancestors, nearest first
    pub fn ancestors(&self, key: NodeKey) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(key),
        }
    }

    pub fn is_ancestor_or_self(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        key == ancestor || self.ancestors(key).any(|k| k == ancestor)
    }

    /// Preorder traversal of the subtree rooted at `key`, `key` included
    pub fn preorder(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        if !self.contains(key) {
            return out;
        }
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            out.push(current);
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Text nodes under `key` in document order
    pub fn text_leaves(&self, key: NodeKey) -> Vec<NodeKey> {
        self.preorder(key)
            .into_iter()
            .filter(|k| self.is_text(*k))
            .collect()
    }

    /// Concatenated text of a subtree. Blocks are not separated.
    pub fn text_content(&self, key: NodeKey) -> String {
        self.text_leaves(key)
            .into_iter()
            .filter_map(|k| self.text(k))
            .collect()
    }

    /// Text of the whole document with one line per top-level paragraph
    pub fn plain_text(&self) -> String {
        self.paragraphs()
            .into_iter()
            .map(|p| self.text_content(p))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Child-index path from the root
    pub fn path(&self, key: NodeKey) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = key;
        while let Some(index) = self.index_in_parent(current) {
            path.push(index);
            match self.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Nearest enclosing paragraph (or block) of `key`, including itself
    pub fn nearest_block(&self, key: NodeKey) -> Option<NodeKey> {
        std::iter::once(key)
            .chain(self.ancestors(key))
            .find(|k| matches!(self.kind(*k), Some(NodeKind::Paragraph)))
            .or_else(|| {
                std::iter::once(key)
                    .chain(self.ancestors(key))
                    .find(|k| self.kind(*k).is_some_and(NodeKind::is_block))
            })
    }

    /// All paragraphs in document order, including those nested in block
    /// wrappers
    pub fn paragraphs(&self) -> Vec<NodeKey> {
        self.preorder(ROOT_KEY)
            .into_iter()
            .filter(|k| matches!(self.kind(*k), Some(NodeKind::Paragraph)))
            .collect()
    }

    pub fn paragraph(&self, index: usize) -> Option<NodeKey> {
        self.paragraphs().get(index).copied()
    }

    /// Previous text leaf in document order
    pub fn previous_text_leaf(&self, key: NodeKey) -> Option<NodeKey> {
        let leaves = self.text_leaves(ROOT_KEY);
        let order = self.preorder(ROOT_KEY);
        let position = order.iter().position(|k| *k == key)?;
        let before: HashSet<NodeKey> = order[..position].iter().copied().collect();
        leaves.into_iter().rev().find(|leaf| before.contains(leaf))
    }

    /// Next text leaf in document order, outside the subtree of `key`
    pub fn next_text_leaf(&self, key: NodeKey) -> Option<NodeKey> {
        let order = self.preorder(ROOT_KEY);
        let position = order.iter().position(|k| *k == key)?;
        order[position + 1..]
            .iter()
            .copied()
            .find(|k| self.is_text(*k) && !self.is_ancestor_or_self(key, *k))
    }

    // ------------------------------------------------------------------
    // Primitive edits
    // ------------------------------------------------------------------

    /// Create a child node with a fresh key at the end of `parent`.
    /// Used by builders; edits that must be replayable go through
    /// `insert_subtree` instead.
    pub(crate) fn push_child(&mut self, parent: NodeKey, kind: NodeKind) -> NodeKey {
        let key = self.allocate_key();
        let mut node = Node::new(key, kind);
        node.parent = Some(parent);
        self.nodes.insert(key, node);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(key);
        }
        key
    }

    /// Attach a serialized subtree whose nodes all carry keys. The index is
    /// clamped to the parent's child count.
    pub fn insert_subtree(
        &mut self,
        parent: NodeKey,
        index: usize,
        subtree: &SerializedNode,
    ) -> DocumentResult<NodeKey> {
        let parent_node = self.node(parent)?;
        if !parent_node.kind.can_contain_children() {
            return Err(DocumentError::CannotHaveChildren(parent));
        }
        self.validate_subtree(subtree, &mut HashSet::new())?;

        let key = self.attach(subtree, parent)?;
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(DocumentError::ParentNotFound(parent))?;
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, key);
        Ok(key)
    }

    fn validate_subtree(
        &self,
        subtree: &SerializedNode,
        seen: &mut HashSet<NodeKey>,
    ) -> DocumentResult<()> {
        let key = subtree.key.ok_or(DocumentError::MissingKey)?;
        if self.contains(key) || !seen.insert(key) {
            return Err(DocumentError::DuplicateKey(key));
        }
        let kind = subtree.to_kind()?;
        if matches!(kind, NodeKind::Root) {
            return Err(DocumentError::InvalidNode("nested root".to_string()));
        }
        if !kind.can_contain_children() && !subtree.children.is_empty() {
            return Err(DocumentError::CannotHaveChildren(key));
        }
        for child in &subtree.children {
            self.validate_subtree(child, seen)?;
        }
        Ok(())
    }

    fn attach(&mut self, subtree: &SerializedNode, parent: NodeKey) -> DocumentResult<NodeKey> {
        let key = subtree.key.ok_or(DocumentError::MissingKey)?;
        let mut node = Node::new(key, subtree.to_kind()?);
        node.parent = Some(parent);
        self.nodes.insert(key, node);
        if key.site() == self.site && key.clock() > self.clock {
            self.clock = key.clock();
        }

        let mut children = Vec::with_capacity(subtree.children.len());
        for child in &subtree.children {
            children.push(self.attach(child, key)?);
        }
        if let Some(node) = self.nodes.get_mut(&key) {
            node.children = children;
        }
        Ok(key)
    }

    /// Detach and drop a subtree, returning it serialized with keys so it
    /// can be re-inserted unchanged.
    pub fn remove_subtree(&mut self, key: NodeKey) -> DocumentResult<SerializedNode> {
        if key == ROOT_KEY {
            return Err(DocumentError::DetachRoot);
        }
        let snapshot = self.export_subtree(key, true)?;
        let parent = self.node(key)?.parent.ok_or(DocumentError::ParentNotFound(key))?;

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|child| *child != key);
        }
        for removed in self.preorder(key) {
            self.nodes.remove(&removed);
        }
        Ok(snapshot)
    }

    /// Move `key` under `new_parent` at `index` (clamped after detaching).
    /// Returns the old parent and index.
    pub fn move_node(
        &mut self,
        key: NodeKey,
        new_parent: NodeKey,
        index: usize,
    ) -> DocumentResult<(NodeKey, usize)> {
        if key == ROOT_KEY {
            return Err(DocumentError::DetachRoot);
        }
        let old_parent = self.node(key)?.parent.ok_or(DocumentError::ParentNotFound(key))?;
        let target = self.node(new_parent)?;
        if !target.kind.can_contain_children() {
            return Err(DocumentError::CannotHaveChildren(new_parent));
        }
        if self.is_ancestor_or_self(key, new_parent) {
            return Err(DocumentError::CycleDetected(key));
        }

        let old_index = self
            .index_in_parent(key)
            .ok_or(DocumentError::ParentNotFound(key))?;
        if let Some(parent_node) = self.nodes.get_mut(&old_parent) {
            parent_node.children.remove(old_index);
        }
        let target = self
            .nodes
            .get_mut(&new_parent)
            .ok_or(DocumentError::ParentNotFound(new_parent))?;
        let index = index.min(target.children.len());
        target.children.insert(index, key);
        if let Some(node) = self.nodes.get_mut(&key) {
            node.parent = Some(new_parent);
        }
        Ok((old_parent, old_index))
    }

    /// Replace the content of a text node, returning the old content
    pub fn set_text(&mut self, key: NodeKey, text: impl Into<String>) -> DocumentResult<String> {
        let node = self
            .nodes
            .get_mut(&key)
            .ok_or(DocumentError::NodeNotFound(key))?;
        match &mut node.kind {
            NodeKind::Text(current) => Ok(std::mem::replace(current, text.into())),
            _ => Err(DocumentError::NotText(key)),
        }
    }

    /// Serialize a subtree, optionally carrying node keys
    pub fn export_subtree(&self, key: NodeKey, with_keys: bool) -> DocumentResult<SerializedNode> {
        let node = self.node(key)?;
        let mut serialized = SerializedNode::from_kind(&node.kind);
        if with_keys {
            serialized.key = Some(key);
        }
        for child in &node.children {
            serialized.children.push(self.export_subtree(*child, with_keys)?);
        }
        Ok(serialized)
    }

    /// Structural consistency check used by tests and debug assertions
    pub fn check_integrity(&self) -> DocumentResult<()> {
        let mut reachable = 0;
        for key in self.preorder(ROOT_KEY) {
            reachable += 1;
            let node = self.node(key)?;
            for child in &node.children {
                let child_node = self.node(*child)?;
                if child_node.parent != Some(key) {
                    return Err(DocumentError::ParentNotFound(*child));
                }
            }
            if !node.kind.can_contain_children() && !node.children.is_empty() {
                return Err(DocumentError::CannotHaveChildren(key));
            }
        }
        if reachable != self.nodes.len() {
            return Err(DocumentError::InvalidNode(format!(
                "{} detached nodes in arena",
                self.nodes.len() - reachable
            )));
        }
        Ok(())
    }
}

/// Iterator over strict ancestors, nearest first
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeKey>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

/// Character length of a string
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split a string at a character offset (clamped)
pub fn split_at_char(text: &str, offset: usize) -> (&str, &str) {
    let byte = text
        .char_indices()
        .nth(offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text.split_at(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_paragraphs_builds_text_leaves() {
        let doc = Document::from_paragraphs(1, &["hello", "world"]);
        assert_eq!(doc.paragraphs().len(), 2);
        assert_eq!(doc.plain_text(), "hello\nworld");
        doc.check_integrity().unwrap();
    }

    #[test]
    fn test_remove_and_reinsert_subtree_keeps_keys() {
        let mut doc = Document::from_paragraphs(1, &["a", "b"]);
        let first = doc.paragraph(0).unwrap();
        let text = doc.children(first)[0];

        let removed = doc.remove_subtree(first).unwrap();
        assert!(!doc.contains(text));
        assert_eq!(doc.plain_text(), "b");

        doc.insert_subtree(ROOT_KEY, 0, &removed).unwrap();
        assert_eq!(doc.children(first), &[text]);
        assert_eq!(doc.plain_text(), "a\nb");
        doc.check_integrity().unwrap();
    }

    #[test]
    fn test_insert_rejects_duplicate_keys() {
        let mut doc = Document::from_paragraphs(1, &["a"]);
        let first = doc.paragraph(0).unwrap();
        let snapshot = doc.export_subtree(first, true).unwrap();

        let result = doc.insert_subtree(ROOT_KEY, 1, &snapshot);
        assert_eq!(result, Err(DocumentError::DuplicateKey(first)));
    }

    #[test]
    fn test_move_node_detects_cycles() {
        let mut doc = Document::from_paragraphs(1, &["a"]);
        let paragraph = doc.paragraph(0).unwrap();
        let text = doc.children(paragraph)[0];

        assert_eq!(
            doc.move_node(paragraph, paragraph, 0),
            Err(DocumentError::CycleDetected(paragraph))
        );
        assert_eq!(
            doc.move_node(paragraph, text, 0),
            Err(DocumentError::CannotHaveChildren(text))
        );
    }

    #[test]
    fn test_move_node_reports_origin() {
        let mut doc = Document::from_paragraphs(1, &["a", "b"]);
        let first = doc.paragraph(0).unwrap();
        let second = doc.paragraph(1).unwrap();
        let text = doc.children(first)[0];

        let (old_parent, old_index) = doc.move_node(text, second, 5).unwrap();
        assert_eq!((old_parent, old_index), (first, 0));
        assert_eq!(doc.text_content(second), "ba");
    }

    #[test]
    fn test_fork_allocates_on_new_site() {
        let doc = Document::from_paragraphs(1, &["a"]);
        let mut peer = doc.fork(2);
        let key = peer.allocate_key();
        assert_eq!(key.site(), 2);
        assert!(!doc.contains(key));
    }

    #[test]
    fn test_split_at_char_handles_multibyte() {
        assert_eq!(split_at_char("héllo", 2), ("hé", "llo"));
        assert_eq!(split_at_char("abc", 10), ("abc", ""));
    }
}
