//! Suggestion query layer.
//!
//! Everything here re-traverses the tree; there is no side index from
//! suggestion id to nodes.

use redline_document::{Document, NodeKey, SuggestionMeta, Visitor, WrapperKind};
use std::collections::BTreeMap;

/// Wrappers belonging to one suggestion id, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionNodes {
    pub insertions: Vec<NodeKey>,
    pub deletions: Vec<NodeKey>,
}

impl SuggestionNodes {
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.deletions.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.insertions.iter().chain(self.deletions.iter()).copied()
    }
}

fn wrapper_of(doc: &Document, key: NodeKey) -> Option<(WrapperKind, &SuggestionMeta)> {
    doc.kind(key).and_then(|kind| kind.wrapper())
}

/// Nearest wrapper at or above `key`
pub fn nearest_wrapper(doc: &Document, key: NodeKey) -> Option<NodeKey> {
    std::iter::once(key)
        .chain(doc.ancestors(key))
        .find(|k| wrapper_of(doc, *k).is_some())
}

/// Nearest insertion wrapper at or above `key`
pub fn nearest_insertion(doc: &Document, key: NodeKey) -> Option<NodeKey> {
    std::iter::once(key)
        .chain(doc.ancestors(key))
        .find(|k| wrapper_of(doc, *k).is_some_and(|(kind, _)| kind.is_insertion()))
}

/// The nearest insertion at or above `key`, if `author_id` wrote it.
/// Authorship is decided by the nearest insertion only.
pub fn own_insertion(doc: &Document, key: NodeKey, author_id: &str) -> Option<NodeKey> {
    nearest_insertion(doc, key).filter(|w| is_authored_by(doc, *w, author_id))
}

pub fn is_authored_by(doc: &Document, wrapper: NodeKey, author_id: &str) -> bool {
    wrapper_of(doc, wrapper).is_some_and(|(_, meta)| meta.is_authored_by(author_id))
}

/// Whether `key` sits inside (or is) a deletion wrapper
pub fn in_deletion(doc: &Document, key: NodeKey) -> bool {
    std::iter::once(key)
        .chain(doc.ancestors(key))
        .any(|k| wrapper_of(doc, k).is_some_and(|(kind, _)| kind.is_deletion()))
}

/// Skip predicate for movement and extraction in suggesting mode
pub fn skip_deleted(doc: &Document, key: NodeKey) -> bool {
    in_deletion(doc, key)
}

pub fn suggestion_id(doc: &Document, wrapper: NodeKey) -> Option<&str> {
    wrapper_of(doc, wrapper).map(|(_, meta)| meta.suggestion_id.as_str())
}

pub fn wrapper_kind(doc: &Document, key: NodeKey) -> Option<WrapperKind> {
    wrapper_of(doc, key).map(|(kind, _)| kind)
}

struct ById<'a> {
    suggestion_id: &'a str,
    nodes: SuggestionNodes,
}

impl Visitor for ById<'_> {
    fn visit_suggestion(
        &mut self,
        doc: &Document,
        key: NodeKey,
        kind: WrapperKind,
        meta: &SuggestionMeta,
    ) {
        if meta.suggestion_id == self.suggestion_id {
            if kind.is_insertion() {
                self.nodes.insertions.push(key);
            } else {
                self.nodes.deletions.push(key);
            }
        }
        redline_document::walk_children(self, doc, key);
    }
}

pub fn find_wrappers(doc: &Document, suggestion_id: &str) -> SuggestionNodes {
    let mut visitor = ById {
        suggestion_id,
        nodes: SuggestionNodes::default(),
    };
    visitor.visit_document(doc);
    visitor.nodes
}

/// Every live suggestion id with its wrappers
pub fn suggestions(doc: &Document) -> BTreeMap<String, SuggestionNodes> {
    let mut out: BTreeMap<String, SuggestionNodes> = BTreeMap::new();
    for (key, kind, meta) in doc.wrappers() {
        let entry = out.entry(meta.suggestion_id).or_default();
        if kind.is_insertion() {
            entry.insertions.push(key);
        } else {
            entry.deletions.push(key);
        }
    }
    out
}

/// Author of a suggestion (taken from its first wrapper)
pub fn suggestion_author(doc: &Document, suggestion_id: &str) -> Option<String> {
    find_wrappers(doc, suggestion_id)
        .all()
        .find_map(|w| wrapper_of(doc, w).map(|(_, meta)| meta.author_user_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_document::{Author, SerializedNode};

    fn wrap(doc: &mut Document, parent: NodeKey, kind: WrapperKind, id: &str, author: &str) -> (NodeKey, NodeKey) {
        let key = doc.allocate_key();
        let text = doc.allocate_key();
        let meta = SuggestionMeta::new(id, &Author::new(author, author), 0);
        let node = SerializedNode::wrapper(key, kind, meta, vec![SerializedNode::text(text, "t")]);
        doc.insert_subtree(parent, usize::MAX, &node).unwrap();
        (key, text)
    }

    #[test]
    fn test_nearest_insertion_decides_authorship() {
        let mut doc = Document::from_paragraphs(1, &["x"]);
        let paragraph = doc.paragraph(0).unwrap();
        let (outer, _) = wrap(&mut doc, paragraph, WrapperKind::InsertionInline, "a", "alice");
        let (inner, inner_text) = wrap(&mut doc, outer, WrapperKind::InsertionInline, "b", "bob");

        assert_eq!(nearest_insertion(&doc, inner_text), Some(inner));
        assert_eq!(own_insertion(&doc, inner_text, "bob"), Some(inner));
        assert_eq!(own_insertion(&doc, inner_text, "alice"), None);
    }

    #[test]
    fn test_find_wrappers_groups_by_kind() {
        let mut doc = Document::from_paragraphs(1, &["x"]);
        let paragraph = doc.paragraph(0).unwrap();
        let (deletion, deleted_text) = wrap(&mut doc, paragraph, WrapperKind::DeletionInline, "s", "u");
        let (insertion, _) = wrap(&mut doc, paragraph, WrapperKind::InsertionInline, "s", "u");

        let nodes = find_wrappers(&doc, "s");
        assert_eq!(nodes.insertions, vec![insertion]);
        assert_eq!(nodes.deletions, vec![deletion]);
        assert!(in_deletion(&doc, deleted_text));
        assert!(find_wrappers(&doc, "missing").is_empty());
        assert_eq!(suggestions(&doc).len(), 1);
        assert_eq!(suggestion_author(&doc, "s").as_deref(), Some("u"));
    }
}
