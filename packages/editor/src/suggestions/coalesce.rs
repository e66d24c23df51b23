//! Coalescing and nesting policy for deletions.
//!
//! Consecutive deletions by one author merge into one wrapper as long as
//! nothing else committed in between. Content inside the author's own
//! pending insertion is removed instead of being marked. A new deletion
//! spanning an existing one swallows it when both have the same author and
//! nests it otherwise.

use super::query;
use super::wrap::{Placement, WrapperFactory};
use redline_document::{Document, NodeKey, SuggestionMeta, WrapperKind};

/// The deletion run the next delete may continue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRun {
    pub suggestion_id: String,
    pub author_id: String,
    /// Editor version right after the run's last transaction committed
    pub version: u64,
}

#[derive(Debug)]
pub struct DeletionFactory {
    meta: SuggestionMeta,
    author_id: String,
    run: Option<DeletionRun>,
    continued: Option<String>,
}

impl DeletionFactory {
    /// `run` is only passed when it is eligible for continuation
    pub fn new(meta: SuggestionMeta, run: Option<DeletionRun>) -> Self {
        Self {
            author_id: meta.author_user_id.clone(),
            meta,
            run,
            continued: None,
        }
    }

    /// Id of the run that absorbed at least one node, if any
    pub fn continued_id(&self) -> Option<&str> {
        self.continued.as_deref()
    }

    pub fn meta(&self) -> &SuggestionMeta {
        &self.meta
    }
}

impl WrapperFactory for DeletionFactory {
    fn keep(&mut self, doc: &Document, node: NodeKey) -> bool {
        query::own_insertion(doc, node, &self.author_id).is_none()
    }

    fn place(&mut self, doc: &Document, run: &[NodeKey], inline: bool) -> Placement {
        if let Some(active) = &self.run {
            let id = active.suggestion_id.as_str();
            if let Some(first) = run.first() {
                if let Some(wrapper) = adjacent_wrapper(doc, *first, id, inline, Side::Before) {
                    self.continued = Some(id.to_string());
                    return Placement::Append(wrapper);
                }
            }
            if let Some(last) = run.last() {
                if let Some(wrapper) = adjacent_wrapper(doc, *last, id, inline, Side::After) {
                    self.continued = Some(id.to_string());
                    return Placement::Prepend(wrapper);
                }
            }
        }
        Placement::New(WrapperKind::deletion(inline), self.meta.clone())
    }

    fn bridges_deletions(&self) -> bool {
        true
    }

    fn absorbs(&self, doc: &Document, wrapper: NodeKey) -> bool {
        query::wrapper_kind(doc, wrapper).is_some_and(|kind| kind.is_deletion())
            && query::is_authored_by(doc, wrapper, &self.author_id)
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Before,
    After,
}

/// Deletion wrapper of `suggestion_id` next to `node`, skipping empty text
fn adjacent_wrapper(
    doc: &Document,
    node: NodeKey,
    suggestion_id: &str,
    inline: bool,
    side: Side,
) -> Option<NodeKey> {
    let step = |key: NodeKey| match side {
        Side::Before => doc.previous_sibling(key),
        Side::After => doc.next_sibling(key),
    };

    let mut current = step(node);
    while let Some(sibling) = current {
        if doc.is_text(sibling) && doc.text_len(sibling) == 0 {
            current = step(sibling);
            continue;
        }
        let kind = query::wrapper_kind(doc, sibling)?;
        let matches = kind.is_deletion()
            && kind.is_inline() == inline
            && query::suggestion_id(doc, sibling) == Some(suggestion_id);
        return matches.then_some(sibling);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_document::{Author, SerializedNode};

    #[test]
    fn test_adjacent_wrapper_skips_empty_text() {
        let mut doc = Document::from_paragraphs(1, &["ab"]);
        let paragraph = doc.paragraph(0).unwrap();
        let text = doc.children(paragraph)[0];

        let wrapper = doc.allocate_key();
        let inner = doc.allocate_key();
        let meta = SuggestionMeta::new("run", &Author::new("u1", "Ada"), 0);
        let node = SerializedNode::wrapper(
            wrapper,
            WrapperKind::DeletionInline,
            meta,
            vec![SerializedNode::text(inner, "c")],
        );
        doc.insert_subtree(paragraph, 0, &node).unwrap();
        let empty = doc.allocate_key();
        doc.insert_subtree(paragraph, 1, &SerializedNode::text(empty, ""))
            .unwrap();

        assert_eq!(
            adjacent_wrapper(&doc, text, "run", true, Side::Before),
            Some(wrapper)
        );
        assert_eq!(adjacent_wrapper(&doc, text, "other", true, Side::Before), None);
        assert_eq!(adjacent_wrapper(&doc, text, "run", false, Side::Before), None);
        assert_eq!(adjacent_wrapper(&doc, text, "run", true, Side::After), None);
    }

    #[test]
    fn test_factory_removes_own_insertions_only() {
        let mut doc = Document::from_paragraphs(1, &[""]);
        let paragraph = doc.paragraph(0).unwrap();
        let wrapper = doc.allocate_key();
        let text = doc.allocate_key();
        let meta = SuggestionMeta::new("s", &Author::new("alice", "Alice"), 0);
        let node = SerializedNode::wrapper(
            wrapper,
            WrapperKind::InsertionInline,
            meta,
            vec![SerializedNode::text(text, "x")],
        );
        doc.insert_subtree(paragraph, 0, &node).unwrap();

        let mut alice = DeletionFactory::new(
            SuggestionMeta::new("d", &Author::new("alice", "Alice"), 0),
            None,
        );
        let mut bob = DeletionFactory::new(
            SuggestionMeta::new("d", &Author::new("bob", "Bob"), 0),
            None,
        );
        assert!(!alice.keep(&doc, text));
        assert!(bob.keep(&doc, text));
        assert_eq!(
            bob.place(&doc, &[text], true),
            Placement::New(WrapperKind::DeletionInline, bob.meta().clone())
        );
        assert_eq!(bob.continued_id(), None);
    }

    #[test]
    fn test_factory_absorbs_own_deletions_only() {
        let mut doc = Document::from_paragraphs(1, &[""]);
        let paragraph = doc.paragraph(0).unwrap();
        let wrapper = doc.allocate_key();
        let text = doc.allocate_key();
        let meta = SuggestionMeta::new("old", &Author::new("alice", "Alice"), 0);
        let node = SerializedNode::wrapper(
            wrapper,
            WrapperKind::DeletionInline,
            meta,
            vec![SerializedNode::text(text, "x")],
        );
        doc.insert_subtree(paragraph, 0, &node).unwrap();

        let alice = DeletionFactory::new(
            SuggestionMeta::new("d", &Author::new("alice", "Alice"), 0),
            None,
        );
        let bob = DeletionFactory::new(
            SuggestionMeta::new("d", &Author::new("bob", "Bob"), 0),
            None,
        );
        assert!(alice.bridges_deletions());
        assert!(alice.absorbs(&doc, wrapper));
        assert!(!alice.absorbs(&doc, text));
        assert!(!bob.absorbs(&doc, wrapper));
    }
}
