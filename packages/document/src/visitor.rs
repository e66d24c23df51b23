use crate::node::{NodeKey, NodeKind, SuggestionMeta, WrapperKind};
use crate::tree::Document;

/// Visitor pattern for traversing the document tree
///
/// This trait provides default implementations that walk the entire tree.
/// Override specific visit_* methods to perform custom actions on nodes.
pub trait Visitor: Sized {
    fn visit_document(&mut self, doc: &Document) {
        walk_children(self, doc, doc.root());
    }

    fn visit_node(&mut self, doc: &Document, key: NodeKey) {
        walk_node(self, doc, key);
    }

    fn visit_paragraph(&mut self, doc: &Document, key: NodeKey) {
        walk_children(self, doc, key);
    }

    fn visit_text(&mut self, _doc: &Document, _key: NodeKey, _text: &str) {
        // Leaf node, no children to walk
    }

    fn visit_suggestion(
        &mut self,
        doc: &Document,
        key: NodeKey,
        _kind: WrapperKind,
        _meta: &SuggestionMeta,
    ) {
        walk_children(self, doc, key);
    }
}

pub fn walk_node<V: Visitor>(visitor: &mut V, doc: &Document, key: NodeKey) {
    match doc.kind(key) {
        Some(NodeKind::Root) => walk_children(visitor, doc, key),
        Some(NodeKind::Paragraph) => visitor.visit_paragraph(doc, key),
        Some(NodeKind::Text(text)) => visitor.visit_text(doc, key, text),
        Some(NodeKind::Suggestion { kind, meta }) => {
            visitor.visit_suggestion(doc, key, *kind, meta)
        }
        None => {
            // Detached key, nothing to walk
        }
    }
}

pub fn walk_children<V: Visitor>(visitor: &mut V, doc: &Document, key: NodeKey) {
    for child in doc.children(key) {
        visitor.visit_node(doc, *child);
    }
}

/// Collects every wrapper in document order
#[derive(Debug, Default)]
pub struct WrapperCollector {
    pub wrappers: Vec<(NodeKey, WrapperKind, SuggestionMeta)>,
}

impl Visitor for WrapperCollector {
    fn visit_suggestion(
        &mut self,
        doc: &Document,
        key: NodeKey,
        kind: WrapperKind,
        meta: &SuggestionMeta,
    ) {
        self.wrappers.push((key, kind, meta.clone()));
        walk_children(self, doc, key);
    }
}

impl Document {
    /// All wrappers in document order
    pub fn wrappers(&self) -> Vec<(NodeKey, WrapperKind, SuggestionMeta)> {
        let mut collector = WrapperCollector::default();
        collector.visit_document(self);
        collector.wrappers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Author;
    use crate::serializer::SerializedNode;

    struct TextCounter(usize);

    impl Visitor for TextCounter {
        fn visit_text(&mut self, _doc: &Document, _key: NodeKey, text: &str) {
            self.0 += text.chars().count();
        }
    }

    #[test]
    fn test_visitor_walks_through_wrappers() {
        let mut doc = Document::from_paragraphs(1, &["ab"]);
        let paragraph = doc.paragraph(0).unwrap();
        let meta = SuggestionMeta::new("s1", &Author::new("u1", "Ada"), 0);
        let wrapper_key = doc.allocate_key();
        let text_key = doc.allocate_key();
        let wrapper = SerializedNode::wrapper(
            wrapper_key,
            WrapperKind::InsertionInline,
            meta,
            vec![SerializedNode::text(text_key, "cd")],
        );
        doc.insert_subtree(paragraph, 1, &wrapper).unwrap();

        let mut counter = TextCounter(0);
        counter.visit_document(&doc);
        assert_eq!(counter.0, 4);

        let wrappers = doc.wrappers();
        assert_eq!(wrappers.len(), 1);
        assert_eq!(wrappers[0].0, wrapper_key);
    }
}
