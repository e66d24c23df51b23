//! # Transactions
//!
//! Every change to the editor state happens inside a `Transaction`. It
//! records each applied mutation together with its inverse, so a failure
//! midway can be rolled back and a committed transaction becomes one undo
//! entry.
//!
//! Selections are repaired as mutations land: removing the node under a
//! point moves it to the nearest surviving text position, shrinking a text
//! node clamps offsets into it.

use crate::commands::Command;
use crate::errors::EditorError;
use crate::mutations::Mutation;
use crate::threads::ThreadEvent;
use crate::undo_stack::MutationBatch;
use redline_document::{
    char_len, split_at_char, Document, NodeKey, NodeKind, Point, Selection, SerializedNode,
    SuggestionMeta, WrapperKind,
};
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

/// Fold this transaction into the previous undo entry
pub const HISTORY_MERGE_TAG: &str = "history-merge";
/// Applied on behalf of a remote peer
pub const COLLABORATION_TAG: &str = "collaboration";
/// Produced by the suggested-edits handlers themselves
pub const SUGGESTED_EDITS_TAG: &str = "suggested-edits";
/// Undo or redo replay
pub const HISTORIC_TAG: &str = "historic";

/// Document plus selection, owned by the editor
#[derive(Debug, Clone)]
pub struct EditorState {
    pub document: Document,
    pub selection: Option<Selection>,
}

impl EditorState {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            selection: None,
        }
    }
}

/// Everything a finished transaction hands to the commit step
#[derive(Debug, Default)]
pub(crate) struct TransactionRecord {
    pub tags: BTreeSet<String>,
    pub batch: MutationBatch,
    pub events: Vec<ThreadEvent>,
    pub deferred: Vec<Command>,
    pub created: Vec<NodeKey>,
    pub text_updates: Vec<(NodeKey, String)>,
}

pub struct Transaction<'a> {
    state: &'a mut EditorState,
    tags: BTreeSet<String>,
    batch: MutationBatch,
    events: Vec<ThreadEvent>,
    deferred: Vec<Command>,
    /// Roots of subtrees inserted by this transaction
    created: Vec<NodeKey>,
    /// Every key inside those subtrees
    created_keys: HashSet<NodeKey>,
    /// First pre-transaction text of each pre-existing text node changed
    text_updates: Vec<(NodeKey, String)>,
    base_version: u64,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(state: &'a mut EditorState, base_version: u64) -> Self {
        let batch = MutationBatch {
            selection_before: state.selection,
            ..MutationBatch::default()
        };
        Self {
            state,
            tags: BTreeSet::new(),
            batch,
            events: Vec::new(),
            deferred: Vec::new(),
            created: Vec::new(),
            created_keys: HashSet::new(),
            text_updates: Vec::new(),
            base_version,
        }
    }

    pub fn document(&self) -> &Document {
        &self.state.document
    }

    pub fn selection(&self) -> Option<Selection> {
        self.state.selection
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.state.selection = selection;
    }

    pub fn set_caret(&mut self, point: Point) {
        self.state.selection = Some(Selection::caret(point));
    }

    /// Editor version this transaction started from
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn is_remote(&self) -> bool {
        crate::collaboration::is_remote(&self.tags)
    }

    pub fn is_historic(&self) -> bool {
        self.has_tag(HISTORIC_TAG)
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.batch.description = Some(description.into());
    }

    /// Queue a thread event; delivered after commit
    pub fn emit(&mut self, event: ThreadEvent) {
        self.events.push(event);
    }

    /// Queue a command; dispatched after commit
    pub fn defer(&mut self, command: Command) {
        self.deferred.push(command);
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.batch.mutations
    }

    pub fn allocate_key(&mut self) -> NodeKey {
        self.state.document.allocate_key()
    }

    // ------------------------------------------------------------------
    // Mutation primitives
    // ------------------------------------------------------------------

    /// Apply a mutation, record its inverse and repair the selection
    pub fn apply(&mut self, mutation: Mutation) -> Result<(), EditorError> {
        self.apply_tracked(mutation, true)
    }

    /// `tracked = false` hides the change from post-effects (used for
    /// splits, which move text without changing it)
    fn apply_tracked(&mut self, mutation: Mutation, tracked: bool) -> Result<(), EditorError> {
        let inverse = mutation.to_inverse(&self.state.document)?;

        let relocated = match &mutation {
            Mutation::RemoveNode { key } => Some(self.relocate_selection(*key)),
            _ => None,
        };
        let old_text = match &mutation {
            Mutation::SetText { key, .. } if tracked && !self.created_keys.contains(key) => {
                self.state.document.text(*key).map(str::to_string)
            }
            _ => None,
        };

        mutation.apply(&mut self.state.document)?;

        match &mutation {
            Mutation::InsertSubtree { node, .. } if tracked => {
                if let Some(root) = node.key {
                    self.created.push(root);
                }
                self.created_keys.extend(node.keys());
            }
            Mutation::RemoveNode { .. } => {
                if let Some(selection) = relocated {
                    self.state.selection = selection;
                }
            }
            Mutation::SetText { key, .. } => {
                if let Some(old) = old_text {
                    if !self.text_updates.iter().any(|(k, _)| k == key) {
                        self.text_updates.push((*key, old));
                    }
                }
                self.clamp_selection(*key);
            }
            _ => {}
        }

        self.batch.push(mutation, inverse);
        Ok(())
    }

    fn relocate_selection(&self, removed: NodeKey) -> Option<Selection> {
        let selection = self.state.selection?;
        let doc = &self.state.document;
        let anchor = doc.relocate_point(selection.anchor, removed)?;
        let focus = doc.relocate_point(selection.focus, removed)?;
        Some(Selection::new(anchor, focus))
    }

    fn clamp_selection(&mut self, key: NodeKey) {
        let len = self.state.document.text_len(key);
        if let Some(selection) = &mut self.state.selection {
            for point in [&mut selection.anchor, &mut selection.focus] {
                if point.key == key && point.offset > len {
                    point.offset = len;
                }
            }
        }
    }

    pub fn insert(
        &mut self,
        parent: NodeKey,
        index: usize,
        node: SerializedNode,
    ) -> Result<NodeKey, EditorError> {
        let key = node.key.ok_or(redline_document::DocumentError::MissingKey)?;
        self.apply(Mutation::InsertSubtree {
            parent,
            index,
            node,
        })?;
        Ok(key)
    }

    pub fn insert_text(
        &mut self,
        parent: NodeKey,
        index: usize,
        text: impl Into<String>,
    ) -> Result<NodeKey, EditorError> {
        let key = self.allocate_key();
        self.insert(parent, index, SerializedNode::text(key, text))
    }

    /// New paragraph holding one empty text node; returns `(paragraph, text)`
    pub fn insert_paragraph(
        &mut self,
        parent: NodeKey,
        index: usize,
    ) -> Result<(NodeKey, NodeKey), EditorError> {
        let paragraph = self.allocate_key();
        let text = self.allocate_key();
        let node = SerializedNode::paragraph(paragraph, vec![SerializedNode::text(text, "")]);
        self.insert(parent, index, node)?;
        Ok((paragraph, text))
    }

    /// Empty wrapper at `parent[index]`
    pub fn insert_wrapper(
        &mut self,
        parent: NodeKey,
        index: usize,
        kind: WrapperKind,
        meta: SuggestionMeta,
    ) -> Result<NodeKey, EditorError> {
        let key = self.allocate_key();
        self.insert(parent, index, SerializedNode::wrapper(key, kind, meta, Vec::new()))
    }

    pub fn remove(&mut self, key: NodeKey) -> Result<(), EditorError> {
        self.apply(Mutation::RemoveNode { key })
    }

    pub fn move_node(
        &mut self,
        key: NodeKey,
        new_parent: NodeKey,
        index: usize,
    ) -> Result<(), EditorError> {
        self.apply(Mutation::MoveNode {
            key,
            new_parent,
            index,
        })
    }

    pub fn set_text(&mut self, key: NodeKey, text: impl Into<String>) -> Result<(), EditorError> {
        self.apply(Mutation::SetText {
            key,
            text: text.into(),
        })
    }

    /// Split a text node at a character offset.
    ///
    /// Returns the node that now starts at `offset`: `key` itself for offset
    /// 0, `None` at the end of the text, otherwise a new sibling holding the
    /// tail. Points past the split move into the tail.
    pub fn split_text(&mut self, key: NodeKey, offset: usize) -> Result<Option<NodeKey>, EditorError> {
        let text = self
            .state
            .document
            .text(key)
            .ok_or(redline_document::DocumentError::NotText(key))?
            .to_string();
        if offset == 0 {
            return Ok(Some(key));
        }
        if offset >= char_len(&text) {
            return Ok(None);
        }

        let (head, tail) = split_at_char(&text, offset);
        let parent = self
            .state
            .document
            .parent(key)
            .ok_or(redline_document::DocumentError::ParentNotFound(key))?;
        let index = self
            .state
            .document
            .index_in_parent(key)
            .ok_or(redline_document::DocumentError::ParentNotFound(key))?;
        let tail_key = self.allocate_key();

        self.apply_tracked(
            Mutation::SetText {
                key,
                text: head.to_string(),
            },
            false,
        )?;
        self.apply_tracked(
            Mutation::InsertSubtree {
                parent,
                index: index + 1,
                node: SerializedNode::text(tail_key, tail),
            },
            false,
        )?;

        if let Some(selection) = &mut self.state.selection {
            for point in [&mut selection.anchor, &mut selection.focus] {
                if point.key == key && point.offset > offset {
                    *point = Point::new(tail_key, point.offset - offset);
                }
            }
        }
        Ok(Some(tail_key))
    }

    /// Type `text` at a point inside a text node; returns the caret after it
    pub fn insert_at_point(&mut self, point: Point, text: &str) -> Result<Point, EditorError> {
        let current = self
            .state
            .document
            .text(point.key)
            .ok_or(redline_document::DocumentError::NotText(point.key))?
            .to_string();
        let (head, tail) = split_at_char(&current, point.offset);
        self.set_text(point.key, format!("{head}{text}{tail}"))?;
        Ok(Point::new(point.key, char_len(head) + char_len(text)))
    }

    // ------------------------------------------------------------------
    // Range extraction
    // ------------------------------------------------------------------

    /// Isolate the content between `start` and `end` as whole nodes.
    ///
    /// Text nodes are split at the boundaries (end first, then start). The
    /// covered leaves, minus empty ones and those matching `skip`, are
    /// lifted to their maximal fully covered ancestor. The root is never
    /// returned and a block is only lifted to when the range crosses its
    /// boundary. The result is in document order without nested duplicates.
    pub fn extract(
        &mut self,
        start: Point,
        end: Point,
        skip: &dyn Fn(&Document, NodeKey) -> bool,
    ) -> Result<Vec<NodeKey>, EditorError> {
        let end_tail = self.split_text(end.key, end.offset)?;
        let start_node = self.split_text(start.key, start.offset)?;

        let doc = &self.state.document;
        let leaves = doc.text_leaves(doc.root());
        let position = |key: NodeKey| leaves.iter().position(|leaf| *leaf == key);

        let first = match start_node {
            Some(key) => position(key),
            None => position(start.key).map(|p| p + 1),
        };
        // An end at the very end of the node that was then split at the
        // start now lives in the start split's tail.
        let end_node = match start_node {
            Some(tail) if start.key == end.key && tail != start.key => tail,
            _ => end.key,
        };
        let last_exclusive = match end_tail {
            Some(key) => position(key),
            None => position(end_node).map(|p| p + 1),
        };
        let (Some(first), Some(last_exclusive)) = (first, last_exclusive) else {
            return Ok(Vec::new());
        };
        if first >= last_exclusive {
            return Ok(Vec::new());
        }

        let covered: HashSet<NodeKey> = leaves[first..last_exclusive].iter().copied().collect();
        let fully_covered = |node: NodeKey| {
            doc.text_leaves(node)
                .iter()
                .all(|leaf| covered.contains(leaf) || doc.text_len(*leaf) == 0)
        };
        let crosses = |block: NodeKey| {
            covered
                .iter()
                .any(|leaf| !doc.is_ancestor_or_self(block, *leaf))
        };

        let mut nodes: Vec<NodeKey> = Vec::new();
        for leaf in &leaves[first..last_exclusive] {
            if doc.text_len(*leaf) == 0 || skip(doc, *leaf) {
                continue;
            }
            let mut node = *leaf;
            while let Some(parent) = doc.parent(node) {
                if parent == doc.root() || !fully_covered(parent) {
                    break;
                }
                let is_block = doc.kind(parent).is_some_and(NodeKind::is_block);
                if is_block && !crosses(parent) {
                    break;
                }
                node = parent;
            }
            if nodes.last() != Some(&node) {
                nodes.push(node);
            }
        }

        let lifted: HashSet<NodeKey> = nodes.iter().copied().collect();
        nodes.retain(|node| !doc.ancestors(*node).any(|a| lifted.contains(&a)));
        nodes.dedup();
        Ok(nodes)
    }

    /// A stable caret position just before `key`.
    ///
    /// For inline nodes this is the end of the previous text sibling, or a
    /// new empty text node inserted before `key`. For blocks it is the end
    /// of the previous text leaf in document order, falling back to the
    /// first text after the block.
    pub fn caret_before(&mut self, key: NodeKey) -> Result<Option<Point>, EditorError> {
        let doc = &self.state.document;
        let Some(kind) = doc.kind(key) else {
            return Ok(None);
        };

        if kind.is_inline() {
            if let Some(previous) = doc.previous_sibling(key) {
                if doc.is_text(previous) {
                    return Ok(Some(Point::new(previous, doc.text_len(previous))));
                }
            }
            let parent = doc
                .parent(key)
                .ok_or(redline_document::DocumentError::ParentNotFound(key))?;
            let index = doc
                .index_in_parent(key)
                .ok_or(redline_document::DocumentError::ParentNotFound(key))?;
            let holder = self.insert_text(parent, index, "")?;
            return Ok(Some(Point::new(holder, 0)));
        }

        if let Some(previous) = doc.previous_text_leaf(key) {
            return Ok(Some(Point::new(previous, doc.text_len(previous))));
        }
        Ok(doc.next_text_leaf(key).map(|next| Point::new(next, 0)))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Undo everything applied so far and restore the original selection
    pub(crate) fn rollback(self) {
        for inverse in self.batch.undo_steps() {
            if let Err(error) = inverse.apply(&mut self.state.document) {
                warn!(%error, "rollback step failed");
            }
        }
        self.state.selection = self.batch.selection_before;
    }

    pub(crate) fn finish(mut self) -> TransactionRecord {
        self.batch.selection_after = self.state.selection;
        TransactionRecord {
            tags: self.tags,
            batch: self.batch,
            events: self.events,
            deferred: self.deferred,
            created: self.created,
            text_updates: self.text_updates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(paragraphs: &[&str]) -> EditorState {
        EditorState::new(Document::from_paragraphs(1, paragraphs))
    }

    fn leaf(doc: &Document, paragraph: usize) -> NodeKey {
        doc.text_leaves(doc.paragraph(paragraph).unwrap())[0]
    }

    fn no_skip(_: &Document, _: NodeKey) -> bool {
        false
    }

    #[test]
    fn test_split_text_moves_trailing_points() {
        let mut state = state(&["hello"]);
        let text = leaf(&state.document, 0);
        state.selection = Some(Selection::caret(Point::new(text, 4)));

        let mut txn = Transaction::new(&mut state, 0);
        let tail = txn.split_text(text, 2).unwrap().unwrap();
        assert_eq!(txn.document().text(text), Some("he"));
        assert_eq!(txn.document().text(tail), Some("llo"));
        assert_eq!(txn.selection().unwrap().focus, Point::new(tail, 2));

        assert_eq!(txn.split_text(text, 0).unwrap(), Some(text));
        assert_eq!(txn.split_text(text, 2).unwrap(), None);
    }

    #[test]
    fn test_rollback_restores_tree_and_selection() {
        let mut state = state(&["abc", "def"]);
        let before = state.document.plain_text();
        let text = leaf(&state.document, 0);
        let selection = Some(Selection::caret(Point::new(text, 1)));
        state.selection = selection;

        let mut txn = Transaction::new(&mut state, 0);
        txn.split_text(text, 1).unwrap();
        let second = txn.document().paragraph(1).unwrap();
        txn.remove(second).unwrap();
        txn.set_text(text, "zzz").unwrap();
        txn.rollback();

        assert_eq!(state.document.plain_text(), before);
        assert_eq!(state.selection, selection);
        state.document.check_integrity().unwrap();
    }

    #[test]
    fn test_extract_within_one_text_node() {
        let mut state = state(&["hello"]);
        let text = leaf(&state.document, 0);

        let mut txn = Transaction::new(&mut state, 0);
        let nodes = txn
            .extract(Point::new(text, 1), Point::new(text, 4), &no_skip)
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(txn.document().text(nodes[0]), Some("ell"));
    }

    #[test]
    fn test_extract_up_to_end_of_text() {
        let mut state = state(&["abc"]);
        let text = leaf(&state.document, 0);

        let mut txn = Transaction::new(&mut state, 0);
        let nodes = txn
            .extract(Point::new(text, 2), Point::new(text, 3), &no_skip)
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(txn.document().text(nodes[0]), Some("c"));
        assert_eq!(txn.document().text(text), Some("ab"));
    }

    #[test]
    fn test_extract_lifts_whole_paragraphs_only_when_crossing() {
        let mut state = state(&["ab", "cd", "ef"]);
        let first = leaf(&state.document, 0);
        let third = leaf(&state.document, 2);
        let middle = state.document.paragraph(1).unwrap();

        let mut txn = Transaction::new(&mut state, 0);
        let nodes = txn
            .extract(Point::new(first, 1), Point::new(third, 1), &no_skip)
            .unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1], middle);
        assert_eq!(txn.document().text(nodes[0]), Some("b"));
        assert_eq!(txn.document().text(nodes[2]), Some("e"));
    }

    #[test]
    fn test_removal_relocates_selection() {
        let mut state = state(&["ab", "cd"]);
        let first = leaf(&state.document, 0);
        let second = leaf(&state.document, 1);
        state.selection = Some(Selection::caret(Point::new(second, 1)));

        let mut txn = Transaction::new(&mut state, 0);
        let paragraph = txn.document().paragraph(1).unwrap();
        txn.remove(paragraph).unwrap();
        assert_eq!(txn.selection().unwrap().focus, Point::new(first, 2));
    }

    #[test]
    fn test_created_and_text_updates_are_tracked() {
        let mut state = state(&["ab"]);
        let text = leaf(&state.document, 0);
        let paragraph = state.document.paragraph(0).unwrap();

        let mut txn = Transaction::new(&mut state, 0);
        txn.split_text(text, 1).unwrap();
        let added = txn.insert_text(paragraph, 0, "new").unwrap();
        txn.set_text(added, "newer").unwrap();
        txn.set_text(text, "A").unwrap();
        txn.set_text(text, "AA").unwrap();
        let record = txn.finish();

        assert_eq!(record.created, vec![added]);
        assert_eq!(record.text_updates, vec![(text, "a".to_string())]);
        assert_eq!(record.batch.len(), 5);
    }
}
