//! # Post-Effect System
//!
//! A committed transaction may leave the document in a state the suggestion
//! model does not allow: content typed around the interceptor, or an
//! insertion wrapper emptied by the host. Post-effects repair that.
//!
//! ## Design
//!
//! After a local, non-historic commit the editor opens one follow-up
//! transaction tagged `suggested-edits` + `history-merge` and hands it to
//! every registered effect in order. The follow-up shares the primary's
//! version and undo entry, so one undo reverts both.
//!
//! Post-effects are:
//! - **Derived**: they inspect the primary update and the current tree only
//! - **Idempotent**: running one twice over the same tree changes nothing
//! - **Minimal**: they only touch nodes the primary transaction produced

use crate::collaboration::is_remote;
use crate::editor::CommittedUpdate;
use crate::errors::EditorError;
use crate::mode::SuggestEditsContext;
use crate::suggestions::wrap::{self, NewWrapperFactory};
use crate::suggestions::{new_meta, query};
use crate::threads::summarize;
use crate::transaction::{Transaction, HISTORIC_TAG, SUGGESTED_EDITS_TAG};
use redline_document::{Document, NodeKey, SerializedNode, SuggestionMeta, WrapperKind};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::debug;

/// Effect run after a primary transaction commits
pub trait PostEffect: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Apply follow-up changes through `txn`
    fn run(&self, update: &CommittedUpdate, txn: &mut Transaction) -> Result<(), EditorError>;
}

/// Wraps edits that reached the tree without going through the
/// interceptor while the editor is suggesting.
#[derive(Debug)]
pub struct WrapUntrackedEdits {
    ctx: Rc<SuggestEditsContext>,
}

impl WrapUntrackedEdits {
    pub fn new(ctx: Rc<SuggestEditsContext>) -> Self {
        Self { ctx }
    }

    fn applies_to(&self, update: &CommittedUpdate) -> bool {
        self.ctx.is_suggesting()
            && !update.tags.contains(SUGGESTED_EDITS_TAG)
            && !update.tags.contains(HISTORIC_TAG)
            && !is_remote(&update.tags)
    }
}

/// Created roots that still need a wrapper, in document order
fn untracked_roots(doc: &Document, created: &[NodeKey]) -> Vec<NodeKey> {
    let created_set: HashSet<NodeKey> = created.iter().copied().collect();
    let mut roots: Vec<NodeKey> = created
        .iter()
        .copied()
        .filter(|key| doc.contains(*key) && doc.parent(*key).is_some())
        .filter(|key| query::nearest_wrapper(doc, *key).is_none())
        .filter(|key| !doc.ancestors(*key).any(|a| created_set.contains(&a)))
        .filter(|key| !(doc.is_text(*key) && doc.text_len(*key) == 0))
        .collect();
    roots.sort_by_key(|key| doc.path(*key));
    roots.dedup();
    roots
}

/// Committed text nodes whose content changed: `(key, old, new)`
fn untracked_text_changes(doc: &Document, updates: &[(NodeKey, String)]) -> Vec<(NodeKey, String, String)> {
    updates
        .iter()
        .filter(|(key, _)| doc.is_text(*key) && query::nearest_wrapper(doc, *key).is_none())
        .filter_map(|(key, old)| {
            let new = doc.text(*key)?;
            (new != old.as_str()).then(|| (*key, old.clone(), new.to_string()))
        })
        .collect()
}

/// Common prefix and suffix lengths (in chars) that do not overlap
fn common_affixes(old: &[char], new: &[char]) -> (usize, usize) {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    (prefix, suffix)
}

/// Turn a direct text change into a deletion of the old middle followed by
/// an insertion of the new one
fn track_text_change(
    txn: &mut Transaction,
    key: NodeKey,
    old: &str,
    new: &str,
    meta: &SuggestionMeta,
) -> Result<(), EditorError> {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    let (prefix, suffix) = common_affixes(&old_chars, &new_chars);
    let deleted: String = old_chars[prefix..old_chars.len() - suffix].iter().collect();
    let inserted_len = new_chars.len() - suffix - prefix;

    txn.split_text(key, prefix + inserted_len)?;
    let middle = if inserted_len > 0 {
        txn.split_text(key, prefix)?
    } else {
        None
    };

    let doc = txn.document();
    let parent = doc
        .parent(key)
        .ok_or(redline_document::DocumentError::ParentNotFound(key))?;
    let key_index = doc
        .index_in_parent(key)
        .ok_or(redline_document::DocumentError::ParentNotFound(key))?;
    let deletion_index = match middle {
        Some(node) => doc.index_in_parent(node).unwrap_or(key_index + 1),
        None if prefix == 0 => key_index,
        None => key_index + 1,
    };

    if !deleted.is_empty() {
        let wrapper = txn.allocate_key();
        let text = txn.allocate_key();
        let node = SerializedNode::wrapper(
            wrapper,
            WrapperKind::DeletionInline,
            meta.clone(),
            vec![SerializedNode::text(text, deleted)],
        );
        txn.insert(parent, deletion_index, node)?;
    }
    if let Some(node) = middle {
        wrap::wrap_nodes(txn, &[node], &mut NewWrapperFactory::insertion(meta.clone()))?;
    }
    Ok(())
}

impl PostEffect for WrapUntrackedEdits {
    fn name(&self) -> &'static str {
        "wrap-untracked-edits"
    }

    fn run(&self, update: &CommittedUpdate, txn: &mut Transaction) -> Result<(), EditorError> {
        if !self.applies_to(update) {
            return Ok(());
        }
        let roots = untracked_roots(txn.document(), &update.created);
        let changes = untracked_text_changes(txn.document(), &update.text_updates);
        if roots.is_empty() && changes.is_empty() {
            return Ok(());
        }

        let meta = new_meta(&self.ctx.author());
        if !roots.is_empty() {
            let mut factory = NewWrapperFactory::insertion(meta.clone());
            wrap::wrap_nodes(txn, &roots, &mut factory)?;
        }
        for (key, old, new) in &changes {
            track_text_change(txn, *key, old, new, &meta)?;
        }

        if let Some(summary) = summarize(txn.document(), &meta.suggestion_id, self.ctx.quote_max_len()) {
            txn.emit(summary.insert_event());
        }
        debug!(
            suggestion_id = %meta.suggestion_id,
            nodes = roots.len(),
            texts = changes.len(),
            "wrapped untracked edits"
        );
        Ok(())
    }
}

/// Drops insertion wrappers left without content
#[derive(Debug, Default)]
pub struct PruneEmptyInsertions;

impl PruneEmptyInsertions {
    fn is_empty_insertion(doc: &Document, key: NodeKey, kind: WrapperKind) -> bool {
        match kind {
            WrapperKind::InsertionInline => doc.text_content(key).is_empty(),
            WrapperKind::InsertionBlock => doc.children(key).is_empty(),
            WrapperKind::DeletionInline | WrapperKind::DeletionBlock => false,
        }
    }
}

impl PostEffect for PruneEmptyInsertions {
    fn name(&self) -> &'static str {
        "prune-empty-insertions"
    }

    fn run(&self, _update: &CommittedUpdate, txn: &mut Transaction) -> Result<(), EditorError> {
        let wrappers = txn.document().wrappers();
        for (key, kind, meta) in wrappers {
            let doc = txn.document();
            if doc.contains(key) && Self::is_empty_insertion(doc, key, kind) {
                debug!(suggestion_id = %meta.suggestion_id, wrapper = %key, "pruning empty insertion");
                txn.remove(key)?;
            }
        }
        Ok(())
    }
}

/// Runs registered effects in order
#[derive(Debug, Default)]
pub struct PostEffectEngine {
    effects: Vec<Box<dyn PostEffect>>,
}

impl PostEffectEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, effect: Box<dyn PostEffect>) {
        self.effects.push(effect);
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.effects.iter().map(|effect| effect.name()).collect()
    }

    /// Run every effect against one follow-up transaction
    pub fn run(&self, update: &CommittedUpdate, txn: &mut Transaction) -> Result<(), EditorError> {
        for effect in &self.effects {
            effect.run(update, txn)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuggestEditsConfig;
    use crate::mode::EditorMode;
    use crate::transaction::EditorState;
    use std::collections::BTreeSet;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn update_with(created: Vec<NodeKey>, text_updates: Vec<(NodeKey, String)>) -> CommittedUpdate {
        CommittedUpdate {
            version: 1,
            tags: BTreeSet::new(),
            mutations: Vec::new(),
            events: Vec::new(),
            created,
            text_updates,
        }
    }

    fn suggesting() -> Rc<SuggestEditsContext> {
        SuggestEditsContext::new(SuggestEditsConfig::default().with_mode(EditorMode::Suggesting))
    }

    #[test]
    fn test_common_affixes_do_not_overlap() {
        assert_eq!(common_affixes(&chars("hello"), &chars("hXo")), (1, 1));
        assert_eq!(common_affixes(&chars("aaa"), &chars("aa")), (2, 0));
        assert_eq!(common_affixes(&chars("abc"), &chars("abc!")), (3, 0));
        assert_eq!(common_affixes(&chars(""), &chars("x")), (0, 0));
    }

    #[test]
    fn test_direct_text_change_becomes_replacement() {
        let mut state = EditorState::new(Document::from_paragraphs(1, &["hello"]));
        let text = state.document.text_leaves(state.document.root())[0];
        let effect = WrapUntrackedEdits::new(suggesting());

        let mut txn = Transaction::new(&mut state, 1);
        txn.set_text(text, "hXo").unwrap();
        let update = update_with(Vec::new(), vec![(text, "hello".to_string())]);
        effect.run(&update, &mut txn).unwrap();

        let doc = txn.document();
        let threads = crate::threads::derive_threads(doc, 120);
        assert_eq!(threads.len(), 1);
        let summary = threads.values().next().unwrap();
        assert_eq!(summary.body, "Suggested replacement: “ell” → “X”");
        assert_eq!(doc.plain_text(), "hellXo");
    }

    #[test]
    fn test_created_paragraph_is_wrapped_in_block_insertion() {
        let mut state = EditorState::new(Document::from_paragraphs(1, &["a"]));
        let effect = WrapUntrackedEdits::new(suggesting());

        let mut txn = Transaction::new(&mut state, 1);
        let root = txn.document().root();
        let (paragraph, text) = txn.insert_paragraph(root, 1).unwrap();
        txn.set_text(text, "new").unwrap();
        let update = update_with(vec![paragraph], Vec::new());
        effect.run(&update, &mut txn).unwrap();

        let wrapper = txn.document().parent(paragraph).unwrap();
        assert_eq!(
            query::wrapper_kind(txn.document(), wrapper),
            Some(WrapperKind::InsertionBlock)
        );
    }

    #[test]
    fn test_editing_mode_leaves_edits_alone() {
        let mut state = EditorState::new(Document::from_paragraphs(1, &["hello"]));
        let text = state.document.text_leaves(state.document.root())[0];
        let effect = WrapUntrackedEdits::new(SuggestEditsContext::new(SuggestEditsConfig::default()));

        let mut txn = Transaction::new(&mut state, 1);
        txn.set_text(text, "help").unwrap();
        let before = txn.mutations().len();
        effect.run(&update_with(Vec::new(), vec![(text, "hello".into())]), &mut txn).unwrap();
        assert_eq!(txn.mutations().len(), before);
    }

    #[test]
    fn test_prune_removes_empty_inline_insertions() {
        let mut state = EditorState::new(Document::from_paragraphs(1, &["a"]));
        let paragraph = state.document.paragraph(0).unwrap();
        let mut txn = Transaction::new(&mut state, 1);
        let meta = SuggestionMeta::new("s", &redline_document::Author::new("u", "U"), 0);
        let wrapper = txn
            .insert_wrapper(paragraph, 1, WrapperKind::InsertionInline, meta)
            .unwrap();

        PruneEmptyInsertions.run(&update_with(Vec::new(), Vec::new()), &mut txn).unwrap();
        assert!(!txn.document().contains(wrapper));
    }

    #[test]
    fn test_engine_runs_in_registration_order() {
        let mut engine = PostEffectEngine::new();
        engine.register(Box::new(WrapUntrackedEdits::new(suggesting())));
        engine.register(Box::new(PruneEmptyInsertions));
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.names(), vec!["wrap-untracked-edits", "prune-empty-insertions"]);
    }
}
