//! Command interceptor: turns insertions and deletions into suggestions
//! while the editor is in suggesting mode.

use super::coalesce::{DeletionFactory, DeletionRun};
use super::wrap::extract_and_wrap;
use super::{new_meta, query};
use crate::commands::{Command, CommandHandler};
use crate::errors::EditorError;
use crate::mode::SuggestEditsContext;
use crate::threads::summarize;
use crate::transaction::{Transaction, HISTORY_MERGE_TAG, SUGGESTED_EDITS_TAG};
use redline_document::{
    char_len, Direction, DocumentError, Granularity, NodeKey, Point, Selection, SerializedNode,
    WrapperKind,
};
use std::rc::Rc;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct SuggestionInterceptor {
    ctx: Rc<SuggestEditsContext>,
    last_run: Option<DeletionRun>,
}

impl SuggestionInterceptor {
    pub fn new(ctx: Rc<SuggestEditsContext>) -> Self {
        Self {
            ctx,
            last_run: None,
        }
    }

    fn valid_selection(txn: &Transaction) -> Option<Selection> {
        let selection = txn.selection()?;
        let doc = txn.document();
        (doc.is_valid_point(selection.anchor) && doc.is_valid_point(selection.focus))
            .then_some(selection)
    }

    fn insert_text(&mut self, text: &str, txn: &mut Transaction) -> Result<bool, EditorError> {
        if text.is_empty() {
            return Ok(false);
        }
        let Some(selection) = Self::valid_selection(txn) else {
            return Ok(false);
        };
        let author = self.ctx.author();
        let doc = txn.document();

        if let Some(own) = query::own_insertion(doc, selection.anchor.key, &author.id) {
            if query::own_insertion(doc, selection.focus.key, &author.id) == Some(own) {
                trace!(wrapper = %own, "typing inside own insertion");
                return Ok(false);
            }
        }
        if query::in_deletion(doc, selection.anchor.key) {
            debug!("typing inside a deletion is blocked");
            return Ok(true);
        }

        txn.add_tag(SUGGESTED_EDITS_TAG);
        let meta = new_meta(&author);
        let suggestion_id = meta.suggestion_id.clone();

        let mut after = None;
        if !selection.is_collapsed() {
            let mut factory = DeletionFactory::new(meta.clone(), None);
            let outcome = extract_and_wrap(txn, &selection, &mut factory)?;
            after = outcome
                .wrappers
                .iter()
                .rev()
                .find(|w| query::wrapper_kind(txn.document(), **w) == Some(WrapperKind::DeletionInline))
                .copied();
        }

        let caret = txn
            .selection()
            .map(|s| s.focus)
            .filter(|p| txn.document().is_valid_point(*p))
            .ok_or(EditorError::InvalidSelection)?;

        let end = match after {
            None if query::own_insertion(txn.document(), caret.key, &author.id).is_some() => {
                txn.insert_at_point(caret, text)?
            }
            _ => {
                let (parent, index) = match after {
                    Some(wrapper) => position_after(txn, wrapper)?,
                    None => position_at_caret(txn, caret)?,
                };
                let wrapper_key = txn.allocate_key();
                let text_key = txn.allocate_key();
                let node = SerializedNode::wrapper(
                    wrapper_key,
                    WrapperKind::InsertionInline,
                    meta,
                    vec![SerializedNode::text(text_key, text)],
                );
                txn.insert(parent, index, node)?;
                Point::new(text_key, char_len(text))
            }
        };
        txn.set_caret(end);

        if let Some(summary) = summarize(txn.document(), &suggestion_id, self.ctx.quote_max_len()) {
            txn.emit(summary.insert_event());
        }
        debug!(suggestion_id = %suggestion_id, "insertion suggested");
        self.last_run = None;
        Ok(true)
    }

    fn insert_paragraph(&mut self, txn: &mut Transaction) -> Result<bool, EditorError> {
        let Some(selection) = Self::valid_selection(txn) else {
            return Ok(false);
        };
        if !selection.is_collapsed() {
            return Ok(true);
        }
        let author = self.ctx.author();
        let caret = selection.focus;
        let doc = txn.document();

        if query::in_deletion(doc, caret.key) {
            return Ok(true);
        }
        let own_block = query::own_insertion(doc, caret.key, &author.id)
            .and_then(|w| query::wrapper_kind(doc, w))
            .is_some_and(|kind| !kind.is_inline());
        if own_block {
            return Ok(false);
        }

        let Some((block, offset, len)) = doc.block_offset(caret) else {
            return Ok(true);
        };
        if offset < len {
            debug!(%block, offset, "splitting committed paragraph is blocked");
            return Ok(true);
        }
        let (parent, index) = position_after(txn, block)?;

        txn.add_tag(SUGGESTED_EDITS_TAG);
        let meta = new_meta(&author);
        let suggestion_id = meta.suggestion_id.clone();
        let wrapper_key = txn.allocate_key();
        let paragraph_key = txn.allocate_key();
        let text_key = txn.allocate_key();
        let node = SerializedNode::wrapper(
            wrapper_key,
            WrapperKind::InsertionBlock,
            meta,
            vec![SerializedNode::paragraph(
                paragraph_key,
                vec![SerializedNode::text(text_key, "")],
            )],
        );
        txn.insert(parent, index, node)?;
        txn.set_caret(Point::new(text_key, 0));

        if let Some(summary) = summarize(txn.document(), &suggestion_id, self.ctx.quote_max_len()) {
            txn.emit(summary.insert_event());
        }
        self.last_run = None;
        Ok(true)
    }

    fn delete(
        &mut self,
        direction: Direction,
        granularity: Granularity,
        txn: &mut Transaction,
    ) -> Result<bool, EditorError> {
        let Some(mut selection) = Self::valid_selection(txn) else {
            return Ok(true);
        };
        let author = self.ctx.author();
        if query::in_deletion(txn.document(), selection.anchor.key) {
            debug!("deleting inside a deletion is blocked");
            return Ok(true);
        }

        if selection.is_collapsed() {
            let extended = txn.document().extend(
                selection.focus,
                direction,
                granularity,
                &query::skip_deleted,
            );
            match extended {
                Some(range) => selection = range,
                None => {
                    self.remove_empty_block_insertion(selection.focus.key, &author.id, txn)?;
                    return Ok(true);
                }
            }
        }

        txn.add_tag(SUGGESTED_EDITS_TAG);
        let run = self
            .last_run
            .clone()
            .filter(|run| run.version == txn.base_version() && run.author_id == author.id);
        let mut factory = DeletionFactory::new(new_meta(&author), run);
        let outcome = extract_and_wrap(txn, &selection, &mut factory)?;
        debug_assert!(
            !outcome.is_empty(),
            "a range with visible text extracted nothing"
        );

        let quote_max_len = self.ctx.quote_max_len();
        let next_version = txn.base_version() + 1;
        if let Some(continued) = factory.continued_id().map(str::to_string) {
            txn.add_tag(HISTORY_MERGE_TAG);
            if let Some(summary) = summarize(txn.document(), &continued, quote_max_len) {
                txn.emit(summary.update_event());
            }
            trace!(suggestion_id = %continued, "deletion run continued");
            self.last_run = Some(DeletionRun {
                suggestion_id: continued,
                author_id: author.id,
                version: next_version,
            });
        } else if !outcome.wrappers.is_empty() {
            let suggestion_id = factory.meta().suggestion_id.clone();
            if let Some(summary) = summarize(txn.document(), &suggestion_id, quote_max_len) {
                txn.emit(summary.insert_event());
            }
            debug!(suggestion_id = %suggestion_id, "deletion suggested");
            self.last_run = Some(DeletionRun {
                suggestion_id,
                author_id: author.id,
                version: next_version,
            });
        } else {
            self.last_run = None;
        }
        Ok(true)
    }

    /// Backspace at the edge of an empty suggested paragraph drops it
    fn remove_empty_block_insertion(
        &mut self,
        key: NodeKey,
        author_id: &str,
        txn: &mut Transaction,
    ) -> Result<(), EditorError> {
        let doc = txn.document();
        let Some(wrapper) = query::own_insertion(doc, key, author_id) else {
            return Ok(());
        };
        let is_block = query::wrapper_kind(doc, wrapper).is_some_and(|kind| !kind.is_inline());
        if is_block && doc.text_content(wrapper).is_empty() {
            txn.add_tag(SUGGESTED_EDITS_TAG);
            txn.remove(wrapper)?;
            self.last_run = None;
        }
        Ok(())
    }
}

/// `(parent, index)` just after `key`
fn position_after(txn: &Transaction, key: NodeKey) -> Result<(NodeKey, usize), EditorError> {
    let doc = txn.document();
    let parent = doc.parent(key).ok_or(DocumentError::ParentNotFound(key))?;
    let index = doc
        .index_in_parent(key)
        .ok_or(DocumentError::ParentNotFound(key))?;
    Ok((parent, index + 1))
}

/// `(parent, index)` for an inline node at the caret, splitting its text
fn position_at_caret(txn: &mut Transaction, caret: Point) -> Result<(NodeKey, usize), EditorError> {
    let (parent, index) = position_after(txn, caret.key)?;
    match txn.split_text(caret.key, caret.offset)? {
        Some(start) if start == caret.key => Ok((parent, index - 1)),
        _ => Ok((parent, index)),
    }
}

impl CommandHandler for SuggestionInterceptor {
    fn name(&self) -> &'static str {
        "suggest-edits-interceptor"
    }

    fn handle(&mut self, command: &Command, txn: &mut Transaction) -> Result<bool, EditorError> {
        if txn.is_remote() || !self.ctx.is_suggesting() {
            return Ok(false);
        }
        match command {
            Command::InsertText(text) => self.insert_text(text, txn),
            Command::Paste(text) | Command::Drop(text) => {
                if text.is_empty() {
                    return Ok(false);
                }
                txn.defer(Command::InsertText(text.clone()));
                Ok(true)
            }
            Command::InsertParagraph => self.insert_paragraph(txn),
            Command::DeleteBackward => self.delete(Direction::Backward, Granularity::Character, txn),
            Command::DeleteForward => self.delete(Direction::Forward, Granularity::Character, txn),
            Command::DeleteWord(direction) => self.delete(*direction, Granularity::Word, txn),
            Command::DeleteLine(direction) => self.delete(*direction, Granularity::Line, txn),
            _ => Ok(false),
        }
    }
}
