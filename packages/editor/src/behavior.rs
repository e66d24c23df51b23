//! Default text editing behaviour, registered at `CommandPriority::Editor`.
//!
//! This is what runs when no higher-priority handler claims a command:
//! plain insertion, paragraph splitting and deletion with paragraph
//! merging at block boundaries.

use crate::commands::{Command, CommandHandler};
use crate::errors::EditorError;
use crate::transaction::Transaction;
use redline_document::{
    Direction, Document, DocumentError, Granularity, NodeKey, Point, Selection,
};
use tracing::trace;

#[derive(Debug, Default)]
pub struct DefaultBehavior;

fn no_skip(_: &Document, _: NodeKey) -> bool {
    false
}

fn valid_selection(txn: &Transaction) -> Option<Selection> {
    let selection = txn.selection()?;
    let doc = txn.document();
    (doc.is_valid_point(selection.anchor) && doc.is_valid_point(selection.focus))
        .then_some(selection)
}

/// Remove the content of a range, joining the first and last blocks
fn delete_range(txn: &mut Transaction, selection: &Selection) -> Result<(), EditorError> {
    let (start, end) = txn.document().ordered(selection);
    let start_block = txn.document().nearest_block(start.key);
    let end_block = txn.document().nearest_block(end.key);

    let nodes = txn.extract(start, end, &no_skip)?;
    let Some(first) = nodes.first().copied() else {
        return Ok(());
    };
    if let Some(caret) = txn.caret_before(first)? {
        txn.set_caret(caret);
    }
    for node in nodes {
        if txn.document().contains(node) {
            txn.remove(node)?;
        }
    }

    if let (Some(start_block), Some(end_block)) = (start_block, end_block) {
        let doc = txn.document();
        if start_block != end_block && doc.contains(end_block) {
            if doc.contains(start_block) {
                merge_blocks(txn, start_block, end_block)?;
            } else if let Some(point) = doc.start_of(end_block) {
                txn.set_caret(point);
            }
        }
    }
    Ok(())
}

/// Move every child of `from` to the end of `into`, then drop `from`
fn merge_blocks(txn: &mut Transaction, into: NodeKey, from: NodeKey) -> Result<(), EditorError> {
    let children = txn.document().children(from).to_vec();
    for child in children {
        let end = txn.document().children(into).len();
        txn.move_node(child, into, end)?;
    }
    txn.remove(from)
}

/// Delete at a block boundary: join with the neighbouring paragraph
fn join_at_boundary(txn: &mut Transaction, caret: Point, direction: Direction) -> Result<(), EditorError> {
    let doc = txn.document();
    let Some(block) = doc.nearest_block(caret.key) else {
        return Ok(());
    };
    let paragraphs = doc.paragraphs();
    let Some(position) = paragraphs.iter().position(|p| *p == block) else {
        return Ok(());
    };

    match direction {
        Direction::Backward => {
            let Some(previous) = position.checked_sub(1).map(|i| paragraphs[i]) else {
                return Ok(());
            };
            if doc.is_ancestor_or_self(previous, block) {
                return Ok(());
            }
            let caret = doc.end_of(previous).unwrap_or(caret);
            trace!(%block, into = %previous, "joining paragraph backward");
            merge_blocks(txn, previous, block)?;
            txn.set_caret(caret);
        }
        Direction::Forward => {
            let Some(next) = paragraphs.get(position + 1).copied() else {
                return Ok(());
            };
            trace!(%next, into = %block, "joining paragraph forward");
            merge_blocks(txn, block, next)?;
            txn.set_caret(caret);
        }
    }
    Ok(())
}

/// Split the paragraph holding the caret; content after it moves to a new
/// paragraph inserted right after
fn split_paragraph(txn: &mut Transaction, caret: Point) -> Result<(), EditorError> {
    let doc = txn.document();
    let block = doc
        .nearest_block(caret.key)
        .ok_or(DocumentError::ParentNotFound(caret.key))?;
    let top = std::iter::once(caret.key)
        .chain(doc.ancestors(caret.key))
        .find(|key| doc.parent(*key) == Some(block))
        .ok_or(DocumentError::ParentNotFound(caret.key))?;
    let parent = doc.parent(block).ok_or(DocumentError::ParentNotFound(block))?;
    let block_index = doc
        .index_in_parent(block)
        .ok_or(DocumentError::ParentNotFound(block))?;

    let first_moved = if top == caret.key {
        txn.split_text(caret.key, caret.offset)?
    } else {
        txn.document().next_sibling(top)
    };
    let moved: Vec<NodeKey> = match first_moved {
        Some(first) => {
            let children = txn.document().children(block);
            let from = children.iter().position(|c| *c == first).unwrap_or(children.len());
            children[from..].to_vec()
        }
        None => {
            let children = txn.document().children(block);
            let from = children.iter().position(|c| *c == top).map_or(children.len(), |i| i + 1);
            children[from..].to_vec()
        }
    };

    let (paragraph, text) = txn.insert_paragraph(parent, block_index + 1)?;
    for (i, node) in moved.iter().enumerate() {
        txn.move_node(*node, paragraph, i + 1)?;
    }
    txn.set_caret(Point::new(text, 0));
    Ok(())
}

impl DefaultBehavior {
    fn insert_text(&self, text: &str, txn: &mut Transaction) -> Result<bool, EditorError> {
        if text.is_empty() {
            return Ok(false);
        }
        let Some(selection) = valid_selection(txn) else {
            return Ok(false);
        };
        if !selection.is_collapsed() {
            delete_range(txn, &selection)?;
        }
        let caret = txn
            .selection()
            .map(|s| s.focus)
            .filter(|p| txn.document().is_valid_point(*p))
            .ok_or(EditorError::InvalidSelection)?;
        let end = txn.insert_at_point(caret, text)?;
        txn.set_caret(end);
        Ok(true)
    }

    fn delete(
        &self,
        direction: Direction,
        granularity: Granularity,
        txn: &mut Transaction,
    ) -> Result<bool, EditorError> {
        let Some(selection) = valid_selection(txn) else {
            return Ok(false);
        };
        if !selection.is_collapsed() {
            delete_range(txn, &selection)?;
            return Ok(true);
        }
        let extended = txn
            .document()
            .extend(selection.focus, direction, granularity, &no_skip);
        match extended {
            Some(range) => delete_range(txn, &range)?,
            None => join_at_boundary(txn, selection.focus, direction)?,
        }
        Ok(true)
    }
}

impl CommandHandler for DefaultBehavior {
    fn name(&self) -> &'static str {
        "default-behavior"
    }

    fn handle(&mut self, command: &Command, txn: &mut Transaction) -> Result<bool, EditorError> {
        match command {
            Command::InsertText(text) | Command::Paste(text) | Command::Drop(text) => {
                self.insert_text(text, txn)
            }
            Command::InsertParagraph => {
                let Some(selection) = valid_selection(txn) else {
                    return Ok(false);
                };
                if !selection.is_collapsed() {
                    delete_range(txn, &selection)?;
                }
                match txn.selection() {
                    Some(current) if txn.document().is_valid_point(current.focus) => {
                        split_paragraph(txn, current.focus)?;
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
            Command::DeleteBackward => self.delete(Direction::Backward, Granularity::Character, txn),
            Command::DeleteForward => self.delete(Direction::Forward, Granularity::Character, txn),
            Command::DeleteWord(direction) => self.delete(*direction, Granularity::Word, txn),
            Command::DeleteLine(direction) => self.delete(*direction, Granularity::Line, txn),
            Command::SetMode(_) | Command::ToggleMode | Command::ResolveSuggestion { .. } => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::EditorState;

    fn state_with_caret(paragraphs: &[&str], paragraph: usize, offset: usize) -> EditorState {
        let mut state = EditorState::new(Document::from_paragraphs(1, paragraphs));
        let doc = &state.document;
        let text = doc.text_leaves(doc.paragraph(paragraph).unwrap())[0];
        state.selection = Some(Selection::caret(Point::new(text, offset)));
        state
    }

    #[test]
    fn test_insert_text_at_caret() {
        let mut state = state_with_caret(&["hllo"], 0, 1);
        let mut txn = Transaction::new(&mut state, 0);
        assert!(DefaultBehavior.handle(&Command::insert_text("e"), &mut txn).unwrap());
        assert_eq!(txn.document().plain_text(), "hello");
        assert_eq!(txn.selection().unwrap().focus.offset, 2);
    }

    #[test]
    fn test_enter_splits_paragraph() {
        let mut state = state_with_caret(&["hello"], 0, 2);
        let mut txn = Transaction::new(&mut state, 0);
        DefaultBehavior.handle(&Command::InsertParagraph, &mut txn).unwrap();
        assert_eq!(txn.document().plain_text(), "he\nllo");
        txn.document().check_integrity().unwrap();
    }

    #[test]
    fn test_backspace_at_start_joins_paragraphs() {
        let mut state = state_with_caret(&["ab", "cd"], 1, 0);
        let mut txn = Transaction::new(&mut state, 0);
        DefaultBehavior.handle(&Command::DeleteBackward, &mut txn).unwrap();
        assert_eq!(txn.document().plain_text(), "abcd");
        let caret = txn.selection().unwrap().focus;
        assert_eq!(txn.document().text(caret.key), Some("ab"));
        assert_eq!(caret.offset, 2);
    }

    #[test]
    fn test_cross_paragraph_range_is_removed_and_joined() {
        let mut state = EditorState::new(Document::from_paragraphs(1, &["abc", "mid", "xyz"]));
        let doc = &state.document;
        let first = doc.text_leaves(doc.paragraph(0).unwrap())[0];
        let last = doc.text_leaves(doc.paragraph(2).unwrap())[0];
        state.selection = Some(Selection::new(Point::new(first, 1), Point::new(last, 2)));

        let mut txn = Transaction::new(&mut state, 0);
        DefaultBehavior.handle(&Command::DeleteBackward, &mut txn).unwrap();
        assert_eq!(txn.document().plain_text(), "az");
    }

    #[test]
    fn test_word_deletion() {
        let mut state = state_with_caret(&["hello world"], 0, 11);
        let mut txn = Transaction::new(&mut state, 0);
        DefaultBehavior
            .handle(&Command::DeleteWord(Direction::Backward), &mut txn)
            .unwrap();
        assert_eq!(txn.document().plain_text(), "hello ");
    }

    #[test]
    fn test_line_deletion_to_block_start() {
        let mut state = state_with_caret(&["hello world", "next"], 0, 6);
        let mut txn = Transaction::new(&mut state, 0);
        DefaultBehavior
            .handle(&Command::DeleteLine(Direction::Backward), &mut txn)
            .unwrap();
        assert_eq!(txn.document().plain_text(), "world\nnext");
    }
}
