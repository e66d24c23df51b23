//! Accept/reject resolver.
//!
//! Accepting keeps the insertions (unwrapped) and drops the deletions;
//! rejecting does the opposite. Either way the thread is hidden.

use super::{query, wrap};
use crate::commands::{Command, CommandHandler, ResolveAction};
use crate::errors::EditorError;
use crate::mode::SuggestEditsContext;
use crate::threads::ThreadEvent;
use crate::transaction::{Transaction, SUGGESTED_EDITS_TAG};
use std::rc::Rc;
use tracing::{debug, info};

/// Handles `Command::ResolveSuggestion`.
///
/// Resolution only removes or unwraps wrappers. Blocks are never merged, so
/// accepting a deletion that spans a paragraph break leaves both paragraphs
/// in place: replacing "b\nc" in "ab" / "cd" with "X" and accepting gives
/// "a" / "Xd".
#[derive(Debug)]
pub struct ResolveHandler {
    ctx: Rc<SuggestEditsContext>,
}

impl ResolveHandler {
    pub fn new(ctx: Rc<SuggestEditsContext>) -> Self {
        Self { ctx }
    }

    fn resolve(
        &self,
        suggestion_id: &str,
        action: ResolveAction,
        txn: &mut Transaction,
    ) -> Result<bool, EditorError> {
        let nodes = query::find_wrappers(txn.document(), suggestion_id);
        if nodes.is_empty() {
            debug!(suggestion_id, "nothing to resolve");
            return Ok(false);
        }

        let capabilities = self.ctx.capabilities();
        let author = self.ctx.author();
        let own_reject = capabilities.can_suggest
            && self.ctx.config().suggesters_can_reject_own
            && action == ResolveAction::Reject
            && nodes
                .all()
                .all(|w| query::is_authored_by(txn.document(), w, &author.id));
        if !capabilities.can_edit && !own_reject {
            debug!(suggestion_id, ?action, "resolve not permitted");
            return Ok(false);
        }

        let (kept, dropped) = match action {
            ResolveAction::Accept => (nodes.insertions, nodes.deletions),
            ResolveAction::Reject => (nodes.deletions, nodes.insertions),
        };

        txn.add_tag(SUGGESTED_EDITS_TAG);
        txn.set_description(format!("{action:?} suggestion"));
        for wrapper in dropped {
            if txn.document().contains(wrapper) {
                txn.remove(wrapper)?;
            }
        }
        for wrapper in kept {
            if txn.document().contains(wrapper) {
                wrap::unwrap(txn, wrapper)?;
            }
        }

        txn.emit(ThreadEvent::Hide {
            thread_id: suggestion_id.to_string(),
        });
        info!(suggestion_id, ?action, "suggestion resolved");
        Ok(true)
    }
}

impl CommandHandler for ResolveHandler {
    fn name(&self) -> &'static str {
        "suggest-edits-resolve"
    }

    fn handle(&mut self, command: &Command, txn: &mut Transaction) -> Result<bool, EditorError> {
        if txn.is_remote() {
            return Ok(false);
        }
        match command {
            Command::ResolveSuggestion {
                suggestion_id,
                action,
            } => self.resolve(suggestion_id, *action, txn),
            _ => Ok(false),
        }
    }
}
