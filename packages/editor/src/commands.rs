//! # Command Bus
//!
//! Commands are dispatched to handlers in priority order (highest first,
//! registration order within a priority). Dispatch stops at the first
//! handler that returns `Ok(true)`.

use crate::errors::EditorError;
use crate::mode::EditorMode;
use crate::transaction::Transaction;
use redline_document::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveAction {
    Accept,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    InsertText(String),
    Paste(String),
    /// Plain text dropped onto the caret
    Drop(String),
    InsertParagraph,
    DeleteBackward,
    DeleteForward,
    DeleteWord(Direction),
    DeleteLine(Direction),
    SetMode(EditorMode),
    ToggleMode,
    ResolveSuggestion {
        suggestion_id: String,
        action: ResolveAction,
    },
}

impl Command {
    pub fn accept(suggestion_id: impl Into<String>) -> Self {
        Command::ResolveSuggestion {
            suggestion_id: suggestion_id.into(),
            action: ResolveAction::Accept,
        }
    }

    pub fn reject(suggestion_id: impl Into<String>) -> Self {
        Command::ResolveSuggestion {
            suggestion_id: suggestion_id.into(),
            action: ResolveAction::Reject,
        }
    }

    pub fn insert_text(text: impl Into<String>) -> Self {
        Command::InsertText(text.into())
    }
}

/// `Editor` is reserved for the host's default behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandPriority {
    Editor,
    Low,
    Normal,
    High,
    Critical,
}

pub trait CommandHandler {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Return `Ok(true)` to stop propagation
    fn handle(&mut self, command: &Command, txn: &mut Transaction) -> Result<bool, EditorError>;
}

#[derive(Default)]
pub(crate) struct CommandBus {
    handlers: Vec<(CommandPriority, Box<dyn CommandHandler>)>,
}

impl CommandBus {
    pub(crate) fn register(&mut self, priority: CommandPriority, handler: Box<dyn CommandHandler>) {
        let position = self
            .handlers
            .iter()
            .position(|(existing, _)| *existing < priority)
            .unwrap_or(self.handlers.len());
        self.handlers.insert(position, (priority, handler));
    }

    pub(crate) fn handlers_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut Box<dyn CommandHandler>> + '_ {
        self.handlers.iter_mut().map(|(_, handler)| handler)
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|(_, handler)| handler.name()).collect()
    }
}
