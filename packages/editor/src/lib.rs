//! # Redline Editor
//!
//! Tracked-change ("suggested edits") engine over the `redline-document`
//! tree.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ document: arena tree, selections, DOM/JSON  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: commands + transactions + history   │
//! │  - Priority command bus                     │
//! │  - Mutations recorded with inverses         │
//! │  - Undo/redo, history merging               │
//! │  - Outbox / remote apply for collaboration  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ suggestions: interceptor, wrap, resolve     │
//! │  - Thread events derived from the tree      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The tree is the source of truth**: suggestions and threads are
//!    always re-derived from it, never indexed on the side
//! 2. **Every edit is a transaction**: it commits whole or rolls back
//! 3. **Remote edits are never re-wrapped**: the collaboration tag is
//!    checked before any suggestion logic runs
//!
//! ## Usage
//!
//! ```rust
//! use redline_document::{Document, Point, Selection};
//! use redline_editor::{Command, Editor, EditorMode, SuggestEdits, SuggestEditsConfig};
//!
//! let mut editor = Editor::new(Document::from_paragraphs(1, &["hello"]));
//! let config = SuggestEditsConfig::default()
//!     .for_author("u1", "Ada")
//!     .with_mode(EditorMode::Suggesting);
//! let ctx = SuggestEdits::install(&mut editor, config);
//!
//! let text = editor.document().text_leaves(editor.document().root())[0];
//! editor.set_selection(Some(Selection::caret(Point::new(text, 5))));
//! editor.dispatch(Command::insert_text("!"));
//!
//! assert_eq!(editor.document().plain_text(), "hello!");
//! assert_eq!(editor.document().wrappers().len(), 1);
//! assert!(ctx.is_suggesting());
//! ```

mod behavior;
mod collaboration;
mod commands;
mod config;
mod editor;
mod errors;
mod mode;
mod mutations;
mod post_effects;
pub mod suggestions;
mod threads;
mod transaction;
mod undo_stack;

pub use behavior::DefaultBehavior;
pub use collaboration::{is_remote, Outbox, RemoteUpdate};
pub use commands::{Command, CommandHandler, CommandPriority, ResolveAction};
pub use config::{ConfigError, SuggestEditsConfig, DEFAULT_CONFIG_NAME};
pub use editor::{CommittedUpdate, Editor, UpdateListener};
pub use errors::EditorError;
pub use mode::{Capabilities, EditorMode, Listeners, ModeHandler, SuggestEditsContext, Subscription};
pub use mutations::{Mutation, MutationError};
pub use post_effects::{PostEffect, PostEffectEngine, PruneEmptyInsertions, WrapUntrackedEdits};
pub use suggestions::SuggestEdits;
pub use threads::{
    derive_threads, summarize, truncate_for_quote, ThreadEvent, ThreadKind, ThreadSummary,
    ThreadSynchronizer,
};
pub use transaction::{
    EditorState, Transaction, COLLABORATION_TAG, HISTORIC_TAG, HISTORY_MERGE_TAG,
    SUGGESTED_EDITS_TAG,
};
pub use undo_stack::{MutationBatch, UndoStack};
