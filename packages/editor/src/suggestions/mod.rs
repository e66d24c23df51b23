//! # Suggested edits
//!
//! Tracked changes layered over the editor's command bus:
//!
//! ```text
//! command ──► SuggestionInterceptor (High) ──► wrap / coalesce
//!         └─► ModeHandler, ResolveHandler (Normal)
//!         └─► host behaviour (Editor)
//!
//! commit ──► WrapUntrackedEdits, PruneEmptyInsertions (post-effects)
//!        └─► ThreadSynchronizer ──► thread listeners
//! ```
//!
//! `SuggestEdits::install` wires all of it into an `Editor` and hands back
//! the shared `SuggestEditsContext`.

pub mod coalesce;
pub mod interceptor;
pub mod query;
pub mod resolve;
pub mod wrap;

pub use coalesce::{DeletionFactory, DeletionRun};
pub use interceptor::SuggestionInterceptor;
pub use resolve::ResolveHandler;
pub use wrap::{extract_and_wrap, unwrap, Placement, WrapOutcome, WrapperFactory};

use crate::commands::CommandPriority;
use crate::config::SuggestEditsConfig;
use crate::editor::Editor;
use crate::mode::{ModeHandler, SuggestEditsContext};
use crate::post_effects::{PruneEmptyInsertions, WrapUntrackedEdits};
use crate::threads::ThreadSynchronizer;
use chrono::Utc;
use redline_document::{Author, SuggestionMeta};
use std::rc::Rc;
use tracing::info;
use uuid::Uuid;

/// Fresh attribution for a new suggestion
pub fn new_meta(author: &Author) -> SuggestionMeta {
    SuggestionMeta::new(
        Uuid::new_v4().to_string(),
        author,
        Utc::now().timestamp_millis(),
    )
}

pub struct SuggestEdits;

impl SuggestEdits {
    /// Register the handlers, post-effects and thread synchronizer
    pub fn install(editor: &mut Editor, config: SuggestEditsConfig) -> Rc<SuggestEditsContext> {
        let ctx = SuggestEditsContext::new(config);

        editor.register_handler(
            CommandPriority::High,
            Box::new(SuggestionInterceptor::new(ctx.clone())),
        );
        editor.register_handler(CommandPriority::Normal, Box::new(ModeHandler::new(ctx.clone())));
        editor.register_handler(
            CommandPriority::Normal,
            Box::new(ResolveHandler::new(ctx.clone())),
        );

        editor.register_post_effect(Box::new(WrapUntrackedEdits::new(ctx.clone())));
        editor.register_post_effect(Box::new(PruneEmptyInsertions));

        let synchronizer = ThreadSynchronizer::new(ctx.clone(), editor.document());
        editor.add_listener(Box::new(synchronizer));

        info!(mode = ?ctx.mode(), author = %ctx.author().id, "suggested edits installed");
        ctx
    }
}
