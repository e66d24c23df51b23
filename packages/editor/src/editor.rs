//! # Editor
//!
//! Owns the document, the selection, the command bus and the history.
//!
//! ## Lifecycle of an edit
//!
//! ```text
//! dispatch / update / undo / redo / apply_remote
//!   ↓
//! Transaction (mutations + inverses, selection repair)
//!   ↓ commit
//! version += 1 → history → post-effects → outbox → listeners
//!   ↓
//! deferred commands are dispatched
//! ```
//!
//! A failed handler or a failed replay rolls its transaction back; the tree,
//! the selection and the history are then exactly as before.

use crate::behavior::DefaultBehavior;
use crate::collaboration::{is_remote, Outbox, RemoteUpdate};
use crate::commands::{Command, CommandBus, CommandHandler, CommandPriority};
use crate::errors::EditorError;
use crate::mutations::Mutation;
use crate::post_effects::{PostEffect, PostEffectEngine};
use crate::threads::ThreadEvent;
use crate::transaction::{
    EditorState, Transaction, TransactionRecord, COLLABORATION_TAG, HISTORIC_TAG,
    HISTORY_MERGE_TAG, SUGGESTED_EDITS_TAG,
};
use crate::undo_stack::UndoStack;
use redline_document::{Document, NodeKey, Selection};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, trace, warn};

/// What listeners see after each commit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommittedUpdate {
    /// Editor version after the commit
    pub version: u64,
    pub tags: BTreeSet<String>,
    /// Mutations in application order, post-effects included
    pub mutations: Vec<Mutation>,
    /// Thread events emitted by handlers and post-effects
    pub events: Vec<ThreadEvent>,
    /// Roots of subtrees the primary transaction inserted
    pub created: Vec<NodeKey>,
    /// Pre-transaction text of pre-existing text nodes that changed
    pub text_updates: Vec<(NodeKey, String)>,
}

impl CommittedUpdate {
    fn from_record(version: u64, record: &mut TransactionRecord) -> Self {
        Self {
            version,
            tags: record.tags.clone(),
            mutations: record.batch.mutations.clone(),
            events: std::mem::take(&mut record.events),
            created: std::mem::take(&mut record.created),
            text_updates: std::mem::take(&mut record.text_updates),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_remote(&self) -> bool {
        is_remote(&self.tags)
    }

    pub fn is_changed(&self) -> bool {
        !self.mutations.is_empty()
    }
}

/// Observer called after every commit
pub trait UpdateListener {
    fn on_update(&mut self, update: &CommittedUpdate, doc: &Document);
}

impl<F> UpdateListener for F
where
    F: FnMut(&CommittedUpdate, &Document),
{
    fn on_update(&mut self, update: &CommittedUpdate, doc: &Document) {
        self(update, doc)
    }
}

pub struct Editor {
    state: EditorState,
    /// Bumped by every commit that changed the tree
    version: u64,
    bus: CommandBus,
    history: UndoStack,
    effects: PostEffectEngine,
    listeners: Vec<Box<dyn UpdateListener>>,
    outbox: Outbox,
}

impl Editor {
    /// Editor over `document` with the default editing behaviour registered
    pub fn new(document: Document) -> Self {
        let mut bus = CommandBus::default();
        bus.register(CommandPriority::Editor, Box::new(DefaultBehavior));
        Self {
            state: EditorState::new(document),
            version: 0,
            bus,
            history: UndoStack::new(),
            effects: PostEffectEngine::new(),
            listeners: Vec::new(),
            outbox: Outbox::default(),
        }
    }

    /// Load a document saved with `save`
    pub fn load(path: impl AsRef<Path>, site: u32) -> Result<Self, EditorError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let document = Document::from_json(site, &json)?;
        debug!(path = %path.display(), nodes = document.len(), "document loaded");
        Ok(Self::new(document))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EditorError> {
        let json = self.state.document.to_json_pretty()?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn document(&self) -> &Document {
        &self.state.document
    }

    pub fn selection(&self) -> Option<Selection> {
        self.state.selection
    }

    /// Move the selection; not an edit, so nothing is recorded
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.state.selection = selection;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn site(&self) -> u32 {
        self.state.document.site()
    }

    pub fn register_handler(&mut self, priority: CommandPriority, handler: Box<dyn CommandHandler>) {
        debug!(handler = handler.name(), ?priority, "command handler registered");
        self.bus.register(priority, handler);
    }

    /// Handler names in dispatch order
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.bus.names()
    }

    pub fn register_post_effect(&mut self, effect: Box<dyn PostEffect>) {
        self.effects.register(effect);
    }

    pub fn add_listener(&mut self, listener: Box<dyn UpdateListener>) {
        self.listeners.push(listener);
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_levels(&self) -> usize {
        self.history.undo_levels()
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Run a command through the handlers. Returns whether one handled it.
    pub fn dispatch(&mut self, command: Command) -> bool {
        let mut txn = Transaction::new(&mut self.state, self.version);
        let mut handled_by = None;
        for handler in self.bus.handlers_mut() {
            match handler.handle(&command, &mut txn) {
                Ok(true) => {
                    handled_by = Some(handler.name());
                    break;
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(handler = handler.name(), ?command, %error, "command failed, rolling back");
                    txn.rollback();
                    return false;
                }
            }
        }
        trace!(?command, handler = ?handled_by, "command dispatched");

        let record = txn.finish();
        let deferred = self.commit(record);
        for command in deferred {
            self.dispatch(command);
        }
        handled_by.is_some()
    }

    /// Apply programmatic changes as one local transaction
    pub fn update<F>(&mut self, f: F) -> Result<(), EditorError>
    where
        F: FnOnce(&mut Transaction) -> Result<(), EditorError>,
    {
        let mut txn = Transaction::new(&mut self.state, self.version);
        if let Err(error) = f(&mut txn) {
            txn.rollback();
            return Err(error);
        }
        let record = txn.finish();
        let deferred = self.commit(record);
        for command in deferred {
            self.dispatch(command);
        }
        Ok(())
    }

    /// Apply a peer's update under the collaboration tag
    pub fn apply_remote(&mut self, update: &RemoteUpdate) -> Result<(), EditorError> {
        if update.origin_site == self.site() {
            debug!(version = update.version, "ignoring echo of a local update");
            return Ok(());
        }
        let mut txn = Transaction::new(&mut self.state, self.version);
        txn.add_tag(COLLABORATION_TAG);
        let applied = update
            .mutations
            .iter()
            .try_for_each(|mutation| txn.apply(mutation.clone()));
        if let Err(error) = applied {
            warn!(origin_site = update.origin_site, %error, "remote update rejected");
            txn.rollback();
            return Err(error);
        }
        let record = txn.finish();
        self.commit(record);
        Ok(())
    }

    /// Local updates committed since the last call
    pub fn take_outgoing(&mut self) -> Vec<RemoteUpdate> {
        self.outbox.drain()
    }

    pub fn undo(&mut self) -> bool {
        let Some(batch) = self.history.pop_undo() else {
            return false;
        };
        let mut txn = Transaction::new(&mut self.state, self.version);
        txn.add_tag(HISTORIC_TAG);
        let replayed = batch
            .undo_steps()
            .try_for_each(|inverse| txn.apply(inverse.clone()));
        if let Err(error) = replayed {
            warn!(%error, "undo failed, history left unchanged");
            txn.rollback();
            self.history.restore_undo(batch);
            return false;
        }
        if let Some(selection) = batch.selection_before {
            restore_selection(&mut txn, selection);
        }
        let record = txn.finish();
        self.commit(record);
        self.history.push_redo(batch);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(batch) = self.history.pop_redo() else {
            return false;
        };
        let mut txn = Transaction::new(&mut self.state, self.version);
        txn.add_tag(HISTORIC_TAG);
        let replayed = batch
            .mutations
            .iter()
            .try_for_each(|mutation| txn.apply(mutation.clone()));
        if let Err(error) = replayed {
            warn!(%error, "redo failed, history left unchanged");
            txn.rollback();
            self.history.restore_redo(batch);
            return false;
        }
        if let Some(selection) = batch.selection_after {
            restore_selection(&mut txn, selection);
        }
        let record = txn.finish();
        self.commit(record);
        self.history.restore_undo(batch);
        true
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Record, post-process, replicate and announce a finished transaction.
    /// Returns the commands it deferred.
    fn commit(&mut self, mut record: TransactionRecord) -> Vec<Command> {
        let changed = !record.batch.is_empty();
        if changed {
            self.version += 1;
        }
        let remote = is_remote(&record.tags);
        let historic = record.tags.contains(HISTORIC_TAG);
        let mut update = CommittedUpdate::from_record(self.version, &mut record);

        if changed && !remote && !historic {
            if record.tags.contains(HISTORY_MERGE_TAG) {
                self.history.merge_into_last(record.batch);
            } else {
                self.history.push_batch(record.batch);
            }
            self.run_post_effects(&mut update);
        }

        if changed && !remote {
            self.outbox.push(RemoteUpdate::new(
                self.site(),
                self.version,
                update.mutations.clone(),
            ));
        }

        if changed || !update.events.is_empty() {
            if changed {
                info!(version = self.version, tags = ?update.tags, mutations = update.mutations.len(), "transaction committed");
            }
            for listener in &mut self.listeners {
                listener.on_update(&update, &self.state.document);
            }
        }
        record.deferred
    }

    /// One follow-up transaction for every post-effect, folded into the
    /// primary's undo entry and update
    fn run_post_effects(&mut self, update: &mut CommittedUpdate) {
        if self.effects.is_empty() {
            return;
        }
        let mut txn = Transaction::new(&mut self.state, self.version);
        txn.add_tag(SUGGESTED_EDITS_TAG);
        txn.add_tag(HISTORY_MERGE_TAG);
        if let Err(error) = self.effects.run(update, &mut txn) {
            warn!(%error, "post-effect failed, follow-up discarded");
            txn.rollback();
            return;
        }

        let mut record = txn.finish();
        update.events.append(&mut record.events);
        if !record.batch.is_empty() {
            trace!(mutations = record.batch.len(), "post-effects applied");
            update.mutations.extend(record.batch.mutations.iter().cloned());
            self.history.merge_into_last(record.batch);
        }
    }
}

/// Put back a recorded selection if its points still exist
fn restore_selection(txn: &mut Transaction, selection: Selection) {
    let doc = txn.document();
    if doc.is_valid_point(selection.anchor) && doc.is_valid_point(selection.focus) {
        txn.set_selection(Some(selection));
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("version", &self.version)
            .field("site", &self.site())
            .field("nodes", &self.state.document.len())
            .field("handlers", &self.bus.names())
            .field("undo_levels", &self.history.undo_levels())
            .finish()
    }
}
