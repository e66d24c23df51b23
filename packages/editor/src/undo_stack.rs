//! # Undo/Redo Stack
//!
//! Tracks committed transactions and enables undo/redo.
//!
//! ## Design
//!
//! - Each transaction records its mutations and their inverses as one batch
//! - Undo applies the inverses and moves the batch to the redo stack
//! - Redo reapplies the original mutations (same node keys)
//! - New batches clear the redo stack
//! - A `history-merge` transaction folds its batch into the previous entry
//!
//! The stack only stores batches. Applying them happens inside an editor
//! transaction so that selection repair and thread reconciliation run the
//! same way they do for ordinary edits.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut stack = UndoStack::new();
//! stack.push_batch(batch);
//!
//! if let Some(batch) = stack.pop_undo() {
//!     // apply batch.undo_steps() ...
//!     stack.push_redo(batch);
//! }
//! ```

use crate::mutations::Mutation;
use redline_document::Selection;

/// A group of mutations that should be undone/redone together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationBatch {
    /// The mutations in this batch (in application order)
    pub mutations: Vec<Mutation>,

    /// The inverse of each mutation, in the same order as `mutations`.
    /// Undo replays them back to front, see `undo_steps`.
    pub inverses: Vec<Mutation>,

    /// Optional description of this batch
    pub description: Option<String>,

    /// Selection before the first mutation, restored on undo
    pub selection_before: Option<Selection>,

    /// Selection after the last mutation, restored on redo
    pub selection_after: Option<Selection>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a single-mutation batch
    pub fn single(mutation: Mutation, inverse: Mutation) -> Self {
        Self::from_mutations(vec![mutation], vec![inverse])
    }

    /// Create a batch from multiple mutations
    pub fn from_mutations(mutations: Vec<Mutation>, inverses: Vec<Mutation>) -> Self {
        Self {
            mutations,
            inverses,
            ..Self::default()
        }
    }

    /// Add a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Record an applied mutation together with its inverse
    pub fn push(&mut self, mutation: Mutation, inverse: Mutation) {
        self.mutations.push(mutation);
        self.inverses.push(inverse);
    }

    /// Inverses in the order that reverts the batch, latest first
    pub fn undo_steps(&self) -> impl Iterator<Item = &Mutation> {
        self.inverses.iter().rev()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Fold a later batch into this one so both undo as a single step
    pub fn merge(&mut self, later: MutationBatch) {
        self.mutations.extend(later.mutations);
        self.inverses.extend(later.inverses);
        if later.selection_after.is_some() {
            self.selection_after = later.selection_after;
        }
        if self.description.is_none() {
            self.description = later.description;
        }
    }
}

/// Undo/redo stack for document editing
#[derive(Debug)]
pub struct UndoStack {
    /// Stack of applied batches (most recent last)
    undo_stack: Vec<MutationBatch>,

    /// Stack of undone batches (most recent last)
    redo_stack: Vec<MutationBatch>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl UndoStack {
    /// Create a new undo stack with default max levels (100)
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    /// Create an undo stack with custom max levels
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    /// Push a batch to the undo stack
    pub fn push_batch(&mut self, batch: MutationBatch) {
        if batch.is_empty() {
            return;
        }
        self.undo_stack.push(batch);
        self.trim();

        // New action invalidates future
        self.redo_stack.clear();
    }

    /// Fold a batch into the most recent entry, or push it if there is none
    pub fn merge_into_last(&mut self, batch: MutationBatch) {
        if batch.is_empty() {
            return;
        }
        match self.undo_stack.last_mut() {
            Some(last) => {
                last.merge(batch);
                self.redo_stack.clear();
            }
            None => self.push_batch(batch),
        }
    }

    fn trim(&mut self) {
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    /// Take the most recent batch for undoing
    pub fn pop_undo(&mut self) -> Option<MutationBatch> {
        self.undo_stack.pop()
    }

    /// Take the most recently undone batch for redoing
    pub fn pop_redo(&mut self) -> Option<MutationBatch> {
        self.redo_stack.pop()
    }

    /// Record a successfully undone batch
    pub fn push_redo(&mut self, batch: MutationBatch) {
        self.redo_stack.push(batch);
    }

    /// Put a batch back on the undo stack without touching redo
    /// (after a redo, or after an undo that failed)
    pub fn restore_undo(&mut self, batch: MutationBatch) {
        self.undo_stack.push(batch);
        self.trim();
    }

    /// Put a batch back on the redo stack after a redo that failed
    pub fn restore_redo(&mut self, batch: MutationBatch) {
        self.redo_stack.push(batch);
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get the number of undo levels available
    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the number of redo levels available
    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all undo/redo history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get description of the next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|batch| batch.description.as_deref())
    }

    /// Get description of the next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|batch| batch.description.as_deref())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}
