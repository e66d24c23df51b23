//! # Mode / Permission State
//!
//! Per-editor context shared (via `Rc`) by every suggested-edits handler:
//! the current mode, the capabilities that gate it, the acting author and
//! the observer sets for mode changes and thread events.
//!
//! With only one capability granted the mode is pinned to it, both at
//! construction and whenever capabilities change.

use crate::commands::{Command, CommandHandler};
use crate::config::SuggestEditsConfig;
use crate::errors::EditorError;
use crate::threads::ThreadEvent;
use crate::transaction::Transaction;
use redline_document::Author;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    #[default]
    Editing,
    Suggesting,
}

impl EditorMode {
    pub fn toggled(self) -> Self {
        match self {
            EditorMode::Editing => EditorMode::Suggesting,
            EditorMode::Suggesting => EditorMode::Editing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_edit: bool,
    pub can_suggest: bool,
}

impl Capabilities {
    pub fn allows(self, mode: EditorMode) -> bool {
        match mode {
            EditorMode::Editing => self.can_edit,
            EditorMode::Suggesting => self.can_suggest,
        }
    }

    /// Mode forced by a single granted capability
    fn pinned(self) -> Option<EditorMode> {
        match (self.can_edit, self.can_suggest) {
            (true, false) => Some(EditorMode::Editing),
            (false, true) => Some(EditorMode::Suggesting),
            _ => None,
        }
    }
}

/// Disposer returned by `subscribe`; unsubscribes when dropped
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn dispose(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct ListenerSet<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// Observer set with disposable subscriptions
pub struct Listeners<T> {
    inner: Rc<RefCell<ListenerSet<T>>>,
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListenerSet {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, callback: impl FnMut(&T) + 'static) -> Subscription {
        let mut set = self.inner.borrow_mut();
        let id = set.next_id;
        set.next_id += 1;
        let callback: Callback<T> = Rc::new(RefCell::new(callback));
        set.entries.push((id, callback));

        let weak: Weak<RefCell<ListenerSet<T>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(set) = weak.upgrade() {
                set.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Call every subscriber. A subscriber that is already running (a
    /// re-entrant notify) is skipped.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            if let Ok(mut callback) = callback.try_borrow_mut() {
                (&mut *callback)(value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Mode, capabilities, author and observers for one editor
pub struct SuggestEditsContext {
    mode: Cell<EditorMode>,
    capabilities: Cell<Capabilities>,
    author: RefCell<Author>,
    config: SuggestEditsConfig,
    mode_listeners: Listeners<EditorMode>,
    thread_listeners: Listeners<ThreadEvent>,
}

impl SuggestEditsContext {
    pub fn new(config: SuggestEditsConfig) -> Rc<Self> {
        let capabilities = Capabilities {
            can_edit: config.can_edit,
            can_suggest: config.can_suggest,
        };
        let mode = capabilities.pinned().unwrap_or(config.initial_mode);
        Rc::new(Self {
            mode: Cell::new(mode),
            capabilities: Cell::new(capabilities),
            author: RefCell::new(Author::new(
                config.author_id.clone(),
                config.author_name.clone(),
            )),
            config,
            mode_listeners: Listeners::new(),
            thread_listeners: Listeners::new(),
        })
    }

    pub fn mode(&self) -> EditorMode {
        self.mode.get()
    }

    pub fn is_suggesting(&self) -> bool {
        self.mode() == EditorMode::Suggesting
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities.get()
    }

    pub fn config(&self) -> &SuggestEditsConfig {
        &self.config
    }

    pub fn quote_max_len(&self) -> usize {
        self.config.quote_max_len
    }

    /// Switch mode if the capability for the target mode is granted.
    /// Returns false (and changes nothing) otherwise.
    pub fn set_mode(&self, mode: EditorMode) -> bool {
        if !self.capabilities().allows(mode) {
            debug!(?mode, "mode change refused");
            return false;
        }
        if self.mode.replace(mode) != mode {
            info!(?mode, "editor mode changed");
            self.mode_listeners.notify(&mode);
        }
        true
    }

    pub fn toggle_mode(&self) -> bool {
        self.set_mode(self.mode().toggled())
    }

    /// Replace capabilities and re-apply pinning
    pub fn set_capabilities(&self, capabilities: Capabilities) {
        self.capabilities.set(capabilities);
        if let Some(pinned) = capabilities.pinned() {
            if self.mode.replace(pinned) != pinned {
                info!(mode = ?pinned, "editor mode pinned by capabilities");
                self.mode_listeners.notify(&pinned);
            }
        }
    }

    pub fn author(&self) -> Author {
        self.author.borrow().clone()
    }

    pub fn set_author(&self, author: Author) {
        debug!(author_id = %author.id, "acting author changed");
        *self.author.borrow_mut() = author;
    }

    pub fn subscribe_mode(&self, callback: impl FnMut(&EditorMode) + 'static) -> Subscription {
        self.mode_listeners.subscribe(callback)
    }

    pub fn subscribe_threads(&self, callback: impl FnMut(&ThreadEvent) + 'static) -> Subscription {
        self.thread_listeners.subscribe(callback)
    }

    pub(crate) fn publish_thread(&self, event: &ThreadEvent) {
        self.thread_listeners.notify(event);
    }
}

impl std::fmt::Debug for SuggestEditsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestEditsContext")
            .field("mode", &self.mode())
            .field("capabilities", &self.capabilities())
            .field("author", &self.author.borrow().id)
            .finish()
    }
}

/// Handles `SetMode` and `ToggleMode`
#[derive(Debug)]
pub struct ModeHandler {
    ctx: Rc<SuggestEditsContext>,
}

impl ModeHandler {
    pub fn new(ctx: Rc<SuggestEditsContext>) -> Self {
        Self { ctx }
    }
}

impl CommandHandler for ModeHandler {
    fn name(&self) -> &'static str {
        "suggest-edits-mode"
    }

    fn handle(&mut self, command: &Command, txn: &mut Transaction) -> Result<bool, EditorError> {
        if txn.is_remote() {
            return Ok(false);
        }
        match command {
            Command::SetMode(mode) => Ok(self.ctx.set_mode(*mode)),
            Command::ToggleMode => Ok(self.ctx.toggle_mode()),
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(can_edit: bool, can_suggest: bool, mode: EditorMode) -> Rc<SuggestEditsContext> {
        SuggestEditsContext::new(
            SuggestEditsConfig::default()
                .with_capabilities(can_edit, can_suggest)
                .with_mode(mode),
        )
    }

    #[test]
    fn test_single_capability_pins_mode() {
        assert_eq!(
            context(false, true, EditorMode::Editing).mode(),
            EditorMode::Suggesting
        );
        assert_eq!(
            context(true, false, EditorMode::Suggesting).mode(),
            EditorMode::Editing
        );
    }

    #[test]
    fn test_set_mode_respects_capabilities() {
        let ctx = context(false, true, EditorMode::Suggesting);
        assert!(!ctx.set_mode(EditorMode::Editing));
        assert_eq!(ctx.mode(), EditorMode::Suggesting);
        assert!(!ctx.toggle_mode());
    }

    #[test]
    fn test_capability_change_repins() {
        let ctx = context(true, true, EditorMode::Suggesting);
        ctx.set_capabilities(Capabilities {
            can_edit: true,
            can_suggest: false,
        });
        assert_eq!(ctx.mode(), EditorMode::Editing);
    }

    #[test]
    fn test_mode_observers_and_disposal() {
        let ctx = context(true, true, EditorMode::Editing);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = ctx.subscribe_mode(move |mode| sink.borrow_mut().push(*mode));

        assert!(ctx.set_mode(EditorMode::Suggesting));
        assert!(ctx.set_mode(EditorMode::Suggesting));
        subscription.dispose();
        assert!(ctx.set_mode(EditorMode::Editing));

        assert_eq!(*seen.borrow(), vec![EditorMode::Suggesting]);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let listeners: Listeners<u32> = Listeners::new();
        {
            let _subscription = listeners.subscribe(|_| {});
            assert_eq!(listeners.len(), 1);
        }
        assert!(listeners.is_empty());
    }
}
