//! # Thread Synchronizer
//!
//! Keeps the external comment-thread service in step with the suggestions
//! in the tree. Threads are derived, never indexed: `derive_threads` is a
//! pure function of the document, and after every commit the synchronizer
//! diffs a fresh derivation against what it has already published.

use crate::editor::{CommittedUpdate, UpdateListener};
use crate::mode::SuggestEditsContext;
use crate::suggestions::query;
use redline_document::{Document, NodeKey, Visitor, WrapperKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Replacement halves are cut shorter than stand-alone quotes
const REPLACEMENT_HALF_MAX_LEN: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ThreadEvent {
    #[serde(rename_all = "camelCase")]
    Insert {
        thread_id: String,
        quote: String,
        body: String,
    },
    #[serde(rename_all = "camelCase")]
    Update {
        thread_id: String,
        quote: Option<String>,
        body: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Hide { thread_id: String },
}

impl ThreadEvent {
    pub fn thread_id(&self) -> &str {
        match self {
            ThreadEvent::Insert { thread_id, .. }
            | ThreadEvent::Update { thread_id, .. }
            | ThreadEvent::Hide { thread_id } => thread_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadKind {
    Insertion,
    Deletion,
    Replacement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    pub kind: ThreadKind,
    pub quote: String,
    pub body: String,
}

impl ThreadSummary {
    pub fn insert_event(&self) -> ThreadEvent {
        ThreadEvent::Insert {
            thread_id: self.id.clone(),
            quote: self.quote.clone(),
            body: self.body.clone(),
        }
    }

    pub fn update_event(&self) -> ThreadEvent {
        ThreadEvent::Update {
            thread_id: self.id.clone(),
            quote: Some(self.quote.clone()),
            body: Some(self.body.clone()),
        }
    }
}

/// Collapse whitespace and cut to `max_len` characters, ellipsis included
pub fn truncate_for_quote(text: &str, max_len: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_len {
        return collapsed;
    }
    let kept: String = collapsed.chars().take(max_len.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Text of one wrapper, leaving out nested wrappers of other suggestions
struct OwnText<'a> {
    suggestion_id: &'a str,
    text: String,
}

impl Visitor for OwnText<'_> {
    fn visit_text(&mut self, _doc: &Document, _key: NodeKey, text: &str) {
        self.text.push_str(text);
    }

    fn visit_suggestion(
        &mut self,
        doc: &Document,
        key: NodeKey,
        _kind: WrapperKind,
        meta: &redline_document::SuggestionMeta,
    ) {
        if meta.suggestion_id == self.suggestion_id {
            redline_document::walk_children(self, doc, key);
        }
    }
}

fn wrapper_text(doc: &Document, wrapper: NodeKey, suggestion_id: &str) -> String {
    let mut visitor = OwnText {
        suggestion_id,
        text: String::new(),
    };
    redline_document::walk_children(&mut visitor, doc, wrapper);
    visitor.text
}

fn summary_from(id: &str, insertion: Option<String>, deletion: Option<String>, max_len: usize) -> ThreadSummary {
    let (kind, quote, body) = match (insertion, deletion) {
        (Some(inserted), Some(deleted)) => {
            let before = truncate_for_quote(&deleted, REPLACEMENT_HALF_MAX_LEN);
            let after = truncate_for_quote(&inserted, REPLACEMENT_HALF_MAX_LEN);
            let body = match (before.is_empty(), after.is_empty()) {
                (false, false) => format!("Suggested replacement: “{before}” → “{after}”"),
                (true, false) => format!("Suggested replacement: → “{after}”"),
                (false, true) => format!("Suggested replacement: “{before}” → (deleted)"),
                (true, true) => "Suggested replacement.".to_string(),
            };
            (ThreadKind::Replacement, truncate_for_quote(&deleted, max_len), body)
        }
        (Some(inserted), None) => {
            let quote = truncate_for_quote(&inserted, max_len);
            let body = if quote.is_empty() {
                "Suggested insertion.".to_string()
            } else {
                format!("Suggested insertion: “{quote}”")
            };
            (ThreadKind::Insertion, quote, body)
        }
        (None, Some(deleted)) => {
            let quote = truncate_for_quote(&deleted, max_len);
            let body = if quote.is_empty() {
                "Suggested deletion.".to_string()
            } else {
                format!("Suggested deletion: “{quote}”")
            };
            (ThreadKind::Deletion, quote, body)
        }
        (None, None) => (ThreadKind::Insertion, String::new(), "Suggested edit.".to_string()),
    };
    ThreadSummary {
        id: id.to_string(),
        kind,
        quote,
        body,
    }
}

/// One summary per live suggestion id
pub fn derive_threads(doc: &Document, max_len: usize) -> BTreeMap<String, ThreadSummary> {
    query::suggestions(doc)
        .into_iter()
        .map(|(id, nodes)| {
            let collect = |wrappers: &[NodeKey]| {
                (!wrappers.is_empty()).then(|| {
                    wrappers
                        .iter()
                        .map(|w| wrapper_text(doc, *w, &id))
                        .collect::<String>()
                })
            };
            let summary = summary_from(&id, collect(&nodes.insertions), collect(&nodes.deletions), max_len);
            (id, summary)
        })
        .collect()
}

/// Summary of a single suggestion, if it is still in the tree
pub fn summarize(doc: &Document, suggestion_id: &str, max_len: usize) -> Option<ThreadSummary> {
    let nodes = query::find_wrappers(doc, suggestion_id);
    if nodes.is_empty() {
        return None;
    }
    let collect = |wrappers: &[NodeKey]| {
        (!wrappers.is_empty()).then(|| {
            wrappers
                .iter()
                .map(|w| wrapper_text(doc, *w, suggestion_id))
                .collect::<String>()
        })
    };
    Some(summary_from(
        suggestion_id,
        collect(&nodes.insertions),
        collect(&nodes.deletions),
        max_len,
    ))
}

/// Publishes thread events to `SuggestEditsContext` subscribers
pub struct ThreadSynchronizer {
    ctx: Rc<SuggestEditsContext>,
    published: BTreeMap<String, ThreadSummary>,
}

impl ThreadSynchronizer {
    /// Starts from the threads already present in `doc` without
    /// announcing them
    pub fn new(ctx: Rc<SuggestEditsContext>, doc: &Document) -> Self {
        let published = derive_threads(doc, ctx.quote_max_len());
        Self { ctx, published }
    }

    pub fn published(&self) -> &BTreeMap<String, ThreadSummary> {
        &self.published
    }

    fn publish(&self, event: ThreadEvent) {
        debug!(thread_id = event.thread_id(), ?event, "thread event");
        self.ctx.publish_thread(&event);
    }

    /// Apply the events a transaction emitted, skipping anything already
    /// published in that form
    fn apply_hint(&mut self, event: &ThreadEvent, fresh: &BTreeMap<String, ThreadSummary>) {
        let id = event.thread_id();
        match event {
            ThreadEvent::Insert { .. } => {
                if self.published.contains_key(id) {
                    return;
                }
                if let Some(summary) = fresh.get(id) {
                    self.published.insert(id.to_string(), summary.clone());
                    self.publish(summary.insert_event());
                }
            }
            ThreadEvent::Update { .. } => {
                if let (Some(current), Some(summary)) = (self.published.get(id), fresh.get(id)) {
                    if current != summary {
                        self.published.insert(id.to_string(), summary.clone());
                        self.publish(summary.update_event());
                    }
                }
            }
            ThreadEvent::Hide { .. } => {
                if self.published.remove(id).is_some() {
                    self.publish(event.clone());
                }
            }
        }
    }

    /// Diff the published set against a fresh derivation
    pub fn sync(&mut self, doc: &Document, hints: &[ThreadEvent]) {
        let fresh = derive_threads(doc, self.ctx.quote_max_len());
        for hint in hints {
            self.apply_hint(hint, &fresh);
        }

        let vanished: Vec<String> = self
            .published
            .keys()
            .filter(|id| !fresh.contains_key(*id))
            .cloned()
            .collect();
        for id in vanished {
            self.published.remove(&id);
            self.publish(ThreadEvent::Hide { thread_id: id });
        }

        for (id, summary) in fresh {
            match self.published.get(&id) {
                None => {
                    self.publish(summary.insert_event());
                    self.published.insert(id, summary);
                }
                Some(current) if *current != summary => {
                    self.publish(summary.update_event());
                    self.published.insert(id, summary);
                }
                Some(_) => {}
            }
        }
    }
}

impl UpdateListener for ThreadSynchronizer {
    fn on_update(&mut self, update: &CommittedUpdate, doc: &Document) {
        self.sync(doc, &update.events);
    }
}
