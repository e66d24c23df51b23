//! Wrap/unwrap algorithm.
//!
//! `extract_and_wrap` turns a selection into whole nodes (see
//! `Transaction::extract`) and moves each run of consecutive siblings into
//! a wrapper. A `WrapperFactory` decides, per node, whether it is removed
//! outright and, per run, which wrapper receives it.

use super::query;
use crate::errors::EditorError;
use crate::transaction::Transaction;
use redline_document::{Document, NodeKey, Point, Selection, SuggestionMeta, WrapperKind};
use tracing::trace;

/// Where a run of nodes goes
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    /// Into a new wrapper inserted before the run
    New(WrapperKind, SuggestionMeta),
    /// To the end of an existing wrapper
    Append(NodeKey),
    /// To the start of an existing wrapper
    Prepend(NodeKey),
}

pub trait WrapperFactory {
    /// `false` removes the node instead of wrapping it
    fn keep(&mut self, doc: &Document, node: NodeKey) -> bool;

    /// Choose the wrapper for a run of consecutive siblings
    fn place(&mut self, doc: &Document, run: &[NodeKey], inline: bool) -> Placement;

    /// Whether an existing deletion between two members joins their run
    fn bridges_deletions(&self) -> bool {
        false
    }

    /// Whether a bridged wrapper is dissolved into the receiving wrapper
    /// rather than nested inside it
    fn absorbs(&self, _doc: &Document, _wrapper: NodeKey) -> bool {
        false
    }
}

/// Wraps every run in a new wrapper of one suggestion
#[derive(Debug, Clone)]
pub struct NewWrapperFactory {
    insertion: bool,
    meta: SuggestionMeta,
}

impl NewWrapperFactory {
    pub fn insertion(meta: SuggestionMeta) -> Self {
        Self {
            insertion: true,
            meta,
        }
    }

    pub fn deletion(meta: SuggestionMeta) -> Self {
        Self {
            insertion: false,
            meta,
        }
    }
}

impl WrapperFactory for NewWrapperFactory {
    fn keep(&mut self, _doc: &Document, _node: NodeKey) -> bool {
        true
    }

    fn place(&mut self, _doc: &Document, _run: &[NodeKey], inline: bool) -> Placement {
        let kind = if self.insertion {
            WrapperKind::insertion(inline)
        } else {
            WrapperKind::deletion(inline)
        };
        Placement::New(kind, self.meta.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrapOutcome {
    /// Wrappers that received nodes, in document order
    pub wrappers: Vec<NodeKey>,
    /// Nodes removed outright
    pub removed: Vec<NodeKey>,
    /// Where the caret was collapsed to
    pub caret: Option<Point>,
}

impl WrapOutcome {
    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty() && self.removed.is_empty()
    }
}

/// Extract the selected content, wrap it and collapse the selection just
/// before the first wrapper. Text already inside deletion wrappers is left
/// alone.
pub fn extract_and_wrap(
    txn: &mut Transaction,
    selection: &Selection,
    factory: &mut dyn WrapperFactory,
) -> Result<WrapOutcome, EditorError> {
    let (start, end) = txn.document().ordered(selection);
    let nodes = txn.extract(start, end, &query::skip_deleted)?;
    trace!(count = nodes.len(), "extracted nodes for wrapping");

    let mut outcome = WrapOutcome::default();
    if nodes.is_empty() {
        return Ok(outcome);
    }

    let decisions: Vec<(NodeKey, bool)> = nodes
        .iter()
        .map(|node| (*node, factory.keep(txn.document(), *node)))
        .collect();

    let mut caret = None;
    if decisions.iter().any(|(_, keep)| !keep) {
        caret = txn.caret_before(nodes[0])?;
    }
    for (node, keep) in &decisions {
        if !keep {
            txn.remove(*node)?;
            outcome.removed.push(*node);
        }
    }

    let kept: Vec<NodeKey> = decisions
        .into_iter()
        .filter(|(_, keep)| *keep)
        .map(|(node, _)| node)
        .collect();
    outcome.wrappers = wrap_nodes(txn, &kept, factory)?;

    if let Some(first) = first_in_document_order(txn.document(), &outcome.wrappers) {
        caret = txn.caret_before(first)?;
    }
    if let Some(point) = caret {
        txn.set_caret(point);
    }
    outcome.caret = caret;
    Ok(outcome)
}

fn first_in_document_order(doc: &Document, keys: &[NodeKey]) -> Option<NodeKey> {
    keys.iter().copied().min_by_key(|key| doc.path(*key))
}

/// Group nodes (in document order) into runs of consecutive siblings.
/// Empty text nodes between two members do not break a run.
pub fn group_runs(doc: &Document, nodes: &[NodeKey]) -> Vec<Vec<NodeKey>> {
    group_runs_bridging(doc, nodes, false)
}

/// Like `group_runs`, optionally also bridging existing deletions
fn group_runs_bridging(doc: &Document, nodes: &[NodeKey], deletions: bool) -> Vec<Vec<NodeKey>> {
    let mut runs: Vec<Vec<NodeKey>> = Vec::new();
    for node in nodes {
        let continues = runs
            .last()
            .and_then(|run| run.last())
            .is_some_and(|previous| follows(doc, *previous, *node, deletions));
        match runs.last_mut() {
            Some(run) if continues => run.push(*node),
            _ => runs.push(vec![*node]),
        }
    }
    runs
}

fn follows(doc: &Document, previous: NodeKey, node: NodeKey, deletions: bool) -> bool {
    if doc.parent(previous) != doc.parent(node) {
        return false;
    }
    let mut current = doc.next_sibling(previous);
    while let Some(sibling) = current {
        if sibling == node {
            return true;
        }
        let empty_text = doc.is_text(sibling) && doc.text_len(sibling) == 0;
        if !(empty_text || deletions && query::skip_deleted(doc, sibling)) {
            return false;
        }
        current = doc.next_sibling(sibling);
    }
    false
}

/// Move each run of `nodes` into the wrapper the factory picks.
/// Returns the receiving wrappers, one per run.
pub fn wrap_nodes(
    txn: &mut Transaction,
    nodes: &[NodeKey],
    factory: &mut dyn WrapperFactory,
) -> Result<Vec<NodeKey>, EditorError> {
    let runs = group_runs_bridging(txn.document(), nodes, factory.bridges_deletions());
    let mut wrappers = Vec::with_capacity(runs.len());

    for run in runs {
        let doc = txn.document();
        let first = run[0];
        let inline = doc.kind(first).is_some_and(|kind| kind.is_inline());
        let parent = doc
            .parent(first)
            .ok_or(redline_document::DocumentError::ParentNotFound(first))?;
        let index = doc
            .index_in_parent(first)
            .ok_or(redline_document::DocumentError::ParentNotFound(first))?;
        let members = expand_run(doc, &run);

        let wrapper = match factory.place(doc, &run, inline) {
            Placement::New(kind, meta) => {
                let wrapper = txn.insert_wrapper(parent, index, kind, meta)?;
                for (i, node) in members.iter().enumerate() {
                    txn.move_node(*node, wrapper, i)?;
                }
                wrapper
            }
            Placement::Append(wrapper) => {
                for node in &members {
                    let end = txn.document().children(wrapper).len();
                    txn.move_node(*node, wrapper, end)?;
                }
                wrapper
            }
            Placement::Prepend(wrapper) => {
                for (i, node) in members.iter().enumerate() {
                    txn.move_node(*node, wrapper, i)?;
                }
                wrapper
            }
        };
        for member in &members {
            if query::wrapper_kind(txn.document(), *member).is_some()
                && factory.absorbs(txn.document(), *member)
            {
                trace!(absorbed = %member, into = %wrapper, "dissolving bridged wrapper");
                unwrap(txn, *member)?;
            }
        }
        wrappers.push(wrapper);
    }
    Ok(wrappers)
}

/// A run plus the empty text nodes sitting between its members
fn expand_run(doc: &Document, run: &[NodeKey]) -> Vec<NodeKey> {
    let (Some(first), Some(last)) = (run.first(), run.last()) else {
        return Vec::new();
    };
    let Some(parent) = doc.parent(*first) else {
        return run.to_vec();
    };
    let children = doc.children(parent);
    match (
        children.iter().position(|c| c == first),
        children.iter().position(|c| c == last),
    ) {
        (Some(from), Some(to)) if from <= to => children[from..=to].to_vec(),
        _ => run.to_vec(),
    }
}

/// Replace a wrapper by its children, in order
pub fn unwrap(txn: &mut Transaction, wrapper: NodeKey) -> Result<(), EditorError> {
    let doc = txn.document();
    let parent = doc
        .parent(wrapper)
        .ok_or(redline_document::DocumentError::ParentNotFound(wrapper))?;
    let index = doc
        .index_in_parent(wrapper)
        .ok_or(redline_document::DocumentError::ParentNotFound(wrapper))?;
    let children = doc.children(wrapper).to_vec();

    for (i, child) in children.iter().enumerate() {
        txn.move_node(*child, parent, index + i)?;
    }
    txn.remove(wrapper)
}
