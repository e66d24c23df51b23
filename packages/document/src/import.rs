//! Shared lenient tree builder for JSON and DOM import.
//!
//! Both importers first lower their input into `Imported` items and then hand
//! them to `build`, which enforces the content model:
//! - the root and block wrappers hold blocks; stray inline content is gathered
//!   into an implicit paragraph;
//! - paragraphs and inline wrappers hold inline content; block items found
//!   there are flattened into their children.

use crate::node::{NodeKey, NodeKind, SuggestionMeta, WrapperKind};
use crate::tree::Document;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Imported {
    Paragraph(Vec<Imported>),
    Text(String),
    Wrapper {
        kind: WrapperKind,
        meta: SuggestionMeta,
        children: Vec<Imported>,
    },
    /// Unrecognized or malformed node; only its children survive
    Transparent(Vec<Imported>),
}

impl Imported {
    fn is_inline(&self) -> bool {
        match self {
            Imported::Text(_) => true,
            Imported::Wrapper { kind, .. } => kind.is_inline(),
            Imported::Paragraph(_) | Imported::Transparent(_) => false,
        }
    }
}

/// Append `items` under the document root
pub(crate) fn build(doc: &mut Document, items: Vec<Imported>) {
    let root = doc.root();
    build_blocks(doc, root, flatten_transparent(items));
}

fn flatten_transparent(items: Vec<Imported>) -> Vec<Imported> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Imported::Transparent(children) => out.extend(flatten_transparent(children)),
            other => out.push(other),
        }
    }
    out
}

fn build_blocks(doc: &mut Document, parent: NodeKey, items: Vec<Imported>) {
    let mut pending_inline: Vec<Imported> = Vec::new();
    for item in items {
        if item.is_inline() {
            pending_inline.push(item);
            continue;
        }
        flush_implicit_paragraph(doc, parent, &mut pending_inline);
        match item {
            Imported::Paragraph(children) => {
                let paragraph = doc.push_child(parent, NodeKind::Paragraph);
                build_inline(doc, paragraph, flatten_transparent(children));
            }
            Imported::Wrapper {
                kind,
                meta,
                children,
            } => {
                let wrapper = doc.push_child(parent, NodeKind::suggestion(kind, meta));
                build_blocks(doc, wrapper, flatten_transparent(children));
            }
            Imported::Text(_) | Imported::Transparent(_) => {}
        }
    }
    flush_implicit_paragraph(doc, parent, &mut pending_inline);
}

fn flush_implicit_paragraph(doc: &mut Document, parent: NodeKey, pending: &mut Vec<Imported>) {
    if pending.is_empty() {
        return;
    }
    let paragraph = doc.push_child(parent, NodeKind::Paragraph);
    build_inline(doc, paragraph, std::mem::take(pending));
}

fn build_inline(doc: &mut Document, parent: NodeKey, items: Vec<Imported>) {
    for item in items {
        match item {
            Imported::Text(text) => {
                doc.push_child(parent, NodeKind::Text(text));
            }
            Imported::Wrapper {
                kind,
                meta,
                children,
            } if kind.is_inline() => {
                let wrapper = doc.push_child(parent, NodeKind::suggestion(kind, meta));
                build_inline(doc, wrapper, flatten_transparent(children));
            }
            Imported::Wrapper { children, .. }
            | Imported::Paragraph(children)
            | Imported::Transparent(children) => {
                build_inline(doc, parent, flatten_transparent(children));
            }
        }
    }
}
