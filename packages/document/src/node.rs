//! # Node Types
//!
//! The document is a tree of four content kinds plus four suggestion wrapper
//! kinds. Wrappers are a tagged union (`WrapperKind`) rather than a class
//! hierarchy so that every `match` over them is exhaustive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a node within the arena.
///
/// The upper 32 bits hold the site (collaborating peer) that allocated the
/// key, the lower 32 bits a per-site clock. Keys allocated by different sites
/// never collide, so replicated mutations address the same nodes everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(pub u64);

impl NodeKey {
    pub fn new(site: u32, clock: u32) -> Self {
        Self(((site as u64) << 32) | clock as u64)
    }

    pub fn site(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn clock(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.site(), self.clock())
    }
}

/// Who is making an edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Attribution carried by every suggestion wrapper. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionMeta {
    pub suggestion_id: String,
    pub author_user_id: String,
    pub author_name: String,
    pub timestamp_ms: i64,
}

impl SuggestionMeta {
    pub fn new(suggestion_id: impl Into<String>, author: &Author, timestamp_ms: i64) -> Self {
        Self {
            suggestion_id: suggestion_id.into(),
            author_user_id: author.id.clone(),
            author_name: author.name.clone(),
            timestamp_ms,
        }
    }

    pub fn is_authored_by(&self, author_id: &str) -> bool {
        self.author_user_id == author_id
    }
}

/// The four suggestion wrapper variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapperKind {
    InsertionInline,
    DeletionInline,
    InsertionBlock,
    DeletionBlock,
}

impl WrapperKind {
    pub const ALL: [WrapperKind; 4] = [
        WrapperKind::InsertionInline,
        WrapperKind::DeletionInline,
        WrapperKind::InsertionBlock,
        WrapperKind::DeletionBlock,
    ];

    pub fn insertion(inline: bool) -> Self {
        if inline {
            WrapperKind::InsertionInline
        } else {
            WrapperKind::InsertionBlock
        }
    }

    pub fn deletion(inline: bool) -> Self {
        if inline {
            WrapperKind::DeletionInline
        } else {
            WrapperKind::DeletionBlock
        }
    }

    pub fn is_insertion(self) -> bool {
        matches!(self, WrapperKind::InsertionInline | WrapperKind::InsertionBlock)
    }

    pub fn is_deletion(self) -> bool {
        !self.is_insertion()
    }

    pub fn is_inline(self) -> bool {
        matches!(self, WrapperKind::InsertionInline | WrapperKind::DeletionInline)
    }

    /// Serialized `type` name
    pub fn node_type(self) -> &'static str {
        match self {
            WrapperKind::InsertionInline => "suggestion-insertion-inline",
            WrapperKind::DeletionInline => "suggestion-deletion-inline",
            WrapperKind::InsertionBlock => "suggestion-insertion-block",
            WrapperKind::DeletionBlock => "suggestion-deletion-block",
        }
    }

    pub fn from_node_type(node_type: &str) -> Option<Self> {
        WrapperKind::ALL
            .into_iter()
            .find(|kind| kind.node_type() == node_type)
    }

    /// DOM class list, e.g. `suggestion-insertion suggestion-inline`
    pub fn css_classes(self) -> &'static str {
        match self {
            WrapperKind::InsertionInline => "suggestion-insertion suggestion-inline",
            WrapperKind::DeletionInline => "suggestion-deletion suggestion-inline",
            WrapperKind::InsertionBlock => "suggestion-insertion suggestion-block",
            WrapperKind::DeletionBlock => "suggestion-deletion suggestion-block",
        }
    }

    /// DOM tag used on export
    pub fn dom_tag(self) -> &'static str {
        match self {
            WrapperKind::InsertionInline => "ins",
            WrapperKind::DeletionInline => "del",
            WrapperKind::InsertionBlock | WrapperKind::DeletionBlock => "div",
        }
    }
}

/// Discriminated node content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Root,
    Paragraph,
    Text(String),
    Suggestion {
        kind: WrapperKind,
        meta: SuggestionMeta,
    },
}

impl NodeKind {
    pub fn text(text: impl Into<String>) -> Self {
        NodeKind::Text(text.into())
    }

    pub fn suggestion(kind: WrapperKind, meta: SuggestionMeta) -> Self {
        NodeKind::Suggestion { kind, meta }
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Paragraph => "paragraph",
            NodeKind::Text(_) => "text",
            NodeKind::Suggestion { kind, .. } => kind.node_type(),
        }
    }

    pub fn is_inline(&self) -> bool {
        match self {
            NodeKind::Text(_) => true,
            NodeKind::Suggestion { kind, .. } => kind.is_inline(),
            NodeKind::Root | NodeKind::Paragraph => false,
        }
    }

    /// Paragraphs and block wrappers
    pub fn is_block(&self) -> bool {
        match self {
            NodeKind::Paragraph => true,
            NodeKind::Suggestion { kind, .. } => !kind.is_inline(),
            NodeKind::Root | NodeKind::Text(_) => false,
        }
    }

    pub fn can_contain_children(&self) -> bool {
        !matches!(self, NodeKind::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn wrapper(&self) -> Option<(WrapperKind, &SuggestionMeta)> {
        match self {
            NodeKind::Suggestion { kind, meta } => Some((*kind, meta)),
            _ => None,
        }
    }
}

/// A node in the arena. Relationships are stored as keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) key: NodeKey,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new(key: NodeKey, kind: NodeKind) -> Self {
        Self {
            key,
            parent: None,
            children: Vec::new(),
            kind,
        }
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}
