//! # Redline Document
//!
//! Rich-text tree model underneath the suggested-edits engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ document: arena tree + selections           │
//! │  - Root / Paragraph / Text                  │
//! │  - Suggestion wrappers (four kinds)         │
//! │  - Points, ordering, caret movement         │
//! └─────────────────────────────────────────────┘
//!          ↑ JSON / DOM import+export ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: transactions, commands, history,    │
//! │         suggestions, threads                │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use redline_document::Document;
//!
//! let doc = Document::from_paragraphs(1, &["hello", "world"]);
//! assert_eq!(doc.plain_text(), "hello\nworld");
//!
//! let json = doc.to_json().unwrap();
//! let copy = Document::from_json(2, &json).unwrap();
//! assert_eq!(copy.plain_text(), doc.plain_text());
//! ```

pub mod dom;
pub mod error;
mod import;
pub mod node;
pub mod selection;
pub mod serializer;
pub mod tree;
pub mod visitor;

pub use dom::{DomElement, DomNode};
pub use error::{DocumentError, DocumentResult};
pub use node::{Author, Node, NodeKey, NodeKind, SuggestionMeta, WrapperKind};
pub use selection::{BlockText, Direction, Granularity, Point, Selection};
pub use serializer::{SerializedNode, SerializedState};
pub use tree::{char_len, split_at_char, Document, ROOT_KEY};
pub use visitor::{walk_children, walk_node, Visitor};
