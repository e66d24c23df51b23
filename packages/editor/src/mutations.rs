//! # Tree Mutations
//!
//! The four primitive operations every edit is expressed in. They are the
//! unit of undo/redo and of replication to collaborating peers.
//!
//! ## Mutation Semantics
//!
//! ### InsertSubtree
//! - Attaches a serialized subtree whose nodes already carry keys
//! - Index is clamped to the parent's child count
//! - Replaying the same subtree recreates the same keys
//!
//! ### RemoveNode
//! - Removes node and all descendants
//! - The inverse re-inserts the captured subtree at the old position
//!
//! ### MoveNode
//! - Detach, then insert under the new parent (clamped)
//! - Fails if it would create a cycle
//!
//! ### SetText
//! - Atomic replacement (not character diff)
//! - Last write wins if concurrent edits

use redline_document::{Document, DocumentError, NodeKey, SerializedNode, ROOT_KEY};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    /// Attach a keyed subtree under `parent` at `index`
    InsertSubtree {
        parent: NodeKey,
        index: usize,
        node: SerializedNode,
    },

    /// Remove a node and its descendants
    RemoveNode { key: NodeKey },

    /// Move a node to a new parent at index
    MoveNode {
        key: NodeKey,
        new_parent: NodeKey,
        index: usize,
    },

    /// Replace the content of a text node
    SetText { key: NodeKey, text: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Cannot remove or move the root node")]
    RootNode,

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
}

impl Mutation {
    /// Apply mutation to the tree with validation
    pub fn apply(&self, doc: &mut Document) -> Result<(), MutationError> {
        self.validate(doc)?;

        match self {
            Mutation::InsertSubtree {
                parent,
                index,
                node,
            } => {
                doc.insert_subtree(*parent, *index, node)?;
            }
            Mutation::RemoveNode { key } => {
                doc.remove_subtree(*key)?;
            }
            Mutation::MoveNode {
                key,
                new_parent,
                index,
            } => {
                doc.move_node(*key, *new_parent, *index)?;
            }
            Mutation::SetText { key, text } => {
                doc.set_text(*key, text.clone())?;
            }
        }
        Ok(())
    }

    /// Compute the mutation that undoes `self` against the current tree.
    /// Must be called before `apply`.
    pub fn to_inverse(&self, doc: &Document) -> Result<Mutation, MutationError> {
        match self {
            Mutation::InsertSubtree { node, .. } => {
                let key = node
                    .key
                    .ok_or(MutationError::Document(DocumentError::MissingKey))?;
                Ok(Mutation::RemoveNode { key })
            }
            Mutation::RemoveNode { key } => {
                let parent = doc
                    .parent(*key)
                    .ok_or(DocumentError::ParentNotFound(*key))?;
                let index = doc
                    .index_in_parent(*key)
                    .ok_or(DocumentError::ParentNotFound(*key))?;
                Ok(Mutation::InsertSubtree {
                    parent,
                    index,
                    node: doc.export_subtree(*key, true)?,
                })
            }
            Mutation::MoveNode { key, .. } => {
                let parent = doc
                    .parent(*key)
                    .ok_or(DocumentError::ParentNotFound(*key))?;
                let index = doc
                    .index_in_parent(*key)
                    .ok_or(DocumentError::ParentNotFound(*key))?;
                Ok(Mutation::MoveNode {
                    key: *key,
                    new_parent: parent,
                    index,
                })
            }
            Mutation::SetText { key, .. } => {
                let text = doc.text(*key).ok_or(DocumentError::NotText(*key))?;
                Ok(Mutation::SetText {
                    key: *key,
                    text: text.to_string(),
                })
            }
        }
    }

    /// Apply and return the inverse
    pub fn apply_with_inverse(&self, doc: &mut Document) -> Result<Mutation, MutationError> {
        let inverse = self.to_inverse(doc)?;
        self.apply(doc)?;
        Ok(inverse)
    }

    /// Validate mutation against the current tree
    pub fn validate(&self, doc: &Document) -> Result<(), MutationError> {
        match self {
            Mutation::InsertSubtree { parent, node, .. } => {
                let parent_kind = doc
                    .kind(*parent)
                    .ok_or(DocumentError::ParentNotFound(*parent))?;
                if !parent_kind.can_contain_children() {
                    return Err(DocumentError::CannotHaveChildren(*parent).into());
                }
                if node.key.is_none() {
                    return Err(DocumentError::MissingKey.into());
                }
                if node.node_type == "root" {
                    return Err(MutationError::InvalidStructure(
                        "cannot insert a root node".to_string(),
                    ));
                }
            }
            Mutation::RemoveNode { key } => {
                if *key == ROOT_KEY {
                    return Err(MutationError::RootNode);
                }
                doc.node(*key)?;
            }
            Mutation::MoveNode {
                key, new_parent, ..
            } => {
                if *key == ROOT_KEY {
                    return Err(MutationError::RootNode);
                }
                doc.node(*key)?;
                doc.node(*new_parent)?;
                if doc.is_ancestor_or_self(*key, *new_parent) {
                    return Err(DocumentError::CycleDetected(*key).into());
                }
            }
            Mutation::SetText { key, .. } => {
                if !doc.is_text(*key) {
                    return Err(match doc.contains(*key) {
                        true => DocumentError::NotText(*key),
                        false => DocumentError::NodeNotFound(*key),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Key of the node this mutation targets (the new node for inserts)
    pub fn target(&self) -> Option<NodeKey> {
        match self {
            Mutation::InsertSubtree { node, .. } => node.key,
            Mutation::RemoveNode { key }
            | Mutation::MoveNode { key, .. }
            | Mutation::SetText { key, .. } => Some(*key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_serialization() {
        let mutation = Mutation::SetText {
            key: NodeKey::new(1, 2),
            text: "Hello".to_string(),
        };

        let json = serde_json::to_string(&mutation).unwrap();
        let deserialized: Mutation = serde_json::from_str(&json).unwrap();

        assert_eq!(mutation, deserialized);
    }

    #[test]
    fn test_validation_rejects_root_removal() {
        let doc = Document::from_paragraphs(1, &["a"]);
        let mutation = Mutation::RemoveNode { key: ROOT_KEY };
        assert_eq!(mutation.validate(&doc), Err(MutationError::RootNode));
    }

    #[test]
    fn test_inverse_restores_removed_subtree() {
        let mut doc = Document::from_paragraphs(1, &["a", "b"]);
        let first = doc.paragraph(0).unwrap();

        let inverse = Mutation::RemoveNode { key: first }
            .apply_with_inverse(&mut doc)
            .unwrap();
        assert_eq!(doc.plain_text(), "b");

        inverse.apply(&mut doc).unwrap();
        assert_eq!(doc.plain_text(), "a\nb");
        assert_eq!(doc.paragraph(0), Some(first));
    }

    #[test]
    fn test_move_inverse_returns_to_origin() {
        let mut doc = Document::from_paragraphs(1, &["a", "b"]);
        let first = doc.paragraph(0).unwrap();

        let inverse = Mutation::MoveNode {
            key: first,
            new_parent: ROOT_KEY,
            index: 1,
        }
        .apply_with_inverse(&mut doc)
        .unwrap();
        assert_eq!(doc.plain_text(), "b\na");

        inverse.apply(&mut doc).unwrap();
        assert_eq!(doc.plain_text(), "a\nb");
    }

    #[test]
    fn test_set_text_on_missing_node() {
        let doc = Document::from_paragraphs(1, &["a"]);
        let mutation = Mutation::SetText {
            key: NodeKey::new(9, 9),
            text: "x".to_string(),
        };
        assert!(matches!(
            mutation.validate(&doc),
            Err(MutationError::Document(DocumentError::NodeNotFound(_)))
        ));
    }
}
