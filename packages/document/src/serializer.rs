//! # JSON Serialization
//!
//! The persisted editor state is `{"root": SerializedNode}`. Keys are only
//! written when a subtree travels inside a mutation (history replay and
//! remote updates); exported documents omit them.
//!
//! Import is lenient: the JSON is walked as a `serde_json::Value` so that a
//! malformed node never fails the whole document.

use crate::error::{DocumentError, DocumentResult};
use crate::import::{self, Imported};
use crate::node::{NodeKey, NodeKind, SuggestionMeta, WrapperKind};
use crate::tree::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NODE_VERSION: u32 = 1;

fn default_version() -> u32 {
    NODE_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<NodeKey>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SerializedNode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
}

impl SerializedNode {
    fn bare(node_type: &str) -> Self {
        Self {
            node_type: node_type.to_string(),
            version: NODE_VERSION,
            key: None,
            children: Vec::new(),
            text: None,
            suggestion_id: None,
            author_user_id: None,
            author_name: None,
            timestamp_ms: None,
        }
    }

    pub fn from_kind(kind: &NodeKind) -> Self {
        let mut node = Self::bare(kind.node_type());
        match kind {
            NodeKind::Root | NodeKind::Paragraph => {}
            NodeKind::Text(text) => node.text = Some(text.clone()),
            NodeKind::Suggestion { meta, .. } => {
                node.suggestion_id = Some(meta.suggestion_id.clone());
                node.author_user_id = Some(meta.author_user_id.clone());
                node.author_name = Some(meta.author_name.clone());
                node.timestamp_ms = Some(meta.timestamp_ms);
            }
        }
        node
    }

    pub fn text(key: NodeKey, text: impl Into<String>) -> Self {
        Self::from_kind(&NodeKind::text(text)).with_key(key)
    }

    pub fn paragraph(key: NodeKey, children: Vec<SerializedNode>) -> Self {
        Self::from_kind(&NodeKind::Paragraph)
            .with_key(key)
            .with_children(children)
    }

    pub fn wrapper(
        key: NodeKey,
        kind: WrapperKind,
        meta: SuggestionMeta,
        children: Vec<SerializedNode>,
    ) -> Self {
        Self::from_kind(&NodeKind::suggestion(kind, meta))
            .with_key(key)
            .with_children(children)
    }

    pub fn with_key(mut self, key: NodeKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_children(mut self, children: Vec<SerializedNode>) -> Self {
        self.children = children;
        self
    }

    /// Strict conversion; every wrapper attribute must be present
    pub fn to_kind(&self) -> DocumentResult<NodeKind> {
        match self.node_type.as_str() {
            "root" => Ok(NodeKind::Root),
            "paragraph" => Ok(NodeKind::Paragraph),
            "text" => self
                .text
                .clone()
                .map(NodeKind::Text)
                .ok_or_else(|| DocumentError::InvalidNode("text node without text".to_string())),
            other => {
                let kind = WrapperKind::from_node_type(other)
                    .ok_or_else(|| DocumentError::InvalidNode(format!("unknown type {other}")))?;
                let meta = self.meta().ok_or_else(|| {
                    DocumentError::InvalidNode(format!("{other} without suggestion metadata"))
                })?;
                Ok(NodeKind::suggestion(kind, meta))
            }
        }
    }

    fn meta(&self) -> Option<SuggestionMeta> {
        Some(SuggestionMeta {
            suggestion_id: self.suggestion_id.clone().filter(|id| !id.is_empty())?,
            author_user_id: self.author_user_id.clone()?,
            author_name: self.author_name.clone()?,
            timestamp_ms: self.timestamp_ms?,
        })
    }

    /// Keys of every node in this subtree, preorder
    pub fn keys(&self) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys(&self, out: &mut Vec<NodeKey>) {
        if let Some(key) = self.key {
            out.push(key);
        }
        for child in &self.children {
            child.collect_keys(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedState {
    pub root: SerializedNode,
}

impl Document {
    pub fn to_state(&self) -> DocumentResult<SerializedState> {
        Ok(SerializedState {
            root: self.export_subtree(self.root(), false)?,
        })
    }

    pub fn to_json(&self) -> DocumentResult<String> {
        Ok(serde_json::to_string(&self.to_state()?)?)
    }

    pub fn to_json_pretty(&self) -> DocumentResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_state()?)?)
    }

    /// Lenient import of `{"root": ...}` with fresh keys for `site`.
    /// Only invalid JSON syntax is an error.
    pub fn from_json(site: u32, json: &str) -> DocumentResult<Document> {
        let value: Value = serde_json::from_str(json)?;
        let root = value.get("root").unwrap_or(&value);
        let items = match root.get("type").and_then(Value::as_str) {
            Some("root") => children_of(root),
            _ => import_value(root).into_iter().collect(),
        };
        let mut doc = Document::new(site);
        import::build(&mut doc, items);
        Ok(doc)
    }
}

fn children_of(value: &Value) -> Vec<Imported> {
    value
        .get("children")
        .and_then(Value::as_array)
        .map(|children| children.iter().filter_map(import_value).collect())
        .unwrap_or_default()
}

fn import_value(value: &Value) -> Option<Imported> {
    let node_type = value.get("type").and_then(Value::as_str)?;
    let children = children_of(value);
    let item = match node_type {
        "paragraph" => Imported::Paragraph(children),
        "text" => Imported::Text(value.get("text")?.as_str()?.to_string()),
        other => match (WrapperKind::from_node_type(other), value_meta(value)) {
            (Some(kind), Some(meta)) => Imported::Wrapper {
                kind,
                meta,
                children,
            },
            _ => {
                tracing::debug!(node_type = other, "skipping unrecognized node, keeping children");
                Imported::Transparent(children)
            }
        },
    };
    Some(item)
}

fn value_meta(value: &Value) -> Option<SuggestionMeta> {
    let string = |field: &str| value.get(field).and_then(Value::as_str).map(str::to_string);
    Some(SuggestionMeta {
        suggestion_id: string("suggestionId").filter(|id| !id.is_empty())?,
        author_user_id: string("authorUserId")?,
        author_name: string("authorName")?,
        timestamp_ms: value.get("timestampMs").and_then(Value::as_i64)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Author;

    #[test]
    fn test_wrapper_serializes_camel_case_fields() {
        let meta = SuggestionMeta::new("s1", &Author::new("u1", "Ada"), 42);
        let node = SerializedNode::wrapper(NodeKey(5), WrapperKind::InsertionInline, meta, vec![]);
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["type"], "suggestion-insertion-inline");
        assert_eq!(json["suggestionId"], "s1");
        assert_eq!(json["authorUserId"], "u1");
        assert_eq!(json["timestampMs"], 42);
        assert!(json.get("children").is_none());
    }

    #[test]
    fn test_to_kind_requires_metadata() {
        let mut node = SerializedNode::from_kind(&NodeKind::Paragraph);
        node.node_type = "suggestion-deletion-block".to_string();
        assert!(matches!(node.to_kind(), Err(DocumentError::InvalidNode(_))));
    }

    #[test]
    fn test_from_json_rejects_bad_syntax() {
        assert!(matches!(
            Document::from_json(1, "{not json"),
            Err(DocumentError::Json(_))
        ));
    }
}
