//! DOM import/export.
//!
//! Wrappers map to `ins`/`del` (inline) or `div` (block) elements carrying
//! `data-suggestion-id`, `data-author-id`, `data-author-name` and
//! `data-timestamp`. An element with missing or invalid attributes is not
//! converted; its children are imported in its place.

use crate::error::DocumentResult;
use crate::import::{self, Imported};
use crate::node::{NodeKey, NodeKind, SuggestionMeta, WrapperKind};
use crate::tree::Document;
use std::collections::BTreeMap;

pub const ATTR_SUGGESTION_ID: &str = "data-suggestion-id";
pub const ATTR_AUTHOR_ID: &str = "data-author-id";
pub const ATTR_AUTHOR_NAME: &str = "data-author-name";
pub const ATTR_TIMESTAMP: &str = "data-timestamp";

#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(DomElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DomElement {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<DomNode>,
}

impl DomElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attributes
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }
}

impl DomNode {
    pub fn text(text: impl Into<String>) -> Self {
        DomNode::Text(text.into())
    }
}

impl From<DomElement> for DomNode {
    fn from(element: DomElement) -> Self {
        DomNode::Element(element)
    }
}

impl Document {
    /// Export the root's children as DOM nodes
    pub fn to_dom(&self) -> DocumentResult<Vec<DomNode>> {
        self.children(self.root())
            .iter()
            .map(|child| self.export_dom(*child))
            .collect()
    }

    fn export_dom(&self, key: NodeKey) -> DocumentResult<DomNode> {
        let node = self.node(key)?;
        let mut element = match &node.kind {
            NodeKind::Text(text) => return Ok(DomNode::Text(text.clone())),
            NodeKind::Root => DomElement::new("div"),
            NodeKind::Paragraph => DomElement::new("p"),
            NodeKind::Suggestion { kind, meta } => DomElement::new(kind.dom_tag())
                .attr("class", kind.css_classes())
                .attr(ATTR_SUGGESTION_ID, meta.suggestion_id.as_str())
                .attr(ATTR_AUTHOR_ID, meta.author_user_id.as_str())
                .attr(ATTR_AUTHOR_NAME, meta.author_name.as_str())
                .attr(ATTR_TIMESTAMP, meta.timestamp_ms.to_string()),
        };
        for child in &node.children {
            element.children.push(self.export_dom(*child)?);
        }
        Ok(DomNode::Element(element))
    }

    pub fn to_html(&self) -> DocumentResult<String> {
        let mut out = String::new();
        for node in self.to_dom()? {
            write_html(&node, &mut out);
        }
        Ok(out)
    }

    /// Lenient DOM import with fresh keys for `site`
    pub fn from_dom(site: u32, nodes: &[DomNode]) -> Document {
        let mut doc = Document::new(site);
        import::build(&mut doc, nodes.iter().map(import_dom).collect());
        doc
    }
}

fn import_dom(node: &DomNode) -> Imported {
    match node {
        DomNode::Text(text) => Imported::Text(text.clone()),
        DomNode::Element(element) => {
            let children = element.children.iter().map(import_dom).collect();
            if element.tag.eq_ignore_ascii_case("p") {
                return Imported::Paragraph(children);
            }
            match (wrapper_kind(element), element_meta(element)) {
                (Some(kind), Some(meta)) => Imported::Wrapper {
                    kind,
                    meta,
                    children,
                },
                _ => Imported::Transparent(children),
            }
        }
    }
}

fn wrapper_kind(element: &DomElement) -> Option<WrapperKind> {
    let tag = element.tag.to_ascii_lowercase();
    let insertion = if element.has_class("suggestion-insertion") {
        true
    } else if element.has_class("suggestion-deletion") {
        false
    } else {
        match tag.as_str() {
            "ins" => true,
            "del" => false,
            _ => return None,
        }
    };
    let inline = if element.has_class("suggestion-inline") {
        true
    } else if element.has_class("suggestion-block") {
        false
    } else {
        tag != "div"
    };
    Some(if insertion {
        WrapperKind::insertion(inline)
    } else {
        WrapperKind::deletion(inline)
    })
}

fn element_meta(element: &DomElement) -> Option<SuggestionMeta> {
    let attr = |name: &str| element.attributes.get(name).cloned();
    Some(SuggestionMeta {
        suggestion_id: attr(ATTR_SUGGESTION_ID).filter(|id| !id.is_empty())?,
        author_user_id: attr(ATTR_AUTHOR_ID)?,
        author_name: attr(ATTR_AUTHOR_NAME)?,
        timestamp_ms: attr(ATTR_TIMESTAMP)?.trim().parse().ok()?,
    })
}

fn write_html(node: &DomNode, out: &mut String) {
    match node {
        DomNode::Text(text) => out.push_str(&escape(text)),
        DomNode::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape(value));
                out.push('"');
            }
            out.push('>');
            for child in &element.children {
                write_html(child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ins(id: &str, timestamp: &str) -> DomElement {
        DomElement::new("ins")
            .attr("class", "suggestion-insertion suggestion-inline")
            .attr(ATTR_SUGGESTION_ID, id)
            .attr(ATTR_AUTHOR_ID, "u1")
            .attr(ATTR_AUTHOR_NAME, "Ada")
            .attr(ATTR_TIMESTAMP, timestamp)
    }

    #[test]
    fn test_import_converts_marked_elements() {
        let dom = vec![DomElement::new("p")
            .child(DomNode::text("a"))
            .child(ins("s1", "10").child(DomNode::text("b")).into())
            .into()];
        let doc = Document::from_dom(1, &dom);
        let paragraph = doc.paragraph(0).unwrap();
        let wrapper = doc.children(paragraph)[1];

        let (kind, meta) = doc.kind(wrapper).unwrap().wrapper().unwrap();
        assert_eq!(kind, WrapperKind::InsertionInline);
        assert_eq!(meta.timestamp_ms, 10);
        assert_eq!(doc.plain_text(), "ab");
    }

    #[test]
    fn test_invalid_timestamp_keeps_children_only() {
        let dom = vec![DomElement::new("p")
            .child(ins("s1", "yesterday").child(DomNode::text("b")).into())
            .into()];
        let doc = Document::from_dom(1, &dom);
        let paragraph = doc.paragraph(0).unwrap();

        assert_eq!(doc.children(paragraph).len(), 1);
        assert!(doc.is_text(doc.children(paragraph)[0]));
    }

    #[test]
    fn test_to_html_escapes_text() {
        let doc = Document::from_paragraphs(1, &["a < b & c"]);
        assert_eq!(doc.to_html().unwrap(), "<p>a &lt; b &amp; c</p>");
    }
}
