//! Per-node result records.

use bytepath_xpath1::{DataSourceNode, NodeType};
use log::trace;
use serde::Serialize;
use std::collections::BTreeMap;

/// What a query reports for one matched node. Owns all of its data, so it
/// outlives the document it was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XPathResult {
    xpath_query: String,
    name: Option<String>,
    content: String,
    attributes: BTreeMap<String, String>,
}

impl XPathResult {
    /// The query that produced this result, exactly as it was passed in.
    pub fn xpath_query(&self) -> &str {
        &self.xpath_query
    }

    /// Local name of a matched element or attribute; `None` for other node kinds.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The node's XPath string-value.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Attributes of a matched element, keyed by local name.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Builds the result record for `node`. Never fails.
pub fn extract<'a, N: DataSourceNode<'a>>(query: &str, node: N) -> XPathResult {
    let node_type = node.node_type();
    let name = match node_type {
        NodeType::Element | NodeType::Attribute => {
            node.name().map(|q| q.local_part.to_string())
        }
        _ => None,
    };

    // Later attributes win when two share a local name in different namespaces.
    let attributes = if node_type == NodeType::Element {
        node.attributes()
            .filter_map(|attr| {
                attr.name()
                    .map(|q| (q.local_part.to_string(), attr.string_value()))
            })
            .collect()
    } else {
        BTreeMap::new()
    };

    trace!("Extracted {:?} {:?} for '{}'", node_type, name, query);
    XPathResult {
        xpath_query: query.to_string(),
        name,
        content: node.string_value(),
        attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasources::{XmlDocument, XmlNode};
    use crate::options::LoadOptions;

    /// Every node of the tree, attributes included, in document order.
    fn nodes_of<'a>(node: XmlNode<'a, 'a>, out: &mut Vec<XmlNode<'a, 'a>>) {
        out.push(node);
        out.extend(node.attributes());
        for child in node.children() {
            nodes_of(child, out);
        }
    }

    #[test]
    fn test_extract_each_node_kind() {
        let xml = r#"<root a:x="1" xmlns:a="urn:a" y="2">text<!--note--><?go now?></root>"#;
        let doc = XmlDocument::parse(xml, &LoadOptions::default()).unwrap();
        let mut nodes = Vec::new();
        nodes_of(doc.root_node(), &mut nodes);
        let results: Vec<_> = nodes.into_iter().map(|n| extract("q", n)).collect();

        // root, <root>, a:x, y, text, comment, pi
        assert_eq!(results.len(), 7);
        assert_eq!(results[0].name(), None);
        assert_eq!(results[0].content(), "text");

        let root = &results[1];
        assert_eq!(root.name(), Some("root"));
        assert_eq!(root.xpath_query(), "q");
        assert_eq!(root.attribute("x"), Some("1"));
        assert_eq!(root.attribute("y"), Some("2"));
        assert_eq!(root.attributes().len(), 2);

        assert_eq!(results[2].name(), Some("x"));
        assert_eq!(results[2].content(), "1");
        assert!(results[2].attributes().is_empty());

        assert_eq!(results[4].name(), None);
        assert_eq!(results[4].content(), "text");
        assert_eq!(results[5].content(), "note");
        assert_eq!(results[6].name(), None);
        assert_eq!(results[6].content(), "now");
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let doc = XmlDocument::parse(r#"<item id="5">hi</item>"#, &LoadOptions::default()).unwrap();
        let item = doc.root_node().children().next().unwrap();
        let json = serde_json::to_value(extract("//item", item)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "xpathQuery": "//item",
                "name": "item",
                "content": "hi",
                "attributes": { "id": "5" }
            })
        );
    }
}
