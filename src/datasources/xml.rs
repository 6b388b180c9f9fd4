// XML datasource implementation using roxmltree
use crate::options::LoadOptions;
use bytepath_xpath1::{DataSourceNode, NodeType, QName, XML_NAMESPACE};
use roxmltree::Node;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A strictly parsed XML document borrowing its decoded text.
pub struct XmlDocument<'input> {
    doc: roxmltree::Document<'input>,
}

impl<'input> XmlDocument<'input> {
    pub fn parse(text: &'input str, options: &LoadOptions) -> Result<Self, roxmltree::Error> {
        let mut parsing = roxmltree::ParsingOptions::default();
        parsing.allow_dtd = options.allow_dtd;
        parsing.nodes_limit = options.nodes_limit;
        let doc = roxmltree::Document::parse_with_options(text, parsing)?;
        Ok(Self { doc })
    }

    pub fn root_node(&self) -> XmlNode<'_, 'input> {
        XmlNode::Element(self.doc.root())
    }

    /// Number of tree nodes, attributes excluded.
    pub fn node_count(&self) -> usize {
        self.doc.descendants().count()
    }
}

/// Either a tree node or an attribute of an element.
/// roxmltree keeps attributes as data on their element, so an attribute is
/// addressed by its element and position.
#[derive(Debug, Clone, Copy)]
pub enum XmlNode<'a, 'input> {
    /// A regular node (root, element, text, comment or processing instruction)
    Element(Node<'a, 'input>),
    Attribute {
        parent: Node<'a, 'input>,
        index: usize,
    },
}

impl<'a, 'input> XmlNode<'a, 'input> {
    /// Document order key: the owning tree node, then 0 for the node itself and
    /// 1 + index for its attributes.
    fn order_key(&self) -> (usize, usize) {
        match self {
            XmlNode::Element(node) => (node.id().get_usize(), 0),
            XmlNode::Attribute { parent, index } => (parent.id().get_usize(), index + 1),
        }
    }

    fn attribute(&self) -> Option<roxmltree::Attribute<'a, 'input>> {
        match self {
            XmlNode::Attribute { parent, index } => parent.attributes().nth(*index),
            XmlNode::Element(_) => None,
        }
    }
}

impl<'a, 'input> PartialEq for XmlNode<'a, 'input> {
    fn eq(&self, other: &Self) -> bool {
        self.order_key() == other.order_key()
    }
}

impl<'a, 'input> Eq for XmlNode<'a, 'input> {}

impl<'a, 'input> PartialOrd for XmlNode<'a, 'input> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a, 'input> Ord for XmlNode<'a, 'input> {
    fn cmp(&self, other: &Self) -> Ordering {
        // roxmltree assigns node ids in document order.
        self.order_key().cmp(&other.order_key())
    }
}

impl<'a, 'input> Hash for XmlNode<'a, 'input> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.order_key().hash(state);
    }
}

impl<'a> DataSourceNode<'a> for XmlNode<'a, 'a> {
    fn node_type(&self) -> NodeType {
        match self {
            XmlNode::Element(node) => {
                if node.is_root() {
                    NodeType::Root
                } else if node.is_text() {
                    NodeType::Text
                } else if node.is_comment() {
                    NodeType::Comment
                } else if node.is_pi() {
                    NodeType::ProcessingInstruction
                } else {
                    NodeType::Element
                }
            }
            XmlNode::Attribute { .. } => NodeType::Attribute,
        }
    }

    fn name(&self) -> Option<QName<'a>> {
        match self {
            XmlNode::Element(node) if node.is_element() => {
                let tag = node.tag_name();
                Some(QName {
                    prefix: tag.namespace().and_then(|uri| node.lookup_prefix(uri)),
                    local_part: tag.name(),
                })
            }
            XmlNode::Element(node) => node.pi().map(|pi| QName {
                prefix: None,
                local_part: pi.target,
            }),
            XmlNode::Attribute { parent, .. } => self.attribute().map(|attr| QName {
                prefix: attr.namespace().and_then(|uri| {
                    if uri == XML_NAMESPACE {
                        Some("xml")
                    } else {
                        parent.lookup_prefix(uri)
                    }
                }),
                local_part: attr.name(),
            }),
        }
    }

    fn namespace_uri(&self) -> Option<&'a str> {
        match self {
            XmlNode::Element(node) if node.is_element() => node.tag_name().namespace(),
            XmlNode::Element(_) => None,
            XmlNode::Attribute { .. } => self.attribute().and_then(|attr| attr.namespace()),
        }
    }

    fn string_value(&self) -> String {
        match self {
            XmlNode::Element(node) => {
                if node.is_element() || node.is_root() {
                    node.descendants()
                        .filter(|n| n.is_text())
                        .filter_map(|n| n.text())
                        .collect()
                } else if node.is_pi() {
                    node.pi()
                        .and_then(|pi| pi.value)
                        .unwrap_or_default()
                        .to_string()
                } else {
                    // Text and comment nodes
                    node.text().unwrap_or_default().to_string()
                }
            }
            XmlNode::Attribute { .. } => self
                .attribute()
                .map(|attr| attr.value().to_string())
                .unwrap_or_default(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Element(node) if node.is_element() => {
                let parent = *node;
                let attr_count = node.attributes().len();
                Box::new((0..attr_count).map(move |index| XmlNode::Attribute { parent, index }))
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Element(node) => Box::new(node.children().map(XmlNode::Element)),
            XmlNode::Attribute { .. } => Box::new(std::iter::empty()),
        }
    }

    fn parent(&self) -> Option<Self> {
        match self {
            XmlNode::Element(node) => node.parent().map(XmlNode::Element),
            XmlNode::Attribute { parent, .. } => Some(XmlNode::Element(*parent)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> XmlDocument<'_> {
        XmlDocument::parse(xml, &LoadOptions::default()).unwrap()
    }

    fn first_element<'a>(node: XmlNode<'a, 'a>, local: &str) -> XmlNode<'a, 'a> {
        node.children()
            .find(|n| n.name().is_some_and(|q| q.local_part == local))
            .unwrap()
    }

    #[test]
    fn test_xml_node_attributes() {
        let doc = parse(r#"<root><item id="123" status="active">Text</item></root>"#);
        let item = first_element(first_element(doc.root_node(), "root"), "item");

        let attrs: Vec<_> = item.attributes().collect();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].node_type(), NodeType::Attribute);
        assert_eq!(attrs[0].name().unwrap().local_part, "id");
        assert_eq!(attrs[0].string_value(), "123");
        assert_eq!(attrs[1].name().unwrap().local_part, "status");
        assert_eq!(attrs[0].parent(), Some(item));
        assert!(attrs[0].children().next().is_none());
    }

    #[test]
    fn test_document_order() {
        let doc = parse(r#"<a x="1" y="2"><b/></a>"#);
        let a = first_element(doc.root_node(), "a");
        let b = first_element(a, "b");
        let attrs: Vec<_> = a.attributes().collect();

        let mut shuffled = vec![b, attrs[1], a, attrs[0], doc.root_node()];
        shuffled.sort();
        assert_eq!(shuffled, vec![doc.root_node(), a, attrs[0], attrs[1], b]);
    }

    #[test]
    fn test_sort_and_dedup_across_nested_elements() {
        let doc = parse(r#"<a k="1"><b m="2"><c/></b><d/></a>"#);
        let a = first_element(doc.root_node(), "a");
        let b = first_element(a, "b");
        let c = first_element(b, "c");
        let d = first_element(a, "d");
        let a_attr = a.attributes().next().unwrap();
        let b_attr = b.attributes().next().unwrap();

        let mut nodes = vec![d, c, b_attr, d, a_attr, b, c, a];
        nodes.sort();
        nodes.dedup();
        assert_eq!(nodes, vec![a, a_attr, b, b_attr, c, d]);
        assert!(a_attr < b && b_attr < c);
    }

    #[test]
    fn test_namespaces_and_prefixes() {
        let doc = parse(
            r#"<f:feed xmlns:f="urn:feed" xmlns="urn:default"><entry f:kind="k" xml:lang="en"/></f:feed>"#,
        );
        let feed = first_element(doc.root_node(), "feed");
        assert_eq!(feed.namespace_uri(), Some("urn:feed"));
        assert_eq!(feed.name().unwrap().prefix, Some("f"));

        let entry = first_element(feed, "entry");
        assert_eq!(entry.namespace_uri(), Some("urn:default"));
        assert_eq!(entry.name().unwrap().prefix, None);

        let attrs: Vec<_> = entry.attributes().collect();
        assert_eq!(attrs[0].namespace_uri(), Some("urn:feed"));
        assert_eq!(attrs[0].name().unwrap().prefix, Some("f"));
        assert_eq!(attrs[1].namespace_uri(), Some(XML_NAMESPACE));
        assert_eq!(attrs[1].name().unwrap().prefix, Some("xml"));
    }

    #[test]
    fn test_string_values() {
        let doc = parse("<r>a<!--c--><?pi data?><s>b</s><![CDATA[<c>]]></r>");
        let r = first_element(doc.root_node(), "r");
        assert_eq!(r.string_value(), "ab<c>");
        assert_eq!(doc.root_node().string_value(), "ab<c>");

        let kinds: Vec<_> = r.children().map(|n| n.node_type()).collect();
        assert_eq!(kinds[1], NodeType::Comment);
        assert_eq!(kinds[2], NodeType::ProcessingInstruction);

        let pi = r.children().nth(2).unwrap();
        assert_eq!(pi.name().unwrap().local_part, "pi");
        assert_eq!(pi.string_value(), "data");
        assert_eq!(r.children().nth(1).unwrap().string_value(), "c");
    }

    #[test]
    fn test_dtd_requires_opt_in() {
        let xml = "<!DOCTYPE r [<!ENTITY e \"x\">]><r>&e;</r>";
        assert!(XmlDocument::parse(xml, &LoadOptions::default()).is_err());
        let doc = XmlDocument::parse(xml, &LoadOptions::default().with_allow_dtd(true)).unwrap();
        assert_eq!(doc.root_node().string_value(), "x");
    }

    #[test]
    fn test_nodes_limit() {
        let xml = "<r><a/><b/><c/></r>";
        assert!(XmlDocument::parse(xml, &LoadOptions::default().with_nodes_limit(2)).is_err());
        assert_eq!(parse(xml).node_count(), 5);
    }
}
