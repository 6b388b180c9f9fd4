// HTML datasource implementation using scraper
use bytepath_xpath1::{DataSourceNode, NodeType, QName};
use log::debug;
use scraper::Html;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
struct HtmlNodeData {
    node_type: NodeType,
    name: Option<String>,
    /// Own text for text, comment, attribute and processing-instruction nodes.
    value: String,
    parent: Option<usize>,
    children: Vec<usize>,
    attributes: Vec<usize>,
}

impl HtmlNodeData {
    fn new(node_type: NodeType, parent: Option<usize>) -> Self {
        Self {
            node_type,
            name: None,
            value: String::new(),
            parent,
            children: Vec::new(),
            attributes: Vec::new(),
        }
    }
}

/// An HTML document recovered by the html5ever tree builder and flattened into
/// an owned arena. Arena indices follow document order, with each element's
/// attributes placed directly after it.
///
/// Nodes carry no namespace, inline SVG and MathML included, so plain name
/// tests like `//svg/circle` match them.
#[derive(Debug, Default)]
pub struct HtmlDocument {
    nodes: Vec<HtmlNodeData>,
}

impl HtmlDocument {
    /// Parses `text` as an HTML document. Markup errors are recovered, never reported.
    pub fn parse(text: &str) -> Self {
        let html = Html::parse_document(text);
        if !html.errors.is_empty() {
            debug!("Recovered {} HTML parse error(s)", html.errors.len());
            for error in &html.errors {
                debug!("  {}", error);
            }
        }

        let mut doc = HtmlDocument::default();
        let root = doc.push(HtmlNodeData::new(NodeType::Root, None));
        let mut arena_ids = HashMap::from([(html.tree.root().id(), root)]);

        // `descendants` is a preorder walk, so every parent is placed before its children.
        for node in html.tree.root().descendants().skip(1) {
            let Some(parent) = node.parent().and_then(|p| arena_ids.get(&p.id()).copied()) else {
                continue;
            };
            let data = match node.value() {
                scraper::Node::Element(element) => {
                    let mut data = HtmlNodeData::new(NodeType::Element, Some(parent));
                    data.name = Some(element.name().to_string());
                    data
                }
                scraper::Node::Text(text) => {
                    let mut data = HtmlNodeData::new(NodeType::Text, Some(parent));
                    data.value = text.text.to_string();
                    data
                }
                scraper::Node::Comment(comment) => {
                    let mut data = HtmlNodeData::new(NodeType::Comment, Some(parent));
                    data.value = comment.comment.to_string();
                    data
                }
                scraper::Node::ProcessingInstruction(pi) => {
                    let mut data =
                        HtmlNodeData::new(NodeType::ProcessingInstruction, Some(parent));
                    data.name = Some(pi.target.to_string());
                    data.value = pi.data.to_string();
                    data
                }
                // Doctypes are not part of the XPath data model.
                scraper::Node::Doctype(_)
                | scraper::Node::Document
                | scraper::Node::Fragment => continue,
            };

            let attributes = match node.value() {
                scraper::Node::Element(element) => {
                    let mut attrs: Vec<(&str, &str)> = element.attrs().collect();
                    attrs.sort_by(|a, b| a.0.cmp(b.0));
                    attrs
                }
                _ => Vec::new(),
            };
            let id = doc.push(data);
            doc.nodes[parent].children.push(id);
            arena_ids.insert(node.id(), id);

            for (name, value) in attributes {
                let mut attr = HtmlNodeData::new(NodeType::Attribute, Some(id));
                attr.name = Some(name.to_string());
                attr.value = value.to_string();
                let attr_id = doc.push(attr);
                doc.nodes[id].attributes.push(attr_id);
            }
        }

        debug!("Flattened HTML document into {} node(s)", doc.nodes.len());
        doc
    }

    fn push(&mut self, data: HtmlNodeData) -> usize {
        self.nodes.push(data);
        self.nodes.len() - 1
    }

    pub fn root_node(&self) -> HtmlNode<'_> {
        HtmlNode { doc: self, index: 0 }
    }

    /// Number of arena nodes, attributes included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// A handle to one node of an [`HtmlDocument`].
#[derive(Clone, Copy)]
pub struct HtmlNode<'a> {
    doc: &'a HtmlDocument,
    index: usize,
}

impl<'a> HtmlNode<'a> {
    fn data(&self) -> &'a HtmlNodeData {
        let doc: &'a HtmlDocument = self.doc;
        &doc.nodes[self.index]
    }

    fn handles(&self, ids: &'a [usize]) -> Box<dyn Iterator<Item = Self> + 'a> {
        let doc = self.doc;
        Box::new(ids.iter().map(move |&index| HtmlNode { doc, index }))
    }
}

impl fmt::Debug for HtmlNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        f.debug_struct("HtmlNode")
            .field("index", &self.index)
            .field("node_type", &data.node_type)
            .field("name", &data.name)
            .finish()
    }
}

impl PartialEq for HtmlNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for HtmlNode<'_> {}

impl PartialOrd for HtmlNode<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HtmlNode<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl Hash for HtmlNode<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<'a> DataSourceNode<'a> for HtmlNode<'a> {
    fn node_type(&self) -> NodeType {
        self.data().node_type
    }

    fn name(&self) -> Option<QName<'a>> {
        self.data().name.as_deref().map(|local_part| QName {
            prefix: None,
            local_part,
        })
    }

    fn namespace_uri(&self) -> Option<&'a str> {
        None
    }

    fn string_value(&self) -> String {
        match self.node_type() {
            NodeType::Root | NodeType::Element => {
                let mut out = String::new();
                let mut stack = vec![*self];
                while let Some(node) = stack.pop() {
                    if node.node_type() == NodeType::Text {
                        out.push_str(&node.data().value);
                    }
                    let doc = node.doc;
                    stack.extend(
                        node.data()
                            .children
                            .iter()
                            .rev()
                            .map(|&index| HtmlNode { doc, index }),
                    );
                }
                out
            }
            _ => self.data().value.clone(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        self.handles(&self.data().attributes)
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        self.handles(&self.data().children)
    }

    fn parent(&self) -> Option<Self> {
        self.data().parent.map(|index| HtmlNode {
            doc: self.doc,
            index,
        })
    }
}
