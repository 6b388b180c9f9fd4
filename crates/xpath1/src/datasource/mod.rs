//! Defines the core abstraction for a navigable, read-only data source tree.
use std::hash::Hash;

/// The namespace URI the `xml` prefix is permanently bound to.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A qualified name, consisting of an optional prefix and a local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    pub prefix: Option<&'a str>,
    pub local_part: &'a str,
}

/// The type of a node in the data source tree, aligned with the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// The universal contract for a node in a read-only, hierarchical data source.
///
/// The evaluation engine is written exclusively against this trait, so any parsed
/// tree (strict XML, recovered HTML, a test mock) can be queried once it is adapted.
///
/// `'a` is the lifetime of the underlying document.
///
/// `Ord` must follow document order: a node sorts before its attributes, and its
/// attributes sort before its children.
pub trait DataSourceNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    /// The type of the node (Element, Text, Attribute, etc.).
    fn node_type(&self) -> NodeType;

    /// The qualified name of the node (e.g., `fo:block`). Returns `None` for node
    /// types that do not have names, such as text or root nodes. For a processing-
    /// instruction, this is its target.
    fn name(&self) -> Option<QName<'a>>;

    /// The namespace URI of an element or attribute, or `None` when the node
    /// is in no namespace.
    fn namespace_uri(&self) -> Option<&'a str>;

    /// The string value of the node, as defined by the XPath 1.0 `string()` function.
    /// - For a text node, this is its content.
    /// - For an element or the root, this is the concatenation of the string values
    ///   of all its descendant text nodes.
    /// - For an attribute, this is its value.
    /// - For a comment or processing instruction, this is its content.
    fn string_value(&self) -> String;

    /// An iterator over the attribute nodes of this node.
    /// The iterator will be empty for non-element nodes.
    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// An iterator over the child nodes of this node.
    /// The iterator will be empty for leaf nodes (like text or attributes).
    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// The parent node. Returns `None` for the root. The parent of an attribute is
    /// the element that carries it.
    fn parent(&self) -> Option<Self>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cmp::Ordering;
    use std::hash::Hasher;

    #[derive(Debug, Clone)]
    struct MockNodeData<'a> {
        node_type: NodeType,
        name: Option<QName<'a>>,
        namespace: Option<&'a str>,
        value: &'a str,
        parent: Option<usize>,
        children: Vec<usize>,
        attributes: Vec<usize>,
    }

    /// An arena tree whose node ids are assigned in document order.
    #[derive(Debug, Default)]
    pub struct MockTree<'a> {
        nodes: Vec<MockNodeData<'a>>,
    }

    /// A node handle that navigates through a borrowed [`MockTree`].
    #[derive(Debug, Clone, Copy)]
    pub struct MockNode<'a> {
        pub id: usize,
        pub tree: &'a MockTree<'a>,
    }

    impl<'a> MockTree<'a> {
        pub fn node(&'a self, id: usize) -> MockNode<'a> {
            MockNode { id, tree: self }
        }

        fn push(&mut self, parent: Option<usize>, data: MockNodeData<'a>) -> usize {
            let id = self.nodes.len();
            self.nodes.push(data);
            if let Some(pid) = parent {
                match self.nodes[id].node_type {
                    NodeType::Attribute => self.nodes[pid].attributes.push(id),
                    _ => self.nodes[pid].children.push(id),
                }
            }
            id
        }

        fn leaf(
            &mut self,
            parent: usize,
            node_type: NodeType,
            name: Option<QName<'a>>,
            namespace: Option<&'a str>,
            value: &'a str,
        ) -> usize {
            self.push(
                Some(parent),
                MockNodeData {
                    node_type,
                    name,
                    namespace,
                    value,
                    parent: Some(parent),
                    children: vec![],
                    attributes: vec![],
                },
            )
        }

        fn element(
            &mut self,
            parent: usize,
            prefix: Option<&'a str>,
            local_part: &'a str,
            namespace: Option<&'a str>,
        ) -> usize {
            self.leaf(
                parent,
                NodeType::Element,
                Some(QName { prefix, local_part }),
                namespace,
                "",
            )
        }
    }

    impl<'a> PartialEq for MockNode<'a> {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }
    impl<'a> Eq for MockNode<'a> {}

    impl<'a> PartialOrd for MockNode<'a> {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl<'a> Ord for MockNode<'a> {
        fn cmp(&self, other: &Self) -> Ordering {
            self.id.cmp(&other.id)
        }
    }

    impl<'a> Hash for MockNode<'a> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    impl<'a> DataSourceNode<'a> for MockNode<'a> {
        fn node_type(&self) -> NodeType {
            self.tree.nodes[self.id].node_type
        }

        fn name(&self) -> Option<QName<'a>> {
            self.tree.nodes[self.id].name
        }

        fn namespace_uri(&self) -> Option<&'a str> {
            self.tree.nodes[self.id].namespace
        }

        fn string_value(&self) -> String {
            match self.node_type() {
                NodeType::Root | NodeType::Element => self
                    .children()
                    .filter(|c| matches!(c.node_type(), NodeType::Element | NodeType::Text))
                    .map(|c| c.string_value())
                    .collect(),
                _ => self.tree.nodes[self.id].value.to_string(),
            }
        }

        fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            let ids = tree.nodes[self.id].attributes.clone();
            Box::new(ids.into_iter().map(move |id| MockNode { id, tree }))
        }

        fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let tree = self.tree;
            let ids = tree.nodes[self.id].children.clone();
            Box::new(ids.into_iter().map(move |id| MockNode { id, tree }))
        }

        fn parent(&self) -> Option<Self> {
            self.tree.nodes[self.id].parent.map(|id| MockNode {
                id,
                tree: self.tree,
            })
        }
    }

    /// Builds the shared fixture tree. Ids are document order:
    ///
    /// ```text
    /// 0  root
    /// 1  <para id="p1" xml:lang="en">      2 @id, 3 @xml:lang
    /// 4    "Hello"
    /// 5  <!-- comment node -->
    /// 6  <div/>
    /// 7  <?pi-target pi-value?>
    /// 8  <para>
    /// 9    "World"
    /// 10 <x:item xmlns:x="urn:example" x:kind="k">   11 @x:kind
    /// 12   "ns"
    /// ```
    pub fn create_test_tree<'a>() -> MockTree<'a> {
        let mut tree = MockTree::default();
        let root = tree.push(
            None,
            MockNodeData {
                node_type: NodeType::Root,
                name: None,
                namespace: None,
                value: "",
                parent: None,
                children: vec![],
                attributes: vec![],
            },
        );

        let para = tree.element(root, None, "para", None);
        tree.leaf(
            para,
            NodeType::Attribute,
            Some(QName {
                prefix: None,
                local_part: "id",
            }),
            None,
            "p1",
        );
        tree.leaf(
            para,
            NodeType::Attribute,
            Some(QName {
                prefix: Some("xml"),
                local_part: "lang",
            }),
            Some(XML_NAMESPACE),
            "en",
        );
        tree.leaf(para, NodeType::Text, None, None, "Hello");

        tree.leaf(root, NodeType::Comment, None, None, " comment node ");
        tree.element(root, None, "div", None);
        tree.leaf(
            root,
            NodeType::ProcessingInstruction,
            Some(QName {
                prefix: None,
                local_part: "pi-target",
            }),
            None,
            "pi-value",
        );

        let para2 = tree.element(root, None, "para", None);
        tree.leaf(para2, NodeType::Text, None, None, "World");

        let item = tree.element(root, Some("x"), "item", Some("urn:example"));
        tree.leaf(
            item,
            NodeType::Attribute,
            Some(QName {
                prefix: Some("x"),
                local_part: "kind",
            }),
            Some("urn:example"),
            "k",
        );
        tree.leaf(item, NodeType::Text, None, None, "ns");

        tree
    }

    #[test]
    fn test_fixture_ids_follow_document_order() {
        let tree = create_test_tree();
        let root = tree.node(0);
        let ids: Vec<usize> = root.children().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 5, 6, 7, 8, 10]);
        assert_eq!(root.string_value(), "HelloWorldns");
        assert_eq!(tree.node(11).parent(), Some(tree.node(10)));
    }
}
