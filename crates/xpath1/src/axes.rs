//! Contains pure functions for collecting nodes along each XPath axis.
//!
//! Every collector appends in document order. [`collect`] then flips the
//! output of reverse axes so positional predicates see nearest-first order.

use crate::ast::Axis;
use crate::datasource::{DataSourceNode, NodeType};

/// Collects the nodes reachable from `node` along `axis`, in axis order.
pub fn collect<'a, N: DataSourceNode<'a>>(axis: Axis, node: N, results: &mut Vec<N>) {
    let start = results.len();
    match axis {
        Axis::Child => collect_child_nodes(node, results),
        Axis::Attribute => collect_attribute_nodes(node, results),
        Axis::Descendant => collect_descendant_nodes(node, results),
        Axis::DescendantOrSelf => collect_descendant_or_self_nodes(node, results),
        Axis::Parent => collect_parent_nodes(node, results),
        Axis::Ancestor => collect_ancestor_nodes(node, results),
        Axis::AncestorOrSelf => {
            collect_ancestor_nodes(node, results);
            results.push(node);
        }
        Axis::SelfAxis => results.push(node),
        Axis::FollowingSibling => collect_following_sibling_nodes(node, results),
        Axis::PrecedingSibling => collect_preceding_sibling_nodes(node, results),
        Axis::Following => collect_following_nodes(node, results),
        Axis::Preceding => collect_preceding_nodes(node, results),
    }
    if axis.is_reverse() {
        results[start..].reverse();
    }
}

pub fn collect_child_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    results.extend(node.children());
}

pub fn collect_attribute_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    results.extend(node.attributes());
}

pub fn collect_descendant_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    // Children are pushed in reverse so the stack pops them in document order.
    let mut stack: Vec<N> = node.children().collect();
    stack.reverse();
    while let Some(current) = stack.pop() {
        results.push(current);
        let start = stack.len();
        stack.extend(current.children());
        stack[start..].reverse();
    }
}

pub fn collect_descendant_or_self_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    results: &mut Vec<N>,
) {
    results.push(node);
    collect_descendant_nodes(node, results);
}

pub fn collect_parent_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    if let Some(parent) = node.parent() {
        results.push(parent);
    }
}

pub fn collect_ancestor_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    let start = results.len();
    let mut current = node.parent();
    while let Some(p) = current {
        results.push(p);
        current = p.parent();
    }
    results[start..].reverse();
}

/// Attributes have no siblings.
fn sibling_parent<'a, N: DataSourceNode<'a>>(node: N) -> Option<N> {
    if node.node_type() == NodeType::Attribute {
        None
    } else {
        node.parent()
    }
}

pub fn collect_following_sibling_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    results: &mut Vec<N>,
) {
    if let Some(parent) = sibling_parent(node) {
        results.extend(parent.children().skip_while(|s| *s != node).skip(1));
    }
}

pub fn collect_preceding_sibling_nodes<'a, N: DataSourceNode<'a>>(
    node: N,
    results: &mut Vec<N>,
) {
    if let Some(parent) = sibling_parent(node) {
        results.extend(parent.children().take_while(|s| *s != node));
    }
}

pub fn collect_following_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    // Following of an attribute starts after its owner element's subtree begins,
    // which means the owner's children are included.
    let mut current = node;
    if node.node_type() == NodeType::Attribute
        && let Some(owner) = node.parent()
    {
        collect_descendant_nodes(owner, results);
        current = owner;
    }
    while let Some(parent) = current.parent() {
        for sibling in parent.children().skip_while(|s| *s != current).skip(1) {
            collect_descendant_or_self_nodes(sibling, results);
        }
        current = parent;
    }
}

pub fn collect_preceding_nodes<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    let mut current = if node.node_type() == NodeType::Attribute {
        match node.parent() {
            Some(owner) => owner,
            None => return,
        }
    } else {
        node
    };
    let mut chain = Vec::new();
    while let Some(parent) = current.parent() {
        chain.push((parent, current));
        current = parent;
    }
    // Walk from the top down so nodes arrive in document order.
    for (parent, child) in chain.into_iter().rev() {
        for sibling in parent.children().take_while(|s| *s != child) {
            collect_descendant_or_self_nodes(sibling, results);
        }
    }
}
