//! The evaluation engine for executing a parsed XPath AST against a generic `DataSourceNode`.

use super::ast::{
    Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step, UnaryOperator,
};
use super::functions::{self, FunctionRegistry};
use super::{axes, operators};
use crate::datasource::{DataSourceNode, NodeType, XML_NAMESPACE};
use crate::error::XPathError;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Represents the possible result types of an XPath expression evaluation.
#[derive(Debug, Clone)]
pub enum XPathValue<N> {
    NodeSet(Vec<N>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<'a, N: DataSourceNode<'a>> XPathValue<N> {
    /// Coerces the XPath value to a boolean as per XPath 1.0 rules.
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    /// Coerces the XPath value to a number as per XPath 1.0 rules.
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::String(s) => string_to_number(s),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::NodeSet(_) => string_to_number(&self.to_string()),
        }
    }

    /// The XPath type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            XPathValue::NodeSet(_) => "node-set",
            XPathValue::String(_) => "string",
            XPathValue::Number(_) => "number",
            XPathValue::Boolean(_) => "boolean",
        }
    }
}

impl<'a, N: DataSourceNode<'a>> fmt::Display for XPathValue<N> {
    /// Coerces the XPath value to a string as per XPath 1.0 rules.
    /// A node-set converts to the string-value of its first node in document order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathValue::NodeSet(nodes) => write!(
                f,
                "{}",
                nodes
                    .iter()
                    .min()
                    .map(|n| n.string_value())
                    .unwrap_or_default()
            ),
            XPathValue::String(s) => write!(f, "{}", s),
            XPathValue::Number(n) => write!(f, "{}", format_number(*n)),
            XPathValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Parses a string with the XPath `number()` grammar: optional whitespace, an
/// optional minus sign, digits with an optional fraction. Anything else is NaN.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'));
    let unsigned = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let well_formed = !unsigned.is_empty()
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.chars().filter(|&c| c == '.').count() <= 1
        && unsigned != ".";
    if well_formed {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// Formats a number the way the XPath `string()` function does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A container for all state needed during expression evaluation.
/// `'a` is the lifetime of the underlying data source.
/// `'d` is the lifetime of the evaluation context itself.
pub struct EvaluationContext<'a, 'd, N: DataSourceNode<'a>> {
    pub context_node: N,
    pub root_node: N,
    pub functions: &'d FunctionRegistry,
    /// Prefix to namespace URI bindings used by name tests.
    pub namespaces: &'d HashMap<String, String>,
    pub context_position: usize, // 1-based index
    pub context_size: usize,
    _marker: PhantomData<&'a ()>,
}

impl<'a, 'd, N: DataSourceNode<'a>> EvaluationContext<'a, 'd, N> {
    pub fn new(
        context_node: N,
        root_node: N,
        functions: &'d FunctionRegistry,
        namespaces: &'d HashMap<String, String>,
    ) -> Self {
        Self {
            context_node,
            root_node,
            functions,
            namespaces,
            context_position: 1,
            context_size: 1,
            _marker: PhantomData,
        }
    }

    /// A context for evaluating a predicate against `node` at `position` of `size`.
    fn focus(&self, node: N, position: usize, size: usize) -> Self {
        Self {
            context_node: node,
            root_node: self.root_node,
            functions: self.functions,
            namespaces: self.namespaces,
            context_position: position,
            context_size: size,
            _marker: PhantomData,
        }
    }

    /// Resolves a prefix to its namespace URI. `xml` is always bound.
    pub fn resolve_prefix(&self, prefix: &str) -> Option<&'d str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.namespaces.get(prefix).map(String::as_str)
    }
}

/// Evaluates a compiled expression and returns a concrete `XPathValue`.
pub fn evaluate<'a, N>(
    expr: &Expression,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    match expr {
        Expression::Literal(s) => Ok(XPathValue::String(s.clone())),
        Expression::Number(n) => Ok(XPathValue::Number(*n)),
        Expression::LocationPath(path) => {
            let nodes = evaluate_location_path(path, e_ctx)?;
            Ok(XPathValue::NodeSet(nodes))
        }
        Expression::Variable(name) => Err(XPathError::UnknownVariable(name.clone())),
        Expression::FunctionCall { name, args } => {
            let mut evaluated_args = Vec::with_capacity(args.len());
            for arg in args {
                evaluated_args.push(evaluate(arg, e_ctx)?);
            }
            functions::evaluate_function(name, evaluated_args, e_ctx)
        }
        Expression::Filter {
            primary,
            predicates,
        } => {
            let mut nodes = expect_node_set(evaluate(primary, e_ctx)?, "filter expression")?;
            nodes.sort();
            nodes.dedup();
            Ok(XPathValue::NodeSet(apply_predicates(
                nodes, predicates, e_ctx,
            )?))
        }
        // `or` and `and` short-circuit: the right operand is only evaluated when needed.
        Expression::BinaryOp {
            left,
            op: op @ (BinaryOperator::Or | BinaryOperator::And),
            right,
        } => {
            let left_val = evaluate(left, e_ctx)?.to_bool();
            let decided = match op {
                BinaryOperator::Or => left_val,
                _ => !left_val,
            };
            if decided {
                Ok(XPathValue::Boolean(left_val))
            } else {
                Ok(XPathValue::Boolean(evaluate(right, e_ctx)?.to_bool()))
            }
        }
        Expression::BinaryOp { left, op, right } => {
            let left_val = evaluate(left, e_ctx)?;
            let right_val = evaluate(right, e_ctx)?;
            operators::evaluate(*op, left_val, right_val)
        }
        Expression::UnaryOp { op, expr } => {
            let val = evaluate(expr, e_ctx)?;
            match op {
                UnaryOperator::Minus => Ok(XPathValue::Number(-val.to_number())),
            }
        }
    }
}

fn expect_node_set<N>(value: XPathValue<N>, what: &str) -> Result<Vec<N>, XPathError> {
    match value {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        XPathValue::String(_) => Err(type_error(what, "string")),
        XPathValue::Number(_) => Err(type_error(what, "number")),
        XPathValue::Boolean(_) => Err(type_error(what, "boolean")),
    }
}

fn type_error(what: &str, found: &str) -> XPathError {
    XPathError::TypeError(format!("{} requires a node-set, got a {}", what, found))
}

fn evaluate_location_path<'a, N>(
    path: &LocationPath,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut current_nodes = if let Some(start_expr) = &path.start_point {
        let mut nodes = expect_node_set(evaluate(start_expr, e_ctx)?, "a path step")?;
        nodes.sort();
        nodes.dedup();
        nodes
    } else if path.is_absolute {
        vec![e_ctx.root_node]
    } else {
        vec![e_ctx.context_node]
    };

    for step in &path.steps {
        current_nodes = evaluate_step(step, &current_nodes, e_ctx)?;
        log::trace!(
            "step {:?}::{:?} selected {} node(s)",
            step.axis,
            step.node_test,
            current_nodes.len()
        );
    }
    Ok(current_nodes)
}

/// Evaluates one step for every context node and merges the results into
/// document order without duplicates.
fn evaluate_step<'a, N>(
    step: &Step,
    context_nodes: &[N],
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut merged = Vec::new();
    let mut axis_nodes = Vec::new();
    for &node in context_nodes {
        axis_nodes.clear();
        axes::collect(step.axis, node, &mut axis_nodes);
        let tested: Vec<N> = axis_nodes
            .iter()
            .copied()
            .filter(|n| matches_node_test(*n, &step.node_test, step.axis, e_ctx))
            .collect();
        merged.extend(apply_predicates(tested, &step.predicates, e_ctx)?);
    }
    merged.sort();
    merged.dedup();
    Ok(merged)
}

/// Checks a single node against a `NodeTest`. Name tests only match the
/// principal node type of the axis and compare expanded names.
fn matches_node_test<'a, N>(
    node: N,
    test: &NodeTest,
    axis: Axis,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> bool
where
    N: DataSourceNode<'a> + 'a,
{
    let principal = match axis {
        Axis::Attribute => NodeType::Attribute,
        _ => NodeType::Element,
    };
    match test {
        NodeTest::Wildcard => node.node_type() == principal,
        NodeTest::NamespaceWildcard(prefix) => {
            node.node_type() == principal
                && e_ctx
                    .resolve_prefix(prefix)
                    .is_some_and(|uri| node.namespace_uri() == Some(uri))
        }
        NodeTest::Name { prefix, local } => {
            if node.node_type() != principal
                || !node.name().is_some_and(|q| q.local_part == local)
            {
                return false;
            }
            match prefix {
                None => node.namespace_uri().is_none(),
                // An unbound prefix matches nothing.
                Some(p) => e_ctx
                    .resolve_prefix(p)
                    .is_some_and(|uri| node.namespace_uri() == Some(uri)),
            }
        }
        NodeTest::NodeType(ntt) => match ntt {
            NodeTypeTest::Text => node.node_type() == NodeType::Text,
            NodeTypeTest::Comment => node.node_type() == NodeType::Comment,
            NodeTypeTest::ProcessingInstruction(target) => {
                node.node_type() == NodeType::ProcessingInstruction
                    && target.as_ref().is_none_or(|t| {
                        node.name().is_some_and(|q| q.local_part == t.as_str())
                    })
            }
            NodeTypeTest::Node => true,
        },
    }
}

/// Filters nodes, given in axis order, through a series of predicates.
fn apply_predicates<'a, N>(
    nodes: Vec<N>,
    predicates: &[Expression],
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> Result<Vec<N>, XPathError>
where
    N: DataSourceNode<'a> + 'a,
{
    let mut final_nodes = nodes;
    for predicate in predicates {
        let context_size = final_nodes.len();
        let mut kept = Vec::with_capacity(context_size);
        for (i, node) in final_nodes.iter().enumerate() {
            let predicate_ctx = e_ctx.focus(*node, i + 1, context_size);
            let keep = match evaluate(predicate, &predicate_ctx)? {
                XPathValue::Number(n) => n == (i + 1) as f64,
                other => other.to_bool(),
            };
            if keep {
                kept.push(*node);
            }
        }
        final_nodes = kept;
    }
    Ok(final_nodes)
}
