//! Defines the registry and built-in implementations for the XPath 1.0 core function library.

use super::engine::{EvaluationContext, XPathValue, string_to_number};
use crate::ast::Expression;
use crate::datasource::{DataSourceNode, NodeType, XML_NAMESPACE};
use crate::error::XPathError;
use std::collections::HashSet;
use std::ops::RangeInclusive;

/// The names of every function an expression may call.
pub struct FunctionRegistry {
    functions: HashSet<&'static str>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashSet::new(),
        }
    }

    pub fn register(&mut self, name: &'static str) {
        self.functions.insert(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains(name)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        for name in [
            // Node-set
            "last",
            "position",
            "count",
            "id",
            "local-name",
            "namespace-uri",
            "name",
            // String
            "string",
            "concat",
            "starts-with",
            "contains",
            "substring-before",
            "substring-after",
            "substring",
            "string-length",
            "normalize-space",
            "translate",
            // Boolean
            "boolean",
            "not",
            "true",
            "false",
            "lang",
            // Number
            "number",
            "sum",
            "floor",
            "ceiling",
            "round",
        ] {
            registry.register(name);
        }
        registry
    }
}

/// Rejects expressions that could never evaluate: calls to functions missing from
/// `registry` and references to variables, since no variables are ever bound.
pub fn validate(expr: &Expression, registry: &FunctionRegistry) -> Result<(), XPathError> {
    let mut problem = None;
    expr.walk(&mut |e| {
        if problem.is_some() {
            return;
        }
        match e {
            Expression::FunctionCall { name, .. } if !registry.contains(name) => {
                problem = Some(XPathError::UnknownFunction(name.clone()));
            }
            Expression::Variable(name) => {
                problem = Some(XPathError::UnknownVariable(name.clone()));
            }
            _ => {}
        }
    });
    problem.map_or(Ok(()), Err)
}

/// Dispatches a function call to the correct implementation.
pub fn evaluate_function<'a, 'd, N: DataSourceNode<'a>>(
    name: &str,
    args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    match name {
        // Node-set
        "last" => {
            arity(name, &args, 0..=0)?;
            Ok(XPathValue::Number(e_ctx.context_size as f64))
        }
        "position" => {
            arity(name, &args, 0..=0)?;
            Ok(XPathValue::Number(e_ctx.context_position as f64))
        }
        "count" => func_count(args),
        "id" => func_id(args, e_ctx),
        "local-name" => name_of(name, args, e_ctx, |n| {
            n.name().map(|q| q.local_part.to_string())
        }),
        "namespace-uri" => name_of(name, args, e_ctx, |n| {
            match n.node_type() {
                NodeType::Element | NodeType::Attribute => n.namespace_uri().map(str::to_string),
                _ => None,
            }
        }),
        "name" => name_of(name, args, e_ctx, |n| {
            n.name().map(|q| match q.prefix {
                Some(prefix) => format!("{}:{}", prefix, q.local_part),
                None => q.local_part.to_string(),
            })
        }),

        // String
        "string" => {
            arity(name, &args, 0..=1)?;
            Ok(XPathValue::String(string_arg_or_context(args, e_ctx)))
        }
        "concat" => {
            arity(name, &args, 2..=usize::MAX)?;
            Ok(XPathValue::String(
                args.iter().map(|v| v.to_string()).collect(),
            ))
        }
        "starts-with" => string_pair(name, args, |s1, s2| {
            XPathValue::Boolean(s1.starts_with(s2))
        }),
        "contains" => string_pair(name, args, |s1, s2| XPathValue::Boolean(s1.contains(s2))),
        "substring-before" => string_pair(name, args, |s1, s2| {
            XPathValue::String(
                s1.find(s2)
                    .map(|i| s1[..i].to_string())
                    .unwrap_or_default(),
            )
        }),
        "substring-after" => string_pair(name, args, |s1, s2| {
            XPathValue::String(
                s1.find(s2)
                    .map(|i| s1[i + s2.len()..].to_string())
                    .unwrap_or_default(),
            )
        }),
        "substring" => func_substring(args),
        "string-length" => {
            arity(name, &args, 0..=1)?;
            let s = string_arg_or_context(args, e_ctx);
            Ok(XPathValue::Number(s.chars().count() as f64))
        }
        "normalize-space" => {
            arity(name, &args, 0..=1)?;
            let s = string_arg_or_context(args, e_ctx);
            Ok(XPathValue::String(
                s.split_ascii_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "translate" => func_translate(args),

        // Boolean
        "boolean" => {
            arity(name, &args, 1..=1)?;
            Ok(XPathValue::Boolean(args[0].to_bool()))
        }
        "not" => {
            arity(name, &args, 1..=1)?;
            Ok(XPathValue::Boolean(!args[0].to_bool()))
        }
        "true" => {
            arity(name, &args, 0..=0)?;
            Ok(XPathValue::Boolean(true))
        }
        "false" => {
            arity(name, &args, 0..=0)?;
            Ok(XPathValue::Boolean(false))
        }
        "lang" => func_lang(args, e_ctx),

        // Number
        "number" => {
            arity(name, &args, 0..=1)?;
            let n = match args.first() {
                Some(v) => v.to_number(),
                None => string_to_number(&e_ctx.context_node.string_value()),
            };
            Ok(XPathValue::Number(n))
        }
        "sum" => func_sum(args),
        "floor" => {
            arity(name, &args, 1..=1)?;
            Ok(XPathValue::Number(args[0].to_number().floor()))
        }
        "ceiling" => {
            arity(name, &args, 1..=1)?;
            Ok(XPathValue::Number(args[0].to_number().ceil()))
        }
        "round" => func_round(args),

        _ => Err(XPathError::UnknownFunction(name.to_string())),
    }
}

fn arity<N>(
    function: &str,
    args: &[XPathValue<N>],
    expected: RangeInclusive<usize>,
) -> Result<(), XPathError> {
    if expected.contains(&args.len()) {
        return Ok(());
    }
    let message = match (*expected.start(), *expected.end()) {
        (lo, hi) if lo == hi => format!("Expected {} argument(s), got {}", lo, args.len()),
        (lo, usize::MAX) => format!("Expected at least {} arguments, got {}", lo, args.len()),
        (lo, hi) => format!("Expected {} to {} arguments, got {}", lo, hi, args.len()),
    };
    Err(XPathError::FunctionError {
        function: format!("{}()", function),
        message,
    })
}

fn node_set_arg<N>(function: &str, value: XPathValue<N>) -> Result<Vec<N>, XPathError> {
    match value {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        XPathValue::String(_) => Err(not_a_node_set(function, "string")),
        XPathValue::Number(_) => Err(not_a_node_set(function, "number")),
        XPathValue::Boolean(_) => Err(not_a_node_set(function, "boolean")),
    }
}

fn not_a_node_set(function: &str, found: &str) -> XPathError {
    XPathError::TypeError(format!(
        "{}() argument must be a node-set, got a {}",
        function, found
    ))
}

fn string_arg_or_context<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, '_, N>,
) -> String {
    match args.pop() {
        Some(v) => v.to_string(),
        None => e_ctx.context_node.string_value(),
    }
}

fn string_pair<'a, N: DataSourceNode<'a>>(
    function: &str,
    mut args: Vec<XPathValue<N>>,
    op: impl FnOnce(&str, &str) -> XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    arity(function, &args, 2..=2)?;
    let s2 = args.remove(1).to_string();
    let s1 = args.remove(0).to_string();
    Ok(op(&s1, &s2))
}

/// Shared body of `local-name()`, `namespace-uri()` and `name()`: the optional
/// argument picks the first node in document order, defaulting to the context node.
fn name_of<'a, N: DataSourceNode<'a>>(
    function: &str,
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, '_, N>,
    project: impl FnOnce(N) -> Option<String>,
) -> Result<XPathValue<N>, XPathError> {
    arity(function, &args, 0..=1)?;
    let node = match args.pop() {
        Some(v) => node_set_arg(function, v)?.into_iter().min(),
        None => Some(e_ctx.context_node),
    };
    Ok(XPathValue::String(
        node.and_then(project).unwrap_or_default(),
    ))
}

fn func_count<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity("count", &args, 1..=1)?;
    let nodes = node_set_arg("count", args.remove(0))?;
    Ok(XPathValue::Number(nodes.len() as f64))
}

fn func_id<'a, 'd, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    arity("id", &args, 1..=1)?;

    let id_string = match args.remove(0) {
        XPathValue::NodeSet(nodes) => nodes
            .iter()
            .map(|n| n.string_value())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    };
    let ids_to_find: HashSet<_> = id_string.split_whitespace().collect();
    if ids_to_find.is_empty() {
        return Ok(XPathValue::NodeSet(vec![]));
    }

    // Without a DTD, `id` and `xml:id` attributes are treated as IDs.
    let mut results = Vec::new();
    let mut stack = e_ctx.root_node.children().collect::<Vec<_>>();
    while let Some(node) = stack.pop() {
        if node.node_type() == NodeType::Element {
            let is_match = node.attributes().any(|attr| {
                let is_id_attr = attr.name().is_some_and(|q| q.local_part == "id")
                    && matches!(attr.namespace_uri(), None | Some(XML_NAMESPACE));
                is_id_attr && ids_to_find.contains(attr.string_value().as_str())
            });
            if is_match {
                results.push(node);
            }
        }
        stack.extend(node.children());
    }

    results.sort();
    results.dedup();
    Ok(XPathValue::NodeSet(results))
}

fn func_substring<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity("substring", &args, 2..=3)?;
    let length_val = if args.len() == 3 {
        Some(args.remove(2).to_number())
    } else {
        None
    };
    let start_val = args.remove(1).to_number();
    let s = args.remove(0).to_string();

    // XPath rounding rules for start/length; NaN and infinities fall out of the
    // float comparisons below.
    let first = (start_val + 0.5).floor();
    let last = match length_val {
        Some(l) => first + (l + 0.5).floor(),
        None => f64::INFINITY,
    };

    let result = s
        .chars()
        .enumerate()
        .filter_map(|(i, c)| {
            let pos = (i + 1) as f64; // XPath positions are 1-based
            (pos >= first && pos < last).then_some(c)
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn func_translate<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity("translate", &args, 3..=3)?;
    let to_str: Vec<char> = args.remove(2).to_string().chars().collect();
    let from_str: Vec<char> = args.remove(1).to_string().chars().collect();
    let source_str = args.remove(0).to_string();
    let result = source_str
        .chars()
        .filter_map(|c| match from_str.iter().position(|&fc| fc == c) {
            Some(pos) => to_str.get(pos).copied(),
            None => Some(c),
        })
        .collect::<String>();
    Ok(XPathValue::String(result))
}

fn func_lang<'a, 'd, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
    e_ctx: &EvaluationContext<'a, 'd, N>,
) -> Result<XPathValue<N>, XPathError> {
    arity("lang", &args, 1..=1)?;
    let test_lang = args.remove(0).to_string().to_lowercase();
    let mut current = Some(e_ctx.context_node);

    // If context node is not an element, start with its parent.
    if current.is_some_and(|n| n.node_type() != NodeType::Element) {
        current = current.and_then(|n| n.parent());
    }

    while let Some(node) = current {
        let declared = node.attributes().find(|attr| {
            attr.namespace_uri() == Some(XML_NAMESPACE)
                && attr.name().is_some_and(|q| q.local_part == "lang")
        });
        if let Some(attr) = declared {
            // The nearest xml:lang decides, including subcode matches ("en" matches "en-GB").
            let node_lang = attr.string_value().to_lowercase();
            let matched =
                node_lang == test_lang || node_lang.starts_with(&format!("{}-", test_lang));
            return Ok(XPathValue::Boolean(matched));
        }
        current = node.parent();
    }
    Ok(XPathValue::Boolean(false))
}

fn func_sum<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity("sum", &args, 1..=1)?;
    let nodes = node_set_arg("sum", args.remove(0))?;
    let sum = nodes
        .iter()
        .map(|node| string_to_number(&node.string_value()))
        .sum();
    Ok(XPathValue::Number(sum))
}

fn func_round<'a, N: DataSourceNode<'a>>(
    mut args: Vec<XPathValue<N>>,
) -> Result<XPathValue<N>, XPathError> {
    arity("round", &args, 1..=1)?;
    let n = args.remove(0).to_number();
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        return Ok(XPathValue::Number(n));
    }
    // XPath 1.0 round() rounds halves towards positive infinity.
    Ok(XPathValue::Number((n + 0.5).floor()))
}
