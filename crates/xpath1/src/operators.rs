//! Binary operators: comparisons, arithmetic, and node-set union.

use crate::ast::BinaryOperator;
use crate::datasource::DataSourceNode;
use crate::engine::XPathValue;
use crate::error::XPathError;

/// Applies `op` to two already evaluated operands.
///
/// `or` and `and` are normally short-circuited by the engine; they are handled
/// here too so the function is total over `BinaryOperator`.
pub fn evaluate<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    use BinaryOperator::*;
    match op {
        Or => Ok(XPathValue::Boolean(left.to_bool() || right.to_bool())),
        And => Ok(XPathValue::Boolean(left.to_bool() && right.to_bool())),
        Equals | NotEquals | LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => {
            Ok(XPathValue::Boolean(compare(op, &left, &right)))
        }
        Plus => Ok(XPathValue::Number(left.to_number() + right.to_number())),
        Minus => Ok(XPathValue::Number(left.to_number() - right.to_number())),
        Multiply => Ok(XPathValue::Number(left.to_number() * right.to_number())),
        Divide => Ok(XPathValue::Number(left.to_number() / right.to_number())),
        // Rust's `%` truncates like XPath `mod`: the result takes the sign of the dividend.
        Modulo => Ok(XPathValue::Number(left.to_number() % right.to_number())),
        Union => union(left, right),
    }
}

fn union<'a, N: DataSourceNode<'a>>(
    left: XPathValue<N>,
    right: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    match (left, right) {
        (XPathValue::NodeSet(mut l), XPathValue::NodeSet(r)) => {
            l.extend(r);
            l.sort();
            l.dedup();
            Ok(XPathValue::NodeSet(l))
        }
        (l, r) => Err(XPathError::TypeError(format!(
            "'|' requires two node-sets, got a {} and a {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

/// Compares two values following XPath 1.0 section 3.4. Comparisons involving a
/// node-set are existential: true if any member satisfies the comparison.
fn compare<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: &XPathValue<N>,
    right: &XPathValue<N>,
) -> bool {
    match (left, right) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
            let right_values: Vec<String> = r.iter().map(|n| n.string_value()).collect();
            l.iter().any(|ln| {
                let lv = ln.string_value();
                right_values
                    .iter()
                    .any(|rv| compare_strings(op, &lv, rv))
            })
        }
        (XPathValue::NodeSet(nodes), XPathValue::Boolean(_)) => {
            compare_atomic(op, &XPathValue::<N>::Boolean(!nodes.is_empty()), right)
        }
        (XPathValue::Boolean(_), XPathValue::NodeSet(nodes)) => {
            compare_atomic(op, left, &XPathValue::<N>::Boolean(!nodes.is_empty()))
        }
        (XPathValue::NodeSet(nodes), other) => nodes.iter().any(|n| {
            compare_atomic(op, &XPathValue::<N>::String(n.string_value()), other)
        }),
        (other, XPathValue::NodeSet(nodes)) => nodes.iter().any(|n| {
            compare_atomic(op, other, &XPathValue::<N>::String(n.string_value()))
        }),
        _ => compare_atomic(op, left, right),
    }
}

fn compare_strings(op: BinaryOperator, left: &str, right: &str) -> bool {
    match op {
        BinaryOperator::Equals => left == right,
        BinaryOperator::NotEquals => left != right,
        _ => compare_numbers(
            op,
            crate::engine::string_to_number(left),
            crate::engine::string_to_number(right),
        ),
    }
}

/// Compares two values where neither is a node-set.
fn compare_atomic<'a, N: DataSourceNode<'a>>(
    op: BinaryOperator,
    left: &XPathValue<N>,
    right: &XPathValue<N>,
) -> bool {
    match op {
        BinaryOperator::Equals | BinaryOperator::NotEquals => match (left, right) {
            (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => {
                (left.to_bool() == right.to_bool()) == (op == BinaryOperator::Equals)
            }
            (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
                compare_numbers(op, left.to_number(), right.to_number())
            }
            _ => compare_strings(op, &left.to_string(), &right.to_string()),
        },
        _ => compare_numbers(op, left.to_number(), right.to_number()),
    }
}

fn compare_numbers(op: BinaryOperator, l: f64, r: f64) -> bool {
    match op {
        BinaryOperator::LessThan => l < r,
        BinaryOperator::LessThanOrEqual => l <= r,
        BinaryOperator::GreaterThan => l > r,
        BinaryOperator::GreaterThanOrEqual => l >= r,
        BinaryOperator::Equals => l == r,
        BinaryOperator::NotEquals => l != r,
        _ => false,
    }
}
