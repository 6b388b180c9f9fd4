//! XPath 1.0 for any tree that implements [`DataSourceNode`].
//!
//! Expressions are parsed with [`parse_expression`], checked against the core
//! function library with [`validate`], and evaluated with [`evaluate`].

pub mod ast;
pub mod axes;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod functions;
pub mod operators;
pub mod parser;

pub use ast::{Axis, BinaryOperator, Expression, LocationPath, NodeTest, NodeTypeTest, Step};
pub use datasource::{DataSourceNode, NodeType, QName, XML_NAMESPACE};
pub use engine::{EvaluationContext, XPathValue, evaluate, format_number, string_to_number};
pub use error::XPathError;
pub use functions::{FunctionRegistry, validate};
pub use parser::parse_expression;
