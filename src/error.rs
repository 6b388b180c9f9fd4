// src/error.rs
use bytepath_xpath1::XPathError;
use thiserror::Error;

/// Failures turning a byte buffer into a navigable document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Document is empty")]
    Empty,

    #[error("Could not decode document: {0}")]
    Encoding(String),

    #[error("Malformed document at {line}:{column}: {message}")]
    Malformed {
        line: u32,
        column: u32,
        message: String,
    },
}

/// Failures compiling or evaluating an XPath query. Every variant carries the
/// query text as it was passed in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid XPath '{query}': {message}")]
    Syntax { query: String, message: String },

    #[error("XPath '{query}' evaluated to a {found}, expected a node-set")]
    TypeMismatch { query: String, found: String },

    #[error("Unknown function '{name}' in XPath '{query}'")]
    UnknownFunction { query: String, name: String },

    #[error("Undefined variable '${name}' in XPath '{query}'")]
    UndefinedVariable { query: String, name: String },

    #[error("Evaluation of XPath '{query}' failed: {message}")]
    Evaluation { query: String, message: String },
}

impl QueryError {
    pub(crate) fn from_xpath(query: &str, err: XPathError) -> Self {
        let query = query.to_string();
        match err {
            XPathError::XPathParse(_, message) => QueryError::Syntax { query, message },
            XPathError::UnknownFunction(name) => QueryError::UnknownFunction { query, name },
            XPathError::UnknownVariable(name) => QueryError::UndefinedVariable { query, name },
            XPathError::FunctionError { function, message } => QueryError::Evaluation {
                query,
                message: format!("{}: {}", function, message),
            },
            XPathError::TypeError(message) => QueryError::Evaluation { query, message },
        }
    }

    /// The query text that failed.
    pub fn query(&self) -> &str {
        match self {
            QueryError::Syntax { query, .. }
            | QueryError::TypeMismatch { query, .. }
            | QueryError::UnknownFunction { query, .. }
            | QueryError::UndefinedVariable { query, .. }
            | QueryError::Evaluation { query, .. } => query,
        }
    }
}

/// The error type of every public entry point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Parsing failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Query failed: {0}")]
    Query(#[from] QueryError),
}
