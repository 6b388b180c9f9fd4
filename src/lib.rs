//! XPath 1.0 queries over raw XML and HTML byte buffers.
//!
//! A buffer is decoded and parsed on demand, the query is evaluated against
//! the document root, and every matched node comes back as an owned
//! [`XPathResult`]: the query, the node's local name, its string-value and its
//! attributes.
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! let xml = br#"<a:root xmlns:a="urn:x"><a:item>hi</a:item></a:root>"#;
//! let namespaces = HashMap::from([("a".to_string(), "urn:x".to_string())]);
//! let results = bytepath::find_xpath_in(xml, "//a:item", &namespaces)?;
//! assert_eq!(results[0].content(), "hi");
//! # Ok::<(), bytepath::Error>(())
//! ```

pub mod datasources;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod options;
pub mod result;

pub use bytepath_xpath1 as xpath1;

pub use error::{Error, ParseError, QueryError};
pub use evaluator::{
    Callback, CompiledQuery, ResultSink, find_xpath, find_xpath_in, find_xpath_in_with_options,
    for_each_match, for_each_xpath_in, for_each_xpath_in_with_options,
};
pub use loader::{Document, Source, with_document};
pub use options::{LoadOptions, ParseMode};
pub use result::{XPathResult, extract};
