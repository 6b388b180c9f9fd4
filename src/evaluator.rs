//! Compiles XPath queries and delivers their matches as [`XPathResult`]s.
//!
//! Matches reach the caller through a [`ResultSink`]: a `Vec<XPathResult>`
//! collects them, a [`Callback`] hands them to a closure one at a time. Either
//! way the node-set is fully evaluated before the first delivery, so a query
//! error means nothing was delivered.

use crate::error::{Error, QueryError};
use crate::loader::{Document, with_document};
use crate::options::LoadOptions;
use crate::result::{XPathResult, extract};
use bytepath_xpath1::{
    DataSourceNode, EvaluationContext, Expression, FunctionRegistry, XPathValue, evaluate,
    parse_expression, validate,
};
use log::debug;
use std::collections::HashMap;
use std::sync::LazyLock;

static CORE_FUNCTIONS: LazyLock<FunctionRegistry> = LazyLock::new(FunctionRegistry::default);

/// Receives the results of a query in document order.
pub trait ResultSink {
    /// Load and query failures convert into this type; sink failures are
    /// returned to the caller as they are.
    type Error: From<Error>;

    /// Takes one result. An error stops delivery.
    fn accept(&mut self, result: XPathResult) -> Result<(), Self::Error>;
}

impl ResultSink for Vec<XPathResult> {
    type Error = Error;

    fn accept(&mut self, result: XPathResult) -> Result<(), Error> {
        self.push(result);
        Ok(())
    }
}

/// Adapts a closure into a [`ResultSink`].
pub struct Callback<F>(pub F);

impl<F, E> ResultSink for Callback<F>
where
    F: FnMut(XPathResult) -> Result<(), E>,
    E: From<Error>,
{
    type Error = E;

    fn accept(&mut self, result: XPathResult) -> Result<(), E> {
        (self.0)(result)
    }
}

/// A query compiled together with its namespace bindings, reusable across documents.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    query: String,
    expression: Expression,
    namespaces: HashMap<String, String>,
}

impl CompiledQuery {
    /// Parses `query` and checks it against the XPath 1.0 core function library.
    ///
    /// Prefixes used in name tests resolve through `namespaces`; a prefix that
    /// is not bound there makes its name test match nothing.
    pub fn compile(
        query: &str,
        namespaces: &HashMap<String, String>,
    ) -> Result<Self, QueryError> {
        let expression =
            parse_expression(query).map_err(|e| QueryError::from_xpath(query, e))?;
        validate(&expression, &CORE_FUNCTIONS).map_err(|e| QueryError::from_xpath(query, e))?;
        debug!(
            "Compiled XPath '{}' with {} namespace binding(s)",
            query,
            namespaces.len()
        );
        Ok(Self {
            query: query.to_string(),
            expression,
            namespaces: namespaces.clone(),
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Evaluates against `document` and collects every result.
    pub fn select(&self, document: &Document<'_>) -> Result<Vec<XPathResult>, Error> {
        let mut results = Vec::new();
        self.deliver(document, &mut results)?;
        Ok(results)
    }

    /// Evaluates against `document` and feeds each result to `sink`, stopping
    /// at the first sink error. Returns the number of results delivered.
    pub fn deliver<S: ResultSink>(
        &self,
        document: &Document<'_>,
        sink: &mut S,
    ) -> Result<usize, S::Error> {
        match document {
            Document::Xml(doc) => self.deliver_from(doc.root_node(), sink),
            Document::Html(doc) => self.deliver_from(doc.root_node(), sink),
        }
    }

    fn deliver_from<'a, N, S>(&self, root: N, sink: &mut S) -> Result<usize, S::Error>
    where
        N: DataSourceNode<'a> + 'a,
        S: ResultSink,
    {
        let nodes = self.select_nodes(root).map_err(Error::from)?;
        debug!("XPath '{}' matched {} node(s)", self.query, nodes.len());
        let mut delivered = 0;
        for node in nodes {
            sink.accept(extract(&self.query, node))?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// The matched nodes in document order, without duplicates.
    fn select_nodes<'a, N>(&self, root: N) -> Result<Vec<N>, QueryError>
    where
        N: DataSourceNode<'a> + 'a,
    {
        let e_ctx = EvaluationContext::new(root, root, &CORE_FUNCTIONS, &self.namespaces);
        match evaluate(&self.expression, &e_ctx) {
            Ok(XPathValue::NodeSet(mut nodes)) => {
                nodes.sort();
                nodes.dedup();
                Ok(nodes)
            }
            Ok(other) => Err(QueryError::TypeMismatch {
                query: self.query.clone(),
                found: other.type_name().to_string(),
            }),
            Err(e) => Err(QueryError::from_xpath(&self.query, e)),
        }
    }
}

/// Runs `query` against a loaded document and collects the results.
/// An empty match is an empty vector.
pub fn find_xpath(
    document: &Document<'_>,
    query: &str,
    namespaces: &HashMap<String, String>,
) -> Result<Vec<XPathResult>, Error> {
    CompiledQuery::compile(query, namespaces)?.select(document)
}

/// Runs `query` against a loaded document and calls `handler` once per
/// match, in document order. The first handler error stops iteration and is
/// returned unchanged.
pub fn for_each_match<F, E>(
    document: &Document<'_>,
    query: &str,
    namespaces: &HashMap<String, String>,
    handler: F,
) -> Result<(), E>
where
    F: FnMut(XPathResult) -> Result<(), E>,
    E: From<Error>,
{
    let compiled = CompiledQuery::compile(query, namespaces).map_err(Error::from)?;
    compiled.deliver(document, &mut Callback(handler))?;
    Ok(())
}

/// Loads `buffer` as strict XML and collects the matches of `query`.
pub fn find_xpath_in(
    buffer: &[u8],
    query: &str,
    namespaces: &HashMap<String, String>,
) -> Result<Vec<XPathResult>, Error> {
    find_xpath_in_with_options(buffer, query, namespaces, &LoadOptions::default())
}

/// Loads `buffer` with `options` and collects the matches of `query`.
pub fn find_xpath_in_with_options(
    buffer: &[u8],
    query: &str,
    namespaces: &HashMap<String, String>,
    options: &LoadOptions,
) -> Result<Vec<XPathResult>, Error> {
    with_document(buffer, options, |document| {
        find_xpath(document, query, namespaces)
    })
}

/// Loads `buffer` as strict XML and calls `handler` for each match of `query`.
pub fn for_each_xpath_in<F, E>(
    buffer: &[u8],
    query: &str,
    namespaces: &HashMap<String, String>,
    handler: F,
) -> Result<(), E>
where
    F: FnMut(XPathResult) -> Result<(), E>,
    E: From<Error>,
{
    for_each_xpath_in_with_options(buffer, query, namespaces, &LoadOptions::default(), handler)
}

/// Loads `buffer` with `options` and calls `handler` for each match of `query`.
pub fn for_each_xpath_in_with_options<F, E>(
    buffer: &[u8],
    query: &str,
    namespaces: &HashMap<String, String>,
    options: &LoadOptions,
    handler: F,
) -> Result<(), E>
where
    F: FnMut(XPathResult) -> Result<(), E>,
    E: From<Error>,
{
    with_document(buffer, options, |document| {
        for_each_match(document, query, namespaces, handler)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Source;

    fn no_namespaces() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_compile_errors() {
        let ns = no_namespaces();
        assert!(matches!(
            CompiledQuery::compile("//[", &ns),
            Err(QueryError::Syntax { ref query, .. }) if query == "//["
        ));
        assert!(matches!(
            CompiledQuery::compile("//a[foo(1)]", &ns),
            Err(QueryError::UnknownFunction { ref name, .. }) if name == "foo"
        ));
        assert!(matches!(
            CompiledQuery::compile("//a[@id = $id]", &ns),
            Err(QueryError::UndefinedVariable { ref name, .. }) if name == "id"
        ));
    }

    #[test]
    fn test_compiled_query_is_reusable_across_documents() {
        let compiled = CompiledQuery::compile("//b", &no_namespaces()).unwrap();
        assert_eq!(compiled.query(), "//b");
        assert!(compiled.expression().is_location_path());

        let first = Source::from_text("<a><b>1</b></a>");
        let second = Source::from_text("<a><b>2</b><b>3</b></a>");
        let options = LoadOptions::default();
        let first = compiled
            .select(&Document::parse(&first, &options).unwrap())
            .unwrap();
        let second = compiled
            .select(&Document::parse(&second, &options).unwrap())
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(
            second.iter().map(|r| r.content()).collect::<Vec<_>>(),
            vec!["2", "3"]
        );
    }

    #[test]
    fn test_deliver_counts_results() {
        let source = Source::from_text("<a><b/><b/><c/></a>");
        let doc = Document::parse(&source, &LoadOptions::default()).unwrap();
        let compiled = CompiledQuery::compile("//b | //c", &no_namespaces()).unwrap();
        let mut names = Vec::new();
        let delivered = compiled
            .deliver(
                &doc,
                &mut Callback(|r: XPathResult| {
                    names.push(r.name().unwrap_or_default().to_string());
                    Ok::<_, Error>(())
                }),
            )
            .unwrap();
        assert_eq!(delivered, 3);
        assert_eq!(names, vec!["b", "b", "c"]);
    }

    #[test]
    fn test_scalar_results_are_type_mismatches() {
        let source = Source::from_text("<a/>");
        let doc = Document::parse(&source, &LoadOptions::default()).unwrap();
        let ns = no_namespaces();
        for (query, found) in [
            ("count(//a)", "number"),
            ("string(/a)", "string"),
            ("boolean(/a)", "boolean"),
        ] {
            match find_xpath(&doc, query, &ns) {
                Err(Error::Query(QueryError::TypeMismatch { found: f, .. })) => {
                    assert_eq!(f, found)
                }
                other => panic!("Expected TypeMismatch for {}, got {:?}", query, other),
            }
        }
    }

    #[test]
    fn test_runtime_errors_are_evaluation_errors() {
        let ns = no_namespaces();
        let err = find_xpath_in(b"<a/>", "//a[count('x') > 0]", &ns).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::Evaluation { .. })));
    }
}
