pub mod fixtures;

use bytepath::{Error, XPathResult, find_xpath_in, for_each_xpath_in};
use std::collections::HashMap;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Builds a namespace map from `(prefix, uri)` pairs.
pub fn ns(bindings: &[(&str, &str)]) -> HashMap<String, String> {
    bindings
        .iter()
        .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
        .collect()
}

/// Runs `query` in callback mode and returns what the callback received.
pub fn collect_via_callback(
    buffer: &[u8],
    query: &str,
    namespaces: &HashMap<String, String>,
) -> Result<Vec<XPathResult>, Error> {
    let mut seen = Vec::new();
    for_each_xpath_in(buffer, query, namespaces, |result| {
        seen.push(result);
        Ok::<_, Error>(())
    })?;
    Ok(seen)
}

/// Runs `query` in both modes and checks they agree.
pub fn query_both_ways(
    buffer: &[u8],
    query: &str,
    namespaces: &HashMap<String, String>,
) -> Result<Vec<XPathResult>, Error> {
    let collected = find_xpath_in(buffer, query, namespaces)?;
    let called = collect_via_callback(buffer, query, namespaces)?;
    assert_eq!(collected, called, "modes disagree for {}", query);
    Ok(collected)
}

pub fn contents(results: &[XPathResult]) -> Vec<&str> {
    results.iter().map(|r| r.content()).collect()
}

pub fn names(results: &[XPathResult]) -> Vec<Option<&str>> {
    results.iter().map(|r| r.name()).collect()
}
