//! Load-time configuration.

use serde::{Deserialize, Serialize};

/// Which parser turns the decoded text into a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Strict, namespace-aware XML. Malformed input is an error.
    #[default]
    Xml,
    /// Tolerant HTML5 tree building. Markup errors are recovered.
    Html,
}

/// Options applied when a buffer is loaded into a [`Document`](crate::Document).
///
/// Missing fields take their defaults when deserialized, so hosts can embed
/// a partial table in their own configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub mode: ParseMode,
    /// Accept a DOCTYPE declaration in XML mode.
    pub allow_dtd: bool,
    /// Upper bound on the number of nodes in an XML document.
    pub nodes_limit: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            mode: ParseMode::Xml,
            allow_dtd: false,
            nodes_limit: u32::MAX,
        }
    }
}

impl LoadOptions {
    /// Default options with tolerant HTML parsing.
    pub fn html() -> Self {
        Self::default().with_mode(ParseMode::Html)
    }

    pub fn with_mode(mut self, mode: ParseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_allow_dtd(mut self, allow_dtd: bool) -> Self {
        self.allow_dtd = allow_dtd;
        self
    }

    pub fn with_nodes_limit(mut self, nodes_limit: u32) -> Self {
        self.nodes_limit = nodes_limit;
        self
    }
}
