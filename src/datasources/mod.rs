//! Adapters that expose parsed trees to the XPath engine as `DataSourceNode`s.

pub mod html;
pub mod xml;

pub use html::{HtmlDocument, HtmlNode};
pub use xml::{XmlDocument, XmlNode};
