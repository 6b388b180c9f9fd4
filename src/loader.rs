//! Turns raw byte buffers into navigable documents.
//!
//! Loading happens in two stages because the XML tree borrows its text:
//! [`Source::decode`] produces UTF-8 text (borrowed when the buffer already is
//! UTF-8), and [`Document::parse`] builds a tree over it. [`with_document`]
//! runs both and hands the document to a closure.

use crate::datasources::{HtmlDocument, XmlDocument};
use crate::error::{Error, ParseError};
use crate::options::{LoadOptions, ParseMode};
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use log::debug;
use std::borrow::Cow;

/// The decoded text of a buffer.
#[derive(Debug, Clone)]
pub struct Source<'a> {
    text: Cow<'a, str>,
    encoding: &'static Encoding,
}

impl<'a> Source<'a> {
    /// Decodes `buffer` to UTF-8.
    ///
    /// A byte order mark wins over everything else. Without one, the
    /// `encoding` label of an XML declaration is honoured, and UTF-8 is the
    /// fallback. Empty or whitespace-only input is [`ParseError::Empty`].
    pub fn decode(buffer: &'a [u8]) -> Result<Self, ParseError> {
        if buffer.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::Empty);
        }

        let (encoding, body) = match Encoding::for_bom(buffer) {
            Some((encoding, bom_len)) => (encoding, &buffer[bom_len..]),
            None => (declared_encoding(buffer)?.unwrap_or(UTF_8), buffer),
        };

        let text = if encoding == UTF_8 {
            std::str::from_utf8(body)
                .map(Cow::Borrowed)
                .map_err(|e| ParseError::Encoding(format!("invalid UTF-8: {}", e)))?
        } else {
            let (text, had_errors) = encoding.decode_without_bom_handling(body);
            if had_errors {
                return Err(ParseError::Encoding(format!(
                    "malformed byte sequence for encoding {}",
                    encoding.name()
                )));
            }
            text
        };

        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        debug!(
            "Decoded {} byte(s) as {} ({} char(s))",
            buffer.len(),
            encoding.name(),
            text.chars().count()
        );
        Ok(Self { text, encoding })
    }

    /// Wraps text that is already decoded.
    pub fn from_text(text: &'a str) -> Self {
        Self {
            text: Cow::Borrowed(text),
            encoding: UTF_8,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Name of the encoding the buffer was decoded from.
    pub fn encoding(&self) -> &'static str {
        self.encoding.name()
    }

    /// Whether decoding had to allocate a transcoded copy.
    pub fn is_transcoded(&self) -> bool {
        matches!(self.text, Cow::Owned(_))
    }
}

/// Resolves the `encoding` label of a leading XML declaration.
fn declared_encoding(buffer: &[u8]) -> Result<Option<&'static Encoding>, ParseError> {
    let Some(label) = declared_label(buffer) else {
        return Ok(None);
    };
    let encoding = Encoding::for_label(label).ok_or_else(|| {
        ParseError::Encoding(format!(
            "unsupported encoding '{}'",
            String::from_utf8_lossy(label)
        ))
    })?;
    // The declaration was readable as ASCII, so the bytes cannot be UTF-16
    // without a byte order mark.
    if encoding == UTF_16LE || encoding == UTF_16BE {
        return Ok(Some(UTF_8));
    }
    Ok(Some(encoding))
}

/// Scans `<?xml ... encoding="label" ... ?>` at the very start of the buffer.
fn declared_label(buffer: &[u8]) -> Option<&[u8]> {
    let decl = buffer.strip_prefix(b"<?xml")?;
    let end = decl.windows(2).position(|w| w == b"?>")?;
    let decl = &decl[..end];

    let at = decl.windows(8).position(|w| w == b"encoding")?;
    let rest = decl[at + 8..].trim_ascii_start().strip_prefix(b"=")?;
    let (&quote, rest) = rest.trim_ascii_start().split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let len = rest.iter().position(|&b| b == quote)?;
    Some(&rest[..len])
}

/// A parsed document. XML documents borrow the [`Source`] text; HTML documents
/// own their flattened tree.
pub enum Document<'input> {
    Xml(XmlDocument<'input>),
    Html(HtmlDocument),
}

impl<'input> Document<'input> {
    /// Parses decoded text with the parser selected by `options.mode`.
    pub fn parse(source: &'input Source<'_>, options: &LoadOptions) -> Result<Self, ParseError> {
        match options.mode {
            ParseMode::Xml => {
                let doc = XmlDocument::parse(source.as_str(), options).map_err(|e| {
                    let pos = e.pos();
                    ParseError::Malformed {
                        line: pos.row,
                        column: pos.col,
                        message: e.to_string(),
                    }
                })?;
                debug!("Parsed XML document with {} node(s)", doc.node_count());
                Ok(Document::Xml(doc))
            }
            ParseMode::Html => Ok(Document::Html(HtmlDocument::parse(source.as_str()))),
        }
    }

    pub fn mode(&self) -> ParseMode {
        match self {
            Document::Xml(_) => ParseMode::Xml,
            Document::Html(_) => ParseMode::Html,
        }
    }
}

/// Decodes and parses `buffer`, then runs `f` against the document.
///
/// Load failures surface as `E` through its `From<Error>` conversion, so `f`
/// never runs for a buffer that cannot be loaded.
pub fn with_document<T, E, F>(buffer: &[u8], options: &LoadOptions, f: F) -> Result<T, E>
where
    E: From<Error>,
    F: FnOnce(&Document<'_>) -> Result<T, E>,
{
    let source = Source::decode(buffer).map_err(Error::from)?;
    let document = Document::parse(&source, options).map_err(Error::from)?;
    f(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le_with_bom(text: &str) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(text.encode_utf16().flat_map(|u| u.to_le_bytes()));
        bytes
    }

    #[test]
    fn test_empty_buffers() {
        assert_eq!(Source::decode(b"").unwrap_err(), ParseError::Empty);
        assert_eq!(Source::decode(b" \n\t ").unwrap_err(), ParseError::Empty);
        assert_eq!(
            Source::decode(b"\xEF\xBB\xBF").unwrap_err(),
            ParseError::Empty
        );
    }

    #[test]
    fn test_utf8_is_borrowed() {
        let source = Source::decode(b"<r>caf\xC3\xA9</r>").unwrap();
        assert_eq!(source.as_str(), "<r>café</r>");
        assert_eq!(source.encoding(), "UTF-8");
        assert!(!source.is_transcoded());

        let with_bom = Source::decode(b"\xEF\xBB\xBF<r/>").unwrap();
        assert_eq!(with_bom.as_str(), "<r/>");
    }

    #[test]
    fn test_utf16_bom() {
        let bytes = utf16le_with_bom("<?xml version=\"1.0\" encoding=\"UTF-16\"?><r>ü</r>");
        let source = Source::decode(&bytes).unwrap();
        assert_eq!(source.encoding(), "UTF-16LE");
        assert!(source.as_str().ends_with("<r>ü</r>"));
        assert!(source.is_transcoded());
    }

    #[test]
    fn test_declared_encoding() {
        let bytes = b"<?xml version=\"1.0\" encoding='ISO-8859-1'?><r>\xE9t\xE9</r>";
        let source = Source::decode(bytes).unwrap();
        assert_eq!(source.as_str(), "<?xml version=\"1.0\" encoding='ISO-8859-1'?><r>été</r>");
        // encoding_rs maps the ISO-8859-1 label to windows-1252.
        assert_eq!(source.encoding(), "windows-1252");
    }

    #[test]
    fn test_declared_label() {
        assert_eq!(
            declared_label(b"<?xml version=\"1.0\" encoding = \"Shift_JIS\" ?><r/>"),
            Some(&b"Shift_JIS"[..])
        );
        assert_eq!(declared_label(b"<?xml version=\"1.0\"?><r/>"), None);
        assert_eq!(declared_label(b"<r encoding=\"x\"/>"), None);
    }

    #[test]
    fn test_encoding_errors() {
        let unknown = Source::decode(b"<?xml version=\"1.0\" encoding=\"klingon\"?><r/>");
        assert!(matches!(unknown, Err(ParseError::Encoding(ref m)) if m.contains("klingon")));

        let invalid = Source::decode(b"<r>\xFF\xFE\xFD</r>");
        assert!(matches!(invalid, Err(ParseError::Encoding(_))));
    }

    #[test]
    fn test_malformed_xml_reports_position() {
        let source = Source::from_text("<root>\n  <item>\n</root>");
        match Document::parse(&source, &LoadOptions::default()) {
            Err(ParseError::Malformed { line, message, .. }) => {
                assert_eq!(line, 3);
                assert!(!message.is_empty());
            }
            Err(other) => panic!("Expected Malformed, got {:?}", other),
            Ok(_) => panic!("Expected Malformed, got a document"),
        }
    }

    #[test]
    fn test_html_mode_never_fails_on_markup() {
        let source = Source::from_text("<p>unclosed <b>bold");
        let doc = Document::parse(&source, &LoadOptions::html()).unwrap();
        assert_eq!(doc.mode(), ParseMode::Html);
        assert!(Document::parse(&source, &LoadOptions::default()).is_err());
    }

    #[test]
    fn test_with_document_short_circuits_on_load_errors() {
        let mut called = false;
        let result: Result<(), Error> = with_document(b"<a>", &LoadOptions::default(), |_| {
            called = true;
            Ok(())
        });
        assert!(matches!(result, Err(Error::Parse(ParseError::Malformed { .. }))));
        assert!(!called);

        let mode = with_document(b"<a/>", &LoadOptions::default(), |doc| {
            Ok::<_, Error>(doc.mode())
        })
        .unwrap();
        assert_eq!(mode, ParseMode::Xml);
    }
}
