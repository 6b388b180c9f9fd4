/// A small catalog with attributes, mixed content and a comment.
pub const CATALOG: &str = r#"<?xml version="1.0"?>
<catalog>
  <book id="b1" lang="en"><title>Dune</title><price>9.5</price></book>
  <book id="b2" lang="fr"><title>Vendredi</title><price>12</price></book>
  <!-- out of print -->
  <book id="b3"><title>Ubik</title><price>7.25</price></book>
</catalog>"#;

/// Two namespaces plus an unqualified element with the same local name.
pub const NAMESPACED: &str = r#"<root xmlns:a="urn:a" xmlns:b="urn:b">
  <a:item>first</a:item>
  <b:item>second</b:item>
  <item>plain</item>
  <a:item a:flag="on">third</a:item>
</root>"#;

/// Tag soup that only an HTML parser accepts.
pub const TAG_SOUP: &str = r#"<html><body>
<ul class="menu"><li><a href="/one">One<li><a href="/two">Two</ul>
<p>unclosed <b>bold
</body></html>"#;

/// Encodes `text` as UTF-16LE with a byte order mark.
pub fn utf16le_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(text.encode_utf16().flat_map(|u| u.to_le_bytes()));
    bytes
}

/// Encodes `text` as UTF-16BE with a byte order mark.
pub fn utf16be_with_bom(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(text.encode_utf16().flat_map(|u| u.to_be_bytes()));
    bytes
}
