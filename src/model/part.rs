//! MIME part tree.
//!
//! A message is an ordered tree: leaves carry their still-encoded body
//! bytes, containers carry their children in document order.

use crate::parser::header;

/// Ordered, multi-valued header map.
///
/// Names keep their original spelling. Every value is held twice: as the
/// bytes found on the wire (encoded-words undecoded, folds kept) and as
/// text for inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<HeaderField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderField {
    name: String,
    value: String,
    raw: Vec<u8>,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any earlier header of the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        self.entries.push(HeaderField {
            name: name.into(),
            raw: value.as_bytes().to_vec(),
            value,
        });
    }

    /// Append a header whose value is taken byte for byte from a message.
    pub fn push_raw(&mut self, name: impl Into<String>, raw: &[u8]) {
        self.entries.push(HeaderField {
            name: name.into(),
            value: header::decode_header_bytes(raw),
            raw: raw.to_vec(),
        });
    }

    /// First value for `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value.as_str())
    }

    /// Wire bytes of the first value for `name` (case-insensitive).
    pub fn get_raw(&self, name: &str) -> Option<&[u8]> {
        self.field(name).map(|f| f.raw.as_slice())
    }

    fn field(&self, name: &str) -> Option<&HeaderField> {
        self.entries
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Whether `name` is present with a value that is not blank.
    pub fn has_value(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.trim().is_empty())
    }

    /// Iterate over `(name, wire bytes)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|f| (f.name.as_str(), f.raw.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Body of a MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Leaf content, exactly as found between the headers and the line
    /// break in front of the next boundary (transfer encoding not reversed).
    Leaf(Vec<u8>),
    /// Children of a `multipart/*` container.
    Multipart(Vec<MimePart>),
    /// An embedded `message/rfc822` document.
    Message {
        /// The embedded message as it appeared on the wire.
        raw: Vec<u8>,
        message: Box<MimePart>,
    },
}

/// One node of a parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
    pub headers: Headers,
    pub body: Body,
}

impl MimePart {
    /// Raw value of the first header called `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Media type without parameters, lowercased (`text/plain` when absent).
    pub fn media_type(&self) -> String {
        self.header("content-type")
            .and_then(|ct| ct.split(';').next())
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "text/plain".to_string())
    }

    /// Immediate children: the parts of a container, or the single
    /// embedded message of a `message/rfc822` part.
    pub fn children(&self) -> &[MimePart] {
        match &self.body {
            Body::Leaf(_) => &[],
            Body::Multipart(parts) => parts,
            Body::Message { message, .. } => std::slice::from_ref(message.as_ref()),
        }
    }

    /// Leaf body bytes, `None` for containers.
    pub fn leaf(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Leaf(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Pre-order traversal starting with `self`, descending into
    /// multipart children and embedded messages.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`MimePart::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a MimePart>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a MimePart;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.children().iter().rev());
        Some(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(ct: &str, body: &str) -> MimePart {
        let mut headers = Headers::new();
        headers.push("Content-Type", ct);
        MimePart {
            headers,
            body: Body::Leaf(body.as_bytes().to_vec()),
        }
    }

    fn container(ct: &str, parts: Vec<MimePart>) -> MimePart {
        let mut headers = Headers::new();
        headers.push("Content-Type", ct);
        MimePart {
            headers,
            body: Body::Multipart(parts),
        }
    }

    #[test]
    fn test_headers_case_insensitive_first_match() {
        let mut h = Headers::new();
        h.push("Received", "one");
        h.push("RECEIVED", "two");
        assert_eq!(h.get("received"), Some("one"));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_raw_value_is_kept_apart_from_text() {
        let mut h = Headers::new();
        h.push_raw("Subject", b"caf\xe9 =?UTF-8?Q?x?=");
        assert_eq!(h.get("subject"), Some("café =?UTF-8?Q?x?="));
        assert_eq!(h.get_raw("SUBJECT"), Some(&b"caf\xe9 =?UTF-8?Q?x?="[..]));
        let pairs: Vec<(&str, &[u8])> = h.iter().collect();
        assert_eq!(pairs, vec![("Subject", &b"caf\xe9 =?UTF-8?Q?x?="[..])]);
    }

    #[test]
    fn test_has_value_blank() {
        let mut h = Headers::new();
        h.push("X-List-Administrivia", "");
        assert!(!h.has_value("X-List-Administrivia"));
        h.push("X-Other", "yes");
        assert!(h.has_value("x-other"));
        assert!(!h.has_value("missing"));
    }

    #[test]
    fn test_media_type_strips_parameters() {
        let part = leaf("Text/HTML; charset=utf-8", "<p>x</p>");
        assert_eq!(part.media_type(), "text/html");
    }

    #[test]
    fn test_media_type_default() {
        let part = MimePart {
            headers: Headers::new(),
            body: Body::Leaf(Vec::new()),
        };
        assert_eq!(part.media_type(), "text/plain");
    }

    #[test]
    fn test_walk_preorder_into_nested_message() {
        let inner = container(
            "multipart/alternative",
            vec![leaf("text/plain", "a"), leaf("text/html", "b")],
        );
        let nested = MimePart {
            headers: {
                let mut h = Headers::new();
                h.push("Content-Type", "message/rfc822");
                h
            },
            body: Body::Message {
                raw: Vec::new(),
                message: Box::new(inner),
            },
        };
        let root = container("multipart/mixed", vec![leaf("text/plain", "intro"), nested]);

        let types: Vec<String> = root.walk().map(MimePart::media_type).collect();
        assert_eq!(
            types,
            vec![
                "multipart/mixed",
                "text/plain",
                "message/rfc822",
                "multipart/alternative",
                "text/plain",
                "text/html",
            ]
        );
    }
}
