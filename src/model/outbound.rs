//! The slimmed-down message that is forwarded instead of the held one.
//!
//! Layout on the wire:
//!
//! ```text
//! multipart/mixed
//! ├── text/plain            (note about the saved attachments, optional)
//! └── multipart/alternative
//!     └── textual parts of the original, headers and bodies untouched
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use super::part::{Body, Headers, MimePart};

/// Maximum line length of base64 bodies we generate.
const BASE64_LINE: usize = 76;

/// A rebuilt message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Top-level headers in output order (From, Date, Subject, To, …).
    pub headers: Headers,
    /// Plain-text note announcing where the attachments went.
    pub note: Option<String>,
    /// Non-empty textual parts of the original message.
    pub alternatives: Vec<MimePart>,
}

impl OutboundMessage {
    /// Value of the first top-level header called `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Serialize to an RFC 5322 document with CRLF line endings.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mixed = self.boundary("mixed");
        let alternative = self.boundary("alternative");
        let mut out = Vec::new();

        write_header(
            &mut out,
            "Content-Type",
            &format!("multipart/mixed; boundary=\"{mixed}\""),
        );
        write_header(&mut out, "MIME-Version", "1.0");
        for (name, value) in self.headers.iter() {
            write_raw_header(&mut out, name, value);
        }
        out.extend_from_slice(b"\r\n");

        if let Some(note) = &self.note {
            write_delimiter(&mut out, &mixed);
            write_note(&mut out, note);
        }

        write_delimiter(&mut out, &mixed);
        write_header(
            &mut out,
            "Content-Type",
            &format!("multipart/alternative; boundary=\"{alternative}\""),
        );
        write_header(&mut out, "MIME-Version", "1.0");
        out.extend_from_slice(b"\r\n");
        for part in &self.alternatives {
            write_delimiter(&mut out, &alternative);
            write_part(&mut out, part);
        }
        write_close(&mut out, &alternative);
        out.extend_from_slice(b"\r\n");
        write_close(&mut out, &mixed);

        out
    }

    /// Pick a boundary that does not occur anywhere in the content.
    fn boundary(&self, kind: &str) -> String {
        let seed = format!(
            "{}|{}",
            self.header("message-id").unwrap_or_default(),
            self.header("date").unwrap_or_default()
        );
        let mut salt = 0u32;
        loop {
            let digest = Sha256::digest(format!("{seed}|{kind}|{salt}").as_bytes());
            let hex: String = digest.iter().take(12).map(|b| format!("{b:02x}")).collect();
            let candidate = format!("==============={hex}==");
            if !self.contains(candidate.as_bytes()) {
                return candidate;
            }
            salt += 1;
        }
    }

    fn contains(&self, needle: &[u8]) -> bool {
        let in_note = self
            .note
            .as_deref()
            .is_some_and(|n| find(n.as_bytes(), needle));
        in_note
            || self.alternatives.iter().any(|part| {
                part.headers.iter().any(|(_, v)| find(v, needle))
                    || body_bytes(part).is_some_and(|b| find(b, needle))
            })
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn body_bytes(part: &MimePart) -> Option<&[u8]> {
    match &part.body {
        Body::Leaf(bytes) => Some(bytes),
        Body::Message { raw, .. } => Some(raw),
        Body::Multipart(_) => None,
    }
}

fn write_header(out: &mut Vec<u8>, name: &str, value: &str) {
    write_raw_header(out, name, value.as_bytes());
}

fn write_raw_header(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(&to_crlf(value));
    out.extend_from_slice(b"\r\n");
}

fn write_delimiter(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
}

fn write_close(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
}

/// Note part: 7bit US-ASCII when possible, base64 UTF-8 otherwise.
fn write_note(out: &mut Vec<u8>, note: &str) {
    if note.is_ascii() {
        write_header(out, "Content-Type", "text/plain; charset=\"us-ascii\"");
        write_header(out, "MIME-Version", "1.0");
        write_header(out, "Content-Transfer-Encoding", "7bit");
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&to_crlf(note.as_bytes()));
        ensure_line_end(out);
    } else {
        write_header(out, "Content-Type", "text/plain; charset=\"utf-8\"");
        write_header(out, "MIME-Version", "1.0");
        write_header(out, "Content-Transfer-Encoding", "base64");
        out.extend_from_slice(b"\r\n");
        let encoded = STANDARD.encode(note.as_bytes());
        for line in encoded.as_bytes().chunks(BASE64_LINE) {
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }
}

/// Embed an original part with its own headers and body bytes.
fn write_part(out: &mut Vec<u8>, part: &MimePart) {
    for (name, value) in part.headers.iter() {
        write_raw_header(out, name, value);
    }
    out.extend_from_slice(b"\r\n");
    if let Some(body) = body_bytes(part) {
        out.extend_from_slice(&to_crlf(body));
    }
    ensure_line_end(out);
}

fn ensure_line_end(out: &mut Vec<u8>) {
    if !out.ends_with(b"\r\n") {
        out.extend_from_slice(b"\r\n");
    }
}

/// Turn bare `\n` into `\r\n`, leaving existing `\r\n` alone.
fn to_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 32);
    let mut prev = 0u8;
    for &b in data {
        if b == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        prev = b;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_part(ct: &str, body: &str) -> MimePart {
        let mut headers = Headers::new();
        headers.push("Content-Type", ct);
        MimePart {
            headers,
            body: Body::Leaf(body.as_bytes().to_vec()),
        }
    }

    fn message(note: Option<&str>, alternatives: Vec<MimePart>) -> OutboundMessage {
        let mut headers = Headers::new();
        headers.push("From", "Alice <alice@example.org>");
        headers.push("Subject", "Hello");
        headers.push("Message-ID", "<detached_at_1_from_x@y>");
        OutboundMessage {
            headers,
            note: note.map(String::from),
            alternatives,
        }
    }

    #[test]
    fn test_to_crlf() {
        assert_eq!(to_crlf(b"a\nb\r\nc"), b"a\r\nb\r\nc");
    }

    #[test]
    fn test_serialized_layout() {
        let msg = message(
            Some("saved to /srv/x\n"),
            vec![text_part("text/plain", "Hi there\n")],
        );
        let text = String::from_utf8(msg.to_bytes()).unwrap();

        assert!(text.starts_with("Content-Type: multipart/mixed; boundary=\"==============="));
        assert!(text.contains("\r\nMIME-Version: 1.0\r\nFrom: Alice <alice@example.org>\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: 7bit\r\n\r\nsaved to /srv/x\r\n"));
        assert!(text.contains("Content-Type: multipart/alternative; boundary="));
        assert!(text.contains("Content-Type: text/plain\r\n\r\nHi there\r\n"));
        assert!(!text.contains("\r\r"));
        assert!(text.ends_with("--\r\n"));

        let note_at = text.find("saved to").unwrap();
        let body_at = text.find("Hi there").unwrap();
        assert!(note_at < body_at);
    }

    #[test]
    fn test_no_note_part_without_note() {
        let msg = message(None, vec![text_part("text/plain", "Hi")]);
        let text = String::from_utf8(msg.to_bytes()).unwrap();
        assert!(!text.contains("Content-Transfer-Encoding: 7bit"));
        assert!(!text.contains("charset=\"us-ascii\""));
    }

    #[test]
    fn test_non_ascii_note_is_base64() {
        let msg = message(Some("gespeichert in /srv/Übung"), Vec::new());
        let text = String::from_utf8(msg.to_bytes()).unwrap();
        assert!(text.contains("charset=\"utf-8\"\r\nMIME-Version: 1.0\r\nContent-Transfer-Encoding: base64"));
        assert!(!text.contains("Übung"));
    }

    #[test]
    fn test_folded_header_uses_crlf() {
        let mut msg = message(None, Vec::new());
        msg.headers.push("X-Long", "first\n\tsecond");
        let text = String::from_utf8(msg.to_bytes()).unwrap();
        assert!(text.contains("X-Long: first\r\n\tsecond\r\n"));
    }

    #[test]
    fn test_boundaries_differ_and_avoid_content() {
        let msg = message(None, vec![text_part("text/plain", "body")]);
        let mixed = msg.boundary("mixed");
        let alternative = msg.boundary("alternative");
        assert_ne!(mixed, alternative);

        let sneaky = message(Some(format!("--{mixed}").as_str()), Vec::new());
        assert_ne!(sneaky.boundary("mixed"), mixed);
    }
}
