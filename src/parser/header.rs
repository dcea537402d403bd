//! Header values: verbatim copies out of the raw message, the
//! `Content-Disposition` filename policy and encoded-words (RFC 2047).

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use mail_parser::Header;
use tracing::warn;

use crate::model::part::Headers;

/// Base64 engine that does not insist on padding, which is frequently missing in the wild.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Collect the header fields mail-parser found, copying each value out
/// of `raw` exactly as it was written.
///
/// The separator after the colon and the final line break are not part
/// of the value; the breaks inside a folded value are.
pub fn headers_from(raw: &[u8], fields: &[Header<'_>]) -> Headers {
    let mut headers = Headers::new();
    for field in fields {
        let value = raw
            .get(field.offset_start..field.offset_end)
            .unwrap_or_default();
        headers.push_raw(field.name.as_str(), trim_value(value));
    }
    headers
}

fn trim_value(value: &[u8]) -> &[u8] {
    let start = value
        .iter()
        .position(|&b| !matches!(b, b' ' | b'\t'))
        .unwrap_or(value.len());
    let end = value
        .iter()
        .rposition(|&b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &value[start..end.max(start)]
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub(crate) fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Remove one pair of surrounding double quotes, if present.
pub fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Collapse every run of whitespace (including folds) into one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Filename declared by a `Content-Disposition` value.
///
/// The whole value is split on `;` and every segment is tried in order:
/// `filename=` is taken as is, `filename*=` loses a leading `UTF-8''`.
/// Either way the value is run through encoded-word decoding, one pair of
/// double quotes is stripped and `/` becomes `_`. No RFC 2231
/// continuations, charsets or percent-decoding are handled.
pub fn disposition_filename(disposition: &str) -> Option<String> {
    let normalized = collapse_whitespace(disposition);

    for segment in normalized.split(';') {
        let Some((key, value)) = segment.trim().split_once('=') else {
            continue;
        };
        let value = match key {
            "filename" => value,
            "filename*" => value.strip_prefix("UTF-8''").unwrap_or(value),
            _ => continue,
        };
        let decoded = decode_encoded_words(value);
        return Some(strip_quotes(&decoded).replace('/', "_"));
    }

    None
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// `=?UTF-8?Q?Vorlesung_=C3=BCbermorgen?=` becomes `Vorlesung übermorgen`.
/// Whitespace between two adjacent encoded-words is dropped; malformed
/// words are left as they are.
pub fn decode_encoded_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut after_word = false;

    while let Some(open) = rest.find("=?") {
        let (text, candidate) = rest.split_at(open);
        match encoded_word(candidate) {
            Some((decoded, len)) => {
                if !(after_word && text.trim().is_empty()) {
                    out.push_str(text);
                }
                out.push_str(&decoded);
                rest = &candidate[len..];
                after_word = true;
            }
            None => {
                out.push_str(text);
                out.push_str("=?");
                rest = &candidate[2..];
                after_word = false;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Decode one `=?charset?enc?text?=` at the start of `s`, returning the
/// text and the number of bytes it spans.
fn encoded_word(s: &str) -> Option<(String, usize)> {
    let inner = s.strip_prefix("=?")?;
    let (charset, tail) = inner.split_once('?')?;
    let (encoding, tail) = tail.split_once('?')?;
    let text_len = tail.find("?=")?;
    let text = &tail[..text_len];
    if charset.is_empty()
        || charset.contains(char::is_whitespace)
        || text.contains(char::is_whitespace)
    {
        return None;
    }
    let len = 2 + charset.len() + 1 + encoding.len() + 1 + text_len + 2;

    let bytes = if encoding.eq_ignore_ascii_case("b") {
        LENIENT_BASE64.decode(text).ok()?
    } else if encoding.eq_ignore_ascii_case("q") {
        decode_q_encoding(text)
    } else {
        return None;
    };

    Some((decode_charset(charset, &bytes), len))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => match hex_pair(bytes[i + 1], bytes[i + 2]) {
                Some(byte) => {
                    result.push(byte);
                    i += 3;
                }
                None => {
                    result.push(b'=');
                    i += 1;
                }
            },
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Combine two ASCII hex digits into a byte.
fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    u8::try_from(hi * 16 + lo).ok()
}

/// Decode bytes in a named charset; an RFC 2231 `*lang` suffix is ignored.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let label = charset.split('*').next().unwrap_or(charset);
    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding.decode(bytes).0.into_owned(),
        None => {
            warn!(charset, "Unknown charset, decoding as UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(raw: &[u8]) -> Headers {
        let message = mail_parser::MessageParser::default().parse(raw).unwrap();
        headers_from(raw, &message.parts[0].headers)
    }

    #[test]
    fn test_headers_from_keeps_folds() {
        let headers = parsed(b"Subject: a long\r\n  subject line\r\nFrom: a@b.c\r\n\r\nbody\r\n");
        assert_eq!(headers.get("subject"), Some("a long\r\n  subject line"));
        assert_eq!(headers.get("From"), Some("a@b.c"));
    }

    #[test]
    fn test_headers_from_empty_value() {
        let headers = parsed(b"X-List-Administrivia:\nSubject: x\n\nbody\n");
        assert_eq!(headers.get("X-List-Administrivia"), Some(""));
        assert_eq!(headers.get("subject"), Some("x"));
    }

    #[test]
    fn test_headers_from_copies_eight_bit_bytes() {
        let headers = parsed(b"Subject: caf\xe9\nFrom: =?UTF-8?Q?J=C3=BCrgen?= <j@x.org>\n\nbody\n");
        assert_eq!(headers.get("Subject"), Some("café"));
        assert_eq!(headers.get_raw("Subject"), Some(&b"caf\xe9"[..]));
        assert_eq!(headers.get("from"), Some("=?UTF-8?Q?J=C3=BCrgen?= <j@x.org>"));
    }

    #[test]
    fn test_disposition_filename_replaces_slash() {
        assert_eq!(
            disposition_filename("attachment; filename=\"a/b.txt\"").as_deref(),
            Some("a_b.txt")
        );
    }

    #[test]
    fn test_disposition_filename_extended_form() {
        assert_eq!(
            disposition_filename("attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf").as_deref(),
            Some("r%C3%A9sum%C3%A9.pdf")
        );
    }

    #[test]
    fn test_disposition_filename_extended_without_prefix() {
        assert_eq!(
            disposition_filename("attachment; filename*=iso-8859-1''x.txt").as_deref(),
            Some("iso-8859-1''x.txt")
        );
    }

    #[test]
    fn test_disposition_filename_encoded_word() {
        assert_eq!(
            disposition_filename("attachment;\n filename=\"=?UTF-8?B?w5xidW5nLnBkZg==?=\"").as_deref(),
            Some("Übung.pdf")
        );
    }

    #[test]
    fn test_disposition_filename_first_match_wins() {
        assert_eq!(
            disposition_filename("attachment; filename*=UTF-8''one.txt; filename=two.txt").as_deref(),
            Some("one.txt")
        );
    }

    #[test]
    fn test_disposition_filename_absent() {
        assert_eq!(disposition_filename("attachment; size=1234"), None);
        assert_eq!(disposition_filename("attachment"), None);
    }

    #[test]
    fn test_disposition_filename_spaced_key_is_not_matched() {
        assert_eq!(disposition_filename("attachment; filename = x.txt"), None);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a \n\t b  c "), "a b c");
    }

    #[test]
    fn test_decode_encoded_words_base64_utf8() {
        assert_eq!(
            decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="),
            "Hola mundo"
        );
    }

    #[test]
    fn test_decode_encoded_words_adjacent() {
        assert_eq!(
            decode_encoded_words("=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="),
            "Hola mundo"
        );
    }

    #[test]
    fn test_decode_encoded_words_q_iso8859() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_encoded_words_plain_passthrough() {
        assert_eq!(decode_encoded_words("Normal subject"), "Normal subject");
        assert_eq!(decode_encoded_words("a =? b"), "a =? b");
    }
}
