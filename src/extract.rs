//! Attachment and text extraction from a held message.
//!
//! Every part of the message is visited in document order, including
//! parts of embedded messages. A part is an attachment when its
//! `Content-Disposition` starts with `attachment`, and textual when its
//! media type is one of [`TEXT_CONTENT_TYPES`].

use base64::Engine;
use tracing::{debug, warn};

use crate::error::{DetachError, Result};
use crate::model::attachment::Attachment;
use crate::model::part::{Body, MimePart};
use crate::parser::header::{self, disposition_filename};

/// Media types that are carried over into the forwarded message.
pub const TEXT_CONTENT_TYPES: [&str; 3] = ["text/html", "text/plain", "application/html"];

/// What was found in a held message.
#[derive(Debug)]
pub struct Extraction<'a> {
    /// Decoded attachments in document order.
    pub attachments: Vec<Attachment>,
    /// Textual parts in document order, empty ones included.
    pub textual: Vec<&'a MimePart>,
}

/// Walk `message` and collect its attachments and textual parts.
///
/// Fails with [`DetachError::UnsupportedEncoding`] as soon as one
/// attachment cannot be decoded; nothing is returned in that case.
pub fn extract(message: &MimePart) -> Result<Extraction<'_>> {
    let mut attachments = Vec::new();
    let mut textual = Vec::new();

    for part in message.walk() {
        if is_attachment(part) {
            let Some(payload) = payload(part) else {
                warn!(
                    content_type = part.header("content-type").unwrap_or_default(),
                    "Skipping attachment that is a multipart container"
                );
                continue;
            };
            let data = decode_transfer(part.header("content-transfer-encoding"), payload)?;
            let filename = part
                .header("content-disposition")
                .and_then(disposition_filename);
            debug!(
                filename = ?filename,
                content_type = part.header("content-type").unwrap_or_default(),
                size = data.len(),
                "Found attachment"
            );
            attachments.push(Attachment { filename, data });
        }
        if is_textual(part) {
            textual.push(part);
        }
    }

    Ok(Extraction {
        attachments,
        textual,
    })
}

/// `Content-Disposition` present and starting with `attachment` (any case).
pub fn is_attachment(part: &MimePart) -> bool {
    part.header("content-disposition").is_some_and(|d| {
        d.get(..10)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("attachment"))
    })
}

/// `Content-Type` present and naming one of [`TEXT_CONTENT_TYPES`].
///
/// Parts without a `Content-Type` header are never textual, even though
/// MIME defaults them to `text/plain`.
pub fn is_textual(part: &MimePart) -> bool {
    part.header("content-type").is_some_and(|ct| {
        let essence = ct.split(';').next().unwrap_or_default().trim();
        TEXT_CONTENT_TYPES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(essence))
    })
}

/// Whether a textual part has nothing but whitespace in its body.
pub fn is_blank(part: &MimePart) -> bool {
    payload(part).is_none_or(|body| body.iter().all(u8::is_ascii_whitespace))
}

/// Wire bytes of a part; containers have none.
fn payload(part: &MimePart) -> Option<&[u8]> {
    match &part.body {
        Body::Leaf(bytes) => Some(bytes),
        Body::Message { raw, .. } => Some(raw),
        Body::Multipart(_) => None,
    }
}

/// Reverse the declared `Content-Transfer-Encoding`.
///
/// Without the header the payload is returned unchanged. Only `base64`
/// and `quoted-printable`, spelled exactly so after trimming, are
/// decoded; every other value, `BASE64` and the identity encodings
/// included, is rejected.
pub fn decode_transfer(encoding: Option<&str>, payload: &[u8]) -> Result<Vec<u8>> {
    let Some(encoding) = encoding else {
        return Ok(payload.to_vec());
    };

    match encoding.trim() {
        "base64" => {
            let cleaned: Vec<u8> = payload
                .iter()
                .copied()
                .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
                .collect();
            Ok(header::LENIENT_BASE64.decode(cleaned)?)
        }
        "quoted-printable" => Ok(quoted_printable::decode(
            payload,
            quoted_printable::ParseMode::Robust,
        )?),
        other => Err(DetachError::UnsupportedEncoding(other.to_string())),
    }
}
