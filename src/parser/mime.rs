//! MIME structure: the part tree mail-parser finds, rebuilt with every
//! header value and body taken verbatim from the raw message.
//!
//! Transfer encodings are only reversed when an attachment is extracted.

use mail_parser::{Encoding, Message, MessageParser, MessagePartId, PartType};
use tracing::debug;

use crate::error::{DetachError, Result};
use crate::model::part::{Body, MimePart};
use crate::parser::header;

/// Maximum depth for recursive multipart parsing (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 10;

/// Parse a complete raw message (headers + body) into a part tree.
pub fn parse_message(raw: &[u8]) -> Result<MimePart> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| DetachError::Parse("no header fields found".to_string()))?;
    convert(&message, 0, 0)
}

/// Rebuild part `id` of `message` and everything below it.
///
/// Offsets always point into the `raw_message` of the message that owns
/// the part; for an embedded message that was not transfer-encoded this
/// is the outermost buffer.
fn convert(message: &Message<'_>, id: MessagePartId, depth: usize) -> Result<MimePart> {
    if depth > MAX_DEPTH {
        return Err(DetachError::Parse(format!(
            "MIME structure nested deeper than {MAX_DEPTH} levels"
        )));
    }

    let raw: &[u8] = &message.raw_message;
    let part = message
        .parts
        .get(id)
        .ok_or_else(|| DetachError::Parse(format!("MIME part {id} is missing")))?;
    let headers = header::headers_from(raw, &part.headers);
    let payload = raw
        .get(part.offset_body..part.offset_end)
        .unwrap_or_default();

    let body = match &part.body {
        PartType::Multipart(children) => Body::Multipart(
            children
                .iter()
                .map(|&child| convert(message, child, depth + 1))
                .collect::<Result<Vec<_>>>()?,
        ),
        PartType::Message(nested) => {
            let wire = if part.encoding == Encoding::None {
                payload.to_vec()
            } else {
                nested.raw_message.to_vec()
            };
            Body::Message {
                raw: wire,
                message: Box::new(convert(nested, 0, depth + 1)?),
            }
        }
        _ => Body::Leaf(payload.to_vec()),
    };

    let part = MimePart { headers, body };
    let media_type = part.media_type();
    match &part.body {
        Body::Multipart(children) => {
            debug!(%media_type, parts = children.len(), depth, "Parsed container");
        }
        Body::Leaf(_) if media_type.starts_with("multipart/") => {
            return Err(DetachError::Parse(format!(
                "{media_type} part without a usable boundary"
            )));
        }
        _ => {}
    }
    Ok(part)
}
