//! Assembling the outbound message from a held one.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::export::destination::Destination;
use crate::extract::is_blank;
use crate::model::outbound::OutboundMessage;
use crate::model::part::{Headers, MimePart};

/// Value of the `User-Agent` header on everything we send.
pub const USER_AGENT: &str = concat!("detach/", env!("CARGO_PKG_VERSION"));

/// Headers copied from the original, in output order.
pub const TRANSFERRED_HEADERS: [&str; 3] = ["From", "Date", "Subject"];

/// Where a rebuilt message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// Pass the post on to its intended readers.
    Forward { recipient: &'a str },
    /// Answer a confirmation request on the list's request address,
    /// sending as the operator.
    Reject {
        request_address: &'a str,
        identity: &'a str,
    },
}

impl Route<'_> {
    fn to(&self) -> &str {
        match self {
            Self::Forward { recipient } => *recipient,
            Self::Reject {
                request_address, ..
            } => *request_address,
        }
    }

    fn sender(&self) -> Option<&str> {
        match self {
            Self::Forward { .. } => None,
            Self::Reject { identity, .. } => Some(*identity),
        }
    }
}

/// Build the outbound message for `original`.
///
/// Whitespace-only textual parts are dropped; the rest keep their
/// headers and bodies and become the alternatives, in document order.
pub fn build(
    original: &MimePart,
    textual: &[&MimePart],
    note: Option<String>,
    route: Route<'_>,
    now: DateTime<Utc>,
) -> OutboundMessage {
    let alternatives: Vec<MimePart> = textual
        .iter()
        .filter(|part| !is_blank(part))
        .map(|part| (*part).clone())
        .collect();
    let dropped = textual.len() - alternatives.len();
    if dropped > 0 {
        debug!(dropped, "Dropped empty textual parts");
    }

    let mut headers = Headers::new();
    for name in TRANSFERRED_HEADERS {
        let value = match (name, route.sender()) {
            ("From", Some(sender)) => Some(sender.as_bytes()),
            _ => original.headers.get_raw(name),
        };
        match value {
            Some(value) => headers.push_raw(name, value),
            None => warn!(header = name, "Original message lacks header"),
        }
    }
    headers.push("To", route.to());
    headers.push("User-Agent", USER_AGENT);
    headers.push("Message-ID", message_id(original.header("message-id"), now));

    OutboundMessage {
        headers,
        note,
        alternatives,
    }
}

/// `<detached_at_{timestamp}_from_{original id}>` with microsecond
/// timestamp; one pair of angle brackets is taken off the original.
pub fn message_id(original: Option<&str>, now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%d%H%M%S%6f");
    match original.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            let id = id.strip_prefix('<').unwrap_or(id);
            let id = id.strip_suffix('>').unwrap_or(id);
            format!("<detached_at_{stamp}_from_{id}>")
        }
        None => format!("<detached_at_{stamp}>"),
    }
}

/// Note telling the recipients where the attachments are.
pub fn note_text(destination: &Destination) -> String {
    let mut text = format!(
        "NOTE: This is detach, sorry to interrupt you. I have taken\n\
         the attachments and put them into\n\
         \n    {}\n\n",
        destination.dir.display()
    );
    if let Some(url) = &destination.url {
        text.push_str(&format!("which can be accessed via\n\n    {url}\n\n"));
    }
    text.push_str("for your convenience.\n");
    text
}
