//! Handing rebuilt messages to the mail relay.

use lettre::address::Envelope;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, SmtpTransport, Transport};
use tracing::{debug, info, warn};

use crate::config::SmtpSettings;
use crate::error::{DetachError, Result};
use crate::model::address::EmailAddress;
use crate::model::outbound::OutboundMessage;

/// Something that accepts finished messages.
pub trait Outbox {
    fn send(&mut self, message: &OutboundMessage) -> Result<()>;
}

/// Outbox backed by an SMTP relay, STARTTLS required.
///
/// The connection is checked when the outbox is opened and released when
/// it is dropped.
pub struct SmtpOutbox {
    settings: SmtpSettings,
    identity: String,
    transport: SmtpTransport,
}

impl SmtpOutbox {
    /// Connect to the relay; `identity` is the fallback envelope sender.
    pub fn open(settings: &SmtpSettings, identity: &str) -> Result<Self> {
        info!(host = %settings.host, port = settings.port, "Connecting to mail relay");
        let transport = connect(settings)?;
        Ok(Self {
            settings: settings.clone(),
            identity: identity.to_string(),
            transport,
        })
    }
}

impl Outbox for SmtpOutbox {
    fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        let envelope = envelope(message, &self.identity)?;
        let bytes = message.to_bytes();

        send_with_retry(
            &mut self.transport,
            || connect(&self.settings),
            |transport| {
                transport.send_raw(&envelope, &bytes)?;
                Ok(())
            },
        )?;

        info!(
            message_id = message.header("message-id").unwrap_or_default(),
            to = message.header("to").unwrap_or_default(),
            size = bytes.len(),
            "Message sent"
        );
        Ok(())
    }
}

impl Drop for SmtpOutbox {
    fn drop(&mut self) {
        debug!(host = %self.settings.host, "Closing mail relay connection");
    }
}

/// Send over `transport`; if that fails, replace it with a fresh one
/// from `reconnect` and send once more. The second failure is returned.
fn send_with_retry<T>(
    transport: &mut T,
    reconnect: impl FnOnce() -> Result<T>,
    send: impl Fn(&T) -> Result<()>,
) -> Result<()> {
    match send(transport) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "Send failed, reconnecting for one more attempt");
            *transport = reconnect()?;
            send(transport)
        }
    }
}

/// Build a transport and make sure the relay answers.
fn connect(settings: &SmtpSettings) -> Result<SmtpTransport> {
    let tls = TlsParameters::builder(settings.host.clone())
        .dangerous_accept_invalid_certs(settings.accept_invalid_certs)
        .build()?;
    let transport = SmtpTransport::builder_dangerous(settings.host.as_str())
        .port(settings.port)
        .tls(Tls::Required(tls))
        .timeout(Some(settings.timeout))
        .build();

    if !transport.test_connection()? {
        return Err(DetachError::Transport(format!(
            "{}:{} did not accept a connection",
            settings.host, settings.port
        )));
    }
    Ok(transport)
}

/// Envelope from the message's own From and To headers.
///
/// Without a usable From address the operator identity is the sender.
pub fn envelope(message: &OutboundMessage, identity: &str) -> Result<Envelope> {
    let sender = message
        .header("from")
        .and_then(EmailAddress::first_of_list)
        .map(|a| a.address)
        .unwrap_or_else(|| identity.to_string());
    let recipient = message
        .header("to")
        .and_then(EmailAddress::first_of_list)
        .ok_or_else(|| DetachError::Transport("message has no recipient".to_string()))?;

    let from = parse_address(&sender)?;
    let to = parse_address(&recipient.address)?;
    Envelope::new(Some(from), vec![to]).map_err(|e| DetachError::Transport(e.to_string()))
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .map_err(|e| DetachError::Transport(format!("invalid address '{raw}': {e}")))
}
