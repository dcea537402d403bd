//! Attachments taken out of a held message.

/// A decoded attachment, ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename derived from `Content-Disposition`, if any.
    pub filename: Option<String>,

    /// Payload with the transfer encoding reversed.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Name to save the attachment under.
    ///
    /// `position` is the 1-based position in the attachment listing and is
    /// used when the message does not provide a usable name.
    pub fn file_name(&self, position: usize) -> String {
        match self.filename.as_deref() {
            Some(name) if !matches!(name.trim(), "" | "." | "..") => name.to_string(),
            _ => format!("attachment-{position}"),
        }
    }
}
