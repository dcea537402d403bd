//! Picking held-message notices out of the mail store.
//!
//! A notice is a message carrying a non-empty `X-List-Administrivia`
//! header. Only multipart notices are looked at; the first immediate
//! child of type `message/rfc822` is the original submission.

use lazy_regex::regex_is_match;
use tracing::debug;

use crate::error::Result;
use crate::model::part::{Body, Headers, MimePart};
use crate::parser::header::decode_encoded_words;
use crate::parser::mime::parse_message;
use crate::store::maildir::MailFile;

/// Header set by the list software on administrative notices.
pub const ADMINISTRIVIA_HEADER: &str = "X-List-Administrivia";

/// A notice together with the original message it holds.
#[derive(Debug)]
pub struct HeldMessage {
    /// File the notice was read from.
    pub file: MailFile,
    /// Headers of the notice itself.
    pub notice: Headers,
    /// The embedded original message.
    pub original: MimePart,
    /// The embedded original message as it appeared in the notice.
    pub original_raw: Vec<u8>,
}

impl HeldMessage {
    /// Decoded Subject of the notice.
    pub fn notice_subject(&self) -> String {
        decoded_header(&self.notice, "subject")
    }

    /// Decoded Subject of the original message.
    pub fn original_subject(&self) -> String {
        decoded_header(&self.original.headers, "subject")
    }

    /// Whether the original is a confirmation request rather than a post.
    pub fn is_confirmation(&self) -> bool {
        is_confirmation_subject(&self.original_subject())
    }
}

fn decoded_header(headers: &Headers, name: &str) -> String {
    headers
        .get(name)
        .map(decode_encoded_words)
        .unwrap_or_default()
}

/// Whether `subject` (already decoded) is a list-software confirmation
/// request.
pub fn is_confirmation_subject(subject: &str) -> bool {
    regex_is_match!(r"^confirm\s\w{40}", subject)
}

/// Whether the message is an administrative notice.
pub fn is_administrivia(message: &MimePart) -> bool {
    message.headers.has_value(ADMINISTRIVIA_HEADER)
}

/// Take the first `message/rfc822` child out of a multipart notice.
pub fn into_held(file: MailFile, message: MimePart) -> Option<HeldMessage> {
    let MimePart { headers, body } = message;
    let Body::Multipart(parts) = body else {
        return None;
    };

    parts
        .into_iter()
        .filter(|part| part.header("content-type").map(str::trim) == Some("message/rfc822"))
        .find_map(|part| match part.body {
            Body::Message { raw, message } => Some((raw, *message)),
            _ => None,
        })
        .map(|(original_raw, original)| HeldMessage {
            file,
            notice: headers,
            original,
            original_raw,
        })
}

/// Read, parse and filter one file.
fn load(file: MailFile) -> Result<Option<HeldMessage>> {
    let raw = file.read()?;
    let message = parse_message(&raw)?;

    if !is_administrivia(&message) {
        debug!(path = %file.path.display(), "Not an administrivia notice");
        return Ok(None);
    }

    let path = file.path.clone();
    let held = into_held(file, message);
    if held.is_none() {
        debug!(path = %path.display(), "Notice holds no message/rfc822 part");
    }
    Ok(held)
}

/// Lazily turn message files into held messages.
///
/// Files that are not notices, or notices without an embedded message,
/// are skipped. Read and parse failures are yielded as errors.
pub fn held_messages(
    files: impl IntoIterator<Item = MailFile>,
) -> impl Iterator<Item = Result<HeldMessage>> {
    files.into_iter().map(load).filter_map(Result::transpose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file() -> MailFile {
        MailFile::from_path(PathBuf::from("1.,")).unwrap()
    }

    const NOTICE: &[u8] = b"Subject: Post by non-member requires approval\n\
X-List-Administrivia: yes\n\
Content-Type: multipart/mixed; boundary=N\n\
\n\
--N\n\
Content-Type: text/plain\n\
\n\
As list administrator, your authorization is requested.\n\
--N\n\
Content-Type: message/rfc822\n\
\n\
Subject: =?UTF-8?Q?Vorlesung_=C3=BCbermorgen?=\n\
Message-ID: <abc@example.org>\n\
\n\
body\n\
--N\n\
Content-Type: message/rfc822\n\
\n\
Subject: second\n\
\n\
other\n\
--N--\n";

    #[test]
    fn test_first_nested_message_wins() {
        let held = into_held(file(), parse_message(NOTICE).unwrap()).unwrap();
        assert_eq!(held.original.header("message-id"), Some("<abc@example.org>"));
        assert_eq!(held.original_subject(), "Vorlesung übermorgen");
        assert_eq!(held.notice_subject(), "Post by non-member requires approval");
        assert!(held.original_raw.starts_with(b"Subject: =?UTF-8?Q?"));
        assert!(!held.is_confirmation());
    }

    #[test]
    fn test_administrivia_marker() {
        assert!(is_administrivia(&parse_message(NOTICE).unwrap()));
        let empty = parse_message(b"X-List-Administrivia:\nSubject: x\n\nbody\n").unwrap();
        assert!(!is_administrivia(&empty));
        let plain = parse_message(b"Subject: x\n\nbody\n").unwrap();
        assert!(!is_administrivia(&plain));
    }

    #[test]
    fn test_notice_without_nested_message_yields_nothing() {
        let raw = b"X-List-Administrivia: yes\n\
Content-Type: multipart/mixed; boundary=N\n\
\n\
--N\n\
Content-Type: text/plain\n\
\n\
nothing held\n\
--N--\n";
        assert!(into_held(file(), parse_message(raw).unwrap()).is_none());
    }

    #[test]
    fn test_single_part_notice_yields_nothing() {
        let raw = b"X-List-Administrivia: yes\nContent-Type: message/rfc822\n\nSubject: x\n\nbody\n";
        assert!(into_held(file(), parse_message(raw).unwrap()).is_none());
    }

    #[test]
    fn test_content_type_with_parameters_is_not_nested() {
        let raw = b"X-List-Administrivia: yes\n\
Content-Type: multipart/mixed; boundary=N\n\
\n\
--N\n\
Content-Type: message/rfc822; name=x\n\
\n\
Subject: x\n\
\n\
body\n\
--N--\n";
        assert!(into_held(file(), parse_message(raw).unwrap()).is_none());
    }

    #[test]
    fn test_confirmation_subject() {
        let token = "0123456789abcdef0123456789abcdef01234567";
        assert!(is_confirmation_subject(&format!("confirm {token}")));
        assert!(!is_confirmation_subject(&format!("Re: confirm {token}")));
        assert!(!is_confirmation_subject("confirm 1234"));
    }

    #[test]
    fn test_held_messages_skips_and_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let notice = tmp.path().join("1.,");
        let plain = tmp.path().join("2.,");
        let broken = tmp.path().join("3.,");
        std::fs::write(&notice, NOTICE).unwrap();
        std::fs::write(&plain, b"Subject: hi\n\nbody\n").unwrap();
        std::fs::write(
            &broken,
            b"X-List-Administrivia: yes\nContent-Type: multipart/mixed\n\nx\n",
        )
        .unwrap();

        let files = [notice, plain, broken]
            .into_iter()
            .filter_map(MailFile::from_path);
        let results: Vec<_> = held_messages(files).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
