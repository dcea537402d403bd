//! One triage run over the mail store.
//!
//! Messages are handled one at a time: the operator decides, attachments
//! are saved, and the rebuilt message is sent before the next file is
//! even parsed.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::classify::{held_messages, HeldMessage};
use crate::config::Settings;
use crate::deliver::Outbox;
use crate::error::Result;
use crate::export::attachment::save_attachments;
use crate::extract::extract;
use crate::learn::learn;
use crate::model::attachment::Attachment;
use crate::model::outbound::OutboundMessage;
use crate::prompt::{Choice, Operator};
use crate::rebuild::{build, note_text, Route};
use crate::store::maildir::candidates;

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Held messages shown to the operator.
    pub offered: usize,
    pub forwarded: usize,
    /// Confirmation requests answered with a rejection.
    pub rejected: usize,
    /// Messages fed to the spam learner instead of being forwarded.
    pub learned_spam: usize,
    pub declined: usize,
    /// Messages abandoned because an attachment could not be decoded.
    pub failed: usize,
}

enum Outcome {
    Forwarded,
    Rejected,
    LearnedSpam,
    Declined,
}

impl RunSummary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Forwarded => self.forwarded += 1,
            Outcome::Rejected => self.rejected += 1,
            Outcome::LearnedSpam => self.learned_spam += 1,
            Outcome::Declined => self.declined += 1,
        }
    }
}

/// Go through the mail store once.
///
/// A message whose attachments cannot be decoded is skipped; any other
/// error ends the run.
pub fn run(
    settings: &Settings,
    operator: &mut dyn Operator,
    outbox: &mut dyn Outbox,
) -> Result<RunSummary> {
    let files = candidates(&settings.maildir, settings.exclude_seen)?;
    let mut summary = RunSummary::default();

    for held in held_messages(files) {
        let held = held?;
        summary.offered += 1;
        debug!(path = %held.file.path.display(), "Held message");

        match process(settings, operator, outbox, &held) {
            Ok(outcome) => summary.record(outcome),
            Err(e) if e.is_message_local() => {
                error!(path = %held.file.path.display(), error = %e, "Abandoning message");
                operator.notify(&format!("skipping message: {e}"));
                summary.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        offered = summary.offered,
        forwarded = summary.forwarded,
        rejected = summary.rejected,
        learned_spam = summary.learned_spam,
        declined = summary.declined,
        failed = summary.failed,
        "Run finished"
    );
    Ok(summary)
}

fn process(
    settings: &Settings,
    operator: &mut dyn Operator,
    outbox: &mut dyn Outbox,
    held: &HeldMessage,
) -> Result<Outcome> {
    if held.is_confirmation() {
        operator.notify("");
        let choice = operator.choose(
            "Reject mail for mailman? (Y = yes, n = no)",
            &[Choice::Yes, Choice::No],
        )?;
        if choice != Choice::Yes {
            info!(subject = %held.original_subject(), "Confirmation left alone");
            return Ok(Outcome::Declined);
        }
        let route = Route::Reject {
            request_address: &settings.request_address,
            identity: &settings.user,
        };
        let message = prepare(settings, operator, held, route)?;
        outbox.send(&message)?;
        info!(subject = %held.original_subject(), "Confirmation rejected");
        return Ok(Outcome::Rejected);
    }

    operator.notify(&format!(
        "found matching mail:\n  Subject: {}\n  nested Subject: {}",
        held.notice_subject(),
        held.original_subject()
    ));

    let (prompt, options): (&str, &[Choice]) = if settings.learn_spam.is_some() {
        (
            "Process mail? (Y = yes, n = no, s = learn as spam)",
            &[Choice::Yes, Choice::No, Choice::Spam],
        )
    } else {
        ("Process mail? (Y = yes, n = no)", &[Choice::Yes, Choice::No])
    };

    match operator.choose(prompt, options)? {
        Choice::Yes => {
            let route = Route::Forward {
                recipient: &settings.recipient,
            };
            let message = prepare(settings, operator, held, route)?;
            outbox.send(&message)?;
            info!(subject = %held.original_subject(), "Message forwarded");
            if let Some(argv) = &settings.learn_ham {
                teach(operator, argv, &held.original_raw);
            }
            Ok(Outcome::Forwarded)
        }
        Choice::Spam => {
            if let Some(argv) = &settings.learn_spam {
                teach(operator, argv, &held.original_raw);
            }
            info!(subject = %held.original_subject(), "Message learned as spam");
            Ok(Outcome::LearnedSpam)
        }
        Choice::No => {
            info!(subject = %held.original_subject(), "Message left alone");
            Ok(Outcome::Declined)
        }
    }
}

/// Extract, save and rebuild one message.
///
/// Decoding happens before anything touches the disk, so a message that
/// fails here leaves no directory behind.
fn prepare(
    settings: &Settings,
    operator: &mut dyn Operator,
    held: &HeldMessage,
    route: Route<'_>,
) -> Result<OutboundMessage> {
    let now = Utc::now();
    let found = extract(&held.original)?;

    let note = if found.attachments.is_empty() {
        None
    } else {
        operator.notify(&listing(&found.attachments));
        let destination = settings.destination.create(now, operator)?;
        save_attachments(&destination.dir, &found.attachments)?;
        Some(note_text(&destination))
    };

    Ok(build(&held.original, &found.textual, note, route, now))
}

fn listing(attachments: &[Attachment]) -> String {
    let mut text = String::from("attachments have been found:");
    for (i, attachment) in attachments.iter().enumerate() {
        text.push_str(&format!("\n  [{}]: {}", i + 1, attachment.file_name(i + 1)));
    }
    text
}

/// Run a learn command; failures are reported, never fatal.
fn teach(operator: &mut dyn Operator, argv: &[String], message: &[u8]) {
    match learn(argv, message) {
        Ok(true) => {}
        Ok(false) => operator.notify("spam learn command failed."),
        Err(e) => {
            warn!(error = %e, "Learn command could not run");
            operator.notify(&format!("spam learn command failed: {e}"));
        }
    }
}
