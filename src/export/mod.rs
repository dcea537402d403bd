//! Persisting attachments: directory naming and file output.

pub mod attachment;
pub mod destination;
