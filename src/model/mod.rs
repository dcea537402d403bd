//! Core data model: MIME part trees, attachments, addresses and the rebuilt outbound message.

pub mod address;
pub mod attachment;
pub mod outbound;
pub mod part;
