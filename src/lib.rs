//! `detach` — take the attachments out of held mailing-list posts.
//!
//! The library reads administrivia notices from a maildir, pulls the
//! original post out of each one, saves its attachments to a fresh
//! directory and rebuilds a slim message that is sent on over SMTP.

pub mod classify;
pub mod config;
pub mod deliver;
pub mod error;
pub mod export;
pub mod extract;
pub mod learn;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod rebuild;
pub mod store;
