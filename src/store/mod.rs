//! Mail store access.

pub mod maildir;
