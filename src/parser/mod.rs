//! Raw message parsing: header blocks and the MIME tree.

pub mod header;
pub mod mime;
