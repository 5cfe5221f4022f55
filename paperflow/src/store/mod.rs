//! Persistence of records and rendered documents.
//!
//! Both stores key files by the sanitized document identifier, write
//! atomically, serialize writers per key and fall back to a secondary
//! directory when the primary one rejects a write.

mod documents;
mod records;
mod sanitize;
mod slots;

pub use crate::extraction::KeyOrder;
pub use documents::DocumentStore;
pub use records::RecordStore;
pub use sanitize::{document_key, sanitize_identifier};
