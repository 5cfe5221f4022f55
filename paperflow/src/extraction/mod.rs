//! Structured payload extraction.
//!
//! Language-model responses wrap the YAML payload in prose, code fences and
//! stray backticks. [`PayloadExtractor`] finds the marker key (`ARTICLE:` by
//! default), cuts the payload out according to a [`SliceBoundary`], strips the
//! noise and validates the result into a [`StructuredRecord`].

mod payload;
mod record;

pub use payload::{strip_noise, PayloadExtractor, SliceBoundary};
pub use record::{KeyOrder, StructuredRecord};
