//! Error types
//!
//! A single error enum covers codec violations, source I/O, contract violations
//! and offset drift between plain text and markup.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Unpaired surrogate at index {index}")]
    MalformedInput { index: usize },

    #[error("Illegal UTF-8 lead byte 0x{byte:02X} at offset {offset}")]
    InvalidLeadByte { offset: usize, byte: u8 },

    #[error("Truncated UTF-8 sequence at offset {offset}")]
    TruncatedSequence { offset: usize },

    #[error("Failed to read bytes [{start}, {end}) from {source_id}: {reason}")]
    SourceRead {
        source_id: String,
        start: usize,
        end: usize,
        reason: String,
    },

    #[error("Index {index} out of range [{begin}, {end})")]
    IndexOutOfRange {
        index: usize,
        begin: usize,
        end: usize,
    },

    #[error("Cannot resolve span [{start}, {end}) in markup: {reason}")]
    OffsetResolution {
        start: usize,
        end: usize,
        reason: String,
    },

    #[error("Invalid offset map: {reason}")]
    InvalidOffsetMap { reason: String },

    #[error("Invalid source pointer '{pointer}': {reason}")]
    InvalidPointer { pointer: String, reason: String },

    #[error("Unknown OCR format: {0}")]
    UnknownFormat(String),
}

impl Error {
    pub(crate) fn source_read(
        source_id: &str,
        start: usize,
        end: usize,
        reason: impl ToString,
    ) -> Self {
        Error::SourceRead {
            source_id: source_id.to_string(),
            start,
            end,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unresolved(start: usize, end: usize, reason: impl Into<String>) -> Self {
        Error::OffsetResolution {
            start,
            end,
            reason: reason.into(),
        }
    }

    /// Offset drift or malformed markup affecting a single passage
    pub fn is_offset_resolution(&self) -> bool {
        matches!(self, Error::OffsetResolution { .. })
    }
}
