//! Reader Module
//!
//! Random access to OCR documents that are never loaded whole:
//! - source: byte-addressable sources (memory, file sections, concatenations)
//! - pointer: textual pointers resolving to a source
//! - buffered: LRU block cache over a source
//! - sequence: UTF-16 indexed lazy view over the decoded text

pub mod buffered;
pub mod pointer;
pub mod sequence;
pub mod source;

pub use buffered::BlockReader;
pub use pointer::SourcePointer;
pub use sequence::LazyCharSequence;
pub use source::{ByteSource, FileSource, MemorySource, MultiSource};
