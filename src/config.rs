//! Options
//!
//! Plain structs with defaults; hosts deserialize them from JSON or build them
//! from NIF maps. Missing fields fall back to the defaults.

use serde::{Deserialize, Serialize};

use crate::iter::BlockKind;
use crate::reader::buffered::{DEFAULT_BLOCK_CAPACITY, DEFAULT_BLOCK_SIZE};

/// Cache sizing for a [`LazyCharSequence`](crate::reader::LazyCharSequence)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceOptions {
    /// Bytes per cached source block
    pub block_size: usize,
    /// Number of blocks kept
    pub block_capacity: usize,
    /// Number of (char, byte) anchors kept
    pub anchor_capacity: usize,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        SequenceOptions {
            block_size: DEFAULT_BLOCK_SIZE,
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            anchor_capacity: 64,
        }
    }
}

/// Snippet generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightOptions {
    /// Inserted before every highlighted span in passage text
    pub pre_tag: String,
    /// Inserted after every highlighted span in passage text
    pub post_tag: String,
    /// Report highlight boxes in page coordinates instead of relative to the
    /// passage box
    pub absolute_highlights: bool,
    /// Unit the context window is counted in
    pub context_block: BlockKind,
    /// Enclosing unit the context window never crosses
    pub limit_block: Option<BlockKind>,
    /// Units of context on each side of a match
    pub context_size: usize,
    /// Maximum number of passages per document
    pub max_passages: usize,
    pub sequence: SequenceOptions,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        HighlightOptions {
            pre_tag: "<em>".to_string(),
            post_tag: "</em>".to_string(),
            absolute_highlights: false,
            context_block: BlockKind::Line,
            limit_block: Some(BlockKind::Block),
            context_size: 2,
            max_passages: 100,
            sequence: SequenceOptions::default(),
        }
    }
}
