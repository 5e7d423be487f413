//! Block-Buffered Source Reader
//!
//! Reads a [`ByteSource`] in fixed-size, aligned blocks and keeps the most
//! recently used blocks around, so forward and backward scans over a large
//! file touch the disk once per block.

use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;

use lru::LruCache;
use tracing::trace;

use super::source::ByteSource;
use crate::error::{Error, Result};

/// Block size for reading chunks
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Number of blocks kept by default
pub const DEFAULT_BLOCK_CAPACITY: usize = 64;

/// Block cache over a byte source
pub struct BlockReader {
    source: Box<dyn ByteSource>,
    block_size: usize,
    blocks: RefCell<LruCache<usize, Arc<[u8]>>>,
}

impl BlockReader {
    pub fn with_capacity(source: Box<dyn ByteSource>, block_size: usize, capacity: usize) -> Self {
        BlockReader {
            source,
            block_size: block_size.max(16),
            blocks: RefCell::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn source_id(&self) -> &str {
        self.source.id()
    }

    /// Get block `index`, reading it from the source on a cache miss
    pub fn block(&self, index: usize) -> Result<Arc<[u8]>> {
        if let Some(block) = self.blocks.borrow_mut().get(&index) {
            return Ok(Arc::clone(block));
        }

        let start = index * self.block_size;
        if start >= self.len() {
            return Err(Error::source_read(
                self.source.id(),
                start,
                start + self.block_size,
                "block past end of source",
            ));
        }
        let end = (start + self.block_size).min(self.len());
        trace!(source = self.source.id(), block = index, "reading block");

        let mut buf = vec![0u8; end - start];
        self.source.read_at(start, &mut buf)?;
        let block: Arc<[u8]> = buf.into();
        self.blocks.borrow_mut().put(index, Arc::clone(&block));
        Ok(block)
    }

    /// Read a byte range, assembled from cached blocks
    pub fn read(&self, range: Range<usize>) -> Result<Vec<u8>> {
        if range.start > range.end || range.end > self.len() {
            return Err(Error::source_read(
                self.source.id(),
                range.start,
                range.end,
                format!("range exceeds source length {}", self.len()),
            ));
        }

        let mut out = Vec::with_capacity(range.len());
        let mut pos = range.start;
        while pos < range.end {
            let index = pos / self.block_size;
            let block = self.block(index)?;
            let block_start = index * self.block_size;
            let from = pos - block_start;
            let to = (range.end - block_start).min(block.len());
            out.extend_from_slice(&block[from..to]);
            pos = block_start + to;
        }
        Ok(out)
    }

    /// Byte at `pos`, or `None` at or past the end
    pub fn byte_at(&self, pos: usize) -> Result<Option<u8>> {
        if pos >= self.len() {
            return Ok(None);
        }
        let block = self.block(pos / self.block_size)?;
        Ok(Some(block[pos % self.block_size]))
    }
}
