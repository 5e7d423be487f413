//! Lazy Char Sequence
//!
//! A UTF-16 indexed view over a UTF-8 [`ByteSource`] that never decodes more
//! than it has to. Every access resolves the closest known `(char, byte)`
//! anchor at or before the target, walks forward from there and records a new
//! anchor at the target. Anchors and source blocks live in small LRU caches
//! owned by the sequence.
//!
//! Anchors are only ever created by decoding forward from another anchor (or
//! the implicit `(0, 0)`), so for any two anchors the bytes between them decode
//! to exactly the difference of their char indices.
//!
//! The caches use interior mutability: a sequence can be moved to another
//! thread but not shared between threads.

use std::cell::{Cell, RefCell};
use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;

use lru::LruCache;
use memchr::memmem;
use tracing::debug;

use super::buffered::BlockReader;
use super::source::{ByteSource, MemorySource};
use crate::config::SequenceOptions;
use crate::core::utf8::{self, sequence_len, sequence_units};
use crate::error::{Error, Result};

/// Bytes examined per search window
const SCAN_WINDOW: usize = 16 * 1024;

pub struct LazyCharSequence {
    reader: BlockReader,
    /// char index -> byte offset
    anchors: RefCell<LruCache<usize, usize>>,
    char_len: Cell<Option<usize>>,
}

impl LazyCharSequence {
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        Self::with_options(source, &SequenceOptions::default())
    }

    pub fn with_options(source: Box<dyn ByteSource>, opts: &SequenceOptions) -> Self {
        LazyCharSequence {
            reader: BlockReader::with_capacity(source, opts.block_size, opts.block_capacity),
            anchors: RefCell::new(LruCache::new(
                NonZeroUsize::new(opts.anchor_capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            char_len: Cell::new(None),
        }
    }

    /// Sequence over in-memory bytes
    pub fn from_bytes(id: &str, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(Box::new(MemorySource::new(id, bytes)))
    }

    /// Supply the decoded length up front (e.g. stored at indexing time), so
    /// [`end_index`](Self::end_index) never has to scan the source
    pub fn with_char_len(self, char_len: usize) -> Self {
        self.char_len.set(Some(char_len));
        self
    }

    pub fn source_id(&self) -> &str {
        self.reader.source_id()
    }

    /// Encoded length of the source in bytes
    pub fn byte_len(&self) -> usize {
        self.reader.len()
    }

    #[inline]
    pub fn begin_index(&self) -> usize {
        0
    }

    /// Decoded length in UTF-16 code units.
    ///
    /// The first call decodes the whole source block by block unless the
    /// length was supplied with [`with_char_len`](Self::with_char_len).
    pub fn end_index(&self) -> Result<usize> {
        if let Some(len) = self.char_len.get() {
            return Ok(len);
        }
        let len = self.char_offset(self.byte_len())?;
        debug!(source = self.source_id(), chars = len, "computed decoded length");
        self.char_len.set(Some(len));
        Ok(len)
    }

    pub fn len(&self) -> Result<usize> {
        self.end_index()
    }

    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }

    /// UTF-16 code unit at `index`
    pub fn char_at(&self, index: usize) -> Result<u16> {
        let (char_pos, byte_pos) = self.locate(index)?;
        if byte_pos >= self.byte_len() {
            return Err(Error::IndexOutOfRange {
                index,
                begin: 0,
                end: char_pos,
            });
        }

        let lead = self.lead_byte(byte_pos)?;
        let n = sequence_len(lead).ok_or(Error::InvalidLeadByte {
            offset: byte_pos,
            byte: lead,
        })?;
        if byte_pos + n > self.byte_len() {
            return Err(Error::TruncatedSequence { offset: byte_pos });
        }
        let bytes = self.reader.read(byte_pos..byte_pos + n)?;
        let c = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.chars().next())
            .ok_or(Error::InvalidLeadByte {
                offset: byte_pos,
                byte: lead,
            })?;

        let mut buf = [0u16; 2];
        let units = c.encode_utf16(&mut buf);
        Ok(units[index - char_pos])
    }

    /// Decoded text of `[start, end)`
    pub fn sub_sequence(&self, start: usize, end: usize) -> Result<String> {
        if start > end {
            return Err(Error::IndexOutOfRange {
                index: start,
                begin: 0,
                end,
            });
        }
        let byte_start = self.byte_offset(start)?;
        let byte_end = self.byte_offset(end)?;
        let bytes = self.reader.read(byte_start..byte_end)?;
        String::from_utf8(bytes).map_err(|e| {
            let valid = e.utf8_error().valid_up_to();
            Error::InvalidLeadByte {
                offset: byte_start + valid,
                byte: e.as_bytes()[valid],
            }
        })
    }

    /// Byte offset of the character at `index`.
    ///
    /// An index pointing at the second half of a surrogate pair resolves to
    /// the start of the pair.
    pub fn byte_offset(&self, index: usize) -> Result<usize> {
        self.locate(index).map(|(_, byte_pos)| byte_pos)
    }

    /// Char index of the byte at `byte_pos`, which must start a character
    pub fn char_offset(&self, byte_pos: usize) -> Result<usize> {
        if byte_pos > self.byte_len() {
            return Err(Error::IndexOutOfRange {
                index: byte_pos,
                begin: 0,
                end: self.byte_len(),
            });
        }

        let (c0, b0) = self.anchor_before_byte(byte_pos);
        let (c, b) = self.advance(c0, b0, usize::MAX, byte_pos)?;
        if b != byte_pos {
            let byte = self.reader.byte_at(byte_pos)?.unwrap_or(0);
            return Err(Error::InvalidLeadByte {
                offset: byte_pos,
                byte,
            });
        }
        self.anchors.borrow_mut().put(c, b);
        Ok(c)
    }

    /// Raw byte at `pos`, or `None` past the end
    pub fn byte_at(&self, pos: usize) -> Result<Option<u8>> {
        self.reader.byte_at(pos)
    }

    /// Raw bytes of `range`
    pub fn read_bytes(&self, range: Range<usize>) -> Result<Vec<u8>> {
        self.reader.read(range)
    }

    /// Byte offset of the first occurrence of `needle` at or after `from`
    pub fn find_forward(&self, needle: &[u8], from: usize) -> Result<Option<usize>> {
        self.find_forward_until(needle, from, self.byte_len())
    }

    /// Like [`find_forward`](Self::find_forward), only accepting matches that
    /// start before `until`
    pub fn find_forward_until(
        &self,
        needle: &[u8],
        from: usize,
        until: usize,
    ) -> Result<Option<usize>> {
        let len = self.byte_len();
        let until = until.min(len);
        if needle.is_empty() {
            return Ok((from < until).then_some(from));
        }

        let mut pos = from;
        while pos < until {
            let end = (pos + SCAN_WINDOW).min(until + needle.len() - 1).min(len);
            let window = self.reader.read(pos..end)?;
            if let Some(i) = memmem::find(&window, needle) {
                return Ok(Some(pos + i));
            }
            if end == len || end <= pos + needle.len() - 1 {
                break;
            }
            // Overlap so a needle straddling two windows is still found
            pos = end - (needle.len() - 1);
        }
        Ok(None)
    }

    /// Byte offset of the last occurrence of `needle` starting before `before`
    pub fn find_backward(&self, needle: &[u8], before: usize) -> Result<Option<usize>> {
        self.find_backward_until(needle, before, 0)
    }

    /// Like [`find_backward`](Self::find_backward), only accepting matches
    /// that start at or after `after`
    pub fn find_backward_until(
        &self,
        needle: &[u8],
        before: usize,
        after: usize,
    ) -> Result<Option<usize>> {
        if needle.is_empty() || before <= after {
            return Ok(None);
        }

        let mut end = (before + needle.len() - 1).min(self.byte_len());
        loop {
            let start = end.saturating_sub(SCAN_WINDOW).max(after);
            if end < start + needle.len() {
                return Ok(None);
            }
            let window = self.reader.read(start..end)?;
            if let Some(i) = memmem::rfind(&window, needle) {
                return Ok(Some(start + i));
            }
            if start == after {
                return Ok(None);
            }
            end = start + needle.len() - 1;
        }
    }

    /// Resolve a char index to `(char, byte)` of the character containing it
    fn locate(&self, index: usize) -> Result<(usize, usize)> {
        let (c0, b0) = self.anchor_before_char(index);
        let (c, b) = self.advance(c0, b0, index, self.byte_len())?;
        if c < index && b >= self.byte_len() {
            self.char_len.set(Some(c));
            return Err(Error::IndexOutOfRange {
                index,
                begin: 0,
                end: c,
            });
        }
        self.anchors.borrow_mut().put(c, b);
        Ok((c, b))
    }

    /// Decode forward from anchor `(c, b)` until `target_units` chars or
    /// `byte_limit` bytes are reached, whichever comes first
    fn advance(
        &self,
        mut c: usize,
        mut b: usize,
        target_units: usize,
        byte_limit: usize,
    ) -> Result<(usize, usize)> {
        let block_size = self.reader.block_size();
        while c < target_units && b < byte_limit {
            let block = self.reader.block(b / block_size)?;
            let offset = b % block_size;
            let available = (byte_limit - b).min(block.len() - offset);
            let slice = &block[offset..offset + available];

            let (units, bytes) =
                utf8::advance_units(slice, target_units - c).map_err(|e| rebase(e, b))?;
            if bytes > 0 {
                c += units;
                b += bytes;
                continue;
            }

            // The next sequence straddles the block end or the byte limit, or
            // the target sits inside a surrogate pair.
            let lead = slice[0];
            let n = sequence_len(lead).ok_or(Error::InvalidLeadByte { offset: b, byte: lead })?;
            let u = sequence_units(lead);
            if c + u > target_units {
                break;
            }
            if b + n > self.byte_len() {
                return Err(Error::TruncatedSequence { offset: b });
            }
            c += u;
            b += n;
        }
        Ok((c, b))
    }

    fn lead_byte(&self, byte_pos: usize) -> Result<u8> {
        self.reader.byte_at(byte_pos)?.ok_or_else(|| {
            Error::source_read(self.source_id(), byte_pos, byte_pos + 1, "past end of source")
        })
    }

    fn anchor_before_char(&self, index: usize) -> (usize, usize) {
        let mut anchors = self.anchors.borrow_mut();
        let best = anchors
            .iter()
            .filter(|(&c, _)| c <= index)
            .max_by_key(|(&c, _)| c)
            .map(|(&c, &b)| (c, b));
        match best {
            Some((c, b)) => {
                anchors.promote(&c);
                (c, b)
            }
            None => (0, 0),
        }
    }

    fn anchor_before_byte(&self, byte_pos: usize) -> (usize, usize) {
        let mut anchors = self.anchors.borrow_mut();
        let best = anchors
            .iter()
            .filter(|(_, &b)| b <= byte_pos)
            .max_by_key(|(_, &b)| b)
            .map(|(&c, &b)| (c, b));
        match best {
            Some((c, b)) => {
                anchors.promote(&c);
                (c, b)
            }
            None => (0, 0),
        }
    }
}

/// Shift slice-relative codec error offsets to source offsets
fn rebase(err: Error, base: usize) -> Error {
    match err {
        Error::InvalidLeadByte { offset, byte } => Error::InvalidLeadByte {
            offset: base + offset,
            byte,
        },
        Error::TruncatedSequence { offset } => Error::TruncatedSequence {
            offset: base + offset,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "<p>Bayerische Staatsbibliothek München 😀 Morgen-Ausgabe. Preſſe €uro</p>";

    fn small_sequence(text: &str) -> LazyCharSequence {
        let opts = SequenceOptions {
            block_size: 16,
            block_capacity: 2,
            anchor_capacity: 2,
        };
        LazyCharSequence::with_options(
            Box::new(MemorySource::new("test", text.as_bytes().to_vec())),
            &opts,
        )
    }

    #[test]
    fn test_end_index() {
        let seq = small_sequence(TEXT);
        assert_eq!(seq.end_index().unwrap(), TEXT.encode_utf16().count());
        assert_eq!(seq.begin_index(), 0);
    }

    #[test]
    fn test_char_at_matches_full_decode() {
        let seq = small_sequence(TEXT);
        let units: Vec<u16> = TEXT.encode_utf16().collect();
        // Backwards first to exercise anchor fallback, then forwards
        for i in (0..units.len()).rev() {
            assert_eq!(seq.char_at(i).unwrap(), units[i], "index {i}");
        }
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(seq.char_at(i).unwrap(), *unit, "index {i}");
        }
    }

    #[test]
    fn test_sub_sequence() {
        let seq = small_sequence(TEXT);
        let start = TEXT.find("München").unwrap();
        let char_start = TEXT[..start].encode_utf16().count();
        assert_eq!(seq.sub_sequence(char_start, char_start + 7).unwrap(), "München");
    }

    #[test]
    fn test_byte_and_char_offsets_agree() {
        let seq = small_sequence(TEXT);
        for (byte_pos, _) in TEXT.char_indices() {
            let char_pos = TEXT[..byte_pos].encode_utf16().count();
            assert_eq!(seq.byte_offset(char_pos).unwrap(), byte_pos);
            assert_eq!(seq.char_offset(byte_pos).unwrap(), char_pos);
        }
    }

    #[test]
    fn test_surrogate_pair_second_half_snaps_to_pair() {
        let seq = small_sequence("ab😀c");
        assert_eq!(seq.byte_offset(3).unwrap(), 2);
        assert_eq!(seq.char_at(3).unwrap(), "😀".encode_utf16().nth(1).unwrap());
    }

    #[test]
    fn test_char_offset_inside_sequence() {
        let seq = small_sequence("aü");
        assert!(matches!(
            seq.char_offset(2),
            Err(Error::InvalidLeadByte { offset: 2, .. })
        ));
    }

    #[test]
    fn test_out_of_range() {
        let seq = small_sequence("abc");
        assert_eq!(
            seq.char_at(3),
            Err(Error::IndexOutOfRange { index: 3, begin: 0, end: 3 })
        );
        assert!(matches!(seq.sub_sequence(1, 10), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(seq.sub_sequence(2, 1), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_invalid_lead_byte() {
        let seq = LazyCharSequence::from_bytes("bad", vec![b'a', b'b', 0x80, b'c']);
        assert_eq!(
            seq.end_index(),
            Err(Error::InvalidLeadByte { offset: 2, byte: 0x80 })
        );
    }

    #[test]
    fn test_find_forward_and_backward_across_windows() {
        let mut text = "x".repeat(SCAN_WINDOW - 2);
        text.push_str("<l>");
        text.push_str(&"y".repeat(SCAN_WINDOW));
        text.push_str("<l>");
        let seq = LazyCharSequence::from_bytes("scan", text.as_bytes().to_vec());

        let first = SCAN_WINDOW - 2;
        let second = first + 3 + SCAN_WINDOW;
        assert_eq!(seq.find_forward(b"<l>", 0).unwrap(), Some(first));
        assert_eq!(seq.find_forward(b"<l>", first + 1).unwrap(), Some(second));
        assert_eq!(seq.find_forward(b"<l>", second + 1).unwrap(), None);

        assert_eq!(seq.find_backward(b"<l>", text.len()).unwrap(), Some(second));
        assert_eq!(seq.find_backward(b"<l>", second).unwrap(), Some(first));
        assert_eq!(seq.find_backward(b"<l>", first).unwrap(), None);
    }

    #[test]
    fn test_with_char_len_skips_scan() {
        let seq = LazyCharSequence::from_bytes("known", b"abc".to_vec()).with_char_len(3);
        assert_eq!(seq.end_index().unwrap(), 3);
    }

    struct FailingSource;

    impl ByteSource for FailingSource {
        fn len(&self) -> usize {
            100
        }

        fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
            Err(Error::source_read("failing", offset, offset + buf.len(), "disk on fire"))
        }

        fn id(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_source_errors_propagate() {
        let seq = LazyCharSequence::new(Box::new(FailingSource));
        assert!(matches!(seq.char_at(5), Err(Error::SourceRead { .. })));
    }
}
