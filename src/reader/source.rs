//! Encoded Sources
//!
//! Read-only, byte-addressable OCR documents. Reads are positional (no shared
//! cursor), so one source can serve concurrent requests behind an `Arc`.

use std::fs::File;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Immutable byte source of known length
pub trait ByteSource: Send + Sync {
    /// Total length in bytes
    fn len(&self) -> usize;

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Fails with [`Error::SourceRead`] if the range is not entirely inside
    /// the source or the underlying read fails.
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()>;

    /// Identifier used in error messages and logs
    fn id(&self) -> &str;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Box<T> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn id(&self) -> &str {
        (**self).id()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Arc<T> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }

    fn id(&self) -> &str {
        (**self).id()
    }
}

fn check_range(source: &dyn ByteSource, offset: usize, len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= source.len() => Ok(()),
        _ => Err(Error::source_read(
            source.id(),
            offset,
            offset.saturating_add(len),
            format!("range exceeds source length {}", source.len()),
        )),
    }
}

/// Bytes held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    id: String,
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(id: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        MemorySource {
            id: id.into(),
            bytes: bytes.into(),
        }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        check_range(self, offset, buf.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// A file, or one byte section of a file
#[derive(Debug, Clone)]
pub struct FileSource {
    id: String,
    path: PathBuf,
    file: Arc<File>,
    start: usize,
    len: usize,
}

impl FileSource {
    /// Open a whole file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_section(path, 0..usize::MAX)
    }

    /// Open the byte section `range` of a file. An end of `usize::MAX` means
    /// "until the end of the file".
    pub fn open_section(path: impl AsRef<Path>, range: Range<usize>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let display = path.display().to_string();
        let io_err = |e: io::Error| Error::source_read(&display, range.start, range.end, e);

        let file = File::open(&path).map_err(io_err)?;
        let file_len = file.metadata().map_err(io_err)?.len() as usize;
        let end = if range.end == usize::MAX { file_len } else { range.end };
        if range.start > end || end > file_len {
            return Err(Error::source_read(
                &display,
                range.start,
                end,
                format!("section outside file of {file_len} bytes"),
            ));
        }

        let id = if range.start == 0 && end == file_len {
            display
        } else {
            format!("{display}[{}:{end}]", range.start)
        };

        Ok(FileSource {
            id,
            path,
            file: Arc::new(file),
            start: range.start,
            len: end - range.start,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> usize {
        self.len
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        check_range(self, offset, buf.len())?;
        read_exact_at(&self.file, buf, (self.start + offset) as u64)
            .map_err(|e| Error::source_read(&self.id, offset, offset + buf.len(), e))
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Several sources read back to back as one
pub struct MultiSource {
    id: String,
    parts: Vec<Box<dyn ByteSource>>,
    /// Start offset of every part, plus the total length at the end
    starts: Vec<usize>,
}

impl MultiSource {
    pub fn new(parts: Vec<Box<dyn ByteSource>>) -> Self {
        let mut starts = Vec::with_capacity(parts.len() + 1);
        let mut total = 0;
        for part in &parts {
            starts.push(total);
            total += part.len();
        }
        starts.push(total);
        let id = parts.iter().map(|p| p.id()).collect::<Vec<_>>().join("+");
        MultiSource { id, parts, starts }
    }
}

impl ByteSource for MultiSource {
    fn len(&self) -> usize {
        self.starts.last().copied().unwrap_or(0)
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        check_range(self, offset, buf.len())?;
        let mut filled = 0;
        while filled < buf.len() {
            let pos = offset + filled;
            // Last part starting at or before `pos`; empty parts are skipped
            let idx = self.starts.partition_point(|&s| s <= pos) - 1;
            let part = &self.parts[idx];
            let part_offset = pos - self.starts[idx];
            let n = (part.len() - part_offset).min(buf.len() - filled);
            part.read_at(part_offset, &mut buf[filled..filled + n])?;
            filled += n;
        }
        Ok(())
    }

    fn id(&self) -> &str {
        &self.id
    }
}
