//! Source Pointers
//!
//! Text form for "where does this document's OCR live":
//!
//! ```text
//! /data/page1.hocr                      whole file
//! /data/vol.xml[1024:8192]              one byte region
//! /data/vol.xml[0:512,4096:]            several regions of one file
//! /data/p1.xml+/data/p2.xml[:300]       concatenation
//! ```
//!
//! Regions are byte offsets, end exclusive; a missing start means 0 and a
//! missing end means end of file.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::source::{ByteSource, FileSource, MultiSource};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub end: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRegions {
    pub path: PathBuf,
    /// Empty means the whole file
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePointer {
    pub files: Vec<FileRegions>,
}

impl SourcePointer {
    pub fn parse(pointer: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPointer {
            pointer: pointer.to_string(),
            reason: reason.to_string(),
        };

        let mut files = Vec::new();
        for part in pointer.split('+') {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid("empty path"));
            }

            let (path, regions) = match part.strip_suffix(']') {
                Some(head) => {
                    let open = head.rfind('[').ok_or_else(|| invalid("unbalanced ']'"))?;
                    let regions = head[open + 1..]
                        .split(',')
                        .map(|r| parse_region(r.trim()).ok_or_else(|| invalid("malformed region")))
                        .collect::<Result<Vec<_>>>()?;
                    (&head[..open], regions)
                }
                None => (part, Vec::new()),
            };

            if path.is_empty() {
                return Err(invalid("empty path"));
            }
            files.push(FileRegions {
                path: PathBuf::from(path),
                regions,
            });
        }

        Ok(SourcePointer { files })
    }

    /// Open every referenced file region as one byte source
    pub fn open(&self) -> Result<Box<dyn ByteSource>> {
        let mut parts: Vec<Box<dyn ByteSource>> = Vec::new();
        for file in &self.files {
            if file.regions.is_empty() {
                parts.push(Box::new(FileSource::open(&file.path)?));
                continue;
            }
            for region in &file.regions {
                let range = region.start..region.end.unwrap_or(usize::MAX);
                parts.push(Box::new(FileSource::open_section(&file.path, range)?));
            }
        }

        if parts.len() == 1 {
            Ok(parts.remove(0))
        } else {
            Ok(Box::new(MultiSource::new(parts)))
        }
    }
}

fn parse_region(region: &str) -> Option<Region> {
    let (start, end) = region.split_once(':')?;
    let start = if start.is_empty() { 0 } else { start.parse().ok()? };
    let end = if end.is_empty() { None } else { Some(end.parse().ok()?) };
    match end {
        Some(end) if end < start => None,
        _ => Some(Region { start, end }),
    }
}

impl FromStr for SourcePointer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SourcePointer::parse(s)
    }
}

impl fmt::Display for SourcePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, file) in self.files.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}", file.path.display())?;
            if file.regions.is_empty() {
                continue;
            }
            f.write_str("[")?;
            for (j, region) in file.regions.iter().enumerate() {
                if j > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}:", region.start)?;
                if let Some(end) = region.end {
                    write!(f, "{end}")?;
                }
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}
