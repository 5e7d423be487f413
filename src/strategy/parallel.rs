//! Parallel Highlighting
//!
//! Uses Rayon to highlight many documents at once. A char sequence is not
//! `Sync`, so every document gets its own; only the format registry and the
//! options are shared between workers.

use std::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::config::HighlightOptions;
use crate::error::Result;
use crate::format::{FilteredText, FormatRegistry, OcrFormat, OffsetMap};
use crate::passage::{Highlighter, Passage};
use crate::reader::{ByteSource, LazyCharSequence, MemorySource, SourcePointer};

#[derive(Debug, Clone)]
pub enum DocumentSource {
    Pointer(SourcePointer),
    Bytes { id: String, bytes: Arc<[u8]> },
}

impl DocumentSource {
    pub fn open(&self) -> Result<Box<dyn ByteSource>> {
        match self {
            DocumentSource::Pointer(pointer) => pointer.open(),
            DocumentSource::Bytes { id, bytes } => {
                Ok(Box::new(MemorySource::new(id.clone(), Arc::clone(bytes))))
            }
        }
    }
}

/// One document to highlight: where its markup lives, how its plain text
/// maps back into it and the plain-text matches
#[derive(Debug, Clone)]
pub struct Document {
    pub source: DocumentSource,
    /// Detected from the markup when `None`
    pub format: Option<OcrFormat>,
    pub offsets: OffsetMap,
    pub matches: Vec<Range<usize>>,
}

/// Highlight a single document on the calling thread
pub fn highlight_document(
    registry: &FormatRegistry,
    doc: &Document,
    opts: &HighlightOptions,
) -> Result<Vec<Result<Passage>>> {
    let text = LazyCharSequence::with_options(doc.source.open()?, &opts.sequence);
    let format = match doc.format {
        Some(format) => format,
        None => registry.detect_source(&text)?,
    };
    Highlighter::new(format, opts.clone()).highlight(&text, &doc.offsets, &doc.matches)
}

/// Highlight documents in parallel; results are in input order
pub fn highlight_batch(
    registry: &FormatRegistry,
    docs: &[Document],
    opts: &HighlightOptions,
) -> Vec<Result<Vec<Result<Passage>>>> {
    debug!(documents = docs.len(), "highlighting batch");
    docs.par_iter()
        .map(|doc| highlight_document(registry, doc, opts))
        .collect()
}

/// Filter markup documents to plain text in parallel
pub fn filter_parallel(format: OcrFormat, docs: &[&[u8]]) -> Vec<FilteredText> {
    docs.par_iter().map(|markup| format.filter(markup)).collect()
}
