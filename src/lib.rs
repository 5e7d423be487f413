//! OcrHighlight - OCR passage highlighting over large markup files
//!
//! Maps plain-text match offsets from a search index back into hOCR, ALTO
//! or MiniOCR markup and builds passages with page geometry.
//!
//! Layers:
//! - core: UTF-8/UTF-16 codec, byte scanning, entities
//! - reader: byte sources, block cache, lazy UTF-16 char sequence
//! - iter: structural break locators and context windows
//! - format: dialect tables, plain-text filter, offset maps
//! - passage: passage formatter and snippet assembly
//! - strategy: parallel batch highlighting

use std::sync::LazyLock;

use rustler::{Binary, Encoder, Env, NifResult, Term};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod iter;
pub mod passage;
pub mod reader;
pub mod strategy;
mod term;

pub use config::{HighlightOptions, SequenceOptions};
pub use error::{Error, Result};
pub use format::{FormatRegistry, OcrFormat, OffsetMap};
pub use iter::{BlockKind, BreakLocator};
pub use passage::{BoundingBox, Highlight, Highlighter, Passage, PassageFormatter, PassageSpan};
pub use reader::{LazyCharSequence, SourcePointer};

use strategy::{Document, DocumentSource};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

static REGISTRY: LazyLock<FormatRegistry> = LazyLock::new(FormatRegistry::new);

/// `"auto"` leaves the format to detection
fn parse_format(name: &str) -> Result<Option<OcrFormat>> {
    if name.eq_ignore_ascii_case("auto") {
        Ok(None)
    } else {
        REGISTRY.get(name).map(Some)
    }
}

type OffsetPoints = (Vec<(usize, usize)>, usize);
type Matches = Vec<(usize, usize)>;

fn document(pointer: &str, format: &str, offsets: OffsetPoints, matches: Matches) -> Result<Document> {
    let (points, len) = offsets;
    Ok(Document {
        source: DocumentSource::Pointer(SourcePointer::parse(pointer)?),
        format: parse_format(format)?,
        offsets: OffsetMap::from_points(points, len)?,
        matches: matches.into_iter().map(|(start, end)| start..end).collect(),
    })
}

// ============================================================================
// Format Detection and Filtering
// ============================================================================

/// Format of a markup sample, or nil
#[rustler::nif]
fn sniff_format<'a>(env: Env<'a>, sample: Binary<'a>) -> Term<'a> {
    let sample = String::from_utf8_lossy(sample.as_slice());
    match REGISTRY.detect(&sample) {
        Some(format) => term::format_atom(format).encode(env),
        None => rustler::types::atom::nil().encode(env),
    }
}

/// Plain text for indexing: `{:ok, {text, points, len}}`
#[rustler::nif(schedule = "DirtyCpu")]
fn filter_markup<'a>(env: Env<'a>, format: &str, markup: Binary<'a>) -> Term<'a> {
    let result = REGISTRY.get(format).map(|format| {
        let filtered = format.filter(markup.as_slice());
        let points = filtered.offsets.points().to_vec();
        (filtered.text, points, filtered.offsets.len())
    });
    term::result_to_term(env, result)
}

// ============================================================================
// Context Windows and Highlighting
// ============================================================================

fn window(
    pointer: &str,
    format: &str,
    break_kind: BlockKind,
    limit_kind: Option<BlockKind>,
    (start, end): (usize, usize),
    context_size: usize,
) -> Result<(usize, usize)> {
    let text = LazyCharSequence::new(SourcePointer::parse(pointer)?.open()?);
    let format = match parse_format(format)? {
        Some(format) => format,
        None => REGISTRY.detect_source(&text)?,
    };
    let locator = format.break_locator(&text, break_kind, limit_kind, context_size);
    Ok((locator.preceding(start)?, locator.following(end)?))
}

/// Markup char offsets `{:ok, {start, end}}` of the context window around a
/// markup span
#[rustler::nif(schedule = "DirtyIo")]
fn context_window<'a>(
    env: Env<'a>,
    pointer: &str,
    format: &str,
    break_kind: Term<'a>,
    limit_kind: Term<'a>,
    span: (usize, usize),
    context_size: usize,
) -> NifResult<Term<'a>> {
    let break_kind = term::block_kind(break_kind)?.ok_or(rustler::Error::BadArg)?;
    let limit_kind = term::block_kind(limit_kind)?;
    let result = window(pointer, format, break_kind, limit_kind, span, context_size);
    Ok(term::result_to_term(env, result))
}

/// Passages for plain-text matches in one document
#[rustler::nif(schedule = "DirtyIo")]
fn highlight<'a>(
    env: Env<'a>,
    pointer: &str,
    format: &str,
    offsets: OffsetPoints,
    matches: Matches,
    opts: Term<'a>,
) -> NifResult<Term<'a>> {
    let opts = term::decode_options(opts)?;
    let outcome = document(pointer, format, offsets, matches)
        .and_then(|doc| strategy::highlight_document(&REGISTRY, &doc, &opts));
    term::outcome_to_term(env, &outcome)
}

/// Highlight many documents in parallel, one result per document in input
/// order. Documents are `{pointer, format, {points, len}, matches}`.
#[rustler::nif(schedule = "DirtyCpu")]
fn highlight_batch<'a>(
    env: Env<'a>,
    docs: Vec<(String, String, OffsetPoints, Matches)>,
    opts: Term<'a>,
) -> NifResult<Term<'a>> {
    let opts = term::decode_options(opts)?;

    let mut documents = Vec::with_capacity(docs.len());
    let mut invalid: Vec<Option<Error>> = Vec::with_capacity(docs.len());
    for (pointer, format, offsets, matches) in docs {
        match document(&pointer, &format, offsets, matches) {
            Ok(doc) => {
                documents.push(doc);
                invalid.push(None);
            }
            Err(err) => invalid.push(Some(err)),
        }
    }

    let mut outcomes = strategy::highlight_batch(&REGISTRY, &documents, &opts).into_iter();
    let mut terms = Vec::with_capacity(invalid.len());
    for err in invalid {
        let term = match err {
            Some(err) => term::error_to_term(env, &err),
            None => match outcomes.next() {
                Some(outcome) => term::outcome_to_term(env, &outcome)?,
                None => rustler::types::atom::nil().encode(env),
            },
        };
        terms.push(term);
    }
    Ok(terms.encode(env))
}

// ============================================================================
// NIF Initialization
// ============================================================================

fn load(_env: Env, _info: Term) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Another library in the VM may own the global subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    true
}

rustler::init!("Elixir.OcrHighlight.Native", load = load);
