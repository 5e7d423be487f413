//! Passage Formatter
//!
//! Maps a plain-text span back into the markup and rebuilds it as a passage
//! out of the word elements it covers.
//!
//! Highlights are located by inserting private-use marker characters into a
//! copy of the snippet bytes. The markers sit inside word text or word
//! attributes, so they come out of the token walk at the right place in the
//! decoded text and tell which word boxes belong to which highlight.

use std::ops::Range;

use tracing::{debug, warn};

use super::{BoundingBox, Highlight, Passage, PassageSpan};
use crate::config::HighlightOptions;
use crate::core::attributes::local_name;
use crate::core::entities::{decode_with_offsets, entity_len};
use crate::core::utf8::{code_point_len, sequence_len};
use crate::error::{Error, Result};
use crate::format::events::{MarkupReader, Tag, Token};
use crate::format::filter::{is_line_hyphen, IgnoredElements};
use crate::format::{Dialect, Kinds, OcrFormat, OffsetMap, WordText};
use crate::iter::{BlockKind, BreakLocator, SelectorBreakLocator};
use crate::reader::LazyCharSequence;

const MARK_START: char = '\u{E000}';
const MARK_END: char = '\u{E001}';
/// UTF-8 length of either marker
const MARK_LEN: usize = code_point_len(MARK_START as u32);

/// Bytes searched back for the opening tag of a word the passage starts in
const WORD_LOOKBACK: usize = 8 * 1024;
/// Bytes read past the passage end to close its last word
const LOOKAHEAD: usize = 16 * 1024;
/// Longest page start tag read when seeding page geometry
const PAGE_TAG_LIMIT: usize = 4096;

#[derive(Debug, Clone)]
pub struct PassageFormatter {
    format: OcrFormat,
    pre_tag: String,
    post_tag: String,
    absolute_highlights: bool,
}

/// Page the walk is on
#[derive(Debug, Clone, Default)]
struct PageInfo {
    size: Option<(f32, f32)>,
    id: Option<String>,
}

impl PassageFormatter {
    pub fn new(format: OcrFormat, opts: &HighlightOptions) -> Self {
        PassageFormatter {
            format,
            pre_tag: opts.pre_tag.clone(),
            post_tag: opts.post_tag.clone(),
            absolute_highlights: opts.absolute_highlights,
        }
    }

    pub fn format(&self) -> OcrFormat {
        self.format
    }

    pub fn absolute_highlights(&self) -> bool {
        self.absolute_highlights
    }

    fn dialect(&self) -> &'static Dialect {
        self.format.dialect()
    }

    /// Format every span independently; a span that cannot be located in the
    /// markup fails on its own
    pub fn format_passages(
        &self,
        text: &LazyCharSequence,
        offsets: &OffsetMap,
        spans: &[PassageSpan],
    ) -> Vec<Result<Passage>> {
        spans
            .iter()
            .map(|span| {
                let result =
                    self.format_passage(text, offsets, span.start..span.end, &span.highlights);
                if let Err(err) = &result {
                    warn!(
                        source = text.source_id(),
                        start = span.start,
                        end = span.end,
                        error = %err,
                        "passage failed"
                    );
                }
                result
            })
            .collect()
    }

    /// Build the passage for the plain-text `span` of `text`, highlighting
    /// the plain-text `highlights` inside it
    pub fn format_passage(
        &self,
        text: &LazyCharSequence,
        offsets: &OffsetMap,
        span: Range<usize>,
        highlights: &[Range<usize>],
    ) -> Result<Passage> {
        let (start, end) = (span.start, span.end);
        let fail = |reason: &str| Error::unresolved(start, end, reason);
        if start >= end {
            return Err(fail("empty span"));
        }

        let markup_start = offsets
            .to_markup_start(start)
            .ok_or_else(|| fail("span outside the plain text"))?;
        let markup_end = offsets
            .to_markup_end(end)
            .ok_or_else(|| fail("span outside the plain text"))?;
        let start_byte = resolve(text, markup_start, start, end)?;
        let end_byte = resolve(text, markup_end, start, end)?;
        if end_byte <= start_byte {
            return Err(fail("offset drift"));
        }

        let base = self.word_start(text, start_byte)?;
        let page = self.page_at(text, base)?;
        let read_end = end_byte.saturating_add(LOOKAHEAD).min(text.byte_len());
        let raw = text.read_bytes(base..read_end)?;

        let marks = self.markers(text, offsets, start..end, highlights, base, &raw)?;
        let Some(cut) = end_byte.checked_sub(base) else {
            return Err(fail("offset drift"));
        };
        let cut = cut + marks.len() * MARK_LEN;
        let snippet = insert_markers(&raw, &marks);

        let mut walk = Walk::new(self, page);
        walk.run(&snippet, cut).map_err(fail)?;
        let passage = walk.finish(start, end).map_err(fail)?;

        debug!(
            source = text.source_id(),
            start,
            end,
            markup = ?(base..end_byte),
            highlights = passage.highlights.len(),
            "formatted passage"
        );
        Ok(passage)
    }

    /// Opening tag of the word element `start_byte` lies in, or `start_byte`
    /// itself when it is not inside a word
    fn word_start(&self, text: &LazyCharSequence, start_byte: usize) -> Result<usize> {
        let words = SelectorBreakLocator::new(text, self.dialect().selectors(BlockKind::Word));
        let start_char = text.char_offset(start_byte)?;
        let open_byte = text.byte_offset(words.preceding(start_char + 1)?)?;
        if open_byte >= start_byte || start_byte - open_byte > WORD_LOOKBACK {
            return Ok(start_byte);
        }

        let head = text.read_bytes(open_byte..start_byte)?;
        let mut reader = MarkupReader::new(&head);
        match reader.next() {
            // The start lies inside the word tag itself (attribute text)
            Some(Token::Unterminated { .. }) => Ok(open_byte),
            Some(Token::Start(tag))
                if !tag.self_closing && self.dialect().classify(&tag).contains(BlockKind::Word) =>
            {
                let name = tag.local_name();
                let mut depth = 1usize;
                for token in reader {
                    match token {
                        Token::Start(inner)
                            if !inner.self_closing && inner.local_name().eq_ignore_ascii_case(name) =>
                        {
                            depth += 1;
                        }
                        Token::End { name: closed, .. }
                            if local_name(closed).eq_ignore_ascii_case(name) =>
                        {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(start_byte);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(open_byte)
            }
            _ => Ok(start_byte),
        }
    }

    /// Geometry and id of the page element enclosing `byte`
    fn page_at(&self, text: &LazyCharSequence, byte: usize) -> Result<PageInfo> {
        let dialect = self.dialect();
        let pages = SelectorBreakLocator::new(text, dialect.selectors(BlockKind::Page));
        let char_pos = text.char_offset(byte)?;
        let open_byte = text.byte_offset(pages.preceding(char_pos + 1)?)?;
        let head_end = open_byte.saturating_add(PAGE_TAG_LIMIT).min(text.byte_len());
        let head = text.read_bytes(open_byte..head_end)?;

        Ok(match MarkupReader::new(&head).next() {
            Some(Token::Start(tag)) if dialect.classify(&tag).contains(BlockKind::Page) => PageInfo {
                size: (dialect.page_size)(&tag),
                id: dialect.page_id(&tag),
            },
            _ => PageInfo::default(),
        })
    }

    /// Marker positions relative to `base`, sorted, ends before starts at the
    /// same position
    fn markers(
        &self,
        text: &LazyCharSequence,
        offsets: &OffsetMap,
        bounds: Range<usize>,
        highlights: &[Range<usize>],
        base: usize,
        raw: &[u8],
    ) -> Result<Vec<(usize, bool)>> {
        let mut marks = Vec::with_capacity(highlights.len() * 2);
        for hl in merge_spans(highlights, bounds) {
            let fail = |reason: &str| Error::unresolved(hl.start, hl.end, reason);
            let (Some(first), Some(after)) = (
                offsets.to_markup_start(hl.start),
                offsets.to_markup_end(hl.end),
            ) else {
                return Err(fail("highlight outside the plain text"));
            };

            let from = resolve(text, first, hl.start, hl.end)?;
            let last = resolve(text, after.saturating_sub(1), hl.start, hl.end)?;
            let (Some(from), Some(last)) = (from.checked_sub(base), last.checked_sub(base)) else {
                return Err(fail("highlight before the passage"));
            };

            if last >= raw.len() {
                return Err(fail("highlight past the passage"));
            }
            let to = char_end(raw, last);
            if to > from {
                marks.push((from, true));
                marks.push((to, false));
            }
        }
        marks.sort_unstable_by_key(|&(pos, is_start)| (pos, is_start));
        Ok(marks)
    }
}

/// Byte offset of a markup char offset; offsets past the markup are drift
fn resolve(text: &LazyCharSequence, char_pos: usize, start: usize, end: usize) -> Result<usize> {
    text.byte_offset(char_pos).map_err(|err| match err {
        Error::IndexOutOfRange { .. } => Error::unresolved(start, end, "offset beyond the markup"),
        err => err,
    })
}

/// End of the markup a plain character at `pos` came from. A separator
/// taken from a tag ends before the tag; an entity ends after its `;`.
fn char_end(raw: &[u8], pos: usize) -> usize {
    match raw.get(pos) {
        None | Some(b'<') => pos,
        Some(b'&') => pos + entity_len(&raw[pos..]).unwrap_or(1),
        Some(&lead) => (pos + sequence_len(lead).unwrap_or(1)).min(raw.len()),
    }
}

/// Clamp to `bounds`, drop empty spans, merge overlapping or touching ones
fn merge_spans(spans: &[Range<usize>], bounds: Range<usize>) -> Vec<Range<usize>> {
    let mut clamped: Vec<Range<usize>> = spans
        .iter()
        .map(|s| s.start.max(bounds.start)..s.end.min(bounds.end))
        .filter(|s| s.start < s.end)
        .collect();
    clamped.sort_unstable_by_key(|s| s.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(clamped.len());
    for span in clamped {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

fn insert_markers(raw: &[u8], marks: &[(usize, bool)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + marks.len() * MARK_LEN);
    let mut buf = [0u8; 4];
    let mut pos = 0;
    for &(at, is_start) in marks {
        out.extend_from_slice(&raw[pos..at]);
        let mark = if is_start { MARK_START } else { MARK_END };
        out.extend_from_slice(mark.encode_utf8(&mut buf).as_bytes());
        pos = at;
    }
    out.extend_from_slice(&raw[pos..]);
    out
}

fn merge_box(target: &mut Option<BoundingBox>, region: BoundingBox) {
    *target = Some(match target {
        Some(current) => current.union(&region),
        None => region,
    });
}

/// Highlight whose end marker has not been seen yet
struct OpenHighlight {
    text: String,
    region: Option<BoundingBox>,
}

/// State of one token walk over a marked snippet
struct Walk<'f> {
    formatter: &'f PassageFormatter,
    dialect: &'static Dialect,
    page: PageInfo,
    text: String,
    region: Option<BoundingBox>,
    highlights: Vec<Highlight>,
    open: Option<OpenHighlight>,
    /// Highlights closed inside the current word
    touched: Vec<usize>,
    word_box: Option<BoundingBox>,
    /// Open word elements
    words: usize,
    pending_space: bool,
    /// Last character of the text with its byte index, and the one before it
    last: Option<(usize, char)>,
    before_last: Option<char>,
    /// Set after de-hyphenation until the next character
    joined: bool,
    failure: Option<&'static str>,
}

impl<'f> Walk<'f> {
    fn new(formatter: &'f PassageFormatter, page: PageInfo) -> Self {
        Walk {
            formatter,
            dialect: formatter.dialect(),
            page,
            text: String::new(),
            region: None,
            highlights: Vec::new(),
            open: None,
            touched: Vec::new(),
            word_box: None,
            words: 0,
            pending_space: false,
            last: None,
            before_last: None,
            joined: false,
            failure: None,
        }
    }

    /// Walk `snippet` until the first point at or past `cut` outside any word
    fn run(&mut self, snippet: &[u8], cut: usize) -> std::result::Result<(), &'static str> {
        let mut stack: Vec<(&[u8], Kinds, bool)> = Vec::new();
        let mut ignored = IgnoredElements::default();

        for token in MarkupReader::new(snippet) {
            let token_end = token.span().end;
            if ignored.skip(self.dialect, &token) {
                continue;
            }
            match token {
                Token::Unterminated { .. } => return Err("unterminated tag"),
                Token::Start(tag) => {
                    let kinds = self.dialect.classify(&tag);
                    let is_word = self.start(&tag, kinds, snippet);
                    if !tag.self_closing {
                        stack.push((tag.local_name(), kinds, is_word));
                    }
                }
                Token::End { name, .. } => {
                    let local = local_name(name);
                    if let Some(open) = stack.iter().rposition(|(n, ..)| n.eq_ignore_ascii_case(local)) {
                        for (_, kinds, is_word) in stack.drain(open..).rev() {
                            if is_word {
                                self.words -= 1;
                                self.end_word();
                            }
                            if kinds.contains(BlockKind::Line) {
                                self.end_line();
                            }
                        }
                    }
                }
                Token::Text { raw, .. } => {
                    if self.words > 0 && self.dialect.element_text {
                        self.push_text(raw);
                    } else {
                        self.push_markers(raw);
                    }
                }
            }

            if let Some(reason) = self.failure {
                return Err(reason);
            }
            if token_end >= cut && self.words == 0 {
                return Ok(());
            }
        }

        if self.words > 0 {
            return Err("word element not closed");
        }
        Ok(())
    }

    /// Handle a start tag, returning whether it opens a word
    fn start(&mut self, tag: &Tag<'_>, kinds: Kinds, snippet: &[u8]) -> bool {
        // The line before may have opened ahead of the snippet, so its end tag
        // is not always seen
        if kinds.contains(BlockKind::Line) {
            self.end_line();
        }
        if kinds.contains(BlockKind::Page) {
            if let Some(size) = (self.dialect.page_size)(tag) {
                self.page.size = Some(size);
            }
            if self.page.id.is_none() {
                self.page.id = self.dialect.page_id(tag);
            }
        }
        if self.dialect.is_space(tag) {
            self.separate();
        }
        if !kinds.contains(BlockKind::Word) {
            return false;
        }

        let region = (self.dialect.word_box)(tag).and_then(|raw| raw.normalize(self.page.size));
        match (self.dialect.word_text)(tag) {
            WordText::Skip => self.extend_word(region),
            WordText::Content => self.begin_word(region),
            WordText::Attribute(name) => {
                self.begin_word(region);
                if let Some(attr) = tag.attribute(name) {
                    self.push_text(&snippet[tag.raw_value_span(attr)]);
                }
            }
        }

        if tag.self_closing {
            self.end_word();
            false
        } else {
            self.words += 1;
            true
        }
    }

    fn begin_word(&mut self, region: Option<BoundingBox>) {
        self.separate();
        self.touched.clear();
        self.word_box = region;
        if let Some(region) = region {
            merge_box(&mut self.region, region);
            if let Some(open) = self.open.as_mut() {
                merge_box(&mut open.region, region);
            }
        }
    }

    /// Second part of a hyphenated word: its box belongs to the previous word
    fn extend_word(&mut self, region: Option<BoundingBox>) {
        let Some(region) = region else {
            return;
        };
        merge_box(&mut self.region, region);
        for &i in &self.touched {
            self.highlights[i].region = self.highlights[i].region.union(&region);
        }
        if let Some(open) = self.open.as_mut() {
            merge_box(&mut open.region, region);
        }
    }

    fn end_word(&mut self) {
        self.word_box = None;
    }

    /// Join a word hyphenated across the line break, as the plain text does
    fn end_line(&mut self) {
        let Some((at, hyphen)) = self.last else {
            return self.separate();
        };
        if !self.before_last.is_some_and(|before| is_line_hyphen(hyphen, before)) {
            return self.separate();
        }

        self.text.remove(at);
        if let Some(open) = self.open.as_mut().filter(|open| open.text.ends_with(hyphen)) {
            open.text.pop();
        }
        self.last = None;
        self.before_last = None;
        self.pending_space = false;
        self.joined = true;
    }

    fn push_text(&mut self, raw: &[u8]) {
        decode_with_offsets(raw, |c, _| self.push_char(c));
    }

    /// Only the highlight markers of text outside words
    fn push_markers(&mut self, raw: &[u8]) {
        decode_with_offsets(raw, |c, _| {
            if c == MARK_START || c == MARK_END {
                self.push_char(c);
            }
        });
    }

    fn push_char(&mut self, c: char) {
        match c {
            MARK_START => {
                self.flush_space();
                self.text.push_str(&self.formatter.pre_tag);
                self.open = Some(OpenHighlight {
                    text: String::new(),
                    region: self.word_box,
                });
            }
            MARK_END => self.close_highlight(),
            c if c.is_whitespace() => self.separate(),
            c if c.is_control() => {}
            c => {
                self.flush_space();
                self.note(c);
                self.text.push(c);
                self.joined = false;
                if let Some(open) = self.open.as_mut() {
                    open.text.push(c);
                }
            }
        }
    }

    fn note(&mut self, c: char) {
        self.before_last = self.last.map(|(_, last)| last);
        self.last = Some((self.text.len(), c));
    }

    fn separate(&mut self) {
        if !self.text.is_empty() && !self.joined {
            self.pending_space = true;
        }
    }

    fn flush_space(&mut self) {
        if !std::mem::take(&mut self.pending_space) {
            return;
        }
        self.note(' ');
        self.text.push(' ');
        if let Some(open) = self.open.as_mut().filter(|open| !open.text.is_empty()) {
            open.text.push(' ');
        }
    }

    fn close_highlight(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        self.text.push_str(&self.formatter.post_tag);
        match open.region {
            Some(region) => {
                self.touched.push(self.highlights.len());
                self.highlights.push(Highlight {
                    text: open.text,
                    region,
                });
            }
            None if self.failure.is_none() => {
                self.failure = Some("highlight covers no word with geometry");
            }
            None => {}
        }
    }

    fn finish(self, start: usize, end: usize) -> std::result::Result<Passage, &'static str> {
        if self.open.is_some() {
            return Err("highlight not closed");
        }
        let region = match (self.region, self.page.size) {
            (Some(region), _) => region,
            (None, None) => return Err("page dimensions not found"),
            (None, Some(_)) => return Err("passage has no word geometry"),
        };

        let absolute = self.formatter.absolute_highlights;
        let highlights = self
            .highlights
            .into_iter()
            .map(|mut hl| {
                if !absolute {
                    hl.region = hl.region.relative_to(&region);
                }
                hl
            })
            .collect();

        Ok(Passage {
            text: self.text,
            start,
            end,
            page: self.page.id,
            region,
            highlights,
        })
    }
}
