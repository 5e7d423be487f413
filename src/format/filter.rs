//! Plain-Text Filter
//!
//! Turns OCR markup into the plain text that gets indexed, recording where
//! every plain UTF-16 unit came from in the markup.
//!
//! - Only text inside structural elements is kept; ignored elements (HTML
//!   head, scripts, styles) are skipped entirely.
//! - Entities are decoded, whitespace runs collapse to one space and every
//!   structural boundary separates words by one space.
//! - A letter followed by a hyphen at the end of a line is joined with the
//!   first word of the next line, dropping the hyphen.

use tracing::debug;

use super::events::{MarkupReader, Tag, Token};
use super::offsets::{OffsetMap, OffsetMapBuilder};
use super::{Dialect, Kinds, WordText};
use crate::core::attributes::local_name;
use crate::core::entities::decode_with_offsets;
use crate::core::utf8::count_units;
use crate::iter::BlockKind;

/// Hyphen characters that may end a line in the middle of a word
const HYPHENS: [char; 5] = ['-', '\u{00AD}', '\u{00AC}', '\u{2010}', '\u{2E17}'];

/// Whether a line ending in `before` followed by `last` continues its word on
/// the next line, without the hyphen
pub(crate) fn is_line_hyphen(last: char, before: char) -> bool {
    HYPHENS.contains(&last) && before.is_alphabetic()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilteredText {
    pub text: String,
    pub offsets: OffsetMap,
}

pub fn filter_markup(dialect: &Dialect, markup: &[u8]) -> FilteredText {
    let mut filter = PlainTextFilter::new(dialect, markup);
    for token in MarkupReader::new(markup) {
        filter.token(token);
    }
    let filtered = filter.finish();
    debug!(
        format = dialect.name,
        markup_bytes = markup.len(),
        plain_units = filtered.offsets.len(),
        "filtered markup"
    );
    filtered
}

/// Converts byte positions in the markup to UTF-16 offsets, reusing the last
/// position so a forward walk stays linear
pub(crate) struct UnitCounter<'m> {
    input: &'m [u8],
    byte: usize,
    units: usize,
}

impl<'m> UnitCounter<'m> {
    pub(crate) fn new(input: &'m [u8]) -> Self {
        UnitCounter {
            input,
            byte: 0,
            units: 0,
        }
    }

    pub(crate) fn units_at(&mut self, byte: usize) -> usize {
        let byte = byte.min(self.input.len());
        if byte >= self.byte {
            self.units += count_units(&self.input[self.byte..byte]);
        } else {
            self.units -= count_units(&self.input[byte..self.byte]);
        }
        self.byte = byte;
        self.units
    }
}

/// Elements whose content is never text, tracked with their nesting level
#[derive(Debug, Default)]
pub(crate) struct IgnoredElements<'m> {
    current: Option<(&'m [u8], usize)>,
}

impl<'m> IgnoredElements<'m> {
    /// `true` while `token` belongs to an ignored element
    pub(crate) fn skip(&mut self, dialect: &Dialect, token: &Token<'m>) -> bool {
        let Some((name, level)) = self.current else {
            if let Token::Start(tag) = token {
                if !tag.self_closing && dialect.is_ignored(tag.name) {
                    self.current = Some((tag.local_name(), 1));
                    return true;
                }
            }
            return false;
        };

        match token {
            Token::Start(tag) if !tag.self_closing && tag.local_name().eq_ignore_ascii_case(name) => {
                self.current = Some((name, level + 1));
            }
            Token::End { name: end, .. } if local_name(end).eq_ignore_ascii_case(name) => {
                self.current = (level > 1).then_some((name, level - 1));
            }
            _ => {}
        }
        true
    }
}

struct PlainTextFilter<'d, 'm> {
    dialect: &'d Dialect,
    markup: &'m [u8],
    counter: UnitCounter<'m>,
    text: String,
    offsets: OffsetMapBuilder,
    /// Open elements with the block kinds they denote
    stack: Vec<(&'m [u8], Kinds)>,
    /// Number of open structural elements
    depth: usize,
    ignored: IgnoredElements<'m>,
    /// Markup offset of a separating space not yet emitted
    pending_space: Option<usize>,
    /// Set after de-hyphenation until the next character
    joined: bool,
}

impl<'d, 'm> PlainTextFilter<'d, 'm> {
    fn new(dialect: &'d Dialect, markup: &'m [u8]) -> Self {
        PlainTextFilter {
            dialect,
            markup,
            counter: UnitCounter::new(markup),
            text: String::new(),
            offsets: OffsetMapBuilder::new(),
            stack: Vec::new(),
            depth: 0,
            ignored: IgnoredElements::default(),
            pending_space: None,
            joined: false,
        }
    }

    fn token(&mut self, token: Token<'m>) {
        if self.ignored.skip(self.dialect, &token) {
            return;
        }
        match token {
            Token::Start(tag) => self.start(tag),
            Token::End { name, span } => self.end(name, span.start),
            Token::Text { raw, span } => {
                if self.depth > 0 && self.dialect.element_text {
                    decode_with_offsets(raw, |c, offset| self.push_char(c, span.start + offset));
                }
            }
            Token::Unterminated { .. } => {}
        }
    }

    fn start(&mut self, tag: Tag<'m>) {
        let kinds = self.dialect.classify(&tag);
        let pos = tag.span.start;

        if self.dialect.is_space(&tag) {
            self.separate(pos);
        }
        if !kinds.is_empty() {
            self.separate(pos);
        }

        if kinds.contains(BlockKind::Word) {
            if let WordText::Attribute(name) = (self.dialect.word_text)(&tag) {
                if let Some(attr) = tag.attribute(name) {
                    let span = tag.raw_value_span(attr);
                    let markup = self.markup;
                    decode_with_offsets(&markup[span.clone()], |c, offset| {
                        self.push_char(c, span.start + offset)
                    });
                }
            }
        }

        if tag.self_closing {
            if !kinds.is_empty() {
                self.separate(tag.span.end);
            }
            return;
        }
        if !kinds.is_empty() {
            self.depth += 1;
        }
        self.stack.push((tag.local_name(), kinds));
    }

    fn end(&mut self, name: &'m [u8], pos: usize) {
        let local = local_name(name);
        let Some(open) = self
            .stack
            .iter()
            .rposition(|(open, _)| open.eq_ignore_ascii_case(local))
        else {
            return;
        };

        while self.stack.len() > open {
            let Some((_, kinds)) = self.stack.pop() else {
                break;
            };
            if kinds.is_empty() {
                continue;
            }
            self.depth -= 1;
            if kinds.contains(BlockKind::Line) {
                self.end_line(pos);
            } else {
                self.separate(pos);
            }
        }
    }

    fn push_char(&mut self, c: char, byte: usize) {
        if c.is_whitespace() {
            self.separate(byte);
            return;
        }
        if c.is_control() {
            return;
        }

        if let Some(space) = self.pending_space.take() {
            self.text.push(' ');
            self.offsets.push(space);
        }
        self.joined = false;

        let units = self.counter.units_at(byte);
        self.text.push(c);
        for i in 0..c.len_utf16() {
            self.offsets.push(units + i);
        }
    }

    fn separate(&mut self, byte: usize) {
        if self.joined || self.text.is_empty() || self.pending_space.is_some() {
            return;
        }
        self.pending_space = Some(self.counter.units_at(byte));
    }

    fn end_line(&mut self, byte: usize) {
        let mut tail = self.text.chars().rev();
        let (last, before) = (tail.next(), tail.next());
        match (last, before) {
            (Some(hyphen), Some(letter)) if is_line_hyphen(hyphen, letter) => {
                self.text.pop();
                self.offsets.pop();
                self.pending_space = None;
                self.joined = true;
            }
            _ => self.separate(byte),
        }
    }

    fn finish(self) -> FilteredText {
        FilteredText {
            text: self.text,
            offsets: self.offsets.finish(),
        }
    }
}
