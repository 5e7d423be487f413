//! OCR Formats
//!
//! The supported markup dialects form a closed set. Each variant of
//! [`OcrFormat`] is backed by a static [`Dialect`] table describing which
//! elements denote which structural unit, where word text and geometry live,
//! and how to recognize the dialect from a sample of raw markup.
//!
//! - hocr: HTML with `ocr_*` classes and `title="bbox ..."` geometry
//! - alto: ALTO XML with `CONTENT` attributes and `HPOS`/`VPOS` geometry
//! - mini: compact MiniOCR XML (`<p>`, `<b>`, `<l>`, `<w x="...">`)

pub mod alto;
pub mod events;
pub mod filter;
pub mod hocr;
pub mod mini;
pub mod offsets;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::HighlightOptions;
use crate::core::attributes::has_class_token;
use crate::error::{Error, Result};
use crate::iter::{BlockKind, ContextBreakLocator, Selector, SelectorBreakLocator};
use crate::passage::formatter::PassageFormatter;
use crate::passage::BoundingBox;
use crate::reader::LazyCharSequence;

use events::Tag;
pub use filter::FilteredText;
pub use offsets::OffsetMap;

/// Set of block kinds an element denotes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Kinds(u8);

impl Kinds {
    #[inline]
    pub fn contains(self, kind: BlockKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    #[inline]
    pub fn insert(&mut self, kind: BlockKind) {
        self.0 |= 1 << kind.index();
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Where the text of a word element comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordText {
    /// Character data inside the element
    Content,
    /// Value of the named attribute
    Attribute(&'static str),
    /// Contributes no text (second half of a hyphenated word)
    Skip,
}

/// Word geometry as found in the markup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub rect: BoundingBox,
    /// Already relative to the page
    pub relative: bool,
}

impl RawBox {
    pub fn absolute(x: f32, y: f32, width: f32, height: f32) -> Self {
        RawBox {
            rect: BoundingBox::new(x, y, width, height),
            relative: false,
        }
    }

    /// Box relative to the page, or `None` if that needs a page size that is
    /// unknown
    pub fn normalize(self, page_size: Option<(f32, f32)>) -> Option<BoundingBox> {
        if self.relative {
            return Some(self.rect);
        }
        match page_size {
            Some((width, height)) if width > 0.0 && height > 0.0 => {
                Some(self.rect.normalized(width, height))
            }
            _ => None,
        }
    }
}

/// Static description of one markup dialect
pub struct Dialect {
    pub name: &'static str,
    /// Selectors per block kind, indexed in [`BlockKind::ALL`] order
    pub selectors: [&'static [Selector]; 6],
    pub sniff: fn(&str) -> bool,
    /// Character data inside structural elements is text (false for ALTO,
    /// where all text lives in attributes)
    pub element_text: bool,
    pub word_text: fn(&Tag<'_>) -> WordText,
    /// Elements standing for an explicit space between words
    pub space_tags: &'static [&'static str],
    /// Elements whose content is never text (HTML head, scripts)
    pub ignored_tags: &'static [&'static str],
    pub word_box: fn(&Tag<'_>) -> Option<RawBox>,
    pub page_size: fn(&Tag<'_>) -> Option<(f32, f32)>,
}

impl Dialect {
    #[inline]
    pub fn selectors(&self, kind: BlockKind) -> &'static [Selector] {
        self.selectors[kind.index()]
    }

    /// Block kinds the element opened by `tag` denotes
    pub fn classify(&self, tag: &Tag<'_>) -> Kinds {
        let class = tag.attribute("class").map(|a| a.value.as_ref());
        let mut kinds = Kinds::default();
        for kind in BlockKind::ALL {
            let matched = self.selectors(kind).iter().any(|selector| match selector {
                Selector::Tag(name) => tag.is(name),
                Selector::Class(token) => {
                    class.is_some_and(|list| has_class_token(list, token.as_bytes()))
                }
            });
            if matched {
                kinds.insert(kind);
            }
        }
        kinds
    }

    pub fn is_space(&self, tag: &Tag<'_>) -> bool {
        self.space_tags.iter().any(|name| tag.is(name))
    }

    pub fn is_ignored(&self, name: &[u8]) -> bool {
        let local = crate::core::attributes::local_name(name);
        self.ignored_tags
            .iter()
            .any(|ignored| local.eq_ignore_ascii_case(ignored.as_bytes()))
    }

    /// Identifier of a page element
    pub fn page_id(&self, tag: &Tag<'_>) -> Option<String> {
        tag.attribute_value("id").map(str::to_string)
    }
}

/// Supported OCR markup dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrFormat {
    Hocr,
    Alto,
    #[serde(rename = "miniocr", alias = "mini")]
    MiniOcr,
}

impl OcrFormat {
    /// Detection order
    pub const ALL: [OcrFormat; 3] = [OcrFormat::Hocr, OcrFormat::Alto, OcrFormat::MiniOcr];

    pub fn dialect(self) -> &'static Dialect {
        match self {
            OcrFormat::Hocr => &hocr::DIALECT,
            OcrFormat::Alto => &alto::DIALECT,
            OcrFormat::MiniOcr => &mini::DIALECT,
        }
    }

    pub fn name(self) -> &'static str {
        self.dialect().name
    }

    pub fn from_name(name: &str) -> Result<OcrFormat> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("mini") {
            return Ok(OcrFormat::MiniOcr);
        }
        OcrFormat::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownFormat(name.to_string()))
    }

    pub fn selectors(self, kind: BlockKind) -> &'static [Selector] {
        self.dialect().selectors(kind)
    }

    /// Whether a chunk of raw markup looks like this dialect
    pub fn has_format(self, sample: &str) -> bool {
        (self.dialect().sniff)(sample)
    }

    /// Locator for `context_size` units of `break_kind` around an offset,
    /// never crossing a `limit_kind` boundary
    pub fn break_locator<'a>(
        self,
        text: &'a LazyCharSequence,
        break_kind: BlockKind,
        limit_kind: Option<BlockKind>,
        context_size: usize,
    ) -> ContextBreakLocator<SelectorBreakLocator<'a>> {
        let base = SelectorBreakLocator::new(text, self.selectors(break_kind));
        let limit = limit_kind.map(|kind| SelectorBreakLocator::new(text, self.selectors(kind)));
        ContextBreakLocator::new(base, limit, context_size)
    }

    /// Plain text for indexing, with the offset map back into `markup`
    pub fn filter(self, markup: &[u8]) -> FilteredText {
        filter::filter_markup(self.dialect(), markup)
    }

    pub fn passage_formatter(self, opts: &HighlightOptions) -> PassageFormatter {
        PassageFormatter::new(self, opts)
    }
}

impl fmt::Display for OcrFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OcrFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OcrFormat::from_name(s)
    }
}

/// Bytes inspected when a document's format has to be detected
const SNIFF_LEN: usize = 8 * 1024;

/// Read-only set of enabled formats, built once and shared by reference
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<OcrFormat>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        FormatRegistry {
            formats: OcrFormat::ALL.to_vec(),
        }
    }

    /// Registry restricted to `formats`, detected in the given order
    pub fn with_formats(formats: impl IntoIterator<Item = OcrFormat>) -> Self {
        let mut enabled: Vec<OcrFormat> = Vec::new();
        for format in formats {
            if !enabled.contains(&format) {
                enabled.push(format);
            }
        }
        FormatRegistry { formats: enabled }
    }

    pub fn formats(&self) -> &[OcrFormat] {
        &self.formats
    }

    /// First enabled format whose sniffer accepts `sample`
    pub fn detect(&self, sample: &str) -> Option<OcrFormat> {
        self.formats.iter().copied().find(|format| format.has_format(sample))
    }

    /// Detect the format from the head of a document
    pub fn detect_source(&self, text: &LazyCharSequence) -> Result<OcrFormat> {
        let sample = text.read_bytes(0..text.byte_len().min(SNIFF_LEN))?;
        self.detect(&String::from_utf8_lossy(&sample))
            .ok_or_else(|| Error::UnknownFormat(text.source_id().to_string()))
    }

    /// Enabled format by name
    pub fn get(&self, name: &str) -> Result<OcrFormat> {
        let format = OcrFormat::from_name(name)?;
        if self.formats.contains(&format) {
            Ok(format)
        } else {
            Err(Error::UnknownFormat(name.to_string()))
        }
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}
