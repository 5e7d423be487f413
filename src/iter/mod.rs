//! Structural Break Location
//!
//! Locators find the boundaries of structural units (pages, blocks, lines,
//! words, ...) in OCR markup by scanning a [`LazyCharSequence`] for the
//! opening tags of matching elements. All offsets are UTF-16 char indices into
//! the markup.

pub mod context;
pub mod selector;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::reader::LazyCharSequence;

pub use context::ContextBreakLocator;
pub use selector::{Selector, SelectorBreakLocator};

/// Structural unit kinds, ordered coarsest to finest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Page,
    Block,
    Section,
    Paragraph,
    Line,
    Word,
}

impl BlockKind {
    pub const ALL: [BlockKind; 6] = [
        BlockKind::Page,
        BlockKind::Block,
        BlockKind::Section,
        BlockKind::Paragraph,
        BlockKind::Line,
        BlockKind::Word,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Page => "page",
            BlockKind::Block => "block",
            BlockKind::Section => "section",
            BlockKind::Paragraph => "paragraph",
            BlockKind::Line => "line",
            BlockKind::Word => "word",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<BlockKind> {
        BlockKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Cursor over the boundaries of one kind of structural unit.
///
/// Both directions are strict, so applying a locator to its own result always
/// makes progress.
pub trait BreakLocator {
    /// First boundary strictly after `offset`, or the end of the text
    fn following(&self, offset: usize) -> Result<usize>;

    /// Last boundary strictly before `offset`, or the start of the text
    fn preceding(&self, offset: usize) -> Result<usize>;

    fn text(&self) -> &LazyCharSequence;
}

impl<T: BreakLocator + ?Sized> BreakLocator for Box<T> {
    fn following(&self, offset: usize) -> Result<usize> {
        (**self).following(offset)
    }

    fn preceding(&self, offset: usize) -> Result<usize> {
        (**self).preceding(offset)
    }

    fn text(&self) -> &LazyCharSequence {
        (**self).text()
    }
}
