//! MiniOCR
//!
//! Compact format: `<p xml:id wh="w h">` pages, `<b>` blocks, `<l>` lines and
//! `<w x="x y w h">` words. Word coordinates are either integer pixels or
//! decimal page fractions (all four values at most 1).

use super::events::Tag;
use super::{Dialect, RawBox, WordText};
use crate::iter::Selector;
use crate::passage::BoundingBox;

const PAGE: &[Selector] = &[Selector::Tag("p")];
const BLOCK: &[Selector] = &[Selector::Tag("b")];
const LINE: &[Selector] = &[Selector::Tag("l")];
const WORD: &[Selector] = &[Selector::Tag("w")];

pub(super) static DIALECT: Dialect = Dialect {
    name: "miniocr",
    selectors: [PAGE, BLOCK, BLOCK, BLOCK, LINE, WORD],
    sniff,
    element_text: true,
    word_text: |_| WordText::Content,
    space_tags: &[],
    ignored_tags: &[],
    word_box,
    page_size,
};

pub fn sniff(sample: &str) -> bool {
    sample.contains("<ocr>") || (sample.contains("<w ") && sample.contains(" x="))
}

fn numbers<const N: usize>(value: &str) -> Option<[f32; N]> {
    let mut out = [0.0f32; N];
    let mut parts = value.split_whitespace();
    for slot in out.iter_mut() {
        *slot = parts.next()?.parse().ok()?;
    }
    Some(out)
}

fn word_box(tag: &Tag<'_>) -> Option<RawBox> {
    let value = tag.attribute_value("x")?;
    let [x, y, width, height] = numbers::<4>(value)?;
    let relative = value.contains('.') && [x, y, width, height].iter().all(|&v| v <= 1.0);
    Some(RawBox {
        rect: BoundingBox::new(x, y, width, height),
        relative,
    })
}

fn page_size(tag: &Tag<'_>) -> Option<(f32, f32)> {
    let [width, height] = numbers::<2>(tag.attribute_value("wh")?)?;
    Some((width, height))
}
