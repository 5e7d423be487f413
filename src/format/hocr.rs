//! hOCR
//!
//! HTML where structural units are marked by `class` tokens and geometry is
//! carried in `title` properties (`bbox x0 y0 x1 y1; x_wconf 93`).

use super::events::Tag;
use super::{Dialect, RawBox, WordText};
use crate::iter::Selector;

const PAGE: &[Selector] = &[Selector::Class("ocr_page")];
const BLOCK: &[Selector] = &[Selector::Class("ocr_carea"), Selector::Class("ocrx_block")];
const SECTION: &[Selector] = &[
    Selector::Class("ocr_chapter"),
    Selector::Class("ocr_section"),
    Selector::Class("ocr_subsection"),
    Selector::Class("ocr_subsubsection"),
];
const PARAGRAPH: &[Selector] = &[Selector::Class("ocr_par")];
const LINE: &[Selector] = &[Selector::Class("ocr_line"), Selector::Class("ocrx_line")];
const WORD: &[Selector] = &[Selector::Class("ocrx_word")];

pub(super) static DIALECT: Dialect = Dialect {
    name: "hocr",
    selectors: [PAGE, BLOCK, SECTION, PARAGRAPH, LINE, WORD],
    sniff,
    element_text: true,
    word_text: |_| WordText::Content,
    space_tags: &[],
    ignored_tags: &["head", "script", "style"],
    word_box,
    page_size,
};

/// Any of the structural class names occurs in the sample
pub fn sniff(sample: &str) -> bool {
    DIALECT
        .selectors
        .iter()
        .flat_map(|selectors| selectors.iter())
        .any(|selector| match selector {
            Selector::Class(name) | Selector::Tag(name) => sample.contains(name),
        })
}

/// The `bbox` property of a `title` attribute
fn bbox(tag: &Tag<'_>) -> Option<[f32; 4]> {
    let title = tag.attribute_value("title")?;
    let props = title
        .split(';')
        .map(str::trim)
        .find_map(|prop| prop.strip_prefix("bbox "))?;

    let mut coords = [0.0f32; 4];
    let mut values = props.split_whitespace();
    for coord in coords.iter_mut() {
        *coord = values.next()?.parse().ok()?;
    }
    Some(coords)
}

fn word_box(tag: &Tag<'_>) -> Option<RawBox> {
    let [x0, y0, x1, y1] = bbox(tag)?;
    Some(RawBox::absolute(x0, y0, x1 - x0, y1 - y0))
}

fn page_size(tag: &Tag<'_>) -> Option<(f32, f32)> {
    let [_, _, x1, y1] = bbox(tag)?;
    Some((x1, y1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::events::{MarkupReader, Token};
    use crate::passage::BoundingBox;

    fn tag(markup: &str) -> Tag<'_> {
        match MarkupReader::new(markup.as_bytes()).next() {
            Some(Token::Start(tag)) => tag,
            other => panic!("expected a start tag, got {other:?}"),
        }
    }

    #[test]
    fn test_sniff() {
        assert!(sniff("<span class='ocrx_word' title='bbox 1 2 3 4'>"));
        assert!(sniff("<div class=\"ocr_carea\">"));
        assert!(!sniff("<String CONTENT=\"x\"/>"));
    }

    #[test]
    fn test_word_box() {
        let word = tag("<span class='ocrx_word' title='bbox 100 200 150 230; x_wconf 96'>");
        assert_eq!(
            word_box(&word),
            Some(RawBox::absolute(100.0, 200.0, 50.0, 30.0))
        );
        assert_eq!(
            word_box(&word).and_then(|raw| raw.normalize(Some((1000.0, 1000.0)))),
            Some(BoundingBox::new(0.1, 0.2, 0.05, 0.03))
        );
    }

    #[test]
    fn test_page_size() {
        let page = tag("<div class='ocr_page' id='page_1' title='image \"p1.tif\"; bbox 0 0 2480 3508; ppageno 0'>");
        assert_eq!(page_size(&page), Some((2480.0, 3508.0)));
        assert_eq!(DIALECT.page_id(&page).as_deref(), Some("page_1"));
    }

    #[test]
    fn test_missing_or_broken_bbox() {
        assert_eq!(word_box(&tag("<span class='ocrx_word'>")), None);
        assert_eq!(word_box(&tag("<span title='bbox 1 2 x 4'>")), None);
        assert_eq!(word_box(&tag("<span title='bbox 1 2 3'>")), None);
    }
}
