//! ALTO
//!
//! ALTO XML keeps word text in the `CONTENT` attribute of `<String>` elements
//! and geometry in `HPOS`/`VPOS`/`WIDTH`/`HEIGHT`. Words hyphenated across
//! lines carry `SUBS_TYPE="HypPart1"`/`"HypPart2"` with the full word in
//! `SUBS_CONTENT`.

use super::events::Tag;
use super::{Dialect, RawBox, WordText};
use crate::iter::Selector;

const PAGE: &[Selector] = &[Selector::Tag("Page")];
const BLOCK: &[Selector] = &[Selector::Tag("TextBlock")];
const SECTION: &[Selector] = &[Selector::Tag("ComposedBlock")];
const PARAGRAPH: &[Selector] = &[Selector::Tag("TextBlock")];
const LINE: &[Selector] = &[Selector::Tag("TextLine")];
const WORD: &[Selector] = &[Selector::Tag("String")];

pub(super) static DIALECT: Dialect = Dialect {
    name: "alto",
    selectors: [PAGE, BLOCK, SECTION, PARAGRAPH, LINE, WORD],
    sniff,
    element_text: false,
    word_text,
    space_tags: &["SP"],
    ignored_tags: &[],
    word_box,
    page_size,
};

pub fn sniff(sample: &str) -> bool {
    sample.contains("<alto") || (sample.contains("<String") && sample.contains("CONTENT="))
}

fn word_text(tag: &Tag<'_>) -> WordText {
    match tag.attribute_value("SUBS_TYPE") {
        Some("HypPart1") if tag.attribute("SUBS_CONTENT").is_some() => {
            WordText::Attribute("SUBS_CONTENT")
        }
        Some("HypPart2") if tag.attribute("SUBS_CONTENT").is_some() => WordText::Skip,
        _ => WordText::Attribute("CONTENT"),
    }
}

fn number(tag: &Tag<'_>, name: &str) -> Option<f32> {
    tag.attribute_value(name)?.trim().parse().ok()
}

fn word_box(tag: &Tag<'_>) -> Option<RawBox> {
    Some(RawBox::absolute(
        number(tag, "HPOS")?,
        number(tag, "VPOS")?,
        number(tag, "WIDTH")?,
        number(tag, "HEIGHT")?,
    ))
}

fn page_size(tag: &Tag<'_>) -> Option<(f32, f32)> {
    Some((number(tag, "WIDTH")?, number(tag, "HEIGHT")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::events::{MarkupReader, Token};

    fn tag(markup: &str) -> Tag<'_> {
        match MarkupReader::new(markup.as_bytes()).next() {
            Some(Token::Start(tag)) => tag,
            other => panic!("expected a start tag, got {other:?}"),
        }
    }

    #[test]
    fn test_sniff() {
        assert!(sniff("<?xml version=\"1.0\"?><alto xmlns=\"x\">"));
        assert!(sniff("<TextLine><String ID=\"s1\" CONTENT=\"Wort\"/>"));
        assert!(!sniff("<span class='ocrx_word'>String</span>"));
    }

    #[test]
    fn test_word_box() {
        let word = tag("<String ID=\"s1\" HPOS=\"10\" VPOS=\"20.5\" WIDTH=\"30\" HEIGHT=\"12\" CONTENT=\"Wort\"/>");
        assert_eq!(word_box(&word), Some(RawBox::absolute(10.0, 20.5, 30.0, 12.0)));
        assert_eq!(word_box(&tag("<String HPOS=\"10\" CONTENT=\"x\"/>")), None);
    }

    #[test]
    fn test_page_size() {
        let page = tag("<Page ID=\"p7\" WIDTH=\"2000\" HEIGHT=\"3000\" PHYSICAL_IMG_NR=\"7\">");
        assert_eq!(page_size(&page), Some((2000.0, 3000.0)));
        assert_eq!(DIALECT.page_id(&page).as_deref(), Some("p7"));
    }

    #[test]
    fn test_hyphenated_word_text() {
        let first = tag("<String CONTENT=\"Zei\" SUBS_TYPE=\"HypPart1\" SUBS_CONTENT=\"Zeitung\"/>");
        let second = tag("<String CONTENT=\"tung\" SUBS_TYPE=\"HypPart2\" SUBS_CONTENT=\"Zeitung\"/>");
        let plain = tag("<String CONTENT=\"Wort\"/>");
        assert_eq!(word_text(&first), WordText::Attribute("SUBS_CONTENT"));
        assert_eq!(word_text(&second), WordText::Skip);
        assert_eq!(word_text(&plain), WordText::Attribute("CONTENT"));
    }
}
