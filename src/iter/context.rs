//! Context Break Locator
//!
//! Wraps a base locator to step over `context_size` additional units, never
//! crossing the boundary of an optional enclosing limit locator. A step that
//! reaches the limit returns the limit itself.

use tracing::trace;

use super::BreakLocator;
use crate::error::Result;
use crate::reader::LazyCharSequence;

pub struct ContextBreakLocator<B, L = B> {
    base: B,
    limit: Option<L>,
    context_size: usize,
}

impl<B: BreakLocator, L: BreakLocator> ContextBreakLocator<B, L> {
    pub fn new(base: B, limit: Option<L>, context_size: usize) -> Self {
        ContextBreakLocator {
            base,
            limit,
            context_size,
        }
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }
}

impl<B: BreakLocator, L: BreakLocator> BreakLocator for ContextBreakLocator<B, L> {
    fn following(&self, offset: usize) -> Result<usize> {
        let limit = match &self.limit {
            Some(locator) => locator.following(offset)?,
            None => self.text().end_index()?,
        };

        let mut idx = self.base.following(offset)?;
        if idx >= limit {
            return Ok(limit);
        }
        for _ in 0..self.context_size {
            let next = self.base.following(idx)?;
            if next >= limit {
                trace!(offset, limit, "context clamped at limit");
                return Ok(limit);
            }
            idx = next;
        }
        Ok(idx)
    }

    fn preceding(&self, offset: usize) -> Result<usize> {
        let limit = match &self.limit {
            Some(locator) => locator.preceding(offset)?,
            None => self.text().begin_index(),
        };

        let mut idx = self.base.preceding(offset)?;
        if idx <= limit {
            return Ok(limit);
        }
        for _ in 0..self.context_size {
            let next = self.base.preceding(idx)?;
            if next <= limit {
                trace!(offset, limit, "context clamped at limit");
                return Ok(limit);
            }
            idx = next;
        }
        Ok(idx)
    }

    fn text(&self) -> &LazyCharSequence {
        self.base.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OcrFormat;
    use crate::iter::{BlockKind, Selector, SelectorBreakLocator};

    const LINE: [Selector; 1] = [Selector::Tag("l")];
    const PARAGRAPH: [Selector; 1] = [Selector::Tag("b")];

    fn mini(paragraphs: &[&[&str]]) -> String {
        let mut doc = String::from("<ocr><p wh=\"1000 1000\">");
        let mut y = 10;
        for lines in paragraphs {
            doc.push_str("<b>");
            for line in *lines {
                doc.push_str("<l>");
                for (i, word) in line.split(' ').enumerate() {
                    doc.push_str(&format!(
                        "<w x=\"{} {} 50 20\">{}</w> ",
                        10 + i * 60,
                        y,
                        word
                    ));
                }
                doc.push_str("</l>");
                y += 30;
            }
            doc.push_str("</b>");
        }
        doc.push_str("</p></ocr>");
        doc
    }

    fn char_pos(text: &str, needle: &str, nth: usize) -> usize {
        let byte = text.match_indices(needle).nth(nth).unwrap().0;
        text[..byte].encode_utf16().count()
    }

    #[test]
    fn test_window_spans_shared_paragraph() {
        let doc = mini(&[&["eins zwei", "drei vier", "fünf Treffer", "sieben acht"]]);
        let text = LazyCharSequence::from_bytes("mini", doc.as_bytes().to_vec());
        let locator = ContextBreakLocator::new(
            SelectorBreakLocator::new(&text, &LINE),
            Some(SelectorBreakLocator::new(&text, &PARAGRAPH)),
            2,
        );

        let hit = char_pos(&doc, "Treffer", 0);
        let start = locator.preceding(hit).unwrap();
        let end = locator.following(hit + 7).unwrap();

        assert_eq!(start, char_pos(&doc, "<l>", 0));
        assert_eq!(end, text.end_index().unwrap());
        let window = text.sub_sequence(start, end).unwrap();
        for word in ["eins", "drei", "Treffer", "acht"] {
            assert!(window.contains(word), "{word} missing from {window}");
        }
    }

    #[test]
    fn test_window_stops_at_paragraph_boundary() {
        let doc = mini(&[&["eins zwei", "drei vier"], &["fünf Treffer", "sieben acht"]]);
        let text = LazyCharSequence::from_bytes("mini", doc.as_bytes().to_vec());
        let locator = ContextBreakLocator::new(
            SelectorBreakLocator::new(&text, &LINE),
            Some(SelectorBreakLocator::new(&text, &PARAGRAPH)),
            2,
        );

        let hit = char_pos(&doc, "Treffer", 0);
        let start = locator.preceding(hit).unwrap();
        let end = locator.following(hit + 7).unwrap();

        assert_eq!(start, char_pos(&doc, "<b>", 1));
        assert_eq!(end, text.end_index().unwrap());
        let window = text.sub_sequence(start, end).unwrap();
        assert!(!window.contains("drei"));
        assert!(window.contains("acht"));
    }

    #[test]
    fn test_advances_k_plus_one_boundaries() {
        let lines = ["a", "b", "c", "d", "e", "f"];
        let doc = mini(&[&lines]);
        let text = LazyCharSequence::from_bytes("mini", doc.as_bytes().to_vec());

        for k in 0..4 {
            let locator = ContextBreakLocator::<_, SelectorBreakLocator>::new(
                SelectorBreakLocator::new(&text, &LINE),
                None,
                k,
            );
            assert_eq!(locator.following(0).unwrap(), char_pos(&doc, "<l>", k));
            let end = text.end_index().unwrap();
            assert_eq!(locator.preceding(end).unwrap(), char_pos(&doc, "<l>", 5 - k));
        }
    }

    #[test]
    fn test_clamps_to_limit() {
        let doc = mini(&[&["a", "b"], &["c", "d", "e"]]);
        let text = LazyCharSequence::from_bytes("mini", doc.as_bytes().to_vec());
        let locator = ContextBreakLocator::new(
            SelectorBreakLocator::new(&text, &LINE),
            Some(SelectorBreakLocator::new(&text, &PARAGRAPH)),
            3,
        );

        // Starting in line "a", the second paragraph opens before three more lines
        let in_a = char_pos(&doc, ">a<", 0);
        let limit = char_pos(&doc, "<b>", 1);
        assert_eq!(locator.following(in_a).unwrap(), limit);
    }

    /// Paragraphs of single-word lines, each line opened by `line`, each
    /// paragraph by `paragraph`
    fn layout(
        head: &str,
        paragraph: (&str, &str),
        line: (&str, &str),
        tail: &str,
        words: &[&[&str]],
    ) -> String {
        let mut doc = head.to_string();
        for lines in words {
            doc.push_str(paragraph.0);
            for word in *lines {
                doc.push_str(line.0);
                doc.push_str(word);
                doc.push_str(line.1);
            }
            doc.push_str(paragraph.1);
        }
        doc.push_str(tail);
        doc
    }

    const WORDS: &[&[&str]] = &[&["a1", "a2"], &["b1", "b2", "b3", "b4", "b5"], &["c1"]];

    /// Two lines of context before and after the match, inside its paragraph
    fn assert_dialect_window(format: OcrFormat, doc: &str, line: &str, paragraph: &str) {
        let text = LazyCharSequence::from_bytes(format.name(), doc.as_bytes().to_vec());
        let locator = format.break_locator(&text, BlockKind::Line, Some(BlockKind::Paragraph), 2);

        let hit = char_pos(doc, "b3", 0);
        assert_eq!(locator.preceding(hit).unwrap(), char_pos(doc, line, 2), "{format}");
        assert_eq!(
            locator.following(hit + 2).unwrap(),
            char_pos(doc, paragraph, 2),
            "{format}"
        );
    }

    #[test]
    fn test_hocr_window() {
        let doc = layout(
            "<html><body><div class='ocr_page' title='bbox 0 0 100 100'>",
            ("<p class='ocr_par'>", "</p>"),
            (
                "<span class=\"ocr_line\" title='bbox 0 0 10 10'><span class='ocrx_word'>",
                "</span></span>",
            ),
            "</div></body></html>",
            WORDS,
        );
        assert_dialect_window(OcrFormat::Hocr, &doc, "<span class=\"ocr_line", "<p class='ocr_par'");
    }

    #[test]
    fn test_alto_window() {
        let doc = layout(
            "<alto><Layout><Page WIDTH=\"100\" HEIGHT=\"100\"><PrintSpace>",
            ("<TextBlock>", "</TextBlock>"),
            ("<TextLine><String CONTENT=\"", "\"/></TextLine>"),
            "</PrintSpace></Page></Layout></alto>",
            WORDS,
        );
        assert_dialect_window(OcrFormat::Alto, &doc, "<TextLine>", "<TextBlock>");
    }

    #[test]
    fn test_namespaced_alto_window() {
        let doc = layout(
            "<alto:alto xmlns:alto=\"http://www.loc.gov/standards/alto/ns-v4#\">\
             <alto:Layout><alto:Page WIDTH=\"100\" HEIGHT=\"100\">",
            ("<alto:TextBlock>", "</alto:TextBlock>"),
            ("<alto:TextLine><alto:String CONTENT=\"", "\"/></alto:TextLine>"),
            "</alto:Page></alto:Layout></alto:alto>",
            WORDS,
        );
        assert_dialect_window(OcrFormat::Alto, &doc, "<alto:TextLine>", "<alto:TextBlock>");
    }

    #[test]
    fn test_mini_window() {
        let doc = layout(
            "<ocr><p wh=\"100 100\">",
            ("<b>", "</b>"),
            ("<l><w x=\"1 1 1 1\">", "</w></l>"),
            "</p></ocr>",
            WORDS,
        );
        assert_dialect_window(OcrFormat::MiniOcr, &doc, "<l>", "<b>");
    }

    #[test]
    fn test_boundary_on_limit_is_inclusive() {
        let doc = mini(&[&["a"], &["b"]]);
        let text = LazyCharSequence::from_bytes("mini", doc.as_bytes().to_vec());
        let boundaries: [Selector; 2] = [Selector::Tag("l"), Selector::Tag("b")];
        let locator = ContextBreakLocator::new(
            SelectorBreakLocator::new(&text, &boundaries),
            Some(SelectorBreakLocator::new(&text, &PARAGRAPH)),
            0,
        );

        // The first base boundary after "a" is the next paragraph itself
        let in_a = char_pos(&doc, ">a<", 0);
        assert_eq!(locator.following(in_a).unwrap(), char_pos(&doc, "<b>", 1));
    }
}
