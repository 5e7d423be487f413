//! Selector Break Locator
//!
//! A boundary is the `<` of an opening tag matched by one of the locator's
//! selectors. Tag selectors look for `<name` or a namespaced `<prefix:name`
//! followed by whitespace, `>` or `/`, comparing names case-sensitively as
//! XML does; class selectors look for a whole token inside a `class`
//! attribute value and walk back to the tag start.

use memchr::{memchr, memmem, memrchr};

use super::BreakLocator;
use crate::core::scanner::{is_name_char, is_name_start_char, is_whitespace};
use crate::error::Result;
use crate::reader::LazyCharSequence;

/// Longest opening tag a class token is searched back through
const MAX_TAG_LEN: usize = 4096;
/// Longest namespace prefix of an element name
const MAX_PREFIX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Element name
    Tag(&'static str),
    /// Token of the `class` attribute
    Class(&'static str),
}

/// How a needle occurrence relates to the start of its tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// The needle starts with the tag's `<`
    TagStart,
    /// The needle starts at the `:` after a namespace prefix
    Prefixed,
    /// The needle is a class token inside the tag
    ClassToken,
}

impl Anchor {
    /// How far past the needle the tag start may lie before it
    fn reach(self) -> usize {
        match self {
            Anchor::TagStart => 0,
            Anchor::Prefixed => MAX_PREFIX_LEN,
            Anchor::ClassToken => MAX_TAG_LEN,
        }
    }
}

impl Selector {
    fn needles(&self) -> Vec<(Vec<u8>, Anchor)> {
        match self {
            Selector::Tag(name) => [b'<', b':']
                .into_iter()
                .zip([Anchor::TagStart, Anchor::Prefixed])
                .map(|(lead, anchor)| {
                    let mut needle = Vec::with_capacity(name.len() + 1);
                    needle.push(lead);
                    needle.extend_from_slice(name.as_bytes());
                    (needle, anchor)
                })
                .collect(),
            Selector::Class(name) => vec![(name.as_bytes().to_vec(), Anchor::ClassToken)],
        }
    }
}

/// Break locator matching any of a set of selectors
pub struct SelectorBreakLocator<'a> {
    text: &'a LazyCharSequence,
    selectors: &'a [Selector],
}

impl<'a> SelectorBreakLocator<'a> {
    pub fn new(text: &'a LazyCharSequence, selectors: &'a [Selector]) -> Self {
        SelectorBreakLocator { text, selectors }
    }

    pub fn selectors(&self) -> &[Selector] {
        self.selectors
    }

    /// Byte offset of the first boundary in `[from, until)`
    fn next_boundary(&self, selector: Selector, from: usize, until: usize) -> Result<Option<usize>> {
        let mut best: Option<usize> = None;
        for (needle, anchor) in selector.needles() {
            let until = best.unwrap_or(until);
            let mut pos = from;
            while let Some(found) = self.text.find_forward_until(&needle, pos, until)? {
                if let Some(start) = self.tag_start(anchor, found, needle.len())? {
                    if start >= from {
                        best = Some(start);
                        break;
                    }
                }
                pos = found + 1;
            }
        }
        Ok(best)
    }

    /// Byte offset of the last boundary in `[after, before)`
    fn prev_boundary(&self, selector: Selector, before: usize, after: usize) -> Result<Option<usize>> {
        let mut best: Option<usize> = None;
        for (needle, anchor) in selector.needles() {
            let floor = best.map_or(after, |b| b + 1);
            // The needle of a tag starting before `before` may itself lie
            // after it
            let mut end = (before + anchor.reach()).min(self.text.byte_len());
            while let Some(found) = self.text.find_backward_until(&needle, end, floor)? {
                if let Some(start) = self.tag_start(anchor, found, needle.len())? {
                    if start < before {
                        if start >= floor {
                            best = Some(start);
                        }
                        break;
                    }
                }
                end = found;
            }
        }
        Ok(best)
    }

    /// Start of the opening tag the needle at `pos` belongs to, if any
    fn tag_start(&self, anchor: Anchor, pos: usize, needle_len: usize) -> Result<Option<usize>> {
        match anchor {
            Anchor::TagStart => Ok(self.is_name_end(pos + needle_len)?.then_some(pos)),
            Anchor::Prefixed if self.is_name_end(pos + needle_len)? => self.prefixed_tag_start(pos),
            Anchor::Prefixed => Ok(None),
            Anchor::ClassToken => self.class_tag_start(pos, needle_len),
        }
    }

    fn is_name_end(&self, pos: usize) -> Result<bool> {
        Ok(match self.text.byte_at(pos)? {
            Some(b) => is_whitespace(b) || b == b'>' || b == b'/',
            None => false,
        })
    }

    /// Start of a `<prefix:name` tag whose `:` is at `colon`
    fn prefixed_tag_start(&self, colon: usize) -> Result<Option<usize>> {
        let window_start = colon.saturating_sub(MAX_PREFIX_LEN + 1);
        let window = self.text.read_bytes(window_start..colon)?;
        let Some(lt) = memrchr(b'<', &window) else {
            return Ok(None);
        };
        let prefix = &window[lt + 1..];
        let valid = prefix.first().is_some_and(|&b| is_name_start_char(b) && b != b':')
            && prefix.iter().all(|&b| is_name_char(b) && b != b':');
        Ok(valid.then_some(window_start + lt))
    }

    /// Start of the opening tag whose `class` attribute holds the token at
    /// `pos`, if it is one
    fn class_tag_start(&self, pos: usize, token_len: usize) -> Result<Option<usize>> {
        let is_delim = |b: u8| b == b'"' || b == b'\'' || is_whitespace(b);
        let text_len = self.text.byte_len();
        if pos == 0 || pos + token_len >= text_len {
            return Ok(None);
        }
        let around = self.text.read_bytes(pos - 1..pos + token_len + 1)?;
        if !is_delim(around[0]) || !is_delim(around[token_len + 1]) {
            return Ok(None);
        }

        let window_start = pos.saturating_sub(MAX_TAG_LEN);
        let window = self.text.read_bytes(window_start..pos)?;
        let Some(lt) = memrchr(b'<', &window) else {
            return Ok(None);
        };
        let inside = &window[lt + 1..];
        if inside.first() == Some(&b'/') || memchr(b'>', inside).is_some() {
            return Ok(None);
        }

        let attr = match memmem::rfind(inside, b"class=") {
            Some(attr) if attr > 0 && is_whitespace(inside[attr - 1]) => attr,
            _ => return Ok(None),
        };
        let value = &inside[attr + 6..];
        match value.first() {
            Some(&q) if (q == b'"' || q == b'\'') && memchr(q, &value[1..]).is_none() => {
                Ok(Some(window_start + lt))
            }
            _ => Ok(None),
        }
    }
}

impl BreakLocator for SelectorBreakLocator<'_> {
    fn following(&self, offset: usize) -> Result<usize> {
        let end = self.text.end_index()?;
        if offset >= end {
            return Ok(end);
        }

        let from = self.text.byte_offset(offset)? + 1;
        let mut best: Option<usize> = None;
        for &selector in self.selectors {
            let until = best.unwrap_or(self.text.byte_len());
            if let Some(found) = self.next_boundary(selector, from, until)? {
                best = Some(found);
            }
        }

        match best {
            Some(byte_pos) => self.text.char_offset(byte_pos),
            None => Ok(end),
        }
    }

    fn preceding(&self, offset: usize) -> Result<usize> {
        if offset == 0 {
            return Ok(0);
        }
        let end = self.text.end_index()?;
        let before = self.text.byte_offset(offset.min(end))?;

        let mut best: Option<usize> = None;
        for &selector in self.selectors {
            let after = best.map_or(0, |b| b + 1);
            if let Some(found) = self.prev_boundary(selector, before, after)? {
                best = Some(found);
            }
        }

        match best {
            Some(byte_pos) => self.text.char_offset(byte_pos),
            None => Ok(self.text.begin_index()),
        }
    }

    fn text(&self) -> &LazyCharSequence {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINI: &str = "<ocr><p xml:id=\"p1\" wh=\"100 200\"><b><l><w x=\"1 1 9 9\">Über</w> \
                        <w x=\"11 1 9 9\">die</w></l><l><w x=\"1 11 9 9\">Welt</w></l></b></p></ocr>";

    const HOCR: &str = "<div class='ocr_page' title='bbox 0 0 100 100'>\
                        <span class='ocr_line' id='l1'><span class='ocrx_word'>a</span></span>\
                        <span class=\"ocrx_line other\">b</span>\
                        <span data-class='ocr_line'>c</span>\
                        <span class='ocr_linex'>d</span></div>";

    fn seq(text: &str) -> LazyCharSequence {
        LazyCharSequence::from_bytes("test", text.as_bytes().to_vec())
    }

    fn char_pos(text: &str, needle: &str, nth: usize) -> usize {
        let byte = text.match_indices(needle).nth(nth).unwrap().0;
        text[..byte].encode_utf16().count()
    }

    #[test]
    fn test_tag_following() {
        let text = seq(MINI);
        let selectors = [Selector::Tag("l")];
        let locator = SelectorBreakLocator::new(&text, &selectors);

        let first = char_pos(MINI, "<l>", 0);
        let second = char_pos(MINI, "<l>", 1);
        assert_eq!(locator.following(0).unwrap(), first);
        // Strict: a boundary at the offset itself is skipped
        assert_eq!(locator.following(first).unwrap(), second);
        assert_eq!(locator.following(second).unwrap(), text.end_index().unwrap());
    }

    #[test]
    fn test_tag_preceding() {
        let text = seq(MINI);
        let selectors = [Selector::Tag("l")];
        let locator = SelectorBreakLocator::new(&text, &selectors);

        let first = char_pos(MINI, "<l>", 0);
        let second = char_pos(MINI, "<l>", 1);
        let end = text.end_index().unwrap();
        assert_eq!(locator.preceding(end).unwrap(), second);
        assert_eq!(locator.preceding(second).unwrap(), first);
        assert_eq!(locator.preceding(first).unwrap(), 0);
        assert_eq!(locator.preceding(0).unwrap(), 0);
    }

    #[test]
    fn test_tag_requires_name_end() {
        // `<w` must not match `<wx` but does match `<w>` and `<w/>`
        let text = seq("<wx></wx><w/><w>a</w>");
        let selectors = [Selector::Tag("w")];
        let locator = SelectorBreakLocator::new(&text, &selectors);
        assert_eq!(locator.following(0).unwrap(), 9);
        assert_eq!(locator.following(9).unwrap(), 13);
    }

    #[test]
    fn test_multiple_selectors_take_nearest() {
        let text = seq(MINI);
        let selectors = [Selector::Tag("l"), Selector::Tag("b")];
        let locator = SelectorBreakLocator::new(&text, &selectors);
        assert_eq!(locator.following(0).unwrap(), char_pos(MINI, "<b>", 0));
        let first_line = char_pos(MINI, "<l>", 0);
        assert_eq!(locator.preceding(first_line + 1).unwrap(), first_line);
    }

    #[test]
    fn test_class_tokens() {
        let text = seq(HOCR);
        let selectors = [Selector::Class("ocr_line"), Selector::Class("ocrx_line")];
        let locator = SelectorBreakLocator::new(&text, &selectors);

        let l1 = char_pos(HOCR, "<span class='ocr_line'", 0);
        let l2 = char_pos(HOCR, "<span class=\"ocrx_line", 0);
        assert_eq!(locator.following(0).unwrap(), l1);
        assert_eq!(locator.following(l1).unwrap(), l2);
        // data-class attributes and longer tokens do not count
        assert_eq!(locator.following(l2).unwrap(), text.end_index().unwrap());

        let end = text.end_index().unwrap();
        assert_eq!(locator.preceding(end).unwrap(), l2);
        assert_eq!(locator.preceding(l2).unwrap(), l1);
        assert_eq!(locator.preceding(l1).unwrap(), 0);
    }

    #[test]
    fn test_class_preceding_from_inside_tag() {
        let text = seq(HOCR);
        let selectors = [Selector::Class("ocr_line")];
        let locator = SelectorBreakLocator::new(&text, &selectors);
        let l1 = char_pos(HOCR, "<span class='ocr_line'", 0);
        // Offset points into the tag, before the class token
        assert_eq!(locator.preceding(l1 + 3).unwrap(), l1);
    }

    #[test]
    fn test_namespaced_tags() {
        let doc = "<alto:TextBlock><alto:TextLine><alto:String CONTENT=\"a\"/></alto:TextLine>\
                   <TextLine><String CONTENT=\"b\"/></TextLine>\
                   <x:y:TextLine/><a:TextLines/><alto:TextLine ID=\"l3\"/></alto:TextBlock>";
        let text = seq(doc);
        let selectors = [Selector::Tag("TextLine")];
        let locator = SelectorBreakLocator::new(&text, &selectors);

        let l1 = char_pos(doc, "<alto:TextLine>", 0);
        let l2 = char_pos(doc, "<TextLine>", 0);
        let l3 = char_pos(doc, "<alto:TextLine ID", 0);
        assert_eq!(locator.following(0).unwrap(), l1);
        assert_eq!(locator.following(l1).unwrap(), l2);
        // Closing tags, doubled prefixes and longer names do not count
        assert_eq!(locator.following(l2).unwrap(), l3);

        let end = text.end_index().unwrap();
        assert_eq!(locator.preceding(end).unwrap(), l3);
        assert_eq!(locator.preceding(l3).unwrap(), l2);
        assert_eq!(locator.preceding(l2).unwrap(), l1);
        // From inside the prefix of the tag itself
        assert_eq!(locator.preceding(l1 + 3).unwrap(), l1);
        assert_eq!(locator.preceding(l1).unwrap(), 0);
    }

    #[test]
    fn test_multibyte_offsets() {
        let doc = "<l>Ääh 😀</l><l>ok</l>";
        let text = seq(doc);
        let selectors = [Selector::Tag("l")];
        let locator = SelectorBreakLocator::new(&text, &selectors);
        let second = char_pos(doc, "<l>", 1);
        assert_eq!(locator.following(1).unwrap(), second);
        assert_eq!(locator.preceding(second + 2).unwrap(), second);
    }
}
