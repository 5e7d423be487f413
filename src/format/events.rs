//! Markup Tokens
//!
//! Lenient pull reader over an OCR markup slice, shared by the plain-text
//! filter and the passage formatter. Produces start tags (with parsed
//! attributes), end tags and raw text runs; comments, processing instructions
//! and doctypes are skipped. A tag or comment that never closes yields
//! [`Token::Unterminated`] and ends the stream.

use std::ops::Range;

use crate::core::attributes::{self, parse_attributes, Attribute};
use crate::core::scanner::{is_name_start_char, Scanner};

#[derive(Debug, Clone)]
pub struct Tag<'a> {
    pub name: &'a [u8],
    pub attributes: Vec<Attribute<'a>>,
    /// Position of the attribute section in the input; `raw_value` ranges of
    /// the attributes are relative to it
    pub attr_offset: usize,
    pub self_closing: bool,
    pub span: Range<usize>,
}

impl<'a> Tag<'a> {
    pub fn local_name(&self) -> &'a [u8] {
        attributes::local_name(self.name)
    }

    pub fn is(&self, name: &str) -> bool {
        self.local_name().eq_ignore_ascii_case(name.as_bytes())
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute<'a>> {
        attributes::find_attribute(&self.attributes, name)
    }

    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        attributes::attribute_value(&self.attributes, name)
    }

    /// Absolute input range of an attribute's raw value
    pub fn raw_value_span(&self, attr: &Attribute<'_>) -> Range<usize> {
        self.attr_offset + attr.raw_value.start..self.attr_offset + attr.raw_value.end
    }
}

#[derive(Debug, Clone)]
pub enum Token<'a> {
    Start(Tag<'a>),
    End { name: &'a [u8], span: Range<usize> },
    /// Undecoded character data
    Text { raw: &'a [u8], span: Range<usize> },
    /// A tag, comment or CDATA section running past the end of the input
    Unterminated { span: Range<usize> },
}

impl Token<'_> {
    pub fn span(&self) -> Range<usize> {
        match self {
            Token::Start(tag) => tag.span.clone(),
            Token::End { span, .. } | Token::Text { span, .. } | Token::Unterminated { span } => {
                span.clone()
            }
        }
    }
}

pub struct MarkupReader<'a> {
    input: &'a [u8],
    scanner: Scanner<'a>,
}

impl<'a> MarkupReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        MarkupReader {
            input,
            scanner: Scanner::new(input),
        }
    }

    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    pub fn next_token(&mut self) -> Option<Token<'a>> {
        loop {
            if self.scanner.is_eof() {
                return None;
            }
            let pos = self.scanner.position();

            if self.input[pos] != b'<' {
                let end = self.scanner.find_tag_start().unwrap_or(self.input.len());
                self.scanner.set_position(end);
                return Some(Token::Text {
                    raw: &self.input[pos..end],
                    span: pos..end,
                });
            }

            if self.scanner.starts_with(b"<!--") {
                self.scanner.set_position(pos + 4);
                match self.scanner.find(b"-->") {
                    Some(close) => {
                        self.scanner.set_position(close + 3);
                        continue;
                    }
                    None => return Some(self.unterminated(pos)),
                }
            }
            if self.scanner.starts_with(b"<![CDATA[") {
                let content = pos + 9;
                self.scanner.set_position(content);
                let Some(close) = self.scanner.find(b"]]>") else {
                    return Some(self.unterminated(pos));
                };
                self.scanner.set_position(close + 3);
                return Some(Token::Text {
                    raw: &self.input[content..close],
                    span: pos..close + 3,
                });
            }

            match self.scanner.peek_at(1) {
                Some(b'!') | Some(b'?') => {
                    let Some(end) = self.scanner.find_tag_end_quoted() else {
                        return Some(self.unterminated(pos));
                    };
                    self.scanner.set_position(end + 1);
                }
                Some(b'/') => return Some(self.end_tag(pos)),
                Some(b) if is_name_start_char(b) => return Some(self.start_tag(pos)),
                _ => {
                    // Stray '<' in text
                    self.scanner.set_position(pos + 1);
                    let end = self.scanner.find_tag_start().unwrap_or(self.input.len());
                    self.scanner.set_position(end);
                    return Some(Token::Text {
                        raw: &self.input[pos..end],
                        span: pos..end,
                    });
                }
            }
        }
    }

    fn start_tag(&mut self, pos: usize) -> Token<'a> {
        let Some(end) = self.scanner.find_tag_end_quoted() else {
            return self.unterminated(pos);
        };

        self.scanner.set_position(pos + 1);
        let name = self.scanner.read_name().unwrap_or_default();
        let attr_offset = self.scanner.position();
        let self_closing = end > attr_offset && self.input[end - 1] == b'/';
        let attr_end = if self_closing { end - 1 } else { end };
        let attributes = parse_attributes(&self.input[attr_offset..attr_end.max(attr_offset)]);

        self.scanner.set_position(end + 1);
        Token::Start(Tag {
            name,
            attributes,
            attr_offset,
            self_closing,
            span: pos..end + 1,
        })
    }

    fn end_tag(&mut self, pos: usize) -> Token<'a> {
        let Some(end) = self.scanner.find_tag_end_quoted() else {
            return self.unterminated(pos);
        };

        self.scanner.set_position(pos + 2);
        let name = self.scanner.read_name().unwrap_or_default();
        self.scanner.set_position(end + 1);
        Token::End {
            name,
            span: pos..end + 1,
        }
    }

    fn unterminated(&mut self, pos: usize) -> Token<'a> {
        self.scanner.set_position(self.input.len());
        Token::Unterminated {
            span: pos..self.input.len(),
        }
    }
}

impl<'a> Iterator for MarkupReader<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        MarkupReader::new(input).collect()
    }

    #[test]
    fn test_basic_tokens() {
        let toks = tokens(b"<w x=\"1 2 3 4\">Wort</w> <br/>");
        assert_eq!(toks.len(), 5);
        match &toks[0] {
            Token::Start(tag) => {
                assert!(tag.is("w"));
                assert!(!tag.self_closing);
                assert_eq!(tag.attribute_value("x"), Some("1 2 3 4"));
                assert_eq!(tag.span, 0..15);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&toks[1], Token::Text { raw: b"Wort", .. }));
        assert!(matches!(&toks[2], Token::End { name: b"w", .. }));
        assert!(matches!(&toks[3], Token::Text { raw: b" ", .. }));
        match &toks[4] {
            Token::Start(tag) => assert!(tag.self_closing),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_raw_value_span_is_absolute() {
        let input = b"<l><String CONTENT=\"Wort\" HPOS=\"1\"/></l>";
        let toks = tokens(input);
        let Token::Start(tag) = &toks[1] else {
            panic!("expected String tag");
        };
        let content = tag.attribute("content").unwrap();
        assert_eq!(&input[tag.raw_value_span(content)], b"Wort");
    }

    #[test]
    fn test_skips_comments_and_declarations() {
        let toks = tokens(b"<?xml version=\"1.0\"?><!DOCTYPE html><!-- <w>x</w> --><p>a</p>");
        assert_eq!(toks.len(), 3);
        assert!(matches!(&toks[1], Token::Text { raw: b"a", .. }));
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let toks = tokens(b"<String CONTENT=\"a>b\"/>");
        let Token::Start(tag) = &toks[0] else {
            panic!("expected tag");
        };
        assert_eq!(tag.attribute_value("CONTENT"), Some("a>b"));
    }

    #[test]
    fn test_unterminated_tag() {
        let toks = tokens(b"<w>ok</w><w x=\"1 2 3 4\"<w>next</w>");
        assert!(matches!(toks.last(), Some(Token::Unterminated { span }) if span.start == 9));

        let toks = tokens(b"text<!-- open comment");
        assert!(matches!(toks.last(), Some(Token::Unterminated { span }) if span.start == 4));
    }

    #[test]
    fn test_stray_lt_is_text() {
        let toks = tokens(b"a < b<w>c</w>");
        assert!(matches!(&toks[0], Token::Text { raw: b"a ", .. }));
        assert!(matches!(&toks[1], Token::Text { raw: b"< b", .. }));
    }

    #[test]
    fn test_cdata_is_text() {
        let toks = tokens(b"<w><![CDATA[a<b]]></w>");
        assert!(matches!(&toks[1], Token::Text { raw: b"a<b", .. }));
    }
}
