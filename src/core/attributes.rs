//! Attribute Parsing
//!
//! Lenient attribute parsing for OCR markup tags. OCR engines emit plenty of
//! HTML-ish markup (unquoted values, boolean attributes), so nothing here is
//! rejected; malformed pieces are skipped.

use super::entities::decode_text;
use super::scanner::{is_name_char, is_name_start_char, is_whitespace};
use memchr::memchr;
use std::borrow::Cow;
use std::ops::Range;

/// A parsed attribute
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// Attribute name (may include namespace prefix)
    pub name: &'a [u8],
    /// Attribute value (entities decoded)
    pub value: Cow<'a, [u8]>,
    /// Byte range of the raw (undecoded) value inside the parsed input
    pub raw_value: Range<usize>,
}

impl<'a> Attribute<'a> {
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name).ok()
    }

    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(self.value.as_ref()).ok()
    }

    /// Name without namespace prefix (`xml:id` -> `id`)
    pub fn local_name(&self) -> &'a [u8] {
        local_name(self.name)
    }
}

/// Strip a namespace prefix from a tag or attribute name
#[inline]
pub fn local_name(name: &[u8]) -> &[u8] {
    match memchr(b':', name) {
        Some(colon) => &name[colon + 1..],
        None => name,
    }
}

/// Look up an attribute by local name, ASCII case-insensitively
pub fn find_attribute<'b, 'a>(attrs: &'b [Attribute<'a>], name: &str) -> Option<&'b Attribute<'a>> {
    attrs
        .iter()
        .find(|a| a.local_name().eq_ignore_ascii_case(name.as_bytes()))
}

/// Look up an attribute value as a string
pub fn attribute_value<'b>(attrs: &'b [Attribute<'_>], name: &str) -> Option<&'b str> {
    find_attribute(attrs, name).and_then(|a| a.value_str())
}

/// Parse attributes from raw tag content (after the element name)
///
/// Input should be the content between element name and '>' or '/>'.
/// `raw_value` ranges are relative to `input`.
pub fn parse_attributes(input: &[u8]) -> Vec<Attribute<'_>> {
    let mut attrs = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() || input[pos] == b'/' || input[pos] == b'>' {
            break;
        }

        let name_start = pos;
        if !is_name_start_char(input[pos]) {
            pos += 1;
            continue;
        }
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        if pos >= input.len() || input[pos] != b'=' {
            // Attribute without value (like HTML boolean attributes)
            attrs.push(Attribute {
                name,
                value: Cow::Borrowed(b""),
                raw_value: pos..pos,
            });
            continue;
        }

        pos += 1; // Skip '='
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() {
            break;
        }

        let quote = input[pos];
        let (value_start, value_end) = if quote == b'"' || quote == b'\'' {
            let start = pos + 1;
            let end = memchr(quote, &input[start..]).map_or(input.len(), |i| start + i);
            pos = (end + 1).min(input.len());
            (start, end)
        } else {
            // Unquoted value (non-standard but handle it)
            let start = pos;
            while pos < input.len() && !is_whitespace(input[pos]) && input[pos] != b'/' && input[pos] != b'>' {
                pos += 1;
            }
            (start, pos)
        };

        attrs.push(Attribute {
            name,
            value: decode_text(&input[value_start..value_end]),
            raw_value: value_start..value_end,
        });
    }

    attrs
}

/// Returns `true` if the whitespace-separated `class` list contains `token`
pub fn has_class_token(class_list: &[u8], token: &[u8]) -> bool {
    class_list
        .split(|&b| is_whitespace(b))
        .any(|t| t == token)
}
