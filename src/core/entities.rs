//! Entity Decoding
//!
//! Handles decoding of XML/HTML entities found in OCR text and attributes:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Common HTML entities emitted by hOCR producers (&nbsp;, &shy;, ...)
//! - Numeric character references: &#123; &#x7B;
//!
//! Uses Cow for zero-copy when no entities are present. The filter needs to
//! know where every decoded character came from, so [`decode_with_offsets`]
//! reports the source position of each output character.

use memchr::memchr;
use std::borrow::Cow;

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
#[inline]
pub fn decode_text(input: &[u8]) -> Cow<'_, [u8]> {
    if memchr(b'&', input).is_none() {
        return Cow::Borrowed(input);
    }
    let mut result = Vec::with_capacity(input.len());
    decode_with_offsets(input, |c, _| {
        let mut buf = [0u8; 4];
        result.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    });
    Cow::Owned(result)
}

/// Decode UTF-8 `input`, calling `emit` with every decoded character and the
/// byte offset in `input` where it (or its entity reference) starts.
///
/// Unknown entities and bare ampersands are passed through literally. Invalid
/// UTF-8 is replaced with U+FFFD.
pub fn decode_with_offsets<F>(input: &[u8], mut emit: F)
where
    F: FnMut(char, usize),
{
    let mut pos = 0;
    while pos < input.len() {
        let amp = memchr(b'&', &input[pos..]).map_or(input.len(), |i| pos + i);
        emit_plain(&input[pos..amp], pos, &mut emit);
        pos = amp;
        if pos >= input.len() {
            break;
        }

        match entity_at(&input[pos..]) {
            Some((decoded, consumed)) => {
                emit(decoded, pos);
                pos += consumed;
            }
            None => {
                emit('&', pos);
                pos += 1;
            }
        }
    }
}

/// Byte length of an entity reference starting at `&`, or `None` if `input`
/// does not start with a complete, known entity
pub fn entity_len(input: &[u8]) -> Option<usize> {
    entity_at(input).map(|(_, len)| len)
}

fn emit_plain<F: FnMut(char, usize)>(chunk: &[u8], base: usize, emit: &mut F) {
    for piece in chunk.utf8_chunks() {
        let valid = piece.valid();
        let valid_start = piece.valid().as_ptr() as usize - chunk.as_ptr() as usize;
        for (i, c) in valid.char_indices() {
            emit(c, base + valid_start + i);
        }
        if !piece.invalid().is_empty() {
            emit(char::REPLACEMENT_CHARACTER, base + valid_start + valid.len());
        }
    }
}

/// Decode the entity at the start of `input` (which begins with '&'),
/// returning the character and the number of bytes consumed
fn entity_at(input: &[u8]) -> Option<(char, usize)> {
    // Entity names are short; don't scan across the whole snippet
    let window = &input[..input.len().min(12)];
    let semi = memchr(b';', window)?;
    let entity = &input[1..semi];
    decode_entity(entity).map(|c| (c, semi + 1))
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &[u8]) -> Option<char> {
    if let Some(numeric) = entity.strip_prefix(b"#") {
        return decode_numeric_entity(numeric);
    }

    match entity {
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"amp" => Some('&'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        b"nbsp" => Some('\u{00A0}'),
        b"shy" => Some('\u{00AD}'),
        b"not" => Some('\u{00AC}'),
        b"mdash" => Some('\u{2014}'),
        b"ndash" => Some('\u{2013}'),
        b"lsquo" => Some('\u{2018}'),
        b"rsquo" => Some('\u{2019}'),
        b"ldquo" => Some('\u{201C}'),
        b"rdquo" => Some('\u{201D}'),
        b"hellip" => Some('\u{2026}'),
        _ => None,
    }
}

/// Decode a numeric character reference
fn decode_numeric_entity(entity: &[u8]) -> Option<char> {
    let codepoint = match entity.first()? {
        b'x' | b'X' => u32::from_str_radix(std::str::from_utf8(&entity[1..]).ok()?, 16).ok()?,
        _ => std::str::from_utf8(entity).ok()?.parse::<u32>().ok()?,
    };
    char::from_u32(codepoint)
}

/// Escape text for output inside highlighted snippets
pub fn encode_text(input: &str) -> Cow<'_, str> {
    if !input.bytes().any(|b| matches!(b, b'<' | b'>' | b'&')) {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}
