//! UTF-8 / UTF-16 Length Codec
//!
//! Converts between encoded UTF-8 byte lengths and decoded UTF-16 code unit
//! lengths without materializing the converted text, and validates strict
//! (shortest-form, Unicode 3.1+) UTF-8.
//!
//! Search engines report match offsets in UTF-16 code units while the OCR
//! sources are UTF-8 files, so every offset conversion goes through here.

use std::ops::Range;

use crate::error::{Error, Result};

/// Number of bytes in the UTF-8 encoding of a UTF-16 sequence.
///
/// Surrogate pairs count as one 4-byte sequence. An unpaired high or low
/// surrogate fails with [`Error::MalformedInput`] at its index.
pub fn encoded_len(units: &[u16]) -> Result<usize> {
    let mut len = 0;
    let mut i = 0;

    // Optimize for pure ASCII
    while i < units.len() && units[i] < 0x80 {
        i += 1;
    }
    len += i;

    while i < units.len() {
        let unit = units[i];
        match unit {
            0x0000..=0x007F => len += 1,
            0x0080..=0x07FF => len += 2,
            0xD800..=0xDBFF => match units.get(i + 1) {
                Some(0xDC00..=0xDFFF) => {
                    len += 4;
                    i += 1;
                }
                _ => return Err(Error::MalformedInput { index: i }),
            },
            0xDC00..=0xDFFF => return Err(Error::MalformedInput { index: i }),
            _ => len += 3,
        }
        i += 1;
    }
    Ok(len)
}

/// Number of UTF-16 code units the given UTF-8 bytes decode to.
///
/// Only lead bytes are inspected: a 2-byte sequence yields one unit less than
/// its byte count, 3- and 4-byte sequences two less (a 4-byte sequence decodes
/// to a surrogate pair). Continuation bytes in lead position fail with
/// [`Error::InvalidLeadByte`], a sequence running past the end of `bytes` with
/// [`Error::TruncatedSequence`].
pub fn decoded_len(bytes: &[u8]) -> Result<usize> {
    let mut units = bytes.len();
    let mut i = 0;

    // ASCII has no length difference
    while i < bytes.len() && bytes[i] < 0x80 {
        i += 1;
    }

    while i < bytes.len() {
        let lead = bytes[i];
        let n = sequence_len(lead).ok_or(Error::InvalidLeadByte { offset: i, byte: lead })?;
        if i + n > bytes.len() {
            return Err(Error::TruncatedSequence { offset: i });
        }
        units -= match n {
            1 => 0,
            2 => 1,
            _ => 2,
        };
        i += n;
    }
    Ok(units)
}

/// Length of the UTF-8 sequence introduced by `lead`, or `None` if `lead`
/// cannot start a sequence.
#[inline]
pub fn sequence_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        _ => None,
    }
}

/// UTF-16 code units produced by the sequence introduced by `lead`.
#[inline]
pub fn sequence_units(lead: u8) -> usize {
    if lead >= 0xF0 {
        2
    } else {
        1
    }
}

/// Number of bytes required to encode a code point.
#[inline]
pub const fn code_point_len(code_point: u32) -> usize {
    match code_point {
        0..=0x7F => 1,
        0x80..=0x7FF => 2,
        0x10000..=0x10FFFF => 4,
        _ => 3,
    }
}

#[inline]
pub fn is_continuation(b: u8) -> bool {
    (0x80..=0xBF).contains(&b)
}

/// Length of the longest prefix of `bytes` that does not end in the middle of
/// a sequence. Used to cut block-sized chunks at a character boundary.
pub fn complete_prefix_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let i = len - back;
        let b = bytes[i];
        if is_continuation(b) {
            continue;
        }
        return match sequence_len(b) {
            Some(n) if n > back => i,
            _ => len,
        };
    }
    len
}

/// Walk complete sequences at the start of `bytes` while the decoded length
/// stays within `max_units`. Returns `(units, bytes)` consumed.
///
/// Stops early at a sequence cut off by the end of `bytes`, and before a
/// surrogate pair that would overshoot `max_units`.
pub fn advance_units(bytes: &[u8], max_units: usize) -> Result<(usize, usize)> {
    let complete = complete_prefix_len(bytes);
    let total = decoded_len(&bytes[..complete])?;
    if total <= max_units {
        return Ok((total, complete));
    }

    let mut units = 0;
    let mut i = 0;
    while i < complete {
        let lead = bytes[i];
        let n = sequence_len(lead).ok_or(Error::InvalidLeadByte { offset: i, byte: lead })?;
        let u = sequence_units(lead);
        if units + u > max_units {
            break;
        }
        units += u;
        i += n;
    }
    Ok((units, i))
}

/// UTF-16 length of `bytes` without validation.
///
/// Continuation bytes count nothing and 4-byte leads count two units, so the
/// result matches [`decoded_len`] on well-formed input and never fails.
#[inline]
pub fn count_units(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0xBF => 0,
            0xF0..=0xFF => 2,
            _ => 1,
        })
        .sum()
}

/// Returns `true` if `bytes` is well-formed UTF-8.
///
/// Rejects non-shortest forms, encoded surrogates and code points beyond
/// U+10FFFF, so this is equivalent to `std::str::from_utf8(bytes).is_ok()`.
pub fn is_well_formed(bytes: &[u8]) -> bool {
    is_well_formed_range(bytes, 0..bytes.len())
}

/// Returns `true` if `bytes[range]` is well-formed UTF-8.
///
/// A range outside `bytes` is never well-formed.
pub fn is_well_formed_range(bytes: &[u8], range: Range<usize>) -> bool {
    let Some(slice) = bytes.get(range) else {
        return false;
    };
    match slice.iter().position(|&b| b >= 0x80) {
        None => true,
        Some(first) => is_well_formed_slow_path(slice, first),
    }
}

fn is_well_formed_slow_path(bytes: &[u8], start: usize) -> bool {
    let end = bytes.len();
    let mut i = start;

    while i < end {
        let b1 = bytes[i];
        i += 1;
        if b1 < 0x80 {
            continue;
        }

        if b1 < 0xE0 {
            // Two-byte form. Continuation bytes in lead position and the
            // overlong leads 0xC0/0xC1 both fall below 0xC2.
            if i == end || b1 < 0xC2 || !is_continuation(bytes[i]) {
                return false;
            }
            i += 1;
        } else if b1 < 0xF0 {
            // Three-byte form
            if i + 1 >= end {
                return false;
            }
            let b2 = bytes[i];
            if !is_continuation(b2)
                // Overlong
                || (b1 == 0xE0 && b2 < 0xA0)
                // Surrogate code points
                || (b1 == 0xED && b2 >= 0xA0)
                || !is_continuation(bytes[i + 1])
            {
                return false;
            }
            i += 2;
        } else {
            // Four-byte form, planes 1..=16 only
            if i + 2 >= end {
                return false;
            }
            let b2 = bytes[i];
            if !is_continuation(b2)
                || b1 > 0xF4
                || (b1 == 0xF0 && b2 < 0x90)
                || (b1 == 0xF4 && b2 > 0x8F)
                || !is_continuation(bytes[i + 1])
                || !is_continuation(bytes[i + 2])
            {
                return false;
            }
            i += 3;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn utf16(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn test_encoded_len_mixed() {
        let s = "Mün€hen 😀";
        assert_eq!(encoded_len(&utf16(s)).unwrap(), s.len());
    }

    #[test]
    fn test_encoded_len_unpaired_high_surrogate() {
        let units = [0x41, 0xD800, 0x41];
        assert_eq!(encoded_len(&units), Err(Error::MalformedInput { index: 1 }));
    }

    #[test]
    fn test_encoded_len_unpaired_low_surrogate() {
        let units = [0xDC00];
        assert_eq!(encoded_len(&units), Err(Error::MalformedInput { index: 0 }));
    }

    #[test]
    fn test_encoded_len_trailing_high_surrogate() {
        let units = [0x41, 0x42, 0xDBFF];
        assert_eq!(encoded_len(&units), Err(Error::MalformedInput { index: 2 }));
    }

    #[test]
    fn test_decoded_len_classes() {
        assert_eq!(decoded_len(b"abc").unwrap(), 3);
        assert_eq!(decoded_len("ü".as_bytes()).unwrap(), 1);
        assert_eq!(decoded_len("€".as_bytes()).unwrap(), 1);
        assert_eq!(decoded_len("😀".as_bytes()).unwrap(), 2);
    }

    #[test]
    fn test_decoded_len_continuation_as_lead() {
        assert_eq!(
            decoded_len(&[b'a', 0x80, b'b']),
            Err(Error::InvalidLeadByte { offset: 1, byte: 0x80 })
        );
        assert_eq!(
            decoded_len(&[0xF8, 0x80, 0x80, 0x80]),
            Err(Error::InvalidLeadByte { offset: 0, byte: 0xF8 })
        );
    }

    #[test]
    fn test_decoded_len_truncated() {
        assert_eq!(decoded_len(&[b'a', 0xE2, 0x82]), Err(Error::TruncatedSequence { offset: 1 }));
    }

    #[test]
    fn test_well_formed_rejects_overlong() {
        assert!(!is_well_formed(&[0xC0, 0x80]));
        assert!(!is_well_formed(&[0xC1, 0xBF]));
        assert!(!is_well_formed(&[0xE0, 0x80, 0x80]));
        assert!(!is_well_formed(&[0xE0, 0x9F, 0xBF]));
        assert!(!is_well_formed(&[0xF0, 0x80, 0x80, 0x80]));
        assert!(!is_well_formed(&[0xF0, 0x8F, 0xBF, 0xBF]));
    }

    #[test]
    fn test_well_formed_rejects_surrogates() {
        assert!(!is_well_formed(&[0xED, 0xA0, 0x80]));
        assert!(!is_well_formed(&[0xED, 0xBF, 0xBF]));
        assert!(is_well_formed(&[0xED, 0x9F, 0xBF]));
    }

    #[test]
    fn test_well_formed_rejects_out_of_range_planes() {
        assert!(!is_well_formed(&[0xF4, 0x90, 0x80, 0x80]));
        assert!(!is_well_formed(&[0xF5, 0x80, 0x80, 0x80]));
        assert!(is_well_formed(&[0xF4, 0x8F, 0xBF, 0xBF]));
    }

    #[test]
    fn test_well_formed_rejects_bad_continuation() {
        assert!(!is_well_formed(&[0xC3, 0x28]));
        assert!(!is_well_formed(&[0xE2, 0x82, 0x28]));
        assert!(!is_well_formed(&[0xE2, 0x82]));
    }

    #[test]
    fn test_well_formed_range() {
        let bytes = "aü€".as_bytes();
        assert!(is_well_formed_range(bytes, 1..3));
        assert!(!is_well_formed_range(bytes, 2..4));
        assert!(!is_well_formed_range(bytes, 4..10));
    }

    #[test]
    fn test_complete_prefix_len() {
        let bytes = "ab€".as_bytes();
        assert_eq!(complete_prefix_len(bytes), 5);
        assert_eq!(complete_prefix_len(&bytes[..4]), 2);
        assert_eq!(complete_prefix_len(&bytes[..3]), 2);
        assert_eq!(complete_prefix_len(&"😀".as_bytes()[..3]), 0);
        assert_eq!(complete_prefix_len(b""), 0);
    }

    #[test]
    fn test_advance_units() {
        let bytes = "aü😀b".as_bytes();
        assert_eq!(advance_units(bytes, 100).unwrap(), (5, bytes.len()));
        assert_eq!(advance_units(bytes, 2).unwrap(), (2, 3));
        // The surrogate pair does not fit into 3 units
        assert_eq!(advance_units(bytes, 3).unwrap(), (2, 3));
        assert_eq!(advance_units(bytes, 4).unwrap(), (4, 7));
        assert_eq!(advance_units(&bytes[..5], 10).unwrap(), (2, 3));
    }

    #[test]
    fn test_code_point_len() {
        assert_eq!(code_point_len('a' as u32), 1);
        assert_eq!(code_point_len('ü' as u32), 2);
        assert_eq!(code_point_len('€' as u32), 3);
        assert_eq!(code_point_len('😀' as u32), 4);
    }

    proptest! {
        #[test]
        fn prop_count_units_matches_decoded_len(s in "\\PC*") {
            prop_assert_eq!(count_units(s.as_bytes()), utf16(&s).len());
        }

        #[test]
        fn prop_round_trip(s in "\\PC*") {
            let units = utf16(&s);
            prop_assert_eq!(decoded_len(s.as_bytes()).unwrap(), units.len());
            prop_assert_eq!(encoded_len(&units).unwrap(), s.len());
        }

        #[test]
        fn prop_additive(a in "\\PC*", b in "\\PC*") {
            let joined = format!("{a}{b}");
            prop_assert_eq!(
                decoded_len(joined.as_bytes()).unwrap(),
                decoded_len(a.as_bytes()).unwrap() + decoded_len(b.as_bytes()).unwrap()
            );
        }

        #[test]
        fn prop_well_formed_matches_std(bytes in proptest::collection::vec(any::<u8>(), 0..16)) {
            prop_assert_eq!(is_well_formed(&bytes), std::str::from_utf8(&bytes).is_ok());
        }

        #[test]
        fn prop_well_formed_accepts_encoded(s in any::<String>()) {
            prop_assert!(is_well_formed(s.as_bytes()));
        }
    }
}
