//! Passages
//!
//! The output unit of highlighting: snippet text with page geometry of the
//! whole snippet and of every highlighted span in it. All boxes are
//! normalized to the page, `[0, 1]` on both axes.

pub mod formatter;
pub mod highlighter;

use std::ops::Range;

use serde::{Deserialize, Serialize};

pub use formatter::PassageFormatter;
pub use highlighter::Highlighter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        BoundingBox {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BoundingBox {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Scale page pixels down to page fractions
    pub fn normalized(&self, page_width: f32, page_height: f32) -> BoundingBox {
        BoundingBox {
            x: self.x / page_width,
            y: self.y / page_height,
            width: self.width / page_width,
            height: self.height / page_height,
        }
    }

    /// This box in the coordinate space of `outer` (both page-relative)
    pub fn relative_to(&self, outer: &BoundingBox) -> BoundingBox {
        let scale = |v: f32, by: f32| if by > 0.0 { v / by } else { 0.0 };
        BoundingBox {
            x: scale(self.x - outer.x, outer.width),
            y: scale(self.y - outer.y, outer.height),
            width: scale(self.width, outer.width),
            height: scale(self.height, outer.height),
        }
    }

    /// Inverse of [`relative_to`](Self::relative_to)
    pub fn absolute_in(&self, outer: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x: outer.x + self.x * outer.width,
            y: outer.y + self.y * outer.height,
            width: self.width * outer.width,
            height: self.height * outer.height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    /// Highlighted words as they appear in the passage text, without tags
    pub text: String,
    pub region: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    /// Plain-text span the passage was built for
    pub start: usize,
    pub end: usize,
    /// Identifier of the page the passage starts on
    pub page: Option<String>,
    pub region: BoundingBox,
    pub highlights: Vec<Highlight>,
}

/// A passage request: plain-text span plus highlighted sub-spans
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PassageSpan {
    pub start: usize,
    pub end: usize,
    pub highlights: Vec<Range<usize>>,
}

impl PassageSpan {
    pub fn new(range: Range<usize>, highlights: Vec<Range<usize>>) -> Self {
        PassageSpan {
            start: range.start,
            end: range.end,
            highlights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &BoundingBox, b: &BoundingBox) -> bool {
        [
            (a.x, b.x),
            (a.y, b.y),
            (a.width, b.width),
            (a.height, b.height),
        ]
        .iter()
        .all(|(l, r)| (l - r).abs() < 1e-6)
    }

    #[test]
    fn test_union() {
        let a = BoundingBox::new(0.1, 0.2, 0.1, 0.1);
        let b = BoundingBox::new(0.3, 0.1, 0.2, 0.1);
        let u = a.union(&b);
        assert!(close(&u, &BoundingBox::new(0.1, 0.1, 0.4, 0.2)));
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn test_relative_and_back() {
        let outer = BoundingBox::new(0.2, 0.4, 0.5, 0.2);
        let inner = BoundingBox::new(0.3, 0.45, 0.1, 0.05);
        let rel = inner.relative_to(&outer);
        assert!(close(&rel, &BoundingBox::new(0.2, 0.25, 0.2, 0.25)));
        assert!(close(&rel.absolute_in(&outer), &inner));
    }

    #[test]
    fn test_relative_to_degenerate_box() {
        let outer = BoundingBox::new(0.2, 0.4, 0.0, 0.0);
        let rel = BoundingBox::new(0.2, 0.4, 0.0, 0.0).relative_to(&outer);
        assert_eq!(rel, BoundingBox::default());
    }

    #[test]
    fn test_passage_json_shape() {
        let passage = Passage {
            text: "a <em>b</em>".to_string(),
            start: 10,
            end: 13,
            page: Some("p1".to_string()),
            region: BoundingBox::new(0.0, 0.5, 1.0, 0.25),
            highlights: vec![Highlight {
                text: "b".to_string(),
                region: BoundingBox::new(0.5, 0.0, 0.5, 1.0),
            }],
        };
        let json = serde_json::to_value(&passage).unwrap();
        assert_eq!(json["page"], "p1");
        assert_eq!(json["region"]["height"], 0.25);
        assert_eq!(json["highlights"][0]["text"], "b");
        let back: Passage = serde_json::from_value(json).unwrap();
        assert_eq!(back, passage);
    }
}
