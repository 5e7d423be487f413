//! Offset Maps
//!
//! Maps UTF-16 offsets in filtered plain text back to offsets in the markup it
//! was extracted from. Every plain unit came from a distinct markup position
//! and those positions increase strictly, so the map is stored as runs: each
//! correction point `(plain, diff)` starts a run of plain units whose markup
//! offset is `plain + diff`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredOffsetMap")]
pub struct OffsetMap {
    points: Vec<(usize, usize)>,
    len: usize,
}

/// Offset map as persisted, before validation
#[derive(Deserialize)]
struct StoredOffsetMap {
    points: Vec<(usize, usize)>,
    len: usize,
}

impl TryFrom<StoredOffsetMap> for OffsetMap {
    type Error = Error;

    fn try_from(stored: StoredOffsetMap) -> Result<Self> {
        OffsetMap::from_points(stored.points, stored.len)
    }
}

impl OffsetMap {
    /// Map for plain text that is the markup itself
    pub fn identity() -> Self {
        OffsetMap {
            points: vec![(0, 0)],
            len: usize::MAX,
        }
    }

    /// Rebuild a map from persisted correction points.
    ///
    /// Points must be sorted by plain offset, start at 0 unless `len` is 0,
    /// and map to strictly increasing markup offsets that fit in `usize`.
    pub fn from_points(points: Vec<(usize, usize)>, len: usize) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidOffsetMap {
            reason: reason.to_string(),
        };

        match points.first() {
            None if len == 0 => {}
            None => return Err(invalid("no correction points")),
            Some(&(first, _)) if first != 0 => return Err(invalid("first point does not start at 0")),
            Some(_) => {}
        }
        for pair in points.windows(2) {
            let ((p1, d1), (p2, d2)) = (pair[0], pair[1]);
            if p2 <= p1 {
                return Err(invalid("points not sorted by plain offset"));
            }
            if d2 < d1 {
                return Err(invalid("markup offsets not increasing"));
            }
        }
        if let Some(&(last, diff)) = points.last() {
            if last >= len && len > 0 {
                return Err(invalid("point past the plain text"));
            }
            if len.checked_add(diff).is_none() {
                return Err(invalid("markup offset overflows"));
            }
        }
        Ok(OffsetMap { points, len })
    }

    pub fn points(&self) -> &[(usize, usize)] {
        &self.points
    }

    /// Length of the plain text in UTF-16 units
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_identity(&self) -> bool {
        self.len == usize::MAX && self.points == [(0, 0)]
    }

    /// Markup offset of the plain unit at `plain`
    fn correct(&self, plain: usize) -> Option<usize> {
        if plain >= self.len {
            return None;
        }
        let run = self.points.partition_point(|&(p, _)| p <= plain);
        let (_, diff) = *self.points.get(run.checked_sub(1)?)?;
        plain.checked_add(diff)
    }

    /// Markup offset where a plain span starting at `plain` starts
    pub fn to_markup_start(&self, plain: usize) -> Option<usize> {
        if plain == self.len {
            return self.to_markup_end(plain);
        }
        self.correct(plain)
    }

    /// Markup offset where a plain span ending (exclusively) at `plain` ends
    pub fn to_markup_end(&self, plain: usize) -> Option<usize> {
        match plain {
            0 if self.len == 0 => Some(0),
            0 => self.correct(0),
            _ if plain > self.len => None,
            _ => self.correct(plain - 1)?.checked_add(1),
        }
    }

    /// Number of plain units that came from markup before `markup`
    pub fn to_plain(&self, markup: usize) -> usize {
        let run = self
            .points
            .partition_point(|&(p, d)| p.saturating_add(d) < markup);
        let Some(i) = run.checked_sub(1) else {
            return 0;
        };
        let (_, diff) = self.points[i];
        let run_end = self.points.get(i + 1).map_or(self.len, |&(p, _)| p);
        markup.saturating_sub(diff).min(run_end)
    }
}

/// Collects the markup offset of every emitted plain unit
#[derive(Debug, Default)]
pub struct OffsetMapBuilder {
    markup: Vec<usize>,
}

impl OffsetMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, markup: usize) {
        self.markup.push(markup);
    }

    pub fn pop(&mut self) -> Option<usize> {
        self.markup.pop()
    }

    pub fn len(&self) -> usize {
        self.markup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markup.is_empty()
    }

    pub fn finish(self) -> OffsetMap {
        let mut points: Vec<(usize, usize)> = Vec::new();
        let mut prev: Option<usize> = None;
        for (plain, &markup) in self.markup.iter().enumerate() {
            if prev.map_or(true, |p| markup != p + 1) {
                points.push((plain, markup.saturating_sub(plain)));
            }
            prev = Some(markup);
        }
        OffsetMap {
            points,
            len: self.markup.len(),
        }
    }
}
