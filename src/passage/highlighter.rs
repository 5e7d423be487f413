//! Snippet Assembly
//!
//! Turns plain-text match spans into passages: every match gets a context
//! window from the format's break locator, matches with overlapping windows
//! share one passage, and each window is handed to the passage formatter.

use std::ops::Range;

use tracing::{debug, warn};

use super::{Passage, PassageFormatter, PassageSpan};
use crate::config::HighlightOptions;
use crate::error::Result;
use crate::format::{OcrFormat, OffsetMap};
use crate::iter::BreakLocator;
use crate::reader::LazyCharSequence;

#[derive(Debug, Clone)]
pub struct Highlighter {
    format: OcrFormat,
    opts: HighlightOptions,
    formatter: PassageFormatter,
}

impl Highlighter {
    pub fn new(format: OcrFormat, opts: HighlightOptions) -> Self {
        let formatter = format.passage_formatter(&opts);
        Highlighter {
            format,
            opts,
            formatter,
        }
    }

    pub fn format(&self) -> OcrFormat {
        self.format
    }

    pub fn options(&self) -> &HighlightOptions {
        &self.opts
    }

    /// Passage windows for `matches`, in plain-text offsets.
    ///
    /// Matches the offset map cannot place are dropped. At most
    /// `max_passages` windows are returned.
    pub fn passage_spans(
        &self,
        text: &LazyCharSequence,
        offsets: &OffsetMap,
        matches: &[Range<usize>],
    ) -> Result<Vec<PassageSpan>> {
        let locator = self.format.break_locator(
            text,
            self.opts.context_block,
            self.opts.limit_block,
            self.opts.context_size,
        );

        let mut sorted: Vec<Range<usize>> =
            matches.iter().filter(|m| m.start < m.end).cloned().collect();
        sorted.sort_unstable_by_key(|m| (m.start, m.end));

        let mut spans: Vec<PassageSpan> = Vec::new();
        for hit in sorted {
            let (Some(markup_start), Some(markup_end)) =
                (offsets.to_markup_start(hit.start), offsets.to_markup_end(hit.end))
            else {
                warn!(
                    source = text.source_id(),
                    start = hit.start,
                    end = hit.end,
                    "match outside the plain text"
                );
                continue;
            };

            let window_start = offsets
                .to_plain(locator.preceding(markup_start)?)
                .min(hit.start);
            let window_end = offsets.to_plain(locator.following(markup_end)?).max(hit.end);

            if let Some(last) = spans.last_mut().filter(|last| window_start < last.end) {
                last.end = last.end.max(window_end);
                last.highlights.push(hit);
                continue;
            }
            if spans.len() >= self.opts.max_passages {
                break;
            }
            spans.push(PassageSpan::new(window_start..window_end, vec![hit]));
        }

        debug!(
            source = text.source_id(),
            matches = matches.len(),
            passages = spans.len(),
            "computed passage windows"
        );
        Ok(spans)
    }

    /// One result per passage window; a window that cannot be formatted
    /// fails without affecting the others
    pub fn highlight(
        &self,
        text: &LazyCharSequence,
        offsets: &OffsetMap,
        matches: &[Range<usize>],
    ) -> Result<Vec<Result<Passage>>> {
        let spans = self.passage_spans(text, offsets, matches)?;
        Ok(self.formatter.format_passages(text, offsets, &spans))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::offsets::OffsetMapBuilder;
    use crate::iter::BlockKind;

    const MINI: &str = "<ocr><p xml:id=\"p1\" wh=\"1000 1000\"><b>\n\
        <l><w x=\"100 100 100 50\">Hello</w> <w x=\"250 100 150 50\">W&amp;rld</w></l>\n\
        <l><w x=\"100 200 100 50\">foo</w> <w x=\"250 200 100 50\">bar</w></l>\n\
        </b></p></ocr>";

    fn highlighter(context_size: usize, max_passages: usize) -> Highlighter {
        let opts = HighlightOptions {
            context_block: BlockKind::Line,
            limit_block: Some(BlockKind::Block),
            context_size,
            max_passages,
            ..HighlightOptions::default()
        };
        Highlighter::new(OcrFormat::MiniOcr, opts)
    }

    fn document() -> (LazyCharSequence, OffsetMap) {
        let filtered = OcrFormat::MiniOcr.filter(MINI.as_bytes());
        let text = LazyCharSequence::from_bytes("mini", MINI.as_bytes().to_vec());
        (text, filtered.offsets)
    }

    #[test]
    fn test_matches_in_one_line_share_a_passage() {
        let (text, offsets) = document();
        let spans = highlighter(0, 10)
            .passage_spans(&text, &offsets, &[16..19, 6..11, 0..5])
            .unwrap();
        assert_eq!(
            spans,
            vec![
                PassageSpan::new(0..12, vec![0..5, 6..11]),
                PassageSpan::new(12..19, vec![16..19]),
            ]
        );
    }

    #[test]
    fn test_highlight_produces_tagged_passages() {
        let (text, offsets) = document();
        let passages = highlighter(0, 10)
            .highlight(&text, &offsets, &[0..5, 6..11, 16..19])
            .unwrap();
        let texts: Vec<_> = passages
            .iter()
            .map(|p| p.as_ref().unwrap().text.as_str())
            .collect();
        assert_eq!(texts, vec!["<em>Hello</em> <em>W&rld</em>", "foo <em>bar</em>"]);
    }

    #[test]
    fn test_wider_context_merges_windows() {
        let (text, offsets) = document();
        let passages = highlighter(1, 10)
            .highlight(&text, &offsets, &[0..5, 16..19])
            .unwrap();
        assert_eq!(passages.len(), 1);
        let passage = passages[0].as_ref().unwrap();
        assert_eq!(passage.text, "<em>Hello</em> W&rld foo <em>bar</em>");
        assert_eq!(passage.highlights.len(), 2);
    }

    #[test]
    fn test_max_passages() {
        let (text, offsets) = document();
        let spans = highlighter(0, 1)
            .passage_spans(&text, &offsets, &[0..5, 16..19])
            .unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].highlights, vec![0..5]);
    }

    #[test]
    fn test_drifted_offsets_fail_without_panicking() {
        let (text, _) = document();
        let mut builder = OffsetMapBuilder::new();
        for markup in (100..105).chain(0..5) {
            builder.push(markup);
        }
        let passages = highlighter(0, 10)
            .highlight(&text, &builder.finish(), &[0..6])
            .unwrap();
        assert_eq!(passages.len(), 1);
        assert!(passages[0].as_ref().unwrap_err().is_offset_resolution());
    }

    #[test]
    fn test_unplaceable_matches_are_dropped() {
        let (text, offsets) = document();
        let spans = highlighter(0, 10)
            .passage_spans(&text, &offsets, &[3..3, 50..60])
            .unwrap();
        assert!(spans.is_empty());
    }
}
