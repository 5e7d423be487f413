//! Elixir Term Conversion
//!
//! Passages become maps with atom keys. Options arrive as a map; missing keys
//! keep their defaults. Coordinates are rounded to four decimals here and
//! nowhere else.

use rustler::{Atom, Decoder, Encoder, Env, NifResult, Term};

use crate::config::HighlightOptions;
use crate::error::{Error, Result};
use crate::format::OcrFormat;
use crate::iter::BlockKind;
use crate::passage::{BoundingBox, Passage};

rustler::atoms! {
    ok,
    error,
    // passage keys
    text,
    start,
    end,
    page,
    region,
    highlights,
    x,
    y,
    width,
    height,
    // option keys
    pre_tag,
    post_tag,
    absolute_highlights,
    context_block,
    limit_block,
    context_size,
    max_passages,
    // formats
    hocr,
    alto,
    miniocr,
}

pub fn format_atom(format: OcrFormat) -> Atom {
    match format {
        OcrFormat::Hocr => hocr(),
        OcrFormat::Alto => alto(),
        OcrFormat::MiniOcr => miniocr(),
    }
}

#[inline]
fn round4(v: f32) -> f64 {
    (f64::from(v) * 10_000.0).round() / 10_000.0
}

fn box_to_term<'a>(env: Env<'a>, rect: &BoundingBox) -> NifResult<Term<'a>> {
    Term::map_from_arrays(
        env,
        &[x(), y(), width(), height()],
        &[
            round4(rect.x),
            round4(rect.y),
            round4(rect.width),
            round4(rect.height),
        ],
    )
}

pub fn passage_to_term<'a>(env: Env<'a>, passage: &Passage) -> NifResult<Term<'a>> {
    let mut highlight_terms = Vec::with_capacity(passage.highlights.len());
    for hl in &passage.highlights {
        let keys = [text().encode(env), region().encode(env)];
        let values = [hl.text.encode(env), box_to_term(env, &hl.region)?];
        highlight_terms.push(Term::map_from_arrays(env, &keys, &values)?);
    }

    let keys = [start(), end(), text(), page(), region(), highlights()].map(|key| key.encode(env));
    let values = [
        passage.start.encode(env),
        passage.end.encode(env),
        passage.text.encode(env),
        passage.page.encode(env),
        box_to_term(env, &passage.region)?,
        highlight_terms.encode(env),
    ];
    Term::map_from_arrays(env, &keys, &values)
}

/// `{:error, message}`
pub fn error_to_term<'a>(env: Env<'a>, err: &Error) -> Term<'a> {
    (error(), err.to_string()).encode(env)
}

/// `{:ok, value}` or `{:error, message}`
pub fn result_to_term<'a, T: Encoder>(env: Env<'a>, result: Result<T>) -> Term<'a> {
    match result {
        Ok(value) => (ok(), value).encode(env),
        Err(err) => error_to_term(env, &err),
    }
}

/// One `{:ok, passage}` or `{:error, message}` per passage
pub fn passages_to_term<'a>(env: Env<'a>, passages: &[Result<Passage>]) -> NifResult<Term<'a>> {
    let mut terms = Vec::with_capacity(passages.len());
    for passage in passages {
        terms.push(match passage {
            Ok(passage) => (ok(), passage_to_term(env, passage)?).encode(env),
            Err(err) => error_to_term(env, err),
        });
    }
    Ok(terms.encode(env))
}

/// Result of highlighting one document
pub fn outcome_to_term<'a>(env: Env<'a>, outcome: &Result<Vec<Result<Passage>>>) -> NifResult<Term<'a>> {
    match outcome {
        Ok(passages) => Ok((ok(), passages_to_term(env, passages)?).encode(env)),
        Err(err) => Ok(error_to_term(env, err)),
    }
}

fn field<'a, T: Decoder<'a>>(map: Term<'a>, key: Atom) -> NifResult<Option<T>> {
    match map.map_get(key) {
        Ok(value) => value.decode().map(Some),
        Err(_) => Ok(None),
    }
}

/// Block kind given as atom or string; `nil` means none
pub fn block_kind(term: Term<'_>) -> NifResult<Option<BlockKind>> {
    let name = if term.is_atom() {
        let name = term.atom_to_string()?;
        if name == "nil" {
            return Ok(None);
        }
        name
    } else {
        term.decode::<String>()?
    };
    BlockKind::from_name(&name)
        .map(Some)
        .ok_or(rustler::Error::BadArg)
}

/// Highlight options from a map, defaults for missing keys
pub fn decode_options(map: Term<'_>) -> NifResult<HighlightOptions> {
    let mut opts = HighlightOptions::default();
    if map.is_atom() && map.atom_to_string()? == "nil" {
        return Ok(opts);
    }

    if let Some(tag) = field::<String>(map, pre_tag())? {
        opts.pre_tag = tag;
    }
    if let Some(tag) = field::<String>(map, post_tag())? {
        opts.post_tag = tag;
    }
    if let Some(absolute) = field::<bool>(map, absolute_highlights())? {
        opts.absolute_highlights = absolute;
    }
    if let Some(kind) = field::<Term>(map, context_block())? {
        opts.context_block = block_kind(kind)?.ok_or(rustler::Error::BadArg)?;
    }
    if let Some(kind) = field::<Term>(map, limit_block())? {
        opts.limit_block = block_kind(kind)?;
    }
    if let Some(size) = field::<usize>(map, context_size())? {
        opts.context_size = size;
    }
    if let Some(max) = field::<usize>(map, max_passages())? {
        opts.max_passages = max;
    }
    Ok(opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123_456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
        assert_eq!(round4(0.0), 0.0);
    }
}
