//! Word-boundary text chunker with overlap.
//!
//! Splits normalized text into [`ChunkPiece`]s of up to `chunk_size`
//! characters. When a tentative cut lands inside a word, the cut is moved
//! backward (bounded scan) to the nearest boundary character; each
//! following chunk re-includes `overlap` characters of trailing context,
//! with a mid-word start advanced forward to the next boundary.
//!
//! All offsets are character positions in the normalized text, so the
//! original (normalized) document can be reconstructed from the pieces.

use tracing::warn;

use crate::error::{Error, Result};
use crate::models::ChunkPiece;

/// Hard ceiling on the number of chunks per document. Inputs longer than
/// `chunk_size * MAX_CHUNKS` are rejected before any chunk is produced.
pub const MAX_CHUNKS: usize = 10_000;

/// How far the boundary scans look before giving up. Tunable, not a
/// load-bearing invariant.
const BOUNDARY_WINDOW: usize = 100;

/// Normalize raw text: collapse runs of spaces to one, collapse three or
/// more consecutive newlines to two, and trim the ends.
pub fn normalize_text(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut prev_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !prev_space {
                collapsed.push(c);
            }
            prev_space = true;
        } else {
            prev_space = false;
            collapsed.push(c);
        }
    }

    let mut out = String::with_capacity(collapsed.len());
    let mut newlines = 0usize;
    for c in collapsed.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }

    out.trim().to_string()
}

fn is_boundary(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '.' | ',' | ';' | ':' | '!' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | '\''
        )
}

/// Scan backward from `pos` for the nearest boundary character and return
/// the position just after it. If the window is exhausted, return `pos`
/// unchanged: the cut happens mid-word rather than blocking.
fn boundary_backward(chars: &[char], pos: usize) -> usize {
    let search_start = pos.saturating_sub(BOUNDARY_WINDOW);
    let mut i = pos;
    loop {
        if i < chars.len() && is_boundary(chars[i]) {
            return i + 1;
        }
        if i == search_start {
            return pos;
        }
        i -= 1;
    }
}

/// Forward mirror of [`boundary_backward`]: advance to just past the next
/// boundary character, or stay at `pos` when the window is exhausted.
fn boundary_forward(chars: &[char], pos: usize) -> usize {
    let search_end = (pos + BOUNDARY_WINDOW).min(chars.len());
    for (i, &c) in chars.iter().enumerate().take(search_end).skip(pos) {
        if is_boundary(c) {
            return i + 1;
        }
    }
    pos
}

/// Split normalized text into overlapping chunks along near-word
/// boundaries.
///
/// `chunk_size` is the target maximum chunk length in characters;
/// `overlap` is how many characters of trailing context the next chunk
/// re-includes. An `overlap >= chunk_size` is clamped to `chunk_size / 2`
/// with a warning rather than rejected. Chunks that trim to empty are
/// dropped without consuming an index, so indices are dense and ascending.
///
/// `chunk_size` is a target, not a hard cap: when the last included
/// character is alphanumeric and the character at the tentative cut is
/// itself a boundary, the backward scan settles just past that boundary
/// and the span runs to `chunk_size + 1` characters. Intentional — the
/// cut stays off the word without giving up the boundary char.
pub fn split_into_chunks(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<ChunkPiece>> {
    let chars: Vec<char> = text.chars().collect();
    let text_len = chars.len();
    let max_len = chunk_size * MAX_CHUNKS;

    if text_len > max_len {
        return Err(Error::DocumentTooLarge {
            len: text_len,
            max: max_len,
        });
    }

    let mut overlap = overlap;
    if overlap >= chunk_size {
        overlap = chunk_size / 2;
        warn!(overlap, chunk_size, "overlap too large, clamped to chunk_size / 2");
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index = 0usize;

    while start < text_len {
        let tentative_end = (start + chunk_size).min(text_len);

        let mut end = if tentative_end < text_len {
            // Move the cut off a word if the last included char and the
            // next one are both part of one.
            if tentative_end > 0 && chars[tentative_end - 1].is_alphanumeric() {
                boundary_backward(&chars, tentative_end)
            } else {
                tentative_end
            }
        } else {
            text_len
        };

        if end <= start {
            end = (start + 1).min(text_len);
        }

        let chunk_text: String = chars[start..end].iter().collect();
        let trimmed = chunk_text.trim();
        if !trimmed.is_empty() {
            chunks.push(ChunkPiece {
                text: trimmed.to_string(),
                start_offset: start,
                end_offset: end,
                chunk_index: chunk_index as i64,
            });
            chunk_index += 1;
        }

        if chunk_index > MAX_CHUNKS {
            return Err(Error::TooManyChunks { max: MAX_CHUNKS });
        }

        if end >= text_len {
            break;
        }

        let next_start = end.saturating_sub(overlap);
        start = if next_start < text_len && next_start > 0 && chars[next_start - 1].is_alphanumeric()
        {
            boundary_forward(&chars, next_start)
        } else {
            next_start
        };

        // Forward progress guards: never re-walk a finished chunk.
        if start >= end {
            start = end;
        }
        if start == end && end < text_len {
            start = end + 1;
        }
    }

    Ok(chunks)
}
