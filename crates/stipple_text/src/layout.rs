//! Line breaking
//!
//! Greedy word wrap over shaped pen positions. Lines break at the last
//! whitespace that keeps the row within the maximum width; a word wider than
//! the limit on its own is split between characters. `\n` always ends a row
//! and whitespace at the start of a wrapped row is skipped.

use crate::cache::GlyphCache;
use crate::shaper::{GlyphPosition, TextShaper};
use crate::style::{HAlign, TextAlign, TextStyle};
use crate::Result;

/// One laid out row of text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRow {
    /// Byte range of the row's visible text, trailing whitespace excluded
    pub start: usize,
    pub end: usize,
    /// Pen advance across the row
    pub width: f32,
    /// Ink extent relative to the row's pen origin
    pub min_x: f32,
    pub max_x: f32,
}

/// Break `text` into rows no wider than `max_width`
pub fn break_lines(
    shaper: &TextShaper,
    cache: &mut GlyphCache,
    style: &TextStyle,
    text: &str,
    max_width: f32,
) -> Result<Vec<TextRow>> {
    // rows are measured from their own origin
    let style = TextStyle {
        align: TextAlign {
            horizontal: HAlign::Left,
            ..style.align
        },
        ..*style
    };
    let mut rows = Vec::new();
    let mut base = 0;
    for paragraph in text.split('\n') {
        let positions = shaper.glyph_positions(cache, &style, 0.0, 0.0, paragraph)?;
        let before = rows.len();
        wrap_paragraph(&positions, base, max_width, &mut rows);
        if rows.len() == before {
            rows.push(TextRow {
                start: base,
                end: base,
                width: 0.0,
                min_x: 0.0,
                max_x: 0.0,
            });
        }
        base += paragraph.len() + 1;
    }
    Ok(rows)
}

fn wrap_paragraph(positions: &[GlyphPosition], base: usize, max_width: f32, rows: &mut Vec<TextRow>) {
    let n = positions.len();
    let mut i = 0;
    while i < n {
        while i < n && positions[i].ch.is_whitespace() {
            i += 1;
        }
        if i == n {
            break;
        }
        let row_start = i;
        let origin = positions[row_start].x;
        let mut word_break = None;
        let mut j = i;
        while j < n {
            let p = &positions[j];
            if p.ch.is_whitespace() {
                if !positions[j - 1].ch.is_whitespace() {
                    word_break = Some(j);
                }
                j += 1;
                continue;
            }
            if j > row_start && p.next_x - origin > max_width {
                break;
            }
            j += 1;
        }

        let (end, next) = if j == n {
            let mut end = n;
            while end > row_start && positions[end - 1].ch.is_whitespace() {
                end -= 1;
            }
            (end, n)
        } else if let Some(b) = word_break {
            (b, b)
        } else {
            (j, j)
        };

        rows.push(make_row(&positions[row_start..end], base, origin));
        i = next;
    }
}

fn make_row(glyphs: &[GlyphPosition], base: usize, origin: f32) -> TextRow {
    let (Some(first), Some(last)) = (glyphs.first(), glyphs.last()) else {
        return TextRow {
            start: base,
            end: base,
            width: 0.0,
            min_x: 0.0,
            max_x: 0.0,
        };
    };
    let min_x = glyphs.iter().map(|g| g.min_x).fold(f32::INFINITY, f32::min);
    let max_x = glyphs.iter().map(|g| g.max_x).fold(f32::NEG_INFINITY, f32::max);
    TextRow {
        start: base + first.byte_index,
        end: base + last.byte_index + last.ch.len_utf8(),
        width: last.next_x - origin,
        min_x: min_x - origin,
        max_x: max_x - origin,
    }
}
