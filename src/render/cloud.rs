//! Word cloud: keyword frequencies, greedy row layout and SVG drawing.
//!
//! Layout is a pure function of the word list, canvas and a text measuring
//! callback so it can be tested without a drawing backend.

use std::collections::HashMap;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{PALETTE, RenderError};

/// Maximum number of words placed in a cloud.
pub const CLOUD_WORD_LIMIT: usize = 100;

const CLOUD_FONT: &str = "sans-serif";
const MIN_FONT_SIZE: u32 = 10;
const MAX_FONT_SIZE: u32 = 64;
const WORD_GAP: u32 = 8;
const ROW_GAP: u32 = 4;
const CANVAS_PADDING: u32 = 10;

/// One keyword and its frequency in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudWord {
    pub text: String,
    pub weight: usize,
}

/// Pixel dimensions of the cloud image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudCanvas {
    pub width: u32,
    pub height: u32,
}

impl Default for CloudCanvas {
    fn default() -> Self {
        Self {
            width: 800,
            height: 400,
        }
    }
}

/// A word positioned on the canvas; `(x, y)` is the top-left corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedWord {
    pub text: String,
    pub weight: usize,
    pub font_size: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PlacedWord {
    fn right(&self) -> u32 {
        self.x + self.width
    }

    fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether the bounding boxes of two words intersect.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Counts keyword occurrences and keeps the `limit` most frequent.
///
/// Ties keep the order in which keywords first appear in `corpus`.
#[must_use]
pub fn cloud_words(corpus: &[String], limit: usize) -> Vec<CloudWord> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut words: Vec<CloudWord> = Vec::new();

    for keyword in corpus {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            continue;
        }
        match index.get(keyword) {
            Some(&slot) => words[slot].weight += 1,
            None => {
                index.insert(keyword, words.len());
                words.push(CloudWord {
                    text: keyword.to_string(),
                    weight: 1,
                });
            }
        }
    }

    // Stable sort keeps first-appearance order among equal weights.
    words.sort_by(|a, b| b.weight.cmp(&a.weight));
    words.truncate(limit);
    words
}

/// Font size scaled by the square root of relative frequency.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn font_size_for(weight: usize, max_weight: usize) -> u32 {
    if max_weight == 0 {
        return MIN_FONT_SIZE;
    }
    let ratio = (weight as f64 / max_weight as f64).sqrt();
    let span = f64::from(MAX_FONT_SIZE - MIN_FONT_SIZE);
    MIN_FONT_SIZE + (span * ratio).round() as u32
}

/// Places words left to right in rows, heaviest first.
///
/// `measure` returns the `(width, height)` of a word at a font size. Words
/// wider than the canvas are skipped; layout stops at the first row that
/// would cross the bottom edge. Every placed box lies inside the padded
/// canvas and no two boxes overlap.
pub fn layout_cloud<F>(words: &[CloudWord], canvas: CloudCanvas, mut measure: F) -> Vec<PlacedWord>
where
    F: FnMut(&str, u32) -> (u32, u32),
{
    let max_weight = words.iter().map(|word| word.weight).max().unwrap_or(0);
    let usable_right = canvas.width.saturating_sub(CANVAS_PADDING);
    let usable_bottom = canvas.height.saturating_sub(CANVAS_PADDING);

    let mut placed = Vec::with_capacity(words.len());
    let mut row: Vec<PlacedWord> = Vec::new();
    let mut cursor_x = CANVAS_PADDING;
    let mut row_top = CANVAS_PADDING;

    for word in words {
        let font_size = font_size_for(word.weight, max_weight);
        let (width, height) = measure(&word.text, font_size);
        if width == 0 || height == 0 || CANVAS_PADDING + width > usable_right {
            debug!(word = %word.text, "word does not fit the canvas width");
            continue;
        }

        if cursor_x + width > usable_right {
            let row_height = row.iter().map(|w| w.height).max().unwrap_or(0);
            placed.append(&mut row);
            row_top += row_height + ROW_GAP;
            cursor_x = CANVAS_PADDING;
        }
        if row_top + height > usable_bottom {
            // Taller words later in the row would also overflow; finish here.
            break;
        }

        row.push(PlacedWord {
            text: word.text.clone(),
            weight: word.weight,
            font_size,
            x: cursor_x,
            y: row_top,
            width,
            height,
        });
        cursor_x += width + WORD_GAP;
    }
    placed.append(&mut row);
    placed
}

/// Character-count estimate used when the backend cannot measure text.
fn approximate_extent(text: &str, font_size: u32) -> (u32, u32) {
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    (chars.saturating_mul(font_size).saturating_mul(3) / 5, font_size)
}

/// Text extent as measured by the backend, estimated when it cannot tell.
fn backend_extent<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    text: &str,
    font_size: u32,
) -> (u32, u32) {
    let style = TextStyle::from((CLOUD_FONT, font_size).into_font());
    root.estimate_text_size(text, &style)
        .unwrap_or_else(|_| approximate_extent(text, font_size))
}

/// Draws a laid-out cloud onto any plotters drawing area.
///
/// # Errors
///
/// Propagates backend drawing failures.
pub fn draw_cloud<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    words: &[CloudWord],
    canvas: CloudCanvas,
) -> Result<usize, DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let placed = layout_cloud(words, canvas, |text, size| backend_extent(root, text, size));

    for (index, word) in placed.iter().enumerate() {
        let color = PALETTE[index % PALETTE.len()];
        let style = (CLOUD_FONT, word.font_size).into_font().color(&color);
        let position = (
            i32::try_from(word.x).unwrap_or(i32::MAX),
            i32::try_from(word.y).unwrap_or(i32::MAX),
        );
        root.draw(&Text::new(word.text.as_str(), position, style))?;
    }
    Ok(placed.len())
}

/// Writes a word cloud SVG to `path`.
///
/// # Errors
///
/// Returns [`RenderError::Draw`] when the SVG cannot be produced or written.
#[instrument(skip(words), fields(path = %path.display(), words = words.len()))]
pub fn write_cloud_svg(path: &Path, words: &[CloudWord]) -> Result<(), RenderError> {
    let canvas = CloudCanvas::default();
    let root = SVGBackend::new(path, (canvas.width, canvas.height)).into_drawing_area();
    let placed = draw_cloud(&root, words, canvas).map_err(|error| RenderError::draw(path, error))?;
    root.present().map_err(|error| RenderError::draw(path, error))?;
    debug!(placed, "word cloud written");
    Ok(())
}
