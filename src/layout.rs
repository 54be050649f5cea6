//! Reconstructs reading order from position-tagged fragments.
//!
//! Fragments are swept top to bottom and bucketed into lines by vertical
//! proximity to the first member of the open line; each line is then laid
//! out left to right, with horizontal gaps turned into runs of spaces.

use crate::error::OcrError;
use crate::recognizer::Recognition;
use std::io::Write;

/// Knobs controlling line grouping and horizontal spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    /// Maximum |y - reference y| for a fragment to join the open line.
    pub line_height_threshold: f32,
    /// Spaces emitted per pixel of horizontal gap.
    pub char_per_pixel: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            line_height_threshold: 10.0,
            char_per_pixel: 0.05,
        }
    }
}

impl LayoutParams {
    /// Rejects NaN and infinities. Zero and negative values are allowed and
    /// degrade predictably: a non-positive threshold only merges identical y
    /// values (or nothing), a non-positive density emits no spaces.
    pub fn new(line_height_threshold: f32, char_per_pixel: f32) -> Result<Self, OcrError> {
        if !line_height_threshold.is_finite() {
            return Err(OcrError::InvalidParameter(format!(
                "line height threshold must be finite, got {}",
                line_height_threshold
            )));
        }
        if !char_per_pixel.is_finite() {
            return Err(OcrError::InvalidParameter(format!(
                "chars per pixel must be finite, got {}",
                char_per_pixel
            )));
        }
        Ok(Self {
            line_height_threshold,
            char_per_pixel,
        })
    }
}

/// Fragment positioned within a line.
#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub x: f32,
    pub text: String,
}

/// Groups fragments into lines ordered top to bottom, members left to right.
pub fn group_lines(recognition: &Recognition, line_height_threshold: f32) -> Vec<Vec<Placed>> {
    let mut positions: Vec<(f32, f32, &str)> = recognition
        .fragments
        .iter()
        .map(|f| {
            let anchor = f.anchor();
            (anchor.x, anchor.y, f.text.as_str())
        })
        .collect();
    // Stable, so fragments sharing a y keep recognition order.
    positions.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut lines = Vec::new();
    let mut current: Vec<Placed> = Vec::new();
    let mut reference_y: Option<f32> = None;

    for (x, y, text) in positions {
        let placed = Placed {
            x,
            text: text.to_string(),
        };
        match reference_y {
            Some(ref_y) if (y - ref_y).abs() > line_height_threshold => {
                lines.push(close_line(std::mem::take(&mut current)));
                current.push(placed);
                reference_y = Some(y);
            }
            Some(_) => current.push(placed),
            None => {
                current.push(placed);
                reference_y = Some(y);
            }
        }
    }

    if !current.is_empty() {
        lines.push(close_line(current));
    }
    lines
}

fn close_line(mut line: Vec<Placed>) -> Vec<Placed> {
    line.sort_by(|a, b| a.x.total_cmp(&b.x).then_with(|| a.text.cmp(&b.text)));
    line
}

/// Spaces standing in for a horizontal gap of `gap` pixels, never negative.
pub fn gap_spaces(gap: f32, char_per_pixel: f32) -> usize {
    let spaces = (gap * char_per_pixel).floor();
    if spaces.is_nan() || spaces <= 0.0 {
        0
    } else {
        spaces as usize
    }
}

/// Renders one line; the first gap is measured from x = 0.
pub fn render_line(line: &[Placed], char_per_pixel: f32) -> String {
    let mut out = String::new();
    let mut last_x = 0.0;
    for placed in line {
        let spaces = gap_spaces(placed.x - last_x, char_per_pixel);
        out.extend(std::iter::repeat(' ').take(spaces));
        out.push_str(&placed.text);
        last_x = placed.x;
    }
    out
}

/// Full transcript; every line is newline terminated, no fragments means "".
pub fn transcribe(recognition: &Recognition, params: LayoutParams) -> String {
    let mut text = String::new();
    for line in group_lines(recognition, params.line_height_threshold) {
        text.push_str(&render_line(&line, params.char_per_pixel));
        text.push('\n');
    }
    text
}

/// Writes the transcript of `recognition` to `out`.
pub fn write_transcript(
    recognition: &Recognition,
    params: LayoutParams,
    mut out: impl Write,
) -> Result<(), OcrError> {
    out.write_all(transcribe(recognition, params).as_bytes())?;
    out.flush()?;
    Ok(())
}
