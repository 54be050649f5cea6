//! Draws recognized text back onto an image.

use crate::fonts::SizedFont;
use crate::recognizer::Recognition;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Pixels the text is raised above its anchor.
pub const BASELINE_LIFT: f32 = 10.0;

/// Paints every pixel white, in place.
pub fn blank(image: &mut RgbImage) {
    for pixel in image.pixels_mut() {
        *pixel = WHITE;
    }
}

/// Draws each fragment at `(anchor.x, anchor.y - BASELINE_LIFT)` in black.
/// Overlapping fragments are painted in recognition order.
pub fn draw_fragments(image: &mut RgbImage, recognition: &Recognition, font: &SizedFont) {
    for fragment in &recognition.fragments {
        if fragment.text.is_empty() {
            continue;
        }
        let anchor = fragment.anchor();
        draw_text_mut(
            image,
            INK,
            anchor.x as i32,
            (anchor.y - BASELINE_LIFT) as i32,
            font.scale,
            &font.font,
            &fragment.text,
        );
    }
}
