//! Overlay drawing: bounding boxes, product labels, and the nutrition panel.
//!
//! Text uses a built-in 5x7 bitmap font so the overlay has no font-file
//! dependency. Glyphs are upper-case only; lower-case input is folded.

use image::{ImageBuffer, Rgba, RgbaImage};
use nutrition::NutritionRecord;
use thiserror::Error;
use video_ingest::{Frame, FrameFormat};

use crate::detect::{BoundingBox, Detection};

const GLYPH_ADVANCE: i32 = 6;
const GLYPH_HEIGHT: i32 = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    FrameSize {
        width: i32,
        height: i32,
        expected: usize,
        actual: usize,
    },
    #[error("detection has degenerate geometry {0:?}")]
    EmptyGeometry(BoundingBox),
    #[error("detection {0:?} lies outside the {1}x{2} frame")]
    OutsideFrame(BoundingBox, u32, u32),
    #[error("renderer failed: {0}")]
    Renderer(String),
}

/// Draws one detection's overlay onto the frame canvas.
pub trait OverlayRenderer {
    fn render(
        &mut self,
        canvas: &mut RgbaImage,
        detection: &Detection,
        record: &NutritionRecord,
    ) -> Result<(), AnnotationError>;
}

/// Box, name label above the box, and a translucent nutrient panel below it.
#[derive(Clone, Debug)]
pub struct PanelRenderer {
    pub box_color: Rgba<u8>,
    pub text_color: Rgba<u8>,
    pub panel_color: Rgba<u8>,
    pub panel_alpha: f32,
    pub panel_width: i32,
    pub line_spacing: i32,
}

impl Default for PanelRenderer {
    fn default() -> Self {
        Self {
            box_color: Rgba([0, 255, 0, 255]),
            text_color: Rgba([255, 255, 255, 255]),
            panel_color: Rgba([0, 0, 0, 255]),
            panel_alpha: 0.5,
            panel_width: 220,
            line_spacing: 12,
        }
    }
}

impl OverlayRenderer for PanelRenderer {
    fn render(
        &mut self,
        canvas: &mut RgbaImage,
        detection: &Detection,
        record: &NutritionRecord,
    ) -> Result<(), AnnotationError> {
        let bbox = detection.bbox;
        if bbox.width <= 0 || bbox.height <= 0 {
            return Err(AnnotationError::EmptyGeometry(bbox));
        }
        let (width, height) = canvas.dimensions();
        if bbox.right() <= 0 || bbox.bottom() <= 0 || bbox.x >= width as i32 || bbox.y >= height as i32
        {
            return Err(AnnotationError::OutsideFrame(bbox, width, height));
        }

        // Two-pixel outline.
        draw_rectangle(canvas, bbox.x, bbox.y, bbox.right(), bbox.bottom(), self.box_color);
        draw_rectangle(
            canvas,
            bbox.x + 1,
            bbox.y + 1,
            bbox.right() - 1,
            bbox.bottom() - 1,
            self.box_color,
        );

        let label = format!("{} ({})", record.product_name(), detection.barcode);
        let label_y = (bbox.y - GLYPH_HEIGHT - 3).max(0);
        draw_label(canvas, bbox.x, label_y, &label, self.box_color);

        let lines = record.panel_lines();
        let panel_x = bbox.x;
        let panel_y = bbox.bottom() + 10;
        let panel_bottom = panel_y + self.line_spacing * lines.len() as i32 + 10;
        blend_rect(
            canvas,
            panel_x,
            panel_y,
            panel_x + self.panel_width,
            panel_bottom,
            self.panel_color,
            self.panel_alpha,
        );
        for (i, line) in lines.iter().enumerate() {
            let line_y = panel_y + 5 + i as i32 * self.line_spacing;
            draw_label(canvas, panel_x + 5, line_y, line, self.text_color);
        }
        Ok(())
    }
}

/// Convert a captured frame into an RGBA canvas for drawing.
pub fn frame_to_canvas(frame: &Frame) -> Result<RgbaImage, AnnotationError> {
    let expected = frame.expected_len();
    if frame.width <= 0 || frame.height <= 0 || frame.data.len() != expected {
        return Err(AnnotationError::FrameSize {
            width: frame.width,
            height: frame.height,
            expected,
            actual: frame.data.len(),
        });
    }
    let rgba = match frame.format {
        FrameFormat::Bgr8 => bgr_to_rgba(&frame.data),
    };
    ImageBuffer::from_vec(frame.width as u32, frame.height as u32, rgba).ok_or(
        AnnotationError::FrameSize {
            width: frame.width,
            height: frame.height,
            expected,
            actual: frame.data.len(),
        },
    )
}

fn bgr_to_rgba(input: &[u8]) -> Vec<u8> {
    let pixels = input.len() / 3;
    let mut output = Vec::with_capacity(pixels * 4);
    for chunk in input.chunks_exact(3) {
        output.push(chunk[2]);
        output.push(chunk[1]);
        output.push(chunk[0]);
        output.push(255);
    }
    output
}

/// Clamp an inclusive span to the canvas. `None` when nothing remains.
fn clamp_span(lo: i32, hi: i32, limit: u32) -> Option<(u32, u32)> {
    let max = limit as i32 - 1;
    if limit == 0 || hi < 0 || lo > max || hi < lo {
        return None;
    }
    Some((lo.max(0) as u32, hi.min(max) as u32))
}

fn draw_rectangle(
    image: &mut RgbaImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: Rgba<u8>,
) {
    let (width, height) = image.dimensions();
    let in_x = |x: i32| x >= 0 && x < width as i32;
    let in_y = |y: i32| y >= 0 && y < height as i32;

    if let Some((x0, x1)) = clamp_span(left, right, width) {
        for x in x0..=x1 {
            if in_y(top) {
                image.put_pixel(x, top as u32, color);
            }
            if in_y(bottom) {
                image.put_pixel(x, bottom as u32, color);
            }
        }
    }
    if let Some((y0, y1)) = clamp_span(top, bottom, height) {
        for y in y0..=y1 {
            if in_x(left) {
                image.put_pixel(left as u32, y, color);
            }
            if in_x(right) {
                image.put_pixel(right as u32, y, color);
            }
        }
    }
}

/// Alpha-blend `color` over the rectangle: `out = alpha * color + (1 - alpha) * pixel`.
fn blend_rect(
    image: &mut RgbaImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: Rgba<u8>,
    alpha: f32,
) {
    let (width, height) = image.dimensions();
    let (Some((x0, x1)), Some((y0, y1))) = (
        clamp_span(left, right, width),
        clamp_span(top, bottom, height),
    ) else {
        return;
    };
    let alpha = alpha.clamp(0.0, 1.0);
    for y in y0..=y1 {
        for x in x0..=x1 {
            let pixel = image.get_pixel_mut(x, y);
            for channel in 0..3 {
                let blended =
                    alpha * color.0[channel] as f32 + (1.0 - alpha) * pixel.0[channel] as f32;
                pixel.0[channel] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn draw_label(image: &mut RgbaImage, mut x: i32, y: i32, text: &str, color: Rgba<u8>) {
    let (width, height) = image.dimensions();
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        let glyph = glyph_bits(ch).unwrap_or(UNKNOWN_GLYPH);
        for (row, pattern) in glyph.iter().enumerate() {
            let py = y + row as i32;
            if py < 0 || py >= height as i32 {
                continue;
            }
            for col in 0..5 {
                if (pattern >> (4 - col)) & 1 == 1 {
                    let px = x + col;
                    if px >= 0 && px < width as i32 {
                        image.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}

const UNKNOWN_GLYPH: [u8; 7] = [
    0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100,
];

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let bits = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ':' => [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0],
        '/' => [0, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        ',' => [0, 0, 0, 0, 0b00110, 0b00100, 0b01000],
        '\'' => [0b00100, 0b00100, 0b01000, 0, 0, 0, 0],
        '%' => [0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(bits)
}
