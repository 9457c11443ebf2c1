//! Host-side tensor preparation shared by every detector backend.

use anyhow::{Result, bail};
use video_ingest::{Frame, FrameFormat};

pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const MAX_PREDICTIONS: usize = 512;

/// Resize a BGR frame to `size`x`size` (nearest neighbour) and lay it out as
/// normalized RGB planes, `[3, size, size]` in row-major order.
pub fn frame_to_chw(frame: &Frame, size: u32) -> Result<Vec<f32>> {
    if !matches!(frame.format, FrameFormat::Bgr8) {
        bail!("unsupported frame format");
    }
    if frame.width <= 0 || frame.height <= 0 || size == 0 {
        bail!("empty frame or detector input");
    }
    if frame.data.len() != frame.expected_len() {
        bail!(
            "unexpected frame buffer size: got {} bytes, expected {}",
            frame.data.len(),
            frame.expected_len()
        );
    }

    let side = size as usize;
    let plane = side * side;
    let mut out = vec![0.0f32; plane * 3];
    for y in 0..side {
        let src_y = y * frame.height as usize / side;
        for x in 0..side {
            let src_x = x * frame.width as usize / side;
            let px = (src_y * frame.width as usize + src_x) * 3;
            let [b, g, r] = [frame.data[px], frame.data[px + 1], frame.data[px + 2]];
            let dst = y * side + x;
            out[dst] = f32::from(r) / 255.0;
            out[plane + dst] = f32::from(g) / 255.0;
            out[2 * plane + dst] = f32::from(b) / 255.0;
        }
    }
    Ok(out)
}

/// Count prediction rows (`x, y, w, h, conf, ..`) at or above `threshold`,
/// capped at [`MAX_PREDICTIONS`].
pub fn count_confident(rows: &[Vec<f32>], threshold: f32) -> usize {
    rows.iter()
        .filter(|row| row.len() >= 5 && row[4] >= threshold)
        .take(MAX_PREDICTIONS)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planes_are_rgb_and_normalized() {
        let frame = Frame::filled(4, 2, [0, 51, 255]);
        let chw = frame_to_chw(&frame, 2).unwrap();
        assert_eq!(chw.len(), 12);
        assert!(chw[..4].iter().all(|v| (*v - 1.0).abs() < f32::EPSILON));
        assert!(chw[4..8].iter().all(|v| (*v - 0.2).abs() < 1e-6));
        assert!(chw[8..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut frame = Frame::filled(4, 4, [1, 2, 3]);
        frame.data.truncate(10);
        assert!(frame_to_chw(&frame, 8).is_err());
    }

    #[test]
    fn only_confident_rows_are_counted() {
        let rows = vec![
            vec![0.0, 0.0, 10.0, 10.0, 0.9],
            vec![0.0, 0.0, 10.0, 10.0, 0.1, 3.0],
            vec![0.0, 0.0, 10.0],
            vec![5.0, 5.0, 1.0, 1.0, DEFAULT_CONFIDENCE],
        ];
        assert_eq!(count_confident(&rows, DEFAULT_CONFIDENCE), 2);
    }
}
