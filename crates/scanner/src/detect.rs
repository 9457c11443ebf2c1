use anyhow::Result;
use nutrition::BarcodeId;
use video_ingest::Frame;

/// Axis-aligned box in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box enclosing `points`.
    pub fn enclosing(points: &[(f32, f32)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let (mut min_x, mut min_y) = *first;
        let (mut max_x, mut max_y) = *first;
        for &(x, y) in rest {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let x = min_x.floor() as i32;
        let y = min_y.floor() as i32;
        Some(Self::new(
            x,
            y,
            (max_x.ceil() as i32 - x).max(0),
            (max_y.ceil() as i32 - y).max(0),
        ))
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
}

/// One barcode found in one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub barcode: BarcodeId,
    pub bbox: BoundingBox,
    /// Symbology reported by the decoder, e.g. `EAN_13`.
    pub symbology: Option<String>,
}

impl Detection {
    pub fn new(barcode: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            barcode: BarcodeId::new(barcode),
            bbox,
            symbology: None,
        }
    }

    pub fn with_symbology(mut self, symbology: impl Into<String>) -> Self {
        self.symbology = Some(symbology.into());
        self
    }
}

/// Barcode decoder collaborator. Detections are returned in decoder order.
pub trait BarcodeDecoder {
    fn decode(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// General object detector run once per frame. Its output is telemetry only;
/// it never feeds the cache or the forwarder.
pub trait ObjectDetector {
    /// Returns the number of objects detected in `frame`.
    fn detect(&mut self, frame: &Frame) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_box_covers_rotated_corners() {
        let bbox = BoundingBox::enclosing(&[(10.2, 20.0), (50.0, 18.5), (52.7, 40.0), (11.0, 41.2)])
            .unwrap();
        assert_eq!(bbox, BoundingBox::new(10, 18, 43, 24));
        assert_eq!(bbox.right(), 53);
        assert_eq!(bbox.bottom(), 42);
        assert!(BoundingBox::enclosing(&[]).is_none());
    }
}
