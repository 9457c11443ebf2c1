//! OpenCV `objdetect` barcode decoder.

use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Point2f, Vector},
    objdetect::BarcodeDetector,
    prelude::*,
};
use video_ingest::{Frame, FrameFormat};

use crate::detect::{BarcodeDecoder, BoundingBox, Detection};

pub struct OpencvBarcodeDecoder {
    detector: BarcodeDetector,
}

impl OpencvBarcodeDecoder {
    pub fn new() -> Result<Self> {
        let detector = BarcodeDetector::default().context("failed to create barcode detector")?;
        Ok(Self { detector })
    }
}

impl BarcodeDecoder for OpencvBarcodeDecoder {
    fn decode(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        if !matches!(frame.format, FrameFormat::Bgr8) {
            anyhow::bail!("unsupported frame format");
        }
        let flat = Mat::from_slice(frame.data.as_slice())?;
        let bgr = flat.reshape(3, frame.height)?;

        let mut decoded = Vector::<String>::new();
        let mut types = Vector::<String>::new();
        let mut points = Mat::default();
        let found = self
            .detector
            .detect_and_decode_with_type(&*bgr, &mut decoded, &mut types, &mut points)
            .context("barcode detection failed")?;
        if !found || decoded.is_empty() {
            return Ok(Vec::new());
        }

        // Four corners per decoded symbol, in decoder order.
        let corners: Vec<(f32, f32)> = if points.empty() {
            Vec::new()
        } else {
            points
                .reshape(2, 0)?
                .data_typed::<Point2f>()?
                .iter()
                .map(|p| (p.x, p.y))
                .collect()
        };

        let mut detections = Vec::with_capacity(decoded.len());
        for (idx, payload) in decoded.iter().enumerate() {
            if payload.is_empty() {
                continue;
            }
            let quad = corners.get(idx * 4..idx * 4 + 4).unwrap_or(&[]);
            let bbox = BoundingBox::enclosing(quad).unwrap_or_default();
            let mut detection = Detection::new(payload, bbox);
            if let Ok(kind) = types.get(idx) {
                if !kind.is_empty() {
                    detection = detection.with_symbology(kind);
                }
            }
            detections.push(detection);
        }
        Ok(detections)
    }
}
