use chrono::Utc;
use thiserror::Error;

/// Raw frame captured from a video source.
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

impl Frame {
    /// Wrap a packed BGR8 buffer, stamping it with the current wall clock.
    pub fn from_bgr(data: Vec<u8>, width: i32, height: i32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Bgr8,
        }
    }

    /// Solid-colour frame, mostly useful for tests and placeholder output.
    pub fn filled(width: i32, height: i32, bgr: [u8; 3]) -> Self {
        let pixels = (width.max(0) as usize) * (height.max(0) as usize);
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&bgr);
        }
        Self::from_bgr(data, width, height)
    }

    /// Expected buffer size for the frame dimensions and format.
    pub fn expected_len(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize) * self.format.channels()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Bgr8,
}

impl FrameFormat {
    pub fn channels(self) -> usize {
        match self {
            FrameFormat::Bgr8 => 3,
        }
    }
}

/// Lens focus behaviour requested from the capture device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusMode {
    Manual,
    Continuous,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open video source {uri:?}")]
    Open { uri: String },
    #[error("video source stopped producing frames after {attempts} empty reads")]
    Stalled { attempts: u32 },
    #[error("capture device rejected control {control}")]
    Control { control: &'static str },
    #[error("frame source exhausted")]
    Exhausted,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("failed to create display window {title:?}")]
    Window { title: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
