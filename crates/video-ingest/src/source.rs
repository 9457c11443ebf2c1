//! Collaborator seams used by the scan loop: where frames come from and where
//! annotated frames go.

use image::RgbaImage;
use tracing::debug;

use crate::types::{CaptureError, FocusMode, Frame, PresentError};

/// Blocking frame producer with lens control.
pub trait FrameSource {
    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    fn set_focus_mode(&mut self, mode: FocusMode) -> Result<(), CaptureError>;

    /// Ask the lens to run a single focus sweep.
    fn trigger_autofocus(&mut self) -> Result<(), CaptureError>;
}

/// What the display layer observed while presenting a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Continue,
    Quit,
}

/// Consumer of annotated frames.
pub trait FrameSink {
    /// Show `image` and poll (without blocking) for a quit request.
    fn present(&mut self, image: &RgbaImage) -> Result<SinkEvent, PresentError>;
}

/// Sink for runs without a display; it never asks to quit on its own.
#[derive(Default)]
pub struct HeadlessSink {
    presented: u64,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl FrameSink for HeadlessSink {
    fn present(&mut self, image: &RgbaImage) -> Result<SinkEvent, PresentError> {
        self.presented = self.presented.wrapping_add(1);
        if self.presented % 300 == 0 {
            debug!(
                frames = self.presented,
                width = image.width(),
                height = image.height(),
                "headless sink heartbeat"
            );
        }
        Ok(SinkEvent::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_sink_counts_and_never_quits() {
        let mut sink = HeadlessSink::new();
        let image = RgbaImage::new(4, 4);
        for _ in 0..3 {
            assert_eq!(sink.present(&image).unwrap(), SinkEvent::Continue);
        }
        assert_eq!(sink.presented(), 3);
    }

    #[test]
    fn filled_frame_matches_expected_len() {
        let frame = Frame::filled(8, 6, [1, 2, 3]);
        assert_eq!(frame.data.len(), frame.expected_len());
        assert_eq!(&frame.data[..3], &[1, 2, 3]);
    }
}
