//! OpenCV HighGUI window sink.

use image::RgbaImage;
use opencv::{core::Mat, highgui, imgproc, prelude::*};

use crate::{
    source::{FrameSink, SinkEvent},
    types::PresentError,
};

/// Presents frames in a desktop window and quits when `quit_key` is pressed.
pub struct WindowSink {
    title: String,
    quit_key: char,
    scratch: Mat,
}

impl WindowSink {
    pub fn open(title: impl Into<String>, quit_key: char) -> Result<Self, PresentError> {
        let title = title.into();
        highgui::named_window(&title, highgui::WINDOW_AUTOSIZE)
            .map_err(|_| PresentError::Window {
                title: title.clone(),
            })?;
        Ok(Self {
            title,
            quit_key,
            scratch: Mat::default(),
        })
    }
}

impl FrameSink for WindowSink {
    fn present(&mut self, image: &RgbaImage) -> Result<SinkEvent, PresentError> {
        let flat = Mat::from_slice(image.as_raw().as_slice())
            .map_err(|e| PresentError::Other(e.into()))?;
        let rgba = flat
            .reshape(4, image.height() as i32)
            .map_err(|e| PresentError::Other(e.into()))?;
        imgproc::cvt_color_def(&rgba, &mut self.scratch, imgproc::COLOR_RGBA2BGR)
            .map_err(|e| PresentError::Other(e.into()))?;
        highgui::imshow(&self.title, &self.scratch).map_err(|e| PresentError::Other(e.into()))?;

        let key = highgui::wait_key(1).map_err(|e| PresentError::Other(e.into()))?;
        if key >= 0 && (key & 0xFF) as u8 == self.quit_key as u8 {
            return Ok(SinkEvent::Quit);
        }
        Ok(SinkEvent::Continue)
    }
}

impl Drop for WindowSink {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.title);
    }
}
