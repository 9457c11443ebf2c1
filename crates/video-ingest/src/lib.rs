//! Frame acquisition and presentation collaborators.
//!
//! The scan loop only talks to the [`FrameSource`] and [`FrameSink`] traits;
//! OpenCV-backed implementations are available with the `with-opencv` feature.

#[cfg(feature = "with-opencv")]
mod camera;
#[cfg(feature = "with-opencv")]
mod display;
mod source;
mod types;

#[cfg(feature = "with-opencv")]
pub use camera::CameraSource;
#[cfg(feature = "with-opencv")]
pub use display::WindowSink;
pub use source::{FrameSink, FrameSource, HeadlessSink, SinkEvent};
pub use types::{CaptureError, FocusMode, Frame, FrameFormat, PresentError};
