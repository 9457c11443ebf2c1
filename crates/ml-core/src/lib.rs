//! Object detection for scene telemetry. The scan loop only consumes the
//! per-frame object count; barcode payloads come from the decoder.

pub mod preprocess;

#[cfg(feature = "with-tch")]
mod detector;

#[cfg(feature = "with-tch")]
pub use detector::TorchObjectDetector;
pub use preprocess::{DEFAULT_CONFIDENCE, MAX_PREDICTIONS, count_confident, frame_to_chw};

#[cfg(feature = "with-tch")]
pub use tch;
