//! Barcode scan loop with a session-scoped nutrition dedup cache.
//!
//! - `cache`: the per-session barcode → nutrition map.
//! - `detect`: detection types and detector collaborator traits.
//! - `annotation`: overlay rendering on RGBA canvases.
//! - `session`: the capture → detect → resolve → annotate → present loop.
//! - `config`: loop timing.

pub mod annotation;
pub mod cache;
mod config;
mod detect;
#[cfg(feature = "with-opencv")]
mod opencv_decoder;
mod session;

pub use annotation::{AnnotationError, OverlayRenderer, PanelRenderer};
pub use cache::{CacheEntry, CacheLookup, CacheValue, DedupCache};
pub use config::ScanConfig;
pub use detect::{BarcodeDecoder, BoundingBox, Detection, ObjectDetector};
#[cfg(feature = "with-opencv")]
pub use opencv_decoder::OpencvBarcodeDecoder;
pub use session::{
    FrameReport, Resolution, ScanComponents, ScanError, ScanLoop, ScanSummary, install_panic_hook,
};
