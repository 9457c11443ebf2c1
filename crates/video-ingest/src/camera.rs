//! OpenCV-backed camera capture.

use chrono::Utc;
use opencv::{
    core::{self, MatTraitConstManual},
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait},
};
use tracing::{debug, warn};

use crate::{
    source::FrameSource,
    types::{CaptureError, FocusMode, Frame, FrameFormat},
};

/// Consecutive empty reads tolerated before the device is considered lost.
const MAX_EMPTY_READS: u32 = 50;

/// Synchronous camera reader; every `next_frame` call blocks on the device.
pub struct CameraSource {
    cap: VideoCapture,
    target_size: (i32, i32),
    frame: Mat,
    scratch: Mat,
}

impl CameraSource {
    /// Open `uri` (device index, `/dev/videoX`, or any OpenCV-readable URI) and
    /// request `target_size` frames.
    pub fn open(uri: &str, target_size: (i32, i32)) -> Result<Self, CaptureError> {
        let mut cap = open_video_capture(uri)?;
        configure_camera(&mut cap, target_size, 30.0);
        Ok(Self {
            cap,
            target_size,
            frame: Mat::default(),
            scratch: Mat::default(),
        })
    }

    fn set_property(
        &mut self,
        prop: i32,
        value: f64,
        control: &'static str,
    ) -> Result<(), CaptureError> {
        match self.cap.set(prop, value) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CaptureError::Control { control }),
            Err(err) => Err(CaptureError::Other(err.into())),
        }
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let (target_w, target_h) = self.target_size;
        let mut empty_reads = 0;

        loop {
            let grabbed = self
                .cap
                .read(&mut self.frame)
                .map_err(|e| CaptureError::Other(e.into()))?;
            let size = self.frame.size().map_err(|e| CaptureError::Other(e.into()))?;
            if !grabbed || size.width <= 0 {
                empty_reads += 1;
                if empty_reads >= MAX_EMPTY_READS {
                    return Err(CaptureError::Stalled {
                        attempts: empty_reads,
                    });
                }
                continue;
            }

            let working = if size.width != target_w || size.height != target_h {
                opencv::imgproc::resize(
                    &self.frame,
                    &mut self.scratch,
                    core::Size {
                        width: target_w,
                        height: target_h,
                    },
                    0.0,
                    0.0,
                    opencv::imgproc::INTER_LINEAR,
                )
                .map_err(|e| CaptureError::Other(e.into()))?;
                &self.scratch
            } else {
                &self.frame
            };

            let data = working
                .data_bytes()
                .map_err(|e| CaptureError::Other(e.into()))?
                .to_vec();

            return Ok(Frame {
                data,
                width: target_w,
                height: target_h,
                timestamp_ms: Utc::now().timestamp_millis(),
                format: FrameFormat::Bgr8,
            });
        }
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> Result<(), CaptureError> {
        let value = match mode {
            FocusMode::Manual => 0.0,
            FocusMode::Continuous => 1.0,
        };
        debug!(?mode, "setting focus mode");
        self.set_property(videoio::CAP_PROP_AUTOFOCUS, value, "autofocus")
    }

    fn trigger_autofocus(&mut self) -> Result<(), CaptureError> {
        // UVC exposes no one-shot trigger; toggling autofocus restarts the sweep.
        self.set_property(videoio::CAP_PROP_AUTOFOCUS, 0.0, "autofocus")?;
        self.set_property(videoio::CAP_PROP_AUTOFOCUS, 1.0, "autofocus")
    }
}

/// Where a capture comes from: a V4L device number or anything OpenCV can open
/// by name (files, RTSP, GStreamer pipelines).
#[derive(Debug, PartialEq, Eq)]
enum Device<'a> {
    Index(i32),
    Named(&'a str),
}

impl<'a> Device<'a> {
    fn from_uri(uri: &'a str) -> Self {
        let digits = uri.strip_prefix("/dev/video").unwrap_or(uri);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = digits.parse() {
                return Device::Index(index);
            }
        }
        Device::Named(uri)
    }

    fn open(&self, backend: i32) -> opencv::Result<VideoCapture> {
        match *self {
            Device::Index(index) => VideoCapture::new(index, backend),
            Device::Named(name) => VideoCapture::from_file(name, backend),
        }
    }
}

/// Try V4L first, then whatever backend OpenCV picks; a numeric device that
/// fails both is retried by name.
fn open_video_capture(uri: &str) -> Result<VideoCapture, CaptureError> {
    let primary = Device::from_uri(uri);
    let fallback = matches!(primary, Device::Index(_)).then_some(Device::Named(uri));

    for device in std::iter::once(primary).chain(fallback) {
        for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
            match device.open(backend).and_then(|cap| Ok((cap.is_opened()?, cap))) {
                Ok((true, cap)) => {
                    debug!(?device, backend, "camera opened");
                    return Ok(cap);
                }
                Ok((false, _)) => debug!(?device, backend, "camera not opened"),
                Err(err) => warn!(?device, backend, "camera open failed: {err}"),
            }
        }
    }

    Err(CaptureError::Open {
        uri: uri.to_string(),
    })
}

/// Request MJPG at `target_size` and `fps`. Drivers may ignore any of these;
/// frames are resized on read regardless.
fn configure_camera(cap: &mut VideoCapture, target_size: (i32, i32), fps: f64) {
    let mut settings = vec![
        ("frame_width", videoio::CAP_PROP_FRAME_WIDTH, f64::from(target_size.0)),
        ("frame_height", videoio::CAP_PROP_FRAME_HEIGHT, f64::from(target_size.1)),
        ("fps", videoio::CAP_PROP_FPS, fps),
    ];
    if let Ok(mjpg) = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G') {
        settings.insert(0, ("fourcc", videoio::CAP_PROP_FOURCC, f64::from(mjpg)));
    }

    let rejected: Vec<&str> = settings
        .into_iter()
        .filter(|(_, prop, value)| !matches!(cap.set(*prop, *value), Ok(true)))
        .map(|(name, _, _)| name)
        .collect();
    if !rejected.is_empty() {
        debug!(?rejected, "camera ignored capture settings");
    }
}
