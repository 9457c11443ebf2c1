//! Per-frame scan loop: capture, detect, resolve, annotate, present.
//!
//! The loop is single-threaded. Capture, lookup, and forward are the only
//! blocking calls and each is bounded by its collaborator's timeout, so a slow
//! lookup stalls the video for at most that long. The [`DedupCache`] is owned
//! by the loop and only mutated through `&mut self`, which keeps the
//! one-lookup and one-forward guarantees per barcode without locking.

use std::{
    cell::Cell,
    collections::HashSet,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Once,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use image::RgbaImage;
use nutrition::{BarcodeId, Forward, LookupOutcome, NutritionLookup, NutritionRecord, ScanRecord};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};
use video_ingest::{CaptureError, FocusMode, FrameSink, FrameSource, PresentError, SinkEvent};

use crate::{
    annotation::{AnnotationError, OverlayRenderer, PanelRenderer, frame_to_canvas},
    cache::{CacheLookup, CacheValue, DedupCache},
    config::ScanConfig,
    detect::{BarcodeDecoder, Detection, ObjectDetector},
};

/// Failures that end the scan loop. Everything else is logged and absorbed.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("presentation failed: {0}")]
    Present(#[from] PresentError),
    #[error("captured frame is unusable: {0}")]
    MalformedFrame(#[source] AnnotationError),
}

/// What the overlay shows for a barcode in the current frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Resolved(Arc<NutritionRecord>),
    Unresolvable,
    /// A lookup is in flight elsewhere; shown as unknown for now.
    Pending,
}

impl Resolution {
    pub fn record(&self) -> Option<&Arc<NutritionRecord>> {
        match self {
            Resolution::Resolved(record) => Some(record),
            Resolution::Unresolvable | Resolution::Pending => None,
        }
    }
}

/// Per-frame outcome returned by [`ScanLoop::step`].
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub frame_number: u64,
    pub resolutions: Vec<(BarcodeId, Resolution)>,
    pub annotation_failures: usize,
    pub event: SinkEvent,
}

/// Session totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub frames: u64,
    pub detections: u64,
    pub lookups: u64,
    pub cache_hits: u64,
    pub forwards: u64,
    pub forward_failures: u64,
    pub annotation_failures: u64,
    pub cache_entries: usize,
    /// Cache entries that hold a nutrition record.
    pub resolved: usize,
}

/// Required collaborators for a scan session.
pub struct ScanComponents {
    pub source: Box<dyn FrameSource>,
    pub decoder: Box<dyn BarcodeDecoder>,
    pub lookup: Box<dyn NutritionLookup>,
    pub forwarder: Box<dyn Forward>,
    pub sink: Box<dyn FrameSink>,
}

/// Session context: the dedup cache, counters, and every collaborator.
pub struct ScanLoop {
    source: Box<dyn FrameSource>,
    decoder: Box<dyn BarcodeDecoder>,
    objects: Option<Box<dyn ObjectDetector>>,
    lookup: Box<dyn NutritionLookup>,
    forwarder: Box<dyn Forward>,
    renderer: Box<dyn OverlayRenderer>,
    sink: Box<dyn FrameSink>,
    shutdown: Option<Arc<AtomicBool>>,
    cache: DedupCache,
    config: ScanConfig,
    unknown: Arc<NutritionRecord>,
    summary: ScanSummary,
    /// Barcodes whose overlay already failed once; later failures log at debug.
    overlay_failed: HashSet<BarcodeId>,
}

impl ScanLoop {
    pub fn new(components: ScanComponents, config: ScanConfig) -> Self {
        Self {
            source: components.source,
            decoder: components.decoder,
            objects: None,
            lookup: components.lookup,
            forwarder: components.forwarder,
            renderer: Box::new(PanelRenderer::default()),
            sink: components.sink,
            shutdown: None,
            cache: DedupCache::new(),
            config,
            unknown: Arc::new(NutritionRecord::unknown()),
            summary: ScanSummary::default(),
            overlay_failed: HashSet::new(),
        }
    }

    pub fn with_object_detector(mut self, detector: Box<dyn ObjectDetector>) -> Self {
        self.objects = Some(detector);
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn OverlayRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Stop at the next frame boundary once `flag` is set.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            cache_entries: self.cache.len(),
            resolved: self.cache.resolved_count(),
            ..self.summary
        }
    }

    /// Camera start-up: warm up, enable continuous autofocus, run one sweep.
    /// Focus control failures are logged; cameras without autofocus still scan.
    pub fn prime(&mut self) {
        sleep(self.config.warmup);
        if let Err(err) = self.source.set_focus_mode(FocusMode::Continuous) {
            warn!("Could not enable continuous autofocus: {err}");
        }
        sleep(self.config.focus_settle);
        if let Err(err) = self.source.trigger_autofocus() {
            warn!("Initial autofocus trigger failed: {err}");
        }
        sleep(self.config.autofocus_settle);
    }

    /// Prime the camera, then scan until quit, shutdown, the frame limit, or a
    /// fatal capture/presentation error.
    pub fn run(&mut self) -> Result<ScanSummary, ScanError> {
        self.prime();
        info!("Scanner running... press 'q' to exit");

        loop {
            if self
                .shutdown
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::SeqCst))
            {
                info!("Shutdown requested, stopping scanner");
                break;
            }
            if self
                .config
                .max_frames
                .is_some_and(|limit| self.summary.frames >= limit)
            {
                info!(frames = self.summary.frames, "Frame limit reached");
                break;
            }

            let report = match self.step() {
                Ok(report) => report,
                Err(err) => {
                    error!("Scanner stopped: {err}");
                    return Err(err);
                }
            };
            if report.event == SinkEvent::Quit {
                info!("Quit requested");
                break;
            }
        }

        let summary = self.summary();
        info!(
            frames = summary.frames,
            lookups = summary.lookups,
            forwards = summary.forwards,
            cache_entries = summary.cache_entries,
            resolved = summary.resolved,
            "Scan session finished"
        );
        Ok(summary)
    }

    /// Run one full frame cycle.
    pub fn step(&mut self) -> Result<FrameReport, ScanError> {
        let frame = self.source.next_frame()?;
        let started = Instant::now();
        self.summary.frames += 1;
        let frame_number = self.summary.frames;
        let _frame_guard = info_span!("scan.frame", frame = frame_number).entered();
        metrics::counter!("scanner_frames_total").increment(1);

        if let Some(objects) = self.objects.as_mut() {
            match objects.detect(&frame) {
                Ok(count) => {
                    metrics::gauge!("scanner_objects_in_frame").set(count as f64);
                    debug!(objects = count, "object detector pass");
                }
                Err(err) => warn!("Object detector failed: {err:#}"),
            }
        }

        let detections = match self.decoder.decode(&frame) {
            Ok(detections) => detections,
            Err(err) => {
                warn!("Barcode decoding failed: {err:#}");
                Vec::new()
            }
        };
        self.summary.detections += detections.len() as u64;
        metrics::counter!("scanner_detections_total").increment(detections.len() as u64);

        let mut canvas = frame_to_canvas(&frame).map_err(ScanError::MalformedFrame)?;
        let mut resolutions = Vec::with_capacity(detections.len());
        let mut annotation_failures = 0;

        for detection in &detections {
            let resolution = self.resolve(&detection.barcode);
            let record = resolution.record().unwrap_or(&self.unknown).clone();
            if let Err(err) = annotate_isolated(&mut *self.renderer, &mut canvas, detection, &record)
            {
                if self.overlay_failed.insert(detection.barcode.clone()) {
                    warn!(barcode = %detection.barcode, "Error processing barcode overlay: {err}");
                } else {
                    debug!(barcode = %detection.barcode, "Error processing barcode overlay: {err}");
                }
                annotation_failures += 1;
                metrics::counter!("scanner_annotation_errors_total").increment(1);
            }
            resolutions.push((detection.barcode.clone(), resolution));
        }
        self.summary.annotation_failures += annotation_failures as u64;

        if self.config.refocus_interval > 0 && frame_number % self.config.refocus_interval == 0 {
            if let Err(err) = self.source.trigger_autofocus() {
                warn!("Periodic refocus failed: {err}");
            }
            sleep(self.config.refocus_settle);
        }

        let event = self.sink.present(&canvas)?;

        metrics::gauge!("scanner_cache_entries").set(self.cache.len() as f64);
        metrics::histogram!("scanner_frame_seconds").record(started.elapsed().as_secs_f64());

        Ok(FrameReport {
            frame_number,
            resolutions,
            annotation_failures,
            event,
        })
    }

    /// Consult the cache for `barcode`, performing the one permitted lookup on
    /// a miss. Forwards exactly when the entry first becomes resolved.
    pub fn resolve(&mut self, barcode: &BarcodeId) -> Resolution {
        match self.cache.get_or_mark_pending(barcode) {
            CacheLookup::Hit(record) => {
                self.note_hit();
                Resolution::Resolved(record)
            }
            CacheLookup::Unresolvable => {
                self.note_hit();
                Resolution::Unresolvable
            }
            CacheLookup::Pending => Resolution::Pending,
            CacheLookup::Miss => self.lookup_and_record(barcode),
        }
    }

    fn note_hit(&mut self) {
        self.summary.cache_hits += 1;
        metrics::counter!("scanner_cache_hits_total").increment(1);
    }

    fn lookup_and_record(&mut self, barcode: &BarcodeId) -> Resolution {
        let started = Instant::now();
        let outcome = info_span!("lookup", %barcode).in_scope(|| self.lookup.lookup(barcode));
        self.summary.lookups += 1;
        metrics::histogram!("scanner_lookup_seconds").record(started.elapsed().as_secs_f64());
        metrics::counter!("scanner_lookups_total", "outcome" => outcome.label()).increment(1);

        match outcome {
            LookupOutcome::Found(record) => {
                let record = Arc::new(record);
                if self
                    .cache
                    .insert(barcode.clone(), CacheValue::Resolved(record.clone()))
                {
                    info!(%barcode, product = record.product_name(), "Scanned barcode");
                    self.forward(barcode, &record);
                    return Resolution::Resolved(record);
                }
                self.current(barcode)
            }
            LookupOutcome::NotFound => {
                info!(%barcode, "Skipping unknown product");
                self.cache.insert(barcode.clone(), CacheValue::Unresolvable);
                self.current(barcode)
            }
            LookupOutcome::TransientError(reason) => {
                warn!(%barcode, "Skipping product after lookup error: {reason}");
                self.cache.insert(barcode.clone(), CacheValue::Unresolvable);
                self.current(barcode)
            }
        }
    }

    fn current(&self, barcode: &BarcodeId) -> Resolution {
        match self.cache.peek(barcode) {
            CacheLookup::Hit(record) => Resolution::Resolved(record),
            CacheLookup::Unresolvable => Resolution::Unresolvable,
            CacheLookup::Pending | CacheLookup::Miss => Resolution::Pending,
        }
    }

    fn forward(&mut self, barcode: &BarcodeId, record: &NutritionRecord) {
        let scan = ScanRecord::new(barcode.clone(), record);
        match self.forwarder.forward(&scan) {
            Ok(()) => {
                self.summary.forwards += 1;
                metrics::counter!("scanner_forwards_total", "result" => "ok").increment(1);
                info!(%barcode, "Sent to collector");
            }
            Err(err) => {
                self.summary.forward_failures += 1;
                metrics::counter!("scanner_forwards_total", "result" => "failed").increment(1);
                warn!(%barcode, "Failed to send to collector: {err}");
            }
        }
    }
}

thread_local! {
    static RENDERING: Cell<bool> = const { Cell::new(false) };
}

/// Chain a panic hook that keeps renderer panics caught by the scan loop off
/// stderr; the loop reports those through `tracing` itself. Any other panic
/// goes to the previously installed hook. Idempotent.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if RENDERING.with(Cell::get) {
                debug!("overlay renderer panicked: {info}");
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as inside a renderer call until dropped, which
/// also happens while unwinding.
struct RenderingGuard;

impl RenderingGuard {
    fn enter() -> Self {
        RENDERING.with(|flag| flag.set(true));
        Self
    }
}

impl Drop for RenderingGuard {
    fn drop(&mut self) {
        RENDERING.with(|flag| flag.set(false));
    }
}

/// Run the renderer for one detection, turning a panic into an error so the
/// rest of the frame still gets drawn.
fn annotate_isolated(
    renderer: &mut dyn OverlayRenderer,
    canvas: &mut RgbaImage,
    detection: &Detection,
    record: &NutritionRecord,
) -> Result<(), AnnotationError> {
    match panic::catch_unwind(AssertUnwindSafe(|| {
        let _rendering = RenderingGuard::enter();
        renderer.render(canvas, detection, record)
    })) {
        Ok(result) => result,
        Err(payload) => Err(AnnotationError::Renderer(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

fn sleep(duration: std::time::Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
