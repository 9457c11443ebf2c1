//! Wiring for the `scan` subcommand: camera, decoder, clients, and display.

use std::sync::{
    Arc, Once,
    atomic::{AtomicBool, Ordering},
};

#[cfg(not(feature = "with-opencv"))]
use anyhow::bail;
use anyhow::{Context, Result};
use nutrition::{CollectorForwarder, OpenFoodFactsClient};
use scanner::{BarcodeDecoder, ScanComponents, ScanLoop, ScanSummary, install_panic_hook};
use tracing::{info, warn};
use video_ingest::{FrameSink, FrameSource};

use crate::config::ScannerConfig;

const WINDOW_TITLE: &str = "Smart Nutrition Scanner";

/// Run one scan session until quit, Ctrl-C, the frame limit, or a fatal
/// capture/presentation error.
pub fn run(config: ScannerConfig) -> Result<ScanSummary> {
    static CTRL_HANDLER: Once = Once::new();

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_shutdown = shutdown.clone();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler(move || {
            handler_shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });

    install_panic_hook();

    let (source, decoder, sink) = open_devices(&config)?;
    let lookup = OpenFoodFactsClient::new(config.lookup_url.clone(), config.lookup_timeout)
        .context("failed to create nutrition lookup client")?;
    let forwarder = CollectorForwarder::new(config.collector_url.clone(), config.forward_timeout)
        .context("failed to create collector client")?;
    info!(
        source = %config.source,
        lookup = %config.lookup_url,
        collector = forwarder.url(),
        "Starting scan session"
    );

    let scan = ScanLoop::new(
        ScanComponents {
            source,
            decoder,
            lookup: Box::new(lookup),
            forwarder: Box::new(forwarder),
            sink,
        },
        config.session.clone(),
    )
    .with_shutdown(shutdown);
    let mut scan = attach_object_detector(scan, &config)?;

    scan.run().context("scan session failed")
}

type Devices = (
    Box<dyn FrameSource>,
    Box<dyn BarcodeDecoder>,
    Box<dyn FrameSink>,
);

#[cfg(feature = "with-opencv")]
fn open_devices(config: &ScannerConfig) -> Result<Devices> {
    use scanner::OpencvBarcodeDecoder;
    use video_ingest::{CameraSource, HeadlessSink, WindowSink};

    let source = CameraSource::open(&config.source, (config.width, config.height))
        .with_context(|| format!("failed to open camera {}", config.source))?;
    let decoder = OpencvBarcodeDecoder::new()?;
    let sink: Box<dyn FrameSink> = if config.headless {
        Box::new(HeadlessSink::new())
    } else {
        Box::new(WindowSink::open(WINDOW_TITLE, 'q').context("failed to open preview window")?)
    };
    Ok((Box::new(source), Box::new(decoder), sink))
}

#[cfg(not(feature = "with-opencv"))]
fn open_devices(config: &ScannerConfig) -> Result<Devices> {
    bail!(
        "cannot open camera {} ({WINDOW_TITLE}): built without camera support, rebuild with `--features with-opencv`",
        config.source
    )
}

#[cfg(feature = "with-tch")]
fn attach_object_detector(scan: ScanLoop, config: &ScannerConfig) -> Result<ScanLoop> {
    let Some(path) = config.model_path.as_ref() else {
        return Ok(scan);
    };
    let detector = ml_core::TorchObjectDetector::new(path, config.detector_size)
        .with_context(|| format!("failed to load object detector {}", path.display()))?;
    Ok(scan.with_object_detector(Box::new(detector)))
}

#[cfg(not(feature = "with-tch"))]
fn attach_object_detector(scan: ScanLoop, config: &ScannerConfig) -> Result<ScanLoop> {
    if let Some(path) = config.model_path.as_ref() {
        warn!(
            model = %path.display(),
            "Object detector requested but this build lacks `with-tch`; continuing without it"
        );
    }
    Ok(scan)
}
