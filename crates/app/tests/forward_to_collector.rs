use std::{fs, net::SocketAddr, time::Duration};

use actix_web::web;
use image::RgbaImage;
use nutriscan::collector::{CollectorState, ScanLog, spawn_collector};
use nutrition::{
    BarcodeId, CollectorForwarder, Forward, ForwardError, LookupOutcome, Nutrient,
    NutritionLookup, NutritionRecord, ScanRecord,
};
use scanner::{BarcodeDecoder, BoundingBox, Detection, ScanComponents, ScanConfig, ScanLoop};
use video_ingest::{
    CaptureError, FocusMode, Frame, FrameSink, FrameSource, PresentError, SinkEvent,
};

fn ephemeral() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn record(name: &str) -> NutritionRecord {
    NutritionRecord::new(
        Some(name.into()),
        Nutrient::Value(52.0),
        Nutrient::Value(0.3),
        Nutrient::Value(10.4),
        Nutrient::Value(14.0),
        Nutrient::Unavailable,
    )
}

#[test]
fn forwarder_delivers_to_running_collector() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("scanned_log.csv");
    let state = web::Data::new(CollectorState::new(ScanLog::open(&log_path).unwrap()));
    let server = spawn_collector(ephemeral(), state.clone()).unwrap();

    let forwarder = CollectorForwarder::new(
        format!("http://{}/scan", server.addr()),
        Duration::from_secs(5),
    )
    .unwrap();
    let scan = ScanRecord::new(BarcodeId::new("012345"), &record("Apple"));
    forwarder.forward(&scan).unwrap();

    assert_eq!(state.scans(), vec![scan]);
    let csv = fs::read_to_string(&log_path).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.lines().nth(1).unwrap().ends_with(",012345,Apple,52,0.3,10.4,14,N/A"));

    server.stop();
}

#[test]
fn stopped_collector_is_a_transport_failure() {
    let dir = tempfile::tempdir().unwrap();
    let state = web::Data::new(CollectorState::new(
        ScanLog::open(dir.path().join("log.csv")).unwrap(),
    ));
    let server = spawn_collector(ephemeral(), state).unwrap();
    let url = format!("http://{}/scan", server.addr());
    server.stop();

    let forwarder = CollectorForwarder::new(url, Duration::from_secs(2)).unwrap();
    let scan = ScanRecord::new(BarcodeId::new("1"), &record("Gone"));
    assert!(matches!(
        forwarder.forward(&scan),
        Err(ForwardError::Transport(_))
    ));
}

struct StillCamera {
    frames: usize,
}

impl FrameSource for StillCamera {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.frames == 0 {
            return Err(CaptureError::Exhausted);
        }
        self.frames -= 1;
        Ok(Frame::filled(240, 240, [10, 10, 10]))
    }

    fn set_focus_mode(&mut self, _mode: FocusMode) -> Result<(), CaptureError> {
        Ok(())
    }

    fn trigger_autofocus(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }
}

struct TwoCodes;

impl BarcodeDecoder for TwoCodes {
    fn decode(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Detection>> {
        Ok(vec![
            Detection::new("4006381333931", BoundingBox::new(10, 20, 60, 30)),
            Detection::new("0000", BoundingBox::new(120, 20, 60, 30)),
        ])
    }
}

struct Catalog;

impl NutritionLookup for Catalog {
    fn lookup(&self, barcode: &BarcodeId) -> LookupOutcome {
        match barcode.as_str() {
            "4006381333931" => LookupOutcome::Found(record("Pencil Snacks")),
            _ => LookupOutcome::NotFound,
        }
    }
}

struct Discard;

impl FrameSink for Discard {
    fn present(&mut self, _image: &RgbaImage) -> Result<SinkEvent, PresentError> {
        Ok(SinkEvent::Continue)
    }
}

#[test]
fn scan_session_logs_each_resolved_barcode_once() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("scanned_log.csv");
    let state = web::Data::new(CollectorState::new(ScanLog::open(&log_path).unwrap()));
    let server = spawn_collector(ephemeral(), state.clone()).unwrap();

    let forwarder = CollectorForwarder::new(
        format!("http://{}/scan", server.addr()),
        Duration::from_secs(5),
    )
    .unwrap();
    let mut scan = ScanLoop::new(
        ScanComponents {
            source: Box::new(StillCamera { frames: 45 }),
            decoder: Box::new(TwoCodes),
            lookup: Box::new(Catalog),
            forwarder: Box::new(forwarder),
            sink: Box::new(Discard),
        },
        ScanConfig {
            max_frames: Some(45),
            ..ScanConfig::without_delays()
        },
    );
    let summary = scan.run().unwrap();
    assert_eq!(summary.frames, 45);
    assert_eq!(summary.lookups, 2);
    assert_eq!(summary.forwards, 1);

    let scans = state.scans();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].product_name, "Pencil Snacks");
    assert_eq!(fs::read_to_string(&log_path).unwrap().lines().count(), 2);

    server.stop();
}
