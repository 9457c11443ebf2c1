//! Actix Web logging collector accepting scan records from the scanner.
//!
//! The server runs on a dedicated thread with its own actix system so the
//! caller keeps a plain blocking API: spawn, read the bound address, stop.

use std::{
    io,
    net::SocketAddr,
    sync::Mutex,
    thread::{self, JoinHandle},
};

use actix_web::{App, HttpResponse, HttpServer, dev::ServerHandle, error::InternalError, web};
use anyhow::{Context, Result, anyhow};
use chrono::Local;
use nutrition::ScanRecord;
use serde_json::json;
use tracing::{error, info};

use super::log::ScanLog;

pub const SAVED_MESSAGE: &str = "Product saved successfully.";

/// Shared state backing HTTP handlers.
pub struct CollectorState {
    scans: Mutex<Vec<ScanRecord>>,
    log: Mutex<ScanLog>,
}

impl CollectorState {
    pub fn new(log: ScanLog) -> Self {
        Self {
            scans: Mutex::new(Vec::new()),
            log: Mutex::new(log),
        }
    }

    pub fn scans(&self) -> Vec<ScanRecord> {
        self.scans
            .lock()
            .map(|scans| scans.clone())
            .unwrap_or_default()
    }
}

/// Register collector routes on an actix `App`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let body = json!({ "error": err.to_string() });
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    });
    cfg.app_data(json_config)
        .route("/scan", web::post().to(save_scan))
        .route("/scans", web::get().to(list_scans));
}

/// Handle for a collector running on a background thread.
pub struct CollectorServer {
    addr: SocketAddr,
    handle: ServerHandle,
    thread: Option<JoinHandle<()>>,
}

impl CollectorServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Gracefully stop the server and wait for its thread to exit.
    pub fn stop(mut self) {
        actix_web::rt::System::new().block_on(self.handle.stop(true));
        self.join();
    }

    /// Block until the server exits on its own (for example on SIGINT).
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("collector server thread panicked");
            }
        }
    }
}

type Bound = (SocketAddr, ServerHandle);

/// Bind the collector on `bind` and serve it from a background thread.
pub fn spawn_collector(
    bind: SocketAddr,
    state: web::Data<CollectorState>,
) -> Result<CollectorServer> {
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<io::Result<Bound>>(1);
    let thread = thread::Builder::new()
        .name("collector-server".into())
        .spawn(move || {
            let result = actix_web::rt::System::new().block_on(async move {
                let server = match HttpServer::new(move || {
                    App::new().app_data(state.clone()).configure(configure)
                })
                .bind(bind)
                {
                    Ok(server) => server,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return Ok(());
                    }
                };
                let addr = server.addrs().first().copied().unwrap_or(bind);
                let server = server.run();
                let _ = ready_tx.send(Ok((addr, server.handle())));
                server.await
            });
            if let Err(err) = result {
                error!("HTTP server error: {err}");
            }
        })
        .context("Failed to spawn collector server thread")?;

    let (addr, handle) = ready_rx
        .recv()
        .map_err(|_| anyhow!("collector server thread exited before binding"))?
        .with_context(|| format!("failed to bind collector on {bind}"))?;
    info!(%addr, "Collector listening");

    Ok(CollectorServer {
        addr,
        handle,
        thread: Some(thread),
    })
}

async fn save_scan(state: web::Data<CollectorState>, scan: web::Json<ScanRecord>) -> HttpResponse {
    let scan = scan.into_inner();
    info!(
        barcode = %scan.barcode,
        product = %scan.product_name,
        "Received scan"
    );

    // The listing only ever shows scans that reached the CSV log.
    let written = match state.log.lock() {
        Ok(mut log) => log.append(&scan, Local::now().naive_local()),
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    if let Err(err) = written {
        error!(barcode = %scan.barcode, "failed to append scan log row: {err}");
        return HttpResponse::InternalServerError().json(json!({ "error": err.to_string() }));
    }

    match state.scans.lock() {
        Ok(mut scans) => scans.push(scan),
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    }

    metrics::counter!("collector_records_total").increment(1);
    HttpResponse::Ok().json(json!({ "message": SAVED_MESSAGE }))
}

async fn list_scans(state: web::Data<CollectorState>) -> HttpResponse {
    HttpResponse::Ok().json(state.scans())
}

#[cfg(test)]
mod tests {
    use std::{fs, io};

    use actix_web::{http::StatusCode, test};
    use serde_json::Value;

    use super::*;

    fn state(dir: &tempfile::TempDir) -> web::Data<CollectorState> {
        let log = ScanLog::open(dir.path().join("scanned_log.csv")).unwrap();
        web::Data::new(CollectorState::new(log))
    }

    #[actix_web::test]
    async fn accepts_scan_and_lists_it() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/scan")
            .set_json(json!({
                "barcode": "012345",
                "product_name": "Apple",
                "calories": 52.0,
                "protein": 0.3,
                "sugar": 10.4,
                "carbs": 14.0,
                "fat": 0.2
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "message": SAVED_MESSAGE }));

        let req = test::TestRequest::get().uri("/scans").to_request();
        let listed: Vec<ScanRecord> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].barcode.as_str(), "012345");

        let csv = fs::read_to_string(dir.path().join("scanned_log.csv")).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.ends_with(",012345,Apple,52,0.3,10.4,14,0.2"), "{row}");
    }

    #[actix_web::test]
    async fn unavailable_nutrients_round_trip_as_na() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/scan")
            .set_json(json!({ "barcode": "77", "calories": "N/A" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let listed = state.scans();
        assert_eq!(listed[0].product_name, "Unknown Product");
        let json = serde_json::to_value(&listed[0]).unwrap();
        assert_eq!(json["fat"], json!("N/A"));
    }

    #[actix_web::test]
    async fn malformed_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/scan")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.scans().is_empty());

        let csv = fs::read_to_string(dir.path().join("scanned_log.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    struct DiskFull;

    impl io::Write for DiskFull {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::StorageFull, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[actix_web::test]
    async fn scan_that_fails_to_log_is_not_listed() {
        let state = web::Data::new(CollectorState::new(ScanLog::with_writer(
            "full.csv", DiskFull,
        )));
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/scan")
            .set_json(json!({ "barcode": "012345", "product_name": "Apple" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("no space"), "{body}");

        let req = test::TestRequest::get().uri("/scans").to_request();
        let listed: Vec<ScanRecord> = test::call_and_read_body_json(&app, req).await;
        assert!(listed.is_empty());
    }
}
