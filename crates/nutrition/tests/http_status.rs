use std::{net::SocketAddr, sync::mpsc, thread, time::Duration};

use actix_web::{App, HttpResponse, HttpServer, dev::ServerHandle, web};
use nutrition::{
    BarcodeId, CollectorForwarder, Forward, ForwardError, LookupOutcome, NutritionLookup,
    NutritionRecord, OpenFoodFactsClient, ScanRecord,
};

/// Local stand-in for the product database and the collector.
struct Upstream {
    addr: SocketAddr,
    handle: ServerHandle,
}

impl Upstream {
    fn start() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(|| {
                    App::new()
                        .route("/api/v0/product/{code}", web::get().to(product))
                        .route("/slow/api/v0/product/{code}", web::get().to(slow_product))
                        .route("/scan", web::post().to(|| async { HttpResponse::Ok().finish() }))
                        .route(
                            "/broken",
                            web::post().to(|| async { HttpResponse::InternalServerError().finish() }),
                        )
                        .route(
                            "/created",
                            web::post().to(|| async { HttpResponse::Created().finish() }),
                        )
                })
                .workers(1)
                .bind("127.0.0.1:0")
                .unwrap();
                let addr = server.addrs()[0];
                let server = server.run();
                tx.send((addr, server.handle())).unwrap();
                server.await
            })
        });
        let (addr, handle) = rx.recv().unwrap();
        Self { addr, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for Upstream {
    fn drop(&mut self) {
        actix_web::rt::System::new().block_on(self.handle.stop(false));
    }
}

async fn product(code: web::Path<String>) -> HttpResponse {
    match code.as_str() {
        "missing.json" => HttpResponse::NotFound().finish(),
        "broken.json" => HttpResponse::InternalServerError().finish(),
        _ => HttpResponse::Ok().json(serde_json::json!({
            "status": 1,
            "product": { "product_name": "Apple", "nutriments": { "fat_100g": 0.2 } }
        })),
    }
}

async fn slow_product() -> HttpResponse {
    actix_web::rt::time::sleep(Duration::from_secs(3)).await;
    HttpResponse::Ok().finish()
}

fn scan() -> ScanRecord {
    ScanRecord::new(BarcodeId::new("012345"), &NutritionRecord::unknown())
}

#[test]
fn error_statuses_are_not_found() {
    let upstream = Upstream::start();
    let client = OpenFoodFactsClient::new(upstream.url(""), Duration::from_secs(5)).unwrap();

    assert_eq!(client.lookup(&BarcodeId::new("missing")), LookupOutcome::NotFound);
    assert_eq!(client.lookup(&BarcodeId::new("broken")), LookupOutcome::NotFound);
    match client.lookup(&BarcodeId::new("012345")) {
        LookupOutcome::Found(record) => assert_eq!(record.product_name(), "Apple"),
        other => panic!("expected Found, got {other:?}"),
    }
}

#[test]
fn stalled_lookup_times_out_as_transient() {
    let upstream = Upstream::start();
    let client =
        OpenFoodFactsClient::new(upstream.url("/slow"), Duration::from_millis(300)).unwrap();

    let started = std::time::Instant::now();
    assert!(matches!(
        client.lookup(&BarcodeId::new("012345")),
        LookupOutcome::TransientError(_)
    ));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn collector_status_other_than_ok_is_reported() {
    let upstream = Upstream::start();
    let timeout = Duration::from_secs(5);

    let ok = CollectorForwarder::new(upstream.url("/scan"), timeout).unwrap();
    assert!(ok.forward(&scan()).is_ok());

    let broken = CollectorForwarder::new(upstream.url("/broken"), timeout).unwrap();
    assert!(matches!(broken.forward(&scan()), Err(ForwardError::Status(500))));

    let created = CollectorForwarder::new(upstream.url("/created"), timeout).unwrap();
    assert!(matches!(created.forward(&scan()), Err(ForwardError::Status(201))));
}
