//! Telemetry helpers for tracing subscribers and the Prometheus exporter.

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use tracing_subscriber::{
    Layer, Registry,
    filter::{EnvFilter, filter_fn},
    fmt,
    prelude::*,
};

use crate::config::{LogFormat, TelemetryOptions};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the Chrome trace writer alive; dropping it flushes the file.
pub struct TelemetryGuard {
    _chrome_guard: Option<tracing_chrome::FlushGuard>,
}

/// Install the global tracing subscriber and, when requested, the metrics
/// exporter. Call once per process.
pub fn init(opts: &TelemetryOptions, verbose: bool) -> Result<TelemetryGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(match opts.log_format {
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::uptime())
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_timer(fmt::time::uptime())
            .with_filter(env_filter)
            .boxed(),
    });

    let mut chrome_error = None;
    let chrome_guard = match opts.chrome_trace_path.as_deref() {
        Some(path) => match build_chrome_layer(path) {
            Ok((layer, guard)) => {
                layers.push(layer.with_filter(filter_fn(|meta| meta.is_span())).boxed());
                Some(guard)
            }
            Err(err) => {
                chrome_error = Some((path.to_path_buf(), err));
                None
            }
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("failed to install tracing subscriber")?;

    if let Some((path, err)) = chrome_error {
        warn!(
            "failed to initialise chrome trace writer at {}: {err}",
            path.display()
        );
    }

    if let Some(addr) = opts.metrics_listen {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .with_context(|| format!("failed to start metrics exporter on {addr}"))?;
        info!(%addr, "Prometheus metrics exporter listening");
    }

    Ok(TelemetryGuard {
        _chrome_guard: chrome_guard,
    })
}

fn build_chrome_layer(
    path: &Path,
) -> std::io::Result<(
    tracing_chrome::ChromeLayer<Registry>,
    tracing_chrome::FlushGuard,
)> {
    let file = File::create(path)?;
    let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .writer(file)
        .include_args(true)
        .trace_style(tracing_chrome::TraceStyle::Threaded)
        .build();
    Ok((layer, guard))
}
