//! Configuration parsing for the `scan` and `collector` subcommands.
//!
//! CLI arguments are validated once here; downstream wiring consumes the
//! resulting structs without re-parsing flags.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use nutrition::{DEFAULT_COLLECTOR_URL, DEFAULT_LOOKUP_URL};
use scanner::ScanConfig;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
/// Log line rendering.
pub enum LogFormat {
    /// Human-readable lines with an uptime timer.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

#[derive(Clone, Debug, Default)]
/// Tracing and metrics options shared by every subcommand.
pub struct TelemetryOptions {
    pub log_format: LogFormat,
    /// Write a Chrome trace JSON file capturing spans.
    pub chrome_trace_path: Option<PathBuf>,
    /// Serve Prometheus metrics on this address.
    pub metrics_listen: Option<SocketAddr>,
}

/// Flags accepted before or after any subcommand.
#[derive(Debug, Args)]
pub struct TelemetryCliArgs {
    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,
    /// Emit Chrome trace JSON for post-mortem analysis.
    #[arg(long = "chrome-trace", value_name = "PATH", global = true)]
    pub chrome_trace: Option<PathBuf>,
    /// Expose Prometheus metrics on ADDR (for example 127.0.0.1:9000).
    #[arg(long = "metrics-listen", value_name = "ADDR", global = true)]
    pub metrics_listen: Option<SocketAddr>,
}

impl From<TelemetryCliArgs> for TelemetryOptions {
    fn from(args: TelemetryCliArgs) -> Self {
        Self {
            log_format: args.log_format,
            chrome_trace_path: args.chrome_trace,
            metrics_listen: args.metrics_listen,
        }
    }
}

#[derive(Clone, Debug)]
/// Everything the `scan` subcommand needs to assemble a session.
pub struct ScannerConfig {
    /// Camera device index or capture URI.
    pub source: String,
    pub width: i32,
    pub height: i32,
    pub lookup_url: String,
    pub lookup_timeout: Duration,
    pub collector_url: String,
    pub forward_timeout: Duration,
    /// Optional TorchScript object detector, used for telemetry only.
    pub model_path: Option<PathBuf>,
    pub detector_size: u32,
    pub headless: bool,
    pub verbose: bool,
    pub session: ScanConfig,
}

/// CLI arguments accepted by the `scan` subcommand.
#[derive(Debug, Args)]
pub struct ScanCliArgs {
    /// Camera device index or capture URI.
    #[arg(long = "source", value_name = "URI", default_value = "0")]
    pub source: String,
    /// Capture width in pixels.
    #[arg(long = "width", value_name = "PX", default_value_t = 480)]
    pub width: i32,
    /// Capture height in pixels.
    #[arg(long = "height", value_name = "PX", default_value_t = 480)]
    pub height: i32,
    /// Nutrition database base URL.
    #[arg(long = "lookup-url", value_name = "URL", default_value = DEFAULT_LOOKUP_URL)]
    pub lookup_url: String,
    /// Logging collector endpoint receiving resolved scans.
    #[arg(long = "collector-url", value_name = "URL", default_value = DEFAULT_COLLECTOR_URL)]
    pub collector_url: String,
    /// Nutrition lookup timeout in seconds.
    #[arg(long = "lookup-timeout-secs", value_name = "SECS", default_value_t = 5)]
    pub lookup_timeout_secs: u64,
    /// Collector request timeout in seconds.
    #[arg(long = "forward-timeout-secs", value_name = "SECS", default_value_t = 5)]
    pub forward_timeout_secs: u64,
    /// Retrigger autofocus every N frames.
    #[arg(long = "refocus-interval", value_name = "FRAMES", default_value_t = 30)]
    pub refocus_interval: u64,
    /// TorchScript object detector model path.
    #[arg(long = "model", value_name = "PATH")]
    pub model: Option<PathBuf>,
    /// Object detector square input size in pixels.
    #[arg(long = "detector-size", value_name = "PX", default_value_t = 320)]
    pub detector_size: u32,
    /// Run without a preview window.
    #[arg(long = "headless", action = clap::ArgAction::SetTrue)]
    pub headless: bool,
    /// Stop after N frames.
    #[arg(long = "max-frames", value_name = "N")]
    pub max_frames: Option<u64>,
    /// Enable verbose logging (per-frame detections).
    #[arg(long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl TryFrom<ScanCliArgs> for ScannerConfig {
    type Error = anyhow::Error;

    fn try_from(args: ScanCliArgs) -> Result<Self> {
        if args.source.trim().is_empty() {
            bail!("--source must not be empty");
        }
        if args.width <= 0 || args.height <= 0 {
            bail!("Capture width and height must be positive integers");
        }
        if args.refocus_interval == 0 {
            bail!("--refocus-interval must be at least 1");
        }
        if args.lookup_timeout_secs == 0 || args.forward_timeout_secs == 0 {
            bail!("Network timeouts must be at least one second");
        }
        if args.detector_size == 0 || args.detector_size % 32 != 0 {
            bail!("--detector-size must be a positive multiple of 32");
        }
        if args.max_frames == Some(0) {
            bail!("--max-frames must be at least 1");
        }

        let session = ScanConfig {
            refocus_interval: args.refocus_interval,
            max_frames: args.max_frames,
            ..ScanConfig::default()
        };

        Ok(Self {
            source: args.source,
            width: args.width,
            height: args.height,
            lookup_url: args.lookup_url,
            lookup_timeout: Duration::from_secs(args.lookup_timeout_secs),
            collector_url: args.collector_url,
            forward_timeout: Duration::from_secs(args.forward_timeout_secs),
            model_path: args.model,
            detector_size: args.detector_size,
            headless: args.headless,
            verbose: args.verbose,
            session,
        })
    }
}

#[derive(Clone, Debug)]
/// Settings for the logging collector server.
pub struct CollectorConfig {
    pub bind: SocketAddr,
    /// Append-only CSV log of every accepted scan.
    pub log_file: PathBuf,
}

/// CLI arguments accepted by the `collector` subcommand.
#[derive(Debug, Args)]
pub struct CollectorCliArgs {
    /// Address the HTTP server binds to.
    #[arg(long = "bind", value_name = "ADDR", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,
    /// CSV file receiving one row per scan.
    #[arg(long = "log-file", value_name = "PATH", default_value = "scanned_log.csv")]
    pub log_file: PathBuf,
}

impl TryFrom<CollectorCliArgs> for CollectorConfig {
    type Error = anyhow::Error;

    fn try_from(args: CollectorCliArgs) -> Result<Self> {
        if args.log_file.as_os_str().is_empty() {
            bail!("--log-file must not be empty");
        }
        if args.log_file.is_dir() {
            bail!("--log-file {} is a directory", args.log_file.display());
        }
        Ok(Self {
            bind: args.bind,
            log_file: args.log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct ScanHarness {
        #[command(flatten)]
        args: ScanCliArgs,
    }

    fn scan(argv: &[&str]) -> Result<ScannerConfig> {
        let parsed = ScanHarness::try_parse_from(std::iter::once("scan").chain(argv.iter().copied()))?;
        ScannerConfig::try_from(parsed.args)
    }

    #[test]
    fn defaults_match_reference_setup() {
        let config = scan(&[]).unwrap();
        assert_eq!(config.source, "0");
        assert_eq!((config.width, config.height), (480, 480));
        assert_eq!(config.lookup_url, DEFAULT_LOOKUP_URL);
        assert_eq!(config.collector_url, DEFAULT_COLLECTOR_URL);
        assert_eq!(config.lookup_timeout, Duration::from_secs(5));
        assert_eq!(config.session.refocus_interval, 30);
        assert!(config.session.max_frames.is_none());
        assert!(!config.headless);
    }

    #[test]
    fn rejects_zero_refocus_interval() {
        let err = scan(&["--refocus-interval", "0"]).unwrap_err();
        assert!(err.to_string().contains("--refocus-interval"));
    }

    #[test]
    fn rejects_bad_dimensions_and_detector_size() {
        assert!(scan(&["--width", "0"]).is_err());
        assert!(scan(&["--detector-size", "100"]).is_err());
        assert!(scan(&["--max-frames", "0"]).is_err());
    }

    #[test]
    fn carries_overrides_into_session() {
        let config = scan(&[
            "--source",
            "rtsp://cam/1",
            "--refocus-interval",
            "10",
            "--max-frames",
            "90",
            "--headless",
        ])
        .unwrap();
        assert_eq!(config.source, "rtsp://cam/1");
        assert_eq!(config.session.refocus_interval, 10);
        assert_eq!(config.session.max_frames, Some(90));
        assert!(config.headless);
    }
}
