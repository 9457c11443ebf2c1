use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::{
    collector,
    config::{
        CollectorCliArgs, CollectorConfig, ScanCliArgs, ScannerConfig, TelemetryCliArgs,
        TelemetryOptions,
    },
    scan, telemetry,
};

/// Barcode nutrition scanner and its scan log collector.
#[derive(Debug, Parser)]
#[command(name = "nutriscan", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
    #[command(flatten)]
    pub telemetry: TelemetryCliArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan barcodes from a camera and overlay nutrition facts.
    Scan(ScanCliArgs),
    /// Run the logging collector that receives resolved scans.
    Collector(CollectorCliArgs),
}

pub fn run(cli: Cli) -> Result<()> {
    let opts = TelemetryOptions::from(cli.telemetry);
    match cli.command {
        Command::Scan(args) => {
            let config = ScannerConfig::try_from(args)?;
            let _telemetry = telemetry::init(&opts, config.verbose)?;
            let summary = scan::run(config)?;
            info!(
                frames = summary.frames,
                detections = summary.detections,
                lookups = summary.lookups,
                cache_hits = summary.cache_hits,
                forward_failures = summary.forward_failures,
                "Scanner closed"
            );
            Ok(())
        }
        Command::Collector(args) => {
            let config = CollectorConfig::try_from(args)?;
            let _telemetry = telemetry::init(&opts, false)?;
            collector::run(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_collector_with_global_flags() {
        let cli = Cli::try_parse_from([
            "nutriscan",
            "collector",
            "--bind",
            "127.0.0.1:5050",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.telemetry.log_format, crate::config::LogFormat::Json);
        match cli.command {
            Command::Collector(args) => {
                assert_eq!(args.bind.port(), 5050);
                assert_eq!(args.log_file.to_str(), Some("scanned_log.csv"));
            }
            Command::Scan(_) => panic!("expected collector"),
        }
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["nutriscan"]).is_err());
    }
}
