//! `nutriscan`: camera barcode scanner with nutrition overlays, plus the
//! logging collector it forwards resolved scans to.

pub mod cli;
pub mod collector;
pub mod config;
pub mod scan;
pub mod telemetry;
