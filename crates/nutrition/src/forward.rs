//! Best-effort delivery of scan records to the logging collector.

use std::time::Duration;

use reqwest::{StatusCode, blocking::Client};
use thiserror::Error;
use tracing::debug;

use crate::{ClientBuildError, record::ScanRecord};

pub const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:5000/scan";
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("collector responded with status {0}")]
    Status(u16),
    #[error("collector request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Single-attempt transmission of a record. Callers log failures; nothing is
/// retried or queued.
pub trait Forward {
    fn forward(&self, record: &ScanRecord) -> Result<(), ForwardError>;
}

/// HTTP POST of the record as JSON to the collector's `/scan` endpoint.
pub struct CollectorForwarder {
    client: Client,
    url: String,
}

impl CollectorForwarder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientBuildError::Http)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Forward for CollectorForwarder {
    fn forward(&self, record: &ScanRecord) -> Result<(), ForwardError> {
        let response = self.client.post(&self.url).json(record).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ForwardError::Status(status.as_u16()));
        }
        debug!(barcode = %record.barcode, "record forwarded to collector");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BarcodeId, NutritionRecord};

    #[test]
    fn unreachable_collector_is_transport_error() {
        let forwarder =
            CollectorForwarder::new("http://127.0.0.1:9/scan", Duration::from_millis(500)).unwrap();
        let record = ScanRecord::new(BarcodeId::new("1"), &NutritionRecord::unknown());
        assert!(matches!(
            forwarder.forward(&record),
            Err(ForwardError::Transport(_))
        ));
    }
}
