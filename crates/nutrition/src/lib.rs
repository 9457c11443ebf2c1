//! Nutrition data model, product lookup, and collector forwarding.
//!
//! - `record`: barcode ids, nutrients, and the collector wire format.
//! - `lookup`: bounded-latency Open Food Facts client.
//! - `forward`: best-effort POST of enriched records to the logging collector.

mod forward;
mod lookup;
mod record;

use thiserror::Error;

pub use forward::{
    CollectorForwarder, DEFAULT_COLLECTOR_URL, DEFAULT_FORWARD_TIMEOUT, Forward, ForwardError,
};
pub use lookup::{
    DEFAULT_LOOKUP_TIMEOUT, DEFAULT_LOOKUP_URL, LookupOutcome, NutritionLookup,
    OpenFoodFactsClient, parse_product_response,
};
pub use record::{BarcodeId, Nutrient, NutritionRecord, ScanRecord, UNAVAILABLE, UNKNOWN_PRODUCT};

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[source] reqwest::Error),
    #[error("invalid base URL {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
}
