//! Open Food Facts product lookup.

use std::time::Duration;

use reqwest::{Url, blocking::Client};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    ClientBuildError,
    record::{BarcodeId, Nutrient, NutritionRecord},
};

pub const DEFAULT_LOOKUP_URL: &str = "https://world.openfoodfacts.org";
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a single product lookup. Failures are values, never errors.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupOutcome {
    Found(NutritionRecord),
    NotFound,
    TransientError(String),
}

impl LookupOutcome {
    /// Short label used for log fields and metric labels.
    pub fn label(&self) -> &'static str {
        match self {
            LookupOutcome::Found(_) => "found",
            LookupOutcome::NotFound => "not_found",
            LookupOutcome::TransientError(_) => "transient_error",
        }
    }
}

/// Remote product database keyed by barcode.
pub trait NutritionLookup {
    fn lookup(&self, barcode: &BarcodeId) -> LookupOutcome;
}

#[derive(Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    product: Option<Product>,
}

#[derive(Deserialize)]
struct Product {
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    nutriments: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Decode an Open Food Facts `/api/v0/product/<code>.json` body.
pub fn parse_product_response(body: &[u8]) -> LookupOutcome {
    let response: ProductResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(err) => return LookupOutcome::TransientError(format!("invalid response body: {err}")),
    };

    if response.status != Some(1) {
        return LookupOutcome::NotFound;
    }
    let Some(product) = response.product else {
        return LookupOutcome::NotFound;
    };

    let nutriments = product.nutriments.unwrap_or_default();
    let field = |key: &str| Nutrient::from_json(nutriments.get(key));

    LookupOutcome::Found(NutritionRecord::new(
        product.product_name,
        field("energy-kcal_100g"),
        field("proteins_100g"),
        field("sugars_100g"),
        field("carbohydrates_100g"),
        field("fat_100g"),
    ))
}

/// Blocking Open Food Facts client with a fixed per-request timeout.
pub struct OpenFoodFactsClient {
    client: Client,
    base_url: Url,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientBuildError> {
        let raw = base_url.into();
        let base_url = match Url::parse(&raw) {
            Ok(url) if !url.cannot_be_a_base() => url,
            Ok(_) => {
                return Err(ClientBuildError::BaseUrl {
                    url: raw,
                    reason: "not a hierarchical URL".into(),
                });
            }
            Err(err) => {
                return Err(ClientBuildError::BaseUrl {
                    url: raw,
                    reason: err.to_string(),
                });
            }
        };
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nutriscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientBuildError::Http)?;
        Ok(Self { client, base_url })
    }

    /// Product endpoint for `barcode`. The id is one percent-encoded path
    /// segment, so `/`, `?` and `#` in a payload stay part of the id.
    pub fn product_url(&self, barcode: &BarcodeId) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v0", "product"])
                .push(&format!("{barcode}.json"));
        }
        url
    }
}

impl NutritionLookup for OpenFoodFactsClient {
    fn lookup(&self, barcode: &BarcodeId) -> LookupOutcome {
        let url = self.product_url(barcode);
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(err) => {
                let kind = if err.is_timeout() { "timeout" } else { "request" };
                warn!(%barcode, kind, "product lookup failed: {err}");
                return LookupOutcome::TransientError(format!("{kind} error: {err}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%barcode, status = status.as_u16(), "product database returned error status");
            return LookupOutcome::NotFound;
        }

        let body = match response.bytes() {
            Ok(body) => body,
            Err(err) => {
                warn!(%barcode, "failed to read product response: {err}");
                return LookupOutcome::TransientError(format!("body error: {err}"));
            }
        };

        let outcome = parse_product_response(&body);
        match &outcome {
            LookupOutcome::Found(record) => {
                debug!(%barcode, product = record.product_name(), "product found")
            }
            LookupOutcome::NotFound => debug!(%barcode, "product not found"),
            LookupOutcome::TransientError(reason) => warn!(%barcode, "{reason}"),
        }
        outcome
    }
}
