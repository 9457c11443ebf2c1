//! Normalised nutrition data and the record shape shared with the collector.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Marker rendered and transmitted for nutrients the product database lacks.
pub const UNAVAILABLE: &str = "N/A";

/// Product name used when upstream omits one.
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

/// Decoded barcode payload; equality is exact string match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BarcodeId(String);

impl BarcodeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BarcodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BarcodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A per-100g nutrient amount, or an explicit "unavailable" marker.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Nutrient {
    Value(f64),
    #[default]
    Unavailable,
}

impl Nutrient {
    /// Interpret an upstream JSON value. Numbers and numeric strings are kept;
    /// anything else (null, missing, garbage) becomes `Unavailable`.
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::Number(n)) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map_or(Nutrient::Unavailable, Nutrient::Value),
            Some(serde_json::Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map_or(Nutrient::Unavailable, Nutrient::Value),
            _ => Nutrient::Unavailable,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Nutrient::Value(_))
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nutrient::Value(v) => write!(f, "{v}"),
            Nutrient::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

impl Serialize for Nutrient {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Nutrient::Value(v) => serializer.serialize_f64(*v),
            Nutrient::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Nutrient {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(Nutrient::from_json(value.as_ref()))
    }
}

/// Normalised nutrition facts for one product. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct NutritionRecord {
    product_name: String,
    calories: Nutrient,
    protein: Nutrient,
    sugar: Nutrient,
    carbs: Nutrient,
    fat: Nutrient,
}

impl NutritionRecord {
    pub fn new(
        product_name: Option<String>,
        calories: Nutrient,
        protein: Nutrient,
        sugar: Nutrient,
        carbs: Nutrient,
        fat: Nutrient,
    ) -> Self {
        let product_name = product_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());
        Self {
            product_name,
            calories,
            protein,
            sugar,
            carbs,
            fat,
        }
    }

    /// Fallback shown for barcodes whose lookup failed.
    pub fn unknown() -> Self {
        Self::new(
            None,
            Nutrient::Unavailable,
            Nutrient::Unavailable,
            Nutrient::Unavailable,
            Nutrient::Unavailable,
            Nutrient::Unavailable,
        )
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn calories(&self) -> Nutrient {
        self.calories
    }

    pub fn protein(&self) -> Nutrient {
        self.protein
    }

    pub fn sugar(&self) -> Nutrient {
        self.sugar
    }

    pub fn carbs(&self) -> Nutrient {
        self.carbs
    }

    pub fn fat(&self) -> Nutrient {
        self.fat
    }

    /// The five nutrients in display order with their labels and units.
    pub fn nutrients(&self) -> [(&'static str, Nutrient, &'static str); 5] {
        [
            ("Calories", self.calories, "kcal"),
            ("Protein", self.protein, "g"),
            ("Sugar", self.sugar, "g"),
            ("Carbs", self.carbs, "g"),
            ("Fat", self.fat, "g"),
        ]
    }

    /// Panel lines, e.g. `Calories: 52 kcal`.
    pub fn panel_lines(&self) -> Vec<String> {
        self.nutrients()
            .iter()
            .map(|(label, value, unit)| format!("{label}: {value} {unit}"))
            .collect()
    }
}

/// JSON body exchanged with the logging collector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub barcode: BarcodeId,
    #[serde(default = "unknown_product")]
    pub product_name: String,
    #[serde(default)]
    pub calories: Nutrient,
    #[serde(default)]
    pub protein: Nutrient,
    #[serde(default)]
    pub sugar: Nutrient,
    #[serde(default)]
    pub carbs: Nutrient,
    #[serde(default)]
    pub fat: Nutrient,
}

fn unknown_product() -> String {
    UNKNOWN_PRODUCT.to_string()
}

impl ScanRecord {
    pub fn new(barcode: BarcodeId, record: &NutritionRecord) -> Self {
        Self {
            barcode,
            product_name: record.product_name().to_string(),
            calories: record.calories(),
            protein: record.protein(),
            sugar: record.sugar(),
            carbs: record.carbs(),
            fat: record.fat(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nutrient_accepts_numbers_and_numeric_strings() {
        assert_eq!(Nutrient::from_json(Some(&json!(52))), Nutrient::Value(52.0));
        assert_eq!(Nutrient::from_json(Some(&json!("0.3"))), Nutrient::Value(0.3));
        assert_eq!(Nutrient::from_json(Some(&json!(null))), Nutrient::Unavailable);
        assert_eq!(Nutrient::from_json(Some(&json!("trace"))), Nutrient::Unavailable);
        assert_eq!(Nutrient::from_json(None), Nutrient::Unavailable);
    }

    #[test]
    fn unavailable_serialises_as_marker() {
        let record = ScanRecord::new(BarcodeId::new("42"), &NutritionRecord::unknown());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "barcode": "42",
                "product_name": "Unknown Product",
                "calories": "N/A",
                "protein": "N/A",
                "sugar": "N/A",
                "carbs": "N/A",
                "fat": "N/A",
            })
        );
    }

    #[test]
    fn scan_record_tolerates_missing_fields() {
        let record: ScanRecord =
            serde_json::from_value(json!({"barcode": "7", "calories": 12.5})).unwrap();
        assert_eq!(record.product_name, UNKNOWN_PRODUCT);
        assert_eq!(record.calories, Nutrient::Value(12.5));
        assert_eq!(record.fat, Nutrient::Unavailable);
    }

    #[test]
    fn blank_product_name_falls_back() {
        let record = NutritionRecord::new(
            Some("   ".into()),
            Nutrient::Value(1.0),
            Nutrient::Unavailable,
            Nutrient::Unavailable,
            Nutrient::Unavailable,
            Nutrient::Unavailable,
        );
        assert_eq!(record.product_name(), UNKNOWN_PRODUCT);
        assert_eq!(record.panel_lines()[0], "Calories: 1 kcal");
        assert_eq!(record.panel_lines()[4], "Fat: N/A g");
    }
}
