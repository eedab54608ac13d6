use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductCode;
use crate::domain::season::SeasonSpec;
use crate::errors::DomainError;

/// Composite grouping key for a product's sales history.
///
/// Kept structured instead of a delimited string so codes that contain the
/// delimiter cannot collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductKey {
    pub product_code: ProductCode,
    pub family_code: String,
}

/// Sales row as delivered by the spreadsheet ingestion layer, before any
/// defaulting. Every numeric column may be missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSalesRow {
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default)]
    pub family_code: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub season_label: Option<String>,
    #[serde(default)]
    pub net_units: Option<f64>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
}

/// Fully defaulted sales row. Model code only ever sees this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub product_code: ProductCode,
    pub family_code: String,
    pub theme: Option<String>,
    pub season_label: String,
    pub season: Option<SeasonSpec>,
    /// Signed; negative rows are returns.
    pub net_units: f64,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
}

impl SalesRecord {
    pub fn new(
        product_code: impl Into<String>,
        family_code: impl Into<String>,
        season_label: impl Into<String>,
        net_units: f64,
        unit_price: Decimal,
    ) -> Self {
        let season_label = season_label.into();
        Self {
            product_code: ProductCode(product_code.into()),
            family_code: family_code.into(),
            theme: None,
            season: SeasonSpec::parse(&season_label),
            season_label,
            net_units,
            unit_price,
            unit_cost: Decimal::ZERO,
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    /// Resolves a raw ingestion row into a defaulted record.
    ///
    /// Rows without a product code are rejected. Missing numeric fields
    /// become zero and the season label is parsed once here; an unparsable
    /// label is kept verbatim with `season = None`.
    pub fn from_raw(raw: RawSalesRow) -> Result<Self, DomainError> {
        let product_code = raw
            .product_code
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .ok_or_else(|| {
                DomainError::InvariantViolation("sales row is missing a product code".to_string())
            })?;

        let season_label = raw.season_label.unwrap_or_default().trim().to_string();
        let theme = raw.theme.map(|theme| theme.trim().to_string()).filter(|t| !t.is_empty());
        let season = SeasonSpec::parse(&season_label)
            .or_else(|| theme.as_deref().and_then(SeasonSpec::parse));

        let net_units = raw.net_units.filter(|units| units.is_finite()).unwrap_or(0.0);

        Ok(Self {
            product_code: ProductCode(product_code),
            family_code: raw.family_code.map(|f| f.trim().to_string()).unwrap_or_default(),
            theme,
            season_label,
            season,
            net_units,
            unit_price: raw.unit_price.unwrap_or(Decimal::ZERO),
            unit_cost: raw.unit_cost.unwrap_or(Decimal::ZERO),
        })
    }

    pub fn key(&self) -> ProductKey {
        ProductKey { product_code: self.product_code.clone(), family_code: self.family_code.clone() }
    }
}

pub(crate) fn decimal_to_f64(value: Decimal) -> f64 {
    value.try_into().unwrap_or(0.0)
}
