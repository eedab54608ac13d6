use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductCode(pub String);

impl std::fmt::Display for ProductCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog metadata for one product, as supplied by the ingestion layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub code: ProductCode,
    #[serde(default)]
    pub family_code: String,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
}

#[derive(Clone, Debug, Default)]
pub struct ProductCatalog {
    products: HashMap<ProductCode, ProductInfo>,
}

impl ProductCatalog {
    pub fn new(products: Vec<ProductInfo>) -> Self {
        Self { products: products.into_iter().map(|info| (info.code.clone(), info)).collect() }
    }

    pub fn find(&self, code: &ProductCode) -> Option<&ProductInfo> {
        self.products.get(code)
    }

    pub fn theme_of(&self, code: &ProductCode) -> Option<&str> {
        self.find(code).and_then(|info| info.theme.as_deref()).filter(|theme| !theme.is_empty())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
