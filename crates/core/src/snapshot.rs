//! JSON sales snapshot handed over by the ingestion layer.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::product::{ProductCatalog, ProductInfo};
use crate::domain::sales::{RawSalesRow, SalesRecord};
use crate::errors::ApplicationError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesSnapshot {
    #[serde(default)]
    pub records: Vec<RawSalesRow>,
    #[serde(default)]
    pub catalog: Vec<ProductInfo>,
}

/// Snapshot resolved into engine input.
#[derive(Clone, Debug)]
pub struct LoadedSnapshot {
    pub records: Vec<SalesRecord>,
    pub catalog: ProductCatalog,
    /// Rows dropped at the boundary, e.g. for a missing product code.
    pub rejected_rows: usize,
}

impl SalesSnapshot {
    pub fn from_json_str(input: &str) -> Result<Self, ApplicationError> {
        serde_json::from_str(input)
            .map_err(|error| ApplicationError::Ingestion(format!("invalid snapshot JSON: {error}")))
    }

    pub fn load(path: &Path) -> Result<LoadedSnapshot, ApplicationError> {
        let raw = fs::read_to_string(path).map_err(|error| {
            ApplicationError::Ingestion(format!("failed to read `{}`: {error}", path.display()))
        })?;
        let loaded = Self::from_json_str(&raw)?.resolve();

        info!(
            event_name = "ingestion.snapshot.loaded",
            path = %path.display(),
            records = loaded.records.len(),
            rejected_rows = loaded.rejected_rows,
            catalog_products = loaded.catalog.len(),
            "sales snapshot loaded"
        );
        Ok(loaded)
    }

    pub fn resolve(self) -> LoadedSnapshot {
        let mut rejected_rows = 0;
        let mut records = Vec::with_capacity(self.records.len());
        for (row_index, raw) in self.records.into_iter().enumerate() {
            match SalesRecord::from_raw(raw) {
                Ok(record) => records.push(record),
                Err(error) => {
                    rejected_rows += 1;
                    warn!(
                        event_name = "ingestion.row.rejected",
                        row_index,
                        error = %error,
                        "sales row rejected"
                    );
                }
            }
        }

        LoadedSnapshot { records, catalog: ProductCatalog::new(self.catalog), rejected_rows }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rust_decimal::Decimal;

    use super::SalesSnapshot;
    use crate::domain::product::ProductCode;

    const SNAPSHOT: &str = r#"{
        "records": [
            {"product_code": "A1", "family_code": "TOPS", "season_label": "PV24", "net_units": 12, "unit_price": "19.90"},
            {"product_code": "", "family_code": "TOPS", "season_label": "PV24", "net_units": 3},
            {"product_code": "A2", "theme": "T_OI23 05 MARFIL_P"}
        ],
        "catalog": [
            {"code": "A1", "family_code": "TOPS", "theme": "BASICS", "unit_cost": "7.10"}
        ]
    }"#;

    #[test]
    fn rows_without_product_code_are_rejected() {
        let loaded = SalesSnapshot::from_json_str(SNAPSHOT)
            .unwrap_or_else(|error| panic!("parse: {error}"))
            .resolve();

        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.rejected_rows, 1);
        assert_eq!(loaded.records[0].unit_price, Decimal::new(1990, 2));
        assert_eq!(loaded.records[1].net_units, 0.0);
        assert!(loaded.records[1].season.is_some());
        assert_eq!(loaded.catalog.theme_of(&ProductCode("A1".to_owned())), Some("BASICS"));
    }

    #[test]
    fn load_reads_from_disk_and_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap_or_else(|e| panic!("tempfile: {e}"));
        file.write_all(SNAPSHOT.as_bytes()).unwrap_or_else(|e| panic!("write: {e}"));
        let loaded =
            SalesSnapshot::load(file.path()).unwrap_or_else(|error| panic!("load: {error}"));
        assert_eq!(loaded.records.len(), 2);

        let error = SalesSnapshot::from_json_str("{ not json").err();
        assert_eq!(error.map(|e| e.error_class()), Some("ingestion"));
    }
}
